use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::grammar::*;
use crate::sets::find_nullable_non_terminals;
use crate::token::{Cursor, Snapshot};
use crate::trace::{ParseError, ParseErrorKind, ParseOutcome, Step, Trace};
use crate::TerminalRepresentable;

/// A symbol waiting to be derived, tagged with the non-terminal whose
/// alternative introduced it.
#[derive(Debug, Clone, Copy)]
struct Pending {
    symbol: Symbol,
    parent: NonTerminal,
}

#[derive(Debug)]
struct Frame {
    pending: Pending,
    next: Option<Rc<Frame>>,
}

/// The symbols still to be derived, top first. Copies share their common
/// tail, so saving one per choice point is constant-time at any depth.
#[derive(Debug, Clone, Default)]
struct WorkStack {
    head: Option<Rc<Frame>>,
}

impl WorkStack {
    fn push_mut(&mut self, pending: Pending) {
        let next = self.head.take();
        self.head = Some(Rc::new(Frame { pending, next }));
    }

    fn pop_mut(&mut self) -> Option<Pending> {
        let frame = self.head.take()?;
        self.head = frame.next.clone();
        Some(frame.pending)
    }
}

impl Drop for WorkStack {
    // unlink frames one at a time so a deep stack is not dropped recursively.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(frame) = next {
            next = match Rc::try_unwrap(frame) {
                Ok(mut frame) => frame.next.take(),
                Err(_) => None,
            };
        }
    }
}

/// A point the parse can resume from by expanding `non_terminal` with its
/// next untried alternative.
#[derive(Debug)]
struct ChoicePoint {
    non_terminal: NonTerminal,
    next_alternative: usize,
    /// The work stack as it was with `non_terminal` popped.
    work: WorkStack,
    snapshot: Snapshot,
    trace_len: usize,
}

/// The farthest point any attempt reached before failing.
#[derive(Debug, Clone, Copy)]
struct Failure {
    index: usize,
    found: Terminal,
    non_terminal: NonTerminal,
    at_end: bool,
}

/// State owned exclusively by a single in-flight parse.
struct ParseContext<'a, T> {
    cursor: Cursor<'a, T>,
    trace: Trace,
    work: WorkStack,
    choice_points: Vec<ChoicePoint>,
    farthest_failure: Option<Failure>,
    /// Farthest point at which the start symbol was fully derived with
    /// input left over.
    farthest_leftover: Option<Failure>,
}

impl<'a, T: TerminalRepresentable> ParseContext<'a, T> {
    fn new(tokens: &'a [T], start: NonTerminal) -> Self {
        let mut work = WorkStack::default();
        work.push_mut(Pending {
            symbol: Symbol::NonTerminal(start),
            parent: start,
        });

        Self {
            cursor: Cursor::new(tokens),
            trace: Trace::default(),
            work,
            choice_points: vec![],
            farthest_failure: None,
            farthest_leftover: None,
        }
    }

    fn failure_here(&self, non_terminal: NonTerminal) -> Failure {
        Failure {
            index: self.cursor.index(),
            found: self.cursor.peek(),
            non_terminal,
            at_end: self.cursor.is_exhausted(),
        }
    }

    /// Records a failed match, keeping only the first failure at the
    /// farthest token index.
    fn record_failure_mut(&mut self, non_terminal: NonTerminal) {
        let failure = self.failure_here(non_terminal);
        keep_farthest(&mut self.farthest_failure, failure);
    }

    fn record_leftover_mut(&mut self, start: NonTerminal) {
        let leftover = self.failure_here(start);
        keep_farthest(&mut self.farthest_leftover, leftover);
    }
}

fn keep_farthest(current: &mut Option<Failure>, candidate: Failure) {
    let is_farther = current
        .map(|failure| candidate.index > failure.index)
        .unwrap_or(true);

    if is_farther {
        *current = Some(candidate);
    }
}

/// A trial-and-error top-down parser working directly on a [RuleSet].
///
/// Pending symbols live on an explicit work stack, so input length never
/// grows the call stack. Expanding a non-terminal tries its first
/// alternative and saves a choice point for the rest. Any later failure,
/// including input left over once the start symbol is derived, rolls the
/// cursor, trace and work stack back to the most recent choice point and
/// tries its next alternative. Alternatives are tried in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct BacktrackingParser<'a> {
    rules: &'a RuleSet,
}

impl<'a> BacktrackingParser<'a> {
    /// Instantiates a parser for `rules`, rejecting rule sets with
    /// unresolved references or left recursion.
    pub fn new(rules: &'a RuleSet) -> Result<Self, GrammarLoadError> {
        rules.validate()?;

        match find_left_recursion(rules) {
            Some(non_terminal) => Err(left_recursion_error(non_terminal)),
            None => Ok(Self::new_unchecked(rules)),
        }
    }

    /// Instantiates a parser for a rule set already known to be resolved
    /// and free of left recursion.
    pub(crate) fn new_unchecked(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Parses `tokens` from `start`. Succeeds only if `start` reduces and
    /// every token is consumed.
    pub fn parse<T: TerminalRepresentable>(&self, start: NonTerminal, tokens: &[T]) -> ParseOutcome {
        let mut ctx = ParseContext::new(tokens, start);

        let accepted = loop {
            let progressed = match ctx.work.pop_mut() {
                None if ctx.cursor.is_exhausted() => break true,
                None => {
                    ctx.record_leftover_mut(start);
                    false
                }
                Some(pending) => self.derive_mut(pending, &mut ctx),
            };

            if !progressed && !self.resume_mut(&mut ctx) {
                break false;
            }
        };

        let result = if accepted {
            log::trace!("accept");
            Ok(())
        } else {
            Err(rejection(start, &ctx))
        };

        ParseOutcome::new(ctx.trace, result)
    }

    /// Derives one pending symbol, returning false if it cannot match.
    fn derive_mut<T: TerminalRepresentable>(
        &self,
        pending: Pending,
        ctx: &mut ParseContext<'_, T>,
    ) -> bool {
        match pending.symbol {
            // epsilon always succeeds without consuming input.
            Symbol::Terminal(Terminal::Epsilon) => true,
            Symbol::Terminal(terminal) if ctx.cursor.peek() == terminal => {
                log::trace!("match {}", terminal);
                ctx.cursor.advance_mut();
                ctx.trace.push_mut(Step::Match(terminal));
                true
            }
            Symbol::Terminal(_) => {
                ctx.record_failure_mut(pending.parent);
                false
            }
            Symbol::NonTerminal(non_terminal) => {
                let alternatives = self.rules.alternative_ids(&non_terminal);
                let first = match alternatives.first() {
                    Some(&id) => id,
                    None => {
                        ctx.record_failure_mut(non_terminal);
                        return false;
                    }
                };

                if alternatives.len() > 1 {
                    ctx.choice_points.push(ChoicePoint {
                        non_terminal,
                        next_alternative: 1,
                        work: ctx.work.clone(),
                        snapshot: ctx.cursor.snapshot(),
                        trace_len: ctx.trace.len(),
                    });
                }

                self.expand_mut(non_terminal, first, ctx);
                true
            }
        }
    }

    /// Rolls back to the most recent choice point and expands its next
    /// alternative. Returns false once no choice point remains.
    fn resume_mut<T: TerminalRepresentable>(&self, ctx: &mut ParseContext<'_, T>) -> bool {
        let choice_point = match ctx.choice_points.last_mut() {
            Some(choice_point) => choice_point,
            None => return false,
        };

        let non_terminal = choice_point.non_terminal;
        let alternatives = self.rules.alternative_ids(&non_terminal);
        let id = match alternatives.get(choice_point.next_alternative) {
            Some(&id) => id,
            None => return false,
        };
        choice_point.next_alternative += 1;

        log::trace!("rollback to {} at {}", non_terminal, choice_point.snapshot.index());
        ctx.cursor.restore_mut(choice_point.snapshot);
        ctx.trace.truncate_mut(choice_point.trace_len);

        if choice_point.next_alternative < alternatives.len() {
            ctx.work = choice_point.work.clone();
        } else if let Some(exhausted) = ctx.choice_points.pop() {
            // the final alternative takes the saved stack over.
            ctx.work = exhausted.work;
        }

        self.expand_mut(non_terminal, id, ctx);
        true
    }

    fn expand_mut<T: TerminalRepresentable>(
        &self,
        non_terminal: NonTerminal,
        id: ProductionId,
        ctx: &mut ParseContext<'_, T>,
    ) {
        let production = match self.rules.production(id) {
            Some(production) => production,
            None => return,
        };

        log::trace!("try {}", production);
        ctx.trace.push_mut(Step::Expand {
            origin: non_terminal,
            rhs: production.rhs.clone(),
        });
        let rhs = production
            .rhs
            .iter()
            .rev()
            .filter(|&&symbol| symbol != Symbol::Terminal(Terminal::Epsilon));
        for &symbol in rhs {
            ctx.work.push_mut(Pending {
                symbol,
                parent: non_terminal,
            });
        }
    }
}

pub(crate) fn left_recursion_error(non_terminal: NonTerminal) -> GrammarLoadError {
    GrammarLoadError::new(GrammarLoadErrorKind::LeftRecursion)
        .with_data(format!("{} can derive itself in leftmost position", non_terminal))
}

/// Builds the error for a parse that ran out of alternatives. A full
/// derivation of `start` with input left over takes precedence over the
/// farthest failed match.
fn rejection<T: TerminalRepresentable>(start: NonTerminal, ctx: &ParseContext<'_, T>) -> ParseError {
    let (kind, failure) = match (ctx.farthest_leftover, ctx.farthest_failure) {
        (Some(leftover), _) => (ParseErrorKind::TrailingInput, leftover),
        (None, Some(failure)) if failure.found == Terminal::Eof && failure.at_end => {
            (ParseErrorKind::PrematureEndOfInput, failure)
        }
        (None, Some(failure)) => (ParseErrorKind::UnexpectedToken, failure),
        (None, None) => (ParseErrorKind::UnexpectedToken, ctx.failure_here(start)),
    };

    ParseError::new(kind, failure.index, failure.found)
        .with_position(ctx.cursor.position_of(failure.index))
        .with_non_terminal(Some(failure.non_terminal))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Returns a non-terminal that can derive itself in leftmost position,
/// directly or through a nullable prefix, if any exists.
pub fn find_left_recursion(rules: &RuleSet) -> Option<NonTerminal> {
    let nullable = find_nullable_non_terminals(rules);

    // map each non-terminal to the non-terminals that can begin it.
    let mut leftmost: HashMap<NonTerminal, Vec<NonTerminal>> = HashMap::new();
    for production in rules.productions() {
        let edges = leftmost.entry(production.lhs).or_default();

        for symbol in &production.rhs {
            match symbol {
                Symbol::Terminal(Terminal::Epsilon) => continue,
                Symbol::Terminal(_) => break,
                Symbol::NonTerminal(nt) => {
                    edges.push(*nt);
                    if !nullable.contains(nt) {
                        break;
                    }
                }
            }
        }
    }

    let mut states = HashMap::new();
    rules
        .non_terminals()
        .find_map(|nt| visit(nt, &leftmost, &mut states))
}

fn visit(
    non_terminal: NonTerminal,
    leftmost: &HashMap<NonTerminal, Vec<NonTerminal>>,
    states: &mut HashMap<NonTerminal, VisitState>,
) -> Option<NonTerminal> {
    match states.get(&non_terminal) {
        Some(VisitState::InProgress) => return Some(non_terminal),
        Some(VisitState::Done) => return None,
        None => (),
    }

    states.insert(non_terminal, VisitState::InProgress);
    let mut seen = HashSet::new();
    let edges = leftmost.get(&non_terminal).into_iter().flatten();
    for &next in edges {
        if seen.insert(next) {
            if let Some(recursive) = visit(next, leftmost, states) {
                return Some(recursive);
            }
        }
    }
    states.insert(non_terminal, VisitState::Done);

    None
}
