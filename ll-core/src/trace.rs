use crate::grammar::{NonTerminal, Symbol, Terminal};
use crate::token::Position;

/// One step of a derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A non-terminal was replaced by one of its alternatives.
    Expand {
        origin: NonTerminal,
        rhs: Vec<Symbol>,
    },
    /// A terminal was matched against, and consumed, one input token.
    Match(Terminal),
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Expand { origin, rhs } => {
                let rhs = rhs.iter().map(|symbol| symbol.to_string()).collect::<String>();
                write!(f, "{} -> {}", origin, rhs)
            }
            Step::Match(terminal) => write!(f, "match {}", terminal),
        }
    }
}

/// The ordered record of steps taken by a single parse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Trace {
    steps: Vec<Step>,
}

impl Trace {
    pub(crate) fn push_mut(&mut self, step: Step) {
        self.steps.push(step)
    }

    /// Drops every step recorded after the first `len`.
    pub(crate) fn truncate_mut(&mut self, len: usize) {
        self.steps.truncate(len)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<Step> {
        self.steps.iter()
    }

    /// Returns an iterator over only the expansion steps.
    pub fn expansions(&self) -> impl Iterator<Item = (NonTerminal, &[Symbol])> {
        self.steps.iter().filter_map(|step| match step {
            Step::Expand { origin, rhs } => Some((*origin, rhs.as_slice())),
            Step::Match(_) => None,
        })
    }

    /// Returns an iterator over the terminals matched, in input order.
    pub fn matched(&self) -> impl Iterator<Item = Terminal> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Step::Match(terminal) => Some(*terminal),
            Step::Expand { .. } => None,
        })
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines = self
            .steps
            .iter()
            .map(|step| step.to_string())
            .collect::<Vec<_>>();

        write!(f, "{}", lines.join("\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("no production for lookahead")]
    NoProduction,
    #[error("ambiguous grammar")]
    AmbiguousGrammar,
    #[error("premature end of input")]
    PrematureEndOfInput,
    #[error("trailing input")]
    TrailingInput,
}

/// Describes where and why a parse was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    /// Index of the offending token in the input.
    index: usize,
    /// The classification of the offending token, [Terminal::Eof] past the
    /// end of input.
    found: Terminal,
    position: Option<Position>,
    /// The last non-terminal being derived when the parse failed.
    non_terminal: Option<NonTerminal>,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, index: usize, found: Terminal) -> Self {
        Self {
            kind,
            index,
            found,
            position: None,
            non_terminal: None,
        }
    }

    pub(crate) fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub(crate) fn with_non_terminal(mut self, non_terminal: Option<NonTerminal>) -> Self {
        self.non_terminal = non_terminal;
        self
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn found(&self) -> Terminal {
        self.found
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn non_terminal(&self) -> Option<NonTerminal> {
        self.non_terminal
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: found `{}` at token {}", &self.kind, self.found, self.index)?;

        if let Some(position) = self.position {
            write!(f, " ({})", position)?;
        }
        if let Some(non_terminal) = self.non_terminal {
            write!(f, " while deriving {}", non_terminal)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// The result of a single parse: the derivation steps committed and whether
/// the input was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub trace: Trace,
    pub result: Result<(), ParseError>,
}

impl ParseOutcome {
    pub(crate) fn new(trace: Trace, result: Result<(), ParseError>) -> Self {
        Self { trace, result }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.result.as_ref().err()
    }

    /// Returns the trace on success, otherwise the parse error.
    pub fn into_result(self) -> Result<Trace, ParseError> {
        self.result.map(|_| self.trace)
    }
}
