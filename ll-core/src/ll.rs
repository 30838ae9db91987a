use std::collections::hash_map::{Entry, HashMap};

use crate::grammar::*;
use crate::sets::{FirstSet, FollowSet};
use crate::token::Cursor;
use crate::trace::{ParseError, ParseErrorKind, ParseOutcome, Step, Trace};
use crate::TerminalRepresentable;

/// A single cell of the prediction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEntry {
    /// Exactly one production predicts this cell.
    Production(ProductionId),
    /// More than one production predicts this cell, in declaration order.
    Conflict(Vec<ProductionId>),
}

/// A cell of the table with more than one candidate production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict<'a> {
    pub non_terminal: NonTerminal,
    pub lookahead: Terminal,
    pub candidates: &'a [ProductionId],
}

impl<'a> std::fmt::Display for Conflict<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let candidates = self
            .candidates
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>();

        write!(
            f,
            "[{}, {}]: {}",
            self.non_terminal,
            self.lookahead,
            candidates.join(", ")
        )
    }
}

/// Maps (non-terminal, lookahead) pairs to the production to expand. A
/// missing cell means the pair is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionTable {
    non_terminals: Vec<NonTerminal>,
    terminals: Vec<Terminal>,
    cells: HashMap<(NonTerminal, Terminal), TableEntry>,
}

impl PredictionTable {
    fn new(non_terminals: Vec<NonTerminal>, terminals: Vec<Terminal>) -> Self {
        Self {
            non_terminals,
            terminals,
            cells: HashMap::new(),
        }
    }

    /// Records a candidate for a cell, turning the cell into a conflict if it
    /// already predicts a different production.
    fn record_mut(&mut self, non_terminal: NonTerminal, lookahead: Terminal, id: ProductionId) {
        match self.cells.entry((non_terminal, lookahead)) {
            Entry::Vacant(e) => {
                e.insert(TableEntry::Production(id));
            }
            Entry::Occupied(mut e) => {
                let entry = e.get_mut();
                match entry {
                    TableEntry::Production(existing) if *existing == id => (),
                    TableEntry::Production(existing) => {
                        *entry = TableEntry::Conflict(vec![*existing, id]);
                    }
                    TableEntry::Conflict(candidates) if !candidates.contains(&id) => {
                        candidates.push(id)
                    }
                    TableEntry::Conflict(_) => (),
                }
            }
        }
    }

    pub fn get(&self, non_terminal: NonTerminal, lookahead: Terminal) -> Option<&TableEntry> {
        self.cells.get(&(non_terminal, lookahead))
    }

    /// Returns the number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every conflicting cell, ordered by non-terminal declaration then
    /// lookahead.
    pub fn conflicts(&self) -> Vec<Conflict<'_>> {
        let mut lookaheads = self.terminals.clone();
        lookaheads.sort();

        self.non_terminals
            .iter()
            .flat_map(|&nt| lookaheads.iter().map(move |&t| (nt, t)))
            .filter_map(|(non_terminal, lookahead)| match self.get(non_terminal, lookahead) {
                Some(TableEntry::Conflict(candidates)) => Some(Conflict {
                    non_terminal,
                    lookahead,
                    candidates,
                }),
                _ => None,
            })
            .collect()
    }

    /// Returns true if no cell holds more than one production.
    pub fn is_ll1(&self) -> bool {
        self.cells
            .values()
            .all(|entry| matches!(entry, TableEntry::Production(_)))
    }

    /// Outputs a human-readable representation of the prediction table.
    pub fn human_readable_format(&self, rules: &RuleSet) -> String {
        const COLUMN_WIDTH: usize = 10;
        const EMPTY_CELL_STR: &str = " ";

        let left_side_padding = 4;
        let row_header = self
            .terminals
            .iter()
            .map(|t| format!("{: >width$}", t.to_string(), width = COLUMN_WIDTH))
            .collect::<String>();
        let table_width_without_left_side_padding = row_header.len();

        let first_row = format!("{}{}", " ".repeat(left_side_padding), &row_header);
        let table_padding = format!(
            "{}{}",
            " ".repeat(left_side_padding),
            "-".repeat(table_width_without_left_side_padding)
        );

        let rows = self.non_terminals.iter().map(|&nt| {
            let cells = self
                .terminals
                .iter()
                .map(|&t| {
                    let repr = match self.get(nt, t) {
                        Some(TableEntry::Production(id)) => rules
                            .production(*id)
                            .map(|production| format!("->{}", production.rhs_string()))
                            .unwrap_or_else(|| id.to_string()),
                        Some(TableEntry::Conflict(_)) => "conflict".to_string(),
                        None => EMPTY_CELL_STR.to_string(),
                    };

                    format!("{: >width$}", repr, width = COLUMN_WIDTH)
                })
                .collect::<String>();

            format!("{: >2} |{}", nt, cells)
        });

        [first_row, table_padding]
            .into_iter()
            .chain(rows)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Constructs the prediction table from converged FIRST and FOLLOW sets.
///
/// ```ignore
/// ∀ production A → α
///     ∀ a ∈ FIRST(α) - { ε }
///         TABLE[A, a] ← A → α
///     if ε ∈ FIRST(α)
///         ∀ b ∈ FOLLOW(A)
///             TABLE[A, b] ← A → α
/// ```
///
/// A cell assigned more than one production is recorded as a conflict.
pub fn build_table(rules: &RuleSet, first_set: &FirstSet, follow_set: &FollowSet) -> PredictionTable {
    let terminals = rules
        .terminals()
        .into_iter()
        .chain(std::iter::once(Terminal::Eof))
        .collect::<Vec<_>>();
    let mut table = PredictionTable::new(rules.non_terminals().collect(), terminals);

    for (idx, production) in rules.productions().enumerate() {
        let id = ProductionId::unchecked_new(idx);
        let a = production.lhs;
        let first_of_alpha = first_set.first_of_sequence(&production.rhs);

        let mut lookaheads = first_of_alpha
            .iter()
            .copied()
            .filter(|&t| t != Terminal::Epsilon)
            .collect::<Vec<_>>();

        if first_of_alpha.contains(&Terminal::Epsilon) {
            let follow_of_a = follow_set.get(&a).into_iter().flatten().copied();
            lookaheads.extend(follow_of_a);
        }

        // sort for a deterministic conflict candidate order.
        lookaheads.sort();
        for lookahead in lookaheads {
            table.record_mut(a, lookahead, id);
        }
    }

    for conflict in table.conflicts() {
        log::warn!("grammar is not LL(1), conflicting cell {}", conflict);
    }
    log::debug!("prediction table built with {} cells", table.len());

    table
}

/// Parses `tokens` by consulting the prediction table, never backtracking.
pub fn parse<T: TerminalRepresentable>(
    rules: &RuleSet,
    table: &PredictionTable,
    start: NonTerminal,
    tokens: &[T],
) -> ParseOutcome {
    let mut cursor = Cursor::new(tokens);
    let mut trace = Trace::default();
    let mut stack = vec![
        Symbol::Terminal(Terminal::Eof),
        Symbol::NonTerminal(start),
    ];
    let mut last_non_terminal = None;

    let reject = |kind: ParseErrorKind, cursor: &Cursor<T>, non_terminal: Option<NonTerminal>| {
        ParseError::new(kind, cursor.index(), cursor.peek())
            .with_position(cursor.position())
            .with_non_terminal(non_terminal)
    };

    let result = loop {
        let lookahead = cursor.peek();
        let top = match stack.last() {
            Some(top) => *top,
            // the end marker is never popped.
            None => break Ok(()),
        };

        match top {
            Symbol::Terminal(Terminal::Eof) => {
                if cursor.is_exhausted() {
                    log::trace!("accept");
                    break Ok(());
                } else {
                    break Err(reject(ParseErrorKind::TrailingInput, &cursor, last_non_terminal));
                }
            }
            Symbol::Terminal(terminal) if terminal == lookahead => {
                log::trace!("match {}", terminal);
                stack.pop();
                cursor.advance_mut();
                trace.push_mut(Step::Match(terminal));
            }
            Symbol::Terminal(_) if lookahead == Terminal::Eof && cursor.is_exhausted() => {
                break Err(reject(
                    ParseErrorKind::PrematureEndOfInput,
                    &cursor,
                    last_non_terminal,
                ));
            }
            Symbol::Terminal(_) => {
                break Err(reject(ParseErrorKind::UnexpectedToken, &cursor, last_non_terminal));
            }
            Symbol::NonTerminal(non_terminal) => {
                last_non_terminal = Some(non_terminal);

                let production = match table.get(non_terminal, lookahead) {
                    Some(TableEntry::Production(id)) => rules.production(*id),
                    Some(TableEntry::Conflict(_)) => {
                        break Err(reject(
                            ParseErrorKind::AmbiguousGrammar,
                            &cursor,
                            last_non_terminal,
                        ));
                    }
                    None => None,
                };
                let production = match production {
                    Some(production) => production,
                    // an end-of-input token with tokens after it is just
                    // an unexpected token.
                    None if lookahead == Terminal::Eof && cursor.is_exhausted() => {
                        break Err(reject(
                            ParseErrorKind::PrematureEndOfInput,
                            &cursor,
                            last_non_terminal,
                        ));
                    }
                    None => {
                        break Err(reject(
                            ParseErrorKind::NoProduction,
                            &cursor,
                            last_non_terminal,
                        ));
                    }
                };

                log::trace!("expand {}", production);
                stack.pop();
                let rhs = production
                    .rhs
                    .iter()
                    .rev()
                    .filter(|&&symbol| symbol != Symbol::Terminal(Terminal::Epsilon));
                stack.extend(rhs);
                trace.push_mut(Step::Expand {
                    origin: non_terminal,
                    rhs: production.rhs.clone(),
                });
            }
        }
    };

    ParseOutcome::new(trace, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::{build_first_set, build_follow_set};
    use crate::token::read_sentence;

    const TEST_GRAMMAR: &str = "E->TG
G->ATG|&
T->FS
S->MFS|&
F->(E)|i
A->+|-
M->*|/
";

    fn nt(c: char) -> NonTerminal {
        NonTerminal::new(c).unwrap()
    }

    fn table_for(grammar: &str, start: char) -> (RuleSet, PredictionTable) {
        let rules = RuleSet::from_spec(grammar).unwrap();
        let first = build_first_set(&rules).unwrap();
        let follow = build_follow_set(&rules, nt(start), &first).unwrap();
        let table = build_table(&rules, &first, &follow);

        (rules, table)
    }

    fn rhs_of(rules: &RuleSet, entry: Option<&TableEntry>) -> Option<String> {
        match entry {
            Some(TableEntry::Production(id)) => rules.production(*id).map(|p| p.rhs_string()),
            _ => None,
        }
    }

    #[test]
    fn should_build_expected_cells_for_expression_grammar() {
        let (rules, table) = table_for(TEST_GRAMMAR, 'E');

        assert!(table.is_ll1());
        assert_eq!(Some("TG".to_string()), rhs_of(&rules, table.get(nt('E'), Terminal::Char('i'))));
        assert_eq!(Some("(E)".to_string()), rhs_of(&rules, table.get(nt('F'), Terminal::Char('('))));
        assert_eq!(Some("ATG".to_string()), rhs_of(&rules, table.get(nt('G'), Terminal::Char('-'))));
        // epsilon alternatives are placed through FOLLOW.
        assert_eq!(Some("&".to_string()), rhs_of(&rules, table.get(nt('G'), Terminal::Eof)));
        assert_eq!(Some("&".to_string()), rhs_of(&rules, table.get(nt('S'), Terminal::Char(')'))));
        assert_eq!(None, table.get(nt('F'), Terminal::Char('*')));
    }

    #[test]
    fn should_record_first_first_conflict() {
        let (_, table) = table_for("S->aB|aC\nB->b\nC->c", 'S');

        assert!(!table.is_ll1());
        assert_eq!(
            Some(&TableEntry::Conflict(vec![
                ProductionId::unchecked_new(0),
                ProductionId::unchecked_new(1)
            ])),
            table.get(nt('S'), Terminal::Char('a'))
        );

        let conflicts = table.conflicts();
        assert_eq!(1, conflicts.len());
        assert_eq!("[S, a]: P1, P2", conflicts[0].to_string());
    }

    #[test]
    fn should_record_first_follow_conflict() {
        let (_, table) = table_for("S->Ab\nA->b|&", 'S');

        assert_eq!(
            Some(&TableEntry::Conflict(vec![
                ProductionId::unchecked_new(1),
                ProductionId::unchecked_new(2)
            ])),
            table.get(nt('A'), Terminal::Char('b'))
        );
    }

    #[test]
    fn should_not_flag_single_production_reached_twice() {
        // FIRST(BC) and FOLLOW(A) both contain `c` for the same production.
        let (rules, table) = table_for("S->Ac\nA->BC\nB->b|&\nC->c|&", 'S');

        assert_eq!(
            Some("BC".to_string()),
            rhs_of(&rules, table.get(nt('A'), Terminal::Char('c')))
        );
    }

    #[test]
    fn should_parse_valid_sentence() {
        let (rules, table) = table_for(TEST_GRAMMAR, 'E');
        let tokens = read_sentence("i+i", rules.convention());

        let outcome = parse(&rules, &table, nt('E'), &tokens);

        assert!(outcome.is_success(), "{:?}", outcome.error());
        assert_eq!(
            "E -> TG\nT -> FS\nF -> i\nmatch i\nS -> &\nG -> ATG\nA -> +\nmatch +\nT -> FS\nF -> i\nmatch i\nS -> &\nG -> &",
            outcome.trace.to_string()
        );
    }

    #[test]
    fn should_reject_trailing_operator_with_no_production() {
        let (rules, table) = table_for(TEST_GRAMMAR, 'E');
        let tokens = read_sentence("i+i*i**", rules.convention());

        let outcome = parse(&rules, &table, nt('E'), &tokens);
        let err = outcome.error().unwrap();

        assert_eq!(ParseErrorKind::NoProduction, err.kind());
        assert_eq!(6, err.index());
        assert_eq!(Terminal::Char('*'), err.found());
        assert_eq!(Some(nt('F')), err.non_terminal());
    }

    #[test]
    fn should_reject_premature_end_of_input() {
        let (rules, table) = table_for(TEST_GRAMMAR, 'E');
        let tokens = read_sentence("(i", rules.convention());

        let outcome = parse(&rules, &table, nt('E'), &tokens);

        assert_eq!(
            Some(ParseErrorKind::PrematureEndOfInput),
            outcome.error().map(|e| e.kind())
        );
    }

    #[test]
    fn should_treat_mid_sentence_eof_token_as_unexpected() {
        let (rules, table) = table_for(TEST_GRAMMAR, 'E');

        let tokens = read_sentence("($i)", rules.convention());
        let err = parse(&rules, &table, nt('E'), &tokens).into_result().unwrap_err();
        assert_eq!(ParseErrorKind::NoProduction, err.kind());
        assert_eq!(1, err.index());
        assert_eq!(Terminal::Eof, err.found());
        assert_eq!(Some(nt('E')), err.non_terminal());

        // S and G vanish on `$`, leaving `)` to meet it.
        let tokens = read_sentence("(i$)", rules.convention());
        let err = parse(&rules, &table, nt('E'), &tokens).into_result().unwrap_err();
        assert_eq!(ParseErrorKind::UnexpectedToken, err.kind());
        assert_eq!(2, err.index());
    }

    #[test]
    fn should_reject_trailing_input() {
        let (rules, table) = table_for("S->a", 'S');
        let tokens = read_sentence("aa", rules.convention());

        let outcome = parse(&rules, &table, nt('S'), &tokens);

        assert_eq!(Some(ParseErrorKind::TrailingInput), outcome.error().map(|e| e.kind()));
        assert_eq!(Some(1), outcome.error().map(|e| e.index()));
    }

    #[test]
    fn should_fail_deterministically_on_conflicting_cell() {
        let (rules, table) = table_for("S->aB|aC\nB->b\nC->c", 'S');
        let tokens = read_sentence("ab", rules.convention());

        let first = parse(&rules, &table, nt('S'), &tokens);
        let second = parse(&rules, &table, nt('S'), &tokens);

        assert_eq!(
            Some(ParseErrorKind::AmbiguousGrammar),
            first.error().map(|e| e.kind())
        );
        assert_eq!(first, second);
    }

    #[test]
    fn should_render_table_grid() {
        let (rules, table) = table_for("F->(F)|i", 'F');

        let rendered = table.human_readable_format(&rules);
        let lines = rendered.lines().collect::<Vec<_>>();

        assert_eq!(3, lines.len());
        assert!(lines[2].contains("->(F)"));
        assert!(lines[2].contains("->i"));
    }
}
