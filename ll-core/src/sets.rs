use std::collections::{HashMap, HashSet};

use crate::grammar::*;

/// Markers for the type of error encountered while building sets and tables.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TableGenErrorKind {
    /// A fixed point failed to converge within its pass limit.
    #[error("fixed point iteration limit exceeded")]
    IterationLimitExceeded,
    /// The requested start symbol has no productions.
    #[error("start symbol is undefined")]
    UnknownStartSymbol,
}

/// Represents errors that can occur in the set and table generation process.
#[derive(Debug, PartialEq, Eq)]
pub struct TableGenError {
    kind: TableGenErrorKind,
    data: Option<String>,
}

impl TableGenError {
    pub(crate) fn new(kind: TableGenErrorKind) -> Self {
        Self { kind, data: None }
    }

    pub(crate) fn with_data_mut<S: AsRef<str>>(&mut self, data: S) {
        let data = data.as_ref().to_string();

        self.data = Some(data)
    }

    pub(crate) fn with_data<S: AsRef<str>>(mut self, data: S) -> Self {
        self.with_data_mut(data);
        self
    }

    pub fn kind(&self) -> &TableGenErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for TableGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

impl std::error::Error for TableGenError {}

/// A mapping of non-terminal symbols to their corresponding terminal symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSet {
    label: &'static str,
    order: Vec<NonTerminal>,
    sets: HashMap<NonTerminal, HashSet<Terminal>>,
}

/// FIRST sets, epsilon included for non-terminals that can vanish.
pub type FirstSet = SymbolSet;
/// FOLLOW sets, end-of-input included where a non-terminal can end a
/// sentence.
pub type FollowSet = SymbolSet;

impl SymbolSet {
    fn new<NT: IntoIterator<Item = NonTerminal>>(label: &'static str, non_terminals: NT) -> Self {
        let order = non_terminals.into_iter().collect::<Vec<_>>();
        let sets = order
            .iter()
            .fold(HashMap::new(), |mut acc, &non_terminal| {
                acc.insert(non_terminal, HashSet::new());
                acc
            });

        Self { label, order, sets }
    }

    /// Inserts a terminal into a non-terminal's set returning true if it was
    /// not already a member.
    fn insert<T: Into<Terminal>>(&mut self, key: NonTerminal, terminal: T) -> bool {
        self.sets
            .get_mut(&key)
            .map(|terminal_set| terminal_set.insert(terminal.into()))
            .unwrap_or(false)
    }

    /// Adds every terminal of `terminals`, other than epsilon, to the set of
    /// `key`. Returns true if the set grew.
    fn union_sans_epsilon(&mut self, key: NonTerminal, terminals: &HashSet<Terminal>) -> bool {
        let mut changed = false;

        if let Some(terminal_set) = self.sets.get_mut(&key) {
            for &terminal in terminals.iter().filter(|&&t| t != Terminal::Epsilon) {
                changed |= terminal_set.insert(terminal);
            }
        }

        changed
    }

    pub fn get(&self, non_terminal: &NonTerminal) -> Option<&HashSet<Terminal>> {
        self.sets.get(non_terminal)
    }

    pub fn contains(&self, non_terminal: &NonTerminal, terminal: &Terminal) -> bool {
        self.sets
            .get(non_terminal)
            .map(|terminal_set| terminal_set.contains(terminal))
            .unwrap_or(false)
    }

    /// Iterates over each non-terminal's set in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (NonTerminal, &HashSet<Terminal>)> {
        self.order
            .iter()
            .filter_map(|nt| self.sets.get(nt).map(|terminals| (*nt, terminals)))
    }

    /// The FIRST set of a sequence of symbols: terminals that can begin it,
    /// plus epsilon if the whole sequence can vanish.
    ///
    /// Only meaningful when `self` holds converged FIRST sets.
    pub fn first_of_sequence(&self, symbols: &[Symbol]) -> HashSet<Terminal> {
        let mut first = HashSet::new();

        for symbol in symbols {
            match symbol {
                Symbol::Terminal(Terminal::Epsilon) => continue,
                Symbol::Terminal(terminal) => {
                    first.insert(*terminal);
                    return first;
                }
                Symbol::NonTerminal(nt) => {
                    let nt_first = self.sets.get(nt);
                    let terminals = nt_first
                        .into_iter()
                        .flatten()
                        .filter(|&&t| t != Terminal::Epsilon);
                    first.extend(terminals);

                    if !self.contains(nt, &Terminal::Epsilon) {
                        return first;
                    }
                }
            }
        }

        first.insert(Terminal::Epsilon);
        first
    }
}

impl std::fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines = self
            .iter()
            .map(|(non_terminal, terminals)| {
                let mut rhs = terminals.iter().copied().collect::<Vec<_>>();
                rhs.sort();
                let rhs = rhs.iter().map(|term| term.to_string()).collect::<Vec<_>>();

                format!("{}({}) = {{ {} }}", self.label, non_terminal, rhs.join(" "))
            })
            .collect::<Vec<_>>();

        write!(f, "{}", lines.join("\n"))
    }
}

/// Upper bound on whole-table passes. Every productive pass adds at least
/// one of at most `|terminals| + 2` members to one of the sets.
fn iteration_limit(rules: &RuleSet) -> usize {
    let terminals = rules.terminals().len();
    let non_terminals = rules.non_terminals().count();

    (terminals + 2) * non_terminals + 2
}

/// Returns every non-terminal that can derive the empty string.
pub fn find_nullable_non_terminals(rules: &RuleSet) -> HashSet<NonTerminal> {
    let mut nullable_non_terminals = HashSet::new();

    let mut done = false;
    while !done {
        // assume done unless a change happens.
        done = true;
        for production in rules.productions() {
            let lhs = production.lhs;

            // validate that the production isn't already nullable
            if nullable_non_terminals.contains(&lhs) {
                continue;
            }

            let all_nullable = production.rhs.iter().all(|symbol| match symbol {
                Symbol::Terminal(Terminal::Epsilon) => true,
                Symbol::Terminal(_) => false,
                Symbol::NonTerminal(nt) => nullable_non_terminals.contains(nt),
            });

            if all_nullable {
                nullable_non_terminals.insert(lhs);
                done = false
            }
        }
    }

    nullable_non_terminals
}

/// Computes the FIRST set of every non-terminal by fixed point iteration.
///
/// ```ignore
/// repeat
///     for (each production A -> X1 X2 ... Xn)
///         add FIRST(X1) - { ε } to FIRST(A)
///         while FIRST(Xi) contains ε, continue with Xi+1
///         if every Xi can vanish, add ε to FIRST(A)
/// until no set changes
/// ```
pub fn build_first_set(rules: &RuleSet) -> Result<FirstSet, TableGenError> {
    let mut first_set = SymbolSet::new("FIRST", rules.non_terminals());
    let limit = iteration_limit(rules);

    let mut passes = 0;
    let mut changed = true;
    while changed {
        changed = false;
        passes += 1;

        if passes > limit {
            return Err(TableGenError::new(TableGenErrorKind::IterationLimitExceeded)
                .with_data(format!("FIRST did not converge in {} passes", limit)));
        }

        for production in rules.productions() {
            let lhs = production.lhs;
            let first_of_rhs = first_set.first_of_sequence(&production.rhs);

            changed |= first_set.union_sans_epsilon(lhs, &first_of_rhs);
            if first_of_rhs.contains(&Terminal::Epsilon) {
                changed |= first_set.insert(lhs, Terminal::Epsilon);
            }
        }
    }

    log::debug!("FIRST sets converged after {} passes", passes);
    Ok(first_set)
}

/// Computes the FOLLOW set of every non-terminal from converged FIRST sets.
///
/// ```ignore
/// FOLLOW(S) = { $ }
/// repeat
///     for (each production A -> p B q)
///         add FIRST(q) - { ε } to FOLLOW(B)
///         if q is empty or FIRST(q) contains ε
///             add FOLLOW(A) to FOLLOW(B)
/// until no set changes
/// ```
pub fn build_follow_set(
    rules: &RuleSet,
    start: NonTerminal,
    first_set: &FirstSet,
) -> Result<FollowSet, TableGenError> {
    if !rules.contains(&start) {
        return Err(TableGenError::new(TableGenErrorKind::UnknownStartSymbol)
            .with_data(start.to_string()));
    }

    let mut follow_set = SymbolSet::new("FOLLOW", rules.non_terminals());
    let limit = iteration_limit(rules);

    follow_set.insert(start, Terminal::Eof);

    let mut passes = 0;
    let mut changed = true;
    while changed {
        changed = false;
        passes += 1;

        if passes > limit {
            return Err(TableGenError::new(TableGenErrorKind::IterationLimitExceeded)
                .with_data(format!("FOLLOW did not converge in {} passes", limit)));
        }

        for production in rules.productions() {
            let a = production.lhs;
            let rhs = &production.rhs;

            let non_terminal_positions = rhs.iter().enumerate().filter_map(|(pos, symbol)| {
                match symbol {
                    Symbol::NonTerminal(b) => Some((pos, *b)),
                    Symbol::Terminal(_) => None,
                }
            });

            for (pos, b) in non_terminal_positions {
                let q = &rhs[pos + 1..];
                let first_of_q = first_set.first_of_sequence(q);

                changed |= follow_set.union_sans_epsilon(b, &first_of_q);

                // an empty q yields { ε }, so this also covers A -> p B.
                if first_of_q.contains(&Terminal::Epsilon) {
                    let follow_of_a = follow_set.get(&a).cloned().unwrap_or_default();
                    changed |= follow_set.union_sans_epsilon(b, &follow_of_a);
                }
            }
        }
    }

    log::debug!("FOLLOW sets converged after {} passes", passes);
    Ok(follow_set)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn terminals(repr: &str) -> HashSet<Terminal> {
        let convention = SymbolConvention::default();

        repr.chars()
            .filter_map(|c| match convention.classify(c) {
                Symbol::Terminal(t) => Some(t),
                Symbol::NonTerminal(_) => None,
            })
            .collect()
    }

    #[test]
    fn should_find_nullable_non_terminals() {
        let rules = RuleSet::from_spec(TEST_GRAMMAR).unwrap();

        let mut nullable = find_nullable_non_terminals(&rules)
            .into_iter()
            .collect::<Vec<_>>();
        nullable.sort();

        assert_eq!(vec![nt('G'), nt('S')], nullable);

        // nullability propagates through an all-nullable right-hand side.
        let rules = RuleSet::from_spec("A->BC\nB->b|&\nC->&").unwrap();
        assert!(find_nullable_non_terminals(&rules).contains(&nt('A')));
    }

    #[test]
    fn first_set_returns_expected_values() {
        let rules = RuleSet::from_spec(TEST_GRAMMAR).unwrap();

        let first_sets = build_first_set(&rules).unwrap();

        let expected = [
            ('E', "(i"),
            ('G', "+-&"),
            ('T', "(i"),
            ('S', "*/&"),
            ('F', "(i"),
            ('A', "+-"),
            ('M', "*/"),
        ];
        for (non_terminal, repr) in expected {
            assert_eq!(
                Some(&terminals(repr)),
                first_sets.get(&nt(non_terminal)),
                "FIRST({})",
                non_terminal
            );
        }
    }

    #[test]
    fn first_set_propagates_through_vanishing_prefix() {
        let rules = RuleSet::from_spec("A->BCd\nB->b|&\nC->c|&").unwrap();

        let first_sets = build_first_set(&rules).unwrap();

        assert_eq!(Some(&terminals("bcd")), first_sets.get(&nt('A')));
        assert!(!first_sets.contains(&nt('A'), &Terminal::Epsilon));

        let rules = RuleSet::from_spec("A->BC\nB->b|&\nC->c|&").unwrap();
        let first_sets = build_first_set(&rules).unwrap();
        assert!(first_sets.contains(&nt('A'), &Terminal::Epsilon));
    }

    #[test]
    fn follow_set_returns_expected_values() {
        let rules = RuleSet::from_spec(TEST_GRAMMAR).unwrap();

        let first_sets = build_first_set(&rules).unwrap();
        let follow_sets = build_follow_set(&rules, nt('E'), &first_sets).unwrap();

        let expected = [
            ('E', ")$"),
            ('G', ")$"),
            ('T', "+-)$"),
            ('S', "+-)$"),
            ('F', "*/+-)$"),
            ('A', "(i"),
            ('M', "(i"),
        ];
        for (non_terminal, repr) in expected {
            assert_eq!(
                Some(&terminals(repr)),
                follow_sets.get(&nt(non_terminal)),
                "FOLLOW({})",
                non_terminal
            );
        }
    }

    #[test]
    fn follow_set_errors_on_unknown_start_symbol() {
        let rules = RuleSet::from_spec(TEST_GRAMMAR).unwrap();
        let first_sets = build_first_set(&rules).unwrap();

        let res = build_follow_set(&rules, nt('Z'), &first_sets);

        assert_eq!(
            Err(&TableGenErrorKind::UnknownStartSymbol),
            res.as_ref().map_err(|e| e.kind())
        );
    }

    #[test]
    fn should_compute_first_of_sequence() {
        let rules = RuleSet::from_spec(TEST_GRAMMAR).unwrap();
        let first_sets = build_first_set(&rules).unwrap();

        let seq = [Symbol::NonTerminal(nt('S')), Symbol::NonTerminal(nt('G'))];
        assert_eq!(terminals("*/+-&"), first_sets.first_of_sequence(&seq));

        assert_eq!(terminals("&"), first_sets.first_of_sequence(&[]));
    }

    #[test]
    fn should_rebuild_identical_sets() {
        let rules = RuleSet::from_spec(TEST_GRAMMAR).unwrap();

        let first = build_first_set(&rules).unwrap();
        let follow = build_follow_set(&rules, nt('E'), &first).unwrap();

        assert_eq!(first, build_first_set(&rules).unwrap());
        assert_eq!(follow, build_follow_set(&rules, nt('E'), &first).unwrap());
    }

    #[test]
    fn should_render_sets_sorted() {
        let rules = RuleSet::from_spec("F->(F)|i").unwrap();
        let first = build_first_set(&rules).unwrap();
        let follow = build_follow_set(&rules, nt('F'), &first).unwrap();

        assert_eq!("FIRST(F) = { ( i }", first.to_string());
        assert_eq!("FOLLOW(F) = { ) $ }", follow.to_string());
    }
}
