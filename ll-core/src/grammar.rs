use std::collections::hash_map::HashMap;

/// The character convention used to classify grammar characters.
///
/// Uppercase ASCII letters are always non-terminals. The epsilon and
/// end-of-input markers are configurable, every other non-whitespace
/// character is a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolConvention {
    epsilon: char,
    eof: char,
}

impl SymbolConvention {
    pub const DEFAULT_EPSILON: char = '&';
    pub const DEFAULT_EOF: char = '$';

    pub fn new(epsilon: char, eof: char) -> Self {
        Self { epsilon, eof }
    }

    pub fn epsilon(&self) -> char {
        self.epsilon
    }

    pub fn eof(&self) -> char {
        self.eof
    }

    /// Classifies a single grammar character.
    pub fn classify(&self, c: char) -> Symbol {
        if c.is_ascii_uppercase() {
            Symbol::NonTerminal(NonTerminal(c))
        } else if c == self.epsilon {
            Symbol::Terminal(Terminal::Epsilon)
        } else if c == self.eof {
            Symbol::Terminal(Terminal::Eof)
        } else {
            Symbol::Terminal(Terminal::Char(c))
        }
    }
}

impl Default for SymbolConvention {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EPSILON, Self::DEFAULT_EOF)
    }
}

/// A terminal grammar symbol.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Terminal {
    Char(char),
    /// The empty derivation marker.
    Epsilon,
    /// The end-of-input marker.
    Eof,
}

impl Terminal {
    /// Returns true if the token's classification matches this terminal.
    pub fn matches<T: crate::TerminalRepresentable>(&self, token: &T) -> bool {
        token.to_terminal() == *self
    }
}

impl From<char> for Terminal {
    fn from(c: char) -> Self {
        Terminal::Char(c)
    }
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminal::Char(c) => write!(f, "{}", c),
            Terminal::Epsilon => write!(f, "{}", SymbolConvention::DEFAULT_EPSILON),
            Terminal::Eof => write!(f, "{}", SymbolConvention::DEFAULT_EOF),
        }
    }
}

/// A non-terminal grammar symbol, always an uppercase ASCII letter.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonTerminal(char);

impl NonTerminal {
    /// Returns `None` if `c` is not an uppercase ASCII letter.
    pub fn new(c: char) -> Option<Self> {
        c.is_ascii_uppercase().then_some(Self(c))
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl std::fmt::Display for NonTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Terminal(Terminal),
    NonTerminal(NonTerminal),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal(_))
    }
}

impl From<Terminal> for Symbol {
    fn from(t: Terminal) -> Self {
        Symbol::Terminal(t)
    }
}

impl From<NonTerminal> for Symbol {
    fn from(nt: NonTerminal) -> Self {
        Symbol::NonTerminal(nt)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Terminal(t) => t.fmt(f),
            Symbol::NonTerminal(nt) => nt.fmt(f),
        }
    }
}

/// A wrapper type for annotating a production by its declaration order.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProductionId(usize);

impl ProductionId {
    /// Instantiates a new [ProductionId] from a reference id.
    ///
    /// # Safety
    ///
    /// Caller guarantees that the id usize corresponds to a valid production
    /// id in the corresponding rule set.
    pub fn unchecked_new(id: usize) -> Self {
        ProductionId(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ProductionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // productions are 1-indexed when pretty printed.
        write!(f, "P{}", self.0 + 1)
    }
}

/// A single rewrite rule. An empty right-hand side is always represented by
/// a lone [Terminal::Epsilon].
#[derive(Debug, Hash, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: NonTerminal,
    pub rhs: Vec<Symbol>,
}

impl Production {
    pub fn new(lhs: NonTerminal, rhs: Vec<Symbol>) -> Self {
        let rhs = if rhs.is_empty() {
            vec![Symbol::Terminal(Terminal::Epsilon)]
        } else {
            rhs
        };

        Self { lhs, rhs }
    }

    pub fn is_epsilon(&self) -> bool {
        self.rhs == [Symbol::Terminal(Terminal::Epsilon)]
    }

    pub fn rhs_len(&self) -> usize {
        self.rhs.len()
    }

    /// The right-hand side rendered as a run of symbol characters.
    pub fn rhs_string(&self) -> String {
        self.rhs.iter().map(|symbol| symbol.to_string()).collect()
    }
}

impl std::fmt::Display for Production {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.lhs, self.rhs_string())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GrammarLoadErrorKind {
    #[error("malformed grammar specification")]
    MalformedSpec,
    #[error("provided rule conflicts with existing rule")]
    ConflictingRule,
    #[error("referenced non-terminal has no productions")]
    UnresolvedNonterminal,
    #[error("grammar is left-recursive")]
    LeftRecursion,
}

#[derive(Debug, PartialEq, Eq)]
pub struct GrammarLoadError {
    kind: GrammarLoadErrorKind,
    data: Option<String>,
}

impl GrammarLoadError {
    pub fn new(kind: GrammarLoadErrorKind) -> Self {
        Self { kind, data: None }
    }

    pub fn with_data_mut(&mut self, data: String) {
        self.data = Some(data)
    }

    pub fn with_data(mut self, data: String) -> Self {
        self.with_data_mut(data);
        self
    }

    pub fn kind(&self) -> &GrammarLoadErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for GrammarLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

impl std::error::Error for GrammarLoadError {}

/// An ordered mapping of non-terminals to their alternative productions.
///
/// Alternatives keep their declaration order, which is the order the
/// backtracking parser tries them in.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleSet {
    convention: SymbolConvention,
    non_terminals: Vec<NonTerminal>,
    alternatives: HashMap<NonTerminal, Vec<ProductionId>>,
    productions: Vec<Production>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_convention(convention: SymbolConvention) -> Self {
        Self {
            convention,
            ..Self::default()
        }
    }

    /// Loads a rule set from a grammar specification.
    pub fn from_spec<S: AsRef<str>>(spec: S) -> Result<Self, GrammarLoadError> {
        let mut rules = Self::new();
        rules.add_rules(spec)?;

        Ok(rules)
    }

    pub fn convention(&self) -> &SymbolConvention {
        &self.convention
    }

    fn add_production_mut(&mut self, production: Production) -> ProductionId {
        let id = ProductionId(self.productions.len());
        let lhs = production.lhs;

        if !self.alternatives.contains_key(&lhs) {
            self.non_terminals.push(lhs);
        }
        self.alternatives.entry(lhs).or_default().push(id);
        self.productions.push(production);

        id
    }

    /// Adds every rule in `spec` to the set. Either all lines are applied or,
    /// on the first malformed line, none are.
    pub fn add_rules<S: AsRef<str>>(&mut self, spec: S) -> Result<(), GrammarLoadError> {
        let lines = spec
            .as_ref()
            .lines()
            .enumerate()
            .map(|(lineno, line)| (lineno + 1, line))
            // ignore commented lines.
            .filter(|(_, line)| !line.trim_start().starts_with(';'))
            // ignore empty lines.
            .filter(|(_, line)| !line.chars().all(|c| c.is_whitespace()));

        let mut staged: Vec<Production> = vec![];
        for (lineno, line) in lines {
            let productions = define_rule(&self.convention, line).map_err(|e| match e.data {
                Some(data) => {
                    GrammarLoadError::new(e.kind).with_data(format!("lineno {}: {}", lineno, data))
                }
                None => e,
            })?;

            for production in productions {
                if self.productions.contains(&production) || staged.contains(&production) {
                    return Err(GrammarLoadError::new(GrammarLoadErrorKind::ConflictingRule)
                        .with_data(format!("lineno {}: {}", lineno, &production)));
                }
                staged.push(production);
            }
        }

        for production in staged {
            self.add_production_mut(production);
        }

        Ok(())
    }

    /// Checks that the set is non-empty and that every non-terminal
    /// referenced on a right-hand side has at least one production.
    pub fn validate(&self) -> Result<(), GrammarLoadError> {
        if self.productions.is_empty() {
            return Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                .with_data("no rules defined".to_string()));
        }

        for production in &self.productions {
            let unresolved = production.rhs.iter().find_map(|symbol| match symbol {
                Symbol::NonTerminal(nt) if !self.contains(nt) => Some(nt),
                _ => None,
            });

            if let Some(nt) = unresolved {
                return Err(
                    GrammarLoadError::new(GrammarLoadErrorKind::UnresolvedNonterminal)
                        .with_data(format!("{} in {}", nt, production)),
                );
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    /// Returns true if `non_terminal` has at least one production.
    pub fn contains(&self, non_terminal: &NonTerminal) -> bool {
        self.alternatives.contains_key(non_terminal)
    }

    /// The first declared non-terminal.
    pub fn start(&self) -> Option<NonTerminal> {
        self.non_terminals.first().copied()
    }

    /// Non-terminals in declaration order.
    pub fn non_terminals(&self) -> impl Iterator<Item = NonTerminal> + '_ {
        self.non_terminals.iter().copied()
    }

    /// Terminals in order of first appearance, excluding epsilon.
    pub fn terminals(&self) -> Vec<Terminal> {
        let mut terminals = vec![];
        let rhs_terminals = self
            .productions
            .iter()
            .flat_map(|production| production.rhs.iter())
            .filter_map(|symbol| match symbol {
                Symbol::Terminal(Terminal::Epsilon) => None,
                Symbol::Terminal(t) => Some(*t),
                Symbol::NonTerminal(_) => None,
            });

        for terminal in rhs_terminals {
            if !terminals.contains(&terminal) {
                terminals.push(terminal);
            }
        }

        terminals
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.iter()
    }

    pub fn production(&self, id: ProductionId) -> Option<&Production> {
        self.productions.get(id.as_usize())
    }

    pub fn alternative_ids(&self, non_terminal: &NonTerminal) -> &[ProductionId] {
        self.alternatives
            .get(non_terminal)
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }

    /// The productions of `non_terminal` in declaration order.
    pub fn alternatives(&self, non_terminal: &NonTerminal) -> impl Iterator<Item = &Production> {
        self.alternative_ids(non_terminal)
            .iter()
            .map(|id| &self.productions[id.as_usize()])
    }

    pub fn has_epsilon_alternative(&self, non_terminal: &NonTerminal) -> bool {
        self.alternatives(non_terminal)
            .any(|production| production.is_epsilon())
    }

    /// Returns the first alternative of `non_terminal` whose right-hand side
    /// begins with `symbol`.
    pub fn first_alternative_starting_with(
        &self,
        non_terminal: &NonTerminal,
        symbol: &Symbol,
    ) -> Option<&Production> {
        self.alternatives(non_terminal)
            .find(|production| production.rhs.first() == Some(symbol))
    }
}

impl std::fmt::Display for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines = self
            .non_terminals()
            .map(|nt| {
                let alternatives = self
                    .alternatives(&nt)
                    .map(|production| production.rhs_string())
                    .collect::<Vec<_>>();

                format!("{} -> {}", nt, alternatives.join(" | "))
            })
            .collect::<Vec<_>>();

        write!(f, "{}", lines.join("\n"))
    }
}

/// Parses a single `A -> alt1 | alt2` line into its productions.
pub fn define_rule<S: AsRef<str>>(
    convention: &SymbolConvention,
    line: S,
) -> Result<Vec<Production>, GrammarLoadError> {
    let trimmed_line = line.as_ref().trim();

    // split the line at the assignment delimiter
    let split_line = trimmed_line.split("->").collect::<Vec<_>>();
    let (lhs, rhs) = match split_line.as_slice() {
        [lhs, rhs] => (lhs.trim(), rhs.trim()),
        _ => {
            return Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                .with_data(format!("expected exactly one `->` in `{}`", trimmed_line)))
        }
    };

    // validate the left-hand side is a single non-terminal.
    let mut lhs_chars = lhs.chars();
    let lhs_symbol = match (lhs_chars.next(), lhs_chars.next()) {
        (Some(c), None) => convention.classify(c),
        _ => {
            return Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                .with_data(format!("left-hand side `{}` is not a single symbol", lhs)))
        }
    };
    let lhs = match lhs_symbol {
        Symbol::NonTerminal(nt) => nt,
        Symbol::Terminal(t) => {
            return Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                .with_data(format!("left-hand side `{}` is not a non-terminal", t)))
        }
    };

    rhs.split('|')
        .map(|alternative| {
            let symbols = alternative
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| convention.classify(c))
                .collect::<Vec<_>>();

            let has_epsilon = symbols.contains(&Symbol::Terminal(Terminal::Epsilon));
            if symbols.is_empty() {
                Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                    .with_data(format!("empty alternative for {}", lhs)))
            } else if has_epsilon && symbols.len() > 1 {
                Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                    .with_data(format!(
                        "epsilon must stand alone in alternative `{}`",
                        alternative.trim()
                    )))
            } else if symbols.contains(&Symbol::Terminal(Terminal::Eof)) {
                Err(GrammarLoadError::new(GrammarLoadErrorKind::MalformedSpec)
                    .with_data(format!(
                        "end-of-input marker in alternative `{}`",
                        alternative.trim()
                    )))
            } else {
                Ok(Production::new(lhs, symbols))
            }
        })
        .collect()
}
