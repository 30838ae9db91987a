use grammar::{GrammarLoadError, NonTerminal, RuleSet, Terminal};
use sets::{FirstSet, FollowSet, TableGenError};
use token::Position;
use trace::ParseOutcome;

pub mod descent;
pub mod grammar;
pub mod ll;
pub mod sets;
pub mod token;
pub mod trace;

/// Represents the kind of parser used to parse a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// Trial-and-error recursive descent over the rule set.
    Backtracking,
    /// Deterministic table-driven LL(1).
    Ll1,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("grammar error: {0}")]
    GrammarError(GrammarLoadError),
    #[error("table generation error: {0}")]
    TableGenerationError(TableGenError),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    data: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, data: None }
    }

    pub fn with_data_mut(&mut self, data: String) {
        self.data = Some(data)
    }

    pub fn with_data(mut self, data: String) -> Self {
        self.with_data_mut(data);
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

impl std::error::Error for Error {}

impl From<GrammarLoadError> for Error {
    fn from(err: GrammarLoadError) -> Self {
        Self::new(ErrorKind::GrammarError(err))
    }
}

impl From<TableGenError> for Error {
    fn from(err: TableGenError) -> Self {
        Self::new(ErrorKind::TableGenerationError(err))
    }
}

/// Provides the terminal classification of an input token.
pub trait TerminalRepresentable {
    fn to_terminal(&self) -> Terminal;

    /// The token's source position, if known.
    fn position(&self) -> Option<Position> {
        None
    }
}

impl TerminalRepresentable for Terminal {
    fn to_terminal(&self) -> Terminal {
        *self
    }
}

/// A validated rule set together with everything derived from it. Built
/// once, read-only afterwards, and safe to share between parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    rules: RuleSet,
    start: NonTerminal,
    first_set: FirstSet,
    follow_set: FollowSet,
    table: ll::PredictionTable,
    left_recursion: Option<NonTerminal>,
}

impl Grammar {
    pub fn new(rules: RuleSet, start: NonTerminal) -> Result<Self, Error> {
        rules.validate()?;

        let first_set = sets::build_first_set(&rules)?;
        let follow_set = sets::build_follow_set(&rules, start, &first_set)?;
        let table = ll::build_table(&rules, &first_set, &follow_set);
        let left_recursion = descent::find_left_recursion(&rules);

        Ok(Self {
            rules,
            start,
            first_set,
            follow_set,
            table,
            left_recursion,
        })
    }

    /// Loads a grammar whose start symbol is its first declared non-terminal.
    pub fn from_spec<S: AsRef<str>>(spec: S) -> Result<Self, Error> {
        let rules = RuleSet::from_spec(spec)?;
        let start = rules.start().ok_or_else(|| {
            GrammarLoadError::new(grammar::GrammarLoadErrorKind::MalformedSpec)
                .with_data("no rules defined".to_string())
        })?;

        Self::new(rules, start)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn start(&self) -> NonTerminal {
        self.start
    }

    pub fn first_set(&self) -> &FirstSet {
        &self.first_set
    }

    pub fn follow_set(&self) -> &FollowSet {
        &self.follow_set
    }

    pub fn table(&self) -> &ll::PredictionTable {
        &self.table
    }

    /// A non-terminal that can derive itself in leftmost position, if any.
    /// Such a grammar can only be parsed with [ParserKind::Ll1].
    pub fn left_recursion(&self) -> Option<NonTerminal> {
        self.left_recursion
    }

    pub fn parse<T: TerminalRepresentable>(
        &self,
        kind: ParserKind,
        tokens: &[T],
    ) -> Result<ParseOutcome, Error> {
        match kind {
            ParserKind::Backtracking => match self.left_recursion {
                Some(non_terminal) => Err(descent::left_recursion_error(non_terminal).into()),
                None => {
                    let parser = descent::BacktrackingParser::new_unchecked(&self.rules);
                    Ok(parser.parse(self.start, tokens))
                }
            },
            ParserKind::Ll1 => Ok(ll::parse(&self.rules, &self.table, self.start, tokens)),
        }
    }
}

/// Loads a rule set and builds its prediction table.
pub fn generate_table_from_rules<G: AsRef<str>>(
    rules: G,
    start: NonTerminal,
) -> Result<ll::PredictionTable, Error> {
    let rules = RuleSet::from_spec(rules)?;

    Grammar::new(rules, start).map(|grammar| grammar.table)
}

/// Loads a grammar, builds what the chosen parser needs and parses `tokens`.
pub fn analyze<G: AsRef<str>, T: TerminalRepresentable>(
    kind: ParserKind,
    rules: G,
    start: NonTerminal,
    tokens: &[T],
) -> Result<ParseOutcome, Error> {
    let rules = RuleSet::from_spec(rules)?;

    match kind {
        ParserKind::Backtracking => {
            let parser = descent::BacktrackingParser::new(&rules)?;
            Ok(parser.parse(start, tokens))
        }
        ParserKind::Ll1 => Grammar::new(rules, start)?.parse(kind, tokens),
    }
}

pub mod prelude {
    pub mod v1 {
        pub use crate::descent::BacktrackingParser;
        pub use crate::grammar::{
            NonTerminal, Production, ProductionId, RuleSet, Symbol, SymbolConvention, Terminal,
        };
        pub use crate::ll::{PredictionTable, TableEntry};
        pub use crate::token::{read_sentence, Position, Token, VariableTable};
        pub use crate::trace::{ParseError, ParseErrorKind, ParseOutcome, Step, Trace};
        pub use crate::{analyze, Grammar, ParserKind, TerminalRepresentable};
    }
}
