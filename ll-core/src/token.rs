//! The boundary with the lexical scanner: classified tokens, the variable id
//! table handed to token construction, and the cursor parsers read through.

use std::collections::hash_map::HashMap;

use crate::grammar::{SymbolConvention, Terminal};
use crate::TerminalRepresentable;

/// A 1-based row/column position in source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Assigns sequential ids, starting at 1, to distinct variable names.
///
/// Owned by whoever constructs tokens, so separate analyses never share ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VariableTable {
    ids: HashMap<String, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `name`, assigning the next free id if it is new.
    pub fn id_for_mut<S: AsRef<str>>(&mut self, name: S) -> usize {
        let name = name.as_ref();
        let next_id = self.ids.len() + 1;

        *self.ids.entry(name.to_string()).or_insert(next_id)
    }

    pub fn get<S: AsRef<str>>(&self, name: S) -> Option<usize> {
        self.ids.get(name.as_ref()).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A classified input token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    terminal: Terminal,
    value: String,
    variable_id: Option<usize>,
    position: Option<Position>,
}

impl Token {
    pub fn new<S: Into<String>>(terminal: Terminal, value: S) -> Self {
        Self {
            terminal,
            value: value.into(),
            variable_id: None,
            position: None,
        }
    }

    /// Builds a token for a named variable, recording its id in `table`.
    pub fn variable<S: Into<String>>(table: &mut VariableTable, terminal: Terminal, name: S) -> Self {
        let name = name.into();
        let id = table.id_for_mut(&name);

        Self {
            variable_id: Some(id),
            ..Self::new(terminal, name)
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn terminal(&self) -> Terminal {
        self.terminal
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn variable_id(&self) -> Option<usize> {
        self.variable_id
    }
}

impl TerminalRepresentable for Token {
    fn to_terminal(&self) -> Terminal {
        self.terminal
    }

    fn position(&self) -> Option<Position> {
        self.position
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.variable_id {
            Some(id) => write!(f, "< {}, {}, id={} >", self.terminal, self.value, id),
            None => write!(f, "< {}, {} >", self.terminal, self.value),
        }
    }
}

/// Reads a sentence where every non-whitespace character is its own
/// terminal, e.g. `i+i*i`.
pub fn read_sentence<S: AsRef<str>>(input: S, convention: &SymbolConvention) -> Vec<Token> {
    let mut row = 1;
    let mut column = 0;
    let mut tokens = vec![];

    for c in input.as_ref().chars() {
        if c == '\n' {
            row += 1;
            column = 0;
            continue;
        }
        column += 1;

        if c.is_whitespace() {
            continue;
        }

        let terminal = if c == convention.eof() {
            Terminal::Eof
        } else {
            Terminal::Char(c)
        };
        tokens.push(Token::new(terminal, c).with_position(Position::new(row, column)));
    }

    tokens
}

/// A saved cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

impl Snapshot {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A read position into an immutable token slice.
///
/// A trailing token classified as [Terminal::Eof] is treated as an explicit
/// terminator and never consumed.
#[derive(Debug)]
pub struct Cursor<'a, T> {
    tokens: &'a [T],
    end: usize,
    index: usize,
}

impl<'a, T: TerminalRepresentable> Cursor<'a, T> {
    pub fn new(tokens: &'a [T]) -> Self {
        let end = match tokens.last() {
            Some(token) if token.to_terminal() == Terminal::Eof => tokens.len() - 1,
            _ => tokens.len(),
        };

        Self {
            tokens,
            end,
            index: 0,
        }
    }

    /// The classification of the current token, [Terminal::Eof] once every
    /// token has been consumed.
    pub fn peek(&self) -> Terminal {
        self.tokens[..self.end]
            .get(self.index)
            .map(|token| token.to_terminal())
            .unwrap_or(Terminal::Eof)
    }

    pub fn advance_mut(&mut self) {
        if self.index < self.end {
            self.index += 1;
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.end - self.index
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.end
    }

    /// The source position of the current token, if it carries one.
    pub fn position(&self) -> Option<Position> {
        self.position_of(self.index)
    }

    pub fn position_of(&self, index: usize) -> Option<Position> {
        self.tokens.get(index).and_then(|token| token.position())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.index)
    }

    pub fn restore_mut(&mut self, snapshot: Snapshot) {
        self.index = snapshot.0;
    }
}
