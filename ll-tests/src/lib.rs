//! Shared fixtures for the integration tests and benchmarks.

use std::collections::HashMap;

use ll_core::grammar::{NonTerminal, RuleSet, Symbol, Terminal};
pub use ll_derive::Terminal;

/// The arithmetic expression grammar used throughout the tests.
pub const EXPRESSION_GRAMMAR: &str = "
; expressions
E->TG
G->ATG|&
T->FS
S->MFS|&
F->(E)|i
; operators
A->+|-
M->*|/
";

/// The start symbol of [EXPRESSION_GRAMMAR].
pub fn expression_start() -> NonTerminal {
    NonTerminal::new('E').unwrap()
}

/// A lexed expression token carrying its source text.
#[derive(Terminal, Debug, Clone, PartialEq, Eq)]
pub enum ExprToken {
    #[terminal('i')]
    Ident(String),
    #[terminal('+')]
    Plus,
    #[terminal('-')]
    Minus,
    #[terminal('*')]
    Star,
    #[terminal('/')]
    Slash,
    #[terminal('(')]
    LeftParen,
    #[terminal(')')]
    RightParen,
    #[terminal(eof)]
    Eof,
}

/// Lexes an expression where runs of alphanumerics are identifiers,
/// appending an explicit [ExprToken::Eof].
pub fn lex_expression(input: &str) -> Result<Vec<ExprToken>, String> {
    let mut tokens = vec![];
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => ExprToken::Plus,
            '-' => ExprToken::Minus,
            '*' => ExprToken::Star,
            '/' => ExprToken::Slash,
            '(' => ExprToken::LeftParen,
            ')' => ExprToken::RightParen,
            c if c.is_ascii_alphanumeric() => {
                let mut ident = c.to_string();
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphanumeric() {
                        break;
                    }
                    ident.push(next);
                    chars.next();
                }
                ExprToken::Ident(ident)
            }
            c => return Err(format!("unexpected character {:?}", c)),
        };
        tokens.push(token);
    }
    tokens.push(ExprToken::Eof);

    Ok(tokens)
}

/// Computes, for each non-terminal, the depth of its shallowest complete
/// derivation.
fn derivation_heights(rules: &RuleSet) -> HashMap<NonTerminal, usize> {
    let mut heights: HashMap<NonTerminal, usize> = HashMap::new();

    let mut changed = true;
    while changed {
        changed = false;

        for production in rules.productions() {
            let height = production
                .rhs
                .iter()
                .map(|symbol| match symbol {
                    Symbol::Terminal(_) => Some(0),
                    Symbol::NonTerminal(nt) => heights.get(nt).copied(),
                })
                .try_fold(0, |max, height| height.map(|h| max.max(h)))
                .map(|h| h + 1);

            if let Some(height) = height {
                let current = heights.entry(production.lhs).or_insert(usize::MAX);
                if height < *current {
                    *current = height;
                    changed = true;
                }
            }
        }
    }

    heights
}

/// Returns true if every non-terminal of `rules` derives at least one
/// sentence.
pub fn derives_sentences(rules: &RuleSet) -> bool {
    let heights = derivation_heights(rules);

    rules.non_terminals().all(|nt| heights.contains_key(&nt))
}

/// Generates a sentence of `rules` by leftmost derivation from `start`.
///
/// While fewer than `budget` expansions have been made, each alternative is
/// picked by cycling through `choices`. Past the budget the alternative with
/// the shallowest derivation is taken, so generation always terminates on a
/// grammar where every non-terminal derives some sentence.
pub fn generate_sentence(
    rules: &RuleSet,
    start: NonTerminal,
    choices: &[usize],
    budget: usize,
) -> Vec<Terminal> {
    let heights = derivation_heights(rules);
    let height_of = |symbol: &Symbol| match symbol {
        Symbol::Terminal(_) => 0,
        Symbol::NonTerminal(nt) => heights.get(nt).copied().unwrap_or(usize::MAX),
    };

    let mut sentence = vec![];
    let mut stack = vec![Symbol::NonTerminal(start)];
    let mut expansions = 0;

    while let Some(symbol) = stack.pop() {
        let non_terminal = match symbol {
            Symbol::Terminal(Terminal::Epsilon) => continue,
            Symbol::Terminal(terminal) => {
                sentence.push(terminal);
                continue;
            }
            Symbol::NonTerminal(nt) => nt,
        };

        let alternatives = rules.alternatives(&non_terminal).collect::<Vec<_>>();
        if alternatives.is_empty() {
            continue;
        }

        let production = if expansions < budget && !choices.is_empty() {
            alternatives[choices[expansions % choices.len()] % alternatives.len()]
        } else {
            let shallowest = alternatives
                .iter()
                .copied()
                .min_by_key(|production| production.rhs.iter().map(height_of).max());
            match shallowest {
                Some(production) => production,
                None => continue,
            }
        };
        expansions += 1;

        stack.extend(production.rhs.iter().rev().copied());
    }

    sentence
}

#[cfg(test)]
mod tests {
    use super::*;
    use ll_core::TerminalRepresentable;

    #[test]
    fn should_lex_identifiers_and_operators() {
        let tokens = lex_expression("ab + (c1)").unwrap();

        assert_eq!(
            vec![
                ExprToken::Ident("ab".to_string()),
                ExprToken::Plus,
                ExprToken::LeftParen,
                ExprToken::Ident("c1".to_string()),
                ExprToken::RightParen,
                ExprToken::Eof,
            ],
            tokens
        );
        assert_eq!(Terminal::Char('i'), tokens[0].to_terminal());
        assert_eq!(Terminal::Eof, tokens[5].to_terminal());
    }

    #[test]
    fn should_detect_non_terminals_without_sentences() {
        let productive = RuleSet::from_spec(EXPRESSION_GRAMMAR).unwrap();
        let looping = RuleSet::from_spec("S->aA|b\nA->aA").unwrap();

        assert!(derives_sentences(&productive));
        assert!(!derives_sentences(&looping));
    }

    #[test]
    fn should_generate_shortest_sentence_without_budget() {
        let rules = RuleSet::from_spec(EXPRESSION_GRAMMAR).unwrap();

        let sentence = generate_sentence(&rules, expression_start(), &[], 0);

        assert_eq!(vec![Terminal::Char('i')], sentence);
    }
}
