use ll_core::prelude::v1::*;
use ll_tests::{expression_start, lex_expression, EXPRESSION_GRAMMAR};

const PARSERS: [ParserKind; 2] = [ParserKind::Backtracking, ParserKind::Ll1];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn expression_grammar() -> Grammar {
    let rules = RuleSet::from_spec(EXPRESSION_GRAMMAR).unwrap();

    Grammar::new(rules, expression_start()).unwrap()
}

fn parse(grammar: &Grammar, kind: ParserKind, input: &str) -> ParseOutcome {
    let tokens = read_sentence(input, grammar.rules().convention());

    grammar.parse(kind, &tokens).unwrap()
}

fn nt(c: char) -> NonTerminal {
    NonTerminal::new(c).unwrap()
}

#[test]
fn should_parse_simple_sum_with_either_parser() {
    init_logger();
    let grammar = expression_grammar();

    for kind in PARSERS {
        let outcome = parse(&grammar, kind, "i+i");

        assert!(outcome.is_success(), "{:?}: {:?}", kind, outcome.error());
        // every input token is matched exactly once.
        assert_eq!(
            vec![Terminal::Char('i'), Terminal::Char('+'), Terminal::Char('i')],
            outcome.trace.matched().collect::<Vec<_>>()
        );
    }
}

#[test]
fn should_reject_dangling_operators() {
    init_logger();
    let grammar = expression_grammar();

    let ll = parse(&grammar, ParserKind::Ll1, "i+i*i**");
    let err = ll.error().unwrap();
    assert_eq!(ParseErrorKind::NoProduction, err.kind());
    assert_eq!(6, err.index());
    assert_eq!(Some(nt('F')), err.non_terminal());
    assert_eq!(Some(Position::new(1, 7)), err.position());

    let backtracking = parse(&grammar, ParserKind::Backtracking, "i+i*i**");
    let err = backtracking.error().unwrap();
    assert_eq!(ParseErrorKind::TrailingInput, err.kind());
    assert_eq!(5, err.index());
}

#[test]
fn should_expand_parenthesized_expression_before_matching() {
    init_logger();
    let grammar = expression_grammar();

    for kind in PARSERS {
        let outcome = parse(&grammar, kind, "(i-i)");
        assert!(outcome.is_success(), "{:?}: {:?}", kind, outcome.error());

        let steps = outcome.trace.steps();
        let paren = steps
            .iter()
            .position(|step| step.to_string() == "F -> (E)")
            .unwrap();

        assert_eq!(Step::Match(Terminal::Char('(')), steps[paren + 1]);
        assert_eq!(
            1,
            outcome
                .trace
                .expansions()
                .filter(|(origin, rhs)| *origin == nt('F') && rhs.len() == 3)
                .count()
        );
        assert_eq!(Some(Terminal::Char(')')), outcome.trace.matched().last());
    }
}

#[test]
fn should_produce_identical_traces_for_accepted_sentences() {
    init_logger();
    let grammar = expression_grammar();

    for input in ["i", "i/i", "(i-i)", "i*(i-i)/(i+i)*((i+i-i*i/i))"] {
        let backtracking = parse(&grammar, ParserKind::Backtracking, input);
        let ll = parse(&grammar, ParserKind::Ll1, input);

        assert!(backtracking.is_success(), "{}", input);
        assert!(ll.is_success(), "{}", input);
        assert_eq!(backtracking.trace, ll.trace, "{}", input);
    }
}

#[test]
fn should_require_every_token_to_be_consumed() {
    init_logger();
    let grammar = expression_grammar();

    for kind in PARSERS {
        for input in ["i)", "(i))", "ii"] {
            let outcome = parse(&grammar, kind, input);

            assert!(!outcome.is_success(), "{:?}: {}", kind, input);
        }
    }
}

#[test]
fn should_report_premature_end_of_input() {
    init_logger();
    let grammar = expression_grammar();

    for kind in PARSERS {
        for input in ["", "(", "(i+i"] {
            let outcome = parse(&grammar, kind, input);

            assert_eq!(
                Some(ParseErrorKind::PrematureEndOfInput),
                outcome.error().map(|e| e.kind()),
                "{:?}: {:?}",
                kind,
                input
            );
        }
    }
}

#[test]
fn should_regress_first_and_follow_fixtures() {
    init_logger();
    let grammar = expression_grammar();
    let first = grammar.first_set();
    let follow = grammar.follow_set();

    let first_of_f = first.get(&nt('F')).unwrap();
    assert_eq!(2, first_of_f.len());
    assert!(first_of_f.contains(&Terminal::Char('i')));
    assert!(first_of_f.contains(&Terminal::Char('(')));

    let follow_of_e = follow.get(&nt('E')).unwrap();
    assert_eq!(2, follow_of_e.len());
    assert!(follow_of_e.contains(&Terminal::Char(')')));
    assert!(follow_of_e.contains(&Terminal::Eof));
}

#[test]
fn should_parse_lexed_tokens_with_explicit_eof() {
    init_logger();
    let grammar = expression_grammar();
    let tokens = lex_expression("alpha * (beta - 42)").unwrap();

    for kind in PARSERS {
        let outcome = grammar.parse(kind, &tokens).unwrap();

        assert!(outcome.is_success(), "{:?}: {:?}", kind, outcome.error());
    }
}

#[test]
fn should_accept_explicit_eof_sentinel_in_sentence() {
    init_logger();
    let grammar = expression_grammar();

    for kind in PARSERS {
        assert!(parse(&grammar, kind, "i+i$").is_success());
        assert!(!parse(&grammar, kind, "i$+i").is_success());
    }
}

#[test]
fn should_parse_long_sentences_without_growing_the_call_stack() {
    init_logger();
    let grammar = expression_grammar();
    // 100_001 tokens.
    let input = format!("{}i", "i+".repeat(50_000));

    let outcome = parse(&grammar, ParserKind::Backtracking, &input);

    assert!(outcome.is_success(), "{:?}", outcome.error());
    assert_eq!(100_001, outcome.trace.matched().count());

    let nested = format!("{}i{}", "(".repeat(2_000), ")".repeat(2_000));
    for kind in PARSERS {
        assert!(parse(&grammar, kind, &nested).is_success(), "{:?}", kind);
    }
}

#[test]
fn should_treat_mid_sentence_eof_token_as_unexpected() {
    init_logger();
    let grammar = expression_grammar();

    let ll = parse(&grammar, ParserKind::Ll1, "($i)");
    assert_eq!(Some(ParseErrorKind::NoProduction), ll.error().map(|e| e.kind()));

    let backtracking = parse(&grammar, ParserKind::Backtracking, "($i)");
    assert_eq!(
        Some(ParseErrorKind::UnexpectedToken),
        backtracking.error().map(|e| e.kind())
    );

    for outcome in [ll, backtracking] {
        assert_eq!(Some(1), outcome.error().map(|e| e.index()));
    }
}
