//! Cross-grammar parser tests

use crate::*;

fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_references_in_order() {
    let expr = parse_expression("a.b == 1 && (c || d in [e, 'x'])").unwrap();
    let refs: Vec<_> = expr.references().into_iter().map(|r| r.segments.clone()).collect();
    assert_eq!(
        refs,
        vec![
            path(&["a", "b"]),
            path(&["c"]),
            path(&["d"]),
            path(&["e"]),
        ]
    );
}

#[test]
fn test_word_and_symbol_operators_are_equivalent() {
    let words = parse_expression("not a and b or c").unwrap();
    let symbols = parse_expression("!a && b || c").unwrap();

    // Spans differ, structure must not
    fn shape(expr: &Expr) -> String {
        match expr {
            Expr::Literal { value, .. } => format!("{:?}", value),
            Expr::Path(p) => p.to_string(),
            Expr::List { items, .. } => {
                format!("[{}]", items.iter().map(shape).collect::<Vec<_>>().join(","))
            }
            Expr::Not { operand, .. } => format!("!({})", shape(operand)),
            Expr::And { left, right, .. } => format!("({}&{})", shape(left), shape(right)),
            Expr::Or { left, right, .. } => format!("({}|{})", shape(left), shape(right)),
            Expr::Compare {
                left,
                operator,
                right,
                ..
            } => format!("({}{}{})", shape(left), operator, shape(right)),
            Expr::In {
                needle, haystack, ..
            } => format!("({} in {})", shape(needle), shape(haystack)),
        }
    }

    assert_eq!(shape(&words), shape(&symbols));
    assert_eq!(shape(&words), "((!(a)&b)|c)");
}

#[test]
fn test_literals() {
    let expr = parse_expression("x == 'it\\'s' || y == -2.5 || z == null || w == false").unwrap();
    let text = format!("{:?}", expr);
    assert!(text.contains("String(\"it's\")"));
    assert!(text.contains("Number(-2.5)"));
    assert!(text.contains("Null"));
    assert!(text.contains("Boolean(false)"));
}

#[test]
fn test_expression_rejects_chain_syntax() {
    assert!(parse_expression("a -> b").is_err());
}

#[test]
fn test_chain_rejects_expression_syntax() {
    assert!(parse_action_chain("submit == 1").is_err());
}

#[test]
fn test_lexer_error_surfaces_as_parse_error() {
    let err = parse_expression("a @ b").unwrap_err();
    assert_eq!(
        err.span(),
        Some(TokenSpan::new(2, 3))
    );
    assert!(matches!(err, ParseError::LexError { .. }));
}

#[test]
fn test_success_guard() {
    let chain = parse_action_chain("validate ~ okay -> bummer").unwrap();
    let guard = chain.steps[0].guard().unwrap();
    assert_eq!(guard.kind, GuardKind::OnSuccess);
    assert_eq!(guard.proceeding, Command::Okay);
    assert_eq!(chain.steps[1].command(), &Command::Bummer);
}

#[test]
fn test_guarded_proceeding_may_take_arguments() {
    let chain = parse_action_chain(r#"submit -> reload ~ emit("saved")"#).unwrap();
    assert_eq!(
        chain.steps[1].guard().map(|g| g.proceeding.clone()),
        Some(Command::Emit("saved".to_string()))
    );
}
