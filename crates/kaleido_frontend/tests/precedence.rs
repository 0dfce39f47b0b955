// crates/kaleido_frontend/tests/precedence.rs
//
// Property tests for binary operator grouping.

use kaleido_frontend::{parse_source, Expr, Parser, PrecedenceTable, TopLevel};
use proptest::prelude::*;

fn op_strategy() -> impl Strategy<Value = char> {
    prop_oneof![Just('<'), Just('+'), Just('-'), Just('*')]
}

fn operand() -> impl Strategy<Value = u32> {
    0u32..1000
}

fn num(n: u32) -> Expr {
    Expr::Number(n as f64)
}

proptest! {
    #[test]
    fn three_operands_group_by_table(a in operand(), b in operand(), c in operand(),
                                     op1 in op_strategy(), op2 in op_strategy()) {
        let table = PrecedenceTable::default();
        let src = format!("{} {} {} {} {}", a, op1, b, op2, c);
        let parsed = Parser::new(&src).parse_expression().unwrap();

        let expected = if table.get(op2) > table.get(op1) {
            Expr::binary(op1, num(a), Expr::binary(op2, num(b), num(c)))
        } else {
            Expr::binary(op2, Expr::binary(op1, num(a), num(b)), num(c))
        };
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn same_operator_chains_fold_left(op in op_strategy(),
                                      xs in prop::collection::vec(operand(), 2..8)) {
        let src = xs.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(&format!(" {} ", op));
        let parsed = Parser::new(&src).parse_expression().unwrap();

        let mut iter = xs.iter().copied();
        let first = num(iter.next().unwrap());
        let expected = iter.fold(first, |acc, x| Expr::binary(op, acc, num(x)));
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn parenthesized_display_reparses_to_same_tree(a in operand(), b in operand(), c in operand(),
                                                   d in operand(), op1 in op_strategy(),
                                                   op2 in op_strategy(), op3 in op_strategy()) {
        let src = format!("{} {} {} {} {} {} {}", a, op1, b, op2, c, op3, d);
        let tree = Parser::new(&src).parse_expression().unwrap();
        let again = Parser::new(&tree.to_string()).parse_expression().unwrap();
        prop_assert_eq!(tree, again);
    }
}

#[test]
fn script_with_separators_and_comments() {
    let src = "
        # helpers
        extern putchard(c);
        def inc(x) x + 1;;
        inc(41);
    ";
    let items = parse_source(src).unwrap();
    assert_eq!(items.len(), 3);
    assert!(matches!(items[0].node, TopLevel::Extern(_)));
    assert!(matches!(items[1].node, TopLevel::Definition(_)));
    assert!(matches!(items[2].node, TopLevel::Expression(_)));
}

#[test]
fn ast_serializes_to_json() {
    let items = parse_source("def foo(x) x * 2").unwrap();
    let json = serde_json::to_value(&items[0].node).unwrap();
    assert_eq!(json["Definition"]["proto"]["name"], "foo");
    assert_eq!(json["Definition"]["body"]["Binary"]["op"], "*");
}
