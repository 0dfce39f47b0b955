// crates/kaleido_codegen/tests/jit.rs
//
// End-to-end compile-and-run through the unit manager.

use kaleido_codegen::{Codegen, CodegenError, CodegenResult, JitConfig, OptLevel, UnitManager};
use kaleido_frontend::{Parser, PrecedenceTable, TopLevel};

struct Jit {
    units: UnitManager,
    codegen: Codegen,
}

impl Jit {
    fn new() -> Self {
        Self::with_config(JitConfig::default())
    }

    fn with_config(config: JitConfig) -> Self {
        Self {
            units: UnitManager::new(config).expect("host ISA"),
            codegen: Codegen::new(),
        }
    }

    /// Processes every item in `src`; returns the value of the last
    /// top-level expression, if any.
    fn eval_with(&mut self, src: &str, table: PrecedenceTable) -> CodegenResult<Option<f64>> {
        let mut parser = Parser::with_precedence(src, table);
        let mut last = None;
        loop {
            parser.skip_separators();
            if parser.at_eof() {
                return Ok(last);
            }
            let item = parser.parse_top_level().expect("test source parses");
            match item.node {
                TopLevel::Definition(func) => {
                    self.codegen.generate(&func, &mut self.units)?;
                }
                TopLevel::Extern(proto) => {
                    self.units.declare_extern(&proto)?;
                }
                TopLevel::Expression(func) => {
                    let compiled = self.codegen.generate(&func, &mut self.units)?;
                    last = Some(self.units.run(&compiled)?);
                }
            }
        }
    }

    fn eval(&mut self, src: &str) -> CodegenResult<Option<f64>> {
        self.eval_with(src, PrecedenceTable::default())
    }

    fn value(&mut self, src: &str) -> f64 {
        self.eval(src)
            .expect("evaluation succeeds")
            .expect("source ends in an expression")
    }
}

#[test]
fn evaluates_arithmetic_with_precedence() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("3 + 4 * 5;"), 23.0);
    assert_eq!(jit.value("(3 + 4) * 5;"), 35.0);
    assert_eq!(jit.value("2 * 3 * 4;"), 24.0);
}

#[test]
fn subtraction_groups_by_table_precedence() {
    let mut jit = Jit::new();
    // '-' binds tighter than '+'.
    assert_eq!(jit.value("1 + 2 - 3;"), 0.0);
    assert_eq!(jit.value("10 - 4 - 3;"), 3.0);
}

#[test]
fn less_than_yields_one_or_zero() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("1 < 2;"), 1.0);
    assert_eq!(jit.value("2 < 1;"), 0.0);
    assert_eq!(jit.value("2 < 2;"), 0.0);
}

#[test]
fn calls_a_function_defined_in_the_same_unit() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("def foo(x) x + 1; foo(10);"), 11.0);
    assert_eq!(jit.units.engine_count(), 1);
}

#[test]
fn calls_across_units_after_finalization() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("def foo(x) x + 1; foo(1);"), 2.0);
    assert_eq!(jit.units.engine_count(), 1);
    assert!(jit.units.open_unit_name().is_none());

    assert_eq!(jit.value("def baz(y) foo(y) * 2; baz(3);"), 8.0);
    assert_eq!(jit.units.engine_count(), 2);
    assert_eq!(jit.units.engines()[1].unit_name(), "unit_1");
}

#[test]
fn definitions_accumulate_until_an_address_is_needed() {
    let mut jit = Jit::new();
    jit.eval("def a(x) x; def b(x) a(x) + 1;").unwrap();
    assert_eq!(jit.units.engine_count(), 0);
    assert_eq!(jit.units.open_unit_name(), Some("unit_0"));
    assert_eq!(jit.units.unit_count(), 1);

    assert_eq!(jit.value("b(41);"), 42.0);
    assert_eq!(jit.units.engine_count(), 1);
    assert_eq!(jit.units.unit_count(), 1);
}

#[test]
fn nested_calls_compose() {
    let mut jit = Jit::new();
    assert_eq!(
        jit.value("def twice(x) x * 2; def quad(x) twice(twice(x)); quad(3);"),
        12.0
    );
}

#[test]
fn self_calls_resolve_to_the_function_being_defined() {
    let mut jit = Jit::new();
    let func = match Parser::new("def spin(x) spin(x + 1);").parse_top_level().unwrap().node {
        TopLevel::Definition(func) => func,
        other => panic!("expected a definition, got {:?}", other),
    };
    let compiled = jit.codegen.generate(&func, &mut jit.units).unwrap();
    assert_eq!(compiled.symbol, "spin");
    assert!(jit.units.finalize_open_unit().unwrap().is_some());
}

#[test]
fn redefinition_is_rejected_and_leaves_state_intact() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("def foo(x) x + 1; foo(1);"), 2.0);
    let engines = jit.units.engine_count();

    let err = jit.eval("def foo(x) x + 2;").unwrap_err();
    assert_eq!(err, CodegenError::DuplicateDefinition("foo".into()));
    assert_eq!(jit.units.engine_count(), engines);
    assert_eq!(jit.value("foo(1);"), 2.0);
}

#[test]
fn redefinition_in_the_open_unit_is_rejected() {
    let mut jit = Jit::new();
    jit.eval("def foo(x) x;").unwrap();
    let err = jit.eval("def foo(x) x * 2;").unwrap_err();
    assert_eq!(err, CodegenError::DuplicateDefinition("foo".into()));
    assert_eq!(jit.value("foo(5);"), 5.0);
}

#[test]
fn extern_after_definition_is_a_no_op() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("def foo(x) x + 1; foo(1);"), 2.0);
    jit.eval("extern foo(x);").unwrap();
    assert_eq!(jit.units.open_unit_name(), None);
    assert_eq!(jit.value("foo(2);"), 3.0);
}

#[test]
fn extern_with_conflicting_arity_is_rejected() {
    let mut jit = Jit::new();
    jit.eval("def foo(x) x;").unwrap();
    let err = jit.eval("extern foo(a b);").unwrap_err();
    assert_eq!(
        err,
        CodegenError::ArityMismatch {
            name: "foo".into(),
            expected: 1,
            found: 2
        }
    );
}

#[test]
fn arity_mismatch_creates_no_engine() {
    let mut jit = Jit::new();
    jit.eval("def bar(x) x;").unwrap();
    let err = jit.eval("bar(1, 2);").unwrap_err();
    assert_eq!(
        err,
        CodegenError::ArityMismatch {
            name: "bar".into(),
            expected: 1,
            found: 2
        }
    );
    assert_eq!(jit.units.engine_count(), 0);
    assert_eq!(jit.value("bar(7);"), 7.0);
}

#[test]
fn unknown_names_are_reported() {
    let mut jit = Jit::new();
    assert_eq!(
        jit.eval("def f(x) y;").unwrap_err(),
        CodegenError::UnknownVariable("y".into())
    );
    assert_eq!(
        jit.eval("nothere(1);").unwrap_err(),
        CodegenError::UnknownFunction("nothere".into())
    );
    // Failed definitions leave nothing behind: `f` can still be defined.
    assert_eq!(jit.value("def f(x) x; f(4);"), 4.0);
}

#[test]
fn installed_operator_without_codegen_is_invalid() {
    let mut jit = Jit::new();
    let mut table = PrecedenceTable::default();
    table.install('/', 40);
    let err = jit.eval_with("def div(a b) a / b;", table).unwrap_err();
    assert_eq!(err, CodegenError::InvalidOperator('/'));
    assert_eq!(jit.units.engine_count(), 0);
}

#[test]
fn anonymous_expressions_get_distinct_symbols() {
    let mut jit = Jit::new();
    let first = jit
        .codegen
        .generate(&top_level_expr("1;"), &mut jit.units)
        .unwrap();
    let second = jit
        .codegen
        .generate(&top_level_expr("2;"), &mut jit.units)
        .unwrap();
    assert!(first.is_anonymous() && second.is_anonymous());
    assert_ne!(first.symbol, second.symbol);
    assert_eq!(jit.units.run(&second).unwrap(), 2.0);
    // Both lived in the same unit and share its engine.
    assert_eq!(jit.units.run(&first).unwrap(), 1.0);
    assert_eq!(jit.units.engine_count(), 1);
}

#[test]
fn intrinsics_need_an_extern() {
    let mut jit = Jit::new();
    assert_eq!(
        jit.eval("sqrt(16);").unwrap_err(),
        CodegenError::UnknownFunction("sqrt".into())
    );
    assert_eq!(jit.value("extern sqrt(x); sqrt(16);"), 4.0);
    assert_eq!(jit.value("extern fabs(x); fabs(0 - 2.5);"), 2.5);
}

#[test]
fn user_definitions_shadow_intrinsics() {
    let mut jit = Jit::new();
    assert_eq!(jit.value("def cos(x) x + 100; cos(0);"), 100.0);
}

#[test]
fn extern_of_a_later_definition_in_the_same_unit() {
    let mut jit = Jit::new();
    jit.eval("extern later(x); def early(x) later(x) * 3;").unwrap();
    jit.eval("def later(x) x + 1;").unwrap();
    assert_eq!(jit.value("early(1);"), 6.0);
    assert_eq!(jit.units.engine_count(), 1);
}

#[test]
fn forcing_finalization_publishes_the_open_unit() {
    let mut jit = Jit::new();
    assert_eq!(jit.units.finalize_open_unit().unwrap(), None);

    jit.eval("def one() 1;").unwrap();
    assert_eq!(jit.units.finalize_open_unit().unwrap(), Some(0));
    assert!(jit.units.engines()[0].defines("one"));
    assert_eq!(jit.units.closed_units()[0].name(), "unit_0");
    assert!(jit.units.get_address("one").is_ok());
    assert_eq!(
        jit.units.get_address("two").unwrap_err(),
        CodegenError::UnknownSymbol("two".into())
    );
}

#[test]
fn every_opt_level_agrees() {
    for opt_level in [OptLevel::None, OptLevel::Speed, OptLevel::SpeedAndSize] {
        let mut jit = Jit::with_config(JitConfig {
            opt_level,
            ..JitConfig::default()
        });
        assert_eq!(
            jit.value("def f(a b) a * b + (a < b); f(2, 3);"),
            7.0,
            "opt level {:?}",
            opt_level
        );
    }
}

fn top_level_expr(src: &str) -> kaleido_frontend::Function {
    let mut parser = Parser::new(src);
    match parser.parse_top_level().unwrap().node {
        TopLevel::Expression(func) => func,
        other => panic!("expected an expression, got {:?}", other),
    }
}
