mod common;

use common::*;
use loopforge::ir::*;
use loopforge::opt::nest;
use loopforge::{ForgeEngine, ForgeErrorKind, OptConfig};

fn assembly_kernel() -> (Stmt, SymbolTable) {
    let stmt = Stmt::Assign {
        lhs: a2("A", "i", "j"),
        rhs: add(Expr::par(mul(e1("B", "i"), e1("C", "i"))), e1("D", "j")),
    };
    let kernel = nest(&[("i", 10), ("j", 10)], vec![stmt]);
    let mut symbols = SymbolTable::default();
    symbols.insert("A".to_string(), ScalarTy::Double);
    (kernel, symbols)
}

fn assembly_tape() -> Tape {
    let mut tape = Tape::new();
    tape.zeros("A", &[10, 10]);
    tape.ramp("B", &[10]);
    tape.ramp("C", &[10]);
    tape.ramp("D", &[10]);
    tape
}

#[test]
fn full_pipeline_transforms_and_preserves_the_kernel() {
    let (kernel, symbols) = assembly_kernel();
    let engine = ForgeEngine::with_config(OptConfig::default());

    let mut opt = kernel.clone();
    let stats = engine.run(&mut opt, &symbols).unwrap();
    assert_eq!(stats.hoisted_exprs, 1);
    assert_eq!(stats.tiled_loops, 1);
    assert_eq!(stats.unrolled_loops, 1);
    // The tiled inner trip equals the vector width, so peeling only flags.
    assert_eq!(stats.peeled_loops, 0);
    assert_eq!(stats.padded_decls, 0);

    // Still a walkable chain after every pass.
    let shape = nest::explore(&opt).unwrap();
    assert_eq!(shape.vars(), vec!["i", "j_b", "j"]);
    assert_eq!(shape.loops[0].step, 2);

    assert_equivalent(&kernel, &opt, &assembly_tape(), &["A"]);
}

#[test]
fn a_second_run_changes_nothing() {
    let (kernel, symbols) = assembly_kernel();
    let engine = ForgeEngine::with_config(OptConfig::default());

    let mut opt = kernel.clone();
    engine.run(&mut opt, &symbols).unwrap();
    let settled = opt.clone();

    let stats = engine.run(&mut opt, &symbols).unwrap();
    assert_eq!(stats.hoisted_exprs, 0);
    assert_eq!(stats.tiled_loops, 0);
    assert_eq!(stats.unrolled_loops, 0);
    assert_eq!(stats.peeled_loops, 0);
    assert_eq!(stats.padded_decls, 0);
    assert_eq!(opt, settled);
}

#[test]
fn disabled_passes_leave_the_kernel_alone() {
    let (kernel, symbols) = assembly_kernel();
    let engine = ForgeEngine::with_config(OptConfig::passes_off());

    let mut opt = kernel.clone();
    let stats = engine.run(&mut opt, &symbols).unwrap();
    assert_eq!(opt, kernel);
    assert_eq!(stats.hoisted_exprs, 0);
    assert_eq!(stats.tiled_loops, 0);
}

#[test]
fn malformed_kernels_fail_before_any_pass() {
    let symbols = SymbolTable::default();
    // Bare statement under a loop.
    let mut kernel = Stmt::For(For::new(
        "i",
        0,
        4,
        vec![Stmt::Assign {
            lhs: a1("x", "i"),
            rhs: e1("a", "i"),
        }],
    ));
    let engine = ForgeEngine::with_config(OptConfig::passes_off());
    let err = engine.run(&mut kernel, &symbols).unwrap_err();
    assert_eq!(err.kind, ForgeErrorKind::MalformedNest);
    assert_eq!(err.kind.code(), "E0301");
}

#[test]
fn opaque_calls_surface_as_unsupported() {
    let stmt = Stmt::Assign {
        lhs: a2("A", "i", "j"),
        rhs: mul(
            Expr::Call {
                name: "det".to_string(),
                args: vec![e1("J", "i")],
            },
            e1("D", "j"),
        ),
    };
    let mut kernel = nest(&[("i", 10), ("j", 10)], vec![stmt]);
    let before = kernel.clone();
    let symbols = SymbolTable::default();

    let engine = ForgeEngine::with_config(OptConfig::default());
    let err = engine.run(&mut kernel, &symbols).unwrap_err();
    assert_eq!(err.kind, ForgeErrorKind::UnsupportedExpression);
    assert_eq!(err.kind.code(), "E0302");
    assert_eq!(kernel, before);
}
