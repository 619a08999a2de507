//! Small C functions over `int`, written as statement trees.
//!
//! Every fixture asks one question of the engine. Probes sit where the
//! question is asked, e.g. "is this reachable?" or "what values can y have
//! here?".

use crate::{ast::*, ty::Type};

const INT: Type = Type::I32;

/// ```c
/// int s_algebra(int x, int y) {
///     x = y + 4;
///     y = 2*x;
///     int w = (x*4) + y;
///     return w;
/// }
/// ```
pub fn s_algebra() -> FunctionDef {
    FunctionDef::new("s_algebra")
        .param("x", INT)
        .param("y", INT)
        .returns(INT)
        .body(vec![
            assign("x", var("y") + lit(4)),
            assign("y", lit(2) * var("x")),
            declare("w", INT, (var("x") * lit(4)) + var("y")),
            probe("values"),
            ret(var("w")),
        ])
}

/// `w = x / y` where the divisor is zero for `y = -4` (and, by wrap-around,
/// for `y = 2^31 - 4`).
pub fn b_algebra() -> FunctionDef {
    FunctionDef::new("b_algebra")
        .param("x", INT)
        .param("y", INT)
        .returns(INT)
        .body(vec![
            assign("x", var("y") + lit(4)),
            assign("y", lit(2) * var("x")),
            declare("w", INT, var("x") / var("y")),
            probe("division"),
            ret(var("w")),
        ])
}

fn if_chain(name: &str, first: Expr) -> FunctionDef {
    FunctionDef::new(name)
        .param("x", INT)
        .param("y", INT)
        .returns(INT)
        .body(vec![
            assign("y", lit(2)),
            if_else(
                first,
                vec![assign("x", lit(4))],
                vec![if_else(
                    var("x").gt(lit(4)),
                    vec![assign("x", lit(2))],
                    vec![assign("y", lit(0)), probe("else")],
                )],
            ),
            ret(var("y")),
        ])
}

/// `x < 4 / x > 4 / else`: the else is reached by `x == 4`.
pub fn s_if_stmt() -> FunctionDef {
    if_chain("s_if_stmt", var("x").lt(lit(4)))
}

/// `x <= 4 / x > 4 / else`: the else is unreachable.
pub fn b_if_stmt() -> FunctionDef {
    if_chain("b_if_stmt", var("x").le(lit(4)))
}

/// ```c
/// int b(int x, int y) {
///     x = y * 2;
///     if (x == 6) {
///         y = y + 3;
///         if (y > 2) {
///             y = y + 2;
///         }
///     } else {
///         y = y + 4;
///     }
///     return y - 8;
/// }
/// ```
pub fn b() -> FunctionDef {
    FunctionDef::new("b")
        .param("x", INT)
        .param("y", INT)
        .returns(INT)
        .body(vec![
            assign("x", var("y") * lit(2)),
            if_else(
                var("x")._eq(lit(6)),
                vec![
                    assign("y", var("y") + lit(3)),
                    if_then(var("y").gt(lit(2)), vec![assign("y", var("y") + lit(2)), probe("inner")]),
                ],
                vec![assign("y", var("y") + lit(4))],
            ),
            probe("end"),
            ret(var("y") - lit(8)),
        ])
}

/// The inner `x > 5` contradicts the outer `x < 5`.
pub fn s2_if_stmt() -> FunctionDef {
    FunctionDef::new("s2_if_stmt")
        .param("x", INT)
        .param("y", INT)
        .returns(INT)
        .body(vec![
            if_then(
                var("x").lt(lit(5)),
                vec![
                    if_then(var("x").gt(lit(5)), vec![assign("y", var("x"))]),
                    assign("x", var("y") * lit(2)),
                    probe("after_inner"),
                ],
            ),
            ret(var("x") - (var("y") * lit(2))),
        ])
}

/// Like [`s2_if_stmt`] with `x >= 5`, asking which values `y` has.
pub fn b2_if_stmt() -> FunctionDef {
    FunctionDef::new("b2_if_stmt")
        .param("x", INT)
        .param("y", INT)
        .returns(INT)
        .body(vec![
            if_then(
                var("x").lt(lit(5)),
                vec![
                    if_then(var("x").ge(lit(5)), vec![assign("y", var("x"))]),
                    assign("y", var("y") + lit(1)),
                    probe("y_values"),
                ],
            ),
            ret(var("y")),
        ])
}

fn counting_loop(name: &str, cond: Expr) -> FunctionDef {
    FunctionDef::new(name)
        .param("n", INT)
        .returns(INT)
        .body(vec![
            declare("i", INT, lit(0)),
            declare("j", INT, lit(1)),
            while_loop(
                cond,
                vec![assign("j", var("j") * lit(2)), assign("i", var("i") + lit(1))],
            ),
            probe("after_loop"),
            ret(var("i") - var("n")),
        ])
}

/// `while (i < n)`: leaves the loop with `i == max(n, 0)`.
pub fn s_loop() -> FunctionDef {
    counting_loop("s_loop", var("i").lt(var("n")))
}

/// `while (i <= n)`: one more iteration than [`s_loop`].
pub fn b_loop() -> FunctionDef {
    counting_loop("b_loop", var("i").le(var("n")))
}

fn nested_if_loop(name: &str, increment_first: bool) -> FunctionDef {
    let reset = if_then(var("i")._eq(lit(3)), vec![assign("j", lit(0))]);
    let increment = assign("i", var("i") + lit(1));
    let body = if increment_first {
        vec![increment, reset]
    } else {
        vec![reset, increment]
    };
    FunctionDef::new(name)
        .param("a", INT)
        .returns(INT)
        .body(vec![
            declare("i", INT, lit(0)),
            declare("j", INT, lit(3)),
            while_loop(var("i").lt(lit(3)), body),
            ret(var("j")),
        ])
}

/// The `i == 3` test inside `while (i < 3)` never holds; returns 3.
pub fn s_nested_if_loop() -> FunctionDef {
    nested_if_loop("s_nested_if_loop", false)
}

/// Increments before testing `i == 3`; returns 0.
pub fn b_nested_if_loop() -> FunctionDef {
    nested_if_loop("b_nested_if_loop", true)
}

/// `i` never changes inside `while (i < n)`.
pub fn b_inf_loop() -> FunctionDef {
    FunctionDef::new("b_inf_loop")
        .param("n", INT)
        .returns(INT)
        .body(vec![
            declare("i", INT, lit(0)),
            declare("j", INT, lit(1)),
            while_loop(var("i").lt(var("n")), vec![assign("j", var("j") * lit(2))]),
            ret(var("i")),
        ])
}

/// Every fixture, by name.
pub fn all() -> Vec<(&'static str, FunctionDef)> {
    vec![
        ("s_algebra", s_algebra()),
        ("b_algebra", b_algebra()),
        ("s_if_stmt", s_if_stmt()),
        ("b_if_stmt", b_if_stmt()),
        ("b", b()),
        ("s2_if_stmt", s2_if_stmt()),
        ("b2_if_stmt", b2_if_stmt()),
        ("s_loop", s_loop()),
        ("b_loop", b_loop()),
        ("s_nested_if_loop", s_nested_if_loop()),
        ("b_nested_if_loop", b_nested_if_loop()),
        ("b_inf_loop", b_inf_loop()),
    ]
}

pub fn by_name(name: &str) -> Option<FunctionDef> {
    all().into_iter().find(|(n, _)| *n == name).map(|(_, def)| def)
}
