//! Symbolic values.
//!
//! A [`Value`] is an immutable expression tree over input symbols. Trees are
//! reference counted, so forking a state only copies pointers. The smart
//! constructors fold constant operands, which keeps the expressions that end
//! up in reports readable (`x = 2 + 3` stores `5`, not `(2 + 3)`).

use std::{
  collections::BTreeMap,
  fmt,
  ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Not, Rem, Sub},
  sync::Arc,
};

use num::{BigInt, Integer, ToPrimitive};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::ty::Type;

/// Integer operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  BitAnd,
  BitOr,
  BitXor,
}

impl BinOp {
  pub fn symbol(self) -> &'static str {
    match self {
      BinOp::Add => "+",
      BinOp::Sub => "-",
      BinOp::Mul => "*",
      BinOp::Div => "/",
      BinOp::Rem => "%",
      BinOp::BitAnd => "&",
      BinOp::BitOr => "|",
      BinOp::BitXor => "^",
    }
  }

  /// Division and remainder trap on a zero divisor.
  pub fn has_divisor(self) -> bool {
    matches!(self, BinOp::Div | BinOp::Rem)
  }

  /// Operators whose exact result can leave the range of the operand type.
  pub fn can_overflow(self) -> bool {
    matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
  }
}

/// Integer comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CmpOp {
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Ne,
}

impl CmpOp {
  pub fn symbol(self) -> &'static str {
    match self {
      CmpOp::Lt => "<",
      CmpOp::Le => "<=",
      CmpOp::Gt => ">",
      CmpOp::Ge => ">=",
      CmpOp::Eq => "==",
      CmpOp::Ne => "!=",
    }
  }
}

/// Boolean connectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LogicOp {
  And,
  Or,
}

impl LogicOp {
  pub fn symbol(self) -> &'static str {
    match self {
      LogicOp::And => "&&",
      LogicOp::Or => "||",
    }
  }
}

/// The nodes of a symbolic expression.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum Node {
  Int { value: i128, ty: Type },
  Bool(bool),
  /// An unconstrained input.
  Symbol { name: String, ty: Type },
  Binary { op: BinOp, lhs: Value, rhs: Value },
  Compare { op: CmpOp, lhs: Value, rhs: Value },
  Not(Value),
  Logic { op: LogicOp, lhs: Value, rhs: Value },
  /// True iff the exact result of `lhs op rhs` is outside the operand type.
  Overflows { op: BinOp, lhs: Value, rhs: Value },
}

/// Symbolic values, i.e., expressions over input symbols.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value(Arc<Node>);

/// A concrete value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Concrete {
  Int(i128),
  Bool(bool),
}

impl fmt::Display for Concrete {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Concrete::Int(v) => write!(f, "{}", v),
      Concrete::Bool(b) => write!(f, "{}", b),
    }
  }
}

/// Concrete values for input symbols, e.g. a model returned by the solver.
///
/// Symbols missing from the assignment evaluate to zero (or false), matching
/// model completion in the solver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Assignment(pub BTreeMap<String, i128>);

impl Assignment {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, symbol: impl Into<String>, value: i128) -> Self {
    self.0.insert(symbol.into(), value);
    self
  }

  pub fn get(&self, symbol: &str) -> Option<i128> {
    self.0.get(symbol).copied()
  }

  pub fn insert(&mut self, symbol: impl Into<String>, value: i128) {
    self.0.insert(symbol.into(), value);
  }
}

impl fmt::Display for Assignment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use itertools::Itertools;
    write!(f, "{{{}}}", self.0.iter().map(|(k, v)| format!("{} = {}", k, v)).format(", "))
  }
}

/// Errors of concrete evaluation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
  #[error("division by zero in {expr}")]
  DivisionByZero { expr: String },
}

impl Value {
  fn new(node: Node) -> Self {
    Value(Arc::new(node))
  }

  pub fn node(&self) -> &Node {
    &self.0
  }

  /// An integer constant, reduced into the range of `ty`.
  pub fn int(value: i128, ty: Type) -> Self {
    Self::new(Node::Int { value: ty.wrap(value), ty })
  }

  pub fn bool(b: bool) -> Self {
    Self::new(Node::Bool(b))
  }

  /// A fresh input symbol.
  pub fn symbol(name: impl Into<String>, ty: Type) -> Self {
    Self::new(Node::Symbol { name: name.into(), ty })
  }

  pub fn ty(&self) -> Type {
    match self.node() {
      Node::Int { ty, .. } | Node::Symbol { ty, .. } => *ty,
      Node::Binary { lhs, .. } => lhs.ty(),
      Node::Bool(_) | Node::Compare { .. } | Node::Not(_) | Node::Logic { .. } | Node::Overflows { .. } => Type::Bool,
    }
  }

  pub fn as_int(&self) -> Option<i128> {
    match self.node() {
      Node::Int { value, .. } => Some(*value),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self.node() {
      Node::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn is_constant(&self) -> bool {
    matches!(self.node(), Node::Int { .. } | Node::Bool(_))
  }

  /// `lhs op rhs`. Both operands must have the same integer type.
  pub fn binary(op: BinOp, lhs: Value, rhs: Value) -> Self {
    debug_assert_eq!(lhs.ty(), rhs.ty());
    let ty = lhs.ty();
    match (lhs.as_int(), rhs.as_int()) {
      (Some(a), Some(b)) => {
        if let Some(v) = apply(op, ty, a, b) {
          return Value::int(v, ty);
        }
      }
      (_, Some(0)) if matches!(op, BinOp::Add | BinOp::Sub | BinOp::BitOr | BinOp::BitXor) => return lhs,
      (Some(0), _) if matches!(op, BinOp::Add | BinOp::BitOr | BinOp::BitXor) => return rhs,
      (_, Some(1)) if matches!(op, BinOp::Mul | BinOp::Div) => return lhs,
      (Some(1), _) if op == BinOp::Mul => return rhs,
      _ => {}
    }
    Self::new(Node::Binary { op, lhs, rhs })
  }

  pub fn compare(op: CmpOp, lhs: Value, rhs: Value) -> Self {
    debug_assert_eq!(lhs.ty(), rhs.ty());
    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
      return Value::bool(compare(op, a, b));
    }
    Self::new(Node::Compare { op, lhs, rhs })
  }

  pub fn logic(op: LogicOp, lhs: Value, rhs: Value) -> Self {
    match (op, lhs.as_bool(), rhs.as_bool()) {
      (LogicOp::And, Some(false), _) | (LogicOp::And, _, Some(false)) => Value::bool(false),
      (LogicOp::Or, Some(true), _) | (LogicOp::Or, _, Some(true)) => Value::bool(true),
      (_, Some(_), _) => rhs,
      (_, _, Some(_)) => lhs,
      _ => Self::new(Node::Logic { op, lhs, rhs }),
    }
  }

  /// The condition under which `lhs op rhs` leaves the range of its type.
  pub fn overflows(op: BinOp, lhs: Value, rhs: Value) -> Self {
    debug_assert!(op.can_overflow());
    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
      if let Some(exact) = exact(op, a, b) {
        return Value::bool(!fits(lhs.ty(), &exact));
      }
    }
    Self::new(Node::Overflows { op, lhs, rhs })
  }

  pub fn lt(self, rhs: Self) -> Self {
    Self::compare(CmpOp::Lt, self, rhs)
  }

  pub fn le(self, rhs: Self) -> Self {
    Self::compare(CmpOp::Le, self, rhs)
  }

  pub fn gt(self, rhs: Self) -> Self {
    Self::compare(CmpOp::Gt, self, rhs)
  }

  pub fn ge(self, rhs: Self) -> Self {
    Self::compare(CmpOp::Ge, self, rhs)
  }

  pub fn _eq(self, rhs: Self) -> Self {
    Self::compare(CmpOp::Eq, self, rhs)
  }

  pub fn neq(self, rhs: Self) -> Self {
    Self::compare(CmpOp::Ne, self, rhs)
  }

  pub fn and(self, rhs: Self) -> Self {
    Self::logic(LogicOp::And, self, rhs)
  }

  pub fn or(self, rhs: Self) -> Self {
    Self::logic(LogicOp::Or, self, rhs)
  }

  /// The input symbols occurring in `self`, with their types.
  pub fn symbols(&self) -> BTreeMap<String, Type> {
    fn collect(v: &Value, acc: &mut BTreeMap<String, Type>) {
      match v.node() {
        Node::Int { .. } | Node::Bool(_) => {}
        Node::Symbol { name, ty } => {
          acc.insert(name.clone(), *ty);
        }
        Node::Not(x) => collect(x, acc),
        Node::Binary { lhs, rhs, .. }
        | Node::Compare { lhs, rhs, .. }
        | Node::Logic { lhs, rhs, .. }
        | Node::Overflows { lhs, rhs, .. } => {
          collect(lhs, acc);
          collect(rhs, acc);
        }
      }
    }
    let mut acc = BTreeMap::new();
    collect(self, &mut acc);
    acc
  }

  /// Evaluate under concrete inputs, with the wrap-around semantics of the
  /// fixed-width types.
  pub fn evaluate(&self, env: &Assignment) -> Result<Concrete, EvalError> {
    Ok(match self.node() {
      Node::Int { value, .. } => Concrete::Int(*value),
      Node::Bool(b) => Concrete::Bool(*b),
      Node::Symbol { name, ty } => match ty {
        Type::Bool => Concrete::Bool(env.get(name).unwrap_or(0) != 0),
        ty => Concrete::Int(ty.wrap(env.get(name).unwrap_or(0))),
      },
      Node::Binary { op, lhs, rhs } => {
        let (a, b) = (lhs.evaluate_int(env)?, rhs.evaluate_int(env)?);
        match apply(*op, lhs.ty(), a, b) {
          Some(v) => Concrete::Int(v),
          None => return Err(EvalError::DivisionByZero { expr: self.to_string() }),
        }
      }
      Node::Compare { op, lhs, rhs } => Concrete::Bool(compare(*op, lhs.evaluate_int(env)?, rhs.evaluate_int(env)?)),
      Node::Not(x) => Concrete::Bool(!x.evaluate_bool(env)?),
      Node::Logic { op, lhs, rhs } => {
        let (a, b) = (lhs.evaluate_bool(env)?, rhs.evaluate_bool(env)?);
        Concrete::Bool(match op {
          LogicOp::And => a && b,
          LogicOp::Or => a || b,
        })
      }
      Node::Overflows { op, lhs, rhs } => {
        let (a, b) = (lhs.evaluate_int(env)?, rhs.evaluate_int(env)?);
        match exact(*op, a, b) {
          Some(r) => Concrete::Bool(!fits(lhs.ty(), &r)),
          None => return Err(EvalError::DivisionByZero { expr: self.to_string() }),
        }
      }
    })
  }

  pub fn evaluate_int(&self, env: &Assignment) -> Result<i128, EvalError> {
    match self.evaluate(env)? {
      Concrete::Int(v) => Ok(v),
      Concrete::Bool(b) => Ok(b as i128),
    }
  }

  pub fn evaluate_bool(&self, env: &Assignment) -> Result<bool, EvalError> {
    match self.evaluate(env)? {
      Concrete::Bool(b) => Ok(b),
      Concrete::Int(v) => Ok(v != 0),
    }
  }
}

// The exact (unbounded) result of an arithmetic operation, `None` on a zero divisor.
fn exact(op: BinOp, a: i128, b: i128) -> Option<BigInt> {
  let (x, y) = (BigInt::from(a), BigInt::from(b));
  Some(match op {
    BinOp::Add => x + y,
    BinOp::Sub => x - y,
    BinOp::Mul => x * y,
    // truncating, like the hardware and the solver's bvsdiv/bvsrem
    BinOp::Div if b == 0 => return None,
    BinOp::Div => x / y,
    BinOp::Rem if b == 0 => return None,
    BinOp::Rem => x % y,
    BinOp::BitAnd => BigInt::from(a & b),
    BinOp::BitOr => BigInt::from(a | b),
    BinOp::BitXor => BigInt::from(a ^ b),
  })
}

fn fits(ty: Type, v: &BigInt) -> bool {
  *v >= BigInt::from(ty.min()) && *v <= BigInt::from(ty.max())
}

// Apply `op` with wrap-around in `ty`.
fn apply(op: BinOp, ty: Type, a: i128, b: i128) -> Option<i128> {
  let r = exact(op, a, b)?;
  let modulus = BigInt::from(1) << ty.bits() as usize;
  let low = r.mod_floor(&modulus).to_i128()?;
  Some(ty.wrap(low))
}

fn compare(op: CmpOp, a: i128, b: i128) -> bool {
  match op {
    CmpOp::Lt => a < b,
    CmpOp::Le => a <= b,
    CmpOp::Gt => a > b,
    CmpOp::Ge => a >= b,
    CmpOp::Eq => a == b,
    CmpOp::Ne => a != b,
  }
}

impl Add for Value {
  type Output = Self;
  fn add(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::Add, self, rhs)
  }
}

impl Sub for Value {
  type Output = Self;
  fn sub(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::Sub, self, rhs)
  }
}

impl Mul for Value {
  type Output = Self;
  fn mul(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::Mul, self, rhs)
  }
}

impl Div for Value {
  type Output = Self;
  fn div(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::Div, self, rhs)
  }
}

impl Rem for Value {
  type Output = Self;
  fn rem(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::Rem, self, rhs)
  }
}

impl BitAnd for Value {
  type Output = Self;
  fn bitand(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::BitAnd, self, rhs)
  }
}

impl BitOr for Value {
  type Output = Self;
  fn bitor(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::BitOr, self, rhs)
  }
}

impl BitXor for Value {
  type Output = Self;
  fn bitxor(self, rhs: Self) -> Self::Output {
    Value::binary(BinOp::BitXor, self, rhs)
  }
}

/// Boolean negation.
impl Not for Value {
  type Output = Self;
  fn not(self) -> Self::Output {
    match self.node() {
      Node::Bool(b) => Value::bool(!b),
      Node::Not(x) => x.clone(),
      _ => Value::new(Node::Not(self)),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.node() {
      Node::Int { value, .. } => write!(f, "{}", value),
      Node::Bool(b) => write!(f, "{}", b),
      Node::Symbol { name, .. } => write!(f, "{}", name),
      Node::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
      Node::Compare { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
      Node::Not(x) => write!(f, "!{}", x),
      Node::Logic { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
      Node::Overflows { op, lhs, rhs } => write!(f, "overflows({} {} {})", lhs, op.symbol(), rhs),
    }
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn y() -> Value {
    Value::symbol("y_0", Type::I32)
  }

  fn c(v: i128) -> Value {
    Value::int(v, Type::I32)
  }

  #[test]
  fn composes_symbolically() {
    let x = y() + c(4);
    assert_eq!(x.to_string(), "(y_0 + 4)");
    let y1 = c(2) * x.clone();
    assert_eq!(y1.to_string(), "(2 * (y_0 + 4))");
    assert_eq!((x / y1).ty(), Type::I32);
  }

  #[test]
  fn folds_constants() {
    assert_eq!(c(2) + c(3), c(5));
    assert_eq!(c(i32::MAX as i128) + c(1), c(i32::MIN as i128));
    assert_eq!(y() + c(0), y());
    assert_eq!(c(1) * y(), y());
    assert_eq!(c(3).lt(c(4)), Value::bool(true));
    assert_eq!(!!y().lt(c(4)), y().lt(c(4)));
    assert_eq!(Value::bool(true).and(y().lt(c(1))), y().lt(c(1)));
  }

  #[test]
  fn division_by_constant_zero_is_not_folded() {
    let v = c(4) / c(0);
    assert!(!v.is_constant());
    assert!(matches!(v.evaluate(&Assignment::new()), Err(EvalError::DivisionByZero { .. })));
  }

  #[test]
  fn evaluates_with_truncating_division() {
    let env = Assignment::new().with("y_0", -7);
    assert_eq!((y() / c(2)).evaluate_int(&env), Ok(-3));
    assert_eq!((y() % c(2)).evaluate_int(&env), Ok(-1));
    assert_eq!(y().ge(c(-7)).evaluate_bool(&env), Ok(true));
  }

  #[test]
  fn unsigned_wraps() {
    let u = Value::symbol("u_0", Type::U8);
    let env = Assignment::new().with("u_0", 250);
    assert_eq!((u.clone() + Value::int(10, Type::U8)).evaluate_int(&env), Ok(4));
    let big = Value::symbol("w_0", Type::U64);
    let env = Assignment::new().with("w_0", u64::MAX as i128);
    assert_eq!((big.clone() * big).evaluate_int(&env), Ok(1));
  }

  #[test]
  fn overflow_predicate() {
    let env = Assignment::new().with("y_0", i32::MAX as i128);
    assert_eq!(Value::overflows(BinOp::Add, y(), c(1)).evaluate_bool(&env), Ok(true));
    assert_eq!(Value::overflows(BinOp::Sub, y(), c(1)).evaluate_bool(&env), Ok(false));
    assert_eq!(Value::overflows(BinOp::Div, c(i32::MIN as i128), c(-1)), Value::bool(true));
  }

  #[test]
  fn collects_symbols() {
    let v = (y() + Value::symbol("x_0", Type::I32)).lt(c(3));
    assert_eq!(v.symbols().keys().cloned().collect::<Vec<_>>(), vec!["x_0", "y_0"]);
  }
}
