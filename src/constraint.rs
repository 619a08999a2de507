use std::{
    fmt::{self, Display},
    ops::{BitAnd, BitAndAssign},
};

use itertools::Itertools;
use serde::{Serialize, Serializer};

use crate::value::Value;

/// The conjunction of the constraints a path has assumed so far.
///
/// Conjuncts are kept in the order they were added, so the condition reads
/// like the path that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathCondition {
    conjuncts: Vec<Value>,
}

impl PathCondition {
    /// The trivially true condition.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conjuncts(&self) -> &[Value] {
        &self.conjuncts
    }

    pub fn is_true(&self) -> bool {
        self.conjuncts.is_empty()
    }

    /// The condition as a single boolean value.
    pub fn as_value(&self) -> Value {
        self.conjuncts
            .iter()
            .cloned()
            .fold(Value::bool(true), |acc, c| acc.and(c))
    }

    /// `self && c` as a single value, without extending `self`.
    pub fn and(&self, c: &Value) -> Value {
        self.as_value().and(c.clone())
    }
}

/// Impose another constraint.
impl BitAnd<Value> for PathCondition {
    type Output = Self;

    fn bitand(mut self, rhs: Value) -> Self::Output {
        self &= rhs;
        self
    }
}

impl BitAndAssign<Value> for PathCondition {
    fn bitand_assign(&mut self, rhs: Value) {
        // a constant true adds nothing
        if rhs.as_bool() != Some(true) {
            self.conjuncts.push(rhs);
        }
    }
}

impl Display for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_true() {
            write!(f, "true")
        } else {
            write!(f, "{}", self.conjuncts.iter().format(" && "))
        }
    }
}

impl Serialize for PathCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
