use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    ty::Type,
    value::{BinOp, CmpOp, LogicOp},
};

pub type BlockId = usize;

/// Operands of three-address operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Var(String),
    Int(i128, Type),
    Bool(bool),
}

impl Operand {
    pub fn var(name: &str) -> Self {
        Operand::Var(name.to_string())
    }
}

/// Straight-line operations inside a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Assign {
        dst: String,
        src: Operand,
    },
    Binary {
        dst: String,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        dst: String,
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    Logic {
        dst: String,
        op: LogicOp,
        lhs: Operand,
        rhs: Operand,
    },
    Not {
        dst: String,
        src: Operand,
    },
    Probe {
        label: String,
    },
}

impl Operation {
    /// The variable written by the operation.
    pub fn dst(&self) -> Option<&str> {
        match self {
            Operation::Assign { dst, .. }
            | Operation::Binary { dst, .. }
            | Operation::Compare { dst, .. }
            | Operation::Logic { dst, .. }
            | Operation::Not { dst, .. } => Some(dst),
            Operation::Probe { .. } => None,
        }
    }

    /// The operands read by the operation.
    pub fn uses(&self) -> Vec<&Operand> {
        match self {
            Operation::Assign { src, .. } | Operation::Not { src, .. } => vec![src],
            Operation::Binary { lhs, rhs, .. }
            | Operation::Compare { lhs, rhs, .. }
            | Operation::Logic { lhs, rhs, .. } => vec![lhs, rhs],
            Operation::Probe { .. } => vec![],
        }
    }
}

/// The last instruction of a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(Option<Operand>),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Return(_) => vec![],
        }
    }

    pub fn uses(&self) -> Vec<&Operand> {
        match self {
            Terminator::Branch { cond, .. } => vec![cond],
            Terminator::Return(Some(v)) => vec![v],
            _ => vec![],
        }
    }
}

/// A single-entry sequence of operations closed by a terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub ops: Vec<Operation>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn new(ops: Vec<Operation>, terminator: Terminator) -> Self {
        Self { ops, terminator }
    }
}

/// Where a decision or a fault happened: a block and an operation index.
/// The terminator of a block sits at index `ops.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub block: BlockId,
    pub op: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "bb{}[{}]", self.block, self.op)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Int(v, ty) => write!(f, "{}{}", v, ty),
            Operand::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Assign { dst, src } => write!(f, "{} = {}", dst, src),
            Operation::Binary { dst, op, lhs, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op.symbol(), rhs),
            Operation::Compare { dst, op, lhs, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op.symbol(), rhs),
            Operation::Logic { dst, op, lhs, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op.symbol(), rhs),
            Operation::Not { dst, src } => write!(f, "{} = !{}", dst, src),
            Operation::Probe { label } => write!(f, "probe {:?}", label),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Terminator::Jump(target) => write!(f, "jump bb{}", target),
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => write!(f, "branch {} bb{} bb{}", cond, then_block, else_block),
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Return(Some(v)) => write!(f, "return {}", v),
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.ops.is_empty() {
            writeln!(f, "  {}", self.ops.iter().format("\n  "))?;
        }
        write!(f, "  {}", self.terminator)
    }
}
