//! Structured function bodies.
//!
//! This is the input handed over by a frontend: a typed signature and a tree
//! of statements. [`FunctionDef::build`] lowers it to a [`Function`].

use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Not, Rem, Sub};

use crate::{
    program::{Function, MalformedProgramError},
    ty::Type,
    value::{BinOp, CmpOp, LogicOp},
};

/// Expressions. Literals take their type from the context they appear in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Lit(i128),
    Var(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Logic(LogicOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

pub fn lit(v: i128) -> Expr {
    Expr::Lit(v)
}

pub fn var(name: &str) -> Expr {
    Expr::Var(name.to_string())
}

impl Expr {
    fn compare(self, op: CmpOp, rhs: Expr) -> Expr {
        Expr::Compare(op, Box::new(self), Box::new(rhs))
    }

    pub fn lt(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn _eq(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn neq(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Ne, rhs)
    }

    pub fn and(self, rhs: Expr) -> Expr {
        Expr::Logic(LogicOp::And, Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Logic(LogicOp::Or, Box::new(self), Box::new(rhs))
    }
}

macro_rules! binary_expr {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary($op, Box::new(self), Box::new(rhs))
            }
        }
    };
}

binary_expr!(Add, add, BinOp::Add);
binary_expr!(Sub, sub, BinOp::Sub);
binary_expr!(Mul, mul, BinOp::Mul);
binary_expr!(Div, div, BinOp::Div);
binary_expr!(Rem, rem, BinOp::Rem);
binary_expr!(BitAnd, bitand, BinOp::BitAnd);
binary_expr!(BitOr, bitor, BinOp::BitOr);
binary_expr!(BitXor, bitxor, BinOp::BitXor);

impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Statements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `ty name = init;` or `ty name;`
    Declare {
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        els: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    /// A labelled program point whose variables are recorded.
    Probe(String),
}

pub fn declare(name: &str, ty: Type, init: Expr) -> Stmt {
    Stmt::Declare {
        name: name.to_string(),
        ty,
        init: Some(init),
    }
}

pub fn declare_uninit(name: &str, ty: Type) -> Stmt {
    Stmt::Declare {
        name: name.to_string(),
        ty,
        init: None,
    }
}

pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        name: name.to_string(),
        value,
    }
}

pub fn if_else(cond: Expr, then: Vec<Stmt>, els: Vec<Stmt>) -> Stmt {
    Stmt::If { cond, then, els }
}

pub fn if_then(cond: Expr, then: Vec<Stmt>) -> Stmt {
    Stmt::If {
        cond,
        then,
        els: Vec::new(),
    }
}

pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While { cond, body }
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(value))
}

pub fn ret_void() -> Stmt {
    Stmt::Return(None)
}

pub fn probe(label: &str) -> Stmt {
    Stmt::Probe(label.to_string())
}

/// A function definition: signature and body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub ret: Option<Type>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            ret: None,
            body: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.params.push((name.to_string(), ty));
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.ret = Some(ty);
        self
    }

    pub fn body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }

    /// Lower to a control-flow graph and validate it.
    pub fn build(&self) -> Result<Function, MalformedProgramError> {
        crate::lower::lower(self)
    }
}
