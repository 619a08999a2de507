//! Lowering of structured bodies to basic blocks.

use std::collections::BTreeMap;

use crate::{
    ast::{Expr, FunctionDef, Stmt},
    bytecode::{BasicBlock, BlockId, Operand, Operation, Terminator},
    program::{Function, MalformedProgramError},
    ty::Type,
};

/// Lower `def` and validate the result.
///
/// Variables live in one function-wide scope. Intermediate results go to
/// temporaries named `%t0`, `%t1`, ...
pub fn lower(def: &FunctionDef) -> Result<Function, MalformedProgramError> {
    let mut lowerer = Lowerer::new(def);
    lowerer.stmts(&def.body);
    let (locals, blocks) = lowerer.finish();
    Function::from_blocks(&def.name, def.params.clone(), locals, def.ret, blocks, 0)
}

struct Lowerer<'a> {
    def: &'a FunctionDef,
    ops: Vec<Vec<Operation>>,
    terminators: Vec<Option<Terminator>>,
    current: BlockId,
    locals: Vec<(String, Type)>,
    scope: BTreeMap<String, Type>,
    temps: usize,
}

impl<'a> Lowerer<'a> {
    fn new(def: &'a FunctionDef) -> Self {
        let mut lowerer = Self {
            def,
            ops: Vec::new(),
            terminators: Vec::new(),
            current: 0,
            locals: Vec::new(),
            scope: def.params.iter().cloned().collect(),
            temps: 0,
        };
        lowerer.current = lowerer.new_block();
        lowerer
    }

    fn finish(self) -> (Vec<(String, Type)>, Vec<BasicBlock>) {
        let blocks = self
            .ops
            .into_iter()
            .zip(self.terminators)
            .map(|(ops, term)| BasicBlock::new(ops, term.unwrap_or(Terminator::Return(None))))
            .collect();
        (self.locals, blocks)
    }

    fn new_block(&mut self) -> BlockId {
        self.ops.push(Vec::new());
        self.terminators.push(None);
        self.ops.len() - 1
    }

    fn emit(&mut self, op: Operation) {
        self.ops[self.current].push(op);
    }

    /// Close the current block unless a `return` already did.
    fn terminate(&mut self, term: Terminator) {
        let slot = &mut self.terminators[self.current];
        if slot.is_none() {
            *slot = Some(term);
        }
    }

    fn is_open(&self) -> bool {
        self.terminators[self.current].is_none()
    }

    fn temp(&mut self, ty: Type) -> String {
        let name = format!("%t{}", self.temps);
        self.temps += 1;
        self.locals.push((name.clone(), ty));
        name
    }

    /// The type an expression has regardless of context, if any.
    fn infer(&self, e: &Expr) -> Option<Type> {
        match e {
            Expr::Lit(_) => None,
            Expr::Var(x) => self.scope.get(x).copied(),
            Expr::Binary(_, l, r) => self.infer(l).or_else(|| self.infer(r)),
            Expr::Compare(..) | Expr::Logic(..) | Expr::Not(_) => Some(Type::Bool),
        }
    }

    fn operand_type(&self, l: &Expr, r: &Expr, hint: Option<Type>) -> Type {
        self.infer(l).or_else(|| self.infer(r)).or(hint).unwrap_or(Type::I32)
    }

    /// Lower `e` to an operand. `hint` types bare literals.
    fn expr(&mut self, e: &Expr, hint: Option<Type>) -> Operand {
        match e {
            Expr::Lit(v) => Operand::Int(*v, hint.filter(|t| t.is_integer()).unwrap_or(Type::I32)),
            Expr::Var(x) => Operand::var(x),
            _ => {
                let ty = self.infer(e).or(hint).unwrap_or(Type::I32);
                let dst = self.temp(ty);
                self.expr_into(&dst, e, Some(ty));
                Operand::Var(dst)
            }
        }
    }

    /// Lower `e` writing its result straight into `dst`.
    fn expr_into(&mut self, dst: &str, e: &Expr, hint: Option<Type>) {
        let dst = dst.to_string();
        let op = match e {
            Expr::Lit(_) | Expr::Var(_) => Operation::Assign {
                dst,
                src: self.expr(e, hint),
            },
            Expr::Binary(op, l, r) => {
                let ty = Some(self.operand_type(l, r, hint));
                let (lhs, rhs) = (self.expr(l, ty), self.expr(r, ty));
                Operation::Binary { dst, op: *op, lhs, rhs }
            }
            Expr::Compare(op, l, r) => {
                let ty = Some(self.operand_type(l, r, None));
                let (lhs, rhs) = (self.expr(l, ty), self.expr(r, ty));
                Operation::Compare { dst, op: *op, lhs, rhs }
            }
            Expr::Logic(op, l, r) => {
                let (lhs, rhs) = (self.expr(l, Some(Type::Bool)), self.expr(r, Some(Type::Bool)));
                Operation::Logic { dst, op: *op, lhs, rhs }
            }
            Expr::Not(x) => Operation::Not {
                dst,
                src: self.expr(x, Some(Type::Bool)),
            },
        };
        self.emit(op);
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.stmt(s);
        }
    }

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Declare { name, ty, init } => {
                self.locals.push((name.clone(), *ty));
                self.scope.insert(name.clone(), *ty);
                if let Some(init) = init {
                    self.expr_into(name, init, Some(*ty));
                }
            }
            Stmt::Assign { name, value } => {
                let hint = self.scope.get(name).copied();
                self.expr_into(name, value, hint);
            }
            Stmt::If { cond, then, els } => {
                let cond = self.expr(cond, Some(Type::Bool));
                let then_block = self.new_block();
                let else_block = if els.is_empty() { None } else { Some(self.new_block()) };
                let join = self.new_block();
                self.terminate(Terminator::Branch {
                    cond,
                    then_block,
                    else_block: else_block.unwrap_or(join),
                });
                self.current = then_block;
                self.stmts(then);
                self.terminate(Terminator::Jump(join));
                if let Some(else_block) = else_block {
                    self.current = else_block;
                    self.stmts(els);
                    self.terminate(Terminator::Jump(join));
                }
                self.current = join;
            }
            Stmt::While { cond, body } => {
                let header = self.new_block();
                self.terminate(Terminator::Jump(header));
                self.current = header;
                let cond = self.expr(cond, Some(Type::Bool));
                let body_block = self.new_block();
                let exit = self.new_block();
                self.terminate(Terminator::Branch {
                    cond,
                    then_block: body_block,
                    else_block: exit,
                });
                self.current = body_block;
                self.stmts(body);
                self.terminate(Terminator::Jump(header));
                self.current = exit;
            }
            Stmt::Return(value) => {
                let value = value.as_ref().map(|v| self.expr(v, self.def.ret));
                self.terminate(Terminator::Return(value));
                // anything after a return lands in an unreachable block
                self.current = self.new_block();
            }
            Stmt::Probe(label) => {
                if self.is_open() {
                    self.emit(Operation::Probe { label: label.clone() });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    #[test]
    fn lowers_straight_line_code() {
        let f = FunctionDef::new("f")
            .param("y", Type::I32)
            .returns(Type::I32)
            .body(vec![
                declare("x", Type::I32, var("y") + lit(4)),
                assign("y", lit(2) * var("x")),
                ret(var("x") / var("y")),
            ])
            .build()
            .unwrap();
        // entry plus the unreachable block after `return`
        assert_eq!(f.blocks().len(), 2);
        let entry = f.block(0);
        assert_eq!(
            entry.ops[1],
            Operation::Binary {
                dst: "y".into(),
                op: crate::value::BinOp::Mul,
                lhs: Operand::Int(2, Type::I32),
                rhs: Operand::var("x"),
            }
        );
        assert_eq!(entry.terminator, Terminator::Return(Some(Operand::var("%t0"))));
    }

    #[test]
    fn literals_take_the_type_of_the_other_operand() {
        let f = FunctionDef::new("f")
            .param("u", Type::U8)
            .body(vec![if_then(lit(200).lt(var("u")), vec![probe("big")])])
            .build()
            .unwrap();
        assert_eq!(
            f.block(0).ops[0],
            Operation::Compare {
                dst: "%t0".into(),
                op: crate::value::CmpOp::Lt,
                lhs: Operand::Int(200, Type::U8),
                rhs: Operand::var("u"),
            }
        );
    }

    #[test]
    fn while_loop_has_one_back_edge() {
        let f = FunctionDef::new("f")
            .param("n", Type::I32)
            .returns(Type::I32)
            .body(vec![
                declare("i", Type::I32, lit(0)),
                while_loop(var("i").lt(var("n")), vec![assign("i", var("i") + lit(1))]),
                ret(var("i")),
            ])
            .build()
            .unwrap();
        assert_eq!(f.loop_headers().into_iter().collect::<Vec<_>>(), vec![1]);
        assert!(f.is_back_edge(2, 1));
    }

    #[test]
    fn missing_return_is_rejected() {
        let err = FunctionDef::new("f")
            .param("x", Type::I32)
            .returns(Type::I32)
            .body(vec![if_then(var("x").gt(lit(0)), vec![ret(var("x"))])])
            .build()
            .unwrap_err();
        assert!(matches!(err, MalformedProgramError::MissingReturnValue { .. }));
    }

    #[test]
    fn mixed_widths_are_rejected() {
        let err = FunctionDef::new("f")
            .param("a", Type::I32)
            .param("b", Type::U8)
            .returns(Type::I32)
            .body(vec![ret(var("a") + var("b"))])
            .build()
            .unwrap_err();
        assert!(matches!(err, MalformedProgramError::TypeMismatch { .. }));
    }

    #[test]
    fn literal_out_of_range_is_rejected() {
        let err = FunctionDef::new("f")
            .param("a", Type::U8)
            .body(vec![assign("a", lit(300))])
            .build()
            .unwrap_err();
        assert_eq!(err, MalformedProgramError::LiteralOutOfRange { value: 300, ty: Type::U8 });
    }

    #[test]
    fn uninitialised_local_is_rejected() {
        let err = FunctionDef::new("f")
            .returns(Type::I32)
            .body(vec![declare_uninit("w", Type::I32), ret(var("w"))])
            .build()
            .unwrap_err();
        assert!(matches!(err, MalformedProgramError::UseBeforeAssignment { .. }));
    }
}
