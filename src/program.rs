//! The program representation: a validated control-flow graph.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use thiserror::Error;
use tracing::debug;

use crate::{
    bytecode::{BasicBlock, BlockId, Operand, Operation, Terminator},
    ty::Type,
};

/// Reasons a function cannot be built. These are fatal for the whole run.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MalformedProgramError {
    #[error("Entry block bb{entry} does not exist in a function of {available} blocks")]
    MissingEntry { entry: BlockId, available: usize },

    #[error("bb{from} jumps to bb{target}, which does not exist")]
    UndefinedBlock { from: BlockId, target: BlockId },

    #[error("Variable {name} is used in bb{block} but never declared")]
    UndeclaredVariable { name: String, block: BlockId },

    #[error("Variable {name} is declared twice")]
    DuplicateDeclaration { name: String },

    #[error("Variable {name} may be used in bb{block} before it is assigned")]
    UseBeforeAssignment { name: String, block: BlockId },

    #[error("Type mismatch in bb{block} ({context}): expected {expected}, found {found}")]
    TypeMismatch {
        block: BlockId,
        context: String,
        expected: Type,
        found: Type,
    },

    #[error("Literal {value} does not fit in {ty}")]
    LiteralOutOfRange { value: i128, ty: Type },

    #[error("bb{block} returns without a value from a function returning {expected}")]
    MissingReturnValue { block: BlockId, expected: Type },

    #[error("bb{block} returns a value from a function without a return type")]
    UnexpectedReturnValue { block: BlockId },
}

type Result<T> = std::result::Result<T, MalformedProgramError>;

/// A function as a graph of basic blocks. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    name: String,
    params: Vec<(String, Type)>,
    /// Every variable, including parameters and temporaries.
    vars: BTreeMap<String, Type>,
    ret: Option<Type>,
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    back_edges: BTreeSet<(BlockId, BlockId)>,
}

impl Function {
    /// Build a function from raw blocks.
    ///
    /// `locals` declares every non-parameter variable the blocks use. The
    /// blocks are checked for dangling jumps, undeclared variables, type
    /// errors and uses of variables that are not definitely assigned.
    pub fn from_blocks(
        name: &str,
        params: Vec<(String, Type)>,
        locals: Vec<(String, Type)>,
        ret: Option<Type>,
        blocks: Vec<BasicBlock>,
        entry: BlockId,
    ) -> Result<Self> {
        let mut vars = BTreeMap::new();
        for (var, ty) in params.iter().chain(locals.iter()) {
            if vars.insert(var.clone(), *ty).is_some() {
                return Err(MalformedProgramError::DuplicateDeclaration { name: var.clone() });
            }
        }
        let mut function = Self {
            name: name.to_string(),
            params,
            vars,
            ret,
            blocks,
            entry,
            back_edges: BTreeSet::new(),
        };
        function.check_edges()?;
        function.check_types()?;
        function.check_definite_assignment()?;
        function.back_edges = function.find_back_edges();
        debug!(
            function = %function.name,
            blocks = function.blocks.len(),
            loops = function.back_edges.len(),
            "built function"
        );
        Ok(function)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, Type)] {
        &self.params
    }

    pub fn ret(&self) -> Option<Type> {
        self.ret
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn var_type(&self, name: &str) -> Option<Type> {
        self.vars.get(name).copied()
    }

    /// Is `from -> to` an edge closing a loop?
    pub fn is_back_edge(&self, from: BlockId, to: BlockId) -> bool {
        self.back_edges.contains(&(from, to))
    }

    /// Blocks that are the target of a back edge.
    pub fn loop_headers(&self) -> BTreeSet<BlockId> {
        self.back_edges.iter().map(|(_, to)| *to).collect()
    }

    /// Blocks with a path from the entry.
    pub fn reachable_blocks(&self) -> BTreeSet<BlockId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.entry];
        while let Some(b) = stack.pop() {
            if seen.insert(b) {
                stack.extend(self.blocks[b].terminator.successors());
            }
        }
        seen
    }

    /// The type of an operand, once the function is known to be well formed.
    pub fn operand_type(&self, operand: &Operand) -> Option<Type> {
        match operand {
            Operand::Var(name) => self.var_type(name),
            Operand::Int(_, ty) => Some(*ty),
            Operand::Bool(_) => Some(Type::Bool),
        }
    }

    fn check_edges(&self) -> Result<()> {
        if self.entry >= self.blocks.len() {
            return Err(MalformedProgramError::MissingEntry {
                entry: self.entry,
                available: self.blocks.len(),
            });
        }
        for (from, block) in self.blocks.iter().enumerate() {
            for target in block.terminator.successors() {
                if target >= self.blocks.len() {
                    return Err(MalformedProgramError::UndefinedBlock { from, target });
                }
            }
        }
        Ok(())
    }

    fn typed(&self, operand: &Operand, block: BlockId) -> Result<Type> {
        match operand {
            Operand::Var(name) => self
                .var_type(name)
                .ok_or_else(|| MalformedProgramError::UndeclaredVariable {
                    name: name.clone(),
                    block,
                }),
            Operand::Int(value, ty) => {
                if !ty.is_integer() || !ty.contains(*value) {
                    return Err(MalformedProgramError::LiteralOutOfRange { value: *value, ty: *ty });
                }
                Ok(*ty)
            }
            Operand::Bool(_) => Ok(Type::Bool),
        }
    }

    fn expect(&self, block: BlockId, context: impl fmt::Display, expected: Type, found: Type) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(MalformedProgramError::TypeMismatch {
                block,
                context: context.to_string(),
                expected,
                found,
            })
        }
    }

    fn expect_integer(&self, block: BlockId, context: impl fmt::Display, found: Type) -> Result<()> {
        if found.is_integer() {
            Ok(())
        } else {
            // any integer type would do, report the default one
            self.expect(block, context, Type::I32, found)
        }
    }

    fn check_types(&self) -> Result<()> {
        let reachable = self.reachable_blocks();
        for (b, block) in self.blocks.iter().enumerate() {
            for op in &block.ops {
                let dst_ty = match op.dst() {
                    Some(dst) => Some(self.typed(&Operand::var(dst), b)?),
                    None => None,
                };
                match (op, dst_ty) {
                    (Operation::Assign { src, .. }, Some(dst_ty)) => {
                        let src_ty = self.typed(src, b)?;
                        self.expect(b, op, dst_ty, src_ty)?;
                    }
                    (Operation::Binary { lhs, rhs, .. }, Some(dst_ty)) => {
                        let (l, r) = (self.typed(lhs, b)?, self.typed(rhs, b)?);
                        self.expect_integer(b, op, l)?;
                        self.expect(b, op, l, r)?;
                        self.expect(b, op, dst_ty, l)?;
                    }
                    (Operation::Compare { lhs, rhs, .. }, Some(dst_ty)) => {
                        let (l, r) = (self.typed(lhs, b)?, self.typed(rhs, b)?);
                        self.expect_integer(b, op, l)?;
                        self.expect(b, op, l, r)?;
                        self.expect(b, op, Type::Bool, dst_ty)?;
                    }
                    (Operation::Logic { lhs, rhs, .. }, Some(dst_ty)) => {
                        self.expect(b, op, Type::Bool, self.typed(lhs, b)?)?;
                        self.expect(b, op, Type::Bool, self.typed(rhs, b)?)?;
                        self.expect(b, op, Type::Bool, dst_ty)?;
                    }
                    (Operation::Not { src, .. }, Some(dst_ty)) => {
                        self.expect(b, op, Type::Bool, self.typed(src, b)?)?;
                        self.expect(b, op, Type::Bool, dst_ty)?;
                    }
                    _ => {}
                }
            }
            match &block.terminator {
                Terminator::Branch { cond, .. } => {
                    self.expect(b, &block.terminator, Type::Bool, self.typed(cond, b)?)?;
                }
                Terminator::Return(value) => match (value, self.ret) {
                    (Some(v), Some(ret)) => self.expect(b, &block.terminator, ret, self.typed(v, b)?)?,
                    (Some(_), None) => return Err(MalformedProgramError::UnexpectedReturnValue { block: b }),
                    // code after a return is never executed
                    (None, Some(expected)) if reachable.contains(&b) => {
                        return Err(MalformedProgramError::MissingReturnValue { block: b, expected })
                    }
                    _ => {}
                },
                Terminator::Jump(_) => {}
            }
        }
        Ok(())
    }

    /// Forward must-analysis: a variable is assigned at a point if it is
    /// assigned on every path from the entry to that point.
    fn check_definite_assignment(&self) -> Result<()> {
        let reachable = self.reachable_blocks();
        let all: BTreeSet<&str> = self.vars.keys().map(|v| v.as_str()).collect();
        let mut preds: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
        for &b in &reachable {
            for s in self.blocks[b].terminator.successors() {
                preds.entry(s).or_default().push(b);
            }
        }

        let params: BTreeSet<&str> = self.params.iter().map(|(p, _)| p.as_str()).collect();
        let mut outs: BTreeMap<BlockId, BTreeSet<&str>> = reachable.iter().map(|&b| (b, all.clone())).collect();
        let mut ins: BTreeMap<BlockId, BTreeSet<&str>> = BTreeMap::new();
        let mut changed = true;
        while changed {
            changed = false;
            for &b in &reachable {
                let mut input = if b == self.entry { params.clone() } else { all.clone() };
                for p in preds.get(&b).into_iter().flatten() {
                    input = input.intersection(&outs[p]).copied().collect();
                }
                let output = self.assigned_after(b, input.clone());
                ins.insert(b, input);
                if outs[&b] != output {
                    outs.insert(b, output);
                    changed = true;
                }
            }
        }

        for &b in &reachable {
            let mut assigned = ins[&b].clone();
            let block = &self.blocks[b];
            for op in &block.ops {
                for operand in op.uses() {
                    self.check_assigned(operand, &assigned, b)?;
                }
                if let Some(dst) = op.dst() {
                    if let Some((name, _)) = self.vars.get_key_value(dst) {
                        assigned.insert(name.as_str());
                    }
                }
            }
            for operand in block.terminator.uses() {
                self.check_assigned(operand, &assigned, b)?;
            }
        }
        Ok(())
    }

    fn assigned_after<'s>(&'s self, block: BlockId, mut assigned: BTreeSet<&'s str>) -> BTreeSet<&'s str> {
        for op in &self.blocks[block].ops {
            if let Some((name, _)) = op.dst().and_then(|dst| self.vars.get_key_value(dst)) {
                assigned.insert(name.as_str());
            }
        }
        assigned
    }

    fn check_assigned(&self, operand: &Operand, assigned: &BTreeSet<&str>, block: BlockId) -> Result<()> {
        match operand {
            Operand::Var(name) if !assigned.contains(name.as_str()) => Err(MalformedProgramError::UseBeforeAssignment {
                name: name.clone(),
                block,
            }),
            _ => Ok(()),
        }
    }

    /// An edge `u -> v` is a back edge if `v` is on the depth-first stack when
    /// the edge is traversed.
    fn find_back_edges(&self) -> BTreeSet<(BlockId, BlockId)> {
        let mut back_edges = BTreeSet::new();
        let mut on_stack = vec![false; self.blocks.len()];
        let mut visited = vec![false; self.blocks.len()];
        // (block, index of the next successor to visit)
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry] = true;
        on_stack[self.entry] = true;
        while let Some((b, next)) = stack.pop() {
            let succs = self.blocks[b].terminator.successors();
            if next < succs.len() {
                stack.push((b, next + 1));
                let s = succs[next];
                if on_stack[s] {
                    back_edges.insert((b, s));
                } else if !visited[s] {
                    visited[s] = true;
                    on_stack[s] = true;
                    stack.push((s, 0));
                }
            } else {
                on_stack[b] = false;
            }
        }
        back_edges
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use itertools::Itertools;
        write!(
            f,
            "fn {}({})",
            self.name,
            self.params.iter().map(|(p, ty)| format!("{}: {}", p, ty)).format(", ")
        )?;
        if let Some(ret) = self.ret {
            write!(f, " -> {}", ret)?;
        }
        writeln!(f)?;
        for (b, block) in self.blocks.iter().enumerate() {
            writeln!(f, "bb{}:", b)?;
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}
