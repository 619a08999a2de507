use std::{
    collections::BTreeMap,
    fmt,
    ops::Index,
};

use crate::{bytecode::Operand, ty::Type, value::Value};

/// Local Memory
///
/// Maps every assigned variable of a path to its symbolic value. Compiler
/// temporaries (`%tN`) live here too but are hidden from snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalMemory {
    vars: BTreeMap<String, Value>,
}

impl LocalMemory {
    /// Bind every parameter `p` to the input symbol `p_0`.
    pub fn from_params(params: &[(String, Type)]) -> Self {
        Self {
            vars: params
                .iter()
                .map(|(p, ty)| (p.clone(), Value::symbol(format!("{}_0", p), *ty)))
                .collect(),
        }
    }

    pub fn get(&self, var: &str) -> Option<&Value> {
        self.vars.get(var)
    }

    pub fn set(&mut self, var: &str, value: Value) {
        self.vars.insert(var.to_string(), value);
    }

    /// The value of an operand. Variables must be assigned, which holds for
    /// any validated function.
    pub fn operand(&self, operand: &Operand) -> Value {
        match operand {
            Operand::Var(x) => self[x.as_str()].clone(),
            Operand::Int(v, ty) => Value::int(*v, *ty),
            Operand::Bool(b) => Value::bool(*b),
        }
    }

    /// The program variables, without temporaries.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .filter(|(x, _)| !x.starts_with('%'))
            .map(|(x, v)| (x.clone(), v.clone()))
            .collect()
    }

    /// Number of locals.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Index<&str> for LocalMemory {
    type Output = Value;

    /// Return the value of `var`.
    fn index(&self, var: &str) -> &Self::Output {
        &self.vars[var]
    }
}

impl fmt::Display for LocalMemory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Locals:")?;
        for (x, v) in self.vars.iter().filter(|(x, _)| !x.starts_with('%')) {
            writeln!(f, "{} = {}", x, v)?;
        }
        Ok(())
    }
}
