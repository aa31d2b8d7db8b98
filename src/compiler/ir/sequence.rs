//! Instruction sequence for one compiled equation

use super::instruction::Info;
use super::variable::{Kind, VarId, VariableTable};
use crate::compiler::emit::Backend;
use crate::error::Result;
use std::collections::BTreeSet;

/// Ordered list of instructions. Rewritten in place, never reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    /// Instructions in execution order
    pub instructions: Vec<Info>,
    /// Variable the equation assigns
    pub output: Option<VarId>,
}

impl Sequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction
    pub fn push(&mut self, info: Info) {
        self.instructions.push(info);
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if there are no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterate over the instructions
    pub fn iter(&self) -> std::slice::Iter<'_, Info> {
        self.instructions.iter()
    }

    /// Last instruction
    pub fn last(&self) -> Option<&Info> {
        self.instructions.last()
    }

    /// Remove an instruction, keeping the order of the rest
    pub fn remove(&mut self, index: usize) -> Info {
        self.instructions.remove(index)
    }

    /// Replace every reference to `from` with `to`
    pub fn substitute(&mut self, vars: &mut VariableTable, from: VarId, to: VarId) {
        for info in self.instructions.iter_mut() {
            info.substitute(vars, from, to);
        }
        if self.output == Some(from) {
            self.output = Some(to);
        }
    }

    /// Temporaries referenced anywhere in the sequence
    pub fn temporaries(&self, vars: &VariableTable) -> BTreeSet<VarId> {
        self.instructions
            .iter()
            .flat_map(|info| info.references(vars))
            .filter(|id| vars[*id].temporary)
            .collect()
    }

    /// Temporaries of one kind
    pub fn temporaries_of(&self, vars: &VariableTable, kind: Kind) -> BTreeSet<VarId> {
        self.temporaries(vars)
            .into_iter()
            .filter(|id| vars[*id].kind() == kind)
            .collect()
    }

    /// Run every instruction through a backend, in order
    pub fn execute(&self, backend: &mut dyn Backend, vars: &VariableTable) -> Result<String> {
        let mut buffer = String::new();
        for info in &self.instructions {
            backend.emit_operation(&mut buffer, info, vars)?;
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::instruction::{Primitive, Signature};
    use crate::compiler::ir::variable::{Variable, VariableType};

    #[test]
    fn test_substitute_updates_output() {
        let mut vars = VariableTable::new();
        let a = vars.add(Variable::alias("A", VariableType::Matrix));
        let t = vars.add(Variable::temporary("tm0", VariableType::Matrix));
        let mut info = Info::new(Primitive::Transpose, Signature::M);
        info.inputs.push(a);
        info.output = Some(t);

        let mut seq = Sequence::new();
        seq.push(info);
        seq.output = Some(t);
        assert_eq!(seq.temporaries(&vars).len(), 1);

        let b = vars.add(Variable::alias("B", VariableType::Matrix));
        seq.substitute(&mut vars, t, b);
        assert_eq!(seq.output, Some(b));
        assert_eq!(seq.instructions[0].output, Some(b));
        assert!(seq.temporaries(&vars).is_empty());
    }
}
