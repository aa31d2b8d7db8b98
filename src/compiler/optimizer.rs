//! # IR Optimizer for compiled equations
//!
//! Passes, run in order over one [`Sequence`]:
//! - Usage mapping (role and live range of every variable)
//! - Constant folding
//! - Trailing-copy elimination
//! - Redundant-temporary elimination, once per kind (integer, double, matrix)
//!
//! The passes only change how many intermediate values are named, never the
//! value the equation computes.

use super::emit::{integer_arithmetic, Backend, FoldedScalar};
use super::ir::{Info, Kind, Primitive, Sequence, Signature, VarId, VariableTable};
use super::temp::{KindCounts, TempManager};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::BitOr;
use tracing::{debug, trace};

/// Which scalar inputs constant folding treats as known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReducePolicy(u8);

impl ReducePolicy {
    /// Nothing is folded
    pub const NONE: ReducePolicy = ReducePolicy(0);
    /// Literal constants
    pub const REDUCE_CONSTANTS: ReducePolicy = ReducePolicy(1);
    /// Any non-temporary scalar (literal or alias)
    pub const REDUCE_SCALARS: ReducePolicy = ReducePolicy(2);

    /// True if every flag of `other` is set
    pub fn contains(self, other: ReducePolicy) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw flag bits
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for ReducePolicy {
    fn default() -> Self {
        ReducePolicy::REDUCE_SCALARS
    }
}

impl BitOr for ReducePolicy {
    type Output = ReducePolicy;

    fn bitor(self, rhs: ReducePolicy) -> ReducePolicy {
        ReducePolicy(self.0 | rhs.0)
    }
}

/// Role of a variable within a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UsageRole {
    /// Read but never written: aliases and literals
    Input,
    /// Compiler temporary of a kind
    Temporary(Kind),
    /// Non-temporary output, the final assignment target
    Target,
}

/// Roles and live ranges of the variables a sequence references
#[derive(Debug, Clone, Default)]
pub struct Usage {
    roles: BTreeMap<VarId, UsageRole>,
    ranges: BTreeMap<VarId, Vec<usize>>,
}

impl Usage {
    /// Map every reference in `sequence`
    pub fn map(sequence: &Sequence, vars: &VariableTable) -> Self {
        let mut usage = Self::default();
        for (index, info) in sequence.iter().enumerate() {
            for id in info.reads(vars) {
                if vars[id].temporary {
                    usage.touch(id, index, vars.kind(id));
                } else {
                    usage.roles.entry(id).or_insert(UsageRole::Input);
                }
            }
            if let Some(out) = info.output {
                if vars[out].temporary {
                    usage.touch(out, index, vars.kind(out));
                } else {
                    usage.roles.insert(out, UsageRole::Target);
                }
            }
        }
        usage
    }

    fn touch(&mut self, id: VarId, index: usize, kind: Kind) {
        self.roles.insert(id, UsageRole::Temporary(kind));
        let range = self.ranges.entry(id).or_default();
        if range.last() != Some(&index) {
            range.push(index);
        }
    }

    /// Role of a variable, `None` if the sequence never references it
    pub fn role(&self, id: VarId) -> Option<UsageRole> {
        self.roles.get(&id).copied()
    }

    /// Ordered instruction indices referencing a temporary
    pub fn live_range(&self, id: VarId) -> &[usize] {
        self.ranges.get(&id).map_or(&[], |r| r.as_slice())
    }

    /// First instruction referencing a temporary
    pub fn first(&self, id: VarId) -> Option<usize> {
        self.live_range(id).first().copied()
    }

    /// Last instruction referencing a temporary
    pub fn last(&self, id: VarId) -> Option<usize> {
        self.live_range(id).last().copied()
    }

    /// Temporaries of one kind, ordered by first use
    pub fn temporaries(&self, kind: Kind) -> Vec<VarId> {
        let mut ids: Vec<VarId> = self
            .roles
            .iter()
            .filter(|(_, role)| **role == UsageRole::Temporary(kind))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by_key(|id| self.first(*id));
        ids
    }

    /// Number of temporaries of every kind
    pub fn temporary_count(&self) -> usize {
        self.ranges.len()
    }
}

/// What one optimizer run changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeStats {
    /// Instructions before optimizing
    pub instructions_before: usize,
    /// Instructions after optimizing
    pub instructions_after: usize,
    /// Temporaries referenced before optimizing
    pub temporaries_before: KindCounts,
    /// Temporaries referenced after optimizing
    pub temporaries_after: KindCounts,
    /// Instructions replaced by a literal
    pub removed_constants: usize,
    /// Temporaries merged into an earlier one, per kind
    pub removed_temporaries: KindCounts,
    /// The final copy was folded into the instruction producing its source
    pub trailing_copy_removed: bool,
}

impl OptimizeStats {
    /// Pretty printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::failed("stats", format!("Failed to serialize stats: {}", e)))
    }
}

fn count_temporaries(sequence: &Sequence, vars: &VariableTable) -> KindCounts {
    let mut counts = KindCounts::default();
    for id in sequence.temporaries(vars) {
        counts.bump(vars.kind(id));
    }
    counts
}

/// Sequence optimizer with a configurable folding policy
pub struct Optimizer {
    policy: ReducePolicy,
}

impl Optimizer {
    /// Create an optimizer folding under `policy`
    pub fn new(policy: ReducePolicy) -> Self {
        Self { policy }
    }

    /// Active folding policy
    pub fn policy(&self) -> ReducePolicy {
        self.policy
    }

    /// Run all passes. Constant folding asks `backend` for every value it has
    /// no integer closed form for; if that fails the error is returned with
    /// the instructions folded so far already removed.
    pub fn optimize(
        &mut self,
        sequence: &mut Sequence,
        vars: &mut VariableTable,
        temps: &mut TempManager,
        backend: &mut dyn Backend,
    ) -> Result<OptimizeStats> {
        let mut stats = OptimizeStats {
            instructions_before: sequence.len(),
            temporaries_before: count_temporaries(sequence, vars),
            ..OptimizeStats::default()
        };
        let usage = Usage::map(sequence, vars);
        debug!(
            instructions = sequence.len(),
            temporaries = usage.temporary_count(),
            "mapped usage"
        );

        self.constant_folding(sequence, vars, temps, backend, &mut stats)?;
        self.trailing_copy_elimination(sequence, vars, temps, &mut stats);
        for kind in [Kind::Integer, Kind::Double, Kind::Matrix] {
            self.redundant_temporary_elimination(sequence, vars, temps, kind, &mut stats);
        }

        stats.instructions_after = sequence.len();
        stats.temporaries_after = count_temporaries(sequence, vars);
        debug!(
            before = stats.instructions_before,
            after = stats.instructions_after,
            "optimized sequence"
        );
        Ok(stats)
    }

    fn is_constant(&self, vars: &VariableTable, id: VarId) -> bool {
        let var = &vars[id];
        if !var.kind().is_scalar() {
            return false;
        }
        (self.policy.contains(ReducePolicy::REDUCE_CONSTANTS) && var.constant)
            || (self.policy.contains(ReducePolicy::REDUCE_SCALARS) && !var.temporary)
    }

    /// Output of an instruction folding may replace
    fn foldable_output(&self, info: &Info, vars: &VariableTable) -> Option<VarId> {
        let out = info.output?;
        let var = &vars[out];
        let eligible = var.temporary
            && var.kind().is_scalar()
            && !info.primitive.is_random()
            && info.range.is_none()
            && info.constructor.is_none()
            && !info.inputs.is_empty()
            && info.inputs.iter().all(|id| self.is_constant(vars, *id));
        eligible.then_some(out)
    }

    /// Integer operands when the instruction has an integer closed form
    fn closed_form_operands(info: &Info, vars: &VariableTable) -> Option<Vec<i64>> {
        let closed = matches!(
            (info.primitive, info.signature),
            (Primitive::Neg, Signature::I)
                | (
                    Primitive::Add | Primitive::Subtract | Primitive::Multiply | Primitive::Divide,
                    Signature::Ii
                )
        );
        if !closed {
            return None;
        }
        info.inputs
            .iter()
            .map(|id| vars[*id].literal_integer())
            .collect()
    }

    /// Constant folding - replace scalar instructions on known inputs by literals
    fn constant_folding(
        &mut self,
        sequence: &mut Sequence,
        vars: &mut VariableTable,
        temps: &mut TempManager,
        backend: &mut dyn Backend,
        stats: &mut OptimizeStats,
    ) -> Result<()> {
        let mut index = 0;
        // The final store is never folded
        while index + 1 < sequence.len() {
            let info = &sequence.instructions[index];
            let out = match self.foldable_output(info, vars) {
                Some(out) => out,
                None => {
                    index += 1;
                    continue;
                }
            };
            let folded = match Self::closed_form_operands(info, vars) {
                Some(args) => integer_arithmetic(info.primitive, &args).map(FoldedScalar::integer),
                None => backend.fold_constant(info, vars)?,
            };
            let folded = match folded {
                Some(folded) => folded,
                None => {
                    trace!(op = %info.op_name(), "left unfolded");
                    index += 1;
                    continue;
                }
            };
            trace!(op = %info.op_name(), value = %folded.text, "folded constant");
            temps.release(vars, out);
            if let Some(var) = vars.get_mut(out) {
                var.fold_into(&folded.text, folded.precedence);
            }
            sequence.remove(index);
            stats.removed_constants += 1;
        }
        debug!(removed = stats.removed_constants, "constant folding");
        Ok(())
    }

    /// Trailing-copy elimination - write the final value straight into the target
    fn trailing_copy_elimination(
        &mut self,
        sequence: &mut Sequence,
        vars: &mut VariableTable,
        temps: &mut TempManager,
        stats: &mut OptimizeStats,
    ) {
        let last = match sequence.last() {
            Some(last) if last.is_plain_copy() => last,
            _ => return,
        };
        let (src, dst) = match (last.input(0), last.output) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return,
        };
        if !vars[src].temporary || vars[dst].temporary || vars.kind(src) != vars.kind(dst) {
            return;
        }
        let end = sequence.len() - 1;
        let target_read = sequence.instructions[..end]
            .iter()
            .any(|info| info.reads(vars).contains(&dst));
        if target_read {
            debug!(target = %vars[dst].name, "trailing copy kept, target is read earlier");
            return;
        }
        sequence.remove(end);
        sequence.substitute(vars, src, dst);
        sequence.output = Some(dst);
        temps.release(vars, src);
        stats.trailing_copy_removed = true;
        debug!(source = %vars[src].name, target = %vars[dst].name, "removed trailing copy");
    }

    /// Redundant-temporary elimination - greedy reuse of temporaries whose
    /// live ranges do not overlap. Matrices need a strictly later start, a
    /// scalar may be redefined by the instruction that last reads another.
    fn redundant_temporary_elimination(
        &mut self,
        sequence: &mut Sequence,
        vars: &mut VariableTable,
        temps: &mut TempManager,
        kind: Kind,
        stats: &mut OptimizeStats,
    ) {
        let usage = Usage::map(sequence, vars);
        let ids = usage.temporaries(kind);
        let strict = kind == Kind::Matrix;
        let mut removed = BTreeSet::new();

        for (i, &keep) in ids.iter().enumerate() {
            if removed.contains(&keep) {
                continue;
            }
            let mut end = match usage.last(keep) {
                Some(end) => end,
                None => continue,
            };
            for &later in &ids[i + 1..] {
                if removed.contains(&later) {
                    continue;
                }
                let (start, later_end) = match (usage.first(later), usage.last(later)) {
                    (Some(start), Some(later_end)) => (start, later_end),
                    _ => continue,
                };
                let disjoint = if strict { end < start } else { end <= start };
                if !disjoint {
                    continue;
                }
                trace!(from = %vars[later].name, to = %vars[keep].name, "reused temporary");
                sequence.substitute(vars, later, keep);
                temps.release(vars, later);
                removed.insert(later);
                stats.removed_temporaries.bump(kind);
                end = later_end;
            }
        }
        debug!(kind = %kind, removed = removed.len(), "redundant temporaries");
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(ReducePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::emit::{DirectExecutor, SourceEmitter, ValueStore};
    use crate::compiler::factory::SequenceBuilder;
    use crate::compiler::ir::{Variable, VariableType};
    use crate::compiler::temp::MatrixRng;

    /// Backend whose folding always fails
    struct RefusingBackend;

    impl Backend for RefusingBackend {
        fn emit_operation(&mut self, _: &mut String, info: &Info, _: &VariableTable) -> Result<()> {
            Err(Error::UnimplementedOperation { op: info.op_name() })
        }

        fn declare(&mut self, _: &mut String, _: &str, _: &VariableTable, _: VarId) -> Result<()> {
            Ok(())
        }

        fn fold_constant(&mut self, info: &Info, _: &VariableTable) -> Result<Option<FoldedScalar>> {
            Err(Error::failed(info.op_name(), "refused"))
        }
    }

    fn alias(vars: &mut VariableTable, name: &str, ty: VariableType) -> VarId {
        vars.add(Variable::alias(name, ty))
    }

    #[test]
    fn test_policy_flags() {
        let both = ReducePolicy::REDUCE_CONSTANTS | ReducePolicy::REDUCE_SCALARS;
        assert!(both.contains(ReducePolicy::REDUCE_SCALARS));
        assert!(!ReducePolicy::default().contains(ReducePolicy::REDUCE_CONSTANTS));
        assert_eq!(both.bits(), 3);
    }

    #[test]
    fn test_trailing_copy_removed() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let a = alias(&mut vars, "A", VariableType::Matrix);
        let b = alias(&mut vars, "B", VariableType::Matrix);
        let c = alias(&mut vars, "C", VariableType::Matrix);
        let d = alias(&mut vars, "D", VariableType::Matrix);
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let cd = builder.apply(|f| f.multiply(c, d)).unwrap();
            let sum = builder.apply(|f| f.add(b, cd)).unwrap();
            let diff = builder.apply(|f| f.subtract(sum, b)).unwrap();
            builder.assign(diff, a).unwrap();
            builder.finish()
        };
        assert_eq!(seq.len(), 4);

        let stats = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut SourceEmitter::default())
            .unwrap();
        assert!(stats.trailing_copy_removed);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.last().unwrap().output, Some(a));
        assert_eq!(seq.last().unwrap().primitive, Primitive::Subtract);
        assert_eq!(stats.temporaries_before.matrix, 3);
        assert!(stats.temporaries_after.matrix < 3);
    }

    #[test]
    fn test_trailing_copy_kept_when_target_is_read() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let a = alias(&mut vars, "A", VariableType::Matrix);
        let b = alias(&mut vars, "B", VariableType::Matrix);
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let t = builder.apply(|f| f.multiply(b, a)).unwrap();
            builder.assign(t, a).unwrap();
            builder.finish()
        };
        let stats = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut SourceEmitter::default())
            .unwrap();
        assert!(!stats.trailing_copy_removed);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_integer_closed_forms_fold() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let n = alias(&mut vars, "n", VariableType::Integer);
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let (two, three, four) = (builder.integer(2), builder.integer(3), builder.integer(4));
            let prod = builder.apply(|f| f.multiply(three, four)).unwrap();
            let sum = builder.apply(|f| f.add(two, prod)).unwrap();
            builder.assign(sum, n).unwrap();
            builder.finish()
        };
        // Closed forms never reach the backend
        let stats = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut RefusingBackend)
            .unwrap();
        assert_eq!(stats.removed_constants, 2);
        assert_eq!(seq.len(), 1);
        let src = seq.instructions[0].input(0).unwrap();
        assert_eq!(vars[src].literal_integer(), Some(14));
        assert_eq!(temps.live_count(), 0);
    }

    fn scaled_alias(vars: &mut VariableTable, temps: &mut TempManager) -> Sequence {
        let x = alias(vars, "x", VariableType::Double);
        let y = alias(vars, "y", VariableType::Double);
        let mut builder = SequenceBuilder::new(vars, temps);
        let (two, one) = (builder.double(2.0), builder.double(1.0));
        let t = builder.apply(|f| f.multiply(x, two)).unwrap();
        let u = builder.apply(|f| f.add(t, one)).unwrap();
        builder.assign(u, y).unwrap();
        builder.finish()
    }

    #[test]
    fn test_reduce_scalars_folds_aliases() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let mut seq = scaled_alias(&mut vars, &mut temps);
        let stats = Optimizer::new(ReducePolicy::REDUCE_SCALARS)
            .optimize(&mut seq, &mut vars, &mut temps, &mut SourceEmitter::default())
            .unwrap();
        assert_eq!(stats.removed_constants, 2);
        assert_eq!(seq.len(), 1);
        let src = seq.instructions[0].input(0).unwrap();
        assert!(!vars[src].temporary);
        assert!(vars[src].operand().contains("x *"));

        // Aliases are not literal constants
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let mut seq = scaled_alias(&mut vars, &mut temps);
        let stats = Optimizer::new(ReducePolicy::REDUCE_CONSTANTS)
            .optimize(&mut seq, &mut vars, &mut temps, &mut SourceEmitter::default())
            .unwrap();
        assert_eq!(stats.removed_constants, 0);
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let n = alias(&mut vars, "n", VariableType::Integer);
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let one = builder.integer(1);
            let zero = builder.integer(0);
            let q = builder.apply(|f| f.divide(one, zero)).unwrap();
            builder.assign(q, n).unwrap();
            builder.finish()
        };
        // The refusing backend proves the emitter is never consulted
        let stats = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut RefusingBackend)
            .unwrap();
        assert_eq!(stats.removed_constants, 0);
        assert!(stats.trailing_copy_removed);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.instructions[0].primitive, Primitive::Divide);
        assert_eq!(seq.instructions[0].output, Some(n));
    }

    #[test]
    fn test_folding_failure_aborts() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let x = alias(&mut vars, "x", VariableType::Double);
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let four = builder.double(4.0);
            let root = builder.apply(|f| f.sqrt(four)).unwrap();
            builder.assign(root, x).unwrap();
            builder.finish()
        };
        let err = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut RefusingBackend)
            .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_direct_executor_folds_literals() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let x = alias(&mut vars, "x", VariableType::Double);
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let four = builder.double(4.0);
            let one = builder.double(1.0);
            let root = builder.apply(|f| f.sqrt(four)).unwrap();
            let sum = builder.apply(|f| f.add(root, one)).unwrap();
            builder.assign(sum, x).unwrap();
            builder.finish()
        };
        let mut store = ValueStore::new();
        let mut rng = MatrixRng::new();
        let mut backend = DirectExecutor::new(&mut store, &mut rng);
        let stats = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut backend)
            .unwrap();
        assert_eq!(stats.removed_constants, 2);
        let src = seq.instructions[0].input(0).unwrap();
        assert_eq!(vars[src].literal_double(), Some(3.0));
    }

    #[test]
    fn test_matrix_reuse_needs_strict_gap() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let a = alias(&mut vars, "A", VariableType::Matrix);
        let b = alias(&mut vars, "B", VariableType::Matrix);
        let c = alias(&mut vars, "C", VariableType::Matrix);
        // A = (B')' + (C')'
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let t0 = builder.apply(|f| f.transpose(b)).unwrap();
            let t1 = builder.apply(|f| f.transpose(t0)).unwrap();
            let t2 = builder.apply(|f| f.transpose(c)).unwrap();
            let t3 = builder.apply(|f| f.transpose(t2)).unwrap();
            let t4 = builder.apply(|f| f.add(t1, t3)).unwrap();
            builder.assign(t4, a).unwrap();
            builder.finish()
        };
        let stats = Optimizer::default()
            .optimize(&mut seq, &mut vars, &mut temps, &mut SourceEmitter::default())
            .unwrap();
        assert_eq!(stats.removed_temporaries.matrix, 1);
        assert_eq!(stats.temporaries_after.matrix, 3);
        // tm2 now writes into tm0
        assert_eq!(seq.instructions[2].output, seq.instructions[0].output);
    }

    #[test]
    fn test_scalar_reuse_allows_shared_instruction() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let x = alias(&mut vars, "x", VariableType::Double);
        let a = alias(&mut vars, "a", VariableType::Double);
        // x = ((a + 1) * 2) - 3, nothing folds under REDUCE_CONSTANTS
        let mut seq = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let (one, two, three) = (builder.integer(1), builder.integer(2), builder.integer(3));
            let t0 = builder.apply(|f| f.add(a, one)).unwrap();
            let t1 = builder.apply(|f| f.multiply(t0, two)).unwrap();
            let t2 = builder.apply(|f| f.subtract(t1, three)).unwrap();
            builder.assign(t2, x).unwrap();
            builder.finish()
        };
        let stats = Optimizer::new(ReducePolicy::REDUCE_CONSTANTS)
            .optimize(&mut seq, &mut vars, &mut temps, &mut SourceEmitter::default())
            .unwrap();
        assert_eq!(stats.removed_constants, 0);
        assert_eq!(stats.removed_temporaries.double, 1);
        let first = seq.instructions[0].output.unwrap();
        assert_eq!(seq.instructions[1].inputs[0], first);
        assert_eq!(seq.instructions[1].output, Some(first));
    }

    #[test]
    fn test_usage_roles_and_ranges() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let a = alias(&mut vars, "A", VariableType::Matrix);
        let b = alias(&mut vars, "B", VariableType::Matrix);
        let (seq, t0) = {
            let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
            let t0 = builder.apply(|f| f.transpose(b)).unwrap();
            let t1 = builder.apply(|f| f.multiply(t0, b)).unwrap();
            builder.assign(t1, a).unwrap();
            (builder.finish(), t0)
        };
        let usage = Usage::map(&seq, &vars);
        assert_eq!(usage.role(b), Some(UsageRole::Input));
        assert_eq!(usage.role(a), Some(UsageRole::Target));
        assert_eq!(usage.role(t0), Some(UsageRole::Temporary(Kind::Matrix)));
        assert_eq!(usage.live_range(t0), &[0, 1]);
        assert_eq!(usage.temporaries(Kind::Matrix).len(), 2);
    }

    #[test]
    fn test_stats_json() {
        let stats = OptimizeStats {
            removed_constants: 2,
            trailing_copy_removed: true,
            ..OptimizeStats::default()
        };
        let json = stats.to_json().unwrap();
        assert!(json.contains("\"removed_constants\": 2"));
        assert!(json.contains("\"trailing_copy_removed\": true"));
    }
}
