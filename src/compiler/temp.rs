//! Temporary variable manager
//!
//! Hands out sequentially named temporaries (`ti0`, `td0`, `tm0`, ...) and
//! keeps the bookkeeping the optimizer reports on. Storage is never reused
//! here; releasing only moves a handle from the live set to the released set.
//!
//! The manager also owns the random number state used by `rand`, `randn`
//! and `rng`, seeded with a fixed default so runs are reproducible.

use super::ir::{Kind, VarId, Variable, VariableTable, VariableType};
use serde::Serialize;
use std::collections::BTreeSet;

/// Seed used until `rng(seed)` or [`TempManager::reseed`] is called
pub const DEFAULT_SEED: u64 = 0x9e3779b97f4a7c15;

const RNG_MULTIPLIER: u64 = 6364136223846793005;
const RNG_INCREMENT: u64 = 1;
const RNG_SHIFT: u32 = 11;
const RNG_SCALE: f64 = 1.0 / ((1u64 << 53) as f64);

/// 64-bit LCG with Box-Muller normals
#[derive(Debug, Clone)]
pub struct MatrixRng {
    state: u64,
    seed: u64,
    spare_normal: Option<f64>,
}

impl MatrixRng {
    /// Generator in its default state
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Generator seeded with `seed`
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: mix_seed(seed),
            seed,
            spare_normal: None,
        }
    }

    /// Restart the sequence from `seed`
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::with_seed(seed);
    }

    /// Seed the current sequence started from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform sample in `[0, 1)`
    pub fn uniform(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(RNG_MULTIPLIER)
            .wrapping_add(RNG_INCREMENT);
        ((self.state >> RNG_SHIFT) as f64) * RNG_SCALE
    }

    /// Standard normal sample
    pub fn normal(&mut self) -> f64 {
        if let Some(spare) = self.spare_normal.take() {
            return spare;
        }
        let mut u1 = self.uniform();
        while u1 <= f64::MIN_POSITIVE {
            u1 = self.uniform();
        }
        let u2 = self.uniform();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        self.spare_normal = Some(radius * angle.sin());
        radius * angle.cos()
    }
}

impl Default for MatrixRng {
    fn default() -> Self {
        Self::new()
    }
}

fn mix_seed(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    let mixed = z ^ (z >> 31);
    if mixed == 0 {
        DEFAULT_SEED
    } else {
        mixed
    }
}

/// Per-kind counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Integer temporaries
    pub integer: usize,
    /// Double temporaries
    pub double: usize,
    /// Matrix temporaries
    pub matrix: usize,
}

impl KindCounts {
    /// Sum over all kinds
    pub fn total(&self) -> usize {
        self.integer + self.double + self.matrix
    }

    pub(crate) fn bump(&mut self, kind: Kind) {
        match kind {
            Kind::Integer => self.integer += 1,
            Kind::Double => self.double += 1,
            Kind::Matrix => self.matrix += 1,
            Kind::Sequence => {}
        }
    }
}

/// Counter state captured by [`TempManager::checkpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    created: KindCounts,
    table_len: usize,
}

/// Arena allocator for temporaries
#[derive(Debug, Clone, Default)]
pub struct TempManager {
    created: KindCounts,
    released: KindCounts,
    live: BTreeSet<VarId>,
    rng: MatrixRng,
}

impl TempManager {
    /// Create a manager with zeroed counters and the default seed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh integer temporary `ti<n>`
    pub fn create_integer(&mut self, vars: &mut VariableTable) -> VarId {
        let name = format!("ti{}", self.created.integer);
        self.create(vars, name, VariableType::Integer)
    }

    /// Fresh double temporary `td<n>`
    pub fn create_double(&mut self, vars: &mut VariableTable) -> VarId {
        let name = format!("td{}", self.created.double);
        self.create(vars, name, VariableType::Double)
    }

    /// Fresh matrix temporary `tm<n>`
    pub fn create_matrix(&mut self, vars: &mut VariableTable) -> VarId {
        let name = format!("tm{}", self.created.matrix);
        self.create(vars, name, VariableType::Matrix)
    }

    /// Fresh temporary of the given scalar or matrix kind
    pub fn create_kind(&mut self, vars: &mut VariableTable, kind: Kind) -> VarId {
        match kind {
            Kind::Integer => self.create_integer(vars),
            Kind::Double => self.create_double(vars),
            _ => self.create_matrix(vars),
        }
    }

    fn create(&mut self, vars: &mut VariableTable, name: String, ty: VariableType) -> VarId {
        let var = Variable::temporary(name, ty);
        let kind = var.kind();
        let id = vars.add(var);
        self.created.bump(kind);
        self.live.insert(id);
        id
    }

    /// Return a temporary to the pool
    pub fn release(&mut self, vars: &VariableTable, id: VarId) {
        if !self.live.remove(&id) {
            tracing::warn!("release of {} which is not a live temporary", id);
            return;
        }
        let kind = vars.get(id).map(|v| v.kind()).unwrap_or(Kind::Sequence);
        self.released.bump(kind);
    }

    /// True if the handle is a temporary that has not been released
    pub fn is_live(&self, id: VarId) -> bool {
        self.live.contains(&id)
    }

    /// Temporaries created so far, per kind
    pub fn created(&self) -> KindCounts {
        self.created
    }

    /// Temporaries released so far, per kind
    pub fn released(&self) -> KindCounts {
        self.released
    }

    /// Number of live temporaries
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Capture counters before a construction that may fail
    pub fn checkpoint(&self, vars: &VariableTable) -> Checkpoint {
        Checkpoint {
            created: self.created,
            table_len: vars.len(),
        }
    }

    /// Undo every temporary and variable created since `checkpoint`
    pub fn rollback(&mut self, vars: &mut VariableTable, checkpoint: Checkpoint) {
        self.created = checkpoint.created;
        self.live.retain(|id| id.index() < checkpoint.table_len);
        vars.truncate(checkpoint.table_len);
    }

    /// Random number state
    pub fn rng(&mut self) -> &mut MatrixRng {
        &mut self.rng
    }

    /// Restart random number generation from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_names() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let a = temps.create_matrix(&mut vars);
        let b = temps.create_matrix(&mut vars);
        let i = temps.create_integer(&mut vars);
        let d = temps.create_double(&mut vars);
        assert_eq!(vars[a].name, "tm0");
        assert_eq!(vars[b].name, "tm1");
        assert_eq!(vars[i].name, "ti0");
        assert_eq!(vars[d].name, "td0");
        assert_eq!(temps.created().total(), 4);
        assert_eq!(temps.live_count(), 4);
    }

    #[test]
    fn test_release_is_bookkeeping_only() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        let a = temps.create_matrix(&mut vars);
        temps.release(&vars, a);
        temps.release(&vars, a);
        assert_eq!(temps.released().matrix, 1);
        assert!(!temps.is_live(a));
        // names keep increasing after a release
        let b = temps.create_matrix(&mut vars);
        assert_eq!(vars[b].name, "tm1");
    }

    #[test]
    fn test_rollback_restores_counters() {
        let mut vars = VariableTable::new();
        let mut temps = TempManager::new();
        temps.create_double(&mut vars);
        let checkpoint = temps.checkpoint(&vars);
        temps.create_double(&mut vars);
        temps.create_matrix(&mut vars);
        temps.rollback(&mut vars, checkpoint);
        assert_eq!(temps.created().double, 1);
        assert_eq!(temps.created().matrix, 0);
        assert_eq!(temps.live_count(), 1);
        let again = temps.create_double(&mut vars);
        assert_eq!(vars[again].name, "td1");
    }

    #[test]
    fn test_rng_is_reproducible() {
        let mut a = MatrixRng::new();
        let mut b = MatrixRng::new();
        let xs: Vec<f64> = (0..5).map(|_| a.uniform()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.uniform()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0.0..1.0).contains(x)));

        a.reseed(42);
        b.reseed(42);
        assert_eq!(a.normal(), b.normal());
        assert_eq!(a.seed(), 42);
    }
}
