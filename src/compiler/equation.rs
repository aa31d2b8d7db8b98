//! # Equation context
//!
//! Owns everything one family of equations shares: the variable arena, the
//! temporary manager, live values and the user aliases. A sequence built with
//! [`Equation::builder`] is either executed now ([`Equation::execute`]) or
//! rendered as Rust ([`Equation::generate`], [`Equation::generate_function`]).
//!
//! ```ignore
//! let mut eq = Equation::new();
//! let a = eq.alias_matrix("A", Matrix::zeros(0, 0))?;
//! let b = eq.alias_matrix("B", b_value)?;
//! let mut seq = {
//!     let mut builder = eq.builder();
//!     let bt = builder.apply(|f| f.transpose(b))?;
//!     let prod = builder.apply(|f| f.multiply(b, bt))?;
//!     builder.assign(prod, a)?;
//!     builder.finish()
//! };
//! eq.execute(&mut seq, true)?;
//! ```

use super::emit::source::DEFAULT_KERNELS_PATH;
use super::emit::{Backend, DirectExecutor, SourceEmitter, Value, ValueStore};
use super::factory::SequenceBuilder;
use super::ir::{Kind, Sequence, VarId, Variable, VariableTable, VariableType};
use super::optimizer::{OptimizeStats, Optimizer, ReducePolicy};
use super::temp::{MatrixRng, TempManager};
use crate::error::{Error, Result};
use crate::kernels::Matrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Code generation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Run the optimizer before emitting
    pub optimize: bool,
    /// Which inputs constant folding treats as known
    pub reduce_policy: ReducePolicy,
    /// Indentation of emitted statements
    pub indent: String,
    /// Path of the kernels module in generated code
    pub kernels_path: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            reduce_policy: ReducePolicy::default(),
            indent: "    ".to_string(),
            kernels_path: DEFAULT_KERNELS_PATH.to_string(),
        }
    }
}

impl CompileOptions {
    /// Options from JSON; missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::failed("options", format!("Failed to parse options: {}", e)))
    }
}

/// Rendered source of one equation
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCode {
    /// Declarations of the temporaries
    pub header: String,
    /// Statements computing the equation
    pub body: String,
    /// Optimizer report, when optimization ran
    pub stats: Option<OptimizeStats>,
}

impl GeneratedCode {
    /// Header followed by body
    pub fn text(&self) -> String {
        format!("{}{}", self.header, self.body)
    }
}

/// Compilation context for matrix equations
#[derive(Debug, Clone, Default)]
pub struct Equation {
    vars: VariableTable,
    temps: TempManager,
    store: ValueStore,
    aliases: Vec<(String, VarId)>,
}

fn kind_of(ty: &VariableType) -> Kind {
    match ty {
        VariableType::Integer => Kind::Integer,
        VariableType::Double => Kind::Double,
        VariableType::Matrix => Kind::Matrix,
        VariableType::Sequence(_) => Kind::Sequence,
    }
}

impl Equation {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Variable arena
    pub fn vars(&self) -> &VariableTable {
        &self.vars
    }

    /// Temporary manager
    pub fn temps(&self) -> &TempManager {
        &self.temps
    }

    /// Live values
    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    /// Restart random number generation from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.temps.reseed(seed);
    }

    /// Declare a user variable without binding a value. Declaring an existing
    /// name returns its handle if the kind matches.
    pub fn declare(&mut self, name: &str, kind: Kind) -> Result<VarId> {
        let ty = match kind {
            Kind::Integer => VariableType::Integer,
            Kind::Double => VariableType::Double,
            Kind::Matrix => VariableType::Matrix,
            Kind::Sequence => return Err(Error::mismatch("alias", kind.name())),
        };
        if let Some(id) = self.lookup(name) {
            let existing = self.vars.kind(id);
            if existing != kind_of(&ty) {
                return Err(Error::AliasConflict {
                    name: name.to_string(),
                    existing: existing.name().to_string(),
                });
            }
            return Ok(id);
        }
        let id = self.vars.add(Variable::alias(name, ty));
        self.aliases.push((name.to_string(), id));
        debug!(name, kind = %kind, "declared alias");
        Ok(id)
    }

    /// Bind or rebind a matrix alias
    pub fn alias_matrix(&mut self, name: &str, value: Matrix) -> Result<VarId> {
        let id = self.declare(name, Kind::Matrix)?;
        self.store.set(id, Value::Matrix(value));
        Ok(id)
    }

    /// Bind or rebind a double alias
    pub fn alias_double(&mut self, name: &str, value: f64) -> Result<VarId> {
        let id = self.declare(name, Kind::Double)?;
        self.store.set(id, Value::Double(value));
        Ok(id)
    }

    /// Bind or rebind an integer alias
    pub fn alias_integer(&mut self, name: &str, value: i64) -> Result<VarId> {
        let id = self.declare(name, Kind::Integer)?;
        self.store.set(id, Value::Integer(value));
        Ok(id)
    }

    /// Handle of an alias
    pub fn lookup(&self, name: &str) -> Option<VarId> {
        self.aliases
            .iter()
            .find(|(alias, _)| alias == name)
            .map(|(_, id)| *id)
    }

    /// Aliases in declaration order
    pub fn aliases(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.aliases.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Value bound to an alias
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.lookup(name).and_then(|id| self.store.get(id))
    }

    /// Matrix bound to an alias
    pub fn matrix(&self, name: &str) -> Option<&Matrix> {
        self.value(name).and_then(Value::as_matrix)
    }

    /// Builder appending to a new sequence
    pub fn builder(&mut self) -> SequenceBuilder<'_> {
        SequenceBuilder::new(&mut self.vars, &mut self.temps)
    }

    /// Run a sequence against the bound values, optionally optimizing first.
    /// Temporary values are dropped afterwards; alias values persist.
    pub fn execute(&mut self, sequence: &mut Sequence, optimize: bool) -> Result<Option<OptimizeStats>> {
        let stats = if optimize {
            let mut scratch = ValueStore::new();
            let mut rng = MatrixRng::new();
            let mut folder = DirectExecutor::new(&mut scratch, &mut rng);
            let stats = Optimizer::default().optimize(sequence, &mut self.vars, &mut self.temps, &mut folder)?;
            Some(stats)
        } else {
            None
        };

        let temporaries = sequence.temporaries(&self.vars);
        let mut executor = DirectExecutor::new(&mut self.store, self.temps.rng());
        let mut unused = String::new();
        for id in &temporaries {
            executor.declare(&mut unused, "", &self.vars, *id)?;
        }
        let outcome = sequence.execute(&mut executor, &self.vars).map(|_| ());
        for id in &temporaries {
            self.store.remove(*id);
        }
        outcome?;
        debug!(instructions = sequence.len(), "executed sequence");
        Ok(stats)
    }

    /// Render a sequence as Rust statements, optionally optimizing first
    pub fn generate(&mut self, sequence: &mut Sequence, options: &CompileOptions) -> Result<GeneratedCode> {
        let mut emitter = SourceEmitter::new(options.kernels_path.as_str())
            .with_indent(options.indent.as_str())
            .with_output(sequence.output);
        let stats = if options.optimize {
            let mut optimizer = Optimizer::new(options.reduce_policy);
            Some(optimizer.optimize(sequence, &mut self.vars, &mut self.temps, &mut emitter)?)
        } else {
            None
        };

        let mut header = String::new();
        for id in sequence.temporaries(&self.vars) {
            emitter.declare(&mut header, &options.indent, &self.vars, id)?;
        }
        let body = sequence.execute(&mut emitter, &self.vars)?;
        debug!(
            instructions = sequence.len(),
            bytes = header.len() + body.len(),
            "generated source"
        );
        Ok(GeneratedCode { header, body, stats })
    }

    /// Render a complete function. Inputs become parameters in alias order
    /// (matrices by reference, scalars by value), the output is passed by
    /// `&mut` and an `rng` parameter is added when the sequence draws random
    /// numbers.
    pub fn generate_function(
        &mut self,
        name: &str,
        sequence: &mut Sequence,
        options: &CompileOptions,
    ) -> Result<String> {
        let code = self.generate(sequence, options)?;
        let k = options.kernels_path.as_str();
        let output = sequence.output;

        let mut params = Vec::new();
        for (alias, id) in &self.aliases {
            let ty = match (self.vars.kind(*id), Some(*id) == output) {
                (Kind::Matrix, false) => format!("&{}::Matrix", k),
                (Kind::Matrix, true) => format!("&mut {}::Matrix", k),
                (Kind::Double, false) => "f64".to_string(),
                (Kind::Double, true) => "&mut f64".to_string(),
                (Kind::Integer, false) => "i64".to_string(),
                (Kind::Integer, true) => "&mut i64".to_string(),
                (Kind::Sequence, _) => continue,
            };
            params.push(format!("{}: {}", alias, ty));
        }
        if sequence.iter().any(|info| info.primitive.is_random()) {
            params.push(format!("rng: &mut {}::MatrixRng", k));
        }

        Ok(format!(
            "pub fn {}({}) -> Result<(), {}::KernelError> {{\n{}{}{}Ok(())\n}}\n",
            name,
            params.join(", "),
            k,
            code.header,
            code.body,
            options.indent
        ))
    }

    /// Return every temporary of a finished sequence to the manager
    pub fn release_temporaries(&mut self, sequence: &Sequence) {
        for id in sequence.temporaries(&self.vars) {
            if self.temps.is_live(id) {
                self.temps.release(&self.vars, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_rebind_and_conflict() {
        let mut eq = Equation::new();
        let a = eq.alias_double("x", 1.0).unwrap();
        let b = eq.alias_double("x", 2.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(eq.value("x"), Some(&Value::Double(2.0)));
        let err = eq.alias_integer("x", 3).unwrap_err();
        assert!(matches!(err, Error::AliasConflict { .. }));
    }

    #[test]
    fn test_execute_transpose_product() {
        let mut eq = Equation::new();
        let a = eq.alias_matrix("A", Matrix::zeros(0, 0)).unwrap();
        let b = eq
            .alias_matrix("B", Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        let mut seq = {
            let mut builder = eq.builder();
            let bt = builder.apply(|f| f.transpose(b)).unwrap();
            let prod = builder.apply(|f| f.multiply(b, bt)).unwrap();
            builder.assign(prod, a).unwrap();
            builder.finish()
        };
        let stats = eq.execute(&mut seq, true).unwrap().unwrap();
        assert!(stats.trailing_copy_removed);
        let result = eq.matrix("A").unwrap();
        assert_eq!(result.shape(), (2, 2));
        assert_eq!(result[(0, 0)], 14.0);
        assert_eq!(result[(1, 0)], 32.0);
        // Only the aliases keep values
        assert_eq!(eq.store().len(), 2);
    }

    #[test]
    fn test_generate_function_signature() {
        let mut eq = Equation::new();
        let out = eq.declare("out", Kind::Matrix).unwrap();
        let a = eq.declare("a", Kind::Matrix).unwrap();
        let s = eq.declare("s", Kind::Double).unwrap();
        let mut seq = {
            let mut builder = eq.builder();
            let scaled = builder.apply(|f| f.multiply(a, s)).unwrap();
            builder.assign(scaled, out).unwrap();
            builder.finish()
        };
        let text = eq
            .generate_function("scale", &mut seq, &CompileOptions::default())
            .unwrap();
        assert!(text.starts_with(
            "pub fn scale(out: &mut mateq::kernels::Matrix, a: &mateq::kernels::Matrix, s: f64)"
        ));
        assert!(text.contains("*out = mateq::kernels::scale(a, s);"));
        assert!(text.trim_end().ends_with("Ok(())\n}"));
    }

    #[test]
    fn test_options_from_json() {
        let options = CompileOptions::from_json(r#"{"optimize": false, "reduce_policy": 1}"#).unwrap();
        assert!(!options.optimize);
        assert_eq!(options.reduce_policy, ReducePolicy::REDUCE_CONSTANTS);
        assert_eq!(options.kernels_path, DEFAULT_KERNELS_PATH);
        assert!(CompileOptions::from_json("{").is_err());
    }

    #[test]
    fn test_release_temporaries() {
        let mut eq = Equation::new();
        let a = eq.declare("A", Kind::Matrix).unwrap();
        let seq = {
            let mut builder = eq.builder();
            let t = builder.apply(|f| f.transpose(a)).unwrap();
            builder.assign(t, a).unwrap();
            builder.finish()
        };
        assert_eq!(eq.temps().live_count(), 1);
        eq.release_temporaries(&seq);
        assert_eq!(eq.temps().live_count(), 0);
        assert_eq!(eq.temps().released().matrix, 1);
    }
}
