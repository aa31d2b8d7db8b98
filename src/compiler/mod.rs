//! # Equation Compiler - matrix equations to executable sequences
//!
//! This module compiles matrix equations into an instruction [`Sequence`]
//! that is either executed immediately or rendered as Rust source.
//!
//! ## Architecture
//!
//! ```text
//! Builder calls → OperationFactory → Sequence → Optimize → DirectExecutor (run now)
//!                                                        ↘ SourceEmitter  (Rust text)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use mateq::compiler::{CompileOptions, Equation};
//! use mateq::compiler::ir::Kind;
//!
//! let mut eq = Equation::new();
//! let out = eq.declare("out", Kind::Matrix)?;
//! let a = eq.declare("a", Kind::Matrix)?;
//! let mut seq = {
//!     let mut builder = eq.builder();
//!     let inv = builder.apply(|f| f.inv(a))?;
//!     builder.assign(inv, out)?;
//!     builder.finish()
//! };
//! let text = eq.generate_function("invert", &mut seq, &CompileOptions::default())?;
//! ```

pub mod debug;
pub mod emit;
pub mod equation;
pub mod extents;
pub mod factory;
pub mod ir;
pub mod optimizer;
pub mod temp;

pub use debug::{dump_sequence, format_instruction, format_sequence};
pub use emit::{Backend, DirectExecutor, SourceEmitter, Value, ValueStore};
pub use equation::{CompileOptions, Equation, GeneratedCode};
pub use extents::{Extent, Extents};
pub use factory::{OperationFactory, SequenceBuilder};
pub use ir::{Info, Sequence, VarId, VariableTable};
pub use optimizer::{OptimizeStats, Optimizer, ReducePolicy, Usage};
pub use temp::{MatrixRng, TempManager};
