//! # mateq - a matrix equation compiler core
//!
//! Builds matrix equations into a small intermediate representation, optimizes
//! them and either interprets them against live `nalgebra` matrices or emits
//! equivalent Rust source that calls the same kernels.
//!
//! ## Features
//!
//! - **Typed IR** - every instruction carries a `(primitive, signature)` pair
//!   chosen from the operand kinds (`add-mm`, `multiply-ms`, `copy-sm1`, ...)
//! - **Submatrix ranges** - `A(2:5, :)`, `A([1,3,5], :)` and flattened `A(4)`,
//!   classified once as contiguous blocks or explicit index lists
//! - **Optimizer** - constant folding, trailing-copy elimination and
//!   temporary reuse by live range
//! - **Two backends** - a direct executor and a Rust source emitter
//!
//! ## Quick Start
//!
//! ```rust
//! use mateq::compiler::Equation;
//! use mateq::kernels::Matrix;
//!
//! # fn main() -> mateq::Result<()> {
//! let mut eq = Equation::new();
//! let a = eq.alias_matrix("A", Matrix::zeros(0, 0))?;
//! let b = eq.alias_matrix("B", Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]))?;
//! let mut seq = {
//!     let mut builder = eq.builder();
//!     let bt = builder.apply(|f| f.transpose(b))?;
//!     let sum = builder.apply(|f| f.add(b, bt))?;
//!     builder.assign(sum, a)?;
//!     builder.finish()
//! };
//! eq.execute(&mut seq, true)?;
//! assert_eq!(eq.matrix("A").map(|m| m[(0, 1)]), Some(5.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`compiler`] - IR, factory, extent analysis, optimizer and backends
//! - [`kernels`] - dense matrix kernels shared by both backends
//! - [`error`] - error types

pub mod compiler;
pub mod error;
pub mod kernels;

pub use compiler::{CompileOptions, Equation, GeneratedCode};
pub use error::{Error, ErrorCategory, Result};
