//! # Intermediate Representation (IR) for matrix equations
//!
//! One equation compiles to a [`Sequence`] of [`Info`] instructions. The same
//! sequence is either executed directly against live values or optimized and
//! rendered as source text.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── variable.rs     # VarId, Variable, VariableType, IntegerSequence, VariableTable
//! ├── instruction.rs  # Primitive, Signature, DimensionHint, MatrixConstructor, Info
//! └── sequence.rs     # Sequence (ordered instruction list + output)
//! ```
//!
//! ## Key Types
//!
//! - [`VarId`] - Handle into the [`VariableTable`] arena; instructions never own variables
//! - [`Info`] - One instruction: `(Primitive, Signature)`, inputs, output, optional range
//! - [`Sequence`] - The compiled equation, rewritten in place by the optimizer
//!
//! ## Op names
//!
//! | Signature | Operands | Example |
//! |-----------|----------|---------|
//! | `mm` | matrix, matrix | `add-mm` |
//! | `ii` | integer, integer | `multiply-ii` |
//! | `ss` | scalar, scalar | `divide-ss` |
//! | `ms` / `sm` | matrix and scalar | `multiply-ms` |
//! | `m` / `s` / `i` | one operand | `neg-m` |
//! | `sm1` | scalar from a 1x1 matrix | `copy-sm1` |
//! | none | first operand decides | `extract`, `kron` |

mod instruction;
mod sequence;
mod variable;

// Re-export all public types
pub use instruction::{DimensionHint, Info, MatrixConstructor, Primitive, Signature};
pub use sequence::Sequence;
pub use variable::{
    double_name, format_double, has_free_identifiers, integer_name, precedence, IntegerSequence,
    Kind, VarId, Variable, VariableTable, VariableType,
};
