//! Error types for the mateq compiler core

use thiserror::Error;

/// Compiler and execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Construction errors (user equation errors)
    /// Operand kinds are not valid for the primitive
    ///
    /// **Triggered by:** `transpose` of a scalar, `divide` of a scalar by a matrix,
    /// copying a double into an integer alias
    /// **Prevention:** Check the operand kinds accepted by each primitive
    #[error("Type mismatch in {op}: operands {operands}")]
    ShapeOrTypeMismatch {
        /// Primitive name
        op: String,
        /// Operand kinds, e.g. `matrix, double`
        operands: String,
    },

    /// Operand combination is recognized but intentionally not supported
    ///
    /// **Triggered by:** Complex scalars, matrix-by-matrix division, nested
    /// ranges inside a matrix literal
    #[error("Unsupported operand combination in {op}: {operands}")]
    UnsupportedOperandCombination {
        /// Primitive name
        op: String,
        /// Operand kinds
        operands: String,
    },

    // Internal contract violations
    /// An instruction reached a backend that has no rendering for it
    ///
    /// **Triggered by:** The factory and a backend being out of sync. This is a
    /// bug in the crate, never a user error.
    #[error("Unimplemented operation: {op}")]
    UnimplementedOperation {
        /// Full op name including the signature suffix, e.g. `kron-mm`
        op: String,
    },

    /// A range operand that is neither a scalar nor an integer sequence
    #[error("Invalid range operand: {name} is a {kind}")]
    InvalidRange {
        /// Variable name
        name: String,
        /// Variable kind
        kind: String,
    },

    /// Reference to a variable handle that does not exist in the table
    #[error("Unknown variable handle: {0}")]
    UnknownVariable(usize),

    // Runtime errors
    /// Numeric failure during direct execution
    ///
    /// **Triggered by:** Inverting a singular matrix, determinant of a non-square
    /// matrix, index outside the matrix, non-conformable shapes
    /// **Recovery:** Re-drive the equation with different inputs
    #[error("Operation {op} failed: {reason}")]
    OperationFailed {
        /// Full op name
        op: String,
        /// Failure reason
        reason: String,
    },

    /// A variable was read before any value was bound to it
    #[error("Variable has no value: {name}")]
    UnboundVariable {
        /// Variable name
        name: String,
    },

    /// Alias name collides with an alias of a different kind
    #[error("Alias {name} already bound as {existing}")]
    AliasConflict {
        /// Alias name
        name: String,
        /// Kind the alias currently has
        existing: String,
    },
}

/// Error category, used to tell user mistakes from crate bugs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The equation itself is wrong; report back to the user
    User,
    /// Factory and backend tables disagree; a bug in this crate
    Internal,
    /// Numeric failure while executing with live values
    Runtime,
}

impl Error {
    /// Create a type mismatch error for a primitive
    pub fn mismatch(op: impl Into<String>, operands: impl Into<String>) -> Self {
        Error::ShapeOrTypeMismatch {
            op: op.into(),
            operands: operands.into(),
        }
    }

    /// Create an unsupported-combination error for a primitive
    pub fn unsupported(op: impl Into<String>, operands: impl Into<String>) -> Self {
        Error::UnsupportedOperandCombination {
            op: op.into(),
            operands: operands.into(),
        }
    }

    /// Create an operation failure
    pub fn failed(op: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::OperationFailed {
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Classify error category
    pub fn classify(&self) -> ErrorCategory {
        match self {
            Error::ShapeOrTypeMismatch { .. } => ErrorCategory::User,
            Error::UnsupportedOperandCombination { .. } => ErrorCategory::User,
            Error::AliasConflict { .. } => ErrorCategory::User,

            Error::UnimplementedOperation { .. } => ErrorCategory::Internal,
            Error::InvalidRange { .. } => ErrorCategory::Internal,
            Error::UnknownVariable(_) => ErrorCategory::Internal,

            Error::OperationFailed { .. } => ErrorCategory::Runtime,
            Error::UnboundVariable { .. } => ErrorCategory::Runtime,
        }
    }

    /// True when the error points at a bug in this crate rather than the equation
    pub fn is_internal(&self) -> bool {
        self.classify() == ErrorCategory::Internal
    }
}

/// Result type for mateq operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_user_errors() {
        let err = Error::mismatch("transpose", "double");
        assert_eq!(err.classify(), ErrorCategory::User);
        assert!(err.to_string().contains("transpose"));
        assert!(err.to_string().contains("double"));
    }

    #[test]
    fn test_internal_errors_are_distinct() {
        let err = Error::UnimplementedOperation {
            op: "kron-ss".to_string(),
        };
        assert!(err.is_internal());
        assert!(!Error::failed("inv-m", "singular").is_internal());
    }
}
