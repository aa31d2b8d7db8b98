//! # Code Emission Layer
//!
//! One [`Backend`] trait, two implementations sharing the same dispatch shape:
//!
//! | Backend | "Emitting" an instruction means |
//! |---------|---------------------------------|
//! | [`DirectExecutor`] | running it now against a [`ValueStore`] |
//! | [`SourceEmitter`] | appending Rust statements that run it later |
//!
//! Dispatch is keyed by `(Primitive, Signature)`. Ranged copies and matrix
//! literals are handled before the generic table because they need the
//! extent analyzer or the constructor payload. A pair neither table knows is
//! reported as [`Error::UnimplementedOperation`].

pub mod direct;
pub mod source;

pub use direct::DirectExecutor;
pub use source::SourceEmitter;

use super::ir::{format_double, precedence, Info, Kind, Primitive, Signature, VarId, VariableTable};
use crate::error::{Error, Result};
use crate::kernels::{self, Matrix};
use std::collections::HashMap;

/// Result of folding a constant scalar instruction
#[derive(Debug, Clone, PartialEq)]
pub struct FoldedScalar {
    /// Expression text of the value
    pub text: String,
    /// Precedence of the expression
    pub precedence: u8,
}

impl FoldedScalar {
    /// Integer value
    pub fn integer(value: i64) -> Self {
        Self {
            text: value.to_string(),
            precedence: if value < 0 {
                precedence::UNARY
            } else {
                precedence::ATOM
            },
        }
    }

    /// Double value
    pub fn double(value: f64) -> Self {
        Self {
            text: format_double(value),
            precedence: if value.is_sign_negative() {
                precedence::UNARY
            } else {
                precedence::ATOM
            },
        }
    }
}

/// Capability shared by the interpreter and the source generator
pub trait Backend {
    /// Emit one instruction into `buffer`
    fn emit_operation(&mut self, buffer: &mut String, info: &Info, vars: &VariableTable) -> Result<()>;

    /// Declare storage for a variable
    fn declare(&mut self, buffer: &mut String, indent: &str, vars: &VariableTable, id: VarId) -> Result<()>;

    /// Evaluate a scalar instruction whose inputs are constant, without
    /// emitting it. `None` when this backend cannot fold it.
    fn fold_constant(&mut self, info: &Info, vars: &VariableTable) -> Result<Option<FoldedScalar>>;

    /// Canonical integer zero
    fn zero(&self) -> VarId {
        VariableTable::ZERO
    }

    /// Canonical integer one
    fn one(&self) -> VarId {
        VariableTable::ONE
    }
}

/// Error for an instruction no backend table covers
pub fn unimplemented(info: &Info) -> Error {
    Error::UnimplementedOperation { op: info.op_name() }
}

/// Integer-valued primitives on integer operands. `None` on overflow,
/// division by zero or a primitive with no integer closed form.
pub fn integer_arithmetic(primitive: Primitive, args: &[i64]) -> Option<i64> {
    match (primitive, args) {
        (Primitive::Add, [a, b]) => a.checked_add(*b),
        (Primitive::Subtract, [a, b]) => a.checked_sub(*b),
        (Primitive::Multiply, [a, b]) => a.checked_mul(*b),
        (Primitive::Divide, [a, b]) => a.checked_div(*b),
        (Primitive::Neg, [a]) => a.checked_neg(),
        (Primitive::Abs, [a]) => a.checked_abs(),
        (Primitive::Max | Primitive::Min | Primitive::Copy, [a]) => Some(*a),
        _ => None,
    }
}

/// Double-valued primitives on scalar operands
pub fn scalar_function(primitive: Primitive, signature: Signature, args: &[f64]) -> Option<f64> {
    use Primitive as P;
    use Signature as S;
    let x = *args.first()?;
    let y = args.get(1).copied();
    let value = match (primitive, signature) {
        (P::Add, S::Ss) => x + y?,
        (P::Subtract, S::Ss) => x - y?,
        (P::Multiply, S::Ss) => x * y?,
        (P::Divide, S::Ss) => x / y?,
        (P::ElementPow, S::Ss) => x.powf(y?),
        (P::Atan2, S::Ss) => x.atan2(y?),
        (P::NormP, S::Ss) => x.abs(),
        (P::Copy, S::Ss) => x,
        (P::Neg, S::S) => -x,
        (P::Inverse, S::S) => 1.0 / x,
        (P::PseudoInverse, S::S) => kernels::pinv_scalar(x),
        (P::Rref, S::S) => kernels::rref_scalar(x),
        (P::Det | P::Max | P::Min | P::Sum, S::S) => x,
        (P::NormF | P::Abs, S::S) => x.abs(),
        (P::Sqrt, S::S | S::I) => x.sqrt(),
        (P::Sin, S::S | S::I) => x.sin(),
        (P::Cos, S::S | S::I) => x.cos(),
        (P::Atan, S::S | S::I) => x.atan(),
        (P::Exp, S::S | S::I) => x.exp(),
        (P::Log, S::S | S::I) => x.ln(),
        _ => return None,
    };
    Some(value)
}

/// Live value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer scalar
    Integer(i64),
    /// Double scalar
    Double(f64),
    /// Matrix
    Matrix(Matrix),
}

impl Value {
    /// Kind of the value
    pub fn kind(&self) -> Kind {
        match self {
            Value::Integer(_) => Kind::Integer,
            Value::Double(_) => Kind::Double,
            Value::Matrix(_) => Kind::Matrix,
        }
    }

    /// Empty value of a kind, used when declaring storage
    pub fn zero(kind: Kind) -> Option<Self> {
        match kind {
            Kind::Integer => Some(Value::Integer(0)),
            Kind::Double => Some(Value::Double(0.0)),
            Kind::Matrix => Some(Value::Matrix(Matrix::zeros(0, 0))),
            Kind::Sequence => None,
        }
    }

    /// Matrix payload
    pub fn as_matrix(&self) -> Option<&Matrix> {
        match self {
            Value::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

/// Storage for the values of one equation context
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    values: HashMap<VarId, Value>,
}

impl ValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value
    pub fn set(&mut self, id: VarId, value: Value) {
        self.values.insert(id, value);
    }

    /// Value bound to a handle
    pub fn get(&self, id: VarId) -> Option<&Value> {
        self.values.get(&id)
    }

    /// Unbind and return a value
    pub fn remove(&mut self, id: VarId) -> Option<Value> {
        self.values.remove(&id)
    }

    /// True if a value is bound
    pub fn contains(&self, id: VarId) -> bool {
        self.values.contains_key(&id)
    }

    /// Number of bound values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Move a matrix out of the store so it can be written in place
    pub fn take_matrix(&mut self, id: VarId) -> Option<Matrix> {
        match self.values.remove(&id) {
            Some(Value::Matrix(m)) => Some(m),
            Some(other) => {
                self.values.insert(id, other);
                None
            }
            None => None,
        }
    }

    fn unbound(vars: &VariableTable, id: VarId) -> Error {
        Error::UnboundVariable {
            name: vars
                .get(id)
                .map_or_else(|| id.to_string(), |v| v.name.clone()),
        }
    }

    fn wrong_kind(vars: &VariableTable, id: VarId, expected: &str, value: &Value) -> Error {
        Error::failed(
            "read",
            format!("{} holds a {}, expected {}", vars[id].name, value.kind(), expected),
        )
    }

    /// Integer value of a literal or bound variable
    pub fn integer(&self, vars: &VariableTable, id: VarId) -> Result<i64> {
        let var = vars.get(id).ok_or(Error::UnknownVariable(id.index()))?;
        if var.is_literal() {
            return var.literal_integer().ok_or_else(|| Self::unbound(vars, id));
        }
        match self.values.get(&id) {
            Some(Value::Integer(v)) => Ok(*v),
            Some(other) => Err(Self::wrong_kind(vars, id, "integer", other)),
            None => Err(Self::unbound(vars, id)),
        }
    }

    /// Double value of a literal or bound scalar; integers are widened
    pub fn double(&self, vars: &VariableTable, id: VarId) -> Result<f64> {
        let var = vars.get(id).ok_or(Error::UnknownVariable(id.index()))?;
        if var.is_literal() {
            return var.literal_double().ok_or_else(|| Self::unbound(vars, id));
        }
        match self.values.get(&id) {
            Some(Value::Integer(v)) => Ok(*v as f64),
            Some(Value::Double(v)) => Ok(*v),
            Some(other) => Err(Self::wrong_kind(vars, id, "scalar", other)),
            None => Err(Self::unbound(vars, id)),
        }
    }

    /// Index value of an integer, or of a double holding a whole number
    pub fn index(&self, vars: &VariableTable, id: VarId) -> Result<i64> {
        match vars.kind(id) {
            Kind::Double => {
                let value = self.double(vars, id)?;
                if value.fract() != 0.0 {
                    return Err(Error::failed("index", format!("{} is not a whole number", value)));
                }
                Ok(value as i64)
            }
            _ => self.integer(vars, id),
        }
    }

    /// Matrix bound to a variable
    pub fn matrix(&self, vars: &VariableTable, id: VarId) -> Result<&Matrix> {
        match self.values.get(&id) {
            Some(Value::Matrix(m)) => Ok(m),
            Some(other) => Err(Self::wrong_kind(vars, id, "matrix", other)),
            None => Err(Self::unbound(vars, id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Variable, VariableType};

    #[test]
    fn test_integer_closed_forms() {
        assert_eq!(integer_arithmetic(Primitive::Divide, &[-7, 2]), Some(-3));
        assert_eq!(integer_arithmetic(Primitive::Divide, &[7, 0]), None);
        assert_eq!(integer_arithmetic(Primitive::Neg, &[i64::MIN]), None);
        assert_eq!(integer_arithmetic(Primitive::Transpose, &[1]), None);
    }

    #[test]
    fn test_store_reads_literals_and_widens() {
        let mut vars = VariableTable::new();
        let n = vars.add(Variable::alias("n", VariableType::Integer));
        let two = vars.double(2.5);
        let mut store = ValueStore::new();
        assert!(matches!(
            store.integer(&vars, n),
            Err(Error::UnboundVariable { .. })
        ));
        store.set(n, Value::Integer(4));
        assert_eq!(store.double(&vars, n).unwrap(), 4.0);
        assert_eq!(store.double(&vars, two).unwrap(), 2.5);
        assert_eq!(store.integer(&vars, VariableTable::ONE).unwrap(), 1);
        assert!(store.matrix(&vars, n).is_err());
        assert!(store.take_matrix(n).is_none());
        assert!(store.contains(n));
    }

    #[test]
    fn test_folded_precedence() {
        assert_eq!(FoldedScalar::integer(-2).precedence, precedence::UNARY);
        assert_eq!(FoldedScalar::double(1.5).text, "1.5");
        assert_eq!(FoldedScalar::double(3.0).text, "3.0");
    }
}
