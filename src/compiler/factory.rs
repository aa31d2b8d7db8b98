//! # Operation Factory
//!
//! Builds one [`Info`] per primitive call. Every method inspects the kinds of
//! its operands, picks the matching [`Signature`], allocates the output
//! temporary and records where the output shape comes from.
//!
//! Kind errors come in two flavours:
//! - [`Error::ShapeOrTypeMismatch`] when the combination makes no sense
//!   (`transpose` of a scalar)
//! - [`Error::UnsupportedOperandCombination`] when it is recognized but not
//!   implemented (matrix-by-matrix `divide`, complex literals)
//!
//! A failed call leaves the [`TempManager`] and the [`VariableTable`] exactly
//! as they were.

use super::extents;
use super::ir::{
    DimensionHint, Info, IntegerSequence, Kind, MatrixConstructor, Primitive, Sequence, Signature,
    VarId, VariableTable,
};
use super::temp::TempManager;
use crate::error::{Error, Result};
use DimensionHint::{LhsCols, LhsRows, RhsCols, RhsRows};

/// Creates instructions and their output temporaries
pub struct OperationFactory<'a> {
    vars: &'a mut VariableTable,
    temps: &'a mut TempManager,
}

impl<'a> OperationFactory<'a> {
    /// Factory allocating into `vars` through `temps`
    pub fn new(vars: &'a mut VariableTable, temps: &'a mut TempManager) -> Self {
        Self { vars, temps }
    }

    /// Variable table being built
    pub fn vars(&mut self) -> &mut VariableTable {
        &mut *self.vars
    }

    fn kind(&self, id: VarId) -> Result<Kind> {
        self.vars
            .get(id)
            .map(|v| v.kind())
            .ok_or(Error::UnknownVariable(id.index()))
    }

    fn mismatch(&self, primitive: Primitive, operands: &[VarId]) -> Error {
        Error::mismatch(primitive.name(), self.vars.describe(operands))
    }

    fn unsupported(&self, primitive: Primitive, operands: &[VarId]) -> Error {
        Error::unsupported(primitive.name(), self.vars.describe(operands))
    }

    /// Run a construction, undoing every allocation if it fails
    fn build<F>(&mut self, f: F) -> Result<Info>
    where
        F: FnOnce(&mut Self) -> Result<Info>,
    {
        let checkpoint = self.temps.checkpoint(self.vars);
        let result = f(self);
        if result.is_err() {
            self.temps.rollback(self.vars, checkpoint);
        }
        result
    }

    fn emit(
        &mut self,
        primitive: Primitive,
        signature: Signature,
        inputs: &[VarId],
        output: Kind,
        dimensions: &[DimensionHint],
    ) -> Info {
        let mut info = Info::new(primitive, signature);
        info.inputs = inputs.to_vec();
        info.output = Some(self.temps.create_kind(self.vars, output));
        info.dimensions = dimensions.to_vec();
        info
    }

    // =========================================================================
    // ARITHMETIC
    // =========================================================================

    fn arithmetic(&mut self, primitive: Primitive, a: VarId, b: VarId) -> Result<Info> {
        self.build(|f| {
            let sig = match (f.kind(a)?, f.kind(b)?) {
                (Kind::Matrix, Kind::Matrix) => {
                    let dims = if primitive == Primitive::Multiply {
                        [LhsRows, RhsCols]
                    } else {
                        [LhsRows, LhsCols]
                    };
                    return Ok(f.emit(primitive, Signature::Mm, &[a, b], Kind::Matrix, &dims));
                }
                (Kind::Integer, Kind::Integer) => Signature::Ii,
                (ka, kb) if ka.is_scalar() && kb.is_scalar() => Signature::Ss,
                (Kind::Matrix, kb) if kb.is_scalar() => {
                    return Ok(f.emit(primitive, Signature::Ms, &[a, b], Kind::Matrix, &[LhsRows, LhsCols]));
                }
                (ka, Kind::Matrix) if ka.is_scalar() => {
                    return Ok(f.emit(primitive, Signature::Sm, &[a, b], Kind::Matrix, &[RhsRows, RhsCols]));
                }
                _ => return Err(f.mismatch(primitive, &[a, b])),
            };
            let out = if sig == Signature::Ii {
                Kind::Integer
            } else {
                Kind::Double
            };
            Ok(f.emit(primitive, sig, &[a, b], out, &[]))
        })
    }

    /// `a + b`
    pub fn add(&mut self, a: VarId, b: VarId) -> Result<Info> {
        self.arithmetic(Primitive::Add, a, b)
    }

    /// `a - b`
    pub fn subtract(&mut self, a: VarId, b: VarId) -> Result<Info> {
        self.arithmetic(Primitive::Subtract, a, b)
    }

    /// `a * b`
    pub fn multiply(&mut self, a: VarId, b: VarId) -> Result<Info> {
        self.arithmetic(Primitive::Multiply, a, b)
    }

    /// `a / b`; matrix divisors are rejected
    pub fn divide(&mut self, a: VarId, b: VarId) -> Result<Info> {
        match (self.kind(a)?, self.kind(b)?) {
            (Kind::Matrix, Kind::Matrix) => Err(self.unsupported(Primitive::Divide, &[a, b])),
            (ka, Kind::Matrix) if ka.is_scalar() => Err(self.mismatch(Primitive::Divide, &[a, b])),
            _ => self.arithmetic(Primitive::Divide, a, b),
        }
    }

    /// `-a`
    pub fn neg(&mut self, a: VarId) -> Result<Info> {
        self.same_kind_unary(Primitive::Neg, a)
    }

    /// `a .* b`; any scalar operand lowers to `multiply`
    pub fn element_mult(&mut self, a: VarId, b: VarId) -> Result<Info> {
        match (self.kind(a)?, self.kind(b)?) {
            (Kind::Matrix, Kind::Matrix) => self.build(|f| {
                Ok(f.emit(Primitive::ElementMult, Signature::Mm, &[a, b], Kind::Matrix, &[LhsRows, LhsCols]))
            }),
            _ => self.multiply(a, b),
        }
    }

    /// `a ./ b`; `mm` and `sm` are element-wise, everything else lowers to `divide`
    pub fn element_division(&mut self, a: VarId, b: VarId) -> Result<Info> {
        match (self.kind(a)?, self.kind(b)?) {
            (Kind::Matrix, Kind::Matrix) => self.build(|f| {
                Ok(f.emit(Primitive::ElementDivision, Signature::Mm, &[a, b], Kind::Matrix, &[LhsRows, LhsCols]))
            }),
            (ka, Kind::Matrix) if ka.is_scalar() => self.build(|f| {
                Ok(f.emit(Primitive::ElementDivision, Signature::Sm, &[a, b], Kind::Matrix, &[RhsRows, RhsCols]))
            }),
            _ => self.divide(a, b),
        }
    }

    /// `a .^ b`; two scalars always produce a double
    pub fn element_pow(&mut self, a: VarId, b: VarId) -> Result<Info> {
        let p = Primitive::ElementPow;
        self.build(|f| match (f.kind(a)?, f.kind(b)?) {
            (Kind::Matrix, Kind::Matrix) => Ok(f.emit(p, Signature::Mm, &[a, b], Kind::Matrix, &[LhsRows, LhsCols])),
            (Kind::Matrix, kb) if kb.is_scalar() => {
                Ok(f.emit(p, Signature::Ms, &[a, b], Kind::Matrix, &[LhsRows, LhsCols]))
            }
            (ka, Kind::Matrix) if ka.is_scalar() => {
                Ok(f.emit(p, Signature::Sm, &[a, b], Kind::Matrix, &[RhsRows, RhsCols]))
            }
            (ka, kb) if ka.is_scalar() && kb.is_scalar() => Ok(f.emit(p, Signature::Ss, &[a, b], Kind::Double, &[])),
            _ => Err(f.mismatch(p, &[a, b])),
        })
    }

    /// Unary op whose output kind follows the operand: `m`, `i` or `s`
    fn same_kind_unary(&mut self, primitive: Primitive, a: VarId) -> Result<Info> {
        self.build(|f| match f.kind(a)? {
            Kind::Matrix => Ok(f.emit(primitive, Signature::M, &[a], Kind::Matrix, &[LhsRows, LhsCols])),
            Kind::Integer => Ok(f.emit(primitive, Signature::I, &[a], Kind::Integer, &[])),
            Kind::Double => Ok(f.emit(primitive, Signature::S, &[a], Kind::Double, &[])),
            Kind::Sequence => Err(f.mismatch(primitive, &[a])),
        })
    }

    /// Matrix op with a `matrix_out` result, or a double for any scalar operand
    fn matrix_or_scalar(
        &mut self,
        primitive: Primitive,
        a: VarId,
        matrix_out: Kind,
        dimensions: &[DimensionHint],
    ) -> Result<Info> {
        self.build(|f| match f.kind(a)? {
            Kind::Matrix => Ok(f.emit(primitive, Signature::M, &[a], matrix_out, dimensions)),
            k if k.is_scalar() => Ok(f.emit(primitive, Signature::S, &[a], Kind::Double, &[])),
            _ => Err(f.mismatch(primitive, &[a])),
        })
    }

    fn matrix_only(
        &mut self,
        primitive: Primitive,
        signature: Signature,
        a: VarId,
        output: Kind,
        dimensions: &[DimensionHint],
    ) -> Result<Info> {
        self.build(|f| match f.kind(a)? {
            Kind::Matrix => Ok(f.emit(primitive, signature, &[a], output, dimensions)),
            _ => Err(f.mismatch(primitive, &[a])),
        })
    }

    fn matrix_pair(&mut self, primitive: Primitive, a: VarId, b: VarId, output: Kind) -> Result<Info> {
        self.build(|f| match (f.kind(a)?, f.kind(b)?) {
            (Kind::Matrix, Kind::Matrix) => Ok(f.emit(primitive, Signature::Bare, &[a, b], output, &[])),
            _ => Err(f.mismatch(primitive, &[a, b])),
        })
    }

    // =========================================================================
    // LINEAR ALGEBRA
    // =========================================================================

    /// `a'`
    pub fn transpose(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::Transpose, Signature::M, a, Kind::Matrix, &[LhsCols, LhsRows])
    }

    /// `inv(a)`
    pub fn inv(&mut self, a: VarId) -> Result<Info> {
        self.matrix_or_scalar(Primitive::Inverse, a, Kind::Matrix, &[LhsRows, LhsCols])
    }

    /// `pinv(a)`
    pub fn pinv(&mut self, a: VarId) -> Result<Info> {
        self.matrix_or_scalar(Primitive::PseudoInverse, a, Kind::Matrix, &[LhsCols, LhsRows])
    }

    /// `rref(a)`
    pub fn rref(&mut self, a: VarId) -> Result<Info> {
        self.matrix_or_scalar(Primitive::Rref, a, Kind::Matrix, &[LhsRows, LhsCols])
    }

    /// `det(a)`
    pub fn det(&mut self, a: VarId) -> Result<Info> {
        self.matrix_or_scalar(Primitive::Det, a, Kind::Double, &[])
    }

    /// `trace(a)`
    pub fn trace(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::Trace, Signature::M, a, Kind::Double, &[])
    }

    /// `normF(a)`
    pub fn norm_f(&mut self, a: VarId) -> Result<Info> {
        self.matrix_or_scalar(Primitive::NormF, a, Kind::Double, &[])
    }

    /// `normP(a, p)`
    pub fn norm_p(&mut self, a: VarId, p: VarId) -> Result<Info> {
        let prim = Primitive::NormP;
        self.build(|f| match (f.kind(a)?, f.kind(p)?) {
            (Kind::Matrix, kp) if kp.is_scalar() => Ok(f.emit(prim, Signature::Ms, &[a, p], Kind::Double, &[])),
            (ka, kp) if ka.is_scalar() && kp.is_scalar() => Ok(f.emit(prim, Signature::Ss, &[a, p], Kind::Double, &[])),
            _ => Err(f.mismatch(prim, &[a, p])),
        })
    }

    /// `kron(a, b)`
    pub fn kron(&mut self, a: VarId, b: VarId) -> Result<Info> {
        self.matrix_pair(Primitive::Kron, a, b, Kind::Matrix)
    }

    /// `dot(a, b)`
    pub fn dot(&mut self, a: VarId, b: VarId) -> Result<Info> {
        self.matrix_pair(Primitive::Dot, a, b, Kind::Double)
    }

    /// `solve(a, b)`
    pub fn solve(&mut self, a: VarId, b: VarId) -> Result<Info> {
        self.matrix_pair(Primitive::Solve, a, b, Kind::Matrix)
    }

    // =========================================================================
    // REDUCTIONS AND ELEMENT FUNCTIONS
    // =========================================================================

    fn reduction(&mut self, primitive: Primitive, a: VarId) -> Result<Info> {
        self.build(|f| match f.kind(a)? {
            Kind::Matrix => Ok(f.emit(primitive, Signature::M, &[a], Kind::Double, &[])),
            Kind::Integer => Ok(f.emit(primitive, Signature::I, &[a], Kind::Integer, &[])),
            Kind::Double => Ok(f.emit(primitive, Signature::S, &[a], Kind::Double, &[])),
            Kind::Sequence => Err(f.mismatch(primitive, &[a])),
        })
    }

    /// Largest element
    pub fn max(&mut self, a: VarId) -> Result<Info> {
        self.reduction(Primitive::Max, a)
    }

    /// Per-row maxima
    pub fn max_rows(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::MaxRows, Signature::Bare, a, Kind::Matrix, &[])
    }

    /// Per-column maxima
    pub fn max_cols(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::MaxCols, Signature::Bare, a, Kind::Matrix, &[])
    }

    /// Smallest element
    pub fn min(&mut self, a: VarId) -> Result<Info> {
        self.reduction(Primitive::Min, a)
    }

    /// Per-row minima
    pub fn min_rows(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::MinRows, Signature::Bare, a, Kind::Matrix, &[])
    }

    /// Per-column minima
    pub fn min_cols(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::MinCols, Signature::Bare, a, Kind::Matrix, &[])
    }

    /// Sum of all elements
    pub fn sum(&mut self, a: VarId) -> Result<Info> {
        self.matrix_or_scalar(Primitive::Sum, a, Kind::Double, &[])
    }

    /// Per-row sums
    pub fn sum_rows(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::SumRows, Signature::Bare, a, Kind::Matrix, &[])
    }

    /// Per-column sums
    pub fn sum_cols(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::SumCols, Signature::Bare, a, Kind::Matrix, &[])
    }

    /// `abs(a)`
    pub fn abs(&mut self, a: VarId) -> Result<Info> {
        self.same_kind_unary(Primitive::Abs, a)
    }

    fn element_function(&mut self, primitive: Primitive, a: VarId) -> Result<Info> {
        self.build(|f| match f.kind(a)? {
            Kind::Matrix => Ok(f.emit(primitive, Signature::M, &[a], Kind::Matrix, &[LhsRows, LhsCols])),
            Kind::Integer => Ok(f.emit(primitive, Signature::I, &[a], Kind::Double, &[])),
            Kind::Double => Ok(f.emit(primitive, Signature::S, &[a], Kind::Double, &[])),
            Kind::Sequence => Err(f.mismatch(primitive, &[a])),
        })
    }

    /// `sqrt(a)`
    pub fn sqrt(&mut self, a: VarId) -> Result<Info> {
        self.element_function(Primitive::Sqrt, a)
    }

    /// `sin(a)`
    pub fn sin(&mut self, a: VarId) -> Result<Info> {
        self.element_function(Primitive::Sin, a)
    }

    /// `cos(a)`
    pub fn cos(&mut self, a: VarId) -> Result<Info> {
        self.element_function(Primitive::Cos, a)
    }

    /// `atan(a)`
    pub fn atan(&mut self, a: VarId) -> Result<Info> {
        self.element_function(Primitive::Atan, a)
    }

    /// `exp(a)`
    pub fn exp(&mut self, a: VarId) -> Result<Info> {
        self.element_function(Primitive::Exp, a)
    }

    /// `log(a)`
    pub fn log(&mut self, a: VarId) -> Result<Info> {
        self.element_function(Primitive::Log, a)
    }

    /// `atan2(y, x)`
    pub fn atan2(&mut self, y: VarId, x: VarId) -> Result<Info> {
        let prim = Primitive::Atan2;
        self.build(|f| match (f.kind(y)?, f.kind(x)?) {
            (ky, kx) if ky.is_scalar() && kx.is_scalar() => Ok(f.emit(prim, Signature::Ss, &[y, x], Kind::Double, &[])),
            _ => Err(f.mismatch(prim, &[y, x])),
        })
    }

    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// `eye(n)` or identity shaped like a matrix
    pub fn eye(&mut self, a: VarId) -> Result<Info> {
        self.build(|f| match f.kind(a)? {
            Kind::Integer => Ok(f.emit(Primitive::Eye, Signature::I, &[a], Kind::Matrix, &[])),
            Kind::Matrix => Ok(f.emit(Primitive::Eye, Signature::M, &[a], Kind::Matrix, &[LhsRows, LhsCols])),
            _ => Err(f.mismatch(Primitive::Eye, &[a])),
        })
    }

    /// `diag(a)`
    pub fn diag(&mut self, a: VarId) -> Result<Info> {
        self.matrix_only(Primitive::Diag, Signature::M, a, Kind::Matrix, &[])
    }

    fn fill(&mut self, primitive: Primitive, rows: VarId, cols: VarId) -> Result<Info> {
        self.build(|f| match (f.kind(rows)?, f.kind(cols)?) {
            (Kind::Integer, Kind::Integer) => Ok(f.emit(primitive, Signature::Ii, &[rows, cols], Kind::Matrix, &[])),
            _ => Err(f.mismatch(primitive, &[rows, cols])),
        })
    }

    /// `zeros(rows, cols)`
    pub fn zeros(&mut self, rows: VarId, cols: VarId) -> Result<Info> {
        self.fill(Primitive::Zeros, rows, cols)
    }

    /// `ones(rows, cols)`
    pub fn ones(&mut self, rows: VarId, cols: VarId) -> Result<Info> {
        self.fill(Primitive::Ones, rows, cols)
    }

    /// `rand(rows, cols)`
    pub fn rand(&mut self, rows: VarId, cols: VarId) -> Result<Info> {
        self.fill(Primitive::Rand, rows, cols)
    }

    /// `randn(rows, cols)`
    pub fn randn(&mut self, rows: VarId, cols: VarId) -> Result<Info> {
        self.fill(Primitive::Randn, rows, cols)
    }

    /// `rng(seed)`; the output holds the seed
    pub fn rng(&mut self, seed: VarId) -> Result<Info> {
        self.build(|f| match f.kind(seed)? {
            Kind::Integer => Ok(f.emit(Primitive::Rng, Signature::I, &[seed], Kind::Integer, &[])),
            _ => Err(f.mismatch(Primitive::Rng, &[seed])),
        })
    }

    /// Matrix literal. Items may be scalars or matrices, never ranges.
    pub fn matrix_constructor(&mut self, constructor: MatrixConstructor) -> Result<Info> {
        let prim = Primitive::MatrixConstructor;
        self.build(|f| {
            for item in constructor.items() {
                if f.kind(*item)? == Kind::Sequence {
                    return Err(f.unsupported(prim, &[*item]));
                }
            }
            let mut info = f.emit(prim, Signature::Bare, &[], Kind::Matrix, &[]);
            info.constructor = Some(constructor);
            Ok(info)
        })
    }

    /// Complex scalars are rejected
    pub fn complex_literal(&mut self, real: VarId, imaginary: VarId) -> Result<Info> {
        Err(Error::unsupported(
            "complex",
            self.vars.describe(&[real, imaginary]),
        ))
    }

    // =========================================================================
    // DATA MOVEMENT
    // =========================================================================

    fn check_range(&self, range: &[VarId]) -> Result<()> {
        extents::analyze(&*self.vars, range).map(|_| ())
    }

    /// `a(range)`
    pub fn extract(&mut self, a: VarId, range: Vec<VarId>) -> Result<Info> {
        let prim = Primitive::Extract;
        self.build(|f| {
            if f.kind(a)? != Kind::Matrix {
                return Err(f.mismatch(prim, &[a]));
            }
            f.check_range(&range)?;
            let mut info = f.emit(prim, Signature::Bare, &[a], Kind::Matrix, &[]);
            info.range = Some(range);
            Ok(info)
        })
    }

    /// `a(i)` or `a(row, col)` producing a double
    pub fn extract_scalar(&mut self, a: VarId, indices: &[VarId]) -> Result<Info> {
        let prim = Primitive::ExtractScalar;
        self.build(|f| {
            let mut operands = vec![a];
            operands.extend_from_slice(indices);
            if f.kind(a)? != Kind::Matrix || indices.is_empty() || indices.len() > 2 {
                return Err(f.mismatch(prim, &operands));
            }
            for index in indices {
                if f.kind(*index)? != Kind::Integer {
                    return Err(f.mismatch(prim, &operands));
                }
            }
            Ok(f.emit(prim, Signature::Bare, &operands, Kind::Double, &[]))
        })
    }

    /// `dst = src`. Writes an existing variable, so no temporary is allocated.
    pub fn copy(&mut self, src: VarId, dst: VarId) -> Result<Info> {
        let prim = Primitive::Copy;
        let (sig, dims) = match (self.kind(src)?, self.kind(dst)?) {
            (Kind::Matrix, Kind::Matrix) => (Signature::Mm, vec![LhsRows, LhsCols]),
            (Kind::Integer, Kind::Integer) => (Signature::Ii, vec![]),
            (ks, Kind::Double) if ks.is_scalar() => (Signature::Ss, vec![]),
            (Kind::Matrix, Kind::Double) => (Signature::Sm1, vec![]),
            _ => return Err(self.mismatch(prim, &[src, dst])),
        };
        let mut info = Info::new(prim, sig);
        info.inputs = vec![src];
        info.output = Some(dst);
        info.dimensions = dims;
        Ok(info)
    }

    /// `dst(range) = src`
    pub fn copy_range(&mut self, src: VarId, dst: VarId, range: Vec<VarId>) -> Result<Info> {
        let prim = Primitive::Copy;
        let sig = match (self.kind(src)?, self.kind(dst)?) {
            (Kind::Matrix, Kind::Matrix) => Signature::Mm,
            (ks, Kind::Matrix) if ks.is_scalar() => Signature::Sm,
            _ => return Err(self.mismatch(prim, &[src, dst])),
        };
        self.check_range(&range)?;
        let mut info = Info::new(prim, sig);
        info.inputs = vec![src];
        info.output = Some(dst);
        info.range = Some(range);
        Ok(info)
    }
}

/// Factory plus the sequence it appends to
pub struct SequenceBuilder<'a> {
    factory: OperationFactory<'a>,
    sequence: Sequence,
}

impl<'a> SequenceBuilder<'a> {
    /// Builder appending to an empty sequence
    pub fn new(vars: &'a mut VariableTable, temps: &'a mut TempManager) -> Self {
        Self {
            factory: OperationFactory::new(vars, temps),
            sequence: Sequence::new(),
        }
    }

    /// Run one factory call and append the instruction; returns its output
    pub fn apply<F>(&mut self, f: F) -> Result<VarId>
    where
        F: FnOnce(&mut OperationFactory<'a>) -> Result<Info>,
    {
        let info = f(&mut self.factory)?;
        let output = info
            .output
            .ok_or_else(|| Error::UnimplementedOperation { op: info.op_name() })?;
        self.sequence.push(info);
        Ok(output)
    }

    /// Interned integer literal
    pub fn integer(&mut self, value: i64) -> VarId {
        self.factory.vars().integer(value)
    }

    /// Interned double literal
    pub fn double(&mut self, value: f64) -> VarId {
        self.factory.vars().double(value)
    }

    /// Register a range operand
    pub fn sequence(&mut self, seq: IntegerSequence) -> VarId {
        self.factory.vars().sequence(seq)
    }

    /// Final `dst = src`; marks `dst` as the equation output
    pub fn assign(&mut self, src: VarId, dst: VarId) -> Result<()> {
        let info = self.factory.copy(src, dst)?;
        self.sequence.push(info);
        self.sequence.output = Some(dst);
        Ok(())
    }

    /// Final `dst(range) = src`; marks `dst` as the equation output
    pub fn assign_range(&mut self, src: VarId, dst: VarId, range: Vec<VarId>) -> Result<()> {
        let info = self.factory.copy_range(src, dst, range)?;
        self.sequence.push(info);
        self.sequence.output = Some(dst);
        Ok(())
    }

    /// Instructions built so far
    pub fn sequence_so_far(&self) -> &Sequence {
        &self.sequence
    }

    /// Finish building
    pub fn finish(self) -> Sequence {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Variable, VariableType};
    use crate::error::ErrorCategory;

    fn setup() -> (VariableTable, TempManager, VarId, VarId, VarId) {
        let mut vars = VariableTable::new();
        let a = vars.add(Variable::alias("A", VariableType::Matrix));
        let x = vars.add(Variable::alias("x", VariableType::Double));
        let n = vars.add(Variable::alias("n", VariableType::Integer));
        (vars, TempManager::new(), a, x, n)
    }

    #[test]
    fn test_multiply_signatures() {
        let (mut vars, mut temps, a, x, n) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        assert_eq!(f.multiply(a, a).unwrap().op_name(), "multiply-mm");
        assert_eq!(f.multiply(n, n).unwrap().op_name(), "multiply-ii");
        assert_eq!(f.multiply(n, x).unwrap().op_name(), "multiply-ss");
        assert_eq!(f.multiply(a, x).unwrap().op_name(), "multiply-ms");
        let info = f.multiply(x, a).unwrap();
        assert_eq!(info.op_name(), "multiply-sm");
        assert_eq!(info.dimensions, vec![RhsRows, RhsCols]);
    }

    #[test]
    fn test_output_kinds() {
        let (mut vars, mut temps, a, x, n) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        let det = f.det(a).unwrap();
        let ii = f.add(n, n).unwrap();
        let ss = f.add(n, x).unwrap();
        let sqrt = f.sqrt(n).unwrap();
        assert_eq!(vars[det.output.unwrap()].name, "td0");
        assert_eq!(vars[ii.output.unwrap()].name, "ti0");
        assert_eq!(vars[ss.output.unwrap()].name, "td1");
        assert_eq!(sqrt.op_name(), "sqrt-i");
        assert_eq!(vars.kind(sqrt.output.unwrap()), Kind::Double);
    }

    #[test]
    fn test_divide_errors() {
        let (mut vars, mut temps, a, x, _) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        assert!(matches!(
            f.divide(a, a),
            Err(Error::UnsupportedOperandCombination { .. })
        ));
        let err = f.divide(x, a).unwrap_err();
        assert!(matches!(err, Error::ShapeOrTypeMismatch { .. }));
        assert!(err.to_string().contains("divide"));
        assert!(err.to_string().contains("double, matrix"));
        assert_eq!(f.divide(a, x).unwrap().op_name(), "divide-ms");
    }

    #[test]
    fn test_element_ops_lower_for_scalars() {
        let (mut vars, mut temps, a, x, n) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        assert_eq!(f.element_mult(a, x).unwrap().op_name(), "multiply-ms");
        assert_eq!(f.element_mult(a, a).unwrap().op_name(), "elementMult-mm");
        assert_eq!(f.element_division(x, a).unwrap().op_name(), "elementDivision-sm");
        assert_eq!(f.element_division(n, n).unwrap().op_name(), "divide-ii");
        assert_eq!(f.element_pow(n, n).unwrap().op_name(), "elementPow-ss");
    }

    #[test]
    fn test_failed_call_leaves_counters() {
        let (mut vars, mut temps, a, x, _) = setup();
        let before = vars.len();
        {
            let mut f = OperationFactory::new(&mut vars, &mut temps);
            assert!(f.transpose(x).is_err());
            assert!(f.zeros(x, x).is_err());
            assert!(f.kron(a, x).is_err());
        }
        assert_eq!(temps.created().total(), 0);
        assert_eq!(vars.len(), before);
    }

    #[test]
    fn test_matrix_constructor_rejects_ranges() {
        let (mut vars, mut temps, a, x, _) = setup();
        let seq = vars.sequence(IntegerSequence::Range {
            start: None,
            step: None,
        });
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        let mut ctor = MatrixConstructor::new();
        ctor.push_row(vec![a, seq]);
        assert!(matches!(
            f.matrix_constructor(ctor),
            Err(Error::UnsupportedOperandCombination { .. })
        ));

        let mut ctor = MatrixConstructor::new();
        ctor.push_row(vec![x, x]);
        let info = f.matrix_constructor(ctor).unwrap();
        assert_eq!(info.reads(&vars), vec![x, x]);
    }

    #[test]
    fn test_complex_rejected() {
        let (mut vars, mut temps, _, x, _) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        let err = f.complex_literal(x, x).unwrap_err();
        assert_eq!(err.classify(), ErrorCategory::User);
        assert_eq!(temps.created().total(), 0);
    }

    #[test]
    fn test_extract_rejects_matrix_range() {
        let (mut vars, mut temps, a, _, _) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        let err = f.extract(a, vec![a]).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(temps.created().matrix, 0);
    }

    #[test]
    fn test_copy_signatures() {
        let (mut vars, mut temps, a, x, n) = setup();
        let mut f = OperationFactory::new(&mut vars, &mut temps);
        assert_eq!(f.copy(n, x).unwrap().op_name(), "copy-ss");
        assert_eq!(f.copy(a, x).unwrap().op_name(), "copy-sm1");
        assert!(f.copy(x, n).is_err());
        assert_eq!(f.copy_range(x, a, vec![n]).unwrap().op_name(), "copy-sm");
        assert_eq!(temps.created().total(), 0);
    }

    #[test]
    fn test_builder_tracks_output() {
        let (mut vars, mut temps, a, _, _) = setup();
        let b = vars.add(Variable::alias("B", VariableType::Matrix));
        let mut builder = SequenceBuilder::new(&mut vars, &mut temps);
        let t = builder.apply(|f| f.transpose(a)).unwrap();
        builder.assign(t, b).unwrap();
        let seq = builder.finish();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.output, Some(b));
        assert!(seq.last().unwrap().is_plain_copy());
    }
}
