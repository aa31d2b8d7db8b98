//! Direct executor: "emitting" an instruction runs it against live values

use super::{integer_arithmetic, scalar_function, unimplemented, Backend, FoldedScalar, Value, ValueStore};
use crate::compiler::extents::{self, Extents, ResolvedExtent};
use crate::compiler::ir::{DimensionHint, Info, Kind, Primitive, Signature, VarId, VariableTable};
use crate::compiler::temp::MatrixRng;
use crate::error::{Error, Result};
use crate::kernels::{self, KernelError, Matrix};

/// Interpreting backend
pub struct DirectExecutor<'a> {
    store: &'a mut ValueStore,
    rng: &'a mut MatrixRng,
}

fn input(info: &Info, index: usize) -> Result<VarId> {
    info.input(index).ok_or_else(|| unimplemented(info))
}

fn output(info: &Info) -> Result<VarId> {
    info.output.ok_or_else(|| unimplemented(info))
}

fn failure(info: &Info) -> impl Fn(KernelError) -> Error + Copy + '_ {
    move |e| Error::failed(info.op_name(), e.to_string())
}

impl<'a> DirectExecutor<'a> {
    /// Executor reading and writing `store`, drawing random numbers from `rng`
    pub fn new(store: &'a mut ValueStore, rng: &'a mut MatrixRng) -> Self {
        Self { store, rng }
    }

    /// Run one instruction
    pub fn execute(&mut self, info: &Info, vars: &VariableTable) -> Result<()> {
        if info.primitive == Primitive::Copy && info.range.is_some() {
            return self.copy_range(info, vars);
        }
        if info.primitive == Primitive::MatrixConstructor {
            return self.construct(info, vars);
        }
        let out = output(info)?;
        match vars.kind(out) {
            Kind::Integer => {
                let value = self.integer_result(info, vars)?;
                self.store.set(out, Value::Integer(value));
            }
            Kind::Double => {
                let value = self.double_result(info, vars)?;
                self.store.set(out, Value::Double(value));
            }
            Kind::Matrix => self.matrix_result(info, vars, out)?,
            Kind::Sequence => return Err(unimplemented(info)),
        }
        Ok(())
    }

    fn integer_result(&mut self, info: &Info, vars: &VariableTable) -> Result<i64> {
        use Primitive as P;
        use Signature as S;
        match (info.primitive, info.signature) {
            (P::Add | P::Subtract | P::Multiply | P::Divide, S::Ii)
            | (P::Neg | P::Max | P::Min | P::Abs, S::I)
            | (P::Copy, S::Ii) => {
                let args = info
                    .inputs
                    .iter()
                    .map(|id| self.store.integer(vars, *id))
                    .collect::<Result<Vec<_>>>()?;
                integer_arithmetic(info.primitive, &args).ok_or_else(|| {
                    Error::failed(info.op_name(), "integer overflow or division by zero")
                })
            }
            (P::Rng, S::I) => {
                let seed = self.store.integer(vars, input(info, 0)?)?;
                self.rng.reseed(seed as u64);
                Ok(seed)
            }
            _ => Err(unimplemented(info)),
        }
    }

    fn double_result(&mut self, info: &Info, vars: &VariableTable) -> Result<f64> {
        use Primitive as P;
        use Signature as S;
        let fail = failure(info);
        let store = &*self.store;
        match (info.primitive, info.signature) {
            (P::Det, S::M) => kernels::det(store.matrix(vars, input(info, 0)?)?).map_err(fail),
            (P::Trace, S::M) => Ok(kernels::trace(store.matrix(vars, input(info, 0)?)?)),
            (P::NormF, S::M) => Ok(kernels::norm_f(store.matrix(vars, input(info, 0)?)?)),
            (P::Max, S::M) => kernels::max(store.matrix(vars, input(info, 0)?)?).map_err(fail),
            (P::Min, S::M) => kernels::min(store.matrix(vars, input(info, 0)?)?).map_err(fail),
            (P::Sum, S::M) => Ok(kernels::sum(store.matrix(vars, input(info, 0)?)?)),
            (P::NormP, S::Ms) => {
                let a = store.matrix(vars, input(info, 0)?)?;
                kernels::norm_p(a, store.double(vars, input(info, 1)?)?).map_err(fail)
            }
            (P::Dot, S::Bare) => {
                let a = store.matrix(vars, input(info, 0)?)?;
                kernels::dot(a, store.matrix(vars, input(info, 1)?)?).map_err(fail)
            }
            (P::ExtractScalar, S::Bare) => {
                let a = store.matrix(vars, input(info, 0)?)?;
                match info.inputs.len() {
                    2 => kernels::element(a, store.integer(vars, input(info, 1)?)?).map_err(fail),
                    3 => kernels::element2(
                        a,
                        store.integer(vars, input(info, 1)?)?,
                        store.integer(vars, input(info, 2)?)?,
                    )
                    .map_err(fail),
                    _ => Err(unimplemented(info)),
                }
            }
            (P::Copy, S::Sm1) => kernels::scalar_of(store.matrix(vars, input(info, 0)?)?).map_err(fail),
            (_, S::Ss | S::S | S::I) => {
                let args = info
                    .inputs
                    .iter()
                    .map(|id| store.double(vars, *id))
                    .collect::<Result<Vec<_>>>()?;
                scalar_function(info.primitive, info.signature, &args).ok_or_else(|| unimplemented(info))
            }
            _ => Err(unimplemented(info)),
        }
    }

    fn matrix_result(&mut self, info: &Info, vars: &VariableTable, out: VarId) -> Result<()> {
        use Primitive as P;
        use Signature as S;
        if is_in_place(info) && !info.inputs.contains(&out) {
            return self.in_place(info, vars, out);
        }
        let fail = failure(info);
        let store = &*self.store;
        let rng = &mut *self.rng;
        let m = |i: usize| -> Result<&Matrix> { store.matrix(vars, input(info, i)?) };
        let d = |i: usize| -> Result<f64> { store.double(vars, input(info, i)?) };
        let n = |i: usize| -> Result<i64> { store.integer(vars, input(info, i)?) };
        let value = match (info.primitive, info.signature) {
            // Aliased in-place forms fall back to fresh results
            (P::Add, S::Mm) => kernels::add(m(0)?, m(1)?).map_err(fail)?,
            (P::Subtract, S::Mm) => kernels::subtract(m(0)?, m(1)?).map_err(fail)?,
            (P::Multiply, S::Mm) => kernels::multiply(m(0)?, m(1)?).map_err(fail)?,
            (P::ElementMult, S::Mm) => kernels::element_mult(m(0)?, m(1)?).map_err(fail)?,
            (P::ElementDivision, S::Mm) => kernels::element_div(m(0)?, m(1)?).map_err(fail)?,
            (P::Transpose, S::M) => m(0)?.transpose(),
            (P::Copy, S::Mm) => m(0)?.clone(),

            (P::Add, S::Ms) => kernels::add_scalar(m(0)?, d(1)?),
            (P::Add, S::Sm) => kernels::add_scalar(m(1)?, d(0)?),
            (P::Subtract, S::Ms) => kernels::subtract_scalar(m(0)?, d(1)?),
            (P::Subtract, S::Sm) => kernels::scalar_minus(d(0)?, m(1)?),
            (P::Multiply, S::Ms) => kernels::scale(m(0)?, d(1)?),
            (P::Multiply, S::Sm) => kernels::scale(m(1)?, d(0)?),
            (P::Divide, S::Ms) => kernels::divide_scalar(m(0)?, d(1)?),
            (P::Neg, S::M) => kernels::negate(m(0)?),
            (P::ElementDivision, S::Sm) => kernels::scalar_div_elements(d(0)?, m(1)?),
            (P::ElementPow, S::Mm) => kernels::element_pow(m(0)?, m(1)?).map_err(fail)?,
            (P::ElementPow, S::Ms) => kernels::element_pow_ms(m(0)?, d(1)?),
            (P::ElementPow, S::Sm) => kernels::element_pow_sm(d(0)?, m(1)?),

            (P::Inverse, S::M) => kernels::invert(m(0)?).map_err(fail)?,
            (P::PseudoInverse, S::M) => kernels::pinv(m(0)?).map_err(fail)?,
            (P::Rref, S::M) => kernels::rref(m(0)?),
            (P::Kron, S::Bare) => kernels::kron(m(0)?, m(1)?),
            (P::Solve, S::Bare) => kernels::solve(m(0)?, m(1)?).map_err(fail)?,

            (P::MaxRows, S::Bare) => kernels::max_rows(m(0)?),
            (P::MaxCols, S::Bare) => kernels::max_cols(m(0)?),
            (P::MinRows, S::Bare) => kernels::min_rows(m(0)?),
            (P::MinCols, S::Bare) => kernels::min_cols(m(0)?),
            (P::SumRows, S::Bare) => kernels::sum_rows(m(0)?),
            (P::SumCols, S::Bare) => kernels::sum_cols(m(0)?),

            (P::Abs, S::M) => kernels::abs(m(0)?),
            (P::Sqrt, S::M) => kernels::sqrt(m(0)?),
            (P::Sin, S::M) => kernels::sin(m(0)?),
            (P::Cos, S::M) => kernels::cos(m(0)?),
            (P::Atan, S::M) => kernels::atan(m(0)?),
            (P::Exp, S::M) => kernels::exp(m(0)?),
            (P::Log, S::M) => kernels::log(m(0)?),

            (P::Eye, S::I) => kernels::eye(n(0)?).map_err(fail)?,
            (P::Eye, S::M) => kernels::eye_like(m(0)?),
            (P::Diag, S::M) => kernels::diag(m(0)?),
            (P::Zeros, S::Ii) => kernels::zeros(n(0)?, n(1)?).map_err(fail)?,
            (P::Ones, S::Ii) => kernels::ones(n(0)?, n(1)?).map_err(fail)?,
            (P::Rand, S::Ii) => kernels::rand(n(0)?, n(1)?, rng).map_err(fail)?,
            (P::Randn, S::Ii) => kernels::randn(n(0)?, n(1)?, rng).map_err(fail)?,

            (P::Extract, S::Bare) => extract(store, info, vars)?,
            _ => return Err(unimplemented(info)),
        };
        self.store.set(out, Value::Matrix(value));
        Ok(())
    }

    /// Write into storage shaped from the dimension hints. The output keeps
    /// its previous value when the write fails.
    fn in_place(&mut self, info: &Info, vars: &VariableTable, out: VarId) -> Result<()> {
        let (rows, cols) = hinted_shape(self.store, info, vars)?;
        let previous = self.store.take_matrix(out);
        let mut target = Matrix::zeros(rows, cols);
        match write_in_place(self.store, info, vars, &mut target) {
            Ok(()) => {
                self.store.set(out, Value::Matrix(target));
                Ok(())
            }
            Err(err) => {
                if let Some(previous) = previous {
                    self.store.set(out, Value::Matrix(previous));
                }
                Err(err)
            }
        }
    }

    fn copy_range(&mut self, info: &Info, vars: &VariableTable) -> Result<()> {
        let out = output(info)?;
        let src = input(info, 0)?;
        let range = info.range.as_deref().ok_or_else(|| unimplemented(info))?;
        let extents = extents::analyze(vars, range)?;
        let mut target = self.store.take_matrix(out).ok_or_else(|| Error::UnboundVariable {
            name: vars[out].name.clone(),
        })?;
        let source = if src == out {
            Some(Value::Matrix(target.clone()))
        } else {
            None
        };
        let outcome = write_range(self.store, info, vars, &extents, source.as_ref(), &mut target);
        self.store.set(out, Value::Matrix(target));
        outcome
    }

    fn construct(&mut self, info: &Info, vars: &VariableTable) -> Result<()> {
        let out = output(info)?;
        let constructor = info.constructor.as_ref().ok_or_else(|| unimplemented(info))?;
        let store = &*self.store;
        let rows = constructor
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|id| match vars.kind(*id) {
                        Kind::Matrix => store.matrix(vars, *id).cloned(),
                        Kind::Integer | Kind::Double => store.double(vars, *id).map(kernels::scalar),
                        Kind::Sequence => Err(Error::unsupported(
                            Primitive::MatrixConstructor.name(),
                            vars.describe(&[*id]),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let value = kernels::concat(&rows).map_err(failure(info))?;
        self.store.set(out, Value::Matrix(value));
        Ok(())
    }
}

fn is_in_place(info: &Info) -> bool {
    use Primitive as P;
    use Signature as S;
    matches!(
        (info.primitive, info.signature),
        (P::Add | P::Subtract | P::Multiply | P::ElementMult | P::ElementDivision, S::Mm)
            | (P::Transpose, S::M)
            | (P::Copy, S::Mm)
    )
}

fn hinted_shape(store: &ValueStore, info: &Info, vars: &VariableTable) -> Result<(usize, usize)> {
    let dim = |hint: DimensionHint| -> Result<usize> {
        Ok(match hint {
            DimensionHint::LhsRows => store.matrix(vars, input(info, 0)?)?.nrows(),
            DimensionHint::LhsCols => store.matrix(vars, input(info, 0)?)?.ncols(),
            DimensionHint::RhsRows => store.matrix(vars, input(info, 1)?)?.nrows(),
            DimensionHint::RhsCols => store.matrix(vars, input(info, 1)?)?.ncols(),
        })
    };
    match info.dimensions.as_slice() {
        [rows, cols] => Ok((dim(*rows)?, dim(*cols)?)),
        _ => Err(unimplemented(info)),
    }
}

fn write_in_place(store: &ValueStore, info: &Info, vars: &VariableTable, target: &mut Matrix) -> Result<()> {
    use Primitive as P;
    let fail = failure(info);
    let a = store.matrix(vars, input(info, 0)?)?;
    let b = || store.matrix(vars, input(info, 1)?);
    let written = match info.primitive {
        P::Add => kernels::add_into(a, b()?, target),
        P::Subtract => kernels::subtract_into(a, b()?, target),
        P::Multiply => kernels::multiply_into(a, b()?, target),
        P::ElementMult => kernels::element_mult_into(a, b()?, target),
        P::ElementDivision => kernels::element_div_into(a, b()?, target),
        P::Transpose => kernels::transpose_into(a, target),
        P::Copy => kernels::copy_into(a, target),
        _ => return Err(unimplemented(info)),
    };
    written.map_err(fail)
}

fn resolve(store: &ValueStore, vars: &VariableTable, extents: &Extents, rows: usize, cols: usize) -> Result<extents::ResolvedExtents> {
    extents.resolve(rows, cols, &|v| store.index(vars, v))
}

fn extract(store: &ValueStore, info: &Info, vars: &VariableTable) -> Result<Matrix> {
    let fail = failure(info);
    let range = info.range.as_deref().ok_or_else(|| unimplemented(info))?;
    let extents = extents::analyze(vars, range)?;
    let a = store.matrix(vars, input(info, 0)?)?;
    let resolved = resolve(store, vars, &extents, a.nrows(), a.ncols())?;
    if resolved.flattened {
        return kernels::extract_flat(a, &resolved.cols.indices()).map_err(fail);
    }
    match (&resolved.rows, &resolved.cols) {
        (ResolvedExtent::Block { start: r0, end: r1 }, ResolvedExtent::Block { start: c0, end: c1 }) => {
            kernels::extract_block(a, *r0, *r1, *c0, *c1).map_err(fail)
        }
        (rows, cols) => kernels::extract_indices(a, &rows.indices(), &cols.indices()).map_err(fail),
    }
}

fn write_range(
    store: &ValueStore,
    info: &Info,
    vars: &VariableTable,
    extents: &Extents,
    aliased: Option<&Value>,
    target: &mut Matrix,
) -> Result<()> {
    let fail = failure(info);
    let src = input(info, 0)?;
    let resolved = resolve(store, vars, extents, target.nrows(), target.ncols())?;
    let block = match (&resolved.rows, &resolved.cols) {
        (ResolvedExtent::Block { start: r0, end: r1 }, ResolvedExtent::Block { start: c0, end: c1 })
            if !resolved.flattened =>
        {
            Some((*r0, *r1, *c0, *c1))
        }
        _ => None,
    };
    let written = match info.signature {
        Signature::Mm => {
            let source = match aliased.and_then(Value::as_matrix) {
                Some(m) => m,
                None => store.matrix(vars, src)?,
            };
            if resolved.flattened {
                kernels::insert_flat(target, source, &resolved.cols.indices())
            } else if let Some((r0, r1, c0, c1)) = block {
                kernels::insert_block(target, source, r0, r1, c0, c1)
            } else {
                kernels::insert_indices(target, source, &resolved.rows.indices(), &resolved.cols.indices())
            }
        }
        Signature::Sm => {
            let value = store.double(vars, src)?;
            if resolved.flattened {
                kernels::fill_flat(target, value, &resolved.cols.indices())
            } else if let Some((r0, r1, c0, c1)) = block {
                kernels::fill_block(target, value, r0, r1, c0, c1)
            } else {
                kernels::fill_indices(target, value, &resolved.rows.indices(), &resolved.cols.indices())
            }
        }
        _ => return Err(unimplemented(info)),
    };
    written.map_err(fail)
}

impl Backend for DirectExecutor<'_> {
    fn emit_operation(&mut self, _buffer: &mut String, info: &Info, vars: &VariableTable) -> Result<()> {
        self.execute(info, vars)
    }

    fn declare(&mut self, _buffer: &mut String, _indent: &str, vars: &VariableTable, id: VarId) -> Result<()> {
        if !self.store.contains(id) {
            if let Some(value) = Value::zero(vars.kind(id)) {
                self.store.set(id, value);
            }
        }
        Ok(())
    }

    fn fold_constant(&mut self, info: &Info, vars: &VariableTable) -> Result<Option<FoldedScalar>> {
        let out = match info.output {
            Some(out) if vars.kind(out).is_scalar() => out,
            _ => return Ok(None),
        };
        if info.primitive.is_random() || info.range.is_some() {
            return Ok(None);
        }
        let literal = |id: &VarId| vars[*id].kind().is_scalar() && vars[*id].literal_double().is_some();
        if !info.inputs.iter().all(literal) {
            return Ok(None);
        }
        let mut scratch = ValueStore::new();
        let mut rng = MatrixRng::new();
        DirectExecutor::new(&mut scratch, &mut rng).execute(info, vars)?;
        Ok(match scratch.get(out) {
            Some(Value::Integer(v)) => Some(FoldedScalar::integer(*v)),
            Some(Value::Double(v)) if v.is_finite() => Some(FoldedScalar::double(*v)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::factory::OperationFactory;
    use crate::compiler::ir::{IntegerSequence, MatrixConstructor, Variable, VariableType};
    use crate::compiler::temp::TempManager;

    fn m(rows: usize, cols: usize, data: &[f64]) -> Matrix {
        Matrix::from_row_slice(rows, cols, data)
    }

    struct Fixture {
        vars: VariableTable,
        temps: TempManager,
        store: ValueStore,
        rng: MatrixRng,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                vars: VariableTable::new(),
                temps: TempManager::new(),
                store: ValueStore::new(),
                rng: MatrixRng::new(),
            }
        }

        fn matrix(&mut self, name: &str, value: Matrix) -> VarId {
            let id = self.vars.add(Variable::alias(name, VariableType::Matrix));
            self.store.set(id, Value::Matrix(value));
            id
        }

        fn run<F>(&mut self, f: F) -> Result<VarId>
        where
            F: FnOnce(&mut OperationFactory<'_>) -> Result<Info>,
        {
            let info = f(&mut OperationFactory::new(&mut self.vars, &mut self.temps))?;
            DirectExecutor::new(&mut self.store, &mut self.rng).execute(&info, &self.vars)?;
            Ok(info.output.unwrap())
        }

        fn get(&self, id: VarId) -> &Value {
            self.store.get(id).unwrap()
        }
    }

    #[test]
    fn test_multiply_reshapes_output() {
        let mut fx = Fixture::new();
        let a = fx.matrix("A", m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let b = fx.matrix("B", m(3, 1, &[1.0, 0.0, -1.0]));
        let t = fx.run(|f| f.multiply(a, b)).unwrap();
        assert_eq!(fx.get(t), &Value::Matrix(m(2, 1, &[-2.0, -2.0])));
    }

    #[test]
    fn test_singular_inverse_fails() {
        let mut fx = Fixture::new();
        let a = fx.matrix("A", m(2, 2, &[1.0, 2.0, 2.0, 4.0]));
        let err = fx.run(|f| f.inv(a)).unwrap_err();
        match err {
            Error::OperationFailed { op, .. } => assert_eq!(op, "inv-m"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scalar_ops() {
        let mut fx = Fixture::new();
        let seven = fx.vars.integer(7);
        let two = fx.vars.integer(2);
        let q = fx.run(|f| f.divide(seven, two)).unwrap();
        assert_eq!(fx.get(q), &Value::Integer(3));
        let half = fx.vars.double(0.5);
        let p = fx.run(|f| f.element_pow(seven, half)).unwrap();
        assert_eq!(fx.get(p), &Value::Double(7f64.powf(0.5)));
    }

    #[test]
    fn test_extract_block_and_explicit() {
        let mut fx = Fixture::new();
        let data: Vec<f64> = (0..12).map(f64::from).collect();
        let a = fx.matrix("A", m(6, 2, &data));
        let (one, three, five) = (fx.vars.integer(1), fx.vars.integer(3), fx.vars.integer(5));
        let all = fx.vars.sequence(IntegerSequence::Range {
            start: None,
            step: None,
        });
        let rows = fx.vars.sequence(IntegerSequence::For {
            start: one,
            step: None,
            end: three,
        });
        let t = fx.run(|f| f.extract(a, vec![rows, all])).unwrap();
        assert_eq!(fx.get(t), &Value::Matrix(m(3, 2, &[2.0, 3.0, 4.0, 5.0, 6.0, 7.0])));

        let picks = fx.vars.sequence(IntegerSequence::Explicit(vec![one, three, five]));
        let t = fx.run(|f| f.extract(a, vec![picks, VariableTable::ZERO])).unwrap();
        assert_eq!(fx.get(t), &Value::Matrix(m(3, 1, &[2.0, 6.0, 10.0])));

        let flat = fx.vars.sequence(IntegerSequence::Explicit(vec![one, five]));
        let t = fx.run(|f| f.extract(a, vec![flat])).unwrap();
        assert_eq!(fx.get(t), &Value::Matrix(m(1, 2, &[1.0, 5.0])));
    }

    #[test]
    fn test_ranged_copy_writes_destination() {
        let mut fx = Fixture::new();
        let dst = fx.matrix("A", Matrix::zeros(3, 3));
        let src = fx.matrix("B", m(1, 3, &[1.0, 2.0, 3.0]));
        let all = fx.vars.sequence(IntegerSequence::Range {
            start: None,
            step: None,
        });
        let info = OperationFactory::new(&mut fx.vars, &mut fx.temps)
            .copy_range(src, dst, vec![VariableTable::ONE, all])
            .unwrap();
        DirectExecutor::new(&mut fx.store, &mut fx.rng)
            .execute(&info, &fx.vars)
            .unwrap();
        let a = fx.store.matrix(&fx.vars, dst).unwrap();
        assert_eq!(a.row(1).sum(), 6.0);
        assert_eq!(a.row(0).sum(), 0.0);

        let nine = fx.vars.double(9.0);
        let info = OperationFactory::new(&mut fx.vars, &mut fx.temps)
            .copy_range(nine, dst, vec![VariableTable::ZERO])
            .unwrap();
        DirectExecutor::new(&mut fx.store, &mut fx.rng)
            .execute(&info, &fx.vars)
            .unwrap();
        assert_eq!(fx.store.matrix(&fx.vars, dst).unwrap()[(0, 0)], 9.0);
    }

    #[test]
    fn test_constructor_mixes_scalars_and_matrices() {
        let mut fx = Fixture::new();
        let a = fx.matrix("A", m(1, 2, &[1.0, 2.0]));
        let three = fx.vars.integer(3);
        let mut ctor = MatrixConstructor::new();
        ctor.push_row(vec![a, three]);
        let t = fx.run(|f| f.matrix_constructor(ctor)).unwrap();
        assert_eq!(fx.get(t), &Value::Matrix(m(1, 3, &[1.0, 2.0, 3.0])));
    }

    #[test]
    fn test_rng_reseeds() {
        let mut fx = Fixture::new();
        let seed = fx.vars.integer(42);
        let two = fx.vars.integer(2);
        fx.run(|f| f.rng(seed)).unwrap();
        let first = fx.run(|f| f.rand(two, two)).unwrap();
        let first = fx.get(first).clone();
        fx.run(|f| f.rng(seed)).unwrap();
        let second = fx.run(|f| f.rand(two, two)).unwrap();
        assert_eq!(&first, fx.get(second));
    }

    #[test]
    fn test_unknown_pair_is_internal() {
        let mut fx = Fixture::new();
        let a = fx.matrix("A", Matrix::zeros(1, 1));
        let t = fx.temps.create_matrix(&mut fx.vars);
        let mut info = Info::new(Primitive::Kron, Signature::Ss);
        info.inputs = vec![a, a];
        info.output = Some(t);
        let err = DirectExecutor::new(&mut fx.store, &mut fx.rng)
            .execute(&info, &fx.vars)
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_fold_constant_needs_literals() {
        let mut fx = Fixture::new();
        let x = fx.vars.add(Variable::alias("x", VariableType::Double));
        let two = fx.vars.double(2.0);
        let info = OperationFactory::new(&mut fx.vars, &mut fx.temps)
            .multiply(x, two)
            .unwrap();
        let mut exec = DirectExecutor::new(&mut fx.store, &mut fx.rng);
        assert_eq!(exec.fold_constant(&info, &fx.vars).unwrap(), None);

        let info = OperationFactory::new(&mut fx.vars, &mut fx.temps)
            .sqrt(VariableTable::ONE)
            .unwrap();
        let mut exec = DirectExecutor::new(&mut fx.store, &mut fx.rng);
        let folded = exec.fold_constant(&info, &fx.vars).unwrap().unwrap();
        assert_eq!(folded.text, "1.0");
    }
}
