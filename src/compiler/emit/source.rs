//! Source emitter: "emitting" an instruction renders Rust statements
//!
//! Generated code calls the kernels module by path. Variables are rendered by
//! role:
//!
//! | Role | Read (`&Matrix`) | Written |
//! |------|------------------|---------|
//! | temporary | `&tm0` | `tm0 = ..`, `&mut tm0` |
//! | input alias | `a` (a `&Matrix` parameter) | never |
//! | output alias | `&*out` | `*out = ..`, `&mut *out` |
//!
//! Scalars render by value; integer operands in a double context are cast.

use super::{unimplemented, Backend, FoldedScalar};
use crate::compiler::extents::{self, RenderedExtent};
use crate::compiler::ir::{
    format_double, precedence, DimensionHint, Info, Kind, Primitive, Signature, VarId, VariableTable,
};
use crate::error::{Error, Result};

/// Default path of the kernels module in generated code
pub const DEFAULT_KERNELS_PATH: &str = "mateq::kernels";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Literal,
    Temporary,
    Input,
    Output,
}

/// Code-generating backend
#[derive(Debug, Clone)]
pub struct SourceEmitter {
    kernels: String,
    indent: String,
    output: Option<VarId>,
}

fn input(info: &Info, index: usize) -> Result<VarId> {
    info.input(index).ok_or_else(|| unimplemented(info))
}

fn index_vector(extent: &RenderedExtent) -> String {
    match extent {
        RenderedExtent::Block { start, end } => format!("({}..{}).collect::<Vec<usize>>()", start, end),
        RenderedExtent::Explicit { indices } => indices.clone(),
    }
}

impl Default for SourceEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_KERNELS_PATH)
    }
}

impl SourceEmitter {
    /// Emitter calling kernels at `kernels`, e.g. `mateq::kernels`
    pub fn new(kernels: impl Into<String>) -> Self {
        Self {
            kernels: kernels.into(),
            indent: "    ".to_string(),
            output: None,
        }
    }

    /// Indentation prepended to every statement
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Variable passed to the generated function by `&mut`
    pub fn with_output(mut self, output: Option<VarId>) -> Self {
        self.output = output;
        self
    }

    /// Kernels module path
    pub fn kernels(&self) -> &str {
        &self.kernels
    }

    fn role(&self, vars: &VariableTable, id: VarId) -> Role {
        let var = &vars[id];
        if var.is_literal() {
            Role::Literal
        } else if var.temporary {
            Role::Temporary
        } else if Some(id) == self.output {
            Role::Output
        } else {
            Role::Input
        }
    }

    fn line(&self, buffer: &mut String, text: &str) {
        buffer.push_str(&self.indent);
        buffer.push_str(text);
        buffer.push('\n');
    }

    // =========================================================================
    // OPERANDS
    // =========================================================================

    /// Scalar in its own type, parenthesized below `context`
    fn scalar(&self, vars: &VariableTable, id: VarId, context: u8) -> String {
        let var = &vars[id];
        match self.role(vars, id) {
            Role::Literal => var.operand_in(context),
            Role::Output if context > precedence::UNARY => format!("(*{})", var.name),
            Role::Output => format!("*{}", var.name),
            Role::Temporary | Role::Input => var.name.clone(),
        }
    }

    /// Scalar as `f64`
    fn double(&self, vars: &VariableTable, id: VarId, context: u8) -> String {
        let var = &vars[id];
        if var.kind() != Kind::Integer {
            return self.scalar(vars, id, context);
        }
        match var.literal_integer() {
            Some(v) if v < 0 && context > precedence::UNARY => format!("({})", format_double(v as f64)),
            Some(v) => format_double(v as f64),
            None => format!("({} as f64)", self.scalar(vars, id, precedence::ATOM)),
        }
    }

    /// Scalar as `i64`, for indices
    fn index(&self, vars: &VariableTable, id: VarId) -> String {
        match vars[id].kind() {
            Kind::Double => format!("({} as i64)", self.scalar(vars, id, precedence::ATOM)),
            _ => self.scalar(vars, id, precedence::ATOM),
        }
    }

    /// Matrix as `&Matrix`
    fn mref(&self, vars: &VariableTable, id: VarId) -> String {
        let name = &vars[id].name;
        match self.role(vars, id) {
            Role::Temporary => format!("&{}", name),
            Role::Output => format!("&*{}", name),
            Role::Literal | Role::Input => name.clone(),
        }
    }

    /// Matrix as a method receiver
    fn recv<'v>(&self, vars: &'v VariableTable, id: VarId) -> &'v str {
        &vars[id].name
    }

    /// Matrix as `&mut Matrix`
    fn mout(&self, vars: &VariableTable, id: VarId) -> String {
        let name = &vars[id].name;
        match self.role(vars, id) {
            Role::Temporary => format!("&mut {}", name),
            _ => format!("&mut *{}", name),
        }
    }

    /// Assignment target
    fn lhs(&self, vars: &VariableTable, id: VarId) -> String {
        let name = &vars[id].name;
        match self.role(vars, id) {
            Role::Output => format!("*{}", name),
            _ => name.clone(),
        }
    }

    fn dimension(&self, vars: &VariableTable, info: &Info, hint: DimensionHint) -> Result<String> {
        Ok(match hint {
            DimensionHint::LhsRows => format!("{}.nrows()", self.recv(vars, input(info, 0)?)),
            DimensionHint::LhsCols => format!("{}.ncols()", self.recv(vars, input(info, 0)?)),
            DimensionHint::RhsRows => format!("{}.nrows()", self.recv(vars, input(info, 1)?)),
            DimensionHint::RhsCols => format!("{}.ncols()", self.recv(vars, input(info, 1)?)),
        })
    }

    // =========================================================================
    // SCALAR EXPRESSIONS
    // =========================================================================

    fn infix(&self, vars: &VariableTable, a: VarId, b: VarId, op: &str, level: u8, double: bool) -> (String, u8) {
        let render = |id: VarId, context: u8| {
            if double {
                self.double(vars, id, context)
            } else {
                self.scalar(vars, id, context)
            }
        };
        (
            format!("{} {} {}", render(a, level), op, render(b, level + 1)),
            level,
        )
    }

    /// Expression for an instruction whose inputs are all scalars
    fn scalar_expression(&self, info: &Info, vars: &VariableTable) -> Option<(String, u8)> {
        use precedence::{ADDITIVE, ATOM, MULTIPLICATIVE, UNARY};
        use Primitive as P;
        use Signature as S;
        if !info.inputs.iter().all(|id| vars[*id].kind().is_scalar()) {
            return None;
        }
        let a = info.input(0)?;
        let b = info.input(1);
        let call = |name: &str, args: &[VarId]| -> (String, u8) {
            let args: Vec<String> = args.iter().map(|id| self.double(vars, *id, 0)).collect();
            (format!("{}({})", name, args.join(", ")), ATOM)
        };
        let kernel = |name: &str| format!("{}::{}", self.kernels, name);
        Some(match (info.primitive, info.signature) {
            (P::Add, S::Ii) => self.infix(vars, a, b?, "+", ADDITIVE, false),
            (P::Add, S::Ss) => self.infix(vars, a, b?, "+", ADDITIVE, true),
            (P::Subtract, S::Ii) => self.infix(vars, a, b?, "-", ADDITIVE, false),
            (P::Subtract, S::Ss) => self.infix(vars, a, b?, "-", ADDITIVE, true),
            (P::Multiply, S::Ii) => self.infix(vars, a, b?, "*", MULTIPLICATIVE, false),
            (P::Multiply, S::Ss) => self.infix(vars, a, b?, "*", MULTIPLICATIVE, true),
            (P::Divide, S::Ii) => (
                format!(
                    "{}({}, {})?",
                    kernel("divide_integer"),
                    self.scalar(vars, a, 0),
                    self.scalar(vars, b?, 0)
                ),
                ATOM,
            ),
            (P::Divide, S::Ss) => self.infix(vars, a, b?, "/", MULTIPLICATIVE, true),
            (P::Neg, S::I) => (format!("-{}", self.scalar(vars, a, ATOM)), UNARY),
            (P::Neg, S::S) => (format!("-{}", self.double(vars, a, ATOM)), UNARY),
            (P::Copy, S::Ii) | (P::Max | P::Min, S::I) => (self.scalar(vars, a, ATOM), ATOM),
            (P::Copy, S::Ss) | (P::Det | P::Max | P::Min | P::Sum, S::S) => (self.double(vars, a, ATOM), ATOM),
            (P::Abs, S::I) => (format!("i64::abs({})", self.scalar(vars, a, 0)), ATOM),
            (P::Abs | P::NormF, S::S) | (P::NormP, S::Ss) => call("f64::abs", &[a]),
            (P::Inverse, S::S) => (
                format!("1.0 / {}", self.double(vars, a, MULTIPLICATIVE + 1)),
                MULTIPLICATIVE,
            ),
            (P::PseudoInverse, S::S) => call(&kernel("pinv_scalar"), &[a]),
            (P::Rref, S::S) => call(&kernel("rref_scalar"), &[a]),
            (P::ElementPow, S::Ss) => call("f64::powf", &[a, b?]),
            (P::Atan2, S::Ss) => call("f64::atan2", &[a, b?]),
            (P::Sqrt, S::S | S::I) => call("f64::sqrt", &[a]),
            (P::Sin, S::S | S::I) => call("f64::sin", &[a]),
            (P::Cos, S::S | S::I) => call("f64::cos", &[a]),
            (P::Atan, S::S | S::I) => call("f64::atan", &[a]),
            (P::Exp, S::S | S::I) => call("f64::exp", &[a]),
            (P::Log, S::S | S::I) => call("f64::ln", &[a]),
            _ => return None,
        })
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn scalar_statement(&self, buffer: &mut String, info: &Info, vars: &VariableTable, out: VarId) -> Result<()> {
        use Primitive as P;
        use Signature as S;
        let lhs = self.lhs(vars, out);
        if let Some((expr, _)) = self.scalar_expression(info, vars) {
            self.line(buffer, &format!("{} = {};", lhs, expr));
            return Ok(());
        }
        let k = &self.kernels;
        let a = input(info, 0)?;
        let rhs = match (info.primitive, info.signature) {
            (P::Det, S::M) => format!("{}::det({})?", k, self.mref(vars, a)),
            (P::Trace, S::M) => format!("{}::trace({})", k, self.mref(vars, a)),
            (P::NormF, S::M) => format!("{}::norm_f({})", k, self.mref(vars, a)),
            (P::Max, S::M) => format!("{}::max({})?", k, self.mref(vars, a)),
            (P::Min, S::M) => format!("{}::min({})?", k, self.mref(vars, a)),
            (P::Sum, S::M) => format!("{}::sum({})", k, self.mref(vars, a)),
            (P::NormP, S::Ms) => format!(
                "{}::norm_p({}, {})?",
                k,
                self.mref(vars, a),
                self.double(vars, input(info, 1)?, 0)
            ),
            (P::Dot, S::Bare) => format!(
                "{}::dot({}, {})?",
                k,
                self.mref(vars, a),
                self.mref(vars, input(info, 1)?)
            ),
            (P::ExtractScalar, S::Bare) => match info.inputs.len() {
                2 => format!(
                    "{}::element({}, {})?",
                    k,
                    self.mref(vars, a),
                    self.index(vars, input(info, 1)?)
                ),
                3 => format!(
                    "{}::element2({}, {}, {})?",
                    k,
                    self.mref(vars, a),
                    self.index(vars, input(info, 1)?),
                    self.index(vars, input(info, 2)?)
                ),
                _ => return Err(unimplemented(info)),
            },
            (P::Copy, S::Sm1) => format!("{}::scalar_of({})?", k, self.mref(vars, a)),
            (P::Rng, S::I) => {
                let seed = self.scalar(vars, a, precedence::ATOM);
                self.line(buffer, &format!("rng.reseed({} as u64);", seed));
                seed
            }
            _ => return Err(unimplemented(info)),
        };
        self.line(buffer, &format!("{} = {};", lhs, rhs));
        Ok(())
    }

    fn matrix_statement(&self, buffer: &mut String, info: &Info, vars: &VariableTable, out: VarId) -> Result<()> {
        use Primitive as P;
        use Signature as S;
        if info.primitive == P::Copy && info.input(0) == Some(out) {
            return Ok(());
        }
        if is_in_place(info) && !info.inputs.contains(&out) {
            return self.in_place(buffer, info, vars, out);
        }
        let k = &self.kernels;
        let m = |i: usize| -> Result<String> { Ok(self.mref(vars, input(info, i)?)) };
        let d = |i: usize| -> Result<String> { Ok(self.double(vars, input(info, i)?, 0)) };
        let n = |i: usize| -> Result<String> { Ok(self.scalar(vars, input(info, i)?, 0)) };
        let unary = |name: &str| -> Result<String> { Ok(format!("{}::{}({})", k, name, m(0)?)) };
        let binary = |name: &str| -> Result<String> { Ok(format!("{}::{}({}, {})", k, name, m(0)?, m(1)?)) };
        let rhs = match (info.primitive, info.signature) {
            // Aliased in-place forms assign a fresh result
            (P::Add, S::Mm) => format!("{}?", binary("add")?),
            (P::Subtract, S::Mm) => format!("{}?", binary("subtract")?),
            (P::Multiply, S::Mm) => format!("{}?", binary("multiply")?),
            (P::ElementMult, S::Mm) => format!("{}?", binary("element_mult")?),
            (P::ElementDivision, S::Mm) => format!("{}?", binary("element_div")?),
            (P::Transpose, S::M) => format!("{}.transpose()", self.recv(vars, input(info, 0)?)),

            (P::Add, S::Ms) => format!("{}::add_scalar({}, {})", k, m(0)?, d(1)?),
            (P::Add, S::Sm) => format!("{}::add_scalar({}, {})", k, m(1)?, d(0)?),
            (P::Subtract, S::Ms) => format!("{}::subtract_scalar({}, {})", k, m(0)?, d(1)?),
            (P::Subtract, S::Sm) => format!("{}::scalar_minus({}, {})", k, d(0)?, m(1)?),
            (P::Multiply, S::Ms) => format!("{}::scale({}, {})", k, m(0)?, d(1)?),
            (P::Multiply, S::Sm) => format!("{}::scale({}, {})", k, m(1)?, d(0)?),
            (P::Divide, S::Ms) => format!("{}::divide_scalar({}, {})", k, m(0)?, d(1)?),
            (P::Neg, S::M) => unary("negate")?,
            (P::ElementDivision, S::Sm) => format!("{}::scalar_div_elements({}, {})", k, d(0)?, m(1)?),
            (P::ElementPow, S::Mm) => format!("{}?", binary("element_pow")?),
            (P::ElementPow, S::Ms) => format!("{}::element_pow_ms({}, {})", k, m(0)?, d(1)?),
            (P::ElementPow, S::Sm) => format!("{}::element_pow_sm({}, {})", k, d(0)?, m(1)?),

            (P::Inverse, S::M) => format!("{}?", unary("invert")?),
            (P::PseudoInverse, S::M) => format!("{}?", unary("pinv")?),
            (P::Rref, S::M) => unary("rref")?,
            (P::Kron, S::Bare) => binary("kron")?,
            (P::Solve, S::Bare) => format!("{}?", binary("solve")?),

            (P::MaxRows, S::Bare) => unary("max_rows")?,
            (P::MaxCols, S::Bare) => unary("max_cols")?,
            (P::MinRows, S::Bare) => unary("min_rows")?,
            (P::MinCols, S::Bare) => unary("min_cols")?,
            (P::SumRows, S::Bare) => unary("sum_rows")?,
            (P::SumCols, S::Bare) => unary("sum_cols")?,

            (P::Abs, S::M) => unary("abs")?,
            (P::Sqrt, S::M) => unary("sqrt")?,
            (P::Sin, S::M) => unary("sin")?,
            (P::Cos, S::M) => unary("cos")?,
            (P::Atan, S::M) => unary("atan")?,
            (P::Exp, S::M) => unary("exp")?,
            (P::Log, S::M) => unary("log")?,

            (P::Eye, S::I) => format!("{}::eye({})?", k, n(0)?),
            (P::Eye, S::M) => unary("eye_like")?,
            (P::Diag, S::M) => unary("diag")?,
            (P::Zeros, S::Ii) => format!("{}::zeros({}, {})?", k, n(0)?, n(1)?),
            (P::Ones, S::Ii) => format!("{}::ones({}, {})?", k, n(0)?, n(1)?),
            (P::Rand, S::Ii) => format!("{}::rand({}, {}, rng)?", k, n(0)?, n(1)?),
            (P::Randn, S::Ii) => format!("{}::randn({}, {}, rng)?", k, n(0)?, n(1)?),

            (P::Extract, S::Bare) => self.extract(info, vars)?,
            _ => return Err(unimplemented(info)),
        };
        self.line(buffer, &format!("{} = {};", self.lhs(vars, out), rhs));
        Ok(())
    }

    /// Reshape the output from the dimension hints, then write into it
    fn in_place(&self, buffer: &mut String, info: &Info, vars: &VariableTable, out: VarId) -> Result<()> {
        let (rows, cols) = match info.dimensions.as_slice() {
            [rows, cols] => (
                self.dimension(vars, info, *rows)?,
                self.dimension(vars, info, *cols)?,
            ),
            _ => return Err(unimplemented(info)),
        };
        self.line(
            buffer,
            &format!("{}.resize_mut({}, {}, 0.0);", self.recv(vars, out), rows, cols),
        );
        let k = &self.kernels;
        let a = self.mref(vars, input(info, 0)?);
        let target = self.mout(vars, out);
        let binary = |name: &str| -> Result<String> {
            Ok(format!(
                "{}::{}({}, {}, {})?;",
                k,
                name,
                a,
                self.mref(vars, input(info, 1)?),
                target
            ))
        };
        let call = match info.primitive {
            Primitive::Add => binary("add_into")?,
            Primitive::Subtract => binary("subtract_into")?,
            Primitive::Multiply => binary("multiply_into")?,
            Primitive::ElementMult => binary("element_mult_into")?,
            Primitive::ElementDivision => binary("element_div_into")?,
            Primitive::Transpose => format!("{}::transpose_into({}, {})?;", k, a, target),
            Primitive::Copy => format!("{}::copy_into({}, {})?;", k, a, target),
            _ => return Err(unimplemented(info)),
        };
        self.line(buffer, &call);
        Ok(())
    }

    fn extract(&self, info: &Info, vars: &VariableTable) -> Result<String> {
        let k = &self.kernels;
        let range = info.range.as_deref().ok_or_else(|| unimplemented(info))?;
        let extents = extents::analyze(vars, range)?;
        let a = input(info, 0)?;
        let recv = self.recv(vars, a);
        let src = self.mref(vars, a);
        let operand = |v: VarId| self.index(vars, v);
        if extents.flattened {
            let len = format!("{}.len()", recv);
            let indices = index_vector(&extents.cols.render(vars, &len, k, &operand));
            return Ok(format!("{}::extract_flat({}, &{})?", k, src, indices));
        }
        let rows = extents.rows.render(vars, &format!("{}.nrows()", recv), k, &operand);
        let cols = extents.cols.render(vars, &format!("{}.ncols()", recv), k, &operand);
        Ok(match (&rows, &cols) {
            (
                RenderedExtent::Block { start: r0, end: r1 },
                RenderedExtent::Block { start: c0, end: c1 },
            ) => format!("{}::extract_block({}, {}, {}, {}, {})?", k, src, r0, r1, c0, c1),
            _ => format!(
                "{}::extract_indices({}, &{}, &{})?",
                k,
                src,
                index_vector(&rows),
                index_vector(&cols)
            ),
        })
    }

    /// `dst(range) = src`, in a block so the index bindings stay local
    fn copy_range(&self, buffer: &mut String, info: &Info, vars: &VariableTable) -> Result<()> {
        let k = &self.kernels;
        let dst = info.output.ok_or_else(|| unimplemented(info))?;
        let src = input(info, 0)?;
        let range = info.range.as_deref().ok_or_else(|| unimplemented(info))?;
        let extents = extents::analyze(vars, range)?;
        let recv = self.recv(vars, dst);
        let target = self.mout(vars, dst);
        let operand = |v: VarId| self.index(vars, v);
        let value = match info.signature {
            Signature::Mm if src == dst => format!("&{}.clone()", recv),
            Signature::Mm => self.mref(vars, src),
            Signature::Sm => self.double(vars, src, 0),
            _ => return Err(unimplemented(info)),
        };
        let (insert, fill) = ("insert", "fill");
        let verb = if info.signature == Signature::Mm { insert } else { fill };

        let mut body = Vec::new();
        if extents.flattened {
            let len = format!("{}.len()", recv);
            let indices = index_vector(&extents.cols.render(vars, &len, k, &operand));
            body.push(format!("let idx: Vec<usize> = {};", indices));
            body.push(format!("{}::{}_flat({}, {}, &idx)?;", k, verb, target, value));
        } else {
            let rows = extents.rows.render(vars, &format!("{}.nrows()", recv), k, &operand);
            let cols = extents.cols.render(vars, &format!("{}.ncols()", recv), k, &operand);
            match (&rows, &cols) {
                (
                    RenderedExtent::Block { start: r0, end: r1 },
                    RenderedExtent::Block { start: c0, end: c1 },
                ) => {
                    body.push(format!("let rows = ({}, {});", r0, r1));
                    body.push(format!("let cols = ({}, {});", c0, c1));
                    body.push(format!(
                        "{}::{}_block({}, {}, rows.0, rows.1, cols.0, cols.1)?;",
                        k, verb, target, value
                    ));
                }
                _ => {
                    body.push(format!("let rows: Vec<usize> = {};", index_vector(&rows)));
                    body.push(format!("let cols: Vec<usize> = {};", index_vector(&cols)));
                    body.push(format!(
                        "{}::{}_indices({}, {}, &rows, &cols)?;",
                        k, verb, target, value
                    ));
                }
            }
        }
        self.line(buffer, "{");
        for statement in body {
            self.line(buffer, &format!("    {}", statement));
        }
        self.line(buffer, "}");
        Ok(())
    }

    fn construct(&self, buffer: &mut String, info: &Info, vars: &VariableTable) -> Result<()> {
        let out = info.output.ok_or_else(|| unimplemented(info))?;
        let constructor = info.constructor.as_ref().ok_or_else(|| unimplemented(info))?;
        let mut rows = Vec::with_capacity(constructor.rows.len());
        for row in &constructor.rows {
            let mut items = Vec::with_capacity(row.len());
            for id in row {
                items.push(match vars.kind(*id) {
                    Kind::Matrix => format!("{}.clone()", self.recv(vars, *id)),
                    Kind::Integer | Kind::Double => {
                        format!("{}::scalar({})", self.kernels, self.double(vars, *id, 0))
                    }
                    Kind::Sequence => {
                        return Err(Error::unsupported(
                            Primitive::MatrixConstructor.name(),
                            vars.describe(&[*id]),
                        ))
                    }
                });
            }
            rows.push(format!("vec![{}]", items.join(", ")));
        }
        self.line(
            buffer,
            &format!("{} = {}::concat(&[{}])?;", self.lhs(vars, out), self.kernels, rows.join(", ")),
        );
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

impl Backend for SourceEmitter {
    fn emit_operation(&mut self, buffer: &mut String, info: &Info, vars: &VariableTable) -> Result<()> {
        if info.primitive == Primitive::Copy && info.range.is_some() {
            return self.copy_range(buffer, info, vars);
        }
        if info.primitive == Primitive::MatrixConstructor {
            return self.construct(buffer, info, vars);
        }
        let out = info.output.ok_or_else(|| unimplemented(info))?;
        match vars.kind(out) {
            Kind::Integer | Kind::Double => self.scalar_statement(buffer, info, vars, out),
            Kind::Matrix => self.matrix_statement(buffer, info, vars, out),
            Kind::Sequence => Err(unimplemented(info)),
        }
    }

    fn declare(&mut self, buffer: &mut String, indent: &str, vars: &VariableTable, id: VarId) -> Result<()> {
        let var = vars.get(id).ok_or(Error::UnknownVariable(id.index()))?;
        if !var.temporary {
            return Ok(());
        }
        let text = match var.kind() {
            Kind::Integer => format!("let mut {}: i64 = 0;", var.name),
            Kind::Double => format!("let mut {}: f64 = 0.0;", var.name),
            Kind::Matrix => format!("let mut {} = {}::Matrix::zeros(0, 0);", var.name, self.kernels),
            Kind::Sequence => return Ok(()),
        };
        buffer.push_str(indent);
        buffer.push_str(&text);
        buffer.push('\n');
        Ok(())
    }

    fn fold_constant(&mut self, info: &Info, vars: &VariableTable) -> Result<Option<FoldedScalar>> {
        match info.output {
            Some(out) if vars.kind(out).is_scalar() => {}
            _ => return Ok(None),
        }
        if info.primitive.is_random() || info.range.is_some() {
            return Ok(None);
        }
        Ok(self
            .scalar_expression(info, vars)
            .map(|(text, precedence)| FoldedScalar { text, precedence }))
    }
}
