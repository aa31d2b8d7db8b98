//! IR instruction definitions

use super::variable::{VarId, VariableTable};
use serde::Serialize;
use std::fmt;

/// Primitive operation, the first half of an op name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Primitive {
    // Arithmetic
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`
    Divide,
    /// `-a`
    Neg,
    /// `a .* b`
    ElementMult,
    /// `a ./ b`
    ElementDivision,
    /// `a .^ b`
    ElementPow,

    // Linear algebra
    /// `a'`
    Transpose,
    /// `inv(a)`
    Inverse,
    /// `pinv(a)`
    PseudoInverse,
    /// `rref(a)`
    Rref,
    /// `det(a)`
    Det,
    /// `trace(a)`
    Trace,
    /// `normF(a)`
    NormF,
    /// `normP(a, p)`
    NormP,
    /// `kron(a, b)`
    Kron,
    /// `dot(a, b)`
    Dot,
    /// `solve(a, b)`
    Solve,

    // Reductions
    /// `max(a)`
    Max,
    /// `max_rows(a)`
    MaxRows,
    /// `max_cols(a)`
    MaxCols,
    /// `min(a)`
    Min,
    /// `min_rows(a)`
    MinRows,
    /// `min_cols(a)`
    MinCols,
    /// `sum(a)`
    Sum,
    /// `sum_rows(a)`
    SumRows,
    /// `sum_cols(a)`
    SumCols,

    // Element functions
    /// `abs(a)`
    Abs,
    /// `sqrt(a)`
    Sqrt,
    /// `sin(a)`
    Sin,
    /// `cos(a)`
    Cos,
    /// `atan(a)`
    Atan,
    /// `exp(a)`
    Exp,
    /// `log(a)`
    Log,
    /// `atan2(a, b)`
    Atan2,

    // Construction
    /// `eye(n)` / `eye(a)`
    Eye,
    /// `diag(a)`
    Diag,
    /// `zeros(r, c)`
    Zeros,
    /// `ones(r, c)`
    Ones,
    /// `rand(r, c)`
    Rand,
    /// `randn(r, c)`
    Randn,
    /// `rng(seed)`
    Rng,
    /// `[a, b; c, d]`
    MatrixConstructor,

    // Data movement
    /// `b = a`, `b(range) = a`
    Copy,
    /// `a(range)` producing a matrix
    Extract,
    /// `a(i, j)` producing a double
    ExtractScalar,
}

impl Primitive {
    /// Name used in op names and error messages
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Add => "add",
            Primitive::Subtract => "subtract",
            Primitive::Multiply => "multiply",
            Primitive::Divide => "divide",
            Primitive::Neg => "neg",
            Primitive::ElementMult => "elementMult",
            Primitive::ElementDivision => "elementDivision",
            Primitive::ElementPow => "elementPow",
            Primitive::Transpose => "transpose",
            Primitive::Inverse => "inv",
            Primitive::PseudoInverse => "pinv",
            Primitive::Rref => "rref",
            Primitive::Det => "det",
            Primitive::Trace => "trace",
            Primitive::NormF => "normF",
            Primitive::NormP => "normP",
            Primitive::Kron => "kron",
            Primitive::Dot => "dot",
            Primitive::Solve => "solve",
            Primitive::Max => "max",
            Primitive::MaxRows => "max_rows",
            Primitive::MaxCols => "max_cols",
            Primitive::Min => "min",
            Primitive::MinRows => "min_rows",
            Primitive::MinCols => "min_cols",
            Primitive::Sum => "sum",
            Primitive::SumRows => "sum_rows",
            Primitive::SumCols => "sum_cols",
            Primitive::Abs => "abs",
            Primitive::Sqrt => "sqrt",
            Primitive::Sin => "sin",
            Primitive::Cos => "cos",
            Primitive::Atan => "atan",
            Primitive::Exp => "exp",
            Primitive::Log => "log",
            Primitive::Atan2 => "atan2",
            Primitive::Eye => "eye",
            Primitive::Diag => "diag",
            Primitive::Zeros => "zeros",
            Primitive::Ones => "ones",
            Primitive::Rand => "rand",
            Primitive::Randn => "randn",
            Primitive::Rng => "rng",
            Primitive::MatrixConstructor => "matrixConstructor",
            Primitive::Copy => "copy",
            Primitive::Extract => "extract",
            Primitive::ExtractScalar => "extractScalar",
        }
    }

    /// Draws from the random number generator
    pub fn is_random(self) -> bool {
        matches!(self, Primitive::Rand | Primitive::Randn | Primitive::Rng)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand-type signature, the second half of an op name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Signature {
    /// matrix, matrix
    Mm,
    /// integer, integer
    Ii,
    /// scalar, scalar (at least one double)
    Ss,
    /// matrix, scalar
    Ms,
    /// scalar, matrix
    Sm,
    /// matrix
    M,
    /// double scalar
    S,
    /// integer scalar
    I,
    /// scalar taken from a 1x1 matrix
    Sm1,
    /// first operand alone decides dispatch
    Bare,
}

impl Signature {
    /// Suffix used in op names; empty for [`Signature::Bare`]
    pub fn suffix(self) -> &'static str {
        match self {
            Signature::Mm => "mm",
            Signature::Ii => "ii",
            Signature::Ss => "ss",
            Signature::Ms => "ms",
            Signature::Sm => "sm",
            Signature::M => "m",
            Signature::S => "s",
            Signature::I => "i",
            Signature::Sm1 => "sm1",
            Signature::Bare => "",
        }
    }
}

/// Which operand dimension an output dimension is copied from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DimensionHint {
    /// Rows of the first input
    LhsRows,
    /// Columns of the first input
    LhsCols,
    /// Rows of the second input
    RhsRows,
    /// Columns of the second input
    RhsCols,
}

/// Payload of a matrix literal: rows of scalar or matrix items
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixConstructor {
    /// Items per row, concatenated horizontally then stacked
    pub rows: Vec<Vec<VarId>>,
}

impl MatrixConstructor {
    /// Empty constructor
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append a row of items
    pub fn push_row(&mut self, items: Vec<VarId>) {
        self.rows.push(items);
    }

    /// All items in row-major order
    pub fn items(&self) -> impl Iterator<Item = &VarId> {
        self.rows.iter().flatten()
    }
}

impl Default for MatrixConstructor {
    fn default() -> Self {
        Self::new()
    }
}

/// IR instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    /// Primitive operation
    pub primitive: Primitive,
    /// Operand-type signature
    pub signature: Signature,
    /// Ordered inputs
    pub inputs: Vec<VarId>,
    /// Written variable
    pub output: Option<VarId>,
    /// Submatrix range, present only on ranged copy and extract
    pub range: Option<Vec<VarId>>,
    /// Matrix literal payload
    pub constructor: Option<MatrixConstructor>,
    /// Output rows and columns copied from operand dimensions
    pub dimensions: Vec<DimensionHint>,
}

impl Info {
    /// Create an instruction with no operands
    pub fn new(primitive: Primitive, signature: Signature) -> Self {
        Self {
            primitive,
            signature,
            inputs: Vec::new(),
            output: None,
            range: None,
            constructor: None,
            dimensions: Vec::new(),
        }
    }

    /// Full op name, e.g. `add-mm` or `extract`
    pub fn op_name(&self) -> String {
        match self.signature {
            Signature::Bare => self.primitive.name().to_string(),
            sig => format!("{}-{}", self.primitive.name(), sig.suffix()),
        }
    }

    /// Input by position
    pub fn input(&self, index: usize) -> Option<VarId> {
        self.inputs.get(index).copied()
    }

    /// Unranged copy, the only shape trailing-copy elimination removes
    pub fn is_plain_copy(&self) -> bool {
        self.primitive == Primitive::Copy
            && self.range.is_none()
            && matches!(self.signature, Signature::Mm | Signature::Ss | Signature::Ii)
    }

    /// Every variable read by the instruction, looking through range sequences
    pub fn reads(&self, vars: &VariableTable) -> Vec<VarId> {
        let mut out = self.inputs.clone();
        if let Some(range) = &self.range {
            for id in range {
                match vars[*id].sequence() {
                    Some(seq) => out.extend(seq.referenced()),
                    None => out.push(*id),
                }
            }
        }
        if let Some(constructor) = &self.constructor {
            out.extend(constructor.items().copied());
        }
        out
    }

    /// Every variable the instruction touches, reads first then the output
    pub fn references(&self, vars: &VariableTable) -> Vec<VarId> {
        let mut out = self.reads(vars);
        out.extend(self.output);
        out
    }

    /// Replace `from` with `to` in operands, output and constructor items.
    /// Range sequences live in the variable table and are rewritten there.
    pub fn substitute(&mut self, vars: &mut VariableTable, from: VarId, to: VarId) {
        for input in self.inputs.iter_mut() {
            if *input == from {
                *input = to;
            }
        }
        if self.output == Some(from) {
            self.output = Some(to);
        }
        if let Some(range) = self.range.as_mut() {
            for id in range.iter_mut() {
                if *id == from {
                    *id = to;
                    continue;
                }
                if let Some(var) = vars.get_mut(*id) {
                    if let super::variable::VariableType::Sequence(seq) = &mut var.ty {
                        seq.substitute(from, to);
                    }
                }
            }
        }
        if let Some(constructor) = self.constructor.as_mut() {
            for item in constructor.rows.iter_mut().flatten() {
                if *item == from {
                    *item = to;
                }
            }
        }
    }
}
