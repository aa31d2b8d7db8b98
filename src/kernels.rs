//! Dense matrix kernels
//!
//! Thin layer over `nalgebra` shared by the two backends: the direct executor
//! calls these functions with live values, and generated source calls them by
//! path (`mateq::kernels::invert(&a)?`). Keeping both on the same functions is
//! what makes interpreted and generated runs agree.
//!
//! All indices are zero based. Flattened (single index) addressing is
//! row-major.

pub use crate::compiler::temp::MatrixRng;
use nalgebra::DMatrix;
use thiserror::Error;

/// Matrix type used throughout
pub type Matrix = DMatrix<f64>;

/// Singular values below this are treated as zero by `pinv` and `solve`
pub const EPSILON: f64 = 1e-12;

/// Kernel failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Matrix has no inverse
    #[error("matrix is singular")]
    Singular,

    /// Square matrix required
    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare {
        /// Rows
        rows: usize,
        /// Columns
        cols: usize,
    },

    /// Operand shapes do not conform
    #[error("{op}: incompatible shapes {lhs_rows}x{lhs_cols} and {rhs_rows}x{rhs_cols}")]
    DimensionMismatch {
        /// Kernel name
        op: &'static str,
        /// Left rows
        lhs_rows: usize,
        /// Left columns
        lhs_cols: usize,
        /// Right rows
        rhs_rows: usize,
        /// Right columns
        rhs_cols: usize,
    },

    /// Index outside the addressed dimension
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Dimension length
        length: usize,
    },

    /// Index computed from a negative integer
    #[error("negative index {0}")]
    NegativeIndex(i64),

    /// Index arithmetic left the `i64` range
    #[error("index arithmetic overflowed")]
    IndexOverflow,

    /// Integer division by zero or `i64::MIN / -1`
    #[error("integer division {0} / {1} is undefined")]
    IntegerDivision(i64, i64),

    /// Sequence step of zero
    #[error("sequence step must not be zero")]
    ZeroStep,

    /// Value must be a 1x1 matrix
    #[error("expected a 1x1 matrix, got {rows}x{cols}")]
    NotScalar {
        /// Rows
        rows: usize,
        /// Columns
        cols: usize,
    },

    /// Operation needs a row or column vector
    #[error("{op}: expected a vector, got {rows}x{cols}")]
    NotVector {
        /// Kernel name
        op: &'static str,
        /// Rows
        rows: usize,
        /// Columns
        cols: usize,
    },

    /// Reduction of an empty matrix
    #[error("{op}: matrix is empty")]
    Empty {
        /// Kernel name
        op: &'static str,
    },

    /// Norm order not defined for matrices
    #[error("normP: unsupported order {0} for a matrix")]
    UnsupportedNorm(f64),
}

/// Result type of the kernels
pub type KernelResult<T> = std::result::Result<T, KernelError>;

fn mismatch(op: &'static str, a: &Matrix, b: &Matrix) -> KernelError {
    KernelError::DimensionMismatch {
        op,
        lhs_rows: a.nrows(),
        lhs_cols: a.ncols(),
        rhs_rows: b.nrows(),
        rhs_cols: b.ncols(),
    }
}

fn same_shape(op: &'static str, a: &Matrix, b: &Matrix) -> KernelResult<()> {
    if a.shape() != b.shape() {
        return Err(mismatch(op, a, b));
    }
    Ok(())
}

fn square(a: &Matrix) -> KernelResult<()> {
    if a.nrows() != a.ncols() {
        return Err(KernelError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    Ok(())
}

fn is_vector(a: &Matrix) -> bool {
    a.nrows() == 1 || a.ncols() == 1
}

// =============================================================================
// ARITHMETIC
// =============================================================================

/// `a + b`
pub fn add(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    same_shape("add", a, b)?;
    Ok(a + b)
}

/// `a - b`
pub fn subtract(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    same_shape("subtract", a, b)?;
    Ok(a - b)
}

/// `a * b`
pub fn multiply(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    if a.ncols() != b.nrows() {
        return Err(mismatch("multiply", a, b));
    }
    Ok(a * b)
}

/// `a .* b`
pub fn element_mult(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    same_shape("elementMult", a, b)?;
    Ok(a.component_mul(b))
}

/// `a ./ b`
pub fn element_div(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    same_shape("elementDivision", a, b)?;
    Ok(a.component_div(b))
}

/// `s ./ a`
pub fn scalar_div_elements(s: f64, a: &Matrix) -> Matrix {
    a.map(|x| s / x)
}

/// `a .^ b`
pub fn element_pow(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    same_shape("elementPow", a, b)?;
    Ok(a.zip_map(b, f64::powf))
}

/// `a .^ s`
pub fn element_pow_ms(a: &Matrix, s: f64) -> Matrix {
    a.map(|x| x.powf(s))
}

/// `s .^ a`
pub fn element_pow_sm(s: f64, a: &Matrix) -> Matrix {
    a.map(|x| s.powf(x))
}

/// `a + s` element-wise
pub fn add_scalar(a: &Matrix, s: f64) -> Matrix {
    a.add_scalar(s)
}

/// `s - a` element-wise
pub fn scalar_minus(s: f64, a: &Matrix) -> Matrix {
    a.map(|x| s - x)
}

/// `a - s` element-wise
pub fn subtract_scalar(a: &Matrix, s: f64) -> Matrix {
    a.add_scalar(-s)
}

/// `a * s`
pub fn scale(a: &Matrix, s: f64) -> Matrix {
    a * s
}

/// `a / s`
pub fn divide_scalar(a: &Matrix, s: f64) -> Matrix {
    a.map(|x| x / s)
}

/// `-a`
pub fn negate(a: &Matrix) -> Matrix {
    -a
}

// In-place forms. The caller sizes `out` first; a wrongly sized output is an
// error rather than a silent reallocation.

fn sized(op: &'static str, out: &Matrix, rows: usize, cols: usize) -> KernelResult<()> {
    if out.shape() != (rows, cols) {
        return Err(KernelError::DimensionMismatch {
            op,
            lhs_rows: out.nrows(),
            lhs_cols: out.ncols(),
            rhs_rows: rows,
            rhs_cols: cols,
        });
    }
    Ok(())
}

/// `out = a + b`
pub fn add_into(a: &Matrix, b: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    same_shape("add", a, b)?;
    sized("add", out, a.nrows(), a.ncols())?;
    a.add_to(b, out);
    Ok(())
}

/// `out = a - b`
pub fn subtract_into(a: &Matrix, b: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    same_shape("subtract", a, b)?;
    sized("subtract", out, a.nrows(), a.ncols())?;
    a.sub_to(b, out);
    Ok(())
}

/// `out = a * b`
pub fn multiply_into(a: &Matrix, b: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    if a.ncols() != b.nrows() {
        return Err(mismatch("multiply", a, b));
    }
    sized("multiply", out, a.nrows(), b.ncols())?;
    a.mul_to(b, out);
    Ok(())
}

/// `out = a .* b`
pub fn element_mult_into(a: &Matrix, b: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    same_shape("elementMult", a, b)?;
    sized("elementMult", out, a.nrows(), a.ncols())?;
    out.copy_from(a);
    out.component_mul_assign(b);
    Ok(())
}

/// `out = a ./ b`
pub fn element_div_into(a: &Matrix, b: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    same_shape("elementDivision", a, b)?;
    sized("elementDivision", out, a.nrows(), a.ncols())?;
    out.copy_from(a);
    out.component_div_assign(b);
    Ok(())
}

/// `out = a'`
pub fn transpose_into(a: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    sized("transpose", out, a.ncols(), a.nrows())?;
    a.transpose_to(out);
    Ok(())
}

/// `out = a`
pub fn copy_into(a: &Matrix, out: &mut Matrix) -> KernelResult<()> {
    sized("copy", out, a.nrows(), a.ncols())?;
    out.copy_from(a);
    Ok(())
}

// =============================================================================
// LINEAR ALGEBRA
// =============================================================================

/// `inv(a)`
pub fn invert(a: &Matrix) -> KernelResult<Matrix> {
    square(a)?;
    a.clone().try_inverse().ok_or(KernelError::Singular)
}

/// `pinv(a)`
pub fn pinv(a: &Matrix) -> KernelResult<Matrix> {
    a.clone()
        .pseudo_inverse(EPSILON)
        .map_err(|_| KernelError::Singular)
}

/// Reduced row echelon form by Gauss-Jordan elimination with partial pivoting
pub fn rref(a: &Matrix) -> Matrix {
    let mut m = a.clone();
    let (rows, cols) = m.shape();
    let mut lead = 0;
    for col in 0..cols {
        if lead >= rows {
            break;
        }
        let pivot = (lead..rows)
            .max_by(|&i, &j| m[(i, col)].abs().total_cmp(&m[(j, col)].abs()))
            .unwrap_or(lead);
        if m[(pivot, col)].abs() <= EPSILON {
            for i in lead..rows {
                m[(i, col)] = 0.0;
            }
            continue;
        }
        m.swap_rows(lead, pivot);
        let p = m[(lead, col)];
        for j in 0..cols {
            m[(lead, j)] /= p;
        }
        for i in 0..rows {
            if i == lead {
                continue;
            }
            let factor = m[(i, col)];
            if factor != 0.0 {
                for j in 0..cols {
                    m[(i, j)] -= factor * m[(lead, j)];
                }
            }
        }
        lead += 1;
    }
    m
}

/// `det(a)`
pub fn det(a: &Matrix) -> KernelResult<f64> {
    square(a)?;
    Ok(a.determinant())
}

/// Sum of the main diagonal; rectangular matrices use the shorter side
pub fn trace(a: &Matrix) -> f64 {
    (0..a.nrows().min(a.ncols())).map(|i| a[(i, i)]).sum()
}

/// Frobenius norm
pub fn norm_f(a: &Matrix) -> f64 {
    a.norm()
}

/// Vector p-norm, or the induced 1, 2 and infinity norms of a matrix
pub fn norm_p(a: &Matrix, p: f64) -> KernelResult<f64> {
    if is_vector(a) {
        if p.is_infinite() {
            return Ok(a.iter().fold(0.0, |acc, x| acc.max(x.abs())));
        }
        let sum: f64 = a.iter().map(|x| x.abs().powf(p)).sum();
        return Ok(sum.powf(1.0 / p));
    }
    if p == 1.0 {
        Ok(a.abs().row_sum().max())
    } else if p == 2.0 {
        Ok(a.clone().svd(false, false).singular_values.max())
    } else if p.is_infinite() {
        Ok(a.abs().column_sum().max())
    } else {
        Err(KernelError::UnsupportedNorm(p))
    }
}

/// `pinv` of a scalar: the reciprocal, or zero for zero
pub fn pinv_scalar(x: f64) -> f64 {
    if x.abs() <= EPSILON {
        0.0
    } else {
        1.0 / x
    }
}

/// `rref` of a scalar: one unless the value is zero
pub fn rref_scalar(x: f64) -> f64 {
    if x.abs() <= EPSILON {
        0.0
    } else {
        1.0
    }
}

/// Kronecker product
pub fn kron(a: &Matrix, b: &Matrix) -> Matrix {
    a.kronecker(b)
}

/// Dot product of two vectors with the same number of elements
pub fn dot(a: &Matrix, b: &Matrix) -> KernelResult<f64> {
    if !is_vector(a) {
        return Err(KernelError::NotVector {
            op: "dot",
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    if !is_vector(b) || a.len() != b.len() {
        return Err(mismatch("dot", a, b));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Solve `a * x = b`; least squares when `a` is not square
pub fn solve(a: &Matrix, b: &Matrix) -> KernelResult<Matrix> {
    if a.nrows() != b.nrows() {
        return Err(mismatch("solve", a, b));
    }
    if a.nrows() == a.ncols() {
        return a.clone().lu().solve(b).ok_or(KernelError::Singular);
    }
    a.clone()
        .svd(true, true)
        .solve(b, EPSILON)
        .map_err(|_| KernelError::Singular)
}

// =============================================================================
// REDUCTIONS
// =============================================================================

/// Largest element
pub fn max(a: &Matrix) -> KernelResult<f64> {
    if a.is_empty() {
        return Err(KernelError::Empty { op: "max" });
    }
    Ok(a.max())
}

/// Smallest element
pub fn min(a: &Matrix) -> KernelResult<f64> {
    if a.is_empty() {
        return Err(KernelError::Empty { op: "min" });
    }
    Ok(a.min())
}

/// Sum of all elements
pub fn sum(a: &Matrix) -> f64 {
    a.sum()
}

/// Column vector holding the maximum of each row
pub fn max_rows(a: &Matrix) -> Matrix {
    Matrix::from_fn(a.nrows(), 1, |i, _| a.row(i).max())
}

/// Row vector holding the maximum of each column
pub fn max_cols(a: &Matrix) -> Matrix {
    Matrix::from_fn(1, a.ncols(), |_, j| a.column(j).max())
}

/// Column vector holding the minimum of each row
pub fn min_rows(a: &Matrix) -> Matrix {
    Matrix::from_fn(a.nrows(), 1, |i, _| a.row(i).min())
}

/// Row vector holding the minimum of each column
pub fn min_cols(a: &Matrix) -> Matrix {
    Matrix::from_fn(1, a.ncols(), |_, j| a.column(j).min())
}

/// Column vector holding the sum of each row
pub fn sum_rows(a: &Matrix) -> Matrix {
    Matrix::from_fn(a.nrows(), 1, |i, _| a.row(i).sum())
}

/// Row vector holding the sum of each column
pub fn sum_cols(a: &Matrix) -> Matrix {
    Matrix::from_fn(1, a.ncols(), |_, j| a.column(j).sum())
}

// =============================================================================
// ELEMENT FUNCTIONS
// =============================================================================

/// `|a|` element-wise
pub fn abs(a: &Matrix) -> Matrix {
    a.abs()
}

/// Square root of each element
pub fn sqrt(a: &Matrix) -> Matrix {
    a.map(f64::sqrt)
}

/// Sine of each element
pub fn sin(a: &Matrix) -> Matrix {
    a.map(f64::sin)
}

/// Cosine of each element
pub fn cos(a: &Matrix) -> Matrix {
    a.map(f64::cos)
}

/// Arc tangent of each element
pub fn atan(a: &Matrix) -> Matrix {
    a.map(f64::atan)
}

/// Exponential of each element
pub fn exp(a: &Matrix) -> Matrix {
    a.map(f64::exp)
}

/// Natural logarithm of each element
pub fn log(a: &Matrix) -> Matrix {
    a.map(f64::ln)
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

/// 1x1 matrix holding `x`
pub fn scalar(x: f64) -> Matrix {
    Matrix::from_element(1, 1, x)
}

/// Square identity
pub fn eye(n: i64) -> KernelResult<Matrix> {
    let n = dimension(n)?;
    Ok(Matrix::identity(n, n))
}

/// Identity with the shape of `a`
pub fn eye_like(a: &Matrix) -> Matrix {
    Matrix::identity(a.nrows(), a.ncols())
}

/// Vector to diagonal matrix, or matrix to the column of its diagonal
pub fn diag(a: &Matrix) -> Matrix {
    if is_vector(a) {
        let n = a.len();
        let mut out = Matrix::zeros(n, n);
        for (i, x) in a.iter().enumerate() {
            out[(i, i)] = *x;
        }
        out
    } else {
        let n = a.nrows().min(a.ncols());
        Matrix::from_fn(n, 1, |i, _| a[(i, i)])
    }
}

/// Zero-filled matrix
pub fn zeros(rows: i64, cols: i64) -> KernelResult<Matrix> {
    Ok(Matrix::zeros(dimension(rows)?, dimension(cols)?))
}

/// One-filled matrix
pub fn ones(rows: i64, cols: i64) -> KernelResult<Matrix> {
    Ok(Matrix::from_element(dimension(rows)?, dimension(cols)?, 1.0))
}

/// Uniform random matrix in `[0, 1)`, filled row by row
pub fn rand(rows: i64, cols: i64, rng: &mut MatrixRng) -> KernelResult<Matrix> {
    let (rows, cols) = (dimension(rows)?, dimension(cols)?);
    let data: Vec<f64> = (0..rows * cols).map(|_| rng.uniform()).collect();
    Ok(Matrix::from_row_slice(rows, cols, &data))
}

/// Standard normal random matrix, filled row by row
pub fn randn(rows: i64, cols: i64, rng: &mut MatrixRng) -> KernelResult<Matrix> {
    let (rows, cols) = (dimension(rows)?, dimension(cols)?);
    let data: Vec<f64> = (0..rows * cols).map(|_| rng.normal()).collect();
    Ok(Matrix::from_row_slice(rows, cols, &data))
}

fn dimension(n: i64) -> KernelResult<usize> {
    usize::try_from(n).map_err(|_| KernelError::IndexOutOfBounds {
        index: n,
        length: 0,
    })
}

/// Concatenate blocks: items in a row are joined horizontally, rows are stacked
pub fn concat(rows: &[Vec<Matrix>]) -> KernelResult<Matrix> {
    let mut stacked: Vec<Matrix> = Vec::with_capacity(rows.len());
    for row in rows {
        let height = row.iter().map(|m| m.nrows()).max().unwrap_or(0);
        let width: usize = row.iter().map(|m| m.ncols()).sum();
        let mut out = Matrix::zeros(height, width);
        let mut col = 0;
        for item in row {
            if item.is_empty() {
                continue;
            }
            if item.nrows() != height {
                return Err(mismatch("matrixConstructor", &out, item));
            }
            out.view_mut((0, col), item.shape()).copy_from(item);
            col += item.ncols();
        }
        stacked.push(out);
    }
    let width = stacked.iter().map(|m| m.ncols()).max().unwrap_or(0);
    let height: usize = stacked.iter().map(|m| m.nrows()).sum();
    let mut out = Matrix::zeros(height, width);
    let mut row = 0;
    for block in &stacked {
        if block.is_empty() {
            continue;
        }
        if block.ncols() != width {
            return Err(mismatch("matrixConstructor", &out, block));
        }
        out.view_mut((row, 0), block.shape()).copy_from(block);
        row += block.nrows();
    }
    Ok(out)
}

// =============================================================================
// INDEXING
// =============================================================================

/// Indices `start, start+step, ...` up to and including `end`
pub fn sequence(start: i64, step: i64, end: i64) -> KernelResult<Vec<usize>> {
    if step == 0 {
        return Err(KernelError::ZeroStep);
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i <= end) || (step < 0 && i >= end) {
        out.push(index(i, usize::MAX)?);
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(out)
}

/// Indices `start, start+step, ...` below `length`
pub fn sequence_to(start: i64, step: i64, length: usize) -> KernelResult<Vec<usize>> {
    if step < 0 {
        return sequence(start, step, 0);
    }
    sequence(start, step, length as i64 - 1)
}

/// Truncating integer division
pub fn divide_integer(a: i64, b: i64) -> KernelResult<i64> {
    a.checked_div(b).ok_or(KernelError::IntegerDivision(a, b))
}

/// Zero-based index held in an integer variable
pub fn to_index(i: i64) -> KernelResult<usize> {
    usize::try_from(i).map_err(|_| KernelError::NegativeIndex(i))
}

/// One past the index held in an integer variable
pub fn to_index_after(i: i64) -> KernelResult<usize> {
    to_index(i.checked_add(1).ok_or(KernelError::IndexOverflow)?)
}

/// Offset and length of `[start, end)` within `length`; reversed bounds
/// select nothing
fn span(start: usize, end: usize, length: usize) -> KernelResult<(usize, usize)> {
    if end <= start {
        return Ok((0, 0));
    }
    if end > length {
        return Err(KernelError::IndexOutOfBounds {
            index: end as i64 - 1,
            length,
        });
    }
    Ok((start, end - start))
}

fn index(i: i64, length: usize) -> KernelResult<usize> {
    match usize::try_from(i) {
        Ok(u) if u < length => Ok(u),
        _ => Err(KernelError::IndexOutOfBounds { index: i, length }),
    }
}

fn check_indices(indices: &[usize], length: usize) -> KernelResult<()> {
    match indices.iter().find(|&&i| i >= length) {
        Some(&i) => Err(KernelError::IndexOutOfBounds {
            index: i as i64,
            length,
        }),
        None => Ok(()),
    }
}

fn flat(a: &Matrix, i: usize) -> (usize, usize) {
    let cols = a.ncols().max(1);
    (i / cols, i % cols)
}

/// Copy of the block `[row0, row1) x [col0, col1)`
pub fn extract_block(
    a: &Matrix,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
) -> KernelResult<Matrix> {
    let (r, rows) = span(row0, row1, a.nrows())?;
    let (c, cols) = span(col0, col1, a.ncols())?;
    Ok(a.view((r, c), (rows, cols)).into_owned())
}

/// Copy of the rows and columns listed
pub fn extract_indices(a: &Matrix, rows: &[usize], cols: &[usize]) -> KernelResult<Matrix> {
    check_indices(rows, a.nrows())?;
    check_indices(cols, a.ncols())?;
    Ok(Matrix::from_fn(rows.len(), cols.len(), |i, j| {
        a[(rows[i], cols[j])]
    }))
}

/// Row vector of the elements at row-major positions `indices`
pub fn extract_flat(a: &Matrix, indices: &[usize]) -> KernelResult<Matrix> {
    check_indices(indices, a.len())?;
    Ok(Matrix::from_fn(1, indices.len(), |_, j| a[flat(a, indices[j])]))
}

/// Element at row-major position `i`
pub fn element(a: &Matrix, i: i64) -> KernelResult<f64> {
    let i = index(i, a.len())?;
    Ok(a[flat(a, i)])
}

/// Element at `(row, col)`
pub fn element2(a: &Matrix, row: i64, col: i64) -> KernelResult<f64> {
    let row = index(row, a.nrows())?;
    let col = index(col, a.ncols())?;
    Ok(a[(row, col)])
}

/// Value of a 1x1 matrix
pub fn scalar_of(a: &Matrix) -> KernelResult<f64> {
    if a.shape() != (1, 1) {
        return Err(KernelError::NotScalar {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    Ok(a[(0, 0)])
}

/// Write `src` into the block `[row0, row1) x [col0, col1)` of `dst`
pub fn insert_block(
    dst: &mut Matrix,
    src: &Matrix,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
) -> KernelResult<()> {
    let (r, rows) = span(row0, row1, dst.nrows())?;
    let (c, cols) = span(col0, col1, dst.ncols())?;
    if src.shape() != (rows, cols) {
        return Err(mismatch("insert", dst, src));
    }
    dst.view_mut((r, c), src.shape()).copy_from(src);
    Ok(())
}

/// Set the block `[row0, row1) x [col0, col1)` of `dst` to `value`
pub fn fill_block(
    dst: &mut Matrix,
    value: f64,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
) -> KernelResult<()> {
    let (r, rows) = span(row0, row1, dst.nrows())?;
    let (c, cols) = span(col0, col1, dst.ncols())?;
    dst.view_mut((r, c), (rows, cols)).fill(value);
    Ok(())
}

/// Write `src` into the listed rows and columns of `dst`
pub fn insert_indices(
    dst: &mut Matrix,
    src: &Matrix,
    rows: &[usize],
    cols: &[usize],
) -> KernelResult<()> {
    check_indices(rows, dst.nrows())?;
    check_indices(cols, dst.ncols())?;
    if src.shape() != (rows.len(), cols.len()) {
        return Err(mismatch("insert", dst, src));
    }
    for (i, r) in rows.iter().enumerate() {
        for (j, c) in cols.iter().enumerate() {
            dst[(*r, *c)] = src[(i, j)];
        }
    }
    Ok(())
}

/// Write the elements of `src`, in row-major order, to row-major positions of `dst`
pub fn insert_flat(dst: &mut Matrix, src: &Matrix, indices: &[usize]) -> KernelResult<()> {
    check_indices(indices, dst.len())?;
    if src.len() != indices.len() {
        return Err(mismatch("insert", dst, src));
    }
    for (k, i) in indices.iter().enumerate() {
        let at = flat(dst, *i);
        dst[at] = src[flat(src, k)];
    }
    Ok(())
}

/// Set the listed rows and columns of `dst` to `value`
pub fn fill_indices(dst: &mut Matrix, value: f64, rows: &[usize], cols: &[usize]) -> KernelResult<()> {
    check_indices(rows, dst.nrows())?;
    check_indices(cols, dst.ncols())?;
    for r in rows {
        for c in cols {
            dst[(*r, *c)] = value;
        }
    }
    Ok(())
}

/// Set the row-major positions `indices` of `dst` to `value`
pub fn fill_flat(dst: &mut Matrix, value: f64, indices: &[usize]) -> KernelResult<()> {
    check_indices(indices, dst.len())?;
    for i in indices {
        let at = flat(dst, *i);
        dst[at] = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: usize, cols: usize, data: &[f64]) -> Matrix {
        Matrix::from_row_slice(rows, cols, data)
    }

    #[test]
    fn test_sequence_inclusive() {
        assert_eq!(sequence(2, 1, 5).unwrap(), vec![2, 3, 4, 5]);
        assert_eq!(sequence(1, 2, 6).unwrap(), vec![1, 3, 5]);
        assert_eq!(sequence(4, -2, 0).unwrap(), vec![4, 2, 0]);
        assert_eq!(sequence(3, 1, 2).unwrap(), Vec::<usize>::new());
        assert_eq!(sequence(0, 0, 2), Err(KernelError::ZeroStep));
        assert_eq!(sequence_to(1, 2, 6).unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn test_invert_singular() {
        let a = m(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert_eq!(invert(&a), Err(KernelError::Singular));
        let b = m(2, 3, &[0.0; 6]);
        assert!(matches!(invert(&b), Err(KernelError::NotSquare { .. })));
    }

    #[test]
    fn test_rref() {
        let a = m(2, 3, &[2.0, 4.0, 2.0, 1.0, 3.0, 2.0]);
        let r = rref(&a);
        let expected = m(2, 3, &[1.0, 0.0, -1.0, 0.0, 1.0, 1.0]);
        assert!((r - expected).norm() < 1e-12);
    }

    #[test]
    fn test_flat_addressing_is_row_major() {
        let a = m(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(element(&a, 4).unwrap(), 4.0);
        let row = extract_flat(&a, &[1, 3, 5]).unwrap();
        assert_eq!(row, m(1, 3, &[1.0, 3.0, 5.0]));
    }

    #[test]
    fn test_concat_blocks() {
        let a = m(1, 1, &[1.0]);
        let b = m(1, 2, &[2.0, 3.0]);
        let c = m(1, 3, &[4.0, 5.0, 6.0]);
        let out = concat(&[vec![a, b], vec![c]]).unwrap();
        assert_eq!(out, m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_norms() {
        let v = m(1, 2, &[3.0, -4.0]);
        assert!((norm_p(&v, 2.0).unwrap() - 5.0).abs() < 1e-12);
        assert!((norm_p(&v, f64::INFINITY).unwrap() - 4.0).abs() < 1e-12);
        let a = m(2, 2, &[1.0, -2.0, 3.0, 4.0]);
        assert!((norm_p(&a, 1.0).unwrap() - 6.0).abs() < 1e-12);
        assert!((norm_p(&a, f64::INFINITY).unwrap() - 7.0).abs() < 1e-12);
        assert_eq!(norm_p(&a, 3.0), Err(KernelError::UnsupportedNorm(3.0)));
    }

    #[test]
    fn test_insert_and_fill() {
        let mut dst = Matrix::zeros(3, 3);
        insert_block(&mut dst, &m(1, 2, &[7.0, 8.0]), 2, 3, 1, 3).unwrap();
        assert_eq!(dst[(2, 2)], 8.0);
        fill_indices(&mut dst, 1.0, &[0, 2], &[0]).unwrap();
        assert_eq!(dst[(2, 0)], 1.0);
        assert!(insert_block(&mut dst, &Matrix::zeros(2, 2), 2, 4, 2, 4).is_err());
        assert!(insert_block(&mut dst, &Matrix::zeros(2, 2), 0, 1, 0, 2).is_err());
        fill_block(&mut dst, 5.0, 0, 1, 0, 3).unwrap();
        assert_eq!(dst.row(0).sum(), 15.0);
    }

    #[test]
    fn test_into_forms_check_output_shape() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut out = Matrix::zeros(3, 2);
        transpose_into(&a, &mut out).unwrap();
        assert_eq!(out, a.transpose());

        let mut wrong = Matrix::zeros(2, 2);
        assert!(matches!(
            add_into(&a, &a, &mut wrong),
            Err(KernelError::DimensionMismatch { .. })
        ));
        wrong.resize_mut(2, 3, 0.0);
        add_into(&a, &a, &mut wrong).unwrap();
        assert_eq!(wrong, &a * 2.0);
    }

    #[test]
    fn test_elementwise_into() {
        let a = m(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = m(2, 2, &[2.0, 4.0, 6.0, 8.0]);
        let mut out = Matrix::zeros(2, 2);
        element_mult_into(&a, &b, &mut out).unwrap();
        assert_eq!(out, m(2, 2, &[2.0, 8.0, 18.0, 32.0]));
        element_div_into(&b, &a, &mut out).unwrap();
        assert_eq!(out, m(2, 2, &[2.0, 2.0, 2.0, 2.0]));
        let mut wrong = Matrix::zeros(1, 2);
        assert!(element_mult_into(&a, &b, &mut wrong).is_err());
    }

    #[test]
    fn test_divide_integer_truncates() {
        assert_eq!(divide_integer(7, 2), Ok(3));
        assert_eq!(divide_integer(-7, 2), Ok(-3));
        assert_eq!(divide_integer(1, 0), Err(KernelError::IntegerDivision(1, 0)));
        assert!(divide_integer(i64::MIN, -1).is_err());
    }

    #[test]
    fn test_index_conversions() {
        assert_eq!(to_index(3), Ok(3));
        assert_eq!(to_index(-1), Err(KernelError::NegativeIndex(-1)));
        assert_eq!(to_index_after(3), Ok(4));
        assert_eq!(to_index_after(i64::MAX), Err(KernelError::IndexOverflow));
        assert_eq!(sequence(i64::MAX - 1, 1, i64::MAX).map(|v| v.len()), Ok(2));
    }

    #[test]
    fn test_reversed_block_is_empty() {
        let a = m(3, 2, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(extract_block(&a, 5, 3, 0, 2).unwrap().shape(), (0, 2));
        assert_eq!(extract_indices(&a, &sequence(5, 2, 2).unwrap(), &[0, 1]).unwrap().shape(), (0, 2));
        let mut dst = a.clone();
        insert_block(&mut dst, &Matrix::zeros(0, 2), 5, 3, 0, 2).unwrap();
        fill_block(&mut dst, 9.0, 2, 1, 0, 2).unwrap();
        assert_eq!(dst, a);
        assert!(matches!(
            extract_block(&a, 1, 4, 0, 2),
            Err(KernelError::IndexOutOfBounds { index: 3, length: 3 })
        ));
    }
}
