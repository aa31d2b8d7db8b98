//! # Extent Analyzer
//!
//! Classifies a submatrix range as a contiguous **block** or an **explicit**
//! list of indices. The classification is structural (it only looks at the
//! shape of the range operands, never at live values), so the interpreter and
//! the source emitter always agree on it:
//!
//! | Range | Extent |
//! |-------|--------|
//! | scalar `i` | block `[i, i+1)` |
//! | `a:b`, `a:1:b` | block `[a, b+1)` |
//! | `a:`, `:` | block `[a, len)` |
//! | `a:s:b` with `s` not the literal 1 | explicit |
//! | `[i, j, k]` | explicit |
//! | `[a:b, k]` (combined) | explicit |
//!
//! A single range operand addresses the matrix as a flattened row-major
//! vector; the row dimension is elided and the extracted value is a row.

use super::ir::{IntegerSequence, Kind, VarId, VariableTable};
use crate::error::{Error, Result};
use crate::kernels;

/// One end of a block extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Index 0
    Zero,
    /// Index 1
    One,
    /// The value of the variable
    At(VarId),
    /// One past the value of the variable
    After(VarId),
    /// Length of the addressed dimension
    Length,
}

/// One constituent of an explicit extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPart {
    /// A single index
    Single(VarId),
    /// `start:step:end`, end inclusive
    For {
        /// First index
        start: VarId,
        /// Step, implicit one when absent
        step: Option<VarId>,
        /// Last index
        end: VarId,
    },
    /// `start:step:` to the end of the dimension
    Open {
        /// First index, zero when absent
        start: Option<VarId>,
        /// Step, implicit one when absent
        step: Option<VarId>,
    },
}

/// Classified range along one dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extent {
    /// Contiguous `[start, end)`
    Block {
        /// Inclusive start
        start: Endpoint,
        /// Exclusive end
        end: Endpoint,
    },
    /// Materialized indices, concatenated in order
    Explicit(Vec<IndexPart>),
}

impl Extent {
    /// True for [`Extent::Block`]
    pub fn is_block(&self) -> bool {
        matches!(self, Extent::Block { .. })
    }

    /// Numeric indices for a dimension of `length`
    pub fn resolve<F>(&self, length: usize, value_of: &F) -> Result<ResolvedExtent>
    where
        F: Fn(VarId) -> Result<i64>,
    {
        let failed = |e: kernels::KernelError| Error::failed("extent", e.to_string());
        let endpoint = |e: Endpoint| -> Result<usize> {
            match e {
                Endpoint::Zero => Ok(0),
                Endpoint::One => Ok(1),
                Endpoint::At(v) => kernels::to_index(value_of(v)?).map_err(failed),
                Endpoint::After(v) => kernels::to_index_after(value_of(v)?).map_err(failed),
                Endpoint::Length => Ok(length),
            }
        };
        match self {
            Extent::Block { start, end } => Ok(ResolvedExtent::Block {
                start: endpoint(*start)?,
                end: endpoint(*end)?,
            }),
            Extent::Explicit(parts) => {
                let mut indices = Vec::new();
                for part in parts {
                    let chunk = match *part {
                        IndexPart::Single(v) => vec![kernels::to_index(value_of(v)?).map_err(failed)?],
                        IndexPart::For { start, step, end } => {
                            let step = step.map(value_of).transpose()?.unwrap_or(1);
                            kernels::sequence(value_of(start)?, step, value_of(end)?).map_err(failed)?
                        }
                        IndexPart::Open { start, step } => {
                            let start = start.map(value_of).transpose()?.unwrap_or(0);
                            let step = step.map(value_of).transpose()?.unwrap_or(1);
                            kernels::sequence_to(start, step, length).map_err(failed)?
                        }
                    };
                    indices.extend(chunk);
                }
                Ok(ResolvedExtent::Explicit(indices))
            }
        }
    }

    /// Rust expressions computing the extent. `length` is the dimension length
    /// expression, `operand` renders a scalar variable, `kernels` is the path
    /// of the kernels module in generated code.
    pub fn render<F>(
        &self,
        vars: &VariableTable,
        length: &str,
        kernels: &str,
        operand: &F,
    ) -> RenderedExtent
    where
        F: Fn(VarId) -> String,
    {
        // Literals that are valid indices render as numbers, everything else
        // goes through the checked conversions
        let at = |v: VarId, after: bool| -> String {
            let helper = if after { "to_index_after" } else { "to_index" };
            match vars[v].literal_integer() {
                Some(value) => match value.checked_add(i64::from(after)) {
                    Some(index) if index >= 0 => index.to_string(),
                    _ => format!("{}::{}({})?", kernels, helper, value),
                },
                None => format!("{}::{}({})?", kernels, helper, operand(v)),
            }
        };
        let int = |v: VarId| -> String {
            match vars[v].literal_integer() {
                Some(value) => value.to_string(),
                None => operand(v),
            }
        };
        let endpoint = |e: Endpoint| -> String {
            match e {
                Endpoint::Zero => "0".to_string(),
                Endpoint::One => "1".to_string(),
                Endpoint::At(v) => at(v, false),
                Endpoint::After(v) => at(v, true),
                Endpoint::Length => length.to_string(),
            }
        };
        match self {
            Extent::Block { start, end } => RenderedExtent::Block {
                start: endpoint(*start),
                end: endpoint(*end),
            },
            Extent::Explicit(parts) => {
                let chunks: Vec<String> = parts
                    .iter()
                    .map(|part| match *part {
                        IndexPart::Single(v) => format!("vec![{}]", at(v, false)),
                        IndexPart::For { start, step, end } => format!(
                            "{}::sequence({}, {}, {})?",
                            kernels,
                            int(start),
                            step.map_or_else(|| "1".to_string(), int),
                            int(end)
                        ),
                        IndexPart::Open { start, step } => format!(
                            "{}::sequence_to({}, {}, {})?",
                            kernels,
                            start.map_or_else(|| "0".to_string(), int),
                            step.map_or_else(|| "1".to_string(), int),
                            length
                        ),
                    })
                    .collect();
                let indices = if chunks.len() == 1 && !chunks[0].starts_with("vec!") {
                    chunks[0].clone()
                } else {
                    format!("[{}].concat()", chunks.join(", "))
                };
                RenderedExtent::Explicit { indices }
            }
        }
    }
}

/// Row and column extents of one range expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extents {
    /// Row extent; `[0, 1)` when flattened
    pub rows: Extent,
    /// Column extent, or the element extent when flattened
    pub cols: Extent,
    /// Single-operand, row-major linear addressing
    pub flattened: bool,
}

impl Extents {
    /// True when both dimensions are blocks
    pub fn is_block(&self) -> bool {
        self.rows.is_block() && self.cols.is_block()
    }

    /// Resolve against a matrix of `rows x cols`
    pub fn resolve<F>(&self, rows: usize, cols: usize, value_of: &F) -> Result<ResolvedExtents>
    where
        F: Fn(VarId) -> Result<i64>,
    {
        if self.flattened {
            return Ok(ResolvedExtents {
                rows: ResolvedExtent::Block { start: 0, end: 1 },
                cols: self.cols.resolve(rows * cols, value_of)?,
                flattened: true,
            });
        }
        Ok(ResolvedExtents {
            rows: self.rows.resolve(rows, value_of)?,
            cols: self.cols.resolve(cols, value_of)?,
            flattened: false,
        })
    }
}

/// Numeric extent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedExtent {
    /// `[start, end)`
    Block {
        /// Inclusive start
        start: usize,
        /// Exclusive end
        end: usize,
    },
    /// Listed indices
    Explicit(Vec<usize>),
}

impl ResolvedExtent {
    /// Number of selected indices
    pub fn len(&self) -> usize {
        match self {
            ResolvedExtent::Block { start, end } => end.saturating_sub(*start),
            ResolvedExtent::Explicit(indices) => indices.len(),
        }
    }

    /// True when nothing is selected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Selected indices in order
    pub fn indices(&self) -> Vec<usize> {
        match self {
            ResolvedExtent::Block { start, end } => (*start..*end).collect(),
            ResolvedExtent::Explicit(indices) => indices.clone(),
        }
    }
}

/// Numeric row and column extents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExtents {
    /// Rows
    pub rows: ResolvedExtent,
    /// Columns, or elements when flattened
    pub cols: ResolvedExtent,
    /// Linear addressing
    pub flattened: bool,
}

/// Extent rendered as Rust expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedExtent {
    /// `[start, end)` as `usize` expressions
    Block {
        /// Start expression
        start: String,
        /// End expression
        end: String,
    },
    /// Expression evaluating to `Vec<usize>`
    Explicit {
        /// Index vector expression
        indices: String,
    },
}

/// Classify a range expression of one (flattened) or two (rows, cols) operands
pub fn analyze(vars: &VariableTable, range: &[VarId]) -> Result<Extents> {
    match range {
        [single] => Ok(Extents {
            rows: Extent::Block {
                start: Endpoint::Zero,
                end: Endpoint::One,
            },
            cols: classify(vars, *single)?,
            flattened: true,
        }),
        [rows, cols] => Ok(Extents {
            rows: classify(vars, *rows)?,
            cols: classify(vars, *cols)?,
            flattened: false,
        }),
        _ => Err(Error::InvalidRange {
            name: format!("{} range operands", range.len()),
            kind: "range".to_string(),
        }),
    }
}

/// Classify the range operand of one dimension
pub fn classify(vars: &VariableTable, id: VarId) -> Result<Extent> {
    let var = vars.get(id).ok_or(Error::UnknownVariable(id.index()))?;
    match var.kind() {
        Kind::Integer | Kind::Double => Ok(Extent::Block {
            start: Endpoint::At(id),
            end: Endpoint::After(id),
        }),
        Kind::Sequence => {
            let seq = var.sequence().ok_or(Error::UnknownVariable(id.index()))?;
            Ok(classify_sequence(vars, seq))
        }
        Kind::Matrix => Err(Error::InvalidRange {
            name: var.name.clone(),
            kind: var.kind().name().to_string(),
        }),
    }
}

fn unit_step(vars: &VariableTable, step: Option<VarId>) -> bool {
    step.map_or(true, |s| vars[s].is_literal_one())
}

fn classify_sequence(vars: &VariableTable, seq: &IntegerSequence) -> Extent {
    match seq {
        IntegerSequence::For { start, step, end } if unit_step(vars, *step) => Extent::Block {
            start: Endpoint::At(*start),
            end: Endpoint::After(*end),
        },
        IntegerSequence::Range { start, step } if unit_step(vars, *step) => Extent::Block {
            start: start.map_or(Endpoint::Zero, Endpoint::At),
            end: Endpoint::Length,
        },
        _ => {
            let mut parts = Vec::new();
            explicit_parts(seq, &mut parts);
            Extent::Explicit(parts)
        }
    }
}

fn explicit_parts(seq: &IntegerSequence, out: &mut Vec<IndexPart>) {
    match seq {
        IntegerSequence::Explicit(items) => out.extend(items.iter().map(|v| IndexPart::Single(*v))),
        IntegerSequence::For { start, step, end } => out.push(IndexPart::For {
            start: *start,
            step: *step,
            end: *end,
        }),
        IntegerSequence::Range { start, step } => out.push(IndexPart::Open {
            start: *start,
            step: *step,
        }),
        IntegerSequence::Combined(parts) => {
            for part in parts {
                explicit_parts(part, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Variable, VariableType};

    fn literal_value(vars: &VariableTable) -> impl Fn(VarId) -> Result<i64> + '_ {
        move |v| {
            vars[v]
                .literal_integer()
                .ok_or_else(|| Error::failed("test", "not a literal"))
        }
    }

    #[test]
    fn test_unit_for_is_block() {
        let mut vars = VariableTable::new();
        let (two, five) = (vars.integer(2), vars.integer(5));
        let rows = vars.sequence(IntegerSequence::For {
            start: two,
            step: None,
            end: five,
        });
        let cols = vars.sequence(IntegerSequence::Range {
            start: None,
            step: None,
        });
        let extents = analyze(&vars, &[rows, cols]).unwrap();
        assert!(extents.is_block());

        let resolved = extents.resolve(6, 3, &literal_value(&vars)).unwrap();
        assert_eq!(resolved.rows, ResolvedExtent::Block { start: 2, end: 6 });
        assert_eq!(resolved.cols, ResolvedExtent::Block { start: 0, end: 3 });
    }

    #[test]
    fn test_literal_one_step_is_block() {
        let mut vars = VariableTable::new();
        let seq = vars.sequence(IntegerSequence::For {
            start: VariableTable::ZERO,
            step: Some(VariableTable::ONE),
            end: VariableTable::ONE,
        });
        assert!(classify(&vars, seq).unwrap().is_block());
    }

    #[test]
    fn test_non_literal_step_is_explicit() {
        let mut vars = VariableTable::new();
        let step = vars.add(Variable::alias("s", VariableType::Integer));
        let seq = vars.sequence(IntegerSequence::For {
            start: VariableTable::ZERO,
            step: Some(step),
            end: VariableTable::ONE,
        });
        assert!(!classify(&vars, seq).unwrap().is_block());
    }

    #[test]
    fn test_explicit_list() {
        let mut vars = VariableTable::new();
        let items = vec![vars.integer(1), vars.integer(3), vars.integer(5)];
        let seq = vars.sequence(IntegerSequence::Explicit(items));
        let extent = classify(&vars, seq).unwrap();
        assert!(!extent.is_block());
        let resolved = extent.resolve(6, &literal_value(&vars)).unwrap();
        assert_eq!(resolved, ResolvedExtent::Explicit(vec![1, 3, 5]));
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn test_combined_concatenates() {
        let mut vars = VariableTable::new();
        let (two, seven, nine) = (vars.integer(2), vars.integer(7), vars.integer(9));
        let seq = vars.sequence(IntegerSequence::Combined(vec![
            IntegerSequence::For {
                start: VariableTable::ZERO,
                step: None,
                end: two,
            },
            IntegerSequence::Explicit(vec![seven]),
            IntegerSequence::Range {
                start: Some(nine),
                step: None,
            },
        ]));
        let extent = classify(&vars, seq).unwrap();
        let resolved = extent.resolve(11, &literal_value(&vars)).unwrap();
        assert_eq!(resolved.indices(), vec![0, 1, 2, 7, 9, 10]);

        let rendered = extent.render(&vars, "a.ncols()", "kernels", &|v| vars[v].name.clone());
        match rendered {
            RenderedExtent::Explicit { indices } => {
                assert_eq!(
                    indices,
                    "[kernels::sequence(0, 1, 2)?, vec![7], kernels::sequence_to(9, 1, a.ncols())?].concat()"
                );
            }
            other => panic!("expected explicit, got {:?}", other),
        }
    }

    #[test]
    fn test_single_operand_is_flattened() {
        let mut vars = VariableTable::new();
        let four = vars.integer(4);
        let extents = analyze(&vars, &[four]).unwrap();
        assert!(extents.flattened);
        let resolved = extents.resolve(2, 3, &literal_value(&vars)).unwrap();
        assert_eq!(resolved.rows, ResolvedExtent::Block { start: 0, end: 1 });
        assert_eq!(resolved.cols, ResolvedExtent::Block { start: 4, end: 5 });
    }

    #[test]
    fn test_variable_endpoints_render_checked() {
        let mut vars = VariableTable::new();
        let n = vars.add(Variable::alias("n", VariableType::Integer));
        let four = vars.integer(4);
        let rows = vars.sequence(IntegerSequence::For {
            start: n,
            step: None,
            end: four,
        });
        let extent = classify(&vars, rows).unwrap();
        let rendered = extent.render(&vars, "a.nrows()", "k", &|v| vars[v].operand().to_string());
        assert_eq!(
            rendered,
            RenderedExtent::Block {
                start: "k::to_index(n)?".to_string(),
                end: "5".to_string(),
            }
        );

        let single = classify(&vars, n).unwrap();
        let rendered = single.render(&vars, "a.nrows()", "k", &|v| vars[v].operand().to_string());
        assert_eq!(
            rendered,
            RenderedExtent::Block {
                start: "k::to_index(n)?".to_string(),
                end: "k::to_index_after(n)?".to_string(),
            }
        );
    }

    #[test]
    fn test_negative_and_overflowing_endpoints_fail() {
        let mut vars = VariableTable::new();
        let n = vars.add(Variable::alias("n", VariableType::Integer));
        let extent = classify(&vars, n).unwrap();
        let err = extent.resolve(6, &|_| Ok(-2)).unwrap_err();
        assert_eq!(err.classify(), crate::error::ErrorCategory::Runtime);
        let err = extent.resolve(6, &|_| Ok(i64::MAX)).unwrap_err();
        assert_eq!(err.classify(), crate::error::ErrorCategory::Runtime);

        let huge = vars.integer(i64::MAX);
        let rendered = classify(&vars, huge)
            .unwrap()
            .render(&vars, "len", "k", &|v| vars[v].operand().to_string());
        match rendered {
            RenderedExtent::Block { end, .. } => assert_eq!(end, format!("k::to_index_after({})?", i64::MAX)),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_reversed_ranges_select_nothing() {
        let mut vars = VariableTable::new();
        let (five, two) = (vars.integer(5), vars.integer(2));
        let block = vars.sequence(IntegerSequence::For {
            start: five,
            step: None,
            end: two,
        });
        let stepped = vars.sequence(IntegerSequence::For {
            start: five,
            step: Some(two),
            end: two,
        });
        let block = classify(&vars, block).unwrap().resolve(6, &literal_value(&vars)).unwrap();
        let stepped = classify(&vars, stepped).unwrap().resolve(6, &literal_value(&vars)).unwrap();
        assert_eq!(block.len(), 0);
        assert_eq!(stepped.len(), 0);
    }

    #[test]
    fn test_matrix_range_is_contract_violation() {
        let mut vars = VariableTable::new();
        let a = vars.add(Variable::alias("A", VariableType::Matrix));
        let err = analyze(&vars, &[a]).unwrap_err();
        assert!(err.is_internal());
    }
}
