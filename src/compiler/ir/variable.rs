//! Variable descriptors and the variable arena

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

lazy_static! {
    static ref LITERAL_NAME: Regex = Regex::new(r"^(Integer|Double)\{(.*)\}$").unwrap();
    static ref IDENT: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
}

/// Identifiers that never name a variable in rendered scalar text
const KEYWORDS: &[&str] = &["as", "f64", "i64", "usize"];

/// Expression precedence levels used to decide parenthesization
pub mod precedence {
    /// `a + b`, `a - b`
    pub const ADDITIVE: u8 = 1;
    /// `a * b`, `a / b`
    pub const MULTIPLICATIVE: u8 = 2;
    /// `-a`
    pub const UNARY: u8 = 3;
    /// Names, literals and calls
    pub const ATOM: u8 = u8::MAX;
}

/// Handle of a variable inside a [`VariableTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub u32);

impl VarId {
    /// Index into the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Shape of an integer sequence used to select rows, columns or elements
#[derive(Debug, Clone, PartialEq)]
pub enum IntegerSequence {
    /// Discrete list: `[1, 3, 5]`
    Explicit(Vec<VarId>),
    /// `start:end` or `start:step:end`, end inclusive
    For {
        /// First index
        start: VarId,
        /// Step, `None` means the implicit unit step
        step: Option<VarId>,
        /// Last index (inclusive)
        end: VarId,
    },
    /// Open range running to the end of the dimension: `start:` or `:`
    Range {
        /// First index, `None` means zero
        start: Option<VarId>,
        /// Step, `None` means the implicit unit step
        step: Option<VarId>,
    },
    /// Union of sub-sequences: `[1:3, 7, 9:2:13]`
    Combined(Vec<IntegerSequence>),
}

impl IntegerSequence {
    /// All scalar handles the sequence refers to, in order
    pub fn referenced(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        self.collect_referenced(&mut out);
        out
    }

    fn collect_referenced(&self, out: &mut Vec<VarId>) {
        match self {
            IntegerSequence::Explicit(items) => out.extend(items.iter().copied()),
            IntegerSequence::For { start, step, end } => {
                out.push(*start);
                out.extend(step.iter().copied());
                out.push(*end);
            }
            IntegerSequence::Range { start, step } => {
                out.extend(start.iter().copied());
                out.extend(step.iter().copied());
            }
            IntegerSequence::Combined(parts) => {
                for part in parts {
                    part.collect_referenced(out);
                }
            }
        }
    }

    /// Replace every occurrence of `from` with `to`
    pub fn substitute(&mut self, from: VarId, to: VarId) {
        let swap = |v: &mut VarId| {
            if *v == from {
                *v = to;
            }
        };
        match self {
            IntegerSequence::Explicit(items) => items.iter_mut().for_each(swap),
            IntegerSequence::For { start, step, end } => {
                swap(start);
                step.iter_mut().for_each(swap);
                swap(end);
            }
            IntegerSequence::Range { start, step } => {
                start.iter_mut().for_each(swap);
                step.iter_mut().for_each(swap);
            }
            IntegerSequence::Combined(parts) => {
                for part in parts {
                    part.substitute(from, to);
                }
            }
        }
    }
}

/// Value kind carried by a variable
#[derive(Debug, Clone, PartialEq)]
pub enum VariableType {
    /// Integer scalar
    Integer,
    /// Double scalar
    Double,
    /// Dense matrix of doubles
    Matrix,
    /// Integer sequence, only valid as a range operand
    Sequence(IntegerSequence),
}

/// Payload-free tag of a [`VariableType`], used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Kind {
    /// Integer scalar
    Integer,
    /// Double scalar
    Double,
    /// Matrix
    Matrix,
    /// Integer sequence
    Sequence,
}

impl Kind {
    /// Integer or double
    pub fn is_scalar(self) -> bool {
        matches!(self, Kind::Integer | Kind::Double)
    }

    /// Lower-case kind name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Kind::Integer => "integer",
            Kind::Double => "double",
            Kind::Matrix => "matrix",
            Kind::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value descriptor. Instructions refer to variables by [`VarId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// User alias, temporary name (`tm0`) or literal name (`Integer{3}`)
    pub name: String,
    /// Kind of value
    pub ty: VariableType,
    /// Introduced by the compiler
    pub temporary: bool,
    /// Name encodes a constant expression with no free identifiers
    pub constant: bool,
    /// Precedence of the rendered operand, see [`precedence`]
    pub precedence: u8,
}

impl Variable {
    /// User-visible variable
    pub fn alias(name: impl Into<String>, ty: VariableType) -> Self {
        Self {
            name: name.into(),
            ty,
            temporary: false,
            constant: false,
            precedence: precedence::ATOM,
        }
    }

    /// Compiler temporary
    pub fn temporary(name: impl Into<String>, ty: VariableType) -> Self {
        Self {
            name: name.into(),
            ty,
            temporary: true,
            constant: false,
            precedence: precedence::ATOM,
        }
    }

    /// Literal integer constant, named `Integer{value}`
    pub fn integer_literal(value: i64) -> Self {
        Self {
            name: integer_name(value),
            ty: VariableType::Integer,
            temporary: false,
            constant: true,
            precedence: if value < 0 {
                precedence::UNARY
            } else {
                precedence::ATOM
            },
        }
    }

    /// Literal double constant, named `Double{value}`
    pub fn double_literal(value: f64) -> Self {
        Self {
            name: double_name(value),
            ty: VariableType::Double,
            temporary: false,
            constant: true,
            precedence: if value.is_sign_negative() {
                precedence::UNARY
            } else {
                precedence::ATOM
            },
        }
    }

    /// Kind tag
    pub fn kind(&self) -> Kind {
        match self.ty {
            VariableType::Integer => Kind::Integer,
            VariableType::Double => Kind::Double,
            VariableType::Matrix => Kind::Matrix,
            VariableType::Sequence(_) => Kind::Sequence,
        }
    }

    /// Integer sequence payload, if any
    pub fn sequence(&self) -> Option<&IntegerSequence> {
        match &self.ty {
            VariableType::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Text used when the variable appears as an operand
    pub fn operand(&self) -> &str {
        match LITERAL_NAME.captures(&self.name) {
            Some(caps) => caps.get(2).map_or("", |m| m.as_str()),
            None => &self.name,
        }
    }

    /// Operand text, parenthesized when its precedence is below `context`
    pub fn operand_in(&self, context: u8) -> String {
        if self.precedence < context {
            format!("({})", self.operand())
        } else {
            self.operand().to_string()
        }
    }

    /// True for names of the form `Integer{..}` or `Double{..}`
    pub fn is_literal(&self) -> bool {
        LITERAL_NAME.is_match(&self.name)
    }

    /// Value of an integer literal
    pub fn literal_integer(&self) -> Option<i64> {
        if self.kind() != Kind::Integer || !self.is_literal() {
            return None;
        }
        self.operand().trim().parse().ok()
    }

    /// Value of a numeric literal, integers widened to double
    pub fn literal_double(&self) -> Option<f64> {
        if !self.kind().is_scalar() || !self.is_literal() {
            return None;
        }
        let text = self.operand().trim();
        let text = text.strip_suffix("f64").unwrap_or(text);
        text.parse().ok()
    }

    /// True if the operand is the literal `1`
    pub fn is_literal_one(&self) -> bool {
        self.literal_integer() == Some(1)
    }

    /// Rename the variable so it encodes a folded value
    pub fn fold_into(&mut self, text: &str, precedence: u8) {
        self.name = match self.kind() {
            Kind::Integer => format!("Integer{{{}}}", text),
            _ => format!("Double{{{}}}", text),
        };
        self.temporary = false;
        self.constant = !has_free_identifiers(text);
        self.precedence = precedence;
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Literal name for an integer value
pub fn integer_name(value: i64) -> String {
    format!("Integer{{{}}}", value)
}

/// Literal name for a double value; the text always round-trips through `f64::from_str`
pub fn double_name(value: f64) -> String {
    format!("Double{{{}}}", format_double(value))
}

/// Render a double so it reads as a floating point literal
pub fn format_double(value: f64) -> String {
    let text = format!("{:?}", value);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}

/// True if `text` names something other than literals, calls and casts.
///
/// An identifier glued to a digit, letter, `.` or `:` on its left (`2.0f64`,
/// `x.sqrt()`, `f64::powf`), followed by `(` or `::`, or in [`KEYWORDS`]
/// is not free.
pub fn has_free_identifiers(text: &str) -> bool {
    IDENT.find_iter(text).any(|m| {
        let glued = text[..m.start()]
            .chars()
            .next_back()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == ':');
        let rest = text[m.end()..].trim_start();
        !glued
            && !rest.starts_with('(')
            && !rest.starts_with("::")
            && !KEYWORDS.contains(&m.as_str())
    })
}

/// Arena of variables for one compilation context
#[derive(Debug, Clone)]
pub struct VariableTable {
    vars: Vec<Variable>,
    literals: HashMap<String, VarId>,
}

impl VariableTable {
    /// Canonical integer zero
    pub const ZERO: VarId = VarId(0);
    /// Canonical integer one
    pub const ONE: VarId = VarId(1);

    /// Create a table holding the canonical zero and one
    pub fn new() -> Self {
        let mut table = Self {
            vars: Vec::new(),
            literals: HashMap::new(),
        };
        table.integer(0);
        table.integer(1);
        table
    }

    /// Add a variable and return its handle
    pub fn add(&mut self, var: Variable) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(var);
        id
    }

    /// Interned integer literal
    pub fn integer(&mut self, value: i64) -> VarId {
        self.literal(Variable::integer_literal(value))
    }

    /// Interned double literal
    pub fn double(&mut self, value: f64) -> VarId {
        self.literal(Variable::double_literal(value))
    }

    fn literal(&mut self, var: Variable) -> VarId {
        if let Some(id) = self.literals.get(&var.name) {
            return *id;
        }
        let name = var.name.clone();
        let id = self.add(var);
        self.literals.insert(name, id);
        id
    }

    /// Register an integer sequence as a range operand
    pub fn sequence(&mut self, seq: IntegerSequence) -> VarId {
        let name = format!("seq{}", self.vars.len());
        let mut var = Variable::alias(name, VariableType::Sequence(seq));
        var.constant = false;
        self.add(var)
    }

    /// Drop every variable at or beyond `len`
    pub fn truncate(&mut self, len: usize) {
        self.vars.truncate(len);
        self.literals.retain(|_, id| id.index() < len);
    }

    /// Variable by handle
    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.vars.get(id.index())
    }

    /// Mutable variable by handle
    pub fn get_mut(&mut self, id: VarId) -> Option<&mut Variable> {
        self.vars.get_mut(id.index())
    }

    /// Kind of the variable
    pub fn kind(&self, id: VarId) -> Kind {
        self[id].kind()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True if the table holds no variables
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over handles and variables
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId(i as u32), v))
    }

    /// Comma separated kind list for error messages
    pub fn describe(&self, ids: &[VarId]) -> String {
        ids.iter()
            .map(|id| self[*id].kind().name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<VarId> for VariableTable {
    type Output = Variable;

    fn index(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }
}
