use crate::error::{Error, Result};
use nalgebra::SVector;
use std::fmt;

/// Static type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Scalar,
    Vector,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "boolean"),
            ValueKind::Scalar => write!(f, "scalar"),
            ValueKind::Vector => write!(f, "vector"),
        }
    }
}

/// Result of evaluating an [`Expr`](super::Expr) for one particle or particle pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<const N: usize> {
    Bool(bool),
    Scalar(f64),
    Vector(SVector<f64, N>),
}

impl<const N: usize> Value<N> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Vector(_) => ValueKind::Vector,
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(ValueKind::Bool, other.kind())),
        }
    }

    pub fn as_scalar(&self) -> Result<f64> {
        match self {
            Value::Scalar(x) => Ok(*x),
            other => Err(mismatch(ValueKind::Scalar, other.kind())),
        }
    }

    pub fn as_vector(&self) -> Result<SVector<f64, N>> {
        match self {
            Value::Vector(v) => Ok(*v),
            other => Err(mismatch(ValueKind::Vector, other.kind())),
        }
    }
}

impl<const N: usize> From<f64> for Value<N> {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl<const N: usize> From<SVector<f64, N>> for Value<N> {
    fn from(value: SVector<f64, N>) -> Self {
        Value::Vector(value)
    }
}

impl<const N: usize> From<bool> for Value<N> {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

fn mismatch(expected: ValueKind, found: ValueKind) -> Error {
    Error::Type(format!("expected a {expected} value, found a {found} value"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Norm,
    Exp,
}

impl UnaryOp {
    pub fn result_kind(self, operand: ValueKind) -> Result<ValueKind> {
        use ValueKind::*;
        match (self, operand) {
            (UnaryOp::Neg, Scalar | Vector) => Ok(operand),
            (UnaryOp::Not, Bool) => Ok(Bool),
            (UnaryOp::Norm, Vector) => Ok(Scalar),
            (UnaryOp::Exp, Scalar) => Ok(Scalar),
            _ => Err(Error::Type(format!("cannot apply {self:?} to a {operand} value"))),
        }
    }

    pub fn apply<const N: usize>(self, operand: Value<N>) -> Result<Value<N>> {
        match (self, operand) {
            (UnaryOp::Neg, Value::Scalar(x)) => Ok(Value::Scalar(-x)),
            (UnaryOp::Neg, Value::Vector(v)) => Ok(Value::Vector(-v)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Norm, Value::Vector(v)) => Ok(Value::Scalar(v.norm())),
            (UnaryOp::Exp, Value::Scalar(x)) => Ok(Value::Scalar(x.exp())),
            (op, operand) => Err(Error::Type(format!(
                "cannot apply {op:?} to a {} value",
                operand.kind()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn result_kind(self, lhs: ValueKind, rhs: ValueKind) -> Result<ValueKind> {
        use BinaryOp::*;
        use ValueKind::{Bool, Scalar, Vector};
        match (self, lhs, rhs) {
            (Add | Sub, Scalar, Scalar) => Ok(Scalar),
            (Add | Sub, Vector, Vector) => Ok(Vector),
            (Mul, Scalar, Scalar) => Ok(Scalar),
            (Mul, Scalar, Vector) | (Mul, Vector, Scalar) => Ok(Vector),
            (Div, Scalar, Scalar) => Ok(Scalar),
            (Div, Vector, Scalar) => Ok(Vector),
            (Lt | Le | Gt | Ge, Scalar, Scalar) => Ok(Bool),
            (And | Or, Bool, Bool) => Ok(Bool),
            _ => Err(Error::Type(format!(
                "cannot apply {self:?} to {lhs} and {rhs} values"
            ))),
        }
    }

    pub fn apply<const N: usize>(self, lhs: Value<N>, rhs: Value<N>) -> Result<Value<N>> {
        use BinaryOp::*;
        use Value::{Bool, Scalar, Vector};
        let value = match (self, lhs, rhs) {
            (Add, Scalar(a), Scalar(b)) => Scalar(a + b),
            (Add, Vector(a), Vector(b)) => Vector(a + b),
            (Sub, Scalar(a), Scalar(b)) => Scalar(a - b),
            (Sub, Vector(a), Vector(b)) => Vector(a - b),
            (Mul, Scalar(a), Scalar(b)) => Scalar(a * b),
            (Mul, Scalar(a), Vector(b)) => Vector(b * a),
            (Mul, Vector(a), Scalar(b)) => Vector(a * b),
            (Div, Scalar(a), Scalar(b)) => Scalar(a / b),
            (Div, Vector(a), Scalar(b)) => Vector(a / b),
            (Lt, Scalar(a), Scalar(b)) => Bool(a < b),
            (Le, Scalar(a), Scalar(b)) => Bool(a <= b),
            (Gt, Scalar(a), Scalar(b)) => Bool(a > b),
            (Ge, Scalar(a), Scalar(b)) => Bool(a >= b),
            (And, Bool(a), Bool(b)) => Bool(a && b),
            (Or, Bool(a), Bool(b)) => Bool(a || b),
            (op, lhs, rhs) => {
                return Err(Error::Type(format!(
                    "cannot apply {op:?} to {} and {} values",
                    lhs.kind(),
                    rhs.kind()
                )));
            }
        };
        Ok(value)
    }
}

/// Associative, commutative reduction over the neighbours of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    /// Component-wise minimum for vectors.
    Min,
    /// Component-wise maximum for vectors.
    Max,
}

impl Reduction {
    /// Identity element for values of `kind`, returned when no neighbour qualifies.
    pub fn identity<const N: usize>(self, kind: ValueKind) -> Result<Value<N>> {
        let scalar = match self {
            Reduction::Sum => 0.0,
            Reduction::Min => f64::INFINITY,
            Reduction::Max => f64::NEG_INFINITY,
        };
        match kind {
            ValueKind::Scalar => Ok(Value::Scalar(scalar)),
            ValueKind::Vector => Ok(Value::Vector(SVector::repeat(scalar))),
            ValueKind::Bool => Err(Error::Type(format!(
                "cannot reduce boolean values with {self:?}"
            ))),
        }
    }

    pub fn combine<const N: usize>(self, acc: Value<N>, value: Value<N>) -> Result<Value<N>> {
        use Value::{Scalar, Vector};
        let combined = match (self, acc, value) {
            (Reduction::Sum, Scalar(a), Scalar(b)) => Scalar(a + b),
            (Reduction::Sum, Vector(a), Vector(b)) => Vector(a + b),
            (Reduction::Min, Scalar(a), Scalar(b)) => Scalar(a.min(b)),
            (Reduction::Min, Vector(a), Vector(b)) => Vector(a.inf(&b)),
            (Reduction::Max, Scalar(a), Scalar(b)) => Scalar(a.max(b)),
            (Reduction::Max, Vector(a), Vector(b)) => Vector(a.sup(&b)),
            (op, acc, value) => {
                return Err(Error::Type(format!(
                    "cannot reduce {} into {} with {op:?}",
                    value.kind(),
                    acc.kind()
                )));
            }
        };
        Ok(combined)
    }
}
