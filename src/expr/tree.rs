use super::value::{BinaryOp, Reduction, UnaryOp, Value, ValueKind};
use crate::error::{Error, Result};
use crate::particles::{POSITION, Particles};
use nalgebra::SVector;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Not, Sub};

/// Which particle of a pair a [`Symbol`] is read from.
///
/// `I` is the particle being updated, `J` a neighbour visited by a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    I,
    J,
}

/// A per-particle quantity: the reserved position or a declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Position,
    Variable(String),
}

impl Symbol {
    pub fn position() -> Self {
        Symbol::Position
    }

    /// Refer to a declared variable by name. `"position"` refers to [`Symbol::Position`].
    pub fn variable(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == POSITION {
            Symbol::Position
        } else {
            Symbol::Variable(name)
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Position => POSITION,
            Symbol::Variable(name) => name,
        }
    }

    /// `symbol[i]`
    pub fn i<const N: usize>(&self) -> Expr<N> {
        Expr::Symbol(self.clone(), Label::I)
    }

    /// `symbol[j]`, only valid inside a reduction.
    pub fn j<const N: usize>(&self) -> Expr<N> {
        Expr::Symbol(self.clone(), Label::J)
    }

    /// `symbol[i] = value`
    pub fn assign<const N: usize>(&self, value: Expr<N>) -> Statement<N> {
        Statement {
            target: self.clone(),
            op: Assign::Set,
            value,
        }
    }

    /// `symbol[i] += value`
    pub fn add_assign<const N: usize>(&self, value: Expr<N>) -> Statement<N> {
        Statement {
            target: self.clone(),
            op: Assign::Add,
            value,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expression tree over particles and particle pairs.
///
/// Trees are built with the constructors below, [`Symbol::i()`]/[`Symbol::j()`],
/// the arithmetic operators and the free functions of [`crate::expr`].
/// ```
/// use symzelll::expr::{Expr, Symbol, norm, sum};
///
/// let dx = Expr::<2>::dx();
/// let kernel = sum(
///     norm(dx.clone()).lt(0.5).and(norm(dx.clone()).gt(0.0)),
///     -(-norm(dx.clone())).exp() * dx.clone() / norm(dx),
/// );
/// let update = Symbol::variable("velocity").add_assign(1e-3 * kernel);
/// assert_eq!(update.target(), &Symbol::variable("velocity"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<const N: usize> {
    Constant(Value<N>),
    Symbol(Symbol, Label),
    /// Minimum-image displacement `position[j] - position[i]`.
    Dx,
    Unary(UnaryOp, Box<Expr<N>>),
    Binary(BinaryOp, Box<Expr<N>>, Box<Expr<N>>),
    Reduce {
        op: Reduction,
        predicate: Box<Expr<N>>,
        value: Box<Expr<N>>,
    },
}

/// Where an expression is evaluated: for a single particle `i` or for a pair `(i, j)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Particle,
    Pair,
}

impl<const N: usize> Expr<N> {
    pub fn scalar(value: f64) -> Self {
        Expr::Constant(Value::Scalar(value))
    }

    pub fn vector(value: impl Into<SVector<f64, N>>) -> Self {
        Expr::Constant(Value::Vector(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Constant(Value::Bool(value))
    }

    pub fn dx() -> Self {
        Expr::Dx
    }

    pub fn unary(op: UnaryOp, operand: Expr<N>) -> Self {
        Expr::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: Expr<N>, rhs: Expr<N>) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// Fold `value` over all neighbours `j` of `i` for which `predicate` holds.
    pub fn reduce(op: Reduction, predicate: Expr<N>, value: Expr<N>) -> Self {
        Expr::Reduce {
            op,
            predicate: Box::new(predicate),
            value: Box::new(value),
        }
    }

    pub fn lt(self, rhs: impl Into<Expr<N>>) -> Self {
        Expr::binary(BinaryOp::Lt, self, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Expr<N>>) -> Self {
        Expr::binary(BinaryOp::Le, self, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Expr<N>>) -> Self {
        Expr::binary(BinaryOp::Gt, self, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Expr<N>>) -> Self {
        Expr::binary(BinaryOp::Ge, self, rhs.into())
    }

    pub fn and(self, rhs: impl Into<Expr<N>>) -> Self {
        Expr::binary(BinaryOp::And, self, rhs.into())
    }

    pub fn or(self, rhs: impl Into<Expr<N>>) -> Self {
        Expr::binary(BinaryOp::Or, self, rhs.into())
    }

    pub fn norm(self) -> Self {
        Expr::unary(UnaryOp::Norm, self)
    }

    pub fn exp(self) -> Self {
        Expr::unary(UnaryOp::Exp, self)
    }

    /// Whether this tree contains a reduction, i.e. needs a neighbour index to evaluate.
    pub fn has_reduction(&self) -> bool {
        match self {
            Expr::Constant(_) | Expr::Symbol(..) | Expr::Dx => false,
            Expr::Unary(_, operand) => operand.has_reduction(),
            Expr::Binary(_, lhs, rhs) => lhs.has_reduction() || rhs.has_reduction(),
            Expr::Reduce { .. } => true,
        }
    }

    /// Statically check this expression against the variables declared in `particles`
    /// and return the kind of value it evaluates to.
    ///
    /// Fails with [`Error::Type`] for mismatched operands, non-boolean predicates,
    /// `J`-labelled symbols or `dx` outside of a reduction, and nested reductions.
    /// Undeclared variables fail with [`Error::UnknownVariable`].
    pub fn kind(&self, particles: &Particles<N>) -> Result<ValueKind> {
        self.check(Scope::Particle, &|symbol| particles.kind_of(symbol))
    }

    /// Like [`Expr::kind()`], for an expression evaluated inside a reduction.
    pub(crate) fn pair_kind(&self, particles: &Particles<N>) -> Result<ValueKind> {
        self.check(Scope::Pair, &|symbol| particles.kind_of(symbol))
    }

    fn check(
        &self,
        scope: Scope,
        lookup: &dyn Fn(&Symbol) -> Result<ValueKind>,
    ) -> Result<ValueKind> {
        match self {
            Expr::Constant(value) => Ok(value.kind()),
            Expr::Symbol(symbol, Label::J) if scope == Scope::Particle => Err(Error::Type(
                format!("`{symbol}[j]` used outside of a reduction"),
            )),
            Expr::Symbol(symbol, _) => lookup(symbol),
            Expr::Dx if scope == Scope::Particle => {
                Err(Error::Type("`dx` used outside of a reduction".into()))
            }
            Expr::Dx => Ok(ValueKind::Vector),
            Expr::Unary(op, operand) => op.result_kind(operand.check(scope, lookup)?),
            Expr::Binary(op, lhs, rhs) => {
                op.result_kind(lhs.check(scope, lookup)?, rhs.check(scope, lookup)?)
            }
            Expr::Reduce { .. } if scope == Scope::Pair => {
                Err(Error::Type("nested reductions are not supported".into()))
            }
            Expr::Reduce {
                op,
                predicate,
                value,
            } => {
                let predicate = predicate.check(Scope::Pair, lookup)?;
                if predicate != ValueKind::Bool {
                    return Err(Error::Type(format!(
                        "reduction predicate must be boolean, found {predicate}"
                    )));
                }
                let kind = value.check(Scope::Pair, lookup)?;
                if kind == ValueKind::Bool {
                    return Err(Error::Type(format!(
                        "cannot reduce boolean values with {op:?}"
                    )));
                }
                Ok(kind)
            }
        }
    }
}

impl<const N: usize> From<f64> for Expr<N> {
    fn from(value: f64) -> Self {
        Expr::scalar(value)
    }
}

impl<const N: usize> From<bool> for Expr<N> {
    fn from(value: bool) -> Self {
        Expr::boolean(value)
    }
}

impl<const N: usize> From<SVector<f64, N>> for Expr<N> {
    fn from(value: SVector<f64, N>) -> Self {
        Expr::vector(value)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<const N: usize> $trait for Expr<N> {
            type Output = Expr<N>;

            fn $method(self, rhs: Expr<N>) -> Expr<N> {
                Expr::binary($op, self, rhs)
            }
        }

        impl<const N: usize> $trait<f64> for Expr<N> {
            type Output = Expr<N>;

            fn $method(self, rhs: f64) -> Expr<N> {
                Expr::binary($op, self, Expr::scalar(rhs))
            }
        }

        impl<const N: usize> $trait<Expr<N>> for f64 {
            type Output = Expr<N>;

            fn $method(self, rhs: Expr<N>) -> Expr<N> {
                Expr::binary($op, Expr::scalar(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl<const N: usize> Neg for Expr<N> {
    type Output = Expr<N>;

    fn neg(self) -> Expr<N> {
        Expr::unary(UnaryOp::Neg, self)
    }
}

impl<const N: usize> Not for Expr<N> {
    type Output = Expr<N>;

    fn not(self) -> Expr<N> {
        Expr::unary(UnaryOp::Not, self)
    }
}

impl<const N: usize> fmt::Display for Expr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(Value::Bool(b)) => write!(f, "{b}"),
            Expr::Constant(Value::Scalar(x)) => write!(f, "{x}"),
            Expr::Constant(Value::Vector(v)) => write!(f, "{:?}", v.as_slice()),
            Expr::Symbol(symbol, Label::I) => write!(f, "{symbol}[i]"),
            Expr::Symbol(symbol, Label::J) => write!(f, "{symbol}[j]"),
            Expr::Dx => write!(f, "dx"),
            Expr::Unary(UnaryOp::Neg, operand) => write!(f, "-{operand}"),
            Expr::Unary(UnaryOp::Not, operand) => write!(f, "!{operand}"),
            Expr::Unary(UnaryOp::Norm, operand) => write!(f, "norm({operand})"),
            Expr::Unary(UnaryOp::Exp, operand) => write!(f, "exp({operand})"),
            Expr::Binary(op, lhs, rhs) => {
                let symbol = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Lt => "<",
                    BinaryOp::Le => "<=",
                    BinaryOp::Gt => ">",
                    BinaryOp::Ge => ">=",
                    BinaryOp::And => "&&",
                    BinaryOp::Or => "||",
                };
                write!(f, "({lhs} {symbol} {rhs})")
            }
            Expr::Reduce {
                op,
                predicate,
                value,
            } => {
                let name = match op {
                    Reduction::Sum => "sum",
                    Reduction::Min => "min",
                    Reduction::Max => "max",
                };
                write!(f, "{name}(j, {predicate}, {value})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    /// `=`
    Set,
    /// `+=`
    Add,
}

/// `target[i] = value` or `target[i] += value`, applied to every particle `i`.
///
/// Evaluated with [`Particles::evaluate()`].
#[derive(Debug, Clone, PartialEq)]
pub struct Statement<const N: usize> {
    target: Symbol,
    op: Assign,
    value: Expr<N>,
}

impl<const N: usize> Statement<N> {
    pub fn target(&self) -> &Symbol {
        &self.target
    }

    pub fn op(&self) -> Assign {
        self.op
    }

    pub fn value(&self) -> &Expr<N> {
        &self.value
    }

    /// Type-check the right-hand side and make sure its kind matches the target.
    pub fn check(&self, particles: &Particles<N>) -> Result<()> {
        let target = particles.kind_of(&self.target)?;
        let value = self.value.kind(particles)?;
        if target != value {
            return Err(Error::Type(format!(
                "cannot assign a {value} value to {} variable `{}`",
                target, self.target
            )));
        }
        Ok(())
    }
}

impl<const N: usize> fmt::Display for Statement<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Assign::Set => "=",
            Assign::Add => "+=",
        };
        write!(f, "{}[i] {op} {}", self.target, self.value)
    }
}
