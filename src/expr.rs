//! Expressions over particles and particle pairs.
//!
//! An [`Expr`] is an explicit tree that gets type-checked against a [`Particles`] container
//! and then interpreted once per particle `i`.
//! Pairwise terms live inside reductions ([`sum()`], [`min()`], [`max()`]) which visit
//! every neighbour `j` of `i` found by the container's [`CellGrid`](crate::CellGrid).
//!
//! A [`Statement`] assigns an expression to a variable of every particle.
//! All right-hand sides are evaluated against the unmodified container before anything
//! is written, so the result does not depend on the order in which particles are visited.
//!
//! [`Particles`]: crate::Particles
pub mod eval;
pub mod tree;
pub mod value;

pub use tree::*;
pub use value::*;

/// Euclidean norm of a vector expression.
pub fn norm<const N: usize>(expr: Expr<N>) -> Expr<N> {
    expr.norm()
}

pub fn exp<const N: usize>(expr: Expr<N>) -> Expr<N> {
    expr.exp()
}

pub fn not<const N: usize>(expr: Expr<N>) -> Expr<N> {
    !expr
}

/// Sum of `value` over all neighbours `j` for which `predicate` holds, zero if there are none.
pub fn sum<const N: usize>(predicate: Expr<N>, value: Expr<N>) -> Expr<N> {
    Expr::reduce(Reduction::Sum, predicate, value)
}

/// (Component-wise) minimum over the qualifying neighbours, `+inf` if there are none.
pub fn min<const N: usize>(predicate: Expr<N>, value: Expr<N>) -> Expr<N> {
    Expr::reduce(Reduction::Min, predicate, value)
}

/// (Component-wise) maximum over the qualifying neighbours, `-inf` if there are none.
pub fn max<const N: usize>(predicate: Expr<N>, value: Expr<N>) -> Expr<N> {
    Expr::reduce(Reduction::Max, predicate, value)
}
