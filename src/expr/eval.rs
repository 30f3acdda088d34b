// Tree-walking interpreter for `Expr`.
// Expressions are assumed to be type-checked by the caller (`Statement::check` or `Expr::kind`);
// evaluation still reports kind mismatches as `Error::Type` instead of panicking.
use super::tree::{Expr, Label, Statement};
use super::value::Value;
use crate::error::{Error, Result};
use crate::particles::Particles;
use nalgebra::SVector;

/// The neighbour `j` currently visited by a reduction.
#[derive(Debug, Clone, Copy)]
struct Pair<const N: usize> {
    j: usize,
    dx: SVector<f64, N>,
}

impl<const N: usize> Expr<N> {
    /// Evaluate this expression for particle `i`.
    pub(crate) fn eval(&self, particles: &Particles<N>, i: usize) -> Result<Value<N>> {
        self.eval_in(particles, i, None)
    }

    fn eval_in(&self, particles: &Particles<N>, i: usize, pair: Option<Pair<N>>) -> Result<Value<N>> {
        match self {
            Expr::Constant(value) => Ok(*value),
            Expr::Symbol(symbol, Label::I) => particles.value_of(symbol, i),
            Expr::Symbol(symbol, Label::J) => {
                let pair = pair.ok_or_else(|| {
                    Error::Type(format!("`{symbol}[j]` used outside of a reduction"))
                })?;
                particles.value_of(symbol, pair.j)
            }
            Expr::Dx => pair
                .map(|pair| Value::Vector(pair.dx))
                .ok_or_else(|| Error::Type("`dx` used outside of a reduction".into())),
            Expr::Unary(op, operand) => op.apply(operand.eval_in(particles, i, pair)?),
            Expr::Binary(op, lhs, rhs) => op.apply(
                lhs.eval_in(particles, i, pair)?,
                rhs.eval_in(particles, i, pair)?,
            ),
            Expr::Reduce { .. } if pair.is_some() => {
                Err(Error::Type("nested reductions are not supported".into()))
            }
            Expr::Reduce {
                op,
                predicate,
                value,
            } => {
                let grid = particles.current_grid()?;
                let center: [f64; N] = particles.position(i).into();
                let mut acc = None;

                for (j, q) in grid.neighbors(i).into_iter().flatten() {
                    let q: [f64; N] = q.into();
                    let dx = SVector::from(grid.domain().displacement(center, q));
                    let pair = Some(Pair { j, dx });
                    if !predicate.eval_in(particles, i, pair)?.as_bool()? {
                        continue;
                    }
                    let term = value.eval_in(particles, i, pair)?;
                    acc = Some(match acc {
                        Some(acc) => op.combine(acc, term)?,
                        None => term,
                    });
                }

                match acc {
                    Some(acc) => Ok(acc),
                    None => op.identity(value.pair_kind(particles)?),
                }
            }
        }
    }
}

impl<const N: usize> Statement<N> {
    /// Evaluate the right-hand side for every particle against the unmodified container.
    ///
    /// Nothing is written; the returned buffer holds one value per particle, in index order.
    pub(crate) fn compute(&self, particles: &Particles<N>) -> Result<Vec<Value<N>>> {
        self.check(particles)?;
        if self.value().has_reduction() {
            particles.current_grid()?;
        }

        let eval = |i| self.value().eval(particles, i);
        #[cfg(feature = "rayon")]
        let values = {
            use rayon::prelude::*;
            (0..particles.len()).into_par_iter().map(eval).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let values = (0..particles.len()).map(eval).collect();
        values
    }
}
