//! `symzelll` couples periodic __cell lists__ with a small interpreter for pairwise
//! particle expressions.
//!
//! Considering all _pairwise_ interactions of _`n`_ particles would be of time complexity _`O(n²)`_.\
//! Cell lists facilitate _linear-time_ enumeration of neighbours closer than a certain
//! cutoff distance by dividing the simulation box into grid cells at least as wide as the cutoff.
//! Here, the box is a [`Domain`] whose dimensions may be periodic, and all distances follow
//! the minimum-image convention.
//!
//! # Overview
//!
//! - [`CellGrid`] buckets particles into a sparse hash map of non-empty cells, with one
//!   contiguous storage buffer sliced per cell, and answers radius queries lazily
//! - [`Particles`] stores positions and named scalar or vector variables column-wise,
//!   keeps positions wrapped into the domain and owns a `CellGrid` over them
//! - [`expr`] builds expression trees such as
//!   `v[i] += c * sum(j, norm(dx) < r_cut, -exp(-norm(dx)) * dx / norm(dx))`,
//!   checks their types and evaluates them for all particles at once
//! - [`integrator`] drives a leap-frog simulation with such expressions
//!
//! The grid is never rebuilt implicitly.
//! `Particles` counts position changes and refuses neighbour queries against an index
//! built from older positions; call [`Particles::rebuild_index()`] after moving particles.
//!
//! The `rayon` feature evaluates statements for all particles in parallel.
//! Results are identical to sequential evaluation.
//!
//! While the main structs are generic over dimension `N`, they are intended to be used with
//! `N = 2` or `N = 3`.
//!
//! # Examples
//! ```
//! use symzelll::expr::{Expr, Symbol, norm, sum};
//! use symzelll::{Domain, Particles};
//!
//! let mut particles = Particles::<2>::new(0);
//! particles.push([0.1, 0.1]);
//! particles.push([0.2, 0.1]);
//! particles.declare_vector("velocity").unwrap();
//! particles.init_neighbour_search(Domain::unit(), 0.5).unwrap();
//!
//! let dx = Expr::dx();
//! let push_apart = Symbol::variable("velocity")
//!     .add_assign(-0.1 * sum(norm(dx.clone()).gt(0.0), dx));
//! particles.evaluate(&push_apart).unwrap();
//!
//! let v = particles.vector("velocity").unwrap();
//! assert!(v[0].x < 0.0 && v[1].x > 0.0);
//! ```
pub mod cellgrid;
pub mod error;
pub mod expr;
pub mod integrator;
pub mod particles;

#[cfg(feature = "rayon")]
pub mod rayon {
    //! Re-export of the [`ParallelIterator`] trait.
    pub use rayon::prelude::ParallelIterator;
}

// inlined re-exports
#[doc(inline)]
pub use crate::cellgrid::{CellGrid, Domain};
#[doc(inline)]
pub use crate::error::{Error, Result};
#[doc(inline)]
pub use crate::expr::{Expr, Statement, Symbol, Value, ValueKind};
#[doc(inline)]
pub use crate::integrator::{LeapFrog, Params};
#[doc(inline)]
pub use crate::particles::Particles;

/// Particle data trait.
///
/// This trait is required for types used with [`CellGrid`] which needs to know how to get
/// coordinate data.\
/// Only [`Copy`] types can be used.
/// In general, the smaller the type, the better (for the CPU cache).
///
/// A blanket implementation for `Into<T> + Copy` types is provided.\
/// [`CellGrid`] is slightly more specific and requires impl'ing `Particle<[{float}; N]>`.
/// Therefore, fixed-size float arrays and [`nalgebra::SVector`] can be directly used.
///
/// Having custom types implement this trait allows for particle data having different kinds.
///
/// # Examples
/// ```
/// # use symzelll::{CellGrid, Domain, Particle};
/// #[derive(Clone, Copy)]
/// enum Bead {
///     Solvent([f64; 2]),
///     Solute([f64; 2]),
/// }
///
/// impl Particle<[f64; 2]> for Bead {
///     #[inline]
///     fn coords(&self) -> [f64; 2] {
///         match self {
///             Bead::Solvent(coords) | Bead::Solute(coords) => *coords,
///         }
///     }
/// }
///
/// let beads = [Bead::Solvent([0.1, 0.1]), Bead::Solute([0.15, 0.1])];
/// let cg = CellGrid::new(beads, Domain::unit(), 0.1).unwrap();
/// assert!(matches!(cg.neighbors(0).unwrap().next(), Some((1, Bead::Solute(_)))));
/// ```
pub trait Particle<T = [f64; 2]>: Copy {
    /// Return a copy of this particle's coordinates
    fn coords(&self) -> T;
}

impl<P, T> Particle<T> for P
where
    P: Into<T> + Copy,
{
    #[inline]
    fn coords(&self) -> T {
        <P as Into<T>>::into(*self)
    }
}
