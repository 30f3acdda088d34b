use crate::error::{Error, Result};
use nalgebra::SVector;
use num_traits::{AsPrimitive, Float};
use rand::prelude::*;
use std::borrow::Borrow;

/// Scalar type usable for coordinates in a [`CellGrid`](crate::CellGrid).
///
/// Implemented for every type satisfying the bounds, in practice `f32` and `f64`.
pub trait Coord: Float + AsPrimitive<i32> + std::fmt::Debug + Default + Send + Sync {}

impl<F> Coord for F where F: Float + AsPrimitive<i32> + std::fmt::Debug + Default + Send + Sync {}

/// Axis-aligned simulation box `[low, high)` with a periodicity flag per dimension.
///
/// Periodic dimensions wrap positions back into `[low, high)` and measure displacements
/// using the minimum-image convention.
/// Non-periodic dimensions only serve as the extent of the grid;
/// particles may leave them without breaking neighbour queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Domain<const N: usize = 2, F: Coord = f64> {
    low: [F; N],
    high: [F; N],
    periodic: [bool; N],
}

impl<const N: usize, F: Coord> Domain<N, F> {
    pub fn new(low: [F; N], high: [F; N], periodic: [bool; N]) -> Result<Self> {
        for d in 0..N {
            if !(low[d].is_finite() && high[d].is_finite()) {
                return Err(Error::InvalidDomain(format!(
                    "bounds along dimension {d} are not finite ({:?}, {:?})",
                    low[d], high[d]
                )));
            }
            if high[d] <= low[d] {
                return Err(Error::InvalidDomain(format!(
                    "non-positive extent along dimension {d} ({:?}..{:?})",
                    low[d], high[d]
                )));
            }
        }

        Ok(Self {
            low,
            high,
            periodic,
        })
    }

    /// A box that is periodic along every dimension.
    pub fn periodic(low: [F; N], high: [F; N]) -> Result<Self> {
        Self::new(low, high, [true; N])
    }

    /// The periodic unit box `[0, 1)^N`.
    pub fn unit() -> Self {
        Self {
            low: [F::zero(); N],
            high: [F::one(); N],
            periodic: [true; N],
        }
    }

    pub fn low(&self) -> [F; N] {
        self.low
    }

    pub fn high(&self) -> [F; N] {
        self.high
    }

    pub fn periodicity(&self) -> [bool; N] {
        self.periodic
    }

    pub fn extent(&self) -> [F; N] {
        std::array::from_fn(|d| self.high[d] - self.low[d])
    }

    /// Map `point` into `[low, high)` along every periodic dimension.
    ///
    /// The result is guaranteed to lie inside the half-open interval even when
    /// the modulo arithmetic rounds onto `high`.
    pub fn wrap(&self, point: impl Borrow<[F; N]>) -> [F; N] {
        let mut point = *point.borrow();
        for d in 0..N {
            if self.periodic[d] {
                point[d] = wrap_coord(point[d], self.low[d], self.high[d]);
            }
        }
        point
    }

    /// Minimum-image displacement `to - from`.
    pub fn displacement(&self, from: impl Borrow<[F; N]>, to: impl Borrow<[F; N]>) -> [F; N] {
        let (from, to) = (from.borrow(), to.borrow());
        std::array::from_fn(|d| {
            let delta = to[d] - from[d];
            if self.periodic[d] {
                let len = self.high[d] - self.low[d];
                delta - len * (delta / len).round()
            } else {
                delta
            }
        })
    }

    pub fn distance_squared(&self, a: impl Borrow<[F; N]>, b: impl Borrow<[F; N]>) -> F {
        self.displacement(a, b)
            .iter()
            .fold(F::zero(), |acc, delta| acc + *delta * *delta)
    }

    /// Whether `point` lies inside `[low, high)` along every dimension.
    pub fn contains(&self, point: impl Borrow<[F; N]>) -> bool {
        let point = point.borrow();
        (0..N).all(|d| self.low[d] <= point[d] && point[d] < self.high[d])
    }
}

impl<const N: usize, F: Coord> Default for Domain<N, F> {
    fn default() -> Self {
        Self::unit()
    }
}

#[inline]
fn wrap_coord<F: Coord>(x: F, low: F, high: F) -> F {
    let len = high - low;
    let mut wrapped = x - len * ((x - low) / len).floor();
    // (x - low) / len may round up to the next integer right below a boundary
    if wrapped < low {
        wrapped = wrapped + len;
    }
    if wrapped >= high {
        wrapped = low;
    }
    wrapped
}

/// Regular grid laid over a [`Domain`].
///
/// Every dimension holds `max(1, floor(extent / cutoff))` cells,
/// so cells are at least `cutoff` wide and all neighbours of a particle
/// are found in the `3^N` block of cells around its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridInfo<const N: usize = 2, F: Coord = f64> {
    pub(crate) domain: Domain<N, F>,
    pub(crate) cutoff: F,
    cell_size: [F; N],
    shape: SVector<i32, N>,
    strides: SVector<i32, N>,
}

impl<const N: usize, F: Coord> GridInfo<N, F> {
    pub fn new(domain: Domain<N, F>, cutoff: F) -> Result<Self> {
        if !(cutoff.is_finite() && cutoff > F::zero()) {
            return Err(Error::InvalidDomain(format!(
                "cutoff must be positive and finite, got {cutoff:?}"
            )));
        }

        let max_cells = F::from(i32::MAX).unwrap_or_else(F::max_value);
        let extent = domain.extent();
        let mut shape = SVector::<i32, N>::zeros();
        let mut cell_size = [F::zero(); N];

        for d in 0..N {
            let cells = (extent[d] / cutoff).floor();
            if cells >= max_cells {
                return Err(Error::InvalidDomain(format!(
                    "cutoff {cutoff:?} is too small for extent {:?}",
                    extent[d]
                )));
            }
            let cells: i32 = cells.as_();
            shape[d] = cells.max(1);
            cell_size[d] = extent[d]
                / F::from(shape[d]).ok_or_else(|| {
                    Error::InvalidDomain(format!("cannot represent {} cells", shape[d]))
                })?;
        }

        // first axis is the fastest, i.e. raster order
        let mut strides = shape;
        let mut total = 1i32;
        for (stride, dim) in strides.iter_mut().zip(shape.iter()) {
            *stride = total;
            total = total.checked_mul(*dim).ok_or_else(|| {
                Error::InvalidDomain(format!(
                    "grid of shape {:?} exceeds i32 cell addressing",
                    shape.as_slice()
                ))
            })?;
        }

        Ok(Self {
            domain,
            cutoff,
            cell_size,
            shape,
            strides,
        })
    }

    pub fn domain(&self) -> &Domain<N, F> {
        &self.domain
    }

    pub fn cutoff(&self) -> F {
        self.cutoff
    }

    pub fn origin(&self) -> [F; N] {
        self.domain.low
    }

    pub fn cell_size(&self) -> [F; N] {
        self.cell_size
    }

    pub fn shape(&self) -> [i32; N] {
        self.shape.into()
    }

    pub fn strides(&self) -> [i32; N] {
        self.strides.into()
    }

    pub fn num_cells(&self) -> usize {
        self.shape.iter().map(|dim| *dim as usize).product()
    }

    /// Whether distinct neighbour offsets may wrap onto the same cell,
    /// i.e. some periodic dimension has fewer than 3 cells.
    pub fn aliases_neighbors(&self) -> bool {
        (0..N).any(|d| self.domain.periodic[d] && self.shape[d] < 3)
    }

    pub fn flatten_index(&self, idx: impl Borrow<[i32; N]>) -> i32 {
        SVector::from(*idx.borrow()).dot(&self.strides)
    }

    pub fn unflatten_index(&self, flat: i32) -> [i32; N] {
        std::array::from_fn(|d| (flat / self.strides[d]) % self.shape[d])
    }

    /// Multi-index of the cell containing `point`, clamped into the grid.
    ///
    /// Clamping is exact along periodic dimensions (positions are wrapped)
    /// and harmless along open ones since cells are at least `cutoff` wide.
    pub fn cell_index(&self, point: impl Borrow<[F; N]>) -> [i32; N] {
        let point = point.borrow();
        std::array::from_fn(|d| {
            let idx: i32 = ((point[d] - self.domain.low[d]) / self.cell_size[d])
                .floor()
                .as_();
            idx.clamp(0, self.shape[d] - 1)
        })
    }

    pub fn flat_cell_index(&self, point: impl Borrow<[F; N]>) -> i32 {
        self.flatten_index(self.cell_index(point))
    }

    /// Flat index of the cell at `center + offset`.
    ///
    /// Wraps around periodic dimensions and returns `None` if the cell lies
    /// outside an open dimension.
    pub fn neighbor_cell(&self, center: &[i32; N], offset: &[i32; N]) -> Option<i32> {
        let mut idx = [0; N];
        for d in 0..N {
            let coord = center[d] + offset[d];
            idx[d] = if self.domain.periodic[d] {
                coord.rem_euclid(self.shape[d])
            } else if (0..self.shape[d]).contains(&coord) {
                coord
            } else {
                return None;
            };
        }
        Some(self.flatten_index(idx))
    }
}

/// Generate `n` points uniformly distributed in `domain`, with fixed seed for reproducibility.
pub fn generate_points_random<const N: usize>(
    n: usize,
    domain: &Domain<N, f64>,
    seed: Option<u64>,
) -> Vec<[f64; N]> {
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or(3079380797442975911));
    let (low, high) = (domain.low(), domain.high());

    std::iter::repeat_with(|| std::array::from_fn(|d| rng.gen_range(low[d]..high[d])))
        .take(n)
        .collect()
}
