pub mod flatindex;
pub mod iters;
pub mod neighbors;
pub mod storage;
pub mod util;

use crate::Particle;
use crate::error::{Error, Result};
pub use flatindex::*;
use hashbrown::HashMap;
pub use iters::*;
pub use storage::*;
pub use util::*;

/// Periodic-aware cell lists over `N`-dimensional particle data.
///
/// The grid partitions a [`Domain`] into cells at least `cutoff` wide and stores
/// `(index, particle)` entries in one contiguous buffer, sliced per non-empty cell.
/// Queries only look at the `3^N` block of cells around a particle's own cell,
/// wrapping around periodic dimensions.
///
/// The grid reflects the points it was last (re)built from.
/// It is never updated implicitly; call [`CellGrid::rebuild_mut()`] after particles moved.
#[derive(Debug, Clone)]
pub struct CellGrid<P, const N: usize = 2, F: Coord = f64> {
    cells: HashMap<i32, CellSliceMeta>,
    cell_lists: CellStorage<(usize, P)>,
    index: FlatIndex<N, F>,
}

impl<P: Particle<[F; N]>, const N: usize, F: Coord> CellGrid<P, N, F> {
    /// Bucket `points` into a grid over `domain` with cells of side `>= cutoff`.
    ///
    /// Fails with [`Error::InvalidDomain`] if `cutoff` is not positive.
    /// ```
    /// use symzelll::{CellGrid, Domain};
    ///
    /// let points = [[0.1, 0.1], [0.2, 0.1], [0.9, 0.9]];
    /// let cg = CellGrid::new(points, Domain::unit(), 0.25).unwrap();
    /// assert_eq!(cg.shape(), [4, 4]);
    /// ```
    pub fn new<I>(points: I, domain: Domain<N, F>, cutoff: F) -> Result<Self>
    where
        I: IntoIterator<Item = P> + Clone,
    {
        let info = GridInfo::new(domain, cutoff)?;
        let mut grid = Self {
            cells: HashMap::new(),
            cell_lists: CellStorage::default(),
            index: FlatIndex::from_points(points.clone(), info),
        };
        grid.reallocate(points.clone());
        grid.fill(points);

        log::debug!(
            "built cell grid: {} particles in {} of {} cells",
            grid.len(),
            grid.cells.len(),
            info.num_cells()
        );

        Ok(grid)
    }

    /// Consuming version of [`CellGrid::rebuild_mut()`].
    #[must_use = "rebuild() consumes `self` and returns the rebuilt `CellGrid`"]
    pub fn rebuild<I>(mut self, points: I, cutoff: Option<F>) -> Result<Self>
    where
        I: IntoIterator<Item = P> + Clone,
    {
        self.rebuild_mut(points, cutoff)?;
        Ok(self)
    }

    /// Rebuild the grid from updated `points`, optionally with a new `cutoff`.
    ///
    /// The cell layout is only re-allocated if some particle changed its cell
    /// (or the number of particles or the cutoff changed).
    /// Particle data is always rewritten.
    pub fn rebuild_mut<I>(&mut self, points: I, cutoff: Option<F>) -> Result<()>
    where
        I: IntoIterator<Item = P> + Clone,
    {
        let info = match cutoff {
            Some(cutoff) => GridInfo::new(self.index.grid_info.domain, cutoff)?,
            None => self.index.grid_info,
        };

        if self.index.rebuild_mut(points.clone(), info) {
            self.reallocate(points.clone());
            log::debug!(
                "re-allocated cell grid: {} particles in {} cells",
                self.len(),
                self.cells.len()
            );
        } else {
            self.cells.values_mut().for_each(CellSliceMeta::clear);
        }
        self.fill(points);

        Ok(())
    }

    fn reallocate<I: IntoIterator<Item = P>>(&mut self, points: I) {
        self.cells.clear();
        self.cell_lists.clear();

        let Some(filler) = points.into_iter().next() else {
            return;
        };
        let filler = (usize::MAX, filler);

        self.index.index.iter().for_each(|idx| {
            self.cells.entry(*idx).or_default().count();
        });

        self.cells.values_mut().for_each(|slice| {
            *slice = self.cell_lists.reserve_cell(slice.cursor(), &filler);
        });

        self.cells.shrink_to_fit();
    }

    fn fill<I: IntoIterator<Item = P>>(&mut self, points: I) {
        self.index
            .index
            .iter()
            .zip(points)
            .enumerate()
            .for_each(|(i, (cell, point))| {
                self.cell_lists.push(
                    (i, point),
                    self.cells
                        .get_mut(cell)
                        .expect("cell grid should contain every cell in the grid index"),
                )
            });
    }

    pub fn shape(&self) -> [i32; N] {
        self.index.grid_info.shape()
    }

    pub fn info(&self) -> &GridInfo<N, F> {
        &self.index.grid_info
    }

    pub fn domain(&self) -> &Domain<N, F> {
        &self.index.grid_info.domain
    }

    pub fn cutoff(&self) -> F {
        self.index.grid_info.cutoff
    }

    /// Number of particles in this grid.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Return the particle with index `i` as stored in this grid.
    pub fn get(&self, i: usize) -> Option<P> {
        let cell = self.index.index.get(i)?;
        let slice = self.cell_lists.cell_slice(self.cells.get(cell)?);
        // entries within a cell are in ascending particle order
        slice
            .binary_search_by_key(&i, |(j, _)| *j)
            .ok()
            .map(|pos| slice[pos].1)
    }

    /// Iterate over all particles `j != i` within `cutoff` of particle `i` (minimum-image distance).
    ///
    /// Returns `None` if `i` is not part of this grid.
    /// ```
    /// # use symzelll::{CellGrid, Domain};
    /// let points = [[0.01, 0.5], [0.99, 0.5], [0.5, 0.5]];
    /// let cg = CellGrid::new(points, Domain::unit(), 0.1).unwrap();
    /// let neighbors: Vec<usize> = cg.neighbors(0).unwrap().map(|(j, _)| j).collect();
    /// assert_eq!(neighbors, vec![1]);
    /// ```
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn neighbors(&self, i: usize) -> Option<NeighborIter<'_, P, N, F>> {
        let center = self.get(i)?.coords();
        Some(NeighborIter::new(self, center, self.cutoff(), Some(i)))
    }

    /// Like [`CellGrid::neighbors()`] but with a `radius` that must not exceed the grid cutoff.
    pub fn neighbors_within(
        &self,
        i: usize,
        radius: F,
    ) -> Result<Option<NeighborIter<'_, P, N, F>>> {
        self.check_radius(radius)?;
        Ok(self
            .get(i)
            .map(|p| NeighborIter::new(self, p.coords(), radius, Some(i))))
    }

    /// Iterate over all particles within `radius` of an arbitrary `point`.
    pub fn query(&self, point: [F; N], radius: F) -> Result<NeighborIter<'_, P, N, F>> {
        self.check_radius(radius)?;
        Ok(NeighborIter::new(self, point, radius, None))
    }

    fn check_radius(&self, radius: F) -> Result<()> {
        if radius > self.cutoff() {
            Err(Error::QueryRadius {
                radius: radius.to_f64().unwrap_or(f64::NAN),
                cutoff: self.cutoff().to_f64().unwrap_or(f64::NAN),
            })
        } else {
            Ok(())
        }
    }

    /// Iterate over all non-empty [`GridCell`]s in this `CellGrid`, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = GridCell<'_, P, N, F>> + Clone {
        self.cells.keys().map(move |index| GridCell::new(self, *index))
    }

    /// Iterate over all unique pairs `((i, p), (j, q))` with `i < j` within `cutoff` (minimum-image distance).
    /// ```
    /// # use symzelll::{CellGrid, Domain};
    /// let points = [[0.05, 0.05], [0.95, 0.95], [0.5, 0.5]];
    /// let cg = CellGrid::new(points, Domain::unit(), 0.2).unwrap();
    /// let pairs: Vec<_> = cg.pair_indices().collect();
    /// assert_eq!(pairs, vec![(0, 1)]);
    /// ```
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn particle_pairs(&self) -> impl Iterator<Item = ((usize, P), (usize, P))> + '_ {
        self.iter().flat_map(move |cell| {
            cell.iter().flat_map(move |(i, p)| {
                NeighborIter::new(self, p.coords(), self.cutoff(), Some(i))
                    .filter(move |(j, _)| *j > i)
                    .map(move |(j, q)| ((i, p), (j, q)))
            })
        })
    }

    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn pair_indices(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.particle_pairs().map(|((i, _p), (j, _q))| (i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn brute_force(points: &[[f64; 2]], domain: &Domain<2>, i: usize, radius: f64) -> Vec<usize> {
        (0..points.len())
            .filter(|&j| j != i && domain.distance_squared(points[i], points[j]) <= radius * radius)
            .collect()
    }

    #[test]
    fn test_cellgrid_new() {
        let points: Vec<[f64; 2]> = generate_points_random(500, &Domain::unit(), Some(1));
        let cg = CellGrid::new(points.iter().copied(), Domain::unit(), 0.1).unwrap();

        assert_eq!(cg.shape(), [10, 10]);
        assert_eq!(cg.len(), 500);
        assert_eq!(cg.iter().map(|cell| cell.len()).sum::<usize>(), 500);
        assert_eq!(cg.get(42), Some(points[42]));
        assert_eq!(cg.get(500), None);
    }

    #[test]
    fn test_cellgrid_invalid() {
        let points = [[0.5, 0.5]];
        assert!(matches!(
            CellGrid::new(points, Domain::unit(), 0.0),
            Err(Error::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_cellgrid_particle_without_default() {
        #[derive(Clone, Copy, Debug, PartialEq)]
        struct Tagged(u8, [f64; 2]);

        impl Particle<[f64; 2]> for Tagged {
            fn coords(&self) -> [f64; 2] {
                self.1
            }
        }

        let beads = [Tagged(1, [0.1, 0.1]), Tagged(2, [0.15, 0.1]), Tagged(3, [0.4, 0.3])];
        let cg = CellGrid::new(beads, Domain::unit(), 0.1).unwrap();
        let found: Vec<(usize, Tagged)> = cg.neighbors(0).unwrap().collect();
        assert_eq!(found, vec![(1, beads[1])]);

        let cg = cg.rebuild(beads, Some(0.5)).unwrap();
        assert_eq!(cg.neighbors(2).unwrap().count(), 2);
    }

    #[test]
    fn test_neighbors_brute_force() {
        for domain in [
            Domain::unit(),
            Domain::new([0.0, 0.0], [1.0, 1.0], [true, false]).unwrap(),
            Domain::new([0.0, 0.0], [1.0, 1.0], [false, false]).unwrap(),
        ] {
            let points = generate_points_random(400, &domain, Some(2));
            let cutoff = 0.13;
            let cg = CellGrid::new(points.iter().copied(), domain, cutoff).unwrap();

            for i in 0..points.len() {
                let mut found: Vec<usize> = cg.neighbors(i).unwrap().map(|(j, _)| j).collect();
                found.sort();
                assert_eq!(found, brute_force(&points, &domain, i, cutoff), "particle {i}");
            }
        }
    }

    #[test]
    fn test_neighbors_cutoff_boundary() {
        let cutoff = 0.2;
        let eps = 1e-9;
        for domain in [
            Domain::unit(),
            Domain::new([0.0, 0.0], [1.0, 1.0], [false, false]).unwrap(),
        ] {
            let inside = [[0.3, 0.5], [0.3 + cutoff - eps, 0.5]];
            let cg = CellGrid::new(inside, domain, cutoff).unwrap();
            assert_eq!(cg.neighbors(0).unwrap().count(), 1);

            let outside = [[0.3, 0.5], [0.3 + cutoff + eps, 0.5]];
            let cg = CellGrid::new(outside, domain, cutoff).unwrap();
            assert_eq!(cg.neighbors(0).unwrap().count(), 0);
        }

        // separated across the periodic boundary
        let inside = [[0.05, 0.5], [1.05 - cutoff + eps, 0.5]];
        let cg = CellGrid::new(inside, Domain::unit(), cutoff).unwrap();
        assert_eq!(cg.neighbors(0).unwrap().count(), 1);

        let outside = [[0.05, 0.5], [1.05 - cutoff - eps, 0.5]];
        let cg = CellGrid::new(outside, Domain::unit(), cutoff).unwrap();
        assert_eq!(cg.neighbors(0).unwrap().count(), 0);
    }

    #[test]
    fn test_neighbors_tiny_periodic_grid() {
        // 2x2 cells: offsets -1 and +1 wrap onto the same cell
        let points = [[0.1, 0.1], [0.2, 0.1], [0.55, 0.1], [0.1, 0.55]];
        let cg = CellGrid::new(points, Domain::unit(), 0.5).unwrap();
        assert_eq!(cg.shape(), [2, 2]);

        // cells in raster order of the offsets: (1, 1), (0, 1), (1, 0), (0, 0)
        let found: Vec<usize> = cg.neighbors(0).unwrap().map(|(j, _)| j).collect();
        assert_eq!(found, vec![3, 2, 1]);

        // a single cell holds everything
        let cg = CellGrid::new(points, Domain::unit(), 0.9).unwrap();
        assert_eq!(cg.shape(), [1, 1]);
        let found: Vec<usize> = cg.neighbors(3).unwrap().map(|(j, _)| j).collect();
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn test_neighbors_deterministic_and_self_excluding() {
        let points: Vec<[f64; 2]> = generate_points_random(300, &Domain::unit(), Some(3));
        let cg = CellGrid::new(points.iter().copied(), Domain::unit(), 0.15).unwrap();
        let other = cg.clone().rebuild(points.iter().copied(), None).unwrap();

        for i in 0..points.len() {
            let a: Vec<usize> = cg.neighbors(i).unwrap().map(|(j, _)| j).collect();
            let b: Vec<usize> = other.neighbors(i).unwrap().map(|(j, _)| j).collect();
            assert_eq!(a, b);
            assert!(!a.contains(&i));
        }
    }

    #[test]
    fn test_neighbors_within_and_query() {
        let points = [[0.5, 0.5], [0.55, 0.5], [0.65, 0.5]];
        let cg = CellGrid::new(points, Domain::unit(), 0.2).unwrap();

        let near: Vec<usize> = cg
            .neighbors_within(0, 0.1)
            .unwrap()
            .unwrap()
            .map(|(j, _)| j)
            .collect();
        assert_eq!(near, vec![1]);
        assert!(matches!(
            cg.neighbors_within(0, 0.5),
            Err(Error::QueryRadius { .. })
        ));

        // wrapped to [0.6, 0.5]
        let mut queried: Vec<usize> = cg.query([1.6, 0.5], 0.07).unwrap().map(|(j, _)| j).collect();
        queried.sort();
        assert_eq!(queried, vec![1, 2]);
    }

    #[test]
    fn test_rebuild_mut() {
        let mut points: Vec<[f64; 2]> = generate_points_random(200, &Domain::unit(), Some(4));
        let mut cg = CellGrid::new(points.iter().copied(), Domain::unit(), 0.1).unwrap();

        // tiny moves keep (most) cells, large ones do not; both must be reflected
        for (k, p) in points.iter_mut().enumerate() {
            let shift = if k % 2 == 0 { 1e-6 } else { 0.37 };
            *p = Domain::<2>::unit().wrap([p[0] + shift, p[1] - shift]);
        }
        cg.rebuild_mut(points.iter().copied(), None).unwrap();
        for (i, p) in points.iter().enumerate() {
            assert_eq!(cg.get(i), Some(*p));
        }

        cg.rebuild_mut(points.iter().copied(), Some(0.25)).unwrap();
        assert_eq!(cg.shape(), [4, 4]);
        for i in 0..points.len() {
            let mut found: Vec<usize> = cg.neighbors(i).unwrap().map(|(j, _)| j).collect();
            found.sort();
            assert_eq!(found, brute_force(&points, &Domain::unit(), i, 0.25));
        }

        points.truncate(10);
        cg.rebuild_mut(points.iter().copied(), None).unwrap();
        assert_eq!(cg.len(), 10);
        assert_eq!(cg.iter().map(|cell| cell.len()).sum::<usize>(), 10);
    }

    #[test]
    fn test_particle_pairs() {
        let points: Vec<[f64; 2]> = generate_points_random(300, &Domain::unit(), Some(5));
        let cutoff = 0.1;
        let cg = CellGrid::new(points.iter().copied(), Domain::unit(), cutoff).unwrap();

        let pairs: BTreeSet<(usize, usize)> = cg.pair_indices().collect();
        let expected: BTreeSet<(usize, usize)> = (0..points.len())
            .flat_map(|i| {
                brute_force(&points, &Domain::unit(), i, cutoff)
                    .into_iter()
                    .filter(move |j| *j > i)
                    .map(move |j| (i, j))
            })
            .collect();
        assert_eq!(pairs, expected);
        assert_eq!(cg.pair_indices().count(), expected.len(), "pairs should be unique");
    }

    #[test]
    fn test_cellgrid_3d() {
        let domain = Domain::new([0.0; 3], [1.0, 2.0, 0.5], [true, true, false]).unwrap();
        let points: Vec<[f64; 3]> = generate_points_random(300, &domain, Some(6));
        let cg = CellGrid::new(points.iter().copied(), domain, 0.2).unwrap();
        assert_eq!(cg.shape(), [5, 10, 2]);

        for i in 0..points.len() {
            let mut found: Vec<usize> = cg.neighbors(i).unwrap().map(|(j, _)| j).collect();
            found.sort();
            let expected: Vec<usize> = (0..points.len())
                .filter(|&j| j != i && domain.distance_squared(points[i], points[j]) <= 0.2 * 0.2)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_empty_cellgrid() {
        let cg = CellGrid::new(Vec::<[f64; 2]>::new(), Domain::unit(), 0.1).unwrap();
        assert!(cg.is_empty());
        assert!(cg.neighbors(0).is_none());
        assert_eq!(cg.pair_indices().count(), 0);
    }
}
