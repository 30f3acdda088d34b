use super::{CellGrid, Coord};
use crate::Particle;
use core::iter::FusedIterator;

/// A non-empty cell of a [`CellGrid`].
#[derive(Debug, Clone, Copy)]
pub struct GridCell<'g, P, const N: usize = 2, F: Coord = f64> {
    pub(crate) grid: &'g CellGrid<P, N, F>,
    pub(crate) index: i32,
}

impl<'g, P: Particle<[F; N]>, const N: usize, F: Coord> GridCell<'g, P, N, F> {
    pub(crate) fn new(grid: &'g CellGrid<P, N, F>, index: i32) -> Self {
        Self { grid, index }
    }

    /// Flat index of this cell.
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn multi_index(&self) -> [i32; N] {
        self.grid.info().unflatten_index(self.index)
    }

    /// `(index, particle)` entries of this cell, in ascending particle index.
    pub fn particles(&self) -> &'g [(usize, P)] {
        self.grid
            .cells
            .get(&self.index)
            .map(|meta| self.grid.cell_lists.cell_slice(meta))
            .unwrap_or(&[])
    }

    pub fn iter(self) -> impl Iterator<Item = (usize, P)> + Clone + 'g {
        self.particles().iter().copied()
    }

    pub fn len(&self) -> usize {
        self.particles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles().is_empty()
    }

    /// Distinct non-empty cells in the `3^N` block around this cell (including itself),
    /// in raster order.
    pub fn neighbors(self) -> impl Iterator<Item = GridCell<'g, P, N, F>> + 'g {
        let grid = self.grid;
        neighbor_cells(grid, self.multi_index())
            .filter(move |cell| grid.cells.contains_key(cell))
            .map(move |cell| GridCell::new(grid, cell))
    }
}

/// Flat indices of the distinct cells around `center`, in raster order of the relative offsets.
///
/// Along periodic dimensions with fewer than 3 cells several offsets wrap onto the same cell;
/// only the first of them is kept.
fn neighbor_cells<'g, P, const N: usize, F: Coord>(
    grid: &'g CellGrid<P, N, F>,
    center: [i32; N],
) -> impl Iterator<Item = i32> + 'g {
    (0..grid.index.neighbor_offsets.len()).filter_map(move |k| neighbor_cell_at(grid, &center, k))
}

fn neighbor_cell_at<P, const N: usize, F: Coord>(
    grid: &CellGrid<P, N, F>,
    center: &[i32; N],
    k: usize,
) -> Option<i32> {
    let info = &grid.index.grid_info;
    let offsets = &grid.index.neighbor_offsets;
    let cell = info.neighbor_cell(center, &offsets[k])?;

    if info.aliases_neighbors()
        && offsets[..k]
            .iter()
            .any(|offset| info.neighbor_cell(center, offset) == Some(cell))
    {
        None
    } else {
        Some(cell)
    }
}

/// Lazily yields all `(j, particle)` within a radius of some center, by minimum-image distance.
///
/// Cells are visited in the fixed raster order of their offsets from the center cell
/// and particles within a cell in ascending index, so the sequence is deterministic
/// for identical input.
/// The iterator borrows its [`CellGrid`], hence the grid cannot be rebuilt while iterating.
#[derive(Clone)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct NeighborIter<'g, P, const N: usize = 2, F: Coord = f64> {
    grid: &'g CellGrid<P, N, F>,
    center: [F; N],
    center_cell: [i32; N],
    radius_squared: F,
    exclude: Option<usize>,
    state: usize,
    current: core::slice::Iter<'g, (usize, P)>,
}

impl<'g, P: Particle<[F; N]>, const N: usize, F: Coord> NeighborIter<'g, P, N, F> {
    pub(crate) fn new(
        grid: &'g CellGrid<P, N, F>,
        center: [F; N],
        radius: F,
        exclude: Option<usize>,
    ) -> Self {
        let center = grid.domain().wrap(center);
        Self {
            grid,
            center,
            center_cell: grid.info().cell_index(center),
            radius_squared: radius * radius,
            exclude,
            state: 0,
            current: Default::default(),
        }
    }
}

impl<P: Particle<[F; N]>, const N: usize, F: Coord> Iterator for NeighborIter<'_, P, N, F> {
    type Item = (usize, P);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for &(j, p) in self.current.by_ref() {
                if Some(j) == self.exclude {
                    continue;
                }
                let distance_squared = self.grid.domain().distance_squared(self.center, p.coords());
                if distance_squared <= self.radius_squared {
                    return Some((j, p));
                }
            }

            if self.state >= self.grid.index.neighbor_offsets.len() {
                return None;
            }
            let k = self.state;
            self.state += 1;

            if let Some(meta) = neighbor_cell_at(self.grid, &self.center_cell, k)
                .and_then(|cell| self.grid.cells.get(&cell))
            {
                self.current = self.grid.cell_lists.cell_slice(meta).iter();
            }
        }
    }
}

impl<P: Particle<[F; N]>, const N: usize, F: Coord> FusedIterator for NeighborIter<'_, P, N, F> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cellgrid::{Domain, generate_points_random};

    #[test]
    fn test_cellgrid_iter() {
        let points: Vec<[f64; 2]> = generate_points_random(100, &Domain::unit(), None);
        let cg = CellGrid::new(points.iter().copied(), Domain::unit(), 0.25).unwrap();

        let mut seen: Vec<usize> = cg.iter().flat_map(|cell| cell.iter().map(|(i, _)| i)).collect();
        seen.sort();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());

        // doing it twice to check nothing got consumed
        assert_eq!(cg.iter().count(), cg.iter().count());
    }

    #[test]
    fn test_gridcell() {
        let points = [[0.1, 0.1], [0.3, 0.1], [0.15, 0.2], [0.9, 0.9]];
        let cg = CellGrid::new(points, Domain::unit(), 0.25).unwrap();

        let cell = cg.iter().find(|cell| cell.multi_index() == [0, 0]).unwrap();
        assert_eq!(cell.index(), 0);
        assert_eq!(cell.particles(), &[(0, [0.1, 0.1]), (2, [0.15, 0.2])]);

        // [0.9, 0.9] sits in the corner cell (3, 3) which wraps around to (0, 0)
        let mut neighbors: Vec<[i32; 2]> = cell.neighbors().map(|c| c.multi_index()).collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![[0, 0], [1, 0], [3, 3]]);
    }

    #[test]
    fn test_neighbor_cells_dedup() {
        let points = [[0.5, 0.5]];
        let domain = Domain::new([0.0, 0.0], [1.0, 1.0], [true, false]).unwrap();
        let cg = CellGrid::new(points, domain, 0.5).unwrap();

        // periodic x with 2 cells aliases, open y drops out-of-range rows
        let cells: Vec<i32> = neighbor_cells(&cg, [1, 1]).collect();
        assert_eq!(cells, vec![0, 1, 2, 3]);
    }
}
