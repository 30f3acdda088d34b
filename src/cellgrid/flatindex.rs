// Order of points in the point cloud is assumed to stay fixed between rebuilds,
// i.e. position `i` in `FlatIndex::index` corresponds to particle `i`.
use crate::Particle;
use crate::cellgrid::neighbors::RelativeNeighborIndices;
use crate::cellgrid::util::*;

/// Flat cell index of every particle, together with the grid it refers to.
#[derive(Debug, PartialEq, Clone)]
pub struct FlatIndex<const N: usize = 2, F: Coord = f64> {
    pub(crate) grid_info: GridInfo<N, F>,
    pub(crate) index: Vec<i32>,
    pub(crate) neighbor_offsets: Vec<[i32; N]>,
}

impl<const N: usize, F: Coord> FlatIndex<N, F> {
    pub fn with_capacity(info: GridInfo<N, F>, capacity: usize) -> Self {
        Self {
            grid_info: info,
            index: Vec::with_capacity(capacity),
            neighbor_offsets: RelativeNeighborIndices::full_space().collect(),
        }
    }

    pub fn from_points<P: Particle<[F; N]>>(
        points: impl IntoIterator<Item = P>,
        info: GridInfo<N, F>,
    ) -> Self {
        let mut index = Self::with_capacity(info, 0);
        index.index = points
            .into_iter()
            .map(|point| info.flat_cell_index(info.domain.wrap(point.coords())))
            .collect();
        index
    }

    /// Recompute the cell of every point.
    ///
    /// Returns whether the index changed at all, i.e. in its grid, its length or any individual entry.
    pub fn rebuild_mut<P: Particle<[F; N]>>(
        &mut self,
        points: impl IntoIterator<Item = P>,
        info: GridInfo<N, F>,
    ) -> bool {
        let mut changed = info != self.grid_info;
        self.grid_info = info;

        let mut len = 0;
        for point in points {
            let cell = info.flat_cell_index(info.domain.wrap(point.coords()));
            match self.index.get_mut(len) {
                Some(old) if *old == cell => {}
                Some(old) => {
                    *old = cell;
                    changed = true;
                }
                None => {
                    self.index.push(cell);
                    changed = true;
                }
            }
            len += 1;
        }

        if len != self.index.len() {
            self.index.truncate(len);
            changed = true;
        }

        changed
    }

    pub fn grid_info(&self) -> &GridInfo<N, F> {
        &self.grid_info
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
