//! Column-stored particle data with an owned neighbour index.
use crate::cellgrid::{CellGrid, Domain, NeighborIter};
use crate::error::{Error, Result};
use crate::expr::{Assign, Expr, Statement, Symbol, Value, ValueKind};

use nalgebra::SVector;

/// Reserved name of the position variable.
pub const POSITION: &str = "position";

/// Cell grid over particle positions, as owned by [`Particles`].
pub type PositionGrid<const N: usize> = CellGrid<SVector<f64, N>, N, f64>;

#[derive(Debug, Clone, PartialEq)]
enum Column<const N: usize> {
    Scalar(Vec<f64>),
    Vector(Vec<SVector<f64, N>>),
}

impl<const N: usize> Column<N> {
    fn kind(&self) -> ValueKind {
        match self {
            Column::Scalar(_) => ValueKind::Scalar,
            Column::Vector(_) => ValueKind::Vector,
        }
    }

    fn value(&self, i: usize) -> Value<N> {
        match self {
            Column::Scalar(values) => Value::Scalar(values[i]),
            Column::Vector(values) => Value::Vector(values[i]),
        }
    }

    fn resize(&mut self, n: usize) {
        match self {
            Column::Scalar(values) => values.resize(n, 0.0),
            Column::Vector(values) => values.resize(n, SVector::zeros()),
        }
    }
}

#[derive(Debug, Clone)]
struct NeighbourSearch<const N: usize> {
    grid: PositionGrid<N>,
    /// Position generation the grid was (re)built from.
    built_from: u64,
}

/// `N`-dimensional particles with a position and any number of named scalar or vector variables.
///
/// Once neighbour search is initialised, positions are kept wrapped into the periodic
/// dimensions of its [`Domain`].
/// Every position change increments the container's generation; the neighbour index
/// remembers the generation it was built from and refuses queries once it is outdated
/// (see [`Particles::rebuild_index()`]).
///
/// ```
/// use nalgebra::Vector2;
/// use symzelll::{Domain, Particles};
///
/// let mut particles = Particles::<2>::new(0);
/// particles.push([0.1, 0.1]);
/// particles.push([0.2, 0.1]);
/// particles.declare_vector("velocity").unwrap();
/// particles.init_neighbour_search(Domain::unit(), 0.5).unwrap();
///
/// particles.set_position(1, [1.25, -0.75]);
/// assert_eq!(particles.position(1), Vector2::new(0.25, 0.25));
/// assert!(particles.neighbours(0).is_err());
///
/// particles.rebuild_index().unwrap();
/// assert_eq!(particles.neighbours(0).unwrap().count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Particles<const N: usize = 2> {
    positions: Vec<SVector<f64, N>>,
    columns: Vec<(String, Column<N>)>,
    generation: u64,
    search: Option<NeighbourSearch<N>>,
}

impl<const N: usize> Particles<N> {
    /// `n` particles at the origin without any variables.
    pub fn new(n: usize) -> Self {
        Self {
            positions: vec![SVector::zeros(); n],
            columns: Vec::new(),
            generation: 0,
            search: None,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Declare a zero-initialised vector variable.
    pub fn declare_vector(&mut self, name: impl Into<String>) -> Result<()> {
        self.declare(name.into(), Column::Vector(vec![SVector::zeros(); self.len()]))
    }

    /// Declare a zero-initialised scalar variable.
    pub fn declare_scalar(&mut self, name: impl Into<String>) -> Result<()> {
        self.declare(name.into(), Column::Scalar(vec![0.0; self.len()]))
    }

    fn declare(&mut self, name: String, column: Column<N>) -> Result<()> {
        if name == POSITION || self.columns.iter().any(|(other, _)| *other == name) {
            return Err(Error::DuplicateVariable(name));
        }
        self.columns.push((name, column));
        Ok(())
    }

    /// Names of all declared variables, in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    fn column(&self, name: &str) -> Result<&Column<N>> {
        self.columns
            .iter()
            .find(|(other, _)| other == name)
            .map(|(_, column)| column)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Column<N>> {
        self.columns
            .iter_mut()
            .find(|(other, _)| other == name)
            .map(|(_, column)| column)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Values of the vector variable `name`.
    ///
    /// Positions are not a variable in this sense; use [`Particles::positions()`].
    pub fn vector(&self, name: &str) -> Result<&[SVector<f64, N>]> {
        match self.column(name)? {
            Column::Vector(values) => Ok(values),
            column => Err(kind_error(name, ValueKind::Vector, column.kind())),
        }
    }

    pub fn vector_mut(&mut self, name: &str) -> Result<&mut [SVector<f64, N>]> {
        match self.column_mut(name)? {
            Column::Vector(values) => Ok(values),
            column => Err(kind_error(name, ValueKind::Vector, column.kind())),
        }
    }

    pub fn scalar(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Scalar(values) => Ok(values),
            column => Err(kind_error(name, ValueKind::Scalar, column.kind())),
        }
    }

    pub fn scalar_mut(&mut self, name: &str) -> Result<&mut [f64]> {
        match self.column_mut(name)? {
            Column::Scalar(values) => Ok(values),
            column => Err(kind_error(name, ValueKind::Scalar, column.kind())),
        }
    }

    /// Kind of values `symbol` refers to.
    pub fn kind_of(&self, symbol: &Symbol) -> Result<ValueKind> {
        match symbol {
            Symbol::Position => Ok(ValueKind::Vector),
            Symbol::Variable(name) => Ok(self.column(name)?.kind()),
        }
    }

    /// Value of `symbol` for particle `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn value_of(&self, symbol: &Symbol, i: usize) -> Result<Value<N>> {
        match symbol {
            Symbol::Position => Ok(Value::Vector(self.positions[i])),
            Symbol::Variable(name) => Ok(self.column(name)?.value(i)),
        }
    }

    pub fn positions(&self) -> &[SVector<f64, N>] {
        &self.positions
    }

    pub fn position(&self, i: usize) -> SVector<f64, N> {
        self.positions[i]
    }

    /// Set the position of particle `i`, wrapped into the neighbour search domain.
    pub fn set_position(&mut self, i: usize, position: impl Into<SVector<f64, N>>) {
        self.positions[i] = self.wrap(position.into());
        self.generation += 1;
    }

    /// Mutate all positions at once; they get wrapped afterwards.
    pub fn update_positions<U>(&mut self, mut update: U)
    where
        U: FnMut(usize, &mut SVector<f64, N>),
    {
        for (i, position) in self.positions.iter_mut().enumerate() {
            update(i, position);
        }
        self.wrap_all();
        self.generation += 1;
    }

    /// Append a particle and return its index. All of its variables are zero.
    pub fn push(&mut self, position: impl Into<SVector<f64, N>>) -> usize {
        let position = self.wrap(position.into());
        self.positions.push(position);
        let n = self.len();
        self.columns.iter_mut().for_each(|(_, column)| column.resize(n));
        self.generation += 1;
        n - 1
    }

    /// Grow or shrink to `n` particles. New particles start at the (wrapped) origin.
    pub fn resize(&mut self, n: usize) {
        let origin = self.wrap(SVector::zeros());
        self.positions.resize(n, origin);
        self.columns.iter_mut().for_each(|(_, column)| column.resize(n));
        self.generation += 1;
    }

    fn wrap(&self, position: SVector<f64, N>) -> SVector<f64, N> {
        match &self.search {
            Some(search) => SVector::from(search.grid.domain().wrap(<[f64; N]>::from(position))),
            None => position,
        }
    }

    fn wrap_all(&mut self) {
        if let Some(search) = &self.search {
            let domain = search.grid.domain();
            for position in self.positions.iter_mut() {
                *position = SVector::from(domain.wrap(<[f64; N]>::from(*position)));
            }
        }
    }

    /// Wrap all positions into `domain` and index them with cells of side `>= cutoff`.
    ///
    /// Replaces any previous neighbour search.
    pub fn init_neighbour_search(&mut self, domain: Domain<N, f64>, cutoff: f64) -> Result<()> {
        let wrapped: Vec<_> = self
            .positions
            .iter()
            .map(|position| SVector::from(domain.wrap(<[f64; N]>::from(*position))))
            .collect();
        let grid = CellGrid::new(wrapped.iter().copied(), domain, cutoff)?;
        self.positions = wrapped;
        self.generation += 1;

        log::debug!(
            "initialised neighbour search: {} particles, cutoff {cutoff}, shape {:?}",
            self.len(),
            grid.shape()
        );
        self.search = Some(NeighbourSearch {
            grid,
            built_from: self.generation,
        });
        Ok(())
    }

    /// Rebuild the neighbour index from the current positions.
    pub fn rebuild_index(&mut self) -> Result<()> {
        let search = self.search.as_mut().ok_or(Error::NoNeighbourSearch)?;
        search.grid.rebuild_mut(self.positions.iter().copied(), None)?;
        search.built_from = self.generation;
        Ok(())
    }

    /// The neighbour index, if it reflects the current positions.
    pub(crate) fn current_grid(&self) -> Result<&PositionGrid<N>> {
        let search = self.search.as_ref().ok_or(Error::NoNeighbourSearch)?;
        if search.built_from != self.generation {
            return Err(Error::StaleIndex {
                index: search.built_from,
                positions: self.generation,
            });
        }
        Ok(&search.grid)
    }

    /// All `(j, position)` within the search cutoff of particle `i`, excluding `i` itself.
    ///
    /// Fails with [`Error::StaleIndex`] if positions changed since the last rebuild.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn neighbours(&self, i: usize) -> Result<NeighborIter<'_, SVector<f64, N>, N, f64>> {
        let grid = self.current_grid()?;
        let center = <[f64; N]>::from(self.positions[i]);
        Ok(NeighborIter::new(grid, center, grid.cutoff(), Some(i)))
    }

    /// Apply `statement` to every particle.
    ///
    /// All right-hand sides are evaluated before any value is written back,
    /// so reading the target variable inside the statement sees the old values only.
    /// Writes to the position are wrapped and increment the generation.
    pub fn evaluate(&mut self, statement: &Statement<N>) -> Result<()> {
        let values = statement.compute(self)?;
        self.commit(statement.target(), statement.op(), values)
    }

    /// Evaluate `expr` for the single particle `i`.
    pub fn evaluate_at(&self, expr: &Expr<N>, i: usize) -> Result<Value<N>> {
        expr.kind(self)?;
        if expr.has_reduction() {
            self.current_grid()?;
        }
        expr.eval(self, i)
    }

    fn commit(&mut self, target: &Symbol, op: Assign, values: Vec<Value<N>>) -> Result<()> {
        match target {
            Symbol::Position => {
                assign_vectors(&mut self.positions, op, &values)?;
                self.wrap_all();
                self.generation += 1;
                Ok(())
            }
            Symbol::Variable(name) => match self.column_mut(name)? {
                Column::Vector(column) => assign_vectors(column, op, &values),
                Column::Scalar(column) => {
                    for (x, value) in column.iter_mut().zip(&values) {
                        let value = value.as_scalar()?;
                        match op {
                            Assign::Set => *x = value,
                            Assign::Add => *x += value,
                        }
                    }
                    Ok(())
                }
            },
        }
    }

    /// Number of position changes so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation the neighbour index was built from.
    pub fn index_generation(&self) -> Option<u64> {
        self.search.as_ref().map(|search| search.built_from)
    }

    pub fn is_index_current(&self) -> bool {
        self.current_grid().is_ok()
    }

    pub fn domain(&self) -> Option<&Domain<N, f64>> {
        self.search.as_ref().map(|search| search.grid.domain())
    }

    pub fn cutoff(&self) -> Option<f64> {
        self.search.as_ref().map(|search| search.grid.cutoff())
    }

    /// The neighbour index, regardless of whether it is current.
    pub fn grid(&self) -> Option<&PositionGrid<N>> {
        self.search.as_ref().map(|search| &search.grid)
    }
}

fn assign_vectors<const N: usize>(
    column: &mut [SVector<f64, N>],
    op: Assign,
    values: &[Value<N>],
) -> Result<()> {
    for (x, value) in column.iter_mut().zip(values) {
        let value = value.as_vector()?;
        match op {
            Assign::Set => *x = value,
            Assign::Add => *x += value,
        }
    }
    Ok(())
}

fn kind_error(name: &str, expected: ValueKind, found: ValueKind) -> Error {
    Error::VariableKind {
        name: name.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cellgrid::generate_points_random;
    use nalgebra::Vector2;
    use proptest::prelude::*;

    #[test]
    fn test_declare_and_access() {
        let mut particles = Particles::<2>::new(3);
        particles.declare_vector("velocity").unwrap();
        particles.declare_scalar("mass").unwrap();

        assert_eq!(particles.variables().collect::<Vec<_>>(), ["velocity", "mass"]);
        assert_eq!(particles.vector("velocity").unwrap(), &[Vector2::zeros(); 3]);
        particles.scalar_mut("mass").unwrap()[1] = 2.0;
        assert_eq!(particles.scalar("mass").unwrap(), &[0.0, 2.0, 0.0]);

        assert_eq!(
            particles.declare_scalar("velocity"),
            Err(Error::DuplicateVariable("velocity".into()))
        );
        assert_eq!(
            particles.declare_vector(POSITION),
            Err(Error::DuplicateVariable(POSITION.into()))
        );
    }

    #[test]
    fn test_unknown_variable() {
        let mut particles = Particles::<3>::new(1);
        particles.declare_scalar("mass").unwrap();

        assert_eq!(
            particles.vector("velocity").err(),
            Some(Error::UnknownVariable("velocity".into()))
        );
        assert_eq!(
            particles.vector_mut("mass").err(),
            Some(Error::VariableKind {
                name: "mass".into(),
                expected: ValueKind::Vector,
                found: ValueKind::Scalar,
            })
        );
        assert_eq!(
            particles.kind_of(&Symbol::variable("charge")),
            Err(Error::UnknownVariable("charge".into()))
        );
    }

    #[test]
    fn test_push_and_resize() {
        let mut particles = Particles::<2>::new(1);
        particles.declare_scalar("mass").unwrap();
        assert_eq!(particles.push([0.5, 0.5]), 1);
        assert_eq!(particles.scalar("mass").unwrap().len(), 2);

        particles.resize(4);
        assert_eq!(particles.len(), 4);
        assert_eq!(particles.position(3), Vector2::zeros());
        particles.resize(1);
        assert_eq!(particles.scalar("mass").unwrap(), &[0.0]);
        assert_eq!(particles.generation(), 3);
    }

    #[test]
    fn test_init_wraps_positions() {
        let mut particles = Particles::<2>::new(0);
        particles.push([1.25, -0.25]);
        particles.push([0.5, 0.5]);
        particles.init_neighbour_search(Domain::unit(), 0.3).unwrap();

        assert_eq!(particles.position(0), Vector2::new(0.25, 0.75));
        assert!(particles.is_index_current());
        assert_eq!(particles.cutoff(), Some(0.3));
        assert_eq!(particles.grid().map(|grid| grid.shape()), Some([3, 3]));

        assert!(matches!(
            particles.init_neighbour_search(Domain::unit(), -1.0),
            Err(Error::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_stale_index() {
        let points: Vec<[f64; 2]> = generate_points_random(50, &Domain::unit(), Some(7));
        let mut particles = Particles::<2>::new(0);
        assert_eq!(particles.rebuild_index(), Err(Error::NoNeighbourSearch));
        points.iter().for_each(|p| {
            particles.push(*p);
        });
        assert!(matches!(particles.neighbours(0), Err(Error::NoNeighbourSearch)));

        particles.init_neighbour_search(Domain::unit(), 0.2).unwrap();
        let generation = particles.generation();
        assert!(particles.neighbours(0).is_ok());

        particles.update_positions(|_, p| p.x += 0.01);
        assert_eq!(
            particles.neighbours(0).err(),
            Some(Error::StaleIndex {
                index: generation,
                positions: generation + 1,
            })
        );
        assert!(!particles.is_index_current());

        particles.rebuild_index().unwrap();
        assert_eq!(particles.index_generation(), Some(particles.generation()));
        let grid = particles.grid().unwrap();
        let mut found: Vec<usize> = particles.neighbours(0).unwrap().map(|(j, _)| j).collect();
        found.sort();
        let expected: Vec<usize> = (1..particles.len())
            .filter(|&j| {
                grid.domain().distance_squared(
                    <[f64; 2]>::from(particles.position(0)),
                    <[f64; 2]>::from(particles.position(j)),
                ) <= 0.2 * 0.2
            })
            .collect();
        assert_eq!(found, expected);
    }

    proptest! {
        #[test]
        fn positions_stay_wrapped(x in -10.0..10.0f64, y in -10.0..10.0f64, dx in -3.0..3.0f64) {
            let mut particles = Particles::<2>::new(2);
            particles.init_neighbour_search(Domain::unit(), 0.25).unwrap();

            particles.set_position(0, [x, y]);
            particles.update_positions(|_, p| p.y += dx);
            particles.push([y, x]);

            let domain = particles.domain().unwrap();
            for p in particles.positions() {
                prop_assert!(domain.contains(<[f64; 2]>::from(*p)), "{p:?}");
            }
        }
    }
}
