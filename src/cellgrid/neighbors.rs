// In order to enumerate all neighboring cells of a cell in N dimensions
// we iterate through the 3^N block centered around that cell.
// Each offset coordinate is a balanced trit (-1, 0, 1), so counting from [-1; N] to [1; N]
// in balanced ternary (first trit least significant) visits the block in raster order,
// first axis fastest.
// This is equivalent to the cartesian product (-1, 0, 1)^N but const generic and allocation-free.
use core::iter::FusedIterator;
use core::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(i8)]
enum BalancedTrit {
    Negative = -1,
    #[default]
    Zero = 0,
    Positive = 1,
}

impl Add for BalancedTrit {
    // Carrying trit, actual trit
    type Output = (Self, Self);

    fn add(self, rhs: Self) -> Self::Output {
        use BalancedTrit::{Negative, Positive, Zero};
        match (self, rhs) {
            (Positive, Negative) | (Negative, Positive) => (Zero, Zero),
            (Positive, Positive) => (Positive, Negative),
            (Negative, Negative) => (Negative, Positive),
            (Zero, val) | (val, Zero) => (Zero, val),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BalancedTernary<const N: usize>([BalancedTrit; N]);

impl<const N: usize> BalancedTernary<N> {
    const MAX: BalancedTernary<N> = BalancedTernary([BalancedTrit::Positive; N]);
    const MIN: BalancedTernary<N> = BalancedTernary([BalancedTrit::Negative; N]);

    fn to_offset(self) -> [i32; N] {
        self.0.map(|trit| trit as i32)
    }
}

// note that this wraps around from MAX to MIN (the final carry is dropped)
impl<const N: usize> AddAssign<BalancedTrit> for BalancedTernary<N> {
    fn add_assign(&mut self, rhs: BalancedTrit) {
        let mut carry = rhs;
        self.0.iter_mut().for_each(|trit| {
            (carry, *trit) = carry + *trit;
        });
    }
}

/// Iterates over all `3^N` relative cell offsets in `(-1..=1)^N`, including `[0; N]`,
/// in raster order (first axis fastest).
#[derive(Debug, Clone, Copy)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct RelativeNeighborIndices<const N: usize> {
    state: Option<BalancedTernary<N>>,
}

impl<const N: usize> RelativeNeighborIndices<N> {
    pub(crate) fn full_space() -> Self {
        Self {
            state: Some(BalancedTernary::MIN),
        }
    }
}

impl<const N: usize> Iterator for RelativeNeighborIndices<N> {
    type Item = [i32; N];

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.state?;
        self.state = if current == BalancedTernary::MAX {
            None
        } else {
            let mut next = current;
            next += BalancedTrit::Positive;
            Some(next)
        };
        Some(current.to_offset())
    }
}

impl<const N: usize> FusedIterator for RelativeNeighborIndices<N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trit_addition() {
        use BalancedTrit::*;
        assert_eq!(Positive + Positive, (Positive, Negative));
        assert_eq!(Negative + Negative, (Negative, Positive));
        assert_eq!(Positive + Negative, (Zero, Zero));
        assert_eq!(Zero + Negative, (Zero, Negative));
    }

    #[test]
    fn test_full_space_2d() {
        let offsets: Vec<_> = RelativeNeighborIndices::<2>::full_space().collect();
        assert_eq!(
            offsets,
            vec![
                [-1, -1],
                [0, -1],
                [1, -1],
                [-1, 0],
                [0, 0],
                [1, 0],
                [-1, 1],
                [0, 1],
                [1, 1]
            ]
        );
    }

    #[test]
    fn test_full_space_3d() {
        let offsets: Vec<_> = RelativeNeighborIndices::<3>::full_space().collect();
        assert_eq!(offsets.len(), 27);
        assert_eq!(offsets[13], [0, 0, 0]);
        assert_eq!(offsets.last(), Some(&[1, 1, 1]));

        let mut sorted = offsets.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 27, "offsets should be unique");
    }
}
