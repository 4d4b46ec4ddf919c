use crate::{Float, Sim};
use itertools::izip;

/// A position on the transverse grid. The first grid axis is called x and
/// indexes rows, the second axis is called y and indexes columns.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) struct FieldDim {
    pub(crate) size: usize,
}

impl FieldDim {
    #[inline(always)]
    pub fn get_index(&self, pos: Pos) -> usize {
        // Convenience method to get a position in the array.
        // Using a 1d vec to represent a square 2D array for speed.
        // Here is the layout if it were a 2d array,
        // with the 1D vec position in []
        // ----------------------------------
        // |   [0]    |   [1]    |   [2]    |
        // |  row: 0  |  row: 0  |  row: 0  |
        // |  col: 0  |  col: 1  |  col: 2  |
        // |          |          |          |
        // ----------------------------------
        // |   [3]    |   [4]    |   [5]    |
        // |  row: 1  |  row: 1  |  row: 1  |
        // |  col: 0  |  col: 1  |  col: 2  |
        // |          |          |          |
        // ----------------------------------
        // |   [6]    |   [7]    |   [8]    |
        // |  row: 2  |  row: 2  |  row: 2  |
        // |  col: 0  |  col: 1  |  col: 2  |
        // |          |          |          |
        // ----------------------------------

        if !cfg!(feature = "unchecked") {
            assert!(pos.row < self.size);
            assert!(pos.col < self.size);
        }

        pos.row * self.size + pos.col
    }
}

/// One scalar quantity on the transverse grid: a charge density, a current
/// component or a field component.
pub struct Field {
    pub vals: Vec<Float>,
    pub(crate) dim: FieldDim,
}

impl Field {
    pub fn new(sim: &Sim) -> Field {
        Field {
            vals: vec![0.0; sim.grid_steps * sim.grid_steps],
            dim: FieldDim {
                size: sim.grid_steps,
            },
        }
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.dim.size
    }

    #[inline(always)]
    pub fn get(&self, pos: Pos) -> Float {
        let ind = self.dim.get_index(pos);
        if !cfg!(feature = "unchecked") {
            assert!(ind < self.vals.len());
        }
        unsafe { *self.vals.get_unchecked(ind) }
    }

    #[inline(always)]
    pub fn set(&mut self, pos: Pos, val: Float) {
        let ind = self.dim.get_index(pos);
        if !cfg!(feature = "unchecked") {
            assert!(ind < self.vals.len());
        }
        unsafe {
            *self.vals.get_unchecked_mut(ind) = val;
        }
    }

    pub fn zero(&mut self) {
        for v in self.vals.iter_mut() {
            *v = 0.0;
        }
    }

    pub fn copy_from(&mut self, other: &Field) {
        if !cfg!(feature = "unchecked") {
            assert!(self.vals.len() == other.vals.len());
        }
        self.vals.copy_from_slice(&other.vals);
    }

    /// Overwrites self with the halfway point between two fields,
    /// 0.5 * (a + b).
    pub fn half_sum_of(&mut self, a: &Field, b: &Field) {
        if !cfg!(feature = "unchecked") {
            assert!(self.vals.len() == a.vals.len());
            assert!(self.vals.len() == b.vals.len());
        }
        for (v, &va, &vb) in izip!(self.vals.iter_mut(), a.vals.iter(), b.vals.iter()) {
            *v = 0.5 * (va + vb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_test_sim, E_TOL};

    #[test]
    fn field_index_is_row_major() {
        let dim = FieldDim { size: 5 };
        assert_eq!(dim.get_index(Pos { row: 0, col: 0 }), 0);
        assert_eq!(dim.get_index(Pos { row: 0, col: 4 }), 4);
        assert_eq!(dim.get_index(Pos { row: 1, col: 0 }), 5);
        assert_eq!(dim.get_index(Pos { row: 3, col: 2 }), 17);
        assert_eq!(dim.get_index(Pos { row: 4, col: 4 }), 24);
    }

    #[test]
    fn field_get_set_roundtrip() {
        let sim = build_test_sim();
        let mut fld = Field::new(&sim);
        assert_eq!(fld.vals.len(), sim.grid_steps * sim.grid_steps);
        let pos = Pos { row: 3, col: 11 };
        fld.set(pos, 2.5);
        assert!((fld.get(pos) - 2.5).abs() < E_TOL);
        assert!((fld.vals[3 * sim.grid_steps + 11] - 2.5).abs() < E_TOL);
    }

    #[test]
    fn field_half_sum() {
        let sim = build_test_sim();
        let mut a = Field::new(&sim);
        let mut b = Field::new(&sim);
        let mut c = Field::new(&sim);
        for (k, (va, vb)) in a.vals.iter_mut().zip(b.vals.iter_mut()).enumerate() {
            *va = k as Float;
            *vb = -3.0 * k as Float;
        }
        c.half_sum_of(&a, &b);
        for (k, &vc) in c.vals.iter().enumerate() {
            assert!((vc - (-(k as Float))).abs() < E_TOL);
        }
    }
}
