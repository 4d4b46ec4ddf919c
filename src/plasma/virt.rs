use crate::{Float, Sim};

/// Precomputed interpolation table that expands the coarse macro-particle
/// ensemble into the dense fine lattice of virtual particles.
///
/// Per fine-lattice axis position it stores the bracketing coarse indices
/// and, per fine point, the four bilinear corner weights. The weights only
/// depend on the two lattices, so the table is built once and shared by
/// every deposition pass.
pub struct VirtTable {
    pub fine_grid: Vec<Float>,
    pub indices_prev: Vec<usize>,
    pub indices_next: Vec<usize>,
    pub a_weights: Vec<Float>,
    pub b_weights: Vec<Float>,
    pub c_weights: Vec<Float>,
    pub d_weights: Vec<Float>,
}

impl VirtTable {
    #[inline(always)]
    pub fn fine_len(&self) -> usize {
        self.fine_grid.len()
    }
}

/// Coarse lattice positions along one axis: every coarseness-th cell
/// center, mirrored about the axis so the single zero point is not
/// duplicated.
pub(crate) fn make_coarse_grid(steps: usize, step_size: Float, coarseness: usize) -> Vec<Float> {
    let half = steps / (2 * coarseness);
    let plasma_step = step_size * coarseness as Float;
    let mut grid = Vec::with_capacity(2 * half - 1);
    for i in (1..half).rev() {
        grid.push(-(i as Float) * plasma_step);
    }
    for i in 0..half {
        grid.push(i as Float * plasma_step);
    }
    grid
}

/// Fine lattice positions along one axis. An odd fineness keeps a point on
/// the axis; an even fineness straddles it by half a fine step.
pub(crate) fn make_fine_grid(steps: usize, step_size: Float, fineness: usize) -> Vec<Float> {
    let half = (steps / 2) * fineness;
    let fine_step = step_size / fineness as Float;
    let mut grid = Vec::with_capacity(2 * half);
    if fineness % 2 == 1 {
        for i in (1..half).rev() {
            grid.push(-(i as Float) * fine_step);
        }
        for i in 0..half {
            grid.push(i as Float * fine_step);
        }
    } else {
        for i in (0..half).rev() {
            grid.push(-(0.5 + i as Float) * fine_step);
        }
        for i in 0..half {
            grid.push((0.5 + i as Float) * fine_step);
        }
    }
    grid
}

pub(crate) fn make_table(sim: &Sim, coarse_grid: &[Float]) -> VirtTable {
    let steps = sim.grid_steps - 2 * sim.plasma_padding_steps;
    let fine_grid = make_fine_grid(steps, sim.grid_step_size, sim.plasma_fineness);
    let nc = coarse_grid.len();
    let nf = fine_grid.len();
    let coarse_step = sim.grid_step_size * sim.plasma_coarseness as Float;

    let mut indices_prev = vec![0; nf];
    let mut indices_next = vec![0; nf];
    let mut influence_prev = vec![0.0; nf];
    let mut influence_next = vec![0.0; nf];
    for (k, &f) in fine_grid.iter().enumerate() {
        // partition_point matches numpy searchsorted with side='left'
        let idx = coarse_grid.partition_point(|&c| c < f);
        let next = idx.min(nc - 1);
        let prev = idx.saturating_sub(1).min(nc - 1);
        let mut w_prev = (coarse_grid[next] - f) / coarse_step;
        let mut w_next = (f - coarse_grid[prev]) / coarse_step;
        // Fine points outside the coarse lattice borrow everything from
        // the nearest edge particle.
        if f <= coarse_grid[0] {
            w_prev = 0.0;
            w_next = 1.0;
        }
        if f >= coarse_grid[nc - 1] {
            w_prev = 1.0;
            w_next = 0.0;
        }
        indices_prev[k] = prev;
        indices_next[k] = next;
        influence_prev[k] = w_prev;
        influence_next[k] = w_next;
    }

    let mut a_weights = vec![0.0; nf * nf];
    let mut b_weights = vec![0.0; nf * nf];
    let mut c_weights = vec![0.0; nf * nf];
    let mut d_weights = vec![0.0; nf * nf];
    for pi in 0..nf {
        for pj in 0..nf {
            let ind = pi * nf + pj;
            a_weights[ind] = influence_prev[pi] * influence_prev[pj];
            b_weights[ind] = influence_next[pi] * influence_prev[pj];
            c_weights[ind] = influence_prev[pi] * influence_next[pj];
            d_weights[ind] = influence_next[pi] * influence_next[pj];
        }
    }

    VirtTable {
        fine_grid,
        indices_prev,
        indices_next,
        a_weights,
        b_weights,
        c_weights,
        d_weights,
    }
}
