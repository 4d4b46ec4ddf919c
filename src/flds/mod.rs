pub mod field;
pub(crate) mod fft;
mod dirichlet;
mod mixed;

use crate::{Float, Sim};
use dirichlet::DirichletSolver;
use field::Field;
use mixed::MixedSolver;

enum Axis {
    X,
    Y,
}

/// The field bundle the particles are pushed against: the previous slice's
/// fields on the first predictor pass, halfway averages afterwards. Bz is
/// not modeled and the pusher takes it as zero.
pub struct AvgFlds {
    pub ex: Field,
    pub ey: Field,
    pub ez: Field,
    pub bx: Field,
    pub by: Field,
}

impl AvgFlds {
    pub fn new(sim: &Sim) -> AvgFlds {
        AvgFlds {
            ex: Field::new(sim),
            ey: Field::new(sim),
            ez: Field::new(sim),
            bx: Field::new(sim),
            by: Field::new(sim),
        }
    }
}

/// Owns the two boundary-value solvers plus the shared right hand side
/// scratch, and derives each field's source terms from the deposited
/// charge and currents.
pub struct Flds {
    mixed: MixedSolver,
    dirichlet: DirichletSolver,
    rhs: Field,
}

impl Flds {
    pub fn new(sim: &Sim) -> Flds {
        Flds {
            mixed: MixedSolver::new(sim),
            dirichlet: DirichletSolver::new(sim),
            rhs: Field::new(sim),
        }
    }

    /// Solves the four transverse fields from the freshly deposited
    /// ro/jx/jy/jz. The previous slice's jx/jy provide the xi derivative
    /// terms and `sub` carries the fields scaled into the right hand side
    /// by the subtraction trick.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_transverse(
        &mut self,
        sim: &Sim,
        sub: &AvgFlds,
        beam_ro: &Field,
        ro: &Field,
        jx: &Field,
        jy: &Field,
        jz: &Field,
        jx_prev: &Field,
        jy_prev: &Field,
        ex: &mut Field,
        ey: &mut Field,
        bx: &mut Field,
        by: &mut Field,
    ) {
        // Ex: -d(ro + beam)/dx + d(jx)/dxi + s * Ex_sub
        assemble_transverse_rhs(
            &mut self.rhs,
            sim,
            ro,
            beam_ro,
            Axis::X,
            -1.0,
            jx,
            jx_prev,
            1.0,
            &sub.ex,
        );
        self.mixed.solve_transposed(&self.rhs, ex);
        #[cfg(feature = "selfcheck")]
        check_residual("Ex", sim, &self.rhs, ex, sim.subtraction_trick);

        // Ey: -d(ro + beam)/dy + d(jy)/dxi + s * Ey_sub
        assemble_transverse_rhs(
            &mut self.rhs,
            sim,
            ro,
            beam_ro,
            Axis::Y,
            -1.0,
            jy,
            jy_prev,
            1.0,
            &sub.ey,
        );
        self.mixed.solve(&self.rhs, ey);
        #[cfg(feature = "selfcheck")]
        check_residual("Ey", sim, &self.rhs, ey, sim.subtraction_trick);

        // Bx: +d(jz + beam)/dy - d(jy)/dxi + s * Bx_sub
        assemble_transverse_rhs(
            &mut self.rhs,
            sim,
            jz,
            beam_ro,
            Axis::Y,
            1.0,
            jy,
            jy_prev,
            -1.0,
            &sub.bx,
        );
        self.mixed.solve(&self.rhs, bx);
        #[cfg(feature = "selfcheck")]
        check_residual("Bx", sim, &self.rhs, bx, sim.subtraction_trick);

        // By: -d(jz + beam)/dx + d(jx)/dxi + s * By_sub
        assemble_transverse_rhs(
            &mut self.rhs,
            sim,
            jz,
            beam_ro,
            Axis::X,
            -1.0,
            jx,
            jx_prev,
            1.0,
            &sub.by,
        );
        self.mixed.solve_transposed(&self.rhs, by);
        #[cfg(feature = "selfcheck")]
        check_residual("By", sim, &self.rhs, by, sim.subtraction_trick);
    }

    /// Solves Ez from the transverse current divergence.
    pub fn solve_longitudinal(&mut self, sim: &Sim, jx: &Field, jy: &Field, ez: &mut Field) {
        assemble_longitudinal_rhs(&mut self.rhs, sim, jx, jy);
        self.dirichlet.solve(&self.rhs, ez);
        #[cfg(feature = "selfcheck")]
        check_residual("Ez", sim, &self.rhs, ez, 0.0);
    }
}

/// Builds one transverse right hand side: a centered difference of
/// src + beam along the given axis (zero at that axis' edges), the xi
/// derivative of the matching current and the subtracted field term.
#[allow(clippy::too_many_arguments)]
fn assemble_transverse_rhs(
    rhs: &mut Field,
    sim: &Sim,
    src: &Field,
    beam_ro: &Field,
    axis: Axis,
    diff_sign: Float,
    jk: &Field,
    jk_prev: &Field,
    dxi_sign: Float,
    sub: &Field,
) {
    let n = sim.grid_steps;
    let double_h = 2.0 * sim.grid_step_size;
    let xi_step = sim.xi_step_size;
    let s = sim.subtraction_trick;
    if !cfg!(feature = "unchecked") {
        assert_eq!(rhs.vals.len(), n * n);
        assert_eq!(src.vals.len(), n * n);
        assert_eq!(beam_ro.vals.len(), n * n);
        assert_eq!(jk.vals.len(), n * n);
        assert_eq!(jk_prev.vals.len(), n * n);
        assert_eq!(sub.vals.len(), n * n);
    }
    for i in 0..n {
        for j in 0..n {
            let ind = i * n + j;
            let diff = match axis {
                Axis::X => {
                    if i > 0 && i < n - 1 {
                        (src.vals[ind + n] + beam_ro.vals[ind + n]
                            - src.vals[ind - n]
                            - beam_ro.vals[ind - n])
                            / double_h
                    } else {
                        0.0
                    }
                }
                Axis::Y => {
                    if j > 0 && j < n - 1 {
                        (src.vals[ind + 1] + beam_ro.vals[ind + 1]
                            - src.vals[ind - 1]
                            - beam_ro.vals[ind - 1])
                            / double_h
                    } else {
                        0.0
                    }
                }
            };
            let dxi = (jk_prev.vals[ind] - jk.vals[ind]) / xi_step;
            rhs.vals[ind] = diff_sign * diff + dxi_sign * dxi + s * sub.vals[ind];
        }
    }
}

/// Ez right hand side: minus the transverse current divergence, interior
/// points only.
fn assemble_longitudinal_rhs(rhs: &mut Field, sim: &Sim, jx: &Field, jy: &Field) {
    let n = sim.grid_steps;
    let double_h = 2.0 * sim.grid_step_size;
    if !cfg!(feature = "unchecked") {
        assert_eq!(rhs.vals.len(), n * n);
        assert_eq!(jx.vals.len(), n * n);
        assert_eq!(jy.vals.len(), n * n);
    }
    rhs.zero();
    for i in 1..n - 1 {
        for j in 1..n - 1 {
            let ind = i * n + j;
            rhs.vals[ind] = -((jx.vals[ind + n] - jx.vals[ind - n])
                + (jy.vals[ind + 1] - jy.vals[ind - 1]))
                / double_h;
        }
    }
}

/// Development-build check: the solved field must satisfy the five-point
/// stencil of the equation it came from. Reported on stderr, never fatal.
#[cfg(feature = "selfcheck")]
fn check_residual(tag: &str, sim: &Sim, rhs: &Field, out: &Field, s: Float) {
    let n = sim.grid_steps;
    let h2 = sim.grid_step_size * sim.grid_step_size;
    let mut max_res: Float = 0.0;
    let mut scale: Float = 0.0;
    for i in 1..n - 1 {
        for j in 1..n - 1 {
            let ij = i * n + j;
            let res = out.vals[ij - n] + out.vals[ij + n] + out.vals[ij - 1] + out.vals[ij + 1]
                - (4.0 + s * h2) * out.vals[ij]
                + h2 * rhs.vals[ij];
            max_res = max_res.max(res.abs());
            scale = scale.max(out.vals[ij].abs());
        }
    }
    let tol = 1e-3 * (scale + 1.0);
    if max_res > tol {
        eprintln!("{} solve residual {:.3e} over tolerance {:.3e}", tag, max_res, tol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_test_sim, E_TOL};

    #[test]
    fn quiet_plasma_keeps_zero_fields() {
        // No beam, no currents, no previous fields: every right hand side
        // vanishes and so must every solved field.
        let sim = build_test_sim();
        let mut flds = Flds::new(&sim);
        let sub = AvgFlds::new(&sim);
        let zero = Field::new(&sim);
        let mut ex = Field::new(&sim);
        let mut ey = Field::new(&sim);
        let mut ez = Field::new(&sim);
        let mut bx = Field::new(&sim);
        let mut by = Field::new(&sim);
        flds.solve_transverse(
            &sim, &sub, &zero, &zero, &zero, &zero, &zero, &zero, &zero, &mut ex, &mut ey,
            &mut bx, &mut by,
        );
        flds.solve_longitudinal(&sim, &zero, &zero, &mut ez);
        for fld in [&ex, &ey, &ez, &bx, &by].iter() {
            for &v in fld.vals.iter() {
                assert!(v.abs() < E_TOL);
            }
        }
    }

    #[test]
    fn centered_beam_drives_antisymmetric_fields() {
        // A radially symmetric beam must produce transverse fields that are
        // odd along their own axis and even along the other one. This pins
        // down the axis orientation of all four solves.
        let sim = build_test_sim();
        let n = sim.grid_steps;
        let h = sim.grid_step_size;
        let mut flds = Flds::new(&sim);
        let sub = AvgFlds::new(&sim);
        let zero = Field::new(&sim);
        let mut beam_ro = Field::new(&sim);
        for i in 0..n {
            for j in 0..n {
                let x = (i as Float - (n / 2) as Float) * h;
                let y = (j as Float - (n / 2) as Float) * h;
                beam_ro.vals[i * n + j] = 0.05 * (-0.5 * (x * x + y * y) / 0.04).exp();
            }
        }
        let mut ex = Field::new(&sim);
        let mut ey = Field::new(&sim);
        let mut bx = Field::new(&sim);
        let mut by = Field::new(&sim);
        flds.solve_transverse(
            &sim, &sub, &beam_ro, &zero, &zero, &zero, &zero, &zero, &zero, &mut ex, &mut ey,
            &mut bx, &mut by,
        );

        let vmax = ex
            .vals
            .iter()
            .fold(0.0 as Float, |acc, &v| acc.max(v.abs()));
        assert!(vmax > 1e-7);
        let tol = E_TOL * vmax.max(1.0);
        for i in 0..n {
            for j in 0..n {
                let ind = i * n + j;
                // odd in x, even in y
                assert!((ex.vals[ind] + ex.vals[(n - 1 - i) * n + j]).abs() < tol);
                assert!((ex.vals[ind] - ex.vals[i * n + (n - 1 - j)]).abs() < tol);
                assert!((by.vals[ind] + by.vals[(n - 1 - i) * n + j]).abs() < tol);
                // odd in y, even in x
                assert!((ey.vals[ind] + ey.vals[i * n + (n - 1 - j)]).abs() < tol);
                assert!((ey.vals[ind] - ey.vals[(n - 1 - i) * n + j]).abs() < tol);
                assert!((bx.vals[ind] + bx.vals[i * n + (n - 1 - j)]).abs() < tol);
            }
        }
    }

    #[test]
    fn longitudinal_rhs_skips_boundary() {
        let sim = build_test_sim();
        let n = sim.grid_steps;
        let mut rhs = Field::new(&sim);
        let mut jx = Field::new(&sim);
        let jy = Field::new(&sim);
        for (k, v) in jx.vals.iter_mut().enumerate() {
            *v = k as Float;
        }
        assemble_longitudinal_rhs(&mut rhs, &sim, &jx, &jy);
        for i in 0..n {
            assert_eq!(rhs.vals[i], 0.0);
            assert_eq!(rhs.vals[(n - 1) * n + i], 0.0);
            assert_eq!(rhs.vals[i * n], 0.0);
            assert_eq!(rhs.vals[i * n + n - 1], 0.0);
        }
        // Interior: jx rises by n per x step, so the rhs is -2n / (2h) = -n / h.
        let expected = -(n as Float) / sim.grid_step_size;
        for i in 1..n - 1 {
            for j in 1..n - 1 {
                assert!((rhs.vals[i * n + j] - expected).abs() < E_TOL * expected.abs());
            }
        }
    }
}
