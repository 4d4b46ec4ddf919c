use crate::flds::field::Field;
use crate::flds::{AvgFlds, Flds};
use crate::plasma::deposit::{deposit, initial_deposition};
use crate::plasma::virt::VirtTable;
use crate::plasma::{self, Motion, Plasma};
use crate::{Float, Sim};

/// Everything one xi slice hands to the next: the plasma state plus the
/// fields and sources on the grid. Bz is carried for completeness but the
/// model never drives it away from zero.
pub struct SliceState {
    pub motion: Motion,
    pub ex: Field,
    pub ey: Field,
    pub ez: Field,
    pub bx: Field,
    pub by: Field,
    pub bz: Field,
    pub ro: Field,
    pub jx: Field,
    pub jy: Field,
    pub jz: Field,
}

impl SliceState {
    pub fn zeroed(sim: &Sim, plasma: &Plasma) -> SliceState {
        SliceState {
            motion: Motion::zeroed(plasma.count()),
            ex: Field::new(sim),
            ey: Field::new(sim),
            ez: Field::new(sim),
            bx: Field::new(sim),
            by: Field::new(sim),
            bz: Field::new(sim),
            ro: Field::new(sim),
            jx: Field::new(sim),
            jy: Field::new(sim),
            jz: Field::new(sim),
        }
    }
}

/// Advances the plasma from one xi slice to the next with a fixed
/// three-push predictor-corrector: push through the previous fields,
/// solve, push through the halfway fields, solve again, then one closing
/// push and deposit. No convergence test, the pass count is part of the
/// scheme.
pub struct Stepper {
    flds: Flds,
    ro_initial: Field,
    avg: AvgFlds,
    est_x: Vec<Float>,
    est_y: Vec<Float>,
}

impl Stepper {
    pub fn new(sim: &Sim, plasma: &Plasma, virt: &VirtTable) -> Stepper {
        Stepper {
            flds: Flds::new(sim),
            ro_initial: initial_deposition(sim, plasma, virt),
            avg: AvgFlds::new(sim),
            est_x: vec![0.0; plasma.count()],
            est_y: vec![0.0; plasma.count()],
        }
    }

    /// The density of the immobile ion background.
    pub fn ro_initial(&self) -> &Field {
        &self.ro_initial
    }

    pub fn step(
        &mut self,
        sim: &Sim,
        plasma: &Plasma,
        virt: &VirtTable,
        beam_ro: &Field,
        prev: &SliceState,
    ) -> SliceState {
        let mut new = SliceState::zeroed(sim, plasma);

        plasma::move_estimate(
            sim,
            plasma,
            &prev.motion,
            &mut self.est_x,
            &mut self.est_y,
        );

        // The first pass pushes through the fields of the previous slice.
        self.avg.ex.copy_from(&prev.ex);
        self.avg.ey.copy_from(&prev.ey);
        self.avg.ez.copy_from(&prev.ez);
        self.avg.bx.copy_from(&prev.bx);
        self.avg.by.copy_from(&prev.by);

        for _ in 0..2 {
            // Every push restarts from the previous slice, only the
            // position estimate and the fields improve between passes.
            plasma::move_smart(
                sim,
                plasma,
                &prev.motion,
                &self.est_x,
                &self.est_y,
                &self.avg,
                &mut new.motion,
            );
            deposit(
                sim,
                plasma,
                virt,
                &new.motion,
                &self.ro_initial,
                &mut new.ro,
                &mut new.jx,
                &mut new.jy,
                &mut new.jz,
            );
            self.flds.solve_transverse(
                sim,
                &self.avg,
                beam_ro,
                &new.ro,
                &new.jx,
                &new.jy,
                &new.jz,
                &prev.jx,
                &prev.jy,
                &mut new.ex,
                &mut new.ey,
                &mut new.bx,
                &mut new.by,
            );
            self.flds.solve_longitudinal(sim, &new.jx, &new.jy, &mut new.ez);

            self.avg.ex.half_sum_of(&prev.ex, &new.ex);
            self.avg.ey.half_sum_of(&prev.ey, &new.ey);
            self.avg.ez.half_sum_of(&prev.ez, &new.ez);
            self.avg.bx.half_sum_of(&prev.bx, &new.bx);
            self.avg.by.half_sum_of(&prev.by, &new.by);
            self.est_x.copy_from_slice(&new.motion.x_offt);
            self.est_y.copy_from_slice(&new.motion.y_offt);
        }

        // Closing push through the last halfway fields, then the deposit
        // that the next slice differentiates in xi. The stored fields stay
        // the ones of the second solve.
        plasma::move_smart(
            sim,
            plasma,
            &prev.motion,
            &self.est_x,
            &self.est_y,
            &self.avg,
            &mut new.motion,
        );
        deposit(
            sim,
            plasma,
            virt,
            &new.motion,
            &self.ro_initial,
            &mut new.ro,
            &mut new.jx,
            &mut new.jy,
            &mut new.jz,
        );
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_test_sim, E_TOL};

    #[test]
    fn quiet_start_stays_quiet() {
        let sim = build_test_sim();
        let (plasma, virt) = plasma::make(&sim);
        let mut stepper = Stepper::new(&sim, &plasma, &virt);
        let prev = SliceState::zeroed(&sim, &plasma);
        let beam_ro = Field::new(&sim);
        let state = stepper.step(&sim, &plasma, &virt, &beam_ro, &prev);
        for k in 0..state.ro.size() {
            assert!(state.ro.vals[k].abs() < E_TOL);
            assert!(state.jz.vals[k].abs() < E_TOL);
            assert!(state.ex.vals[k].abs() < E_TOL);
            assert!(state.ey.vals[k].abs() < E_TOL);
            assert!(state.ez.vals[k].abs() < E_TOL);
            assert!(state.bx.vals[k].abs() < E_TOL);
            assert!(state.by.vals[k].abs() < E_TOL);
            assert!(state.bz.vals[k] == 0.0);
        }
        for k in 0..plasma.count() {
            assert!(state.motion.x_offt[k].abs() < E_TOL);
            assert!(state.motion.y_offt[k].abs() < E_TOL);
            assert!(state.motion.px[k].abs() < E_TOL);
        }
    }

    #[test]
    fn beam_slice_starts_a_wake() {
        let sim = build_test_sim();
        let (plasma, virt) = plasma::make(&sim);
        let mut stepper = Stepper::new(&sim, &plasma, &virt);
        let prev = SliceState::zeroed(&sim, &plasma);

        let n = sim.grid_steps;
        let h = sim.grid_step_size;
        let mut beam_ro = Field::new(&sim);
        for i in 0..n {
            for j in 0..n {
                let x = (i as isize - (n / 2) as isize) as Float * h;
                let y = (j as isize - (n / 2) as isize) as Float * h;
                beam_ro.vals[i * n + j] = (-0.5 * (x * x + y * y) / (0.1 * 0.1)).exp();
            }
        }

        let state = stepper.step(&sim, &plasma, &virt, &beam_ro, &prev);
        let max_ex = state.ex.vals.iter().fold(0.0 as Float, |a, v| a.max(v.abs()));
        let max_ez = state.ez.vals.iter().fold(0.0 as Float, |a, v| a.max(v.abs()));
        let max_px = state.motion.px.iter().fold(0.0 as Float, |a, v| a.max(v.abs()));
        // the beam deflects the plasma on the first slice already
        assert!(max_ex > 1e-6);
        assert!(max_ez > 1e-8);
        assert!(max_px > 1e-8);
        for v in state.ex.vals.iter().chain(state.ez.vals.iter()) {
            assert!(v.is_finite());
        }
    }
}
