use super::virt::VirtTable;
use super::{Motion, Plasma};
use crate::flds::field::Field;
use crate::{Float, Sim};
use itertools::izip;
use rayon::prelude::*;
use strength_reduce::StrengthReducedUsize;

/// Per-thread deposition target. Rayon folds virtual particles into one
/// of these per worker and then merges them pairwise, which keeps the
/// scatter free of write races without any atomics.
struct DepositAcc {
    ro: Vec<Float>,
    jx: Vec<Float>,
    jy: Vec<Float>,
    jz: Vec<Float>,
}

impl DepositAcc {
    fn new(cells: usize) -> DepositAcc {
        DepositAcc {
            ro: vec![0.0; cells],
            jx: vec![0.0; cells],
            jy: vec![0.0; cells],
            jz: vec![0.0; cells],
        }
    }

    fn merge(mut self, other: DepositAcc) -> DepositAcc {
        for (a, b) in izip!(self.ro.iter_mut(), &other.ro) {
            *a += b;
        }
        for (a, b) in izip!(self.jx.iter_mut(), &other.jx) {
            *a += b;
        }
        for (a, b) in izip!(self.jy.iter_mut(), &other.jy) {
            *a += b;
        }
        for (a, b) in izip!(self.jz.iter_mut(), &other.jz) {
            *a += b;
        }
        self
    }
}

/// Expands the coarse ensemble into virtual particles on the fine lattice
/// and scatters their charge and current onto the grid. The neutralizing
/// background is added to ro after all electrons are in.
#[allow(clippy::too_many_arguments)]
pub fn deposit(
    sim: &Sim,
    plasma: &Plasma,
    virt: &VirtTable,
    motion: &Motion,
    ro_initial: &Field,
    ro: &mut Field,
    jx: &mut Field,
    jy: &mut Field,
    jz: &mut Field,
) {
    let n = sim.grid_steps;
    let h = sim.grid_step_size;
    let nc = plasma.nc;
    let nf = virt.fine_len();
    let smallness = sim.smallness_factor;
    let half = (n / 2) as isize;

    // get direct pointers to avoid unnecessary lookups
    let x_offt = &motion.x_offt[..];
    let y_offt = &motion.y_offt[..];
    let pxs = &motion.px[..];
    let pys = &motion.py[..];
    let pzs = &motion.pz[..];
    let ms = &plasma.m[..];
    let qs = &plasma.q[..];
    let fine_grid = &virt.fine_grid[..];
    let indices_prev = &virt.indices_prev[..];
    let indices_next = &virt.indices_next[..];
    let a_weights = &virt.a_weights[..];
    let b_weights = &virt.b_weights[..];
    let c_weights = &virt.c_weights[..];
    let d_weights = &virt.d_weights[..];

    let count = plasma.count();
    if !cfg!(feature = "unchecked") {
        assert_eq!(x_offt.len(), count);
        assert_eq!(y_offt.len(), count);
        assert_eq!(pxs.len(), count);
        assert_eq!(pys.len(), count);
        assert_eq!(pzs.len(), count);
        assert_eq!(ms.len(), count);
        assert_eq!(qs.len(), count);
        assert_eq!(indices_prev.len(), nf);
        assert_eq!(indices_next.len(), nf);
        assert_eq!(a_weights.len(), nf * nf);
        assert_eq!(b_weights.len(), nf * nf);
        assert_eq!(c_weights.len(), nf * nf);
        assert_eq!(d_weights.len(), nf * nf);
        assert!(indices_prev.iter().all(|&c| c < nc));
        assert!(indices_next.iter().all(|&c| c < nc));
    }

    let nf_red = StrengthReducedUsize::new(nf);

    let acc = (0..nf * nf)
        .into_par_iter()
        .fold(
            || DepositAcc::new(n * n),
            |mut acc, pk| {
                let pi = pk / nf_red;
                let pj = pk % nf_red;

                // Bilinear gather from the four bracketing coarse
                // particles. Offsets come in unscaled, everything carried
                // by the particle shrinks by the smallness factor.
                let (x, y, m, q, px, py, pz);
                // safe because the index arrays were asserted to point
                // inside the coarse ensemble
                unsafe {
                    let wa = *a_weights.get_unchecked(pk);
                    let wb = *b_weights.get_unchecked(pk);
                    let wc = *c_weights.get_unchecked(pk);
                    let wd = *d_weights.get_unchecked(pk);
                    let aa = indices_prev.get_unchecked(pi) * nc + indices_prev.get_unchecked(pj);
                    let ba = indices_next.get_unchecked(pi) * nc + indices_prev.get_unchecked(pj);
                    let ca = indices_prev.get_unchecked(pi) * nc + indices_next.get_unchecked(pj);
                    let da = indices_next.get_unchecked(pi) * nc + indices_next.get_unchecked(pj);

                    x = fine_grid.get_unchecked(pi)
                        + wa * x_offt.get_unchecked(aa)
                        + wb * x_offt.get_unchecked(ba)
                        + wc * x_offt.get_unchecked(ca)
                        + wd * x_offt.get_unchecked(da);
                    y = fine_grid.get_unchecked(pj)
                        + wa * y_offt.get_unchecked(aa)
                        + wb * y_offt.get_unchecked(ba)
                        + wc * y_offt.get_unchecked(ca)
                        + wd * y_offt.get_unchecked(da);
                    m = smallness
                        * (wa * ms.get_unchecked(aa)
                            + wb * ms.get_unchecked(ba)
                            + wc * ms.get_unchecked(ca)
                            + wd * ms.get_unchecked(da));
                    q = smallness
                        * (wa * qs.get_unchecked(aa)
                            + wb * qs.get_unchecked(ba)
                            + wc * qs.get_unchecked(ca)
                            + wd * qs.get_unchecked(da));
                    px = smallness
                        * (wa * pxs.get_unchecked(aa)
                            + wb * pxs.get_unchecked(ba)
                            + wc * pxs.get_unchecked(ca)
                            + wd * pxs.get_unchecked(da));
                    py = smallness
                        * (wa * pys.get_unchecked(aa)
                            + wb * pys.get_unchecked(ba)
                            + wc * pys.get_unchecked(ca)
                            + wd * pys.get_unchecked(da));
                    pz = smallness
                        * (wa * pzs.get_unchecked(aa)
                            + wb * pzs.get_unchecked(ba)
                            + wc * pzs.get_unchecked(ca)
                            + wd * pzs.get_unchecked(da));
                }

                let x_h = x / h + 0.5;
                let y_h = y / h + 0.5;
                let xf = x_h.floor();
                let yf = y_h.floor();
                let x_loc = x_h - xf - 0.5;
                let y_loc = y_h - yf - 0.5;
                let i = (xf as isize + half) as usize;
                let j = (yf as isize + half) as usize;
                if !cfg!(feature = "unchecked") {
                    assert!(i >= 1 && i + 1 < n);
                    assert!(j >= 1 && j + 1 < n);
                }

                // CALC WEIGHTS
                // 2nd order, same stencil the pusher interpolates with
                let w00 = 0.5 * (0.5 - x_loc) * (0.5 - x_loc) * 0.5 * (0.5 - y_loc) * (0.5 - y_loc);
                let w01 = 0.5 * (0.5 - x_loc) * (0.5 - x_loc) * (0.75 - y_loc * y_loc);
                let w02 = 0.5 * (0.5 - x_loc) * (0.5 - x_loc) * 0.5 * (0.5 + y_loc) * (0.5 + y_loc);
                let w10 = (0.75 - x_loc * x_loc) * 0.5 * (0.5 - y_loc) * (0.5 - y_loc);
                let w11 = (0.75 - x_loc * x_loc) * (0.75 - y_loc * y_loc);
                let w12 = (0.75 - x_loc * x_loc) * 0.5 * (0.5 + y_loc) * (0.5 + y_loc);
                let w20 = 0.5 * (0.5 + x_loc) * (0.5 + x_loc) * 0.5 * (0.5 - y_loc) * (0.5 - y_loc);
                let w21 = 0.5 * (0.5 + x_loc) * (0.5 + x_loc) * (0.75 - y_loc * y_loc);
                let w22 = 0.5 * (0.5 + x_loc) * (0.5 + x_loc) * 0.5 * (0.5 + y_loc) * (0.5 + y_loc);
                #[cfg(feature = "selfcheck")]
                {
                    let sum = w00 + w01 + w02 + w10 + w11 + w12 + w20 + w21 + w22;
                    assert!((sum - 1.0).abs() < 1e-4);
                }

                let gamma_m = (m * m + px * px + py * py + pz * pz).sqrt();
                let dro = q / (1.0 - pz / gamma_m);
                let djx = px * (dro / gamma_m);
                let djy = py * (dro / gamma_m);
                let djz = pz * (dro / gamma_m);

                // The [i,j] position in the array. Slightly complicated
                // because using a 1d vec to represent 2D array for speed.
                // Here is the layout if it were a 2d array
                // --------------------------------
                // | ijm1 - 1 |  ijm1  | ijm1 + 1 |
                // --------------------------------
                // |  ij - 1  |   ij   |  ij + 1  |
                // --------------------------------
                // | ijp1 - 1 |  ijp1  | ijp1 + 1 |
                // --------------------------------
                let ij = i * n + j;
                let ijm1 = ij - n;
                let ijp1 = ij + n;

                let ro = &mut acc.ro;
                let jx = &mut acc.jx;
                let jy = &mut acc.jy;
                let jz = &mut acc.jz;
                if !cfg!(feature = "unchecked") {
                    assert!(ijp1 + 1 < ro.len());
                }
                // safe because of previous assertions
                unsafe {
                    *ro.get_unchecked_mut(ijm1 - 1) += w00 * dro;
                    *ro.get_unchecked_mut(ijm1) += w01 * dro;
                    *ro.get_unchecked_mut(ijm1 + 1) += w02 * dro;
                    *ro.get_unchecked_mut(ij - 1) += w10 * dro;
                    *ro.get_unchecked_mut(ij) += w11 * dro;
                    *ro.get_unchecked_mut(ij + 1) += w12 * dro;
                    *ro.get_unchecked_mut(ijp1 - 1) += w20 * dro;
                    *ro.get_unchecked_mut(ijp1) += w21 * dro;
                    *ro.get_unchecked_mut(ijp1 + 1) += w22 * dro;

                    *jx.get_unchecked_mut(ijm1 - 1) += w00 * djx;
                    *jx.get_unchecked_mut(ijm1) += w01 * djx;
                    *jx.get_unchecked_mut(ijm1 + 1) += w02 * djx;
                    *jx.get_unchecked_mut(ij - 1) += w10 * djx;
                    *jx.get_unchecked_mut(ij) += w11 * djx;
                    *jx.get_unchecked_mut(ij + 1) += w12 * djx;
                    *jx.get_unchecked_mut(ijp1 - 1) += w20 * djx;
                    *jx.get_unchecked_mut(ijp1) += w21 * djx;
                    *jx.get_unchecked_mut(ijp1 + 1) += w22 * djx;

                    *jy.get_unchecked_mut(ijm1 - 1) += w00 * djy;
                    *jy.get_unchecked_mut(ijm1) += w01 * djy;
                    *jy.get_unchecked_mut(ijm1 + 1) += w02 * djy;
                    *jy.get_unchecked_mut(ij - 1) += w10 * djy;
                    *jy.get_unchecked_mut(ij) += w11 * djy;
                    *jy.get_unchecked_mut(ij + 1) += w12 * djy;
                    *jy.get_unchecked_mut(ijp1 - 1) += w20 * djy;
                    *jy.get_unchecked_mut(ijp1) += w21 * djy;
                    *jy.get_unchecked_mut(ijp1 + 1) += w22 * djy;

                    *jz.get_unchecked_mut(ijm1 - 1) += w00 * djz;
                    *jz.get_unchecked_mut(ijm1) += w01 * djz;
                    *jz.get_unchecked_mut(ijm1 + 1) += w02 * djz;
                    *jz.get_unchecked_mut(ij - 1) += w10 * djz;
                    *jz.get_unchecked_mut(ij) += w11 * djz;
                    *jz.get_unchecked_mut(ij + 1) += w12 * djz;
                    *jz.get_unchecked_mut(ijp1 - 1) += w20 * djz;
                    *jz.get_unchecked_mut(ijp1) += w21 * djz;
                    *jz.get_unchecked_mut(ijp1 + 1) += w22 * djz;
                }
                acc
            },
        )
        .reduce(|| DepositAcc::new(n * n), DepositAcc::merge);

    // the background ions come in last
    for (o, v, bg) in izip!(ro.vals.iter_mut(), &acc.ro, &ro_initial.vals) {
        *o = v + bg;
    }
    for (o, v) in izip!(jx.vals.iter_mut(), &acc.jx) {
        *o = *v;
    }
    for (o, v) in izip!(jy.vals.iter_mut(), &acc.jy) {
        *o = *v;
    }
    for (o, v) in izip!(jz.vals.iter_mut(), &acc.jz) {
        *o = *v;
    }
}

/// Charge density of the unperturbed electron ensemble, negated. Adding
/// it back to every later deposition models the immobile ions.
pub fn initial_deposition(sim: &Sim, plasma: &Plasma, virt: &VirtTable) -> Field {
    let motion = Motion::zeroed(plasma.count());
    let zero = Field::new(sim);
    let mut ro = Field::new(sim);
    let mut jx = Field::new(sim);
    let mut jy = Field::new(sim);
    let mut jz = Field::new(sim);
    deposit(
        sim, plasma, virt, &motion, &zero, &mut ro, &mut jx, &mut jy, &mut jz,
    );
    for v in ro.vals.iter_mut() {
        *v = -*v;
    }
    ro
}
