use crate::flds::fft::{mirror_odd, PaddedFft};
use crate::flds::field::Field;
use crate::{Float, Sim, PI};
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

/// Laplace solver with zero boundary values on all four grid edges,
/// used for the longitudinal field.
///
/// The right hand side is sine-transformed along y, which turns the
/// Laplacian into an independent tridiagonal system along x for every
/// spectral bin. The systems share precomputed forward-elimination
/// coefficients and are swept in parallel, then a second sine transform
/// recovers the solution. Only the (n - 2) x (n - 2) interior is solved;
/// the perimeter of the output stays zero.
pub(crate) struct DirichletSolver {
    size: usize,
    inner: usize,
    mul: Float,
    alf: Vec<Float>,
    bet: Vec<Float>,
    fft: PaddedFft,
    pad: Vec<Complex<Float>>,
    spectral: Vec<Complex<Float>>,
    modes: Vec<Float>,
}

impl DirichletSolver {
    pub fn new(sim: &Sim) -> DirichletSolver {
        let size = sim.grid_steps;
        let inner = size - 2;
        let fft = PaddedFft::new(size);
        let padded_len = fft.padded_len();

        // alf[k][i + 1] = 1 / (a_k - alf[k][i]) with a_k the spectral
        // diagonal 2 + 4 sin^2((k + 1) pi / (2 (n - 1))).
        let mut alf = vec![0.0; inner * (inner + 1)];
        for k in 0..inner {
            let arg = (k + 1) as Float * PI / (2.0 * (size - 1) as Float);
            let a_k = 2.0 + 4.0 * arg.sin() * arg.sin();
            let row = &mut alf[k * (inner + 1)..(k + 1) * (inner + 1)];
            for i in 0..inner {
                row[i + 1] = 1.0 / (a_k - row[i]);
            }
        }

        DirichletSolver {
            size,
            inner,
            mul: sim.grid_step_size * sim.grid_step_size / padded_len as Float,
            alf,
            bet: vec![0.0; inner * (inner + 1)],
            fft,
            pad: vec![Complex::zero(); inner * padded_len],
            spectral: vec![Complex::zero(); inner * padded_len],
            modes: vec![0.0; inner * inner],
        }
    }

    /// Solves laplace(out) = -rhs. Only the interior of rhs is read.
    pub fn solve(&mut self, rhs: &Field, out: &mut Field) {
        let n = self.size;
        let ns = self.inner;
        let m = self.fft.padded_len();
        if !cfg!(feature = "unchecked") {
            assert_eq!(rhs.vals.len(), n * n);
            assert_eq!(out.vals.len(), n * n);
        }

        // Sine transform of the interior rows along y.
        for i in 0..ns {
            let row = &mut self.pad[i * m..(i + 1) * m];
            row[0] = Complex::zero();
            row[ns + 1] = Complex::zero();
            for j in 0..ns {
                row[j + 1] = Complex::new(rhs.vals[(i + 1) * n + (j + 1)], 0.0);
            }
            mirror_odd(row, ns);
        }
        self.fft.forward_rows(&mut self.pad, &mut self.spectral);

        // Regroup by spectral bin so every tridiagonal sweep runs over a
        // contiguous row: modes[k][i] = -Im spectral[i][k + 1].
        for k in 0..ns {
            for i in 0..ns {
                self.modes[k * ns + i] = -self.spectral[i * m + (k + 1)].im;
            }
        }

        let mul = self.mul;
        self.modes
            .par_chunks_mut(ns)
            .zip(self.alf.par_chunks(ns + 1))
            .zip(self.bet.par_chunks_mut(ns + 1))
            .for_each(|((f_u, alf), bet)| {
                // Forward elimination reads f_u, back substitution
                // overwrites it with the per-bin solution.
                bet[0] = 0.0;
                for j in 0..ns {
                    bet[j + 1] = (mul * f_u[j] + bet[j]) * alf[j + 1];
                }
                f_u[ns - 1] = bet[ns];
                for j in (0..ns - 1).rev() {
                    f_u[j] = alf[j + 1] * f_u[j + 1] + bet[j + 1];
                }
            });

        // Inverse transform: pack the solved bins back into padded rows.
        for i in 0..ns {
            let row = &mut self.pad[i * m..(i + 1) * m];
            row[0] = Complex::zero();
            row[ns + 1] = Complex::zero();
            for k in 0..ns {
                row[k + 1] = Complex::new(self.modes[k * ns + i], 0.0);
            }
            mirror_odd(row, ns);
        }
        self.fft.forward_rows(&mut self.pad, &mut self.spectral);

        out.zero();
        for i in 0..ns {
            for j in 0..ns {
                out.vals[(i + 1) * n + (j + 1)] = -self.spectral[i * m + (j + 1)].im;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_test_sim, E_TOL};

    // Discrete eigenvalue of the 1D Laplacian for sine mode k.
    fn lam(k: usize, n: usize, h: Float) -> Float {
        let arg = k as Float * PI / (2.0 * (n - 1) as Float);
        4.0 / (h * h) * arg.sin() * arg.sin()
    }

    #[test]
    fn zero_rhs_gives_zero_field() {
        let sim = build_test_sim();
        let mut solver = DirichletSolver::new(&sim);
        let rhs = Field::new(&sim);
        let mut out = Field::new(&sim);
        out.vals[5] = 3.0;
        solver.solve(&rhs, &mut out);
        for &v in out.vals.iter() {
            assert!(v.abs() < E_TOL);
        }
    }

    #[test]
    fn recovers_discrete_eigenvector() {
        // sin(pi a i / (n - 1)) * sin(pi b j / (n - 1)) is an exact discrete
        // eigenvector, so feeding (lam_a + lam_b) * u must return u itself.
        let sim = build_test_sim();
        let n = sim.grid_steps;
        let h = sim.grid_step_size;
        let (a, b) = (2, 3);
        let mut solver = DirichletSolver::new(&sim);
        let mut rhs = Field::new(&sim);
        let mut u = Field::new(&sim);
        let lam_ab = lam(a, n, h) + lam(b, n, h);
        for i in 0..n {
            for j in 0..n {
                let sx = (PI * (a * i) as Float / (n - 1) as Float).sin();
                let sy = (PI * (b * j) as Float / (n - 1) as Float).sin();
                u.vals[i * n + j] = sx * sy;
                rhs.vals[i * n + j] = lam_ab * sx * sy;
            }
        }
        let mut out = Field::new(&sim);
        solver.solve(&rhs, &mut out);
        for (v, expected_v) in out.vals.iter().zip(u.vals.iter()) {
            assert!((v - expected_v).abs() < E_TOL);
        }
        // Boundary values must be exactly zero.
        for i in 0..n {
            assert_eq!(out.vals[i], 0.0);
            assert_eq!(out.vals[(n - 1) * n + i], 0.0);
            assert_eq!(out.vals[i * n], 0.0);
            assert_eq!(out.vals[i * n + n - 1], 0.0);
        }
    }
}
