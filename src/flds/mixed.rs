use crate::flds::fft::{mirror_even, PaddedFft};
use crate::flds::field::Field;
use crate::{Float, Sim, PI};
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

/// Helmholtz solver for the transverse fields, with mixed boundary
/// conditions: zero normal derivative along the field's own axis and zero
/// value along the other one.
///
/// The right hand side is cosine-transformed along one axis, which leaves
/// an independent tridiagonal system along the other axis for every
/// spectral bin. The sweep pins both of its end values to zero, giving the
/// Dirichlet half of the boundary conditions. Ey and Bx solve in the
/// natural orientation; Ex and By transpose on the way in and out, which
/// swaps the axis that gets the cosine treatment.
///
/// With a nonzero subtraction trick the operator is laplace - s and the
/// homogeneous part of the solution damps field ringing; s = 0 falls back
/// to a plain Laplace solve.
pub(crate) struct MixedSolver {
    size: usize,
    mul: Float,
    alf: Vec<Float>,
    bet: Vec<Float>,
    fft: PaddedFft,
    pad: Vec<Complex<Float>>,
    spectral: Vec<Complex<Float>>,
    modes: Vec<Float>,
}

impl MixedSolver {
    pub fn new(sim: &Sim) -> MixedSolver {
        let size = sim.grid_steps;
        let fft = PaddedFft::new(size);
        let padded_len = fft.padded_len();
        let h = sim.grid_step_size;

        let mut alf = vec![0.0; size * (size + 1)];
        for k in 0..size {
            let arg = k as Float * PI / (2.0 * (size - 1) as Float);
            let a_k = 2.0 + 4.0 * arg.sin() * arg.sin() + h * h * sim.subtraction_trick;
            let row = &mut alf[k * (size + 1)..(k + 1) * (size + 1)];
            // row[0] and row[1] stay zero, which pins the sweep ends.
            for i in 1..size {
                row[i + 1] = 1.0 / (a_k - row[i]);
            }
        }

        MixedSolver {
            size,
            mul: h * h / padded_len as Float,
            alf,
            bet: vec![0.0; size * (size + 1)],
            fft,
            pad: vec![Complex::zero(); size * padded_len],
            spectral: vec![Complex::zero(); size * padded_len],
            modes: vec![0.0; size * size],
        }
    }

    /// Solves for Ey and Bx: cosine transform along y, sweep along x.
    pub fn solve(&mut self, rhs: &Field, out: &mut Field) {
        let n = self.size;
        let m = self.fft.padded_len();
        if !cfg!(feature = "unchecked") {
            assert_eq!(rhs.vals.len(), n * n);
            assert_eq!(out.vals.len(), n * n);
        }
        for r in 0..n {
            let row = &mut self.pad[r * m..(r + 1) * m];
            for c in 0..n {
                row[c] = Complex::new(rhs.vals[r * n + c], 0.0);
            }
            mirror_even(row, n);
        }
        self.run();
        for i in 0..n {
            for j in 0..n {
                out.vals[i * n + j] = self.spectral[i * m + j].re;
            }
        }
    }

    /// Solves for Ex and By: same pipeline on the transposed right hand
    /// side, so the cosine axis and the sweep axis trade places.
    pub fn solve_transposed(&mut self, rhs: &Field, out: &mut Field) {
        let n = self.size;
        let m = self.fft.padded_len();
        if !cfg!(feature = "unchecked") {
            assert_eq!(rhs.vals.len(), n * n);
            assert_eq!(out.vals.len(), n * n);
        }
        for r in 0..n {
            let row = &mut self.pad[r * m..(r + 1) * m];
            for c in 0..n {
                row[c] = Complex::new(rhs.vals[c * n + r], 0.0);
            }
            mirror_even(row, n);
        }
        self.run();
        for i in 0..n {
            for j in 0..n {
                out.vals[i * n + j] = self.spectral[j * m + i].re;
            }
        }
    }

    /// Cosine transform, parallel tridiagonal sweeps, transform back.
    /// Expects the padded rows in self.pad and leaves the result spectra
    /// in self.spectral.
    fn run(&mut self) {
        let n = self.size;
        let m = self.fft.padded_len();
        self.fft.forward_rows(&mut self.pad, &mut self.spectral);

        // Regroup by spectral bin so every tridiagonal sweep runs over a
        // contiguous row: modes[k][r] = Re spectral[r][k].
        for k in 0..n {
            for r in 0..n {
                self.modes[k * n + r] = self.spectral[r * m + k].re;
            }
        }

        let mul = self.mul;
        self.modes
            .par_chunks_mut(n)
            .zip(self.alf.par_chunks(n + 1))
            .zip(self.bet.par_chunks_mut(n + 1))
            .for_each(|((f_u, alf), bet)| {
                bet[0] = 0.0;
                bet[1] = 0.0;
                for j in 1..n - 1 {
                    bet[j + 1] = (mul * f_u[j] + bet[j]) * alf[j + 1];
                }
                f_u[n - 1] = 0.0;
                for j in (0..n - 1).rev() {
                    f_u[j] = alf[j + 1] * f_u[j + 1] + bet[j + 1];
                }
            });

        for r in 0..n {
            let row = &mut self.pad[r * m..(r + 1) * m];
            for k in 0..n {
                row[k] = Complex::new(self.modes[k * n + r], 0.0);
            }
            mirror_even(row, n);
        }
        self.fft.forward_rows(&mut self.pad, &mut self.spectral);
    }
}
