use crate::Float;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::FftPlanner;

/// Row-batched complex FFT over mirror-padded rows of length 2 * (n - 1).
///
/// The boundary solvers express cosine and sine transforms of grid lines
/// through a plain DFT of the line extended to a symmetric (or antisymmetric)
/// ring. One forward plan covers both directions since the transforms are
/// self-inverse up to the 2 * (n - 1) normalization, which the solvers fold
/// into their tridiagonal sweep.
pub(crate) struct PaddedFft {
    padded_len: usize,
    fft: std::sync::Arc<dyn rustfft::Fft<Float>>,
    scratch: Vec<Complex<Float>>,
}

impl PaddedFft {
    pub fn new(grid_steps: usize) -> PaddedFft {
        let padded_len = 2 * (grid_steps - 1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(padded_len);
        let scratch = vec![Complex::zero(); fft.get_outofplace_scratch_len()];
        PaddedFft {
            padded_len,
            fft,
            scratch,
        }
    }

    #[inline(always)]
    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    /// Runs the forward FFT over every padded row packed back to back in
    /// `rows`. RustFFT splits a buffer longer than the plan length into
    /// chunks and transforms each one, so a single call covers all rows.
    /// The contents of `rows` are garbage afterwards.
    pub fn forward_rows(&mut self, rows: &mut [Complex<Float>], out: &mut [Complex<Float>]) {
        if !cfg!(feature = "unchecked") {
            assert_eq!(rows.len(), out.len());
            assert_eq!(rows.len() % self.padded_len, 0);
        }
        self.fft
            .process_outofplace_with_scratch(rows, out, &mut self.scratch);
    }
}

/// Fills the back half of a padded row with the even (cosine) extension of
/// its first n entries. The row layout is
///
///   [ f_0 f_1 .. f_{n-1} f_{n-2} .. f_1 ]
///
/// so the real part of its DFT is the unnormalized DCT-I of f.
#[inline(always)]
pub(crate) fn mirror_even(row: &mut [Complex<Float>], n: usize) {
    if !cfg!(feature = "unchecked") {
        assert_eq!(row.len(), 2 * (n - 1));
    }
    for c in 1..n - 1 {
        row[2 * (n - 1) - c] = row[c];
    }
}

/// Fills a padded row with the odd (sine) extension of the ns interior
/// entries already stored at positions 1..=ns. The row layout is
///
///   [ 0 f_1 .. f_ns 0 -f_ns .. -f_1 ]
///
/// so minus the imaginary part of its DFT is the unnormalized DST-I of f.
#[inline(always)]
pub(crate) fn mirror_odd(row: &mut [Complex<Float>], ns: usize) {
    if !cfg!(feature = "unchecked") {
        assert_eq!(row.len(), 2 * ns + 2);
    }
    for c in 1..=ns {
        row[2 * ns + 2 - c] = -row[c];
    }
}
