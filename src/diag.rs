use crate::flds::field::Field;
use crate::step::SliceState;
use crate::{Config, Float, Sim};

/// Number of binomial smoothing passes applied before measuring the grid
/// noise.
const NOISE_FILTER_PASSES: usize = 4;

/// Tracks the on-axis accelerating field and the high-frequency density
/// noise over the length of the window, and prints the one-line progress
/// report.
pub struct Diagnostics {
    ez_00_history: Vec<Float>,
    max_noise: Float,
    blur: Vec<Float>,
    wrk: Vec<Float>,
}

impl Diagnostics {
    pub fn new(sim: &Sim) -> Diagnostics {
        let cells = sim.grid_steps * sim.grid_steps;
        Diagnostics {
            ez_00_history: Vec::new(),
            max_noise: 0.0,
            blur: vec![0.0; cells],
            wrk: vec![0.0; cells],
        }
    }

    /// Samples Ez at the axis, updates the peak bookkeeping and prints the
    /// progress line. Only runs on the diagnostics interval and on the
    /// very last slice, so the peak search sees the sampled history, not
    /// every slice.
    pub fn after_slice(&mut self, sim: &Sim, cfg: &Config, xi_i: usize, state: &SliceState) {
        let last = xi_i + 1 == cfg.setup.xi_steps;
        if xi_i % cfg.output.diag_interval != 0 && !last {
            return;
        }
        let n = sim.grid_steps;
        let ez_00 = state.ez.vals[(n / 2) * n + n / 2];
        self.ez_00_history.push(ez_00);
        let noise = self.ro_noise(sim, &state.ro);
        if noise > self.max_noise {
            self.max_noise = noise;
        }
        let xi = -(xi_i as Float) * sim.xi_step_size;
        println!(
            "xi={:+.4} {:+.4e}|{}|zn={:.3}",
            xi,
            ez_00,
            peaks_info(&self.ez_00_history),
            self.max_noise
        );
    }

    pub fn ez_00_history(&self) -> &[Float] {
        &self.ez_00_history
    }

    /// Mean absolute difference between ro and its smoothed copy. Repeated
    /// binomial passes strip everything near the grid frequency, so the
    /// residual is a direct read of the numerical noise floor.
    fn ro_noise(&mut self, sim: &Sim, ro: &Field) -> Float {
        let n = sim.grid_steps;
        if !cfg!(feature = "unchecked") {
            assert_eq!(self.blur.len(), n * n);
            assert_eq!(self.wrk.len(), n * n);
            assert_eq!(ro.vals.len(), n * n);
        }
        self.blur.copy_from_slice(&ro.vals);
        let weights: [Float; 3] = [0.25, 0.5, 0.25];
        for _ in 0..NOISE_FILTER_PASSES {
            // FIRST FILTER ALONG THE CONTIGUOUS DIRECTION
            // border cells keep their unfiltered values
            self.wrk.copy_from_slice(&self.blur);
            for i in (n..(n - 1) * n).step_by(n) {
                for j in 1..n - 1 {
                    self.wrk[i + j] = weights
                        .iter()
                        .zip(&self.blur[i + j - 1..=i + j + 1])
                        .map(|(&w, &f)| w * f)
                        .sum::<Float>();
                }
            }

            // NOW FILTER IN THE STRIDED DIRECTION AND PUT VALS BACK
            self.blur.copy_from_slice(&self.wrk);
            for i in (n..(n - 1) * n).step_by(n) {
                for j in 1..n - 1 {
                    self.blur[i + j] = weights
                        .iter()
                        .zip(self.wrk[i + j - n..=i + j + n].iter().step_by(n))
                        .map(|(&w, &f)| w * f)
                        .sum::<Float>();
                }
            }
        }
        let mut acc: Float = 0.0;
        for (v, b) in ro.vals.iter().zip(self.blur.iter()) {
            acc += (v - b).abs();
        }
        acc / (n * n) as Float
    }
}

/// Latest Ez(0,0) oscillation peak and its drift against the first one,
/// or dots until a full oscillation has come through.
fn peaks_info(history: &[Float]) -> String {
    let mut peaks = Vec::new();
    for i in 1..history.len().saturating_sub(1) {
        if history[i] > history[i - 1] && history[i] > history[i + 1] {
            peaks.push(history[i]);
        }
    }
    match (peaks.first(), peaks.last()) {
        (Some(first), Some(latest)) => {
            let drift = 100.0 * (latest / first - 1.0);
            format!("{:.4e} {:+.2}%", latest, drift)
        }
        _ => "...".to_string(),
    }
}
