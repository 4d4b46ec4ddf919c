use serde::Deserialize;
use std::fs;

use anyhow::{Context, Result};

pub mod diag;
pub mod flds;
pub mod plasma;
mod save;
pub mod step;

use flds::field::Field;

// We use a type alias for f64/Float to easily support
// double and single precision.
#[cfg(feature = "dprec")]
pub type Float = f64;

#[cfg(not(feature = "dprec"))]
pub type Float = f32;

pub(crate) const PI: Float = std::f64::consts::PI as Float;

/// Absolute tolerance for the numerical tests.
pub const E_TOL: Float = 1e-4;

/// How many particles each rayon task grabs at a time.
pub(crate) const PRTL_CHUNK_SIZE: usize = 4096;

// Plasma units. Densities and masses are normalized so the unperturbed
// electron fluid has unit density and unit mass.
pub const ELECTRON_CHARGE: Float = -1.0;
pub const ELECTRON_MASS: Float = 1.0;

#[derive(Deserialize)]
pub struct Config {
    pub params: Params,
    pub setup: Setup,
    pub beam: Beam,
    pub output: Output,
}

#[derive(Deserialize)]
pub struct Setup {
    pub xi_steps: usize,
}

#[derive(Deserialize)]
pub struct Output {
    pub write_output: bool,
    pub output_interval: usize,
    pub diag_interval: usize,
}

#[derive(Deserialize)]
pub struct Params {
    pub grid_steps: usize,
    pub grid_step_size: Float,
    pub xi_step_size: Float,
    pub subtraction_trick: Float,
    pub reflect_padding_steps: usize,
    pub plasma_padding_steps: usize,
    pub plasma_coarseness: usize,
    pub plasma_fineness: usize,
}

/// The driver: a rigid Gaussian charge distribution moving at the speed
/// of light, evaluated slice by slice.
#[derive(Deserialize)]
pub struct Beam {
    pub amplitude: Float,
    pub sigma: Float,
    pub compress: Float,
    pub y_shift: Float,
}

impl Config {
    pub fn new() -> Result<Config> {
        let contents =
            fs::read_to_string("config.toml").context("Could not open the config.toml file")?;
        toml::from_str(&contents).with_context(|| "Could not parse Config file")
    }
}

pub struct Sim {
    pub grid_steps: usize,
    pub grid_step_size: Float,
    pub xi_step_size: Float,
    pub xi_steps: usize,
    pub subtraction_trick: Float,
    pub reflect_boundary: Float, // where runaway particles bounce back
    pub plasma_padding_steps: usize,
    pub plasma_coarseness: usize,
    pub plasma_fineness: usize,
    pub smallness_factor: Float, // = 1 / (coarseness * fineness)^2
}

impl Sim {
    pub fn new(cfg: &Config) -> Sim {
        let virt_per_coarse = cfg.params.plasma_coarseness * cfg.params.plasma_fineness;
        Sim {
            grid_steps: cfg.params.grid_steps,
            grid_step_size: cfg.params.grid_step_size,
            xi_step_size: cfg.params.xi_step_size,
            xi_steps: cfg.setup.xi_steps,
            subtraction_trick: cfg.params.subtraction_trick,
            reflect_boundary: cfg.params.grid_step_size
                * (cfg.params.grid_steps as Float / 2.0
                    - cfg.params.reflect_padding_steps as Float),
            plasma_padding_steps: cfg.params.plasma_padding_steps,
            plasma_coarseness: cfg.params.plasma_coarseness,
            plasma_fineness: cfg.params.plasma_fineness,
            smallness_factor: 1.0 / (virt_per_coarse * virt_per_coarse) as Float,
        }
    }
}

/// Beam charge density on the slice xi_i, written over the whole grid.
/// The longitudinal profile ramps up as 1 - cos and is cut to zero two
/// periods behind the head.
pub fn beam_density(sim: &Sim, beam: &Beam, xi_i: usize, out: &mut Field) {
    let xi = -(xi_i as Float) * sim.xi_step_size;
    if xi < -2.0 * (2.0 * PI).sqrt() / beam.compress {
        out.zero();
        return;
    }
    let n = sim.grid_steps;
    let h = sim.grid_step_size;
    let envelope = beam.amplitude * (1.0 - (xi * beam.compress * (PI / 2.0).sqrt()).cos());
    let sigma_sq = beam.sigma * beam.sigma;
    for i in 0..n {
        for j in 0..n {
            let x = (i as isize - (n / 2) as isize) as Float * h;
            let y = (j as isize - (n / 2) as isize) as Float * h - beam.y_shift;
            out.vals[i * n + j] = envelope * (-0.5 * (x * x + y * y) / sigma_sq).exp();
        }
    }
}

pub fn run(cfg: Config) -> Result<()> {
    // the cosine and sine expansions pivot on a center cell, so the grid
    // must have one.
    if cfg.params.grid_steps % 2 != 1 {
        return Err(anyhow::Error::msg("Number of grid steps must be odd"));
    }
    if cfg.params.plasma_coarseness < 1 || cfg.params.plasma_fineness < 1 {
        return Err(anyhow::Error::msg(
            "Plasma coarseness and fineness must be at least one",
        ));
    }
    if cfg.params.grid_steps <= 2 * cfg.params.plasma_padding_steps {
        return Err(anyhow::Error::msg(
            "Plasma padding leaves no room for the plasma",
        ));
    }
    if (cfg.params.grid_steps - 2 * cfg.params.plasma_padding_steps)
        < 2 * cfg.params.plasma_coarseness
    {
        return Err(anyhow::Error::msg(
            "Plasma region too small for even one macro particle",
        ));
    }
    if cfg.params.reflect_padding_steps <= cfg.params.plasma_coarseness + 1 {
        return Err(anyhow::Error::msg(
            "Reflect padding must exceed the coarse cell size",
        ));
    }
    if cfg.output.diag_interval < 1 {
        return Err(anyhow::Error::msg("Diagnostics interval must be positive"));
    }
    if cfg.output.write_output && cfg.output.output_interval < 1 {
        return Err(anyhow::Error::msg("Output interval must be positive"));
    }

    let sim = Sim::new(&cfg);
    println!("initializing plasma");
    let (plasma, virt) = plasma::make(&sim);
    let mut stepper = step::Stepper::new(&sim, &plasma, &virt);
    let mut diag = diag::Diagnostics::new(&sim);

    let mut state = step::SliceState::zeroed(&sim, &plasma);
    let mut beam_ro = Field::new(&sim);
    for xi_i in 0..sim.xi_steps {
        beam_density(&sim, &cfg.beam, xi_i, &mut beam_ro);
        state = stepper.step(&sim, &plasma, &virt, &beam_ro, &state);
        diag.after_slice(&sim, &cfg, xi_i, &state);
        if cfg.output.write_output {
            save::save_output(xi_i, &cfg, &state)?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn build_test_sim() -> Sim {
    // This sets up a dummy small simulation so that it can
    // be used in testing;
    let cfg = Config {
        params: Params {
            grid_steps: 17,
            grid_step_size: 0.05,
            xi_step_size: 0.05,
            subtraction_trick: 1.0,
            reflect_padding_steps: 4,
            plasma_padding_steps: 4,
            plasma_coarseness: 2,
            plasma_fineness: 2,
        },
        setup: Setup { xi_steps: 10 },
        beam: Beam {
            amplitude: 0.05,
            sigma: 1.0,
            compress: 1.0,
            y_shift: 0.0,
        },
        output: Output {
            write_output: false,
            output_interval: 100,
            diag_interval: 1,
        },
    };
    Sim::new(&cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_head_is_empty() {
        let sim = build_test_sim();
        let beam = Beam {
            amplitude: 0.05,
            sigma: 1.0,
            compress: 1.0,
            y_shift: 0.0,
        };
        let mut out = Field::new(&sim);
        beam_density(&sim, &beam, 0, &mut out);
        // the 1 - cos ramp starts exactly at zero
        for v in out.vals.iter() {
            assert!(v.abs() < E_TOL);
        }
    }

    #[test]
    fn beam_peaks_on_axis_and_decays_with_radius() {
        let sim = build_test_sim();
        let beam = Beam {
            amplitude: 0.05,
            sigma: 0.1,
            compress: 1.0,
            y_shift: 0.0,
        };
        let n = sim.grid_steps;
        let mut out = Field::new(&sim);
        // deep enough into the ramp for a visible envelope
        beam_density(&sim, &beam, 20, &mut out);
        let center = out.vals[(n / 2) * n + n / 2];
        assert!(center > 0.0);
        for k in 1..n / 2 {
            let on_ring = out.vals[(n / 2 + k) * n + n / 2];
            assert!(on_ring < center);
        }
        // radial symmetry in all four directions
        let right = out.vals[(n / 2 + 3) * n + n / 2];
        let left = out.vals[(n / 2 - 3) * n + n / 2];
        let up = out.vals[(n / 2) * n + n / 2 + 3];
        let down = out.vals[(n / 2) * n + n / 2 - 3];
        assert!((right - left).abs() < E_TOL);
        assert!((right - up).abs() < E_TOL);
        assert!((right - down).abs() < E_TOL);
    }

    #[test]
    fn beam_cuts_off_behind_the_tail() {
        let sim = build_test_sim();
        let beam = Beam {
            amplitude: 0.05,
            sigma: 1.0,
            compress: 1.0,
            y_shift: 0.0,
        };
        let mut out = Field::new(&sim);
        beam_density(&sim, &beam, 20, &mut out);
        // far past -2 sqrt(2 pi): xi = -0.05 * 300 = -15
        beam_density(&sim, &beam, 300, &mut out);
        for v in out.vals.iter() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn run_rejects_an_even_grid() {
        let cfg = Config {
            params: Params {
                grid_steps: 16,
                grid_step_size: 0.05,
                xi_step_size: 0.05,
                subtraction_trick: 1.0,
                reflect_padding_steps: 4,
                plasma_padding_steps: 4,
                plasma_coarseness: 2,
                plasma_fineness: 2,
            },
            setup: Setup { xi_steps: 1 },
            beam: Beam {
                amplitude: 0.05,
                sigma: 1.0,
                compress: 1.0,
                y_shift: 0.0,
            },
            output: Output {
                write_output: false,
                output_interval: 100,
                diag_interval: 1,
            },
        };
        assert!(run(cfg).is_err());
    }
}
