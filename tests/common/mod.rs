use wakefield_rs::{Beam, Config, Output, Params, Setup, Sim};

pub fn setup_cfg() -> Config {
    // This is a function that sets up a dummy small
    // simulation so that it can be used in testing;
    Config {
        params: Params {
            grid_steps: 65,
            grid_step_size: 0.05,
            xi_step_size: 0.05,
            subtraction_trick: 1.0,
            reflect_padding_steps: 5,
            plasma_padding_steps: 6,
            plasma_coarseness: 2,
            plasma_fineness: 2,
        },
        setup: Setup { xi_steps: 40 },
        beam: Beam {
            amplitude: 0.05,
            sigma: 0.5,
            compress: 1.0,
            y_shift: 0.0,
        },
        output: Output {
            write_output: false,
            output_interval: 20,
            diag_interval: 10,
        },
    }
}

#[allow(dead_code)]
pub fn setup_sim() -> Sim {
    Sim::new(&setup_cfg())
}
