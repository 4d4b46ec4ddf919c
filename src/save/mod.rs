use crate::step::SliceState;
use crate::Config;
use anyhow::{Context, Result};

/// Writes npy snapshots of the plasma response for one xi slice. The
/// directory layout is one folder per saved slice so the files can be
/// globbed in xi order.
pub(crate) fn save_output(xi_i: usize, cfg: &Config, state: &SliceState) -> Result<()> {
    if xi_i % cfg.output.output_interval == 0 {
        let output_prefix = format!("output/xi_{:05}", xi_i);
        std::fs::create_dir_all(&output_prefix).context("Unable to create output directory")?;

        npy::to_file(
            format!("{}/ro.npy", output_prefix),
            state.ro.vals.iter().copied(),
        )
        .context("Could not save ro data to file")?;
        npy::to_file(
            format!("{}/ez.npy", output_prefix),
            state.ez.vals.iter().copied(),
        )
        .context("Could not save ez data to file")?;
    }

    Ok(())
}
