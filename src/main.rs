use anyhow::Result;
use wakefield_rs::{run, Config};

fn main() -> Result<()> {
    let cfg = Config::new()?;
    run(cfg)
}
