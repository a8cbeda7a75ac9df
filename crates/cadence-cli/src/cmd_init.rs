use anyhow::{bail, Context, Result};
use cadence_core::config::SAMPLE_CONFIG;
use std::path::Path;

/// Execute `cadence init [path]`
pub fn execute(path: &Path) -> Result<()> {
    write_sample(path)?;
    println!("Wrote sample config to {}", path.display());
    println!("Edit owner, repo and dates, then run `cadence plan {}`.", path.display());
    Ok(())
}

fn write_sample(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists; not overwriting", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, SAMPLE_CONFIG).with_context(|| format!("writing {}", path.display()))
}
