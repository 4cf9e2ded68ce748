//! Paths command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Print the resolved data paths in `key = value` form.
pub fn execute(ctx: &CliContext) -> Result<()> {
    println!("data_dir     = {}", ctx.config.data_dir.display());
    println!("settings     = {}", ctx.config.settings_path().display());
    println!("artifact_dir = {}", ctx.config.artifact_dir().display());
    Ok(())
}
