//! Show or save the effective configuration.

use gazefit_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to save config: {e}"))?;
        println!("\nConfig saved to: {}", config_file_path().display());
    }

    Ok(())
}
