mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./mediamend.toml",
        "~/.config/mediamend/config.toml",
        "/etc/mediamend/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.analysis.zero_run_threshold == 0 {
        anyhow::bail!("analysis.zero_run_threshold cannot be 0");
    }
    if config.analysis.max_regions == 0 {
        anyhow::bail!("analysis.max_regions cannot be 0");
    }
    if config.analysis.unit_scan_buffer < 8 {
        anyhow::bail!("analysis.unit_scan_buffer must be at least 8 bytes");
    }
    if config.repair.tool_timeout_secs == 0 {
        anyhow::bail!("repair.tool_timeout_secs cannot be 0");
    }
    if config.repair.verify_lead_secs == 0 {
        anyhow::bail!("repair.verify_lead_secs cannot be 0");
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg),
        ("ffprobe", &config.tools.ffprobe),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
