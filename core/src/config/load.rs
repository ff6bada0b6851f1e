use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Default dagrun data directory: ~/.dagrun
pub fn get_dagrun_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".dagrun"))
}

/// Load configuration, preferring ~/.dagrun/config.toml over ./config.toml,
/// falling back to defaults when neither exists.
pub fn load_default() -> anyhow::Result<AppConfig> {
    let user_config = get_dagrun_data_dir()?.join("config.toml");
    let local_config = Path::new("config.toml");

    let cfg: AppConfig = if user_config.exists() {
        let s = std::fs::read_to_string(&user_config)?;
        toml::from_str(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str(&s)?
    } else {
        AppConfig::default()
    };

    Ok(cfg)
}
