pub mod model;
pub mod nickname;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use model::{
    ClientConfig, ListenConfig, LoggingConfig, NotifyConfig, ProxyConfig, RelayConfig,
    ServerConfig, UiConfig,
};

fn config_path(file: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ircbridge")
        .join(file)
}

pub fn client_config_path() -> PathBuf {
    config_path("client.toml")
}

pub fn relay_config_path() -> PathBuf {
    config_path("relay.toml")
}

fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Missing file means defaults.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = path.map_or_else(client_config_path, Path::to_path_buf);
    load_toml(&path)
}

/// File, then `PASSWORD`/`PORT` from the environment, then validation.
pub fn load_relay_config(path: Option<&Path>) -> Result<RelayConfig> {
    let path = path.map_or_else(relay_config_path, Path::to_path_buf);
    let mut config: RelayConfig = load_toml(&path)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).with_context(|| "Failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_client_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.proxy.host, "localhost");
    }

    #[test]
    fn test_save_then_load_keeps_nickname() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.toml");
        let config = ClientConfig::default();
        save_config(&config, &path).unwrap();
        let loaded = load_client_config(Some(&path)).unwrap();
        assert_eq!(loaded.server.nickname, config.server.nickname);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[proxy]\nport = \"many\"\n").unwrap();
        let err = load_client_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("client.toml"));
    }
}
