use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  pub shell: ShellConfig,
  #[serde(default)]
  pub dynamic: DynamicConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Origin used to resolve relative manifest URLs and the root document.
  pub origin: Url,
  /// Override for the store location (defaults to the platform data dir).
  pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the remote API, e.g. https://pwa-back.example.com
  pub base_url: Url,
  /// Request paths under this prefix are never served from cache.
  #[serde(default = "default_route_prefix")]
  pub route_prefix: String,
  /// Body of the synthesized 503 returned for API calls while offline.
  #[serde(default = "default_offline_message")]
  pub offline_message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
  /// Version suffix for the shell namespace; bump on every deploy.
  pub version: String,
  /// Asset manifest fetched at install, absolute or origin-relative.
  pub assets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamicConfig {
  /// Version suffix for the dynamic namespace.
  pub version: String,
}

impl Default for DynamicConfig {
  fn default() -> Self {
    Self {
      version: "1.0".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Rejections (non-2xx) tolerated before an entry is dead-lettered.
  #[serde(default = "default_max_rejections")]
  pub max_rejections: u32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_rejections: default_max_rejections(),
    }
  }
}

fn default_route_prefix() -> String {
  "/api".to_string()
}

fn default_offline_message() -> String {
  "No connectivity; the request was not sent".to_string()
}

fn default_max_rejections() -> u32 {
  5
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./faro.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/faro/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/faro/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("faro.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("faro").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Namespace name for the current shell cache.
  pub fn shell_namespace(&self) -> String {
    format!("shell_v{}", self.shell.version)
  }

  /// Namespace name for the current dynamic cache.
  pub fn dynamic_namespace(&self) -> String {
    format!("dynamic_v{}", self.dynamic.version)
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;

  pub fn test_config() -> Config {
    serde_yaml::from_str(
      r#"
origin: http://localhost:5173
api:
  base_url: http://localhost:3000
shell:
  version: "1.0"
  assets:
    - /
    - /index.html
"#,
    )
    .unwrap()
  }

  #[test]
  fn defaults_fill_in() {
    let config = test_config();
    assert_eq!(config.api.route_prefix, "/api");
    assert_eq!(config.sync.max_rejections, 5);
    assert_eq!(config.shell_namespace(), "shell_v1.0");
    assert_eq!(config.dynamic_namespace(), "dynamic_v1.0");
  }

  #[test]
  fn explicit_versions_win() {
    let config: Config = serde_yaml::from_str(
      r#"
origin: http://localhost:5173
api:
  base_url: http://localhost:3000
  route_prefix: /v2/api
shell:
  version: "2.3"
  assets: []
dynamic:
  version: "2.3"
"#,
    )
    .unwrap();

    assert_eq!(config.shell_namespace(), "shell_v2.3");
    assert_eq!(config.dynamic_namespace(), "dynamic_v2.3");
    assert_eq!(config.api.route_prefix, "/v2/api");
  }
}
