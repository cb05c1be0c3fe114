use crate::{
    game::{self, GameId},
    load_order::{Encoding, OrderPolicy},
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const HOME_ENV: &str = "DARKTIDE_ORDER_HOME";
const APP_DIR: &str = "darktide-order";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub game_id: GameId,
    #[serde(default)]
    pub game_root: Option<PathBuf>,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default = "default_true")]
    pub discovered_enabled: bool,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir.to_path_buf();
            let stale_root = config
                .game_root
                .as_deref()
                .is_some_and(|root| !game::looks_like_game_root(config.game_id, root));
            if stale_root {
                config.game_root = None;
                config.save()?;
            }
            return Ok(config);
        }

        let config = AppConfig {
            game_id: GameId::default(),
            game_root: None,
            encoding: Encoding::default(),
            discovered_enabled: true,
            data_dir: data_dir.to_path_buf(),
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn order_policy(&self, encoding_override: Option<Encoding>) -> OrderPolicy {
        OrderPolicy::for_encoding(encoding_override.unwrap_or(self.encoding))
            .with_discovered_enabled(self.discovered_enabled)
    }
}

/// `--data-dir`, then `$DARKTIDE_ORDER_HOME`, then the platform data dir.
pub fn resolve_data_dir(data_dir_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = data_dir_override {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(path));
    }
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join(APP_DIR))
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_order::NewEntryOrder;
    use tempfile::TempDir;

    #[test]
    fn creates_default_config() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load_or_create(temp.path()).unwrap();

        assert!(temp.path().join("config.json").exists());
        assert_eq!(config.encoding, Encoding::Filter);
        assert!(config.game_root.is_none());
        assert!(config.discovered_enabled);
    }

    #[test]
    fn stale_game_root_is_dropped() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.json"),
            r#"{ "game_root": "/definitely/not/darktide", "encoding": "comment" }"#,
        )
        .unwrap();

        let config = AppConfig::load_or_create(temp.path()).unwrap();
        assert!(config.game_root.is_none());
        assert_eq!(config.encoding, Encoding::Comment);
    }

    #[test]
    fn policy_honors_override_and_discovery_flag() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::load_or_create(temp.path()).unwrap();
        config.discovered_enabled = false;

        let policy = config.order_policy(Some(Encoding::Comment));
        assert_eq!(policy.encoding, Encoding::Comment);
        assert_eq!(policy.new_entries, NewEntryOrder::CaseInsensitive);
        assert!(!policy.discovered_enabled);
    }

    #[test]
    fn explicit_data_dir_wins() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            resolve_data_dir(Some(temp.path())).unwrap(),
            temp.path().to_path_buf()
        );
    }
}
