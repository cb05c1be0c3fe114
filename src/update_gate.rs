use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const STATE_FILE: &str = "update_state.json";

/// Tracks a mod update started by the installer. While an update that spans
/// every profile is running, load order reads and writes are suspended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGate {
    #[serde(default)]
    pub updating_mod: Option<String>,
    #[serde(default)]
    pub all_profiles: bool,
}

impl UpdateGate {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = state_path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).context("read update state")?;
        let gate = serde_json::from_str(&raw).context("parse update state")?;
        Ok(gate)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = state_path(data_dir);
        let raw = serde_json::to_string_pretty(self).context("serialize update state")?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, raw).context("write update state temp")?;
        fs::rename(&temp, &path).context("finalize update state")?;
        Ok(())
    }

    pub fn begin(&mut self, mod_id: &str, all_profiles: bool) {
        self.updating_mod = Some(mod_id.to_string());
        self.all_profiles = all_profiles;
    }

    pub fn finish(&mut self) {
        self.updating_mod = None;
        self.all_profiles = false;
    }

    pub fn is_updating(&self) -> bool {
        self.updating_mod.is_some()
    }

    pub fn is_bulk_update(&self) -> bool {
        self.is_updating() && self.all_profiles
    }
}

pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_state_is_idle() {
        let temp = TempDir::new().unwrap();
        let gate = UpdateGate::load(temp.path()).unwrap();
        assert!(!gate.is_updating());
        assert!(!gate.is_bulk_update());
    }

    #[test]
    fn bulk_only_for_all_profile_updates() {
        let mut gate = UpdateGate::default();
        gate.begin("dmf", false);
        assert!(gate.is_updating());
        assert!(!gate.is_bulk_update());

        gate.begin("dmf", true);
        assert!(gate.is_bulk_update());

        gate.finish();
        assert_eq!(gate, UpdateGate::default());
    }

    #[test]
    fn state_survives_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut gate = UpdateGate::default();
        gate.begin("scoreboard", true);
        gate.save(temp.path()).unwrap();

        let loaded = UpdateGate::load(temp.path()).unwrap();
        assert!(loaded.is_bulk_update());
        assert_eq!(loaded.updating_mod.as_deref(), Some("scoreboard"));
    }
}
