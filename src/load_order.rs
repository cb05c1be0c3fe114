use crate::update_gate::UpdateGate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const LOAD_ORDER_FILE: &str = "mod_load_order.txt";
pub const HEADER: &str = "-- File managed by Vortex mod manager";
pub const COMMENT_MARKER: &str = "--";
pub const MOD_EXTENSION: &str = "mod";
pub const MANAGED_MARKER: &str = "__folder_managed_by_vortex";
pub const BACKUP_SUFFIX: &str = ".mod.vortex_backup";

/// Loaded by the patched game before anything in the load order.
pub const BOOTSTRAP_ID: &str = "dmf";
pub const BASE_ID: &str = "base";

pub const UPDATE_IN_PROGRESS_ID: &str =
    "Mods are being updated for all profiles. Please wait for the update to finish.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_id: Option<String>,
    pub enabled: bool,
}

impl ModEntry {
    pub fn new(id: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            managed_id: None,
            enabled,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.managed_id.is_some()
    }

    fn update_placeholder() -> Self {
        Self::new(UPDATE_IN_PROGRESS_ID, false)
    }
}

pub type LoadOrder = Vec<ModEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Only enabled mods are written; omission means disabled.
    #[default]
    Filter,
    /// Every mod is written; disabled ones behind the comment marker.
    Comment,
}

impl Encoding {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "filter" => Some(Encoding::Filter),
            "comment" => Some(Encoding::Comment),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Filter => "filter",
            Encoding::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewEntryOrder {
    ScanOrder,
    CaseInsensitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPolicy {
    pub encoding: Encoding,
    pub reserved_ids: Vec<String>,
    pub new_entries: NewEntryOrder,
    pub discovered_enabled: bool,
}

impl OrderPolicy {
    pub fn filter() -> Self {
        Self {
            encoding: Encoding::Filter,
            reserved_ids: vec![BOOTSTRAP_ID.to_string()],
            new_entries: NewEntryOrder::ScanOrder,
            discovered_enabled: true,
        }
    }

    pub fn comment() -> Self {
        Self {
            encoding: Encoding::Comment,
            reserved_ids: vec![BOOTSTRAP_ID.to_string(), BASE_ID.to_string()],
            new_entries: NewEntryOrder::CaseInsensitive,
            discovered_enabled: true,
        }
    }

    pub fn for_encoding(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Filter => Self::filter(),
            Encoding::Comment => Self::comment(),
        }
    }

    pub fn with_discovered_enabled(mut self, enabled: bool) -> Self {
        self.discovered_enabled = enabled;
        self
    }

    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved_ids.iter().any(|reserved| reserved == id)
    }
}

#[derive(Debug, Error)]
pub enum LoadOrderError {
    #[error("mods directory not found: {0:?}")]
    MissingModsDir(PathBuf),
    #[error("load order file not found: {0:?}")]
    MissingLoadOrderFile(PathBuf),
    #[error("read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("scan {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mod {0:?} is not in the load order")]
    UnknownMod(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedLine {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModFolder {
    pub name: String,
    pub managed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct LoadOrderStore {
    mods_dir: PathBuf,
    policy: OrderPolicy,
}

impl LoadOrderStore {
    pub fn new(mods_dir: impl Into<PathBuf>, policy: OrderPolicy) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &OrderPolicy {
        &self.policy
    }

    pub fn load_order_path(&self) -> PathBuf {
        self.mods_dir.join(LOAD_ORDER_FILE)
    }

    pub fn load(&self, gate: &UpdateGate) -> Result<LoadOrder, LoadOrderError> {
        if gate.is_bulk_update() {
            info!("bulk mod update in progress, returning placeholder load order");
            return Ok(vec![ModEntry::update_placeholder()]);
        }

        match fs::metadata(&self.mods_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(LoadOrderError::MissingModsDir(self.mods_dir.clone())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(LoadOrderError::MissingModsDir(self.mods_dir.clone()))
            }
            Err(source) => {
                return Err(LoadOrderError::Read {
                    path: self.mods_dir.clone(),
                    source,
                })
            }
        }

        let path = self.load_order_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(LoadOrderError::MissingLoadOrderFile(path))
            }
            Err(source) => return Err(LoadOrderError::Read { path, source }),
        };

        let persisted = parse_lines(&raw, self.policy.encoding);
        let folders = scan_mod_folders(&self.mods_dir)?;
        let order = merge(&persisted, &folders, &self.policy);
        debug!(
            "loaded {} mod(s) from {:?} ({} persisted line(s), {} folder(s))",
            order.len(),
            path,
            persisted.len(),
            folders.len()
        );
        Ok(order)
    }

    pub fn store(
        &self,
        order: &[ModEntry],
        gate: &UpdateGate,
    ) -> Result<StoreOutcome, LoadOrderError> {
        if gate.is_bulk_update() {
            info!("bulk mod update in progress, load order left untouched");
            return Ok(StoreOutcome::Skipped);
        }

        let path = self.load_order_path();
        let raw = serialize(order, self.policy.encoding);
        write_replace(&path, &raw)?;
        info!(
            "wrote {} mod(s) to {:?} ({} encoding)",
            order.len(),
            path,
            self.policy.encoding.as_str()
        );
        Ok(StoreOutcome::Written)
    }
}

pub fn parse_lines(raw: &str, encoding: Encoding) -> Vec<PersistedLine> {
    let mut lines = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line == HEADER {
            continue;
        }

        match encoding {
            Encoding::Filter => {
                // Lua comments.
                if line.starts_with(COMMENT_MARKER) {
                    continue;
                }
                lines.push(PersistedLine {
                    id: line.to_string(),
                    enabled: true,
                });
            }
            Encoding::Comment => {
                if let Some(rest) = line.strip_prefix(COMMENT_MARKER) {
                    let id = rest.strip_prefix(' ').unwrap_or(rest);
                    if id.is_empty() {
                        continue;
                    }
                    lines.push(PersistedLine {
                        id: id.to_string(),
                        enabled: false,
                    });
                } else {
                    lines.push(PersistedLine {
                        id: line.to_string(),
                        enabled: true,
                    });
                }
            }
        }
    }
    lines
}

pub fn serialize(order: &[ModEntry], encoding: Encoding) -> String {
    let body: Vec<String> = order
        .iter()
        .filter(|entry| entry.id != UPDATE_IN_PROGRESS_ID)
        .filter_map(|entry| match (encoding, entry.enabled) {
            (_, true) => Some(entry.id.clone()),
            (Encoding::Filter, false) => None,
            (Encoding::Comment, false) => Some(format!("{COMMENT_MARKER} {}", entry.id)),
        })
        .collect();
    format!("{HEADER}\n{}", body.join("\n"))
}

/// Immediate subfolders of `mods_dir` that carry a readable `<name>/<name>.mod`,
/// sorted by name.
pub fn scan_mod_folders(mods_dir: &Path) -> Result<Vec<ModFolder>, LoadOrderError> {
    let scan_err = |source: io::Error| LoadOrderError::Scan {
        path: mods_dir.to_path_buf(),
        source,
    };

    let mut folders = Vec::new();
    for entry in fs::read_dir(mods_dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let path = entry.path();
        if !dir_exists(&path) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(|name| name.to_string()) else {
            debug!("skipping non UTF-8 folder {:?}", path);
            continue;
        };
        if !is_listable_name(&name) {
            debug!("skipping {name:?}: name cannot be written as a load order line");
            continue;
        }

        let descriptor = path.join(format!("{name}.{MOD_EXTENSION}"));
        if !descriptor_readable(&descriptor) {
            debug!("skipping {name}: no readable {name}.{MOD_EXTENSION}");
            continue;
        }

        let managed = file_exists(&path.join(MANAGED_MARKER))
            || file_exists(&path.join(format!("{name}{BACKUP_SUFFIX}")));
        folders.push(ModFolder { name, managed });
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// A line starting with the comment marker reads back as a disabled entry (or a
/// Lua comment), and surrounding whitespace is trimmed on parse.
fn is_listable_name(name: &str) -> bool {
    !name.starts_with(COMMENT_MARKER) && name.trim() == name
}

/// `folders` is expected in scan order.
pub fn merge(
    persisted: &[PersistedLine],
    folders: &[ModFolder],
    policy: &OrderPolicy,
) -> LoadOrder {
    let on_disk: HashMap<&str, &ModFolder> = folders
        .iter()
        .map(|folder| (folder.name.as_str(), folder))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();

    for line in persisted {
        let Some(folder) = on_disk.get(line.id.as_str()) else {
            debug!("pruning {:?}: no mod folder on disk", line.id);
            continue;
        };
        if !seen.insert(folder.name.as_str()) || policy.is_reserved(&folder.name) {
            continue;
        }
        order.push(entry_for(folder, line.enabled));
    }

    let mut discovered: Vec<&ModFolder> = folders
        .iter()
        .filter(|folder| !seen.contains(folder.name.as_str()))
        .filter(|folder| !policy.is_reserved(&folder.name))
        .collect();
    if policy.new_entries == NewEntryOrder::CaseInsensitive {
        discovered.sort_by_cached_key(|folder| folder.name.to_lowercase());
    }

    for folder in discovered {
        order.push(entry_for(folder, policy.discovered_enabled));
    }

    order
}

pub fn set_enabled(
    order: &mut [ModEntry],
    id: &str,
    enabled: bool,
) -> Result<(), LoadOrderError> {
    let entry = order
        .iter_mut()
        .find(|entry| entry.id == id)
        .ok_or_else(|| LoadOrderError::UnknownMod(id.to_string()))?;
    entry.enabled = enabled;
    Ok(())
}

/// Moves `id` to `index`, clamped to the end of the order.
pub fn move_entry(order: &mut LoadOrder, id: &str, index: usize) -> Result<(), LoadOrderError> {
    let from = order
        .iter()
        .position(|entry| entry.id == id)
        .ok_or_else(|| LoadOrderError::UnknownMod(id.to_string()))?;
    let entry = order.remove(from);
    let index = index.min(order.len());
    order.insert(index, entry);
    Ok(())
}

fn entry_for(folder: &ModFolder, enabled: bool) -> ModEntry {
    ModEntry {
        id: folder.name.clone(),
        managed_id: folder.managed.then(|| folder.name.clone()),
        enabled,
    }
}

fn write_replace(path: &Path, raw: &str) -> Result<(), LoadOrderError> {
    let write_err = |source: io::Error| LoadOrderError::Write {
        path: path.to_path_buf(),
        source,
    };
    let temp = path.with_extension("txt.tmp");
    fs::write(&temp, raw).map_err(write_err)?;
    if let Err(source) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(write_err(source));
    }
    Ok(())
}

fn dir_exists(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_dir(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!("cannot stat {:?}: {err}", path);
            false
        }
    }
}

fn file_exists(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!("cannot stat {:?}: {err}", path);
            false
        }
    }
}

fn descriptor_readable(path: &Path) -> bool {
    match fs::File::open(path) {
        Ok(file) => file.metadata().map(|meta| meta.is_file()).unwrap_or(false),
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!("cannot read mod descriptor {:?}: {err}", path);
            false
        }
    }
}
