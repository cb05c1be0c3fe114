use crate::load_order::{MANAGED_MARKER, MOD_EXTENSION};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Copy `source` (relative to the extracted archive) to `destination`
/// (relative to the game's mods directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallInstruction {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModRoot {
    dir: PathBuf,
    name: String,
}

/// True when the file list contains at least one `<name>/<name>.mod`.
pub fn is_supported(files: &[PathBuf]) -> bool {
    !mod_roots(files).is_empty()
}

pub fn install_instructions(files: &[PathBuf]) -> Result<Vec<InstallInstruction>> {
    let roots = mod_roots(files);
    if roots.is_empty() {
        bail!("no mod folder with a matching .{MOD_EXTENSION} file found");
    }

    let mut instructions = Vec::new();
    for file in files {
        if is_ignored_path(file) {
            continue;
        }
        let Some((root, rel)) = roots.iter().find_map(|root| {
            file.strip_prefix(&root.dir)
                .ok()
                .map(|rel| (root, rel.to_path_buf()))
        }) else {
            debug!("not installing {:?}: outside any mod folder", file);
            continue;
        };
        instructions.push(InstallInstruction {
            source: file.clone(),
            destination: Path::new(&root.name).join(rel),
        });
    }
    Ok(instructions)
}

/// Files under `source_root`, relative to it, in a stable order.
pub fn collect_files(source_root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source_root).follow_links(false) {
        let entry = entry.context("walk install source")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source_root)
            .context("rel path")?;
        files.push(rel.to_path_buf());
    }
    files.sort();
    Ok(files)
}

pub fn installed_mods(instructions: &[InstallInstruction]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for instruction in instructions {
        let Some(name) = instruction
            .destination
            .components()
            .next()
            .and_then(|component| component.as_os_str().to_str())
        else {
            continue;
        };
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
    names
}

/// Replaces any existing copy of each mod, then tags the folders as managed.
pub fn apply(
    source_root: &Path,
    instructions: &[InstallInstruction],
    mods_dir: &Path,
) -> Result<Vec<String>> {
    let names = installed_mods(instructions);
    for name in &names {
        let target = mods_dir.join(name);
        if target.exists() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("remove existing mod {name}"))?;
        }
    }

    for instruction in instructions {
        let source = source_root.join(&instruction.source);
        let dest = mods_dir.join(&instruction.destination);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).context("create file dir")?;
        }
        fs::copy(&source, &dest).with_context(|| format!("copy {:?}", instruction.source))?;
    }

    for name in &names {
        fs::write(mods_dir.join(name).join(MANAGED_MARKER), "")
            .with_context(|| format!("tag {name} as managed"))?;
        info!("installed {name} into {:?}", mods_dir);
    }
    Ok(names)
}

fn mod_roots(files: &[PathBuf]) -> Vec<ModRoot> {
    let mut roots: Vec<ModRoot> = Vec::new();
    for file in files {
        let Some(root) = descriptor_root(file) else {
            continue;
        };
        if !roots.iter().any(|existing| existing.dir == root.dir) {
            roots.push(root);
        }
    }
    roots.sort_by_key(|root| root.dir.components().count());
    roots
}

fn descriptor_root(file: &Path) -> Option<ModRoot> {
    if file.extension().and_then(|ext| ext.to_str()) != Some(MOD_EXTENSION) {
        return None;
    }
    let stem = file.file_stem()?.to_str()?;
    let dir = file.parent()?;
    let folder = dir.file_name()?.to_str()?;
    (stem == folder).then(|| ModRoot {
        dir: dir.to_path_buf(),
        name: folder.to_string(),
    })
}

fn is_ignored_path(path: &Path) -> bool {
    path.components().any(|component| {
        let part = component.as_os_str().to_string_lossy();
        part.eq_ignore_ascii_case("__MACOSX")
            || part.eq_ignore_ascii_case(".ds_store")
            || part.eq_ignore_ascii_case("thumbs.db")
            || part == ".git"
    })
}
