use crate::load_order::LOAD_ORDER_FILE;
use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use log::debug;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const GAME_ID: &str = "warhammer40kdarktide";
pub const GAME_NAME: &str = "Warhammer 40,000: Darktide";
pub const SHORT_NAME: &str = "Darktide";
pub const STEAM_APP_ID: &str = "1361210";
pub const MS_APP_ID: &str = "FatsharkAB.Warhammer40000DarktideNew";
pub const EXECUTABLE: &str = "binaries/Darktide.exe";
pub const MOD_DIR: &str = "mods";
pub const PATCHER: &str = "tools/dtkit-patch.exe";

// <Application Id=""> in the Game Pass appxmanifest.xml
const XBOX_EXEC_NAME: &str = "launcher.launcher";
const STEAM_FOLDERS: [&str; 2] = ["Warhammer 40,000 DARKTIDE", "Warhammer 40000 DARKTIDE"];
const XBOX_MARKERS: [&str; 2] = ["appxmanifest.xml", "MicrosoftGame.config"];

pub const LAUNCH_PARAMETERS: [&str; 8] = [
    "--bundle-dir",
    "../bundle",
    "--ini",
    "settings",
    "--backend-auth-service-url",
    "https://bsp-auth-prod.atoma.cloud",
    "--backend-title-service-url",
    "https://bsp-td-prod.atoma.cloud",
];

#[derive(Debug, Clone, Serialize)]
pub struct GamePaths {
    pub game_root: PathBuf,
    pub mods_dir: PathBuf,
    pub load_order_path: PathBuf,
    pub patcher_path: PathBuf,
}

impl GamePaths {
    pub fn from_root(game_root: &Path) -> Self {
        let mods_dir = game_root.join(MOD_DIR);
        Self {
            game_root: game_root.to_path_buf(),
            load_order_path: mods_dir.join(LOAD_ORDER_FILE),
            patcher_path: game_root.join(PATCHER),
            mods_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Launcher {
    Steam,
    Xbox {
        app_id: &'static str,
        app_exec_name: &'static str,
    },
}

impl Launcher {
    pub fn label(&self) -> &'static str {
        match self {
            Launcher::Steam => "steam",
            Launcher::Xbox { .. } => "xbox",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub id: &'static str,
    pub name: &'static str,
    pub executable: &'static str,
    pub required_files: Vec<&'static str>,
}

pub fn detect_paths(game_root_override: Option<&Path>) -> Result<GamePaths> {
    let game_root = match game_root_override {
        Some(path) => path.to_path_buf(),
        None => find_game_root().context("locate Darktide game directory")?,
    };

    if !looks_like_game_root(&game_root) {
        bail!(
            "invalid game root: expected {EXECUTABLE} in {}",
            game_root.display()
        );
    }

    Ok(GamePaths::from_root(&game_root))
}

/// Creates the mods directory and an empty load order file when missing.
pub fn setup(paths: &GamePaths) -> Result<()> {
    fs::create_dir_all(&paths.mods_dir).context("create mods dir")?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.load_order_path)
        .context("create mod_load_order.txt")?;
    Ok(())
}

pub fn launcher_for(game_root: &Path) -> Launcher {
    if XBOX_MARKERS
        .iter()
        .any(|marker| game_root.join(marker).is_file())
    {
        return Launcher::Xbox {
            app_id: MS_APP_ID,
            app_exec_name: XBOX_EXEC_NAME,
        };
    }
    Launcher::Steam
}

pub fn supported_tools() -> Vec<Tool> {
    vec![Tool {
        id: "dtkit-patch",
        name: "Toggle modding (patch/unpatch game files)",
        executable: PATCHER,
        required_files: vec![PATCHER],
    }]
}

pub fn environment() -> Vec<(&'static str, &'static str)> {
    vec![("SteamAPPId", STEAM_APP_ID)]
}

pub fn looks_like_game_root(path: &Path) -> bool {
    path.join(EXECUTABLE).is_file()
}

fn find_game_root() -> Option<PathBuf> {
    steam_roots()
        .into_iter()
        .flat_map(|root| {
            let mut libraries = steam_libraries(&root);
            libraries.push(root);
            libraries
        })
        .flat_map(|library| {
            STEAM_FOLDERS
                .iter()
                .map(move |folder| library.join("steamapps").join("common").join(folder))
        })
        .find(|candidate| looks_like_game_root(candidate))
}

/// Default Steam install locations for the current user.
fn steam_roots() -> Vec<PathBuf> {
    let Some(dirs) = BaseDirs::new() else {
        return Vec::new();
    };
    vec![
        dirs.data_dir().join("Steam"),
        dirs.home_dir().join(".steam").join("steam"),
    ]
}

fn steam_libraries(steam_root: &Path) -> Vec<PathBuf> {
    let vdf = steam_root.join("steamapps").join("libraryfolders.vdf");
    match fs::read_to_string(&vdf) {
        Ok(raw) => library_paths_from_vdf(&raw),
        Err(err) => {
            debug!("no steam library list at {:?}: {err}", vdf);
            Vec::new()
        }
    }
}

/// Values of every `"path"` key in a `libraryfolders.vdf` document.
fn library_paths_from_vdf(raw: &str) -> Vec<PathBuf> {
    raw.lines()
        .filter_map(|line| {
            let mut quoted = line.split('"').skip(1).step_by(2);
            match (quoted.next(), quoted.next()) {
                (Some("path"), Some(value)) => Some(PathBuf::from(value.replace("\\\\", "\\"))),
                _ => None,
            }
        })
        .collect()
}
