use crate::darktide;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    #[default]
    Darktide,
}

impl GameId {
    pub fn display_name(self) -> &'static str {
        match self {
            GameId::Darktide => darktide::GAME_NAME,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            GameId::Darktide => darktide::SHORT_NAME,
        }
    }

    /// Nexus Mods domain.
    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Darktide => darktide::GAME_ID,
        }
    }
}

pub fn detect_paths(
    game: GameId,
    game_root_override: Option<&Path>,
) -> Result<darktide::GamePaths> {
    match game {
        GameId::Darktide => darktide::detect_paths(game_root_override),
    }
}

pub fn looks_like_game_root(game: GameId, path: &Path) -> bool {
    match game {
        GameId::Darktide => darktide::looks_like_game_root(path),
    }
}
