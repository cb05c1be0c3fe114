//! Load order management for Warhammer 40,000: Darktide mods.
//!
//! The game reads `mods/mod_load_order.txt` through the Darktide Mod
//! Framework (`dmf`). [`load_order::LoadOrderStore`] reconciles that file with
//! the mod folders on disk and writes it back in the game's format.

pub mod cli;
pub mod config;
pub mod darktide;
pub mod game;
pub mod install;
pub mod load_order;
pub mod logging;
pub mod patcher;
pub mod update_gate;
