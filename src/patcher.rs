use crate::darktide::GamePaths;
use log::{info, warn};
use std::process::{Command, Stdio};

/// Runs `dtkit-patch`, which toggles the game's bundle patch so that `dmf`
/// gets loaded. The result is logged and otherwise ignored.
pub fn run_patcher(paths: &GamePaths) {
    let exe = &paths.patcher_path;
    if !exe.is_file() {
        warn!("dtkit-patch not found at {:?}, skipping", exe);
        return;
    }

    let status = Command::new(exe)
        .current_dir(&paths.game_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => info!("dtkit-patch finished"),
        Ok(status) => warn!("dtkit-patch exited with {status}"),
        Err(err) => warn!("failed to start dtkit-patch: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_patcher_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let paths = GamePaths::from_root(temp.path());
        run_patcher(&paths);
    }

    #[cfg(unix)]
    #[test]
    fn failing_patcher_is_swallowed() {
        use std::{fs, os::unix::fs::PermissionsExt};

        let temp = TempDir::new().unwrap();
        let paths = GamePaths::from_root(temp.path());
        fs::create_dir_all(paths.patcher_path.parent().unwrap()).unwrap();
        fs::write(&paths.patcher_path, "#!/bin/sh\nexit 3\n").unwrap();
        fs::set_permissions(&paths.patcher_path, fs::Permissions::from_mode(0o755)).unwrap();

        run_patcher(&paths);
    }
}
