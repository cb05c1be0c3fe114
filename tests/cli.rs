use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs, path::Path};
use tempfile::TempDir;

struct Fixture {
    home: TempDir,
    game: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let game = tempfile::tempdir().unwrap();
        fs::create_dir_all(game.path().join("binaries")).unwrap();
        fs::write(game.path().join("binaries").join("Darktide.exe"), "").unwrap();
        Self {
            home: tempfile::tempdir().unwrap(),
            game,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("darktide-order").unwrap();
        cmd.env("DARKTIDE_ORDER_HOME", self.home.path())
            .arg("--game-root")
            .arg(self.game.path());
        cmd
    }

    fn mods_dir(&self) -> std::path::PathBuf {
        self.game.path().join("mods")
    }

    fn add_mod(&self, name: &str) {
        let folder = self.mods_dir().join(name);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(format!("{name}.mod")), "return {}").unwrap();
    }

    fn load_order(&self) -> String {
        fs::read_to_string(self.mods_dir().join("mod_load_order.txt")).unwrap()
    }
}

fn write_mod(root: &Path, name: &str) {
    let folder = root.join(name);
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join(format!("{name}.mod")), "return {}").unwrap();
}

#[test]
fn setup_then_list() {
    let fixture = Fixture::new();
    fixture.cmd().arg("setup").assert().success();
    assert!(fixture.mods_dir().join("mod_load_order.txt").is_file());

    fixture.add_mod("dmf");
    fixture.add_mod("scoreboard");
    fixture.add_mod("ammo_hud");

    fixture
        .cmd()
        .args(["order", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] ammo_hud  (not managed)"))
        .stdout(predicate::str::contains("[x] scoreboard"))
        .stdout(predicate::str::contains("] dmf").not());
}

#[test]
fn list_without_setup_fails() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["order", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mods directory not found"));
}

#[test]
fn disable_with_comment_encoding_keeps_entry() {
    let fixture = Fixture::new();
    fixture.cmd().arg("setup").assert().success();
    fixture.add_mod("ammo_hud");
    fixture.add_mod("scoreboard");

    fixture
        .cmd()
        .args(["--encoding", "comment", "order", "disable", "ammo_hud"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disabled ammo_hud"));

    assert_eq!(
        fixture.load_order(),
        "-- File managed by Vortex mod manager\n-- ammo_hud\nscoreboard"
    );

    fixture
        .cmd()
        .args(["--encoding=comment", "--format", "json", "order"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"ammo_hud\""))
        .stdout(predicate::str::contains("\"enabled\": false"));
}

#[test]
fn move_with_filter_encoding() {
    let fixture = Fixture::new();
    fixture.cmd().arg("setup").assert().success();
    fixture.add_mod("a");
    fixture.add_mod("b");
    fixture.add_mod("c");

    fixture
        .cmd()
        .args(["order", "move", "c", "0"])
        .assert()
        .success();

    assert_eq!(
        fixture.load_order(),
        "-- File managed by Vortex mod manager\nc\na\nb"
    );

    fixture
        .cmd()
        .args(["order", "enable", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the load order"));
}

#[test]
fn bulk_update_blocks_load_order() {
    let fixture = Fixture::new();
    fixture.cmd().arg("setup").assert().success();
    fixture.add_mod("scoreboard");
    fs::write(fixture.mods_dir().join("mod_load_order.txt"), "scoreboard").unwrap();
    fs::write(
        fixture.home.path().join("update_state.json"),
        r#"{ "updating_mod": "scoreboard", "all_profiles": true }"#,
    )
    .unwrap();

    fixture
        .cmd()
        .args(["order", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Please wait for the update to finish"));

    fixture
        .cmd()
        .args(["order", "disable", "scoreboard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("left unchanged"));
    assert_eq!(fixture.load_order(), "scoreboard");

    fixture.cmd().args(["update", "clear"]).assert().success();
    fixture
        .cmd()
        .args(["update", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No mod update in progress"));
    fixture
        .cmd()
        .args(["order", "disable", "scoreboard"])
        .assert()
        .success();
    assert_eq!(
        fixture.load_order(),
        "-- File managed by Vortex mod manager\n"
    );
}

#[test]
fn update_clear_recovers_from_corrupt_state() {
    let fixture = Fixture::new();
    fixture.cmd().arg("setup").assert().success();
    fixture.add_mod("scoreboard");
    fs::write(fixture.home.path().join("update_state.json"), "{ not json").unwrap();

    fixture
        .cmd()
        .args(["order", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse update state"));

    fixture
        .cmd()
        .args(["update", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared mod update state."));

    fixture
        .cmd()
        .args(["order", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] scoreboard"));
}

#[test]
fn install_marks_mod_as_managed() {
    let fixture = Fixture::new();
    fixture.cmd().arg("setup").assert().success();

    let download = tempfile::tempdir().unwrap();
    write_mod(&download.path().join("Scoreboard-21-1-0"), "scoreboard");

    fixture
        .cmd()
        .arg("install")
        .arg(download.path())
        .arg("--all-profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed scoreboard"));

    assert!(fixture
        .mods_dir()
        .join("scoreboard")
        .join("__folder_managed_by_vortex")
        .is_file());

    fixture
        .cmd()
        .args(["order"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] scoreboard\n"));
}

#[test]
fn install_rejects_unknown_content() {
    let fixture = Fixture::new();
    let download = tempfile::tempdir().unwrap();
    fs::write(download.path().join("readme.txt"), "hello").unwrap();

    fixture
        .cmd()
        .arg("install")
        .arg(download.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not contain a Darktide mod"));
}

#[test]
fn paths_reports_tools() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["--format", "json", "paths"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"game_id\": \"warhammer40kdarktide\""))
        .stdout(predicate::str::contains("tools/dtkit-patch.exe"))
        .stdout(predicate::str::contains("\"kind\": \"steam\""));
}

#[test]
fn patch_without_patcher_still_succeeds() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .arg("patch")
        .assert()
        .success()
        .stderr(predicate::str::contains("dtkit-patch not found"));
}
