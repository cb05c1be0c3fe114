use crate::{
    config::{self, AppConfig},
    darktide::{self, GamePaths, Launcher, Tool},
    game, install,
    load_order::{
        self, Encoding, LoadOrder, LoadOrderError, LoadOrderStore, ModEntry, StoreOutcome,
    },
    logging, patcher,
    update_gate::UpdateGate,
};
use anyhow::{anyhow, bail, Context, Result};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

const BULK_UPDATE_NOTICE: &str =
    "Mods are being updated for all profiles; the load order was left unchanged.";

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Default)]
struct GlobalOptions {
    format: OutputFormat,
    game_root: Option<PathBuf>,
    encoding: Option<Encoding>,
    data_dir: Option<PathBuf>,
    verbose: bool,
}

enum CliCommand {
    OrderList,
    OrderEnable(String),
    OrderDisable(String),
    OrderMove { id: String, index: usize },
    Setup,
    Paths,
    Install { source: PathBuf, all_profiles: bool },
    UpdateStatus,
    UpdateClear,
    Deploy,
    Purge,
    Patch,
    Help,
    Version,
}

struct Session {
    config: AppConfig,
    global: GlobalOptions,
}

impl Session {
    fn paths(&self) -> Result<GamePaths> {
        let root = self
            .global
            .game_root
            .as_deref()
            .or(self.config.game_root.as_deref());
        game::detect_paths(self.config.game_id, root)
    }

    fn store(&self, paths: &GamePaths) -> LoadOrderStore {
        LoadOrderStore::new(
            paths.mods_dir.clone(),
            self.config.order_policy(self.global.encoding),
        )
    }

    fn gate(&self) -> Result<UpdateGate> {
        UpdateGate::load(&self.config.data_dir)
    }
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("darktide-order v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let data_dir = config::resolve_data_dir(global.data_dir.as_deref())?;
            logging::init(&data_dir, global.verbose)?;
            let config = AppConfig::load_or_create(&data_dir)?;
            let mut session = Session { config, global };
            run_command(&mut session, command)
        }
    }
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = option_value(arg, "--format", &mut iter)? {
            global.format = OutputFormat::parse(&value)
                .ok_or_else(|| anyhow!("Unknown format: {value} (use 'text' or 'json')"))?;
            continue;
        }
        if let Some(value) = option_value(arg, "--encoding", &mut iter)? {
            let encoding = Encoding::parse(&value)
                .ok_or_else(|| anyhow!("Unknown encoding: {value} (use 'filter' or 'comment')"))?;
            global.encoding = Some(encoding);
            continue;
        }
        if let Some(value) = option_value(arg, "--game-root", &mut iter)? {
            global.game_root = Some(PathBuf::from(value));
            continue;
        }
        if let Some(value) = option_value(arg, "--data-dir", &mut iter)? {
            global.data_dir = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--verbose" || arg == "-v" {
            global.verbose = true;
            continue;
        }
        tokens.push(arg.to_string());
    }

    Ok((global, tokens))
}

fn option_value(
    arg: &str,
    name: &str,
    iter: &mut std::slice::Iter<'_, String>,
) -> Result<Option<String>> {
    if let Some(value) = arg.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')) {
        return Ok(Some(value.to_string()));
    }
    if arg == name {
        let value = iter
            .next()
            .ok_or_else(|| anyhow!("{name} requires a value"))?;
        return Ok(Some(value.to_string()));
    }
    Ok(None)
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "help" | "--help" | "-h" => CliCommand::Help,
        "version" | "--version" | "-V" => CliCommand::Version,
        "order" => parse_order(rest)?,
        "setup" => CliCommand::Setup,
        "paths" => CliCommand::Paths,
        "install" => parse_install(rest)?,
        "update" => match rest.first().map(|value| value.as_str()).unwrap_or("status") {
            "status" => CliCommand::UpdateStatus,
            "clear" => CliCommand::UpdateClear,
            other => bail!("Unknown update command: {other} (use 'status' or 'clear')"),
        },
        "deploy" => CliCommand::Deploy,
        "purge" => CliCommand::Purge,
        "patch" => CliCommand::Patch,
        other => bail!("Unknown command: {other} (see 'darktide-order help')"),
    };
    Ok(command)
}

fn parse_order(args: &[String]) -> Result<CliCommand> {
    let sub = args.first().map(|value| value.as_str()).unwrap_or("list");
    let mod_id = || {
        args.get(1)
            .cloned()
            .ok_or_else(|| anyhow!("order {sub} requires a mod id"))
    };
    match sub {
        "list" => Ok(CliCommand::OrderList),
        "enable" => Ok(CliCommand::OrderEnable(mod_id()?)),
        "disable" => Ok(CliCommand::OrderDisable(mod_id()?)),
        "move" => {
            let id = mod_id()?;
            let raw = args
                .get(2)
                .ok_or_else(|| anyhow!("order move requires a target index"))?;
            let index = raw
                .parse::<usize>()
                .with_context(|| format!("invalid index: {raw}"))?;
            Ok(CliCommand::OrderMove { id, index })
        }
        other => bail!(
            "Unknown order command: {other} (use 'list', 'enable', 'disable', or 'move')"
        ),
    }
}

fn parse_install(args: &[String]) -> Result<CliCommand> {
    let mut source = None;
    let mut all_profiles = false;
    for arg in args {
        match arg.as_str() {
            "--all-profiles" => all_profiles = true,
            value if value.starts_with('-') => bail!("Unknown install option: {value}"),
            value => {
                if source.is_some() {
                    bail!("install takes a single folder");
                }
                source = Some(PathBuf::from(value));
            }
        }
    }
    let source = source.ok_or_else(|| anyhow!("install requires an extracted mod folder"))?;
    Ok(CliCommand::Install {
        source,
        all_profiles,
    })
}

fn run_command(session: &mut Session, command: CliCommand) -> Result<()> {
    match command {
        CliCommand::OrderList => list_order(session),
        CliCommand::OrderEnable(id) => update_order(session, &format!("Enabled {id}"), |order| {
            load_order::set_enabled(order, &id, true)
        }),
        CliCommand::OrderDisable(id) => {
            update_order(session, &format!("Disabled {id}"), |order| {
                load_order::set_enabled(order, &id, false)
            })
        }
        CliCommand::OrderMove { id, index } => {
            update_order(session, &format!("Moved {id} to {index}"), |order| {
                load_order::move_entry(order, &id, index)
            })
        }
        CliCommand::Setup => setup(session),
        CliCommand::Paths => list_paths(session),
        CliCommand::Install {
            source,
            all_profiles,
        } => install_mod(session, &source, all_profiles),
        CliCommand::UpdateStatus => update_status(session),
        CliCommand::UpdateClear => {
            UpdateGate::default().save(&session.config.data_dir)?;
            println!("Cleared mod update state.");
            Ok(())
        }
        CliCommand::Deploy => {
            let mut gate = session.gate()?;
            if gate.is_updating() {
                gate.finish();
                gate.save(&session.config.data_dir)?;
            }
            run_patcher(session)
        }
        CliCommand::Purge | CliCommand::Patch => run_patcher(session),
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

#[derive(Serialize)]
struct OrderOutput<'a> {
    encoding: &'static str,
    load_order_path: String,
    update_in_progress: bool,
    entries: &'a [ModEntry],
}

fn list_order(session: &Session) -> Result<()> {
    let paths = session.paths()?;
    let gate = session.gate()?;
    let store = session.store(&paths);
    let order = store.load(&gate)?;

    let output = OrderOutput {
        encoding: store.policy().encoding.as_str(),
        load_order_path: store.load_order_path().display().to_string(),
        update_in_progress: gate.is_bulk_update(),
        entries: &order,
    };

    match session.global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!(
                "Load order ({} encoding): {}",
                output.encoding, output.load_order_path
            );
            if order.is_empty() {
                println!("No mods found.");
            }
            for (index, entry) in order.iter().enumerate() {
                let enabled = if entry.enabled { "x" } else { " " };
                let hint = if entry.is_managed() || output.update_in_progress {
                    ""
                } else {
                    "  (not managed)"
                };
                println!("{:>3} [{enabled}] {}{hint}", index + 1, entry.id);
            }
        }
    }

    Ok(())
}

fn update_order<F>(session: &Session, summary: &str, mutate: F) -> Result<()>
where
    F: FnOnce(&mut LoadOrder) -> Result<(), LoadOrderError>,
{
    let paths = session.paths()?;
    let gate = session.gate()?;
    if gate.is_bulk_update() {
        println!("{BULK_UPDATE_NOTICE}");
        return Ok(());
    }

    let store = session.store(&paths);
    let mut order = store.load(&gate)?;
    mutate(&mut order)?;
    match store.store(&order, &gate)? {
        StoreOutcome::Written => println!("{summary}"),
        StoreOutcome::Skipped => println!("{BULK_UPDATE_NOTICE}"),
    }
    Ok(())
}

fn setup(session: &mut Session) -> Result<()> {
    let paths = session.paths()?;
    darktide::setup(&paths)?;
    session.config.game_root = Some(paths.game_root.clone());
    session.config.save()?;
    info!("prepared mods directory {:?}", paths.mods_dir);
    println!("Prepared {}", paths.mods_dir.display());
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    game_id: &'static str,
    game_name: &'static str,
    short_name: &'static str,
    paths: Option<GamePaths>,
    executable: &'static str,
    parameters: Vec<&'static str>,
    environment: Vec<(&'static str, &'static str)>,
    launcher: Option<Launcher>,
    tools: Vec<Tool>,
    data_dir: String,
    error: Option<String>,
}

fn list_paths(session: &Session) -> Result<()> {
    let game_id = session.config.game_id;
    let (paths, error) = match session.paths() {
        Ok(paths) => (Some(paths), None),
        Err(err) => (None, Some(format!("{err:#}"))),
    };

    let output = PathsOutput {
        game_id: game_id.as_str(),
        game_name: game_id.display_name(),
        short_name: game_id.short_name(),
        launcher: paths
            .as_ref()
            .map(|paths| darktide::launcher_for(&paths.game_root)),
        paths,
        executable: darktide::EXECUTABLE,
        parameters: darktide::LAUNCH_PARAMETERS.to_vec(),
        environment: darktide::environment(),
        tools: darktide::supported_tools(),
        data_dir: session.config.data_dir.display().to_string(),
        error,
    };

    match session.global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!(
                "Game: {} [{}] ({})",
                output.game_name, output.short_name, output.game_id
            );
            if let Some(paths) = &output.paths {
                println!("Game root: {}", paths.game_root.display());
                println!("Mods dir: {}", paths.mods_dir.display());
                println!("Load order: {}", paths.load_order_path.display());
                println!("Patcher: {}", paths.patcher_path.display());
            }
            if let Some(launcher) = &output.launcher {
                println!("Launcher: {}", launcher.label());
            }
            println!(
                "Executable: {} {}",
                output.executable,
                output.parameters.join(" ")
            );
            for tool in &output.tools {
                println!("Tool: {} ({})", tool.name, tool.executable);
            }
            println!("Data dir: {}", output.data_dir);
            if let Some(error) = output.error {
                println!("Warning: {error}");
            }
        }
    }

    Ok(())
}

fn install_mod(session: &Session, source: &Path, all_profiles: bool) -> Result<()> {
    let paths = session.paths()?;
    let files = install::collect_files(source)?;
    if !install::is_supported(&files) {
        bail!(
            "{} does not contain a Darktide mod (<name>/<name>.mod)",
            source.display()
        );
    }
    let instructions = install::install_instructions(&files)?;
    let names = install::installed_mods(&instructions);

    let data_dir = &session.config.data_dir;
    let mut gate = session.gate()?;
    gate.begin(&names.join(", "), all_profiles);
    gate.save(data_dir)?;
    let result = install::apply(source, &instructions, &paths.mods_dir);
    gate.finish();
    gate.save(data_dir)?;
    let names = result?;

    match session.global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        OutputFormat::Text => {
            for name in names {
                println!("Installed {name}");
            }
        }
    }
    Ok(())
}

fn update_status(session: &Session) -> Result<()> {
    let gate = session.gate()?;
    match session.global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&gate)?);
        }
        OutputFormat::Text => match &gate.updating_mod {
            None => println!("No mod update in progress."),
            Some(mod_id) => {
                let scope = if gate.all_profiles {
                    "all profiles"
                } else {
                    "current profile"
                };
                println!("Updating {mod_id} ({scope})");
            }
        },
    }
    Ok(())
}

fn run_patcher(session: &Session) -> Result<()> {
    let paths = session.paths()?;
    patcher::run_patcher(&paths);
    println!("Ran dtkit-patch in {}", paths.game_root.display());
    Ok(())
}

fn print_help() {
    println!("darktide-order v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  darktide-order order [list]             Show the load order");
    println!("  darktide-order order enable <id>        Enable a mod");
    println!("  darktide-order order disable <id>       Disable a mod");
    println!("  darktide-order order move <id> <index>  Move a mod to a zero-based position");
    println!("  darktide-order setup                    Create mods/ and mod_load_order.txt");
    println!("  darktide-order paths                    Show detected paths and tools");
    println!("  darktide-order install <dir>            Install an extracted mod folder");
    println!("  darktide-order update status|clear      Show or clear the mod update state");
    println!("  darktide-order deploy | purge | patch   Run dtkit-patch");
    println!();
    println!("Global options:");
    println!("  --format <json|text>            Output format");
    println!("  --game-root <path>              Darktide install folder");
    println!("  --encoding <filter|comment>     How disabled mods are stored");
    println!("  --data-dir <path>               Config and log folder");
    println!("  -v, --verbose                   Debug logging");
    println!("  -h, --help                      Show help");
    println!("  -V, --version                   Show version");
    println!();
    println!("Install options:");
    println!("  --all-profiles                  Block load order edits until the install ends");
}
