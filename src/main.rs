use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clipkeep::clipboard::{create_source, ClipboardManager};
use clipkeep::error::ErrorKind;
use clipkeep::hotkey::{self, grammar_help, HotkeyBinder};
use clipkeep::logging;
use clipkeep::models::history::{MAX_MAX_ITEMS, MIN_MAX_ITEMS};
use clipkeep::storage::{
    ensure_directories, Configuration, ConfigEvent, JsonHistoryStorage, CONFIG_FILE, HISTORY_FILE,
};

const POLL_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Parser)]
#[command(name = "clipkeep")]
#[command(about = "Clipboard history daemon with global hotkey", long_about = None)]
struct Cli {
    /// Validate and simulate this hotkey, then exit
    #[arg(long, value_name = "KEY")]
    test_hotkey: Option<String>,

    /// Print the hotkey grammar and supported keys, then exit
    #[arg(long)]
    list_hotkeys: bool,

    /// Override the configured hotkey for this session
    #[arg(long)]
    hotkey: Option<String>,

    /// Override the configured history limit for this session
    #[arg(long, value_parser = clap::value_parser!(u32).range(MIN_MAX_ITEMS as i64..=MAX_MAX_ITEMS as i64))]
    history_limit: Option<u32>,

    /// Run without a system tray icon
    #[arg(long)]
    no_tray: bool,

    /// Echo debug logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Use this directory for config and history instead of XDG paths
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap would exit with 2; this daemon reserves 1 for all failures.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if cli.list_hotkeys {
        println!("{}", grammar_help());
        return ExitCode::SUCCESS;
    }

    if let Some(hotkey) = cli.test_hotkey.as_deref() {
        return cmd_test_hotkey(hotkey);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Register the given hotkey in test mode, fire it once, and report.
fn cmd_test_hotkey(hotkey: &str) -> ExitCode {
    hotkey::set_test_mode(true);
    let mut binder = HotkeyBinder::new();
    let mut triggered = false;
    binder.on_triggered(|| println!("hotkey triggered"));
    if binder.register_hotkey(hotkey) {
        println!(
            "registered {}",
            binder.hotkey_string().unwrap_or_default()
        );
        triggered = binder.simulate_trigger();
        binder.unregister_hotkey();
    } else if let Some(e) = binder.last_error() {
        eprintln!("Error: {}", e);
    }
    hotkey::set_test_mode(false);

    if triggered {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn resolve_dirs(cli: &Cli) -> Result<(PathBuf, PathBuf)> {
    if let Some(dir) = &cli.config_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
        return Ok((dir.clone(), dir.clone()));
    }
    ensure_directories()
}

fn run(cli: Cli) -> Result<()> {
    let (data_dir, config_dir) = resolve_dirs(&cli)?;

    logging::init_logger(data_dir.join("clipkeep.log"), "info", cli.verbose)?;
    log::info!("clipkeep starting (pid {})", std::process::id());

    let mut config = Configuration::load(config_dir.join(CONFIG_FILE));
    if let Some(limit) = cli.history_limit {
        config.set_max_history_items(limit as usize);
    }
    if let Some(hotkey) = &cli.hotkey {
        if !config.set_hotkey(hotkey) {
            anyhow::bail!("invalid hotkey {:?} (see --list-hotkeys)", hotkey);
        }
    }
    // Session overrides are not persisted; drop their change events.
    config.take_events();

    // No clipboard source means the daemon cannot do its job.
    let source = create_source()?;
    log::info!("using {} clipboard source", source.name());

    let storage = JsonHistoryStorage::new(
        config_dir.join(HISTORY_FILE),
        config.max_history_items(),
    );
    let hotkey_string = config.hotkey().to_string();
    let mut manager = ClipboardManager::new(config, source, storage);
    manager.on_event(|event| log::debug!("manager event: {:?}", event));

    // A failed hotkey registration degrades the daemon, not kills it.
    let mut binder = HotkeyBinder::new();
    if !binder.register_hotkey(&hotkey_string) {
        log::warn!(
            "hotkey {} unavailable, popup reachable only via tray/CLI",
            hotkey_string
        );
    }

    if cli.no_tray {
        log::info!("running without system tray");
    } else {
        // Tray integration needs a desktop shell; its absence is not fatal.
        log::warn!(
            "{}: no tray host detected, continuing without tray icon",
            ErrorKind::TrayUnavailable
        );
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))
            .context("Failed to register SIGINT handler")?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))
            .context("Failed to register SIGTERM handler")?;
    }

    log::info!(
        "ready: {} entries in history, hotkey {}",
        manager.items().len(),
        binder.hotkey_string().as_deref().unwrap_or("unbound")
    );

    while !shutdown.load(Ordering::Relaxed) {
        manager.poll();

        if binder.poll_triggered() {
            show_history(&manager);
        }

        for event in manager.apply_config_changes() {
            if let ConfigEvent::HotkeyChanged(hotkey) = event {
                if !binder.register_hotkey(&hotkey) {
                    log::warn!("failed to rebind hotkey {}", hotkey);
                }
            }
        }

        manager.tick(Instant::now());
        std::thread::sleep(POLL_INTERVAL);
    }

    log::info!("shutting down");
    manager.flush();
    Ok(())
}

/// Hotkey action: surface the current history. Without a popup window the
/// daemon prints the snapshot to stdout.
fn show_history(manager: &ClipboardManager) {
    let items = manager.items();
    log::info!("hotkey pressed, {} entries", items.len());
    println!("Clipboard history ({} entries):", items.len());
    for (i, entry) in items.iter().enumerate() {
        let pin_mark = if entry.pinned() { "*" } else { " " };
        println!("{:3}.{} {}", i + 1, pin_mark, entry.preview());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_hotkey_flag_takes_the_chord() {
        let cli = Cli::try_parse_from(["clipkeep", "--test-hotkey", "Meta+V"]).unwrap();
        assert_eq!(cli.test_hotkey.as_deref(), Some("Meta+V"));

        assert!(Cli::try_parse_from(["clipkeep", "--test-hotkey"]).is_err());
    }

    #[test]
    fn test_history_limit_enforces_range() {
        let cli = Cli::try_parse_from(["clipkeep", "--history-limit", "100"]).unwrap();
        assert_eq!(cli.history_limit, Some(100));

        assert!(Cli::try_parse_from(["clipkeep", "--history-limit", "9"]).is_err());
        assert!(Cli::try_parse_from(["clipkeep", "--history-limit", "101"]).is_err());
    }
}
