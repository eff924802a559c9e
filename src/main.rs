//! Thin CLI layer: parse args, styled output, and call into sitepack-core.
//! Crash-proof: panic caught and reported; all errors return Result.

mod logging;

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitepack_core::{search_path, Config, Installer, Layout, Source};
use std::env;
use std::io::IsTerminal;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Run a long-running task; in quiet mode on a terminal show a spinner until done.
fn run_with_spinner<T, F>(message: &str, quiet: bool, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    if !quiet || !std::io::stderr().is_terminal() {
        return f();
    }
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.dim} {msg}") {
        spinner.set_style(style.tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹"));
    }
    spinner.set_message(message.to_string());
    let tick = Duration::from_millis(80);
    loop {
        match rx.recv_timeout(tick) {
            Ok(res) => {
                spinner.finish_and_clear();
                return res;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                spinner.finish_and_clear();
                return Err("Operation failed.".to_string());
            }
            Err(mpsc::RecvTimeoutError::Timeout) => spinner.tick(),
        }
    }
}

fn project_arg() -> Arg {
    Arg::new("project")
        .short('p')
        .long("project")
        .help("Project whose site-packages to use (default: SITEPACK_PROJECT or current dir name)")
}

fn project_of(m: &ArgMatches) -> String {
    m.get_one::<String>("project")
        .cloned()
        .unwrap_or_else(sitepack_core::default_project_name)
}

fn cli() -> Command {
    Command::new("sitepack")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Per-project Python package installer: Termux binary repo first, PyPI sdists as fallback")
        .after_help(
            "Examples:\n  sitepack install requests\n  sitepack install 'numpy>=1.20' --source termux\n  sitepack check six==1.16.0\n  sitepack env -p myapp\n  sitepack config set pypi_index_url https://mirror.example/simple",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("install")
                .about("Install a requirement into a project's site-packages")
                .arg(
                    Arg::new("requirement")
                        .required(true)
                        .help("Requirement, e.g. requests, scipy==1.10.0, 'numpy >= 1.20'"),
                )
                .arg(project_arg())
                .arg(
                    Arg::new("source")
                        .long("source")
                        .value_parser(["auto", "termux", "pypi"])
                        .default_value("auto")
                        .help("Where to fetch from (auto probes Termux first)"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .help("Warnings only; show spinner when busy"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Exit 0 if the requirement is satisfied in the project, 1 otherwise")
                .arg(Arg::new("requirement").required(true).help("Requirement to check"))
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("site")
                .about("Create the project's site-packages if needed and print its path")
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("env")
                .about("Print PYTHONPATH for running the project")
                .arg(project_arg()),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change settings")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the config file path"))
                .subcommand(
                    Command::new("set")
                        .about("Set a key and save")
                        .arg(Arg::new("key").required(true).help("Config key"))
                        .arg(Arg::new("value").required(true).help("New value")),
                ),
        )
        .subcommand(
            Command::new("cache")
                .about("Inspect the shared package cache")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List cached packages"))
                .subcommand(Command::new("path").about("Print the cache directory")),
        )
}

fn run() -> Result<(), String> {
    let matches = cli().get_matches();
    let layout = Layout::detect();
    let quiet = matches
        .subcommand_matches("install")
        .map(|m| m.get_flag("quiet"))
        .unwrap_or(false);
    logging::init(&layout, quiet);
    tracing::debug!("sitepack {} (root {})", env!("CARGO_PKG_VERSION"), layout.root().display());

    match matches.subcommand() {
        Some(("install", sub)) => {
            let requirement = sub
                .get_one::<String>("requirement")
                .cloned()
                .ok_or("Missing requirement")?;
            let source: Source = sub
                .get_one::<String>("source")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default();
            let project = project_of(sub);
            let config = Config::load(&layout.config_path());
            let log_path = layout.log_path();
            let installer = Installer::with_http(config, layout);

            let req = requirement.clone();
            let proj = project.clone();
            let installed = run_with_spinner(&format!("Installing {}…", requirement), quiet, move || {
                installer.install(&req, &proj, source).map_err(|e| e.to_string())
            })?;
            if !installed {
                return Err(format!(
                    "Could not install {} (see {} for details)",
                    requirement,
                    log_path.display()
                ));
            }
            if !quiet {
                success(&format!("{} is ready in project {}", requirement, project));
            }
        }
        Some(("check", sub)) => {
            let requirement = sub
                .get_one::<String>("requirement")
                .ok_or("Missing requirement")?;
            let project = project_of(sub);
            sitepack_core::Requirement::parse(requirement).map_err(|e| e.to_string())?;
            let installer = Installer::with_http(Config::load(&layout.config_path()), layout);
            if installer.is_installed(requirement, &project) {
                success(&format!("{} is satisfied in project {}", requirement, project));
            } else {
                return Err(format!("{} is not satisfied in project {}", requirement, project));
            }
        }
        Some(("site", sub)) => {
            let project = project_of(sub);
            let dir = layout
                .ensure_project_site_packages(&project)
                .map_err(|e| e.to_string())?;
            println!("{}", dir.display());
        }
        Some(("env", sub)) => {
            let project = project_of(sub);
            layout
                .ensure_project_site_packages(&project)
                .map_err(|e| e.to_string())?;
            let value = search_path::to_env_value(env::var_os("PYTHONPATH"))
                .ok_or("Site directory path contains the path separator")?;
            println!("PYTHONPATH={}", value.to_string_lossy());
        }
        Some(("config", sub)) => {
            let path = layout.config_path();
            match sub.subcommand() {
                Some(("show", _)) => {
                    let config = Config::load(&path);
                    let body = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
                    println!("{}", body);
                }
                Some(("path", _)) => println!("{}", path.display()),
                Some(("set", m)) => {
                    let key = m.get_one::<String>("key").ok_or("Missing key")?;
                    let value = m.get_one::<String>("value").ok_or("Missing value")?;
                    let mut config = Config::load(&path);
                    config.set(key, value).map_err(|e| e.to_string())?;
                    config.save(&path).map_err(|e| e.to_string())?;
                    success(&format!("Set {} = {}", key, value));
                }
                _ => return Err("Unknown config command".to_string()),
            }
        }
        Some(("cache", sub)) => match sub.subcommand() {
            Some(("list", _)) => {
                let list = layout.cached_packages().map_err(|e| format!("Failed to list cache: {}", e))?;
                if list.is_empty() {
                    dim("No cached packages.");
                } else {
                    info(&format!("Cached packages ({})", list.len()));
                    for name in list {
                        println!("  {}", name);
                    }
                }
            }
            Some(("path", _)) => println!("{}", layout.cache_dir().display()),
            _ => return Err("Unknown cache command".to_string()),
        },
        _ => return Err("Unknown command".to_string()),
    }
    Ok(())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
