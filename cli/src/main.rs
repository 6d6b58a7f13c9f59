use std::collections::BTreeMap;

use flagtree_core::{
    Command, ErrorHandling, FlagError, Result, alias, cfg, choices, env, main_cmd,
};
use flagtree_sources::LoadSources;
use serde::Serialize;
use tracing::{debug, warn};

const ABOUT: &str = "A git-like demo of layered flags: arguments, env, and config files.";

fn main() {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let result = main_cmd("flagtree-demo", ABOUT, ErrorHandling::ExitOnError, run);
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(root: &mut Command, args: Vec<String>) -> std::result::Result<(), String> {
    let config = root
        .string(
            "config",
            "",
            "load settings from `file` (.json, .yaml, .toml)",
            [env(["FLAGTREE_DEMO_CONFIG"])],
        )
        .map_err(|e| e.to_string())?;
    let env_file = root
        .string("env-file", "", "load variables from a dotenv `file`", [])
        .map_err(|e| e.to_string())?;
    let save = root
        .bool(
            "save-config",
            false,
            "write the effective config back to the config file",
            [],
        )
        .map_err(|e| e.to_string())?;
    let help = root
        .bool("help", false, "show this help", [alias(["h"])])
        .map_err(|e| e.to_string())?;

    root.sub_cmd("commit", "Record changes to the repository", commit);
    root.sub_cmd("remote", "Manage tracked repositories", remote);
    root.sub_cmd("status", "Show the loaded configuration", status);

    // A config named through the environment is loaded before dispatch so
    // `flagtree-demo commit` sees it too.
    if !config.get().is_empty() {
        root.load_cfg(config.get()).map_err(|e| e.to_string())?;
    }

    root.parse(args).map_err(|e| e.to_string())?;
    if !root.parsed() {
        debug!("Subcommand handled the arguments");
        return Ok(());
    }

    if root.is_set("config") {
        root.load_cfg(config.get()).map_err(|e| e.to_string())?;
    }
    if !env_file.get().is_empty() {
        root.load_env(env_file.get()).map_err(|e| e.to_string())?;
    }

    let rest = root.args().to_vec();
    if help.get() || rest.is_empty() {
        print_usage(root);
        return Ok(());
    }

    root.parse_without_args(rest).map_err(|e| e.to_string())?;

    if save.get() {
        let path = root.save_cfg().map_err(|e| e.to_string())?;
        println!("saved config to {}", path.display());
    }
    Ok(())
}

fn print_usage(cmd: &Command) {
    match cmd.default_usage_long() {
        Ok(text) => print!("{text}"),
        Err(err) => {
            warn!(problems = ?err.problems, "Usage rendered with problems");
            print!("{}", err.text);
        }
    }
}

/// Prints help and hands `HelpRequested` to the command's error policy.
fn help_requested(cmd: &Command) -> Result<()> {
    print_usage(cmd);
    cmd.handle_error(FlagError::HelpRequested)
}

fn commit(cmd: &mut Command, args: Vec<String>) -> Result<()> {
    let help = cmd.bool("help", false, "show this help", [alias(["h"])])?;
    let branch = cmd.string(
        "branch",
        "main",
        "`branch` to commit on",
        [alias(["b"]), env(["BRANCH"]), cfg(["commit.branch"])],
    )?;
    let message = cmd.string(
        "message",
        "",
        "commit message",
        [alias(["m"]), cfg(["commit.message"])],
    )?;
    let amend = cmd.bool("amend", false, "replace the previous commit", [])?;
    cmd.parse(args)?;
    if help.get() {
        return help_requested(cmd);
    }

    let verb = if amend.get() { "amended" } else { "committed" };
    println!("[{}] {verb}: {}", branch.get(), message.get());
    Ok(())
}

fn remote(cmd: &mut Command, args: Vec<String>) -> Result<()> {
    let help = cmd.bool("help", false, "show this help", [alias(["h"])])?;
    let name = cmd.string(
        "name",
        "origin",
        "remote `name`",
        [alias(["n"]), cfg(["remote.name"])],
    )?;
    let url = cmd.string("url", "", "remote `url`", [alias(["u"]), cfg(["remote.url"])])?;
    let prune = cmd.bool("prune", false, "drop stale tracking branches", [])?;
    cmd.parse(args)?;
    if help.get() {
        return help_requested(cmd);
    }

    println!("{}\t{}", name.get(), url.get());
    if prune.get() {
        println!("pruned {}", name.get());
    }
    for extra in cmd.args() {
        println!("ignored argument {extra}");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    command: String,
    config_path: Option<String>,
    config: serde_json::Value,
    env_overlay: BTreeMap<String, String>,
}

fn status(cmd: &mut Command, args: Vec<String>) -> Result<()> {
    let help = cmd.bool("help", false, "show this help", [alias(["h"])])?;
    let format = cmd.string(
        "format",
        "text",
        "output `format`",
        [alias(["f"]), choices(["text", "json"]), env(["FLAGTREE_DEMO_FORMAT"])],
    )?;
    cmd.parse(args)?;
    if help.get() {
        return help_requested(cmd);
    }

    let report = {
        let context = cmd.context();
        StatusReport {
            command: cmd.full_name(),
            config_path: context.config_path().map(|p| p.display().to_string()),
            config: context.config().to_value(),
            env_overlay: context.env_overlay().clone(),
        }
    };

    if format.get() == "json" {
        let text = serde_json::to_string_pretty(&report).map_err(FlagError::handler)?;
        println!("{text}");
        return Ok(());
    }

    println!(
        "config file: {}",
        report.config_path.as_deref().unwrap_or("none")
    );
    println!("config: {}", report.config);
    for (key, value) in &report.env_overlay {
        println!("env: {key}={value}");
    }
    Ok(())
}
