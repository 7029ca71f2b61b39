// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for atl.
//!
//! This binary provides the `atl` command: offline conversion between ADF,
//! Confluence storage HTML and Markdown, plus management of the stored
//! Atlassian Cloud accounts.

use atl::config::{Account, Config, ConfigError};
use atl::{adf, markdown, storage};
use lexopt::prelude::*;
use serde_json::json;
use snafu::prelude::*;
use std::io::Read;
use std::path::PathBuf;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Human-readable text.
    Text,
    /// A JSON document on stdout.
    Json,
}

/// Where to read a document from.
#[derive(Debug, Clone)]
enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    fn from_arg(arg: Option<String>) -> Self {
        match arg.as_deref() {
            None | Some("-") => Self::Stdin,
            Some(path) => Self::File(path.into()),
        }
    }
}

#[derive(Debug)]
enum Command {
    Adf(Input),
    Html(Input),
    Markdown { input: Input, compact: bool },
    ConfigList,
    ConfigGet { key: String },
    ConfigSet { key: String, value: String },
    ConfigUnset { key: String },
    AuthAdd { name: String, account: Account },
    AuthUse { name: String },
    AuthRemove { name: String },
    AuthStatus,
}

struct Cli {
    command: Command,
    output: OutputMode,
    config_path: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read standard input: {source}"))]
    ReadStdin { source: std::io::Error },

    #[snafu(display("input is not valid JSON: {source}"))]
    InvalidJson { source: serde_json::Error },

    #[snafu(display("failed to encode JSON output: {source}"))]
    EncodeJson { source: serde_json::Error },

    #[snafu(display("{source}"))]
    Config { source: ConfigError },

    #[snafu(display("{field} must not be empty"))]
    EmptyField { field: &'static str },
}

fn print_help() {
    println!(
        "\
{name} {version}
Command-line client for Jira and Confluence Cloud

Usage: {name} [OPTIONS] <COMMAND> [ARGS]...

Conversion commands (FILE defaults to stdin, - also means stdin):
  adf [FILE]              Render ADF JSON (or a Jira issue/comment JSON) as text
  html [FILE]             Render Confluence storage HTML (or page JSON) as text
  md [FILE]               Compile Markdown to ADF JSON

Account commands:
  auth add <NAME> --site <SITE> --email <EMAIL> --token <TOKEN>
                          Store an account and make it active
  auth use <NAME>         Make a stored account active
  auth remove <NAME>      Delete a stored account
  auth status             Show the active account

Configuration commands:
  config list             Show accounts and defaults
  config get <KEY>        Print a value (active-account, site, email, cloud-id, or a default)
  config set <KEY> <VAL>  Store a default (or cloud-id on the active account)
  config unset <KEY>      Remove a default

Options:
      --json              Print machine-readable JSON
      --compact           Print ADF on a single line (md)
      --config <PATH>     Use PATH instead of the default config file
  -v, --verbose           Log debug details to stderr
  -h, --help              Print help
  -V, --version           Print version",
        name = env!("CARGO_BIN_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

#[allow(clippy::too_many_lines)]
fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut positional: Vec<String> = Vec::new();
    let mut output = OutputMode::Text;
    let mut compact = false;
    let mut config_path = None;
    let mut verbose = false;
    let mut site = None;
    let mut email = None;
    let mut token = None;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Long("json") => output = OutputMode::Json,
            Long("compact") => compact = true,
            Long("config") => config_path = Some(PathBuf::from(parser.value()?)),
            Long("site") => site = Some(parser.value()?.string()?),
            Long("email") => email = Some(parser.value()?.string()?),
            Long("token") => token = Some(parser.value()?.string()?),
            Short('v') | Long("verbose") => verbose = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => positional.push(val.string()?),
            _ => return Err(arg.unexpected()),
        }
    }

    let mut args = positional.into_iter();

    let command = match required(&mut args, "COMMAND")?.as_str() {
        "adf" => Command::Adf(Input::from_arg(args.next())),
        "html" => Command::Html(Input::from_arg(args.next())),
        "md" | "markdown" => Command::Markdown {
            input: Input::from_arg(args.next()),
            compact,
        },
        "config" => match required(&mut args, "list|get|set|unset")?.as_str() {
            "list" => Command::ConfigList,
            "get" => Command::ConfigGet {
                key: required(&mut args, "KEY")?,
            },
            "set" => Command::ConfigSet {
                key: required(&mut args, "KEY")?,
                value: required(&mut args, "VALUE")?,
            },
            "unset" => Command::ConfigUnset {
                key: required(&mut args, "KEY")?,
            },
            other => return Err(format!("unknown config command: {other}").into()),
        },
        "auth" => match required(&mut args, "add|use|remove|status")?.as_str() {
            "add" | "login" => Command::AuthAdd {
                name: required(&mut args, "NAME")?,
                account: Account {
                    site: site.ok_or("missing required option: --site")?,
                    email: email.ok_or("missing required option: --email")?,
                    token: token.ok_or("missing required option: --token")?,
                    cloud_id: None,
                },
            },
            "use" => Command::AuthUse {
                name: required(&mut args, "NAME")?,
            },
            "remove" | "logout" => Command::AuthRemove {
                name: required(&mut args, "NAME")?,
            },
            "status" => Command::AuthStatus,
            other => return Err(format!("unknown auth command: {other}").into()),
        },
        other => return Err(format!("unknown command: {other}").into()),
    };

    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument: {extra}").into());
    }

    Ok(Cli {
        command,
        output,
        config_path,
        verbose,
    })
}

fn required(
    args: &mut impl Iterator<Item = String>,
    what: &str,
) -> Result<String, lexopt::Error> {
    args.next()
        .ok_or_else(|| format!("missing required argument: <{what}>").into())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    // RUST_LOG directives are parsed last so they win over the default.
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("atl", level)
        .parse_default_env()
        .try_init();
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    init_logging(cli.verbose);

    match cli.command {
        Command::Adf(input) => render_adf(&input, cli.output),
        Command::Html(input) => render_html(&input, cli.output),
        Command::Markdown { input, compact } => compile_markdown(&input, compact),
        command => run_config_command(command, cli.config_path, cli.output),
    }
}

/// Reads the whole input as a string.
fn read_input(input: &Input) -> Result<String, Error> {
    match input {
        Input::File(path) => std::fs::read_to_string(path).context(ReadFileSnafu { path }),
        Input::Stdin => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context(ReadStdinSnafu)?;
            Ok(text)
        }
    }
}

/// Prints rendered text, or wraps it as `{"text": ...}` in JSON mode.
fn print_text(text: &str, output: OutputMode) -> Result<(), Error> {
    match output {
        OutputMode::Text => println!("{text}"),
        OutputMode::Json => print_json(&json!({ "text": text }), false)?,
    }
    Ok(())
}

fn print_json(value: &serde_json::Value, compact: bool) -> Result<(), Error> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context(EncodeJsonSnafu)?;
    println!("{json}");
    Ok(())
}

/// Picks the ADF document out of a Jira response body.
///
/// Accepts a bare ADF document, an issue (`fields.description`) or a
/// comment (`body`).
fn adf_document(value: &serde_json::Value) -> &serde_json::Value {
    if value.get("type").is_some() {
        return value;
    }
    value
        .pointer("/fields/description")
        .or_else(|| value.get("body"))
        .unwrap_or(value)
}

fn render_adf(input: &Input, output: OutputMode) -> Result<(), Error> {
    let json = read_input(input)?;
    let value: serde_json::Value = serde_json::from_str(&json).context(InvalidJsonSnafu)?;
    print_text(&adf::render_text(adf_document(&value)), output)
}

fn render_html(input: &Input, output: OutputMode) -> Result<(), Error> {
    let raw = read_input(input)?;

    // A Confluence page response carries the HTML in body.storage.value.
    let page_body = raw
        .trim_start()
        .starts_with('{')
        .then(|| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .flatten()
        .and_then(|page| {
            page.pointer("/body/storage/value")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        });
    if page_body.is_some() {
        log::debug!("reading storage HTML from page JSON");
    }

    let html = page_body.as_deref().unwrap_or(&raw);
    print_text(&storage::render_text(html), output)
}

fn compile_markdown(input: &Input, compact: bool) -> Result<(), Error> {
    let text = read_input(input)?;
    print_json(&markdown::to_adf(&text), compact)
}

fn run_config_command(
    command: Command,
    config_path: Option<PathBuf>,
    output: OutputMode,
) -> Result<(), Error> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path().context(ConfigSnafu)?,
    };
    let mut config = Config::load_from(&path).context(ConfigSnafu)?;

    let changed = match command {
        Command::ConfigList => {
            print_config(&config, output)?;
            false
        }
        Command::ConfigGet { key } => {
            let value = config.get(&key).context(ConfigSnafu)?;
            match output {
                OutputMode::Text => println!("{value}"),
                OutputMode::Json => print_json(&json!({ key: value }), false)?,
            }
            false
        }
        Command::ConfigSet { key, value } => {
            config.set(&key, &value).context(ConfigSnafu)?;
            println!("Set {key} = {value}");
            true
        }
        Command::ConfigUnset { key } => {
            config.unset(&key).context(ConfigSnafu)?;
            println!("Unset {key}");
            true
        }
        Command::AuthAdd { name, account } => {
            let account = normalize_account(account)?;
            let site = account.site.clone();
            config.set_account(&name, account);
            config.use_account(&name).context(ConfigSnafu)?;
            println!("Stored account {name} for {site} (active)");
            true
        }
        Command::AuthUse { name } => {
            config.use_account(&name).context(ConfigSnafu)?;
            println!("Switched to account {name}");
            true
        }
        Command::AuthRemove { name } => {
            config.remove_account(&name).context(ConfigSnafu)?;
            println!("Removed account {name}");
            true
        }
        Command::AuthStatus => {
            print_status(&config, output)?;
            false
        }
        Command::Adf(_) | Command::Html(_) | Command::Markdown { .. } => false,
    };

    if changed {
        config.save_to(&path).context(ConfigSnafu)?;
    }
    Ok(())
}

/// Trims the fields and strips any scheme or trailing slash from the site.
fn normalize_account(account: Account) -> Result<Account, Error> {
    let site = account.site.trim();
    let site = site
        .strip_prefix("https://")
        .or_else(|| site.strip_prefix("http://"))
        .unwrap_or(site)
        .trim_end_matches('/')
        .to_owned();
    let email = account.email.trim().to_owned();
    let token = account.token.trim().to_owned();

    ensure!(!site.is_empty(), EmptyFieldSnafu { field: "site" });
    ensure!(!email.is_empty(), EmptyFieldSnafu { field: "email" });
    ensure!(!token.is_empty(), EmptyFieldSnafu { field: "token" });

    Ok(Account {
        site,
        email,
        token,
        cloud_id: account.cloud_id,
    })
}

fn print_config(config: &Config, output: OutputMode) -> Result<(), Error> {
    if output == OutputMode::Json {
        let accounts: serde_json::Map<String, serde_json::Value> = config
            .accounts
            .iter()
            .map(|(name, account)| (name.clone(), account_json(account)))
            .collect();
        return print_json(
            &json!({
                "active_account": config.active_account,
                "accounts": accounts,
                "defaults": config.defaults,
            }),
            false,
        );
    }

    println!("Active Account:");
    println!("  {}", config.active_account.as_deref().unwrap_or("(none)"));

    println!("\nAccounts:");
    if config.accounts.is_empty() {
        println!("  (none)");
    }
    for (name, account) in &config.accounts {
        let active = if config.active_account.as_deref() == Some(name) {
            " (active)"
        } else {
            ""
        };
        println!("  {name}{active}:");
        println!("    site:     {}", account.site);
        println!("    email:    {}", account.email);
        println!(
            "    cloud-id: {}",
            account.cloud_id.as_deref().unwrap_or("(unset)")
        );
    }

    println!("\nDefaults:");
    if config.defaults.is_empty() {
        println!("  (none)");
    }
    for (key, value) in &config.defaults {
        println!("  {key}: {value}");
    }
    Ok(())
}

fn print_status(config: &Config, output: OutputMode) -> Result<(), Error> {
    let account = config.active_account().context(ConfigSnafu)?;
    let name = config.active_account.as_deref().unwrap_or_default();

    match output {
        OutputMode::Json => {
            let mut status = account_json(account);
            status["name"] = json!(name);
            print_json(&status, false)
        }
        OutputMode::Text => {
            println!("Logged in as {} on {}", account.email, account.site);
            println!("  account: {name}");
            println!("  token:   {}", account.masked_token());
            Ok(())
        }
    }
}

/// An account as JSON, with the token masked.
fn account_json(account: &Account) -> serde_json::Value {
    json!({
        "site": account.site,
        "email": account.email,
        "token": account.masked_token(),
        "cloud_id": account.cloud_id,
    })
}
