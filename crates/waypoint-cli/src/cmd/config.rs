//! `wp config`: inspect and edit project and user configuration.

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use toml::Value;
use waypoint_core::config::{EffectiveConfig, PROJECT_DIR};

use super::Context;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show resolved or raw configuration
    Show(ShowArgs),
    /// Set a configuration key in project or user scope
    Set(SetArgs),
    /// Unset a configuration key in project or user scope
    Unset(UnsetArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Show raw project config only
    #[arg(long, conflicts_with = "user")]
    project: bool,

    /// Show raw user config only
    #[arg(long)]
    user: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Key (e.g. remote.url, view.quarter, output)
    key: String,

    /// New value
    value: String,
}

#[derive(Args, Debug)]
struct UnsetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Key (e.g. remote.url, view.quarter, output)
    key: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ConfigScope {
    Project,
    User,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    Text,
    Integer,
    Boolean,
    Quarter,
    OutputName,
}

const PROJECT_KEYS: &[(&str, &str, Kind)] = &[
    ("remote", "url", Kind::Text),
    ("remote", "anon_key", Kind::Text),
    ("remote", "table", Kind::Text),
    ("remote", "schema", Kind::Text),
    ("remote", "timeout_secs", Kind::Integer),
    ("remote", "realtime", Kind::Boolean),
    ("remote", "reconnect_delay_secs", Kind::Integer),
    ("cache", "enabled", Kind::Boolean),
    ("cache", "path", Kind::Text),
    ("view", "quarter", Kind::Quarter),
    ("view", "year", Kind::Integer),
];

pub fn run_config(args: &ConfigArgs, ctx: &Context) -> Result<()> {
    match &args.command {
        ConfigCommand::Show(show) => run_show(show, ctx),
        ConfigCommand::Set(set) => run_set(set, ctx),
        ConfigCommand::Unset(unset) => run_unset(unset, ctx),
    }
}

fn scope_path(scope: ConfigScope, project_root: &Path) -> Result<PathBuf> {
    match scope {
        ConfigScope::Project => Ok(project_config_path(project_root)),
        ConfigScope::User => user_config_path(),
    }
}

fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    if args.project || args.user {
        let scope = if args.user {
            ConfigScope::User
        } else {
            ConfigScope::Project
        };
        let mut value = load_toml_table(&scope_path(scope, &ctx.project_root)?)?;
        mask_anon_key(&mut value);
        print_toml_or_json(&value, ctx.output)?;
        return Ok(());
    }

    print_effective(&ctx.config.redacted(), ctx.output)
}

fn run_set(args: &SetArgs, ctx: &Context) -> Result<()> {
    let path = scope_path(args.scope, &ctx.project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_set(&mut value, args.scope, &args.key, &args.value)?;
    write_toml_table(&path, &value)?;
    render_mutation(ctx.output, "set", scope_label(args.scope), &args.key)
}

fn run_unset(args: &UnsetArgs, ctx: &Context) -> Result<()> {
    let path = scope_path(args.scope, &ctx.project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_unset(&mut value, args.scope, &args.key)?;
    write_toml_table(&path, &value)?;
    render_mutation(ctx.output, "unset", scope_label(args.scope), &args.key)
}

/// Table path (empty for top-level user keys), leaf and value kind for `key`.
fn known_key(scope: ConfigScope, key: &str) -> Result<(Option<&str>, &str, Kind)> {
    match scope {
        ConfigScope::Project => {
            let (section, leaf) = key
                .split_once('.')
                .ok_or_else(|| anyhow!("Key must use section.key format"))?;
            PROJECT_KEYS
                .iter()
                .find(|(s, l, _)| *s == section && *l == leaf)
                .map(|&(_, _, kind)| (Some(section), leaf, kind))
                .ok_or_else(|| anyhow!("Unsupported key `{key}` for project scope"))
        }
        ConfigScope::User => match key {
            "output" | "user.output" => Ok((None, "output", Kind::OutputName)),
            _ => bail!("Unsupported key `{key}` for user scope"),
        },
    }
}

fn parse_value(kind: Kind, key: &str, raw: &str) -> Result<Value> {
    match kind {
        Kind::Text => Ok(Value::String(raw.to_string())),
        Kind::Boolean => {
            let value: bool = raw
                .parse()
                .with_context(|| format!("{key} expects true or false"))?;
            Ok(Value::Boolean(value))
        }
        Kind::Integer => {
            let value: i64 = raw
                .parse()
                .with_context(|| format!("{key} expects an integer"))?;
            Ok(Value::Integer(value))
        }
        Kind::Quarter => match raw.parse::<i64>() {
            Ok(q @ 1..=4) => Ok(Value::Integer(q)),
            _ => bail!("{key} expects a quarter between 1 and 4"),
        },
        Kind::OutputName => match raw.trim().to_ascii_lowercase().as_str() {
            name @ ("pretty" | "text" | "json") => Ok(Value::String(name.to_string())),
            _ => bail!("{key} expects pretty, text or json"),
        },
    }
}

fn table_for<'a>(
    root: &'a mut Value,
    section: Option<&str>,
) -> Result<&'a mut toml::map::Map<String, Value>> {
    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;
    let Some(section) = section else {
        return Ok(table);
    };
    table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(toml::map::Map::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("Section {section} must be a TOML table"))
}

fn apply_set(root: &mut Value, scope: ConfigScope, key: &str, raw: &str) -> Result<()> {
    let (section, leaf, kind) = known_key(scope, key)?;
    let parsed = parse_value(kind, key, raw)?;
    table_for(root, section)?.insert(leaf.to_string(), parsed);
    Ok(())
}

fn apply_unset(root: &mut Value, scope: ConfigScope, key: &str) -> Result<()> {
    let (section, leaf, _) = known_key(scope, key)?;
    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    match section {
        None => {
            table.remove(leaf);
        }
        Some(section) => {
            if let Some(section_table) = table.get_mut(section).and_then(Value::as_table_mut) {
                section_table.remove(leaf);
                if section_table.is_empty() {
                    table.remove(section);
                }
            }
        }
    }
    Ok(())
}

fn mask_anon_key(root: &mut Value) {
    if let Some(Value::String(key)) = root
        .get_mut("remote")
        .and_then(|remote| remote.get_mut("anon_key"))
    {
        let visible: String = key.chars().take(4).collect();
        *key = format!("{visible}…");
    }
}

fn load_toml_table(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Table(toml::map::Map::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    if !value.is_table() {
        bail!("{} must contain a top-level TOML table", path.display());
    }

    Ok(value)
}

fn write_toml_table(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let serialized = toml::to_string_pretty(value)?;
    std::fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_toml_or_json(value: &Value, output: OutputMode) -> Result<()> {
    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputMode::Text | OutputMode::Pretty => println!("{}", toml::to_string_pretty(value)?),
    }
    Ok(())
}

fn opt<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| "(unset)".to_string(), ToString::to_string)
}

fn print_effective(value: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let remote = &value.project.remote;
    let cache = &value.project.cache;
    let view = &value.project.view;
    let cache_path = cache.path.as_ref().map(|p| p.display().to_string());
    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputMode::Text => {
            println!("resolved_output={}", value.resolved_output);
            println!("remote.url={}", opt(remote.url.as_ref()));
            println!("remote.anon_key={}", opt(remote.anon_key.as_ref()));
            println!("remote.table={}", remote.table);
            println!("remote.schema={}", remote.schema);
            println!("remote.timeout_secs={}", remote.timeout_secs);
            println!("remote.realtime={}", remote.realtime);
            println!("remote.reconnect_delay_secs={}", remote.reconnect_delay_secs);
            println!("cache.enabled={}", cache.enabled);
            println!("cache.path={}", opt(cache_path.as_ref()));
            println!("view.quarter={}", opt(view.quarter.as_ref()));
            println!("view.year={}", opt(view.year.as_ref()));
            if let Some(out) = &value.user.output {
                println!("user.output={out}");
            }
        }
        OutputMode::Pretty => {
            println!("resolved_output = \"{}\"", value.resolved_output);
            println!();
            println!("[remote]");
            println!("url = {}", opt(remote.url.as_ref()));
            println!("anon_key = {}", opt(remote.anon_key.as_ref()));
            println!("table = \"{}\"", remote.table);
            println!("schema = \"{}\"", remote.schema);
            println!("timeout_secs = {}", remote.timeout_secs);
            println!("realtime = {}", remote.realtime);
            println!("reconnect_delay_secs = {}", remote.reconnect_delay_secs);
            println!();
            println!("[cache]");
            println!("enabled = {}", cache.enabled);
            println!("path = {}", opt(cache_path.as_ref()));
            println!();
            println!("[view]");
            println!("quarter = {}", opt(view.quarter.as_ref()));
            println!("year = {}", opt(view.year.as_ref()));
            println!();
            println!("[user]");
            if let Some(out) = &value.user.output {
                println!("output = \"{out}\"");
            }
        }
    }

    Ok(())
}

fn render_mutation(output: OutputMode, action: &str, scope: &str, key: &str) -> Result<()> {
    match output {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "ok": true,
                    "action": action,
                    "scope": scope,
                    "key": key,
                }))?
            );
        }
        OutputMode::Text => {
            println!("ok=true action={action} scope={scope} key={key}");
        }
        OutputMode::Pretty => {
            println!("{} {} in {} config", action_to_title(action), key, scope);
        }
    }
    Ok(())
}

fn action_to_title(action: &str) -> &'static str {
    match action {
        "set" => "Set",
        "unset" => "Unset",
        _ => "Updated",
    }
}

fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("config.toml")
}

fn user_config_path() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow!("Unable to resolve user config directory"))?;
    Ok(config_dir.join("waypoint/config.toml"))
}

const fn scope_label(scope: ConfigScope) -> &'static str {
    match scope {
        ConfigScope::Project => "project",
        ConfigScope::User => "user",
    }
}
