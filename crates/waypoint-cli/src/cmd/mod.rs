pub mod add;
pub mod completions;
pub mod config;
pub mod edit;
pub mod export;
pub mod list;
pub mod move_cmd;
pub mod rm;
pub mod stats;
pub mod watch;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use waypoint_core::cache::SnapshotCache;
use waypoint_core::config::EffectiveConfig;
use waypoint_core::gateway::{LoadSource, SyncGateway};
use waypoint_core::model::{Initiative, InitiativeId, Period, Priority, Status, Team};
use waypoint_core::remote::RemoteStore;
use waypoint_core::remote::memory::MemoryRemote;
use waypoint_core::remote::rest::RestRemote;
use waypoint_core::session::{Notice, Session, SessionHandle, SessionOptions};
use waypoint_core::view::{Selector, ViewFilter};

use crate::output::{CliError, OutputMode, Renderable, fail, progress_bar, render_error, write_notice};

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub project_root: PathBuf,
    pub config: EffectiveConfig,
    pub output: OutputMode,
    pub quiet: bool,
    /// Use a local table backed by the snapshot instead of the hosted store.
    pub offline: bool,
}

/// A running session plus its notice stream.
pub struct Connected {
    pub handle: SessionHandle,
    pub source: LoadSource,
    notices: broadcast::Receiver<Notice>,
    quiet: bool,
    output: OutputMode,
}

impl Connected {
    /// Print notices raised since the last call to stderr.
    pub fn flush_notices(&mut self) {
        let stderr = io::stderr();
        let mut err = stderr.lock();
        while let Ok(notice) = self.notices.try_recv() {
            if self.quiet || self.output.is_json() {
                debug!(level = ?notice.level, message = %notice.message, "notice");
                continue;
            }
            let _ = write_notice(&mut err, &notice);
        }
    }

    pub async fn close(mut self) {
        self.flush_notices();
        self.handle.shutdown().await;
    }
}

impl Context {
    fn snapshot_cache(&self) -> Option<SnapshotCache> {
        self.config
            .project
            .cache
            .snapshot_path(&self.project_root)
            .map(SnapshotCache::new)
    }

    fn remote(&self, cache: Option<&SnapshotCache>) -> Result<Arc<dyn RemoteStore>> {
        if self.offline {
            let records = cache
                .and_then(|c| match c.load() {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(code = %err.code(), error = %err, "ignoring unreadable snapshot");
                        None
                    }
                })
                .map(|s| s.initiatives)
                .unwrap_or_default();
            debug!(count = records.len(), "offline table from snapshot");
            return Ok(Arc::new(MemoryRemote::from_records(records)));
        }
        let rest = RestRemote::new(self.config.project.remote.rest_config()?)
            .map_err(|err| anyhow::anyhow!("{}: {err}", err.code().code()))?;
        Ok(Arc::new(rest))
    }

    /// Start a session and load the table, falling back to the snapshot when
    /// the remote cannot be reached.
    pub async fn connect(&self, filter: ViewFilter, subscribe: bool) -> Result<Connected> {
        let cache = self.snapshot_cache();
        let remote = self.remote(cache.as_ref())?;
        let mut options = SessionOptions::new(filter).with_subscribe(subscribe);
        if let Some(cache) = cache {
            options = options.with_cache(cache);
        }
        let (session, handle) = Session::new(SyncGateway::new(remote), options);
        tokio::spawn(session.run());

        let notices = handle.notices();
        let loaded = handle.reload().await;
        let mut connected = Connected {
            handle,
            source: LoadSource::Remote,
            notices,
            quiet: self.quiet,
            output: self.output,
        };
        connected.flush_notices();
        match loaded {
            Ok(source) => {
                connected.source = source;
                Ok(connected)
            }
            Err(err) => Err(fail(self.output, &err)),
        }
    }

    pub fn default_period(&self) -> Period {
        self.config.project.view.default_period(chrono::Utc::now())
    }
}

/// Quarter selection shared by commands that look at one quarter.
#[derive(Args, Debug, Default, Clone)]
pub struct PeriodArgs {
    /// Quarter (1-4); defaults to the configured or current quarter.
    #[arg(short = 'Q', long, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub quarter: Option<u8>,

    /// Year; defaults to the configured or current year.
    #[arg(short = 'Y', long)]
    pub year: Option<i32>,
}

impl PeriodArgs {
    pub fn resolve(&self, ctx: &Context) -> Period {
        let fallback = ctx.default_period();
        Period::new(
            self.quarter.unwrap_or(fallback.quarter),
            self.year.unwrap_or(fallback.year),
        )
    }
}

/// Filter flags shared by `list`, `export` and `watch`.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Team: engineering, design, marketing, product, operations, or all.
    #[arg(short, long, default_value = "all")]
    pub team: Selector<Team>,

    /// Priority: low, medium, high, or all.
    #[arg(short, long, default_value = "all")]
    pub priority: Selector<Priority>,

    /// Status: not-started, in-progress, completed, or all.
    #[arg(short, long, default_value = "all")]
    pub status: Selector<Status>,

    /// Case-insensitive text matched against title and description.
    #[arg(long, default_value = "")]
    pub search: String,
}

impl FilterArgs {
    pub fn to_filter(&self, ctx: &Context) -> ViewFilter {
        ViewFilter::new(self.period.resolve(ctx))
            .with_team(self.team)
            .with_priority(self.priority)
            .with_status(self.status)
            .with_search(self.search.clone())
    }
}

/// Resolve a full id or unique id prefix against the loaded records.
pub fn resolve_id(records: &[Initiative], raw: &str) -> Result<InitiativeId, CliError> {
    let raw = raw.trim();
    if let Some(exact) = records.iter().find(|r| r.id.as_str() == raw) {
        return Ok(exact.id.clone());
    }
    let mut matches = records.iter().filter(|r| r.id.as_str().starts_with(raw));
    match (matches.next(), matches.next()) {
        (Some(only), None) if !raw.is_empty() => Ok(only.id.clone()),
        (Some(_), Some(_)) => Err(CliError::with_details(
            format!("id prefix '{raw}' is ambiguous"),
            "use more characters of the id (see `wp list`)",
            "ambiguous_id",
        )),
        _ => Err(CliError::with_details(
            format!("no initiative matches '{raw}'"),
            "run `wp list` to see ids",
            "unknown_id",
        )),
    }
}

/// Look up `raw` among the session's records, reporting a miss on stderr.
pub async fn find_record(
    connected: &Connected,
    raw: &str,
    output: OutputMode,
) -> Result<Initiative> {
    let records = connected
        .handle
        .records()
        .await
        .map_err(|err| fail(output, &err))?;
    match resolve_id(&records, raw) {
        Ok(id) => records
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("initiative {id} vanished")),
        Err(err) => {
            render_error(output, &err)?;
            bail!("{}", err.message);
        }
    }
}

/// Abbreviated month span of a record, e.g. `Jan-Feb` or `Mar`.
pub fn month_span(record: &Initiative) -> String {
    let period = record.fields.period();
    let name = |m: u8| {
        period
            .month_name(m)
            .and_then(|full| full.get(..3))
            .unwrap_or("?")
    };
    if record.fields.start_month == record.fields.end_month {
        name(record.fields.start_month).to_string()
    } else {
        format!(
            "{}-{}",
            name(record.fields.start_month),
            name(record.fields.end_month)
        )
    }
}

fn short_id(id: &InitiativeId) -> &str {
    let s = id.as_str();
    s.get(..8).unwrap_or(s)
}

/// An initiative as printed by the CLI.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct InitiativeRow(pub Initiative);

impl Renderable for InitiativeRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let f = &self.0.fields;
        writeln!(
            w,
            "{:<8}  {:<34} {:<6} {:<11} {} {:>3}%  {}",
            short_id(&self.0.id),
            truncate(&f.title, 34),
            f.priority,
            f.status,
            progress_bar(f.progress, 10),
            f.progress,
            month_span(&self.0),
        )?;
        if let Some(assignee) = f.assignee.as_deref().filter(|a| !a.is_empty()) {
            writeln!(w, "{:<8}  @{assignee}", "")?;
        }
        Ok(())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, &self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let f = &self.0.fields;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.0.id,
            f.title,
            f.team,
            f.priority,
            f.status,
            f.progress,
            f.assignee.as_deref().unwrap_or(""),
            f.start_month,
            f.end_month,
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &[
            "id", "title", "team", "priority", "status", "progress", "assignee", "start", "end",
        ]
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::model::starter_initiatives;

    fn records() -> Vec<Initiative> {
        starter_initiatives()
            .into_iter()
            .zip(["abc123", "abd456", "ffff00", "0a", "0b", "0c"])
            .map(|(fields, id)| Initiative::from_fields(InitiativeId::from(id), fields))
            .collect()
    }

    #[test]
    fn exact_and_unique_prefix_ids_resolve() {
        let records = records();
        assert_eq!(resolve_id(&records, "abc123").unwrap().as_str(), "abc123");
        assert_eq!(resolve_id(&records, "ff").unwrap().as_str(), "ffff00");
        assert_eq!(resolve_id(&records, " abd ").unwrap().as_str(), "abd456");
    }

    #[test]
    fn ambiguous_or_missing_ids_are_rejected() {
        let records = records();
        let err = resolve_id(&records, "ab").unwrap_err();
        assert_eq!(err.error_code.as_deref(), Some("ambiguous_id"));
        let err = resolve_id(&records, "zz").unwrap_err();
        assert_eq!(err.error_code.as_deref(), Some("unknown_id"));
        let err = resolve_id(&records, "").unwrap_err();
        assert_eq!(err.error_code.as_deref(), Some("ambiguous_id"));
    }

    #[test]
    fn month_span_uses_record_quarter() {
        let records = records();
        assert_eq!(month_span(&records[0]), "Jan-Feb");
        assert_eq!(month_span(&records[1]), "Jan");
        assert_eq!(month_span(&records[5]), "Mar");
    }

    #[test]
    fn text_row_is_tab_separated_in_header_order() {
        let row = InitiativeRow(records().remove(2));
        let mut buf = Vec::new();
        row.render_table(&mut buf).unwrap();
        let line = String::from_utf8(buf).unwrap();
        let cols: Vec<&str> = line.trim_end().split('\t').collect();
        assert_eq!(cols.len(), InitiativeRow::table_headers().len());
        assert_eq!(cols[0], "ffff00");
        assert_eq!(cols[1], "Q1 Marketing Campaign");
        assert_eq!(cols[2], "marketing");
        assert_eq!(cols[6], "MR");
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn filter_flags_parse_selectors() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: FilterArgs,
        }
        let w = Wrapper::parse_from(["test", "--team", "design", "-p", "high", "--search", "api"]);
        assert_eq!(w.args.team, Selector::Only(Team::Design));
        assert_eq!(w.args.priority, Selector::Only(Priority::High));
        assert!(w.args.status.is_all());
        assert_eq!(w.args.search, "api");

        let defaults = Wrapper::parse_from(["test"]);
        assert!(defaults.args.team.is_all());
        assert!(defaults.args.period.quarter.is_none());
        assert!(Wrapper::try_parse_from(["test", "--quarter", "5"]).is_err());
        assert!(Wrapper::try_parse_from(["test", "--team", "legal"]).is_err());
    }
}
