//! `wp watch`: keep a session open and print the board whenever it changes.

use std::io::{self, Write};

use clap::Args;
use tracing::info;
use waypoint_core::view::View;

use super::{Connected, Context, FilterArgs};
use crate::output::{OutputMode, pretty_rule};

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Exit after this many board updates.
    #[arg(long)]
    pub updates: Option<usize>,
}

fn write_frame(out: &mut dyn Write, view: &View, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer(&mut *out, view).map_err(io::Error::other)?;
            writeln!(out)
        }
        OutputMode::Text => {
            let s = &view.summary;
            writeln!(
                out,
                "{}\ttotal={}\thigh={}\tcompleted={}\tprogress={}",
                view.filter.period, s.total, s.high_priority, s.completed, s.mean_progress
            )
        }
        OutputMode::Pretty => {
            pretty_rule(out)?;
            let s = &view.summary;
            writeln!(
                out,
                "{}  {} initiatives, {} high priority, {} completed, {}% avg",
                view.filter.period, s.total, s.high_priority, s.completed, s.mean_progress
            )?;
            for record in &view.visible {
                writeln!(
                    out,
                    "  {:<12} {:<34} {:>3}%",
                    record.fields.team.to_string(),
                    record.fields.title,
                    record.fields.progress
                )?;
            }
            Ok(())
        }
    }
}

fn print_frame(view: &View, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_frame(&mut out, view, mode)?;
    out.flush()
}

async fn follow(connected: &mut Connected, args: &WatchArgs, mode: OutputMode) -> anyhow::Result<()> {
    let mut views = connected.handle.watch();
    print_frame(&views.borrow_and_update(), mode)?;

    let mut seen = 0usize;
    while args.updates.is_none_or(|limit| seen < limit) {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                seen += 1;
                connected.flush_notices();
                print_frame(&views.borrow_and_update(), mode)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

pub async fn run_watch(args: &WatchArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut connected = ctx.connect(args.filter.to_filter(ctx), true).await?;
    info!(source = connected.source.as_str(), "watching for changes");
    let result = follow(&mut connected, args, ctx.output).await;
    connected.close().await;
    result
}
