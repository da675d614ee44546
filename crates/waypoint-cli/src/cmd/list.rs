//! `wp list`: show the board for one quarter, grouped by team.

use std::io::{self, Write};

use clap::Args;
use waypoint_core::model::Team;
use waypoint_core::view::View;

use super::{Context, FilterArgs, InitiativeRow};
use crate::output::{OutputMode, Renderable, pretty_section, write_list};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Maximum initiatives to show.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

pub async fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let connected = ctx.connect(args.filter.to_filter(ctx), false).await?;
    let view = connected.handle.view();
    connected.close().await;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_view(&mut out, &view, args.limit, ctx.output)?;
    Ok(())
}

fn write_view(
    out: &mut dyn Write,
    view: &View,
    limit: Option<usize>,
    mode: OutputMode,
) -> io::Result<()> {
    let rows: Vec<InitiativeRow> = view
        .visible
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .map(InitiativeRow)
        .collect();

    if mode != OutputMode::Pretty {
        return write_list(out, &rows, mode);
    }

    writeln!(out, "Roadmap {}", view.filter.period)?;
    if rows.is_empty() {
        writeln!(out, "No initiatives match the current filters.")?;
        return Ok(());
    }
    for lane in &view.teams {
        let in_lane: Vec<&InitiativeRow> =
            rows.iter().filter(|r| r.0.fields.team == lane.team).collect();
        if in_lane.is_empty() {
            continue;
        }
        writeln!(out)?;
        pretty_section(
            out,
            &format!(
                "{} ({} initiatives, {}% avg)",
                lane_title(lane.team),
                lane.count,
                lane.mean_progress
            ),
        )?;
        for row in in_lane {
            row.render_human(out)?;
        }
    }
    Ok(())
}

const fn lane_title(team: Team) -> &'static str {
    match team {
        Team::Engineering => "Engineering",
        Team::Design => "Design",
        Team::Marketing => "Marketing",
        Team::Product => "Product",
        Team::Operations => "Operations",
    }
}
