//! `wp stats`: headline numbers and per-team lane summaries.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use waypoint_core::gateway::LoadSource;
use waypoint_core::model::Period;
use waypoint_core::view::{Summary, TeamSummary, View};

use super::{Context, FilterArgs};
use crate::output::{pretty_kv, pretty_section, progress_bar, render_mode};

/// Arguments for `wp stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Report payload for `wp stats`.
#[derive(Debug, Serialize)]
pub struct BoardStats {
    pub period: Period,
    pub source: &'static str,
    pub summary: Summary,
    pub teams: Vec<TeamSummary>,
}

impl BoardStats {
    fn from_view(view: &View, source: LoadSource) -> Self {
        Self {
            period: view.filter.period,
            source: source.as_str(),
            summary: view.summary,
            teams: view.teams.clone(),
        }
    }
}

/// Execute `wp stats`.
pub async fn run_stats(args: &StatsArgs, ctx: &Context) -> anyhow::Result<()> {
    let connected = ctx.connect(args.filter.to_filter(ctx), false).await?;
    let stats = BoardStats::from_view(&connected.handle.view(), connected.source);
    connected.close().await;
    render_mode(ctx.output, &stats, write_text, write_pretty)
}

fn write_text(stats: &BoardStats, w: &mut dyn Write) -> io::Result<()> {
    let s = &stats.summary;
    writeln!(w, "period\t{}", stats.period)?;
    writeln!(w, "source\t{}", stats.source)?;
    writeln!(w, "total\t{}", s.total)?;
    writeln!(w, "high_priority\t{}", s.high_priority)?;
    writeln!(w, "completed\t{}", s.completed)?;
    writeln!(w, "mean_progress\t{}", s.mean_progress)?;
    for team in &stats.teams {
        writeln!(
            w,
            "team\t{}\t{}\t{}\t{}",
            team.team, team.count, team.completed, team.mean_progress
        )?;
    }
    Ok(())
}

fn write_pretty(stats: &BoardStats, w: &mut dyn Write) -> io::Result<()> {
    let s = &stats.summary;
    pretty_section(w, &format!("Roadmap {}", stats.period))?;
    pretty_kv(w, "Initiatives", s.total.to_string())?;
    pretty_kv(w, "High priority", s.high_priority.to_string())?;
    pretty_kv(w, "Completed", s.completed.to_string())?;
    pretty_kv(
        w,
        "Avg progress",
        format!("{} {}%", progress_bar(s.mean_progress, 20), s.mean_progress),
    )?;
    writeln!(w)?;
    pretty_section(w, "Teams")?;
    for team in &stats.teams {
        writeln!(
            w,
            "{:<12} {:>2} initiatives  {:>2} done  {} {:>3}%",
            team.team.to_string(),
            team.count,
            team.completed,
            progress_bar(team.mean_progress, 10),
            team.mean_progress
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::model::{Initiative, InitiativeId, starter_initiatives};
    use waypoint_core::store::LocalStore;
    use waypoint_core::view::ViewFilter;

    fn stats() -> BoardStats {
        let records = starter_initiatives()
            .into_iter()
            .enumerate()
            .map(|(i, f)| Initiative::from_fields(InitiativeId::from(format!("id-{i}")), f));
        let view = View::compute(
            &LocalStore::from_records(records),
            &ViewFilter::new(Period::new(1, 2026)),
        );
        BoardStats::from_view(&view, LoadSource::Seeded)
    }

    #[test]
    fn stats_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: StatsArgs,
        }
        let w = Wrapper::parse_from(["test", "--quarter", "2", "--year", "2027"]);
        assert_eq!(w.args.filter.period.quarter, Some(2));
        assert_eq!(w.args.filter.period.year, Some(2027));
    }

    #[test]
    fn text_report_lists_headline_numbers() {
        let mut buf = Vec::new();
        write_text(&stats(), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("total\t6\n"));
        assert!(out.contains("high_priority\t3\n"));
        assert!(out.contains("completed\t1\n"));
        assert!(out.contains("mean_progress\t39\n"));
        assert!(out.contains("team\tengineering\t2\t0\t48\n"));
        assert!(out.contains("source\tseeded\n"));
    }

    #[test]
    fn json_payload_is_stable() {
        let value = serde_json::to_value(stats()).unwrap();
        assert_eq!(value["summary"]["total"], 6);
        assert_eq!(value["teams"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["period"]["quarter"], 1);
    }

    #[test]
    fn pretty_report_has_team_section() {
        let mut buf = Vec::new();
        write_pretty(&stats(), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("Roadmap Q1 2026\n"));
        assert!(out.contains("Teams\n"));
        assert!(out.contains("operations"));
    }
}
