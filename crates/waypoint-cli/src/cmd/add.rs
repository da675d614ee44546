//! `wp add`: create an initiative.

use clap::Args;
use waypoint_core::model::{InitiativeFields, Priority, Status, Team};
use waypoint_core::view::ViewFilter;

use super::{Context, InitiativeRow, PeriodArgs};
use crate::output::{OutputMode, fail, render_item, render_success};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Initiative title.
    pub title: String,

    /// Owning team.
    #[arg(short, long)]
    pub team: Team,

    #[arg(short, long, default_value = "medium")]
    pub priority: Priority,

    #[arg(short, long, default_value = "not-started")]
    pub status: Status,

    /// Percent complete (0-100).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub progress: u8,

    /// Free-text description.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Owner initials or name.
    #[arg(short, long)]
    pub assignee: Option<String>,

    /// First month within the quarter (1-3).
    #[arg(long, default_value_t = 1)]
    pub start: u8,

    /// Last month within the quarter (1-3); defaults to the start month.
    #[arg(long)]
    pub end: Option<u8>,

    #[command(flatten)]
    pub period: PeriodArgs,
}

impl AddArgs {
    fn fields(&self, ctx: &Context) -> InitiativeFields {
        let period = self.period.resolve(ctx);
        InitiativeFields {
            title: self.title.clone(),
            description: self.description.clone(),
            team: self.team,
            priority: self.priority,
            status: self.status,
            progress: self.progress,
            assignee: self.assignee.clone(),
            start_month: self.start,
            end_month: self.end.unwrap_or(self.start),
            quarter: period.quarter,
            year: period.year,
        }
    }
}

pub async fn run_add(args: &AddArgs, ctx: &Context) -> anyhow::Result<()> {
    let fields = args.fields(ctx);
    let connected = ctx.connect(ViewFilter::new(fields.period()), false).await?;
    let created = connected.handle.create(fields).await;
    connected.close().await;

    let created = created.map_err(|err| fail(ctx.output, &err))?;
    if ctx.output == OutputMode::Pretty {
        render_success(ctx.output, &format!("Created {}", created.id))?;
    }
    render_item(&InitiativeRow(created), ctx.output)?;
    Ok(())
}
