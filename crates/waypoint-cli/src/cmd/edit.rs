//! `wp edit`: replace fields of an existing initiative.

use clap::Args;
use waypoint_core::model::{InitiativeFields, Priority, Status, Team};
use waypoint_core::view::ViewFilter;

use super::{Context, InitiativeRow, find_record};
use crate::output::{fail, render_item};

/// Every flag is optional; unset flags keep the stored value.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Initiative id or unique id prefix.
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub team: Option<Team>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    #[arg(short, long)]
    pub status: Option<Status>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub progress: Option<u8>,

    /// New description; an empty string clears it.
    #[arg(short, long)]
    pub description: Option<String>,

    /// New assignee; an empty string clears it.
    #[arg(short, long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub start: Option<u8>,

    #[arg(long)]
    pub end: Option<u8>,

    #[arg(short = 'Q', long)]
    pub quarter: Option<u8>,

    #[arg(short = 'Y', long)]
    pub year: Option<i32>,
}

fn clearable(value: Option<&String>, current: Option<String>) -> Option<String> {
    match value {
        Some(v) if v.is_empty() => None,
        Some(v) => Some(v.clone()),
        None => current,
    }
}

impl EditArgs {
    /// The full patch: `current` with every given flag applied.
    fn patch(&self, current: InitiativeFields) -> InitiativeFields {
        InitiativeFields {
            title: self.title.clone().unwrap_or(current.title),
            description: clearable(self.description.as_ref(), current.description),
            team: self.team.unwrap_or(current.team),
            priority: self.priority.unwrap_or(current.priority),
            status: self.status.unwrap_or(current.status),
            progress: self.progress.unwrap_or(current.progress),
            assignee: clearable(self.assignee.as_ref(), current.assignee),
            start_month: self.start.unwrap_or(current.start_month),
            end_month: self.end.unwrap_or(current.end_month),
            quarter: self.quarter.unwrap_or(current.quarter),
            year: self.year.unwrap_or(current.year),
        }
    }
}

pub async fn run_edit(args: &EditArgs, ctx: &Context) -> anyhow::Result<()> {
    let connected = ctx.connect(ViewFilter::new(ctx.default_period()), false).await?;
    let current = match find_record(&connected, &args.id, ctx.output).await {
        Ok(record) => record,
        Err(err) => {
            connected.close().await;
            return Err(err);
        }
    };
    let updated = connected
        .handle
        .update(current.id.clone(), args.patch(current.fields))
        .await;
    connected.close().await;

    let updated = updated.map_err(|err| fail(ctx.output, &err))?;
    render_item(&InitiativeRow(updated), ctx.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use waypoint_core::model::starter_initiatives;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: EditArgs,
    }

    #[test]
    fn unset_flags_keep_stored_values() {
        let w = Wrapper::parse_from(["test", "abc", "--progress", "80", "-s", "completed"]);
        let current = starter_initiatives().remove(0);
        let patched = w.args.patch(current.clone());
        assert_eq!(patched.progress, 80);
        assert_eq!(patched.status, Status::Completed);
        assert_eq!(patched.title, current.title);
        assert_eq!(patched.assignee, current.assignee);
        assert_eq!(
            (patched.start_month, patched.end_month),
            (current.start_month, current.end_month)
        );
    }

    #[test]
    fn empty_strings_clear_optional_text() {
        let w = Wrapper::parse_from(["test", "abc", "--assignee", "", "-d", "new text"]);
        let patched = w.args.patch(starter_initiatives().remove(0));
        assert_eq!(patched.assignee, None);
        assert_eq!(patched.description.as_deref(), Some("new text"));
    }

    #[test]
    fn id_is_required() {
        assert!(Wrapper::try_parse_from(["test"]).is_err());
    }
}
