//! `wp move`: drop an initiative onto another team lane and start month.
//!
//! The duration is kept where it fits; an end month past the quarter is
//! clamped to the last month.

use clap::Args;
use waypoint_core::model::Team;
use waypoint_core::view::ViewFilter;

use super::{Context, InitiativeRow, find_record};
use crate::output::{fail, render_item};

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Initiative id or unique id prefix.
    pub id: String,

    /// Target team lane.
    #[arg(short, long)]
    pub team: Team,

    /// Target start month within the quarter (1-3).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub start: u8,
}

pub async fn run_move(args: &MoveArgs, ctx: &Context) -> anyhow::Result<()> {
    let connected = ctx.connect(ViewFilter::new(ctx.default_period()), false).await?;
    let current = match find_record(&connected, &args.id, ctx.output).await {
        Ok(record) => record,
        Err(err) => {
            connected.close().await;
            return Err(err);
        }
    };
    let moved = connected
        .handle
        .reassign(current.id, args.team, args.start)
        .await;
    connected.close().await;

    let moved = moved.map_err(|err| fail(ctx.output, &err))?;
    render_item(&InitiativeRow(moved), ctx.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: MoveArgs,
        }
        let w = Wrapper::parse_from(["test", "abc", "--team", "product", "--start", "3"]);
        assert_eq!(w.args.id, "abc");
        assert_eq!(w.args.team, Team::Product);
        assert_eq!(w.args.start, 3);
        assert!(Wrapper::try_parse_from(["test", "abc", "-t", "product", "--start", "4"]).is_err());
    }
}
