//! `wp rm`: delete an initiative.


use clap::Args;
use serde::Serialize;
use waypoint_core::view::ViewFilter;

use super::{Context, find_record};
use crate::output::{fail, render};

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Initiative id or unique id prefix.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct Removed {
    id: String,
    title: String,
}

pub async fn run_rm(args: &RmArgs, ctx: &Context) -> anyhow::Result<()> {
    let connected = ctx.connect(ViewFilter::new(ctx.default_period()), false).await?;
    let target = match find_record(&connected, &args.id, ctx.output).await {
        Ok(record) => record,
        Err(err) => {
            connected.close().await;
            return Err(err);
        }
    };
    let deleted = connected.handle.delete(target.id.clone()).await;
    connected.close().await;
    deleted.map_err(|err| fail(ctx.output, &err))?;

    let removed = Removed {
        id: target.id.to_string(),
        title: target.fields.title,
    };
    render(ctx.output, &removed, |r, w| {
        writeln!(w, "Deleted {} ({})", r.title, r.id)
    })
}
