//! `wp export`: write the filtered board as CSV.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use tracing::info;
use waypoint_core::export::{export_file_name, to_csv};

use super::{Context, FilterArgs};
use crate::output::render;

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output file; `-` writes to stdout. Defaults to `roadmap_Q{quarter}_{year}.csv`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Exported {
    path: String,
    rows: usize,
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move export into {}", path.display()))?;
    Ok(())
}

pub async fn run_export(args: &ExportArgs, ctx: &Context) -> anyhow::Result<()> {
    let filter = args.filter.to_filter(ctx);
    let period = filter.period;
    let connected = ctx.connect(filter, false).await?;
    let view = connected.handle.view();
    connected.close().await;

    let csv = to_csv(&view.visible);
    if args.output.as_deref() == Some(Path::new("-")) {
        io::stdout().lock().write_all(csv.as_bytes())?;
        return Ok(());
    }

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| ctx.project_root.join(export_file_name(period)));
    write_atomic(&path, &csv)?;
    info!(path = %path.display(), rows = view.visible.len(), "exported csv");

    let exported = Exported {
        path: path.display().to_string(),
        rows: view.visible.len(),
    };
    render(ctx.output, &exported, |e, w| {
        writeln!(w, "Exported {} initiatives to {}", e.rows, e.path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ExportArgs,
        }
        let w = Wrapper::parse_from(["test", "-o", "-", "--team", "design"]);
        assert_eq!(w.args.output.as_deref(), Some(Path::new("-")));
        assert!(!w.args.filter.team.is_all());
        assert!(Wrapper::parse_from(["test"]).args.output.is_none());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_atomic(&path, "Title\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Title\n");
        assert!(!dir.path().join("out.csv.tmp").exists());
    }
}
