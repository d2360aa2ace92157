//! Initdb command implementation

use super::{job_error, Context};
use crate::cli::InitdbArgs;
use crate::progress::{finish_error, finish_success, JobBars};
use anyhow::{bail, Result};
use batimap_core::models::JobState;
use batimap_engine::{InitdbReport, Invalidation};

pub async fn execute(args: InitdbArgs, ctx: &Context) -> Result<()> {
    let output = &ctx.output;
    if args.items.is_empty() {
        output.info("Refreshing every known department");
    } else {
        output.info(format!("Refreshing {}", args.items.join(", ")));
    }

    let id = ctx.batimap.request_initdb(args.items).await?;
    let bars = JobBars::new(output.is_json());
    let progress = bars.add("initdb");
    let status = ctx.batimap.wait(id, &progress).await?;

    if status.state != JobState::Success {
        finish_error(progress.bar(), "initdb failed");
        let reason = job_error(&status);
        bail!("initdb failed: {}", reason);
    }
    finish_success(progress.bar(), "initdb done");

    let report: InitdbReport = serde_json::from_value(status.result.unwrap_or_default())?;
    if output.is_json() {
        return output.result(&report);
    }

    output.section("Initdb");
    output.kv("Departments", report.departments.join(", "));
    output.kv("Updated cities", report.updated.len());
    match report.invalidation {
        Invalidation::Full => output.kv("Tiles", "all flagged as outdated"),
        Invalidation::Targeted { boxes } => output.kv("Tiles", format!("{} boxes flagged as outdated", boxes)),
    }
    output.kv("Data ready marker", ctx.batimap.pipeline().maintenance().ready_marker().display());
    output.success("Statuses refreshed");
    Ok(())
}
