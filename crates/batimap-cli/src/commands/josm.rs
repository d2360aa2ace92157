//! Josm command implementation

use super::{job_error, Context};
use crate::cli::JosmArgs;
use crate::progress::{finish_error, finish_success, JobBars};
use anyhow::{bail, Result};
use batimap_core::models::{EditableData, JobState};

pub async fn execute(args: JosmArgs, ctx: &Context) -> Result<()> {
    let output = &ctx.output;
    let id = ctx.batimap.request_josm_data(&args.insee).await?;

    let bars = JobBars::new(output.is_json());
    let spinner = bars.spinner(&format!("Preparing editing data for {}", args.insee));
    let progress = bars.add(&args.insee);
    let status = ctx.batimap.wait(id, &progress).await?;
    spinner.finish_and_clear();

    if status.state != JobState::Success {
        let reason = job_error(&status);
        finish_error(progress.bar(), &reason);
        bail!("Could not prepare editing data for {}: {}", args.insee, reason);
    }
    finish_success(progress.bar(), "ready");

    let data: EditableData = serde_json::from_value(status.result.unwrap_or_default())?;
    if output.is_json() {
        return output.result(&data);
    }

    output.section(format!("Editing data for {}", args.insee));
    output.kv("Status", data.date);
    output.kv("Buildings", &data.buildings_url);
    output.kv("Segmentation predictions", &data.segmentation_predictions_url);
    output.kv(
        "Bbox",
        format!("{}, {}, {}, {}", data.bbox[0], data.bbox[1], data.bbox[2], data.bbox[3]),
    );
    Ok(())
}
