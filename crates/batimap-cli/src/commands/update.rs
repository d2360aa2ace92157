//! Update command implementation

use super::{job_error, Context};
use crate::cli::UpdateArgs;
use crate::output_types::{CityRow, JobRow};
use crate::progress::{finish_error, finish_success, JobBars};
use anyhow::{bail, Result};
use batimap_core::models::{CityDto, JobState};

pub async fn execute(args: UpdateArgs, ctx: &Context) -> Result<()> {
    let output = &ctx.output;

    let mut ids = Vec::new();
    for insee in &args.insees {
        let id = ctx.batimap.request_city_update(insee).await?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if !output.is_json() {
        output.section("Queued jobs");
        output.table(ctx.batimap.list_jobs().iter().map(JobRow::from).collect())?;
    }

    let bars = JobBars::new(output.is_json());
    let mut cities = Vec::new();
    let mut failures = 0;
    for id in ids {
        let status = ctx.batimap.job_status(id)?;
        let progress = bars.add(&status.key.args.join(" "));
        let status = ctx.batimap.wait(id, &progress).await?;
        match (status.state, &status.result) {
            (JobState::Success, Some(result)) => {
                let city: CityDto = serde_json::from_value(result.clone())?;
                finish_success(progress.bar(), &city.date.to_string());
                cities.push(city);
            }
            _ => {
                let reason = job_error(&status);
                finish_error(progress.bar(), &reason);
                output.error(format!("{}: {}", status.key.args.join(" "), reason));
                failures += 1;
            }
        }
    }

    output.table(cities.iter().map(CityRow::from).collect())?;
    if failures > 0 {
        bail!("{} update(s) failed", failures);
    }
    Ok(())
}
