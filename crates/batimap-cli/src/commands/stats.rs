//! Stats command implementation

use super::Context;
use crate::cli::StatsArgs;
use crate::output_types::CityRow;
use anyhow::{bail, Result};

pub async fn execute(args: StatsArgs, ctx: &Context) -> Result<()> {
    if args.items.is_empty() && !args.all {
        bail!("Give cities or departments, or --all");
    }

    let cities = ctx.batimap.stats(&args.items, args.fast, args.all).await?;
    if cities.is_empty() {
        ctx.output.warning("No matching city");
    }
    ctx.output.table(cities.iter().map(CityRow::from).collect())
}
