//! Obsolete command implementation

use super::Context;
use crate::cli::ObsoleteArgs;
use crate::output_types::CityRow;
use anyhow::{Context as _, Result};
use batimap_core::models::StatusLabel;
use batimap_engine::ObsoleteQuery;
use std::collections::HashSet;

pub async fn execute(args: ObsoleteArgs, ctx: &Context) -> Result<()> {
    let excluded_labels = args
        .ignored
        .iter()
        .map(|label| {
            label
                .parse::<StatusLabel>()
                .with_context(|| format!("Invalid status to ignore: {}", label))
        })
        .collect::<Result<HashSet<_>>>()?;

    let query = ObsoleteQuery {
        excluded_labels,
        excluded_cities: args.excluded.into_iter().collect(),
        min_ratio: args.min_ratio,
    };

    match ctx.batimap.pick_obsolete_city(&query).await? {
        Some(city) => {
            if !ctx.output.is_json() {
                ctx.output.info(format!("Next city to work on: {}({})", city.name, city.insee));
            }
            ctx.output.table(vec![CityRow::from(&city)])
        }
        None => {
            ctx.output.warning("No city matches these filters");
            if ctx.output.is_json() {
                ctx.output.result(serde_json::Value::Null)?;
            }
            Ok(())
        }
    }
}
