//! Status command implementation

use super::Context;
use crate::output_types::LabelRow;
use anyhow::Result;

pub async fn execute(ctx: &Context) -> Result<()> {
    let labels = ctx.batimap.status_summary().await?;
    if !ctx.output.is_json() {
        let total: usize = labels.iter().map(|l| l.count).sum();
        ctx.output.section("Cities per status");
        ctx.output.kv("Total", total);
    }
    ctx.output.table(labels.iter().map(LabelRow::from).collect())
}
