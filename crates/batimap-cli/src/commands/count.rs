//! Count command implementation

use super::Context;
use crate::cli::CountArgs;
use crate::output_types::CountRow;
use anyhow::Result;

pub async fn execute(args: CountArgs, ctx: &Context) -> Result<()> {
    let mut rows = Vec::new();
    for item in &args.items {
        let counts = ctx.batimap.compute_count(item).await?;
        if counts.is_empty() {
            ctx.output.warning(format!("No open data count for {}", item));
        }
        rows.extend(counts.iter().map(CountRow::from));
    }
    ctx.output.table(rows)
}
