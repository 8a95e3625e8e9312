use anyhow::Result;
use tally_sync::{reconcile, SubscriptionRecord};

use super::read_json;
use crate::cli::args::ReconcileArgs;
use crate::exit_codes::SUCCESS;

pub fn cmd_reconcile(args: ReconcileArgs) -> Result<i32> {
    let existing: Vec<SubscriptionRecord> = read_json(&args.existing, "existing subscriptions")?;
    let incoming: Vec<SubscriptionRecord> = read_json(&args.incoming, "incoming subscriptions")?;

    let reconciliation = reconcile(&existing, &incoming);
    println!("{}", serde_json::to_string_pretty(&reconciliation)?);
    Ok(SUCCESS)
}
