use std::io::Read;
use std::sync::Arc;

use tracing::info;

use capalloc::config::EngineConfig;
use capalloc::ledger::LedgerStore;
use capalloc::model::Submission;
use capalloc::reference::ReferenceData;
use capalloc::scheduler::Scheduler;

/// Allocate one submission against the local ledger.
///
/// Usage: `capalloc [--plan] [submission.json]`. Reads stdin when no file is
/// given. `--plan` allocates without recording bookings.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();
    capalloc::observability::init(config.metrics_port)?;

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let plan_only = match args.iter().position(|a| a == "--plan") {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    };

    let text = match args.first() {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let submission: Submission = serde_json::from_str(&text)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let (catalog, profiles) = ReferenceData::load(&config.reference_data)?.into_providers();
    let ledger = Arc::new(LedgerStore::open(config.journal_path())?);

    info!("capalloc");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  reference_data: {}", config.reference_data.display());
    info!("  shared_hours: {:?}", config.shared_hours.iter().collect::<Vec<_>>());

    let scheduler = Scheduler::new(
        Arc::new(catalog),
        Arc::new(profiles),
        ledger,
        config.shared_hours.clone(),
    );

    let output = if plan_only {
        let (allocation, rejected) = scheduler.plan(&submission).await?;
        serde_json::json!({
            "entries": allocation.entries,
            "rejected": rejected,
            "report": allocation.report,
        })
    } else {
        serde_json::to_value(scheduler.schedule(&submission).await?)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
