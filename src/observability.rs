use std::net::SocketAddr;

// ── Allocation metrics ──────────────────────────────────────────

/// Counter: submissions scheduled. Labels: status.
pub const SUBMISSIONS_TOTAL: &str = "capalloc_submissions_total";

/// Counter: inbound demand entries dropped as malformed.
pub const DEMANDS_REJECTED_TOTAL: &str = "capalloc_demands_rejected_total";

/// Counter: entries split across slots.
pub const SPLITS_TOTAL: &str = "capalloc_splits_total";

/// Counter: quantity dropped because no slot had room.
pub const DROPPED_QUANTITY_TOTAL: &str = "capalloc_dropped_quantity_total";

/// Histogram: fixed-point passes per allocation run.
pub const ALLOCATION_PASSES: &str = "capalloc_allocation_passes";

// ── Ledger metrics ──────────────────────────────────────────────

/// Counter: booking rows that failed to persist.
pub const LEDGER_WRITE_FAILURES_TOTAL: &str = "capalloc_ledger_write_failures_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "capalloc_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "capalloc_journal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
