use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::model::*;

/// Calendar day from `YYYY-MM-DD`, an RFC 3339 timestamp, or a naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp.
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Convert one raw demand, or `None` if a scheduling field is missing,
/// unparsable or non-positive. Size limits are enforced per submission by
/// the scheduler, not here.
pub fn validate_one(raw: RawDemand) -> Option<DemandEntry> {
    let channel_id = non_empty(raw.channel_id)?;
    let date = raw.date.as_deref().and_then(parse_day)?;
    let hour = non_empty(raw.hour)?;
    let quantity = raw
        .quantity
        .filter(|q| *q > 0)
        .and_then(|q| Quantity::try_from(q).ok())?;
    Some(DemandEntry {
        channel_id,
        date,
        hour,
        quantity,
        extra: raw.extra,
    })
}

/// Keep only well-formed demand. Malformed entries are expected noise from
/// the form layer and are dropped without error.
pub fn validate(raw: Vec<RawDemand>) -> Vec<DemandEntry> {
    let total = raw.len();
    let valid: Vec<DemandEntry> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(idx, r)| {
            let entry = validate_one(r);
            if entry.is_none() {
                debug!(index = idx, "dropping malformed demand entry");
            }
            entry
        })
        .collect();
    if valid.len() < total {
        metrics::counter!(crate::observability::DEMANDS_REJECTED_TOTAL)
            .increment((total - valid.len()) as u64);
    }
    valid
}
