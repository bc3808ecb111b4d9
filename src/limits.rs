// Hard limits on inbound data and ledger growth.

/// Max demand entries accepted in one submission.
pub const MAX_DEMANDS_PER_SUBMISSION: usize = 500;

/// Max byte length of a channel id.
pub const MAX_CHANNEL_ID_LEN: usize = 128;

/// Max byte length of a slot name ("08:00").
pub const MAX_HOUR_LEN: usize = 32;

/// Max byte length of a requesting area or owner.
pub const MAX_AREA_LEN: usize = 256;

/// Max byte length of a scheduling domain name.
pub const MAX_DOMAIN_LEN: usize = 64;

/// Max records held in a single (channel, date, hour) bucket.
pub const MAX_RECORDS_PER_BUCKET: usize = 10_000;

/// Max quantity a single demand entry may request.
pub const MAX_QUANTITY: u32 = 1_000_000;

/// Depth of the group-commit journal channel.
pub const JOURNAL_CHANNEL_DEPTH: usize = 4096;
