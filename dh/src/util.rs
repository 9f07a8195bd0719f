//! Small helpers shared across the public API and CLIs.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::consts::{GROUP_MULTIPLIER, MAX_GROUP_SIZE};

/// Seconds since the Unix epoch, for `PrimaryHeader::creation_timestamp`.
pub fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Validates a `group_size` multiplier against the range `create_file`
/// requires (`spec.md` §4.10).
pub fn valid_group_size(group_size: u16) -> bool {
    group_size >= 1 && group_size <= MAX_GROUP_SIZE
}

pub fn group_size_bytes(group_size: u16) -> u32 {
    group_size as u32 * GROUP_MULTIPLIER
}

/// Default `big_rec_size`: 80% of a group, matching `create_file`'s
/// documented default when the caller passes `0`.
pub fn default_big_rec_size(group_size_bytes: u32) -> u32 {
    (group_size_bytes as u64 * 80 / 100) as u32
}
