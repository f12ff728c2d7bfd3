//! Progressive delivery of trees and files as server-sent events.
//!
//! Tree stream: `progress` (5%) → (`progress`, `chunk`)* → `done` | `sse-error`.
//! File stream: `progress` (5%) → `progress` (50%) → `done` | `sse-error`.

pub mod event;
pub mod file;
pub mod session;
pub mod tree;

pub use event::{ErrorEvent, SseEvent};
pub use file::stream_file;
pub use session::Session;
pub use tree::stream_tree;

pub use crate::metrics::StreamOutcome;

/// Percentage reported before any upstream call.
pub const INITIAL_PERCENT: u8 = 5;

/// Percentage reported once a file payload has been fetched.
pub const FETCHED_PERCENT: u8 = 50;

/// Entries per chunk: `max(floor, ceil(total / fan_out))`, never zero.
pub fn chunk_size(total: usize, fan_out: usize, floor: usize) -> usize {
    total.div_ceil(fan_out.max(1)).max(floor).max(1)
}

/// `min(99, round(sent / total * 100))`.
pub fn percent_sent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 99;
    }
    let rounded = (sent.saturating_mul(100) + total / 2) / total;
    rounded.min(99) as u8
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_follows_fan_out_for_large_trees() {
        assert_eq!(chunk_size(130, 12, 10), 11);
        assert_eq!(chunk_size(12_000, 12, 10), 1000);
    }

    #[test]
    fn chunk_size_floor_applies_to_small_trees() {
        assert_eq!(chunk_size(15, 12, 10), 10);
        assert_eq!(chunk_size(3, 12, 10), 10);
        assert_eq!(chunk_size(0, 12, 10), 10);
    }

    #[test]
    fn percent_rounds_and_caps() {
        assert_eq!(percent_sent(11, 130), 8);
        assert_eq!(percent_sent(65, 130), 50);
        assert_eq!(percent_sent(129, 130), 99);
        assert_eq!(percent_sent(130, 130), 99);
        assert_eq!(percent_sent(1, 200), 1);
    }
}
