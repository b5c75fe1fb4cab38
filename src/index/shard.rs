//! Shard and day keys.
//!
//! A shard key is `yyyyMMdd_N`; a day key is the bare `yyyyMMdd` and stands
//! for every shard of that date. Keys order lexicographically, so a day sorts
//! immediately before its own shards.

const DAY_LEN: usize = 8;

/// A bare eight digit date
pub fn is_day(key: &str) -> bool {
    key.len() == DAY_LEN && key.bytes().all(|b| b.is_ascii_digit())
}

/// True when `key` is the shard itself or the day that covers it
pub fn matches(key: &str, shard: &str) -> bool {
    if key == shard {
        return true;
    }
    is_day(key) && shard.len() > DAY_LEN && shard.starts_with(key)
}

pub fn greater_than_or_equal(key: &str, target: &str) -> bool {
    key >= target
}

/// Strip a dangling shard delimiter from a seek target
pub fn normalize_seek(target: &str) -> &str {
    target.strip_suffix('_').unwrap_or(target)
}
