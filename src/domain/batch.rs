use crate::domain::asset::Asset;
use std::ops::Range;
use std::str::FromStr;

/// What happens to an item refused at the memory gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipPolicy {
    /// Refused items are dropped from the job for good.
    Drop,
    /// Refused items get one more attempt after their batch's release
    /// point, then are dropped if memory is still over the ceiling.
    RetryAfterRelease,
}

impl FromStr for SkipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "retry" | "retry_after_release" => Ok(Self::RetryAfterRelease),
            other => Err(format!("unknown skip policy '{other}'")),
        }
    }
}

/// Order-preserving partition of `total` items into consecutive groups of at
/// most `batch_size`.
pub fn plan(total: usize, batch_size: usize) -> Vec<Range<usize>> {
    let size = batch_size.max(1);
    let mut groups = Vec::new();
    let mut start = 0;
    while start < total {
        let end = usize::min(start + size, total);
        groups.push(start..end);
        start = end;
    }
    groups
}

/// Deterministic release point between batches: consumes and drops every
/// asset the batch materialized, returning how many bytes were let go. Runs
/// exactly once per group, bounding peak scratch storage by the batch size
/// rather than the total input count.
pub fn release_point(scratch: Vec<Asset>) -> u64 {
    scratch.iter().map(Asset::byte_size).sum()
}
