use serde::{Deserialize, Serialize};

use crate::scheduler::resource::{ResourceId, ResourceRequest};

/// Maximum number of jobs `Concurrent` lets share the pool.
const CONCURRENT_JOBS: u32 = 4;

/// GPU allocation policy chosen per submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GpuStrategy {
    /// Spread across the requested GPUs when idle, pack onto free GPUs when busy.
    #[default]
    Auto,
    /// Every GPU for one job; the queue blocks everyone else.
    MaxSpeed,
    /// Isolate GPUs so up to four jobs run side by side.
    Concurrent,
}

impl GpuStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            GpuStrategy::Auto => "Auto",
            GpuStrategy::MaxSpeed => "Max Speed",
            GpuStrategy::Concurrent => "Concurrent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GpuStrategy::Auto => "Smart allocation based on current GPU usage",
            GpuStrategy::MaxSpeed => "All GPUs for one job, queue blocks others",
            GpuStrategy::Concurrent => "Isolate GPUs for parallel jobs (up to 4 simultaneous)",
        }
    }

    /// Turn a desired GPU count into a concrete request given the pool state.
    ///
    /// `free` must be ascending. The registry picks the lowest free ids for
    /// count requests, which is the tie-break for `Auto` packing. The result
    /// is rounded down so a multi-GPU run splits `num_heads` evenly.
    pub fn resolve(
        &self,
        requested: u32,
        free: &[ResourceId],
        total: u32,
        num_heads: u32,
    ) -> ResourceRequest {
        let total = total.max(1);
        let count = match self {
            GpuStrategy::MaxSpeed => total,
            GpuStrategy::Concurrent => (total / CONCURRENT_JOBS).max(1),
            GpuStrategy::Auto => {
                let wanted = requested.clamp(1, total);
                let free_count = free.len() as u32;
                if free_count >= total {
                    wanted
                } else if free_count == 0 {
                    1
                } else {
                    wanted.min(free_count)
                }
            }
        };
        ResourceRequest::Count(fit_to_heads(count, num_heads))
    }
}

/// Largest GPU count not above `count` that is 1 or divides `num_heads`.
/// A zero head count places no constraint.
pub fn fit_to_heads(count: u32, num_heads: u32) -> u32 {
    if num_heads == 0 {
        return count.max(1);
    }
    (2..=count)
        .rev()
        .find(|n| num_heads % n == 0)
        .unwrap_or(1)
}

impl std::fmt::Display for GpuStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuStrategy::Auto => write!(f, "auto"),
            GpuStrategy::MaxSpeed => write!(f, "max_speed"),
            GpuStrategy::Concurrent => write!(f, "concurrent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADS: u32 = 40;

    #[test]
    fn max_speed_takes_whole_pool() {
        assert_eq!(
            GpuStrategy::MaxSpeed.resolve(1, &[0, 1, 2, 3], 4, HEADS),
            ResourceRequest::Count(4)
        );
        // 12 does not divide 40, 10 does
        let free: Vec<ResourceId> = (0..12).collect();
        assert_eq!(
            GpuStrategy::MaxSpeed.resolve(1, &free, 12, HEADS),
            ResourceRequest::Count(10)
        );
    }

    #[test]
    fn concurrent_splits_pool_in_four() {
        assert_eq!(
            GpuStrategy::Concurrent.resolve(4, &[0, 1, 2, 3, 4, 5, 6, 7], 8, HEADS),
            ResourceRequest::Count(2)
        );
        assert_eq!(
            GpuStrategy::Concurrent.resolve(4, &[0, 1], 2, HEADS),
            ResourceRequest::Count(1)
        );
    }

    #[test]
    fn concurrent_share_rounds_down_to_head_divisor() {
        let free: Vec<ResourceId> = (0..12).collect();
        assert_eq!(
            GpuStrategy::Concurrent.resolve(1, &free, 12, HEADS),
            ResourceRequest::Count(2)
        );
        // 24 heads split three ways
        assert_eq!(
            GpuStrategy::Concurrent.resolve(1, &free, 12, 24),
            ResourceRequest::Count(3)
        );
    }

    #[test]
    fn auto_spreads_when_idle() {
        assert_eq!(
            GpuStrategy::Auto.resolve(4, &[0, 1, 2, 3], 4, HEADS),
            ResourceRequest::Count(4)
        );
        assert_eq!(
            GpuStrategy::Auto.resolve(9, &[0, 1], 2, HEADS),
            ResourceRequest::Count(2)
        );
    }

    #[test]
    fn auto_packs_onto_free_gpus_when_busy() {
        assert_eq!(
            GpuStrategy::Auto.resolve(4, &[2, 3], 4, HEADS),
            ResourceRequest::Count(2)
        );
        assert_eq!(GpuStrategy::Auto.resolve(4, &[], 4, HEADS), ResourceRequest::Count(1));
    }

    #[test]
    fn auto_packing_never_yields_unsplittable_count() {
        // One of four GPUs busy: three are free but 3 does not divide 40
        assert_eq!(
            GpuStrategy::Auto.resolve(4, &[1, 2, 3], 4, HEADS),
            ResourceRequest::Count(2)
        );
        assert_eq!(
            GpuStrategy::Auto.resolve(4, &[1, 2, 3], 4, 24),
            ResourceRequest::Count(3)
        );
    }

    #[test]
    fn empty_pool_still_asks_for_one() {
        assert_eq!(GpuStrategy::Auto.resolve(0, &[], 0, HEADS), ResourceRequest::Count(1));
    }

    #[test]
    fn head_fitting() {
        assert_eq!(fit_to_heads(8, 40), 8);
        assert_eq!(fit_to_heads(7, 40), 5);
        assert_eq!(fit_to_heads(3, 40), 2);
        assert_eq!(fit_to_heads(1, 40), 1);
        assert_eq!(fit_to_heads(0, 40), 1);
        assert_eq!(fit_to_heads(7, 0), 7);
    }
}
