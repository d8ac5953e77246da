use serde::{Deserialize, Serialize};
use tracing::debug;

use super::registry::JobKind;
use super::{FetchCharacterJob, Job, JobContext, JobError};
use crate::store::Transaction;

/// Most character jobs a single range job expands into
pub const RANGE_CHUNK: u32 = 500;

/// Seed `count` character jobs starting at `start`.
///
/// Performs no I/O. Large ranges are split: one run emits at most
/// [`RANGE_CHUNK`] character jobs plus a range job for the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCharacterRangeJob {
    pub start: i64,
    pub count: u32,
}

impl JobKind for FetchCharacterRangeJob {
    const TAG: &'static str = "character_range";
}

impl FetchCharacterRangeJob {
    /// Ids past `i64::MAX` do not exist; a range reaching beyond it is cut there.
    pub fn expand(&self) -> Vec<Job> {
        let count = self.count.min(self.ids_until_max());
        let chunk = count.min(RANGE_CHUNK);
        let mut jobs: Vec<Job> = (0..chunk)
            .filter_map(|offset| self.start.checked_add(i64::from(offset)))
            .map(|id| FetchCharacterJob::new(id).into())
            .collect();

        let remaining = count - chunk;
        if remaining > 0 {
            if let Some(start) = self.start.checked_add(i64::from(chunk)) {
                jobs.push(FetchCharacterRangeJob { start, count: remaining }.into());
            }
        }
        jobs
    }

    fn ids_until_max(&self) -> u32 {
        let left = i128::from(i64::MAX) - i128::from(self.start) + 1;
        u32::try_from(left).unwrap_or(u32::MAX)
    }

    pub async fn run(&self, _ctx: &JobContext, _tx: &mut Transaction) -> Result<Vec<Job>, JobError> {
        let jobs = self.expand();
        debug!(start = self.start, count = self.count, follow_ups = jobs.len(), "Range expanded");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_range_expands_fully() {
        let jobs = FetchCharacterRangeJob { start: 10, count: 3 }.expand();
        assert_eq!(
            jobs,
            vec![
                Job::from(FetchCharacterJob::new(10)),
                Job::from(FetchCharacterJob::new(11)),
                Job::from(FetchCharacterJob::new(12)),
            ]
        );
    }

    #[test]
    fn test_large_range_chains_remainder() {
        let jobs = FetchCharacterRangeJob { start: 1, count: 1_200 }.expand();
        assert_eq!(jobs.len(), RANGE_CHUNK as usize + 1);
        assert_eq!(jobs[0], Job::from(FetchCharacterJob::new(1)));
        assert_eq!(
            jobs[RANGE_CHUNK as usize - 1],
            Job::from(FetchCharacterJob::new(RANGE_CHUNK as i64))
        );
        assert_eq!(
            jobs.last(),
            Some(&Job::from(FetchCharacterRangeJob { start: 501, count: 700 }))
        );
    }

    #[test]
    fn test_exact_chunk_has_no_remainder() {
        let jobs = FetchCharacterRangeJob { start: 0, count: RANGE_CHUNK }.expand();
        assert_eq!(jobs.len(), RANGE_CHUNK as usize);
        assert!(jobs.iter().all(|j| matches!(j, Job::Character(_))));
    }

    #[test]
    fn test_range_stops_at_largest_id() {
        let jobs = FetchCharacterRangeJob { start: i64::MAX - 1, count: 3 }.expand();
        assert_eq!(
            jobs,
            vec![
                Job::from(FetchCharacterJob::new(i64::MAX - 1)),
                Job::from(FetchCharacterJob::new(i64::MAX)),
            ]
        );

        let last = FetchCharacterRangeJob { start: i64::MAX, count: u32::MAX }.expand();
        assert_eq!(last, vec![Job::from(FetchCharacterJob::new(i64::MAX))]);
    }

    #[test]
    fn test_chained_remainder_near_largest_id() {
        let start = i64::MAX - 600;
        let jobs = FetchCharacterRangeJob { start, count: 1_000 }.expand();
        assert_eq!(jobs.len(), RANGE_CHUNK as usize + 1);
        assert_eq!(
            jobs.last(),
            Some(&Job::from(FetchCharacterRangeJob {
                start: start + i64::from(RANGE_CHUNK),
                count: 101,
            }))
        );
    }

    #[test]
    fn test_negative_start_is_untouched() {
        let jobs = FetchCharacterRangeJob { start: i64::MIN, count: 2 }.expand();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1], Job::from(FetchCharacterJob::new(i64::MIN + 1)));
    }

    #[test]
    fn test_empty_range_is_a_noop() {
        assert!(FetchCharacterRangeJob { start: 5, count: 0 }.expand().is_empty());
    }
}
