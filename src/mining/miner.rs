//! Proof-of-work search
//!
//! The miner takes a header template and walks nonces upward from
//! `start_nonce` until the header hash meets the target. The search stops
//! early on cancellation, an attempt limit, a deadline, or when the 32-bit
//! nonce space runs out; none of these wrap the nonce.
//!
//! With several workers the nonce range is split into interleaved strides.
//! Workers keep searching below any nonce already found, so the winner is
//! always the lowest satisfying nonce: the same one a single worker finds.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::BlockHeader;
use crate::crypto::{to_hex, Hash256};

/// How often (in attempts) the deadline is checked and progress logged by default
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1 << 20;

/// Mining configuration
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// First nonce tried
    pub start_nonce: u32,
    /// Upper bound on nonces tried, counted from `start_nonce`
    pub max_attempts: Option<u64>,
    /// Wall-clock budget for the whole search
    pub timeout: Option<Duration>,
    /// Number of worker threads (1 = search on the calling thread)
    pub workers: usize,
    /// Attempts between deadline checks and progress log lines
    pub progress_interval: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            start_nonce: 0,
            max_attempts: None,
            timeout: None,
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Shared stop flag, cloneable across threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a search ended without a valid nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    AttemptLimit,
    Deadline,
    NonceSpaceExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::Cancelled => "cancelled",
            StopReason::AttemptLimit => "attempt limit reached",
            StopReason::Deadline => "deadline reached",
            StopReason::NonceSpaceExhausted => "nonce space exhausted",
        };
        f.write_str(text)
    }
}

/// Mining statistics
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, start: Instant) -> Self {
        let time_ms = start.elapsed().as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };
        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Result of one mining attempt
#[derive(Debug, Clone)]
pub enum MiningOutcome {
    Found {
        header: BlockHeader,
        hash: Hash256,
        stats: MiningStats,
    },
    Exhausted {
        reason: StopReason,
        stats: MiningStats,
    },
}

impl MiningOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, MiningOutcome::Found { .. })
    }

    pub fn stats(&self) -> &MiningStats {
        match self {
            MiningOutcome::Found { stats, .. } | MiningOutcome::Exhausted { stats, .. } => stats,
        }
    }
}

/// Final message from a worker
struct WorkerReport {
    worker_id: usize,
    attempts: u64,
    found: Option<u64>,
}

/// State shared read-only (apart from atomics) between workers
struct SearchState<'a> {
    template: &'a BlockHeader,
    start_nonce: u64,
    /// Exclusive bound on the nonce offset
    limit: u64,
    stride: u64,
    deadline: Option<Instant>,
    progress_interval: u64,
    cancel: &'a CancelToken,
    /// Lowest winning offset so far, `u64::MAX` if none
    best: AtomicU64,
    deadline_hit: AtomicBool,
}

/// Block miner
pub struct BlockMiner {
    config: MiningConfig,
    cancel: CancelToken,
}

impl BlockMiner {
    /// Create a new miner with its own cancel token
    pub fn new(config: MiningConfig) -> Self {
        Self::with_cancel_token(config, CancelToken::new())
    }

    /// Create a miner that stops when `cancel` is triggered
    pub fn with_cancel_token(config: MiningConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    /// Token that stops this miner's searches
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Search for a nonce satisfying the header's target
    ///
    /// The template's own nonce is ignored; the search starts at
    /// `config.start_nonce`.
    pub fn mine(&self, template: &BlockHeader) -> MiningOutcome {
        let start = Instant::now();
        let workers = self.config.workers.max(1);
        let start_nonce = u64::from(self.config.start_nonce);
        let nonce_space = u64::from(u32::MAX) - start_nonce + 1;
        let limit = self
            .config
            .max_attempts
            .map_or(nonce_space, |max| max.min(nonce_space));

        info!(
            "Mining with target {} from nonce {} ({} worker{})",
            template.target,
            start_nonce,
            workers,
            if workers == 1 { "" } else { "s" }
        );

        let state = SearchState {
            template,
            start_nonce,
            limit,
            stride: workers as u64,
            deadline: self.config.timeout.map(|t| start + t),
            progress_interval: self.config.progress_interval.max(1),
            cancel: &self.cancel,
            best: AtomicU64::new(u64::MAX),
            deadline_hit: AtomicBool::new(false),
        };

        let (sender, receiver) = mpsc::channel();
        if workers == 1 {
            search(&state, 0, &sender);
        } else {
            thread::scope(|scope| {
                for worker_id in 0..workers {
                    let sender = sender.clone();
                    let state = &state;
                    scope.spawn(move || search(state, worker_id, &sender));
                }
            });
        }
        drop(sender);

        let mut attempts = 0;
        let mut best: Option<u64> = None;
        for report in receiver {
            debug!(
                "Worker {} finished after {} attempts",
                report.worker_id, report.attempts
            );
            attempts += report.attempts;
            if let Some(offset) = report.found {
                best = Some(best.map_or(offset, |b| b.min(offset)));
            }
        }
        let stats = MiningStats::new(attempts, start);

        match best {
            Some(offset) => {
                let mut header = template.clone();
                header.nonce = (start_nonce + offset) as u32;
                let hash = header.hash();
                info!(
                    "Found nonce {} (hash {}) in {}ms ({} attempts, {:.2} H/s)",
                    header.nonce,
                    to_hex(&hash),
                    stats.time_ms,
                    stats.hash_attempts,
                    stats.hash_rate
                );
                MiningOutcome::Found {
                    header,
                    hash,
                    stats,
                }
            }
            None => {
                let reason = if self.cancel.is_cancelled() {
                    StopReason::Cancelled
                } else if state.deadline_hit.load(Ordering::Relaxed) {
                    StopReason::Deadline
                } else if limit < nonce_space {
                    StopReason::AttemptLimit
                } else {
                    StopReason::NonceSpaceExhausted
                };
                info!(
                    "Mining stopped without a valid nonce: {} ({} attempts in {}ms)",
                    reason, stats.hash_attempts, stats.time_ms
                );
                MiningOutcome::Exhausted { reason, stats }
            }
        }
    }
}

/// Search offsets `worker_id, worker_id + stride, ...` below `state.limit`
fn search(state: &SearchState<'_>, worker_id: usize, reports: &mpsc::Sender<WorkerReport>) {
    let mut header = state.template.clone();
    let mut offset = worker_id as u64;
    let mut attempts = 0u64;
    let mut found = None;

    while offset < state.limit && offset < state.best.load(Ordering::Relaxed) {
        if state.cancel.is_cancelled() {
            break;
        }
        if attempts > 0 && attempts % state.progress_interval == 0 {
            debug!("Worker {} at nonce offset {} ({} attempts)", worker_id, offset, attempts);
            if state.deadline.is_some_and(|d| Instant::now() >= d) {
                state.deadline_hit.store(true, Ordering::Relaxed);
                break;
            }
        }
        if state.deadline_hit.load(Ordering::Relaxed) {
            break;
        }

        header.nonce = (state.start_nonce + offset) as u32;
        attempts += 1;

        if state.template.target.is_met_by(&header.hash()) {
            state.best.fetch_min(offset, Ordering::Relaxed);
            found = Some(offset);
            break;
        }

        offset += state.stride;
    }

    // the receiver outlives every worker, so a send error cannot happen
    let _ = reports.send(WorkerReport {
        worker_id,
        attempts,
        found,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Target, NULL_HASH};

    fn template(target: Target) -> BlockHeader {
        BlockHeader::new(NULL_HASH, [5u8; 32], 1_700_000_000, target)
    }

    fn easy_target() -> Target {
        Target::from_leading_zero_bits(8)
    }

    #[test]
    fn test_max_target_succeeds_on_first_nonce() {
        for start_nonce in [0, 42, u32::MAX] {
            let miner = BlockMiner::new(MiningConfig {
                start_nonce,
                ..Default::default()
            });
            match miner.mine(&template(Target::MAX)) {
                MiningOutcome::Found { header, stats, .. } => {
                    assert_eq!(header.nonce, start_nonce);
                    assert_eq!(stats.hash_attempts, 1);
                }
                other => panic!("expected a block, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_found_header_meets_target() {
        let miner = BlockMiner::new(MiningConfig::default());
        match miner.mine(&template(easy_target())) {
            MiningOutcome::Found { header, hash, stats } => {
                assert!(header.meets_target());
                assert_eq!(hash, header.hash());
                assert_eq!(stats.hash_attempts, u64::from(header.nonce) + 1);
            }
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let miner = BlockMiner::new(MiningConfig::default());
        miner.cancel_token().cancel();

        let outcome = miner.mine(&template(Target([0u8; 32])));
        assert!(matches!(
            outcome,
            MiningOutcome::Exhausted {
                reason: StopReason::Cancelled,
                ..
            }
        ));
        assert_eq!(outcome.stats().hash_attempts, 0);
    }

    #[test]
    fn test_cancelled_from_another_thread() {
        let token = CancelToken::new();
        let miner = BlockMiner::with_cancel_token(
            MiningConfig {
                workers: 2,
                ..Default::default()
            },
            token.clone(),
        );

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });
        let outcome = miner.mine(&template(Target([0u8; 32])));
        canceller.join().unwrap();

        assert!(matches!(
            outcome,
            MiningOutcome::Exhausted {
                reason: StopReason::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_attempt_limit() {
        let miner = BlockMiner::new(MiningConfig {
            max_attempts: Some(500),
            ..Default::default()
        });
        let outcome = miner.mine(&template(Target([0u8; 32])));
        assert!(matches!(
            outcome,
            MiningOutcome::Exhausted {
                reason: StopReason::AttemptLimit,
                ..
            }
        ));
        assert_eq!(outcome.stats().hash_attempts, 500);
    }

    #[test]
    fn test_deadline() {
        let miner = BlockMiner::new(MiningConfig {
            timeout: Some(Duration::from_millis(20)),
            progress_interval: 64,
            ..Default::default()
        });
        assert!(matches!(
            miner.mine(&template(Target([0u8; 32]))),
            MiningOutcome::Exhausted {
                reason: StopReason::Deadline,
                ..
            }
        ));
    }

    #[test]
    fn test_nonce_space_exhaustion_does_not_wrap() {
        let miner = BlockMiner::new(MiningConfig {
            start_nonce: u32::MAX - 9,
            ..Default::default()
        });
        let outcome = miner.mine(&template(Target([0u8; 32])));
        assert!(matches!(
            outcome,
            MiningOutcome::Exhausted {
                reason: StopReason::NonceSpaceExhausted,
                ..
            }
        ));
        assert_eq!(outcome.stats().hash_attempts, 10);
    }

    #[test]
    fn test_parallel_result_matches_sequential() {
        let header = template(easy_target());
        let sequential = BlockMiner::new(MiningConfig::default()).mine(&header);

        for workers in [2, 3, 8] {
            let parallel = BlockMiner::new(MiningConfig {
                workers,
                ..Default::default()
            })
            .mine(&header);

            match (&sequential, &parallel) {
                (
                    MiningOutcome::Found { header: a, hash: ha, .. },
                    MiningOutcome::Found { header: b, hash: hb, .. },
                ) => {
                    assert_eq!(a.nonce, b.nonce, "workers = {}", workers);
                    assert_eq!(ha, hb);
                }
                other => panic!("expected blocks, got {:?}", other),
            }
        }
    }
}
