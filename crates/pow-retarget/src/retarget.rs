//! Difficulty retargeting and verification of candidate headers.
//!
//! Every header either repeats the difficulty of its parent or, at a retarget
//! boundary, carries a target scaled by how long the previous period took.
//! Networks with the minimum-difficulty relaxation additionally accept the
//! easiest target when block production has stalled.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use num_bigint::BigUint;
use thiserror::Error;

use crate::compact;
use crate::header::{BlockHeader, StoredHeader};
use crate::params::{ConsensusParams, RetargetInterval};
use crate::store::{Ancestors, HeaderStore, WalkHalt};

/// Step cap for ancestor walks on networks that never retarget.
pub const MAX_UNBOUNDED_WALK: u32 = 1_000_000;

/// Walks slower than this are logged.
const SLOW_WALK: Duration = Duration::from_millis(50);

/// Why a candidate header's difficulty was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DifficultyError {
    /// The declared bits differ from the required bits.
    #[error("unexpected change in difficulty at height {height}: {observed:08x} vs {expected:08x}")]
    UnexpectedDifficultyChange {
        height: u32,
        expected: u32,
        observed: u32,
    },
    /// The store could not supply an ancestor needed for the decision.
    #[error("missing ancestor header at height {at_height}")]
    MissingAncestor { at_height: u32 },
    /// An ancestor walk exceeded its step cap.
    #[error("ancestor walk from height {from_height} exceeded {limit} steps")]
    AncestorWalkLimit { from_height: u32, limit: u32 },
}

impl DifficultyError {
    /// True when the header itself is wrong, false when history was lacking.
    pub fn is_consensus_violation(&self) -> bool {
        matches!(self, DifficultyError::UnexpectedDifficultyChange { .. })
    }
}

/// Outcome of verifying one candidate header: `Ok(())` means accepted.
pub type DifficultyDecision = Result<(), DifficultyError>;

/// Verify `next` against its parent `prev`.
///
/// Convenience wrapper around [`RetargetEngine::verify`].
pub fn verify<S: HeaderStore + ?Sized>(
    prev: &StoredHeader,
    next: &BlockHeader,
    store: &S,
    params: &ConsensusParams,
) -> DifficultyDecision {
    RetargetEngine::new(params, store).verify(prev, next)
}

/// Checks candidate headers against the retargeting rules of one network.
///
/// Holds only shared references; it never writes to the store.
pub struct RetargetEngine<'a, S: ?Sized> {
    params: &'a ConsensusParams,
    store: &'a S,
}

impl<'a, S: HeaderStore + ?Sized> RetargetEngine<'a, S> {
    pub fn new(params: &'a ConsensusParams, store: &'a S) -> Self {
        RetargetEngine { params, store }
    }

    /// Accept `next` or say why its difficulty is wrong.
    pub fn verify(&self, prev: &StoredHeader, next: &BlockHeader) -> DifficultyDecision {
        let expected = self.expected_bits(prev, next)?;
        let height = prev.height().saturating_add(1);
        if next.bits != expected {
            let err = DifficultyError::UnexpectedDifficultyChange {
                height,
                expected,
                observed: next.bits,
            };
            warn!("Rejecting header {}: {}", next.hash(), err);
            return Err(err);
        }

        debug!("Accepted difficulty {:08x} at height {}", next.bits, height);
        Ok(())
    }

    /// The compact bits `next` is required to carry.
    ///
    /// At a retarget boundary the computed target is reduced to the precision
    /// of `next.bits` before encoding, so the answer depends on the candidate.
    pub fn expected_bits(
        &self,
        prev: &StoredHeader,
        next: &BlockHeader,
    ) -> Result<u32, DifficultyError> {
        let interval = self.params.interval();
        match interval {
            RetargetInterval::Blocks(blocks) if interval.is_boundary(prev.height()) => {
                let target = self.retarget(prev, blocks.get());
                Ok(compact::encode(&compact::truncate_to_precision(target, next.bits)))
            }
            _ => self.between_retargets(prev, next.timestamp),
        }
    }

    /// Bits a miner should use for a header after `prev` stamped `next_time`.
    pub fn next_work_required(
        &self,
        prev: &StoredHeader,
        next_time: u32,
    ) -> Result<u32, DifficultyError> {
        let interval = self.params.interval();
        match interval {
            RetargetInterval::Blocks(blocks) if interval.is_boundary(prev.height()) => {
                Ok(compact::encode(&self.retarget(prev, blocks.get())))
            }
            _ => self.between_retargets(prev, next_time),
        }
    }

    fn between_retargets(
        &self,
        prev: &StoredHeader,
        next_time: u32,
    ) -> Result<u32, DifficultyError> {
        if !self.params.allow_min_difficulty_blocks() {
            return Ok(prev.bits());
        }

        // Production stalled: the easiest target is allowed.
        if u64::from(next_time) > u64::from(prev.time()) + self.params.min_difficulty_gap() {
            return Ok(self.params.max_bits());
        }

        self.last_regular_bits(prev)
    }

    /// Bits of the nearest header at or before `prev` that is either a period
    /// start or not a minimum-difficulty header.
    fn last_regular_bits(&self, prev: &StoredHeader) -> Result<u32, DifficultyError> {
        let interval = self.params.interval();
        let max_bits = self.params.max_bits();
        let limit = interval.blocks().unwrap_or(MAX_UNBOUNDED_WALK);

        let mut walk = Ancestors::new(self.store, prev, limit);
        let (mut height, mut bits) = (prev.height(), prev.bits());
        while !interval.is_period_start(height) && bits == max_bits {
            match walk.next() {
                Some(ancestor) => {
                    height = ancestor.height();
                    bits = ancestor.bits();
                }
                None => return Err(walk_failure(prev, walk.halted())),
            }
        }

        debug!(
            "Min-difficulty walk from {} stopped at {} after {} steps",
            prev.height(),
            height,
            walk.steps()
        );
        Ok(bits)
    }

    /// Full-precision target for the header after `prev` at a boundary.
    fn retarget(&self, prev: &StoredHeader, interval: u32) -> BigUint {
        let started = Instant::now();

        // Go back the full period. Near genesis the store runs out first and
        // the oldest header reached is used.
        let mut walk = Ancestors::new(self.store, prev, interval);
        let period_start_time = walk.by_ref().last().map_or(prev.time(), |h| h.time());
        if let Some(WalkHalt::Missing { at_height }) = walk.halted() {
            debug!(
                "Retarget walk from {} ended early at height {}",
                prev.height(),
                at_height + 1
            );
        }

        let elapsed = started.elapsed();
        if elapsed > SLOW_WALK {
            info!("Difficulty transition traversal took {:?}", elapsed);
        }

        let (min_timespan, max_timespan) = self.params.timespan_bounds();
        let timespan = (i64::from(prev.time()) - i64::from(period_start_time))
            .clamp(min_timespan, max_timespan);

        let mut target = compact::decode(prev.bits());
        target *= BigUint::from(timespan.max(0) as u64);
        target /= BigUint::from(self.params.target_timespan());

        if &target > self.params.max_target() {
            info!("Difficulty hit proof of work limit: {:x}", target);
            target = self.params.max_target().clone();
        }

        debug!(
            "Retarget at height {}: timespan {}s, {} steps, new target {:x}",
            prev.height().saturating_add(1),
            timespan,
            walk.steps(),
            target
        );
        target
    }
}

fn walk_failure(prev: &StoredHeader, halt: Option<WalkHalt>) -> DifficultyError {
    match halt {
        Some(WalkHalt::Limit { limit }) => DifficultyError::AncestorWalkLimit {
            from_height: prev.height(),
            limit,
        },
        Some(WalkHalt::Missing { at_height }) => DifficultyError::MissingAncestor { at_height },
        // The walk always stops at height zero before running dry.
        Some(WalkHalt::Genesis) | None => DifficultyError::MissingAncestor { at_height: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::ChainBuilder;
    use crate::store::MemoryHeaderStore;

    const D_BITS: u32 = 0x1d00ffff;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Bitcoin-style periods: 2016 blocks over two weeks, 600s spacing.
    fn two_week_params(allow_min_difficulty_blocks: bool, max_bits: u32) -> ConsensusParams {
        ConsensusParams::custom(
            RetargetInterval::every(2016).unwrap(),
            1_209_600,
            compact::decode(max_bits),
            allow_min_difficulty_blocks,
        )
        .unwrap()
    }

    #[test]
    fn test_non_boundary_keeps_difficulty() {
        init_logging();
        let params = two_week_params(false, 0x1e0fffff);
        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(10, 600, D_BITS);
        let store = chain.store();

        let same = chain.candidate(chain.tip().time() + 600, D_BITS);
        assert_eq!(verify(chain.tip(), &same, &store, &params), Ok(()));

        let changed = chain.candidate(chain.tip().time() + 600, 0x1d00fffe);
        assert_eq!(
            verify(chain.tip(), &changed, &store, &params),
            Err(DifficultyError::UnexpectedDifficultyChange {
                height: 11,
                expected: D_BITS,
                observed: 0x1d00fffe,
            })
        );
    }

    #[test]
    fn test_non_boundary_ignores_time_gap_without_relaxation() {
        let params = two_week_params(false, 0x1e0fffff);
        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(3, 600, D_BITS);
        let store = chain.store();

        let late = chain.candidate(chain.tip().time() + 100_000, params.max_bits());
        assert!(verify(chain.tip(), &late, &store, &params).is_err());
    }

    #[test]
    fn test_min_difficulty_after_time_gap() {
        init_logging();
        let params = two_week_params(true, 0x1e0fffff);
        assert_eq!(params.target_spacing(), 600);

        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(5, 600, D_BITS);
        let store = chain.store();
        let late = chain.tip().time() + 1201;

        let easy = chain.candidate(late, params.max_bits());
        assert_eq!(verify(chain.tip(), &easy, &store, &params), Ok(()));

        let regular = chain.candidate(late, D_BITS);
        assert_eq!(
            verify(chain.tip(), &regular, &store, &params),
            Err(DifficultyError::UnexpectedDifficultyChange {
                height: 6,
                expected: 0x1e0fffff,
                observed: D_BITS,
            })
        );
    }

    #[test]
    fn test_gap_of_exactly_twice_spacing_is_not_stalled() {
        let params = two_week_params(true, 0x1e0fffff);
        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(5, 600, D_BITS);
        let store = chain.store();
        let on_time = chain.tip().time() + 1200;

        let easy = chain.candidate(on_time, params.max_bits());
        assert!(verify(chain.tip(), &easy, &store, &params).is_err());

        let regular = chain.candidate(on_time, D_BITS);
        assert_eq!(verify(chain.tip(), &regular, &store, &params), Ok(()));
    }

    #[test]
    fn test_min_difficulty_walk_stops_at_period_start() {
        init_logging();
        let params = two_week_params(true, 0x1e0fffff);
        let b0 = 0x1c0ffff0;

        // Boundary header at 4032 with real difficulty, then four easy headers.
        let mut chain = ChainBuilder::anchored(4032, 1_000_000, b0);
        chain.extend(4, 1300, params.max_bits());
        assert_eq!(chain.tip().height(), 4036);
        let store = chain.store();

        let next = chain.candidate(chain.tip().time() + 600, b0);
        assert_eq!(verify(chain.tip(), &next, &store, &params), Ok(()));

        let easy = chain.candidate(chain.tip().time() + 600, params.max_bits());
        assert_eq!(
            verify(chain.tip(), &easy, &store, &params),
            Err(DifficultyError::UnexpectedDifficultyChange {
                height: 4037,
                expected: b0,
                observed: params.max_bits(),
            })
        );
    }

    #[test]
    fn test_min_difficulty_walk_stops_at_regular_header() {
        let params = two_week_params(true, 0x1e0fffff);
        let mut chain = ChainBuilder::anchored(4032, 1_000_000, 0x1c0ffff0);
        chain.push(1_000_600, 0x1c0fffee);
        chain.extend(3, 1300, params.max_bits());
        let store = chain.store();

        let engine = RetargetEngine::new(&params, &store);
        let next = chain.candidate(chain.tip().time() + 600, 0);
        assert_eq!(engine.expected_bits(chain.tip(), &next), Ok(0x1c0fffee));
    }

    #[test]
    fn test_min_difficulty_walk_missing_ancestor() {
        let params = two_week_params(true, 0x1e0fffff);
        let mut chain = ChainBuilder::anchored(4032, 1_000_000, 0x1c0ffff0);
        chain.extend(4, 1300, params.max_bits());
        let mut store = chain.store();
        store.remove(&chain.at_height(4034).hash());

        let next = chain.candidate(chain.tip().time() + 600, 0x1c0ffff0);
        let err = verify(chain.tip(), &next, &store, &params).unwrap_err();
        assert_eq!(err, DifficultyError::MissingAncestor { at_height: 4034 });
        assert!(!err.is_consensus_violation());
    }

    #[test]
    fn test_min_difficulty_walk_without_retargeting_reaches_genesis() {
        let params = ConsensusParams::custom(
            RetargetInterval::Disabled,
            302_400,
            compact::decode(0x1e0fffff),
            true,
        )
        .unwrap();
        assert_eq!(params.target_spacing(), 150);

        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(50, 150, params.max_bits());
        let store = chain.store();

        let engine = RetargetEngine::new(&params, &store);
        let next = chain.candidate(chain.tip().time() + 150, 0);
        assert_eq!(engine.expected_bits(chain.tip(), &next), Ok(D_BITS));
    }

    /// Returns the same header for every lookup, so walks never end on their own.
    struct CyclicStore(StoredHeader);

    impl HeaderStore for CyclicStore {
        fn get(&self, _hash: &crate::hash::BlockHash) -> Option<StoredHeader> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn test_min_difficulty_walk_hits_step_cap() {
        let params = two_week_params(true, 0x1e0fffff);
        let chain = ChainBuilder::anchored(4036, 1_000_000, params.max_bits());
        let store = CyclicStore(chain.tip().clone());

        let next = chain.candidate(chain.tip().time() + 600, D_BITS);
        let err = verify(chain.tip(), &next, &store, &params).unwrap_err();
        assert_eq!(
            err,
            DifficultyError::AncestorWalkLimit {
                from_height: 4036,
                limit: 2016,
            }
        );
        assert!(!err.is_consensus_violation());
    }

    #[test]
    fn test_rejection_at_highest_height() {
        let params = two_week_params(false, 0x1e0fffff);
        assert!(!params.interval().is_boundary(u32::MAX));

        let chain = ChainBuilder::anchored(u32::MAX, 1_000_000, D_BITS);
        let store = chain.store();

        let next = chain.candidate(chain.tip().time() + 600, 0x1c0ffff0);
        assert_eq!(
            verify(chain.tip(), &next, &store, &params),
            Err(DifficultyError::UnexpectedDifficultyChange {
                height: u32::MAX,
                expected: D_BITS,
                observed: 0x1c0ffff0,
            })
        );
    }

    #[test]
    fn test_boundary_exact_timespan_keeps_target() {
        init_logging();
        let params = two_week_params(false, 0x1e0fffff);
        let start = 1_000_000;

        // Heights 0..=2015; the first retarget walks back to genesis.
        let mut chain = ChainBuilder::genesis(start, D_BITS);
        chain.extend(2014, 600, D_BITS);
        chain.push(start + 1_209_600, D_BITS);
        assert_eq!(chain.tip().height(), 2015);
        let store = chain.store();

        let next = chain.candidate(chain.tip().time() + 600, D_BITS);
        assert_eq!(verify(chain.tip(), &next, &store, &params), Ok(()));
    }

    #[test]
    fn test_boundary_upper_clamp() {
        let params = two_week_params(false, 0x1e0fffff);
        let start = 1_000_000;

        let mut chain = ChainBuilder::genesis(start, D_BITS);
        chain.extend(2014, 600, D_BITS);
        chain.push(start + 1_209_600 * 10, D_BITS);
        let store = chain.store();

        let d = compact::decode(D_BITS);
        let clamped = (d * 4u32).min(params.max_target().clone());
        let expected = compact::encode(&clamped);
        assert_eq!(expected, 0x1d03fffc);

        let next = chain.candidate(chain.tip().time() + 600, expected);
        assert_eq!(verify(chain.tip(), &next, &store, &params), Ok(()));

        let unchanged = chain.candidate(chain.tip().time() + 600, D_BITS);
        assert_eq!(
            verify(chain.tip(), &unchanged, &store, &params),
            Err(DifficultyError::UnexpectedDifficultyChange {
                height: 2016,
                expected: 0x1d03fffc,
                observed: D_BITS,
            })
        );
    }

    #[test]
    fn test_boundary_upper_clamp_hits_max_target() {
        // With the limit at the current target, slow blocks cannot ease further.
        let params = two_week_params(false, D_BITS);
        let start = 1_000_000;

        let mut chain = ChainBuilder::genesis(start, D_BITS);
        chain.extend(2014, 600, D_BITS);
        chain.push(start + 1_209_600 * 10, D_BITS);
        let store = chain.store();

        let next = chain.candidate(chain.tip().time() + 600, D_BITS);
        assert_eq!(verify(chain.tip(), &next, &store, &params), Ok(()));
    }

    #[test]
    fn test_boundary_lower_clamp() {
        let params = two_week_params(false, 0x1e0fffff);
        let start = 1_000_000;

        // Timestamps barely move: the timespan clamps to a quarter.
        let mut chain = ChainBuilder::genesis(start, D_BITS);
        chain.extend(2015, 0, D_BITS);
        let store = chain.store();

        let engine = RetargetEngine::new(&params, &store);
        assert_eq!(engine.next_work_required(chain.tip(), start + 600), Ok(0x1c3fffc0));

        let next = chain.candidate(start + 600, 0x1c3fffc0);
        assert_eq!(engine.verify(chain.tip(), &next), Ok(()));
    }

    #[test]
    fn test_boundary_walks_back_full_interval() {
        // Period of 4 blocks over 2400s.
        let params = ConsensusParams::custom(
            RetargetInterval::every(4).unwrap(),
            2400,
            compact::decode(0x1e0fffff),
            false,
        )
        .unwrap();

        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(3, 600, D_BITS);
        // A long stall between heights 3 and 4.
        chain.push(1_010_000, D_BITS);
        chain.extend(3, 600, D_BITS);
        assert_eq!(chain.tip().height(), 7);
        let store = chain.store();

        // The period starts four headers back, at height 3, so the stall counts.
        let timespan = i64::from(chain.tip().time()) - i64::from(chain.at_height(3).time());
        assert_eq!(timespan, 10_000);

        let engine = RetargetEngine::new(&params, &store);
        let expected = compact::encode(&(compact::decode(D_BITS) * 4u32));
        assert_eq!(
            engine.next_work_required(chain.tip(), chain.tip().time() + 600),
            Ok(expected)
        );
    }

    #[test]
    fn test_boundary_tolerates_truncated_store() {
        let params = two_week_params(false, 0x1e0fffff);
        let start = 1_000_000;

        let mut chain = ChainBuilder::genesis(start, D_BITS);
        chain.extend(2015, 600, D_BITS);
        let mut store = chain.store();

        // Drop everything below height 2000; the walk uses height 2000 as the period start.
        for height in 0..2000 {
            store.remove(&chain.at_height(height).hash());
        }

        let elapsed = i64::from(chain.tip().time() - chain.at_height(2000).time());
        assert_eq!(elapsed, 15 * 600);

        let engine = RetargetEngine::new(&params, &store);
        // 9000s is far below a quarter of the timespan.
        assert_eq!(
            engine.next_work_required(chain.tip(), chain.tip().time()),
            Ok(0x1c3fffc0)
        );
    }

    #[test]
    fn test_disabled_retargeting_never_hits_boundary() {
        init_logging();
        let params = ConsensusParams::regtest().unwrap();
        let bits = 0x207fffff;

        let mut chain = ChainBuilder::genesis(1_000_000, bits);
        chain.extend(2015, 1, bits);
        let store = chain.store();

        let next = chain.candidate(chain.tip().time() + 1, bits);
        assert_eq!(verify(chain.tip(), &next, &store, &params), Ok(()));

        let other = chain.candidate(chain.tip().time() + 1, 0x1e0fffff);
        assert_eq!(
            verify(chain.tip(), &other, &store, &params),
            Err(DifficultyError::UnexpectedDifficultyChange {
                height: 2016,
                expected: bits,
                observed: 0x1e0fffff,
            })
        );
    }

    #[test]
    fn test_verification_is_repeatable() {
        let params = two_week_params(true, 0x1e0fffff);
        let mut chain = ChainBuilder::genesis(1_000_000, D_BITS);
        chain.extend(6, 600, D_BITS);
        let store = chain.store();
        let next = chain.candidate(chain.tip().time() + 600, D_BITS);

        let first = verify(chain.tip(), &next, &store, &params);
        let second = verify(chain.tip(), &next, &store, &params);
        assert_eq!(first, second);
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<RetargetEngine<'static, MemoryHeaderStore>>();
    }
}
