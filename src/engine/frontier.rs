//! The self-extending work queue of regions to scan.
//!
//! Every region ever admitted keeps an id in admission order and moves through
//! `Queued -> Scanning -> Scanned` (or `Failed`). A region is not admitted when an
//! admitted region on the same contig already contains it, which bounds total work.
//!
//! Ids also decide who delivers a record whose footprint overlaps several admitted
//! regions. The lowest-id region that scans it successfully does; a failed region only
//! keeps the records it delivered before failing. Scans settle this through
//! [`Frontier::claim`], under the same lock that admits new regions.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::debug;

use crate::core::record::{AlignmentRecord, RecordIdentity};
use crate::core::types::{PositionSignature, SliceRegion};
use crate::engine::registry::ObserveOutcome;

/// How long an idle worker sleeps before re-checking its stop condition
const IDLE_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Queued,
    Scanning,
    Scanned,
    Failed,
}

/// Result of offering a region to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued(usize),
    /// An admitted region already contains it
    Covered,
    /// The frontier is at `max_regions`
    OverCapacity,
}

/// A region handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTicket {
    pub id: usize,
    pub region: SliceRegion,
}

/// An accepted record's effect on the registry and the frontier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acceptance {
    pub outcome: ObserveOutcome,

    /// Regions queued for the positions the record left pending
    pub regions_queued: usize,
}

/// Who delivers a record found overlapping a scanned region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The claiming scan delivers it; the registry has already observed it
    Accepted(Acceptance),
    /// An earlier region delivered it
    Delivered,
    /// An earlier overlapping region is still scanning and may yet deliver it
    Undecided,
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub admitted: usize,
    pub scanned: usize,
    pub failed: usize,
    pub unscanned: usize,
    pub rejected_by_cap: usize,
}

#[derive(Debug)]
struct AdmittedRegion {
    region: SliceRegion,
    state: RegionState,

    /// Records claimed while scanning; kept past completion only if the scan failed
    delivered: HashSet<RecordIdentity>,
}

#[derive(Debug, Default)]
struct FrontierState {
    regions: Vec<AdmittedRegion>,
    by_contig: HashMap<String, Vec<usize>>,
    queue: VecDeque<usize>,
    in_flight: usize,
    rejected_by_cap: usize,
    stopped: bool,
    abandoned: bool,
}

impl FrontierState {
    fn ids_on<'a>(&'a self, contig: &str) -> impl Iterator<Item = usize> + 'a {
        self.by_contig
            .get(contig)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .copied()
    }

    fn is_contained(&self, region: &SliceRegion) -> bool {
        self.ids_on(region.contig())
            .any(|id| self.regions[id].region.contains(region))
    }

    fn covers(&self, signature: &PositionSignature) -> bool {
        self.ids_on(&signature.contig)
            .any(|id| self.regions[id].region.covers(signature))
    }

    fn overlaps(&self, contig: &str, start: u64, end: u64) -> bool {
        self.ids_on(contig)
            .any(|id| self.regions[id].region.overlaps_span(contig, start, end))
    }

    /// Settle a record against the regions admitted before `id` that overlap it.
    ///
    /// The queue pops in id order, so none of those regions is still queued.
    fn prior_claim(&self, id: usize, identity: &RecordIdentity) -> Option<Claim> {
        let mut undecided = false;
        for other in self.ids_on(&identity.contig).filter(|&other| other < id) {
            let admitted = &self.regions[other];
            if !admitted
                .region
                .overlaps_span(&identity.contig, identity.start, identity.end)
            {
                continue;
            }
            match admitted.state {
                RegionState::Scanned => return Some(Claim::Delivered),
                RegionState::Failed if admitted.delivered.contains(identity) => {
                    return Some(Claim::Delivered)
                }
                RegionState::Scanning => undecided = true,
                RegionState::Failed | RegionState::Queued => {}
            }
        }
        undecided.then_some(Claim::Undecided)
    }

    fn has_work(&self) -> bool {
        !self.queue.is_empty() || self.in_flight > 0
    }
}

/// Regions still to scan plus every region already admitted.
///
/// Shared by all workers; mutation happens under one lock. Idle workers park on one
/// condition variable until work appears or the frontier drains, and scans holding
/// undecided records park on another until some region finishes.
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    work_ready: Condvar,
    region_done: Condvar,
    max_regions: usize,
    margin: u64,
}

impl Frontier {
    /// Create an empty frontier admitting at most `max_regions` regions in total, padding
    /// pending positions by `margin` bases when they become regions
    pub fn new(max_regions: usize, margin: u64) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            work_ready: Condvar::new(),
            region_done: Condvar::new(),
            max_regions,
            margin,
        }
    }

    /// Admit the caller's starting regions, returning how many were queued
    pub fn seed<I>(&self, regions: I) -> usize
    where
        I: IntoIterator<Item = SliceRegion>,
    {
        regions
            .into_iter()
            .filter(|region| matches!(self.admit(region.clone()), Admission::Queued(_)))
            .count()
    }

    /// Offer one region; it is queued unless already contained or over capacity
    pub fn admit(&self, region: SliceRegion) -> Admission {
        let mut state = self.state.lock();
        let admission = self.admit_locked(&mut state, region);
        drop(state);

        if matches!(admission, Admission::Queued(_)) {
            self.work_ready.notify_one();
        }
        admission
    }

    fn admit_locked(&self, state: &mut FrontierState, region: SliceRegion) -> Admission {
        if state.is_contained(&region) {
            return Admission::Covered;
        }
        if state.regions.len() >= self.max_regions {
            state.rejected_by_cap += 1;
            debug!(region = %region, "Frontier at capacity, rejecting region");
            return Admission::OverCapacity;
        }

        let id = state.regions.len();
        state
            .by_contig
            .entry(region.contig().to_string())
            .or_default()
            .push(id);
        state.regions.push(AdmittedRegion {
            region,
            state: RegionState::Queued,
            delivered: HashSet::new(),
        });
        state.queue.push_back(id);
        Admission::Queued(id)
    }

    /// Turn newly pending signatures into candidate regions.
    ///
    /// A signature already covered by an admitted region (queued, scanning, scanned, or
    /// failed) produces nothing; otherwise a region of `margin` bases around it is
    /// admitted. Returns the number of regions queued.
    pub fn offer_pending(&self, signatures: &[PositionSignature]) -> usize {
        if signatures.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        let queued = self.offer_pending_locked(&mut state, signatures);
        drop(state);

        if queued > 0 {
            self.work_ready.notify_all();
        }
        queued
    }

    fn offer_pending_locked(
        &self,
        state: &mut FrontierState,
        signatures: &[PositionSignature],
    ) -> usize {
        let mut queued = 0;
        for signature in signatures {
            if state.covers(signature) {
                continue;
            }
            let candidate = SliceRegion::around(signature, self.margin);
            if let Admission::Queued(id) = self.admit_locked(state, candidate) {
                debug!(id, signature = %signature, "Discovered region for pending record");
                queued += 1;
            }
        }
        queued
    }

    /// Decide whether the scan of region `id` delivers `record`, whose footprint
    /// overlaps that region.
    ///
    /// An earlier overlapping region that scanned successfully has delivered it, and so
    /// has an earlier failed region that claimed it before failing. Otherwise, once no
    /// earlier overlapping region is still scanning, the record is claimed: `observe`
    /// runs and its pending positions become candidate regions, all under the frontier
    /// lock.
    pub fn claim<P, F>(&self, id: usize, record: &AlignmentRecord<P>, observe: F) -> Claim
    where
        F: FnOnce() -> ObserveOutcome,
    {
        let identity = record.identity();
        let mut state = self.state.lock();
        if let Some(claim) = state.prior_claim(id, &identity) {
            return claim;
        }

        let outcome = observe();
        let regions_queued = self.offer_pending_locked(&mut state, &outcome.newly_pending);
        if let Some(admitted) = state.regions.get_mut(id) {
            admitted.delivered.insert(identity);
        }
        drop(state);

        if regions_queued > 0 {
            self.work_ready.notify_all();
        }
        Claim::Accepted(Acceptance {
            outcome,
            regions_queued,
        })
    }

    /// Accept a record that overlaps no admitted region if `observe` takes it.
    ///
    /// Runs under the frontier lock, so a region admitted for the record's position by
    /// another worker is either visible here or admitted after the record was taken.
    pub fn claim_unowned<P, F>(&self, record: &AlignmentRecord<P>, observe: F) -> Option<Acceptance>
    where
        F: FnOnce() -> Option<ObserveOutcome>,
    {
        let mut state = self.state.lock();
        if state.overlaps(&record.contig, record.start, record.end) {
            return None;
        }

        let outcome = observe()?;
        let regions_queued = self.offer_pending_locked(&mut state, &outcome.newly_pending);
        drop(state);

        if regions_queued > 0 {
            self.work_ready.notify_all();
        }
        Some(Acceptance {
            outcome,
            regions_queued,
        })
    }

    /// Wait until some region finishes scanning or a poll interval passes.
    ///
    /// Returns false once the run has been abandoned, after which an undecided record
    /// will never be settled.
    pub fn await_region_done(&self) -> bool {
        let mut state = self.state.lock();
        if !state.abandoned {
            self.region_done.wait_for(&mut state, IDLE_POLL);
        }
        !state.abandoned
    }

    /// True if any admitted region contains the position
    pub fn covers(&self, signature: &PositionSignature) -> bool {
        self.state.lock().covers(signature)
    }

    /// Take the next region to scan, blocking while other workers may still add work.
    ///
    /// Returns `None` once the queue is empty with nothing in flight, or once
    /// `should_stop` returns true (after which the frontier hands out nothing more).
    pub fn next<F>(&self, should_stop: F) -> Option<RegionTicket>
    where
        F: Fn() -> bool,
    {
        let mut state = self.state.lock();
        loop {
            if !state.stopped && should_stop() {
                state.stopped = true;
                self.work_ready.notify_all();
            }
            if state.stopped {
                return None;
            }

            if let Some(id) = state.queue.pop_front() {
                state.regions[id].state = RegionState::Scanning;
                state.in_flight += 1;

                let region = state.regions[id].region.clone();
                return Some(RegionTicket { id, region });
            }

            if !state.has_work() {
                self.work_ready.notify_all();
                return None;
            }

            self.work_ready.wait_for(&mut state, IDLE_POLL);
        }
    }

    /// Mark a region handed out by [`Frontier::next`] as finished
    pub fn complete(&self, id: usize, succeeded: bool) {
        let mut state = self.state.lock();
        if let Some(admitted) = state.regions.get_mut(id) {
            if admitted.state == RegionState::Scanning {
                if succeeded {
                    admitted.state = RegionState::Scanned;
                    admitted.delivered = HashSet::new();
                } else {
                    admitted.state = RegionState::Failed;
                }
                state.in_flight -= 1;
            }
        }
        let drained = !state.has_work();
        drop(state);

        self.region_done.notify_all();
        if drained {
            self.work_ready.notify_all();
        }
    }

    /// Stop handing out regions; in-flight scans still complete
    pub fn stop(&self) {
        self.state.lock().stopped = true;
        self.work_ready.notify_all();
    }

    /// Stop, and release scans waiting on a region that will never finish
    pub fn abandon(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.abandoned = true;
        drop(state);

        self.work_ready.notify_all();
        self.region_done.notify_all();
    }

    /// True if [`Frontier::next`] stopped early rather than draining
    pub fn was_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn state_of(&self, id: usize) -> Option<RegionState> {
        self.state.lock().regions.get(id).map(|admitted| admitted.state)
    }

    pub fn stats(&self) -> FrontierStats {
        let state = self.state.lock();
        let count = |wanted: RegionState| {
            state
                .regions
                .iter()
                .filter(|admitted| admitted.state == wanted)
                .count()
        };
        FrontierStats {
            admitted: state.regions.len(),
            scanned: count(RegionState::Scanned),
            failed: count(RegionState::Failed),
            unscanned: count(RegionState::Queued),
            rejected_by_cap: state.rejected_by_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(contig: &str, start: u64, end: u64) -> SliceRegion {
        SliceRegion::new(contig, start, end).unwrap()
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn test_seed_dedups_by_containment() {
        let frontier = Frontier::new(100, 0);
        let queued = frontier.seed([
            region("chr1", 1000, 2000),
            region("chr1", 1200, 1300),
            region("chr1", 1900, 2100),
            region("chr2", 1200, 1300),
        ]);
        assert_eq!(queued, 3);
        assert_eq!(frontier.stats().admitted, 3);
    }

    #[test]
    fn test_lifecycle_queued_scanning_scanned() {
        let frontier = Frontier::new(10, 0);
        let Admission::Queued(id) = frontier.admit(region("chr1", 1, 100)) else {
            panic!("expected region to be queued");
        };
        assert_eq!(frontier.state_of(id), Some(RegionState::Queued));

        let ticket = frontier.next(never).unwrap();
        assert_eq!(ticket.id, id);
        assert_eq!(frontier.state_of(id), Some(RegionState::Scanning));

        frontier.complete(id, true);
        assert_eq!(frontier.state_of(id), Some(RegionState::Scanned));
        assert!(frontier.next(never).is_none());
        assert!(!frontier.was_stopped());

        // A scanned region still blocks re-admission of anything inside it
        assert_eq!(frontier.admit(region("chr1", 50, 60)), Admission::Covered);
    }

    #[test]
    fn test_failed_region_is_not_rescanned() {
        let frontier = Frontier::new(10, 0);
        frontier.admit(region("chr3", 500, 600));
        let ticket = frontier.next(never).unwrap();
        frontier.complete(ticket.id, false);

        let stats = frontier.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.scanned, 0);
        assert_eq!(frontier.offer_pending(&[PositionSignature::new("chr3", 550)]), 0);
    }

    #[test]
    fn test_offer_pending_skips_covered_positions() {
        let frontier = Frontier::new(10, 25);
        frontier.admit(region("chr1", 1000, 2000));

        let queued = frontier.offer_pending(&[
            PositionSignature::new("chr1", 1300),
            PositionSignature::new("chr2", 5000),
            PositionSignature::new("chr2", 5010),
        ]);
        // chr1:1300 is inside the seed, chr2:5010 falls inside the new chr2:4975-5025
        assert_eq!(queued, 1);
        assert!(frontier.covers(&PositionSignature::new("chr2", 4975)));
        assert!(!frontier.covers(&PositionSignature::new("chr2", 5026)));
    }

    #[test]
    fn test_capacity_rejects_and_counts() {
        let frontier = Frontier::new(2, 0);
        frontier.seed([region("chr1", 1, 10), region("chr2", 1, 10)]);
        assert_eq!(frontier.admit(region("chr3", 1, 10)), Admission::OverCapacity);
        assert_eq!(frontier.offer_pending(&[PositionSignature::new("chr4", 7)]), 0);

        let stats = frontier.stats();
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.rejected_by_cap, 2);
    }

    fn claim_plain(frontier: &Frontier, id: usize, record: &AlignmentRecord) -> Claim {
        frontier.claim(id, record, ObserveOutcome::default)
    }

    #[test]
    fn test_claim_follows_record_footprint() {
        let frontier = Frontier::new(10, 0);
        frontier.seed([region("chr1", 1000, 2000), region("chr1", 950, 950)]);
        let seed = frontier.next(never).unwrap();
        let candidate = frontier.next(never).unwrap();

        // Overlaps the candidate at 950 and the seed from 1000
        let record = AlignmentRecord::new("sv", "chr1", 950, 100);
        assert_eq!(claim_plain(&frontier, candidate.id, &record), Claim::Undecided);
        assert!(matches!(
            claim_plain(&frontier, seed.id, &record),
            Claim::Accepted(_)
        ));

        frontier.complete(seed.id, true);
        assert_eq!(claim_plain(&frontier, candidate.id, &record), Claim::Delivered);

        // Only the candidate region covers this one
        let left = AlignmentRecord::new("left", "chr1", 900, 60);
        assert!(matches!(
            claim_plain(&frontier, candidate.id, &left),
            Claim::Accepted(_)
        ));
    }

    #[test]
    fn test_failed_region_keeps_only_what_it_delivered() {
        let frontier = Frontier::new(10, 0);
        frontier.seed([region("chr1", 1000, 2000), region("chr1", 1500, 3000)]);
        let failing = frontier.next(never).unwrap();
        let surviving = frontier.next(never).unwrap();

        let delivered = AlignmentRecord::new("first", "chr1", 1600, 100);
        let missed = AlignmentRecord::new("second", "chr1", 1800, 100);
        assert!(matches!(
            claim_plain(&frontier, failing.id, &delivered),
            Claim::Accepted(_)
        ));
        frontier.complete(failing.id, false);

        assert_eq!(claim_plain(&frontier, surviving.id, &delivered), Claim::Delivered);
        assert!(matches!(
            claim_plain(&frontier, surviving.id, &missed),
            Claim::Accepted(_)
        ));
    }

    #[test]
    fn test_claim_queues_pending_positions() {
        let frontier = Frontier::new(10, 5);
        frontier.admit(region("chr1", 1000, 2000));
        let ticket = frontier.next(never).unwrap();

        let record = AlignmentRecord::new("sv", "chr1", 1500, 100);
        let claim = frontier.claim(ticket.id, &record, || ObserveOutcome {
            newly_pending: vec![PositionSignature::new("chr5", 300)],
            ..ObserveOutcome::default()
        });
        let Claim::Accepted(acceptance) = claim else {
            panic!("expected the record to be accepted");
        };
        assert_eq!(acceptance.regions_queued, 1);
        assert!(frontier.covers(&PositionSignature::new("chr5", 295)));
    }

    #[test]
    fn test_claim_unowned_skips_admitted_footprints() {
        let frontier = Frontier::new(10, 0);
        frontier.admit(region("chr1", 1000, 2000));

        let inside = AlignmentRecord::new("a", "chr1", 1990, 50);
        let outside = AlignmentRecord::new("b", "chr1", 3000, 50);
        assert!(frontier
            .claim_unowned(&inside, || Some(ObserveOutcome::default()))
            .is_none());
        assert!(frontier
            .claim_unowned(&outside, || Some(ObserveOutcome::default()))
            .is_some());
        assert!(frontier.claim_unowned(&outside, || None).is_none());
    }

    #[test]
    fn test_abandon_releases_waiters() {
        let frontier = Frontier::new(10, 0);
        frontier.abandon();
        assert!(!frontier.await_region_done());
        assert!(frontier.was_stopped());
    }

    #[test]
    fn test_stop_prevents_further_pops() {
        let frontier = Frontier::new(10, 0);
        frontier.seed([region("chr1", 1, 10), region("chr2", 1, 10)]);

        assert!(frontier.next(|| true).is_none());
        assert!(frontier.was_stopped());
        assert!(frontier.next(never).is_none());
        assert_eq!(frontier.stats().unscanned, 2);
    }

    #[test]
    fn test_idle_worker_waits_for_in_flight_discovery() {
        let frontier = Frontier::new(10, 0);
        frontier.admit(region("chr1", 1, 100));
        let ticket = frontier.next(never).unwrap();

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| frontier.next(never).map(|t| t.region));

            // The in-flight scan discovers a new region, then finishes
            std::thread::sleep(Duration::from_millis(50));
            frontier.offer_pending(&[PositionSignature::new("chr9", 42)]);
            frontier.complete(ticket.id, true);

            let popped = waiter.join().unwrap();
            assert_eq!(popped, Some(region("chr9", 42, 42)));
        });
    }
}
