use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

use crate::core::record::AlignmentRecord;
use crate::core::types::PositionSignature;

/// Bookkeeping for one read name that has at least one observed record.
///
/// `pending` and `observed` are always disjoint. A fragment is complete when nothing is
/// pending, at which point the registry drops it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    observed: HashSet<PositionSignature>,
    pending: HashSet<PositionSignature>,
    has_primaries: bool,
}

impl Fragment {
    pub fn observed(&self) -> &HashSet<PositionSignature> {
        &self.observed
    }

    pub fn pending(&self) -> &HashSet<PositionSignature> {
        &self.pending
    }

    /// True once a non-supplementary record has been observed
    pub fn has_primaries(&self) -> bool {
        self.has_primaries
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    fn apply<P>(
        &mut self,
        record: &AlignmentRecord<P>,
        signature: PositionSignature,
    ) -> ObserveOutcome {
        let mut outcome = ObserveOutcome {
            resolved_pending: self.pending.remove(&signature),
            ..ObserveOutcome::default()
        };

        if !record.is_supplementary {
            self.has_primaries = true;
        }

        if let Some(mate) = record.mate_signature() {
            if !self.observed.contains(mate)
                && *mate != signature
                && self.pending.insert(mate.clone())
            {
                outcome.newly_pending.push(mate.clone());
            }
        }

        for alignment in &record.supplementary_alignments {
            let implied = alignment.signature();
            if implied == signature {
                debug!(
                    read = %record.name,
                    signature = %implied,
                    "Supplementary alignment points at its own record, skipping"
                );
                outcome.skipped_self_links += 1;
                continue;
            }
            if !self.observed.contains(&implied) && self.pending.insert(implied.clone()) {
                outcome.newly_pending.push(implied);
            }
        }

        self.observed.insert(signature);
        outcome.completed = self.pending.is_empty();
        outcome
    }
}

/// What a single observation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveOutcome {
    /// Signatures that became pending because of this record, in discovery order
    pub newly_pending: Vec<PositionSignature>,

    /// The record filled a slot that an earlier record had left pending
    pub resolved_pending: bool,

    /// Nothing is pending any more; the fragment has been evicted
    pub completed: bool,

    /// Supplementary entries that pointed back at the record itself
    pub skipped_self_links: usize,
}

/// Per-read-name fragment state shared by every scanning worker.
///
/// Updates for one read name are serialized by the map's entry lock; updates for other
/// names proceed on other shards. Only incomplete fragments are held.
#[derive(Debug, Default)]
pub struct FragmentRegistry {
    fragments: DashMap<String, Fragment>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `record` has been accepted.
    ///
    /// Creates the fragment on first sight of a read name, resolves the record's own
    /// slot if it was pending, adds the mate and supplementary signatures it implies, and
    /// evicts the fragment if nothing remains pending. Observing the same record twice
    /// leaves the fragment unchanged.
    pub fn observe<P>(&self, record: &AlignmentRecord<P>) -> ObserveOutcome {
        let signature = record.signature();

        match self.fragments.entry(record.name.clone()) {
            Entry::Occupied(mut occupied) => {
                let outcome = occupied.get_mut().apply(record, signature);
                if outcome.completed {
                    occupied.remove();
                }
                outcome
            }
            Entry::Vacant(vacant) => {
                let mut fragment = Fragment::default();
                let outcome = fragment.apply(record, signature);
                if !outcome.completed {
                    vacant.insert(fragment);
                }
                outcome
            }
        }
    }

    /// Observe `record` only if its read name is tracked and its signature is pending.
    ///
    /// The check and the update happen under the same lock, so two workers holding the
    /// same record can't both claim the slot.
    pub fn observe_if_pending<P>(&self, record: &AlignmentRecord<P>) -> Option<ObserveOutcome> {
        let signature = record.signature();

        match self.fragments.entry(record.name.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().pending.contains(&signature) {
                    return None;
                }
                let outcome = occupied.get_mut().apply(record, signature);
                if outcome.completed {
                    occupied.remove();
                }
                Some(outcome)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// True if a tracked fragment for `read_name` is waiting on `signature`
    pub fn is_pending(&self, read_name: &str, signature: &PositionSignature) -> bool {
        self.fragments
            .get(read_name)
            .is_some_and(|fragment| fragment.pending.contains(signature))
    }

    pub fn is_tracked(&self, read_name: &str) -> bool {
        self.fragments.contains_key(read_name)
    }

    /// A snapshot of the fragment for `read_name`, if it is still incomplete
    pub fn get(&self, read_name: &str) -> Option<Fragment> {
        self.fragments.get(read_name).map(|fragment| fragment.clone())
    }

    /// Number of incomplete fragments currently held
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Sorted read names of every fragment still waiting on a record
    pub fn incomplete_read_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .fragments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(contig: &str, position: u64) -> PositionSignature {
        PositionSignature::new(contig, position)
    }

    fn assert_disjoint(fragment: &Fragment) {
        assert!(
            fragment.observed().is_disjoint(fragment.pending()),
            "pending and observed overlap: {fragment:?}"
        );
    }

    #[test]
    fn test_first_mate_creates_pending_slot() {
        let registry = FragmentRegistry::new();
        let record = AlignmentRecord::new("pair", "chr1", 950, 100).with_mate("chr1", 1300);

        let outcome = registry.observe(&record);
        assert_eq!(outcome.newly_pending, vec![sig("chr1", 1300)]);
        assert!(!outcome.completed);

        let fragment = registry.get("pair").unwrap();
        assert_eq!(fragment.pending().len(), 1);
        assert!(fragment.pending().contains(&sig("chr1", 1300)));
        assert!(fragment.observed().contains(&sig("chr1", 950)));
        assert!(fragment.has_primaries());
        assert_disjoint(&fragment);
    }

    #[test]
    fn test_second_mate_completes_and_evicts() {
        let registry = FragmentRegistry::new();
        let first = AlignmentRecord::new("pair", "chr1", 950, 100).with_mate("chr1", 1300);
        let second = AlignmentRecord::new("pair", "chr1", 1300, 100).with_mate("chr1", 950);
        registry.observe(&first);

        let outcome = registry.observe(&second);
        assert!(outcome.resolved_pending);
        assert!(outcome.completed);
        assert!(outcome.newly_pending.is_empty());
        assert!(!registry.is_tracked("pair"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mate_and_supplementary_both_pending() {
        let registry = FragmentRegistry::new();
        let record = AlignmentRecord::new("split", "chr1", 950, 100)
            .with_mate("chr1", 1300)
            .with_supplementary("chr1", 1100);

        registry.observe(&record);
        let fragment = registry.get("split").unwrap();
        assert_eq!(fragment.pending().len(), 2);
        assert!(fragment.pending().contains(&sig("chr1", 1300)));
        assert!(fragment.pending().contains(&sig("chr1", 1100)));
    }

    #[test]
    fn test_unpaired_with_supplementary() {
        let registry = FragmentRegistry::new();
        let record =
            AlignmentRecord::new("single", "chr1", 1000, 100).with_supplementary("chr1", 1500);

        registry.observe(&record);
        let fragment = registry.get("single").unwrap();
        assert!(fragment.has_primaries());
        assert_eq!(fragment.pending().len(), 1);
        assert!(fragment.pending().contains(&sig("chr1", 1500)));
    }

    #[test]
    fn test_supplementary_only_fragment_has_no_primaries() {
        let registry = FragmentRegistry::new();
        let record = AlignmentRecord::new("sup", "chr2", 400, 50)
            .with_supplementary("chr1", 1000)
            .as_supplementary();

        registry.observe(&record);
        assert!(!registry.get("sup").unwrap().has_primaries());
    }

    #[test]
    fn test_fragment_without_links_is_never_held() {
        let registry = FragmentRegistry::new();
        let outcome = registry.observe(&AlignmentRecord::new("lonely", "chr1", 10, 100));
        assert!(outcome.completed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_observing_twice_is_idempotent() {
        let registry = FragmentRegistry::new();
        let record = AlignmentRecord::new("pair", "chr1", 950, 100)
            .with_mate("chr1", 1300)
            .with_supplementary("chr4", 500);

        registry.observe(&record);
        let before = registry.get("pair").unwrap();

        let outcome = registry.observe(&record);
        assert!(outcome.newly_pending.is_empty());
        assert!(!outcome.resolved_pending);
        assert_eq!(registry.get("pair").unwrap(), before);
    }

    #[test]
    fn test_observed_signature_is_never_reopened() {
        let registry = FragmentRegistry::new();
        // Supplementary at chr4 seen first, then the primary pointing back at it
        registry.observe(
            &AlignmentRecord::new("chain", "chr4", 500, 60)
                .with_supplementary("chr1", 1000)
                .as_supplementary(),
        );
        let outcome = registry.observe(
            &AlignmentRecord::new("chain", "chr1", 1000, 40)
                .with_supplementary("chr4", 500)
                .with_mate("chr2", 2000),
        );

        assert!(outcome.resolved_pending);
        assert_eq!(outcome.newly_pending, vec![sig("chr2", 2000)]);
        let fragment = registry.get("chain").unwrap();
        assert!(!fragment.pending().contains(&sig("chr4", 500)));
        assert_disjoint(&fragment);
    }

    #[test]
    fn test_self_referencing_supplementary_is_skipped() {
        let registry = FragmentRegistry::new();
        let record = AlignmentRecord::new("self", "chr1", 700, 100)
            .with_supplementary("chr1", 700)
            .with_supplementary("chr3", 50);

        let outcome = registry.observe(&record);
        assert_eq!(outcome.skipped_self_links, 1);
        assert_eq!(outcome.newly_pending, vec![sig("chr3", 50)]);
    }

    #[test]
    fn test_mate_at_same_position_adds_nothing() {
        let registry = FragmentRegistry::new();
        let record = AlignmentRecord::new("stacked", "chr1", 700, 100).with_mate("chr1", 700);
        let outcome = registry.observe(&record);
        assert!(outcome.completed);
        assert_eq!(outcome.skipped_self_links, 0);
    }

    #[test]
    fn test_observe_if_pending() {
        let registry = FragmentRegistry::new();
        let mate = AlignmentRecord::new("pair", "chr1", 1300, 100).with_mate("chr1", 950);

        // Untracked read name: not claimed
        assert!(registry.observe_if_pending(&mate).is_none());
        assert!(registry.is_empty());

        let first = AlignmentRecord::new("pair", "chr1", 950, 100).with_mate("chr1", 1300);
        registry.observe(&first);
        assert!(registry.is_pending("pair", &sig("chr1", 1300)));

        // Tracked, but this signature isn't pending
        let stranger = AlignmentRecord::new("pair", "chr1", 5000, 100);
        assert!(registry.observe_if_pending(&stranger).is_none());

        let outcome = registry.observe_if_pending(&mate).unwrap();
        assert!(outcome.completed);
        assert!(registry.observe_if_pending(&mate).is_none());
    }

    #[test]
    fn test_incomplete_read_names_sorted() {
        let registry = FragmentRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            let record = AlignmentRecord::new(name, "chr1", 100, 50).with_mate("chr9", 1);
            registry.observe(&record);
        }
        assert_eq!(registry.incomplete_read_names(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_concurrent_observations_of_one_fragment() {
        let registry = FragmentRegistry::new();
        // One primary with 16 supplementaries, each supplementary pointing back at the primary
        let positions: Vec<u64> = (1..=16).map(|i| i * 1000).collect();

        let mut primary = AlignmentRecord::new("hub", "chr1", 1, 100);
        for &pos in &positions {
            primary = primary.with_supplementary("chr2", pos);
        }

        std::thread::scope(|scope| {
            let registry = &registry;
            let primary = &primary;
            scope.spawn(move || {
                registry.observe(primary);
            });
            for &pos in &positions {
                scope.spawn(move || {
                    let supplementary = AlignmentRecord::new("hub", "chr2", pos, 100)
                        .with_supplementary("chr1", 1)
                        .as_supplementary();
                    registry.observe(&supplementary);
                });
            }
        });

        assert!(registry.is_empty(), "all slots resolved: {:?}", registry.get("hub"));
    }
}
