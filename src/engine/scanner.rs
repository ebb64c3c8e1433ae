use parking_lot::Mutex;
use std::ops::ControlFlow;
use thiserror::Error;
use tracing::{debug, trace};

use crate::core::config::SliceConfig;
use crate::core::record::AlignmentRecord;
use crate::core::types::SliceRegion;
use crate::engine::frontier::{Acceptance, Claim, Frontier, RegionTicket};
use crate::engine::registry::FragmentRegistry;

/// A failure querying one region; the rest of the run continues
#[derive(Error, Debug)]
pub enum RegionQueryError {
    #[error("Contig '{0}' is not in the alignment header")]
    UnknownContig(String),

    #[error("Region {0} cannot be expressed as a query interval")]
    InvalidInterval(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    Record(String),
}

/// A coordinate-indexed store of alignment records.
///
/// Implementations must be shareable across workers; each call to [`query`] is
/// independent.
///
/// [`query`]: AlignmentSource::query
pub trait AlignmentSource: Sync {
    /// The source's own record type, carried through to the sink
    type Payload: Send;

    /// Length of a contig, if the source knows it
    fn contig_length(&self, contig: &str) -> Option<u64>;

    /// Visit, in coordinate order, the records the index returns for `region`.
    ///
    /// Sources may return records that don't overlap the region (e.g. a whole index bin);
    /// the scanner applies the overlap test itself. Visiting stops early when `visit`
    /// returns `ControlFlow::Break`.
    ///
    /// # Errors
    ///
    /// Returns `RegionQueryError` if the region cannot be queried or a record cannot be
    /// decoded.
    fn query(
        &self,
        region: &SliceRegion,
        visit: &mut dyn FnMut(AlignmentRecord<Self::Payload>) -> ControlFlow<()>,
    ) -> Result<(), RegionQueryError>;
}

/// Destination of accepted records; called concurrently from every worker
pub trait RecordSink<P>: Sync {
    /// Deliver one accepted record
    ///
    /// # Errors
    ///
    /// Returns an IO error if the record cannot be written; the run stops.
    fn accept(&self, record: AlignmentRecord<P>) -> std::io::Result<()>;
}

/// A sink that keeps every accepted record in memory, in acceptance order
#[derive(Debug)]
pub struct VecSink<P> {
    records: Mutex<Vec<AlignmentRecord<P>>>,
}

impl<P> Default for VecSink<P> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<P> VecSink<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn into_records(self) -> Vec<AlignmentRecord<P>> {
        self.records.into_inner()
    }
}

impl<P: Send> RecordSink<P> for VecSink<P> {
    fn accept(&self, record: AlignmentRecord<P>) -> std::io::Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to query {region}: {source}")]
    Query {
        region: SliceRegion,
        #[source]
        source: RegionQueryError,
        /// What the scan did before the failure
        stats: ScanStats,
    },

    #[error("Failed to write accepted record: {0}")]
    Sink(#[source] std::io::Error),
}

/// Per-scan counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Records the source returned
    pub records_examined: u64,

    /// Records removed by mapping-quality or secondary filters
    pub records_filtered: u64,

    /// Records accepted (forwarded to the sink and the registry)
    pub reads_processed: u64,

    /// Overlapping records already delivered by an earlier region
    pub records_deferred: u64,

    /// New regions queued because of records accepted here
    pub regions_discovered: u64,

    /// Mate or supplementary links that could not be followed
    pub malformed_links: u64,
}

/// Scans one region at a time against a shared registry and frontier
pub struct RegionScanner<'a, S: AlignmentSource> {
    source: &'a S,
    registry: &'a FragmentRegistry,
    frontier: &'a Frontier,
    config: &'a SliceConfig,
}

impl<'a, S: AlignmentSource> RegionScanner<'a, S> {
    pub fn new(
        source: &'a S,
        registry: &'a FragmentRegistry,
        frontier: &'a Frontier,
        config: &'a SliceConfig,
    ) -> Self {
        Self {
            source,
            registry,
            frontier,
            config,
        }
    }

    fn passes_filters(&self, record: &AlignmentRecord<S::Payload>) -> bool {
        if record.mapping_quality < self.config.min_mapping_quality {
            return false;
        }
        if record.is_secondary && !self.config.include_secondary {
            return false;
        }
        true
    }

    /// Scan the ticket's region, forwarding every accepted record to `sink` and the
    /// registry and feeding newly pending positions back into the frontier.
    ///
    /// A record is accepted when its footprint overlaps the region and no earlier region
    /// has delivered it, or when it lies outside every admitted region but fills a slot
    /// its fragment has pending. Anything else is dropped without being counted. A
    /// record an earlier, still-scanning region may deliver is held until that region
    /// finishes, after the query itself is done.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Query` if the source fails for this region, or
    /// `ScanError::Sink` if an accepted record cannot be delivered. Records accepted
    /// before a query failure have already been forwarded.
    pub fn scan<K>(&self, ticket: &RegionTicket, sink: &K) -> Result<ScanStats, ScanError>
    where
        K: RecordSink<S::Payload> + ?Sized,
    {
        let region = &ticket.region;
        let mut stats = ScanStats::default();
        let mut held = Vec::new();
        let mut sink_error = None;

        let result = self.source.query(region, &mut |record| {
            stats.records_examined += 1;

            if !self.passes_filters(&record) {
                stats.records_filtered += 1;
                return ControlFlow::Continue(());
            }

            let acceptance = if record.overlaps(region) {
                match self.claim(ticket, &record) {
                    Claim::Accepted(acceptance) => acceptance,
                    Claim::Delivered => {
                        stats.records_deferred += 1;
                        return ControlFlow::Continue(());
                    }
                    Claim::Undecided => {
                        held.push(record);
                        return ControlFlow::Continue(());
                    }
                }
            } else {
                let claimed = self
                    .frontier
                    .claim_unowned(&record, || self.registry.observe_if_pending(&record));
                let Some(acceptance) = claimed else {
                    trace!(read = %record.name, signature = %record.signature(), "Dropping record");
                    return ControlFlow::Continue(());
                };
                acceptance
            };

            match Self::deliver(record, &acceptance, &mut stats, sink) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    sink_error = Some(e);
                    ControlFlow::Break(())
                }
            }
        });

        if let Some(e) = sink_error {
            return Err(ScanError::Sink(e));
        }

        if !held.is_empty() {
            debug!(region = %region, held = held.len(), "Waiting on earlier overlapping regions");
        }
        for record in held {
            let claim = loop {
                match self.claim(ticket, &record) {
                    Claim::Undecided if self.frontier.await_region_done() => continue,
                    claim => break claim,
                }
            };
            match claim {
                Claim::Accepted(acceptance) => {
                    Self::deliver(record, &acceptance, &mut stats, sink).map_err(ScanError::Sink)?;
                }
                Claim::Delivered => stats.records_deferred += 1,
                // The run was abandoned; nothing more will be written
                Claim::Undecided => break,
            }
        }

        result.map_err(|source| ScanError::Query {
            region: region.clone(),
            source,
            stats,
        })?;

        debug!(
            region = %region,
            examined = stats.records_examined,
            accepted = stats.reads_processed,
            discovered = stats.regions_discovered,
            "Scanned region"
        );

        Ok(stats)
    }

    fn claim(&self, ticket: &RegionTicket, record: &AlignmentRecord<S::Payload>) -> Claim {
        self.frontier
            .claim(ticket.id, record, || self.registry.observe(record))
    }

    fn deliver<K>(
        record: AlignmentRecord<S::Payload>,
        acceptance: &Acceptance,
        stats: &mut ScanStats,
        sink: &K,
    ) -> std::io::Result<()>
    where
        K: RecordSink<S::Payload> + ?Sized,
    {
        stats.reads_processed += 1;
        stats.malformed_links +=
            (record.malformed_links + acceptance.outcome.skipped_self_links) as u64;
        stats.regions_discovered += acceptance.regions_queued as u64;
        sink.accept(record)
    }
}
