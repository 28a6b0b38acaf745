//! Track simplification
//!
//! Pending fixes of a trip are consumed in bounded batches. Each batch gets a
//! single forward pass: a fix is removed when it lies close to the line from
//! the current anchor to its successor, the heading barely changed, and it
//! is still near the anchor. Any other fix is retained and becomes the new
//! anchor. The last fix of a batch has no successor, so it stays pending and
//! leads the next batch.
//!
//! When the backlog drops below three fixes the trip is drained: the
//! leftovers are retained and, if there were any, the trip is marked dirty
//! for the aggregator.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config::{SimplifierConfig, Thresholds},
    errors::VoyageWorkerError,
    geometry::{bearing_delta, cross_track_distance, distance},
    models::{Datapoint, FixStatus},
    regions::RegionIndex,
    store::TrackStore,
};

/// Fewer pending fixes than this cannot be judged and drain the trip
const MIN_BATCH: usize = 3;

/// State handed from one batch to the next when the anchor is carried over
#[derive(Debug, Clone, PartialEq)]
pub struct Carry {
    /// Last retained fix
    pub anchor: Datapoint,
    /// Last evaluated fix, source of the previous heading
    pub previous: Datapoint,
}

/// Decisions for one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    pub removed: Vec<String>,
    pub retained: Vec<String>,
    /// Context for the following batch; `None` when no fix was evaluated
    pub carry: Option<Carry>,
}

impl BatchPlan {
    /// Retain every fix, for backlogs too short to simplify
    pub fn retain_all(fixes: &[Datapoint]) -> Self {
        Self {
            retained: fixes.iter().map(|fix| fix.id.clone()).collect(),
            ..Self::default()
        }
    }
}

/// Decide removal or retention for a batch of pending fixes.
///
/// Without `carry` the first fix is retained and anchors the pass. With
/// `carry` the pass continues from the previous batch and the first fix is
/// evaluated like any other. The last fix is never decided.
pub fn plan_batch(fixes: &[Datapoint], carry: Option<&Carry>, thresholds: &Thresholds) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let Some((first, _)) = fixes.split_first() else {
        return plan;
    };

    let (mut anchor, mut previous, start) = match carry {
        Some(carry) => (&carry.anchor, &carry.previous, 0),
        None => {
            plan.retained.push(first.id.clone());
            (first, first, 1)
        }
    };

    for i in start..fixes.len().saturating_sub(1) {
        let fix = &fixes[i];
        let next = &fixes[i + 1];

        let cross_track = cross_track_distance(fix.point(), anchor.point(), next.point());
        let turn = bearing_delta(previous.heading, fix.heading).abs();
        let from_anchor = distance(fix.point(), anchor.point());

        if cross_track < thresholds.cross_track_m
            && turn < thresholds.turn_deg
            && from_anchor < thresholds.proximity_m
        {
            plan.removed.push(fix.id.clone());
        } else {
            plan.retained.push(fix.id.clone());
            anchor = fix;
        }
        previous = fix;
    }

    if plan.removed.len() + plan.retained.len() > 0 {
        plan.carry = Some(Carry {
            anchor: anchor.clone(),
            previous: previous.clone(),
        });
    }
    plan
}

/// Result of simplifying one trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplifyOutcome {
    /// Pending fixes fetched
    pub processed: usize,
    /// Fixes newly marked removed
    pub removed: u64,
    /// Fixes newly marked retained
    pub retained: u64,
    /// Regions seen along the processed fixes
    pub regions: BTreeSet<String>,
    /// No more than two pending fixes were left, and those were retained
    pub drained: bool,
    /// The trip was flagged for aggregation
    pub dirtied: bool,
}

impl SimplifyOutcome {
    /// Whether any fix changed state
    pub fn changed(&self) -> bool {
        self.removed + self.retained > 0
    }
}

pub struct Simplifier {
    regions: Arc<RegionIndex>,
    config: SimplifierConfig,
}

impl Simplifier {
    pub fn new(regions: Arc<RegionIndex>, config: SimplifierConfig) -> Self {
        Self { regions, config }
    }

    pub fn config(&self) -> &SimplifierConfig {
        &self.config
    }

    /// Simplify up to `amount` pending fixes of a trip.
    ///
    /// Marks the trip dirty when its backlog drained during this call.
    ///
    /// The dirty flag is written before the last fixes leave pending and
    /// regions are attached before their fixes are marked. A call that fails
    /// partway leaves pending fixes behind to redo the missing writes.
    pub async fn simplify_trip<S: TrackStore>(
        &self,
        store: &S,
        trip_id: &str,
        amount: usize,
    ) -> Result<SimplifyOutcome, VoyageWorkerError> {
        let mut outcome = SimplifyOutcome::default();
        let mut carry: Option<Carry> = None;

        while outcome.processed < amount {
            let limit = self
                .config
                .batch_size
                .min(amount - outcome.processed)
                .max(MIN_BATCH);
            let fixes = store.fetch_pending_fixes(trip_id, limit).await?;
            outcome.processed += fixes.len();

            let drained = fixes.len() < MIN_BATCH;
            let plan = if drained {
                BatchPlan::retain_all(&fixes)
            } else {
                plan_batch(&fixes, carry.as_ref(), &self.config.thresholds)
            };

            // Dirty and regions are written while the batch is still pending
            if drained && !fixes.is_empty() {
                store.set_trip_dirty(trip_id, true).await?;
                outcome.dirtied = true;
            }
            for region in self.sample_regions(&fixes) {
                if !outcome.regions.contains(&region) {
                    store.attach_region(trip_id, &region).await?;
                    outcome.regions.insert(region);
                }
            }
            outcome.removed += store.mark_fixes(&plan.removed, FixStatus::Removed).await?;
            outcome.retained += store.mark_fixes(&plan.retained, FixStatus::Retained).await?;

            debug!(
                "Trip {}: batch of {} fixes, {} removed, {} retained",
                trip_id,
                fixes.len(),
                plan.removed.len(),
                plan.retained.len()
            );

            if drained {
                outcome.drained = true;
                break;
            }
            if self.config.carry_anchor {
                carry = plan.carry;
            }
        }

        if outcome.dirtied {
            info!(
                "Trip {} drained: {} removed, {} retained, regions {:?}",
                trip_id, outcome.removed, outcome.retained, outcome.regions
            );
        } else if !outcome.drained {
            let pending = store.count_pending_fixes(trip_id).await?;
            info!(
                "Trip {}: simplified {} fixes, {} still pending",
                trip_id, outcome.processed, pending
            );
        }

        Ok(outcome)
    }

    /// Regions of the first fix and of every Nth fix
    fn sample_regions(&self, fixes: &[Datapoint]) -> BTreeSet<String> {
        fixes
            .iter()
            .step_by(self.config.region_sample_interval.max(1))
            .filter_map(|fix| self.regions.region_for(fix.lat, fix.lon))
            .map(str::to_string)
            .collect()
    }
}
