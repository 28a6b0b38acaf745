//! Driver loop
//!
//! Each tick drains the backlog of every trip, aggregates the trips that are
//! dirty afterwards, and recalculates flagged users. A failing trip is
//! logged and retried on the next tick; it never stops the loop.

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::{
    aggregator::aggregate_trip,
    config::SchedulerConfig,
    errors::VoyageWorkerError,
    models::TripSummary,
    simplifier::Simplifier,
    store::TrackStore,
    users::recalculate_users,
};

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub trips: usize,
    /// Fixes fetched by the simplifier across all trips
    pub fixes: usize,
    pub aggregated: usize,
    pub failed: usize,
    pub users: usize,
}

pub struct Scheduler<S> {
    store: S,
    simplifier: Simplifier,
    config: SchedulerConfig,
}

impl<S: TrackStore> Scheduler<S> {
    pub fn new(store: S, simplifier: Simplifier, config: SchedulerConfig) -> Self {
        Self {
            store,
            simplifier,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run ticks until `shutdown` turns true or its sender goes away.
    ///
    /// The signal is checked between trips, so the trip in progress is
    /// finished before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler started, tick interval {:?}",
            self.config.tick_interval
        );

        while !*shutdown.borrow() {
            match self.tick(&shutdown).await {
                Ok(report) => debug!("Tick finished: {:?}", report),
                Err(e) => error!("Tick failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Process every trip once, then recalculate flagged users
    pub async fn tick(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<TickReport, VoyageWorkerError> {
        let trips = self.store.list_trips().await?;
        let mut report = TickReport {
            trips: trips.len(),
            ..TickReport::default()
        };

        for trip in &trips {
            if *shutdown.borrow() {
                info!("Shutdown requested, ending tick early");
                return Ok(report);
            }
            match self.process_trip(trip, &mut report).await {
                Ok(()) => {}
                Err(e) => {
                    report.failed += 1;
                    error!("Processing trip {} failed: {}", trip.id, e);
                }
            }
        }

        match recalculate_users(&self.store).await {
            Ok(users) => report.users = users,
            Err(e) => error!("User recalculation failed: {}", e),
        }

        Ok(report)
    }

    async fn process_trip(
        &self,
        trip: &TripSummary,
        report: &mut TickReport,
    ) -> Result<(), VoyageWorkerError> {
        let outcome = self
            .simplifier
            .simplify_trip(&self.store, &trip.id, self.simplifier.config().tick_amount)
            .await?;
        report.fixes += outcome.processed;

        // A trip left dirty by a failed aggregation is retried here too
        if trip.dirty || outcome.dirtied {
            aggregate_trip(&self.store, &trip.id).await?;
            report.aggregated += 1;
        }
        Ok(())
    }
}
