//! Data store interface used by the track processing pipeline
//!
//! The simplifier, aggregator and user recalculation only talk to storage
//! through [`TrackStore`]. [`crate::database::Database`] implements it on
//! PostgreSQL and [`MemoryStore`] keeps everything in process.
//!
//! Every write is safe to repeat: status updates only touch fixes that are
//! still pending, region links are upserts, and flags are plain sets.

mod memory;

pub use memory::MemoryStore;

use crate::errors::VoyageWorkerError;
use crate::models::{Datapoint, FixStatus, TripStats, TripSummary, UserTotals, UserTrip};

#[allow(async_fn_in_trait)]
pub trait TrackStore {
    /// All trips with their dirty flag, ordered by id
    async fn list_trips(&self) -> Result<Vec<TripSummary>, VoyageWorkerError>;

    /// Up to `limit` pending fixes of a trip, in arrival order
    async fn fetch_pending_fixes(
        &self,
        trip_id: &str,
        limit: usize,
    ) -> Result<Vec<Datapoint>, VoyageWorkerError>;

    async fn count_pending_fixes(&self, trip_id: &str) -> Result<u64, VoyageWorkerError>;

    /// Set `status` on the given fixes that are still pending.
    ///
    /// Returns the number of fixes changed.
    async fn mark_fixes(&self, ids: &[String], status: FixStatus) -> Result<u64, VoyageWorkerError>;

    /// Link a region to a trip, creating the region if needed
    async fn attach_region(&self, trip_id: &str, region: &str) -> Result<(), VoyageWorkerError>;

    async fn set_trip_dirty(&self, trip_id: &str, dirty: bool) -> Result<(), VoyageWorkerError>;

    /// All fixes of a trip that were not removed, ordered by time
    async fn fetch_fixes_for_aggregation(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Datapoint>, VoyageWorkerError>;

    async fn update_trip_stats(
        &self,
        trip_id: &str,
        stats: &TripStats,
    ) -> Result<(), VoyageWorkerError>;

    /// Set `recalculate` on the skipper and crew of a trip.
    ///
    /// Returns the number of users flagged.
    async fn flag_users_for_recalculation(&self, trip_id: &str) -> Result<u64, VoyageWorkerError>;

    async fn list_users_to_recalculate(&self) -> Result<Vec<String>, VoyageWorkerError>;

    /// Every trip the user skippered or crewed
    async fn fetch_user_trips(&self, username: &str) -> Result<Vec<UserTrip>, VoyageWorkerError>;

    /// Store the user's totals and clear their `recalculate` flag
    async fn update_user_totals(
        &self,
        username: &str,
        totals: &UserTotals,
    ) -> Result<(), VoyageWorkerError>;
}
