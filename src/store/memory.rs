// src/store/memory.rs
use std::collections::{BTreeMap, HashSet};

use tokio::sync::Mutex;

use crate::{
    errors::VoyageWorkerError,
    models::{Datapoint, FixStatus, Trip, TripStats, TripSummary, User, UserTotals, UserTrip},
    store::TrackStore,
};

#[derive(Debug, Default)]
struct State {
    trips: BTreeMap<String, Trip>,
    users: BTreeMap<String, User>,
    /// Fixes in arrival order
    fixes: Vec<Datapoint>,
}

impl State {
    fn trip_mut(&mut self, trip_id: &str) -> Result<&mut Trip, VoyageWorkerError> {
        self.trips
            .get_mut(trip_id)
            .ok_or_else(|| VoyageWorkerError::TripNotFound(trip_id.to_string()))
    }
}

/// In-process store, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.lock().await;
        state.users.insert(user.username.clone(), user);
    }

    pub async fn insert_trip(&self, trip: Trip) {
        let mut state = self.state.lock().await;
        state.trips.insert(trip.id.clone(), trip);
    }

    /// Append fixes; their order of insertion is their arrival order
    pub async fn insert_fixes(
        &self,
        fixes: impl IntoIterator<Item = Datapoint>,
    ) -> Result<(), VoyageWorkerError> {
        let mut state = self.state.lock().await;
        for fix in fixes {
            if !state.trips.contains_key(&fix.trip_id) {
                return Err(VoyageWorkerError::TripNotFound(fix.trip_id));
            }
            state.fixes.push(fix);
        }
        Ok(())
    }

    /// Remove a trip together with its fixes
    pub async fn delete_trip(&self, trip_id: &str) -> Option<Trip> {
        let mut state = self.state.lock().await;
        state.fixes.retain(|fix| fix.trip_id != trip_id);
        state.trips.remove(trip_id)
    }

    pub async fn trip(&self, trip_id: &str) -> Option<Trip> {
        self.state.lock().await.trips.get(trip_id).cloned()
    }

    pub async fn user(&self, username: &str) -> Option<User> {
        self.state.lock().await.users.get(username).cloned()
    }

    /// All fixes of a trip in arrival order, whatever their status
    pub async fn fixes(&self, trip_id: &str) -> Vec<Datapoint> {
        self.state
            .lock()
            .await
            .fixes
            .iter()
            .filter(|fix| fix.trip_id == trip_id)
            .cloned()
            .collect()
    }
}

impl TrackStore for MemoryStore {
    async fn list_trips(&self) -> Result<Vec<TripSummary>, VoyageWorkerError> {
        let state = self.state.lock().await;
        Ok(state
            .trips
            .values()
            .map(|trip| TripSummary {
                id: trip.id.clone(),
                dirty: trip.dirty,
            })
            .collect())
    }

    async fn fetch_pending_fixes(
        &self,
        trip_id: &str,
        limit: usize,
    ) -> Result<Vec<Datapoint>, VoyageWorkerError> {
        let state = self.state.lock().await;
        Ok(state
            .fixes
            .iter()
            .filter(|fix| fix.trip_id == trip_id && fix.status == FixStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_pending_fixes(&self, trip_id: &str) -> Result<u64, VoyageWorkerError> {
        let state = self.state.lock().await;
        Ok(state
            .fixes
            .iter()
            .filter(|fix| fix.trip_id == trip_id && fix.status == FixStatus::Pending)
            .count() as u64)
    }

    async fn mark_fixes(&self, ids: &[String], status: FixStatus) -> Result<u64, VoyageWorkerError> {
        if ids.is_empty() || status == FixStatus::Pending {
            return Ok(0);
        }
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut state = self.state.lock().await;
        let mut changed = 0;
        for fix in state.fixes.iter_mut() {
            if fix.status == FixStatus::Pending && ids.contains(fix.id.as_str()) {
                fix.status = status;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn attach_region(&self, trip_id: &str, region: &str) -> Result<(), VoyageWorkerError> {
        let mut state = self.state.lock().await;
        state.trip_mut(trip_id)?.regions.insert(region.to_string());
        Ok(())
    }

    async fn set_trip_dirty(&self, trip_id: &str, dirty: bool) -> Result<(), VoyageWorkerError> {
        let mut state = self.state.lock().await;
        state.trip_mut(trip_id)?.dirty = dirty;
        Ok(())
    }

    async fn fetch_fixes_for_aggregation(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Datapoint>, VoyageWorkerError> {
        let state = self.state.lock().await;
        let mut fixes: Vec<Datapoint> = state
            .fixes
            .iter()
            .filter(|fix| fix.trip_id == trip_id && fix.status != FixStatus::Removed)
            .cloned()
            .collect();
        fixes.sort_by_key(|fix| fix.time);
        Ok(fixes)
    }

    async fn update_trip_stats(
        &self,
        trip_id: &str,
        stats: &TripStats,
    ) -> Result<(), VoyageWorkerError> {
        let mut state = self.state.lock().await;
        let trip = state.trip_mut(trip_id)?;
        trip.length_sail = Some(stats.length_sail);
        trip.length_motor = Some(stats.length_motor);
        trip.start_point_id = stats.start_point_id.clone();
        trip.end_point_id = stats.end_point_id.clone();
        Ok(())
    }

    async fn flag_users_for_recalculation(&self, trip_id: &str) -> Result<u64, VoyageWorkerError> {
        let mut state = self.state.lock().await;
        let participants: Vec<String> = state
            .trips
            .get(trip_id)
            .ok_or_else(|| VoyageWorkerError::TripNotFound(trip_id.to_string()))?
            .participants()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut flagged = 0;
        for username in participants {
            if let Some(user) = state.users.get_mut(&username) {
                user.recalculate = true;
                flagged += 1;
            }
        }
        Ok(flagged)
    }

    async fn list_users_to_recalculate(&self) -> Result<Vec<String>, VoyageWorkerError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .filter(|user| user.recalculate)
            .map(|user| user.username.clone())
            .collect())
    }

    async fn fetch_user_trips(&self, username: &str) -> Result<Vec<UserTrip>, VoyageWorkerError> {
        let state = self.state.lock().await;
        Ok(state
            .trips
            .values()
            .filter(|trip| trip.participants().contains(username))
            .map(|trip| UserTrip {
                trip_id: trip.id.clone(),
                skipper: trip.skipper.clone(),
                length_sail: trip.length_sail.unwrap_or(0.0),
                length_motor: trip.length_motor.unwrap_or(0.0),
            })
            .collect())
    }

    async fn update_user_totals(
        &self,
        username: &str,
        totals: &UserTotals,
    ) -> Result<(), VoyageWorkerError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| VoyageWorkerError::UserNotFound(username.to_string()))?;
        user.totals = totals.clone();
        user.recalculate = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    async fn store_with_fixes(n: usize) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_trip(Trip::new("t1", "Test")).await;
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let fixes = (0..n).map(|i| {
            Datapoint::new(
                format!("f{i}"),
                "t1",
                start + Duration::seconds(i as i64),
                60.0,
                24.0 + i as f64 * 0.0001,
            )
        });
        store.insert_fixes(fixes).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_mark_fixes_is_monotonic() {
        let store = store_with_fixes(3).await;
        let ids = vec!["f1".to_string()];

        assert_eq!(store.mark_fixes(&ids, FixStatus::Removed).await.unwrap(), 1);
        // Second mark is a no-op, and a retained mark cannot override it
        assert_eq!(store.mark_fixes(&ids, FixStatus::Removed).await.unwrap(), 0);
        assert_eq!(store.mark_fixes(&ids, FixStatus::Retained).await.unwrap(), 0);

        let fixes = store.fixes("t1").await;
        assert_eq!(fixes[1].status, FixStatus::Removed);
        assert_eq!(store.count_pending_fixes("t1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_fixes_large_batch() {
        let store = store_with_fixes(5000).await;
        let mut ids: Vec<String> = (0..5000).step_by(2).map(|i| format!("f{i}")).collect();
        ids.push("unknown".to_string());

        assert_eq!(store.mark_fixes(&ids, FixStatus::Removed).await.unwrap(), 2500);

        let fixes = store.fixes("t1").await;
        assert_eq!(fixes[0].status, FixStatus::Removed);
        assert_eq!(fixes[1].status, FixStatus::Pending);
        assert_eq!(fixes[4998].status, FixStatus::Removed);
        assert_eq!(store.count_pending_fixes("t1").await.unwrap(), 2500);
    }

    #[tokio::test]
    async fn test_fetch_pending_in_arrival_order() {
        let store = store_with_fixes(5).await;
        store
            .mark_fixes(&["f0".to_string()], FixStatus::Retained)
            .await
            .unwrap();

        let pending = store.fetch_pending_fixes("t1", 3).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
    }

    #[tokio::test]
    async fn test_aggregation_fixes_sorted_by_time() {
        let store = MemoryStore::new();
        store.insert_trip(Trip::new("t1", "Test")).await;
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        store
            .insert_fixes([
                Datapoint::new("late", "t1", t + Duration::seconds(10), 60.0, 24.0),
                Datapoint::new("early", "t1", t, 60.0, 24.0),
                Datapoint::new("gone", "t1", t + Duration::seconds(5), 60.0, 24.0),
            ])
            .await
            .unwrap();
        store
            .mark_fixes(&["gone".to_string()], FixStatus::Removed)
            .await
            .unwrap();

        let fixes = store.fetch_fixes_for_aggregation("t1").await.unwrap();
        let ids: Vec<&str> = fixes.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_attach_region_is_idempotent() {
        let store = store_with_fixes(0).await;
        store.attach_region("t1", "Baltic Sea").await.unwrap();
        store.attach_region("t1", "Baltic Sea").await.unwrap();

        let trip = store.trip("t1").await.unwrap();
        assert_eq!(trip.regions.len(), 1);
        assert!(matches!(
            store.attach_region("missing", "Baltic Sea").await,
            Err(VoyageWorkerError::TripNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_trip_cascades() {
        let store = store_with_fixes(4).await;
        assert!(store.delete_trip("t1").await.is_some());
        assert!(store.fixes("t1").await.is_empty());
        assert!(store.list_trips().await.unwrap().is_empty());
    }
}
