//! Trip statistics
//!
//! Recomputes the distance sailed and motored for a trip from its
//! non-removed fixes, refreshes the start/end references, and flags the
//! trip's skipper and crew for recalculation. The dirty flag is cleared only
//! after all of that has been written, so a failed pass is retried.

use tracing::info;

use crate::{
    errors::VoyageWorkerError,
    geometry::distance,
    models::{Datapoint, Propulsion, TripStats},
    store::TrackStore,
};

/// Compute trip statistics from fixes ordered by time.
///
/// Each segment counts toward the propulsion mode of its ending fix. Segments
/// ending at anchor or without a mode count toward neither total.
pub fn compute_stats(fixes: &[Datapoint]) -> TripStats {
    let mut stats = TripStats {
        start_point_id: fixes.first().map(|fix| fix.id.clone()),
        end_point_id: fixes.last().map(|fix| fix.id.clone()),
        ..TripStats::default()
    };

    for pair in fixes.windows(2) {
        let segment = distance(pair[0].point(), pair[1].point());
        match pair[1].propulsion {
            Some(Propulsion::Motor) => stats.length_motor += segment,
            Some(Propulsion::Sailing) => stats.length_sail += segment,
            Some(Propulsion::Anchor) | None => {}
        }
    }

    stats
}

/// Recompute and store the statistics of a dirty trip
pub async fn aggregate_trip<S: TrackStore>(
    store: &S,
    trip_id: &str,
) -> Result<TripStats, VoyageWorkerError> {
    let fixes = store.fetch_fixes_for_aggregation(trip_id).await?;
    let stats = compute_stats(&fixes);

    store.update_trip_stats(trip_id, &stats).await?;
    let flagged = store.flag_users_for_recalculation(trip_id).await?;
    store.set_trip_dirty(trip_id, false).await?;

    info!(
        "Trip {} aggregated: {:.0} m sailed, {:.0} m motored over {} fixes, {} users flagged",
        trip_id,
        stats.length_sail,
        stats.length_motor,
        fixes.len(),
        flagged
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Trip, User};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn fix(id: &str, secs: i64, lat: f64, lon: f64, propulsion: Option<Propulsion>) -> Datapoint {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::seconds(secs);
        let mut dp = Datapoint::new(id, "t1", t, lat, lon);
        dp.propulsion = propulsion;
        dp
    }

    fn pt(lat: f64, lon: f64) -> geo::Point<f64> {
        geo::Point::new(lon, lat)
    }

    #[test]
    fn test_distance_split_by_propulsion() {
        let fixes = vec![
            fix("a", 0, 0.0, 0.0, Some(Propulsion::Motor)),
            fix("b", 1, 0.0, 0.001, Some(Propulsion::Motor)),
            fix("c", 2, 0.0, 0.002, Some(Propulsion::Sailing)),
        ];
        let stats = compute_stats(&fixes);

        let first = distance(pt(0.0, 0.0), pt(0.0, 0.001));
        let second = distance(pt(0.0, 0.001), pt(0.0, 0.002));
        assert!((stats.length_motor - first).abs() < 1e-9);
        assert!((stats.length_sail - second).abs() < 1e-9);
        assert!((stats.length_motor + stats.length_sail - (first + second)).abs() < 1e-9);
        assert_eq!(stats.start_point_id.as_deref(), Some("a"));
        assert_eq!(stats.end_point_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_anchor_and_unknown_not_counted() {
        let fixes = vec![
            fix("a", 0, 0.0, 0.0, None),
            fix("b", 1, 0.0, 0.001, Some(Propulsion::Anchor)),
            fix("c", 2, 0.0, 0.002, None),
            fix("d", 3, 0.0, 0.003, Some(Propulsion::Sailing)),
        ];
        let stats = compute_stats(&fixes);

        assert_eq!(stats.length_motor, 0.0);
        assert!((stats.length_sail - distance(pt(0.0, 0.002), pt(0.0, 0.003))).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(compute_stats(&[]), TripStats::default());

        let stats = compute_stats(&[fix("a", 0, 0.0, 0.0, Some(Propulsion::Motor))]);
        assert_eq!(stats.length_motor, 0.0);
        assert_eq!(stats.start_point_id.as_deref(), Some("a"));
        assert_eq!(stats.end_point_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_aggregate_clears_dirty_and_flags_users() {
        let store = MemoryStore::new();
        store.insert_user(User::new("skipper")).await;
        store.insert_user(User::new("deckhand")).await;
        store.insert_user(User::new("bystander")).await;
        let mut trip = Trip::new("t1", "Test")
            .with_skipper("skipper")
            .with_crew("deckhand");
        trip.dirty = true;
        store.insert_trip(trip).await;
        store
            .insert_fixes([
                fix("b", 10, 0.0, 0.001, Some(Propulsion::Motor)),
                fix("a", 0, 0.0, 0.0, Some(Propulsion::Motor)),
            ])
            .await
            .unwrap();

        let stats = aggregate_trip(&store, "t1").await.unwrap();

        let trip = store.trip("t1").await.unwrap();
        assert!(!trip.dirty);
        assert_eq!(trip.start_point_id.as_deref(), Some("a"));
        assert_eq!(trip.end_point_id.as_deref(), Some("b"));
        assert_eq!(trip.length_motor, Some(stats.length_motor));
        assert!(stats.length_motor > 100.0);
        assert!(store.user("skipper").await.unwrap().recalculate);
        assert!(store.user("deckhand").await.unwrap().recalculate);
        assert!(!store.user("bystander").await.unwrap().recalculate);
    }
}
