//! User distance totals
//!
//! Users flagged by the aggregator get their crewed and skippered totals
//! recomputed from all of their trips. Crewed totals include the trips the
//! user skippered.

use tracing::{error, info};

use crate::{
    errors::VoyageWorkerError,
    models::{UserTotals, UserTrip},
    store::TrackStore,
};

/// Sum a user's trips into crewed and skippered totals
pub fn compute_totals(username: &str, trips: &[UserTrip]) -> UserTotals {
    trips.iter().fold(UserTotals::default(), |mut totals, trip| {
        totals.crewed_length_sail += trip.length_sail;
        totals.crewed_length_motor += trip.length_motor;
        if trip.skipper.as_deref() == Some(username) {
            totals.skippered_length_sail += trip.length_sail;
            totals.skippered_length_motor += trip.length_motor;
        }
        totals
    })
}

/// Recompute and store the totals of one user, clearing their flag
pub async fn recalculate_user<S: TrackStore>(
    store: &S,
    username: &str,
) -> Result<UserTotals, VoyageWorkerError> {
    let trips = store.fetch_user_trips(username).await?;
    let totals = compute_totals(username, &trips);
    store.update_user_totals(username, &totals).await?;
    info!("Recalculated totals of {} over {} trips", username, trips.len());
    Ok(totals)
}

/// Recalculate every flagged user.
///
/// A failure for one user is logged and the rest are still processed.
/// Returns the number of users recalculated.
pub async fn recalculate_users<S: TrackStore>(store: &S) -> Result<usize, VoyageWorkerError> {
    let usernames = store.list_users_to_recalculate().await?;
    let mut done = 0;
    for username in &usernames {
        match recalculate_user(store, username).await {
            Ok(_) => done += 1,
            Err(e) => error!("Failed to recalculate user {}: {}", username, e),
        }
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Trip, User};
    use crate::store::MemoryStore;

    fn user_trip(id: &str, skipper: Option<&str>, sail: f64, motor: f64) -> UserTrip {
        UserTrip {
            trip_id: id.to_string(),
            skipper: skipper.map(str::to_string),
            length_sail: sail,
            length_motor: motor,
        }
    }

    #[test]
    fn test_compute_totals() {
        let trips = vec![
            user_trip("t1", Some("anna"), 1000.0, 200.0),
            user_trip("t2", Some("ben"), 500.0, 50.0),
            user_trip("t3", None, 10.0, 1.0),
        ];
        let totals = compute_totals("anna", &trips);

        assert_eq!(totals.crewed_length_sail, 1510.0);
        assert_eq!(totals.crewed_length_motor, 251.0);
        assert_eq!(totals.skippered_length_sail, 1000.0);
        assert_eq!(totals.skippered_length_motor, 200.0);
    }

    #[tokio::test]
    async fn test_recalculate_flagged_users() {
        let store = MemoryStore::new();
        let mut anna = User::new("anna");
        anna.recalculate = true;
        store.insert_user(anna).await;
        store.insert_user(User::new("ben")).await;

        let mut t1 = Trip::new("t1", "Out").with_skipper("anna").with_crew("ben");
        t1.length_sail = Some(1000.0);
        t1.length_motor = Some(100.0);
        let mut t2 = Trip::new("t2", "Back").with_skipper("ben").with_crew("anna");
        t2.length_sail = Some(300.0);
        store.insert_trip(t1).await;
        store.insert_trip(t2).await;

        assert_eq!(recalculate_users(&store).await.unwrap(), 1);

        let anna = store.user("anna").await.unwrap();
        assert!(!anna.recalculate);
        assert_eq!(anna.totals.crewed_length_sail, 1300.0);
        assert_eq!(anna.totals.crewed_length_motor, 100.0);
        assert_eq!(anna.totals.skippered_length_sail, 1000.0);
        // ben was not flagged
        assert_eq!(store.user("ben").await.unwrap().totals, UserTotals::default());
    }
}
