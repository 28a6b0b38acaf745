// src/database.rs
mod models;

use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::{debug, error, info};

use crate::{
    config::DatabaseConfig,
    errors::VoyageWorkerError,
    models::{Datapoint, FixStatus, Trip, TripStats, TripSummary, User, UserTotals, UserTrip},
    store::TrackStore,
};
use models::{DatapointRow, TripSummaryRow, UserTripRow};

const DATAPOINT_COLUMNS: &str = "id, trip_id, time, lat, lon, speed, heading, depth, \
     h_accuracy, v_accuracy, propulsion, status";

/// PostgreSQL-backed track store
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the database configuration and run migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, VoyageWorkerError> {
        config.validate()?;
        info!(
            "Connecting to database with max_connections={}",
            config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                VoyageWorkerError::DatabaseConnectionError(e.to_string())
            })?;

        Self::new(pool).await
    }

    /// Wrap an existing pool, running migrations first
    pub async fn new(pool: PgPool) -> Result<Self, VoyageWorkerError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a user, ignoring existing usernames
    pub async fn insert_user(&self, user: &User) -> Result<(), VoyageWorkerError> {
        sqlx::query(
            "INSERT INTO users (
                username, recalculate, crewed_length_sail, crewed_length_motor,
                skippered_length_sail, skippered_length_motor
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (username) DO NOTHING",
        )
        .bind(&user.username)
        .bind(user.recalculate)
        .bind(user.totals.crewed_length_sail)
        .bind(user.totals.crewed_length_motor)
        .bind(user.totals.skippered_length_sail)
        .bind(user.totals.skippered_length_motor)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a trip with its crew and region links
    pub async fn insert_trip(&self, trip: &Trip) -> Result<(), VoyageWorkerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO trips (id, name, skipper_name, dirty, length_sail, length_motor)
            VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&trip.id)
        .bind(&trip.name)
        .bind(&trip.skipper)
        .bind(trip.dirty)
        .bind(trip.length_sail)
        .bind(trip.length_motor)
        .execute(&mut *tx)
        .await?;

        for username in &trip.crew {
            sqlx::query(
                "INSERT INTO trip_crew (trip_id, username) VALUES ($1, $2)
                ON CONFLICT DO NOTHING",
            )
            .bind(&trip.id)
            .bind(username)
            .execute(&mut *tx)
            .await?;
        }

        for region in &trip.regions {
            Self::link_region(&mut tx, &trip.id, region).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Insert fixes in arrival order
    pub async fn insert_fixes(&self, fixes: &[Datapoint]) -> Result<(), VoyageWorkerError> {
        let mut tx = self.pool.begin().await?;

        for fix in fixes {
            sqlx::query(
                "INSERT INTO datapoints (
                    id, trip_id, time, lat, lon, speed, heading, depth,
                    h_accuracy, v_accuracy, propulsion, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(&fix.id)
            .bind(&fix.trip_id)
            .bind(fix.time)
            .bind(fix.lat)
            .bind(fix.lon)
            .bind(fix.speed)
            .bind(fix.heading)
            .bind(fix.depth)
            .bind(fix.h_accuracy)
            .bind(fix.v_accuracy)
            .bind(fix.propulsion.map(i16::from))
            .bind(i16::from(fix.status))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Inserted {} datapoints", fixes.len());
        Ok(())
    }

    /// Region names linked to a trip
    pub async fn trip_regions(&self, trip_id: &str) -> Result<Vec<String>, VoyageWorkerError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT region_name FROM trip_regions WHERE trip_id = $1 ORDER BY region_name",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn link_region(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: &str,
        region: &str,
    ) -> Result<(), VoyageWorkerError> {
        sqlx::query("INSERT INTO regions (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(region)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "INSERT INTO trip_regions (trip_id, region_name) VALUES ($1, $2)
            ON CONFLICT DO NOTHING",
        )
        .bind(trip_id)
        .bind(region)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

impl TrackStore for Database {
    async fn list_trips(&self) -> Result<Vec<TripSummary>, VoyageWorkerError> {
        let rows: Vec<TripSummaryRow> = sqlx::query_as("SELECT id, dirty FROM trips ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(TripSummary::from).collect())
    }

    async fn fetch_pending_fixes(
        &self,
        trip_id: &str,
        limit: usize,
    ) -> Result<Vec<Datapoint>, VoyageWorkerError> {
        let rows: Vec<DatapointRow> = sqlx::query_as(&format!(
            "SELECT {DATAPOINT_COLUMNS} FROM datapoints
            WHERE trip_id = $1 AND status = 0
            ORDER BY seq
            LIMIT $2"
        ))
        .bind(trip_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Datapoint::try_from).collect()
    }

    async fn count_pending_fixes(&self, trip_id: &str) -> Result<u64, VoyageWorkerError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM datapoints WHERE trip_id = $1 AND status = 0")
                .bind(trip_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn mark_fixes(&self, ids: &[String], status: FixStatus) -> Result<u64, VoyageWorkerError> {
        if ids.is_empty() || status == FixStatus::Pending {
            return Ok(0);
        }
        let result =
            sqlx::query("UPDATE datapoints SET status = $1 WHERE id = ANY($2) AND status = 0")
                .bind(i16::from(status))
                .bind(ids)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn attach_region(&self, trip_id: &str, region: &str) -> Result<(), VoyageWorkerError> {
        let mut tx = self.pool.begin().await?;
        Self::link_region(&mut tx, trip_id, region).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_trip_dirty(&self, trip_id: &str, dirty: bool) -> Result<(), VoyageWorkerError> {
        let result = sqlx::query("UPDATE trips SET dirty = $2 WHERE id = $1")
            .bind(trip_id)
            .bind(dirty)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(VoyageWorkerError::TripNotFound(trip_id.to_string()));
        }
        Ok(())
    }

    async fn fetch_fixes_for_aggregation(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Datapoint>, VoyageWorkerError> {
        let rows: Vec<DatapointRow> = sqlx::query_as(&format!(
            "SELECT {DATAPOINT_COLUMNS} FROM datapoints
            WHERE trip_id = $1 AND status <> 1
            ORDER BY time, seq"
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Datapoint::try_from).collect()
    }

    async fn update_trip_stats(
        &self,
        trip_id: &str,
        stats: &TripStats,
    ) -> Result<(), VoyageWorkerError> {
        let result = sqlx::query(
            "UPDATE trips SET
                length_sail = $2,
                length_motor = $3,
                start_point_id = $4,
                end_point_id = $5,
                last_update = now()
            WHERE id = $1",
        )
        .bind(trip_id)
        .bind(stats.length_sail)
        .bind(stats.length_motor)
        .bind(&stats.start_point_id)
        .bind(&stats.end_point_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(VoyageWorkerError::TripNotFound(trip_id.to_string()));
        }
        Ok(())
    }

    async fn flag_users_for_recalculation(&self, trip_id: &str) -> Result<u64, VoyageWorkerError> {
        let result = sqlx::query(
            "UPDATE users SET recalculate = TRUE
            WHERE username IN (
                SELECT skipper_name FROM trips WHERE id = $1 AND skipper_name IS NOT NULL
                UNION
                SELECT username FROM trip_crew WHERE trip_id = $1
            )",
        )
        .bind(trip_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_users_to_recalculate(&self) -> Result<Vec<String>, VoyageWorkerError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE recalculate ORDER BY username")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn fetch_user_trips(&self, username: &str) -> Result<Vec<UserTrip>, VoyageWorkerError> {
        let rows: Vec<UserTripRow> = sqlx::query_as(
            "SELECT t.id AS trip_id,
                t.skipper_name,
                COALESCE(t.length_sail, 0) AS length_sail,
                COALESCE(t.length_motor, 0) AS length_motor
            FROM trips t
            WHERE t.skipper_name = $1
                OR EXISTS (
                    SELECT 1 FROM trip_crew c WHERE c.trip_id = t.id AND c.username = $1
                )
            ORDER BY t.id",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserTrip::from).collect())
    }

    async fn update_user_totals(
        &self,
        username: &str,
        totals: &UserTotals,
    ) -> Result<(), VoyageWorkerError> {
        let result = sqlx::query(
            "UPDATE users SET
                crewed_length_sail = $2,
                crewed_length_motor = $3,
                skippered_length_sail = $4,
                skippered_length_motor = $5,
                recalculate = FALSE
            WHERE username = $1",
        )
        .bind(username)
        .bind(totals.crewed_length_sail)
        .bind(totals.crewed_length_motor)
        .bind(totals.skippered_length_sail)
        .bind(totals.skippered_length_motor)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(VoyageWorkerError::UserNotFound(username.to_string()));
        }
        Ok(())
    }
}
