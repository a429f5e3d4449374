//! Office locations and nearest-office resolution.
//!
//! Every resolution walks the locations in insertion order and keeps the first
//! minimum, so two equidistant offices always resolve to the older one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AttendanceError;
use crate::geo::Coordinate;
use crate::model::location::{
    DEFAULT_LOCATION_ID, DEFAULT_RADIUS_METERS, LocationPatch, NewLocation, OfficeLocation,
};

/// Upper bound on how long a snapshot may outlive a concurrent admin write.
const SNAPSHOT_TTL: Duration = Duration::from_secs(30);

#[async_trait]
pub trait LocationRegistry: Send + Sync {
    /// All locations in insertion order.
    async fn snapshot(&self) -> Result<Arc<Vec<OfficeLocation>>, AttendanceError>;

    async fn create(&self, new: NewLocation) -> Result<OfficeLocation, AttendanceError>;

    async fn update(
        &self,
        id: &str,
        patch: LocationPatch,
    ) -> Result<OfficeLocation, AttendanceError>;

    async fn delete(&self, id: &str) -> Result<(), AttendanceError>;

    /// Locations for display, most recently created first.
    async fn list(&self) -> Result<Vec<OfficeLocation>, AttendanceError> {
        let snapshot = self.snapshot().await?;
        let mut locations: Vec<OfficeLocation> = snapshot.iter().rev().cloned().collect();
        locations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(locations)
    }

    async fn get(&self, id: &str) -> Result<OfficeLocation, AttendanceError> {
        self.snapshot()
            .await?
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(AttendanceError::NotFound("Location"))
    }

    async fn default_location(&self) -> Result<OfficeLocation, AttendanceError> {
        self.get(DEFAULT_LOCATION_ID).await
    }

    async fn nearest(&self, at: Coordinate) -> Result<(OfficeLocation, f64), AttendanceError> {
        let snapshot = self.snapshot().await?;
        nearest_in(&snapshot, at)
            .map(|(location, distance)| (location.clone(), distance))
            .ok_or(AttendanceError::NoLocationsConfigured)
    }

    async fn ranked(
        &self,
        at: Coordinate,
        limit: usize,
    ) -> Result<Vec<(OfficeLocation, f64)>, AttendanceError> {
        let snapshot = self.snapshot().await?;
        Ok(rank(&snapshot, at, limit)
            .into_iter()
            .map(|(location, distance)| (location.clone(), distance))
            .collect())
    }
}

/// Closest location to `at`; ties keep the earliest entry.
pub fn nearest_in(locations: &[OfficeLocation], at: Coordinate) -> Option<(&OfficeLocation, f64)> {
    let mut best: Option<(&OfficeLocation, f64)> = None;
    for location in locations {
        let distance = at.distance_to(&location.center());
        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((location, distance)),
        }
    }
    best
}

/// Locations sorted by distance from `at`, truncated to `limit`. The sort is
/// stable so equidistant locations stay in insertion order.
pub fn rank(locations: &[OfficeLocation], at: Coordinate, limit: usize) -> Vec<(&OfficeLocation, f64)> {
    let mut ranked: Vec<_> = locations
        .iter()
        .map(|l| (l, at.distance_to(&l.center())))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.truncate(limit);
    ranked
}

fn validate(name: &str, center: Coordinate, radius: i64) -> Result<(), AttendanceError> {
    if name.trim().is_empty() {
        return Err(AttendanceError::InvalidInput("name must not be empty".into()));
    }
    center.validated()?;
    if radius <= 0 {
        return Err(AttendanceError::InvalidInput(
            "radius must be a positive number of meters".into(),
        ));
    }
    Ok(())
}

pub struct SqliteLocationRegistry {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    cache: Cache<(), Arc<Vec<OfficeLocation>>>,
    /// Bumped on every write, before the cache is invalidated.
    generation: AtomicU64,
}

impl SqliteLocationRegistry {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(SNAPSHOT_TTL)
                .build(),
            generation: AtomicU64::new(0),
        }
    }

    async fn load(&self) -> Result<Vec<OfficeLocation>, AttendanceError> {
        let rows = sqlx::query_as::<_, OfficeLocation>(
            r#"
            SELECT id, name, latitude, longitude, radius, created_at
            FROM office_locations
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(&()).await;
    }

    /// Caches a snapshot loaded at `generation` unless a write has landed
    /// since. A write racing the insert is caught by the second check.
    async fn remember(&self, generation: u64, snapshot: Arc<Vec<OfficeLocation>>) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.cache.insert((), snapshot).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            self.cache.invalidate(&()).await;
        }
    }
}

#[async_trait]
impl LocationRegistry for SqliteLocationRegistry {
    async fn snapshot(&self) -> Result<Arc<Vec<OfficeLocation>>, AttendanceError> {
        if let Some(cached) = self.cache.get(&()).await {
            return Ok(cached);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let fresh = Arc::new(self.load().await?);
        self.remember(generation, fresh.clone()).await;
        Ok(fresh)
    }

    async fn create(&self, new: NewLocation) -> Result<OfficeLocation, AttendanceError> {
        let (Some(name), Some(latitude), Some(longitude)) = (new.name, new.latitude, new.longitude)
        else {
            return Err(AttendanceError::InvalidInput(
                "name, latitude, longitude are required".into(),
            ));
        };
        let radius = new.radius.unwrap_or(DEFAULT_RADIUS_METERS);
        validate(&name, Coordinate::new(latitude, longitude), radius)?;

        let location = OfficeLocation {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            latitude,
            longitude,
            radius_meters: radius,
            created_at: self.clock.now(),
        };

        sqlx::query(
            r#"
            INSERT INTO office_locations (id, name, latitude, longitude, radius, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.radius_meters)
        .bind(location.created_at)
        .execute(&self.pool)
        .await?;

        self.invalidate().await;
        tracing::info!(id = %location.id, name = %location.name, "Location created");
        Ok(location)
    }

    async fn update(
        &self,
        id: &str,
        patch: LocationPatch,
    ) -> Result<OfficeLocation, AttendanceError> {
        let mut location = sqlx::query_as::<_, OfficeLocation>(
            "SELECT id, name, latitude, longitude, radius, created_at FROM office_locations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AttendanceError::NotFound("Location"))?;

        if patch.is_empty() {
            return Ok(location);
        }
        if let Some(name) = patch.name {
            location.name = name.trim().to_string();
        }
        if let Some(latitude) = patch.latitude {
            location.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            location.longitude = longitude;
        }
        if let Some(radius) = patch.radius {
            location.radius_meters = radius;
        }
        validate(&location.name, location.center(), location.radius_meters)?;

        let result = sqlx::query(
            r#"
            UPDATE office_locations
            SET name = ?, latitude = ?, longitude = ?, radius = ?
            WHERE id = ?
            "#,
        )
        .bind(&location.name)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.radius_meters)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.invalidate().await;
        if result.rows_affected() == 0 {
            return Err(AttendanceError::NotFound("Location"));
        }
        tracing::info!(id, "Location updated");
        Ok(location)
    }

    async fn delete(&self, id: &str) -> Result<(), AttendanceError> {
        if id == DEFAULT_LOCATION_ID {
            return Err(AttendanceError::InvalidInput(
                "The default office location cannot be deleted".into(),
            ));
        }

        let result = sqlx::query("DELETE FROM office_locations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.invalidate().await;
        if result.rows_affected() == 0 {
            return Err(AttendanceError::NotFound("Location"));
        }
        tracing::info!(id, "Location deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::config::Config;
    use crate::db::{ensure_default_location, test_support::memory_pool};
    use crate::geo::offset_north;

    const CAMPUS: Coordinate = Coordinate {
        latitude: 13.1373,
        longitude: 77.5680,
    };

    fn new_location(name: &str, at: Coordinate, radius: Option<i64>) -> NewLocation {
        NewLocation {
            name: Some(name.into()),
            latitude: Some(at.latitude),
            longitude: Some(at.longitude),
            radius,
        }
    }

    async fn empty_registry() -> (SqliteLocationRegistry, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at("2026-01-05T08:00:00Z"));
        let registry = SqliteLocationRegistry::new(memory_pool().await, clock.clone());
        (registry, clock)
    }

    #[actix_web::test]
    async fn nearest_on_empty_registry_fails() {
        let (registry, _) = empty_registry().await;
        let err = registry.nearest(CAMPUS).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoLocationsConfigured));
        assert!(registry.ranked(CAMPUS, 5).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn nearest_picks_minimum_distance() {
        let (registry, _) = empty_registry().await;
        registry
            .create(new_location("Far", offset_north(CAMPUS, 900.0), Some(150)))
            .await
            .unwrap();
        registry
            .create(new_location("Near", offset_north(CAMPUS, 120.0), Some(150)))
            .await
            .unwrap();

        let (location, distance) = registry.nearest(CAMPUS).await.unwrap();
        assert_eq!(location.name, "Near");
        assert!((distance - 120.0).abs() < 0.01);
    }

    #[actix_web::test]
    async fn equidistant_locations_resolve_to_first_inserted() {
        let (registry, _) = empty_registry().await;
        registry.create(new_location("Block A", CAMPUS, Some(100))).await.unwrap();
        registry.create(new_location("Block B", CAMPUS, Some(300))).await.unwrap();

        let (location, distance) = registry.nearest(CAMPUS).await.unwrap();
        assert_eq!(location.name, "Block A");
        assert_eq!(distance, 0.0);

        let ranked = registry.ranked(CAMPUS, 5).await.unwrap();
        let names: Vec<_> = ranked.iter().map(|(l, _)| l.name.as_str()).collect();
        assert_eq!(names, ["Block A", "Block B"]);
    }

    #[actix_web::test]
    async fn ranked_sorts_ascending_and_truncates() {
        let (registry, _) = empty_registry().await;
        for (name, meters) in [("c", 300.0), ("a", 10.0), ("d", 400.0), ("b", 200.0)] {
            registry
                .create(new_location(name, offset_north(CAMPUS, meters), None))
                .await
                .unwrap();
        }

        let ranked = registry.ranked(CAMPUS, 3).await.unwrap();
        let names: Vec<_> = ranked.iter().map(|(l, _)| l.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(ranked.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[actix_web::test]
    async fn list_is_newest_first() {
        let (registry, clock) = empty_registry().await;
        registry.create(new_location("old", CAMPUS, None)).await.unwrap();
        clock.advance(chrono::Duration::minutes(5));
        registry.create(new_location("new", CAMPUS, None)).await.unwrap();

        let names: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, ["new", "old"]);
    }

    #[actix_web::test]
    async fn create_applies_default_radius_and_validates() {
        let (registry, _) = empty_registry().await;
        let created = registry.create(new_location("Lab", CAMPUS, None)).await.unwrap();
        assert_eq!(created.radius_meters, DEFAULT_RADIUS_METERS);

        let missing = NewLocation {
            name: Some("x".into()),
            latitude: None,
            longitude: Some(1.0),
            radius: None,
        };
        assert!(matches!(
            registry.create(missing).await,
            Err(AttendanceError::InvalidInput(_))
        ));
        assert!(matches!(
            registry.create(new_location("bad", CAMPUS, Some(0))).await,
            Err(AttendanceError::InvalidInput(_))
        ));
        assert!(matches!(
            registry
                .create(new_location("bad", Coordinate::new(95.0, 0.0), None))
                .await,
            Err(AttendanceError::InvalidInput(_))
        ));
    }

    #[actix_web::test]
    async fn update_only_touches_supplied_fields() {
        let (registry, _) = empty_registry().await;
        let created = registry.create(new_location("Lab", CAMPUS, Some(80))).await.unwrap();
        // prime the cache so the update must invalidate it
        registry.snapshot().await.unwrap();

        let updated = registry
            .update(
                &created.id,
                LocationPatch {
                    radius: Some(250),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.radius_meters, 250);
        assert_eq!(updated.name, "Lab");
        assert_eq!(updated.latitude, CAMPUS.latitude);

        let stored = registry.get(&created.id).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[actix_web::test]
    async fn snapshot_read_before_a_write_is_not_cached_after_it() {
        let (registry, _) = empty_registry().await;
        let created = registry.create(new_location("Lab", CAMPUS, Some(80))).await.unwrap();

        // a reader loads, then an update commits before the reader caches
        let generation = registry.generation.load(Ordering::SeqCst);
        let stale = Arc::new(registry.load().await.unwrap());
        registry
            .update(
                &created.id,
                LocationPatch {
                    radius: Some(500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        registry.remember(generation, stale).await;

        assert_eq!(registry.get(&created.id).await.unwrap().radius_meters, 500);
    }

    #[actix_web::test]
    async fn update_and_delete_unknown_ids_fail() {
        let (registry, _) = empty_registry().await;
        assert!(matches!(
            registry.update("missing", LocationPatch::default()).await,
            Err(AttendanceError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete("missing").await,
            Err(AttendanceError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn delete_removes_location_but_keeps_default() {
        let pool = memory_pool().await;
        let clock = Arc::new(FixedClock::at("2026-01-05T08:00:00Z"));
        ensure_default_location(&pool, &Config::for_tests(), clock.now())
            .await
            .unwrap();
        let registry = SqliteLocationRegistry::new(pool, clock);

        let lab = registry.create(new_location("Lab", CAMPUS, None)).await.unwrap();
        registry.delete(&lab.id).await.unwrap();
        assert!(matches!(
            registry.get(&lab.id).await,
            Err(AttendanceError::NotFound(_))
        ));

        assert!(matches!(
            registry.delete(DEFAULT_LOCATION_ID).await,
            Err(AttendanceError::InvalidInput(_))
        ));
        let default = registry.default_location().await.unwrap();
        assert_eq!(default.radius_meters, 150);
    }
}
