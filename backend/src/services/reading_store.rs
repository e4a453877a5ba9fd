use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{Chamber, NewReading, Reading},
    schema::readings,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Append-only per-chamber reading series.
///
/// Every query returns readings ordered by `created_at` ascending.
pub trait ReadingStore: Send + Sync {
    fn insert(&self, reading: NewReading) -> Result<Reading, ServiceError>;

    /// Readings with `start <= created_at <= end`.
    fn query_range(
        &self,
        chamber: Chamber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, ServiceError>;

    fn query_all(&self, chamber: Chamber) -> Result<Vec<Reading>, ServiceError>;

    fn latest(&self, chamber: Chamber) -> Result<Option<Reading>, ServiceError>;
}

pub struct PgReadingStore {
    pool: DbPool,
}

impl PgReadingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ReadingStore for PgReadingStore {
    fn insert(&self, reading: NewReading) -> Result<Reading, ServiceError> {
        let mut conn = self.pool.get()?;

        let created = diesel::insert_into(readings::table)
            .values(&reading)
            .returning(Reading::as_returning())
            .get_result(&mut conn)
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                    "A reading for {} at {} {} already exists",
                    reading.chamber, reading.date, reading.time
                )),
                other => other,
            })?;

        Ok(created)
    }

    fn query_range(
        &self,
        chamber: Chamber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, ServiceError> {
        let mut conn = self.pool.get()?;

        let rows = readings::table
            .filter(readings::chamber.eq(chamber.as_str()))
            .filter(readings::created_at.ge(start))
            .filter(readings::created_at.le(end))
            .order((readings::created_at.asc(), readings::id.asc()))
            .select(Reading::as_select())
            .load(&mut conn)?;

        Ok(rows)
    }

    fn query_all(&self, chamber: Chamber) -> Result<Vec<Reading>, ServiceError> {
        let mut conn = self.pool.get()?;

        let rows = readings::table
            .filter(readings::chamber.eq(chamber.as_str()))
            .order((readings::created_at.asc(), readings::id.asc()))
            .select(Reading::as_select())
            .load(&mut conn)?;

        Ok(rows)
    }

    fn latest(&self, chamber: Chamber) -> Result<Option<Reading>, ServiceError> {
        let mut conn = self.pool.get()?;

        let row = readings::table
            .filter(readings::chamber.eq(chamber.as_str()))
            .order((readings::created_at.desc(), readings::id.desc()))
            .select(Reading::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row)
    }
}
