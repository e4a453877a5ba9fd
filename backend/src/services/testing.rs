//! In-memory stores used by unit tests in place of PostgreSQL.

use crate::{
    errors::ServiceError,
    models::{Chamber, NewReading, Reading},
    services::{access::AccessGate, reading_store::ReadingStore},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryReadingStore {
    rows: Mutex<Vec<Reading>>,
}

impl MemoryReadingStore {
    pub fn with_readings(rows: Vec<Reading>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn sorted(&self, chamber: Chamber) -> Vec<Reading> {
        let mut rows: Vec<Reading> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.chamber == chamber.as_str())
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        rows
    }
}

impl ReadingStore for MemoryReadingStore {
    fn insert(&self, reading: NewReading) -> Result<Reading, ServiceError> {
        let mut rows = self.rows.lock().unwrap();
        let duplicate = rows.iter().any(|r| {
            r.chamber == reading.chamber && r.date == reading.date && r.time == reading.time
        });
        if duplicate {
            return Err(ServiceError::Conflict("duplicate reading".to_string()));
        }
        let created = Reading {
            id: rows.len() as i32 + 1,
            chamber: reading.chamber,
            date: reading.date,
            time: reading.time,
            temperature: reading.temperature,
            humidity: reading.humidity,
            pressure: reading.pressure,
            co2: reading.co2,
            created_at: reading.created_at,
        };
        rows.push(created.clone());
        Ok(created)
    }

    fn query_range(
        &self,
        chamber: Chamber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, ServiceError> {
        Ok(self
            .sorted(chamber)
            .into_iter()
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .collect())
    }

    fn query_all(&self, chamber: Chamber) -> Result<Vec<Reading>, ServiceError> {
        Ok(self.sorted(chamber))
    }

    fn latest(&self, chamber: Chamber) -> Result<Option<Reading>, ServiceError> {
        Ok(self.sorted(chamber).pop())
    }
}

#[derive(Default)]
pub struct MemoryAccessGate {
    superusers: Vec<i32>,
    grants: HashMap<i32, Vec<Chamber>>,
    lookups: AtomicUsize,
}

impl MemoryAccessGate {
    pub fn superuser(mut self, user_id: i32) -> Self {
        self.superusers.push(user_id);
        self
    }

    pub fn grant(mut self, user_id: i32, chamber: Chamber) -> Self {
        self.grants.entry(user_id).or_default().push(chamber);
        self
    }

    /// Number of `allowed_chambers` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl AccessGate for MemoryAccessGate {
    fn is_superuser(&self, user_id: i32) -> Result<bool, ServiceError> {
        Ok(self.superusers.contains(&user_id))
    }

    fn allowed_chambers(&self, user_id: i32) -> Result<Vec<Chamber>, ServiceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.superusers.contains(&user_id) {
            return Ok(Chamber::ALL.to_vec());
        }
        let granted = self.grants.get(&user_id).cloned().unwrap_or_default();
        Ok(Chamber::ALL
            .into_iter()
            .filter(|c| granted.contains(c))
            .collect())
    }
}
