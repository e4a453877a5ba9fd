use crate::{
    db::DbPool,
    errors::ServiceError,
    models::Chamber,
    schema::{chamber_access, users},
};
use diesel::prelude::*;

/// Per-user, per-chamber authorization. Superusers see every chamber.
pub trait AccessGate: Send + Sync {
    fn is_superuser(&self, user_id: i32) -> Result<bool, ServiceError>;

    /// Chambers the user may read, in `Chamber::ALL` order.
    fn allowed_chambers(&self, user_id: i32) -> Result<Vec<Chamber>, ServiceError>;

    fn has_access(&self, user_id: i32, chamber: Chamber) -> Result<bool, ServiceError> {
        Ok(self.allowed_chambers(user_id)?.contains(&chamber))
    }
}

/// Keep known codes only, in canonical order, without duplicates.
pub fn canonical_chambers<'a>(codes: impl IntoIterator<Item = &'a str>) -> Vec<Chamber> {
    let granted: Vec<&str> = codes.into_iter().collect();
    Chamber::ALL
        .into_iter()
        .filter(|c| granted.contains(&c.as_str()))
        .collect()
}

pub struct PgAccessGate {
    pool: DbPool,
}

impl PgAccessGate {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AccessGate for PgAccessGate {
    fn is_superuser(&self, user_id: i32) -> Result<bool, ServiceError> {
        let mut conn = self.pool.get()?;

        let flag = users::table
            .filter(users::id.eq(user_id))
            .select(users::is_superuser)
            .first::<bool>(&mut conn)
            .optional()?;

        Ok(flag.unwrap_or(false))
    }

    fn allowed_chambers(&self, user_id: i32) -> Result<Vec<Chamber>, ServiceError> {
        if self.is_superuser(user_id)? {
            return Ok(Chamber::ALL.to_vec());
        }

        let mut conn = self.pool.get()?;
        let codes: Vec<String> = chamber_access::table
            .filter(chamber_access::user_id.eq(user_id))
            .select(chamber_access::chamber)
            .load(&mut conn)?;

        Ok(canonical_chambers(codes.iter().map(String::as_str)))
    }
}
