use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{Chamber, NewChamberAccess, NewUser, User},
    schema::{chamber_access, users},
    services::{access::canonical_chambers, auth},
};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize, PartialEq)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub chambers: Vec<Chamber>,
}

/// Parse requested chamber codes; unknown codes are rejected, repeats folded.
pub fn parse_chambers(codes: &[String]) -> Result<Vec<Chamber>, ServiceError> {
    for code in codes {
        code.parse::<Chamber>()?;
    }
    Ok(canonical_chambers(codes.iter().map(String::as_str)))
}

/// Trimmed, non-empty username and password.
pub fn validate_credentials<'a>(
    username: &'a str,
    password: &'a str,
) -> Result<(&'a str, &'a str), ServiceError> {
    let (username, password) = (username.trim(), password.trim());
    if username.is_empty() || password.is_empty() {
        return Err(ServiceError::validation(
            "Username and password are required.",
        ));
    }
    Ok((username, password))
}

/// User and chamber-access administration.
pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let mut conn = self.pool.get()?;
        let user = users::table
            .filter(users::username.eq(username))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(user)
    }

    /// Non-superusers with their chamber grants, ordered by username.
    pub fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let mut conn = self.pool.get()?;

        let regular: Vec<User> = users::table
            .filter(users::is_superuser.eq(false))
            .order(users::username.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        let ids: Vec<i32> = regular.iter().map(|u| u.id).collect();
        let grants: Vec<(i32, String)> = chamber_access::table
            .filter(chamber_access::user_id.eq_any(&ids))
            .select((chamber_access::user_id, chamber_access::chamber))
            .load(&mut conn)?;

        let mut by_user: HashMap<i32, Vec<String>> = HashMap::new();
        for (user_id, chamber) in grants {
            by_user.entry(user_id).or_default().push(chamber);
        }

        Ok(regular
            .into_iter()
            .map(|u| {
                let codes = by_user.remove(&u.id).unwrap_or_default();
                UserSummary {
                    id: u.id,
                    username: u.username,
                    chambers: canonical_chambers(codes.iter().map(String::as_str)),
                }
            })
            .collect())
    }

    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        chambers: &[Chamber],
        is_superuser: bool,
    ) -> Result<UserSummary, ServiceError> {
        let (username, password) = validate_credentials(username, password)?;
        let hashed = auth::hash_password(password).map_err(ServiceError::Internal)?;

        let mut conn = self.pool.get()?;
        let user = conn.transaction::<User, ServiceError, _>(|conn| {
            let user = diesel::insert_into(users::table)
                .values(&NewUser {
                    username,
                    password_hash: &hashed,
                    is_superuser,
                })
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(|e| match ServiceError::from(e) {
                    ServiceError::Conflict(_) => {
                        ServiceError::Conflict("Username already exists.".to_string())
                    }
                    other => other,
                })?;
            insert_grants(conn, user.id, chambers)?;
            Ok(user)
        })?;

        log::info!("Created user {} with chambers {:?}", user.username, chambers);

        Ok(UserSummary {
            id: user.id,
            username: user.username,
            chambers: chambers.to_vec(),
        })
    }

    /// Replace a user's chamber grants.
    pub fn set_chambers(&self, user_id: i32, chambers: &[Chamber]) -> Result<(), ServiceError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<(), ServiceError, _>(|conn| {
            let exists: Option<i32> = users::table
                .filter(users::id.eq(user_id))
                .select(users::id)
                .first(conn)
                .optional()?;
            if exists.is_none() {
                return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
            }

            diesel::delete(chamber_access::table.filter(chamber_access::user_id.eq(user_id)))
                .execute(conn)?;
            insert_grants(conn, user_id, chambers)
        })?;

        log::info!("User {} chambers set to {:?}", user_id, chambers);
        Ok(())
    }

    pub fn delete_user(&self, user_id: i32) -> Result<(), ServiceError> {
        let mut conn = self.pool.get()?;
        let count = diesel::delete(users::table.filter(users::id.eq(user_id))).execute(&mut conn)?;
        if count == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }
        log::info!("Deleted user {}", user_id);
        Ok(())
    }

    /// Create a superuser, or promote and re-password an existing account.
    pub fn ensure_superuser(&self, username: &str, password: &str) -> Result<i32, ServiceError> {
        let (username, password) = validate_credentials(username, password)?;
        match self.find_by_username(username)? {
            Some(existing) => {
                let hashed = auth::hash_password(password).map_err(ServiceError::Internal)?;
                let mut conn = self.pool.get()?;
                diesel::update(users::table.filter(users::id.eq(existing.id)))
                    .set((
                        users::is_superuser.eq(true),
                        users::password_hash.eq(&hashed),
                    ))
                    .execute(&mut conn)?;
                Ok(existing.id)
            }
            None => Ok(self.create_user(username, password, &[], true)?.id),
        }
    }
}

fn insert_grants(
    conn: &mut PgConnection,
    user_id: i32,
    chambers: &[Chamber],
) -> Result<(), ServiceError> {
    if chambers.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewChamberAccess> = chambers
        .iter()
        .map(|c| NewChamberAccess {
            user_id,
            chamber: c.as_str(),
        })
        .collect();
    diesel::insert_into(chamber_access::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chambers_folds_repeats() {
        let codes = vec!["ch2".to_string(), "ch1".to_string(), "ch2".to_string()];
        assert_eq!(parse_chambers(&codes).unwrap(), vec![Chamber::Ch1, Chamber::Ch2]);
    }

    #[test]
    fn test_parse_chambers_rejects_unknown() {
        let codes = vec!["ch1".to_string(), "basement".to_string()];
        assert!(matches!(
            parse_chambers(&codes),
            Err(ServiceError::InvalidChamber(ref c)) if c == "basement"
        ));
    }

    #[test]
    fn test_validate_credentials_trims() {
        assert_eq!(
            validate_credentials("  alice ", " pw ").unwrap(),
            ("alice", "pw")
        );
        assert!(validate_credentials("   ", "pw").is_err());
        assert!(validate_credentials("alice", "").is_err());
    }

    #[test]
    fn test_user_summary_serialization() {
        let summary = UserSummary {
            id: 3,
            username: "alice".to_string(),
            chambers: vec![Chamber::Ch1, Chamber::Ch3],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["chambers"], serde_json::json!(["ch1", "ch3"]));
    }
}
