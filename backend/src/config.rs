use chrono_tz::Tz;
use std::env;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    /// Operating timezone for slotting, window parsing and auto-filled dates.
    pub timezone: Tz,
    pub bind_addr: String,
    pub port: u16,
    pub token_ttl_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                log::warn!("JWT_SECRET not set, falling back to an insecure default");
                "secret".to_string()
            }
        };

        let timezone = match env::var("APP_TIMEZONE") {
            Ok(name) => parse_timezone(&name)?,
            Err(_) => DEFAULT_TIMEZONE,
        };

        let port = match env::var("PORT") {
            Ok(p) => p.parse().map_err(|_| format!("Invalid PORT: {}", p))?,
            Err(_) => 8080,
        };

        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(h) => h
                .parse()
                .map_err(|_| format!("Invalid TOKEN_TTL_HOURS: {}", h))?,
            Err(_) => 24,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            timezone,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            token_ttl_hours,
        })
    }

    /// Settings for tests and tooling that never touch the environment.
    pub fn for_timezone(timezone: Tz) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: "secret".to_string(),
            timezone,
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            token_ttl_hours: 24,
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("Unknown timezone: {}", name))
}
