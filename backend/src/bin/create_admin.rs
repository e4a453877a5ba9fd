//! Create Admin - bootstrap a superuser account
//!
//! Creates the superuser, or promotes an existing account and resets its password.
//!
//! Usage:
//!   create_admin <username> <password>
//!
//! Environment variables:
//!   DATABASE_URL - PostgreSQL connection string (required)

use std::env;

use chamberlog::db;
use chamberlog::services::users::UserService;

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let (username, password) = match args.as_slice() {
        [username, password] => (username.as_str(), password.as_str()),
        _ => {
            log::error!("Usage: create_admin <username> <password>");
            std::process::exit(2);
        }
    };

    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            log::error!("DATABASE_URL environment variable is not set");
            std::process::exit(1);
        }
    };

    let pool = match db::init_pool(&database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    match UserService::new(pool).ensure_superuser(username, password) {
        Ok(id) => log::info!("Superuser {} ready (id={})", username, id),
        Err(e) => {
            log::error!("Failed to create superuser {}: {}", username, e);
            std::process::exit(1);
        }
    }
}
