use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    services::{auth, users::UserService},
};
use actix_web::{HttpResponse, post, web};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

#[post("/login")]
pub async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    item: web::Json<AuthRequest>,
) -> Result<HttpResponse, ServiceError> {
    let service = UserService::new(pool.get_ref().clone());
    let invalid = || ServiceError::Unauthorized("Invalid credentials".to_string());

    let Some(user) = service.find_by_username(item.username.trim())? else {
        log::warn!("Login failed for unknown user {}", item.username);
        return Err(invalid());
    };

    match auth::verify_password(&item.password, &user.password_hash) {
        Ok(true) => {}
        _ => {
            log::warn!("Login failed for {}", user.username);
            return Err(invalid());
        }
    }

    let token = auth::create_jwt(user.id, &config.jwt_secret, config.token_ttl_hours)
        .map_err(ServiceError::Internal)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "is_superuser": user.is_superuser,
    })))
}
