use crate::{
    db::DbPool,
    errors::ServiceError,
    services::{
        access::AccessGate,
        auth::Claims,
        users::{UserService, parse_chambers},
    },
};
use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub chambers: Vec<String>,
}

#[derive(Deserialize)]
pub struct ChambersRequest {
    pub chambers: Vec<String>,
}

/// Only superusers manage accounts.
fn require_superuser(gate: &dyn AccessGate, claims: &Claims) -> Result<i32, ServiceError> {
    let user_id = claims.user_id()?;
    if !gate.is_superuser(user_id)? {
        log::warn!("User {} tried to reach the admin API", user_id);
        return Err(ServiceError::AccessDenied);
    }
    Ok(user_id)
}

#[get("")]
pub async fn list_users(
    pool: web::Data<DbPool>,
    gate: web::Data<dyn AccessGate>,
    claims: Claims,
) -> Result<HttpResponse, ServiceError> {
    require_superuser(gate.get_ref(), &claims)?;
    let users = UserService::new(pool.get_ref().clone()).list_users()?;
    Ok(HttpResponse::Ok().json(users))
}

#[post("")]
pub async fn create_user(
    pool: web::Data<DbPool>,
    gate: web::Data<dyn AccessGate>,
    claims: Claims,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ServiceError> {
    require_superuser(gate.get_ref(), &claims)?;
    let chambers = parse_chambers(&body.chambers)?;

    let user = UserService::new(pool.get_ref().clone()).create_user(
        &body.username,
        &body.password,
        &chambers,
        false,
    )?;
    Ok(HttpResponse::Created().json(user))
}

#[put("/{user_id}/chambers")]
pub async fn update_chambers(
    pool: web::Data<DbPool>,
    gate: web::Data<dyn AccessGate>,
    claims: Claims,
    path: web::Path<i32>,
    body: web::Json<ChambersRequest>,
) -> Result<HttpResponse, ServiceError> {
    require_superuser(gate.get_ref(), &claims)?;
    let user_id = path.into_inner();
    let chambers = parse_chambers(&body.chambers)?;

    UserService::new(pool.get_ref().clone()).set_chambers(user_id, &chambers)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": user_id,
        "chambers": chambers,
    })))
}

#[delete("/{user_id}")]
pub async fn delete_user(
    pool: web::Data<DbPool>,
    gate: web::Data<dyn AccessGate>,
    claims: Claims,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    require_superuser(gate.get_ref(), &claims)?;
    UserService::new(pool.get_ref().clone()).delete_user(path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}
