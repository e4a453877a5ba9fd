use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{config::AppConfig, errors::ServiceError};
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use jsonwebtoken::{DecodingKey, Validation, decode};
use std::future::{Ready, ready};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (User ID)
    pub exp: usize,  // Expiration
}

impl Claims {
    pub fn user_id(&self) -> Result<i32, ServiceError> {
        self.sub
            .parse()
            .map_err(|_| ServiceError::Unauthorized("Invalid user ID".to_string()))
    }
}

impl FromRequest for Claims {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let auth_header = match req.headers().get("Authorization") {
            Some(h) => h,
            None => return ready(Err(ServiceError::Unauthorized("No Auth header".into()))),
        };

        let token_str = match auth_header.to_str() {
            Ok(s) => s.trim_start_matches("Bearer ").to_string(),
            Err(_) => {
                return ready(Err(ServiceError::Unauthorized(
                    "Invalid Auth header".into(),
                )));
            }
        };

        let Some(config) = req.app_data::<web::Data<AppConfig>>() else {
            return ready(Err(ServiceError::Internal(
                "AppConfig not registered".into(),
            )));
        };

        ready(decode_jwt(&token_str, &config.jwt_secret))
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_jwt(user_id: i32, secret: &str, ttl_hours: u64) -> Result<String, String> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| e.to_string())?
        .as_secs()
        + ttl_hours * 3600;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ServiceError::Unauthorized("Invalid Token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_hash_password_returns_valid_hash() {
        let password = "my_secure_password";
        let result = hash_password(password);

        assert!(result.is_ok());
        let hash = result.unwrap();
        assert!(!hash.is_empty());
        assert!(hash.starts_with("$argon2")); // Argon2 hash format
    }

    #[test]
    fn test_hash_password_produces_different_hashes_for_same_password() {
        let password = "my_secure_password";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // Different salts should produce different hashes
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_correct_and_incorrect() {
        let hash = hash_password("my_secure_password").unwrap();

        assert!(verify_password("my_secure_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("password", "invalid_hash");
        assert!(result.is_err());
    }

    #[test]
    fn test_jwt_round_trip_carries_user_id() {
        let token = create_jwt(123, SECRET, 24).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = decode_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "123");
        assert_eq!(claims.user_id().unwrap(), 123);
    }

    #[test]
    fn test_jwt_expiration_follows_ttl() {
        let token = create_jwt(1, SECRET, 2).unwrap();
        let claims = decode_jwt(&token, SECRET).unwrap();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize;

        assert!(claims.exp > now);
        assert!(claims.exp <= now + 2 * 3600 + 1);
    }

    #[test]
    fn test_jwt_with_wrong_secret_is_rejected() {
        let token = create_jwt(1, SECRET, 1).unwrap();
        assert!(matches!(
            decode_jwt(&token, "other"),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[actix_rt::test]
    async fn test_extractor_reads_bearer_token() {
        let mut config = AppConfig::for_timezone(chrono_tz::UTC);
        config.jwt_secret = SECRET.to_string();
        let token = create_jwt(7, SECRET, 1).unwrap();

        let req = TestRequest::default()
            .app_data(web::Data::new(config))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();
        let claims = Claims::extract(&req).await.unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
    }

    #[actix_rt::test]
    async fn test_extractor_requires_header() {
        let req = TestRequest::default()
            .app_data(web::Data::new(AppConfig::for_timezone(chrono_tz::UTC)))
            .to_http_request();
        assert!(matches!(
            Claims::extract(&req).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
