use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Claims, LoginRequest, LoginResponse, RegisterRequest, User, UserResponse};

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Register a new user
    pub async fn register(db: &Database, req: RegisterRequest) -> Result<UserResponse> {
        let username = req.username.trim();
        if username.is_empty() || username.len() > 64 {
            return Err(AppError::BadRequest(
                "Username must be between 1 and 64 characters".to_string(),
            ));
        }

        if !req.email.contains('@') {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }

        if req.password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let existing: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(&req.email)
                .fetch_optional(db.pool())
                .await?;

        if existing.is_some() {
            return Err(AppError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }

        let password_hash = Self::hash_password(&req.password)?;

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(username)
        .bind(&req.email)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(db.pool())
            .await?;

        Ok(UserResponse::from(user))
    }

    /// Login user
    pub async fn login(
        db: &Database,
        config: &Config,
        req: LoginRequest,
    ) -> Result<LoginResponse> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(&req.username)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

        if !Self::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        let access_token = Self::generate_access_token(&user, config)?;

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.access_token_expire_minutes * 60,
            user: UserResponse::from(user),
        })
    }

    /// Generate access token (JWT)
    fn generate_access_token(user: &User, config: &Config) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(config.jwt.access_token_expire_minutes as i64);

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate access token and extract claims. Tokens signed with a
    /// rotated-out secret stay valid until they expire.
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let keys = std::iter::once(config.jwt.secret.as_str())
            .chain(config.jwt.previous_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            if let Ok(token_data) = decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            ) {
                return Ok(token_data.claims);
            }
        }

        Err(AppError::Unauthorized("Invalid token".to_string()))
    }

    /// Hash password using Argon2
    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify password against hash
    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = AuthService::hash_password("correct horse battery").unwrap();
        assert!(AuthService::verify_password("correct horse battery", &hash).unwrap());
        assert!(!AuthService::verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_token_round_trip_and_rotation() {
        let mut config = Config::default();
        config.jwt.secret = "current-secret".to_string();

        let user = User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };

        let token = AuthService::generate_access_token(&user, &config).unwrap();
        let claims = AuthService::validate_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.username, "alice");

        // Rotate: the old secret still validates previously issued tokens
        let mut rotated = Config::default();
        rotated.jwt.secret = "new-secret".to_string();
        rotated.jwt.previous_secrets = vec!["current-secret".to_string()];
        assert!(AuthService::validate_token(&token, &rotated).is_ok());

        let mut stranger = Config::default();
        stranger.jwt.secret = "other".to_string();
        assert!(AuthService::validate_token(&token, &stranger).is_err());
    }
}
