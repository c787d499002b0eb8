use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Global decoding key for bearer tokens
static DECODING_KEY: OnceLock<DecodingKey> = OnceLock::new();

/// Token claims issued by the identity provider. `sub` carries the numeric
/// user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Authenticated user id, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

/// Initialize the JWT secret from environment
///
/// # Security
/// This function requires the `JWT_SECRET` environment variable to be set.
/// If no secret is configured, the application will **panic** to prevent
/// running in an insecure state. This is intentional fail-secure behavior.
///
/// # Panics
/// Panics if `JWT_SECRET` is not set or is shorter than 32 characters.
pub fn init_jwt_secret() {
    const MIN_SECRET_LENGTH: usize = 32;

    let secret = std::env::var("JWT_SECRET").expect(
        "SECURITY ERROR: JWT_SECRET environment variable is not set. \
         Set JWT_SECRET to the HMAC secret shared with the identity provider. \
         Generate one with: openssl rand -base64 32",
    );

    if secret.len() < MIN_SECRET_LENGTH {
        panic!(
            "SECURITY ERROR: JWT_SECRET must be at least {} characters long, found {}. \
             Generate a secure secret with: openssl rand -base64 32",
            MIN_SECRET_LENGTH,
            secret.len()
        );
    }

    DECODING_KEY
        .set(DecodingKey::from_secret(secret.as_bytes()))
        .unwrap_or_else(|_| panic!("JWT secret already initialized"));
    tracing::info!("✓ JWT authentication initialized");
}

/// Verify a bearer token and extract the user id from its `sub` claim.
fn verify_token(token: &str) -> Option<i64> {
    let key = DECODING_KEY.get()?;
    let data = decode::<Claims>(token, key, &Validation::default()).ok()?;
    data.claims.sub.parse::<i64>().ok()
}

/// Middleware to require authentication for protected endpoints. On
/// success the resolved [`AuthUser`] is available as a request extension.
pub async fn require_auth(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(auth) if auth.starts_with("Bearer ") => {
            let token = &auth[7..]; // Skip "Bearer "
            match verify_token(token) {
                Some(user_id) => {
                    request.extensions_mut().insert(AuthUser(user_id));
                    Ok(next.run(request).await)
                }
                None => {
                    tracing::warn!("Invalid or expired bearer token");
                    Err(StatusCode::UNAUTHORIZED)
                }
            }
        }
        Some(_) => {
            tracing::warn!("Invalid Authorization header format (expected Bearer token)");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
