use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::errors::ApiError;

/// Cookie that carries the admin session token.
pub const ADMIN_COOKIE: &str = "admin-token";

/// Session lifetime, also used for the cookie Max-Age.
pub const SESSION_TTL_SECS: i64 = 7200;

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Holds the signing keys and admin credentials. Constructed once in
/// `main` and shared through the application state.
pub struct AuthContext {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    admin_username: String,
    admin_password: String,
    cookie_secure: bool,
}

impl AuthContext {
    pub fn new(
        jwt_secret: &str,
        admin_username: String,
        admin_password: String,
        cookie_secure: bool,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        AuthContext {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
            admin_username,
            admin_password,
            cookie_secure,
        }
    }

    pub fn verify_credentials(&self, username: &str, password: &str) -> bool {
        username == self.admin_username && password == self.admin_password
    }

    /// Signs a fresh admin token valid for [`SESSION_TTL_SECS`].
    pub fn issue_token(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: self.admin_username.clone(),
            role: ADMIN_ROLE.to_string(),
            iat: now,
            exp: now + SESSION_TTL_SECS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Returns the claims when the token is well-signed, unexpired,
    /// and carries the admin role.
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .ok()
            .map(|data| data.claims)
            .filter(|claims| claims.role == ADMIN_ROLE)
    }

    pub fn session_cookie(&self, token: &str) -> String {
        build_cookie(token, SESSION_TTL_SECS, self.cookie_secure)
    }

    /// An immediately-expiring cookie that clears the session.
    pub fn logout_cookie(&self) -> String {
        build_cookie("", 0, self.cookie_secure)
    }
}

fn build_cookie(value: &str, max_age: i64, secure: bool) -> String {
    let mut parts = vec![
        format!("{ADMIN_COOKIE}={value}"),
        "Path=/".to_string(),
        "HttpOnly".to_string(),
        "SameSite=Strict".to_string(),
        format!("Max-Age={max_age}"),
    ];
    if secure {
        parts.push("Secure".to_string());
    }
    parts.join("; ")
}

/// Pulls the session token out of the `admin-token` cookie, falling
/// back to an `Authorization: Bearer` header for non-browser clients.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        if let Some(token) = token_from_cookie_header(cookie_header) {
            return Some(token);
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn token_from_cookie_header(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ADMIN_COOKIE)
        .map(|(_, value)| value)
}

/// Extractor that rejects the request with 401 unless it carries a
/// valid admin token. Admin handlers take this as their first
/// argument so the check runs before any body parsing.
#[derive(Debug)]
pub struct AdminSession {
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: AppState,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let claims = state
            .auth()
            .verify_token(token)
            .ok_or(ApiError::Unauthorized)?;
        Ok(AdminSession { claims })
    }
}
