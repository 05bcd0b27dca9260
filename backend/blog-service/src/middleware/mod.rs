/// HTTP middleware utilities for blog-service
///
/// Bearer tokens are issued by the identity service and verified here with a
/// shared HS256 secret. Authentication is optional per request: handlers take
/// a `CurrentUser` and hand `current.user()` to the services, which decide
/// whether a signed-in user is required.
pub mod permissions;

pub use permissions::*;

use actix_web::{web, Error, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;

/// JWT claims shared with the identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// The signed-in user as asserted by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::InvalidToken(e.to_string()))?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::InvalidToken("Invalid user ID".to_string()))?;

        Ok(AuthUser {
            id,
            username: data.claims.username,
        })
    }
}

/// Authentication settings registered as app data.
#[derive(Clone)]
pub struct AuthSettings {
    pub verifier: JwtVerifier,
    pub login_url: String,
}

impl AuthSettings {
    pub fn new(secret: &str, login_url: impl Into<String>) -> Self {
        Self {
            verifier: JwtVerifier::new(secret),
            login_url: login_url.into(),
        }
    }
}

/// The requesting user, if any, plus where to send them to sign in.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    user: Option<AuthUser>,
    login_redirect: String,
}

impl CurrentUser {
    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    /// `<login_url>?next=<path of this request>`
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }
}

fn extract_current_user(req: &HttpRequest) -> Result<CurrentUser, AppError> {
    let settings = req
        .app_data::<web::Data<AuthSettings>>()
        .ok_or_else(|| AppError::Internal("AuthSettings not configured".to_string()))?;

    let login_redirect = format!("{}?next={}", settings.login_url, req.path());

    let Some(header) = req.headers().get("Authorization") else {
        return Ok(CurrentUser {
            user: None,
            login_redirect,
        });
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::InvalidToken("Authorization must use Bearer scheme".to_string())
        })?;

    let user = settings.verifier.verify(token)?;

    Ok(CurrentUser {
        user: Some(user),
        login_redirect,
    })
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(extract_current_user(req).map_err(Error::from))
    }
}
