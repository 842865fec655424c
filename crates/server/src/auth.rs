use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};

use crate::error::ErrorBody;

/// Bearer-token gate for `/api`. Disabled when no token is configured.
#[derive(Clone, Default)]
pub struct AuthGate {
    token: Option<SecretString>,
}

impl AuthGate {
    pub fn new(token: Option<SecretString>) -> Self {
        Self { token }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn check(&self, header_value: Option<&str>) -> Result<(), &'static str> {
        let Some(expected) = &self.token else {
            return Ok(());
        };

        match header_value {
            Some(value) => match value.strip_prefix("Bearer ") {
                Some(provided)
                    if constant_time_eq(
                        provided.trim().as_bytes(),
                        expected.expose_secret().as_bytes(),
                    ) =>
                {
                    Ok(())
                }
                Some(_) => Err("Invalid token"),
                None => Err("Invalid Authorization header format. Expected: Bearer <token>"),
            },
            None => Err("Missing Authorization header. Expected: Bearer <token>"),
        }
    }
}

pub async fn require_bearer(State(gate): State<AuthGate>, request: Request, next: Next) -> Response {
    let header_value = request.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    match gate.check(header_value) {
        Ok(()) => next.run(request).await,
        Err(message) => {
            tracing::warn!(
                event_name = "api.auth_rejected",
                path = %request.uri().path(),
                reason = message,
                "rejected unauthenticated api request"
            );
            let body = ErrorBody {
                success: false,
                error: message.to_string(),
                detail: message.to_string(),
                correlation_id: crate::api::correlation_id(request.headers()),
            };
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        }
    }
}

/// Compares two byte strings without short-circuiting on the first
/// mismatching byte.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
