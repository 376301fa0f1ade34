/// Stateless session tokens
///
/// HS256 JWTs carrying the account id, issue time and absolute expiry.
/// The signing key is loaded once at startup; there is no server-side
/// revocation list, so a token stays valid until `exp` passes.
use crate::error::{BlogError, BlogResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "jwt";

/// Display fields optionally denormalized into the token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Claims embedded in every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: ExtraClaims,
}

impl Claims {
    /// Account id carried in `sub`
    pub fn subject_id(&self) -> BlogResult<i64> {
        self.sub
            .parse()
            .map_err(|_| BlogError::Unauthenticated("Authentication token is not valid".to_string()))
    }
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a token for `subject_id`, valid for the configured TTL
    pub fn issue(&self, subject_id: i64, extra: ExtraClaims) -> BlogResult<String> {
        self.issue_at(subject_id, extra, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn issue_at(
        &self,
        subject_id: i64,
        extra: ExtraClaims,
        issued_at: DateTime<Utc>,
    ) -> BlogResult<String> {
        let claims = Claims {
            sub: subject_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
            extra,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| BlogError::Jwt(format!("Failed to generate token: {}", e)))
    }

    /// Validate signature and expiry, returning the embedded claims
    pub fn validate(&self, token: &str) -> BlogResult<Claims> {
        if token.is_empty() {
            return Err(BlogError::Unauthenticated("User is not authorized".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("session token rejected: {:?}", e.kind());
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    BlogError::Unauthenticated("Authentication token has expired".to_string())
                }
                ErrorKind::InvalidSignature => {
                    BlogError::Unauthenticated("Authentication token is not valid".to_string())
                }
                _ => BlogError::Unauthenticated("Cannot read authentication token".to_string()),
            }
        })?;

        // jsonwebtoken treats exp == now as still valid; the window is half-open
        if Utc::now().timestamp() >= data.claims.exp {
            return Err(BlogError::Unauthenticated(
                "Authentication token has expired".to_string(),
            ));
        }

        Ok(data.claims)
    }
}
