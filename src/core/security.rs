use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;
use crate::db::models::Candidate;
use crate::db::types::Role;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Identity claims issued by the external login service.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) name: String,
    pub(crate) role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) roll_no: Option<String>,
    pub(crate) exp: i64,
}

impl Claims {
    pub(crate) fn into_candidate(self) -> Candidate {
        Candidate {
            id: self.sub,
            name: self.name,
            role: self.role,
            roll_no: self.roll_no.filter(|value| !value.trim().is_empty()),
        }
    }
}

#[cfg_attr(not(test), allow(dead_code))]
pub(crate) fn create_access_token(
    candidate: &Candidate,
    settings: &Settings,
    expires_in: Duration,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let claims = Claims {
        sub: candidate.id.clone(),
        name: candidate.name.clone(),
        role: candidate.role,
        roll_no: candidate.roll_no.clone(),
        exp: (OffsetDateTime::now_utc() + expires_in).unix_timestamp(),
    };

    encode(
        &jsonwebtoken::Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn token_round_trip_preserves_identity() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let candidate = Candidate {
            id: "student-1".to_string(),
            name: "Asha".to_string(),
            role: Role::Student,
            roll_no: Some("R-17".to_string()),
        };
        let token =
            create_access_token(&candidate, &settings, Duration::minutes(5)).expect("token");
        let decoded = verify_token(&token, &settings).expect("claims").into_candidate();

        assert_eq!(decoded, candidate);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let candidate = Candidate {
            id: "student-1".to_string(),
            name: "Asha".to_string(),
            role: Role::Student,
            roll_no: None,
        };
        let token =
            create_access_token(&candidate, &settings, Duration::minutes(-10)).expect("token");

        assert!(matches!(verify_token(&token, &settings), Err(SecurityError::JwtDecoding)));
    }

    #[test]
    fn blank_roll_number_becomes_none() {
        let claims = Claims {
            sub: "s".to_string(),
            name: "n".to_string(),
            role: Role::Student,
            roll_no: Some("  ".to_string()),
            exp: 0,
        };
        assert_eq!(claims.into_candidate().roll_no, None);
    }
}
