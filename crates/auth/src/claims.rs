//! Verification of session tokens minted by the identity provider.

use carpool_config::SessionClaimsConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::IdentityProfile;

/// Claims carried by an identity-provider session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl From<SessionClaims> for IdentityProfile {
    fn from(claims: SessionClaims) -> Self {
        IdentityProfile {
            subject: claims.sub,
            email: claims.email,
            first_name: claims.given_name,
            last_name: claims.family_name,
            display_name: claims.name,
            avatar_url: claims.picture,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ClaimsVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl ClaimsVerifier {
    pub(crate) fn from_config(config: &SessionClaimsConfig) -> Option<Self> {
        let secret = config.jwt_secret.as_deref().filter(|s| !s.is_empty())?;

        let mut validation = Validation::new(Algorithm::HS256);
        match config.issuer.as_deref() {
            Some(issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match config.audience.as_deref() {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Some(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub(crate) fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}
