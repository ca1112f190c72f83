//! Google authentication.
//!
//! OAuth2 authorization-code flow with tokens and client credentials in
//! the OS keyring. Credentials are stateless between calls; everything is
//! looked up by key.

pub mod oauth;

use crate::error::OAuthError;
use oauth::{OAuthConfig, OAuthTokens};

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    use crate::error::OAuthError;

    const SERVICE: &str = "planmatrix";

    pub fn get(key: &str) -> Result<Option<String>, OAuthError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), OAuthError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<(), OAuthError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

const SERVICE_NAME: &str = "google";

/// Google OAuth client. Loads its client credentials from the keyring.
pub struct GoogleAuth {
    client_id: String,
    client_secret: String,
}

impl GoogleAuth {
    /// Load credentials from keyring. Fields stay empty if not stored yet.
    pub fn new() -> Self {
        let client_id = keyring_store::get("google_client_id")
            .ok()
            .flatten()
            .unwrap_or_default();
        let client_secret = keyring_store::get("google_client_secret")
            .ok()
            .flatten()
            .unwrap_or_default();
        Self {
            client_id,
            client_secret,
        }
    }

    /// Persist Google OAuth client credentials to the OS keyring.
    pub fn set_credentials(client_id: &str, client_secret: &str) -> Result<(), OAuthError> {
        keyring_store::set("google_client_id", client_id)?;
        keyring_store::set("google_client_secret", client_secret)?;
        Ok(())
    }

    fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            service_name: SERVICE_NAME.to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
            redirect_port: 19824,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        oauth::load_tokens(SERVICE_NAME).is_some()
    }

    /// Start the browser flow and store the resulting tokens.
    pub fn authenticate(&self) -> Result<(), OAuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(OAuthError::CredentialsNotConfigured {
                service: SERVICE_NAME.to_string(),
            });
        }
        let config = self.oauth_config();
        tokio::runtime::Handle::current().block_on(oauth::authorize(&config))?;
        Ok(())
    }

    /// Return a valid access token, refreshing if expired.
    pub fn access_token(&self) -> Result<String, OAuthError> {
        let tokens: OAuthTokens =
            oauth::load_tokens(SERVICE_NAME).ok_or(OAuthError::NotAuthenticated {
                service: SERVICE_NAME.to_string(),
            })?;

        if !oauth::is_expired(&tokens) {
            return Ok(tokens.access_token);
        }

        let refresh = tokens
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::TokenExpired)?;

        let config = self.oauth_config();
        let refreshed =
            tokio::runtime::Handle::current().block_on(oauth::refresh_token(&config, refresh))?;
        Ok(refreshed.access_token)
    }

    /// Remove stored tokens.
    pub fn disconnect(&self) -> Result<(), OAuthError> {
        keyring_store::delete(SERVICE_NAME)
    }
}

impl Default for GoogleAuth {
    fn default() -> Self {
        Self::new()
    }
}
