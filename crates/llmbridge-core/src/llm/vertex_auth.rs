//! Bearer tokens for Vertex AI
//!
//! Sources, in order of precedence: `GOOGLE_ACCESS_TOKEN` as given,
//! tokens minted from `MODEL_SERVICE_ACCOUNT_JSON`, then Application
//! Default Credentials.

use crate::config::{non_empty, BridgeConfig};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies a bearer token per request
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Short label for logs
    fn kind(&self) -> &'static str;
}

/// Pick the token source the configuration asks for
pub fn token_source_from_config(config: &BridgeConfig) -> Result<Arc<dyn AccessTokenSource>> {
    if let Some(token) = non_empty(config.google_access_token.as_deref()) {
        return Ok(Arc::new(StaticToken::new(token)));
    }
    if let Some(key) = config
        .model_service_account_json
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Ok(Arc::new(ServiceAccountTokens::from_config_value(key)?));
    }
    Ok(Arc::new(AdcTokens::default()))
}

/// A pre-issued token, used verbatim
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn kind(&self) -> &'static str {
        "access token"
    }
}

/// Tokens minted from a service account key; `gcp_auth` caches them until expiry
pub struct ServiceAccountTokens {
    account: CustomServiceAccount,
}

impl ServiceAccountTokens {
    /// Accepts the key JSON itself or a path to the key file
    pub fn from_config_value(value: &str) -> Result<Self> {
        let parsed = if value.starts_with('{') {
            CustomServiceAccount::from_json(value)
        } else {
            CustomServiceAccount::from_file(value)
        };

        let account = parsed.map_err(|e| {
            BridgeError::Config(format!("Failed to parse MODEL_SERVICE_ACCOUNT_JSON: {}", e))
        })?;
        Ok(Self { account })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .account
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| token_error(self.kind(), e))?;
        Ok(token.as_str().to_string())
    }

    fn kind(&self) -> &'static str {
        "service account"
    }
}

/// Application Default Credentials, discovered on first use.
///
/// Discovery failures are not cached; the next request tries again.
#[derive(Default)]
pub struct AdcTokens {
    provider: OnceCell<Arc<dyn TokenProvider>>,
}

#[async_trait]
impl AccessTokenSource for AdcTokens {
    async fn access_token(&self) -> Result<String> {
        let provider = self
            .provider
            .get_or_try_init(|| async {
                let provider = gcp_auth::provider()
                    .await
                    .map_err(|e| token_error(self.kind(), e))?;
                tracing::debug!("Vertex AI credentials discovered via ADC");
                Ok::<_, BridgeError>(provider)
            })
            .await?;

        let token = provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| token_error(self.kind(), e))?;
        Ok(token.as_str().to_string())
    }

    fn kind(&self) -> &'static str {
        "application default credentials"
    }
}

fn token_error(kind: &str, e: gcp_auth::Error) -> BridgeError {
    BridgeError::Provider(format!(
        "Failed to obtain Vertex AI access token ({}): {}",
        kind, e
    ))
}
