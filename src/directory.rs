//! User Directory collaborator interface
//!
//! Authentication itself lives outside this core: the HTTP layer hands a
//! bearer token to the directory and trusts the resolved user id from then
//! on. The directory is also where per-user preference flags come from;
//! the core reads them to localize phrasing and never writes them back.

use crate::config::DirectoryConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only per-user preference flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// BCP-47 locale tag used for reply phrasing
    pub locale: String,
    /// Optional IANA time zone for rendering due dates
    pub time_zone: Option<String>,
}

impl UserPreferences {
    /// Preferences with the given locale and no time zone
    pub fn with_locale(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            time_zone: None,
        }
    }
}

/// External User Directory collaborator
///
/// `resolve_token` returning `Ok(None)` means the credentials are invalid
/// (a 401 upstream); `Err` is reserved for directory outages.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a bearer token to a user id
    async fn resolve_token(&self, token: &str) -> Result<Option<String>>;

    /// Fetch the user's preference flags
    async fn preferences(&self, user_id: &str) -> Result<UserPreferences>;
}

/// Directory backed by the static token table in the configuration
///
/// Reference implementation for development and tests; a deployment
/// substitutes its identity provider behind the same trait.
pub struct StaticDirectory {
    tokens: HashMap<String, String>,
    default_locale: String,
}

impl StaticDirectory {
    /// Build from the directory section of the configuration
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            tokens: config.tokens.clone(),
            default_locale: config.default_locale.clone(),
        }
    }

    /// Build from an explicit token table (test convenience)
    pub fn with_tokens(tokens: HashMap<String, String>, default_locale: impl Into<String>) -> Self {
        Self {
            tokens,
            default_locale: default_locale.into(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn resolve_token(&self, token: &str) -> Result<Option<String>> {
        Ok(self.tokens.get(token).cloned())
    }

    async fn preferences(&self, _user_id: &str) -> Result<UserPreferences> {
        Ok(UserPreferences::with_locale(self.default_locale.clone()))
    }
}
