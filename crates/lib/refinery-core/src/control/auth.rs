use chrono::Utc;
use tracing::{info, warn};

use crate::store::RefineryStore;

use super::{ControlError, RefineryControlPlane};

/// Identity of the authenticated caller, passed to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl<S: RefineryStore> RefineryControlPlane<S> {
    /// Exchanges an API key for the owning user's context.
    ///
    /// A successful lookup also stamps the key's `last_used_at`; failing to
    /// record that is logged and does not fail authentication.
    ///
    /// # Errors
    /// Returns `ControlError::Unauthenticated` if the key is blank or unknown,
    /// or `ControlError::Store` if the lookup itself fails.
    pub async fn authenticate(&self, api_key: &str) -> Result<UserContext, ControlError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ControlError::Unauthenticated);
        }

        let Some(user_id) = self.store.find_api_key_owner(api_key).await? else {
            return Err(ControlError::Unauthenticated);
        };

        if let Err(err) = self.store.touch_api_key(api_key, Utc::now()).await {
            warn!("failed to record API key usage: {err}");
        }

        info!("authenticated as user: {user_id}");
        Ok(UserContext::new(user_id))
    }
}
