use refinery_store::models::{BackupDetail, BackupSummary};
use serde_json::Value;

use crate::store::RefineryStore;

use super::{ControlError, RefineryControlPlane, UserContext, require_text};

impl<S: RefineryStore> RefineryControlPlane<S> {
    /// Lists backup metadata for a conversation, newest version first.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` if the conversation is not the caller's.
    pub async fn list_backups(
        &self,
        user: &UserContext,
        conversation_id: &str,
    ) -> Result<Vec<BackupSummary>, ControlError> {
        let conversation = self.owned_conversation(user, conversation_id).await?;
        Ok(self.store.list_backups(&conversation.id).await?)
    }

    /// Fetches a backup's metadata and downloads its messages.
    ///
    /// Nothing is returned unless both the metadata and the payload load.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` for a missing or foreign backup, the
    /// store's download error, or `ControlError::InvalidBackup` if the payload
    /// is not a JSON array.
    pub async fn get_backup(
        &self,
        user: &UserContext,
        backup_id: &str,
    ) -> Result<BackupDetail, ControlError> {
        let backup_id = require_text(backup_id, "backup_id")?;
        let backup = self
            .store
            .get_backup(backup_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Backup", backup_id))?;
        self.store
            .get_conversation(user.user_id(), &backup.conversation_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Backup", backup_id))?;

        let payload = self.store.download_blob(&backup.file_path).await?;
        let messages: Vec<Value> = serde_json::from_slice(&payload)
            .map_err(|err| ControlError::InvalidBackup(err.to_string()))?;

        Ok(BackupDetail { backup, messages })
    }
}
