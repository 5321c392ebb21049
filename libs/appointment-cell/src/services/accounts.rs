// libs/appointment-cell/src/services/accounts.rs
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_models::auth::{Role, User};

use crate::models::{AccountRemoval, AppointmentError};
use crate::store::AppointmentStore;

/// Administrator-only removal of an account together with every
/// appointment and schedule that references it.
pub struct AccountRemovalService {
    store: Arc<dyn AppointmentStore>,
}

impl AccountRemovalService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn remove_account(
        &self,
        actor: &User,
        account_id: Uuid,
    ) -> Result<AccountRemoval, AppointmentError> {
        if !actor.is_admin() {
            return Err(AppointmentError::Forbidden(
                "Only administrators can remove accounts".to_string(),
            ));
        }

        if actor.id == account_id {
            return Err(AppointmentError::Validation(
                "Administrators cannot remove their own account".to_string(),
            ));
        }

        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Account not found".to_string()))?;

        if account.role == Role::Admin {
            warn!("Admin {} attempted to remove admin {}", actor.id, account_id);
            return Err(AppointmentError::Forbidden(
                "Administrator accounts cannot be removed".to_string(),
            ));
        }

        // A concurrent removal can still win between the read and the cascade.
        let removed_appointments = self
            .store
            .delete_account(account_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Account not found".to_string()))?;

        info!(
            "Account {} ({}) removed by {} with {} appointments",
            account_id, account.role, actor.id, removed_appointments
        );

        Ok(AccountRemoval {
            account_id,
            removed_appointments,
        })
    }
}
