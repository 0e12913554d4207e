use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::db::types::{AccountStatus, UserRole};
use crate::repositories;
use crate::repositories::users::ProfileColumns;
use crate::services::accounts::normalize_email;

/// Create or repair the configured first admin account.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let email = normalize_email(&admin.first_admin_email);
    let now = state.now();

    if let Some(user) = repositories::users::find_by_email(state.db(), &email).await? {
        let verified = security::verify_password(&admin.first_admin_password, &user.hashed_password)
            .unwrap_or(false);
        let needs_update =
            !verified || user.role != UserRole::Admin || user.status != AccountStatus::Active;

        if !needs_update {
            tracing::info!("Default admin already up to date");
            return Ok(());
        }

        let hashed_password = if verified {
            None
        } else {
            Some(security::hash_password(&admin.first_admin_password)?)
        };

        repositories::users::update(
            state.db(),
            &user.id,
            repositories::users::UpdateUser {
                name: user.name,
                email: user.email,
                role: UserRole::Admin,
                status: AccountStatus::Active,
                profile: ProfileColumns::default(),
                hashed_password,
                updated_at: now,
            },
        )
        .await?;

        tracing::info!(email = %email, "Updated default admin");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            name: &admin.first_admin_name,
            email: &email,
            hashed_password,
            role: UserRole::Admin,
            status: AccountStatus::Active,
            profile: ProfileColumns::default(),
            created_at: now,
        },
    )
    .await?;

    tracing::info!(email = %email, "Created default admin");
    Ok(())
}
