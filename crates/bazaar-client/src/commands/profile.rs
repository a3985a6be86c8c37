use tracing::info;

use bazaar_shared::query::Filter;
use bazaar_shared::{ProfilePatch, Table, UserProfile};

use crate::commands::auth::fetch_profile;
use crate::error::{ClientError, Result};
use crate::remote::tables;
use crate::state::AppState;
use crate::sync::Durability;

/// The cached profile, without touching the network.
pub async fn cached_profile(state: &AppState) -> Option<UserProfile> {
    state.profile.lock().await.profile().cloned()
}

/// Re-read the signed-in user's `profiles` row into the cache.
pub async fn refresh_profile(state: &AppState) -> Result<Option<UserProfile>> {
    let id = state.current_user_id().await?;
    let profile = fetch_profile(state, &id).await?;
    if let Some(p) = &profile {
        state.profile.lock().await.save(p.clone());
    }
    Ok(profile)
}

/// Save edits to the remote row, then cache the stored result.
pub async fn update_profile(state: &AppState, patch: &ProfilePatch) -> Result<UserProfile> {
    let id = state.current_user_id().await?;
    let missing = || ClientError::UnexpectedResponse(format!("no profile row for {id}"));

    if patch.is_empty() {
        return refresh_profile(state).await?.ok_or_else(missing);
    }

    let rows: Vec<UserProfile> = tables::update_as(
        state.backend.as_ref(),
        Table::Profiles,
        &[Filter::eq("id", id.as_str())],
        patch,
    )
    .await?;
    let profile = rows.into_iter().next().ok_or_else(missing)?;

    state.profile.lock().await.save(profile.clone());
    info!(user_id = %id, "profile updated");
    Ok(profile)
}

/// Remember the locally picked avatar.
pub async fn set_avatar(state: &AppState, uri: &str) -> Durability {
    state.profile.lock().await.set_avatar(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::commands::auth::sign_up;
    use crate::config::ClientConfig;
    use crate::remote::{Backend, MemoryBackend};
    use bazaar_shared::validation::SignupForm;
    use bazaar_store::MemoryStore;

    async fn signed_in_state() -> (AppState, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let state = AppState::new(
            ClientConfig::default(),
            backend.clone(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let form = SignupForm {
            first_name: "Ada".into(),
            last_name: "L".into(),
            email: "ada@example.com".into(),
            password: "pw".into(),
        };
        sign_up(&state, &form).await.unwrap();
        backend.sign_in("ada@example.com", "pw").await.unwrap();
        (state, backend)
    }

    #[tokio::test]
    async fn update_writes_remote_then_cache() {
        let (state, backend) = signed_in_state().await;
        let patch = ProfilePatch {
            city: Some("Bhubaneswar".into()),
            phone: Some("12345".into()),
            ..Default::default()
        };

        let updated = update_profile(&state, &patch).await.unwrap();
        assert_eq!(updated.city.as_deref(), Some("Bhubaneswar"));
        assert_eq!(backend.rows(Table::Profiles)[0]["phone"], "12345");
        assert_eq!(
            cached_profile(&state).await.and_then(|p| p.city),
            Some("Bhubaneswar".to_string())
        );
    }

    #[tokio::test]
    async fn failed_remote_update_leaves_cache_alone() {
        let (state, backend) = signed_in_state().await;
        backend.set_fail_writes(true);

        let patch = ProfilePatch {
            first_name: Some("Grace".into()),
            ..Default::default()
        };
        assert!(update_profile(&state, &patch).await.is_err());
        assert_eq!(cached_profile(&state).await.unwrap().first_name, "Ada");
    }

    #[tokio::test]
    async fn empty_patch_refreshes() {
        let (state, _backend) = signed_in_state().await;
        let profile = update_profile(&state, &ProfilePatch::default()).await.unwrap();
        assert_eq!(profile.first_name, "Ada");
        assert!(set_avatar(&state, "file:///me.png").await.is_persisted());
        assert_eq!(
            state.profile.lock().await.avatar(),
            Some("file:///me.png")
        );
    }
}
