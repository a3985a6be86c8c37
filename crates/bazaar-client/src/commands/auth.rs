use serde::Serialize;
use tracing::{info, warn};

use bazaar_shared::query::Query;
use bazaar_shared::validation::{LoginForm, SignupForm};
use bazaar_shared::{Session, Table, UserId, UserProfile};

use crate::error::Result;
use crate::remote::tables;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub session: Session,
    /// The user's `profiles` row; `None` if it does not exist.
    pub profile: Option<UserProfile>,
}

/// Register a new account and create its `profiles` row.
pub async fn sign_up(state: &AppState, form: &SignupForm) -> Result<UserProfile> {
    form.validate(state.config.signup_email_domain.as_deref())?;

    let email = form.email.trim();
    let user = state.backend.sign_up(email, &form.password).await?;

    let row = UserProfile {
        id: user.id.clone(),
        email: email.to_string(),
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        ..Default::default()
    };
    let profile: UserProfile =
        tables::insert_one(state.backend.as_ref(), Table::Profiles, &row).await?;

    state.profile.lock().await.save(profile.clone());
    info!(user_id = %profile.id, "account created");
    Ok(profile)
}

/// Sign in and cache the user's profile row.
pub async fn sign_in(state: &AppState, form: &LoginForm) -> Result<SignedIn> {
    form.validate()?;

    let session = state
        .backend
        .sign_in(form.email.trim(), &form.password)
        .await?;
    let profile = fetch_profile(state, &session.user.id).await?;

    let mut cache = state.profile.lock().await;
    match &profile {
        Some(p) => {
            cache.save(p.clone());
        }
        None => {
            warn!(user_id = %session.user.id, "signed in without a profile row");
            cache.clear();
        }
    }

    Ok(SignedIn { session, profile })
}

/// Sign out and forget the cached profile, even if the backend call fails.
pub async fn sign_out(state: &AppState) -> Result<()> {
    let result = state.backend.sign_out().await;
    state.profile.lock().await.clear();
    result
}

/// The `profiles` row for `id`.
pub async fn fetch_profile(state: &AppState, id: &UserId) -> Result<Option<UserProfile>> {
    let query = Query::table(Table::Profiles).eq("id", id.as_str()).limit(1);
    let rows: Vec<UserProfile> = tables::select_as(state.backend.as_ref(), &query).await?;
    Ok(rows.into_iter().next())
}
