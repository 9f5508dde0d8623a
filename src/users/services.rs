use serde_json::json;
use tracing::{debug, error, info};

use crate::{
    auth::token,
    error::StoreError,
    mailer::USER_INVITATION_TEMPLATE,
    state::AppState,
    store::users::User,
};

use super::dto::{RegisterUserPayload, RegisteredUser};

/// Registers a pending user with an invitation, then mails the activation
/// link. The registration is committed before any mail is attempted, so a
/// delivery failure only shows up as `invitation_sent = false`.
pub async fn register_user(
    state: &AppState,
    payload: RegisterUserPayload,
) -> Result<RegisteredUser, StoreError> {
    let mut user = User::new(payload.username, payload.email);
    user.password.set(&payload.password)?;

    let issued = token::issue_token();
    state
        .store
        .users
        .create_and_invite(&mut user, &issued.raw, state.config.invitation_ttl())
        .await?;
    debug!(user_id = user.id, token_digest = %issued.digest, "invitation stored");

    let activation_url = state.config.activation_url(&issued.raw);
    let data = json!({
        "username": user.username,
        "activation_url": activation_url,
    });
    let invitation_sent = match state
        .mailer
        .send(
            USER_INVITATION_TEMPLATE,
            &user.username,
            &user.email,
            &data,
            state.mail_sandbox(),
        )
        .await
    {
        Ok(()) => {
            info!(user_id = user.id, "invitation sent");
            true
        }
        Err(e) => {
            error!(user_id = user.id, email = %user.email, error = %e, "error sending invitation email");
            false
        }
    };

    Ok(RegisteredUser {
        user,
        invitation_sent,
    })
}
