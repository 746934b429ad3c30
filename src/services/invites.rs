use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{user::validate_email, GroupMember, Invite, Role},
    services::groups::require_member,
    store::Store,
};

/// Invites `email` to a group the caller belongs to
pub async fn create_invite(
    store: &dyn Store,
    group_id: Uuid,
    sender_id: Uuid,
    email: &str,
) -> AppResult<Invite> {
    require_member(store, group_id, sender_id).await?;
    let email = validate_email(email)?;

    if let Some(invitee) = store.get_user_by_email(&email).await? {
        if store.get_member(group_id, invitee.id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "{} is already a member of this group",
                email
            )));
        }
    }

    let invite = store
        .create_invite(Invite::new(email, group_id, sender_id))
        .await?;
    tracing::info!(invite_id = %invite.id, group_id = %group_id, sent_by = %sender_id, "Invite sent");
    Ok(invite)
}

/// Pending invites addressed to the caller's email
pub async fn list_pending(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<Invite>> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    store.list_pending_invites(&user.email).await
}

async fn load_own_invite(store: &dyn Store, invite_id: Uuid, user_id: Uuid) -> AppResult<Invite> {
    let invite = store
        .get_invite(invite_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invite {} not found", invite_id)))?;
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    if invite.email != user.email {
        return Err(AppError::Forbidden(
            "This invite was sent to another address".to_string(),
        ));
    }
    Ok(invite)
}

/// Joins the group as a regular member and consumes the invite
pub async fn accept_invite(store: &dyn Store, invite_id: Uuid, user_id: Uuid) -> AppResult<Uuid> {
    let invite = load_own_invite(store, invite_id, user_id).await?;

    match store
        .add_member(GroupMember::new(invite.group_id, user_id, Role::Member))
        .await
    {
        Ok(()) | Err(AppError::Conflict(_)) => {}
        Err(e) => return Err(e),
    }
    store.delete_invite(invite.id).await?;

    tracing::info!(invite_id = %invite.id, group_id = %invite.group_id, user_id = %user_id, "Invite accepted");
    Ok(invite.group_id)
}

pub async fn decline_invite(store: &dyn Store, invite_id: Uuid, user_id: Uuid) -> AppResult<()> {
    let invite = load_own_invite(store, invite_id, user_id).await?;
    store.delete_invite(invite.id).await?;
    tracing::info!(invite_id = %invite.id, user_id = %user_id, "Invite declined");
    Ok(())
}
