use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub use crate::models::LeaveOutcome;

use crate::{
    error::{AppError, AppResult},
    models::{
        group::validate_group_name, Group, GroupMember, MovieList, Role, SortPreference,
    },
    store::Store,
};

/// Loads a group and the caller's membership in it
///
/// `NotFound` when the group does not exist, `Forbidden` when the caller is
/// not a member.
pub async fn require_member(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
) -> AppResult<(Group, GroupMember)> {
    let group = store
        .get_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))?;
    let member = store
        .get_member(group_id, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Not a member of this group".to_string()))?;
    Ok((group, member))
}

/// Creates a group with its movie list and the creator as admin
pub async fn create_group(store: &dyn Store, user_id: Uuid, name: &str) -> AppResult<Group> {
    let group = Group::new(name, user_id)?;
    let list = MovieList::new(group.movie_list_id, group.id);
    let admin = GroupMember::new(group.id, user_id, Role::Admin);

    let group = store.create_group(group, list, admin).await?;
    tracing::info!(group_id = %group.id, created_by = %user_id, "Group created");
    Ok(group)
}

pub async fn get_group(store: &dyn Store, group_id: Uuid, user_id: Uuid) -> AppResult<Group> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    Ok(group)
}

pub async fn list_for_user(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<Group>> {
    store.list_groups_for_user(user_id).await
}

/// Fields a member may change; `None` leaves the value as is
#[derive(Debug, Default, Clone)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub sort_by: Option<SortPreference>,
    pub fairness_filter: Option<bool>,
}

pub async fn update_group(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    update: GroupUpdate,
) -> AppResult<Group> {
    let (mut group, _) = require_member(store, group_id, user_id).await?;

    if let Some(name) = update.name {
        group.name = validate_group_name(&name)?;
    }
    if let Some(picture) = update.profile_picture {
        let picture = picture.trim().to_string();
        group.profile_picture = (!picture.is_empty()).then_some(picture);
    }
    if let Some(sort_by) = update.sort_by {
        group.sort_by = sort_by;
    }
    if let Some(fairness) = update.fairness_filter {
        group.fairness_filter = fairness;
    }
    group.updated_at = Utc::now();
    group.last_updated_by = Some(user_id);

    let group = store.update_group(group).await?;
    tracing::info!(group_id = %group_id, updated_by = %user_id, "Group updated");
    Ok(group)
}

/// Deletes the group and everything hanging off it; admins only
pub async fn delete_group(store: &dyn Store, group_id: Uuid, user_id: Uuid) -> AppResult<()> {
    let (_, member) = require_member(store, group_id, user_id).await?;
    if !member.is_admin() {
        return Err(AppError::Forbidden(
            "Only an admin can delete the group".to_string(),
        ));
    }
    store.delete_group(group_id).await?;
    tracing::info!(group_id = %group_id, deleted_by = %user_id, "Group deleted");
    Ok(())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemberView {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub joined_at: chrono::DateTime<Utc>,
}

/// Members in join order, with their display names
pub async fn list_members(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
) -> AppResult<Vec<MemberView>> {
    require_member(store, group_id, user_id).await?;
    let members = store.list_members(group_id).await?;
    let ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
    let usernames: HashMap<Uuid, String> = store
        .get_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(members
        .into_iter()
        .map(|m| MemberView {
            username: usernames
                .get(&m.user_id)
                .cloned()
                .unwrap_or_else(|| crate::services::watchlist::UNKNOWN_USERNAME.to_string()),
            user_id: m.user_id,
            role: m.role,
            joined_at: m.joined_at,
        })
        .collect())
}

/// Removes the caller from the group
///
/// The last admin cannot leave while anyone else remains. The last member
/// leaving deletes the group. The store decides both under one lock.
pub async fn leave_group(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
) -> AppResult<LeaveOutcome> {
    require_member(store, group_id, user_id).await?;

    let outcome = store.leave_group(group_id, user_id).await?;
    match outcome {
        LeaveOutcome::GroupDeleted => {
            tracing::info!(group_id = %group_id, user_id = %user_id, "Last member left, group deleted")
        }
        LeaveOutcome::Left => {
            tracing::info!(group_id = %group_id, user_id = %user_id, "Member left group")
        }
    }
    Ok(outcome)
}
