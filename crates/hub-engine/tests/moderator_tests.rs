//! Moderator permission matrix: role gating, lazy creation, wholesale writes.

mod common;

use common::{create_community, create_user, test_state};
use hub_engine::error::Error;
use hub_engine::models::{Capability, PermissionFlags, Role};

#[tokio::test]
async fn permissions_require_the_moderator_role() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "user@example.com", "User").await;

    let membership = state
        .memberships
        .create_membership(user.id, community.id, Role::Member)
        .await
        .unwrap();

    let err = state
        .moderators
        .update_permissions(membership.id, PermissionFlags::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAModerator { .. }), "got {err}");
}

#[tokio::test]
async fn moderator_without_record_has_no_capabilities() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "mod@example.com", "Mod").await;

    let membership = state
        .memberships
        .create_membership(user.id, community.id, Role::Moderator)
        .await
        .unwrap();

    let flags = state.moderators.get_permissions(membership.id).await.unwrap();
    assert!(!flags.can_add_members);
    assert!(!state
        .moderators
        .has_capability(membership.id, Capability::ApproveJoinRequests)
        .await
        .unwrap());
}

#[tokio::test]
async fn update_writes_all_eight_flags_wholesale() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "mod@example.com", "Mod").await;

    let membership = state
        .memberships
        .create_membership(user.id, community.id, Role::Moderator)
        .await
        .unwrap();

    let granted = state
        .moderators
        .update_permissions(
            membership.id,
            PermissionFlags {
                can_approve_join_requests: true,
                can_add_members: true,
                can_delete_messages: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(granted.can_approve_join_requests);
    assert!(granted.can_add_members);
    assert!(granted.can_delete_messages);
    assert!(!granted.can_remove_members);

    assert!(state
        .moderators
        .has_capability(membership.id, Capability::AddMembers)
        .await
        .unwrap());

    // A second update with a different set overwrites, it does not merge:
    // flags absent from the request become false.
    let second = state
        .moderators
        .update_permissions(
            membership.id,
            PermissionFlags {
                can_view_audit_logs: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(second.can_view_audit_logs);
    assert!(!second.can_approve_join_requests);
    assert!(!second.can_add_members);
    assert_eq!(second.membership_id, membership.id);
    // Lazily created once, then updated in place.
    assert_eq!(second.id, granted.id);
}

#[tokio::test]
async fn list_moderators_filters_by_role() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let a = create_user(&state, "mod@example.com", "Mod").await;
    let b = create_user(&state, "member@example.com", "Member").await;

    state
        .memberships
        .create_membership(a.id, community.id, Role::Moderator)
        .await
        .unwrap();
    state
        .memberships
        .create_membership(b.id, community.id, Role::Member)
        .await
        .unwrap();

    let moderators = state.moderators.list_moderators(community.id).await.unwrap();
    assert_eq!(moderators.len(), 1);
    assert_eq!(moderators[0].email, "mod@example.com");
}
