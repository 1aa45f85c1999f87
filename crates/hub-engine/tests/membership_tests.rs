//! Membership authority: predicates, duplicate prevention, role changes and
//! the last-administrator rule.

mod common;

use common::{create_community, create_user, test_state};
use hub_engine::error::Error;
use hub_engine::models::Role;
use hub_engine::services::activity::kind;

#[tokio::test]
async fn create_membership_makes_user_a_member() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "user@example.com", "User").await;

    assert!(!state.memberships.is_member(user.id, community.id).await.unwrap());

    let membership = state
        .memberships
        .create_membership(user.id, community.id, Role::Member)
        .await
        .unwrap();
    assert_eq!(membership.role, Role::Member);
    assert!(membership.is_active);

    assert!(state.memberships.is_member(user.id, community.id).await.unwrap());
    assert!(!state.memberships.is_administrator(user.id, community.id).await.unwrap());
}

#[tokio::test]
async fn duplicate_membership_is_rejected() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "user@example.com", "User").await;

    state
        .memberships
        .create_membership(user.id, community.id, Role::Member)
        .await
        .unwrap();

    let err = state
        .memberships
        .create_membership(user.id, community.id, Role::Moderator)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateMembership { .. }), "got {err}");

    // Exactly one row survived the duplicate attempt.
    assert_eq!(state.memberships.member_count(community.id, false).await.unwrap(), 2);
}

#[tokio::test]
async fn last_administrator_cannot_be_removed() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;

    let membership = state
        .memberships
        .get_by_user_and_community(admin.id, community.id)
        .await
        .unwrap()
        .expect("creator membership");
    assert_eq!(membership.role, Role::Administrator);

    let err = state
        .memberships
        .remove_membership(membership.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LastAdministrator { .. }), "got {err}");

    // Membership untouched.
    assert!(state.memberships.is_administrator(admin.id, community.id).await.unwrap());
}

#[tokio::test]
async fn administrator_can_leave_once_another_exists() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let second = create_user(&state, "second@example.com", "Second").await;

    state
        .memberships
        .create_membership(second.id, community.id, Role::Administrator)
        .await
        .unwrap();
    assert_eq!(
        state.memberships.count_active_administrators(community.id).await.unwrap(),
        2
    );

    let membership = state
        .memberships
        .get_by_user_and_community(admin.id, community.id)
        .await
        .unwrap()
        .unwrap();
    state.memberships.remove_membership(membership.id).await.unwrap();

    assert!(!state.memberships.is_member(admin.id, community.id).await.unwrap());
    assert_eq!(
        state.memberships.count_active_administrators(community.id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn change_role_records_transition() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "user@example.com", "User").await;

    let membership = state
        .memberships
        .create_membership(user.id, community.id, Role::Member)
        .await
        .unwrap();

    let updated = state
        .memberships
        .change_role(membership.id, Role::Moderator)
        .await
        .unwrap();
    assert_eq!(updated.role, Role::Moderator);
    assert!(state.memberships.is_moderator(user.id, community.id).await.unwrap());
    assert!(state.memberships.is_admin_or_moderator(user.id, community.id).await.unwrap());

    let activities = state.activities.query(community.id, Some(user.id), 10).await.unwrap();
    assert!(activities.iter().any(|a| a.activity_type == kind::ROLE_CHANGED));
}

#[tokio::test]
async fn member_count_honours_active_filter() {
    let state = test_state().await;
    let admin = create_user(&state, "admin@example.com", "Admin").await;
    let community = create_community(&state, &admin, "rustaceans", false).await;
    let user = create_user(&state, "user@example.com", "User").await;

    state
        .memberships
        .create_membership(user.id, community.id, Role::Member)
        .await
        .unwrap();

    assert_eq!(state.memberships.member_count(community.id, true).await.unwrap(), 2);
    assert_eq!(state.memberships.member_count(community.id, false).await.unwrap(), 2);

    let members = state.memberships.list_members(community.id).await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.email == "admin@example.com"));
}
