//! Community lifecycle: creation with the atomic admin grant, updates,
//! the ordered cascade delete, and the activity ledger.

mod common;

use common::{create_community, create_user, test_state};
use hub_engine::error::Error;
use hub_engine::models::{Role, UpdateCommunity};
use hub_engine::services::activity::kind;

#[tokio::test]
async fn creator_becomes_administrator_atomically() {
    let state = test_state().await;
    let creator = create_user(&state, "founder@example.com", "Founder").await;

    let community = create_community(&state, &creator, "rustaceans", false).await;
    assert!(!community.join_code.is_empty());
    assert!(community.is_active);

    assert!(state
        .memberships
        .is_administrator(creator.id, community.id)
        .await
        .unwrap());
    assert_eq!(
        state.memberships.count_active_administrators(community.id).await.unwrap(),
        1
    );

    let activities = state.activities.query(community.id, None, 10).await.unwrap();
    assert!(activities
        .iter()
        .any(|a| a.activity_type == kind::COMMUNITY_CREATED));
}

#[tokio::test]
async fn update_patches_only_supplied_fields() {
    let state = test_state().await;
    let creator = create_user(&state, "founder@example.com", "Founder").await;
    let community = create_community(&state, &creator, "rustaceans", false).await;

    let updated = state
        .communities
        .update(
            community.id,
            UpdateCommunity {
                description: Some("all things crustacean".to_string()),
                is_private: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "rustaceans");
    assert_eq!(updated.description.as_deref(), Some("all things crustacean"));
    assert!(updated.is_private);
}

#[tokio::test]
async fn lookup_by_join_code() {
    let state = test_state().await;
    let creator = create_user(&state, "founder@example.com", "Founder").await;
    let community = create_community(&state, &creator, "rustaceans", false).await;

    let found = state
        .communities
        .get_by_join_code(&community.join_code)
        .await
        .unwrap();
    assert_eq!(found.id, community.id);

    let err = state.communities.get_by_join_code("zzzzzzzz").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err}");

    let mine = state.communities.list_for_user(creator.id).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn delete_cascades_to_every_dependent_record() {
    let state = test_state().await;
    let creator = create_user(&state, "founder@example.com", "Founder").await;
    let community = create_community(&state, &creator, "rustaceans", true).await;
    let applicant = create_user(&state, "user@example.com", "User").await;
    let moderator = create_user(&state, "mod@example.com", "Mod").await;

    // Populate every dependent table.
    let mod_membership = state
        .memberships
        .create_membership(moderator.id, community.id, Role::Moderator)
        .await
        .unwrap();
    state
        .moderators
        .update_permissions(
            mod_membership.id,
            hub_engine::models::PermissionFlags {
                can_add_members: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    state
        .join_requests
        .submit(applicant.id, community.id, None)
        .await
        .unwrap();
    state
        .invites
        .create_invite(community.id, "new@example.com", creator.id, Role::Member)
        .await
        .unwrap();

    state.communities.delete(community.id).await.unwrap();

    let err = state.communities.get(community.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err}");

    assert_eq!(state.memberships.member_count(community.id, false).await.unwrap(), 0);
    assert_eq!(state.join_requests.pending_count(community.id).await.unwrap(), 0);
    assert!(state.invites.list_for_community(community.id).await.unwrap().is_empty());
    assert!(state.activities.query(community.id, None, 100).await.unwrap().is_empty());

    let orphaned_permissions = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM moderator_permissions WHERE membership_id = ?",
    )
    .bind(mod_membership.id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(orphaned_permissions, 0);
}

#[tokio::test]
async fn ledger_is_newest_first_and_filterable() {
    let state = test_state().await;
    let creator = create_user(&state, "founder@example.com", "Founder").await;
    let community = create_community(&state, &creator, "rustaceans", false).await;
    let user = create_user(&state, "user@example.com", "User").await;

    let membership = state
        .memberships
        .create_membership(user.id, community.id, Role::Member)
        .await
        .unwrap();
    state
        .memberships
        .change_role(membership.id, Role::Moderator)
        .await
        .unwrap();

    let all = state.activities.query(community.id, None, 100).await.unwrap();
    assert!(all.len() >= 3);
    for pair in all.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    let user_only = state
        .activities
        .query(community.id, Some(user.id), 100)
        .await
        .unwrap();
    assert_eq!(user_only.len(), 2);
    assert_eq!(user_only[0].activity_type, kind::ROLE_CHANGED);
    assert_eq!(user_only[1].activity_type, kind::MEMBER_ADDED);
}
