//! Membership service against an in-memory SQLite store

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use teamtodo_core::{ErrorKind, JoinStatus, MembershipService, ServiceError};
use teamtodo_db::entities::{team, team_member, user, user_profile};
use uuid::Uuid;

async fn setup() -> (DatabaseConnection, MembershipService) {
    let db = teamtodo_db::connect("sqlite::memory:")
        .await
        .expect("Failed to connect");
    teamtodo_db::migrate(&db).await.expect("Failed to migrate");
    let service = MembershipService::new(db.clone());
    (db, service)
}

async fn insert_user(db: &DatabaseConnection, email: &str) -> Uuid {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("unused".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
    .id
}

async fn set_profile(db: &DatabaseConnection, user_id: Uuid, username: Option<&str>, display: &str) {
    user_profile::ActiveModel {
        user_id: Set(user_id),
        username: Set(username.map(str::to_string)),
        display_name: Set(Some(display.to_string())),
        avatar_url: Set(None),
        bio: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert profile");
}

async fn membership_count(db: &DatabaseConnection, team_id: Uuid, user_id: Uuid) -> u64 {
    team_member::Entity::find()
        .filter(team_member::Column::TeamId.eq(team_id))
        .filter(team_member::Column::UserId.eq(user_id))
        .count(db)
        .await
        .expect("Failed to count")
}

#[tokio::test]
async fn test_create_team_makes_creator_a_member() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;

    let team = service.create_team("  Alpha ", u1).await.unwrap();

    assert_eq!(team.name, "Alpha");
    assert_eq!(team.created_by, u1);
    assert_eq!(team.invite_code.len(), 8);
    assert_eq!(membership_count(&db, team.id, u1).await, 1);

    let row = team_member::Entity::find_by_id((team.id, u1))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.role, team_member::TeamRole::Owner);
}

#[tokio::test]
async fn test_duplicate_team_name_conflicts() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;

    service.create_team("Alpha", u1).await.unwrap();
    let err = service.create_team("Alpha", u2).await.unwrap_err();

    assert!(matches!(err, ServiceError::TeamNameTaken(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.remedy(), Some("Choose a different team name"));

    let teams = team::Entity::find().count(&db).await.unwrap();
    assert_eq!(teams, 1);
}

#[tokio::test]
async fn test_invalid_team_name_rejected_before_store() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;

    let err = service.create_team("x", u1).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");

    let err = service.create_team("Bad<name>", u1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(team::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_membership_insert_leaves_no_team() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;

    db.execute_unprepared(
        "CREATE TRIGGER reject_members BEFORE INSERT ON team_members \
         BEGIN SELECT RAISE(ABORT, 'membership rejected'); END;",
    )
    .await
    .expect("Failed to create trigger");

    let err = service.create_team("Alpha", u1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendFailure);
    assert_eq!(team::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_team_for_unknown_user_leaves_nothing() {
    let (db, service) = setup().await;

    let err = service.create_team("Ghosts", Uuid::new_v4()).await.unwrap_err();

    assert_eq!(err.code(), "DATABASE_ERROR");
    assert_eq!(team::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(team_member::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_invite_by_email_then_again() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let row = service
        .invite_member(team.id, "U2@Example.com", u1)
        .await
        .unwrap();
    assert_eq!(row.user_id, u2);
    assert_eq!(row.role, team_member::TeamRole::Member);

    let members = service.list_members(team.id, u1).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == u2));

    let err = service
        .invite_member(team.id, "u2@example.com", u1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyMember));
    assert_eq!(membership_count(&db, team.id, u2).await, 1);
}

#[tokio::test]
async fn test_invite_by_username_and_display_name() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let u3 = insert_user(&db, "u3@example.com").await;
    set_profile(&db, u2, Some("bob_b"), "Bob").await;
    set_profile(&db, u3, None, "Carol").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    service.invite_member(team.id, "bob_b", u1).await.unwrap();
    service.invite_member(team.id, "Carol", u1).await.unwrap();

    assert_eq!(membership_count(&db, team.id, u2).await, 1);
    assert_eq!(membership_count(&db, team.id, u3).await, 1);
}

#[tokio::test]
async fn test_ambiguous_display_name_is_not_found() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let u3 = insert_user(&db, "u3@example.com").await;
    set_profile(&db, u2, None, "Sam").await;
    set_profile(&db, u3, None, "Sam").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let err = service.invite_member(team.id, "Sam", u1).await.unwrap_err();
    assert!(matches!(err, ServiceError::UserNotFound(_)));
}

#[tokio::test]
async fn test_invite_unknown_and_malformed() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let err = service
        .invite_member(team.id, "nobody@example.com", u1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "USER_NOT_FOUND");

    let err = service
        .invite_member(team.id, "not-an@email", u1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_EMAIL");

    let err = service.invite_member(team.id, "   ", u1).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_self_invite_always_rejected() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    set_profile(&db, u1, Some("creator"), "Creator").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    for identifier in ["u1@example.com", "creator", "Creator"] {
        let err = service
            .invite_member(team.id, identifier, u1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SelfInvite), "{}", identifier);
    }

    // Also for a member who is not the creator
    service.invite_member(team.id, "u2@example.com", u1).await.unwrap();
    let err = service
        .invite_member(team.id, "u2@example.com", u2)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SelfInvite));
}

#[tokio::test]
async fn test_outsider_invite_hides_which_users_exist() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let outsider = insert_user(&db, "outsider@example.com").await;
    insert_user(&db, "known@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    // Same answer for existing and unknown accounts
    for identifier in ["known@example.com", "nobody@example.com"] {
        let err = service
            .invite_member(team.id, identifier, outsider)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED", "{}", identifier);

        let err = service
            .invite_member(Uuid::new_v4(), identifier, outsider)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TEAM_NOT_FOUND", "{}", identifier);
    }

    assert_eq!(membership_count(&db, team.id, outsider).await, 0);
}

#[tokio::test]
async fn test_only_creator_may_invite() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    insert_user(&db, "u3@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();
    service.invite_member(team.id, "u2@example.com", u1).await.unwrap();

    let err = service
        .invite_member(team.id, "u3@example.com", u2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(err.code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_remove_member() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let u3 = insert_user(&db, "u3@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();
    service.invite_member(team.id, "u2@example.com", u1).await.unwrap();

    // Non-creator cannot remove
    let err = service.remove_member(team.id, u2, u2).await.unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    // Not a member
    let err = service.remove_member(team.id, u3, u1).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember));

    service.remove_member(team.id, u2, u1).await.unwrap();
    assert_eq!(membership_count(&db, team.id, u2).await, 0);
}

#[tokio::test]
async fn test_creator_cannot_leave_or_remove_self() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let err = service.leave_team(team.id, u1).await.unwrap_err();
    assert!(matches!(err, ServiceError::CreatorCannotLeave));
    assert!(err.remedy().unwrap().contains("administrator"));

    let err = service.remove_member(team.id, u1, u1).await.unwrap_err();
    assert!(matches!(err, ServiceError::CreatorCannotLeave));

    assert_eq!(membership_count(&db, team.id, u1).await, 1);
}

#[tokio::test]
async fn test_member_leaves() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();
    service.invite_member(team.id, "u2@example.com", u1).await.unwrap();

    service.leave_team(team.id, u2).await.unwrap();
    assert_eq!(membership_count(&db, team.id, u2).await, 0);

    let err = service.leave_team(team.id, u2).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember));
}

#[tokio::test]
async fn test_join_by_invite_code_twice() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let first = service.join_by_invite_code(&team.invite_code, u2).await.unwrap();
    assert_eq!(first.status, JoinStatus::Joined);
    assert_eq!(first.team_id, Some(team.id));

    let second = service.join_by_invite_code(&team.invite_code, u2).await.unwrap();
    assert!(second.success);
    assert_eq!(second.status, JoinStatus::AlreadyMember);

    assert_eq!(membership_count(&db, team.id, u2).await, 1);
}

#[tokio::test]
async fn test_regenerate_invite_code_invalidates_old() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let first = service.regenerate_invite_code(team.id, u1).await.unwrap();
    let second = service.regenerate_invite_code(team.id, u1).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(service.get_invite_code(team.id, u1).await.unwrap(), second);

    let err = service.join_by_invite_code(&first, u2).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInviteCode));
    assert_eq!(membership_count(&db, team.id, u2).await, 0);

    let joined = service
        .join_by_invite_code(&second.to_lowercase(), u2)
        .await
        .unwrap();
    assert_eq!(joined.status, JoinStatus::Joined);
}

#[tokio::test]
async fn test_invite_code_is_creator_only() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();
    service.join_by_invite_code(&team.invite_code, u2).await.unwrap();

    assert_eq!(
        service.get_invite_code(team.id, u2).await.unwrap_err().code(),
        "UNAUTHORIZED"
    );
    assert_eq!(
        service
            .regenerate_invite_code(team.id, u2)
            .await
            .unwrap_err()
            .code(),
        "UNAUTHORIZED"
    );
}

#[tokio::test]
async fn test_member_sees_only_own_membership_row() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let u3 = insert_user(&db, "u3@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();
    service.invite_member(team.id, "u2@example.com", u1).await.unwrap();
    service.invite_member(team.id, "u3@example.com", u1).await.unwrap();

    let creator_view = service.list_members(team.id, u1).await.unwrap();
    assert_eq!(creator_view.len(), 3);
    assert!(creator_view.iter().all(|m| m.email.is_some()));
    assert!(creator_view
        .iter()
        .any(|m| m.user_id == u1 && m.is_creator));

    let member_view = service.list_members(team.id, u2).await.unwrap();
    assert_eq!(member_view.len(), 1);
    assert_eq!(member_view[0].user_id, u2);
}

#[tokio::test]
async fn test_outsider_cannot_view_team() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let outsider = insert_user(&db, "out@example.com").await;
    let team = service.create_team("Alpha", u1).await.unwrap();

    let err = service.get_team(team.id, outsider).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = service.list_members(team.id, outsider).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = service.get_team(Uuid::new_v4(), u1).await.unwrap_err();
    assert!(matches!(err, ServiceError::TeamNotFound));
}

#[tokio::test]
async fn test_list_user_teams() {
    let (db, service) = setup().await;
    let u1 = insert_user(&db, "u1@example.com").await;
    let u2 = insert_user(&db, "u2@example.com").await;
    let alpha = service.create_team("Alpha", u1).await.unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let beta = service.create_team("Beta", u2).await.unwrap();
    service.join_by_invite_code(&beta.invite_code, u1).await.unwrap();

    let teams = service.list_user_teams(u1).await.unwrap();
    let ids: Vec<Uuid> = teams.iter().map(|t| t.team.id).collect();
    assert_eq!(ids, vec![beta.id, alpha.id]);
    assert!(teams[1].is_creator);
    assert!(!teams[0].is_creator);

    assert_eq!(service.list_user_teams(u2).await.unwrap().len(), 1);
}
