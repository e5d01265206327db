use serde_json::json;

use crate::common::{JWT_SECRET, NoteForm, TestApp, routes};

mod authentication {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::SUBJECTS).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_MISSING");
        assert_eq!(res.body["success"], false);
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::NOTES, "not-a-jwt").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let app = TestApp::spawn().await;
        let forged =
            notes_server::utils::jwt::sign("some-other-secret", app.admin_id, "ada@example.com", "admin")
                .unwrap();

        let res = app.get_with_token(routes::NOTES, &forged).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let app = TestApp::spawn().await;
        let claims = notes_server::utils::jwt::Claims {
            sub: "ada@example.com".into(),
            uid: app.admin_id,
            role: "admin".into(),
            exp: (chrono::Utc::now().timestamp() - 3600) as usize,
        };
        let expired = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap();

        let res = app.get_with_token(routes::NOTES, &expired).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .get(app.url(routes::NOTES))
            .header("Authorization", format!("Basic {}", app.user_token))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HEALTH).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], true);
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token("/api/nothing-here").await;

        assert_eq!(res.status, 404);
        assert_eq!(res.code(), "NOT_FOUND");
    }
}

mod authorization {
    use super::*;

    #[tokio::test]
    async fn plain_user_can_read() {
        let app = TestApp::spawn().await;
        let id = app.create_note(NoteForm::default()).await;

        let list = app.get_with_token(routes::NOTES, &app.user_token).await;
        let one = app.get_with_token(&routes::note(&id), &app.user_token).await;
        let subjects = app.get_with_token(routes::SUBJECTS, &app.user_token).await;

        assert_eq!(list.status, 200);
        assert_eq!(one.status, 200);
        assert_eq!(subjects.status, 200);
    }

    #[tokio::test]
    async fn plain_user_cannot_update() {
        let app = TestApp::spawn().await;
        let id = app.create_note(NoteForm::default()).await;

        let res = app
            .put_with_token(&routes::note(&id), &json!({ "title": "Mine now" }), &app.user_token)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");

        let after = app.get_with_token(&routes::note(&id), &app.user_token).await;
        assert_eq!(after.body["note"]["title"], "Graph Algorithms");
    }

    #[tokio::test]
    async fn plain_user_cannot_delete() {
        let app = TestApp::spawn().await;
        let id = app.create_note(NoteForm::default()).await;

        let res = app.delete_with_token(&routes::note(&id), &app.user_token).await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");
        assert_eq!(app.blob_count(), 1);
    }

    #[tokio::test]
    async fn any_admin_may_manage_notes() {
        let app = TestApp::spawn().await;
        let id = app.create_note(NoteForm::default()).await;
        let other_admin = app
            .create_user("Grace Admin", "grace@example.com", "admin")
            .await;

        let res = app
            .put_with_token(&routes::note(&id), &json!({ "subject": "CS102" }), &other_admin)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["note"]["subject"], "CS102");

        let res = app.delete_with_token(&routes::note(&id), &other_admin).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn role_check_runs_before_id_validation() {
        let app = TestApp::spawn().await;

        let res = app
            .delete_with_token(&routes::note("not-a-uuid"), &app.user_token)
            .await;

        assert_eq!(res.status, 403);
    }
}
