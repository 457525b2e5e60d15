use ::common::storage::BlobStore;
use serde_json::json;

use crate::common::{TestApp, routes};

mod identity {
    use super::*;

    #[tokio::test]
    async fn missing_user_header_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_anonymous(routes::SESSIONS).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "IDENTITY_MISSING");
    }

    #[tokio::test]
    async fn user_id_that_sanitizes_to_nothing_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_as(routes::SESSIONS, "../..").await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod session_creation {
    use super::*;

    #[tokio::test]
    async fn create_returns_default_document() {
        let app = TestApp::spawn().await;
        let res = app
            .post_as(
                routes::SESSIONS,
                &json!({
                    "session_id": "meeting-2024-01-15-1430",
                    "chunk_duration": 5,
                    "title": "Test Meeting",
                    "participants": ["Alice", "Bob"],
                }),
                "test-user-123",
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["session_id"], "meeting-2024-01-15-1430");
        assert_eq!(
            res.body["session_key"],
            "users/test-user-123/audio/sessions/meeting-2024-01-15-1430/session.json"
        );

        let session = &res.body["session"];
        assert_eq!(session["status"], "active");
        assert_eq!(session["userEmail"], "test-user-123@example.com");
        assert_eq!(session["audio"]["chunkCount"], 0);
        assert_eq!(session["audio"]["chunkDuration"], 5);
        assert_eq!(session["transcription"]["status"], "pending");
        assert_eq!(session["metadata"]["title"], "Test Meeting");
        assert_eq!(session["metadata"]["participants"], json!(["Alice", "Bob"]));
        assert_eq!(res.body["status"]["audio"]["chunksUploaded"], 0);
        assert_eq!(app.store.len().await, 3);
    }

    #[tokio::test]
    async fn session_id_is_sanitized() {
        let app = TestApp::spawn().await;
        let res = app
            .post_as(routes::SESSIONS, &json!({ "session_id": "a b/c.d" }), "u1")
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["session_id"], "abcd");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let res = app
            .post_as(routes::SESSIONS, &json!({ "chunk_duration": 5 }), "u1")
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod session_lookup {
    use super::*;

    #[tokio::test]
    async fn get_returns_canonical_layout() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        let res = app.get_as(&routes::session("s1"), "u1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["layout"], "canonical");
        assert_eq!(res.body["session"]["sessionId"], "s1");
    }

    #[tokio::test]
    async fn get_falls_back_to_legacy_layout() {
        let app = TestApp::spawn().await;
        let today = chrono::Utc::now().date_naive().format("%Y-%m-%d");
        let doc = json!({
            "sessionId": "s1",
            "createdAt": "2023-06-01T10:00:00.000Z",
            "updatedAt": "2023-06-01T10:00:00.000Z",
            "audio": { "chunkCount": 2 },
        });
        app.store
            .put(
                &format!("users/u1/audio/sessions/{today}-s1/metadata.json"),
                &serde_json::to_vec(&doc).unwrap(),
                "application/json",
            )
            .await
            .unwrap();

        let res = app.get_as(&routes::session("s1"), "u1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["layout"], "legacy");
        assert_eq!(res.body["session"]["audio"]["chunkCount"], 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app.get_as(&routes::session("nope"), "u1").await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn sessions_are_scoped_to_the_caller() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        let res = app.get_as(&routes::session("s1"), "u2").await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn list_returns_callers_sessions() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "first", 5).await;
        app.create_session("u1", "second", 5).await;
        app.create_session("u2", "other", 5).await;

        let res = app.get_as(routes::SESSIONS, "u1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["count"], 2);

        let mut ids: Vec<_> = res.body["sessions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["sessionId"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, ["first", "second"]);
    }
}

mod metadata_update {
    use super::*;

    #[tokio::test]
    async fn update_merges_into_existing_session() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        let res = app
            .put_as(
                &routes::metadata("s1"),
                &json!({
                    "audio": { "chunkCount": 5, "duration": 0 },
                    "metadata": { "title": "Renamed", "location": "" },
                }),
                "u1",
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["created"], false);
        let session = &res.body["session"];
        assert_eq!(session["audio"]["chunkCount"], 5);
        assert_eq!(session["audio"]["chunkDuration"], 5);
        assert_eq!(session["metadata"]["title"], "Renamed");

        let stored = app.get_as(&routes::session("s1"), "u1").await;
        assert_eq!(stored.body["session"]["audio"]["chunkCount"], 5);
    }

    #[tokio::test]
    async fn update_of_missing_session_creates_it() {
        let app = TestApp::spawn().await;
        let res = app
            .put_as(
                &routes::metadata("fresh"),
                &json!({
                    "audio": { "chunkDuration": 10 },
                    "metadata": { "title": "Created by update" },
                }),
                "u1",
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["created"], true);
        assert_eq!(res.body["session"]["audio"]["chunkDuration"], 10);
        assert_eq!(res.body["session"]["metadata"]["title"], "Created by update");
        assert_eq!(res.body["session"]["userEmail"], "u1@example.com");
    }

    #[tokio::test]
    async fn chunk_count_beyond_key_range_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        let res = app
            .put_as(
                &routes::metadata("s1"),
                &json!({ "audio": { "chunkCount": 4_000_000_000u32 } }),
                "u1",
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app.get_as(&routes::missing_chunks("s1"), "u1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["expected"], 0);
    }
}

mod processing_status {
    use super::*;

    #[tokio::test]
    async fn missing_status_is_defaulted() {
        let app = TestApp::spawn().await;
        let res = app.get_as(&routes::status("s1"), "u1").await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["sessionId"], "s1");
        assert_eq!(res.body["audio"]["chunksUploaded"], 0);
    }

    #[tokio::test]
    async fn patch_merges_status() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        let res = app
            .patch_as(
                &routes::status("s1"),
                &json!({ "audio": { "chunksUploaded": 3 } }),
                "u1",
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app
            .patch_as(
                &routes::status("s1"),
                &json!({ "transcription": { "chunksCompleted": 2 } }),
                "u1",
            )
            .await;
        assert_eq!(res.body["audio"]["chunksUploaded"], 3);
        assert_eq!(res.body["transcription"]["chunksCompleted"], 2);

        let stored = app.get_as(&routes::status("s1"), "u1").await;
        assert_eq!(stored.body, res.body);
    }

    #[tokio::test]
    async fn patch_can_reset_counters() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        app.patch_as(
            &routes::status("s1"),
            &json!({
                "audio": { "uploadComplete": true },
                "transcription": { "chunksProcessing": 3 }
            }),
            "u1",
        )
        .await;
        let res = app
            .patch_as(
                &routes::status("s1"),
                &json!({
                    "audio": { "uploadComplete": false },
                    "transcription": { "chunksProcessing": 0 }
                }),
                "u1",
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["audio"]["uploadComplete"], false);
        assert_eq!(res.body["transcription"]["chunksProcessing"], 0);
    }
}
