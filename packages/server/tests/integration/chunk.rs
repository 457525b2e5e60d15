use ::common::storage::BlobStore;
use serde_json::json;

use crate::common::{MAX_CHUNK_SIZE, TestApp, routes};

mod chunk_upload {
    use super::*;

    #[tokio::test]
    async fn chunk_is_stored_under_its_time_range() {
        let app = TestApp::spawn().await;
        let res = app
            .put_bytes_as(&routes::chunk("s1", 12), b"webm-bytes".to_vec(), "u1")
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let key = "users/u1/audio/sessions/s1/chunks/00055-00060.webm";
        assert_eq!(res.body["chunk_key"], key);
        assert_eq!(res.body["size"], 10);
        assert_eq!(res.body["max_chunk_size"], MAX_CHUNK_SIZE);

        assert_eq!(app.store.get(key).await.unwrap(), b"webm-bytes");
        assert_eq!(app.store.content_type(key).await.as_deref(), Some("audio/webm"));
    }

    #[tokio::test]
    async fn duration_query_changes_the_range() {
        let app = TestApp::spawn().await;
        let res = app
            .put_bytes_as(
                &format!("{}?duration=30", routes::chunk("s1", 1)),
                vec![1, 2, 3],
                "u1",
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(
            res.body["chunk_key"],
            "users/u1/audio/sessions/s1/chunks/00000-00030.webm"
        );
    }

    #[tokio::test]
    async fn missing_duration_uses_the_sessions_chunk_duration() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 10).await;

        let res = app
            .put_bytes_as(&routes::chunk("s1", 2), vec![1, 2, 3], "u1")
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(
            res.body["chunk_key"],
            "users/u1/audio/sessions/s1/chunks/00010-00020.webm"
        );
    }

    #[tokio::test]
    async fn chunk_zero_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .put_bytes_as(&routes::chunk("s1", 0), vec![1], "u1")
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn zero_duration_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .put_bytes_as(
                &format!("{}?duration=0", routes::chunk("s1", 1)),
                vec![1],
                "u1",
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oversized_chunk_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .put_bytes_as(&routes::chunk("s1", 1), vec![0; MAX_CHUNK_SIZE + 1], "u1")
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert!(app.store.is_empty().await);
    }
}

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn reports_gaps_against_chunk_count() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;

        for chunk in [1, 2, 4] {
            let res = app
                .put_bytes_as(&routes::chunk("s1", chunk), vec![0; 16], "u1")
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
        }

        let res = app
            .put_as(
                &routes::metadata("s1"),
                &json!({ "audio": { "chunkCount": 5 } }),
                "u1",
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_as(&routes::missing_chunks("s1"), "u1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["uploaded"], json!([1, 2, 4]));
        assert_eq!(res.body["expected"], 5);
        assert_eq!(res.body["missing"], json!([3, 5]));
        assert_eq!(res.body["complete"], false);
    }

    #[tokio::test]
    async fn complete_session_has_nothing_missing() {
        let app = TestApp::spawn().await;
        app.create_session("u1", "s1", 5).await;
        for chunk in 1..=3 {
            app.put_bytes_as(&routes::chunk("s1", chunk), vec![0; 4], "u1")
                .await;
        }
        app.put_as(
            &routes::metadata("s1"),
            &json!({ "audio": { "chunkCount": 3 } }),
            "u1",
        )
        .await;

        let res = app.get_as(&routes::missing_chunks("s1"), "u1").await;
        assert_eq!(res.body["missing"], json!([]));
        assert_eq!(res.body["complete"], true);
    }

    #[tokio::test]
    async fn unknown_session_reports_uploaded_only() {
        let app = TestApp::spawn().await;
        app.put_bytes_as(&routes::chunk("s1", 2), vec![0; 4], "u1")
            .await;

        let res = app.get_as(&routes::missing_chunks("s1"), "u1").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["uploaded"], json!([2]));
        assert!(res.body["expected"].is_null());
        assert_eq!(res.body["missing"], json!([]));
        assert_eq!(res.body["complete"], false);
    }
}
