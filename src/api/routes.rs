//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Peers and browsers on other origins call every route
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Ledger
        .route("/chain", get(handlers::get_chain))
        .route("/transactions", get(handlers::get_open_transactions))
        .route("/transaction", post(handlers::add_transaction))
        .route("/mine", post(handlers::mine))
        .route("/resolve-conflicts", post(handlers::resolve_conflicts))
        .route("/file-check", post(handlers::file_check))
        // Peer relay
        .route(
            "/broadcast-transaction",
            post(handlers::broadcast_transaction),
        )
        .route("/broadcast-block", post(handlers::broadcast_block))
        // Peer registry
        .route("/node", post(handlers::add_node))
        .route("/node/{node_url}", delete(handlers::remove_node))
        .route("/nodes", get(handlers::get_nodes))
        // Wallet
        .route(
            "/wallet",
            post(handlers::create_wallet).get(handlers::load_wallet),
        )
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Node, NodeConfig};
    use crate::storage::{Storage, StorageConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router_in(dir: &tempfile::TempDir) -> Router {
        router_with(dir, None)
    }

    fn router_with(dir: &tempfile::TempDir, hop_file: Option<PathBuf>) -> Router {
        let storage = Storage::new(StorageConfig {
            data_dir: dir.path().to_path_buf(),
        })
        .unwrap();
        let config = NodeConfig {
            peer_timeout: Duration::from_millis(200),
            hop_file,
            ..Default::default()
        };
        let node = Node::with_http_peers(config, storage).unwrap();
        create_router(ApiState {
            node: Arc::new(node),
        })
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chain_starts_at_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let response = app
            .oneshot(Request::get("/chain").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chain = body_json(response).await;
        assert_eq!(chain.as_array().unwrap().len(), 1);
        assert_eq!(chain[0]["proof"], 100);
        assert_eq!(chain[0]["previous_hash"], "");
    }

    #[tokio::test]
    async fn test_transaction_requires_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let response = app
            .oneshot(post_json("/transaction", r#"{"hop_count": 3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "No wallet set up.");
    }

    #[tokio::test]
    async fn test_wallet_transaction_and_mine() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let response = app
            .clone()
            .oneshot(post_json("/wallet", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let wallet = body_json(response).await;
        let public_key = wallet["public_key"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json("/transaction", r#"{"hop_count": 3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["transaction"]["dataOwner"], public_key.as_str());
        assert_eq!(body["transaction"]["hop_count"], 3);

        let response = app.clone().oneshot(post_json("/mine", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["block"]["index"], 1);
        assert_eq!(body["block"]["transactions"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(Request::get("/transactions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_json(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_transaction_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let response = app
            .oneshot(post_json(
                "/broadcast-transaction",
                r#"{"dataOwner": "02ab", "hop_count": 1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_broadcast_block_stale() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let genesis = serde_json::to_string(&crate::core::Block::genesis()).unwrap();
        let response = app
            .oneshot(post_json(
                "/broadcast-block",
                &format!(r#"{{"block": {}}}"#, genesis),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_node_registry() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let response = app
            .clone()
            .oneshot(post_json("/node", r#"{"node": ""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json("/node", r#"{"node": "localhost:5001"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["all_nodes"][0], "localhost:5001");

        let response = app
            .clone()
            .oneshot(
                Request::delete("/node/localhost:5001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/nodes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_json(response).await["all_nodes"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_null_hop_count_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);
        app.clone().oneshot(post_json("/wallet", "")).await.unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/transaction", r#"{"hop_count": null}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app
            .clone()
            .oneshot(post_json("/transaction", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/broadcast-transaction",
                r#"{"dataOwner": "02ab", "signature": "cd", "hop_count": null}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_mine_without_wallet_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let app = router_in(&dir);

        let response = app.oneshot(post_json("/mine", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Adding a block failed.");
        assert_eq!(body["wallet_set_up"], false);
    }

    #[tokio::test]
    async fn test_file_check() {
        let dir = tempfile::tempdir().unwrap();
        let response = router_in(&dir)
            .oneshot(post_json("/file-check", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let hop_file = dir.path().join("hops.txt");
        std::fs::write(&hop_file, "12\n").unwrap();
        let app = router_with(&dir, Some(hop_file));
        app.clone().oneshot(post_json("/wallet", "")).await.unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/file-check", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["lines_read"], 1);
        assert_eq!(body["block"]["transactions"][0]["hop_count"], 12);

        let response = app.oneshot(post_json("/file-check", "")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["lines_read"], 0);
        assert!(body.get("block").is_none());
    }
}
