use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len(),
        "workers": state.dispatcher.worker_count(),
        "providers": state.llm.list_providers(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{FakeLlm, Harness};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_ok_with_counts() {
        let h = Harness::new(FakeLlm::scripted(&[]));
        let state = AppState::for_tests(&h, None);
        let app = crate::api::router(state.clone()).with_state(state);

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["workers"], 0);
    }
}
