//! Integration tests for the health and model catalog endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_string, test_app};

    /// Tests the liveness probe
    #[tokio::test]
    async fn it_reports_healthy() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("\"status\":\"healthy\""));
    }

    /// Tests the model catalog lists the supported models
    #[tokio::test]
    async fn it_lists_supported_models() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("claude-sonnet-4-20250514"));
        assert!(body.contains("claude-opus-4-20250514"));
        assert!(body.contains("max_tokens"));
    }
}
