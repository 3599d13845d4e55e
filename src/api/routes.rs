use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::require_auth;
use crate::config::Config;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Contact routes -- every request passes the auth gate
    let contact_routes = Router::new()
        .route(
            "/contacts",
            get(handlers::list_contacts).post(handlers::create_contact),
        )
        .route(
            "/contacts/:id",
            get(handlers::get_contact)
                .put(handlers::update_contact)
                .delete(handlers::delete_contact),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    // User routes -- logout checks its own bearer credential
    let user_routes = Router::new()
        .route("/users", post(handlers::register))
        .route("/users/login", post(handlers::login))
        .route("/users/logout", post(handlers::logout));

    Router::new()
        .merge(user_routes)
        .merge(contact_routes)
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match config.server.front_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(
                origin = %config.server.front_origin,
                "FRONT_ORIGIN is not a valid header value; cross-origin requests will be refused"
            );
            layer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{setup_db, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_revocation_status() {
        let (db, _temp) = setup_db();
        let router = create_router(test_state(db));

        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["revocation"], "available");
    }

    #[tokio::test]
    async fn test_fallback_is_json_404() {
        let (db, _temp) = setup_db();
        let router = create_router(test_state(db));

        let (status, body) = get_json(router, "/users/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn test_cors_allows_front_origin() {
        let (db, _temp) = setup_db();
        let state = test_state(db);
        let origin = state.config.server.front_origin.clone();
        let router = create_router(state);

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/contacts")
            .header(header::ORIGIN, &origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            origin.as_str()
        );
    }
}
