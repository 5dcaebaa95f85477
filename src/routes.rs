// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn app(app_state: AppState) -> Router {
    let inventory_routes = Router::new()
        .route(
            "/products",
            post(handlers::inventory::create_product).get(handlers::inventory::list_products),
        )
        .route("/products/{id}", get(handlers::inventory::get_product))
        .route("/products/{id}/summary", get(handlers::inventory::get_stock_summary))
        .route("/products/{id}/movements", get(handlers::inventory::list_movements))
        .route("/products/{id}/reservations", get(handlers::inventory::list_reservations))
        .route("/pool/validate", get(handlers::inventory::validate_stock))
        .route(
            "/pool/reserve",
            get(handlers::inventory::get_pool)
                .post(handlers::inventory::reserve_stock)
                .delete(handlers::inventory::release_reservation),
        )
        .route("/pool/cleanup", post(handlers::inventory::cleanup_reservations))
        .route("/movements", post(handlers::inventory::record_movement))
        .route(
            "/adjustments",
            post(handlers::adjustments::update_stock).get(handlers::adjustments::list_adjustments),
        )
        .route("/adjustments/{id}", get(handlers::adjustments::get_adjustment))
        .route("/adjustments/{id}/approve", post(handlers::adjustments::approve_adjustment))
        .route("/adjustments/{id}/reject", post(handlers::adjustments::reject_adjustment))
        .route("/adjustments/{id}/apply", post(handlers::adjustments::apply_adjustment))
        .route("/alerts", get(handlers::alerts::check_stock_levels))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/inventory", inventory_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, StorageBackend};
    use crate::db::InMemoryInventoryRepository;
    use crate::models::rbac::Role;
    use crate::services::inventory_service::StockPolicy;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn state() -> AppState {
        let settings = Settings {
            database_url: None,
            jwt_secret: "route-test-secret".into(),
            bind_addr: "127.0.0.1:0".into(),
            db_max_connections: 1,
            storage: StorageBackend::Memory,
            policy: StockPolicy::default(),
            sweep_interval: Duration::from_secs(60),
        };
        AppState::with_store(&settings, Arc::new(InMemoryInventoryRepository::new())).unwrap()
    }

    fn token(state: &AppState, role: Role) -> String {
        state.auth_service.issue_token(Uuid::new_v4(), role)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create_product(app: &Router, token: &str, quantity: i64) -> String {
        let (status, body) = send(
            app,
            request(
                "POST",
                "/api/inventory/products",
                Some(token),
                Some(json!({ "sku": "MEAL-10KG", "name": "Maize meal 10kg", "initialQuantity": quantity, "minStock": 10 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_and_openapi_are_public() {
        let app = app(state());

        let response = app.clone().oneshot(request("GET", "/api/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = send(&app, request("GET", "/api/openapi.json", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"].get("/api/inventory/pool/reserve").is_some());
    }

    #[tokio::test]
    async fn inventory_routes_require_a_token() {
        let app = app(state());

        let (status, body) = send(&app, request("GET", "/api/inventory/products", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication token is missing or invalid.");

        let (status, _) = send(&app, request("GET", "/api/inventory/products", Some("garbage"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn viewers_cannot_write() {
        let state = state();
        let viewer = token(&state, Role::Viewer);
        let app = app(state);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/products",
                Some(&viewer),
                Some(json!({ "sku": "X", "name": "X" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("inventory:write"));

        let (status, _) = send(&app, request("GET", "/api/inventory/products", Some(&viewer), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn over_reserving_is_a_translated_conflict() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);
        let product_id = create_product(&app, &controller, 100).await;

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/pool/reserve",
                Some(&controller),
                Some(json!({ "productId": product_id, "quantity": 30, "reason": "order #1001" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "active");

        let (status, body) = send(
            &app,
            request(
                "GET",
                &format!("/api/inventory/pool/reserve?productId={}", product_id),
                Some(&controller),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["availableStock"].as_f64(), Some(70.0));

        let over = json!({ "productId": product_id, "quantity": 80 });
        let (status, body) = send(
            &app,
            request("POST", "/api/inventory/pool/reserve", Some(&controller), Some(over.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Insufficient stock: requested 80, available 70.");
        assert!(body.get("details").is_none());

        let mut af = request("POST", "/api/inventory/pool/reserve", Some(&controller), Some(over));
        af.headers_mut()
            .insert(header::ACCEPT_LANGUAGE, "af-ZA,en;q=0.5".parse().unwrap());
        let (status, body) = send(&app, af).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Onvoldoende voorraad: 80 versoek, 70 beskikbaar.");
    }

    #[tokio::test]
    async fn validate_reports_without_writing() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);
        let product_id = create_product(&app, &controller, 20).await;

        let uri = format!(
            "/api/inventory/pool/validate?productId={}&quantity=25&operation=reserve",
            product_id
        );
        let (status, body) = send(&app, request("GET", &uri, Some(&controller), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["code"], "stock_insufficient");
        assert_eq!(body["message"], "Only 20 available.");

        let (_, reservations) = send(
            &app,
            request(
                "GET",
                &format!("/api/inventory/products/{}/reservations", product_id),
                Some(&controller),
                None,
            ),
        )
        .await;
        assert_eq!(reservations.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn invalid_payload_returns_field_details() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);
        let product_id = create_product(&app, &controller, 10).await;

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/movements",
                Some(&controller),
                Some(json!({ "productId": product_id, "movementType": "SALE", "quantity": -3 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["quantity"][0], "Quantity must be greater than zero.");
    }

    #[tokio::test]
    async fn unstorable_quantities_are_bad_requests() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);
        let product_id = create_product(&app, &controller, 100).await;

        // one decimal place too many
        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/pool/reserve",
                Some(&controller),
                Some(json!({ "productId": product_id, "quantity": 0.0001 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["quantity"][0], "Use at most 3 decimal places and stay below 10^15.");

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/movements",
                Some(&controller),
                Some(json!({ "productId": product_id, "movementType": "PURCHASE", "quantity": 1e15 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["quantity"].is_array());

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/adjustments",
                Some(&controller),
                Some(json!({ "productId": product_id, "quantity": -0.0005 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["quantity"].is_array());

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/products",
                Some(&controller),
                Some(json!({ "sku": "OIL-2L", "name": "Sunflower oil 2L", "initialQuantity": 5e28 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["initialQuantity"].is_array());

        let summary_uri = format!("/api/inventory/products/{}/summary", product_id);
        let (status, summary) = send(&app, request("GET", &summary_uri, Some(&controller), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["totalStock"].as_f64(), Some(100.0));
        assert_eq!(summary["reservedStock"].as_f64(), Some(0.0));
    }

    #[tokio::test]
    async fn maximum_below_minimum_is_rejected() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/products",
                Some(&controller),
                Some(json!({ "sku": "TEA-80", "name": "Rooibos tea 80s", "minStock": 20, "maxStock": 10 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["maxStock"][0], "Maximum stock cannot be below minimum stock.");
    }

    #[tokio::test]
    async fn blank_sku_and_name_are_trimmed_before_validation() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/products",
                Some(&controller),
                Some(json!({ "sku": "   ", "name": "\t" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["sku"][0], "SKU is required.");
        assert_eq!(body["details"]["name"][0], "Name is required.");

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/products",
                Some(&controller),
                Some(json!({ "sku": "  TEA-80 ", "name": " Rooibos tea 80s" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sku"], "TEA-80");
        assert_eq!(body["name"], "Rooibos tea 80s");
    }

    #[tokio::test]
    async fn large_adjustments_wait_for_a_manager() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let manager = token(&state, Role::Manager);
        let app = app(state);
        let product_id = create_product(&app, &controller, 100).await;

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/inventory/adjustments",
                Some(&controller),
                Some(json!({ "productId": product_id, "quantity": 150, "reason": "stock take", "requireApproval": true })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pendingApproval");
        let request_id = body["request"]["id"].as_str().unwrap().to_string();

        let summary_uri = format!("/api/inventory/products/{}/summary", product_id);
        let (_, summary) = send(&app, request("GET", &summary_uri, Some(&controller), None)).await;
        assert_eq!(summary["totalStock"].as_f64(), Some(100.0));

        // Controllers hold no approve permission
        let approve_uri = format!("/api/inventory/adjustments/{}/approve", request_id);
        let (status, _) = send(&app, request("POST", &approve_uri, Some(&controller), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            request("POST", &approve_uri, Some(&manager), Some(json!({ "note": "counted twice" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "APPROVED");

        let apply_uri = format!("/api/inventory/adjustments/{}/apply", request_id);
        let (status, body) = send(&app, request("POST", &apply_uri, Some(&controller), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request"]["status"], "APPLIED");
        assert_eq!(body["movement"]["movementType"], "ADJUSTMENT");

        let (_, summary) = send(&app, request("GET", &summary_uri, Some(&controller), None)).await;
        assert_eq!(summary["totalStock"].as_f64(), Some(250.0));

        // A second apply is not a valid transition
        let (status, _) = send(&app, request("POST", &apply_uri, Some(&controller), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn alerts_list_low_stock_products() {
        let state = state();
        let controller = token(&state, Role::StockController);
        let app = app(state);
        create_product(&app, &controller, 4).await;

        let (status, body) = send(&app, request("GET", "/api/inventory/alerts", Some(&controller), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["severity"], "error");
        assert_eq!(body[0]["sku"], "MEAL-10KG");
    }
}
