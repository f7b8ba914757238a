pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::rate_limiter::RateLimiter;
use crate::services::upload_validator::UploadValidator;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::current_user,
        api::handlers::customers::list_customers,
        api::handlers::customers::get_customer,
        api::handlers::customers::update_customer,
        api::handlers::customers::delete_customer,
        api::handlers::upload::upload_image,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::customers::UpdateCustomerRequest,
            api::handlers::upload::UploadResponse,
            api::handlers::health::HealthResponse,
            models::UserResponse,
            models::Pagination,
            models::CustomerListResponse,
            utils::auth::Role,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "customers", description = "Customer administration (admin only)"),
        (name = "upload", description = "Image uploads"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub upload_validator: Arc<UploadValidator>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let upload_validator = Arc::new(UploadValidator::new(config.upload.clone()));
        let rate_limiter =
            RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window_secs);

        Self {
            db,
            config,
            upload_validator,
            rate_limiter,
        }
    }
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return None;
    }

    // Wildcards are not allowed together with credentials
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([
                header::HeaderName::from_static("ratelimit-limit"),
                header::HeaderName::from_static("ratelimit-remaining"),
                header::HeaderName::from_static("ratelimit-reset"),
            ])
            .allow_credentials(true),
    )
}

pub fn create_app(state: AppState) -> Router {
    let upload = &state.config.upload;
    let public_root = upload.upload_path.trim_matches('/').to_string();
    let images = ServeDir::new(&upload.upload_dir);

    let customers = Router::new()
        .route("/customers", get(api::handlers::customers::list_customers))
        .route(
            "/customers/:id",
            get(api::handlers::customers::get_customer)
                .patch(api::handlers::customers::update_customer)
                .delete(api::handlers::customers::delete_customer),
        )
        .route_layer(from_fn(api::middleware::auth::admin_guard))
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route(
            "/auth/user",
            get(api::handlers::auth::current_user).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/upload",
            post(api::handlers::upload::upload_image)
                .layer(DefaultBodyLimit::max(upload.request_body_limit()))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .merge(customers);

    router = if public_root.is_empty() {
        router.fallback_service(images)
    } else {
        router.nest_service(&format!("/{}", public_root), images)
    };

    let router = router.layer(from_fn_with_state(
        state.clone(),
        api::middleware::rate_limit::rate_limit_middleware,
    ));

    let router = match cors_layer(&state.config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}
