/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use dayplan_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = dayplan_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::authenticate, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use dayplan_shared::media::{LocalMediaStorage, MediaStorage};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Where uploaded renditions are written
    pub media: Arc<dyn MediaStorage>,
}

impl AppState {
    /// Creates state that stores media on the local filesystem under `MEDIA_ROOT`
    pub fn new(db: PgPool, config: Config) -> Self {
        let media = LocalMediaStorage::new(&config.media.root, config.media.url.clone());
        Self::with_media(db, config, Arc::new(media))
    }

    /// Creates state with a caller-provided media store
    pub fn with_media(db: PgPool, config: Config, media: Arc<dyn MediaStorage>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            media,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                  # Health check (public)
/// ├── /media/*                                 # Stored renditions (public)
/// └── /api/v1/
///     ├── /authentication/                     # Public
///     │   ├── POST     /sign_in
///     │   ├── POST     /sign_up
///     │   └── GET|POST /sign_out
///     └── (authenticated; anonymous GET allowed)
///         ├── /userprofile                     # GET
///         ├── /userprofile/profile-image       # POST
///         ├── /userprofile/:id                 # GET PUT PATCH DELETE
///         ├── /userimage/:id                   # GET
///         ├── /auth/users[/:id]                # GET
///         ├── /tasks                           # GET POST, bulk PUT PATCH DELETE rejected
///         ├── /tasks/listing                   # GET
///         └── /tasks/:id                       # GET PUT PATCH DELETE
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Body limit (`MAX_UPLOAD_BYTES`)
/// 5. Authentication (`/api/v1` resources only)
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Sign-in and sign-up must work without credentials; sign-out reads the cookie itself
    let authentication_routes = Router::new()
        .route("/sign_in", post(routes::auth::sign_in))
        .route("/sign_up", post(routes::auth::sign_up))
        .route(
            "/sign_out",
            get(routes::auth::sign_out).post(routes::auth::sign_out),
        );

    let resource_routes = Router::new()
        .route("/userprofile", get(routes::profiles::list_profiles))
        .route(
            "/userprofile/profile-image",
            post(routes::profiles::upload_profile_image),
        )
        .route(
            "/userprofile/:id",
            get(routes::profiles::get_profile)
                .put(routes::profiles::update_profile)
                .patch(routes::profiles::update_profile)
                .delete(routes::profiles::delete_profile),
        )
        .route("/userimage/:id", get(routes::images::get_image))
        .route("/auth/users", get(routes::users::list_users))
        .route("/auth/users/:id", get(routes::users::get_user))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks)
                .post(routes::tasks::create_task)
                .put(routes::tasks::update_task_list)
                .patch(routes::tasks::update_task_list)
                .delete(routes::tasks::delete_task_list),
        )
        .route("/tasks/listing", get(routes::tasks::listing))
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ));

    let v1_routes = Router::new()
        .nest("/authentication", authentication_routes)
        .merge(resource_routes);

    let mut router = Router::new()
        .merge(health_routes)
        .nest("/api/v1", v1_routes);

    if let Some(mount) = state.config.media_mount_path() {
        router = router.nest_service(&mount, ServeDir::new(&state.config.media.root));
    }

    router
        .layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.session.cookie_secure))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
