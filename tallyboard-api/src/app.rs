/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use tallyboard_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::security_headers, routes};
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tallyboard_shared::auth::middleware::jwt_auth_middleware;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /health                                   public
/// /v1/auth/{register,login,refresh,accept-invitation}   public
/// /v1/auth/{me,switch-business}             authenticated
/// /v1/business, /v1/businesses
/// /v1/projects[/:id[/members[/:user_id]]]
/// /v1/tasks[/:id]
/// /v1/time-entries[/:id | /start | /stop | /running]
/// /v1/invoices[/:id[/send | /pay]]
/// /v1/clients[/:id]
/// /v1/team[/invite | /:user_id]
/// /v1/reports/{dashboard,projects,time,invoices}
/// /v1/settings/{profile,password}
/// /v1/user/two-factor/{setup,enable,disable}
/// ```
///
/// Everything under `/v1` except the public auth routes requires a bearer
/// access token. Role checks happen in the handlers.
pub fn build_router(state: AppState) -> Router {
    let secret = state.config.jwt.secret.clone();

    let public_auth = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/accept-invitation", post(routes::auth::accept_invitation));

    let protected = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/switch-business", post(routes::auth::switch_business))
        .route(
            "/business",
            get(routes::business::get_business).patch(routes::business::update_business),
        )
        .route("/businesses", get(routes::business::list_businesses))
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/projects/:id/members",
            get(routes::projects::list_members).post(routes::projects::add_member),
        )
        .route(
            "/projects/:id/members/:user_id",
            patch(routes::projects::update_member).delete(routes::projects::remove_member),
        )
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/time-entries",
            get(routes::time_entries::list_entries).post(routes::time_entries::create_entry),
        )
        .route("/time-entries/start", post(routes::time_entries::start_timer))
        .route("/time-entries/stop", post(routes::time_entries::stop_timer))
        .route("/time-entries/running", get(routes::time_entries::running_timer))
        .route(
            "/time-entries/:id",
            get(routes::time_entries::get_entry)
                .patch(routes::time_entries::update_entry)
                .delete(routes::time_entries::delete_entry),
        )
        .route(
            "/invoices",
            get(routes::invoices::list_invoices).post(routes::invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(routes::invoices::get_invoice)
                .patch(routes::invoices::update_invoice)
                .delete(routes::invoices::delete_invoice),
        )
        .route("/invoices/:id/send", post(routes::invoices::send_invoice))
        .route("/invoices/:id/pay", post(routes::invoices::pay_invoice))
        .route(
            "/clients",
            get(routes::clients::list_clients).post(routes::clients::create_client),
        )
        .route(
            "/clients/:id",
            get(routes::clients::get_client)
                .patch(routes::clients::update_client)
                .delete(routes::clients::delete_client),
        )
        .route("/team", get(routes::team::list_team))
        .route("/team/invite", post(routes::team::invite))
        .route(
            "/team/:user_id",
            patch(routes::team::update_member).delete(routes::team::remove_member),
        )
        .route("/reports/dashboard", get(routes::reports::dashboard))
        .route("/reports/projects", get(routes::reports::projects))
        .route("/reports/time", get(routes::reports::time))
        .route("/reports/invoices", get(routes::reports::invoices))
        .route("/settings/profile", patch(routes::settings::update_profile))
        .route("/settings/password", post(routes::settings::change_password))
        .route("/user/two-factor/setup", post(routes::two_factor::setup))
        .route("/user/two-factor/enable", post(routes::two_factor::enable))
        .route("/user/two-factor/disable", post(routes::two_factor::disable))
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            jwt_auth_middleware(secret.clone(), req, next)
        }));

    let v1_routes = Router::new().nest("/auth", public_auth).merge(protected);

    let enable_hsts = state.config.security.production;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config.security.cors_origins))
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            security_headers(enable_hsts, req, next)
        }))
        .with_state(state)
}

/// Any origin when none are configured, otherwise exactly the listed ones
fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE];

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
