//! Identa is a lightweight user-account management and access
//! control API.

#![forbid(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod router;
pub mod telemetry;
pub mod token;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

const REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: user::UserService,
    pub token: token::TokenManager,
    pub mail: mail::MailManager,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::OPTIONS,
                ])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `POST /create` goes to `create`.
        .route("/create", post(router::create::handler))
        // `POST /login` goes to `login`.
        .route("/login", post(router::login::handler))
        // Password reset round trip, no authorization required.
        .route("/password/reset", post(router::password::request_handler))
        .route(
            "/password/reset/confirm",
            post(router::password::confirm_handler),
        )
        .nest("/users", router::users::router(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file, let it in memory.
    let config = config::Configuration::default().read()?;

    let Some(pg) = config.postgres.clone() else {
        tracing::error!("missing `postgres` entry on `config.yaml` file");
        std::process::exit(1);
    };
    let db = database::Database::new(
        &pg.address,
        &pg.username
            .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
        &pg.password
            .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
        &pg.database
            .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
        pg.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
    )
    .await?;

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let pwd = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);
    let repo = Arc::new(user::PgUserRepository::new(db.postgres.clone()));
    let users = user::UserService::new(repo, pwd);

    // handle jwt.
    let Some(token_config) = &config.token else {
        tracing::error!("missing `token` entry on `config.yaml` file");
        std::process::exit(1);
    };
    let mut token = token::TokenManager::new(
        &config.url,
        &token_config.public_key_pem,
        &token_config.private_key_pem,
    )?;
    if let Some(audience) = token_config.audience.as_ref() {
        token.audience(audience);
    }

    // handle mail sender.
    let mail = if let Some(cfg) = &config.mail {
        mail::MailManager::new(cfg).await?
    } else {
        mail::MailManager::default()
    };

    Ok(AppState {
        config,
        users,
        token,
        mail,
    })
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder =
            builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(
        builder
            .body(axum::body::Body::from(body))
            .expect("request must build"),
    )
    .await
    .expect("infallible service")
}

/// State backed by the in-memory repository and the test key pair.
#[cfg(test)]
pub fn test_state() -> (AppState, Arc<user::MemoryUserRepository>) {
    let repo = Arc::new(user::MemoryUserRepository::default());
    let pwd =
        Arc::new(crypto::PasswordManager::new(None).expect("argon2 params"));
    let users = user::UserService::new(repo.clone(), pwd);
    let token = token::TokenManager::new(
        "http://localhost/",
        token::TEST_PUBLIC_KEY,
        token::TEST_PRIVATE_KEY,
    )
    .expect("test key pair must load");

    (
        AppState {
            config: Arc::new(config::Configuration::default()),
            users,
            token,
            mail: mail::MailManager::default(),
        },
        repo,
    )
}
