use crate::{
    api::handlers::{auth, content, health, orders, root, storefront, users},
    cli::globals::GlobalArgs,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Router,
};
use base64ct::{Base64, Encoding};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, request_id::PropagateRequestIdLayer,
    services::ServeDir, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
pub mod response;
pub mod uploads;
// ApiDoc and the cargo derived document info live in openapi.rs.
mod openapi;

pub use openapi::openapi;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Several images per request, each up to 5 MiB, plus the text fields.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Start the server
/// # Errors
/// Return error if the database is unreachable, the schema cannot be applied
/// or the listener fails to bind.
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool).await?;

    let app = router(pool, globals);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Applies `sql/schema.sql` in one transaction. Concurrent callers queue on an
/// advisory lock, so several instances may start against the same database.
///
/// # Errors
/// Returns an error naming the first statement that fails.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin schema transaction")?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('shopdesk:schema', 0))")
        .execute(&mut *tx)
        .await
        .context("Failed to lock schema")?;

    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to apply schema statement {}", index + 1))?;
    }

    tx.commit().await.context("Failed to commit schema")?;
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Build the application router with every route, the upload file server,
/// the Swagger UI and the shared middleware stack.
pub fn router(pool: PgPool, globals: &GlobalArgs) -> Router {
    let admin = Router::new()
        .route("/register", post(auth::admin::register))
        .route("/login", post(auth::admin::login))
        .route("/protected-route", get(auth::admin::protected_route))
        .route(
            "/category",
            get(storefront::categories::list).post(storefront::categories::create),
        )
        .route(
            "/category/:id",
            get(storefront::categories::get).put(storefront::categories::toggle),
        )
        .route("/product", post(storefront::products::create))
        .route(
            "/product/:id",
            get(storefront::products::get)
                .post(storefront::products::update)
                .delete(storefront::products::toggle),
        )
        .route("/products", get(storefront::products::list))
        .route("/product-order", get(storefront::products::next_order))
        .route("/product/:id/variants", get(storefront::variants::list))
        .route("/variant", post(storefront::variants::create))
        .route("/variant/:id", put(storefront::variants::update))
        .route("/variant/:id/default", post(storefront::variants::make_default))
        .route(
            "/banner",
            get(content::banners::list).post(content::banners::create),
        )
        .route(
            "/banner/:id",
            get(content::banners::get)
                .put(content::banners::update)
                .delete(content::banners::toggle),
        )
        .route(
            "/testimonial",
            get(content::testimonials::list).post(content::testimonials::create),
        )
        .route(
            "/testimonial/:id",
            get(content::testimonials::get)
                .put(content::testimonials::update)
                .delete(content::testimonials::toggle),
        )
        .route(
            "/config",
            get(content::site_config::get).post(content::site_config::upsert),
        )
        .route("/orders", get(orders::list))
        .route("/order/:id/status", put(orders::set_status));

    let user = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/order", post(orders::place))
        .route("/orders", get(orders::mine));

    let front = Router::new()
        .route("/product", get(storefront::front::products))
        .route("/product/:id", get(storefront::front::product))
        .route("/banner", get(content::banners::active))
        .route("/testimonial", get(content::testimonials::active));

    let mut app = Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health).options(health::health))
        .nest("/api/v1/admin", admin)
        .nest("/api/v1/user", user)
        .nest("/api/v1/front", front)
        .nest_service("/uploads", ServeDir::new(&globals.upload_dir));

    if globals.swagger_username.is_some() && globals.swagger_password.is_some() {
        let docs: Router = SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", openapi())
            .into();
        app = app.merge(docs.layer(middleware::from_fn(swagger_auth)));
    } else {
        warn!("Swagger credentials not configured, API docs are disabled");
    }

    app.fallback(root::not_found).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(Extension(globals.clone()))
            .layer(Extension(pool)),
    )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// HTTP Basic guard in front of the Swagger UI and the JSON document.
async fn swagger_auth(
    globals: Extension<GlobalArgs>,
    request: Request,
    next: Next,
) -> Response {
    if basic_auth_matches(request.headers(), &globals) {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, "Basic realm=\"api-docs\"")],
    )
        .into_response()
}

fn basic_auth_matches(headers: &HeaderMap, globals: &GlobalArgs) -> bool {
    let (Some(username), Some(password)) = (&globals.swagger_username, &globals.swagger_password)
    else {
        return false;
    };

    let Some(encoded) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
    else {
        return false;
    };

    let Ok(decoded) = Base64::decode_vec(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    decoded
        .split_once(':')
        .is_some_and(|(user, pass)| user == username && pass == password.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use secrecy::SecretString;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn globals() -> GlobalArgs {
        GlobalArgs::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            PathBuf::from("/tmp/shopdesk-router-tests"),
        )
        .with_swagger_credentials("docs".to_string(), SecretString::from("s3cret".to_string()))
    }

    fn lazy_pool() -> Option<PgPool> {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(300))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .ok()
    }

    async fn send(app: Router, request: Request<Body>) -> Option<Response> {
        app.oneshot(request).await.ok()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap_or_default()
    }

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert!(statements.len() > 5);
        assert!(statements.iter().all(|s| s.ends_with(';')));
        assert!(statements.iter().all(|s| !s.starts_with("--")));
        assert!(statements
            .iter()
            .any(|s| s.contains("variants_single_default")));
    }

    #[test]
    fn split_keeps_multiline_statements_together() {
        let sql = "-- header; with a semicolon\nCREATE TABLE a (\n  id INT\n);\n\nSELECT 1;\nSELECT 2";
        assert_eq!(
            split_sql_statements(sql),
            vec![
                "CREATE TABLE a (\n  id INT\n);".to_string(),
                "SELECT 1;".to_string(),
                "SELECT 2".to_string(),
            ]
        );
    }

    #[test]
    fn basic_auth_checks_both_parts() {
        let globals = globals();
        let mut headers = HeaderMap::new();
        assert!(!basic_auth_matches(&headers, &globals));

        let good = Base64::encode_string(b"docs:s3cret");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {good}")).unwrap_or(HeaderValue::from_static("")),
        );
        assert!(basic_auth_matches(&headers, &globals));

        let bad = Base64::encode_string(b"docs:wrong");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {bad}")).unwrap_or(HeaderValue::from_static("")),
        );
        assert!(!basic_auth_matches(&headers, &globals));
    }

    #[tokio::test]
    async fn root_and_request_id() {
        let Some(pool) = lazy_pool() else {
            return;
        };
        let Some(response) = send(router(pool, &globals()), request("GET", "/")).await else {
            return;
        };
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        assert_eq!(&bytes[..], b"Welcome to the shopdesk API");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let Some(pool) = lazy_pool() else {
            return;
        };
        let Some(response) = send(router(pool, &globals()), request("GET", "/nope")).await else {
            return;
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn swagger_requires_basic_auth() {
        let Some(pool) = lazy_pool() else {
            return;
        };
        let app = router(pool, &globals());

        let Some(response) = send(app.clone(), request("GET", "/api-docs/openapi.json")).await
        else {
            return;
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));

        let credentials = Base64::encode_string(b"docs:s3cret");
        let authorized = Request::builder()
            .uri("/api-docs/openapi.json")
            .header(AUTHORIZATION, format!("Basic {credentials}"))
            .body(Body::empty())
            .unwrap_or_default();
        let Some(response) = send(app, authorized).await else {
            return;
        };
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_route_without_token_is_401() {
        let Some(pool) = lazy_pool() else {
            return;
        };
        let Some(response) = send(
            router(pool, &globals()),
            request("GET", "/api/v1/admin/category"),
        )
        .await
        else {
            return;
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
        assert_eq!(body["success"], false);
    }
}
