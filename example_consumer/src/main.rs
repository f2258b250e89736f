//! Demo: seed a small blog into SQLite and serve records as nested JSON.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Extra JSON config layers may follow: `cargo run -p example-consumer -- app.json`

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use record_sdk::config::{apply_env_overrides, load_layers};
use record_sdk::{apply_migrations, AppError, AppState, Context, Record, UserSession};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;

fn framework_defaults() -> Value {
    json!({
        "database": { "url": "sqlite::memory:" },
        "pagination": { "per_page": 10 },
        "models": {
            "users": {
                "schema": { "id": "INTEGER PRIMARY KEY AUTOINCREMENT", "name": "TEXT" }
            },
            "posts": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "users_id": "INTEGER",
                    "title": "TEXT",
                    "created": "TEXT",
                    "updated": "TEXT"
                },
                "relations": {
                    "users": { "type": "belongs_to", "mount": "author" },
                    "comments": { "type": "has_many", "cascade": true }
                }
            },
            "comments": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "posts_id": "INTEGER",
                    "body": "TEXT"
                }
            }
        }
    })
}

fn fields(v: Value) -> Record {
    match v {
        Value::Object(map) => map.into(),
        _ => Record::new(),
    }
}

async fn seed(ctx: &mut Context) -> Result<(), AppError> {
    let mut user = ctx.model("users")?;
    ctx.create(&mut user, Some(fields(json!({ "name": "ada" })))).await?;
    let author = user.primary_key().cloned().unwrap_or(Value::Null);

    let mut post = ctx.model("posts")?;
    ctx.create(&mut post, Some(fields(json!({ "title": "Hello", "users_id": author }))))
        .await?;
    let post_id = post.primary_key().cloned().unwrap_or(Value::Null);
    for body in ["first", "second"] {
        let mut comment = ctx.model("comments")?;
        ctx.create(&mut comment, Some(fields(json!({ "posts_id": post_id, "body": body }))))
            .await?;
    }
    Ok(())
}

async fn list(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let page = params.get("page").and_then(|p| p.parse().ok());
    let mut ctx = state.context(UserSession::anonymous());
    let mut records = ctx.model(&model)?;
    let pages = ctx.paginate(&mut records, None, page).await?;
    ctx.read(&mut records).await?;
    Ok(Json(json!({ "pages": pages, "data": records.to_structured() })))
}

async fn show(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, i64)>,
) -> Result<Json<Value>, AppError> {
    let mut ctx = state.context(UserSession::anonymous());
    let mut record = ctx.model(&model)?;
    record.filter(id);
    ctx.read(&mut record).await?;
    if record.count() == 0 {
        return Err(AppError::NotFound(format!("{} {}", model, id)));
    }
    Ok(Json(record.to_structured()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("record_sdk=debug,example_consumer=info")),
        )
        .init();

    let mut layers = vec![framework_defaults()];
    for path in std::env::args().skip(1) {
        layers.push(serde_json::from_str(&std::fs::read_to_string(&path)?)?);
    }
    let mut config = load_layers(layers)?;
    apply_env_overrides(&mut config);

    let state = AppState::connect(&config).await?;
    let mut ctx = state.context(UserSession::anonymous());
    apply_migrations(&mut ctx).await?;
    seed(&mut ctx).await?;

    let app = Router::new()
        .route("/:model", get(list))
        .route("/:model/:id", get(show))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
