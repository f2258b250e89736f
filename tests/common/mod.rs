#![allow(dead_code)]

use record_sdk::config::load_layers;
use record_sdk::{apply_migrations, AppState, Context, CreateOutcome, Model, Record, UserSession};
use serde_json::{json, Value};

pub fn blog_config(debug: bool) -> Value {
    json!({
        "database": { "url": "sqlite::memory:", "debug": debug },
        "pagination": { "per_page": 10 },
        "models": {
            "users": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "name": "TEXT"
                },
                "relations": {
                    "profile": { "type": "has_one", "model": "profiles" }
                }
            },
            "profiles": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "users_id": "INTEGER",
                    "bio": "TEXT"
                }
            },
            "posts": {
                "table": "blog_posts",
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "users_id": "INTEGER",
                    "title": "TEXT NOT NULL",
                    "score": "INTEGER",
                    "created": "TEXT",
                    "updated": "TEXT"
                },
                "relations": {
                    "users": { "type": "belongs_to", "mount": "author" },
                    "comments": { "type": "has_many", "cascade": true },
                    "tags": { "type": "many_to_many", "bridge": "posts_tags" }
                },
                "validation": {
                    "title": { "required": true, "max_length": 40 }
                }
            },
            "comments": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "posts_id": "INTEGER",
                    "users_id": "INTEGER",
                    "body": "TEXT"
                },
                "relations": {
                    "users": { "type": "belongs_to", "flatten": true }
                }
            },
            "tags": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "label": "TEXT"
                }
            },
            "posts_tags": {
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "posts_id": "INTEGER",
                    "tags_id": "INTEGER",
                    "position": "INTEGER"
                }
            },
            "notes": {
                "user_specific": true,
                "prevent_duplicate": true,
                "schema": {
                    "id": "INTEGER PRIMARY KEY AUTOINCREMENT",
                    "users_id": "INTEGER",
                    "body": "TEXT"
                }
            },
            "ghosts": {}
        }
    })
}

/// Route library events to the test harness; `RUST_LOG=record_sdk=debug` shows statements.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn state(debug: bool) -> AppState {
    state_with(debug, json!({})).await
}

/// Like `state`, with `overrides` merged over the blog config.
pub async fn state_with(debug: bool, overrides: Value) -> AppState {
    init_tracing();
    let config = load_layers(vec![blog_config(debug), overrides]).unwrap();
    let state = AppState::connect(&config).await.unwrap();
    let mut ctx = state.context(UserSession::anonymous());
    apply_migrations(&mut ctx).await.unwrap();
    state
}

/// Migrated in-memory database and a context signed in as user 1.
pub async fn setup() -> (AppState, Context) {
    let state = state(false).await;
    let ctx = state.context(UserSession::for_user(1));
    (state, ctx)
}

pub fn rec(v: Value) -> Record {
    match v {
        Value::Object(map) => map.into(),
        other => panic!("expected an object, got {other}"),
    }
}

/// Insert a row and return its generated key.
pub async fn insert(ctx: &mut Context, model: &str, fields: Value) -> Value {
    let mut m: Model = ctx.model(model).unwrap();
    match ctx.create(&mut m, Some(rec(fields))).await.unwrap() {
        CreateOutcome::Inserted { id: Some(id) } => id,
        other => panic!("insert into {model} did not return a key: {other:?}"),
    }
}

/// One post by user 1 with three comments and two bridge rows pointing at the same tag.
pub async fn seed_post(ctx: &mut Context) -> Value {
    let user = insert(ctx, "users", json!({ "name": "ada" })).await;
    let post = insert(ctx, "posts", json!({ "title": "hello", "users_id": user, "score": 3 })).await;
    for body in ["one", "two", "three"] {
        insert(ctx, "comments", json!({ "posts_id": post, "users_id": user, "body": body })).await;
    }
    let tag = insert(ctx, "tags", json!({ "label": "rust" })).await;
    for _ in 0..2 {
        insert(ctx, "posts_tags", json!({ "posts_id": post, "tags_id": tag, "position": 1 })).await;
    }
    post
}
