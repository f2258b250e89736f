mod common;

use common::{insert, rec, seed_post, setup, state};
use record_sdk::{AppError, CreateOutcome, Direction, Limit, UserSession};
use serde_json::json;

#[tokio::test]
async fn create_then_read_by_returned_key() {
    let (_state, mut ctx) = setup().await;
    let id = insert(&mut ctx, "users", json!({ "name": "x" })).await;

    let mut user = ctx.model("users").unwrap();
    user.filter(id.clone());
    ctx.read(&mut user).await.unwrap();
    assert!(user.is_single());
    assert!(!user.is_list());
    assert_eq!(user.value("name"), Some(&json!("x")));
    assert_eq!(user.primary_key(), Some(&id));
}

#[tokio::test]
async fn create_strips_numeric_key_and_stamps_created() {
    let (_state, mut ctx) = setup().await;
    let mut post = ctx.model("posts").unwrap();
    post.set("id", "77").set("title", "stamped");
    let outcome = ctx.create(&mut post, None).await.unwrap();
    assert!(outcome.inserted());
    assert_ne!(post.primary_key(), Some(&json!("77")));
    assert!(post.value("created").and_then(|v| v.as_str()).is_some());

    let mut loaded = ctx.model("posts").unwrap();
    loaded.filter(post.primary_key().cloned().unwrap()).with_relations(false);
    ctx.read(&mut loaded).await.unwrap();
    assert_eq!(loaded.value("created"), post.value("created"));
}

#[tokio::test]
async fn bare_key_reads_a_single_record() {
    let (_state, mut ctx) = setup().await;
    for name in ["a", "b", "c", "d", "e"] {
        insert(&mut ctx, "users", json!({ "name": name })).await;
    }
    let mut user = ctx.model("users").unwrap();
    user.filter(5);
    assert_eq!(user.query().limit_intent(), Some(Limit::One));
    ctx.read(&mut user).await.unwrap();
    assert!(!user.is_list());
    assert_eq!(user.value("name"), Some(&json!("e")));
    assert_eq!(ctx.statements()[ctx.statements().len() - 2], "SELECT * FROM users WHERE id = ?");
}

#[tokio::test]
async fn zero_row_single_read_is_a_no_op() {
    let (_state, mut ctx) = setup().await;
    let mut user = ctx.model("users").unwrap();
    user.filter(404);
    ctx.read(&mut user).await.unwrap();
    assert!(user.is_read());
    assert_eq!(user.count(), 0);
}

#[tokio::test]
async fn duplicate_submission_inserts_once() {
    let (_state, mut ctx) = setup().await;
    let mut first = ctx.model("notes").unwrap();
    let outcome = ctx.create(&mut first, Some(rec(json!({ "body": "same" })))).await.unwrap();
    assert!(outcome.inserted());

    let mut second = ctx.model("notes").unwrap();
    let outcome = ctx.create(&mut second, Some(rec(json!({ "body": "same" })))).await.unwrap();
    assert_eq!(outcome, CreateOutcome::Duplicate);

    let notes = ctx.model("notes").unwrap();
    assert_eq!(ctx.count(&notes).await.unwrap(), 1);
    assert_eq!(ctx.statements_starting_with("INSERT INTO notes"), 1);
}

#[tokio::test]
async fn user_specific_models_are_scoped_to_the_session() {
    let state = state(false).await;
    let mut alice = state.context(UserSession::for_user(1));
    let mut bob = state.context(UserSession::for_user(2));
    insert(&mut alice, "notes", json!({ "body": "alice" })).await;
    insert(&mut bob, "notes", json!({ "body": "bob 1" })).await;
    insert(&mut bob, "notes", json!({ "body": "bob 2" })).await;

    let mut notes = alice.model("notes").unwrap();
    alice.read(&mut notes).await.unwrap();
    assert_eq!(notes.count(), 1);
    assert_eq!(notes.items()[0].value("users_id"), Some(&json!(1)));
    assert!(alice.statements().last().unwrap().contains("users_id = ?"));

    let notes = bob.model("notes").unwrap();
    assert_eq!(bob.count(&notes).await.unwrap(), 2);
}

#[tokio::test]
async fn user_scope_is_and_joined_under_or() {
    let (_state, mut ctx) = setup().await;
    insert(&mut ctx, "notes", json!({ "body": "mine" })).await;
    let mut notes = ctx.model("notes").unwrap();
    notes.filter_op(json!({ "body": ["mine", "other"] }), record_sdk::Operator::Or);
    ctx.read(&mut notes).await.unwrap();
    assert_eq!(notes.count(), 1);
    assert!(ctx
        .statements()
        .last()
        .unwrap()
        .starts_with("SELECT * FROM notes WHERE (body = ? OR body = ?) AND users_id = ?"));
}

#[tokio::test]
async fn update_writes_only_the_delta() {
    let (_state, mut ctx) = setup().await;
    let post_id = seed_post(&mut ctx).await;

    let mut post = ctx.model("posts").unwrap();
    post.filter(post_id.clone()).with_relations(false);
    ctx.read(&mut post).await.unwrap();
    ctx.update(&mut post, Some(rec(json!({ "title": "renamed" }))), None)
        .await
        .unwrap();
    let stmt = ctx.statements().last().unwrap().clone();
    assert!(stmt.starts_with("UPDATE blog_posts SET users_id = ?, title = ?, score = ?, updated = ?"));
    assert!(!stmt.contains("created ="));

    let mut fresh = ctx.model("posts").unwrap();
    fresh.filter(post_id).with_relations(false);
    ctx.read(&mut fresh).await.unwrap();
    assert_eq!(fresh.value("title"), Some(&json!("renamed")));
    assert!(fresh.value("updated").map_or(false, |v| !v.is_null()));
}

#[tokio::test]
async fn bulk_update_by_filter() {
    let (_state, mut ctx) = setup().await;
    for score in [1, 1, 2] {
        insert(&mut ctx, "posts", json!({ "title": "t", "score": score })).await;
    }
    let mut posts = ctx.model("posts").unwrap();
    ctx.update(&mut posts, Some(rec(json!({ "title": "low" }))), Some(json!({ "score": 1 }).into()))
        .await
        .unwrap();

    let mut low = ctx.model("posts").unwrap();
    low.filter(json!({ "title": "low" })).with_relations(false);
    assert_eq!(ctx.count(&low).await.unwrap(), 2);
}

#[tokio::test]
async fn update_runs_validation() {
    let (_state, mut ctx) = setup().await;
    let id = insert(&mut ctx, "posts", json!({ "title": "ok" })).await;
    let mut post = ctx.model("posts").unwrap();
    post.filter(id).with_relations(false);
    ctx.read(&mut post).await.unwrap();
    let long = "x".repeat(41);
    let err = ctx
        .update(&mut post, Some(rec(json!({ "title": long }))), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn create_rejects_missing_required_field() {
    let (_state, mut ctx) = setup().await;
    let mut post = ctx.model("posts").unwrap();
    let err = ctx.create(&mut post, Some(rec(json!({ "score": 1 })))).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(ctx.statements_starting_with("INSERT"), 0);
}

#[tokio::test]
async fn paginate_counts_then_windows_the_read() {
    let (_state, mut ctx) = setup().await;
    for i in 1..=5 {
        insert(&mut ctx, "users", json!({ "name": format!("u{i}") })).await;
    }
    let mut users = ctx.model("users").unwrap();
    users.with_relations(false);
    let pages = ctx.paginate(&mut users, Some(2), Some(2)).await.unwrap();
    assert_eq!(pages, 3);
    assert!(ctx.statements().last().unwrap().starts_with("SELECT COUNT(*) AS count FROM users"));

    ctx.read(&mut users).await.unwrap();
    assert_eq!(ctx.statements().last().unwrap(), "SELECT * FROM users ORDER BY id ASC LIMIT 2,2");
    let names: Vec<_> = users.items().iter().map(|u| u.value("name").cloned()).collect();
    assert_eq!(names, vec![Some(json!("u3")), Some(json!("u4"))]);
}

#[tokio::test]
async fn paginate_defaults_to_session_page() {
    let state = state(false).await;
    let mut ctx = state.context(UserSession::for_user(1).with_page(2));
    for i in 1..=12 {
        insert(&mut ctx, "tags", json!({ "label": format!("t{i}") })).await;
    }
    let mut tags = ctx.model("tags").unwrap();
    ctx.read(&mut tags).await.unwrap();
    let pages = ctx.paginate(&mut tags, None, None).await.unwrap();
    assert_eq!(pages, 2);
    assert_eq!(tags.count(), 2);
    assert_eq!(tags.items()[0].value("label"), Some(&json!("t11")));
}

#[tokio::test]
async fn order_after_read_sorts_in_memory() {
    let (_state, mut ctx) = setup().await;
    for (title, score) in [("a", 2), ("b", 9), ("c", 2)] {
        insert(&mut ctx, "posts", json!({ "title": title, "score": score })).await;
    }
    let mut posts = ctx.model("posts").unwrap();
    posts.with_relations(false);
    ctx.read(&mut posts).await.unwrap();
    let before = ctx.statements().len();
    posts.order("score", Direction::Desc);
    assert_eq!(ctx.statements().len(), before);
    let titles: Vec<_> = posts.items().iter().filter_map(|p| p.value("title").cloned()).collect();
    assert_eq!(titles, vec![json!("b"), json!("a"), json!("c")]);
}

#[tokio::test]
async fn read_columns_selects_only_those_columns() {
    let (_state, mut ctx) = setup().await;
    insert(&mut ctx, "posts", json!({ "title": "cols", "score": 4 })).await;
    let mut posts = ctx.model("posts").unwrap();
    posts.with_relations(false);
    ctx.read_columns(&mut posts, &["id", "title"]).await.unwrap();
    assert_eq!(ctx.statements().last().unwrap(), "SELECT id, title FROM blog_posts ORDER BY id ASC");
    let first = &posts.items()[0];
    assert_eq!(first.value("title"), Some(&json!("cols")));
    assert!(first.value("score").is_none());
}

#[tokio::test]
async fn delete_without_filter_is_refused() {
    let (_state, mut ctx) = setup().await;
    insert(&mut ctx, "tags", json!({ "label": "keep" })).await;
    let mut tags = ctx.model("tags").unwrap();
    let err = ctx.delete(&mut tags, None).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let tags = ctx.model("tags").unwrap();
    assert_eq!(ctx.count(&tags).await.unwrap(), 1);
}

#[tokio::test]
async fn update_without_filter_is_refused() {
    let (_state, mut ctx) = setup().await;
    insert(&mut ctx, "tags", json!({ "label": "keep" })).await;
    let mut tags = ctx.model("tags").unwrap();
    let err = ctx
        .update(&mut tags, Some(rec(json!({ "label": "all" }))), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(ctx.statements_starting_with("UPDATE"), 0);

    let mut kept = ctx.model("tags").unwrap();
    kept.filter(json!({ "label": "keep" }));
    assert_eq!(ctx.count(&kept).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_statement_is_not_found_in_production() {
    let (_state, mut ctx) = setup().await;
    let mut ghosts = ctx.model("ghosts").unwrap();
    let err = ctx.read(&mut ghosts).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn failed_statement_carries_sql_in_debug_mode() {
    let state = state(true).await;
    let mut ctx = state.context(UserSession::anonymous());
    let mut ghosts = ctx.model("ghosts").unwrap();
    ghosts.filter(json!({ "name": "boo" }));
    match ctx.read(&mut ghosts).await.unwrap_err() {
        AppError::Query { sql, params, .. } => {
            assert_eq!(sql, "SELECT * FROM ghosts WHERE name = 'boo' ORDER BY id ASC");
            assert_eq!(params, r#"["boo"]"#);
        }
        other => panic!("expected a query error, got {other:?}"),
    }
}
