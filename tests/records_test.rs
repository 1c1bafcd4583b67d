//! Integration tests for the repository facade over the journal records.

use rowboat::journal::{Author, Post};
use rowboat::testing::TestHarness;
use rowboat_common::ScopeStrategy;
use rowboat_db::config::{ConfigSource, GroupConfig, DEFAULT_GROUP};
use rowboat_db::repo::Repository;
use rowboat_db::value::Value;

#[test]
fn find_all_on_fresh_database_is_empty() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    let posts = Repository::<Post>::find_all(&scope).unwrap();
    assert!(posts.is_empty());
    harness.close(scope);
}

#[test]
fn save_then_find_all_in_same_scope() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    let post = Post::new("Launch day", "We shipped the first release.", true);
    Repository::<Post>::save(&scope, &post).unwrap();

    let posts = Repository::<Post>::find_all(&scope).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, post.id);
    assert_eq!(posts[0].title, "Launch day");
    assert!(posts[0].published);
    harness.close(scope);
}

#[test]
fn saved_records_survive_scope_close() {
    let harness = TestHarness::new();

    let scope = harness.scope();
    let post = Post::new("Durable", "Written in scope one.", false);
    Repository::<Post>::save(&scope, &post).unwrap();
    harness.close(scope);

    let scope = harness.scope();
    let posts = Repository::<Post>::find_all(&scope).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Durable");
    harness.close(scope);
}

#[test]
fn save_delete_all_find_all_is_empty() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    Repository::<Post>::save(&scope, &Post::new("One", "body", false)).unwrap();
    Repository::<Post>::save(&scope, &Post::new("Two", "body", false)).unwrap();
    let deleted = Repository::<Post>::delete_all(&scope).unwrap();
    assert_eq!(deleted, 2);

    let posts = Repository::<Post>::find_all(&scope).unwrap();
    assert!(posts.is_empty());
    harness.close(scope);
}

#[test]
fn excerpt_is_computed_on_load() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    let long_body = "x".repeat(200);
    let post = Post::new("Long", &long_body, false);
    assert!(post.excerpt.is_none());
    Repository::<Post>::save(&scope, &post).unwrap();

    let loaded = Repository::<Post>::find_by_key(&scope, &Value::from(post.id.as_str()))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.excerpt.as_deref(), Some("x".repeat(64).as_str()));
    harness.close(scope);
}

#[test]
fn save_is_an_upsert() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    let mut post = Post::new("Draft", "first pass", false);
    Repository::<Post>::save(&scope, &post).unwrap();
    post.title = "Final".to_string();
    post.published = true;
    Repository::<Post>::save(&scope, &post).unwrap();

    let posts = Repository::<Post>::find_all(&scope).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Final");
    harness.close(scope);
}

#[test]
fn authors_and_posts_are_independent_tables() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    Repository::<Author>::save(&scope, &Author::new("ada", Some("ada@example.org"))).unwrap();
    Repository::<Post>::save(&scope, &Post::new("Hello", "body", false)).unwrap();

    assert_eq!(Repository::<Author>::count(&scope).unwrap(), 1);
    assert_eq!(Repository::<Post>::count(&scope).unwrap(), 1);

    Repository::<Post>::delete_all(&scope).unwrap();
    assert_eq!(Repository::<Author>::count(&scope).unwrap(), 1);
    harness.close(scope);
}

#[test]
fn nullable_columns_round_trip() {
    let harness = TestHarness::new();
    let scope = harness.scope();

    let author = Author::new("anon", None);
    Repository::<Author>::save(&scope, &author).unwrap();

    let loaded = Repository::<Author>::find_by_key(&scope, &Value::from(author.id.as_str()))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.name, "anon");
    assert!(loaded.email.is_none());
    harness.close(scope);
}

#[test]
fn startup_properties_are_observable_unchanged() {
    let source = ConfigSource::builder()
        .group(
            DEFAULT_GROUP,
            GroupConfig::in_memory().property("show_sql", "true"),
        )
        .strategy(ScopeStrategy::PerRequest)
        .build();
    let harness = TestHarness::with_source(source);

    let config = harness.registry.resolved_config(DEFAULT_GROUP).unwrap();
    assert_eq!(config.properties().get("show_sql").unwrap(), "true");
}
