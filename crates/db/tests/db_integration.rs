//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `relaypix_test`)
//!   `TEST_DB_PASSWORD` (default: `relaypix_test`)
//!   `TEST_DB_NAME` (default: `relaypix_test`)

#![allow(clippy::unwrap_used)]

use relaypix_db::entities::image;
use relaypix_db::repositories::{ImageListFilter, ImageRepository};
use relaypix_db::test_utils::TestDatabase;
use sea_orm::Set;

fn sample_row(id: &str, folder: &str, digest: Option<&str>) -> image::ActiveModel {
    image::ActiveModel {
        id: Set(id.to_string()),
        file_id: Set(format!("relay-{id}")),
        thumb_file_id: Set(None),
        short_code: Set(format!("sc{id}")),
        tags: Set("default".to_string()),
        filename: Set(format!("{id}.jpg")),
        size: Set(1024),
        folder: Set(folder.to_string()),
        content_type: Set("image/jpeg".to_string()),
        digest: Set(digest.map(std::string::ToString::to_string)),
        expires_at: Set(None),
        created_at: Set(chrono::Utc::now().into()),
    }
}

async fn setup() -> (TestDatabase, ImageRepository) {
    let db = TestDatabase::create_unique().await.unwrap();
    relaypix_db::migrate(db.connection()).await.unwrap();
    let repo = ImageRepository::new(db.connection_arc());
    (db, repo)
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_rename_folder_moves_descendants_only() {
    let (db, repo) = setup().await;

    repo.create(sample_row("a1", "/a/", None)).await.unwrap();
    repo.create(sample_row("a2", "/a/sub/", None)).await.unwrap();
    repo.create(sample_row("c1", "/c/", None)).await.unwrap();

    let affected = repo.rename_folder("/a/", "/b/").await.unwrap();
    assert_eq!(affected, 2);

    assert_eq!(repo.get_by_id("a1").await.unwrap().folder, "/b/");
    assert_eq!(repo.get_by_id("a2").await.unwrap().folder, "/b/sub/");
    assert_eq!(repo.get_by_id("c1").await.unwrap().folder, "/c/");

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_folder_removes_subtree() {
    let (db, repo) = setup().await;

    repo.create(sample_row("a1", "/a/", None)).await.unwrap();
    repo.create(sample_row("a2", "/a/sub/", None)).await.unwrap();
    repo.create(sample_row("c1", "/c/", None)).await.unwrap();

    let deleted = repo.delete_folder("/a/").await.unwrap();
    assert_eq!(deleted, 2);

    assert!(repo.find_by_id("a1").await.unwrap().is_none());
    assert!(repo.find_by_id("a2").await.unwrap().is_none());
    assert!(repo.find_by_id("c1").await.unwrap().is_some());

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_move_rewrites_exactly_the_given_ids() {
    let (db, repo) = setup().await;

    repo.create(sample_row("a1", "/a/", None)).await.unwrap();
    repo.create(sample_row("a2", "/a/", None)).await.unwrap();

    let moved = repo
        .move_to_folder(&["a1".to_string()], "/target/")
        .await
        .unwrap();
    assert_eq!(moved, 1);
    assert_eq!(repo.get_by_id("a1").await.unwrap().folder, "/target/");
    assert_eq!(repo.get_by_id("a2").await.unwrap().folder, "/a/");

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_list_folders_returns_distinct_paths() {
    let (db, repo) = setup().await;

    repo.create(sample_row("a1", "/a/", None)).await.unwrap();
    repo.create(sample_row("a2", "/a/", None)).await.unwrap();
    repo.create(sample_row("c1", "/c/", None)).await.unwrap();

    let folders = repo.list_folders().await.unwrap();
    assert_eq!(folders, vec!["/a/".to_string(), "/c/".to_string()]);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_find_page_filters_by_folder() {
    let (db, repo) = setup().await;

    repo.create(sample_row("a1", "/a/", None)).await.unwrap();
    repo.create(sample_row("c1", "/c/", None)).await.unwrap();

    let filter = ImageListFilter {
        folder: Some("/a/".to_string()),
        ..Default::default()
    };
    let page = repo.find_page(1, 10, &filter).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "a1");

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_enumerate_page_walks_whole_catalog() {
    let (db, repo) = setup().await;

    for i in 0..5 {
        repo.create(sample_row(&format!("e{i}"), "/", None))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = repo.enumerate_page(after.as_deref(), 2).await.unwrap();
        if page.is_empty() {
            break;
        }
        after = page.last().map(|m| m.id.clone());
        seen.extend(page.into_iter().map(|m| m.id));
    }

    assert_eq!(seen.len(), 5);

    db.drop_database().await.unwrap();
}
