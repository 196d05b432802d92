//! Integration tests for the reason repositories
//!
//! Every property is checked against all three backends on a fresh database:
//! - id assignment and uniqueness
//! - creation stamp and default active flag
//! - update scope and delete idempotence
//! - filtering and paging, including cross-backend equivalence
//! - storage failures surface as errors, not empty results

mod common;

use chrono::{TimeZone, Utc};
use common::{fresh_backends, names, seed, TestDatabase};
use core_reasons::{FilterOptions, PageRequest, Reason, ReasonError, ReasonRepository};
use core_reasons::{CommandReasonRepository, MappedReasonRepository, TrackedReasonRepository};
use std::collections::HashSet;

#[tokio::test]
async fn test_add_assigns_distinct_positive_ids() {
    for (_db, repository) in fresh_backends().await {
        let saved = seed(repository.as_ref(), &["a", "b", "c", "d"]).await;

        let ids: HashSet<i64> = saved.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 4, "{}", repository.backend());
        assert!(ids.iter().all(|id| *id > 0));
    }
}

#[tokio::test]
async fn test_ids_are_never_reused_after_delete() {
    for (_db, repository) in fresh_backends().await {
        let first = repository.add(Reason::new("first"), None).await.unwrap();
        assert!(repository.delete(first.id, None).await.unwrap());

        let second = repository.add(Reason::new("second"), None).await.unwrap();

        assert!(second.id > first.id, "{}", repository.backend());
    }
}

#[tokio::test]
async fn test_created_at_falls_inside_the_call() {
    for (_db, repository) in fresh_backends().await {
        let before = Utc::now();
        let mut input = Reason::new("Lost Card");
        input.created_at = before.fixed_offset() - chrono::Duration::days(365);

        let saved = repository.add(input, None).await.unwrap();
        let after = Utc::now();

        let stored = repository.get_by_id(saved.id, None).await.unwrap();
        assert!(stored.created_at >= before, "{}", repository.backend());
        assert!(stored.created_at <= after, "{}", repository.backend());
        assert_eq!(stored.created_at.offset().local_minus_utc(), 0, "{}", repository.backend());
    }
}

#[tokio::test]
async fn test_missing_active_defaults_to_true() {
    for (_db, repository) in fresh_backends().await {
        let inactive = repository
            .add(Reason::new("off").with_active(false), None)
            .await
            .unwrap();
        let unspecified = repository.add(Reason::new("on"), None).await.unwrap();

        let inactive = repository.get_by_id(inactive.id, None).await.unwrap();
        let unspecified = repository.get_by_id(unspecified.id, None).await.unwrap();

        assert_eq!(inactive.active, Some(false), "{}", repository.backend());
        assert_eq!(unspecified.active, Some(true), "{}", repository.backend());
    }
}

#[tokio::test]
async fn test_get_by_id_round_trips_every_field() {
    for (_db, repository) in fresh_backends().await {
        let saved = repository
            .add(Reason::new("Forgotten PIN").with_created_by("teller-3"), None)
            .await
            .unwrap();

        let stored = repository.get_by_id(saved.id, None).await.unwrap();

        assert_eq!(stored, saved, "{}", repository.backend());
    }
}

#[tokio::test]
async fn test_absent_id_is_soft() {
    for (_db, repository) in fresh_backends().await {
        assert!(repository.find_by_id(999, None).await.unwrap().is_none());
        assert!(repository.get_by_id(999, None).await.unwrap().is_sentinel());
        assert!(!repository.delete(999, None).await.unwrap());

        let ghost = Reason {
            id: 999,
            ..Reason::new("ghost")
        };
        assert!(!repository.update(&ghost, None).await.unwrap());
    }
}

#[tokio::test]
async fn test_update_changes_name_and_active_only() {
    for (_db, repository) in fresh_backends().await {
        let saved = repository
            .add(Reason::new("Lost Card").with_created_by("teller-1"), None)
            .await
            .unwrap();

        let changed = Reason {
            name: Some("Lost Card (reported)".into()),
            active: Some(false),
            created_by: Some("auditor".into()),
            ..saved.clone()
        };
        assert!(repository.update(&changed, None).await.unwrap());

        let stored = repository.get_by_id(saved.id, None).await.unwrap();
        assert_eq!(stored.name.as_deref(), Some("Lost Card (reported)"));
        assert_eq!(stored.active, Some(false));
        assert_eq!(stored.created_by.as_deref(), Some("teller-1"));
        assert_eq!(stored.created_at, saved.created_at);
    }
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    for (_db, repository) in fresh_backends().await {
        let saved = repository.add(Reason::new("temporary"), None).await.unwrap();

        assert!(repository.delete(saved.id, None).await.unwrap());
        assert!(!repository.delete(saved.id, None).await.unwrap());
        assert!(repository.find_by_id(saved.id, None).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_get_all_is_newest_first() {
    for (_db, repository) in fresh_backends().await {
        seed(repository.as_ref(), &["one", "two", "three"]).await;

        let all = repository.get_all(None).await.unwrap();

        assert_eq!(names(&all), vec!["three", "two", "one"]);
    }
}

#[tokio::test]
async fn test_filter_is_case_sensitive_substring() {
    for (_db, repository) in fresh_backends().await {
        seed(repository.as_ref(), &["Lost Card", "Stolen Card", "Forgotten PIN"]).await;

        let page = repository
            .get_articles(&PageRequest::new(0, 10).with_search("Card"), None)
            .await
            .unwrap();
        assert_eq!(page.total_count, 2, "{}", repository.backend());
        assert_eq!(names(&page.items), vec!["Stolen Card", "Lost Card"]);

        let page = repository
            .get_articles(&PageRequest::new(0, 10).with_search("card"), None)
            .await
            .unwrap();
        assert_eq!(page.total_count, 0, "{}", repository.backend());
    }
}

#[tokio::test]
async fn test_blank_search_matches_everything() {
    for (_db, repository) in fresh_backends().await {
        seed(repository.as_ref(), &["Lost Card", "Forgotten PIN"]).await;
        let mut unnamed = Reason::new("x");
        unnamed.name = None;
        repository.add(unnamed, None).await.unwrap();

        let page = repository
            .get_by(&FilterOptions::new(0, 10).with_search("   "), None)
            .await
            .unwrap();
        assert_eq!(page.total_count, 3, "{}", repository.backend());

        let page = repository
            .get_by(&FilterOptions::new(0, 10).with_search("PIN"), None)
            .await
            .unwrap();
        assert_eq!(page.total_count, 1, "{}", repository.backend());
    }
}

#[tokio::test]
async fn test_last_partial_page() {
    for (_db, repository) in fresh_backends().await {
        let names_owned: Vec<String> = (1..=25).map(|i| format!("Reason {i:02}")).collect();
        let names_ref: Vec<&str> = names_owned.iter().map(String::as_str).collect();
        let saved = seed(repository.as_ref(), &names_ref).await;
        let backend = repository.backend();

        let mut article_sizes = Vec::new();
        let mut filtered_sizes = Vec::new();
        for page_index in 0..=3 {
            let articles = repository
                .get_articles(&PageRequest::new(page_index, 10), None)
                .await
                .unwrap();
            assert_eq!(articles.total_count, 25, "{backend} page {page_index}");
            article_sizes.push(articles.items.len());

            let filtered = repository
                .get_by(&FilterOptions::new(page_index, 10), None)
                .await
                .unwrap();
            assert_eq!(filtered.total_count, 25, "{backend} page {page_index}");
            filtered_sizes.push(filtered.items.len());

            if page_index == 2 {
                let expected: Vec<i64> = saved.iter().take(5).rev().map(|r| r.id).collect();
                let got: Vec<i64> = articles.items.iter().map(|r| r.id).collect();
                assert_eq!(got, expected, "{backend}");
            }
        }

        assert_eq!(article_sizes, [10, 10, 5, 0], "{backend}");
        assert_eq!(filtered_sizes, [10, 10, 5, 0], "{backend}");
    }
}

#[tokio::test]
async fn test_hand_written_timestamp_reads_the_same_everywhere() {
    let db = TestDatabase::new().await;
    let pool = sqlx::SqlitePool::connect(&db.url).await.unwrap();
    sqlx::query("INSERT INTO Reasons (Active, CreatedAt, Name) VALUES (1, '2024-03-01T08:00:00', 'Imported')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap().fixed_offset();
    for repository in db.backends() {
        let all = repository.get_all(None).await.unwrap();

        assert_eq!(all.len(), 1, "{}", repository.backend());
        assert_eq!(all[0].created_at, expected, "{}", repository.backend());
        assert_eq!(all[0].created_at.offset().local_minus_utc(), 0);
    }
}

#[tokio::test]
async fn test_backends_agree() {
    let db = TestDatabase::new().await;
    let backends = db.backends();
    seed(
        backends[0].as_ref(),
        &["Lost Card", "Stolen Card", "Forgotten PIN", "Card expired", "Moved"],
    )
    .await;

    let requests = [
        PageRequest::new(0, 2),
        PageRequest::new(1, 2),
        PageRequest::new(0, 10).with_search("Card"),
        PageRequest::new(1, 1).with_search("Card"),
        PageRequest::new(0, 0),
    ];

    for request in &requests {
        let pages: Vec<_> = pages_from_each(&backends, request).await;
        for page in &pages[1..] {
            assert_eq!(page.total_count, pages[0].total_count, "{request:?}");
            assert_eq!(page.items, pages[0].items, "{request:?}");
        }
    }

    let mut lists = Vec::new();
    for repository in &backends {
        lists.push(repository.get_all(None).await.unwrap());
    }
    assert_eq!(lists[0], lists[1]);
    assert_eq!(lists[1], lists[2]);
}

async fn pages_from_each(
    backends: &[Box<dyn ReasonRepository>],
    request: &PageRequest,
) -> Vec<core_reasons::ArticleSet<Reason, u32>> {
    let mut pages = Vec::with_capacity(backends.len());
    for repository in backends {
        pages.push(repository.get_articles(request, None).await.unwrap());
    }
    pages
}

#[tokio::test]
async fn test_connection_override_applies_to_one_call() {
    let primary = TestDatabase::new().await;
    let secondary = TestDatabase::new().await;

    for repository in primary.backends() {
        let saved = repository
            .add(Reason::new("elsewhere"), Some(&secondary.url))
            .await
            .unwrap();

        assert!(repository.find_by_id(saved.id, None).await.unwrap().is_none());
        assert!(repository
            .find_by_id(saved.id, Some(&secondary.url))
            .await
            .unwrap()
            .is_some());
        assert!(repository.delete(saved.id, Some(&secondary.url)).await.unwrap());
    }
}

#[tokio::test]
async fn test_unreachable_storage_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite:{}",
        dir.path().join("no-such-dir").join("reasons.db").display()
    );
    let backends: Vec<Box<dyn ReasonRepository>> = vec![
        Box::new(CommandReasonRepository::new(&url)),
        Box::new(MappedReasonRepository::new(&url)),
        Box::new(TrackedReasonRepository::new(&url)),
    ];

    for repository in backends {
        let err = repository.get_all(None).await.unwrap_err();
        assert!(err.is_storage_unavailable(), "{}: {err}", repository.backend());

        let err = repository
            .get_articles(&PageRequest::new(0, 10), None)
            .await
            .unwrap_err();
        assert!(err.is_storage_unavailable());
    }
}

#[tokio::test]
async fn test_missing_table_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("empty.db").display());
    let backends: Vec<Box<dyn ReasonRepository>> = vec![
        Box::new(CommandReasonRepository::new(&url)),
        Box::new(MappedReasonRepository::new(&url)),
        Box::new(TrackedReasonRepository::new(&url)),
    ];

    for repository in backends {
        let err = repository.add(Reason::new("x"), None).await.unwrap_err();
        assert!(
            matches!(err, ReasonError::Storage(_) | ReasonError::Bridge(_)),
            "{}: {err}",
            repository.backend()
        );
    }
}
