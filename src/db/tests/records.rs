//! Shared tests for RecordRepo implementations
//!
//! Tests are written as async functions that take a test context containing
//! the record repo and a fixture writer for the same database.

use super::harness::{Fixture, SeedRecord};
use crate::{
    db::{
        query::{Column, Comparator, Condition, Delete, Table},
        repos::{Page, RecordRepo},
    },
    models::{AttributeValue, RecordId, ScanFilter},
};

fn ids(raw: &[u64]) -> Vec<RecordId> {
    raw.iter().copied().map(RecordId::new).collect()
}

/// Test context containing the repo under test and its fixture writer
pub struct RecordTestContext<'a> {
    pub repo: &'a dyn RecordRepo,
    pub fixture: &'a dyn Fixture,
}

impl RecordTestContext<'_> {
    async fn seed_attachments(&self, raw: &[u64]) {
        for id in raw {
            self.fixture
                .insert_record(SeedRecord::attachment(*id, &format!("image-{id}")))
                .await;
        }
    }
}

// ============================================================================
// Page Tests
// ============================================================================

pub async fn test_fetch_page_empty(ctx: &RecordTestContext<'_>) {
    let page = ctx
        .repo
        .fetch_page(&ScanFilter::new(), Page::Offset { offset: 0, limit: 10 })
        .await
        .expect("Failed to fetch page");
    assert!(page.is_empty());
}

pub async fn test_fetch_page_offset_ordered_by_id(ctx: &RecordTestContext<'_>) {
    ctx.seed_attachments(&[30, 10, 20, 40, 50]).await;

    let first = ctx
        .repo
        .fetch_page(&ScanFilter::new(), Page::Offset { offset: 0, limit: 2 })
        .await
        .expect("Failed to fetch page");
    let second = ctx
        .repo
        .fetch_page(&ScanFilter::new(), Page::Offset { offset: 2, limit: 2 })
        .await
        .expect("Failed to fetch page");
    let third = ctx
        .repo
        .fetch_page(&ScanFilter::new(), Page::Offset { offset: 4, limit: 2 })
        .await
        .expect("Failed to fetch page");

    let seen: Vec<_> = first
        .iter()
        .chain(&second)
        .chain(&third)
        .map(|r| r.id)
        .collect();
    assert_eq!(seen, ids(&[10, 20, 30, 40, 50]));
    assert_eq!(third.len(), 1);
    assert_eq!(first[0].title, "image-10");
    assert_eq!(first[0].kind, "attachment");
    assert_eq!(first[0].status, "inherit");
}

pub async fn test_fetch_page_keyset(ctx: &RecordTestContext<'_>) {
    ctx.seed_attachments(&[1, 2, 3, 4]).await;

    let page = ctx
        .repo
        .fetch_page(
            &ScanFilter::new(),
            Page::After {
                after: Some(RecordId::new(2)),
                limit: 10,
            },
        )
        .await
        .expect("Failed to fetch page");

    let seen: Vec<_> = page.iter().map(|r| r.id).collect();
    assert_eq!(seen, ids(&[3, 4]));
}

pub async fn test_fetch_page_filters_kind_and_status(ctx: &RecordTestContext<'_>) {
    ctx.fixture
        .insert_record(SeedRecord::attachment(1, "keep"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(2, "page").with_kind("page", "publish"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(3, "draft").with_kind("attachment", "draft"))
        .await;

    let filter = ScanFilter::new().kind("attachment").status("inherit");
    let page = ctx
        .repo
        .fetch_page(&filter, Page::Unbounded)
        .await
        .expect("Failed to fetch page");

    let seen: Vec<_> = page.iter().map(|r| r.id).collect();
    assert_eq!(seen, ids(&[1]));
}

pub async fn test_fetch_page_include_and_exclude(ctx: &RecordTestContext<'_>) {
    ctx.seed_attachments(&[1, 2, 3, 4]).await;

    let filter = ScanFilter::new()
        .apply_pairs([("post__in", "1,2,3"), ("post__not_in", "2")])
        .expect("valid filter");
    let page = ctx
        .repo
        .fetch_page(&filter, Page::Unbounded)
        .await
        .expect("Failed to fetch page");

    let seen: Vec<_> = page.iter().map(|r| r.id).collect();
    assert_eq!(seen, ids(&[1, 3]));
}

pub async fn test_fetch_page_has_attribute(ctx: &RecordTestContext<'_>) {
    ctx.seed_attachments(&[1, 2, 3]).await;
    ctx.fixture.insert_attribute(2, "gallery", Some("1,3")).await;

    let filter = ScanFilter::new().has_attribute("gallery");
    let page = ctx
        .repo
        .fetch_page(&filter, Page::Unbounded)
        .await
        .expect("Failed to fetch page");

    let seen: Vec<_> = page.iter().map(|r| r.id).collect();
    assert_eq!(seen, ids(&[2]));
}

// ============================================================================
// Attribute Tests
// ============================================================================

pub async fn test_attributes_first_row_wins(ctx: &RecordTestContext<'_>) {
    ctx.seed_attachments(&[1, 2, 3]).await;
    ctx.fixture.insert_attribute(1, "gallery", Some("7912,8016")).await;
    ctx.fixture.insert_attribute(1, "gallery", Some("1")).await;
    ctx.fixture
        .insert_attribute(2, "gallery", Some("a:1:{i:0;s:3:\"194\";}"))
        .await;
    ctx.fixture.insert_attribute(3, "other", Some("5")).await;

    let values = ctx
        .repo
        .attributes(&ids(&[1, 2, 3]), "gallery")
        .await
        .expect("Failed to read attributes");

    assert_eq!(
        values,
        vec![
            (
                RecordId::new(1),
                AttributeValue::List(vec!["7912".into(), "8016".into()])
            ),
            (
                RecordId::new(2),
                AttributeValue::Composite("a:1:{i:0;s:3:\"194\";}".into())
            ),
        ]
    );
}

pub async fn test_attributes_empty_ids(ctx: &RecordTestContext<'_>) {
    let values = ctx
        .repo
        .attributes(&[], "gallery")
        .await
        .expect("Failed to read attributes");
    assert!(values.is_empty());
}

// ============================================================================
// Select Tests
// ============================================================================

pub async fn test_select_ids_by_prefix(ctx: &RecordTestContext<'_>) {
    ctx.fixture
        .insert_record(SeedRecord::attachment(1, "photo-1"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(2, "photo-1-2"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(3, "photo-1-3"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(4, "photo-10"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(5, "other"))
        .await;

    let found = ctx
        .repo
        .select_ids(vec![Condition::starts_with(Column::Title, "photo-1-")])
        .await
        .expect("Failed to select ids");

    assert_eq!(found, ids(&[2, 3]));
}

pub async fn test_select_ids_prefix_is_literal(ctx: &RecordTestContext<'_>) {
    ctx.fixture
        .insert_record(SeedRecord::attachment(1, "img_1-2"))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(2, "imgx1-2"))
        .await;

    let found = ctx
        .repo
        .select_ids(vec![Condition::starts_with(Column::Title, "img_1-")])
        .await
        .expect("Failed to select ids");

    assert_eq!(found, ids(&[1]));
}

pub async fn test_guids_and_ids_with_guid(ctx: &RecordTestContext<'_>) {
    let shared = "http://example.test/wp-content/uploads/shared.jpg";
    ctx.fixture
        .insert_record(SeedRecord::attachment(1, "a").with_guid(shared))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(2, "b").with_guid(shared))
        .await;
    ctx.fixture
        .insert_record(SeedRecord::attachment(3, "c"))
        .await;

    let guids = ctx
        .repo
        .guids(&ids(&[1, 3]))
        .await
        .expect("Failed to read guids");
    assert_eq!(guids.len(), 2);
    assert_eq!(guids[0], (RecordId::new(1), shared.to_string()));

    let twins = ctx
        .repo
        .ids_with_guid(shared)
        .await
        .expect("Failed to select by guid");
    assert_eq!(twins, ids(&[1, 2]));
}

// ============================================================================
// Delete Tests
// ============================================================================

pub async fn test_execute_delete_per_table(ctx: &RecordTestContext<'_>) {
    for id in [1, 2, 3] {
        ctx.fixture
            .insert_linked(SeedRecord::attachment(id, &format!("img-{id}")))
            .await;
    }

    let doomed = ids(&[1, 3]);
    for table in Table::CASCADE {
        let affected = ctx
            .repo
            .execute_delete(&Delete::new(
                table,
                Condition::ids(table.record_key(), Comparator::Equals, &doomed),
            ))
            .await
            .expect("Failed to delete");
        assert_eq!(affected, 2, "rows removed from {table:?}");
    }

    for table in Table::CASCADE {
        assert_eq!(ctx.fixture.count_all(table).await, 1);
        assert_eq!(ctx.fixture.count_for(table, RecordId::new(2)).await, 1);
    }
}

pub async fn test_execute_delete_like_ids(ctx: &RecordTestContext<'_>) {
    ctx.fixture
        .insert_linked(SeedRecord::attachment(12, "a"))
        .await;
    ctx.fixture
        .insert_linked(SeedRecord::attachment(123, "b"))
        .await;

    let affected = ctx
        .repo
        .execute_delete(&Delete::new(
            Table::Attributes,
            Condition::ids(Column::PostId, Comparator::Like, &ids(&[12])),
        ))
        .await
        .expect("Failed to delete");

    assert_eq!(affected, 1);
    assert_eq!(
        ctx.fixture
            .count_for(Table::Attributes, RecordId::new(123))
            .await,
        1
    );
}

pub async fn test_execute_delete_missing_rows(ctx: &RecordTestContext<'_>) {
    let affected = ctx
        .repo
        .execute_delete(&Delete::new(
            Table::Records,
            Condition::ids(Column::Id, Comparator::Equals, &ids(&[404])),
        ))
        .await
        .expect("Failed to delete");
    assert_eq!(affected, 0);
}

pub async fn test_execute_deletes_cascade(ctx: &RecordTestContext<'_>) {
    for id in [1, 2, 3] {
        ctx.fixture
            .insert_linked(SeedRecord::attachment(id, &format!("img-{id}")))
            .await;
    }

    let doomed = ids(&[2, 3]);
    let deletes: Vec<Delete> = Table::CASCADE
        .iter()
        .map(|&table| {
            Delete::new(
                table,
                Condition::ids(table.record_key(), Comparator::Equals, &doomed),
            )
        })
        .collect();

    let affected = ctx
        .repo
        .execute_deletes(&deletes)
        .await
        .expect("Failed to delete");

    assert_eq!(affected, vec![2, 2, 2]);
    for table in Table::CASCADE {
        assert_eq!(ctx.fixture.count_all(table).await, 1);
        assert_eq!(ctx.fixture.count_for(table, RecordId::new(1)).await, 1);
    }
}

pub async fn test_execute_deletes_empty(ctx: &RecordTestContext<'_>) {
    ctx.fixture
        .insert_linked(SeedRecord::attachment(1, "img"))
        .await;

    let affected = ctx.repo.execute_deletes(&[]).await.expect("Failed to delete");
    assert!(affected.is_empty());
    assert_eq!(ctx.fixture.count_all(Table::Records).await, 1);
}

// ============================================================================
// SQLite Tests
// ============================================================================

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use super::*;
    use crate::db::{query::TableNames, sqlite::SqliteRecordRepo, tests::harness::*};

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let pool = create_seeded_sqlite_pool().await;
                let repo = SqliteRecordRepo::new(pool.clone(), TableNames::default());
                let ctx = RecordTestContext {
                    repo: &repo,
                    fixture: &pool,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_fetch_page_empty);
    sqlite_test!(test_fetch_page_offset_ordered_by_id);
    sqlite_test!(test_fetch_page_keyset);
    sqlite_test!(test_fetch_page_filters_kind_and_status);
    sqlite_test!(test_fetch_page_include_and_exclude);
    sqlite_test!(test_fetch_page_has_attribute);

    sqlite_test!(test_attributes_first_row_wins);
    sqlite_test!(test_attributes_empty_ids);

    sqlite_test!(test_select_ids_by_prefix);
    sqlite_test!(test_select_ids_prefix_is_literal);
    sqlite_test!(test_guids_and_ids_with_guid);

    sqlite_test!(test_execute_delete_per_table);
    sqlite_test!(test_execute_delete_like_ids);
    sqlite_test!(test_execute_delete_missing_rows);
    sqlite_test!(test_execute_deletes_cascade);
    sqlite_test!(test_execute_deletes_empty);

    #[tokio::test]
    async fn test_execute_deletes_rolls_back_on_failure() {
        let pool = create_seeded_sqlite_pool().await;
        let fixture: &dyn Fixture = &pool;
        fixture.insert_linked(SeedRecord::attachment(7, "img")).await;
        sqlx::query(
            "CREATE TRIGGER `refuse_meta_delete` BEFORE DELETE ON `wp_postmeta` \
             BEGIN SELECT RAISE(ABORT, 'attribute delete refused'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let repo = SqliteRecordRepo::new(pool.clone(), TableNames::default());
        let doomed = ids(&[7]);
        let deletes: Vec<Delete> = Table::CASCADE
            .iter()
            .map(|&table| {
                Delete::new(
                    table,
                    Condition::ids(table.record_key(), Comparator::Equals, &doomed),
                )
            })
            .collect();

        assert!(repo.execute_deletes(&deletes).await.is_err());
        for table in Table::CASCADE {
            assert_eq!(pool.count_for(table, RecordId::new(7)).await, 1, "{table:?}");
        }
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let pool = create_sqlite_pool().await;
        let names = TableNames::new("site2_").unwrap();
        create_sqlite_schema(&pool, &names).await;
        sqlx::query("INSERT INTO `site2_posts` (`ID`, `post_title`) VALUES (5, 'x')")
            .execute(&pool)
            .await
            .unwrap();

        let repo = SqliteRecordRepo::new(pool, names);
        let page = repo
            .fetch_page(&ScanFilter::new(), Page::Unbounded)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, RecordId::new(5));
    }
}

// ============================================================================
// MySQL Tests
// ============================================================================

#[cfg(feature = "database-mysql")]
mod mysql_tests {
    use super::*;
    use crate::db::{
        mysql::MySqlRecordRepo, query::TableNames, tests::harness::mysql::create_isolated_mysql_pool,
    };

    macro_rules! mysql_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_mysql_pool().await;
                let repo = MySqlRecordRepo::new(pool.clone(), TableNames::default());
                let ctx = RecordTestContext {
                    repo: &repo,
                    fixture: &pool,
                };
                super::$name(&ctx).await;
            }
        };
    }

    mysql_test!(test_fetch_page_empty);
    mysql_test!(test_fetch_page_offset_ordered_by_id);
    mysql_test!(test_fetch_page_keyset);
    mysql_test!(test_fetch_page_filters_kind_and_status);
    mysql_test!(test_fetch_page_include_and_exclude);
    mysql_test!(test_fetch_page_has_attribute);

    mysql_test!(test_attributes_first_row_wins);
    mysql_test!(test_attributes_empty_ids);

    mysql_test!(test_select_ids_by_prefix);
    mysql_test!(test_select_ids_prefix_is_literal);
    mysql_test!(test_guids_and_ids_with_guid);

    mysql_test!(test_execute_delete_per_table);
    mysql_test!(test_execute_delete_like_ids);
    mysql_test!(test_execute_delete_missing_rows);
    mysql_test!(test_execute_deletes_cascade);
    mysql_test!(test_execute_deletes_empty);
}
