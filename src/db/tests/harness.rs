//! Test harness for database repository testing
//!
//! Provides utilities for setting up test databases:
//! - SQLite: Fast in-memory databases with the WordPress tables created in place
//! - MySQL: Testcontainers-based instances, one database per test
//!
//! The sweeper never inserts rows, so fixtures are written through the
//! [`Fixture`] trait, implemented for both pool types.

use async_trait::async_trait;

use crate::{
    db::query::{Table, TableNames},
    models::RecordId,
};

/// A primary record to insert.
#[derive(Debug, Clone)]
pub struct SeedRecord {
    pub id: u64,
    pub title: String,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub guid: String,
}

impl SeedRecord {
    /// An `attachment`/`inherit` record whose name mirrors its title.
    pub fn attachment(id: u64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            name: title.to_lowercase(),
            kind: "attachment".to_string(),
            status: "inherit".to_string(),
            guid: format!("http://example.test/wp-content/uploads/{id}.jpg"),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_kind(mut self, kind: &str, status: &str) -> Self {
        self.kind = kind.to_string();
        self.status = status.to_string();
        self
    }

    pub fn with_guid(mut self, guid: &str) -> Self {
        self.guid = guid.to_string();
        self
    }
}

/// Writes and inspects fixture rows behind a repository.
#[async_trait]
pub trait Fixture: Send + Sync {
    async fn insert_record(&self, record: SeedRecord);

    async fn insert_translation(&self, element_id: u64);

    async fn insert_attribute(&self, post_id: u64, key: &str, value: Option<&str>);

    /// Rows in `table` that reference `id`.
    async fn count_for(&self, table: Table, id: RecordId) -> i64;

    /// All rows in `table`.
    async fn count_all(&self, table: Table) -> i64;
}

impl dyn Fixture + '_ {
    /// Insert a record with one translation link and one attribute row.
    pub async fn insert_linked(&self, record: SeedRecord) {
        let id = record.id;
        self.insert_record(record).await;
        self.insert_translation(id).await;
        self.insert_attribute(id, "_wp_attached_file", Some(&format!("{id}.jpg")))
            .await;
    }
}

fn insert_record_sql(names: &TableNames) -> String {
    format!(
        "INSERT INTO `{}` (`ID`, `post_title`, `post_name`, `post_type`, `post_status`, `guid`) \
         VALUES (?, ?, ?, ?, ?, ?)",
        names.name(Table::Records)
    )
}

fn insert_translation_sql(names: &TableNames) -> String {
    format!(
        "INSERT INTO `{}` (`element_type`, `element_id`, `trid`, `language_code`) \
         VALUES ('post_attachment', ?, ?, 'en')",
        names.name(Table::TranslationLinks)
    )
}

fn insert_attribute_sql(names: &TableNames) -> String {
    format!(
        "INSERT INTO `{}` (`post_id`, `meta_key`, `meta_value`) VALUES (?, ?, ?)",
        names.name(Table::Attributes)
    )
}

fn count_for_sql(names: &TableNames, table: Table) -> String {
    format!(
        "SELECT COUNT(*) FROM `{}` WHERE `{}` = ?",
        names.name(table),
        table.record_key()
    )
}

fn count_all_sql(names: &TableNames, table: Table) -> String {
    format!("SELECT COUNT(*) FROM `{}`", names.name(table))
}

#[cfg(feature = "database-sqlite")]
mod sqlite_fixture {
    use sqlx::SqlitePool;

    use super::*;

    /// Create an in-memory SQLite pool for testing
    pub async fn create_sqlite_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    /// Create the posts, translation and postmeta tables under `names`.
    pub async fn create_sqlite_schema(pool: &SqlitePool, names: &TableNames) {
        let statements = [
            format!(
                "CREATE TABLE `{}` (
                    `ID` INTEGER PRIMARY KEY,
                    `post_title` TEXT NOT NULL DEFAULT '',
                    `post_name` TEXT NOT NULL DEFAULT '',
                    `post_type` TEXT NOT NULL DEFAULT 'post',
                    `post_status` TEXT NOT NULL DEFAULT 'publish',
                    `guid` TEXT NOT NULL DEFAULT ''
                )",
                names.name(Table::Records)
            ),
            format!(
                "CREATE TABLE `{}` (
                    `translation_id` INTEGER PRIMARY KEY AUTOINCREMENT,
                    `element_type` TEXT NOT NULL DEFAULT 'post_post',
                    `element_id` INTEGER,
                    `trid` INTEGER NOT NULL DEFAULT 0,
                    `language_code` TEXT NOT NULL DEFAULT ''
                )",
                names.name(Table::TranslationLinks)
            ),
            format!(
                "CREATE TABLE `{}` (
                    `meta_id` INTEGER PRIMARY KEY AUTOINCREMENT,
                    `post_id` INTEGER NOT NULL DEFAULT 0,
                    `meta_key` TEXT,
                    `meta_value` TEXT
                )",
                names.name(Table::Attributes)
            ),
        ];

        for sql in statements {
            sqlx::query(&sql)
                .execute(pool)
                .await
                .expect("Failed to create SQLite schema");
        }
    }

    /// In-memory pool with the schema created under the default `wp_` prefix.
    pub async fn create_seeded_sqlite_pool() -> SqlitePool {
        let pool = create_sqlite_pool().await;
        create_sqlite_schema(&pool, &TableNames::default()).await;
        pool
    }

    #[async_trait]
    impl Fixture for SqlitePool {
        async fn insert_record(&self, record: SeedRecord) {
            sqlx::query(&insert_record_sql(&TableNames::default()))
                .bind(record.id as i64)
                .bind(&record.title)
                .bind(&record.name)
                .bind(&record.kind)
                .bind(&record.status)
                .bind(&record.guid)
                .execute(self)
                .await
                .expect("Failed to insert record");
        }

        async fn insert_translation(&self, element_id: u64) {
            sqlx::query(&insert_translation_sql(&TableNames::default()))
                .bind(element_id as i64)
                .bind(element_id as i64)
                .execute(self)
                .await
                .expect("Failed to insert translation link");
        }

        async fn insert_attribute(&self, post_id: u64, key: &str, value: Option<&str>) {
            sqlx::query(&insert_attribute_sql(&TableNames::default()))
                .bind(post_id as i64)
                .bind(key)
                .bind(value)
                .execute(self)
                .await
                .expect("Failed to insert attribute");
        }

        async fn count_for(&self, table: Table, id: RecordId) -> i64 {
            sqlx::query_scalar(&count_for_sql(&TableNames::default(), table))
                .bind(id.as_i64())
                .fetch_one(self)
                .await
                .expect("Failed to count rows")
        }

        async fn count_all(&self, table: Table) -> i64 {
            sqlx::query_scalar(&count_all_sql(&TableNames::default(), table))
                .fetch_one(self)
                .await
                .expect("Failed to count rows")
        }
    }
}

#[cfg(feature = "database-sqlite")]
pub use sqlite_fixture::*;

/// MySQL test harness using testcontainers
#[cfg(feature = "database-mysql")]
pub mod mysql {
    use std::sync::{
        OnceLock,
        atomic::{AtomicUsize, Ordering},
    };

    use sqlx::MySqlPool;
    use testcontainers_modules::{
        mysql::Mysql,
        testcontainers::{ContainerAsync, runners::AsyncRunner},
    };
    use tokio::sync::OnceCell;

    use super::*;

    /// Shared container state - initialized once per test run
    struct SharedContainer {
        #[allow(dead_code)] // Test infrastructure: keeps container alive
        container: ContainerAsync<Mysql>,
        base_url: String,
    }

    static SHARED_CONTAINER: OnceLock<OnceCell<SharedContainer>> = OnceLock::new();
    static NEXT_DATABASE: AtomicUsize = AtomicUsize::new(0);

    async fn get_shared_container() -> &'static SharedContainer {
        let cell = SHARED_CONTAINER.get_or_init(OnceCell::new);
        cell.get_or_init(|| async {
            let container = Mysql::default()
                .start()
                .await
                .expect("Failed to start MySQL container");

            let host = container.get_host().await.expect("Failed to get host");
            let port = container
                .get_host_port_ipv4(3306)
                .await
                .expect("Failed to get port");

            SharedContainer {
                container,
                base_url: format!("mysql://root@{}:{}", host, port),
            }
        })
        .await
    }

    /// Create an isolated database for a single test, with the schema in place.
    pub async fn create_isolated_mysql_pool() -> MySqlPool {
        let shared = get_shared_container().await;

        let admin_pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(1)
            .connect(&shared.base_url)
            .await
            .expect("Failed to connect to MySQL");

        let database = format!(
            "twinsweep_test_{}_{}",
            std::process::id(),
            NEXT_DATABASE.fetch_add(1, Ordering::SeqCst)
        );
        sqlx::query(&format!("CREATE DATABASE `{}`", database))
            .execute(&admin_pool)
            .await
            .expect("Failed to create test database");

        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&format!("{}/{}", shared.base_url, database))
            .await
            .expect("Failed to connect to isolated database");

        create_mysql_schema(&pool, &TableNames::default()).await;
        pool
    }

    async fn create_mysql_schema(pool: &MySqlPool, names: &TableNames) {
        let statements = [
            format!(
                "CREATE TABLE `{}` (
                    `ID` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    `post_title` TEXT NOT NULL,
                    `post_name` VARCHAR(200) NOT NULL DEFAULT '',
                    `post_type` VARCHAR(20) NOT NULL DEFAULT 'post',
                    `post_status` VARCHAR(20) NOT NULL DEFAULT 'publish',
                    `guid` VARCHAR(255) NOT NULL DEFAULT ''
                )",
                names.name(Table::Records)
            ),
            format!(
                "CREATE TABLE `{}` (
                    `translation_id` BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    `element_type` VARCHAR(60) NOT NULL DEFAULT 'post_post',
                    `element_id` BIGINT UNSIGNED NULL,
                    `trid` BIGINT NOT NULL DEFAULT 0,
                    `language_code` VARCHAR(7) NOT NULL DEFAULT ''
                )",
                names.name(Table::TranslationLinks)
            ),
            format!(
                "CREATE TABLE `{}` (
                    `meta_id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    `post_id` BIGINT UNSIGNED NOT NULL DEFAULT 0,
                    `meta_key` VARCHAR(255) NULL,
                    `meta_value` LONGTEXT NULL
                )",
                names.name(Table::Attributes)
            ),
        ];

        for sql in statements {
            sqlx::query(&sql)
                .execute(pool)
                .await
                .expect("Failed to create MySQL schema");
        }
    }

    #[async_trait]
    impl Fixture for MySqlPool {
        async fn insert_record(&self, record: SeedRecord) {
            sqlx::query(&insert_record_sql(&TableNames::default()))
                .bind(record.id)
                .bind(&record.title)
                .bind(&record.name)
                .bind(&record.kind)
                .bind(&record.status)
                .bind(&record.guid)
                .execute(self)
                .await
                .expect("Failed to insert record");
        }

        async fn insert_translation(&self, element_id: u64) {
            sqlx::query(&insert_translation_sql(&TableNames::default()))
                .bind(element_id)
                .bind(element_id as i64)
                .execute(self)
                .await
                .expect("Failed to insert translation link");
        }

        async fn insert_attribute(&self, post_id: u64, key: &str, value: Option<&str>) {
            sqlx::query(&insert_attribute_sql(&TableNames::default()))
                .bind(post_id)
                .bind(key)
                .bind(value)
                .execute(self)
                .await
                .expect("Failed to insert attribute");
        }

        async fn count_for(&self, table: Table, id: RecordId) -> i64 {
            sqlx::query_scalar(&count_for_sql(&TableNames::default(), table))
                .bind(id.get())
                .fetch_one(self)
                .await
                .expect("Failed to count rows")
        }

        async fn count_all(&self, table: Table) -> i64 {
            sqlx::query_scalar(&count_all_sql(&TableNames::default(), table))
                .fetch_one(self)
                .await
                .expect("Failed to count rows")
        }
    }
}
