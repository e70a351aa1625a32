//! Content Store (component C2): upsert-by-URL document store for page
//! records. `PostgresContentStore` is the production adapter (sqlx +
//! Postgres, grounded on the teacher's `storage` crate); `InMemoryContentStore`
//! backs this workspace's own tests so nothing here needs a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};
use webcrawler_core::CrawlError;

const MIGRATION_001: &str = include_str!("../migrations/001_init.sql");

#[derive(Debug, Clone)]
pub struct PageUpsert {
    pub url: String,
    pub title: String,
    pub text: String,
    pub html: String,
    pub parent_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredPage {
    pub url: String,
    pub title: String,
    pub text: String,
    pub html: String,
    pub parent_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Write or replace by URL; preserves `created_at` and bumps
    /// `updated_at` on replace (§4.2).
    async fn upsert_page(&self, page: PageUpsert) -> Result<(), CrawlError>;
    async fn get_page(&self, url: &str) -> Result<Option<StoredPage>, CrawlError>;
    async fn list_pages(&self, offset: i64, limit: i64) -> Result<Vec<StoredPage>, CrawlError>;
    async fn count_pages(&self) -> Result<i64, CrawlError>;
}

pub struct PostgresContentStore {
    pool: PgPool,
}

impl PostgresContentStore {
    pub async fn new(database_url: &str) -> Result<Self, CrawlError> {
        Self::with_pool_size(database_url, 10).await
    }

    pub async fn with_pool_size(database_url: &str, max_connections: u32) -> Result<Self, CrawlError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to connect to content store");
                CrawlError::Store(e.to_string())
            })?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CrawlError> {
        sqlx::raw_sql(MIGRATION_001)
            .execute(&self.pool)
            .await
            .map_err(|e| CrawlError::Store(e.to_string()))?;
        info!("content store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ContentStore for PostgresContentStore {
    async fn upsert_page(&self, page: PageUpsert) -> Result<(), CrawlError> {
        sqlx::query(
            r#"
            INSERT INTO pages (url, title, body_text, html, parent_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            ON CONFLICT (url) DO UPDATE SET
                title = EXCLUDED.title,
                body_text = EXCLUDED.body_text,
                html = EXCLUDED.html,
                parent_url = EXCLUDED.parent_url,
                updated_at = now()
            "#,
        )
        .bind(&page.url)
        .bind(&page.title)
        .bind(&page.text)
        .bind(&page.html)
        .bind(&page.parent_url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(url = %page.url, error = %e, "upsert_page failed");
            CrawlError::Store(e.to_string())
        })?;
        Ok(())
    }

    async fn get_page(&self, url: &str) -> Result<Option<StoredPage>, CrawlError> {
        let row = sqlx::query_as::<_, (String, String, String, String, Option<String>, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT url, title, body_text, html, parent_url, created_at, updated_at FROM pages WHERE url = $1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CrawlError::Store(e.to_string()))?;

        Ok(row.map(
            |(url, title, text, html, parent_url, created_at, updated_at)| StoredPage {
                url,
                title,
                text,
                html,
                parent_url,
                created_at,
                updated_at,
            },
        ))
    }

    async fn list_pages(&self, offset: i64, limit: i64) -> Result<Vec<StoredPage>, CrawlError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, Option<String>, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT url, title, body_text, html, parent_url, created_at, updated_at FROM pages ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CrawlError::Store(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(url, title, text, html, parent_url, created_at, updated_at)| StoredPage {
                    url,
                    title,
                    text,
                    html,
                    parent_url,
                    created_at,
                    updated_at,
                },
            )
            .collect())
    }

    async fn count_pages(&self) -> Result<i64, CrawlError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CrawlError::Store(e.to_string()))?;
        Ok(count)
    }
}

/// In-process fake used by this workspace's own tests (no live Postgres in
/// CI); exercised through the same `ContentStore` trait as the real
/// adapter.
#[derive(Default)]
pub struct InMemoryContentStore {
    pages: DashMap<String, StoredPage>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn upsert_page(&self, page: PageUpsert) -> Result<(), CrawlError> {
        let now = Utc::now();
        self.pages
            .entry(page.url.clone())
            .and_modify(|existing| {
                existing.title = page.title.clone();
                existing.text = page.text.clone();
                existing.html = page.html.clone();
                existing.parent_url = page.parent_url.clone();
                existing.updated_at = now;
            })
            .or_insert_with(|| StoredPage {
                url: page.url,
                title: page.title,
                text: page.text,
                html: page.html,
                parent_url: page.parent_url,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn get_page(&self, url: &str) -> Result<Option<StoredPage>, CrawlError> {
        Ok(self.pages.get(url).map(|e| e.value().clone()))
    }

    async fn list_pages(&self, offset: i64, limit: i64) -> Result<Vec<StoredPage>, CrawlError> {
        let mut all: Vec<StoredPage> = self.pages.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_pages(&self) -> Result<i64, CrawlError> {
        Ok(self.pages.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = InMemoryContentStore::new();
        store
            .upsert_page(PageUpsert {
                url: "https://example.com/a".into(),
                title: "A".into(),
                text: "hello".into(),
                html: "<html></html>".into(),
                parent_url: None,
            })
            .await
            .unwrap();
        let page = store.get_page("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(page.title, "A");
    }

    #[tokio::test]
    async fn repeated_upsert_preserves_created_at_and_bumps_updated_at() {
        let store = InMemoryContentStore::new();
        let upsert = |title: &str| PageUpsert {
            url: "https://example.com/a".into(),
            title: title.into(),
            text: "x".into(),
            html: "<html></html>".into(),
            parent_url: None,
        };
        store.upsert_page(upsert("first")).await.unwrap();
        let first = store.get_page("https://example.com/a").await.unwrap().unwrap();

        store.upsert_page(upsert("second")).await.unwrap();
        let second = store.get_page("https://example.com/a").await.unwrap().unwrap();

        assert_eq!(second.title, "second");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.count_pages().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_pages_respects_offset_and_limit() {
        let store = InMemoryContentStore::new();
        for i in 0..5 {
            store
                .upsert_page(PageUpsert {
                    url: format!("https://example.com/{i}"),
                    title: format!("page {i}"),
                    text: String::new(),
                    html: String::new(),
                    parent_url: None,
                })
                .await
                .unwrap();
        }
        let page = store.list_pages(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
    }
}
