use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{GuideRow, KeywordTask, ResultRow};
use crate::traits::SheetStore;

/// SQLite-backed task and result sheets
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            if let Some(parent) = db_url
                .strip_prefix("sqlite:")
                .map(|path| path.trim_start_matches("//"))
                .and_then(|path| Path::new(path).parent())
                .filter(|parent| !parent.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
            }
            info!(url = %db_url, "Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;
        Self::migrate(pool).await
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }
}

fn result_row(row: &SqliteRow) -> std::result::Result<ResultRow, sqlx::Error> {
    Ok(ResultRow {
        date: row.try_get("date")?,
        keyword: row.try_get("keyword")?,
        product_id: row.try_get("product_id")?,
        title: row.try_get("title")?,
        summary_primary: row.try_get("summary_primary")?,
        summary_secondary: row.try_get("summary_secondary")?,
        sale_price: row.try_get("sale_price")?,
        image_url: row.try_get("image_url")?,
        affiliate_link: row.try_get("affiliate_link")?,
    })
}

#[async_trait]
impl SheetStore for Database {
    async fn tasks_for_date(&self, date: NaiveDate) -> Result<Vec<KeywordTask>> {
        let rows = sqlx::query("SELECT date, keyword FROM tasks WHERE date = ? ORDER BY id")
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        let tasks = rows
            .iter()
            .map(|row| {
                Ok(KeywordTask {
                    date: row.try_get("date")?,
                    keyword: row.try_get("keyword")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        debug!(%date, count = tasks.len(), "Loaded tasks");
        Ok(tasks)
    }

    async fn add_task(&self, task: &KeywordTask) -> Result<bool> {
        let outcome = sqlx::query(
            r"
            INSERT INTO tasks (date, keyword)
            VALUES (?, ?)
            ON CONFLICT(date, keyword) DO NOTHING
            ",
        )
        .bind(task.date)
        .bind(task.keyword.trim())
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn upsert_results(&self, rows: &[ResultRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r"
                INSERT INTO results (
                    date, keyword, product_id, title, summary_primary, summary_secondary,
                    sale_price, image_url, affiliate_link
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, keyword, product_id) DO UPDATE SET
                    title = excluded.title,
                    summary_primary = excluded.summary_primary,
                    summary_secondary = excluded.summary_secondary,
                    sale_price = excluded.sale_price,
                    image_url = excluded.image_url,
                    affiliate_link = excluded.affiliate_link,
                    updated_at = CURRENT_TIMESTAMP
                ",
            )
            .bind(row.date)
            .bind(&row.keyword)
            .bind(&row.product_id)
            .bind(&row.title)
            .bind(&row.summary_primary)
            .bind(&row.summary_secondary)
            .bind(&row.sale_price)
            .bind(&row.image_url)
            .bind(&row.affiliate_link)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(rows = rows.len(), "Persisted result rows");
        Ok(rows.len())
    }

    async fn results_for_date(&self, date: NaiveDate) -> Result<Vec<ResultRow>> {
        let rows = sqlx::query(
            r"
            SELECT date, keyword, product_id, title, summary_primary, summary_secondary,
                   sale_price, image_url, affiliate_link
            FROM results
            WHERE date = ?
            ORDER BY id
            ",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(result_row)
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn save_guides(&self, guides: &[GuideRow]) -> Result<usize> {
        if guides.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for guide in guides {
            sqlx::query(
                r"
                INSERT INTO tasks (date, keyword, buying_guide)
                VALUES (?, ?, ?)
                ON CONFLICT(date, keyword) DO UPDATE SET
                    buying_guide = excluded.buying_guide
                ",
            )
            .bind(guide.date)
            .bind(&guide.keyword)
            .bind(&guide.html)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(guides = guides.len(), "Persisted buying guides");
        Ok(guides.len())
    }

    async fn guides_for_date(&self, date: NaiveDate) -> Result<Vec<GuideRow>> {
        let rows = sqlx::query(
            r"
            SELECT date, keyword, buying_guide
            FROM tasks
            WHERE date = ? AND buying_guide IS NOT NULL
            ORDER BY id
            ",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                Ok(GuideRow {
                    date: row.try_get("date")?,
                    keyword: row.try_get("keyword")?,
                    html: row.try_get("buying_guide")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?)
    }
}
