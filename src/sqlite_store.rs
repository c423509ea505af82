//! SQLite-backed [`FeedbackStore`] implementation.
//!
//! Listing statements come from the core query builder; this module only
//! binds their parameters and decodes rows. Store time (`datetime('now')`)
//! is used for lookback windows and `analyzed_at`, so the process clock
//! never leaks into persisted timestamps.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Row, SqlitePool};

use feedback_pulse_core::filter::FeedbackFilter;
use feedback_pulse_core::models::{decode_lenient, Analysis, FeedbackRecord, NewFeedback};
use feedback_pulse_core::query::{build_feedback_query, SqlParam, FEEDBACK_COLUMNS};
use feedback_pulse_core::store::{FeedbackPage, FeedbackStore, GroupCount, GroupField};
use feedback_pulse_core::themes::Themes;

/// SQLite implementation of the [`FeedbackStore`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.clone()),
            SqlParam::Int(i) => query.bind(*i),
        };
    }
    query
}

/// Decode `sentiment_score`, which SQLite may hold as REAL or TEXT when the
/// row was written outside this crate. Whole numbers in 0..=100 survive;
/// anything else reads as absent instead of failing the whole listing.
fn lenient_score(row: &SqliteRow) -> Option<i64> {
    if let Ok(score) = row.try_get::<Option<i64>, _>("sentiment_score") {
        return score;
    }
    match row.try_get::<Option<f64>, _>("sentiment_score") {
        Ok(Some(f)) if f.fract() == 0.0 && (0.0..=100.0).contains(&f) => Some(f as i64),
        Ok(score) => {
            tracing::warn!(
                column = "sentiment_score",
                value = ?score,
                "ignoring out-of-domain stored value"
            );
            None
        }
        Err(e) => {
            tracing::warn!(
                column = "sentiment_score",
                error = %e,
                "ignoring undecodable stored value"
            );
            None
        }
    }
}

fn record_from_row(row: &SqliteRow) -> Result<FeedbackRecord> {
    let sentiment: Option<String> = row.try_get("sentiment")?;
    let urgency: Option<String> = row.try_get("urgency")?;
    let themes: Option<String> = row.try_get("themes")?;

    Ok(FeedbackRecord {
        id: row.try_get("id")?,
        source: row.try_get("source")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        sentiment: decode_lenient("sentiment", sentiment.as_deref()),
        sentiment_score: lenient_score(row),
        themes: themes.as_deref().and_then(Themes::parse),
        urgency: decode_lenient("urgency", urgency.as_deref()),
        analyzed_at: row.try_get("analyzed_at")?,
    })
}

#[async_trait]
impl FeedbackStore for SqliteStore {
    async fn list_feedback(&self, filter: &FeedbackFilter) -> Result<FeedbackPage> {
        let built = build_feedback_query(filter);

        let count_row = bind_params(sqlx::query(&built.count.sql), &built.count.params)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = count_row.try_get(0)?;

        let rows = bind_params(sqlx::query(&built.rows.sql), &built.rows.params)
            .fetch_all(&self.pool)
            .await?;
        let rows = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(FeedbackPage { rows, total })
    }

    async fn get_feedback(&self, id: i64) -> Result<Option<FeedbackRecord>> {
        let sql = format!("SELECT {} FROM feedback WHERE id = ?", FEEDBACK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn apply_analysis(&self, id: i64, analysis: &Analysis) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE feedback
            SET sentiment = ?, sentiment_score = ?, themes = ?, urgency = ?, analyzed_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(analysis.sentiment.map(|s| s.as_str()))
        .bind(analysis.sentiment_score)
        .bind(analysis.themes.as_ref().map(Themes::join))
        .bind(analysis.urgency.map(|u| u.as_str()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_total(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn count_by(&self, field: GroupField) -> Result<Vec<GroupCount>> {
        let column = field.column();
        let sql = format!(
            "SELECT {col} AS key, COUNT(*) AS count FROM feedback GROUP BY {col} ORDER BY {col}",
            col = column
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<GroupCount> {
                Ok(GroupCount {
                    key: row.try_get("key")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn count_recent(&self, days: i64) -> Result<i64> {
        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM feedback WHERE created_at >= datetime('now', ?)",
        )
        .bind(format!("-{} days", days))
        .fetch_one(&self.pool)
        .await?;
        Ok(recent)
    }

    async fn theme_values(&self) -> Result<Vec<String>> {
        let values: Vec<String> =
            sqlx::query_scalar("SELECT themes FROM feedback WHERE themes IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;
        Ok(values)
    }

    async fn unanalyzed_ids(&self, limit: Option<i64>) -> Result<Vec<i64>> {
        // SQLite treats a negative LIMIT as unbounded.
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM feedback WHERE analyzed_at IS NULL ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn insert_feedback(&self, item: &NewFeedback) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO feedback (source, author, content, created_at)
            VALUES (?, ?, ?, COALESCE(?, datetime('now')))
            "#,
        )
        .bind(&item.source)
        .bind(&item.author)
        .bind(&item.content)
        .bind(&item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}
