//! Parameterized SQL for feedback listings.
//!
//! [`build_feedback_query`] turns a [`FeedbackFilter`] into two statements,
//! a page fetch and a total count, that share one predicate routine
//! ([`push_predicates`]) so they can never filter differently. User input
//! only ever reaches the SQL as a bound parameter; the template text is
//! assembled from fixed fragments.
//!
//! Templates use SQLite syntax and positional `?` placeholders. Parameters
//! are returned in placeholder order.

use crate::filter::FeedbackFilter;

/// Column list shared by every statement that materializes a record.
pub const FEEDBACK_COLUMNS: &str = "id, source, author, content, created_at, sentiment, \
     sentiment_score, themes, urgency, analyzed_at";

/// A value bound to one `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

/// A statement template and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// The paired statements for one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackQuery {
    pub rows: BuiltQuery,
    pub count: BuiltQuery,
}

/// Escape `LIKE` metacharacters so the search term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Append the `WHERE` clause for `filter` and its parameters.
fn push_predicates(filter: &FeedbackFilter, sql: &mut String, params: &mut Vec<SqlParam>) {
    sql.push_str(" WHERE 1=1");

    if let Some(source) = filter.source {
        sql.push_str(" AND source = ?");
        params.push(SqlParam::Text(source.as_str().to_string()));
    }
    if let Some(sentiment) = filter.sentiment {
        sql.push_str(" AND sentiment = ?");
        params.push(SqlParam::Text(sentiment.as_str().to_string()));
    }
    if let Some(urgency) = filter.urgency {
        sql.push_str(" AND urgency = ?");
        params.push(SqlParam::Text(urgency.as_str().to_string()));
    }
    if let Some(days) = filter.days {
        // The modifier is bound, so "now" is evaluated by the store per call.
        sql.push_str(" AND created_at >= datetime('now', ?)");
        params.push(SqlParam::Text(format!("-{} days", days)));
    }
    if let Some(ref search) = filter.search {
        sql.push_str(" AND content LIKE ? ESCAPE '\\'");
        params.push(SqlParam::Text(format!("%{}%", escape_like(search))));
    }
}

/// Build the page-fetch and count statements for `filter`.
pub fn build_feedback_query(filter: &FeedbackFilter) -> FeedbackQuery {
    let mut predicate = String::new();
    let mut predicate_params = Vec::new();
    push_predicates(filter, &mut predicate, &mut predicate_params);

    let count = BuiltQuery {
        sql: format!("SELECT COUNT(*) FROM feedback{}", predicate),
        params: predicate_params.clone(),
    };

    let mut params = predicate_params;
    params.push(SqlParam::Int(filter.limit));
    params.push(SqlParam::Int(filter.offset));
    let rows = BuiltQuery {
        sql: format!(
            "SELECT {} FROM feedback{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            FEEDBACK_COLUMNS, predicate
        ),
        params,
    };

    FeedbackQuery { rows, count }
}
