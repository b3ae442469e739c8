//! SQL for the destination table shared by the load and aggregate stages.
//!
//! Columns are always quoted so the camel-cased date column keeps its
//! spelling on PostgreSQL.

use crate::config::{DATE_COLUMN, HEIGHT_COLUMN};
use crate::db::pool::{Pool, PoolInner};
use crate::error::JobError;
use crate::pipeline::RiverRecord;

/// Create the destination table if it is not already present. The table has
/// no primary key; rows are appended, never updated or deleted.
pub async fn ensure_table(pool: &Pool, table: &str) -> Result<(), JobError> {
    let height_type = if pool.is_postgres() {
        "DOUBLE PRECISION"
    } else {
        "REAL"
    };
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\"{DATE_COLUMN}\" TEXT, \"{HEIGHT_COLUMN}\" {height_type})"
    );
    pool.execute(&ddl).await
}

/// Build the multi-row insert statement for `count` records:
/// INSERT INTO table ("dateCaptured", "height") VALUES ($1, $2), ($3, $4), ...
fn insert_sql(table: &str, count: usize) -> String {
    let mut value_groups = Vec::with_capacity(count);
    let mut param_idx = 1;
    for _ in 0..count {
        value_groups.push(format!("(${}, ${})", param_idx, param_idx + 1));
        param_idx += 2;
    }
    format!(
        "INSERT INTO {table} (\"{DATE_COLUMN}\", \"{HEIGHT_COLUMN}\") VALUES {}",
        value_groups.join(", ")
    )
}

/// Rewrite Postgres-style placeholders ($1, $2, ...) to SQLite-style (?, ?, ...)
fn to_sqlite_placeholders(sql: &str) -> String {
    let mut result = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                chars.next();
            }
            result.push('?');
        } else {
            result.push(ch);
        }
    }

    result
}

/// Append a batch of records as a single bulk insert. The statement is the
/// storage engine's transaction boundary: either the whole batch lands or
/// none of it does.
pub async fn insert_batch(
    pool: &Pool,
    table: &str,
    records: &[RiverRecord],
) -> Result<(), JobError> {
    if records.is_empty() {
        return Ok(());
    }

    let sql = insert_sql(table, records.len());
    match &pool.inner {
        PoolInner::Postgres(pg_pool) => {
            let mut query = sqlx::query(&sql);
            for record in records {
                query = query.bind(&record.date_captured).bind(record.height);
            }
            query.execute(pg_pool).await?;
        }
        PoolInner::Sqlite(sqlite_pool) => {
            let sql = to_sqlite_placeholders(&sql);
            let mut query = sqlx::query(&sql);
            for record in records {
                query = query.bind(&record.date_captured).bind(record.height);
            }
            query.execute(sqlite_pool).await?;
        }
    }
    Ok(())
}

/// Read the whole table back ordered by the date token, ascending. The sort
/// is plain lexical order over the stored strings, not a calendar sort.
pub async fn fetch_ordered(pool: &Pool, table: &str) -> Result<Vec<RiverRecord>, JobError> {
    let sql = format!(
        "SELECT \"{DATE_COLUMN}\", \"{HEIGHT_COLUMN}\" FROM {table} ORDER BY \"{DATE_COLUMN}\" ASC"
    );

    let rows: Vec<(String, f64)> = match &pool.inner {
        PoolInner::Postgres(pg_pool) => sqlx::query_as(&sql).fetch_all(pg_pool).await?,
        PoolInner::Sqlite(sqlite_pool) => sqlx::query_as(&sql).fetch_all(sqlite_pool).await?,
    };

    Ok(rows
        .into_iter()
        .map(|(date_captured, height)| RiverRecord {
            date_captured,
            height,
        })
        .collect())
}

/// Count the rows currently persisted in the table (accessed in tests).
#[cfg_attr(not(test), allow(dead_code))]
pub async fn count_rows(pool: &Pool, table: &str) -> Result<i64, JobError> {
    let sql = format!("SELECT COUNT(*) FROM {table}");

    let (count,): (i64,) = match &pool.inner {
        PoolInner::Postgres(pg_pool) => sqlx::query_as(&sql).fetch_one(pg_pool).await?,
        PoolInner::Sqlite(sqlite_pool) => sqlx::query_as(&sql).fetch_one(sqlite_pool).await?,
    };

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, height: f64) -> RiverRecord {
        RiverRecord {
            date_captured: date.to_string(),
            height,
        }
    }

    #[test]
    fn test_insert_sql_numbers_placeholders_per_row() {
        let sql = insert_sql("riverhistory", 2);
        assert_eq!(
            sql,
            "INSERT INTO riverhistory (\"dateCaptured\", \"height\") VALUES ($1, $2), ($3, $4)"
        );
    }

    #[test]
    fn test_placeholder_rewrite_for_sqlite() {
        let sql = to_sqlite_placeholders("VALUES ($1, $2), ($11, $12)");
        assert_eq!(sql, "VALUES (?, ?), (?, ?)");
    }

    #[tokio::test]
    async fn test_insert_and_fetch_in_date_order() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        ensure_table(&pool, "riverhistory").await.unwrap();

        // Inserted out of order; the read must come back sorted by the
        // date token.
        insert_batch(
            &pool,
            "riverhistory",
            &[
                record("2017-01-03", 3.1),
                record("2017-01-01", 5.2),
                record("2017-01-02", 9.8),
            ],
        )
        .await
        .unwrap();

        let rows = fetch_ordered(&pool, "riverhistory").await.unwrap();
        let dates: Vec<&str> = rows.iter().map(|r| r.date_captured.as_str()).collect();
        assert_eq!(dates, vec!["2017-01-01", "2017-01-02", "2017-01-03"]);
        assert_eq!(rows[1].height, 9.8);

        assert_eq!(count_rows(&pool, "riverhistory").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        ensure_table(&pool, "riverhistory").await.unwrap();
        ensure_table(&pool, "riverhistory").await.unwrap();

        assert_eq!(count_rows(&pool, "riverhistory").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        ensure_table(&pool, "riverhistory").await.unwrap();

        insert_batch(&pool, "riverhistory", &[]).await.unwrap();
        assert_eq!(count_rows(&pool, "riverhistory").await.unwrap(), 0);
    }
}
