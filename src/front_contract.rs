//! Day-by-day, symbol-by-symbol front-contract marker pass. Grounded on
//! `compute_front_contract_questdb.py`'s `deduplicate_data`, with the
//! tie-break the original left to `ORDER BY ... DESC` row order fixed
//! instead to lexicographically smallest `symbol_period`.

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use crate::error::{MarkerError, QuerySnafu};
use snafu::ResultExt;

/// One `(symbol_period, total_volume)` row from the daily aggregate
/// query.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodVolume {
    pub symbol_period: String,
    pub total_volume: i64,
}

/// Chooses the front contract among `periods` for a single (date, symbol)
/// pair. Returns `None` when fewer than two distinct periods are present
/// (no ambiguity, skip). Ties are broken by lexicographically smallest
/// `symbol_period`.
pub fn choose_front_contract(periods: &[PeriodVolume]) -> Option<&str> {
    if periods.len() < 2 {
        return None;
    }

    let max_volume = periods.iter().map(|p| p.total_volume).max()?;
    periods
        .iter()
        .filter(|p| p.total_volume == max_volume)
        .map(|p| p.symbol_period.as_str())
        .min()
}

/// Distinct symbols present in `table_name`, for runs that omit
/// `--symbols`. Grounded on `compute_front_contract_questdb.py`'s
/// `get_symbols` (`SELECT DISTINCT symbol FROM trades`).
pub async fn discover_symbols(pool: &PgPool, table_name: &str) -> Result<Vec<String>, sqlx::Error> {
    let sql = format!("SELECT DISTINCT symbol FROM {table_name}");
    let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(symbol,)| symbol).collect())
}

/// Earliest record timestamp in `table_name`, for runs that omit
/// `--start-date`. Grounded on `compute_front_contract_questdb.py`'s
/// `get_start_date` (`SELECT min(time) FROM trades`), falling back to
/// today when the table is empty.
pub async fn discover_start_date(pool: &PgPool, table_name: &str) -> Result<NaiveDate, sqlx::Error> {
    let sql = format!("SELECT min(time) FROM {table_name}");
    let row: (Option<chrono::DateTime<chrono::Utc>>,) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(row
        .0
        .map(|earliest| earliest.date_naive())
        .unwrap_or_else(|| chrono::Utc::now().date_naive()))
}

/// Fetches per-`symbol_period` summed volume for one (date, symbol) pair.
async fn fetch_period_volumes(
    pool: &PgPool,
    table_name: &str,
    date: NaiveDate,
    symbol: &str,
) -> Result<Vec<PeriodVolume>, sqlx::Error> {
    let sql = format!(
        "SELECT symbol_period, sum(volume) AS total_volume \
         FROM {table_name} \
         WHERE symbol = $1 AND time >= $2 AND time < $3 \
         GROUP BY symbol_period"
    );
    let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let day_end = (date + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap().and_utc();

    let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
        .bind(symbol)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(symbol_period, total_volume)| PeriodVolume {
            symbol_period,
            total_volume,
        })
        .collect())
}

/// Processes one (date, symbol) pair: aggregate, pick the front contract,
/// and rewrite the boolean column in a single transaction. Idempotent:
/// re-running on an already-marked day is a no-op write of the same
/// values. On error, the transaction is rolled back by dropping it; this
/// function itself never partially commits.
pub async fn mark_day_symbol(
    pool: &PgPool,
    table_name: &str,
    date: NaiveDate,
    symbol: &str,
) -> Result<(), MarkerError> {
    let periods = fetch_period_volumes(pool, table_name, date, symbol)
        .await
        .context(QuerySnafu {
            date,
            symbol: symbol.to_owned(),
        })?;

    let Some(chosen) = choose_front_contract(&periods) else {
        return Ok(());
    };

    let mut tx = pool.begin().await.context(QuerySnafu {
        date,
        symbol: symbol.to_owned(),
    })?;

    let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let day_end = (date + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap().and_utc();

    let clear_sql =
        format!("UPDATE {table_name} SET front_contract = FALSE WHERE symbol = $1 AND time >= $2 AND time < $3");
    sqlx::query(&clear_sql)
        .bind(symbol)
        .bind(day_start)
        .bind(day_end)
        .execute(&mut *tx)
        .await
        .context(QuerySnafu {
            date,
            symbol: symbol.to_owned(),
        })?;

    let set_sql = format!(
        "UPDATE {table_name} SET front_contract = TRUE \
         WHERE symbol = $1 AND time >= $2 AND time < $3 AND symbol_period = $4"
    );
    sqlx::query(&set_sql)
        .bind(symbol)
        .bind(day_start)
        .bind(day_end)
        .bind(chosen)
        .execute(&mut *tx)
        .await
        .context(QuerySnafu {
            date,
            symbol: symbol.to_owned(),
        })?;

    tx.commit().await.context(QuerySnafu {
        date,
        symbol: symbol.to_owned(),
    })?;

    Ok(())
}

/// Picks which symbols to run on a given day. Resume only applies on the
/// first day; if `resume_from_symbol` names a symbol absent from
/// `symbols`, falls back to processing all of them rather than yielding
/// an empty set.
fn symbols_for_day<'a>(
    symbols: &'a [String],
    resume_from_symbol: Option<&str>,
    first_day: bool,
) -> Vec<&'a String> {
    if !first_day {
        return symbols.iter().collect();
    }

    match resume_from_symbol {
        Some(resume) if symbols.iter().any(|s| s == resume) => {
            symbols.iter().skip_while(|s| s.as_str() != resume).collect()
        }
        Some(resume) => {
            tracing::warn!(
                message = "resume symbol not found, processing all symbols",
                symbol = resume,
            );
            symbols.iter().collect()
        }
        None => symbols.iter().collect(),
    }
}

/// Runs the marker over `[start_date, end_date]` for `symbols`, skipping
/// already-processed symbols on the first day only via
/// `resume_from_symbol`. Errors on one (date, symbol) pair are logged
/// and do not stop the pass; the function returns how many pairs failed.
pub async fn run_marker(
    pool: &PgPool,
    table_name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    symbols: &[String],
    resume_from_symbol: Option<&str>,
) -> usize {
    let mut failures = 0;
    let mut date = start_date;
    let mut first_day = true;

    while date <= end_date {
        let symbols_to_process = symbols_for_day(symbols, resume_from_symbol, first_day);

        for symbol in symbols_to_process {
            if let Err(error) = mark_day_symbol(pool, table_name, date, symbol).await {
                tracing::error!(message = "front-contract marker failed for pair, continuing", %date, %symbol, %error);
                failures += 1;
            }
        }

        first_day = false;
        date += Duration::days(1);
    }

    failures
}
