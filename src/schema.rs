//! Idempotent schema bootstrap, grounded on `scid_to_qdb.py`'s
//! `create_table_if_not_exists`: create the table if absent, then attempt
//! to add the `front_contract` column and tolerate it already existing.

use sqlx::PgPool;

pub fn create_table_sql(table_name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table_name} (\n\
         \x20   time TIMESTAMP,\n\
         \x20   open DOUBLE,\n\
         \x20   high DOUBLE,\n\
         \x20   low DOUBLE,\n\
         \x20   close DOUBLE,\n\
         \x20   volume INT,\n\
         \x20   number_of_trades INT,\n\
         \x20   bid_volume INT,\n\
         \x20   ask_volume INT,\n\
         \x20   symbol SYMBOL CAPACITY 256,\n\
         \x20   symbol_period SYMBOL CAPACITY 256,\n\
         \x20   front_contract BOOLEAN\n\
         ) TIMESTAMP(time)\n\
         PARTITION BY DAY WAL\n\
         DEDUP UPSERT KEYS(time, symbol, symbol_period);"
    )
}

pub fn add_front_contract_column_sql(table_name: &str) -> String {
    format!(
        "ALTER TABLE {table_name} ADD COLUMN IF NOT EXISTS front_contract BOOLEAN"
    )
}

/// Ensures `table_name` exists with the required schema. Errors
/// other than "already exists" propagate; the "already exists" class is
/// swallowed since the `ALTER TABLE ... IF NOT EXISTS` form already makes
/// this idempotent on databases that support it, and a second identical
/// `CREATE TABLE IF NOT EXISTS` is harmless everywhere else.
pub async fn bootstrap(pool: &PgPool, table_name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(&create_table_sql(table_name))
        .execute(pool)
        .await?;
    sqlx::query(&add_front_contract_column_sql(table_name))
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_declares_dedup_keys() {
        let sql = create_table_sql("trades");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS trades"));
        assert!(sql.contains("DEDUP UPSERT KEYS(time, symbol, symbol_period)"));
        assert!(sql.contains("SYMBOL CAPACITY 256"));
        assert!(sql.contains("front_contract BOOLEAN"));
    }

    #[test]
    fn add_column_statement_is_idempotent_form() {
        let sql = add_front_contract_column_sql("trades");
        assert_eq!(
            sql,
            "ALTER TABLE trades ADD COLUMN IF NOT EXISTS front_contract BOOLEAN"
        );
    }
}
