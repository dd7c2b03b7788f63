//! Idempotent schema creation and the collector's startup reset.

use anyhow::{Context, Result};
use sqlx::{pool::PoolConnection, MySql, MySqlPool};

const CREATE_DONGLES: &str = r#"
    CREATE TABLE IF NOT EXISTS dongles (
        id           INT AUTO_INCREMENT PRIMARY KEY,
        ipv6_address VARCHAR(45) UNIQUE NOT NULL
    )
"#;

const CREATE_READINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS readings (
        id                     INT AUTO_INCREMENT PRIMARY KEY,
        dongle_id              INT NOT NULL,
        timestamp              DATETIME NOT NULL,
        lux_perceived          INT,
        lux_desired            INT,
        brightness_percent     INT,
        power_consumption_watt DECIMAL(6, 3),
        FOREIGN KEY (dongle_id) REFERENCES dongles(id) ON DELETE CASCADE
    )
"#;

/// Statements run in order on a single connection. `FOREIGN_KEY_CHECKS` is
/// session scoped, so splitting them across connections would not work.
const RESET: [&str; 4] = [
    "SET FOREIGN_KEY_CHECKS = 0",
    "TRUNCATE TABLE readings",
    "TRUNCATE TABLE dongles",
    "SET FOREIGN_KEY_CHECKS = 1",
];

/// Create `dongles` and `readings` if they do not exist yet.
///
/// `readings` references `dongles`, so the order matters.
pub async fn create_schema(pool: &MySqlPool) -> Result<()> {
    sqlx::raw_sql(CREATE_DONGLES)
        .execute(pool)
        .await
        .context("failed to create table 'dongles'")?;
    sqlx::raw_sql(CREATE_READINGS)
        .execute(pool)
        .await
        .context("failed to create table 'readings'")?;
    Ok(())
}

/// Empty both tables so every collector run starts from a clean registry.
pub async fn reset(pool: &MySqlPool) -> Result<()> {
    let mut conn: PoolConnection<MySql> = pool.acquire().await?;
    for statement in RESET {
        sqlx::raw_sql(statement)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("reset statement failed: {statement}"))?;
    }
    Ok(())
}

/// `CREATE DATABASE` cannot bind the name, so it is quoted here. Names are
/// validated by `Config` to contain only `[A-Za-z0-9_]`.
pub(crate) fn create_database_sql(name: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS `{name}`")
}
