pub mod models;
pub mod schema;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    Connection, MySql, MySqlConnection, MySqlPool, QueryBuilder,
};
use tracing::info;

use crate::config::DatabaseConfig;

use self::models::{Dongle, DongleMap, NewReading, ReadingRow};

// ---------------------------------------------------------------------------
// ReadingStore
// ---------------------------------------------------------------------------

/// Everything the collector and the console need from the shared database.
///
/// [`MySqlStore`] is the production implementation. Every call goes to the
/// store; nothing is cached in process.
#[allow(async_fn_in_trait)]
pub trait ReadingStore {
    /// Empty the registry and all readings.
    async fn reset(&self) -> Result<()>;

    /// Insert `addresses` into the registry and read back their ids.
    async fn register_dongles(&self, addresses: &[String]) -> Result<DongleMap>;

    /// Append one reading.
    async fn insert_reading(&self, reading: &NewReading) -> Result<()>;

    /// Every registered dongle address, in registry order.
    async fn dongle_addresses(&self) -> Result<Vec<String>>;

    /// The `limit` most recent readings across all dongles, newest first.
    async fn latest_readings(&self, limit: u32) -> Result<Vec<ReadingRow>>;

    /// Mean estimated power of readings taken at or after `since`, `None`
    /// when no reading qualifies.
    async fn average_power_since(&self, since: NaiveDateTime) -> Result<Option<f64>>;
}

// ---------------------------------------------------------------------------
// MySqlStore
// ---------------------------------------------------------------------------

/// MySQL backed store holding the single connection a process uses.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect to an existing database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(server_options(config).database(&config.name))
            .await
            .with_context(|| {
                format!(
                    "failed to connect to database '{}' on {}:{}",
                    config.name, config.host, config.port
                )
            })?;
        Ok(Self { pool })
    }

    /// Create the database and tables if missing, then connect to it.
    pub async fn bootstrap(config: &DatabaseConfig) -> Result<Self> {
        let mut server = MySqlConnection::connect_with(&server_options(config))
            .await
            .with_context(|| {
                format!("failed to connect to MySQL on {}:{}", config.host, config.port)
            })?;
        sqlx::raw_sql(&schema::create_database_sql(&config.name))
            .execute(&mut server)
            .await
            .with_context(|| format!("failed to create database '{}'", config.name))?;
        server.close().await?;
        info!(database = %config.name, "Database created/verified");

        let store = Self::connect(config).await?;
        schema::create_schema(&store.pool).await?;
        info!("'dongles' and 'readings' tables created/verified");
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl ReadingStore for MySqlStore {
    async fn reset(&self) -> Result<()> {
        schema::reset(&self.pool).await
    }

    async fn register_dongles(&self, addresses: &[String]) -> Result<DongleMap> {
        for address in addresses {
            sqlx::query("INSERT INTO dongles (ipv6_address) VALUES (?)")
                .bind(address)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to register dongle {address}"))?;
        }

        if addresses.is_empty() {
            return Ok(DongleMap::default());
        }

        let mut query =
            QueryBuilder::<MySql>::new("SELECT id, ipv6_address FROM dongles WHERE ipv6_address IN (");
        let mut values = query.separated(", ");
        for address in addresses {
            values.push_bind(address.clone());
        }
        values.push_unseparated(") ORDER BY id");

        let dongles: Vec<Dongle> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("failed to read back registered dongles")?;
        Ok(DongleMap::new(dongles))
    }

    async fn insert_reading(&self, reading: &NewReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO readings
                (dongle_id, timestamp, lux_perceived, lux_desired,
                 brightness_percent, power_consumption_watt)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reading.dongle_id)
        .bind(reading.timestamp)
        .bind(reading.lux_perceived)
        .bind(reading.lux_desired)
        .bind(reading.brightness_percent)
        .bind(reading.power_consumption_watt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn dongle_addresses(&self) -> Result<Vec<String>> {
        let addresses = sqlx::query_scalar("SELECT ipv6_address FROM dongles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(addresses)
    }

    async fn latest_readings(&self, limit: u32) -> Result<Vec<ReadingRow>> {
        // DECIMAL is cast so it decodes without a decimal crate.
        let rows = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT d.ipv6_address, r.timestamp, r.lux_perceived, r.lux_desired,
                   r.brightness_percent,
                   CAST(r.power_consumption_watt AS DOUBLE) AS power_consumption_watt
            FROM readings r
            JOIN dongles d ON r.dongle_id = d.id
            ORDER BY r.timestamp DESC, r.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn average_power_since(&self, since: NaiveDateTime) -> Result<Option<f64>> {
        let average: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT CAST(AVG(power_consumption_watt) AS DOUBLE)
            FROM readings
            WHERE timestamp >= ?
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(average)
    }
}

/// Server connection options without a database selected.
fn server_options(config: &DatabaseConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
}
