use anyhow::Result;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use smart_lamp_telemetry::{
    coap::CoapClient,
    collector::CollectorService,
    config::Config,
    db::MySqlStore,
    logging,
    shutdown::shutdown_signal,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env if present; env vars may also be set externally
    let _ = dotenvy::dotenv();

    logging::init("info,sqlx=warn", BoxMakeWriter::new(std::io::stdout));

    let config = Config::from_env()?;
    config.log_config();

    // Any failure up to here exits non-zero
    let store = MySqlStore::bootstrap(&config.database).await?;
    let link = CoapClient::new(config.coap_port, config.request_timeout());

    let collector = match CollectorService::start(
        store.clone(),
        link,
        &config.dongle_address_strings(),
        config.poll_interval(),
    )
    .await
    {
        Ok(collector) => collector,
        Err(e) => {
            store.close().await;
            return Err(e.context("fatal error during database setup"));
        }
    };

    collector.run(shutdown_signal()).await;

    store.close().await;
    info!("Closed database connection");
    Ok(())
}
