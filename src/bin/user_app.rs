use std::io::BufReader;

use anyhow::Result;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use smart_lamp_telemetry::{
    coap::CoapClient,
    config::ConsoleConfig,
    console::{spawn_line_reader, Console},
    db::MySqlStore,
    logging,
    shutdown::shutdown_signal,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout belongs to the operator; diagnostics go to stderr.
    logging::init("warn", BoxMakeWriter::new(std::io::stderr));

    let config = ConsoleConfig::from_env()?;
    config.log_config();

    // stdin is read on its own thread; the runtime never waits on it.
    let lines = spawn_line_reader(BufReader::new(std::io::stdin()))?;

    let store = match MySqlStore::connect(&config.database).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "\nFATAL: Could not connect to database. Please check the DB_* settings and ensure MySQL is running."
            );
            return Err(e);
        }
    };
    println!("Successfully connected to the database.");

    let console = Console::new(
        store.clone(),
        CoapClient::new(config.coap_port, config.request_timeout()),
    );
    let result = console
        .run(lines, &mut std::io::stdout(), shutdown_signal())
        .await;

    store.close().await;
    println!("\nDatabase connection closed.");
    Ok(result?)
}
