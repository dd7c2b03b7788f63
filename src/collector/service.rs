use std::{future::Future, time::Duration};

use anyhow::{bail, Result};
use chrono::Local;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{
    coap::{DongleError, DongleLink},
    db::{
        models::{estimate_power_watts, Dongle, DongleMap, NewReading},
        ReadingStore,
    },
};

/// Why one dongle produced no reading in a cycle.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Dongle(#[from] DongleError),
    #[error("failed to store reading: {0:#}")]
    Store(anyhow::Error),
}

/// Outcome of one pass over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub stored: usize,
    pub skipped: usize,
}

pub struct CollectorService<S, L> {
    store: S,
    link: L,
    dongles: DongleMap,
    interval: Duration,
}

impl<S: ReadingStore, L: DongleLink> CollectorService<S, L> {
    /// Reset the store, register `addresses` and build the lookup used for
    /// the rest of the process lifetime.
    pub async fn start(store: S, link: L, addresses: &[String], interval: Duration) -> Result<Self> {
        info!("Flushing the tables");
        store.reset().await?;
        info!("Tables flushed");

        let dongles = store.register_dongles(addresses).await?;
        if let Some(missing) = addresses.iter().find(|a| dongles.id_of(a).is_none()) {
            bail!("dongle {missing} was not found in the registry after registration");
        }
        for dongle in dongles.iter() {
            info!(dongle_id = dongle.id, address = %dongle.ipv6_address, "Dongle registered");
        }

        Ok(Self { store, link, dongles, interval })
    }

    pub fn dongles(&self) -> &DongleMap {
        &self.dongles
    }

    /// Poll every `interval` until `shutdown` resolves.
    ///
    /// The first cycle runs immediately. A cycle in progress is abandoned
    /// when shutdown is requested.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            dongles = self.dongles.len(),
            "Polling loop started"
        );
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Polling loop stopped");
                    return;
                }
                summary = async {
                    ticker.tick().await;
                    self.poll_cycle().await
                } => {
                    info!(
                        stored = summary.stored,
                        skipped = summary.skipped,
                        next_in_secs = self.interval.as_secs(),
                        "Cycle completed"
                    );
                }
            }
        }
    }

    /// Poll each dongle once, in registry order. Failures are logged and
    /// never stop the remaining dongles.
    pub async fn poll_cycle(&self) -> CycleSummary {
        info!("New sampling cycle");
        let mut summary = CycleSummary::default();

        for dongle in self.dongles.iter() {
            match self.fetch_and_persist(dongle).await {
                Ok(reading) => {
                    info!(
                        address = %dongle.ipv6_address,
                        brightness_percent = reading.brightness_percent,
                        power_estimate_watt = reading.power_consumption_watt,
                        "Reading saved"
                    );
                    summary.stored += 1;
                }
                Err(PollError::Store(e)) => {
                    error!(address = %dongle.ipv6_address, error = %format!("{e:#}"), "Failed to store reading");
                    summary.skipped += 1;
                }
                Err(PollError::Dongle(e)) => {
                    warn!(address = %dongle.ipv6_address, error = %e, "Skipping dongle this cycle");
                    summary.skipped += 1;
                }
            }
        }

        summary
    }

    /// Read the status of one dongle and append it as a reading.
    pub async fn fetch_and_persist(&self, dongle: &Dongle) -> Result<NewReading, PollError> {
        let status = self.link.read_status(&dongle.ipv6_address).await?;

        let reading = NewReading {
            dongle_id: dongle.id,
            timestamp: Local::now().naive_local(),
            lux_perceived: status.lux_perceived,
            lux_desired: status.lux_desired,
            brightness_percent: status.brightness_percent,
            power_consumption_watt: estimate_power_watts(status.brightness_percent),
        };

        self.store
            .insert_reading(&reading)
            .await
            .map_err(PollError::Store)?;
        Ok(reading)
    }
}
