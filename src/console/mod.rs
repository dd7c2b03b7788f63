pub mod commands;
pub mod input;
pub mod report;

use std::{future::Future, io::Write};

use chrono::{Local, TimeDelta};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::{
    coap::{models::Brightness, DongleError, DongleLink},
    db::ReadingStore,
};

pub use commands::Command;
pub use input::spawn_line_reader;

use self::report::EnergySummary;

const PROMPT: &str = "Enter command > ";

/// Line-oriented operator console over the shared store and the dongles.
///
/// Has a single state, "awaiting command". Database and device failures are
/// reported for the command that hit them and the loop carries on.
pub struct Console<S, L> {
    store: S,
    link: L,
}

impl<S: ReadingStore, L: DongleLink> Console<S, L> {
    pub fn new(store: S, link: L) -> Self {
        Self { store, link }
    }

    /// Read commands from `lines` until `exit`/`quit`, the channel closes
    /// (end of input), or `shutdown` resolves.
    pub async fn run<W: Write>(
        &self,
        mut lines: mpsc::Receiver<String>,
        out: &mut W,
        shutdown: impl Future<Output = ()>,
    ) -> std::io::Result<()> {
        tokio::pin!(shutdown);
        writeln!(out, "\n{}", commands::HELP)?;

        loop {
            write!(out, "\n{PROMPT}")?;
            out.flush()?;

            let line = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                line = lines.recv() => line,
            };

            let command = line.map_or(Command::Exit, |line| Command::parse(&line));
            if command == Command::Exit {
                writeln!(out, "Exiting application.")?;
                return Ok(());
            }
            self.execute(&command, out).await?;
        }
    }

    /// Run one command, writing its report to `out`.
    pub async fn execute<W: Write>(&self, command: &Command, out: &mut W) -> std::io::Result<()> {
        match command {
            Command::Last5 => self.last_readings(out).await,
            Command::LastHour => self.last_hour(out).await,
            Command::AllOff => self.switch_all(Brightness::OFF, out).await,
            Command::AllOn => self.switch_all(Brightness::ON, out).await,
            Command::Help => writeln!(out, "\n{}", commands::HELP),
            Command::Exit => Ok(()),
            Command::Unknown(other) => writeln!(
                out,
                "Unknown command: '{other}'. Type 'help' to see available commands."
            ),
        }
    }

    async fn last_readings<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self.store.latest_readings(5).await {
            Ok(rows) if rows.is_empty() => {
                writeln!(out, "No records found in the 'readings' table.")
            }
            Ok(rows) => {
                writeln!(out, "\n--- Last 5 Readings ---")?;
                write!(out, "{}", report::readings_table(&rows))
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "last5 query failed");
                writeln!(out, "Database error while fetching last 5 records: {e:#}")
            }
        }
    }

    async fn last_hour<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let since = Local::now().naive_local() - TimeDelta::hours(1);
        match self.store.average_power_since(since).await {
            Ok(None) => writeln!(
                out,
                "No data recorded in the last hour to calculate consumption."
            ),
            Ok(Some(average)) => {
                writeln!(out, "\n--- Energy Consumption in the Last Hour ---")?;
                write!(out, "{}", EnergySummary::from_average(average).render())
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "lasthour query failed");
                writeln!(out, "Database error while calculating consumption: {e:#}")
            }
        }
    }

    /// Send `brightness` to every registered dongle. A dongle that fails does
    /// not stop the others.
    async fn switch_all<W: Write>(&self, brightness: Brightness, out: &mut W) -> std::io::Result<()> {
        let addresses = match self.store.dongle_addresses().await {
            Ok(addresses) => addresses,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Dongle lookup failed");
                return writeln!(out, "Error fetching dongle IPs from database: {e:#}");
            }
        };
        if addresses.is_empty() {
            return writeln!(out, "No dongles registered in the database.");
        }

        let percent = brightness.percent();
        for address in &addresses {
            writeln!(
                out,
                "Sending command to {address}: set brightness to {percent}% (payload: '{percent}')"
            )?;
            match self.link.set_brightness(address, brightness).await {
                Ok(code) => writeln!(out, "  -> Success! Dongle responded with code: {code}")?,
                Err(DongleError::Timeout(_)) => {
                    warn!(address = %address, "No response to brightness command");
                    writeln!(out, "  -> Failure! No response from dongle (timeout or error).")?
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "Brightness command failed");
                    writeln!(
                        out,
                        "  -> An error occurred while sending command to {address}: {e}"
                    )?
                }
            }
        }
        Ok(())
    }
}
