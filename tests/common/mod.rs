//! In-memory stand-ins for MySQL and the dongles.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use smart_lamp_telemetry::{
    coap::{
        models::{Brightness, ResponseCode, StatusPayload},
        DongleError, DongleLink,
    },
    db::{
        models::{Dongle, DongleMap, NewReading, ReadingRow},
        ReadingStore,
    },
};

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    dongles: Vec<Dongle>,
    readings: Vec<NewReading>,
    next_dongle_id: i32,
    calls: usize,
    failing: bool,
    /// Addresses whose insert silently goes nowhere.
    lost: Vec<String>,
}

/// Clones share state, like two handles on the same database.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the server went away.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// Accept `address` on registration but never store it.
    pub fn lose_registration(&self, address: &str) {
        self.state.lock().unwrap().lost.push(address.to_owned());
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn dongles(&self) -> Vec<Dongle> {
        self.state.lock().unwrap().dongles.clone()
    }

    pub fn readings(&self) -> Vec<NewReading> {
        self.state.lock().unwrap().readings.clone()
    }

    /// Register dongles directly, as a previous collector run would have.
    pub fn seed_dongles(&self, addresses: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for address in addresses {
            state.next_dongle_id += 1;
            let id = state.next_dongle_id;
            state.dongles.push(Dongle { id, ipv6_address: (*address).to_owned() });
        }
    }

    pub fn seed_reading(&self, reading: NewReading) {
        self.state.lock().unwrap().readings.push(reading);
    }

    fn enter(&self) -> Result<std::sync::MutexGuard<'_, StoreState>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.failing {
            bail!("connection to server lost");
        }
        Ok(state)
    }
}

impl ReadingStore for FakeStore {
    async fn reset(&self) -> Result<()> {
        let mut state = self.enter()?;
        state.readings.clear();
        state.dongles.clear();
        // TRUNCATE restarts AUTO_INCREMENT
        state.next_dongle_id = 0;
        Ok(())
    }

    async fn register_dongles(&self, addresses: &[String]) -> Result<DongleMap> {
        let mut state = self.enter()?;
        for address in addresses {
            if state.lost.contains(address) {
                continue;
            }
            if state.dongles.iter().any(|d| &d.ipv6_address == address) {
                bail!("Duplicate entry '{address}' for key 'ipv6_address'");
            }
            state.next_dongle_id += 1;
            let id = state.next_dongle_id;
            state.dongles.push(Dongle { id, ipv6_address: address.clone() });
        }
        let registered = state
            .dongles
            .iter()
            .filter(|d| addresses.contains(&d.ipv6_address))
            .cloned()
            .collect();
        Ok(DongleMap::new(registered))
    }

    async fn insert_reading(&self, reading: &NewReading) -> Result<()> {
        let mut state = self.enter()?;
        if !state.dongles.iter().any(|d| d.id == reading.dongle_id) {
            bail!("foreign key constraint fails on dongle_id {}", reading.dongle_id);
        }
        state.readings.push(reading.clone());
        Ok(())
    }

    async fn dongle_addresses(&self) -> Result<Vec<String>> {
        let state = self.enter()?;
        Ok(state.dongles.iter().map(|d| d.ipv6_address.clone()).collect())
    }

    async fn latest_readings(&self, limit: u32) -> Result<Vec<ReadingRow>> {
        let state = self.enter()?;
        let mut rows: Vec<ReadingRow> = state
            .readings
            .iter()
            .filter_map(|r| {
                let dongle = state.dongles.iter().find(|d| d.id == r.dongle_id)?;
                Some(ReadingRow {
                    ipv6_address: dongle.ipv6_address.clone(),
                    timestamp: r.timestamp,
                    lux_perceived: Some(r.lux_perceived),
                    lux_desired: Some(r.lux_desired),
                    brightness_percent: Some(r.brightness_percent),
                    power_consumption_watt: Some(r.power_consumption_watt),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn average_power_since(&self, since: NaiveDateTime) -> Result<Option<f64>> {
        let state = self.enter()?;
        let recent: Vec<f64> = state
            .readings
            .iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| r.power_consumption_watt)
            .collect();
        if recent.is_empty() {
            return Ok(None);
        }
        Ok(Some(recent.iter().sum::<f64>() / recent.len() as f64))
    }
}

// ---------------------------------------------------------------------------
// FakeLink
// ---------------------------------------------------------------------------

/// How a fake dongle answers.
#[derive(Clone)]
pub enum Behaviour {
    /// Answers `GET /status` with this body and acknowledges commands.
    Body(&'static str),
    /// Never answers.
    Silent,
}

#[derive(Default)]
struct LinkState {
    dongles: HashMap<String, Behaviour>,
    reads: Vec<String>,
    commands: Vec<(String, u8)>,
}

#[derive(Clone, Default)]
pub struct FakeLink {
    state: Arc<Mutex<LinkState>>,
}

impl FakeLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, behaviour: Behaviour) -> Self {
        self.state
            .lock()
            .unwrap()
            .dongles
            .insert(address.to_owned(), behaviour);
        self
    }

    pub fn reads(&self) -> Vec<String> {
        self.state.lock().unwrap().reads.clone()
    }

    /// `(address, percent)` for every brightness command sent.
    pub fn commands(&self) -> Vec<(String, u8)> {
        self.state.lock().unwrap().commands.clone()
    }

    fn behaviour(&self, address: &str) -> Behaviour {
        self.state
            .lock()
            .unwrap()
            .dongles
            .get(address)
            .cloned()
            .unwrap_or(Behaviour::Silent)
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

impl DongleLink for FakeLink {
    async fn read_status(&self, address: &str) -> Result<StatusPayload, DongleError> {
        self.state.lock().unwrap().reads.push(address.to_owned());
        match self.behaviour(address) {
            Behaviour::Body(body) => Ok(StatusPayload::from_slice(body.as_bytes())?),
            Behaviour::Silent => Err(DongleError::Timeout(TIMEOUT)),
        }
    }

    async fn set_brightness(
        &self,
        address: &str,
        brightness: Brightness,
    ) -> Result<ResponseCode, DongleError> {
        self.state
            .lock()
            .unwrap()
            .commands
            .push((address.to_owned(), brightness.percent()));
        match self.behaviour(address) {
            // 2.04 Changed
            Behaviour::Body(_) => Ok(ResponseCode(0x44)),
            Behaviour::Silent => Err(DongleError::Timeout(TIMEOUT)),
        }
    }
}

pub const LAMP_A: &str = "fd00::f6ce:366c:f0fd:f7e5";
pub const LAMP_B: &str = "fd00::f6ce:3636:5325:98f8";

pub const STATUS_20: &str = r#"{"lux_perceived": 372, "lux_desired": 572, "brightness_percent": 20}"#;
pub const STATUS_100: &str = r#"{"lux_perceived": 360, "lux_desired": 1360, "brightness_percent": 100}"#;
pub const STATUS_NO_BRIGHTNESS: &str = r#"{"lux_perceived": 372, "lux_desired": 572}"#;
