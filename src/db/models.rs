use chrono::NaiveDateTime;
use sqlx::FromRow;

/// Idle draw of a lamp at 0 % brightness, in watts.
pub const IDLE_POWER_WATTS: f64 = 0.5;
/// Draw of a lamp at 100 % brightness, in watts.
pub const FULL_POWER_WATTS: f64 = 9.0;

/// Estimated power draw for a brightness percentage.
///
/// The dongles do not meter power. This is a linear model between
/// [`IDLE_POWER_WATTS`] and [`FULL_POWER_WATTS`], stored in
/// `readings.power_consumption_watt` and reported as an estimate.
pub fn estimate_power_watts(brightness_percent: i32) -> f64 {
    IDLE_POWER_WATTS + f64::from(brightness_percent) / 100.0 * (FULL_POWER_WATTS - IDLE_POWER_WATTS)
}

// ---------------------------------------------------------------------------
// Dongle registry
// ---------------------------------------------------------------------------

/// One row of the `dongles` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Dongle {
    pub id: i32,
    pub ipv6_address: String,
}

/// Address → id lookup built once at collector startup.
///
/// Iterates in registry (id) order. Never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DongleMap {
    dongles: Vec<Dongle>,
}

impl DongleMap {
    pub fn new(mut dongles: Vec<Dongle>) -> Self {
        dongles.sort_by_key(|d| d.id);
        Self { dongles }
    }

    pub fn id_of(&self, address: &str) -> Option<i32> {
        self.dongles
            .iter()
            .find(|d| d.ipv6_address == address)
            .map(|d| d.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dongle> {
        self.dongles.iter()
    }

    pub fn len(&self) -> usize {
        self.dongles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dongles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// A reading about to be appended to the `readings` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub dongle_id: i32,
    pub timestamp: NaiveDateTime,
    pub lux_perceived: i32,
    pub lux_desired: i32,
    pub brightness_percent: i32,
    /// Estimated, see [`estimate_power_watts`].
    pub power_consumption_watt: f64,
}

/// A stored reading joined with its dongle address, as listed by `last5`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReadingRow {
    pub ipv6_address: String,
    pub timestamp: NaiveDateTime,
    pub lux_perceived: Option<i32>,
    pub lux_desired: Option<i32>,
    pub brightness_percent: Option<i32>,
    pub power_consumption_watt: Option<f64>,
}
