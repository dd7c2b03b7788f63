//! Plain-text rendering of console reports.

use std::fmt::Write;

use crate::db::models::ReadingRow;

const RULE_WIDTH: usize = 110;

/// Fixed-width table of readings, header first.
pub fn readings_table(rows: &[ReadingRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<40} {:<20} {:<10} {:<10} {:<10} {:<10}",
        "IPv6 Address", "Timestamp", "Lux (P)", "Lux (D)", "Bright(%)", "Power(W)"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for row in rows {
        let _ = writeln!(
            out,
            "{:<40} {:<20} {:<10} {:<10} {:<10} {:<10}",
            row.ipv6_address,
            row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            cell(row.lux_perceived),
            cell(row.lux_desired),
            cell(row.brightness_percent),
            row.power_consumption_watt
                .map(|w| format!("{w:.2}"))
                .unwrap_or_else(|| "-".to_owned()),
        );
    }
    out
}

fn cell(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_owned())
}

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

/// Energy estimate over one hour derived from the mean estimated power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySummary {
    /// Mean power over the hour; numerically the watt-hours consumed.
    pub average_watts: f64,
    pub total_kilojoules: f64,
}

impl EnergySummary {
    pub fn from_average(average_watts: f64) -> Self {
        Self {
            average_watts,
            total_kilojoules: average_watts * 3600.0 / 1000.0,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Average power consumption: {:.2} Wh\n\
             Total energy consumed (estimated): {:.2} kJ (kiloJoules)\n",
            self.average_watts, self.total_kilojoules
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn row(address: &str, brightness: Option<i32>, power: Option<f64>) -> ReadingRow {
        ReadingRow {
            ipv6_address: address.to_owned(),
            timestamp: NaiveDate::from_ymd_opt(2025, 6, 1)
                .unwrap()
                .and_hms_opt(12, 30, 5)
                .unwrap(),
            lux_perceived: Some(372),
            lux_desired: Some(572),
            brightness_percent: brightness,
            power_consumption_watt: power,
        }
    }

    #[test]
    fn table_has_header_rule_and_rows() {
        let table = readings_table(&[
            row("fd00::f6ce:366c:f0fd:f7e5", Some(20), Some(2.2)),
            row("fd00::f6ce:3636:5325:98f8", Some(0), Some(0.5)),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("IPv6 Address"));
        assert_eq!(lines[1], "-".repeat(110));
        assert!(lines[2].starts_with("fd00::f6ce:366c:f0fd:f7e5"));
        assert!(lines[2].contains("2025-06-01 12:30:05"));
        assert!(lines[2].contains("2.20"));
        assert!(lines[3].contains("0.50"));
    }

    #[test]
    fn table_columns_are_fixed_width() {
        let table = readings_table(&[row("fd00::1", Some(20), Some(2.2))]);
        let data = table.lines().nth(2).unwrap();
        // address column is 40 wide plus one separating space
        assert_eq!(&data[41..60], "2025-06-01 12:30:05");
    }

    #[test]
    fn table_marks_missing_values() {
        let table = readings_table(&[row("fd00::1", None, None)]);
        let fields: Vec<&str> = table.lines().nth(2).unwrap().split_whitespace().collect();
        assert_eq!(fields[fields.len() - 2..], ["-", "-"]);
    }

    #[test]
    fn energy_summary_for_constant_two_watts() {
        let summary = EnergySummary::from_average(2.0);
        assert!((summary.total_kilojoules - 7.2).abs() < 1e-9);
        let text = summary.render();
        assert!(text.contains("Average power consumption: 2.00 Wh"));
        assert!(text.contains("Total energy consumed (estimated): 7.20 kJ"));
    }
}
