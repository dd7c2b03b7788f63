/// Operator commands. Matching is exact after trimming and lower-casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Last5,
    LastHour,
    AllOff,
    AllOn,
    Help,
    Exit,
    /// Anything else, lower-cased as it was matched.
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let command = line.trim().to_lowercase();
        match command.as_str() {
            "last5" => Self::Last5,
            "lasthour" => Self::LastHour,
            "alloff" => Self::AllOff,
            "allon" => Self::AllOn,
            "help" => Self::Help,
            "exit" | "quit" => Self::Exit,
            _ => Self::Unknown(command),
        }
    }
}

pub const HELP: &str = "\
--- Smart Lamp User Application ---
Available commands:
  last5      - Display the last 5 sensor readings from all dongles.
  lastHour   - Calculate and display the total energy consumption in the last hour.
  allOff     - Send a command to turn off all lamps.
  allOn      - Send a command to turn on all lamps to 20% brightness.
  help       - Show this list of commands.
  exit / quit- Close the application.
-----------------------------------";
