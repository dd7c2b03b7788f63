//! Smart-lamp telemetry: a CoAP polling collector and an operator console
//! sharing one MySQL database.

pub mod coap;
pub mod collector;
pub mod config;
pub mod console;
pub mod db;
pub mod logging;
pub mod shutdown;
