//! Telemetry export data types and the exporter capability contract.

pub mod trace;
