//! luxmon-optics: what to collect from each device, and what to make of it.
//!
//! [`mib`] declares the SNMP tables a query walks (IF-MIB, ENTITY-MIB,
//! ENTITY-SENSOR-MIB and the Juniper DOM enterprise tables) as
//! schema-annotated records for `luxmon-snmp`. [`fuse`] turns one walked
//! [`OpticsMib`] into a [`DeviceData`] snapshot: per-port traffic counters
//! plus per-lane optical readings in common units.

pub mod fuse;
pub mod mib;
pub mod units;


pub use fuse::{DeviceData, OpticalSensor, OpticsData};
pub use mib::OpticsMib;
