//! Fuses the raw MIB tables into a per-port optical snapshot.
//!
//! The passes cross-reference tables by interface name and ifIndex, convert
//! vendor-specific encodings into common units (dBm, amperes, celsius), and
//! drop ports that carry no usable optical data (direct-attach cables and
//! default rows, mostly).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mib::OpticsMib;
use crate::units::{port_from_interface_name, watts_to_dbm};

/// A network device's collected metadata, keyed by front-panel port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceData {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optics_by_port: BTreeMap<u32, OpticsData>,
}

/// One port's L2/L3 counters and optical module metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpticsData {
    /// Megabits per second.
    pub speed: u64,

    pub in_errors: u64,
    pub in_octets: u64,
    pub in_unicast_pkts: u64,
    pub in_multicast_pkts: u64,
    pub in_broadcast_pkts: u64,

    pub out_errors: u64,
    pub out_octets: u64,
    pub out_unicast_pkts: u64,
    pub out_multicast_pkts: u64,
    pub out_broadcast_pkts: u64,

    /// Celsius.
    pub module_temperature: f32,
    /// Volts.
    pub module_voltage: f32,
    pub lane_count: u32,
    /// Lane numbering starts at 1; slot 0 is reserved for the module itself.
    pub sensors_by_lane: BTreeMap<u32, OpticalSensor>,
}

/// One lane's sensor readings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpticalSensor {
    /// Celsius.
    pub laser_temperature: f32,
    /// dBm.
    pub rx_laser_power: f32,
    /// Amperes.
    pub tx_laser_bias_current: f32,
    /// dBm.
    pub tx_laser_power: f32,
}

impl OpticalSensor {
    pub fn is_non_zero(&self) -> bool {
        self.laser_temperature > 0.0
            || self.rx_laser_power > 0.0
            || self.tx_laser_power > 0.0
            || self.tx_laser_bias_current > 0.0
    }
}

impl DeviceData {
    /// Compiles a walked MIB dataset into the per-port summary.
    pub fn from_mib(host: &str, mib: &OpticsMib) -> Self {
        let (port_by_id, mut by_port) = extract_interfaces(mib);
        extract_interface_hc(mib, &mut by_port);
        extract_arista(mib, &mut by_port);
        extract_juniper(mib, &port_by_id, &mut by_port);

        Self {
            host: host.to_string(),
            error: None,
            optics_by_port: cleanup(by_port),
        }
    }

    /// A snapshot carrying only an error message (no data).
    pub fn errored(host: &str, error: impl Into<String>) -> Self {
        Self {
            host: host.to_string(),
            error: Some(error.into()),
            optics_by_port: BTreeMap::new(),
        }
    }
}

/// First pass over ifTable: establishes the port set and accumulates the
/// 32-bit counters. Returns the ifIndex-to-port mapping used by the
/// ifIndex-keyed vendor tables; only the row that created a port claims its
/// ifIndex slot, aggregated members fold their counters in.
fn extract_interfaces(mib: &OpticsMib) -> (BTreeMap<u32, u32>, BTreeMap<u32, OpticsData>) {
    let mut port_by_id = BTreeMap::new();
    let mut by_port: BTreeMap<u32, OpticsData> = BTreeMap::new();

    for (id, entry) in &mib.interface {
        let Some(port) = port_from_interface_name(&entry.descr) else {
            continue;
        };

        if !by_port.contains_key(&port) {
            port_by_id.insert(*id, port);
        }
        let intf = by_port.entry(port).or_default();

        // ifSpeed is bits/sec; everything downstream uses megabits/sec.
        intf.speed += u64::from(entry.speed) / 1_000_000;

        intf.in_errors += u64::from(entry.in_errors);
        intf.in_octets += u64::from(entry.in_octets);
        intf.in_unicast_pkts += u64::from(entry.in_ucast_pkts);

        intf.out_errors += u64::from(entry.out_errors);
        intf.out_octets += u64::from(entry.out_octets);
        intf.out_unicast_pkts += u64::from(entry.out_ucast_pkts);
    }

    (port_by_id, by_port)
}

/// ifXTable pass: when the device reports 64-bit counters, they replace the
/// wrapping 32-bit ones accumulated from ifTable.
fn extract_interface_hc(mib: &OpticsMib, by_port: &mut BTreeMap<u32, OpticsData>) {
    if !mib.interface_hc.is_empty() {
        for entry in by_port.values_mut() {
            entry.speed = 0;
            entry.in_octets = 0;
            entry.in_unicast_pkts = 0;
            entry.out_octets = 0;
            entry.out_unicast_pkts = 0;
        }
    }

    for entry in mib.interface_hc.values() {
        let Some(port) = port_from_interface_name(&entry.name) else {
            continue;
        };
        let Some(intf) = by_port.get_mut(&port) else {
            tracing::debug!(name = %entry.name, port, "ifXTable row without an ifTable port");
            continue;
        };

        intf.speed += entry.high_speed;

        intf.in_octets += entry.hc_in_octets;
        intf.in_unicast_pkts += entry.hc_in_ucast_pkts;
        intf.in_multicast_pkts += entry.hc_in_multicast_pkts;
        intf.in_broadcast_pkts += entry.hc_in_broadcast_pkts;

        intf.out_octets += entry.hc_out_octets;
        intf.out_unicast_pkts += entry.hc_out_ucast_pkts;
        intf.out_multicast_pkts += entry.hc_out_multicast_pkts;
        intf.out_broadcast_pkts += entry.hc_out_broadcast_pkts;
    }
}

const MODULE_TEMPERATURE_SENSOR: u32 = 1;
const MODULE_VOLTAGE_SENSOR: u32 = 2;

const TX_LASER_BIAS_CURRENT_SENSOR: u32 = 1;
const TX_LASER_POWER_SENSOR: u32 = 2;
const RX_LASER_POWER_SENSOR: u32 = 3;

/// Arista DOM pass over entPhySensorTable.
///
/// DOM sensors are registered with entPhysicalIndex `1003PP2LS`:
/// `PP` is the port, `L` the lane (0 for the module itself) and `S` the
/// sensor: temperature/voltage for lane 0, bias/tx-power/rx-power otherwise.
fn extract_arista(mib: &OpticsMib, by_port: &mut BTreeMap<u32, OpticsData>) {
    for (id, entry) in &mib.sensor {
        if id / 100_000 != 1003 {
            continue;
        }

        let sub = id % 100_000;
        let port = sub / 1000;
        let lane = (sub / 10) % 10;
        let sensor_id = sub % 10;

        let Some(intf) = by_port.get_mut(&port) else {
            tracing::debug!(id, port, "DOM sensor for a port with no interface row");
            continue;
        };

        if lane == 0 {
            match sensor_id {
                MODULE_TEMPERATURE_SENSOR => intf.module_temperature = entry.scaled_value(),
                MODULE_VOLTAGE_SENSOR => intf.module_voltage = entry.scaled_value(),
                _ => {}
            }
        } else {
            let sensor = intf.sensors_by_lane.entry(lane).or_default();

            // Down interfaces can report -1000000 mW of receive power, which
            // turns into NaN once fed through log10; clamp to 1 (log(0) is
            // -Inf).
            let raw = if entry.value < 0 { 1 } else { entry.value };
            let value = (f64::from(raw) * entry.scale_factor()) as f32;

            match sensor_id {
                TX_LASER_BIAS_CURRENT_SENSOR => sensor.tx_laser_bias_current = value,
                TX_LASER_POWER_SENSOR => sensor.tx_laser_power = watts_to_dbm(value),
                RX_LASER_POWER_SENSOR => sensor.rx_laser_power = watts_to_dbm(value),
                _ => {}
            }
        }
    }
}

/// Juniper DOM pass: module table plus the per-lane table, both keyed by
/// ifIndex.
fn extract_juniper(
    mib: &OpticsMib,
    port_by_id: &BTreeMap<u32, u32>,
    by_port: &mut BTreeMap<u32, OpticsData>,
) {
    for (id, entry) in &mib.juniper_dom {
        let Some(intf) = port_by_id.get(id).and_then(|port| by_port.get_mut(port)) else {
            continue;
        };

        intf.module_temperature = entry.temperature as f32;
        intf.module_voltage = entry.voltage as f32 / 1000.0;
        intf.lane_count = entry.lane_count.max(0) as u32;
    }

    for (lane, cont) in &mib.juniper_lane_dom {
        // Module sensors are a separate table here, so lane numbering starts
        // at 0; shift to the cross-vendor 1-based convention.
        let lane = lane + 1;

        for (id, entry) in &cont.entries {
            let Some(intf) = port_by_id.get(id).and_then(|port| by_port.get_mut(port)) else {
                continue;
            };

            let sensor = intf.sensors_by_lane.entry(lane).or_default();
            sensor.laser_temperature = entry.laser_temperature as f32;
            sensor.rx_laser_power = entry.rx_laser_power as f32 / 100.0;
            sensor.tx_laser_bias_current = entry.tx_laser_bias_current as f32 / 1_000_000.0;
            sensor.tx_laser_power = entry.tx_laser_power as f32 / 100.0;
        }
    }
}

/// Drops ports with no lanes and ports whose lanes all read zero. These are
/// usually direct-attach cables or useless defaults.
fn cleanup(by_port: BTreeMap<u32, OpticsData>) -> BTreeMap<u32, OpticsData> {
    by_port
        .into_iter()
        .filter(|(_, entry)| entry.sensors_by_lane.values().any(OpticalSensor::is_non_zero))
        .collect()
}
