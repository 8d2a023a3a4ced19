//! The MIB tables collected from each device.
//!
//! Keys of the table maps are the trailing arc of each walked instance (the
//! SNMP row index, usually `ifIndex` or `entPhysicalIndex`). Column numbers
//! follow IF-MIB, ENTITY-MIB, ENTITY-SENSOR-MIB and the Juniper DOM
//! enterprise MIB.

use std::collections::BTreeMap;

use luxmon_snmp::{FieldSpec, MibRecord};

/// Everything we ask a device for in one query.
#[derive(Debug, Default, Clone)]
pub struct OpticsMib {
    pub interface: BTreeMap<u32, InterfaceEntry>,
    pub interface_hc: BTreeMap<u32, InterfaceHcEntry>,
    pub entity: BTreeMap<u32, EntityPhysicalEntry>,
    pub sensor: BTreeMap<u32, SensorEntry>,
    pub juniper_dom: BTreeMap<u32, JuniperModuleDomEntry>,
    pub juniper_lane_dom: BTreeMap<u32, JuniperModuleLaneDomEntry>,
}

impl MibRecord for OpticsMib {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::table("interface", ".1.3.6.1.2.1.2.2.1", |m: &mut Self| {
                &mut m.interface
            }),
            FieldSpec::table("interface_hc", ".1.3.6.1.2.1.31.1.1.1", |m: &mut Self| {
                &mut m.interface_hc
            }),
            FieldSpec::table("entity", ".1.3.6.1.2.1.47.1.1.1.1", |m: &mut Self| {
                &mut m.entity
            }),
            FieldSpec::table("sensor", ".1.3.6.1.2.1.99.1.1.1", |m: &mut Self| {
                &mut m.sensor
            }),
            FieldSpec::table("juniper_dom", ".1.3.6.1.4.1.2636.3.60.1.1.1.1", |m: &mut Self| {
                &mut m.juniper_dom
            }),
            FieldSpec::table("juniper_lane_dom", ".1.3.6.1.4.1.2636.3.60.1.2.1", |m: &mut Self| {
                &mut m.juniper_lane_dom
            }),
        ]
    }
}

/// ifTable row (32-bit counters).
#[derive(Debug, Default, Clone)]
pub struct InterfaceEntry {
    pub descr: String,
    pub if_type: i32,
    pub mtu: i32,
    /// Bits per second.
    pub speed: u32,
    pub phys_address: Vec<u8>,
    /// 1 up, 2 down, 3 testing.
    pub admin_status: i32,
    /// 1 up, 2 down, 3 testing, 4 unknown, 5 dormant, 6 not-present,
    /// 7 lower-layer-down.
    pub oper_status: i32,
    pub last_change: u32,
    pub in_octets: u32,
    pub in_ucast_pkts: u32,
    pub in_discards: u32,
    pub in_errors: u32,
    pub in_unknown_protos: u32,
    pub out_octets: u32,
    pub out_ucast_pkts: u32,
    pub out_discards: u32,
    pub out_errors: u32,
}

impl MibRecord for InterfaceEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("descr", "2", |e: &mut Self| &mut e.descr),
            FieldSpec::int32("if_type", "3", |e: &mut Self| &mut e.if_type),
            FieldSpec::int32("mtu", "4", |e: &mut Self| &mut e.mtu),
            FieldSpec::uint32("speed", "5", |e: &mut Self| &mut e.speed),
            FieldSpec::bytes("phys_address", "6", |e: &mut Self| &mut e.phys_address),
            FieldSpec::int32("admin_status", "7", |e: &mut Self| &mut e.admin_status),
            FieldSpec::int32("oper_status", "8", |e: &mut Self| &mut e.oper_status),
            FieldSpec::uint32("last_change", "9", |e: &mut Self| &mut e.last_change),
            FieldSpec::uint32("in_octets", "10", |e: &mut Self| &mut e.in_octets),
            FieldSpec::uint32("in_ucast_pkts", "11", |e: &mut Self| &mut e.in_ucast_pkts),
            FieldSpec::uint32("in_discards", "13", |e: &mut Self| &mut e.in_discards),
            FieldSpec::uint32("in_errors", "14", |e: &mut Self| &mut e.in_errors),
            FieldSpec::uint32("in_unknown_protos", "15", |e: &mut Self| {
                &mut e.in_unknown_protos
            }),
            FieldSpec::uint32("out_octets", "16", |e: &mut Self| &mut e.out_octets),
            FieldSpec::uint32("out_ucast_pkts", "17", |e: &mut Self| &mut e.out_ucast_pkts),
            FieldSpec::uint32("out_discards", "19", |e: &mut Self| &mut e.out_discards),
            FieldSpec::uint32("out_errors", "20", |e: &mut Self| &mut e.out_errors),
        ]
    }
}

/// ifXTable row (64-bit counters and names).
#[derive(Debug, Default, Clone)]
pub struct InterfaceHcEntry {
    pub name: String,
    pub in_multicast_pkts: u32,
    pub in_broadcast_pkts: u32,
    pub out_multicast_pkts: u32,
    pub out_broadcast_pkts: u32,
    pub hc_in_octets: u64,
    pub hc_in_ucast_pkts: u64,
    pub hc_in_multicast_pkts: u64,
    pub hc_in_broadcast_pkts: u64,
    pub hc_out_octets: u64,
    pub hc_out_ucast_pkts: u64,
    pub hc_out_multicast_pkts: u64,
    pub hc_out_broadcast_pkts: u64,
    pub link_up_down_trap_enable: bool,
    /// Megabits per second.
    pub high_speed: u64,
    pub promiscuous_mode: bool,
    pub connector_present: bool,
    pub alias: String,
    pub counter_discontinuity_time: u64,
}

impl MibRecord for InterfaceHcEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("name", "1", |e: &mut Self| &mut e.name),
            FieldSpec::uint32("in_multicast_pkts", "2", |e: &mut Self| {
                &mut e.in_multicast_pkts
            }),
            FieldSpec::uint32("in_broadcast_pkts", "3", |e: &mut Self| {
                &mut e.in_broadcast_pkts
            }),
            FieldSpec::uint32("out_multicast_pkts", "4", |e: &mut Self| {
                &mut e.out_multicast_pkts
            }),
            FieldSpec::uint32("out_broadcast_pkts", "5", |e: &mut Self| {
                &mut e.out_broadcast_pkts
            }),
            FieldSpec::uint64("hc_in_octets", "6", |e: &mut Self| &mut e.hc_in_octets),
            FieldSpec::uint64("hc_in_ucast_pkts", "7", |e: &mut Self| &mut e.hc_in_ucast_pkts),
            FieldSpec::uint64("hc_in_multicast_pkts", "8", |e: &mut Self| {
                &mut e.hc_in_multicast_pkts
            }),
            FieldSpec::uint64("hc_in_broadcast_pkts", "9", |e: &mut Self| {
                &mut e.hc_in_broadcast_pkts
            }),
            FieldSpec::uint64("hc_out_octets", "10", |e: &mut Self| &mut e.hc_out_octets),
            FieldSpec::uint64("hc_out_ucast_pkts", "11", |e: &mut Self| {
                &mut e.hc_out_ucast_pkts
            }),
            FieldSpec::uint64("hc_out_multicast_pkts", "12", |e: &mut Self| {
                &mut e.hc_out_multicast_pkts
            }),
            FieldSpec::uint64("hc_out_broadcast_pkts", "13", |e: &mut Self| {
                &mut e.hc_out_broadcast_pkts
            }),
            FieldSpec::boolean("link_up_down_trap_enable", "14", |e: &mut Self| {
                &mut e.link_up_down_trap_enable
            }),
            FieldSpec::uint64("high_speed", "15", |e: &mut Self| &mut e.high_speed),
            FieldSpec::boolean("promiscuous_mode", "16", |e: &mut Self| {
                &mut e.promiscuous_mode
            }),
            FieldSpec::boolean("connector_present", "17", |e: &mut Self| {
                &mut e.connector_present
            }),
            FieldSpec::string("alias", "18", |e: &mut Self| &mut e.alias),
            FieldSpec::uint64("counter_discontinuity_time", "19", |e: &mut Self| {
                &mut e.counter_discontinuity_time
            }),
        ]
    }
}

/// entPhysicalTable row: chassis inventory, one row per physical component.
#[derive(Debug, Default, Clone)]
pub struct EntityPhysicalEntry {
    pub descr: String,
    pub vendor_type: String,
    pub contained_in: i32,
    pub class: i32,
    pub parent_rel_pos: i32,
    pub name: String,
    pub hardware_rev: String,
    pub firmware_rev: String,
    pub software_rev: String,
    pub serial_num: String,
    pub mfg_name: String,
    pub model_name: String,
    pub alias: String,
    pub asset_id: String,
    pub is_fru: bool,
    pub mfg_date: String,
    pub uris: String,
}

impl MibRecord for EntityPhysicalEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("descr", "2", |e: &mut Self| &mut e.descr),
            FieldSpec::string("vendor_type", "3", |e: &mut Self| &mut e.vendor_type),
            FieldSpec::int32("contained_in", "4", |e: &mut Self| &mut e.contained_in),
            FieldSpec::int32("class", "5", |e: &mut Self| &mut e.class),
            FieldSpec::int32("parent_rel_pos", "6", |e: &mut Self| &mut e.parent_rel_pos),
            FieldSpec::string("name", "7", |e: &mut Self| &mut e.name),
            FieldSpec::string("hardware_rev", "8", |e: &mut Self| &mut e.hardware_rev),
            FieldSpec::string("firmware_rev", "9", |e: &mut Self| &mut e.firmware_rev),
            FieldSpec::string("software_rev", "10", |e: &mut Self| &mut e.software_rev),
            FieldSpec::string("serial_num", "11", |e: &mut Self| &mut e.serial_num),
            FieldSpec::string("mfg_name", "12", |e: &mut Self| &mut e.mfg_name),
            FieldSpec::string("model_name", "13", |e: &mut Self| &mut e.model_name),
            FieldSpec::string("alias", "14", |e: &mut Self| &mut e.alias),
            FieldSpec::string("asset_id", "15", |e: &mut Self| &mut e.asset_id),
            FieldSpec::boolean("is_fru", "16", |e: &mut Self| &mut e.is_fru),
            FieldSpec::string("mfg_date", "17", |e: &mut Self| &mut e.mfg_date),
            FieldSpec::string("uris", "18", |e: &mut Self| &mut e.uris),
        ]
    }
}

/// entPhySensorTable row. Values are fixed-point: `value * 10^((scale-9)*3)`
/// in the unit named by `sensor_type`.
#[derive(Debug, Default, Clone)]
pub struct SensorEntry {
    /// 1 other, 2 unknown, 3 voltsAC, 4 voltsDC, 5 amperes, 6 watts, 7 hertz,
    /// 8 celsius, 9 percentRH, 10 rpm, 11 cmm, 12 truthvalue.
    pub sensor_type: i32,
    /// 1 yocto … 9 units … 17 yotta, in steps of 10^3.
    pub scale: i32,
    pub precision: i32,
    pub value: i32,
    pub oper_status: i32,
    pub units_display: String,
    pub value_time_stamp: u32,
    pub value_update_rate: u32,
}

impl SensorEntry {
    /// Multiplier that converts the raw reading into base units.
    pub fn scale_factor(&self) -> f64 {
        10f64.powi((self.scale - 9) * 3)
    }

    pub fn scaled_value(&self) -> f32 {
        (f64::from(self.value) * self.scale_factor()) as f32
    }
}

impl MibRecord for SensorEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::int32("sensor_type", "1", |e: &mut Self| &mut e.sensor_type),
            FieldSpec::int32("scale", "2", |e: &mut Self| &mut e.scale),
            FieldSpec::int32("precision", "3", |e: &mut Self| &mut e.precision),
            FieldSpec::int32("value", "4", |e: &mut Self| &mut e.value),
            FieldSpec::int32("oper_status", "5", |e: &mut Self| &mut e.oper_status),
            FieldSpec::string("units_display", "6", |e: &mut Self| &mut e.units_display),
            FieldSpec::uint32("value_time_stamp", "7", |e: &mut Self| &mut e.value_time_stamp),
            FieldSpec::uint32("value_update_rate", "8", |e: &mut Self| {
                &mut e.value_update_rate
            }),
        ]
    }
}

/// Juniper per-module DOM readings, keyed by ifIndex.
#[derive(Debug, Default, Clone)]
pub struct JuniperModuleDomEntry {
    /// Celsius.
    pub temperature: i32,
    /// Millivolts.
    pub voltage: i32,
    pub lane_count: i32,
}

impl MibRecord for JuniperModuleDomEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::int32("temperature", "8", |e: &mut Self| &mut e.temperature),
            FieldSpec::int32("voltage", "25", |e: &mut Self| &mut e.voltage),
            FieldSpec::int32("lane_count", "30", |e: &mut Self| &mut e.lane_count),
        ]
    }
}

/// Juniper per-lane DOM table. The walked instances end in `ifIndex.lane`, so
/// the outer map is keyed by lane and the inner one by ifIndex.
#[derive(Debug, Default, Clone)]
pub struct JuniperModuleLaneDomEntry {
    pub entries: BTreeMap<u32, JuniperLaneDomEntry>,
}

impl MibRecord for JuniperModuleLaneDomEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::table("entries", "1", |e: &mut Self| &mut e.entries)]
    }
}

#[derive(Debug, Default, Clone)]
pub struct JuniperLaneDomEntry {
    /// dBm x 100.
    pub rx_laser_power: i32,
    /// Microamperes.
    pub tx_laser_bias_current: i32,
    /// dBm x 100.
    pub tx_laser_power: i32,
    /// Celsius.
    pub laser_temperature: i32,
}

impl MibRecord for JuniperLaneDomEntry {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::int32("rx_laser_power", "6", |e: &mut Self| &mut e.rx_laser_power),
            FieldSpec::int32("tx_laser_bias_current", "7", |e: &mut Self| {
                &mut e.tx_laser_bias_current
            }),
            FieldSpec::int32("tx_laser_power", "8", |e: &mut Self| &mut e.tx_laser_power),
            FieldSpec::int32("laser_temperature", "9", |e: &mut Self| {
                &mut e.laser_temperature
            }),
        ]
    }
}
