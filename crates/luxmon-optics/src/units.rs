//! Unit conversions and interface-name parsing shared by the fusion passes.

/// Simplified from `10 * log10(watts * 1000)`.
pub fn watts_to_dbm(watts: f32) -> f32 {
    10.0 * (3.0 + watts.log10())
}

/// Maps an interface description to its front-panel port number.
///
/// Handles `EthernetP` / `EthernetP/L` (port-first naming) and `et-f/p/P`
/// (port-last naming, 0-based, shifted to 1-based for cross-vendor
/// consistency). Virtual units like `et-0/0/0.0` and anything else (Vlans,
/// management ports, aggregates) map to `None`.
pub fn port_from_interface_name(name: &str) -> Option<u32> {
    if let Some(rest) = name.strip_prefix("Ethernet") {
        let port = rest.split('/').next().unwrap_or(rest);
        return port.parse().ok();
    }

    if let Some(rest) = name.strip_prefix("et-") {
        let last = rest.rsplit('/').next().unwrap_or(rest);
        if last.contains('.') {
            return None;
        }
        return last.parse::<u32>().ok().map(|port| port + 1);
    }

    None
}
