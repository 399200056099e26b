//! Host helpers shared by the PMOAirPlay crates.
//!
//! - [`guess_local_ip`] / [`lan_ipv4_addresses`]: which address a receiver
//!   on the local network can use to reach this host.
//! - [`find_process_using_port`]: who already holds a TCP port we failed to
//!   bind.
//! - [`get_os_string`]: operating system tag used in product tokens.
mod ip_utils;
mod process;

pub use ip_utils::{guess_local_ip, lan_ipv4_addresses};
pub use process::{ProcessPortInfo, find_process_using_port};

/// Returns a string describing the operating system and its version.
///
/// # Format
/// - macOS: "Macos/15.1"
/// - Linux: "Ubuntu/22.04"
/// - Unknown version: "{OS}/Unknown"
pub fn get_os_string() -> String {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type());

    let version = info.version();
    if version != &os_info::Version::Unknown {
        format!("{}/{}", os_type, version)
    } else {
        format!("{}/Unknown", os_type)
    }
}
