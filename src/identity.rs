//! Bus identity of a VDR instance.

use std::fmt;

/// Well-known bus name of the first VDR instance; also the interface namespace.
pub const BASE_BUS_NAME: &str = "de.tvdr.vdr";

/// Bus name of one VDR instance.
///
/// Several VDRs may run side by side; instance `n > 0` owns `de.tvdr.vdr<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentity {
    bus_name: String,
    instance: u32,
}

impl ServiceIdentity {
    pub fn new(instance: u32) -> Self {
        let bus_name = if instance == 0 {
            BASE_BUS_NAME.to_string()
        } else {
            format!("{}{}", BASE_BUS_NAME, instance)
        };
        Self { bus_name, instance }
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Full interface name for a suffix such as `.status`.
    ///
    /// dbus2vdr registers its interfaces under the base namespace regardless
    /// of the instance's bus name.
    pub fn interface_name(&self, suffix: &str) -> String {
        format!("{}{}", BASE_BUS_NAME, suffix)
    }
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bus_name)
    }
}
