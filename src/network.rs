//! Connectivity policy for background polling
//!
//! The scheduler only polls when the gate allows it. Explicit requests never
//! consult the gate.

use crate::config::schema::PreferredConnectivity;
use crate::error::{BundleError, BundleResult};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Route flag marking a usable route (RTF_UP)
const RTF_UP: u32 = 0x1;

/// Interface name prefixes used by cellular modems
const CELLULAR_PREFIXES: &[&str] = &["wwan", "rmnet", "ccmni", "usb"];

/// Class of the active network connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Wifi,
    Ethernet,
    Cellular,
    Offline,
    Unknown,
}

impl fmt::Display for ConnectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wifi => "wifi",
            Self::Ethernet => "ethernet",
            Self::Cellular => "cellular",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Source of the current connection class
pub trait ConnectivityProbe: Send + Sync {
    fn current(&self) -> BundleResult<ConnectionClass>;
}

/// Probe reading the default route from procfs and the interface type from sysfs
pub struct SystemConnectivity {
    route_table: PathBuf,
    net_class_dir: PathBuf,
}

impl SystemConnectivity {
    /// Probe the live system
    pub fn new() -> Self {
        Self::with_roots(Path::new("/proc"), Path::new("/sys"))
    }

    /// Probe alternative procfs/sysfs roots
    pub fn with_roots(proc_root: &Path, sys_root: &Path) -> Self {
        Self {
            route_table: proc_root.join("net").join("route"),
            net_class_dir: sys_root.join("class").join("net"),
        }
    }

    fn classify(&self, iface: &str) -> ConnectionClass {
        if self.net_class_dir.join(iface).join("wireless").exists() {
            ConnectionClass::Wifi
        } else if CELLULAR_PREFIXES.iter().any(|p| iface.starts_with(p)) {
            ConnectionClass::Cellular
        } else {
            ConnectionClass::Ethernet
        }
    }
}

impl Default for SystemConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityProbe for SystemConnectivity {
    fn current(&self) -> BundleResult<ConnectionClass> {
        if !self.route_table.exists() {
            return Ok(ConnectionClass::Unknown);
        }

        let table = fs::read_to_string(&self.route_table).map_err(|e| {
            BundleError::io(format!("reading {}", self.route_table.display()), e)
        })?;

        match default_route_interface(&table) {
            Some(iface) => {
                let class = self.classify(iface);
                debug!("Default route via {} ({})", iface, class);
                Ok(class)
            }
            None => Ok(ConnectionClass::Offline),
        }
    }
}

/// Find the interface of the first usable default route in `/proc/net/route`
fn default_route_interface(table: &str) -> Option<&str> {
    table.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        let destination = fields.next()?;
        let _gateway = fields.next()?;
        let flags = u32::from_str_radix(fields.next()?, 16).ok()?;
        (destination == "00000000" && flags & RTF_UP != 0).then_some(iface)
    })
}

/// Probe returning a fixed, replaceable class
pub struct StaticConnectivity {
    class: Mutex<ConnectionClass>,
}

impl StaticConnectivity {
    pub fn new(class: ConnectionClass) -> Self {
        Self {
            class: Mutex::new(class),
        }
    }

    /// Replace the reported class
    pub fn set(&self, class: ConnectionClass) {
        *self.class.lock().unwrap_or_else(|p| p.into_inner()) = class;
    }
}

impl ConnectivityProbe for StaticConnectivity {
    fn current(&self) -> BundleResult<ConnectionClass> {
        Ok(*self.class.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

/// Gate deciding whether a periodic poll may run
pub struct NetworkPolicyGate {
    probe: Arc<dyn ConnectivityProbe>,
    preferred: PreferredConnectivity,
    poll_only_on_preferred: bool,
}

impl NetworkPolicyGate {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        preferred: PreferredConnectivity,
        poll_only_on_preferred: bool,
    ) -> Self {
        Self {
            probe,
            preferred,
            poll_only_on_preferred,
        }
    }

    /// Current connection class; probe failures read as unknown
    pub fn connection_class(&self) -> ConnectionClass {
        self.probe.current().unwrap_or_else(|e| {
            warn!("Connectivity probe failed: {}", e);
            ConnectionClass::Unknown
        })
    }

    /// Whether the active connection is of the preferred class
    pub fn is_preferred_connectivity(&self) -> bool {
        matches!(
            (self.preferred, self.connection_class()),
            (PreferredConnectivity::Wifi, ConnectionClass::Wifi)
                | (PreferredConnectivity::Ethernet, ConnectionClass::Ethernet)
                | (
                    PreferredConnectivity::Any,
                    ConnectionClass::Wifi | ConnectionClass::Ethernet
                )
        )
    }

    /// Whether a background poll may run now
    pub fn allows_background_poll(&self) -> bool {
        !self.poll_only_on_preferred || self.is_preferred_connectivity()
    }
}
