//! Physical input addressing: device roles and (role, kind, code) triples.

use serde::{Deserialize, Serialize};

/// Logical slot a physical device is assigned to.
///
/// This is not a device identity; configuration decides which real device
/// fills each role. The variant order is the fusion priority used when
/// several roles feed the same virtual axis: `Stick` wins over `Throttle`,
/// which wins over `Rudder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Stick,
    Throttle,
    Rudder,
}

impl Role {
    /// All roles in fusion-priority order (highest first).
    pub const PRIORITY: [Role; 3] = [Role::Stick, Role::Throttle, Role::Rudder];

    /// The lowest-priority role. Synthesized axis values (button-to-axis
    /// mirroring) are filed under this role so any real analog source wins.
    pub const LOWEST: Role = Role::Rudder;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Stick => "stick",
            Role::Throttle => "throttle",
            Role::Rudder => "rudder",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digital button event vs. absolute-axis event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Button,
    Axis,
}

/// One physical control: the `(role, kind, code)` triple.
///
/// `code` is a 16-bit event code from the kernel's evdev namespace. Ordering
/// is lexicographic on the three fields, which keeps iteration over
/// `BTreeMap`-backed state deterministic within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalInput {
    pub role: Role,
    pub kind: SourceKind,
    pub code: u16,
}

impl PhysicalInput {
    pub fn button(role: Role, code: u16) -> Self {
        Self {
            role,
            kind: SourceKind::Button,
            code,
        }
    }

    pub fn axis(role: Role, code: u16) -> Self {
        Self {
            role,
            kind: SourceKind::Axis,
            code,
        }
    }
}
