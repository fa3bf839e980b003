//! Daemon configuration: the parsed on-disk JSON value.
//!
//! The schema mirrors what the external setup wizard writes:
//! device descriptors per role, key/axis bindings, per-axis calibrations,
//! the exclusive-grab flag, and the virtual device display name. The
//! engine only ever reads configuration; writing it is the wizard's job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use openhotas_calibration::{AxisCalibration, CalibrationError};
use openhotas_device_types::contract::{codes, ContractError, VirtualSlot};
use openhotas_device_types::{AxisTransform, Binding, PhysicalInput, Role};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no input devices configured")]
    NoDevices,

    #[error("role {0} is configured more than once")]
    DuplicateRole(Role),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("physical input {0:?} is bound to more than one virtual slot")]
    DuplicateSourceBinding(PhysicalInput),

    #[error("invalid calibration for {role} axis {src_code}: {source}")]
    Calibration {
        role: Role,
        src_code: u16,
        #[source]
        source: CalibrationError,
    },
}

/// One physical device assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub role: Role,
    /// Stable /dev/input/by-id symlink for the device.
    pub by_id: String,
    /// Expected USB vendor id as a hex string (e.g. "044f"); empty skips
    /// the identity check.
    #[serde(default)]
    pub vendor: String,
    /// Expected USB product id as a hex string; empty skips the check.
    #[serde(default)]
    pub product: String,
    /// Optional devices do not block startup when missing.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub calibrations: Vec<CalibrationConfig>,
}

/// Calibration captured for one source axis of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub src_code: u16,
    pub observed_min: i32,
    pub observed_max: i32,
    pub center: i32,
    #[serde(default)]
    pub deadzone_radius: i32,
}

impl CalibrationConfig {
    pub fn to_calibration(&self) -> AxisCalibration {
        AxisCalibration {
            observed_min: self.observed_min,
            observed_max: self.observed_max,
            center: self.center,
            deadzone_radius: self.deadzone_radius,
        }
    }
}

/// A digital button binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindingConfig {
    pub role: Role,
    pub src: u16,
    pub dst: u16,
}

/// An absolute-axis binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisBindingConfig {
    pub role: Role,
    pub src: u16,
    pub dst: u16,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub deadzone: i32,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

fn default_uinput_name() -> String {
    "Xbox 360 Controller (OpenHotas)".to_string()
}

fn default_grab() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display name of the virtual device.
    #[serde(default = "default_uinput_name")]
    pub uinput_name: String,
    /// Request exclusive grab on every source.
    #[serde(default = "default_grab")]
    pub grab: bool,
    #[serde(default)]
    pub inputs: Vec<DeviceConfig>,
    #[serde(default)]
    pub bindings_keys: Vec<KeyBindingConfig>,
    #[serde(default)]
    pub bindings_abs: Vec<AxisBindingConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Structural validation: device set, contract legality of every
    /// binding, source uniqueness, calibration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        for (i, input) in self.inputs.iter().enumerate() {
            if self.inputs[..i].iter().any(|other| other.role == input.role) {
                return Err(ConfigError::DuplicateRole(input.role));
            }
            for cal in &input.calibrations {
                cal.to_calibration()
                    .validate()
                    .map_err(|source| ConfigError::Calibration {
                        role: input.role,
                        src_code: cal.src_code,
                        source,
                    })?;
            }
        }

        let mut seen: Vec<PhysicalInput> = Vec::new();
        for binding in self.raw_bindings() {
            binding.validate()?;
            if seen.contains(&binding.src) {
                return Err(ConfigError::DuplicateSourceBinding(binding.src));
            }
            seen.push(binding.src);
        }
        Ok(())
    }

    /// The configured binding set, or the built-in default table when the
    /// configuration carries no bindings at all.
    pub fn bindings(&self) -> Vec<Binding> {
        if self.bindings_keys.is_empty() && self.bindings_abs.is_empty() {
            warn!("no bindings configured, using the default table");
            return default_bindings();
        }
        self.raw_bindings().collect()
    }

    fn raw_bindings(&self) -> impl Iterator<Item = Binding> + '_ {
        let keys = self.bindings_keys.iter().map(|kb| {
            Binding::button(
                PhysicalInput::button(kb.role, kb.src),
                VirtualSlot::button(kb.dst),
            )
        });
        let axes = self.bindings_abs.iter().map(|ab| {
            let dst = VirtualSlot::axis(ab.dst);
            // The output range always comes from the contract slot; a
            // binding to an out-of-contract axis fails validation instead.
            let (min_out, max_out) = dst.output_range().unwrap_or((0, 65535));
            let xform = AxisTransform {
                invert: ab.invert,
                deadzone: ab.deadzone,
                scale: ab.scale,
                min_out,
                max_out,
            };
            Binding::new(PhysicalInput::axis(ab.role, ab.src), dst, xform)
        });
        keys.chain(axes)
    }

    /// All configured calibrations as (role, source code, calibration).
    pub fn calibrations(&self) -> impl Iterator<Item = (Role, u16, AxisCalibration)> + '_ {
        self.inputs.iter().flat_map(|input| {
            input
                .calibrations
                .iter()
                .map(move |cal| (input.role, cal.src_code, cal.to_calibration()))
        })
    }

    pub fn device(&self, role: Role) -> Option<&DeviceConfig> {
        self.inputs.iter().find(|d| d.role == role)
    }
}

/// The built-in binding table for a classic stick/throttle/rudder setup.
///
/// Used when the configuration has no binding lists, so a freshly selected
/// device trio is usable before the first mapping session.
pub fn default_bindings() -> Vec<Binding> {
    let stick_range = AxisTransform::for_range(-32768, 32767);
    let trigger_range = AxisTransform::for_range(0, 255);
    let hat_range = AxisTransform::for_range(-1, 1);

    let mut bindings = vec![
        // Stick: main axes plus its hat.
        Binding::new(
            PhysicalInput::axis(Role::Stick, codes::ABS_X),
            VirtualSlot::axis(codes::ABS_X),
            stick_range,
        ),
        Binding::new(
            PhysicalInput::axis(Role::Stick, codes::ABS_Y),
            VirtualSlot::axis(codes::ABS_Y),
            stick_range,
        ),
        Binding::new(
            PhysicalInput::axis(Role::Stick, codes::ABS_HAT0X),
            VirtualSlot::axis(codes::ABS_HAT0X),
            hat_range,
        ),
        Binding::new(
            PhysicalInput::axis(Role::Stick, codes::ABS_HAT0Y),
            VirtualSlot::axis(codes::ABS_HAT0Y),
            hat_range,
        ),
        // Throttle: either reported axis lands on the left trigger.
        Binding::new(
            PhysicalInput::axis(Role::Throttle, codes::ABS_Z),
            VirtualSlot::axis(codes::ABS_Z),
            trigger_range,
        ),
        Binding::new(
            PhysicalInput::axis(Role::Throttle, codes::ABS_THROTTLE),
            VirtualSlot::axis(codes::ABS_Z),
            trigger_range,
        ),
        Binding::new(
            PhysicalInput::axis(Role::Throttle, codes::ABS_HAT0X),
            VirtualSlot::axis(codes::ABS_HAT0X),
            hat_range,
        ),
        Binding::new(
            PhysicalInput::axis(Role::Throttle, codes::ABS_HAT0Y),
            VirtualSlot::axis(codes::ABS_HAT0Y),
            hat_range,
        ),
        // Rudder: right trigger.
        Binding::new(
            PhysicalInput::axis(Role::Rudder, codes::ABS_RZ),
            VirtualSlot::axis(codes::ABS_RZ),
            trigger_range,
        ),
    ];

    // The classic HOTAS button block, mirrored from every role.
    const BUTTON_MAP: [(u16, u16); 10] = [
        (codes::BTN_TRIGGER, codes::BTN_SOUTH),
        (codes::BTN_THUMB, codes::BTN_EAST),
        (codes::BTN_THUMB2, codes::BTN_WEST),
        (codes::BTN_TOP, codes::BTN_NORTH),
        (codes::BTN_TOP2, codes::BTN_TL),
        (codes::BTN_PINKIE, codes::BTN_TR),
        (codes::BTN_BASE, codes::BTN_SELECT),
        (codes::BTN_BASE2, codes::BTN_START),
        (codes::BTN_BASE3, codes::BTN_THUMBL),
        (codes::BTN_BASE4, codes::BTN_THUMBR),
    ];
    for role in Role::PRIORITY {
        for (src, dst) in BUTTON_MAP {
            bindings.push(Binding::button(
                PhysicalInput::button(role, src),
                VirtualSlot::button(dst),
            ));
        }
    }

    bindings
}
