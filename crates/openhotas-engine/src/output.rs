//! The synthetic uinput device.
//!
//! Created once at startup with the full contract. Axis ranges and the
//! button set never change afterwards, because games treat the declared
//! capability set as a session-long commitment. Output happens in groups:
//! `push` stages events, `flush` writes the group followed by exactly one
//! sync marker. Empty groups are never written; some input stacks read
//! back-to-back empty reports as a disconnect.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    UinputAbsSetup,
};
use tracing::{debug, info};

use openhotas_device_types::contract;
use openhotas_device_types::{SourceKind, VirtualSlot};

pub struct VirtualOutput {
    device: VirtualDevice,
    pending: Vec<InputEvent>,
}

impl VirtualOutput {
    /// Creates the uinput device with the fixed contract and the Xbox 360
    /// USB identity, under the configured display name.
    pub fn create(name: &str) -> std::io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for code in contract::BUTTONS {
            keys.insert(Key::new(code));
        }

        let mut builder = VirtualDeviceBuilder::new()?
            .name(name)
            .input_id(InputId::new(
                BusType::BUS_USB,
                contract::VENDOR_ID,
                contract::PRODUCT_ID,
                contract::VERSION,
            ))
            .with_keys(&keys)?;

        for spec in contract::AXES {
            let info = AbsInfo::new(0, spec.min, spec.max, spec.fuzz, spec.flat, 0);
            let setup = UinputAbsSetup::new(AbsoluteAxisType(spec.code), info);
            builder = builder.with_absolute_axis(&setup)?;
        }

        let device = builder.build()?;
        info!(name, "virtual device created");
        Ok(Self {
            device,
            pending: Vec::with_capacity(16),
        })
    }

    /// Stages one event for the current group.
    pub fn push(&mut self, slot: VirtualSlot, value: i32) {
        let event_type = match slot.kind {
            SourceKind::Button => EventType::KEY,
            SourceKind::Axis => EventType::ABSOLUTE,
        };
        self.pending.push(InputEvent::new(event_type, slot.code, value));
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Writes the staged group followed by one sync marker. A no-op when
    /// nothing is staged. Returns whether a group went out.
    pub fn flush(&mut self) -> std::io::Result<bool> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        // emit() appends the SYN_REPORT that closes the group.
        let result = self.device.emit(&self.pending);
        if result.is_ok() {
            debug!(events = self.pending.len(), "emitted virtual event group");
        }
        self.pending.clear();
        result.map(|()| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openhotas_device_types::contract::codes;

    // Creating a real uinput node needs /dev/uinput; these tests cover the
    // pure staging logic via the event conversion.

    #[test]
    fn test_slot_to_event_conversion() {
        let button = VirtualSlot::button(codes::BTN_SOUTH);
        let axis = VirtualSlot::axis(codes::ABS_HAT0X);

        let ev = InputEvent::new(EventType::KEY, button.code, 1);
        assert_eq!(ev.event_type(), EventType::KEY);
        assert_eq!(ev.code(), codes::BTN_SOUTH);
        assert_eq!(ev.value(), 1);

        let ev = InputEvent::new(EventType::ABSOLUTE, axis.code, -1);
        assert_eq!(ev.event_type(), EventType::ABSOLUTE);
        assert_eq!(ev.code(), codes::ABS_HAT0X);
        assert_eq!(ev.value(), -1);
    }

    #[test]
    fn test_contract_covers_every_axis_spec() {
        // The builder declares exactly the 8 contract axes with their
        // published ranges.
        assert_eq!(contract::AXES.len(), 8);
        for spec in contract::AXES {
            let slot = VirtualSlot::axis(spec.code);
            assert_eq!(slot.output_range(), Some((spec.min, spec.max)));
        }
        assert_eq!(contract::BUTTONS.len(), 17);
    }
}
