//! Binding table and the stateful fusion resolver.
//!
//! The resolver maps many physical inputs onto the fixed virtual slot set:
//! buttons fan in through per-slot refcounts (OR-fusion), axes fan in
//! through a per-role cache with fixed Stick > Throttle > Rudder priority,
//! and a handful of button slots mirror into axis slots (D-pad to hat,
//! trigger clicks to analog triggers). Output events are edge-triggered:
//! `drain_pending` only yields slots whose value changed since the last
//! drain, at most once per slot per drain.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use openhotas_calibration::{transform, AxisCalibration};
use openhotas_device_types::contract::{codes, ContractError, VirtualSlot};
use openhotas_device_types::{Binding, PhysicalInput, Role, SourceKind};

/// Immutable index from physical inputs to bindings.
///
/// Construction rejects any binding whose destination violates the
/// contract. Lookup is a sequential scan; binding sets are tens of entries.
#[derive(Debug, Clone)]
pub struct BindingTable {
    bindings: Vec<Binding>,
}

impl BindingTable {
    pub fn new(bindings: Vec<Binding>) -> Result<Self, ContractError> {
        for binding in &bindings {
            binding.validate()?;
        }
        Ok(Self { bindings })
    }

    pub fn matching(&self, input: PhysicalInput) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |b| b.src == input)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Stateful fusion engine.
///
/// All state maps are `BTreeMap` so iteration order, and with it the
/// emission order inside one drain, is deterministic for a given binding
/// set.
pub struct BindingResolver {
    table: BindingTable,
    button_sources: BTreeMap<VirtualSlot, BTreeMap<PhysicalInput, bool>>,
    axis_values: BTreeMap<VirtualSlot, BTreeMap<Role, Option<i32>>>,
    last_output: BTreeMap<VirtualSlot, i32>,
    calibrations: BTreeMap<(Role, u16), AxisCalibration>,
}

impl BindingResolver {
    pub fn new(table: BindingTable) -> Self {
        let mut resolver = Self {
            table,
            button_sources: BTreeMap::new(),
            axis_values: BTreeMap::new(),
            last_output: BTreeMap::new(),
            calibrations: BTreeMap::new(),
        };
        resolver.seed_state();
        resolver
    }

    /// Every bound slot appears in the state maps with a zero baseline, so
    /// the first real press/deflection registers as an edge.
    fn seed_state(&mut self) {
        for binding in self.table.bindings().to_vec() {
            match binding.dst.kind {
                SourceKind::Button => {
                    self.button_sources.entry(binding.dst).or_default();
                }
                SourceKind::Axis => {
                    let roles = self.axis_values.entry(binding.dst).or_default();
                    for role in Role::PRIORITY {
                        roles.entry(role).or_insert(None);
                    }
                }
            }
            self.last_output.entry(binding.dst).or_insert(0);
        }
    }

    /// Installs (or replaces) the calibration for one source axis.
    /// Idempotent; cached axis values are untouched until the next
    /// `process` call for that source.
    pub fn set_calibration(&mut self, role: Role, src_code: u16, calibration: AxisCalibration) {
        self.calibrations.insert((role, src_code), calibration);
    }

    pub fn calibration(&self, role: Role, src_code: u16) -> Option<&AxisCalibration> {
        self.calibrations.get(&(role, src_code))
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Updates fusion state for every binding whose source matches `input`.
    pub fn process(&mut self, input: PhysicalInput, raw_value: i32) {
        for binding in self.table.matching(input) {
            match binding.dst.kind {
                SourceKind::Button => {
                    // Kernel autorepeat (value == 2) counts as pressed.
                    let pressed = raw_value != 0;
                    self.button_sources
                        .entry(binding.dst)
                        .or_default()
                        .insert(binding.src, pressed);
                    trace!(slot = %binding.dst, pressed, "button source updated");
                }
                SourceKind::Axis => {
                    let cal = self.calibrations.get(&(input.role, input.code));
                    let value = transform(raw_value, &binding.xform, cal);
                    self.axis_values
                        .entry(binding.dst)
                        .or_default()
                        .insert(input.role, Some(value));
                    trace!(slot = %binding.dst, raw_value, value, "axis source updated");
                }
            }
        }
    }

    /// Emits one `(slot, value)` per slot whose current value differs from
    /// what was last emitted, buttons before axes, updating `last_output`
    /// in the same pass.
    pub fn drain_pending(&mut self) -> Vec<(VirtualSlot, i32)> {
        self.mirror_buttons_to_axes();

        let mut events = Vec::new();
        let mut seen: BTreeSet<VirtualSlot> = BTreeSet::new();

        let button_state: Vec<(VirtualSlot, i32)> = self
            .button_sources
            .iter()
            .map(|(slot, sources)| (*slot, i32::from(sources.values().any(|&p| p))))
            .collect();
        for (slot, current) in button_state {
            let last = self.last_output.get(&slot).copied().unwrap_or(0);
            if current == last {
                continue;
            }
            self.last_output.insert(slot, current);
            // Trigger-click state feeds the analog mirror but is never
            // emitted as a button; some titles read those as menu buttons.
            if slot.is_suppressed_button() {
                continue;
            }
            if seen.insert(slot) {
                events.push((slot, current));
            }
        }

        let axis_state: Vec<(VirtualSlot, i32)> = self
            .axis_values
            .iter()
            .map(|(slot, roles)| (*slot, Self::select_axis_value(roles)))
            .collect();
        for (slot, current) in axis_state {
            let last = self.last_output.get(&slot).copied().unwrap_or(0);
            if current == last {
                continue;
            }
            if !seen.insert(slot) {
                continue;
            }
            self.last_output.insert(slot, current);
            events.push((slot, current));
        }

        events
    }

    /// Priority selection: the highest-priority role with a cached value
    /// supplies the slot; with no contributor the slot reads 0.
    fn select_axis_value(roles: &BTreeMap<Role, Option<i32>>) -> i32 {
        Role::PRIORITY
            .iter()
            .find_map(|role| roles.get(role).copied().flatten())
            .unwrap_or(0)
    }

    /// Folds button state into the axis slots the contract derives from
    /// buttons. Synthesized values are filed under the lowest-priority
    /// role, so any real analog source on the same slot wins.
    fn mirror_buttons_to_axes(&mut self) {
        let left = self.button_pressed(codes::BTN_DPAD_LEFT);
        let right = self.button_pressed(codes::BTN_DPAD_RIGHT);
        if left.is_some() || right.is_some() {
            let x = i32::from(right.unwrap_or(false)) - i32::from(left.unwrap_or(false));
            self.store_mirrored(VirtualSlot::axis(codes::ABS_HAT0X), x);
        }

        let up = self.button_pressed(codes::BTN_DPAD_UP);
        let down = self.button_pressed(codes::BTN_DPAD_DOWN);
        if up.is_some() || down.is_some() {
            let y = i32::from(down.unwrap_or(false)) - i32::from(up.unwrap_or(false));
            self.store_mirrored(VirtualSlot::axis(codes::ABS_HAT0Y), y);
        }

        if let Some(pressed) = self.button_pressed(codes::BTN_TL2) {
            self.store_mirrored(
                VirtualSlot::axis(codes::ABS_Z),
                if pressed { 255 } else { 0 },
            );
        }
        if let Some(pressed) = self.button_pressed(codes::BTN_TR2) {
            self.store_mirrored(
                VirtualSlot::axis(codes::ABS_RZ),
                if pressed { 255 } else { 0 },
            );
        }
    }

    /// `None` when the button slot has no bindings at all.
    fn button_pressed(&self, code: u16) -> Option<bool> {
        self.button_sources
            .get(&VirtualSlot::button(code))
            .map(|sources| sources.values().any(|&p| p))
    }

    fn store_mirrored(&mut self, slot: VirtualSlot, value: i32) {
        self.axis_values
            .entry(slot)
            .or_default()
            .insert(Role::LOWEST, Some(value));
    }

    /// Drops all fusion state back to the zero baseline: refcounts to zero,
    /// cached axis values to absent, `last_output` to zero. Calibrations
    /// are kept; `rebind` replaces them along with the table.
    pub fn reset(&mut self) {
        for sources in self.button_sources.values_mut() {
            sources.clear();
        }
        for roles in self.axis_values.values_mut() {
            for value in roles.values_mut() {
                *value = None;
            }
        }
        for value in self.last_output.values_mut() {
            *value = 0;
        }
    }

    /// Replaces the binding table and calibrations wholesale (reload path)
    /// and re-seeds state. Values converge to the current physical state
    /// within the next batch of input events.
    pub fn rebind(&mut self, table: BindingTable) {
        self.table = table;
        self.button_sources.clear();
        self.axis_values.clear();
        self.last_output.clear();
        self.calibrations.clear();
        self.seed_state();
    }

    // Read-only accessors for diagnostics front-ends.

    /// Number of currently-pressed physical sources feeding a button slot.
    pub fn button_refcount(&self, slot: VirtualSlot) -> usize {
        self.button_sources
            .get(&slot)
            .map(|sources| sources.values().filter(|&&p| p).count())
            .unwrap_or(0)
    }

    /// The value a slot would report right now.
    pub fn current_value(&self, slot: VirtualSlot) -> i32 {
        match slot.kind {
            SourceKind::Button => i32::from(self.button_refcount(slot) > 0),
            SourceKind::Axis => self
                .axis_values
                .get(&slot)
                .map(Self::select_axis_value)
                .unwrap_or(0),
        }
    }

    /// The value last emitted for a slot.
    pub fn last_output(&self, slot: VirtualSlot) -> i32 {
        self.last_output.get(&slot).copied().unwrap_or(0)
    }
}
