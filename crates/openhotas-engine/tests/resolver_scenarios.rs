//! End-to-end fusion scenarios: literal input sequences against the
//! expected virtual event streams.

use openhotas_calibration::AxisCalibration;
use openhotas_device_types::contract::{codes, VirtualSlot};
use openhotas_device_types::{AxisTransform, Binding, PhysicalInput, Role};
use openhotas_engine::{BindingResolver, BindingTable};

fn resolver(bindings: Vec<Binding>) -> BindingResolver {
    BindingResolver::new(BindingTable::new(bindings).expect("valid table"))
}

#[test]
fn fan_in_or_two_buttons_one_press_one_release() {
    // Stick A and throttle A both drive South. Holding either keeps the
    // virtual button down; only the first press and the last release emit.
    let mut r = resolver(vec![
        Binding::button(
            PhysicalInput::button(Role::Stick, codes::BTN_TRIGGER),
            VirtualSlot::button(codes::BTN_SOUTH),
        ),
        Binding::button(
            PhysicalInput::button(Role::Throttle, codes::BTN_TRIGGER),
            VirtualSlot::button(codes::BTN_SOUTH),
        ),
    ]);
    let south = VirtualSlot::button(codes::BTN_SOUTH);

    let mut emitted = Vec::new();
    for (role, value) in [
        (Role::Stick, 1),
        (Role::Throttle, 1),
        (Role::Stick, 0),
        (Role::Throttle, 0),
    ] {
        r.process(PhysicalInput::button(role, codes::BTN_TRIGGER), value);
        emitted.extend(r.drain_pending());
    }

    assert_eq!(emitted, vec![(south, 1), (south, 0)]);
}

#[test]
fn axis_priority_stick_beats_throttle() {
    // Identity transforms, no calibration: values pass straight through,
    // and the stick owns LX as soon as it has reported once.
    let mut r = resolver(vec![
        Binding::new(
            PhysicalInput::axis(Role::Stick, codes::ABS_X),
            VirtualSlot::axis(codes::ABS_X),
            AxisTransform::default(),
        ),
        Binding::new(
            PhysicalInput::axis(Role::Throttle, codes::ABS_X),
            VirtualSlot::axis(codes::ABS_X),
            AxisTransform::default(),
        ),
    ]);
    let lx = VirtualSlot::axis(codes::ABS_X);

    r.process(PhysicalInput::axis(Role::Throttle, codes::ABS_X), 100);
    assert_eq!(r.drain_pending(), vec![(lx, 100)]);

    r.process(PhysicalInput::axis(Role::Stick, codes::ABS_X), 200);
    assert_eq!(r.drain_pending(), vec![(lx, 200)]);

    // The throttle update is shadowed: LX holds 200, nothing emits.
    r.process(PhysicalInput::axis(Role::Throttle, codes::ABS_X), 50);
    assert_eq!(r.drain_pending(), vec![]);
    assert_eq!(r.current_value(lx), 200);

    r.process(PhysicalInput::axis(Role::Stick, codes::ABS_X), 0);
    assert_eq!(r.drain_pending(), vec![(lx, 0)]);
}

#[test]
fn centered_two_segment_calibration() {
    let mut r = resolver(vec![Binding::new(
        PhysicalInput::axis(Role::Stick, codes::ABS_X),
        VirtualSlot::axis(codes::ABS_X),
        AxisTransform::for_range(-32768, 32767),
    )]);
    r.set_calibration(
        Role::Stick,
        codes::ABS_X,
        AxisCalibration::new(0, 1023)
            .with_center(600)
            .with_deadzone_radius(5),
    );
    let lx = VirtualSlot::axis(codes::ABS_X);

    let expectations = [
        (0, -32768),
        (300, -16246), // linear on the left segment
        (600, 0),
        (1023, 32767),
    ];
    for (raw, expected) in expectations {
        r.process(PhysicalInput::axis(Role::Stick, codes::ABS_X), raw);
        let _ = r.drain_pending();
        assert_eq!(r.current_value(lx), expected, "raw={raw}");
    }

    // Inside and at the edge of the deadzone: flat zero.
    for raw in [603, 605] {
        r.process(PhysicalInput::axis(Role::Stick, codes::ABS_X), raw);
        let _ = r.drain_pending();
        assert_eq!(r.current_value(lx), 0, "raw={raw}");
    }
}

#[test]
fn unidirectional_throttle_calibration() {
    let mut r = resolver(vec![Binding::new(
        PhysicalInput::axis(Role::Throttle, codes::ABS_THROTTLE),
        VirtualSlot::axis(codes::ABS_Z),
        AxisTransform::for_range(0, 255),
    )]);
    // Rest at one end classifies the axis unidirectional: one segment,
    // no deadzone, so low throttle never quantizes to zero.
    r.set_calibration(
        Role::Throttle,
        codes::ABS_THROTTLE,
        AxisCalibration::new(50, 950).with_center(50),
    );
    let lt = VirtualSlot::axis(codes::ABS_Z);

    r.process(PhysicalInput::axis(Role::Throttle, codes::ABS_THROTTLE), 50);
    let _ = r.drain_pending();
    assert_eq!(r.current_value(lt), 0);

    r.process(PhysicalInput::axis(Role::Throttle, codes::ABS_THROTTLE), 500);
    let _ = r.drain_pending();
    let mid = r.current_value(lt);
    assert!((127..=128).contains(&mid), "mid-travel was {mid}");

    r.process(PhysicalInput::axis(Role::Throttle, codes::ABS_THROTTLE), 950);
    let _ = r.drain_pending();
    assert_eq!(r.current_value(lt), 255);
}

#[test]
fn dpad_buttons_mirror_into_hat_axis() {
    let mut r = resolver(vec![
        Binding::button(
            PhysicalInput::button(Role::Stick, codes::BTN_DPAD_LEFT),
            VirtualSlot::button(codes::BTN_DPAD_LEFT),
        ),
        Binding::button(
            PhysicalInput::button(Role::Stick, codes::BTN_DPAD_RIGHT),
            VirtualSlot::button(codes::BTN_DPAD_RIGHT),
        ),
    ]);
    let hat_x = VirtualSlot::axis(codes::ABS_HAT0X);

    r.process(PhysicalInput::button(Role::Stick, codes::BTN_DPAD_LEFT), 1);
    let events = r.drain_pending();
    assert!(events.contains(&(hat_x, -1)), "{events:?}");

    r.process(PhysicalInput::button(Role::Stick, codes::BTN_DPAD_RIGHT), 1);
    let events = r.drain_pending();
    assert!(events.contains(&(hat_x, 0)), "{events:?}");

    r.process(PhysicalInput::button(Role::Stick, codes::BTN_DPAD_LEFT), 0);
    let events = r.drain_pending();
    assert!(events.contains(&(hat_x, 1)), "{events:?}");
}

#[test]
fn drain_is_edge_triggered_and_slot_unique() {
    let mut r = resolver(vec![Binding::new(
        PhysicalInput::axis(Role::Stick, codes::ABS_Y),
        VirtualSlot::axis(codes::ABS_Y),
        AxisTransform::default(),
    )]);
    let ly = VirtualSlot::axis(codes::ABS_Y);

    r.process(PhysicalInput::axis(Role::Stick, codes::ABS_Y), 7000);
    assert_eq!(r.drain_pending(), vec![(ly, 7000)]);
    assert_eq!(r.last_output(ly), 7000);

    // Same value again: no edge, no event.
    r.process(PhysicalInput::axis(Role::Stick, codes::ABS_Y), 7000);
    assert_eq!(r.drain_pending(), vec![]);
}

#[test]
fn reload_reset_converges_on_next_events() {
    let bindings = || {
        vec![
            Binding::button(
                PhysicalInput::button(Role::Stick, codes::BTN_TRIGGER),
                VirtualSlot::button(codes::BTN_SOUTH),
            ),
            Binding::new(
                PhysicalInput::axis(Role::Stick, codes::ABS_X),
                VirtualSlot::axis(codes::ABS_X),
                AxisTransform::default(),
            ),
        ]
    };
    let mut r = resolver(bindings());
    let south = VirtualSlot::button(codes::BTN_SOUTH);
    let lx = VirtualSlot::axis(codes::ABS_X);

    r.process(PhysicalInput::button(Role::Stick, codes::BTN_TRIGGER), 1);
    r.process(PhysicalInput::axis(Role::Stick, codes::ABS_X), 900);
    let _ = r.drain_pending();

    // Identical table swapped in: state resets, nothing pending.
    r.rebind(BindingTable::new(bindings()).expect("valid table"));
    assert_eq!(r.drain_pending(), vec![]);
    assert_eq!(r.current_value(south), 0);
    assert_eq!(r.current_value(lx), 0);

    // The next physical reports re-establish the previous state.
    r.process(PhysicalInput::button(Role::Stick, codes::BTN_TRIGGER), 1);
    r.process(PhysicalInput::axis(Role::Stick, codes::ABS_X), 900);
    let mut emitted = r.drain_pending();
    emitted.sort();
    let mut expected = vec![(south, 1), (lx, 900)];
    expected.sort();
    assert_eq!(emitted, expected);
}
