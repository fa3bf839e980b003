//! Configuration loading against real files.

use std::io::Write;

use openhotas_engine::{Config, ConfigError};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn load_round_trips_a_written_config() {
    let file = write_config(
        r#"{
            "uinput_name": "Xbox 360 Controller (Virtual)",
            "grab": false,
            "inputs": [
                { "role": "stick", "by_id": "/dev/input/by-id/usb-stick", "optional": false },
                { "role": "rudder", "by_id": "/dev/input/by-id/usb-rudder", "optional": true }
            ],
            "bindings_abs": [
                { "role": "stick", "src": 0, "dst": 0, "deadzone": 200 },
                { "role": "rudder", "src": 5, "dst": 5, "invert": true, "scale": 1.5 }
            ]
        }"#,
    );

    let config = Config::load(file.path()).expect("load");
    assert!(!config.grab);
    assert_eq!(config.inputs.len(), 2);
    assert!(config.validate().is_ok());

    let bindings = config.bindings();
    assert_eq!(bindings.len(), 2);
    let rz = &bindings[1];
    assert!(rz.xform.invert);
    assert_eq!(rz.xform.scale, 1.5);
    assert_eq!((rz.xform.min_out, rz.xform.max_out), (0, 255));
}

#[test]
fn load_missing_file_is_an_io_error() {
    let result = Config::load(std::path::Path::new("/nonexistent/openhotas.json"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn load_malformed_json_is_a_parse_error() {
    let file = write_config("{ not json");
    let result = Config::load(file.path());
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn reload_of_identical_config_builds_identical_bindings() {
    let text = r#"{
        "inputs": [ { "role": "stick", "by_id": "/dev/input/by-id/usb-stick" } ],
        "bindings_keys": [ { "role": "stick", "src": 288, "dst": 304 } ]
    }"#;
    let first = Config::load(write_config(text).path()).expect("load");
    let second = Config::load(write_config(text).path()).expect("load");
    assert_eq!(first.bindings(), second.bindings());
}
