//! `hotasd check`: read-only configuration and device diagnostics.
//!
//! Probes each configured device without grabbing it, counts bindings and
//! calibration coverage, and verifies /dev/uinput is reachable. Exits
//! non-zero when a required device or the uinput node is unavailable.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;

use openhotas_device_types::{Role, SourceKind};
use openhotas_engine::Config;

#[derive(Debug)]
struct DeviceReport {
    role: Role,
    by_id: String,
    optional: bool,
    status: &'static str,
    detail: Option<String>,
    device_name: Option<String>,
}

fn probe_device(role: Role, by_id: &str, vendor: &str, product: &str, optional: bool) -> DeviceReport {
    let mut report = DeviceReport {
        role,
        by_id: by_id.to_string(),
        optional,
        status: "ok",
        detail: None,
        device_name: None,
    };

    if by_id.is_empty() {
        report.status = "not_configured";
        return report;
    }

    let resolved = match std::fs::canonicalize(by_id) {
        Ok(path) => path,
        Err(e) => {
            report.status = "path_resolution_failed";
            report.detail = Some(e.to_string());
            return report;
        }
    };

    let device = match evdev::Device::open(&resolved) {
        Ok(device) => device,
        Err(e) => {
            report.status = "access_failed";
            report.detail = Some(e.to_string());
            return report;
        }
    };

    report.device_name = device.name().map(str::to_string);
    report.detail = Some(resolved.display().to_string());

    let id = device.input_id();
    let vendor_ok = u16::from_str_radix(vendor, 16)
        .map(|expected| id.vendor() == expected)
        .unwrap_or(true);
    let product_ok = u16::from_str_radix(product, 16)
        .map(|expected| id.product() == expected)
        .unwrap_or(true);
    if !vendor_ok || !product_ok {
        report.status = "identity_mismatch";
        report.detail = Some(format!(
            "expected {}:{}, found {:04x}:{:04x}",
            vendor,
            product,
            id.vendor(),
            id.product()
        ));
    }

    report
}

fn uinput_accessible() -> std::io::Result<()> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/uinput")
        .map(|_| ())
}

pub fn run(config_path: &Path, json_output: bool) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.validate().context("configuration is invalid")?;

    let reports: Vec<DeviceReport> = config
        .inputs
        .iter()
        .map(|input| {
            probe_device(
                input.role,
                &input.by_id,
                &input.vendor,
                &input.product,
                input.optional,
            )
        })
        .collect();

    let bindings = config.bindings();
    let calibrated: Vec<(Role, u16)> = config
        .calibrations()
        .map(|(role, code, _)| (role, code))
        .collect();
    let uncalibrated_axes: Vec<(Role, u16)> = bindings
        .iter()
        .filter(|b| b.src.kind == SourceKind::Axis)
        .map(|b| (b.src.role, b.src.code))
        .filter(|key| !calibrated.contains(key))
        .collect();

    let uinput = uinput_accessible();
    let failed_required: Vec<&DeviceReport> = reports
        .iter()
        .filter(|r| !r.optional && r.status != "ok")
        .collect();

    if json_output {
        let value = json!({
            "config": config_path.display().to_string(),
            "uinput_name": config.uinput_name,
            "grab": config.grab,
            "devices": reports.iter().map(|r| json!({
                "role": r.role.as_str(),
                "by_id": r.by_id,
                "optional": r.optional,
                "status": r.status,
                "detail": r.detail,
                "name": r.device_name,
            })).collect::<Vec<_>>(),
            "bindings": bindings.len(),
            "calibrations": calibrated.len(),
            "uncalibrated_axes": uncalibrated_axes.len(),
            "uinput_accessible": uinput.is_ok(),
            "healthy": failed_required.is_empty() && uinput.is_ok(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("configuration: {}", config_path.display());
        println!("  uinput_name: {}", config.uinput_name);
        println!("  grab: {}", config.grab);
        println!();
        println!("devices:");
        for report in &reports {
            let flag = if report.optional { "optional" } else { "required" };
            println!("  {} ({flag}): {}", report.role, report.status);
            if let Some(name) = &report.device_name {
                println!("    name: {name}");
            }
            if let Some(detail) = &report.detail {
                println!("    {detail}");
            }
        }
        println!();
        println!("bindings: {} active", bindings.len());
        println!("calibrations: {} installed", calibrated.len());
        if !uncalibrated_axes.is_empty() {
            println!(
                "  {} axis binding(s) without calibration (fallback mapping applies):",
                uncalibrated_axes.len()
            );
            for (role, code) in &uncalibrated_axes {
                println!("    {role} axis {code}");
            }
        }
        println!();
        match &uinput {
            Ok(()) => println!("/dev/uinput: accessible"),
            Err(e) => println!("/dev/uinput: NOT accessible ({e})"),
        }
    }

    if let Err(e) = uinput {
        bail!("/dev/uinput is not accessible: {e}");
    }
    if !failed_required.is_empty() {
        let roles: Vec<&str> = failed_required.iter().map(|r| r.role.as_str()).collect();
        bail!("required device(s) unavailable: {}", roles.join(", "));
    }
    Ok(())
}
