//! Output formatting shared by the bacbrowse command-line tools.
//!
//! Every renderer produces either pretty-printed JSON or a plain table, so
//! the binaries stay a thin layer over [`bacbrowse_engine::Browser`].

use std::fmt::Write as _;

use bacbrowse_engine::{BacnetObject, ClientConfig, Device, NetworkInterface, Property};
use serde::Serialize;

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

pub fn interfaces(entries: &[NetworkInterface], as_json: bool) -> Result<String, serde_json::Error> {
    if as_json {
        return json(entries);
    }
    let mut out = String::new();
    for (i, iface) in entries.iter().enumerate() {
        let address = iface.address.map_or_else(|| "-".to_string(), |a| a.to_string());
        let _ = writeln!(out, "{i}: {} {address}", iface.name);
    }
    Ok(out)
}

pub fn config(config: &ClientConfig, as_json: bool) -> Result<String, serde_json::Error> {
    if as_json {
        return json(config);
    }
    Ok(format!(
        "port {}\nnic {}\ntimeout {} ms\n",
        config.port, config.interface_index, config.timeout_millis
    ))
}

pub fn devices(devices: &[Device], as_json: bool) -> Result<String, serde_json::Error> {
    if as_json {
        return json(devices);
    }
    let mut out = String::new();
    for device in devices {
        let _ = writeln!(
            out,
            "{:<24} {:<32} vendor {}",
            device.key,
            device.name.as_deref().unwrap_or("?"),
            device.vendor_id
        );
    }
    Ok(out)
}

pub fn objects(objects: &[BacnetObject], as_json: bool) -> Result<String, serde_json::Error> {
    if as_json {
        return json(objects);
    }
    let mut out = String::new();
    for object in objects {
        let value = object
            .present_value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let _ = writeln!(out, "{:<14} \"{}\" = {value}", object.key, object.name);
    }
    Ok(out)
}

pub fn properties(properties: &[Property], as_json: bool) -> Result<String, serde_json::Error> {
    if as_json {
        return json(properties);
    }
    let mut out = String::new();
    for property in properties {
        let _ = writeln!(out, "{} ({}): {}", property.name, property.id, property.value);
    }
    Ok(out)
}
