// src/main.rs

//! `teeprobe`: check that a device interface is present and can be opened.
//!
//! 1. Parse configuration & set up structured logging
//! 2. Pick the interface id (command line, else `[device] interface`)
//! 3. Resolve the device path and open it for overlapped I/O
//!
//! Usage: `teeprobe <config.toml> [interface-id]`

use anyhow::{bail, Context, Result};
use std::path::Path;

use teeio::config::{self, Config};
use teeio::{logging, InterfaceId};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(cfg_path) = args.next() else {
        bail!("usage: teeprobe <config.toml> [interface-id]");
    };

    // 1 ─ Context & logging
    let cfg_path = Path::new(&cfg_path);
    let cfg = config::load(cfg_path)
        .with_context(|| format!("loading {}", cfg_path.display()))?;
    let base_dir = cfg_path.parent().unwrap_or(Path::new("."));
    logging::init(base_dir, &cfg.logging).context("logging setup failed")?;

    // 2 ─ Interface
    let id = match args.next() {
        Some(arg) => arg.parse::<InterfaceId>()?,
        None => cfg
            .device
            .interface
            .context("no interface id given and none configured")?,
    };

    // 3 ─ Probe
    probe(&cfg, &id)
}

#[cfg(windows)]
fn probe(cfg: &Config, id: &InterfaceId) -> Result<()> {
    use teeio::platform::win32::{DeviceFile, Win32};
    use teeio::Device;

    let settings = cfg.device.settings()?;
    let path = teeio::device_path(&Win32, id).with_context(|| format!("resolving {id}"))?;
    log::info!("{id} -> {path}");

    let file = DeviceFile::open(&path).with_context(|| format!("opening {path}"))?;
    let device = Device::new(&Win32, file.handle(), settings);
    log::info!(
        "opened {path} (timeout {}, on timeout {:?})",
        device.settings().timeout,
        device.settings().on_timeout
    );
    println!("{path}");
    Ok(())
}

#[cfg(not(windows))]
fn probe(_cfg: &Config, id: &InterfaceId) -> Result<()> {
    log::error!("cannot probe {id}: no device interface backend on this platform");
    bail!("teeprobe requires Windows")
}
