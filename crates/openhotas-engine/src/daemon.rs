//! Daemon orchestration: composition from configuration, the `poll(2)`
//! event loop, hot-plug reconnection, signal handling, and reload.
//!
//! Single-threaded and event-driven. The only suspension point is the
//! readiness wait, bounded at 100 ms so offline sources get their
//! reconnection tick even when nothing else moves. Every decoded input
//! event is processed, drained, and flushed as one atomic unit;
//! termination is a flag checked at loop head, so no partial group is
//! ever cut off.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use evdev::{InputEvent, InputEventKind};
use tracing::{info, warn};

use openhotas_device_types::{Binding, PhysicalInput, Role, SourceKind};

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::output::VirtualOutput;
use crate::resolver::{BindingResolver, BindingTable};
use crate::source::{InputSource, ReadOutcome};

/// Readiness wait bound; doubles as the reconnection cadence.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Consecutive uinput write failures tolerated before the daemon gives up
/// on the contract and exits.
const WRITE_FAILURE_LIMIT: u32 = 10;

pub mod signals {
    //! Process-wide signal flags, read at the loop head.

    use std::sync::atomic::{AtomicBool, Ordering};

    static SHUTDOWN: AtomicBool = AtomicBool::new(false);
    static RELOAD: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_shutdown(_signal: libc::c_int) {
        SHUTDOWN.store(true, Ordering::SeqCst);
    }

    extern "C" fn on_reload(_signal: libc::c_int) {
        RELOAD.store(true, Ordering::SeqCst);
    }

    fn install_handler(
        signal: libc::c_int,
        handler: extern "C" fn(libc::c_int),
    ) -> std::io::Result<()> {
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handler as usize;
            libc::sigemptyset(&mut action.sa_mask);
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(std::io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Installs SIGINT/SIGTERM (clean shutdown) and SIGHUP (reload).
    pub fn install() -> std::io::Result<()> {
        install_handler(libc::SIGINT, on_shutdown)?;
        install_handler(libc::SIGTERM, on_shutdown)?;
        install_handler(libc::SIGHUP, on_reload)
    }

    pub fn shutdown_requested() -> bool {
        SHUTDOWN.load(Ordering::SeqCst)
    }

    /// Consumes a pending reload request.
    pub fn take_reload() -> bool {
        RELOAD.swap(false, Ordering::SeqCst)
    }
}

/// Owns the sources, the resolver, and the virtual output for the process
/// lifetime.
pub struct Daemon {
    config: Config,
    config_path: Option<PathBuf>,
    sources: Vec<InputSource>,
    resolver: BindingResolver,
    output: VirtualOutput,
    write_failures: u32,
}

impl Daemon {
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let config = Config::load(path)?;
        Self::build(config, Some(path.to_path_buf()))
    }

    /// Builds from an already-parsed configuration. Reload is unavailable
    /// without a backing file.
    pub fn from_config(config: Config) -> EngineResult<Self> {
        Self::build(config, None)
    }

    fn build(config: Config, config_path: Option<PathBuf>) -> EngineResult<Self> {
        config.validate()?;

        let now = Instant::now();
        let mut sources = Vec::with_capacity(config.inputs.len());
        for device_config in &config.inputs {
            let mut source = InputSource::from_config(device_config, config.grab);
            match source.open_and_init() {
                Ok(()) => {}
                Err(e) if device_config.optional => {
                    warn!(
                        role = %device_config.role,
                        error = %e,
                        "optional device unavailable, will keep retrying"
                    );
                    source.schedule_reconnect(now);
                }
                Err(e) => {
                    return Err(EngineError::RequiredSourceUnavailable {
                        role: device_config.role,
                        source: e,
                    });
                }
            }
            sources.push(source);
        }

        let bindings = filter_by_capability(config.bindings(), &sources);
        let table = BindingTable::new(bindings).map_err(crate::config::ConfigError::from)?;
        let mut resolver = BindingResolver::new(table);
        for (role, code, calibration) in config.calibrations() {
            resolver.set_calibration(role, code, calibration);
        }
        warn_uncalibrated_axes(&resolver);

        let output =
            VirtualOutput::create(&config.uinput_name).map_err(EngineError::OutputCreate)?;

        Ok(Self {
            config,
            config_path,
            sources,
            resolver,
            output,
            write_failures: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &BindingResolver {
        &self.resolver
    }

    /// Runs until a termination signal arrives, then tears down in reverse
    /// acquisition order.
    pub fn run(&mut self) -> EngineResult<()> {
        signals::install().map_err(EngineError::Signals)?;
        info!(
            sources = self.sources.len(),
            bindings = self.resolver.table().len(),
            "entering event loop"
        );

        while !signals::shutdown_requested() {
            if signals::take_reload() {
                self.reload();
            }
            self.poll_once(POLL_TIMEOUT)?;
            self.reconnect_pass();
        }

        info!("termination signal received");
        self.teardown();
        Ok(())
    }

    /// One readiness wait plus a full drain of every ready source.
    fn poll_once(&mut self, timeout: Duration) -> EngineResult<()> {
        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(self.sources.len());
        let mut indices: Vec<usize> = Vec::with_capacity(self.sources.len());
        for (i, source) in self.sources.iter().enumerate() {
            if let Some(fd) = source.raw_fd() {
                fds.push(libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                });
                indices.push(i);
            }
        }

        if fds.is_empty() {
            // Everything is offline; keep the reconnection cadence.
            std::thread::sleep(timeout);
            return Ok(());
        }

        let rc = unsafe {
            libc::poll(
                fds.as_mut_ptr(),
                fds.len() as libc::nfds_t,
                timeout.as_millis() as libc::c_int,
            )
        };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                // A signal landed; the loop head reads the flags.
                return Ok(());
            }
            return Err(EngineError::Poll(err));
        }
        if rc == 0 {
            return Ok(());
        }

        for (k, pollfd) in fds.iter().enumerate() {
            if pollfd.revents == 0 {
                continue;
            }
            let index = indices[k];
            self.drain_source(index)?;
            let hangup =
                pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0;
            if hangup {
                self.sources[index].force_offline("poll reported hangup");
            }
        }
        Ok(())
    }

    /// Pulls decoded events until the source runs dry, dispatching each
    /// through the resolver.
    fn drain_source(&mut self, index: usize) -> EngineResult<()> {
        loop {
            match self.sources[index].read_events() {
                ReadOutcome::Events(events) => {
                    let role = self.sources[index].role();
                    for event in events {
                        self.handle_event(role, event)?;
                    }
                }
                ReadOutcome::Empty | ReadOutcome::Failed | ReadOutcome::Disconnected => break,
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, role: Role, event: InputEvent) -> EngineResult<()> {
        match event.kind() {
            InputEventKind::Key(key) => {
                self.resolver
                    .process(PhysicalInput::button(role, key.code()), event.value());
            }
            InputEventKind::AbsAxis(axis) => {
                self.resolver
                    .process(PhysicalInput::axis(role, axis.0), event.value());
            }
            // Source sync markers and anything else (MSC, relative noise)
            // are consumed, never forwarded.
            _ => return Ok(()),
        }

        for (slot, value) in self.resolver.drain_pending() {
            self.output.push(slot, value);
        }
        self.flush_output()
    }

    fn flush_output(&mut self) -> EngineResult<()> {
        match self.output.flush() {
            Ok(_) => {
                self.write_failures = 0;
                Ok(())
            }
            Err(e) => {
                self.write_failures += 1;
                warn!(
                    error = %e,
                    failures = self.write_failures,
                    "virtual device write failed"
                );
                if self.write_failures >= WRITE_FAILURE_LIMIT {
                    Err(EngineError::OutputBroken {
                        failures: self.write_failures,
                        source: e,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    fn reconnect_pass(&mut self) {
        let now = Instant::now();
        for source in &mut self.sources {
            if !source.is_online() && source.try_reconnect(now) {
                info!(role = %source.role(), "source reconnected");
            }
        }
    }

    /// SIGHUP: rebuild bindings and calibrations without touching the
    /// virtual device. Any failure keeps the previous state.
    fn reload(&mut self) {
        let Some(path) = self.config_path.clone() else {
            warn!("reload requested but the daemon was started without a config file");
            return;
        };
        info!(path = %path.display(), "reloading bindings and calibrations");

        let new_config = match Config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "reload aborted, keeping previous configuration");
                return;
            }
        };
        if let Err(e) = new_config.validate() {
            warn!(error = %e, "reload aborted, keeping previous configuration");
            return;
        }
        let table = match BindingTable::new(filter_by_capability(
            new_config.bindings(),
            &self.sources,
        )) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "reload aborted, keeping previous configuration");
                return;
            }
        };

        self.resolver.rebind(table);
        for (role, code, calibration) in new_config.calibrations() {
            self.resolver.set_calibration(role, code, calibration);
        }
        warn_uncalibrated_axes(&self.resolver);
        // Device assignments, grab flag, and the virtual device are fixed
        // for the process lifetime; only tables were replaced.
        self.config = new_config;
        info!(bindings = self.resolver.table().len(), "reload complete");
    }

    fn teardown(&mut self) {
        // Reverse acquisition order; each release drops the grab before
        // closing the descriptor.
        for source in self.sources.iter_mut().rev() {
            source.close_and_release();
        }
        info!("sources released, destroying virtual device");
    }
}

/// Drops bindings whose source code is provably absent on the opened
/// device. Bindings for offline sources are kept: the device may return
/// and the binding costs nothing while it is away.
fn filter_by_capability(bindings: Vec<Binding>, sources: &[InputSource]) -> Vec<Binding> {
    let mut kept = Vec::with_capacity(bindings.len());
    let mut logged: BTreeSet<PhysicalInput> = BTreeSet::new();
    for binding in bindings {
        let source = sources.iter().find(|s| s.role() == binding.src.role);
        if let Some(source) = source {
            if source.is_online() && !source.supports(binding.src.kind, binding.src.code) {
                if logged.insert(binding.src) {
                    warn!(
                        role = %binding.src.role,
                        kind = ?binding.src.kind,
                        code = binding.src.code,
                        "device does not advertise bound code, dropping binding"
                    );
                }
                continue;
            }
        }
        kept.push(binding);
    }
    kept
}

/// One warning per real axis binding with no installed calibration; the
/// uncalibrated fallback keeps the axis usable in the meantime.
fn warn_uncalibrated_axes(resolver: &BindingResolver) {
    let mut warned: BTreeSet<(Role, u16)> = BTreeSet::new();
    for binding in resolver.table().bindings() {
        if binding.src.kind != SourceKind::Axis {
            continue;
        }
        let key = (binding.src.role, binding.src.code);
        if resolver.calibration(key.0, key.1).is_none() && warned.insert(key) {
            warn!(
                role = %key.0,
                code = key.1,
                "axis has no calibration, using the 16-bit fallback mapping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use openhotas_device_types::contract::codes;
    use openhotas_device_types::{AxisTransform, VirtualSlot};

    fn offline_source(role: Role) -> InputSource {
        InputSource::from_config(
            &DeviceConfig {
                role,
                by_id: "/dev/input/by-id/nope".to_string(),
                vendor: String::new(),
                product: String::new(),
                optional: true,
                calibrations: Vec::new(),
            },
            false,
        )
    }

    #[test]
    fn test_capability_filter_keeps_bindings_for_offline_sources() {
        let sources = vec![offline_source(Role::Stick)];
        let bindings = vec![Binding::new(
            PhysicalInput::axis(Role::Stick, codes::ABS_X),
            VirtualSlot::axis(codes::ABS_X),
            AxisTransform::for_range(-32768, 32767),
        )];
        let kept = filter_by_capability(bindings.clone(), &sources);
        assert_eq!(kept.len(), bindings.len());
    }

    #[test]
    fn test_capability_filter_keeps_bindings_for_unconfigured_roles() {
        // No rudder source at all: the binding stays inert but present.
        let sources = vec![offline_source(Role::Stick)];
        let bindings = vec![Binding::button(
            PhysicalInput::button(Role::Rudder, 288),
            VirtualSlot::button(codes::BTN_SOUTH),
        )];
        assert_eq!(filter_by_capability(bindings, &sources).len(), 1);
    }
}
