//! One opened physical device: descriptor, decoder, grab state, and the
//! offline/online hot-plug state machine with reconnection backoff.

use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisType, Device, InputEvent, Key};
use tracing::{debug, info, warn};

use openhotas_device_types::{Role, SourceKind};

use crate::config::DeviceConfig;

/// Consecutive unclassified read errors tolerated before a source is
/// declared offline.
const READ_FAILURE_LIMIT: u32 = 3;

/// Doubling backoff schedule for reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
    current: Duration,
}

impl ReconnectBackoff {
    pub const INITIAL: Duration = Duration::from_millis(500);
    pub const CEILING: Duration = Duration::from_millis(2000);

    pub fn new() -> Self {
        Self {
            current: Self::INITIAL,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay to wait after a failed attempt, doubling the next
    /// one up to the ceiling.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Self::CEILING);
        delay
    }

    pub fn reset(&mut self) {
        self.current = Self::INITIAL;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one decode pass over a source.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Decoded kernel events, source order preserved.
    Events(Vec<InputEvent>),
    /// Nothing buffered right now.
    Empty,
    /// The device is gone; the source has transitioned to offline.
    Disconnected,
    /// A transient read error was counted; the source is still online.
    Failed,
}

/// One physical device slot.
///
/// Lifecycle: built from configuration, `open_and_init` brings it online,
/// read errors or disconnects push it offline, and `try_reconnect` brings
/// it back with doubling backoff. Destruction releases the grab before the
/// descriptor closes.
pub struct InputSource {
    role: Role,
    by_id: PathBuf,
    vendor: String,
    product: String,
    optional: bool,
    grab_requested: bool,

    resolved_path: Option<PathBuf>,
    device: Option<Device>,
    grabbed: bool,
    read_failures: u32,
    backoff: ReconnectBackoff,
    next_reconnect: Instant,
}

impl InputSource {
    pub fn from_config(config: &DeviceConfig, grab: bool) -> Self {
        Self {
            role: config.role,
            by_id: PathBuf::from(&config.by_id),
            vendor: config.vendor.clone(),
            product: config.product.clone(),
            optional: config.optional,
            grab_requested: grab,
            resolved_path: None,
            device: None,
            grabbed: false,
            read_failures: 0,
            backoff: ReconnectBackoff::new(),
            next_reconnect: Instant::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_online(&self) -> bool {
        self.device.is_some()
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.device.as_ref().map(|d| d.as_raw_fd())
    }

    /// The kernel node the by-id symlink resolved to while online.
    pub fn resolved_path(&self) -> Option<&std::path::Path> {
        self.resolved_path.as_deref()
    }

    /// Resolves the by-id symlink, opens the node nonblocking, verifies the
    /// kernel-reported identity, and optionally requests exclusive grab.
    /// Grab failure is advisory, not fatal.
    pub fn open_and_init(&mut self) -> std::io::Result<()> {
        self.close_and_release();

        let resolved = std::fs::canonicalize(&self.by_id)?;
        let mut device = Device::open(&resolved)?;
        set_nonblocking(&device)?;

        self.check_identity(&device)?;

        if self.grab_requested {
            match device.grab() {
                Ok(()) => self.grabbed = true,
                Err(e) => {
                    // Other consumers may still see this device's events.
                    warn!(role = %self.role, error = %e, "exclusive grab failed, continuing without");
                    self.grabbed = false;
                }
            }
        }

        if let Ok(abs_state) = device.get_abs_state() {
            if let Some(axes) = device.supported_absolute_axes() {
                for axis in axes.iter() {
                    let info = abs_state[axis.0 as usize];
                    debug!(
                        role = %self.role,
                        axis = axis.0,
                        min = info.minimum,
                        max = info.maximum,
                        "source axis metadata (informational; calibration supersedes)"
                    );
                }
            }
        }

        info!(
            role = %self.role,
            path = %resolved.display(),
            name = device.name().unwrap_or("<unnamed>"),
            grabbed = self.grabbed,
            "source online"
        );

        self.resolved_path = Some(resolved);
        self.device = Some(device);
        self.read_failures = 0;
        self.backoff.reset();
        Ok(())
    }

    fn check_identity(&self, device: &Device) -> std::io::Result<()> {
        let id = device.input_id();
        // Empty or malformed expectations skip the check; the wizard writes
        // lowercase hex without a 0x prefix.
        let vendor_ok = match u16::from_str_radix(&self.vendor, 16) {
            Ok(expected) => id.vendor() == expected,
            Err(_) => true,
        };
        let product_ok = match u16::from_str_radix(&self.product, 16) {
            Ok(expected) => id.product() == expected,
            Err(_) => true,
        };
        if vendor_ok && product_ok {
            Ok(())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "{} identity mismatch: expected {}:{}, found {:04x}:{:04x}",
                    self.role,
                    self.vendor,
                    self.product,
                    id.vendor(),
                    id.product()
                ),
            ))
        }
    }

    /// Releases the grab (if held), drops the decoder, closes the fd.
    /// Idempotent and safe on a partially-constructed source.
    pub fn close_and_release(&mut self) {
        if let Some(device) = self.device.as_mut() {
            if self.grabbed {
                if let Err(e) = device.ungrab() {
                    debug!(role = %self.role, error = %e, "ungrab failed during release");
                }
            }
        }
        self.device = None;
        self.grabbed = false;
        self.resolved_path = None;
    }

    /// Whether the opened device advertises the given event code.
    pub fn supports(&self, kind: SourceKind, code: u16) -> bool {
        let Some(device) = self.device.as_ref() else {
            return false;
        };
        match kind {
            SourceKind::Button => device
                .supported_keys()
                .map_or(false, |keys| keys.contains(Key::new(code))),
            SourceKind::Axis => device
                .supported_absolute_axes()
                .map_or(false, |axes| axes.contains(AbsoluteAxisType(code))),
        }
    }

    /// One decode pass. Pulls whatever the kernel has buffered; call again
    /// until [`ReadOutcome::Empty`] to drain a readiness notification.
    pub fn read_events(&mut self) -> ReadOutcome {
        let Some(device) = self.device.as_mut() else {
            return ReadOutcome::Empty;
        };
        enum Action {
            Events(Vec<InputEvent>),
            Empty,
            Disconnected,
            Failed,
        }
        let action = match device.fetch_events() {
            Ok(events) => {
                self.read_failures = 0;
                Action::Events(events.collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.read_failures = 0;
                Action::Empty
            }
            Err(e) if is_disconnect_errno(&e) => {
                info!(role = %self.role, error = %e, "source disconnected");
                Action::Disconnected
            }
            Err(e) => {
                self.read_failures += 1;
                warn!(
                    role = %self.role,
                    error = %e,
                    failures = self.read_failures,
                    "source read failed"
                );
                if self.read_failures >= READ_FAILURE_LIMIT {
                    Action::Disconnected
                } else {
                    Action::Failed
                }
            }
        };
        match action {
            Action::Events(events) => ReadOutcome::Events(events),
            Action::Empty => ReadOutcome::Empty,
            Action::Disconnected => {
                self.go_offline();
                ReadOutcome::Disconnected
            }
            Action::Failed => ReadOutcome::Failed,
        }
    }

    /// Forces the offline transition (poll reported the fd dead).
    pub fn force_offline(&mut self, reason: &str) {
        if self.is_online() {
            info!(role = %self.role, reason, "source offline");
            self.go_offline();
        }
    }

    fn go_offline(&mut self) {
        self.close_and_release();
        self.read_failures = 0;
        self.next_reconnect = Instant::now() + self.backoff.current();
    }

    /// Pushes the next reconnection attempt one backoff interval out.
    /// Used for sources that are offline from birth (optional device
    /// missing at startup), which enter the retry loop like any other.
    pub fn schedule_reconnect(&mut self, now: Instant) {
        self.next_reconnect = now + self.backoff.current();
    }

    /// Attempts to reopen an offline source once its deadline has passed.
    /// Returns true when the source came back online.
    pub fn try_reconnect(&mut self, now: Instant) -> bool {
        if self.is_online() || now < self.next_reconnect {
            return false;
        }
        match self.open_and_init() {
            Ok(()) => true,
            Err(e) => {
                let delay = self.backoff.on_failure();
                self.next_reconnect = now + self.backoff.current();
                debug!(
                    role = %self.role,
                    error = %e,
                    waited_ms = delay.as_millis() as u64,
                    retry_in_ms = self.backoff.current().as_millis() as u64,
                    "reconnect attempt failed"
                );
                false
            }
        }
    }
}

impl Drop for InputSource {
    fn drop(&mut self) {
        self.close_and_release();
    }
}

fn is_disconnect_errno(e: &std::io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::ENODEV) | Some(libc::ENOENT) | Some(libc::EIO)
    )
}

fn set_nonblocking(device: &Device) -> std::io::Result<()> {
    let fd = device.as_raw_fd();
    // Preserve existing flags; just OR in O_NONBLOCK.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
