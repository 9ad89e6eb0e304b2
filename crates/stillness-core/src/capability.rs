//! Optional platform capabilities.
//!
//! Some collaborators (the widget host, a purchase client) exist only on some
//! platforms or builds. Detection runs once, the result is memoized, and
//! callers branch on [`Capability`] instead of checking a shared nullable.

use std::fmt;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The platform has no such facility.
    PlatformUnsupported,
    /// The platform supports it but this build does not ship the module.
    ModuleMissing,
    /// Loading the module failed at runtime.
    RuntimeError(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlatformUnsupported => f.write_str("not supported on this platform"),
            Self::ModuleMissing => f.write_str("module not available in this build"),
            Self::RuntimeError(msg) => write!(f, "failed to load: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability<T> {
    Available(T),
    Unavailable(UnavailableReason),
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Capability::Available(handle) => Some(handle),
            Capability::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&UnavailableReason> {
        match self {
            Capability::Available(_) => None,
            Capability::Unavailable(reason) => Some(reason),
        }
    }
}

/// Run a capability probe.
///
/// `probe` returns `Ok(None)` when the module is absent and `Err` when it is
/// present but failed to initialize.
pub fn detect<T, E, F>(name: &str, platform_supported: bool, probe: F) -> Capability<T>
where
    E: fmt::Display,
    F: FnOnce() -> Result<Option<T>, E>,
{
    let capability = if !platform_supported {
        Capability::Unavailable(UnavailableReason::PlatformUnsupported)
    } else {
        match probe() {
            Ok(Some(handle)) => Capability::Available(handle),
            Ok(None) => Capability::Unavailable(UnavailableReason::ModuleMissing),
            Err(err) => Capability::Unavailable(UnavailableReason::RuntimeError(err.to_string())),
        }
    };
    match capability.reason() {
        None => debug!(capability = name, "capability available"),
        Some(UnavailableReason::RuntimeError(msg)) => {
            warn!(capability = name, error = %msg, "capability failed to load")
        }
        Some(reason) => debug!(capability = name, %reason, "capability unavailable"),
    }
    capability
}

/// Lazily detected, memoized capability.
pub struct CapabilityCell<T> {
    cell: OnceCell<Capability<T>>,
}

impl<T> Default for CapabilityCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CapabilityCell<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Pre-resolved cell, for hosts injected by the caller.
    pub fn resolved(capability: Capability<T>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(capability);
        Self { cell }
    }

    /// Detect on first use; later calls return the memoized result.
    pub fn get_or_detect<F>(&self, detect: F) -> &Capability<T>
    where
        F: FnOnce() -> Capability<T>,
    {
        self.cell.get_or_init(detect)
    }

    pub fn get(&self) -> Option<&Capability<T>> {
        self.cell.get()
    }
}
