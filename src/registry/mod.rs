//! Module registry collaborator.
//!
//! The registry is the running module runtime this agent deploys into. The
//! agent only queries it and asks it to install, update, start or stop; it
//! never owns its state.

pub mod memory;

use thiserror::Error;

use crate::artifact::Version;

pub use memory::{InMemoryRegistry, ModuleState, RegistryOp};

/// Opaque identifier of an installed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleHandle(pub u64);

impl std::fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot entry for one installed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModule {
    pub handle: ModuleHandle,
    pub symbolic_name: String,
    pub version: Version,
    /// Content fingerprint recorded at install/update time.
    pub fingerprint: Option<u64>,
    pub location: String,
}

/// Failures reported by registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Install of {location} failed: {reason}")]
    Install { location: String, reason: String },

    #[error("Update of module {handle} failed: {reason}")]
    Update { handle: ModuleHandle, reason: String },

    #[error("Start of module {handle} failed: {reason}")]
    Start { handle: ModuleHandle, reason: String },

    #[error("Wrapping {location} failed: {reason}")]
    Wrap { location: String, reason: String },

    #[error("Stopping the runtime failed: {reason}")]
    Fatal { reason: String },
}

/// Operations the deployment agent needs from the module runtime.
pub trait ModuleRegistry: Send + Sync {
    /// Installed or active modules with this symbolic name, oldest first.
    fn query_by_symbolic_name(&self, name: &str) -> Vec<InstalledModule>;

    /// Module installed from `location`, if any.
    fn find_by_location(&self, location: &str) -> Option<ModuleHandle>;

    /// Install a module from its archive bytes.
    fn install(&self, location: &str, bytes: &[u8]) -> Result<ModuleHandle, RegistryError>;

    /// Replace a module's content. The module is stopped first.
    fn update(&self, handle: ModuleHandle, bytes: &[u8]) -> Result<(), RegistryError>;

    fn start(&self, handle: ModuleHandle) -> Result<(), RegistryError>;

    /// Stop the whole hosting runtime.
    fn stop_everything(&self) -> Result<(), RegistryError>;

    /// Turn a plain archive into an installable one.
    fn wrap(&self, bytes: &[u8], location: &str) -> Result<Vec<u8>, RegistryError>;
}
