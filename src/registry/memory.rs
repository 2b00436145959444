//! Self-contained module registry kept in memory.
//!
//! Backs the `run` command's simulated runtime and the test suite. Installed
//! archives are described with the same manifest reader the agent uses, and
//! every call is appended to an operation log for inspection.

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;

use super::{InstalledModule, ModuleHandle, ModuleRegistry, RegistryError};
use crate::artifact::{describe_bytes, wrap_archive};

/// Lifecycle state of a module in the in-memory runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Installed,
    Active,
}

/// One recorded registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOp {
    Install {
        location: String,
        handle: ModuleHandle,
    },
    Update {
        handle: ModuleHandle,
    },
    Start {
        handle: ModuleHandle,
    },
    Wrap {
        location: String,
    },
    StopEverything,
}

#[derive(Debug)]
struct Module {
    info: InstalledModule,
    state: ModuleState,
}

#[derive(Debug, Default)]
struct Inner {
    modules: BTreeMap<ModuleHandle, Module>,
    next_handle: u64,
    ops: Vec<RegistryOp>,
    halted: bool,
    failing_starts: HashSet<String>,
}

/// In-memory `ModuleRegistry`.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `start` of modules named `symbolic_name` fail.
    pub fn fail_starts_of(&self, symbolic_name: impl Into<String>) {
        self.inner.lock().failing_starts.insert(symbolic_name.into());
    }

    /// All modules, in install order.
    pub fn modules(&self) -> Vec<InstalledModule> {
        self.inner
            .lock()
            .modules
            .values()
            .map(|m| m.info.clone())
            .collect()
    }

    pub fn state_of(&self, handle: ModuleHandle) -> Option<ModuleState> {
        self.inner.lock().modules.get(&handle).map(|m| m.state)
    }

    /// Every call made so far, oldest first.
    pub fn operations(&self) -> Vec<RegistryOp> {
        self.inner.lock().ops.clone()
    }

    /// Whether `stop_everything` has been called.
    pub fn is_halted(&self) -> bool {
        self.inner.lock().halted
    }
}

impl ModuleRegistry for InMemoryRegistry {
    fn query_by_symbolic_name(&self, name: &str) -> Vec<InstalledModule> {
        self.inner
            .lock()
            .modules
            .values()
            .filter(|m| m.info.symbolic_name == name)
            .map(|m| m.info.clone())
            .collect()
    }

    fn find_by_location(&self, location: &str) -> Option<ModuleHandle> {
        self.inner
            .lock()
            .modules
            .values()
            .find(|m| m.info.location == location)
            .map(|m| m.info.handle)
    }

    fn install(&self, location: &str, bytes: &[u8]) -> Result<ModuleHandle, RegistryError> {
        let install_error = |reason: String| RegistryError::Install {
            location: location.to_string(),
            reason,
        };

        let descriptor = describe_bytes(bytes).map_err(|e| install_error(e.to_string()))?;
        let Some(symbolic_name) = descriptor.symbolic_name.clone() else {
            return Err(install_error("archive has no symbolic name".to_string()));
        };

        let mut inner = self.inner.lock();
        if inner.halted {
            return Err(install_error("runtime is stopped".to_string()));
        }

        // Installing from a known location hands back the existing module.
        if let Some(existing) = inner.modules.values().find(|m| m.info.location == location) {
            return Ok(existing.info.handle);
        }

        inner.next_handle += 1;
        let handle = ModuleHandle(inner.next_handle);
        inner.modules.insert(
            handle,
            Module {
                info: InstalledModule {
                    handle,
                    symbolic_name,
                    version: descriptor.effective_version(),
                    fingerprint: descriptor.fingerprint,
                    location: location.to_string(),
                },
                state: ModuleState::Installed,
            },
        );
        inner.ops.push(RegistryOp::Install {
            location: location.to_string(),
            handle,
        });

        crate::debug_event!("registry", "installed", "{handle} from {location}");
        Ok(handle)
    }

    fn update(&self, handle: ModuleHandle, bytes: &[u8]) -> Result<(), RegistryError> {
        let update_error = |reason: String| RegistryError::Update { handle, reason };

        let descriptor = describe_bytes(bytes).map_err(|e| update_error(e.to_string()))?;

        let mut inner = self.inner.lock();
        if inner.halted {
            return Err(update_error("runtime is stopped".to_string()));
        }
        let Some(module) = inner.modules.get_mut(&handle) else {
            return Err(update_error("no such module".to_string()));
        };

        module.state = ModuleState::Installed;
        if let Some(name) = descriptor.symbolic_name.clone() {
            module.info.symbolic_name = name;
        }
        module.info.version = descriptor.effective_version();
        module.info.fingerprint = descriptor.fingerprint;
        inner.ops.push(RegistryOp::Update { handle });

        crate::debug_event!("registry", "updated", "{handle}");
        Ok(())
    }

    fn start(&self, handle: ModuleHandle) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.halted {
            return Err(RegistryError::Start {
                handle,
                reason: "runtime is stopped".to_string(),
            });
        }

        let failing = inner
            .modules
            .get(&handle)
            .map(|m| inner.failing_starts.contains(&m.info.symbolic_name));
        match failing {
            None => {
                return Err(RegistryError::Start {
                    handle,
                    reason: "no such module".to_string(),
                });
            }
            Some(true) => {
                return Err(RegistryError::Start {
                    handle,
                    reason: "activator failed".to_string(),
                });
            }
            Some(false) => {}
        }

        if let Some(module) = inner.modules.get_mut(&handle) {
            module.state = ModuleState::Active;
        }
        inner.ops.push(RegistryOp::Start { handle });
        Ok(())
    }

    fn stop_everything(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        inner.halted = true;
        for module in inner.modules.values_mut() {
            module.state = ModuleState::Installed;
        }
        inner.ops.push(RegistryOp::StopEverything);

        crate::log_event!("registry", "runtime stopped");
        Ok(())
    }

    fn wrap(&self, bytes: &[u8], location: &str) -> Result<Vec<u8>, RegistryError> {
        let wrapped = wrap_archive(bytes, location).map_err(|e| RegistryError::Wrap {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        self.inner.lock().ops.push(RegistryOp::Wrap {
            location: location.to_string(),
        });
        Ok(wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Version;
    use crate::artifact::testing::{archive, manifest};

    #[test]
    fn test_install_and_query() {
        let registry = InMemoryRegistry::new();
        let bytes = archive(Some(&manifest("com.acme.x", "1.0.0", Some(10))));

        let handle = registry.install("com.acme.x:1.0.0", &bytes).unwrap();

        let found = registry.query_by_symbolic_name("com.acme.x");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].handle, handle);
        assert_eq!(found[0].version, Version::new(1, 0, 0));
        assert_eq!(found[0].fingerprint, Some(10));
        assert_eq!(registry.find_by_location("com.acme.x:1.0.0"), Some(handle));
        assert_eq!(registry.state_of(handle), Some(ModuleState::Installed));
    }

    #[test]
    fn test_install_same_location_returns_existing() {
        let registry = InMemoryRegistry::new();
        let bytes = archive(Some(&manifest("com.acme.x", "1.0.0", None)));

        let first = registry.install("loc", &bytes).unwrap();
        let second = registry.install("loc", &bytes).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.modules().len(), 1);
    }

    #[test]
    fn test_install_rejects_plain_archive() {
        let registry = InMemoryRegistry::new();

        assert!(matches!(
            registry.install("/d/lib.jar", &archive(None)),
            Err(RegistryError::Install { .. })
        ));
    }

    #[test]
    fn test_wrap_makes_plain_archive_installable() {
        let registry = InMemoryRegistry::new();

        let wrapped = registry.wrap(&archive(None), "/d/lib.jar").unwrap();
        let handle = registry.install("/d/lib.jar", &wrapped).unwrap();

        assert_eq!(registry.query_by_symbolic_name("/d/lib.jar")[0].handle, handle);
    }

    #[test]
    fn test_update_replaces_version_and_stops_module() {
        let registry = InMemoryRegistry::new();
        let handle = registry
            .install("loc", &archive(Some(&manifest("com.acme.x", "1.0.0.SNAPSHOT", Some(1)))))
            .unwrap();
        registry.start(handle).unwrap();

        registry
            .update(handle, &archive(Some(&manifest("com.acme.x", "1.0.0.SNAPSHOT", Some(2)))))
            .unwrap();

        assert_eq!(registry.query_by_symbolic_name("com.acme.x")[0].fingerprint, Some(2));
        assert_eq!(registry.state_of(handle), Some(ModuleState::Installed));
    }

    #[test]
    fn test_start_failures_and_halt() {
        let registry = InMemoryRegistry::new();
        registry.fail_starts_of("com.acme.broken");
        let broken = registry
            .install("b", &archive(Some(&manifest("com.acme.broken", "1.0.0", None))))
            .unwrap();
        let good = registry
            .install("g", &archive(Some(&manifest("com.acme.good", "1.0.0", None))))
            .unwrap();

        assert!(registry.start(broken).is_err());
        registry.start(good).unwrap();
        assert_eq!(registry.state_of(good), Some(ModuleState::Active));

        registry.stop_everything().unwrap();
        assert!(registry.is_halted());
        assert_eq!(registry.state_of(good), Some(ModuleState::Installed));
        assert!(registry.start(good).is_err());
        assert_eq!(registry.operations().last(), Some(&RegistryOp::StopEverything));
    }
}
