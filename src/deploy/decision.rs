//! What to do with one candidate artifact.
//!
//! [`DecisionEngine::decide`] is a pure function of the candidate's
//! descriptor, the registry's view of modules with the same symbolic name,
//! the configured policy and whether the caller allows updates. It never
//! touches the registry.

use crate::artifact::{ArtifactDescriptor, Version};
use crate::registry::InstalledModule;

/// Outcome of a deployment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the registry alone.
    None,
    Install,
    Update,
    /// Wrap a plain archive, then install it.
    WrapAndInstall,
    /// Stop the whole hosting runtime.
    StopAll,
}

/// Symbolic-name prefixes whose modules must exist at exactly one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingletonPolicy {
    prefixes: Vec<String>,
}

impl SingletonPolicy {
    /// Build from configured prefixes, dropping empty entries.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether `name` starts with any configured prefix.
    pub fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Decides install/update/ignore/wrap/stop for candidate artifacts.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    singletons: SingletonPolicy,
    update_only_snapshots: bool,
}

impl DecisionEngine {
    pub fn new(singletons: SingletonPolicy, update_only_snapshots: bool) -> Self {
        Self {
            singletons,
            update_only_snapshots,
        }
    }

    pub fn singletons(&self) -> &SingletonPolicy {
        &self.singletons
    }

    /// Decide the action for `candidate`.
    ///
    /// `installed` holds the registry's modules sharing the candidate's
    /// symbolic name, oldest first. `update_allowed` is set on the
    /// re-scan-after-modify path only.
    pub fn decide(
        &self,
        candidate: &ArtifactDescriptor,
        installed: &[InstalledModule],
        update_allowed: bool,
    ) -> Action {
        let Some(name) = candidate.symbolic_name.as_deref() else {
            return Action::WrapAndInstall;
        };

        // Only the first installed module is consulted, in both branches.
        let Some(existing) = installed.first() else {
            return Action::Install;
        };

        let version = candidate.effective_version();

        if self.singletons.matches(name) {
            self.decide_singleton(name, &version, candidate.fingerprint, existing)
        } else if version == existing.version {
            let updatable = version.is_snapshot() || !self.update_only_snapshots;
            if updatable && update_allowed {
                tracing::warn!(
                    "[deploy] module {name} {version} already installed, trying to update"
                );
                Action::Update
            } else {
                crate::debug_event!("deploy", "already installed", "{name} {version}");
                Action::None
            }
        } else {
            Action::Install
        }
    }

    fn decide_singleton(
        &self,
        name: &str,
        version: &Version,
        fingerprint: Option<u64>,
        existing: &InstalledModule,
    ) -> Action {
        if *version != existing.version {
            tracing::error!("[deploy] {}", "#".repeat(65));
            tracing::error!(
                "[deploy] /!\\ singleton module {name} is present with two versions: {version} and {}",
                existing.version
            );
            tracing::error!("[deploy] stopping the runtime!");
            tracing::error!("[deploy] {}", "#".repeat(65));
            return Action::StopAll;
        }

        crate::debug_event!("deploy", "already installed", "{name} {version}");

        let (Some(new), Some(old)) = (fingerprint, existing.fingerprint) else {
            return Action::None;
        };

        if new != old {
            if !version.is_snapshot() {
                tracing::error!(
                    "[deploy] different contents for module {name} {version} that is not a snapshot"
                );
                return Action::None;
            }
            tracing::warn!(
                "[deploy] different contents for module {name} {version}, trying to update to newest"
            );
        }

        if new > old { Action::Update } else { Action::None }
    }
}
