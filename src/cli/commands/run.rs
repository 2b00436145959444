//! Run command: deploy the configured roots and keep watching.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Settings;
use crate::deploy::Agent;
use crate::registry::{InMemoryRegistry, ModuleRegistry};

/// Exit status after the runtime was stopped by a singleton conflict.
pub const EXIT_HALTED: u8 = 2;

/// Run the agent until Ctrl-C or a runtime halt.
pub async fn run_agent(settings: &Settings, no_watch: bool) -> Result<ExitCode> {
    let registry = Arc::new(InMemoryRegistry::new());
    let watch = settings.watch_application_dirs && !no_watch;

    let mut agent = Agent::start(settings, registry.clone() as Arc<dyn ModuleRegistry>, watch);

    let status = if agent.is_halted() {
        ExitCode::from(EXIT_HALTED)
    } else if agent.watched_roots().is_empty() {
        crate::log_event!("run", "nothing to watch, exiting");
        ExitCode::SUCCESS
    } else {
        let halt = agent.halt_signal();
        let halted = tokio::task::spawn_blocking(move || halt.recv().is_ok());

        tokio::select! {
            result = halted => {
                if matches!(result, Ok(true)) {
                    ExitCode::from(EXIT_HALTED)
                } else {
                    ExitCode::SUCCESS
                }
            }
            _ = tokio::signal::ctrl_c() => {
                crate::log_event!("run", "interrupted, shutting down");
                ExitCode::SUCCESS
            }
        }
    };

    agent.shutdown();
    // Dropping the agent closes the halt channel and frees the waiting task.
    drop(agent);

    for module in registry.modules() {
        let state = registry
            .state_of(module.handle)
            .map(|s| format!("{s:?}"))
            .unwrap_or_default();
        crate::debug_event!(
            "run",
            "module",
            "{} {} {} [{state}]",
            module.handle,
            module.symbolic_name,
            module.version
        );
    }
    crate::log_event!(
        "run",
        "finished",
        "{} modules, runtime {}",
        registry.modules().len(),
        if registry.is_halted() { "stopped" } else { "up" }
    );

    Ok(status)
}
