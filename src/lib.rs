pub mod logging;

pub mod artifact;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod registry;
pub mod watcher;

pub use artifact::{Artifact, ArtifactDescriptor, ArtifactError, Version};
pub use config::Settings;
pub use deploy::{Action, Agent, AgentStatus, DecisionEngine, Deployer, SingletonPolicy};
pub use registry::{InMemoryRegistry, InstalledModule, ModuleHandle, ModuleRegistry, RegistryError};
pub use watcher::{ChangeListener, Delivery, RecursiveWatcher, WatchError};
