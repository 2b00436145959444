//! Inspect command: show what an artifact says about itself.

use std::path::Path;

use anyhow::{Context, Result};

use crate::artifact::Artifact;

/// Print the descriptor and registry location of the artifact at `path`.
pub fn run_inspect(path: &Path) -> Result<()> {
    let artifact =
        Artifact::load(path).with_context(|| format!("reading {}", path.display()))?;
    let descriptor = &artifact.descriptor;

    println!("Artifact:      {}", path.display());
    match &descriptor.symbolic_name {
        Some(name) => println!("Symbolic name: {name}"),
        None => println!("Symbolic name: (none, will be wrapped)"),
    }
    match &descriptor.version {
        Some(version) => println!("Version:       {version}"),
        None => println!("Version:       (none, treated as {})", descriptor.effective_version()),
    }
    if descriptor.effective_version().is_snapshot() {
        println!("Snapshot:      yes");
    }
    match descriptor.fingerprint {
        Some(fingerprint) => println!("Fingerprint:   {fingerprint}"),
        None => println!("Fingerprint:   (none)"),
    }
    println!("Singleton:     {}", descriptor.singleton);
    println!("Location:      {}", artifact.location_key());
    Ok(())
}
