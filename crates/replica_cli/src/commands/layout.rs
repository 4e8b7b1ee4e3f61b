//! Layout command implementation.

use replica_config::{SessionAuthority, StoreLayout, SyncConfiguration};
use std::path::Path;
use std::sync::Arc;

/// Derives the local layout of a replica.
pub fn layout(
    identity: &str,
    locator: &str,
    root: &Path,
) -> Result<StoreLayout, Box<dyn std::error::Error>> {
    let config = SyncConfiguration::new(Arc::new(SessionAuthority::new(identity)), locator)?;
    Ok(config.layout(root))
}

/// Runs the layout command.
pub fn run(identity: &str, locator: &str, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let layout = layout(identity, locator, root)?;

    println!("Store:      {}", layout.store_file().display());
    println!("Lock:       {}", layout.lock_file().display());
    println!("Management: {}", layout.management_dir().display());

    Ok(())
}
