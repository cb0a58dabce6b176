//! Local view of the providers a service depends on.

use parking_lot::RwLock;
use roster_common::{Error, Patch, Result, ServiceName};
use std::collections::HashMap;
use tracing::debug;

/// Provider URLs known to one service, keyed by the service name they provide.
///
/// Filled entirely from the patches the registry pushes: the sync patch on
/// registration, then incremental additions and removals.
#[derive(Debug, Default)]
pub struct Providers {
    services: RwLock<HashMap<ServiceName, Vec<String>>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a patch. Removals are applied before additions so a patch
    /// that replaces an entry leaves it present.
    pub fn apply(&self, patch: &Patch) {
        let mut services = self.services.write();

        for entry in &patch.removals {
            if let Some(urls) = services.get_mut(&entry.name) {
                urls.retain(|url| url != &entry.url);
                if urls.is_empty() {
                    services.remove(&entry.name);
                }
            }
            debug!(service = %entry.name, url = %entry.url, "Provider removed");
        }

        for entry in &patch.additions {
            let urls = services.entry(entry.name.clone()).or_default();
            if !urls.contains(&entry.url) {
                urls.push(entry.url.clone());
            }
            debug!(service = %entry.name, url = %entry.url, "Provider added");
        }
    }

    /// First known URL providing `name`.
    pub fn get(&self, name: &ServiceName) -> Result<String> {
        self.services
            .read()
            .get(name)
            .and_then(|urls| urls.first().cloned())
            .ok_or_else(|| Error::provider_not_found(name.as_str()))
    }

    pub fn all(&self, name: &ServiceName) -> Vec<String> {
        self.services.read().get(name).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}
