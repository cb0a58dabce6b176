//! In-memory registration store.
//!
//! The store owns the active set. Every mutation goes through it and
//! triggers the matching patch fanout once the write lock is released.
//!
//! Registrations are keyed by URL, so the set can never hold two entries
//! for the same address: re-adding a URL replaces the previous entry.
//! Snapshots are taken under the read lock and come back in registration
//! order.

use crate::notifier::PatchNotifier;
use parking_lot::RwLock;
use roster_common::{Error, Patch, Registration, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

struct Slot {
    seq: u64,
    registration: Registration,
}

#[derive(Default)]
struct ActiveSet {
    next_seq: u64,
    by_url: HashMap<String, Slot>,
}

impl ActiveSet {
    fn insert(&mut self, registration: Registration) -> Option<Registration> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_url
            .insert(registration.url.clone(), Slot { seq, registration })
            .map(|slot| slot.registration)
    }

    fn snapshot(&self) -> Vec<Registration> {
        let mut slots: Vec<&Slot> = self.by_url.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.registration.clone()).collect()
    }
}

/// Thread-safe set of active registrations.
pub struct Registry {
    active: RwLock<ActiveSet>,
    notifier: PatchNotifier,
}

impl Registry {
    pub fn new(notifier: PatchNotifier) -> Self {
        Self {
            active: RwLock::new(ActiveSet::default()),
            notifier,
        }
    }

    /// Adds a registration and announces it.
    ///
    /// The new registrant first receives a sync patch listing every active
    /// provider of the names it requires; that delivery is awaited, but a
    /// failure is only logged. Existing dependents then get an addition
    /// patch in the background.
    pub async fn add(&self, registration: Registration) -> Result<()> {
        validate(&registration)?;

        let (replaced, snapshot) = {
            let mut active = self.active.write();
            let replaced = active.insert(registration.clone());
            (replaced, active.snapshot())
        };

        match &replaced {
            Some(previous) => info!(
                "Replaced service {} at {} (was {})",
                registration.name, registration.url, previous.name
            ),
            None => info!("Added service {} at {}", registration.name, registration.url),
        }

        self.announce(&registration, replaced, &snapshot).await;
        Ok(())
    }

    /// Puts a registration back only if nothing else holds its URL.
    ///
    /// Returns `false` without touching the store when the URL was
    /// registered again in the meantime; the newer registration wins.
    /// Otherwise behaves like [`Registry::add`].
    pub async fn restore(&self, registration: Registration) -> Result<bool> {
        validate(&registration)?;

        let snapshot = {
            let mut active = self.active.write();
            if active.by_url.contains_key(&registration.url) {
                return Ok(false);
            }
            active.insert(registration.clone());
            active.snapshot()
        };

        info!("Restored service {} at {}", registration.name, registration.url);

        self.announce(&registration, None, &snapshot).await;
        Ok(true)
    }

    async fn announce(
        &self,
        registration: &Registration,
        replaced: Option<Registration>,
        snapshot: &[Registration],
    ) {
        if !registration.required_services.is_empty() {
            let sync = sync_patch(registration, snapshot);
            debug!(
                "Syncing {} with {} providers",
                registration.url,
                sync.additions.len()
            );
            if let Err(e) = self.notifier.sync(registration, &sync).await {
                warn!("Failed to sync required services to {}: {}", registration.url, e);
            }
        }

        if let Some(previous) = replaced.filter(|p| p.name != registration.name) {
            self.notifier
                .fanout(snapshot, &Patch::removal(previous.entry()), &registration.url);
        }
        self.notifier
            .fanout(snapshot, &Patch::addition(registration.entry()), &registration.url);
    }

    /// Removes the registration at `url` and announces its departure.
    pub fn remove(&self, url: &str) -> Result<Registration> {
        let (removed, snapshot) = {
            let mut active = self.active.write();
            let slot = active
                .by_url
                .remove(url)
                .ok_or_else(|| Error::service_not_found(url))?;
            (slot.registration, active.snapshot())
        };

        info!("Removed service {} at {}", removed.name, removed.url);

        self.notifier
            .fanout(&snapshot, &Patch::removal(removed.entry()), &removed.url);

        Ok(removed)
    }

    /// Point-in-time copy of the active set, oldest registration first.
    pub fn snapshot(&self) -> Vec<Registration> {
        self.active.read().snapshot()
    }

    /// Looks up the registration at `url`.
    pub fn get(&self, url: &str) -> Option<Registration> {
        self.active
            .read()
            .by_url
            .get(url)
            .map(|slot| slot.registration.clone())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.active.read().by_url.contains_key(url)
    }

    pub fn count(&self) -> usize {
        self.active.read().by_url.len()
    }
}

fn validate(registration: &Registration) -> Result<()> {
    if registration.name.is_empty() {
        return Err(Error::validation("service name must not be empty"));
    }
    if registration.url.trim().is_empty() {
        return Err(Error::validation("service url must not be empty"));
    }
    Ok(())
}

/// Every active provider of a name `registrant` requires, other than itself.
fn sync_patch(registrant: &Registration, active: &[Registration]) -> Patch {
    Patch {
        additions: active
            .iter()
            .filter(|r| r.url != registrant.url && registrant.requires(&r.name))
            .map(Registration::entry)
            .collect(),
        removals: Default::default(),
    }
}
