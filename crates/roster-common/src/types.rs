//! Core domain types used throughout roster.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Symbolic name of a kind of service, e.g. `"LogService"`.
///
/// Registrations are keyed by URL; the name is what other services declare
/// as a dependency and what patches are filtered by.
///
/// # Example
/// ```
/// use roster_common::ServiceName;
///
/// let name = ServiceName::from("Payments");
/// assert_eq!(name.as_str(), "Payments");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new ServiceName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One registered service: who it is, where it lives, what it needs.
///
/// Field names on the wire follow the registry contract (`ServiceName`,
/// `ServiceUrl`, ...); camelCase spellings are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "ServiceName", alias = "name")]
    pub name: ServiceName,

    /// Base address of the service; the registry's key for it.
    #[serde(rename = "ServiceUrl", alias = "url")]
    pub url: String,

    /// Names this service depends on. Fixed for the registration's lifetime.
    #[serde(
        rename = "RequiredService",
        alias = "requiredServices",
        default,
        deserialize_with = "null_as_default"
    )]
    pub required_services: Vec<ServiceName>,

    /// Where patches are POSTed.
    #[serde(rename = "ServiceUpdateURL", alias = "updateURL")]
    pub update_url: String,

    /// Where heartbeat probes are sent.
    #[serde(rename = "HeartBeatURL", alias = "heartbeatURL")]
    pub heartbeat_url: String,
}

impl Registration {
    /// Creates a registration using the conventional `/services` and
    /// `/heartbeat` endpoints under `url`.
    pub fn new(
        name: impl Into<ServiceName>,
        url: impl Into<String>,
        required_services: Vec<ServiceName>,
    ) -> Self {
        let url = url.into();
        let base = url.trim_end_matches('/');
        Self {
            name: name.into(),
            update_url: format!("{}/services", base),
            heartbeat_url: format!("{}/heartbeat", base),
            url,
            required_services,
        }
    }

    pub fn with_update_url(mut self, update_url: impl Into<String>) -> Self {
        self.update_url = update_url.into();
        self
    }

    pub fn with_heartbeat_url(mut self, heartbeat_url: impl Into<String>) -> Self {
        self.heartbeat_url = heartbeat_url.into();
        self
    }

    /// Whether this registration declared `name` as a dependency.
    pub fn requires(&self, name: &ServiceName) -> bool {
        self.required_services.contains(name)
    }

    /// The membership fact this registration contributes to patches.
    pub fn entry(&self) -> PatchEntry {
        PatchEntry {
            name: self.name.clone(),
            url: self.url.clone(),
        }
    }
}

/// A service appeared or disappeared at a URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatchEntry {
    #[serde(rename = "Name", alias = "name")]
    pub name: ServiceName,
    #[serde(rename = "URL", alias = "url")]
    pub url: String,
}

impl PatchEntry {
    pub fn new(name: impl Into<ServiceName>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Membership diff delivered to a dependent's update endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(
        rename = "Add",
        alias = "additions",
        default,
        deserialize_with = "null_as_default"
    )]
    pub additions: BTreeSet<PatchEntry>,

    #[serde(
        rename = "Remove",
        alias = "removals",
        default,
        deserialize_with = "null_as_default"
    )]
    pub removals: BTreeSet<PatchEntry>,
}

impl Patch {
    pub fn addition(entry: PatchEntry) -> Self {
        Self {
            additions: BTreeSet::from([entry]),
            removals: BTreeSet::new(),
        }
    }

    pub fn removal(entry: PatchEntry) -> Self {
        Self {
            additions: BTreeSet::new(),
            removals: BTreeSet::from([entry]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Keeps only the entries whose name is in `required`.
    pub fn filtered_for(&self, required: &[ServiceName]) -> Patch {
        let wanted: HashSet<&ServiceName> = required.iter().collect();
        Patch {
            additions: self
                .additions
                .iter()
                .filter(|e| wanted.contains(&e.name))
                .cloned()
                .collect(),
            removals: self
                .removals
                .iter()
                .filter(|e| wanted.contains(&e.name))
                .cloned()
                .collect(),
        }
    }
}

// Peers may send `null` for an empty list.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payments() -> Registration {
        Registration::new("Payments", "http://p:9000", vec![])
    }

    fn orders() -> Registration {
        Registration::new("Orders", "http://o:9001", vec![ServiceName::from("Payments")])
    }

    #[test]
    fn test_registration_conventional_endpoints() {
        let reg = Registration::new("Orders", "http://o:9001/", vec![]);
        assert_eq!(reg.update_url, "http://o:9001/services");
        assert_eq!(reg.heartbeat_url, "http://o:9001/heartbeat");
        assert_eq!(reg.url, "http://o:9001/");
    }

    #[test]
    fn test_registration_wire_names() {
        let json = serde_json::to_value(orders()).unwrap();
        assert_eq!(json["ServiceName"], "Orders");
        assert_eq!(json["ServiceUrl"], "http://o:9001");
        assert_eq!(json["RequiredService"][0], "Payments");
        assert_eq!(json["ServiceUpdateURL"], "http://o:9001/services");
        assert_eq!(json["HeartBeatURL"], "http://o:9001/heartbeat");
    }

    #[test]
    fn test_registration_accepts_camel_case_and_null_dependencies() {
        let reg: Registration = serde_json::from_str(
            r#"{"name":"Payments","url":"http://p:9000","requiredServices":null,
                "updateURL":"http://p:9000/services","heartbeatURL":"http://p:9000/heartbeat"}"#,
        )
        .unwrap();
        assert_eq!(reg, payments());
    }

    #[test]
    fn test_registration_requires() {
        assert!(orders().requires(&ServiceName::from("Payments")));
        assert!(!payments().requires(&ServiceName::from("Orders")));
    }

    #[test]
    fn test_patch_wire_format() {
        let patch = Patch::addition(payments().entry());
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["Add"][0]["Name"], "Payments");
        assert_eq!(json["Add"][0]["URL"], "http://p:9000");
        assert_eq!(json["Remove"].as_array().unwrap().len(), 0);

        let decoded: Patch = serde_json::from_str(r#"{"Add":null,"Remove":[{"Name":"Payments","URL":"http://p:9000"}]}"#).unwrap();
        assert_eq!(decoded, Patch::removal(payments().entry()));
    }

    #[test]
    fn test_patch_filtered_for_dependencies() {
        let mut patch = Patch::addition(PatchEntry::new("Payments", "http://p:9000"));
        patch.additions.insert(PatchEntry::new("Inventory", "http://i:9002"));
        patch.removals.insert(PatchEntry::new("Payments", "http://p:9100"));

        let filtered = patch.filtered_for(&orders().required_services);
        assert_eq!(filtered.additions.len(), 1);
        assert_eq!(filtered.removals.len(), 1);
        assert!(filtered
            .additions
            .iter()
            .chain(filtered.removals.iter())
            .all(|e| e.name.as_str() == "Payments"));

        assert!(patch.filtered_for(&[]).is_empty());
    }

    #[test]
    fn test_patch_entries_are_a_set() {
        let mut patch = Patch::addition(payments().entry());
        patch.additions.insert(payments().entry());
        assert_eq!(patch.additions.len(), 1);
        assert!(!patch.is_empty());
        assert!(Patch::default().is_empty());
    }

    #[test]
    fn test_service_name_serializes_as_plain_string() {
        let name = ServiceName::from("LogService");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"LogService\"");

        let decoded: ServiceName = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn test_service_name_empty() {
        assert!(ServiceName::from("").is_empty());
        assert!(ServiceName::from("   ").is_empty());
        assert!(!ServiceName::from("Orders").is_empty());
    }

    #[test]
    fn test_service_name_display() {
        assert_eq!(ServiceName::new("Orders").to_string(), "Orders");
    }
}
