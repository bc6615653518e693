//! Store identity and repository definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const PKG_TYPE_MAVEN: &str = "maven";
pub const PKG_TYPE_NPM: &str = "npm";
pub const PKG_TYPE_GENERIC_HTTP: &str = "generic-http";

/// Store metadata key recording which subsystem created a store.
pub const METADATA_ORIGIN: &str = "origin";

// ---------------------------------------------------------------------------
// StoreType / StoreKey
// ---------------------------------------------------------------------------

/// Kind of repository a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Group,
    Hosted,
    Remote,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Group => "group",
            StoreType::Hosted => "hosted",
            StoreType::Remote => "remote",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "group" => Ok(StoreType::Group),
            "hosted" => Ok(StoreType::Hosted),
            "remote" => Ok(StoreType::Remote),
            other => Err(StoreError::InvalidKey {
                value: s.to_string(),
                reason: format!("unknown store type '{}'", other),
            }),
        }
    }
}

/// Immutable identifier of a repository: `(package_type, store_type, name)`.
///
/// Fields are private so a key's store type can never change once built.
/// Equality, hashing and ordering all follow the triple in field order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey {
    package_type: String,
    store_type: StoreType,
    name: String,
}

impl StoreKey {
    pub fn new(
        package_type: impl Into<String>,
        store_type: StoreType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            package_type: package_type.into(),
            store_type,
            name: name.into(),
        }
    }

    /// Shorthand for a key in the `maven` package type.
    pub fn maven(store_type: StoreType, name: impl Into<String>) -> Self {
        Self::new(PKG_TYPE_MAVEN, store_type, name)
    }

    pub fn package_type(&self) -> &str {
        &self.package_type
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse `package:type:name` or `type:name`, filling in `default_package`
    /// for the short form.
    pub fn parse_with_default(value: &str, default_package: &str) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = value.split(':').collect();
        let (package_type, store_type, name) = match parts.as_slice() {
            [store_type, name] => (default_package, *store_type, *name),
            [package_type, store_type, name] => (*package_type, *store_type, *name),
            _ => return Err(invalid("expected 'type:name' or 'package:type:name'")),
        };

        if package_type.trim().is_empty() {
            return Err(invalid("package type is empty"));
        }
        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }

        Ok(Self::new(
            package_type.trim(),
            store_type.parse()?,
            name.trim(),
        ))
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

impl FromStr for StoreKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default(s, PKG_TYPE_MAVEN)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// Repository definitions
// ---------------------------------------------------------------------------

/// Proxy of a remote package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub key: StoreKey,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub cache_timeout_seconds: u32,
    #[serde(default)]
    pub nfc_timeout_seconds: u32,
    #[serde(default)]
    pub passthrough: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RemoteRepository {
    pub fn new(package_type: &str, name: &str, url: impl Into<String>) -> Self {
        Self {
            key: StoreKey::new(package_type, StoreType::Remote, name),
            url: url.into(),
            description: None,
            timeout_seconds: 0,
            cache_timeout_seconds: 0,
            nfc_timeout_seconds: 0,
            passthrough: false,
            user: None,
            password: None,
            disabled: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_timeout_seconds(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_string());
        self.password = Some(password.to_string());
        self
    }
}

/// Locally-hosted store accepting deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedRepository {
    pub key: StoreKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub allow_releases: bool,
    #[serde(default)]
    pub allow_snapshots: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl HostedRepository {
    pub fn new(package_type: &str, name: &str) -> Self {
        Self {
            key: StoreKey::new(package_type, StoreType::Hosted, name),
            description: None,
            allow_releases: true,
            allow_snapshots: false,
            readonly: false,
            disabled: false,
            metadata: BTreeMap::new(),
        }
    }
}

/// Ordered aggregation of other stores.
///
/// Constituents may reference any store type, including other groups, and
/// may dangle; consumers must tolerate members that do not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub key: StoreKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub constituents: Vec<StoreKey>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Group {
    pub fn new(package_type: &str, name: &str, constituents: Vec<StoreKey>) -> Self {
        Self {
            key: StoreKey::new(package_type, StoreType::Group, name),
            description: None,
            constituents,
            disabled: false,
            metadata: BTreeMap::new(),
        }
    }
}

/// A persisted repository definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArtifactStore {
    Remote(RemoteRepository),
    Hosted(HostedRepository),
    Group(Group),
}

impl ArtifactStore {
    pub fn key(&self) -> &StoreKey {
        match self {
            ArtifactStore::Remote(r) => &r.key,
            ArtifactStore::Hosted(h) => &h.key,
            ArtifactStore::Group(g) => &g.key,
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            ArtifactStore::Remote(r) => r.disabled,
            ArtifactStore::Hosted(h) => h.disabled,
            ArtifactStore::Group(g) => g.disabled,
        }
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        match self {
            ArtifactStore::Remote(r) => &r.metadata,
            ArtifactStore::Hosted(h) => &h.metadata,
            ArtifactStore::Group(g) => &g.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            ArtifactStore::Remote(r) => &mut r.metadata,
            ArtifactStore::Hosted(h) => &mut h.metadata,
            ArtifactStore::Group(g) => &mut g.metadata,
        }
    }

    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata().get(name).map(String::as_str)
    }

    pub fn set_metadata(&mut self, name: &str, value: impl Into<String>) {
        self.metadata_mut().insert(name.to_string(), value.into());
    }

    pub fn as_remote(&self) -> Option<&RemoteRepository> {
        match self {
            ArtifactStore::Remote(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            ArtifactStore::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Remote and hosted stores hold content; groups only aggregate.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, ArtifactStore::Group(_))
    }
}

impl From<RemoteRepository> for ArtifactStore {
    fn from(r: RemoteRepository) -> Self {
        ArtifactStore::Remote(r)
    }
}

impl From<HostedRepository> for ArtifactStore {
    fn from(h: HostedRepository) -> Self {
        ArtifactStore::Hosted(h)
    }
}

impl From<Group> for ArtifactStore {
    fn from(g: Group) -> Self {
        ArtifactStore::Group(g)
    }
}
