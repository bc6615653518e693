//! Repo-State: repository definitions for AutoProx
//!
//! This crate holds the data model shared by every AutoProx layer and the
//! seam to the store data manager that owns persisted repository definitions.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: identity of stores, their definitions, and the persist contract.
//!
//! ## Key Components
//!
//! - `StoreKey`: Immutable `(package_type, store_type, name)` handle
//! - `ArtifactStore`: Remote, hosted and group definitions
//! - `StoreDataManager`: Async lookup/persist contract
//! - `MemoryStoreDataManager`: In-memory implementation (see `fakes`)

mod error;
pub mod fakes;
pub mod model;
pub mod storage_traits;

pub use error::StoreError;
pub use model::{
    ArtifactStore, Group, HostedRepository, RemoteRepository, StoreKey, StoreType,
    METADATA_ORIGIN, PKG_TYPE_GENERIC_HTTP, PKG_TYPE_MAVEN, PKG_TYPE_NPM,
};
pub use storage_traits::{
    flatten_group, ChangeSummary, EventMetadata, StoreDataManager, StoreResult, EVENT_ORIGIN,
};
