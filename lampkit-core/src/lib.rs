//! lampkit core library: data model, manifest loading, configuration.
//!
//! - [`types`]: repository descriptors and per-repository outcomes
//! - [`error`]: [`ManifestError`], [`ConfigError`], [`DescriptorError`]
//! - [`manifest`]: load the repository manifest
//! - [`config`]: provisioning configuration and permission policy
//! - [`layout`]: clone-path and public-path derivation

pub mod config;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod types;

pub use config::{FileMode, PermissionPolicy, ProvisionConfig};
pub use error::{ConfigError, DescriptorError, ManifestError};
pub use types::{
    FailureReason, PublishOutcome, RepositoryDescriptor, RepositorySetupResult, SetupStatus,
    SkipReason,
};
