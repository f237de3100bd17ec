//! # lampkit-setup
//!
//! Parallel per-repository setup: fetch, install, join.
//!
//! Call [`Coordinator::run`] with the manifest's descriptors; it spawns one
//! unit of work per descriptor and returns one [`RepositorySetupResult`] per
//! descriptor, in manifest order, after every unit has finished.
//!
//! Every external process goes through a [`CommandRunner`], which is the seam
//! tests use to script git, composer and the Node package managers.
//!
//! [`RepositorySetupResult`]: lampkit_core::RepositorySetupResult

pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod install;
pub mod runner;

pub use coordinator::{run_unit, Coordinator, SetupContext};
pub use error::{CommandError, FetchError, InstallError};
pub use fetch::{Credential, FetchOutcome, Fetcher};
pub use install::{InstallReport, InstallStage, Installer, StageStatus};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
