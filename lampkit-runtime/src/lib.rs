//! Privileged, serial half of a provisioning run: publish into the web root,
//! reload the web server, hand off to the process supervisor. Also hosts the
//! end-to-end pipeline that strings both halves together.

mod error;
pub mod permissions;
pub mod publish;
mod runtime;
pub mod supervisor;
pub mod system;

pub use error::{PackageError, PublishError, RuntimeError, SupervisorError};
pub use publish::{PublishRecord, Publisher, ReloadOutcome};
pub use runtime::{
    build_runtime, init_tracing, publish_phase, run, setup_phase, start_blocking, RunOptions,
    RunSummary,
};
pub use supervisor::{apply_and_persist, SupervisorOutcome};
pub use system::{check_host_tools, ensure_package_installed, ensure_packages, ToolCheck};
