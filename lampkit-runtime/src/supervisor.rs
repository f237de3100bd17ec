//! Supervisor handoff.
//!
//! Installs the static process list and asks the supervisor (pm2 by default)
//! to start it, save it and register itself for boot. Any failing step ends
//! the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use lampkit_core::config::SupervisorConfig;
use lampkit_setup::{CommandRunner, CommandSpec};

use crate::error::{supervisor_io, SupervisorError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SupervisorOutcome {
    /// Process list submitted, saved and registered for boot.
    Applied { config_path: PathBuf },
    Skipped { reason: String },
}

/// The three supervisor invocations, in order.
pub fn handoff_commands(program: &str, config_path: &Path) -> Vec<(&'static str, CommandSpec)> {
    vec![
        (
            "start",
            CommandSpec::new(program)
                .arg("start")
                .arg(config_path.display().to_string()),
        ),
        ("save", CommandSpec::new(program).arg("save")),
        ("startup", CommandSpec::new(program).arg("startup")),
    ]
}

/// Copy the static process list into place, submit it to the supervisor,
/// persist the process list and register the supervisor for boot.
///
/// Linear and fail-fast: the first failing step ends the handoff.
pub fn apply_and_persist(
    runner: &dyn CommandRunner,
    config: &SupervisorConfig,
    timeout: Option<Duration>,
) -> Result<SupervisorOutcome, SupervisorError> {
    let Some(source) = config.source_config.as_deref() else {
        return Ok(SupervisorOutcome::Skipped {
            reason: "no supervisor config configured".to_string(),
        });
    };
    if !source.is_file() {
        return Err(SupervisorError::MissingSourceConfig {
            path: source.to_path_buf(),
        });
    }

    let installed = &config.install_path;
    if let Some(parent) = installed.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| supervisor_io(parent, e))?;
        }
    }
    if source != installed.as_path() {
        fs::copy(source, installed).map_err(|e| supervisor_io(installed, e))?;
    }
    tracing::info!(path = %installed.display(), "supervisor config installed");

    for (step, spec) in handoff_commands(&config.program, installed) {
        let spec = spec.timeout(timeout);
        tracing::info!(stage = "supervisor", step, command = %spec.display(), "running");
        runner
            .run(&spec)
            .map_err(|source| SupervisorError::Command { step, source })?;
    }

    Ok(SupervisorOutcome::Applied {
        config_path: installed.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lampkit_setup::{CommandError, CommandOutput};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl CommandRunner for Scripted {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            self.calls.lock().unwrap().push(spec.display());
            if self.fail_on == spec.args.first().map(String::as_str) {
                return Err(CommandError::Failed {
                    command: spec.display(),
                    code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            Ok(CommandOutput::default())
        }

        fn is_available(&self, _program: &str) -> bool {
            true
        }
    }

    fn config(tmp: &TempDir) -> SupervisorConfig {
        let source = tmp.path().join("ecosystem.config.js");
        fs::write(&source, "module.exports = { apps: [] };\n").expect("source");
        SupervisorConfig {
            program: "pm2".to_string(),
            source_config: Some(source),
            install_path: tmp.path().join("etc/lampkit/ecosystem.config.js"),
        }
    }

    #[test]
    fn skipped_without_source_config() {
        let runner = Scripted::default();
        let outcome =
            apply_and_persist(&runner, &SupervisorConfig::default(), None).expect("skip");
        assert!(matches!(outcome, SupervisorOutcome::Skipped { .. }));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn copies_then_starts_saves_and_registers() {
        let tmp = TempDir::new().expect("tmp");
        let cfg = config(&tmp);
        let runner = Scripted::default();

        let outcome = apply_and_persist(&runner, &cfg, None).expect("apply");
        assert_eq!(
            outcome,
            SupervisorOutcome::Applied {
                config_path: cfg.install_path.clone()
            }
        );
        assert!(cfg.install_path.is_file());
        let installed = cfg.install_path.display().to_string();
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec![
                format!("pm2 start {installed}"),
                "pm2 save".to_string(),
                "pm2 startup".to_string(),
            ]
        );
    }

    #[test]
    fn first_failure_stops_the_handoff() {
        let tmp = TempDir::new().expect("tmp");
        let runner = Scripted {
            fail_on: Some("save"),
            ..Scripted::default()
        };
        let err = apply_and_persist(&runner, &config(&tmp), None).unwrap_err();
        assert!(matches!(err, SupervisorError::Command { step: "save", .. }));
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn missing_source_config_is_an_error() {
        let tmp = TempDir::new().expect("tmp");
        let cfg = SupervisorConfig {
            source_config: Some(tmp.path().join("absent.js")),
            ..SupervisorConfig::default()
        };
        let err = apply_and_persist(&Scripted::default(), &cfg, None).unwrap_err();
        assert!(matches!(err, SupervisorError::MissingSourceConfig { .. }));
    }
}
