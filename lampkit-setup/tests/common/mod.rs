//! Scripted command runner shared by the setup integration tests.
//!
//! `git clone` creates the target directory and seeds it with the files
//! registered for that repo; composer and the Node tools create their
//! dependency directories. Any (repo, program) pair registered with
//! `fail`, or (repo, program, first argument) triple registered with
//! `fail_step`, exits non-zero instead.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lampkit_setup::{CommandError, CommandOutput, CommandRunner, CommandSpec};

#[derive(Default)]
pub struct ScriptedRunner {
    seeds: Mutex<HashMap<String, Vec<(String, String)>>>,
    failures: Mutex<HashSet<(String, String)>>,
    step_failures: Mutex<HashSet<(String, String, String)>>,
    timeouts: Mutex<HashSet<(String, String)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `git clone` writes into `repo`'s checkout.
    pub fn seed(&self, repo: &str, files: &[(&str, &str)]) {
        self.seeds.lock().unwrap().insert(
            repo.to_string(),
            files
                .iter()
                .map(|(f, c)| (f.to_string(), c.to_string()))
                .collect(),
        );
    }

    pub fn fail(&self, repo: &str, program: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert((repo.to_string(), program.to_string()));
    }

    /// Fail only the invocations of `program` whose first argument is `step`.
    pub fn fail_step(&self, repo: &str, program: &str, step: &str) {
        self.step_failures.lock().unwrap().insert((
            repo.to_string(),
            program.to_string(),
            step.to_string(),
        ));
    }

    /// Forget every registered failure.
    pub fn recover(&self) {
        self.failures.lock().unwrap().clear();
        self.step_failures.lock().unwrap().clear();
    }

    pub fn time_out(&self, repo: &str, program: &str) {
        self.timeouts
            .lock()
            .unwrap()
            .insert((repo.to_string(), program.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(program))
            .count()
    }
}

fn repo_of(spec: &CommandSpec) -> String {
    let path: PathBuf = if spec.program == "git" {
        PathBuf::from(spec.args.last().cloned().unwrap_or_default())
    } else {
        spec.cwd.clone().unwrap_or_default()
    };
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn mkdir(path: &Path) {
    std::fs::create_dir_all(path).expect("scripted mkdir");
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.display());
        let repo = repo_of(spec);
        let key = (repo.clone(), spec.program.clone());

        if self.timeouts.lock().unwrap().contains(&key) {
            return Err(CommandError::TimedOut {
                command: spec.display(),
                after: std::time::Duration::from_secs(1),
            });
        }

        let step = (
            repo.clone(),
            spec.program.clone(),
            spec.args.first().cloned().unwrap_or_default(),
        );
        let fails = self.failures.lock().unwrap().contains(&key)
            || self.step_failures.lock().unwrap().contains(&step);
        if fails {
            if spec.program == "git" {
                // Simulate git leaving a partial checkout and echoing the URL.
                mkdir(Path::new(spec.args.last().expect("target")));
            }
            let url = spec.args.get(1).cloned().unwrap_or_default();
            return Err(CommandError::Failed {
                command: spec.display(),
                code: Some(1),
                stderr: format!("fatal: scripted failure for {url}"),
            });
        }

        match spec.program.as_str() {
            "git" => {
                let target = PathBuf::from(spec.args.last().expect("target"));
                mkdir(&target);
                if let Some(files) = self.seeds.lock().unwrap().get(&repo) {
                    for (name, content) in files {
                        std::fs::write(target.join(name), content).expect("seed file");
                    }
                }
            }
            "composer" => mkdir(&spec.cwd.clone().expect("cwd").join("vendor")),
            "npm" | "yarn" | "pnpm" => {
                let cwd = spec.cwd.clone().expect("cwd");
                if spec.args.first().map(String::as_str) == Some("run") {
                    mkdir(&cwd.join("dist"));
                } else {
                    mkdir(&cwd.join("node_modules"));
                }
            }
            _ => {}
        }
        Ok(CommandOutput::default())
    }

    fn is_available(&self, _program: &str) -> bool {
        true
    }
}
