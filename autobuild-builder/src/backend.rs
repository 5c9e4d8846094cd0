//! Build backend seam and the external-process implementation.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use serde::Serialize;

use autobuild_core::{BuildDescriptor, CommandTemplate, Settings};

use crate::error::BuildError;

/// The two sequential build steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStep {
    Restore,
    Build,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::Restore => write!(f, "restore"),
            BuildStep::Build => write!(f, "build"),
        }
    }
}

/// Exit of a finished step. `code` is `None` when killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepExit {
    pub code: Option<i32>,
}

impl StepExit {
    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

/// Package restore + build against a [`BuildDescriptor`].
pub trait BuildBackend {
    fn restore(&self, descriptor: &BuildDescriptor) -> Result<StepExit, BuildError>;
    fn build(&self, descriptor: &BuildDescriptor) -> Result<StepExit, BuildError>;
}

/// [`BuildBackend`] that runs configured command lines as child processes.
///
/// Child stdout is forwarded to the log at `info`, stderr at `warn`, one
/// line at a time, while the caller blocks on the exit status.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    restore: CommandTemplate,
    build: CommandTemplate,
}

impl ProcessBackend {
    pub fn new(restore: CommandTemplate, build: CommandTemplate) -> Self {
        Self { restore, build }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.restore.clone(), settings.build.clone())
    }

    fn run_step(
        &self,
        step: BuildStep,
        template: &CommandTemplate,
        descriptor: &BuildDescriptor,
    ) -> Result<StepExit, BuildError> {
        let args = template.expand(&descriptor.solution, descriptor.configuration);
        tracing::info!(step = %step, program = %template.program, args = ?args, "starting");

        let mut child = Command::new(&template.program)
            .args(&args)
            .current_dir(&descriptor.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BuildError::Spawn {
                step,
                program: template.program.clone(),
                source,
            })?;

        let readers: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|out| forward_lines(step, false, out)),
            child.stderr.take().map(|err| forward_lines(step, true, err)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let status = child
            .wait()
            .map_err(|source| BuildError::Wait { step, source })?;
        for reader in readers {
            join_reader(step, reader);
        }

        tracing::info!(step = %step, status = %status, "finished");
        Ok(StepExit {
            code: status.code(),
        })
    }
}

impl BuildBackend for ProcessBackend {
    fn restore(&self, descriptor: &BuildDescriptor) -> Result<StepExit, BuildError> {
        self.run_step(BuildStep::Restore, &self.restore, descriptor)
    }

    fn build(&self, descriptor: &BuildDescriptor) -> Result<StepExit, BuildError> {
        self.run_step(BuildStep::Build, &self.build, descriptor)
    }
}

/// Drain `reader` on its own thread so a chatty child never blocks on a
/// full pipe. Bytes are decoded lossily; build tools do not promise UTF-8.
fn forward_lines<R>(step: BuildStep, is_stderr: bool, reader: R) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if is_stderr {
                        tracing::warn!(step = %step, "{line}");
                    } else {
                        tracing::info!(step = %step, "{line}");
                    }
                }
            }
        }
    })
}

/// Wait for a forwarding thread. A panicked reader means some child output
/// never reached the log; returns `false` in that case.
fn join_reader(step: BuildStep, reader: JoinHandle<()>) -> bool {
    if reader.join().is_ok() {
        return true;
    }
    tracing::warn!(step = %step, "output reader panicked; build output may be incomplete");
    false
}
