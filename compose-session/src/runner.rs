use std::{
    ffi::OsStr,
    path::Path,
    process::{Output, Stdio},
};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::{command::ComposeInvocation, errors::ComposeSessionError};

/// Captured output of a command that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Build the child command for an invocation without spawning it.
pub(crate) fn build_command<I, S>(
    program: &OsStr,
    program_args: I,
    invocation: &ComposeInvocation,
    working_dir: &Path,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(program_args)
        .args(invocation.args())
        .current_dir(working_dir)
        .stdin(Stdio::null());
    command
}

/// Run a compose command to completion, capturing both output streams.
///
/// No timeout is applied; wrap the future if a bound is needed.
pub(crate) async fn run_to_completion(
    mut command: Command,
    invocation: &ComposeInvocation,
) -> Result<CommandOutput, ComposeSessionError> {
    debug!(command = %invocation, "running compose command");

    let output = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ComposeSessionError::Spawn {
            command: invocation.description().to_owned(),
            source,
        })?;

    handle_compose_output(output, invocation)
}

fn handle_compose_output(
    output: Output,
    invocation: &ComposeInvocation,
) -> Result<CommandOutput, ComposeSessionError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        debug!(command = %invocation, "compose command finished");
        return Ok(CommandOutput { stdout, stderr });
    }

    warn!(command = %invocation, status = %output.status, "compose command failed");
    Err(ComposeSessionError::CommandFailed {
        command: invocation.description().to_owned(),
        status: output.status,
        stdout,
        stderr,
    })
}
