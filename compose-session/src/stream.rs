use std::{
    fmt,
    process::Stdio,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    io::{AsyncRead, AsyncReadExt as _},
    process::{Child, Command},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{command::ComposeInvocation, errors::ComposeSessionError};

const CHUNK_SIZE: usize = 8 * 1024;

/// Callback receiving one line of followed output.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Split one chunk of raw output on `'\n'`.
///
/// A chunk ending in a newline yields a trailing empty line, and a line torn
/// across two reads arrives as two pieces.
#[must_use]
pub fn split_chunk(chunk: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(chunk)
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Handle owning a followed `logs` process and its reader tasks.
///
/// Dropping the handle kills the process; [`LogSubscription::dispose`] also
/// waits for it and guarantees the callback is not invoked afterwards.
pub struct LogSubscription {
    description: String,
    child: Child,
    readers: Vec<JoinHandle<()>>,
    active: Arc<AtomicBool>,
}

impl LogSubscription {
    /// OS process id of the followed `logs` process, if still known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the `logs` process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop delivering lines, kill the process and reap it.
    pub async fn dispose(mut self) {
        self.active.store(false, Ordering::Release);

        if let Err(err) = self.child.kill().await {
            debug!(command = %self.description, %err, "logs process already gone");
        }

        for reader in self.readers.drain(..) {
            reader.abort();
            let _ = reader.await;
        }

        debug!(command = %self.description, "log subscription disposed");
    }
}

impl fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSubscription")
            .field("description", &self.description)
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

// The child itself is killed by `kill_on_drop`.
impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        for reader in &self.readers {
            reader.abort();
        }
    }
}

/// Spawn a follow-mode command and forward its output line by line.
pub(crate) fn spawn_stream(
    mut command: Command,
    invocation: &ComposeInvocation,
    on_line: LineHandler,
) -> Result<LogSubscription, ComposeSessionError> {
    debug!(command = %invocation, "following compose logs");

    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ComposeSessionError::Spawn {
            command: invocation.description().to_owned(),
            source,
        })?;

    let active = Arc::new(AtomicBool::new(true));
    let mut readers = Vec::with_capacity(2);

    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_chunks(
            stdout,
            Arc::clone(&on_line),
            Arc::clone(&active),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_chunks(
            stderr,
            Arc::clone(&on_line),
            Arc::clone(&active),
        )));
    }

    Ok(LogSubscription {
        description: invocation.to_string(),
        child,
        readers,
        active,
    })
}

async fn forward_chunks<R>(mut reader: R, on_line: LineHandler, active: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0_u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => {
                if !active.load(Ordering::Acquire) {
                    break;
                }
                for line in split_chunk(&buf[..read]) {
                    on_line(&line);
                }
            }
            Err(err) => {
                warn!(%err, "failed to read compose log stream");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_terminated_chunk_yields_trailing_empty_line() {
        assert_eq!(split_chunk(b"hello world\n"), ["hello world", ""]);
    }

    #[test]
    fn chunk_without_newline_is_a_single_line() {
        assert_eq!(split_chunk(b"partial"), ["partial"]);
    }

    #[test]
    fn multiple_lines_keep_order() {
        assert_eq!(
            split_chunk(b"web_1 | up\nweb_1 | ready\n"),
            ["web_1 | up", "web_1 | ready", ""]
        );
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let lines = split_chunk(b"ok\xff\n");

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ok"));
        assert!(lines[0].contains('\u{fffd}'));
    }
}
