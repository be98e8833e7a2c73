use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{runtime::Handle, sync::OnceCell, task};
use tracing::{debug, warn};

use crate::errors::ToolUnavailable;

/// Locates the external tool on the execution path.
#[async_trait]
pub trait ToolProbe: Send + Sync + 'static {
    async fn locate(&self, program: &str) -> Result<PathBuf, ToolUnavailable>;
}

/// Default probe: a `PATH` lookup run on the blocking pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathProbe;

#[async_trait]
impl ToolProbe for PathProbe {
    async fn locate(&self, program: &str) -> Result<PathBuf, ToolUnavailable> {
        let name = program.to_owned();
        match task::spawn_blocking(move || which::which(name)).await {
            Ok(Ok(path)) => Ok(path),
            Ok(Err(which::Error::CannotFindBinaryPath)) => Err(ToolUnavailable::NotFound {
                program: program.to_owned(),
            }),
            Ok(Err(err)) => Err(ToolUnavailable::ProbeFailed {
                program: program.to_owned(),
                reason: err.to_string(),
            }),
            Err(join) => Err(ToolUnavailable::ProbeFailed {
                program: program.to_owned(),
                reason: format!("probe task failed: {join}"),
            }),
        }
    }
}

/// Write-once availability outcome shared by every operation of a session.
#[derive(Clone)]
pub(crate) struct Availability {
    program: Arc<str>,
    probe: Arc<dyn ToolProbe>,
    outcome: Arc<OnceCell<Result<PathBuf, ToolUnavailable>>>,
}

impl Availability {
    /// Start probing right away when a runtime is available, otherwise on
    /// first use.
    pub(crate) fn start(program: &str, probe: Arc<dyn ToolProbe>) -> Self {
        let availability = Self {
            program: Arc::from(program),
            probe,
            outcome: Arc::new(OnceCell::new()),
        };

        if let Ok(handle) = Handle::try_current() {
            let eager = availability.clone();
            handle.spawn(async move {
                let _ = eager.resolve().await;
            });
        }

        availability
    }

    pub(crate) fn program(&self) -> &str {
        &self.program
    }

    /// Await the probe; later callers get the memoized outcome.
    pub(crate) async fn resolve(&self) -> Result<PathBuf, ToolUnavailable> {
        self.outcome
            .get_or_init(|| async {
                let outcome = self.probe.locate(&self.program).await;
                match &outcome {
                    Ok(path) => {
                        debug!(program = %self.program, path = %path.display(), "located compose tool");
                    }
                    Err(err) => warn!(program = %self.program, %err, "compose tool unavailable"),
                }
                outcome
            })
            .await
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        found: bool,
    }

    #[async_trait]
    impl ToolProbe for CountingProbe {
        async fn locate(&self, program: &str) -> Result<PathBuf, ToolUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.found {
                Ok(PathBuf::from("/usr/bin").join(program))
            } else {
                Err(ToolUnavailable::NotFound {
                    program: program.to_owned(),
                })
            }
        }
    }

    fn counting(found: bool) -> (Arc<AtomicUsize>, Arc<dyn ToolProbe>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Arc::new(CountingProbe {
            calls: Arc::clone(&calls),
            found,
        });
        (calls, probe)
    }

    #[tokio::test]
    async fn probe_runs_once_under_concurrent_callers() {
        let (calls, probe) = counting(true);
        let availability = Availability::start("docker-compose", probe);

        let results = futures_join(&availability).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_tool_is_replayed_to_every_caller() {
        let (calls, probe) = counting(false);
        let availability = Availability::start("docker-compose", probe);

        for _ in 0..3 {
            let err = availability.resolve().await.expect_err("tool is missing");
            assert_eq!(
                err,
                ToolUnavailable::NotFound {
                    program: "docker-compose".into()
                }
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probe_is_deferred_without_a_runtime() {
        let (calls, probe) = counting(true);
        let availability = Availability::start("docker-compose", probe);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let path = runtime
            .block_on(availability.resolve())
            .expect("tool found");

        assert_eq!(path, PathBuf::from("/usr/bin/docker-compose"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn path_probe_finds_a_shell() {
        let path = PathProbe.locate("sh").await.expect("sh is on PATH");

        assert!(path.is_absolute());
    }

    #[tokio::test]
    async fn path_probe_reports_missing_program() {
        let err = PathProbe
            .locate("compose-session-definitely-missing-tool")
            .await
            .expect_err("no such program");

        assert!(matches!(err, ToolUnavailable::NotFound { .. }));
    }

    async fn futures_join(availability: &Availability) -> Vec<Result<PathBuf, ToolUnavailable>> {
        let (a, b, c, d) = tokio::join!(
            availability.resolve(),
            availability.resolve(),
            availability.resolve(),
            availability.resolve(),
        );
        vec![a, b, c, d]
    }
}
