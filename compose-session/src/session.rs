use std::{ffi::OsString, path::PathBuf, sync::Arc};

use tracing::info;

use crate::{
    availability::{Availability, PathProbe, ToolProbe},
    command::{ComposeInvocation, Operation},
    config::{ConfigOverrides, SessionConfig},
    errors::ComposeSessionError,
    runner::{CommandOutput, build_command, run_to_completion},
    selector::ServiceSelector,
    stream::{LineHandler, LogSubscription, spawn_stream},
};

/// Issues compose lifecycle commands against one manifest.
///
/// The tool is probed once, when the session is created; every operation
/// awaits that outcome. Operations take `&self` and may run concurrently.
#[derive(Clone)]
pub struct ComposeSession {
    config: SessionConfig,
    availability: Availability,
}

impl ComposeSession {
    /// Create a session that looks the tool up on `PATH`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_probe(config, PathProbe)
    }

    /// Create a session with a custom availability probe.
    #[must_use]
    pub fn with_probe(config: SessionConfig, probe: impl ToolProbe) -> Self {
        let config = config.resolved();
        let availability = Availability::start(config.program(), Arc::new(probe));
        Self {
            config,
            availability,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wait for the availability probe and return the resolved tool path.
    pub async fn ready(&self) -> Result<PathBuf, ComposeSessionError> {
        self.availability.resolve().await.map_err(Into::into)
    }

    /// `up --force-recreate -d [services]` with session defaults.
    pub async fn up(
        &self,
        services: impl Into<ServiceSelector>,
    ) -> Result<CommandOutput, ComposeSessionError> {
        self.up_with(services, &ConfigOverrides::default()).await
    }

    pub async fn up_with(
        &self,
        services: impl Into<ServiceSelector>,
        overrides: &ConfigOverrides,
    ) -> Result<CommandOutput, ComposeSessionError> {
        self.lifecycle(Operation::Up, services.into(), overrides)
            .await
    }

    /// `down [services]` with session defaults.
    pub async fn down(
        &self,
        services: impl Into<ServiceSelector>,
    ) -> Result<CommandOutput, ComposeSessionError> {
        self.down_with(services, &ConfigOverrides::default()).await
    }

    pub async fn down_with(
        &self,
        services: impl Into<ServiceSelector>,
        overrides: &ConfigOverrides,
    ) -> Result<CommandOutput, ComposeSessionError> {
        self.lifecycle(Operation::Down, services.into(), overrides)
            .await
    }

    /// `kill [services]` with session defaults.
    pub async fn kill(
        &self,
        services: impl Into<ServiceSelector>,
    ) -> Result<CommandOutput, ComposeSessionError> {
        self.kill_with(services, &ConfigOverrides::default()).await
    }

    pub async fn kill_with(
        &self,
        services: impl Into<ServiceSelector>,
        overrides: &ConfigOverrides,
    ) -> Result<CommandOutput, ComposeSessionError> {
        self.lifecycle(Operation::Kill, services.into(), overrides)
            .await
    }

    /// Follow `logs -f` for one service, calling `on_line` per output line.
    ///
    /// Returns as soon as the process is spawned; the stream only ends when
    /// the subscription is disposed or dropped, or the tool exits.
    pub async fn logs<F>(
        &self,
        service: &str,
        on_line: F,
    ) -> Result<LogSubscription, ComposeSessionError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logs_with(service, on_line, &ConfigOverrides::default())
            .await
    }

    pub async fn logs_with<F>(
        &self,
        service: &str,
        on_line: F,
        overrides: &ConfigOverrides,
    ) -> Result<LogSubscription, ComposeSessionError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let config = self.effective_config(overrides);
        let invocation = ComposeInvocation::logs(service, &config);
        let program = self.program_for(&config).await?;

        info!(service, command = %invocation, "tailing compose service logs");

        let command = build_command(
            &program,
            config.program_args(),
            &invocation,
            &config.working_dir(),
        );
        let handler: LineHandler = Arc::new(on_line);
        spawn_stream(command, &invocation, handler)
    }

    async fn lifecycle(
        &self,
        operation: Operation,
        services: ServiceSelector,
        overrides: &ConfigOverrides,
    ) -> Result<CommandOutput, ComposeSessionError> {
        let config = self.effective_config(overrides);
        let invocation = ComposeInvocation::lifecycle(operation, &services, &config)?;
        let program = self.program_for(&config).await?;

        info!(command = %invocation, "issuing compose command");

        let command = build_command(
            &program,
            config.program_args(),
            &invocation,
            &config.working_dir(),
        );
        run_to_completion(command, &invocation).await
    }

    fn effective_config(&self, overrides: &ConfigOverrides) -> SessionConfig {
        if overrides.is_empty() {
            return self.config.clone();
        }
        self.config.merged(overrides).resolved()
    }

    /// Resolved path of the probed tool, or the overriding program name.
    async fn program_for(&self, config: &SessionConfig) -> Result<OsString, ComposeSessionError> {
        let path = self.availability.resolve().await?;
        if config.program() == self.availability.program() {
            Ok(path.into_os_string())
        } else {
            Ok(OsString::from(config.program()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::errors::ToolUnavailable;

    struct MissingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolProbe for MissingTool {
        async fn locate(&self, program: &str) -> Result<PathBuf, ToolUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ToolUnavailable::NotFound {
                program: program.to_owned(),
            })
        }
    }

    struct BrokenProbe;

    #[async_trait]
    impl ToolProbe for BrokenProbe {
        async fn locate(&self, program: &str) -> Result<PathBuf, ToolUnavailable> {
            Err(ToolUnavailable::ProbeFailed {
                program: program.to_owned(),
                reason: "PATH is empty and the current directory is unknown".to_owned(),
            })
        }
    }

    fn missing_tool_session() -> (Arc<AtomicUsize>, ComposeSession) {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = ComposeSession::with_probe(
            SessionConfig::new("/srv/stack/compose.yml"),
            MissingTool {
                calls: Arc::clone(&calls),
            },
        );
        (calls, session)
    }

    #[tokio::test]
    async fn every_operation_fails_when_tool_is_missing() {
        let (calls, session) = missing_tool_session();

        assert!(session.up(()).await.expect_err("up").is_tool_unavailable());
        assert!(session.down("web").await.expect_err("down").is_tool_unavailable());
        assert!(
            session
                .kill(["web", "db"])
                .await
                .expect_err("kill")
                .is_tool_unavailable()
        );
        assert!(
            session
                .logs("web", |_| {})
                .await
                .expect_err("logs")
                .is_tool_unavailable()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_failure_is_reported_as_tool_unavailable() {
        let session =
            ComposeSession::with_probe(SessionConfig::new("/srv/stack/compose.yml"), BrokenProbe);

        let err = session.ready().await.expect_err("probe failed");

        match err {
            ComposeSessionError::ToolUnavailable(ToolUnavailable::ProbeFailed { program, reason }) => {
                assert_eq!(program, session.config().program());
                assert!(reason.contains("PATH is empty"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(session.kill(()).await.expect_err("kill").is_tool_unavailable());
    }

    #[tokio::test]
    async fn invalid_selector_fails_before_the_probe_is_consulted() {
        let (_, session) = missing_tool_session();

        let err = session.up("web db").await.expect_err("invalid selector");

        assert!(matches!(err, ComposeSessionError::InvalidSelector { .. }));
    }

    #[test]
    fn construction_resolves_working_dir_from_manifest() {
        let (_, session) = missing_tool_session();

        assert_eq!(session.config().working_dir(), PathBuf::from("/srv/stack"));
    }

    #[test]
    fn overrides_merge_over_session_defaults() {
        let (_, session) = missing_tool_session();
        let overrides = ConfigOverrides {
            timestamps: Some(true),
            ..ConfigOverrides::default()
        };

        let effective = session.effective_config(&overrides);

        assert!(effective.timestamps());
        assert!(effective.force_recreate());
        assert_eq!(effective.working_dir(), PathBuf::from("/srv/stack"));
    }
}
