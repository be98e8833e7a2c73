use std::{ffi::OsString, fmt};

use crate::{
    config::SessionConfig,
    errors::ComposeSessionError,
    selector::ServiceSelector,
};

/// Compose verbs issued by a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Up,
    Down,
    Kill,
    Logs,
}

impl Operation {
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Kill => "kill",
            Self::Logs => "logs",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// A fully composed tool invocation, ready for a runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeInvocation {
    operation: Operation,
    description: String,
    args: Vec<OsString>,
    verb_at: usize,
}

impl ComposeInvocation {
    /// Build the argument list for a lifecycle verb (`up`, `down`, `kill`).
    pub fn lifecycle(
        operation: Operation,
        services: &ServiceSelector,
        config: &SessionConfig,
    ) -> Result<Self, ComposeSessionError> {
        if operation == Operation::Logs {
            return Err(ComposeSessionError::invalid_selector(
                "logs follows exactly one service; use ComposeInvocation::logs",
            ));
        }

        let services = services.service_args()?;
        let mut args = base_args(operation, config);

        if operation == Operation::Up {
            if config.force_recreate() {
                args.push("--force-recreate".into());
            }
            args.push("-d".into());
        }

        args.extend(services.into_iter().map(OsString::from));

        Ok(Self::new(operation, config, args))
    }

    /// Build `logs -f [-t] <service>` for a single service.
    ///
    /// The name is passed through unchecked as one argument; the tool reports
    /// unknown or malformed names on its own output.
    #[must_use]
    pub fn logs(service: &str, config: &SessionConfig) -> Self {
        let mut args = base_args(Operation::Logs, config);
        args.push("-f".into());
        if config.timestamps() {
            args.push("-t".into());
        }
        args.push(service.into());

        Self::new(Operation::Logs, config, args)
    }

    fn new(operation: Operation, config: &SessionConfig, args: Vec<OsString>) -> Self {
        let verb_at = if config.project_name().is_some() { 4 } else { 2 };
        let mut description = config.program().to_owned();
        for arg in config.program_args() {
            description.push(' ');
            description.push_str(arg);
        }
        description.push(' ');
        description.push_str(operation.verb());

        Self {
            operation,
            description,
            args,
            verb_at,
        }
    }

    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Short label such as `docker-compose up`, used in errors and logs.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Arguments following the program and its fixed `program_args`.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl fmt::Display for ComposeInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)?;
        for arg in &self.args[self.verb_at + 1..] {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

fn base_args(operation: Operation, config: &SessionConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-f".into(), config.manifest_path().into()];
    if let Some(project) = config.project_name() {
        args.push("-p".into());
        args.push(project.into());
    }
    args.push(operation.verb().into());
    args
}
