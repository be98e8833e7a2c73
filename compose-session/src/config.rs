use std::{
    env, fs,
    path::{self, Path, PathBuf},
};

use serde::Deserialize;

use crate::errors::ConfigError;

/// Program invoked when neither the config nor the environment names one.
pub const DEFAULT_PROGRAM: &str = "docker-compose";

/// Environment variable overriding [`DEFAULT_PROGRAM`].
pub const PROGRAM_ENV: &str = "COMPOSE_SESSION_PROGRAM";

/// Construction-time settings for a [`crate::ComposeSession`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    manifest_path: PathBuf,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default = "default_force_recreate")]
    force_recreate: bool,
    #[serde(default)]
    timestamps: bool,
    #[serde(default = "default_program")]
    program: String,
    #[serde(default)]
    program_args: Vec<String>,
    #[serde(default)]
    project_name: Option<String>,
}

/// Per-call overrides, merged field by field over the session defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub manifest_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub force_recreate: Option<bool>,
    pub timestamps: Option<bool>,
    pub program: Option<String>,
    pub program_args: Option<Vec<String>>,
    pub project_name: Option<String>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            working_dir: None,
            force_recreate: default_force_recreate(),
            timestamps: false,
            program: default_program(),
            program_args: Vec::new(),
            project_name: None,
        }
    }

    /// Load a session config from a YAML file.
    ///
    /// Relative `manifest_path` and `working_dir` entries are taken relative to
    /// the directory holding the YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        if config.manifest_path.is_relative() {
            config.manifest_path = base.join(&config.manifest_path);
        }
        if let Some(dir) = config.working_dir.as_mut().filter(|dir| dir.is_relative()) {
            *dir = base.join(&*dir);
        }

        Ok(config)
    }

    /// Directory to run the tool in; defaults to the manifest's directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Toggle `--force-recreate` on `up`.
    #[must_use]
    pub const fn with_force_recreate(mut self, enabled: bool) -> Self {
        self.force_recreate = enabled;
        self
    }

    /// Toggle `-t` on `logs`.
    #[must_use]
    pub const fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments placed before the compose flags, e.g. `["compose"]` for the
    /// docker CLI plugin.
    #[must_use]
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Working directory, falling back to the manifest's parent directory.
    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| manifest_dir(&self.manifest_path))
    }

    #[must_use]
    pub const fn force_recreate(&self) -> bool {
        self.force_recreate
    }

    #[must_use]
    pub const fn timestamps(&self) -> bool {
        self.timestamps
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn program_args(&self) -> &[String] {
        &self.program_args
    }

    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    /// Shallow merge: every override that is set replaces the session value.
    #[must_use]
    pub fn merged(&self, overrides: &ConfigOverrides) -> Self {
        Self {
            manifest_path: overrides
                .manifest_path
                .clone()
                .unwrap_or_else(|| self.manifest_path.clone()),
            working_dir: overrides
                .working_dir
                .clone()
                .or_else(|| self.working_dir.clone()),
            force_recreate: overrides.force_recreate.unwrap_or(self.force_recreate),
            timestamps: overrides.timestamps.unwrap_or(self.timestamps),
            program: overrides
                .program
                .clone()
                .unwrap_or_else(|| self.program.clone()),
            program_args: overrides
                .program_args
                .clone()
                .unwrap_or_else(|| self.program_args.clone()),
            project_name: overrides
                .project_name
                .clone()
                .or_else(|| self.project_name.clone()),
        }
    }

    /// Make the manifest path absolute and pin the working directory.
    ///
    /// Relative paths resolve against the current process directory, so the
    /// `-f` argument stays valid once the tool runs in `working_dir`.
    #[must_use]
    pub fn resolved(mut self) -> Self {
        if let Ok(absolute) = path::absolute(&self.manifest_path) {
            self.manifest_path = absolute;
        }
        if self.working_dir.is_none() {
            self.working_dir = Some(manifest_dir(&self.manifest_path));
        }
        self
    }
}

impl ConfigOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn manifest_dir(manifest: &Path) -> PathBuf {
    path::absolute(manifest)
        .ok()
        .and_then(|absolute| absolute.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

const fn default_force_recreate() -> bool {
    true
}

fn default_program() -> String {
    env::var(PROGRAM_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_PROGRAM.to_owned())
}
