use serde_json::Value;

use crate::errors::ComposeSessionError;

/// Which services a lifecycle operation targets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ServiceSelector {
    /// Every service declared in the manifest.
    #[default]
    All,
    One(String),
    /// Ordered list of services; empty means every service.
    Many(Vec<String>),
}

impl ServiceSelector {
    /// Service names to append as trailing positional arguments.
    ///
    /// Fails when a name is empty or contains whitespace, since each name is
    /// handed to the tool as a single argument.
    pub fn service_args(&self) -> Result<Vec<String>, ComposeSessionError> {
        match self {
            Self::All => Ok(Vec::new()),
            Self::One(name) => {
                validate_service_name(name)?;
                Ok(vec![name.clone()])
            }
            Self::Many(names) => {
                for name in names {
                    validate_service_name(name)?;
                }
                Ok(names.clone())
            }
        }
    }

    #[must_use]
    pub fn targets_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::One(_) => false,
            Self::Many(names) => names.is_empty(),
        }
    }
}

/// Reject names the tool would misread as zero or several services.
pub fn validate_service_name(name: &str) -> Result<(), ComposeSessionError> {
    if name.is_empty() {
        return Err(ComposeSessionError::invalid_selector(
            "service name must not be empty",
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ComposeSessionError::invalid_selector(format!(
            "service name '{name}' contains whitespace"
        )));
    }
    Ok(())
}

impl From<()> for ServiceSelector {
    fn from((): ()) -> Self {
        Self::All
    }
}

impl From<&str> for ServiceSelector {
    fn from(name: &str) -> Self {
        if name.is_empty() {
            Self::All
        } else {
            Self::One(name.to_owned())
        }
    }
}

impl From<String> for ServiceSelector {
    fn from(name: String) -> Self {
        if name.is_empty() {
            Self::All
        } else {
            Self::One(name)
        }
    }
}

impl From<&String> for ServiceSelector {
    fn from(name: &String) -> Self {
        Self::from(name.as_str())
    }
}

impl<S: Into<String>> From<Vec<S>> for ServiceSelector {
    fn from(names: Vec<S>) -> Self {
        Self::Many(names.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for ServiceSelector {
    fn from(names: &[&str]) -> Self {
        Self::Many(names.iter().map(|name| (*name).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ServiceSelector {
    fn from(names: [&str; N]) -> Self {
        Self::Many(names.into_iter().map(str::to_owned).collect())
    }
}

impl<T: Into<ServiceSelector>> From<Option<T>> for ServiceSelector {
    fn from(selector: Option<T>) -> Self {
        selector.map_or(Self::All, Into::into)
    }
}

/// Selectors arriving as loosely typed data (config files, RPC payloads).
impl TryFrom<Value> for ServiceSelector {
    type Error = ComposeSessionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::All),
            Value::String(name) => Ok(Self::from(name)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name),
                    other => Err(ComposeSessionError::invalid_selector(format!(
                        "service list entries must be strings, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Many),
            other => Err(ComposeSessionError::invalid_selector(format!(
                "expected nothing, a service name or a list of names, got {other}"
            ))),
        }
    }
}
