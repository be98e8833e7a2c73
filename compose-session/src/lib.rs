pub mod availability;
pub mod command;
pub mod config;
pub mod errors;
pub mod runner;
pub mod selector;
pub mod session;
pub mod stream;

pub use availability::{PathProbe, ToolProbe};
pub use command::{ComposeInvocation, Operation};
pub use config::{ConfigOverrides, DEFAULT_PROGRAM, PROGRAM_ENV, SessionConfig};
pub use errors::{ComposeSessionError, ConfigError, ToolUnavailable};
pub use runner::CommandOutput;
pub use selector::ServiceSelector;
pub use session::ComposeSession;
pub use stream::{LineHandler, LogSubscription, split_chunk};
