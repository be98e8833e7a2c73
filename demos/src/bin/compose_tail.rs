use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Context as _;
use compose_session::{ComposeSession, ComposeSessionError, SessionConfig};
use tracing::{info, warn};

const DEFAULT_MANIFEST: &str = "compose-session/tests/fixtures/sample-compose.yml";
const DEFAULT_SERVICE: &str = "sleeper_hello";
const DEFAULT_RUN_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let manifest = read_env_string(&["COMPOSE_DEMO_MANIFEST"], DEFAULT_MANIFEST);
    let service = read_env_string(&["COMPOSE_DEMO_SERVICE"], DEFAULT_SERVICE);
    let run_secs = read_env_any(&["COMPOSE_DEMO_RUN_SECS"], DEFAULT_RUN_SECS);
    info!(%manifest, %service, run_secs, "starting compose tail demo");

    if let Err(err) = run_tail(
        PathBuf::from(manifest),
        &service,
        Duration::from_secs(run_secs),
    )
    .await
    {
        warn!("compose tail demo failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run_tail(manifest: PathBuf, service: &str, run_for: Duration) -> anyhow::Result<()> {
    let session = ComposeSession::new(SessionConfig::new(manifest).with_timestamps(true));

    match session.ready().await {
        Ok(path) => info!(tool = %path.display(), "compose tool located"),
        Err(ComposeSessionError::ToolUnavailable(err)) => {
            warn!("{err}; cannot run compose demo");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    info!(service, "bringing service up");
    session
        .up(service)
        .await
        .with_context(|| format!("starting {service}"))?;

    let lines = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lines);
    let subscription = session
        .logs(service, move |line| {
            if line.is_empty() {
                return;
            }
            counter.fetch_add(1, Ordering::Relaxed);
            info!(target: "compose_tail", "{line}");
        })
        .await
        .with_context(|| format!("following {service} logs"))?;

    tokio::time::sleep(run_for).await;
    subscription.dispose().await;
    info!(
        lines = lines.load(Ordering::Relaxed),
        "log subscription disposed"
    );

    session.kill(service).await.context("killing services")?;
    session.down(()).await.context("tearing stack down")?;
    info!("compose stack removed");

    Ok(())
}

fn read_env_string(keys: &[&str], default: &str) -> String {
    keys.iter()
        .find_map(|key| std::env::var(key).ok().filter(|raw| !raw.is_empty()))
        .unwrap_or_else(|| default.to_owned())
}

fn read_env_any<T>(keys: &[&str], default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    keys.iter()
        .find_map(|key| {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<T>().ok())
        })
        .unwrap_or(default)
}
