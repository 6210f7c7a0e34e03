//! Local harness: serves one project, reading structured-mode CloudEvents as JSON
//! lines on stdin and writing one response event per line on stdout.

use std::io::Write;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use fxproto::InvocationEnvelope;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::info;
use tracing::warn;

use fxrun::config::CONFIG_ENV;
use fxrun::config::DEFAULT_CONFIG_FILE;
use fxrun::config::RuntimeConfig;
use fxrun::logging;
use fxrun::runtime::Runtime;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let config = RuntimeConfig::from_file(&path)?;
    let Some(project) = config.project.as_ref().map(|p| p.to_project()) else {
        bail!("{} has no [project] section", path);
    };

    let runtime = Runtime::new(config)?;
    let host = runtime.start(project).await?;
    info!(host = ?host, "serving");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope = match InvocationEnvelope::from_cloudevent_json(line.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "skipping undecodable event");
                continue;
            }
        };

        let outcome = host.invoke(&envelope).await;
        writeln!(stdout, "{}", outcome.to_cloudevent_json()).context("writing stdout")?;
        stdout.flush().context("flushing stdout")?;
    }

    Ok(())
}
