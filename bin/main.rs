#![deny(clippy::pedantic, clippy::all, clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use mailsend::{tracing, JobConfig};

fn main() -> anyhow::Result<()> {
    mailsend::logging::init();

    let config_path = find_config_file()?;
    let config_content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let job: JobConfig = toml::from_str(&config_content)
        .with_context(|| format!("Invalid job file {}", config_path.display()))?;

    let config = job.session_config()?;
    let builder = job.message_builder();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Err(error) = runtime.block_on(mailsend::send_mail(builder, &config)) {
        anyhow::bail!("{} phase failed: {error}", error.phase());
    }

    tracing::info!(host = %config.host, "Message sent");
    Ok(())
}

/// Find the job file using the following precedence:
/// 1. The first command-line argument
/// 2. `MAILSEND_CONFIG` environment variable
/// 3. ./mailsend.toml (current working directory)
fn find_config_file() -> anyhow::Result<PathBuf> {
    let explicit = std::env::args_os()
        .nth(1)
        .map(|arg| ("argument", PathBuf::from(arg)))
        .or_else(|| {
            std::env::var_os("MAILSEND_CONFIG").map(|env| ("MAILSEND_CONFIG", PathBuf::from(env)))
        });

    if let Some((source, path)) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("{source} points to non-existent file: {}", path.display());
    }

    let default_path = PathBuf::from("./mailsend.toml");
    if default_path.exists() {
        return Ok(default_path);
    }

    anyhow::bail!(
        "No job file found. Tried:\n  - first argument\n  - MAILSEND_CONFIG environment variable\n  - {}",
        default_path.display()
    )
}
