//! Durable checkpoint of resolved subscription summaries.
//!
//! The summary list is written as pretty-printed JSON next to a `.sha256`
//! sidecar holding the hex SHA-256 of the file contents. The enrichment stage
//! reloads the file from disk, so the artifact on disk is what gets enriched;
//! the sidecar lets that reload (and `inspect_snapshot`) notice truncation or
//! hand edits.

use crate::errors::{AppError, ResultExt};
use crate::models::SubscriptionSummary;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Hex encoded SHA-256 of the given bytes.
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Path of the checksum sidecar for a snapshot file (`invoices.json.sha256`).
pub fn checksum_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Renders summaries exactly as they are written to disk.
pub fn render(summaries: &[SubscriptionSummary]) -> Result<String, AppError> {
    serde_json::to_string_pretty(summaries).context("Serializing subscription summaries")
}

/// Writes the snapshot file and its checksum sidecar.
pub async fn write_snapshot(path: &Path, summaries: &[SubscriptionSummary]) -> Result<(), AppError> {
    let contents = render(summaries)?;
    let checksum = compute_checksum(contents.as_bytes());

    tokio::fs::write(path, &contents)
        .await
        .with_context(|| format!("Writing snapshot {}", path.display()))?;
    tokio::fs::write(checksum_path(path), format!("{}\n", checksum))
        .await
        .with_context(|| format!("Writing checksum for {}", path.display()))?;

    tracing::info!(
        "Saved {} subscription summaries to {} (sha256 {})",
        summaries.len(),
        path.display(),
        &checksum[..12]
    );
    Ok(())
}

/// Reads a snapshot back, validating it against its sidecar when present.
pub async fn load_snapshot(path: &Path) -> Result<Vec<SubscriptionSummary>, AppError> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("Reading snapshot {}", path.display()))?;

    verify(path, &contents).await?;

    let summaries: Vec<SubscriptionSummary> = serde_json::from_slice(&contents)
        .with_context(|| format!("Parsing snapshot {}", path.display()))?;

    tracing::info!(
        "Loaded {} subscription summaries from {}",
        summaries.len(),
        path.display()
    );
    Ok(summaries)
}

async fn verify(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    let sidecar = checksum_path(path);
    let expected = match tokio::fs::read_to_string(&sidecar).await {
        Ok(text) => text.trim().to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                "No checksum found at {}; loading snapshot unverified",
                sidecar.display()
            );
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Reading checksum {}", sidecar.display()));
        }
    };

    let actual = compute_checksum(contents);
    if actual != expected {
        tracing::warn!(
            "Snapshot checksum mismatch for {}. Expected: {}, actual: {}",
            path.display(),
            expected,
            actual
        );
        return Err(AppError::SnapshotCorrupted(format!(
            "{} does not match {}",
            path.display(),
            sidecar.display()
        )));
    }
    Ok(())
}

/// Writes the snapshot and returns what was read back from disk.
pub async fn checkpoint(
    path: &Path,
    summaries: &[SubscriptionSummary],
) -> Result<Vec<SubscriptionSummary>, AppError> {
    write_snapshot(path, summaries).await?;
    load_snapshot(path).await
}
