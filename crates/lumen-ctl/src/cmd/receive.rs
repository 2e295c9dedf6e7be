//! Receiver — ingests one scanned string per input line.
//!
//! Per-frame problems are logged and skipped; the sender's loop will offer
//! the frame again. Only a failed payload hash ends the run early.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use lumen_core::{Header, Ingested, Phase, Progress, ReassemblyError, ReassemblyState};

/// Outcome of a receive run.
#[derive(Debug, Serialize)]
pub struct TransferReport {
    pub status: Phase,
    pub header: Option<Header>,
    pub progress: Progress,
    pub frames_seen: u64,
    pub frames_rejected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn cmd_receive(json: bool) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let report = receive(reader).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else if let Some(payload) = &report.payload {
        println!("{}", payload);
    }

    match report.status {
        Phase::Complete => Ok(()),
        Phase::Failed => bail!(
            "transfer failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
        _ => {
            let p = &report.progress;
            bail!(
                "input ended before the transfer completed ({}/{} fragments, missing {:?})",
                p.received,
                p.expected,
                p.missing
            )
        }
    }
}

/// Feed every line of `reader` to a fresh reassembly state until the
/// payload is recovered, verification fails, or input ends.
pub async fn receive<R>(reader: R) -> Result<TransferReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut state = ReassemblyState::new();
    let mut lines = reader.lines();
    let mut frames_seen = 0u64;
    let mut frames_rejected = 0u64;
    let mut error = None;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        if line.trim().is_empty() {
            continue;
        }
        frames_seen += 1;

        match state.ingest_wire(&line) {
            Ok(Ingested::SessionStarted { hash, expected }) => {
                tracing::info!(%hash, expected, "ready: header received");
            }
            Ok(Ingested::Stored {
                sequence,
                received,
                expected,
            }) => {
                tracing::info!(sequence, received, expected, "fragment received");
            }
            Ok(Ingested::Completed { .. }) => {
                tracing::info!("transfer complete");
                break;
            }
            Ok(Ingested::HeaderRepeated) | Ok(Ingested::Duplicate { .. }) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "transfer failed");
                error = Some(e.to_string());
                break;
            }
            Err(ReassemblyError::Malformed(e)) if e.is_malformed() => {
                frames_rejected += 1;
                tracing::debug!(error = %e, "not a frame, skipping");
            }
            Err(e) => {
                frames_rejected += 1;
                tracing::warn!(error = %e, "frame rejected");
            }
        }
    }

    Ok(TransferReport {
        status: state.phase(),
        header: state.header().cloned(),
        progress: state.progress(),
        frames_seen,
        frames_rejected,
        payload: state.payload().map(str::to_owned),
        error,
    })
}
