//! Sender — builds a session and loops its frames at the display interval.
//!
//! Each tick writes one wire string, newline-terminated, to stdout. Whatever
//! renders symbols reads that stream. The loop is the only retransmission
//! mechanism: it runs until Ctrl-C or until `--cycles` passes complete.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;

use lumen_core::config::LumenConfig;
use lumen_core::{FrameCarousel, SessionBuilder};

#[derive(Debug, Default)]
pub struct SendOptions {
    pub file: Option<String>,
    pub interval_ms: Option<u64>,
    pub max_bytes: Option<usize>,
    pub cycles: Option<u64>,
}

pub async fn cmd_send(config: &LumenConfig, opts: SendOptions) -> Result<()> {
    let raw = match &opts.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read payload file: {}", path))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read payload from stdin")?;
            buf
        }
    };

    let text = if config.sender.trim_input {
        raw.trim()
    } else {
        raw.as_str()
    };
    if text.is_empty() {
        bail!("nothing to send: payload is empty");
    }

    let mut builder = SessionBuilder::from_config(&config.chunking);
    if let Some(n) = opts.max_bytes {
        builder.max_fragment_bytes = n;
    }
    let session = builder
        .build(text)
        .context("failed to build transfer session")?;

    let interval_ms = opts.interval_ms.unwrap_or(config.display.interval_ms);
    if interval_ms == 0 {
        bail!("--interval-ms must be at least 1");
    }

    tracing::info!(
        hash = %session.payload_hash(),
        bytes = session.payload_size_bytes(),
        frames = session.total_frames(),
        interval_ms,
        "transmitting"
    );

    let mut stdout = tokio::io::stdout();
    let shown = transmit(
        session.carousel(),
        Duration::from_millis(interval_ms),
        opts.cycles,
        &mut stdout,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await?;

    tracing::info!(shown, "transmission stopped");
    Ok(())
}

/// Write one frame per tick until `shutdown` resolves or `cycles` full
/// passes are done. Returns the number of frames written.
pub async fn transmit<W, F>(
    mut carousel: FrameCarousel,
    interval: Duration,
    cycles: Option<u64>,
    out: &mut W,
    shutdown: F,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut shown = 0u64;
    loop {
        if cycles.is_some_and(|max| carousel.loops() >= max) {
            break;
        }

        tokio::select! {
            biased;

            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }

            _ = ticker.tick() => {
                let position = carousel.position();
                let Some(frame) = carousel.next() else {
                    break;
                };
                out.write_all(frame.as_bytes()).await.context("failed to write frame")?;
                out.write_all(b"\n").await.context("failed to write frame")?;
                out.flush().await.context("failed to flush frame")?;
                shown += 1;
                tracing::debug!(position, loops = carousel.loops(), "frame shown");
            }
        }
    }

    Ok(shown)
}
