//! Decode wire strings from stdin and print their fields.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use lumen_core::{Frame, FrameError};

pub async fn cmd_inspect() -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut index = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        if line.trim().is_empty() {
            continue;
        }
        index += 1;
        println!("{}", describe(index, Frame::decode(&line)));
    }

    if index == 0 {
        println!("No frames on input.");
    }
    Ok(())
}

fn describe(index: usize, decoded: Result<Frame, FrameError>) -> String {
    match decoded {
        Ok(Frame::Header(h)) => format!(
            "  ┌─ #{index} HDR {}\n  │  total frames : {}\n  │  size         : {} bytes\n  │  hash         : {}\n  └─ encoding     : {}",
            h.protocol_version, h.total_frames, h.payload_size_bytes, h.payload_hash, h.encoding
        ),
        Ok(Frame::Data(d)) => format!(
            "  ┌─ #{index} DAT seq {}\n  │  length   : {} bytes\n  │  base64   : {}\n  │  checksum : {} ({})\n  └─ payload  : {:?}",
            d.sequence,
            d.payload.len(),
            d.base64,
            d.checksum,
            if d.verify() { "ok" } else { "MISMATCH" },
            d.payload
        ),
        Err(e) => format!("  ✗  #{index} {}", e),
    }
}
