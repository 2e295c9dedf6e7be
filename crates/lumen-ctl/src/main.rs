//! lumen-ctl — host for the Lumen optical transfer protocol.
//!
//! Stands where the symbol renderer and scanner would: `send` emits one wire
//! string per display tick on stdout, `receive` consumes one scanned string
//! per line on stdin.

use anyhow::{Context, Result};

use lumen_core::config::LumenConfig;

mod cmd;

use cmd::send::SendOptions;

fn print_usage() {
    println!("Usage: lumen-ctl <command> [options]");
    println!();
    println!("Commands:");
    println!("  send          Loop the frames of a payload on stdout");
    println!("  receive       Reassemble a payload from frames on stdin");
    println!("  inspect       Decode frames on stdin and print their fields");
    println!("  config        Print the resolved configuration");
    println!("  config --init Write a default config file if none exists");
    println!();
    println!("Send options:");
    println!("  --file <path>        Read the payload from a file (default: stdin)");
    println!("  --interval-ms <ms>   Time each frame is shown");
    println!("  --max-bytes <n>      Fragment budget in UTF-8 bytes");
    println!("  --cycles <n>         Stop after n full loops (default: until Ctrl-C)");
    println!();
    println!("Receive options:");
    println!("  --json               Print a JSON transfer report");
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T> {
    value
        .with_context(|| format!("{} requires a value", flag))?
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a number", flag))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = LumenConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LumenConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut send = SendOptions::default();
    let mut json = false;
    let mut init = false;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--file" => {
                i += 1;
                send.file = Some(args.get(i).context("--file requires a value")?.clone());
            }
            "--interval-ms" => {
                i += 1;
                send.interval_ms = Some(parse_value("--interval-ms", args.get(i))?);
            }
            "--max-bytes" => {
                i += 1;
                send.max_bytes = Some(parse_value("--max-bytes", args.get(i))?);
            }
            "--cycles" => {
                i += 1;
                send.cycles = Some(parse_value("--cycles", args.get(i))?);
            }
            "--json" => json = true,
            "--init" => init = true,
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["send"]                       => cmd::send::cmd_send(&config, send).await,
        ["receive"]                    => cmd::receive::cmd_receive(json).await,
        ["inspect"]                    => cmd::inspect::cmd_inspect().await,
        ["config"] if init             => {
            let path = LumenConfig::write_default_if_missing()?;
            println!("Config file: {}", path.display());
            Ok(())
        }
        ["config"]                     => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ["help"] | ["--help"] | ["-h"] | [] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
