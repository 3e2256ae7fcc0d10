//! `bitsearch-bench`: load a space with bit-encoded records, then verify and
//! time an exact-match search for every one of them.

use std::io::IsTerminal;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use bitsearch_bench::args::{parse_coordinator_ip, parse_count, parse_port};
use bitsearch_bench::{run, HarnessConfig, RespStore, RunReport, SettleConfig, SettleMode, StoreError};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "bitsearch-bench",
    version,
    about = "Load bit-encoded records into a space, then verify and time exact-match searches.",
    long_about = "This will create <NUMBERS> points whose key is a number [0, <NUMBERS>) and \
                  then perform searches over the bits of the number. The space should have 32 \
                  secondary dimensions so that all bits of a number may be stored."
)]
struct Args {
    /// Coordinator IP address (IPv4 or IPv6).
    #[arg(value_parser = parse_coordinator_ip)]
    coordinator_ip: IpAddr,

    /// Coordinator port.
    #[arg(value_parser = parse_port)]
    coordinator_port: u16,

    /// Space to load and search. It must declare 32 secondary dimensions.
    space: String,

    /// Number of identifiers to write and search, starting at 0.
    #[arg(value_parser = parse_count)]
    numbers: u32,

    /// How to wait for writes to become searchable: auto, sync or sleep.
    #[arg(long, env = "BITSEARCH_SETTLE", default_value = "auto")]
    settle: SettleMode,

    /// Fixed pause used by `--settle sleep` and as the `auto` fallback.
    #[arg(long, env = "BITSEARCH_SETTLE_PAUSE", default_value = "1s")]
    settle_pause: humantime::Duration,

    /// Per-operation timeout (network + store response).
    #[arg(long, env = "BITSEARCH_OP_TIMEOUT", default_value = "10s")]
    op_timeout: humantime::Duration,

    /// Write a JSON run report to this path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Exit with failure when any write or search anomaly was observed.
    #[arg(long)]
    fail_on_anomaly: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // --help and --version land here too.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Progress and anomalies go to stderr; enable ANSI only for a terminal.
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitsearch_bench=info,warn".into()),
        )
        .init();

    match execute(args).await {
        Ok(code) => code,
        Err(err) => {
            report_fatal(&err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(args: Args) -> anyhow::Result<ExitCode> {
    let addr = SocketAddr::new(args.coordinator_ip, args.coordinator_port);
    let mut store = RespStore::connect(addr, args.op_timeout.into()).await?;

    let config = HarnessConfig {
        space: args.space,
        count: args.numbers,
        settle: SettleConfig {
            mode: args.settle,
            pause: args.settle_pause.into(),
        },
    };
    let report = run(&mut store, &config)
        .await
        .with_context(|| format!("run against {addr}"))?;

    if let Some(path) = &args.out {
        write_report(path, &report).context("write run report")?;
        eprintln!("wrote report: {}", path.display());
    }

    if args.fail_on_anomaly && report.anomaly_count() > 0 {
        tracing::warn!(
            anomalies = report.anomaly_count(),
            "anomalies observed with --fail-on-anomaly set"
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Classify a fatal error for the final message.
fn report_fatal(err: &anyhow::Error) {
    if err.downcast_ref::<StoreError>().is_some() {
        eprintln!("There was a system error:  {err:#}");
    } else {
        eprintln!("There was a generic error:  {err:#}");
    }
}

/// Serialize and write the run report JSON.
fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Ensure the output directory exists before writing.
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(report).context("serialize report")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
