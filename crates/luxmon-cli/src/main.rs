mod hosts;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DurationRound, Utc};
use clap::Parser;
use luxmon_optics::{DeviceData, OpticsMib};
use luxmon_snmp::{SchemaWalker, Snmp2cTransport};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// Collects optical-transceiver and interface telemetry from a fleet of
/// network devices over SNMP and writes one aggregated JSON snapshot.
#[derive(Debug, Parser)]
#[command(name = "luxmon", version)]
struct Args {
    /// Output file path ('_TS_' is replaced with the run timestamp).
    #[arg(long, default_value = "luxmon-_TS_.json")]
    out: String,

    /// Address of a single host to query.
    #[arg(long)]
    ip: Option<String>,

    /// Path to a list of hosts to query, one per line.
    #[arg(long)]
    hosts: Option<PathBuf>,

    /// SNMP community to use for the queries.
    #[arg(long, default_value = "public")]
    community: String,

    /// Maximum number of hosts contacted at a given time.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Per-host SNMP timeout, in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Print the compiled walk plan and exit.
    #[arg(long)]
    describe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.describe {
        let walker = SchemaWalker::new(OpticsMib::default())?;
        print!("{}", walker.describe());
        return Ok(());
    }

    let hosts = hosts::load(args.ip.as_deref(), args.hosts.as_deref())?;
    if hosts.is_empty() {
        bail!("please provide a host IP (--ip) or a host list file (--hosts)");
    }

    // Runs are stamped on a 5-minute grid so consecutive snapshots line up.
    let timestamp = Utc::now()
        .duration_round(chrono::Duration::minutes(5))?
        .format("%Y-%m-%d-%H%M")
        .to_string();
    let out_path = args.out.replace("_TS_", &timestamp);

    tracing::info!(
        hosts = hosts.len(),
        concurrency = args.concurrency,
        out = %out_path,
        "starting collection"
    );

    let semaphore = Arc::new(Semaphore::new(args.concurrency.max(1)));
    let timeout = Duration::from_secs(args.timeout);
    let mut tasks = JoinSet::new();
    for host in hosts {
        let semaphore = Arc::clone(&semaphore);
        let community = args.community.clone();
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return DeviceData::errored(&host, "collector shut down"),
            };
            fetch(&host, &community, timeout).await
        });
    }

    let mut snapshot = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(data) => {
                if let Some(error) = &data.error {
                    tracing::warn!(host = %data.host, error = %error, "host failed");
                } else {
                    tracing::debug!(host = %data.host, ports = data.optics_by_port.len(), "host collected");
                }
                snapshot.insert(data.host.clone(), data);
            }
            Err(err) => tracing::error!(%err, "collection task panicked"),
        }
    }

    let file = std::fs::File::create(&out_path)
        .with_context(|| format!("could not create output file '{out_path}'"))?;
    serde_json::to_writer(file, &snapshot)?;
    tracing::info!(hosts = snapshot.len(), out = %out_path, "snapshot written");

    Ok(())
}

/// Queries one host and fuses its MIB data. Failures become the snapshot
/// entry's error field instead of aborting the run.
async fn fetch(host: &str, community: &str, timeout: Duration) -> DeviceData {
    let target = if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:161")
    };
    let addr = match tokio::net::lookup_host(&target).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => return DeviceData::errored(host, format!("no address for '{target}'")),
        },
        Err(err) => return DeviceData::errored(host, err.to_string()),
    };

    let walker = match SchemaWalker::new(OpticsMib::default()) {
        Ok(walker) => walker,
        Err(err) => return DeviceData::errored(host, err.to_string()),
    };

    let mut transport =
        Snmp2cTransport::new(addr, community.as_bytes().to_vec()).with_timeout(timeout);
    if let Err(err) = walker.query(&mut transport).await {
        return DeviceData::errored(host, err.to_string());
    }

    DeviceData::from_mib(host, &walker.into_record())
}
