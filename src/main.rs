//! `stillframe` binary: run a receiver or a sender from the command line.

mod cli;

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use clap::Parser;
use cli::{Cli, Command, Mode, ReceiveArgs, SendArgs};
use stillframe::{
    config::{PlaceholderFill, ReceiverConfig, SenderConfig},
    params::ChunkSize,
    receiver::{DirectorySink, Receiver},
    scheduler::{
        ContinuousTrigger,
        DirectorySource,
        DutyCycle,
        FileSource,
        ImageSource,
        IntervalTrigger,
        TcpConnector,
        TransmissionScheduler,
        TriggerHandle,
        manual,
    },
    session::{SessionRegistry, TransmitterId},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Some(addr) = cli.metrics {
        install_metrics(addr)?;
    }
    match cli.command {
        Command::Receive(args) => receive(args).await?,
        Command::Send(args) => send(args).await?,
    }
    Ok(())
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "serving metrics");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
#[expect(clippy::unnecessary_wraps, reason = "matches the metrics-enabled signature")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    warn!(%addr, "built without the `metrics` feature; not serving metrics");
    Ok(())
}

async fn receive(args: ReceiveArgs) -> stillframe::Result<()> {
    let config = ReceiverConfig::default()
        .with_handshake_timeout(Duration::from_secs(args.handshake_timeout_secs))
        .with_inactivity_timeout(Duration::from_secs(args.inactivity_timeout_secs))
        .with_placeholder(PlaceholderFill::new(args.placeholder));
    let registry = Arc::new(SessionRegistry::new(config.placeholder));
    let receiver =
        Receiver::new(config, registry, DirectorySink::new(args.out.clone())).bind(args.listen)?;
    info!(addr = ?receiver.local_addr(), out = %args.out.display(), "receiving images");
    receiver.run().await?;
    Ok(())
}

async fn send(args: SendArgs) -> stillframe::Result<()> {
    let transmitter = TransmitterId::new(&args.id)?;
    let duty_cycle = args
        .active_secs
        .zip(args.sleep_secs)
        .map(|(active, sleep)| DutyCycle {
            active: Duration::from_secs(active),
            sleep: Duration::from_secs(sleep),
        });
    let config = SenderConfig::default()
        .with_chunk_size(ChunkSize::new(args.chunk_size)?)
        .with_frames_per_second(args.fps.and_then(NonZeroU32::new))
        .with_interval(Duration::from_millis(args.interval_ms))
        .with_duty_cycle(duty_cycle)
        .with_max_consecutive_failures(args.max_failures.and_then(NonZeroU32::new));
    let connector = TcpConnector::new(args.to);

    if let Some(file) = args.file {
        let source = FileSource::new(file)?;
        return drive(transmitter, config, source, connector, args.mode).await;
    }
    // clap guarantees one of --file and --dir.
    let source = DirectorySource::new(args.dir.unwrap_or_default());
    drive(transmitter, config, source, connector, args.mode).await
}

async fn drive<S: ImageSource>(
    transmitter: TransmitterId,
    config: SenderConfig,
    source: S,
    connector: TcpConnector,
    mode: Mode,
) -> stillframe::Result<()> {
    let mut scheduler = TransmissionScheduler::new(transmitter, config, source, connector);
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let _ = signal::ctrl_c().await;
            shutdown.cancel();
        }
    });

    let summary = match mode {
        Mode::Manual => {
            let (trigger, handle) = manual();
            tokio::spawn(forward_stdin(handle));
            info!("press Enter to send an image; close stdin to stop");
            scheduler.run(trigger, shutdown).await?
        }
        Mode::Timed => {
            let trigger = IntervalTrigger::new(config.interval, config.duty_cycle);
            scheduler.run(trigger, shutdown).await?
        }
        Mode::Continuous => scheduler.run(ContinuousTrigger, shutdown).await?,
    };
    info!(?summary, "sender finished");
    Ok(())
}

/// Turn each line on stdin into a manual trigger. EOF drops the handle,
/// which stops the scheduler.
async fn forward_stdin(handle: TriggerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {
        if !handle.trigger() {
            warn!("a send is already pending; request ignored");
        }
    }
}
