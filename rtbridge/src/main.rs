//! Process entry point: parses CLI flags, launches the decoder
//! subprocess, wires its stdout through the producer loop into the
//! sink controller, and owns the process's four long-lived threads
//! (producer, consumer callback, SDK worker, log drain).

mod cli;
mod config;
mod error;
mod logging;
mod sink_stub;

use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rtbridge_pipeline::Producer;
use rtbridge_sink::SinkController;

use cli::Cli;
use config::BridgeConfig;
use error::Result;

fn main() {
    let cli = Cli::parse();
    logging::init_subscriber(cli.log_filter.as_deref());

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "rtbridge exiting with error");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if !cli.decoder_args.is_empty() {
        config.decoder_args = cli.decoder_args.clone();
    }
    let decoder = config.decoder.clone().unwrap_or_else(|| cli.decoder.clone());
    let ring_capacity = cli.ring_capacity.max(config.ring_capacity.unwrap_or(0)).max(1 << 16);
    if let Some(mtu) = cli.mtu {
        config.sink.mtu = Some(mtu);
    }

    // `log_hot_path` is the handle hot-path code (the consumer callback,
    // `send_audio`) logs through instead of calling `tracing` directly;
    // it's cloned into the sink controller below.
    let (log_hot_path, log_drain) = logging::spawn_drain();

    tracing::info!(decoder = %decoder.display(), "launching decoder subprocess");
    let mut child = Command::new(&decoder)
        .args(&config.decoder_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(error::BridgeError::DecoderSpawnFailed)?;
    let stdout = child.stdout.take().expect("decoder subprocess spawned with piped stdout");

    let sink = sink_stub::LocalSink::new();
    let controller = Arc::new(SinkController::with_ring_capacity_and_log(
        Box::new(sink),
        config.sink.clone(),
        ring_capacity,
        log_hot_path,
    )?);
    controller.enable()?;

    #[cfg(unix)]
    if let Err(e) = rtbridge_core::rtprio::elevate_current_thread() {
        tracing::warn!(%e, "could not elevate producer thread to real-time priority, continuing at default priority");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let ctrlc_stop = stop.clone();
    // The producer thread blocks inside a `read` on the decoder's stdout
    // pipe; setting `stop` alone wouldn't unblock it until the decoder
    // next writes or exits. Killing the child here forces that read to
    // return (as an error or EOF) right away.
    let ctrlc_child = Arc::new(Mutex::new(child));
    let ctrlc_child_handle = ctrlc_child.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown requested");
        ctrlc_stop.store(true, Ordering::Release);
        let _ = ctrlc_child_handle.lock().unwrap().kill();
    })
    .expect("failed to install Ctrl-C handler");

    let mut producer = Producer::new(stdout, controller.clone(), stop.clone());
    let result = producer.run();

    controller.disable();
    let underruns = controller.underrun_count();
    if underruns > 0 {
        tracing::info!(underruns, "session ended with ring underruns");
    }

    {
        let mut child = ctrlc_child.lock().unwrap();
        let _ = child.kill();
        let _ = child.wait();
    }
    log_drain.join();

    result.map_err(Into::into)
}
