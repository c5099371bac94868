//! dbnet-monitor - connect to a controller, enumerate its variables, poll
//!
//! Thin daemon over the dbnet-io library: loads a TOML config, opens the
//! session, publishes the catalog to the log, then sweeps all readable
//! variables every scan interval until Ctrl-C.

use dbnet_io::classify::{classify, VariableKind};
use dbnet_io::poller::ValueOutcome;
use dbnet_io::{Config, DbNetClient, Result};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `dbnet-monitor <path>` (positional)
/// - `dbnet-monitor --config <path>` (flag-based)
/// - `dbnet-monitor -c <path>` (short flag)
///
/// Defaults to `/etc/dbnet-io.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/dbnet-io.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = Config::from_file(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    log::info!("dbnet-monitor starting, config: {}", config_path);
    log::info!(
        "controller {}:{} (station {}, client {})",
        config.connection.host,
        config.connection.port,
        config.connection.station_addr,
        config.connection.client_addr
    );

    let client = DbNetClient::connect(&config)?;

    let report = client.load_catalog()?;
    log::info!(
        "catalog loaded: {} variables ({} gaps)",
        report.variables,
        report.gaps.len()
    );
    if !report.name_collisions.is_empty() {
        log::warn!("duplicate names: {}", report.name_collisions.join(", "));
    }

    let catalog = client.catalog();
    let mut kind_counts = [0usize; 5];
    for var in catalog.iter() {
        let slot = match classify(&var.name) {
            VariableKind::Temperature => 0,
            VariableKind::Setpoint => 1,
            VariableKind::State => 2,
            VariableKind::Control => 3,
            VariableKind::Other => 4,
        };
        kind_counts[slot] += 1;
        log::debug!(
            "wid {:5} {:12} {:9} {}",
            var.wid,
            var.name,
            var.var_type.type_name(),
            if var.writable { "rw" } else { "ro" }
        );
    }
    log::info!(
        "{} temperatures, {} setpoints, {} states, {} controls, {} other",
        kind_counts[0],
        kind_counts[1],
        kind_counts[2],
        kind_counts[3],
        kind_counts[4]
    );

    let wids = catalog.readable_wids();

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| dbnet_io::Error::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let scan_interval = config.timing.scan_interval();
    log::info!(
        "polling {} variables every {}s, press Ctrl-C to stop",
        wids.len(),
        scan_interval.as_secs()
    );

    while running.load(Ordering::Relaxed) {
        let sweep_start = Instant::now();
        let outcomes = client.poll(&wids);

        let mut read = 0usize;
        let mut unavailable = 0usize;
        for (wid, outcome) in &outcomes {
            match outcome {
                ValueOutcome::Value(value) => {
                    read += 1;
                    if let Some(var) = catalog.get(*wid) {
                        log::debug!("{} = {}", var.name, value);
                    }
                }
                ValueOutcome::Unavailable(reason) => {
                    unavailable += 1;
                    log::debug!("wid {} unavailable: {}", wid, reason);
                }
            }
        }
        log::info!(
            "sweep done in {:.1}s: {} values, {} unavailable",
            sweep_start.elapsed().as_secs_f64(),
            read,
            unavailable
        );

        // Sleep in short slices so Ctrl-C stays responsive
        let mut remaining = scan_interval.saturating_sub(sweep_start.elapsed());
        while !remaining.is_zero() && running.load(Ordering::Relaxed) {
            let slice = remaining.min(Duration::from_millis(200));
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }

    client.close();
    log::info!("dbnet-monitor stopped");
    Ok(())
}
