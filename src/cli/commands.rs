use crate::cli::args::Args;
use crate::cli::output::{ConsoleWriter, FileWriter, OutputWriter, TeeWriter};
use crate::core::exchange::{
    Connector, ExchangeCoordinator, ExchangeSession, ExchangeSettings, SessionReport,
};
use crate::core::frame::{CommandFrame, FREF_HZ, VCO_MIN_HZ};
use crate::domain::config::PaiCoreConfig;
use crate::domain::error::{PaiCoreError, PaiCoreResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{available_ports, SerialConnector};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Reported negated, the way the board tooling expects it
pub const EINVAL: i32 = 22;

/// Execute CLI command and return the process exit code
pub async fn execute_command(args: Args) -> i32 {
    let writer = build_writer(&args);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            report_error(writer.as_ref(), &e);
            return -EINVAL;
        }
    };

    if !args.quiet {
        if let Err(e) = init_logging(&config.global.log_level, args.verbose) {
            report_error(writer.as_ref(), &e);
        }
    }

    if args.list_ports {
        return list_ports(writer.as_ref());
    }

    if let Some(dir) = &args.init_config {
        return init_config(dir, writer.as_ref());
    }

    if args.print_frame {
        return print_frame(&config, writer.as_ref());
    }

    let result = run_session(&config, &SerialConnector, writer.as_ref()).await;
    if let Err(e) = &result {
        report_error(writer.as_ref(), e);
    }
    exit_code(&result)
}

/// Map a finished run to the process exit code
pub fn exit_code(result: &PaiCoreResult<SessionReport>) -> i32 {
    match result {
        Ok(report) if report.is_success() => EXIT_SUCCESS,
        Ok(_) => EXIT_FAILURE,
        Err(e) if e.is_setup_error() => -EINVAL,
        Err(_) => EXIT_FAILURE,
    }
}

/// Open the link, run every round and print the verdict
pub async fn run_session(
    config: &PaiCoreConfig,
    connector: &dyn Connector,
    writer: &dyn OutputWriter,
) -> PaiCoreResult<SessionReport> {
    let command = config.frame.encode()?;
    let session = ExchangeSession::new(command, config.global.repeat_count)?;
    warn_on_low_vco(config);

    let transport = connector.open(&config.serial).await.map_err(|e| {
        error!("Failed to open {}: {}", config.serial.port, e);
        e
    })?;

    writer.write_message(&format!(
        "Successful connection to {}, baudrate: {}",
        config.serial.port, config.serial.baud_rate
    ))?;

    let settings = ExchangeSettings {
        read_timeout: config.global.read_timeout(),
        pacing: config.global.pacing(),
    };
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let coordinator = ExchangeCoordinator::new(settings).with_events(events_tx);

    // The coordinator owns the last event sender, so dropping it ends the drain
    let exchange = async move { coordinator.run(session, transport).await };
    let drain = async {
        while let Some(event) = events_rx.recv().await {
            if let Err(e) = writer.write_event(&event) {
                warn!("Failed to write progress: {}", e);
            }
        }
    };
    let (result, ()) = tokio::join!(exchange, drain);
    match result {
        Ok(report) => {
            write_verdict(writer, &report)?;
            Ok(report)
        }
        // An aborted session still gets its verdict before the error
        Err(PaiCoreError::SessionAborted { report, source }) => {
            write_verdict(writer, &report)?;
            Err(PaiCoreError::SessionAborted { report, source })
        }
        Err(e) => Err(e),
    }
}

fn write_verdict(writer: &dyn OutputWriter, report: &SessionReport) -> PaiCoreResult<()> {
    if report.is_success() {
        writer.write_message("Config OK.")?;
    } else {
        writer.write_message("Config error.")?;
    }
    writer.write_report(report)?;
    Ok(())
}

/// Fold command line overrides into the loaded configuration
pub fn apply_overrides(config: &mut PaiCoreConfig, args: &Args) {
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baudrate) = args.baudrate {
        config.serial.baud_rate = baudrate;
    }
    if let Some(repeat) = args.repeat {
        config.global.repeat_count = repeat;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.global.read_timeout_ms = timeout_ms;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        config.global.pacing_ms = pacing_ms;
    }
    if args.debug_mode {
        config.frame.debug_mode_enable = true;
    }
}

fn load_config(args: &Args) -> PaiCoreResult<PaiCoreConfig> {
    let config_manager = ConfigManager::new()?;
    let mut config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    apply_overrides(&mut config, args);
    Ok(config)
}

fn build_writer(args: &Args) -> Box<dyn OutputWriter> {
    let console: Box<dyn OutputWriter> = Box::new(ConsoleWriter::new(args.output));
    match &args.log_file {
        Some(path) => {
            let writers: Vec<Box<dyn OutputWriter>> =
                vec![console, Box::new(FileWriter::new(path))];
            Box::new(TeeWriter::new(writers))
        }
        None => console,
    }
}

fn report_error(writer: &dyn OutputWriter, error: &PaiCoreError) {
    if writer.write_error(&error.to_string()).is_err() {
        eprintln!("Error: {}", error);
    }
}

fn list_ports(writer: &dyn OutputWriter) -> i32 {
    let result = available_ports().and_then(|ports| {
        if ports.is_empty() {
            writer.write_message("No serial ports found")?;
        }
        for port in ports {
            writer.write_message(&port)?;
        }
        Ok(())
    });

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            report_error(writer, &e);
            EXIT_FAILURE
        }
    }
}

fn init_config(dir: &std::path::Path, writer: &dyn OutputWriter) -> i32 {
    let result = ConfigManager::new().and_then(|manager| {
        let path = manager.init_project_config(dir)?;
        writer.write_message(&format!(
            "Project configuration initialized at '{}'",
            path.display()
        ))?;
        Ok(())
    });

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            report_error(writer, &e);
            -EINVAL
        }
    }
}

fn print_frame(config: &PaiCoreConfig, writer: &dyn OutputWriter) -> i32 {
    let result = config
        .frame
        .encode()
        .map_err(PaiCoreError::from)
        .and_then(|frame: CommandFrame| {
            warn_on_low_vco(config);
            writer.write_layout(&frame)?;

            let pll = config.frame.pll();
            writer.write_message(&format!(
                "PLL: NF={} NR={} OD={}, VCO {} MHz, output {} MHz",
                pll.nf,
                pll.nr,
                pll.od,
                pll.vco_hz(FREF_HZ) / 1_000_000,
                pll.output_hz(FREF_HZ) / 1_000_000
            ))?;
            Ok(())
        });

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            report_error(writer, &e);
            -EINVAL
        }
    }
}

fn warn_on_low_vco(config: &PaiCoreConfig) {
    let pll = config.frame.pll();
    if pll.meets_vco_minimum(FREF_HZ) {
        info!(
            "PLL output {} MHz (VCO {} MHz)",
            pll.output_hz(FREF_HZ) / 1_000_000,
            pll.vco_hz(FREF_HZ) / 1_000_000
        );
    } else {
        warn!(
            "PLL VCO {} MHz is below the {} MHz minimum",
            pll.vco_hz(FREF_HZ) / 1_000_000,
            VCO_MIN_HZ / 1_000_000
        );
    }
}
