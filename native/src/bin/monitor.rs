//! Console runner: connects to the headset and prints combined-eye output once a second.

extern crate varjo_eye_module;

use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use varjo_eye_module::config::{get_config_path, BackendPreference, ModuleConfig};
use varjo_eye_module::{logging, TrackingModule, VarjoTrackingModule};

#[derive(Parser, Debug)]
#[command(name = "varjo-eye-monitor", version, long_about = None)]
struct Args {
    /// How long to print output before tearing down
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Use the synthetic backend instead of a headset
    #[arg(long)]
    simulated: bool,

    /// Write the current (or default) config to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Delete the crash log and exit
    #[arg(long)]
    clear_crash_log: bool,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    logging::init_logger();
    logging::init_crash_logger();

    if let Ok(dsn) = std::env::var("VARJO_SENTRY_DSN") {
        let environment = std::env::var("SENTRY_ENVIRONMENT").ok();
        logging::init_sentry(Some(&dsn), environment.as_deref());
    } else {
        info!("[MONITOR] Sentry disabled (no VARJO_SENTRY_DSN configured)");
    }

    let code = run(Args::parse());
    logging::shutdown_sentry();
    code
}

fn run(args: Args) -> ExitCode {
    if args.clear_crash_log {
        return match logging::clear_crash_log() {
            Ok(Some(path)) => {
                println!("Removed {}", path.display());
                ExitCode::SUCCESS
            }
            Ok(None) => {
                println!("No crash log to remove");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("[MONITOR] Failed to clear crash log: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut config = ModuleConfig::load_or_default();

    if args.write_config {
        return match get_config_path() {
            Ok(path) => match config.save_to(&path) {
                Ok(()) => {
                    println!("Wrote {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("[MONITOR] Failed to write {:?}: {}", path, e);
                    ExitCode::FAILURE
                }
            },
            Err(e) => {
                error!("[MONITOR] {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if args.simulated {
        config.backend.backend = BackendPreference::Simulated;
    }

    let mut module = VarjoTrackingModule::new(config);
    let (eye_ok, _) = module.initialize(true, false);
    if !eye_ok {
        let status = module.status();
        let reason = status
            .acquisition
            .backend
            .error
            .unwrap_or_else(|| "unknown error".to_string());
        eprintln!("Eye tracking unavailable: {}", reason);
        return ExitCode::FAILURE;
    }

    if let Err(e) = module.start_polling() {
        error!("[MONITOR] Failed to start polling thread: {}", e);
        module.teardown();
        return ExitCode::FAILURE;
    }

    let run_for = Duration::from_secs(args.seconds);
    let started = Instant::now();
    while started.elapsed() < run_for {
        thread::sleep(Duration::from_secs(1));

        let data = module.latest();
        let combined = &data.combined;
        println!(
            "frame {:>8} | look ({:+.3}, {:+.3}) | open {:.2} squeeze {:.2} widen {:.2} | dilation {:.2} pupil {:.2}",
            data.frame_number,
            combined.eye.look.x,
            combined.eye.look.y,
            combined.eye.openness,
            combined.eye.squeeze,
            combined.eye.widen,
            combined.dilation,
            combined.pupil_diameter_normalized,
        );
    }

    let status = module.status();
    module.teardown();

    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("[MONITOR] Failed to serialize status: {}", e),
    }

    ExitCode::SUCCESS
}
