use log::{error, info, LevelFilter};
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

const LOG_DIR_NAME: &str = "VarjoEyeModule";
const CRASH_LOG_FILE: &str = "rust_crash.log";

static CRASH_LOG_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);
static SENTRY_GUARD: Mutex<Option<sentry::ClientInitGuard>> = Mutex::new(None);

// Logging must keep working after a panic on another thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start Sentry reporting. An empty or missing DSN leaves it disabled.
pub fn init_sentry(dsn: Option<&str>, environment: Option<&str>) -> bool {
    let Some(dsn) = dsn.filter(|d| !d.is_empty()) else {
        info!("[SENTRY] No DSN provided - Sentry disabled");
        return false;
    };

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: environment.map(|e| Cow::Owned(e.to_string())),
            attach_stacktrace: true,
            send_default_pii: false,
            auto_session_tracking: true,
            session_mode: sentry::SessionMode::Application,
            ..Default::default()
        },
    ));

    if !guard.is_enabled() {
        info!("[SENTRY] Failed to initialize");
        return false;
    }

    sentry::configure_scope(|scope| {
        scope.set_tag("module", "varjo-eye");
    });
    *lock(&SENTRY_GUARD) = Some(guard);
    info!("[SENTRY] Initialized - environment: {:?}", environment);
    true
}

pub fn is_sentry_enabled() -> bool {
    lock(&SENTRY_GUARD)
        .as_ref()
        .is_some_and(|guard| guard.is_enabled())
}

/// End the Sentry session and flush pending events.
pub fn shutdown_sentry() {
    if let Some(guard) = lock(&SENTRY_GUARD).take() {
        info!("[SENTRY] Flushing events");
        drop(guard);
    }
}

/// Report an error that stops eye tracking from working at all.
pub fn capture_critical_error(context: &str, error: &str) {
    if !is_sentry_enabled() {
        return;
    }

    sentry::with_scope(
        |scope| {
            scope.set_tag("error_type", "critical");
            scope.set_tag("context", context);
            scope.set_level(Some(sentry::Level::Fatal));
        },
        || {
            sentry::capture_message(&format!("[CRITICAL] {}: {}", context, error), sentry::Level::Fatal);
        },
    );
}

/// Set up `env_logger`. Defaults to Warn unless `RUST_LOG` is set.
pub fn init_logger() {
    let mut builder = env_logger::Builder::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Warn);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}: {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    let _ = builder.try_init();
}

fn crash_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(LOG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Point the crash log at the per-user data directory and install the panic hook.
pub fn init_crash_logger() {
    let log_dir = crash_log_dir();
    let _ = fs::create_dir_all(&log_dir);
    let log_path = log_dir.join(CRASH_LOG_FILE);

    *lock(&CRASH_LOG_PATH) = Some(log_path.clone());

    std::panic::set_hook(Box::new(|panic_info| {
        let report = panic_report(panic_info);

        if is_sentry_enabled() {
            sentry::capture_message(&report, sentry::Level::Fatal);
        }

        if let Err(e) = append_crash_log(&report) {
            error!("[CRASH LOGGER] Failed to write crash log: {}", e);
        }

        error!("\n{}", report);
    }));

    info!("[CRASH LOGGER] Writing to {:?}", log_path);
}

fn panic_report(panic_info: &PanicHookInfo) -> String {
    let payload = panic_info
        .payload()
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic payload".to_string());

    let location = panic_info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "Unknown location".to_string());

    format!(
        "\n===== RUST PANIC =====\nTimestamp: {}\nLocation: {}\nMessage: {}\nThread: {}\n\nBacktrace:\n{}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        location,
        payload,
        std::thread::current().name().unwrap_or("unnamed"),
        std::backtrace::Backtrace::capture()
    )
}

fn append_crash_log(message: &str) -> std::io::Result<()> {
    let Some(log_path) = lock(&CRASH_LOG_PATH).clone() else {
        return Ok(());
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}", message)
}

/// Record a non-panicking failure in the crash log and Sentry.
pub fn log_critical_error(context: &str, error: &str) {
    let message = format!(
        "\n===== CRITICAL ERROR =====\nTimestamp: {}\nContext: {}\nError: {}\nThread: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        context,
        error,
        std::thread::current().name().unwrap_or("unnamed")
    );

    capture_critical_error(context, error);

    if let Err(e) = append_crash_log(&message) {
        error!("[CRASH LOGGER] Failed to write critical error: {}", e);
    }

    error!("{}", message);
}

pub fn get_crash_log_path() -> Option<PathBuf> {
    lock(&CRASH_LOG_PATH).clone()
}

fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete the crash log. Returns the path when a file was removed.
pub fn clear_crash_log() -> std::io::Result<Option<PathBuf>> {
    let Some(path) = get_crash_log_path() else {
        return Ok(None);
    };

    Ok(remove_if_present(&path)?.then_some(path))
}
