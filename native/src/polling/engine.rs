use crate::api::types::LoopMetrics;
use crate::session::{lock_session, SharedSession};
use log::debug;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc, Arc,
};
use std::thread;
use std::time::{Duration, Instant};

/// Performance counters shared between the loop and status readers.
#[derive(Debug, Default)]
pub struct LoopCounters {
    running: AtomicBool,
    frame_count: AtomicU64,
    total_frame_time: AtomicU64, // microseconds
    max_frame_time: AtomicU64,   // microseconds
    frames_over_budget: AtomicU64,
}

impl LoopCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_frame(&self, frame_micros: u64, budget_micros: u64) {
        self.frame_count.fetch_add(1, Ordering::Relaxed);
        self.total_frame_time
            .fetch_add(frame_micros, Ordering::Relaxed);

        let mut current_max = self.max_frame_time.load(Ordering::Relaxed);
        while frame_micros > current_max {
            match self.max_frame_time.compare_exchange_weak(
                current_max,
                frame_micros,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }

        if frame_micros > budget_micros {
            self.frames_over_budget.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LoopMetrics {
        let frames = self.frame_count.load(Ordering::Relaxed);
        let total_time = self.total_frame_time.load(Ordering::Relaxed);

        LoopMetrics {
            running: self.is_running(),
            frames,
            average_frame_ms: if frames > 0 {
                total_time as f64 / frames as f64 / 1000.0
            } else {
                0.0
            },
            max_frame_ms: self.max_frame_time.load(Ordering::Relaxed) as f64 / 1000.0,
            frames_over_budget: self.frames_over_budget.load(Ordering::Relaxed),
        }
    }
}

/// Periodic poll → normalize → publish loop.
///
/// Runs on whichever thread calls [`UpdateTask::run`] until the shared
/// `active` flag is cleared. The flag is checked once per tick, so one more
/// poll may complete after cancellation is requested.
pub struct UpdateTask {
    session: SharedSession,
    active: Arc<AtomicBool>,
    period: Duration,
    counters: Arc<LoopCounters>,
    exited: mpsc::Sender<()>,
}

/// Owner side of an [`UpdateTask`].
pub struct UpdateTaskHandle {
    active: Arc<AtomicBool>,
    exited: mpsc::Receiver<()>,
}

impl UpdateTask {
    pub fn new(
        session: SharedSession,
        period: Duration,
        counters: Arc<LoopCounters>,
    ) -> (Self, UpdateTaskHandle) {
        let active = Arc::new(AtomicBool::new(true));
        let (exited_tx, exited_rx) = mpsc::channel();

        let task = Self {
            session,
            active: Arc::clone(&active),
            period,
            counters,
            exited: exited_tx,
        };

        (
            task,
            UpdateTaskHandle {
                active,
                exited: exited_rx,
            },
        )
    }

    pub fn run(self) {
        let budget_micros = self.period.as_micros() as u64;
        self.counters.running.store(true, Ordering::Relaxed);

        #[cfg(debug_assertions)]
        debug!("[POLL] Update loop started ({:?} period)", self.period);
        #[cfg(debug_assertions)]
        let mut last_log_time = Instant::now();
        #[cfg(debug_assertions)]
        let mut last_logged_over_budget: u64 = 0;

        while self.active.load(Ordering::Relaxed) {
            let frame_start = Instant::now();

            lock_session(&self.session).tick();

            let frame_time = frame_start.elapsed();
            self.counters
                .record_frame(frame_time.as_micros() as u64, budget_micros);

            if frame_time < self.period {
                thread::sleep(self.period - frame_time);
            }

            #[cfg(debug_assertions)]
            {
                if last_log_time.elapsed() >= Duration::from_secs(10) {
                    let over_budget = self.counters.frames_over_budget.load(Ordering::Relaxed);
                    debug!(
                        "[PERF] Last 10s: {} frames over budget",
                        over_budget - last_logged_over_budget
                    );
                    last_log_time = Instant::now();
                    last_logged_over_budget = over_budget;
                }
            }
        }

        self.counters.running.store(false, Ordering::Relaxed);
        let _ = self.exited.send(());

        #[cfg(debug_assertions)]
        debug!("[POLL] Update loop stopped");
    }
}

impl UpdateTaskHandle {
    /// Request the loop to stop after its current tick.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.active.load(Ordering::Relaxed)
    }

    /// Cancel and wait for the loop to exit. Returns false on timeout.
    ///
    /// A task that was dropped without running counts as exited.
    pub fn cancel_and_wait(&self, timeout: Duration) -> bool {
        self.cancel();
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
            Err(mpsc::RecvTimeoutError::Timeout) => false,
        }
    }
}
