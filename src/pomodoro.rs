use crate::events::{EventSender, LuminarEvent, send_event};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

pub const WORK_SECONDS: u32 = 25 * 60;
pub const BREAK_SECONDS: u32 = 5 * 60;
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroDurations {
    pub work_seconds: u32,
    pub break_seconds: u32,
}

impl Default for PomodoroDurations {
    fn default() -> Self {
        Self {
            work_seconds: WORK_SECONDS,
            break_seconds: BREAK_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PomodoroState {
    #[default]
    Idle,
    Working(u32),
    OnBreak(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BreakStarted,
    BreakEnded,
}

impl PomodoroState {
    pub fn tick(self, durations: PomodoroDurations) -> (Self, Option<Transition>) {
        match self {
            PomodoroState::Idle => (PomodoroState::Idle, None),
            PomodoroState::Working(remaining) if remaining <= 1 => (
                PomodoroState::OnBreak(durations.break_seconds),
                Some(Transition::BreakStarted),
            ),
            PomodoroState::Working(remaining) => (PomodoroState::Working(remaining - 1), None),
            PomodoroState::OnBreak(remaining) if remaining <= 1 => (
                PomodoroState::Working(durations.work_seconds),
                Some(Transition::BreakEnded),
            ),
            PomodoroState::OnBreak(remaining) => (PomodoroState::OnBreak(remaining - 1), None),
        }
    }

    pub fn status_text(self) -> String {
        match self {
            PomodoroState::Idle => "Idle".to_string(),
            PomodoroState::Working(remaining) => format!("Working - {}", clock(remaining)),
            PomodoroState::OnBreak(remaining) => format!("Break - {}", clock(remaining)),
        }
    }
}

fn clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PomodoroEngine {
    state: Arc<Mutex<PomodoroState>>,
    worker: Mutex<Option<Worker>>,
    durations: PomodoroDurations,
    event_tx: Option<EventSender>,
}

impl PomodoroEngine {
    pub fn new(durations: PomodoroDurations, event_tx: Option<EventSender>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PomodoroState::Idle)),
            worker: Mutex::new(None),
            durations,
            event_tx,
        }
    }

    pub fn state(&self) -> PomodoroState {
        *self.state.lock().expect("pomodoro state mutex poisoned")
    }

    pub fn status_text(&self) -> String {
        self.state().status_text()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .expect("pomodoro worker mutex poisoned")
            .is_some()
    }

    /// Idle -> Working. Must be called from within a tokio runtime. Returns
    /// false when a cycle is already running.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock().expect("pomodoro worker mutex poisoned");
        if worker.is_some() {
            return false;
        }

        let initial = PomodoroState::Working(self.durations.work_seconds);
        *self.state.lock().expect("pomodoro state mutex poisoned") = initial;
        send_event(
            &self.event_tx,
            LuminarEvent::PomodoroStatus(initial.status_text()),
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_pomodoro(
            self.state.clone(),
            self.durations,
            cancel.clone(),
            self.event_tx.clone(),
        ));
        *worker = Some(Worker { cancel, handle });
        log::info!("pomodoro started");
        true
    }

    /// Any state -> Idle. Waits for the worker to exit, so nothing it emits
    /// can arrive after this returns.
    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .expect("pomodoro worker mutex poisoned")
            .take();

        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(err) = worker.handle.await {
                log::error!("pomodoro worker failed to join: {err}");
            }
        }

        let was_idle = {
            let mut state = self.state.lock().expect("pomodoro state mutex poisoned");
            let was_idle = *state == PomodoroState::Idle;
            *state = PomodoroState::Idle;
            was_idle
        };
        if !was_idle {
            log::info!("pomodoro stopped");
            send_event(
                &self.event_tx,
                LuminarEvent::PomodoroStatus(PomodoroState::Idle.status_text()),
            );
        }
    }
}

async fn run_pomodoro(
    state: Arc<Mutex<PomodoroState>>,
    durations: PomodoroDurations,
    cancel: CancellationToken,
    event_tx: Option<EventSender>,
) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let (next, transition) = {
            let mut guard = state.lock().expect("pomodoro state mutex poisoned");
            let (next, transition) = guard.tick(durations);
            *guard = next;
            (next, transition)
        };

        match transition {
            Some(Transition::BreakStarted) => {
                log::info!("pomodoro: break started");
                send_event(&event_tx, LuminarEvent::BreakStarted);
            }
            Some(Transition::BreakEnded) => {
                log::info!("pomodoro: break ended");
                send_event(&event_tx, LuminarEvent::BreakEnded);
            }
            None => {}
        }
        send_event(&event_tx, LuminarEvent::PomodoroStatus(next.status_text()));
    }
}
