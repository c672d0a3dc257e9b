use crate::color::ColorPreset;
use crate::ledger::UsageRow;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum LuminarEvent {
    SessionStarted,
    StatusChanged(String),
    Warning(String),
    Info(String),
    /// `bright_ratio` is absent when the level came from the meeting override.
    BrightnessApplied {
        percent: u8,
        bright_ratio: Option<f64>,
    },
    ColorTemperatureApplied(ColorPreset),
    BreakReminder(String),
    SessionClosed {
        total_usage: String,
    },
    HistoryUpdated(Vec<UsageRow>),
    PomodoroStatus(String),
    BreakStarted,
    BreakEnded,
}

pub type EventSender = mpsc::UnboundedSender<LuminarEvent>;

pub fn send_event(event_tx: &Option<EventSender>, event: LuminarEvent) {
    if let Some(tx) = event_tx {
        let _ = tx.send(event);
    }
}
