use crate::actuator::Actuator;
use crate::color::preset_for_hour;
use crate::error::ProfileError;
use crate::estimator::{BrightnessScale, estimate};
use crate::events::{EventSender, LuminarEvent, send_event};
use crate::frame::FrameSource;
use crate::ledger::{UsageLedger, UsageRecord, UsageRow, format_total_usage};
use crate::meeting::MeetingDetector;
use crate::profile::{Profile, ProfileStore};
use crate::scheduler::{BreakTimer, MonitorIntervals};
use chrono::{Local, Timelike};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub started_at: Option<Instant>,
    pub is_active: bool,
    pub accumulated_seconds: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    pub intervals: MonitorIntervals,
    pub scale: BrightnessScale,
}

#[derive(Clone)]
struct LoopContext {
    session: Arc<Mutex<Session>>,
    frame_source: Arc<dyn FrameSource>,
    actuator: Arc<dyn Actuator>,
    profiles: Arc<dyn ProfileStore>,
    active_profile: Arc<Mutex<Option<String>>>,
    meeting_detector: Option<Arc<dyn MeetingDetector>>,
    config: ControllerConfig,
    event_tx: Option<EventSender>,
}

impl LoopContext {
    fn is_active(&self) -> bool {
        self.session
            .lock()
            .expect("session mutex poisoned")
            .is_active
    }

    fn current_profile(&self) -> Option<Profile> {
        let name = self
            .active_profile
            .lock()
            .expect("active profile mutex poisoned")
            .clone()?;
        match self.profiles.lookup(&name) {
            Ok(profile) => Some(profile),
            Err(err) => {
                log::debug!("active profile unavailable: {err}");
                None
            }
        }
    }

    fn usage_text(&self) -> String {
        usage_text(&self.session.lock().expect("session mutex poisoned"))
    }
}

#[derive(Default)]
struct Supervisor {
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    fn reap_finished(&mut self) {
        self.handles.retain(|handle| !handle.is_finished());
    }
}

pub struct SessionController {
    ctx: LoopContext,
    ledger: Arc<Mutex<UsageLedger>>,
    supervisor: Mutex<Supervisor>,
}

impl SessionController {
    pub fn new(
        frame_source: Arc<dyn FrameSource>,
        actuator: Arc<dyn Actuator>,
        profiles: Arc<dyn ProfileStore>,
        config: ControllerConfig,
        event_tx: Option<EventSender>,
    ) -> Self {
        Self {
            ctx: LoopContext {
                session: Arc::new(Mutex::new(Session::default())),
                frame_source,
                actuator,
                profiles,
                active_profile: Arc::new(Mutex::new(None)),
                meeting_detector: None,
                config,
                event_tx,
            },
            ledger: Arc::new(Mutex::new(UsageLedger::new())),
            supervisor: Mutex::new(Supervisor::default()),
        }
    }

    pub fn with_meeting_detector(mut self, detector: Arc<dyn MeetingDetector>) -> Self {
        self.ctx.meeting_detector = Some(detector);
        self
    }

    /// Opens a session and launches the brightness, health and color loops.
    /// Must be called from within a tokio runtime. Returns false when a
    /// session is already active.
    pub fn start(&self) -> bool {
        let mut supervisor = self.supervisor.lock().expect("supervisor mutex poisoned");

        let started_at = {
            let mut session = self.ctx.session.lock().expect("session mutex poisoned");
            if session.is_active {
                log::debug!("start ignored: session already active");
                return false;
            }
            session.is_active = true;
            *session.started_at.get_or_insert_with(Instant::now)
        };

        self.ledger
            .lock()
            .expect("ledger mutex poisoned")
            .record_start(Local::now());

        supervisor.reap_finished();
        let cancel = CancellationToken::new();
        supervisor.handles.push(tokio::spawn(brightness_loop(
            self.ctx.clone(),
            cancel.clone(),
        )));
        supervisor.handles.push(tokio::spawn(health_loop(
            self.ctx.clone(),
            cancel.clone(),
            started_at,
        )));
        supervisor
            .handles
            .push(tokio::spawn(color_loop(self.ctx.clone(), cancel.clone())));
        supervisor.cancel = Some(cancel);

        log::info!("session started");
        send_event(&self.ctx.event_tx, LuminarEvent::SessionStarted);
        send_event(
            &self.ctx.event_tx,
            LuminarEvent::StatusChanged(self.status_text()),
        );
        true
    }

    /// Closes the active session and signals its loops to finish. A tick that
    /// is already running completes on its own. Returns the total usage text,
    /// or `None` when no session was active.
    pub fn stop(&self) -> Option<String> {
        let mut supervisor = self.supervisor.lock().expect("supervisor mutex poisoned");

        let total_seconds = {
            let mut session = self.ctx.session.lock().expect("session mutex poisoned");
            if !session.is_active {
                log::debug!("stop ignored: no active session");
                return None;
            }
            let elapsed = session
                .started_at
                .take()
                .map(|started_at| started_at.elapsed().as_secs_f64())
                .unwrap_or_default();
            session.accumulated_seconds += elapsed;
            session.is_active = false;
            session.accumulated_seconds
        };

        if let Some(cancel) = supervisor.cancel.take() {
            cancel.cancel();
        }

        let history = {
            let mut ledger = self.ledger.lock().expect("ledger mutex poisoned");
            if let Err(err) = ledger.record_stop(Local::now()) {
                log::debug!("usage ledger: {err}");
            }
            ledger.closed_records()
        };

        let total_usage = format_total_usage(total_seconds);
        log::info!("session stopped; total screen usage {total_usage}");
        send_event(
            &self.ctx.event_tx,
            LuminarEvent::SessionClosed {
                total_usage: total_usage.clone(),
            },
        );
        send_event(&self.ctx.event_tx, LuminarEvent::HistoryUpdated(history));
        send_event(
            &self.ctx.event_tx,
            LuminarEvent::StatusChanged(self.status_text()),
        );
        Some(total_usage)
    }

    pub async fn shutdown(&self) {
        self.stop();
        let handles = {
            let mut supervisor = self.supervisor.lock().expect("supervisor mutex poisoned");
            std::mem::take(&mut supervisor.handles)
        };
        for handle in handles {
            if let Err(err) = handle.await {
                log::error!("monitor loop failed to join: {err}");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.ctx.is_active()
    }

    pub fn session(&self) -> Session {
        self.ctx
            .session
            .lock()
            .expect("session mutex poisoned")
            .clone()
    }

    pub fn total_usage_seconds(&self) -> f64 {
        let session = self.session();
        session.accumulated_seconds + running_seconds(&session)
    }

    pub fn status_text(&self) -> String {
        self.ctx.usage_text()
    }

    pub fn history(&self) -> Vec<UsageRow> {
        self.ledger
            .lock()
            .expect("ledger mutex poisoned")
            .closed_records()
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.ledger
            .lock()
            .expect("ledger mutex poisoned")
            .records()
            .to_vec()
    }

    #[cfg(test)]
    fn live_workers(&self) -> usize {
        self.supervisor
            .lock()
            .expect("supervisor mutex poisoned")
            .handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn lookup_profile(&self, name: &str) -> Result<Profile, ProfileError> {
        self.ctx.profiles.lookup(name)
    }

    pub fn select_profile(&self, name: &str) -> Result<Profile, ProfileError> {
        let profile = self.ctx.profiles.lookup(name)?;
        *self
            .ctx
            .active_profile
            .lock()
            .expect("active profile mutex poisoned") = Some(profile.name.clone());
        log::info!("profile '{}' selected", profile.name);
        Ok(profile)
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.ctx.current_profile()
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.ctx.profiles
    }
}

fn running_seconds(session: &Session) -> f64 {
    match (session.is_active, session.started_at) {
        (true, Some(started_at)) => started_at.elapsed().as_secs_f64(),
        _ => 0.0,
    }
}

fn usage_text(session: &Session) -> String {
    if !session.is_active && session.accumulated_seconds == 0.0 {
        return "Screen usage: not started".to_string();
    }
    let total = session.accumulated_seconds + running_seconds(session);
    format!("Total screen usage: {} minutes", (total / 60.0) as u64)
}

async fn next_tick(
    ctx: &LoopContext,
    ticker: &mut tokio::time::Interval,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return false,
        _ = ticker.tick() => {}
    }
    ctx.is_active()
}

fn ticker(every: Duration) -> tokio::time::Interval {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn brightness_loop(ctx: LoopContext, cancel: CancellationToken) {
    let mut ticker = ticker(ctx.config.intervals.brightness_every);
    let mut meeting: Option<String> = None;

    while next_tick(&ctx, &mut ticker, &cancel).await {
        brightness_tick(&ctx, &mut meeting).await;
    }
    log::debug!("brightness loop exited");
}

async fn brightness_tick(ctx: &LoopContext, meeting: &mut Option<String>) {
    if let Some(detector) = ctx.meeting_detector.clone() {
        let detected = tokio::task::spawn_blocking(move || detector.active_meeting())
            .await
            .unwrap_or_else(|err| {
                log::warn!("meeting detection failed to join: {err}");
                None
            });

        match (&detected, meeting.as_ref()) {
            (Some(app), None) => send_event(
                &ctx.event_tx,
                LuminarEvent::Info(format!(
                    "Video conference detected ({app}); holding full brightness."
                )),
            ),
            (None, Some(_)) => send_event(
                &ctx.event_tx,
                LuminarEvent::Info("Video conference ended; adaptive brightness resumed.".to_string()),
            ),
            _ => {}
        }
        *meeting = detected;

        if meeting.is_some() {
            apply_brightness(ctx, 100, None).await;
            return;
        }
    }

    let frame = match ctx.frame_source.capture().await {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("brightness tick skipped: {err}");
            send_event(&ctx.event_tx, LuminarEvent::Warning(err.to_string()));
            return;
        }
    };

    let scale = ctx.config.scale;
    let sample = match tokio::task::spawn_blocking(move || estimate(&frame, scale)).await {
        Ok(sample) => sample,
        Err(err) => {
            log::error!("brightness estimation failed to join: {err}");
            return;
        }
    };
    log::debug!(
        "brightness sample: ratio {:.3}, raw {}, adjusted {}, threshold {:.1}",
        sample.bright_ratio,
        sample.raw_level,
        sample.adjusted_level,
        sample.threshold
    );

    apply_brightness(ctx, sample.percent, Some(sample.bright_ratio)).await;
}

async fn apply_brightness(ctx: &LoopContext, percent: u8, bright_ratio: Option<f64>) {
    let percent = percent.min(100);
    match ctx.actuator.set_brightness(percent).await {
        Ok(()) => {
            log::info!("brightness set to {percent}%");
            send_event(
                &ctx.event_tx,
                LuminarEvent::BrightnessApplied {
                    percent,
                    bright_ratio,
                },
            );
        }
        Err(err) => {
            log::warn!("{err}");
            send_event(&ctx.event_tx, LuminarEvent::Warning(err.to_string()));
        }
    }
}

async fn health_loop(ctx: LoopContext, cancel: CancellationToken, started_at: Instant) {
    let break_after = ctx.config.intervals.break_after;
    let mut ticker = ticker(ctx.config.intervals.health_every);
    let mut timer = BreakTimer::new(break_after, started_at);
    let mut last_status = String::new();

    while next_tick(&ctx, &mut ticker, &cancel).await {
        let now = Instant::now();
        if timer.is_due(now) {
            let message = break_message(break_after, ctx.current_profile().as_ref());
            log::info!("{message}");
            send_event(&ctx.event_tx, LuminarEvent::BreakReminder(message));
            timer.mark_reminded(now);
        } else {
            log::debug!(
                "next break reminder in {}",
                humantime::format_duration(Duration::from_secs(
                    timer.time_until_due(now).as_secs()
                ))
            );
        }

        let status = ctx.usage_text();
        if status != last_status {
            send_event(&ctx.event_tx, LuminarEvent::StatusChanged(status.clone()));
            last_status = status;
        }
    }
    log::debug!("health loop exited");
}

fn break_message(break_after: Duration, profile: Option<&Profile>) -> String {
    let mut message = format!(
        "You've been using the screen for {}. Consider taking a break!",
        describe_span(break_after)
    );
    if let Some(profile) = profile {
        message.push_str(&format!(
            " Profile '{}' suggests a break every {} minutes.",
            profile.name, profile.break_interval_minutes
        ));
    }
    message
}

fn describe_span(span: Duration) -> String {
    let seconds = span.as_secs();
    if seconds >= 60 && seconds % 60 == 0 {
        format!("{} minutes", seconds / 60)
    } else {
        format!("{seconds} seconds")
    }
}

async fn color_loop(ctx: LoopContext, cancel: CancellationToken) {
    let mut ticker = ticker(ctx.config.intervals.color_every);

    while next_tick(&ctx, &mut ticker, &cancel).await {
        let preset = preset_for_hour(Local::now().hour());
        match ctx.actuator.set_color_temperature(preset.kelvin()).await {
            Ok(()) => {
                log::info!("color temperature set to {preset}");
                send_event(&ctx.event_tx, LuminarEvent::ColorTemperatureApplied(preset));
            }
            Err(err) if err.is_unsupported() => {
                log::warn!("{err}");
                send_event(
                    &ctx.event_tx,
                    LuminarEvent::Warning(format!(
                        "{err}. Your system may not support this feature."
                    )),
                );
            }
            Err(err) => {
                log::warn!("{err}");
                send_event(&ctx.event_tx, LuminarEvent::Warning(err.to_string()));
            }
        }
    }
    log::debug!("color loop exited");
}

#[cfg(test)]
mod tests {
    use super::{ControllerConfig, SessionController, break_message};
    use crate::actuator::Actuator;
    use crate::error::{ActuatorError, ProfileError, SensorError};
    use crate::events::LuminarEvent;
    use crate::frame::{Frame, FrameSource};
    use crate::meeting::MeetingDetector;
    use crate::profile::{JsonProfileStore, Profile, ProfileStore};
    use crate::scheduler::MonitorIntervals;
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tokio::sync::mpsc;

    struct StaticFrameSource {
        frame: Option<Frame>,
        captures: AtomicUsize,
    }

    impl StaticFrameSource {
        fn bright_percent(percent: u32) -> Self {
            let frame = GrayImage::from_fn(10, 10, |x, y| {
                if y * 10 + x < percent { Luma([255]) } else { Luma([0]) }
            });
            Self {
                frame: Some(DynamicImage::ImageLuma8(frame)),
                captures: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                frame: None,
                captures: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameSource for StaticFrameSource {
        async fn capture(&self) -> Result<Frame, SensorError> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            self.frame
                .clone()
                .ok_or_else(|| SensorError::unavailable("camera busy"))
        }
    }

    #[derive(Default)]
    struct RecordingActuator {
        brightness: Mutex<Vec<u8>>,
        color: Mutex<Vec<u32>>,
        brightness_transient: bool,
        color_unsupported: bool,
    }

    #[async_trait]
    impl Actuator for RecordingActuator {
        async fn set_brightness(&self, percent: u8) -> Result<(), ActuatorError> {
            self.brightness.lock().expect("brightness").push(percent);
            if self.brightness_transient {
                return Err(ActuatorError::Transient {
                    control: "brightness",
                    reason: "backlight busy".to_string(),
                });
            }
            Ok(())
        }

        async fn set_color_temperature(&self, kelvin: u32) -> Result<(), ActuatorError> {
            self.color.lock().expect("color").push(kelvin);
            if self.color_unsupported {
                return Err(ActuatorError::Unsupported {
                    control: "color temperature",
                    reason: "no gamma control".to_string(),
                });
            }
            Ok(())
        }
    }

    struct AlwaysInMeeting;

    impl MeetingDetector for AlwaysInMeeting {
        fn active_meeting(&self) -> Option<String> {
            Some("zoom".to_string())
        }
    }

    struct Harness {
        controller: SessionController,
        frames: Arc<StaticFrameSource>,
        actuator: Arc<RecordingActuator>,
        events: mpsc::UnboundedReceiver<LuminarEvent>,
        _temp: TempDir,
    }

    fn harness(
        frames: StaticFrameSource,
        actuator: RecordingActuator,
        intervals: MonitorIntervals,
    ) -> Harness {
        let temp = tempdir().expect("tempdir");
        let profiles: Arc<dyn ProfileStore> =
            Arc::new(JsonProfileStore::open(temp.path().join("profiles.json")));
        let frames = Arc::new(frames);
        let actuator = Arc::new(actuator);
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(
            frames.clone(),
            actuator.clone(),
            profiles,
            ControllerConfig {
                intervals,
                ..ControllerConfig::default()
            },
            Some(tx),
        );
        Harness {
            controller,
            frames,
            actuator,
            events: rx,
            _temp: temp,
        }
    }

    fn fast_intervals() -> MonitorIntervals {
        MonitorIntervals {
            brightness_every: Duration::from_millis(30),
            health_every: Duration::from_millis(30),
            color_every: Duration::from_millis(30),
            break_after: Duration::from_secs(3600),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LuminarEvent>) -> Vec<LuminarEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn double_start_opens_one_record() {
        let h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            MonitorIntervals::default(),
        );

        assert!(h.controller.start());
        assert!(!h.controller.start());

        let records = h.controller.usage_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_open());

        h.controller.shutdown().await;
        assert_eq!(h.controller.live_workers(), 0);
    }

    #[tokio::test]
    async fn stop_without_start_changes_nothing() {
        let mut h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            MonitorIntervals::default(),
        );

        assert_eq!(h.controller.stop(), None);
        assert!(h.controller.usage_records().is_empty());
        assert!(!h.controller.is_active());
        assert_eq!(h.controller.session().accumulated_seconds, 0.0);
        assert!(drain(&mut h.events).is_empty());
        assert_eq!(h.controller.status_text(), "Screen usage: not started");
    }

    #[tokio::test]
    async fn start_wait_stop_accumulates_elapsed_time() {
        let mut h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            MonitorIntervals::default(),
        );

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let total = h.controller.stop().expect("session was active");
        assert_eq!(total, "0 minutes and 0 seconds");

        let accumulated = h.controller.session().accumulated_seconds;
        assert!((0.19..1.0).contains(&accumulated), "{accumulated}");

        let records = h.controller.usage_records();
        let last = records.last().expect("record");
        let span = last.ended_at.expect("closed") - last.started_at;
        assert!((190..1000).contains(&span.num_milliseconds()), "{span}");

        let events = drain(&mut h.events);
        assert!(events.contains(&LuminarEvent::SessionClosed {
            total_usage: total.clone()
        }));
        assert!(events.iter().any(|event| matches!(
            event,
            LuminarEvent::HistoryUpdated(rows) if rows.len() == 1
        )));

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn accumulated_time_grows_across_sessions() {
        let h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            MonitorIntervals::default(),
        );

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.controller.stop();
        let first = h.controller.session().accumulated_seconds;

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.controller.stop();
        let second = h.controller.session().accumulated_seconds;

        assert!(second > first);
        assert_eq!(h.controller.history().len(), 2);
        assert_eq!(h.controller.status_text(), "Total screen usage: 0 minutes");
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn brightness_loop_applies_estimated_level() {
        let mut h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            fast_intervals(),
        );

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.controller.shutdown().await;

        let applied = h.actuator.brightness.lock().expect("brightness").clone();
        assert!(!applied.is_empty());
        assert!(applied.iter().all(|percent| *percent == 47));
        assert!(drain(&mut h.events).iter().any(|event| matches!(
            event,
            LuminarEvent::BrightnessApplied { percent: 47, bright_ratio: Some(_) }
        )));
    }

    #[tokio::test]
    async fn camera_failures_do_not_stop_session_or_siblings() {
        let mut h = harness(
            StaticFrameSource::unavailable(),
            RecordingActuator::default(),
            fast_intervals(),
        );

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(h.controller.is_active());
        assert!(h.frames.captures.load(Ordering::SeqCst) >= 2);
        assert!(h.actuator.brightness.lock().expect("brightness").is_empty());
        assert!(h.actuator.color.lock().expect("color").len() >= 2);

        let events = drain(&mut h.events);
        assert!(events.iter().any(|event| matches!(
            event,
            LuminarEvent::Warning(message) if message.contains("camera busy")
        )));
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn unsupported_color_control_warns_and_keeps_ticking() {
        let mut h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator {
                color_unsupported: true,
                ..RecordingActuator::default()
            },
            fast_intervals(),
        );

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.controller.shutdown().await;

        assert!(h.actuator.color.lock().expect("color").len() >= 2);
        let warnings = drain(&mut h.events)
            .into_iter()
            .filter(|event| matches!(
                event,
                LuminarEvent::Warning(message) if message.contains("may not support")
            ))
            .count();
        assert!(warnings >= 2);
    }

    #[tokio::test]
    async fn transient_brightness_failure_warns_and_waits_for_next_tick() {
        let mut h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator {
                brightness_transient: true,
                ..RecordingActuator::default()
            },
            fast_intervals(),
        );

        h.controller.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(h.controller.is_active());
        h.controller.shutdown().await;

        let calls = h.actuator.brightness.lock().expect("brightness").len();
        let ticks = h.frames.captures.load(Ordering::SeqCst);
        assert!(calls >= 2, "{calls}");
        assert_eq!(calls, ticks);

        let events = drain(&mut h.events);
        let warnings = events
            .iter()
            .filter(|event| matches!(
                event,
                LuminarEvent::Warning(message) if message.contains("backlight busy")
            ))
            .count();
        assert_eq!(warnings, calls);
        assert!(!events
            .iter()
            .any(|event| matches!(event, LuminarEvent::BrightnessApplied { .. })));
    }

    #[tokio::test]
    async fn profile_selection_follows_the_store() {
        let h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            MonitorIntervals::default(),
        );

        assert_eq!(
            h.controller.select_profile("missing"),
            Err(ProfileError::NotFound("missing".to_string()))
        );
        assert_eq!(h.controller.current_profile(), None);

        let mut desk = Profile::new("desk");
        desk.brightness_hint = 70;
        h.controller.profiles().save(desk.clone()).expect("save");
        assert_eq!(h.controller.select_profile("desk"), Ok(desk.clone()));
        assert_eq!(h.controller.current_profile(), Some(desk));

        h.controller.profiles().delete("desk").expect("delete");
        assert_eq!(h.controller.current_profile(), None);

        let message = super::break_message(
            Duration::from_secs(1800),
            h.controller.current_profile().as_ref(),
        );
        assert!(!message.contains("Profile"));
    }

    #[tokio::test]
    async fn meeting_override_holds_full_brightness() {
        let temp = tempdir().expect("tempdir");
        let frames = Arc::new(StaticFrameSource::bright_percent(30));
        let actuator = Arc::new(RecordingActuator::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(
            frames.clone(),
            actuator.clone(),
            Arc::new(JsonProfileStore::open(temp.path().join("profiles.json"))),
            ControllerConfig {
                intervals: fast_intervals(),
                ..ControllerConfig::default()
            },
            Some(tx),
        )
        .with_meeting_detector(Arc::new(AlwaysInMeeting));

        controller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.shutdown().await;

        assert_eq!(frames.captures.load(Ordering::SeqCst), 0);
        let applied = actuator.brightness.lock().expect("brightness").clone();
        assert!(!applied.is_empty());
        assert!(applied.iter().all(|percent| *percent == 100));

        let infos = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, LuminarEvent::Info(_)))
            .count();
        assert_eq!(infos, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn break_reminder_fires_every_thirty_minutes() {
        let mut h = harness(
            StaticFrameSource::unavailable(),
            RecordingActuator::default(),
            MonitorIntervals::default(),
        );
        let mut profile = Profile::new("desk");
        profile.break_interval_minutes = 45;
        h.controller
            .profiles()
            .save(profile)
            .expect("save profile");
        h.controller.select_profile("desk").expect("select");

        h.controller.start();
        let started_at = h.controller.session().started_at;

        tokio::time::sleep(Duration::from_secs(1795)).await;
        let reminders = |events: &[LuminarEvent]| {
            events
                .iter()
                .filter(|event| matches!(event, LuminarEvent::BreakReminder(_)))
                .count()
        };
        assert_eq!(reminders(&drain(&mut h.events)), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let events = drain(&mut h.events);
        assert_eq!(reminders(&events), 1);
        assert!(events.iter().any(|event| matches!(
            event,
            LuminarEvent::BreakReminder(message)
                if message.contains("30 minutes") && message.contains("every 45 minutes")
        )));

        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(reminders(&drain(&mut h.events)), 1);

        assert_eq!(h.controller.session().started_at, started_at);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn restarts_leave_no_orphaned_workers() {
        let h = harness(
            StaticFrameSource::bright_percent(30),
            RecordingActuator::default(),
            fast_intervals(),
        );

        for _ in 0..3 {
            assert!(h.controller.start());
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(h.controller.stop().is_some());
        }
        h.controller.shutdown().await;
        assert_eq!(h.controller.live_workers(), 0);

        let calls = h.actuator.brightness.lock().expect("brightness").len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.actuator.brightness.lock().expect("brightness").len(), calls);
    }

    #[test]
    fn break_message_mentions_profile_interval() {
        let message = break_message(Duration::from_secs(1800), None);
        assert_eq!(
            message,
            "You've been using the screen for 30 minutes. Consider taking a break!"
        );

        let profile = Profile::new("night");
        let message = break_message(Duration::from_secs(90), Some(&profile));
        assert!(message.contains("90 seconds"));
        assert!(message.ends_with("Profile 'night' suggests a break every 25 minutes."));
    }
}
