use crate::estimator::BrightnessScale;
use crate::meeting::DEFAULT_MEETING_APPS;
use crate::pomodoro::PomodoroDurations;
use crate::scheduler::MonitorIntervals;
use crate::session::ControllerConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub brightness: BrightnessSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub actuator: ActuatorSection,
    #[serde(default)]
    pub profiles: ProfilesSection,
    #[serde(default)]
    pub meeting_override: MeetingOverrideSection,
    #[serde(default)]
    pub pomodoro: PomodoroSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub brightness_every_secs: u64,
    pub health_every_secs: u64,
    pub color_every_secs: u64,
    pub break_after_secs: u64,
    pub capture_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        let intervals = MonitorIntervals::default();
        Self {
            brightness_every_secs: intervals.brightness_every.as_secs(),
            health_every_secs: intervals.health_every.as_secs(),
            color_every_secs: intervals.color_every.as_secs(),
            break_after_secs: intervals.break_after.as_secs(),
            capture_timeout_secs: 10,
        }
    }
}

impl SessionSection {
    pub fn intervals(&self) -> MonitorIntervals {
        MonitorIntervals {
            brightness_every: Duration::from_secs(self.brightness_every_secs),
            health_every: Duration::from_secs(self.health_every_secs),
            color_every: Duration::from_secs(self.color_every_secs),
            break_after: Duration::from_secs(self.break_after_secs),
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrightnessSection {
    pub scale: BrightnessScale,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CameraSection {
    pub command: Vec<String>,
    pub image: Option<PathBuf>,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            command: default_camera_command(),
            image: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActuatorSection {
    pub brightness_command: Vec<String>,
    pub color_temperature_command: Vec<String>,
    pub dry_run: bool,
}

impl Default for ActuatorSection {
    fn default() -> Self {
        let (brightness_command, color_temperature_command) = default_actuator_commands();
        Self {
            brightness_command,
            color_temperature_command,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfilesSection {
    pub path: Option<PathBuf>,
    pub active: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MeetingOverrideSection {
    pub enabled: bool,
    pub apps: Vec<String>,
}

impl Default for MeetingOverrideSection {
    fn default() -> Self {
        Self {
            enabled: false,
            apps: DEFAULT_MEETING_APPS.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PomodoroSection {
    pub work_minutes: u32,
    pub break_minutes: u32,
}

impl Default for PomodoroSection {
    fn default() -> Self {
        let durations = PomodoroDurations::default();
        Self {
            work_minutes: durations.work_seconds / 60,
            break_minutes: durations.break_seconds / 60,
        }
    }
}

impl PomodoroSection {
    pub fn durations(&self) -> PomodoroDurations {
        PomodoroDurations {
            work_seconds: self.work_minutes.max(1) * 60,
            break_seconds: self.break_minutes.max(1) * 60,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| {
            format!("failed to parse config {} (expected TOML)", path.display())
        })
    }

    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let intervals = self.session.intervals();
        intervals
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid [session] settings")?;
        Ok(ControllerConfig {
            intervals,
            scale: self.brightness.scale,
        })
    }
}

#[cfg(target_os = "macos")]
fn default_camera_command() -> Vec<String> {
    ffmpeg_single_frame(&["-f", "avfoundation", "-framerate", "30", "-i", "0"])
}

#[cfg(windows)]
fn default_camera_command() -> Vec<String> {
    ffmpeg_single_frame(&["-f", "dshow", "-i", "video=Integrated Camera"])
}

#[cfg(not(any(target_os = "macos", windows)))]
fn default_camera_command() -> Vec<String> {
    ffmpeg_single_frame(&["-f", "v4l2", "-i", "/dev/video0"])
}

fn ffmpeg_single_frame(input: &[&str]) -> Vec<String> {
    let mut argv = vec!["ffmpeg", "-hide_banner", "-loglevel", "error"];
    argv.extend_from_slice(input);
    argv.extend_from_slice(&["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"]);
    argv.into_iter().map(str::to_string).collect()
}

#[cfg(windows)]
fn default_actuator_commands() -> (Vec<String>, Vec<String>) {
    let brightness = vec![
        "powershell".to_string(),
        "-Command".to_string(),
        "(Get-WmiObject -Namespace root/WMI -Class WmiMonitorBrightnessMethods).WmiSetBrightness(1, {value})"
            .to_string(),
    ];
    (brightness, Vec::new())
}

#[cfg(not(windows))]
fn default_actuator_commands() -> (Vec<String>, Vec<String>) {
    (
        vec![
            "brightnessctl".to_string(),
            "--quiet".to_string(),
            "set".to_string(),
            "{value}%".to_string(),
        ],
        vec![
            "redshift".to_string(),
            "-P".to_string(),
            "-O".to_string(),
            "{value}".to_string(),
        ],
    )
}

pub fn ensure_sample_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config parent directory {}",
                parent.display()
            )
        })?;
    }

    let sample = r#"# Luminar configuration (TOML)
#
# Every key is optional; missing keys fall back to the values shown here.

[session]
# Seconds between ambient-light samples.
brightness_every_secs = 10
# Seconds between break checks, and continuous screen time before a reminder.
health_every_secs = 10
break_after_secs = 1800
# Seconds between day/night color-temperature checks.
color_every_secs = 3600
capture_timeout_secs = 10

[brightness]
# "clamp" passes the 0-255 level through capped at 100, "proportional" rescales it.
scale = "clamp"

[camera]
# Must print exactly one encoded frame (PNG) to stdout.
# command = ["ffmpeg", "-hide_banner", "-loglevel", "error", "-f", "v4l2", "-i", "/dev/video0", "-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"]
# Use a still image instead of the camera.
# image = "/path/to/frame.png"

[actuator]
# "{value}" is replaced by the brightness percent or the color temperature in kelvin.
# brightness_command = ["brightnessctl", "--quiet", "set", "{value}%"]
# color_temperature_command = ["redshift", "-P", "-O", "{value}"]
dry_run = false

[profiles]
# path = "/path/to/profiles.json"
# active = "desk"

[meeting_override]
# Hold full brightness while one of these processes is running.
enabled = false
apps = ["zoom", "teams", "webex", "googletalk"]

[pomodoro]
work_minutes = 25
break_minutes = 5
"#;

    std::fs::write(path, sample)
        .with_context(|| format!("failed to write sample config {}", path.display()))?;
    Ok(())
}
