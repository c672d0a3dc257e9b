use crate::error::ActuatorError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

#[async_trait]
pub trait Actuator: Send + Sync {
    async fn set_brightness(&self, percent: u8) -> Result<(), ActuatorError>;
    async fn set_color_temperature(&self, kelvin: u32) -> Result<(), ActuatorError>;
}

pub const VALUE_PLACEHOLDER: &str = "{value}";
const ACTUATOR_TIMEOUT: Duration = Duration::from_secs(10);

// stderr fragments that mean the control does not exist, not that it failed once.
const UNSUPPORTED_MARKERS: [&str; 4] = [
    "invalid class",
    "not supported",
    "no backlight",
    "no such device",
];

#[derive(Debug, Clone)]
pub struct CommandActuator {
    brightness_argv: Vec<String>,
    color_temperature_argv: Vec<String>,
}

impl CommandActuator {
    pub fn new(brightness_argv: Vec<String>, color_temperature_argv: Vec<String>) -> Self {
        Self {
            brightness_argv,
            color_temperature_argv,
        }
    }
}

#[async_trait]
impl Actuator for CommandActuator {
    async fn set_brightness(&self, percent: u8) -> Result<(), ActuatorError> {
        run_template("brightness", &self.brightness_argv, &percent.min(100).to_string()).await
    }

    async fn set_color_temperature(&self, kelvin: u32) -> Result<(), ActuatorError> {
        run_template(
            "color temperature",
            &self.color_temperature_argv,
            &kelvin.to_string(),
        )
        .await
    }
}

async fn run_template(
    control: &'static str,
    template: &[String],
    value: &str,
) -> Result<(), ActuatorError> {
    let argv: Vec<String> = template
        .iter()
        .map(|arg| arg.replace(VALUE_PLACEHOLDER, value))
        .collect();
    let Some((program, args)) = argv.split_first() else {
        return Err(ActuatorError::Unsupported {
            control,
            reason: "no command configured".to_string(),
        });
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(ACTUATOR_TIMEOUT, command.output()).await {
        Err(_) => {
            return Err(ActuatorError::Transient {
                control,
                reason: format!("{program} timed out"),
            });
        }
        Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
            return Err(ActuatorError::Unsupported {
                control,
                reason: format!("{program} is not installed"),
            });
        }
        Ok(Err(err)) => {
            return Err(ActuatorError::Transient {
                control,
                reason: format!("failed to run {program}: {err}"),
            });
        }
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let lowered = stderr.to_ascii_lowercase();
    let reason = format!("{program} exited with {}: {stderr}", output.status);
    if UNSUPPORTED_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        Err(ActuatorError::Unsupported { control, reason })
    } else {
        Err(ActuatorError::Transient { control, reason })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunActuator;

#[async_trait]
impl Actuator for DryRunActuator {
    async fn set_brightness(&self, percent: u8) -> Result<(), ActuatorError> {
        log::info!("dry run: brightness -> {percent}%");
        Ok(())
    }

    async fn set_color_temperature(&self, kelvin: u32) -> Result<(), ActuatorError> {
        log::info!("dry run: color temperature -> {kelvin}K");
        Ok(())
    }
}
