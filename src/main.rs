use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use luminar::actuator::{Actuator, CommandActuator, DryRunActuator};
use luminar::config::{Config, ensure_sample_config};
use luminar::estimator::estimate;
use luminar::events::LuminarEvent;
use luminar::frame::{CommandFrameSource, FileFrameSource, FrameSource};
use luminar::ledger::UsageRow;
use luminar::meeting::ProcessMeetingDetector;
use luminar::paths::{default_config_path, default_profiles_path};
use luminar::pomodoro::PomodoroEngine;
use luminar::profile::{JsonProfileStore, Profile, ProfileStore};
use luminar::session::SessionController;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "luminar")]
#[command(about = "Adapt screen brightness to ambient light, with break reminders and a pomodoro timer")]
struct Cli {
    /// Config file (defaults to the platform data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a session and keep adjusting the display until stopped.
    Run(RunArgs),
    /// Estimate the brightness an image would produce.
    Estimate(EstimateArgs),
    /// Manage stored profiles.
    #[command(subcommand)]
    Profiles(ProfileCommand),
    /// Write a commented sample config if none exists.
    InitConfig,
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    #[arg(long)]
    profile: Option<String>,

    /// Stop automatically after this long (e.g. "90m").
    #[arg(long = "for", value_parser = parse_duration)]
    run_for: Option<Duration>,

    #[arg(long, action = ArgAction::SetTrue)]
    interactive: bool,

    /// Log values instead of changing the display.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Start the pomodoro timer alongside the session.
    #[arg(long, action = ArgAction::SetTrue)]
    pomodoro: bool,
}

#[derive(Debug, Args, Clone)]
struct EstimateArgs {
    image: PathBuf,
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    List,
    Show {
        name: String,
    },
    Save {
        name: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        brightness: Option<u8>,
        #[arg(long)]
        color_temperature: Option<u32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        break_minutes: Option<u32>,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Start,
    Stop,
    PomodoroStart,
    PomodoroStop,
    Status,
    History,
    Quit,
}

fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Run(args) => {
            let config = Config::load(&config_path)?;
            run_session(config, args).await
        }
        Commands::Estimate(args) => {
            let config = Config::load(&config_path)?;
            estimate_image(&config, &args.image).await
        }
        Commands::Profiles(command) => {
            let config = Config::load(&config_path)?;
            manage_profiles(&config, command)
        }
        Commands::InitConfig => {
            ensure_sample_config(&config_path)?;
            println!("config: {}", config_path.display());
            Ok(())
        }
    }
}

async fn run_session(config: Config, args: RunArgs) -> Result<()> {
    let controller_config = config.controller_config()?;
    let profiles: Arc<dyn ProfileStore> = Arc::new(open_profiles(&config));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut controller = SessionController::new(
        build_frame_source(&config),
        build_actuator(&config, args.dry_run),
        profiles,
        controller_config,
        Some(event_tx.clone()),
    );
    if config.meeting_override.enabled {
        controller = controller.with_meeting_detector(Arc::new(ProcessMeetingDetector::new(
            config.meeting_override.apps.clone(),
        )));
    }
    let pomodoro = PomodoroEngine::new(config.pomodoro.durations(), Some(event_tx));

    if let Some(name) = args.profile.clone().or_else(|| config.profiles.active.clone()) {
        match controller.select_profile(&name) {
            Ok(profile) => println!(
                "profile '{}' loaded (breaks every {} minutes)",
                profile.name, profile.break_interval_minutes
            ),
            Err(err) => eprintln!("{err}; continuing without a profile"),
        }
    }

    // The presentation side: every worker reports here, nothing else prints
    // session events.
    let event_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(event);
        }
    });

    let mut command_rx = if args.interactive {
        Some(spawn_console())
    } else {
        None
    };

    controller.start();
    if args.pomodoro {
        pomodoro.start();
    }

    let deadline = async {
        match args.run_for {
            Some(run_for) => tokio::time::sleep(run_for).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        let command = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            command = next_command(&mut command_rx) => command,
        };
        match command {
            Some(ConsoleCommand::Quit) => break,
            Some(command) => handle_command(command, &controller, &pomodoro).await,
            // stdin closed; keep running until ctrl-c or the deadline.
            None => command_rx = None,
        }
    }

    pomodoro.stop().await;
    controller.shutdown().await;
    println!("{}", controller.status_text());

    drop(controller);
    drop(pomodoro);
    event_handle.await.context("event task failed")?;
    Ok(())
}

async fn next_command(
    command_rx: &mut Option<mpsc::UnboundedReceiver<ConsoleCommand>>,
) -> Option<ConsoleCommand> {
    match command_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    command: ConsoleCommand,
    controller: &SessionController,
    pomodoro: &PomodoroEngine,
) {
    match command {
        ConsoleCommand::Start => {
            if !controller.start() {
                println!("session already running");
            }
        }
        ConsoleCommand::Stop => {
            if controller.stop().is_none() {
                println!("no active session");
            }
        }
        ConsoleCommand::PomodoroStart => {
            if !pomodoro.start() {
                println!("pomodoro already running");
            }
        }
        ConsoleCommand::PomodoroStop => pomodoro.stop().await,
        ConsoleCommand::Status => {
            println!("{}", controller.status_text());
            println!("Pomodoro status: {}", pomodoro.status_text());
        }
        ConsoleCommand::History => print_history(&controller.history()),
        ConsoleCommand::Quit => {}
    }
}

const CONSOLE_HELP: &str = "start | stop | pomodoro | pomodoro stop | status | history | quit";

fn spawn_console() -> mpsc::UnboundedReceiver<ConsoleCommand> {
    eprintln!("controls: {CONSOLE_HELP}");
    spawn_console_reader(io::BufReader::new(io::stdin()))
}

// Plain thread rather than spawn_blocking: the runtime joins blocking tasks on
// drop, and a read parked on stdin would hold the process open after `quit`.
fn spawn_console_reader<R>(reader: R) -> mpsc::UnboundedReceiver<ConsoleCommand>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(command) = parse_console_line(&line)
                && tx.send(command).is_err()
            {
                break;
            }
        }
    });
    rx
}

fn parse_console_line(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" => Some(ConsoleCommand::Start),
        "stop" => Some(ConsoleCommand::Stop),
        "pomodoro" | "pomodoro start" => Some(ConsoleCommand::PomodoroStart),
        "pomodoro stop" => Some(ConsoleCommand::PomodoroStop),
        "status" => Some(ConsoleCommand::Status),
        "history" => Some(ConsoleCommand::History),
        "quit" | "exit" => Some(ConsoleCommand::Quit),
        "" => None,
        _ => {
            eprintln!("unknown command. use: {CONSOLE_HELP}");
            None
        }
    }
}

fn print_event(event: LuminarEvent) {
    match event {
        LuminarEvent::SessionStarted => println!("session started"),
        LuminarEvent::StatusChanged(text) => println!("{text}"),
        LuminarEvent::Warning(message) => eprintln!("warning: {message}"),
        LuminarEvent::Info(message) => println!("{message}"),
        LuminarEvent::BrightnessApplied {
            percent,
            bright_ratio: Some(ratio),
        } => println!(
            "brightness {percent}% ({:.0}% bright pixels)",
            ratio * 100.0
        ),
        LuminarEvent::BrightnessApplied {
            percent,
            bright_ratio: None,
        } => println!("brightness {percent}% (override)"),
        LuminarEvent::ColorTemperatureApplied(preset) => {
            println!("color temperature adjusted to {preset}")
        }
        LuminarEvent::BreakReminder(message) => println!("health alert: {message}"),
        LuminarEvent::SessionClosed { total_usage } => {
            println!("session ended. total screen usage time: {total_usage}")
        }
        LuminarEvent::HistoryUpdated(rows) => print_history(&rows),
        LuminarEvent::PomodoroStatus(text) => println!("Pomodoro status: {text}"),
        LuminarEvent::BreakStarted => println!("pomodoro: time for a break!"),
        LuminarEvent::BreakEnded => println!("pomodoro: break over, ready to focus again?"),
    }
}

fn print_history(rows: &[UsageRow]) {
    if rows.is_empty() {
        println!("no completed sessions yet");
        return;
    }
    println!("{:<12} DURATION", "DATE");
    for row in rows {
        println!("{:<12} {}", row.date, row.duration);
    }
}

fn build_frame_source(config: &Config) -> Arc<dyn FrameSource> {
    match &config.camera.image {
        Some(path) => Arc::new(FileFrameSource::new(path)),
        None => Arc::new(CommandFrameSource::new(
            config.camera.command.clone(),
            config.session.capture_timeout(),
        )),
    }
}

fn build_actuator(config: &Config, dry_run: bool) -> Arc<dyn Actuator> {
    if dry_run || config.actuator.dry_run {
        return Arc::new(DryRunActuator);
    }
    Arc::new(CommandActuator::new(
        config.actuator.brightness_command.clone(),
        config.actuator.color_temperature_command.clone(),
    ))
}

fn open_profiles(config: &Config) -> JsonProfileStore {
    let path = config
        .profiles
        .path
        .clone()
        .unwrap_or_else(default_profiles_path);
    JsonProfileStore::open(path)
}

async fn estimate_image(config: &Config, image: &Path) -> Result<()> {
    let frame = FileFrameSource::new(image)
        .capture()
        .await
        .with_context(|| format!("failed to load {}", image.display()))?;
    let sample = estimate(&frame, config.brightness.scale);

    println!("threshold:      {:.1}", sample.threshold);
    println!("bright pixels:  {:.1}%", sample.bright_ratio * 100.0);
    println!("raw level:      {}", sample.raw_level);
    println!("adjusted level: {}", sample.adjusted_level);
    println!("brightness:     {}%", sample.percent);
    Ok(())
}

fn manage_profiles(config: &Config, command: ProfileCommand) -> Result<()> {
    let store = open_profiles(config);

    match command {
        ProfileCommand::List => {
            let names = store.list();
            if names.is_empty() {
                println!("no profiles in {}", store.path().display());
            }
            for name in names {
                println!("{name}");
            }
        }
        ProfileCommand::Show { name } => {
            let profile = store.lookup(&name)?;
            println!("name:              {}", profile.name);
            println!("brightness:        {}", profile.brightness_hint);
            println!("color temperature: {}K", profile.color_temperature_hint);
            println!("break every:       {} minutes", profile.break_interval_minutes);
        }
        ProfileCommand::Save {
            name,
            brightness,
            color_temperature,
            break_minutes,
        } => {
            let mut profile = store.lookup(&name).unwrap_or_else(|_| Profile::new(&name));
            if let Some(brightness) = brightness {
                profile.brightness_hint = brightness;
            }
            if let Some(color_temperature) = color_temperature {
                profile.color_temperature_hint = color_temperature;
            }
            if let Some(break_minutes) = break_minutes {
                profile.break_interval_minutes = break_minutes;
            }
            store.save(profile)?;
            println!("profile '{name}' saved");
        }
        ProfileCommand::Delete { name } => {
            store.delete(&name)?;
            println!("profile '{name}' deleted");
        }
    }
    Ok(())
}
