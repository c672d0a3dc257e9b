use std::sync::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

pub const DEFAULT_MEETING_APPS: [&str; 4] = ["zoom", "teams", "webex", "googletalk"];

/// Reports a running video-conferencing app, if any. While one is running the
/// brightness loop keeps the screen at full brightness.
pub trait MeetingDetector: Send + Sync {
    fn active_meeting(&self) -> Option<String>;
}

pub struct ProcessMeetingDetector {
    apps: Vec<String>,
    system: Mutex<System>,
}

impl ProcessMeetingDetector {
    pub fn new(apps: Vec<String>) -> Self {
        Self {
            apps: apps
                .into_iter()
                .map(|app| app.trim().to_ascii_lowercase())
                .filter(|app| !app.is_empty())
                .collect(),
            system: Mutex::new(System::new()),
        }
    }
}

impl MeetingDetector for ProcessMeetingDetector {
    fn active_meeting(&self) -> Option<String> {
        if self.apps.is_empty() {
            return None;
        }

        let mut system = self.system.lock().expect("process table mutex poisoned");
        system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        system.processes().values().find_map(|process| {
            let name = process.name().to_string_lossy().to_ascii_lowercase();
            matching_app(&name, &self.apps).map(ToOwned::to_owned)
        })
    }
}

fn matching_app<'a>(process_name: &str, apps: &'a [String]) -> Option<&'a str> {
    let stem = process_name
        .strip_suffix(".exe")
        .unwrap_or(process_name);
    apps.iter()
        .map(String::as_str)
        .find(|app| stem == *app || stem.starts_with(&format!("{app}.")))
}
