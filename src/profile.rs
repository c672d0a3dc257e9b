use crate::error::ProfileError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_BRIGHTNESS_HINT: u8 = 50;
pub const DEFAULT_COLOR_TEMPERATURE_HINT: u32 = 6500;
pub const DEFAULT_BREAK_INTERVAL_MINUTES: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub brightness_hint: u8,
    pub color_temperature_hint: u32,
    pub break_interval_minutes: u32,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brightness_hint: DEFAULT_BRIGHTNESS_HINT,
            color_temperature_hint: DEFAULT_COLOR_TEMPERATURE_HINT,
            break_interval_minutes: DEFAULT_BREAK_INTERVAL_MINUTES,
        }
    }
}

pub trait ProfileStore: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Profile, ProfileError>;
    fn list(&self) -> Vec<String>;
    fn save(&self, profile: Profile) -> Result<()>;
    fn delete(&self, name: &str) -> Result<()>;
}

// On-disk shape: {"<name>": {"brightness": 70, "color_temperature": 6500, "break_time": 25}}.
// Older files may carry nulls for values the user skipped. Numbers are read
// wide and clamped per entry so one bad value cannot sink the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredProfile {
    #[serde(default)]
    brightness: Option<i64>,
    #[serde(default)]
    color_temperature: Option<i64>,
    #[serde(default)]
    break_time: Option<i64>,
}

impl StoredProfile {
    fn into_profile(self, name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            brightness_hint: self
                .brightness
                .map(|value| value.clamp(0, 100) as u8)
                .unwrap_or(DEFAULT_BRIGHTNESS_HINT),
            color_temperature_hint: self
                .color_temperature
                .filter(|kelvin| *kelvin > 0)
                .map(|kelvin| kelvin.min(u32::MAX as i64) as u32)
                .unwrap_or(DEFAULT_COLOR_TEMPERATURE_HINT),
            break_interval_minutes: self
                .break_time
                .filter(|minutes| *minutes > 0)
                .map(|minutes| minutes.min(u32::MAX as i64) as u32)
                .unwrap_or(DEFAULT_BREAK_INTERVAL_MINUTES),
        }
    }

    fn from_profile(profile: &Profile) -> Self {
        Self {
            brightness: Some(i64::from(profile.brightness_hint.min(100))),
            color_temperature: Some(i64::from(profile.color_temperature_hint)),
            break_time: Some(i64::from(profile.break_interval_minutes.max(1))),
        }
    }
}

#[derive(Debug)]
pub struct JsonProfileStore {
    path: PathBuf,
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl JsonProfileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match load_profiles(&path) {
            Ok(profiles) => profiles,
            Err(err) => {
                log::warn!("starting with no profiles: {err:#}");
                BTreeMap::new()
            }
        };
        Self {
            path,
            profiles: Mutex::new(profiles),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, profiles: &BTreeMap<String, Profile>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create profile parent directory {}",
                    parent.display()
                )
            })?;
        }

        let stored: BTreeMap<&str, StoredProfile> = profiles
            .iter()
            .map(|(name, profile)| (name.as_str(), StoredProfile::from_profile(profile)))
            .collect();
        let json = serde_json::to_string_pretty(&stored).context("failed to encode profiles")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write profiles {}", self.path.display()))
    }
}

impl ProfileStore for JsonProfileStore {
    fn lookup(&self, name: &str) -> Result<Profile, ProfileError> {
        self.profiles
            .lock()
            .expect("profile mutex poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    fn list(&self) -> Vec<String> {
        self.profiles
            .lock()
            .expect("profile mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn save(&self, profile: Profile) -> Result<()> {
        let mut profiles = self.profiles.lock().expect("profile mutex poisoned");
        profiles.insert(profile.name.clone(), profile);
        self.persist(&profiles)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut profiles = self.profiles.lock().expect("profile mutex poisoned");
        if profiles.remove(name).is_none() {
            return Err(ProfileError::NotFound(name.to_string()).into());
        }
        self.persist(&profiles)
    }
}

fn load_profiles(path: &Path) -> Result<BTreeMap<String, Profile>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profiles {}", path.display()))?;
    let stored: BTreeMap<String, StoredProfile> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse profiles {} (expected JSON)", path.display()))?;

    Ok(stored
        .into_iter()
        .map(|(name, stored)| {
            let profile = stored.into_profile(&name);
            (name, profile)
        })
        .collect())
}
