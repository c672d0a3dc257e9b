use std::path::PathBuf;

pub fn default_data_dir() -> PathBuf {
    let path = match platform_base_dir() {
        Some(base) => base.join("luminar"),
        None => return PathBuf::from("."),
    };
    let _ = std::fs::create_dir_all(&path);
    path
}

#[cfg(target_os = "macos")]
fn platform_base_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Library").join("Application Support"))
}

#[cfg(windows)]
fn platform_base_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_base_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

pub fn default_profiles_path() -> PathBuf {
    default_data_dir().join("profiles.json")
}
