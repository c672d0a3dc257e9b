use std::fmt;

pub const DAY_START_HOUR: u32 = 8;
pub const NIGHT_START_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPreset {
    Daytime,
    Nighttime,
}

impl ColorPreset {
    pub fn kelvin(self) -> u32 {
        match self {
            ColorPreset::Daytime => 6500,
            ColorPreset::Nighttime => 3000,
        }
    }
}

impl fmt::Display for ColorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorPreset::Daytime => write!(f, "daytime ({}K)", self.kelvin()),
            ColorPreset::Nighttime => write!(f, "nighttime ({}K)", self.kelvin()),
        }
    }
}

pub fn preset_for_hour(hour: u32) -> ColorPreset {
    if (DAY_START_HOUR..NIGHT_START_HOUR).contains(&hour) {
        ColorPreset::Daytime
    } else {
        ColorPreset::Nighttime
    }
}
