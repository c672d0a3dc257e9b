use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

pub const CONTRAST_FACTOR: f32 = 2.0;

pub const REDUCTION_OFFSET: i32 = 30;

/// How the 0..=255 level reaches the actuator's 0..=100 range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrightnessScale {
    #[default]
    Clamp,
    Proportional,
}

impl BrightnessScale {
    pub fn to_percent(self, level: u8) -> u8 {
        match self {
            BrightnessScale::Clamp => level.min(100),
            BrightnessScale::Proportional => {
                ((f64::from(level) * 100.0) / 255.0).round().clamp(0.0, 100.0) as u8
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessSample {
    pub threshold: f64,
    pub bright_ratio: f64,
    pub raw_level: u8,
    pub adjusted_level: u8,
    pub percent: u8,
}

pub fn estimate(frame: &DynamicImage, scale: BrightnessScale) -> BrightnessSample {
    let boosted = boost_contrast(&frame.to_luma8(), CONTRAST_FACTOR);
    let threshold = mean_intensity(&boosted);
    let total = boosted.as_raw().len();
    let bright = boosted
        .as_raw()
        .iter()
        .filter(|&&px| f64::from(px) >= threshold)
        .count();

    let (bright_ratio, raw_level) = if total == 0 {
        (0.0, 0)
    } else {
        let ratio = bright as f64 / total as f64;
        let raw = ((bright as f64 * 255.0) / total as f64).round() as u8;
        (ratio, raw)
    };
    let adjusted_level = adjust_level(raw_level);

    BrightnessSample {
        threshold,
        bright_ratio,
        raw_level,
        adjusted_level,
        percent: scale.to_percent(adjusted_level),
    }
}

pub fn adjust_level(raw_level: u8) -> u8 {
    (i32::from(raw_level) - REDUCTION_OFFSET).clamp(0, 255) as u8
}

fn boost_contrast(luma: &GrayImage, factor: f32) -> GrayImage {
    let degenerate = (mean_intensity(luma) + 0.5).floor() as f32;
    let mut out = luma.clone();
    for px in out.iter_mut() {
        let value = degenerate + factor * (f32::from(*px) - degenerate);
        *px = value.clamp(0.0, 255.0) as u8;
    }
    out
}

fn mean_intensity(luma: &GrayImage) -> f64 {
    let raw = luma.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let sum: u64 = raw.iter().map(|&px| u64::from(px)).sum();
    sum as f64 / raw.len() as f64
}
