//! Device profiling and connection-aware asset quality.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::connectivity::NetworkQuality;

const MOBILE_MAX_WIDTH: u32 = 768;
const TABLET_MAX_WIDTH: u32 = 1024;

/// Broad device class from viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Viewport and display characteristics reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub pixel_ratio: f64,
    pub touch: bool,
}

impl DeviceProfile {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            pixel_ratio: 1.0,
            touch: false,
        }
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    pub fn with_touch(mut self, touch: bool) -> Self {
        self.touch = touch;
        self
    }

    pub fn device_class(&self) -> DeviceClass {
        if self.viewport_width < MOBILE_MAX_WIDTH {
            DeviceClass::Mobile
        } else if self.viewport_width < TABLET_MAX_WIDTH {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn orientation(&self) -> Orientation {
        if self.viewport_height > self.viewport_width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    pub fn is_retina(&self) -> bool {
        self.pixel_ratio > 1.0
    }

    /// Image quality (0-100) to request for this device on `quality`.
    ///
    /// Constrained devices on poor links get capped, high-density screens on
    /// fast links get a bump up to 95. Everything else keeps `requested`.
    pub fn image_quality(&self, requested: u8, quality: NetworkQuality) -> u8 {
        let class = self.device_class();
        match (class, quality) {
            (DeviceClass::Mobile, NetworkQuality::Slow) => requested.min(50),
            (DeviceClass::Tablet, NetworkQuality::Slow)
            | (DeviceClass::Mobile, NetworkQuality::Medium) => requested.min(65),
            (_, NetworkQuality::Fast) if self.is_retina() => {
                requested.saturating_add(10).min(95)
            }
            _ => requested,
        }
    }

    /// Whether below-the-fold resources should be prefetched.
    pub fn should_prefetch_secondary(&self, quality: NetworkQuality) -> bool {
        self.device_class() != DeviceClass::Mobile && quality != NetworkQuality::Slow
    }
}
