use crate::DecodeError;
use posecap_core::{DevicePose, DeviceRotation};
use std::str::FromStr;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The layout of a raw image buffer delivered by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "snake_case"))]
pub enum PixelFormat {
    /// Y plane followed by interleaved V/U samples at half resolution.
    Nv21,
    /// Y plane followed by a V plane and a U plane at half resolution.
    Yv12,
    /// Four bytes per pixel, laid out as RGBA with the first and last byte exchanged.
    Rgba8888Swizzled,
}

impl FromStr for PixelFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nv21" => Ok(PixelFormat::Nv21),
            "yv12" => Ok(PixelFormat::Yv12),
            "rgba" | "rgba8888" => Ok(PixelFormat::Rgba8888Swizzled),
            _ => Err(DecodeError::Unsupported(s.to_owned())),
        }
    }
}

/// A raw still image as delivered by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub data: Vec<u8>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Pixels per row in `data`, if rows are padded beyond `width`.
    pub stride: Option<u32>,
    /// When the image was exposed, on the device pose clock, in seconds.
    pub timestamp: f64,
}

impl CapturedImage {
    pub fn stride(&self) -> u32 {
        self.stride.unwrap_or(self.width)
    }
}

/// A depth point cloud as delivered by the provider, `[x, y, z, confidence]*`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub points: Vec<f32>,
    pub timestamp: f64,
}

/// Delivered when the provider has captured a still image.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoEvent {
    pub image: CapturedImage,
    /// The pose of the device when the image was exposed, in the sensor frame.
    pub pose: DevicePose,
    /// The display rotation read when the capture started.
    pub device_rotation: DeviceRotation,
}

/// Delivered when the provider has captured a depth point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudEvent {
    pub cloud: PointCloud,
}

/// Everything persisted for one capture.
///
/// A frame is owned by exactly one pipeline run and is cleared when the run finishes, whatever
/// the outcome, so a later run can never pick up stale data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureFrame {
    pub image: Option<CapturedImage>,
    pub pose: DevicePose,
    pub device_rotation: DeviceRotation,
    pub point_cloud: Option<PointCloud>,
}

impl CaptureFrame {
    /// The capture timestamp, taken from the image.
    pub fn timestamp(&self) -> Option<f64> {
        self.image.as_ref().map(|image| image.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.point_cloud.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_empties_frame() {
        let mut frame = CaptureFrame {
            image: Some(CapturedImage {
                data: vec![0; 6],
                format: PixelFormat::Nv21,
                width: 2,
                height: 2,
                stride: None,
                timestamp: 3.0,
            }),
            device_rotation: DeviceRotation::Rotation90,
            point_cloud: Some(PointCloud {
                points: vec![0.0; 4],
                timestamp: 3.0,
            }),
            ..Default::default()
        };
        assert_eq!(frame.timestamp(), Some(3.0));
        frame.clear();
        assert!(frame.is_empty());
        assert_eq!(frame, CaptureFrame::default());
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("NV21".parse::<PixelFormat>(), Ok(PixelFormat::Nv21));
        assert_eq!("rgba".parse::<PixelFormat>(), Ok(PixelFormat::Rgba8888Swizzled));
        assert_eq!(
            "bayer".parse::<PixelFormat>(),
            Err(DecodeError::Unsupported("bayer".to_owned()))
        );
    }
}
