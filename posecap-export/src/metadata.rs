use posecap_core::{CameraIntrinsics, CorrectedPose, CorrectedVector3, DeviceRotation, SensorKind};
use std::fmt;

/// One line of a [`MetadataDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLine {
    /// A `# ...` line. The text excludes the marker.
    Comment(String),
    Entry { key: String, value: String },
    Blank,
}

/// A line-oriented `key: value` document with `#` comments.
///
/// Numbers are always written with nine decimal places and vectors as `[a, b, c]`, so a document
/// can be diffed and parsed by simple tools without losing precision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDocument {
    lines: Vec<MetadataLine>,
}

impl MetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[MetadataLine] {
        &self.lines
    }

    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(MetadataLine::Comment(text.into()));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(MetadataLine::Blank);
        self
    }

    /// Appends an entry with a preformatted value.
    pub fn entry(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.lines.push(MetadataLine::Entry {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn number(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.entry(key, format_number(value))
    }

    pub fn integer(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.entry(key, value.to_string())
    }

    pub fn vector(&mut self, key: impl Into<String>, values: &[f64]) -> &mut Self {
        self.entry(key, format_vector(values))
    }

    /// Appends the calibration block of one camera. `prefix` is prepended to every key.
    pub fn intrinsics(
        &mut self,
        prefix: &str,
        label: &str,
        intrinsics: &CameraIntrinsics,
    ) -> &mut Self {
        self.comment(format!("Intrinsics for {}", label))
            .number(format!("{}fx", prefix), intrinsics.fx)
            .number(format!("{}fy", prefix), intrinsics.fy)
            .number(format!("{}cx", prefix), intrinsics.cx)
            .number(format!("{}cy", prefix), intrinsics.cy)
            .vector(format!("{}distortion", prefix), &intrinsics.distortion)
            .number(format!("{}FOVh", prefix), intrinsics.fov_horizontal)
            .number(format!("{}FOVv", prefix), intrinsics.fov_vertical)
            .integer(format!("{}imagewidth", prefix), intrinsics.width.into())
            .integer(format!("{}imageheight", prefix), intrinsics.height.into())
    }

    /// Appends a pose in raw and corrected form, each value preceded by a comment.
    pub fn pose(&mut self, keys: &PoseKeys, pose: &CorrectedPose) -> &mut Self {
        let rotation = |q: &posecap_core::nalgebra::Quaternion<f64>| [q.w, q.i, q.j, q.k];
        self.comment(format!(
            "{} rotation quaternion [w, x, y, z] not corrected for device orientation",
            keys.subject
        ))
        .vector(keys.raw_rotation, &rotation(&pose.rotation.raw))
        .comment(format!(
            "{} rotation quaternion [w, x, y, z] corrected for device orientation",
            keys.subject
        ))
        .vector(keys.rotation, &rotation(&pose.rotation.corrected))
        .comment(format!(
            "{} translation [x, y, z] not corrected for device orientation",
            keys.subject
        ))
        .vector(keys.raw_translation, pose.translation.raw.as_slice())
        .comment(format!(
            "{} translation [x, y, z] corrected for device orientation",
            keys.subject
        ))
        .vector(keys.translation, pose.translation.corrected.as_slice())
    }

    /// Appends a correlated inertial sample in raw and corrected form.
    pub fn sample(&mut self, kind: SensorKind, vector: &CorrectedVector3) -> &mut Self {
        let (label, raw_key, key) = match kind {
            SensorKind::Gravity => ("gravity", "rawGravity", "gravity"),
            SensorKind::Acceleration => ("accelerometer", "rawAcceleration", "acceleration"),
        };
        self.comment(format!("Raw {} vector [x, y, z]", label))
            .vector(raw_key, vector.raw.as_slice())
            .comment(format!("{} vector corrected for device orientation [x, y, z]", label))
            .vector(key, vector.corrected.as_slice())
    }

    /// The entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.lines.iter().filter_map(|line| match line {
            MetadataLine::Entry { key, value } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }

    /// The value of the first entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries().find(|&(k, _)| k == key).map(|(_, v)| v)
    }

    /// Reads a document back. Lines that are not blank, a comment or `key: value` are skipped.
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    Some(MetadataLine::Blank)
                } else if let Some(comment) = line.strip_prefix('#') {
                    Some(MetadataLine::Comment(comment.trim_start().to_owned()))
                } else {
                    line.split_once(':').map(|(key, value)| MetadataLine::Entry {
                        key: key.trim().to_owned(),
                        value: value.trim().to_owned(),
                    })
                }
            })
            .collect();
        Self { lines }
    }
}

impl fmt::Display for MetadataDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                MetadataLine::Comment(text) => writeln!(f, "# {}", text)?,
                MetadataLine::Entry { key, value } => writeln!(f, "{}: {}", key, value)?,
                MetadataLine::Blank => writeln!(f)?,
            }
        }
        Ok(())
    }
}

pub fn format_number(value: f64) -> String {
    format!("{:.9}", value)
}

pub fn format_vector(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|&v| format_number(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Parses a `[a, b, c]` value. Returns `None` if it is not bracketed or an item is not a number.
pub fn parse_vector(value: &str) -> Option<Vec<f64>> {
    let inner = value.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(vec![]);
    }
    inner.split(',').map(|item| item.trim().parse().ok()).collect()
}

/// The comment subject and key names used when writing a [`CorrectedPose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseKeys {
    pub subject: &'static str,
    pub raw_rotation: &'static str,
    pub rotation: &'static str,
    pub raw_translation: &'static str,
    pub translation: &'static str,
}

impl PoseKeys {
    pub const CAPTURE: PoseKeys = PoseKeys {
        subject: "pose",
        raw_rotation: "rawRotation",
        rotation: "rotation",
        raw_translation: "rawTranslation",
        translation: "translation",
    };

    pub const COLOR_IMU: PoseKeys = PoseKeys {
        subject: "IMU",
        raw_rotation: "imuRawRotation",
        rotation: "imuRotation",
        raw_translation: "imuRawTranslation",
        translation: "imuTranslation",
    };

    pub const DEPTH_IMU: PoseKeys = PoseKeys {
        subject: "IMU",
        raw_rotation: "d_imuRawRotation",
        rotation: "d_imuRotation",
        raw_translation: "d_imuRawTranslation",
        translation: "d_imuTranslation",
    };
}

/// Everything written to the metadata file of one capture.
///
/// Optional blocks are omitted from the document when they are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    pub color_intrinsics: Option<CameraIntrinsics>,
    pub color_imu_pose: Option<CorrectedPose>,
    pub depth_intrinsics: Option<CameraIntrinsics>,
    pub depth_imu_pose: Option<CorrectedPose>,
    pub device_rotation: DeviceRotation,
    /// The capture timestamp on the device pose clock, in seconds.
    pub timestamp: f64,
    pub pose: CorrectedPose,
    pub gravity: Option<CorrectedVector3>,
    pub acceleration: Option<CorrectedVector3>,
}

impl CaptureMetadata {
    pub fn document(&self) -> MetadataDocument {
        let mut document = MetadataDocument::new();
        document.comment("camera intrinsics");
        if let Some(intrinsics) = &self.color_intrinsics {
            document
                .intrinsics("", "default (color) camera", intrinsics)
                .blank();
        }
        if let Some(pose) = &self.color_imu_pose {
            document
                .comment("IMU to camera pose for default (color) camera")
                .pose(&PoseKeys::COLOR_IMU, pose)
                .blank();
        }
        if let Some(intrinsics) = &self.depth_intrinsics {
            document.intrinsics("d_", "depth camera", intrinsics).blank();
        }
        if let Some(pose) = &self.depth_imu_pose {
            document
                .comment("IMU to camera pose for depth camera")
                .pose(&PoseKeys::DEPTH_IMU, pose)
                .blank();
        }
        document
            .comment("device rotation (0 = natural orientation of the device)")
            .integer("deviceRotation", self.device_rotation.degrees().into())
            .comment("capture timestamp on the device pose clock, seconds")
            .number("timestamp", self.timestamp)
            .pose(&PoseKeys::CAPTURE, &self.pose);
        if let Some(gravity) = &self.gravity {
            document.sample(SensorKind::Gravity, gravity);
        }
        if let Some(acceleration) = &self.acceleration {
            document.sample(SensorKind::Acceleration, acceleration);
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use posecap_core::{
        nalgebra::{Quaternion, Vector3},
        DevicePose, OrientationCorrection,
    };

    fn metadata(rotation: DeviceRotation) -> CaptureMetadata {
        let correction = OrientationCorrection::new(rotation);
        let pose = DevicePose::new(Quaternion::identity(), Vector3::new(1.0, 2.0, 3.0));
        CaptureMetadata {
            color_intrinsics: Some(CameraIntrinsics::new(
                1000.0,
                1000.0,
                960.0,
                540.0,
                1920,
                1080,
                [0.1, -0.2, 0.0, 0.0, 0.05],
            )),
            color_imu_pose: Some(DevicePose::identity().correct(&correction)),
            depth_intrinsics: None,
            depth_imu_pose: None,
            device_rotation: rotation,
            timestamp: 1234.5,
            pose: pose.correct(&correction),
            gravity: Some(correction.vector(Vector3::new(0.0, 9.81, 0.0))),
            acceleration: None,
        }
    }

    #[test]
    fn numbers_have_nine_decimals() {
        assert_eq!(format_number(1.0), "1.000000000");
        assert_eq!(format_vector(&[0.5, -2.0]), "[0.500000000, -2.000000000]");
    }

    #[test]
    fn document_layout() {
        let text = metadata(DeviceRotation::Rotation90).document().to_string();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("# camera intrinsics"));
        assert_eq!(lines.next(), Some("# Intrinsics for default (color) camera"));
        assert_eq!(lines.next(), Some("fx: 1000.000000000"));
        assert!(text.contains("\nimagewidth: 1920\n"));
        assert!(text.contains(
            "\ndistortion: [0.100000000, -0.200000000, 0.000000000, 0.000000000, 0.050000000]\n"
        ));
        assert!(text.contains("\ndeviceRotation: 90\n"));
        assert!(text.contains("\nrawTranslation: [1.000000000, 2.000000000, 3.000000000]\n"));
        assert!(text.contains("\ntranslation: [-2.000000000, 1.000000000, 3.000000000]\n"));
        assert!(text.contains("\nrawGravity: [0.000000000, 9.810000000, 0.000000000]\n"));
        assert!(!text.contains("d_fx"));
        assert!(!text.contains("acceleration"));
    }

    #[test]
    fn keys_appear_in_order() {
        let document = metadata(DeviceRotation::Rotation0).document();
        let keys: Vec<&str> = document.entries().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "fx",
                "fy",
                "cx",
                "cy",
                "distortion",
                "FOVh",
                "FOVv",
                "imagewidth",
                "imageheight",
                "imuRawRotation",
                "imuRotation",
                "imuRawTranslation",
                "imuTranslation",
                "deviceRotation",
                "timestamp",
                "rawRotation",
                "rotation",
                "rawTranslation",
                "translation",
                "rawGravity",
                "gravity",
            ]
        );
    }

    #[test]
    fn parse_reads_rendered_document() {
        let document = metadata(DeviceRotation::Rotation180).document();
        let parsed = MetadataDocument::parse(&document.to_string());
        assert_eq!(parsed, document);
        let gravity = parse_vector(parsed.get("gravity").unwrap()).unwrap();
        assert_relative_eq!(gravity[1], -9.81, epsilon = 1e-9);
        assert_relative_eq!(
            parsed.get("FOVh").unwrap().parse::<f64>().unwrap(),
            2.0 * (960.0f64 / 1000.0).atan(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn parse_skips_garbage() {
        let parsed = MetadataDocument::parse("#x\nnot an entry\nkey:   value  \n");
        assert_eq!(
            parsed.lines(),
            &[
                MetadataLine::Comment("x".to_owned()),
                MetadataLine::Entry {
                    key: "key".to_owned(),
                    value: "value".to_owned()
                }
            ]
        );
        assert_eq!(parse_vector("[]"), Some(vec![]));
        assert_eq!(parse_vector("[1, x]"), None);
        assert_eq!(parse_vector("1, 2"), None);
    }
}
