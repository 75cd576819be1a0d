use crate::{CaptureError, Result};
use log::*;
use parking_lot::Mutex;
use posecap_core::{CameraId, CameraIntrinsics, DevicePose};
use std::collections::HashMap;
use std::sync::Arc;

/// The calibration side of the camera system that captures frames.
///
/// Any query may return `None` when the device cannot answer it. The pipeline then leaves the
/// corresponding block out of the capture metadata.
pub trait CaptureProvider: Send + Sync {
    fn intrinsics(&self, camera: CameraId) -> Option<CameraIntrinsics>;

    /// The static transform from the IMU frame to the optical frame of `camera`.
    fn imu_to_camera_pose(&self, camera: CameraId) -> Option<DevicePose>;

    fn is_depth_capable(&self) -> bool;

    fn require_intrinsics(&self, camera: CameraId) -> Result<CameraIntrinsics> {
        self.intrinsics(camera)
            .ok_or(CaptureError::ProviderUnavailable { camera })
    }

    fn require_imu_to_camera_pose(&self, camera: CameraId) -> Result<DevicePose> {
        self.imu_to_camera_pose(camera)
            .ok_or(CaptureError::ProviderUnavailable { camera })
    }
}

impl<P: CaptureProvider + ?Sized> CaptureProvider for Arc<P> {
    fn intrinsics(&self, camera: CameraId) -> Option<CameraIntrinsics> {
        (**self).intrinsics(camera)
    }

    fn imu_to_camera_pose(&self, camera: CameraId) -> Option<DevicePose> {
        (**self).imu_to_camera_pose(camera)
    }

    fn is_depth_capable(&self) -> bool {
        (**self).is_depth_capable()
    }
}

impl<P: CaptureProvider + ?Sized> CaptureProvider for Box<P> {
    fn intrinsics(&self, camera: CameraId) -> Option<CameraIntrinsics> {
        (**self).intrinsics(camera)
    }

    fn imu_to_camera_pose(&self, camera: CameraId) -> Option<DevicePose> {
        (**self).imu_to_camera_pose(camera)
    }

    fn is_depth_capable(&self) -> bool {
        (**self).is_depth_capable()
    }
}

/// Remembers the intrinsics reported for each camera, including the absence of an answer.
///
/// Intrinsics do not change while a session is connected, so each camera is queried once.
pub struct CachedProvider<P> {
    inner: P,
    intrinsics: Mutex<HashMap<CameraId, Option<CameraIntrinsics>>>,
}

impl<P: CaptureProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            intrinsics: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Forgets every cached answer, for when the provider reconnects.
    pub fn invalidate(&self) {
        self.intrinsics.lock().clear();
    }
}

impl<P: CaptureProvider> CaptureProvider for CachedProvider<P> {
    fn intrinsics(&self, camera: CameraId) -> Option<CameraIntrinsics> {
        *self.intrinsics.lock().entry(camera).or_insert_with(|| {
            let intrinsics = self.inner.intrinsics(camera);
            debug!(
                "cached intrinsics for the {} camera: {}",
                camera,
                if intrinsics.is_some() {
                    "available"
                } else {
                    "unavailable"
                }
            );
            intrinsics
        })
    }

    fn imu_to_camera_pose(&self, camera: CameraId) -> Option<DevicePose> {
        self.inner.imu_to_camera_pose(camera)
    }

    fn is_depth_capable(&self) -> bool {
        self.inner.is_depth_capable()
    }
}

/// A provider that answers from fixed tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticProvider {
    pub intrinsics: HashMap<CameraId, CameraIntrinsics>,
    pub imu_poses: HashMap<CameraId, DevicePose>,
    pub depth_capable: bool,
}

impl CaptureProvider for StaticProvider {
    fn intrinsics(&self, camera: CameraId) -> Option<CameraIntrinsics> {
        self.intrinsics.get(&camera).copied()
    }

    fn imu_to_camera_pose(&self, camera: CameraId) -> Option<DevicePose> {
        self.imu_poses.get(&camera).copied()
    }

    fn is_depth_capable(&self) -> bool {
        self.depth_capable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        queries: AtomicUsize,
    }

    impl CaptureProvider for CountingProvider {
        fn intrinsics(&self, camera: CameraId) -> Option<CameraIntrinsics> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            (camera == CameraId::Color)
                .then(|| CameraIntrinsics::new(1.0, 1.0, 0.5, 0.5, 1, 1, [0.0; 5]))
        }

        fn imu_to_camera_pose(&self, _: CameraId) -> Option<DevicePose> {
            None
        }

        fn is_depth_capable(&self) -> bool {
            false
        }
    }

    #[test]
    fn intrinsics_are_queried_once_per_camera() {
        let provider = CachedProvider::new(CountingProvider::default());
        for _ in 0..3 {
            assert!(provider.intrinsics(CameraId::Color).is_some());
            assert!(provider.intrinsics(CameraId::Depth).is_none());
        }
        assert_eq!(provider.inner().queries.load(Ordering::SeqCst), 2);
        provider.invalidate();
        provider.intrinsics(CameraId::Color);
        assert_eq!(provider.inner().queries.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn missing_answers_are_reported_per_camera() {
        let provider: Box<dyn CaptureProvider> = Box::new(StaticProvider::default());
        match provider.require_imu_to_camera_pose(CameraId::Depth) {
            Err(CaptureError::ProviderUnavailable { camera }) => {
                assert_eq!(camera, CameraId::Depth)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
