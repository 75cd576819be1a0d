use crate::CaptureSettings;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::*;
use parking_lot::Mutex;
use posecap_core::{nalgebra::Vector3, Sample, SensorKind, TimestampedRingBuffer};
use std::sync::Arc;
use std::thread::JoinHandle;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A raw reading as delivered by the platform sensor callback.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub values: [f32; 3],
    /// The device pose clock when the event arrived, in seconds. Negative while the pose clock is
    /// not yet available.
    pub source_timestamp: f64,
    /// The monotonic event clock, in nanoseconds.
    pub wall_timestamp_ns: i64,
}

#[derive(Debug)]
struct HubState {
    paused: bool,
    enabled: [bool; 2],
    last_source: [Option<f64>; 2],
}

fn slot(kind: SensorKind) -> usize {
    match kind {
        SensorKind::Gravity => 0,
        SensorKind::Acceleration => 1,
    }
}

/// Receives inertial events and keeps the recent ones of each kind in a ring buffer.
#[derive(Debug)]
pub struct SensorHub {
    buffers: [TimestampedRingBuffer<Sample>; 2],
    state: Mutex<HubState>,
}

impl SensorHub {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            buffers: [
                TimestampedRingBuffer::new(settings.buffer_capacity),
                TimestampedRingBuffer::new(settings.buffer_capacity),
            ],
            state: Mutex::new(HubState {
                paused: false,
                enabled: [settings.gravity, settings.acceleration],
                last_source: [None; 2],
            }),
        }
    }

    pub fn buffer(&self, kind: SensorKind) -> &TimestampedRingBuffer<Sample> {
        &self.buffers[slot(kind)]
    }

    pub fn is_enabled(&self, kind: SensorKind) -> bool {
        self.state.lock().enabled[slot(kind)]
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Stops or restarts accepting events. Buffered samples are kept either way.
    pub fn pause(&self, paused: bool) {
        let mut state = self.state.lock();
        if state.paused != paused {
            debug!("sensor ingestion {}", if paused { "paused" } else { "resumed" });
        }
        state.paused = paused;
    }

    /// Enables or disables each kind and discards everything buffered so far.
    pub fn reconfigure(&self, gravity: bool, acceleration: bool) {
        let mut state = self.state.lock();
        state.enabled = [gravity, acceleration];
        state.last_source = [None; 2];
        for buffer in &self.buffers {
            buffer.clear();
        }
        info!(
            "sensors reconfigured: gravity {}, acceleration {}",
            gravity, acceleration
        );
    }

    /// Buffers `event` unless it has to be dropped. Returns whether it was buffered.
    ///
    /// Events are dropped while paused, for disabled kinds, before the pose clock is available,
    /// and when they repeat the previous pose timestamp of the same kind.
    pub fn ingest(&self, event: SensorEvent) -> bool {
        let index = slot(event.kind);
        let mut state = self.state.lock();
        if state.paused || !state.enabled[index] {
            return false;
        }
        if event.source_timestamp < 0.0 {
            trace!("{} event before pose clock start", event.kind.name());
            return false;
        }
        if state.last_source[index] == Some(event.source_timestamp) {
            trace!(
                "duplicate {} event at {:.9}",
                event.kind.name(),
                event.source_timestamp
            );
            return false;
        }
        state.last_source[index] = Some(event.source_timestamp);
        let [x, y, z] = event.values;
        let sample = Sample::new(
            Vector3::new(x as f64, y as f64, z as f64),
            event.source_timestamp,
            event.wall_timestamp_ns as f64 * 1e-9,
        );
        self.buffers[index].push(sample);
        true
    }

    /// Starts a thread that ingests the events sent through the returned [`SensorSender`].
    ///
    /// The thread ends once every sender is dropped.
    pub fn spawn_ingest(
        self: &Arc<Self>,
        capacity: usize,
    ) -> std::io::Result<(SensorSender, JoinHandle<()>)> {
        let (sender, receiver) = bounded(capacity.max(1));
        let hub = self.clone();
        let handle = std::thread::Builder::new()
            .name("posecap-sensors".to_string())
            .spawn(move || hub.run_ingest(receiver))?;
        Ok((SensorSender { sender }, handle))
    }

    fn run_ingest(&self, receiver: Receiver<SensorEvent>) {
        let mut accepted = 0usize;
        for event in receiver {
            if self.ingest(event) {
                accepted += 1;
            }
        }
        debug!("sensor ingestion ended after {} samples", accepted);
    }
}

/// The producer end of the sensor channel.
#[derive(Debug, Clone)]
pub struct SensorSender {
    sender: Sender<SensorEvent>,
}

impl SensorSender {
    /// Queues `event` without blocking. Returns `false` if the channel is full or closed.
    pub fn send(&self, event: SensorEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!("sensor channel full, dropped {} event", event.kind.name());
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queues `event`, waiting for room in the channel. For replaying recorded streams, where
    /// no event may be lost.
    pub fn send_blocking(&self, event: SensorEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: SensorKind, source_timestamp: f64) -> SensorEvent {
        SensorEvent {
            kind,
            values: [0.0, 9.5, 1.0],
            source_timestamp,
            wall_timestamp_ns: 2_500_000_000,
        }
    }

    #[test]
    fn converts_events_to_samples() {
        let hub = SensorHub::new(&CaptureSettings::default());
        assert!(hub.ingest(event(SensorKind::Gravity, 1.25)));
        let samples = hub.buffer(SensorKind::Gravity).peek_all();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].y, 9.5);
        assert_eq!(samples[0].source_timestamp, 1.25);
        assert_eq!(samples[0].wall_timestamp, 2.5);
        assert!(hub.buffer(SensorKind::Acceleration).is_empty());
    }

    #[test]
    fn drops_unusable_events() {
        let hub = SensorHub::new(&CaptureSettings::default());
        assert!(!hub.ingest(event(SensorKind::Gravity, -1.0)));
        assert!(hub.ingest(event(SensorKind::Gravity, 1.0)));
        assert!(!hub.ingest(event(SensorKind::Gravity, 1.0)));
        assert!(hub.ingest(event(SensorKind::Acceleration, 1.0)));
        hub.pause(true);
        assert!(!hub.ingest(event(SensorKind::Gravity, 2.0)));
        hub.pause(false);
        assert!(hub.ingest(event(SensorKind::Gravity, 2.0)));
        assert_eq!(hub.buffer(SensorKind::Gravity).len(), 2);
    }

    #[test]
    fn reconfigure_clears_and_disables() {
        let hub = SensorHub::new(&CaptureSettings::default());
        hub.ingest(event(SensorKind::Gravity, 1.0));
        hub.reconfigure(false, true);
        assert!(hub.buffer(SensorKind::Gravity).is_empty());
        assert!(!hub.is_enabled(SensorKind::Gravity));
        assert!(!hub.ingest(event(SensorKind::Gravity, 2.0)));
        assert!(hub.ingest(event(SensorKind::Acceleration, 2.0)));
    }

    #[test]
    fn ingest_thread_drains_channel() {
        let hub = Arc::new(SensorHub::new(&CaptureSettings::default()));
        let (sender, handle) = hub.spawn_ingest(16).unwrap();
        let mut sent = 0;
        for i in 0..10 {
            if sender.send(event(SensorKind::Acceleration, i as f64)) {
                sent += 1;
            }
        }
        drop(sender);
        handle.join().unwrap();
        assert_eq!(hub.buffer(SensorKind::Acceleration).len(), sent);
        assert_eq!(sent, 10);
    }
}
