use crate::{CorrectedVector3, OrientationCorrection, Sample, Timestamped, TimestampedRingBuffer};
use float_ord::FloatOrd;
use log::*;

/// Drains `buffer` and returns the element whose timestamp is nearest to `target`.
///
/// Every buffered element is consumed, so a sample is never matched to more than one capture.
/// On an exact tie the oldest element wins. Elements with a non-finite distance to `target` are
/// never selected.
///
/// ```
/// use posecap_core::{find_closest, nalgebra::Vector3, Sample, TimestampedRingBuffer};
///
/// let buffer = TimestampedRingBuffer::new(4);
/// buffer.push(Sample::new(Vector3::zeros(), 1.0, 1.0));
/// buffer.push(Sample::new(Vector3::zeros(), 5.0, 5.0));
/// let closest = find_closest(&buffer, 4.0).unwrap();
/// assert_eq!(closest.source_timestamp, 5.0);
/// assert!(buffer.is_empty());
/// ```
pub fn find_closest<T: Timestamped>(buffer: &TimestampedRingBuffer<T>, target: f64) -> Option<T> {
    let drained = buffer.pop_all();
    let consulted = drained.len();
    // `min_by_key` keeps the first of equal keys, which is the oldest element.
    let closest = drained
        .into_iter()
        .map(|item| (FloatOrd((item.timestamp() - target).abs()), item))
        .filter(|(distance, _)| distance.0.is_finite())
        .min_by_key(|(distance, _)| *distance);
    match &closest {
        Some((distance, _)) => trace!(
            "matched one of {} samples to {:.9} at distance {:.9}",
            consulted,
            target,
            distance.0
        ),
        None => trace!("no samples to match to {:.9}", target),
    }
    closest.map(|(_, item)| item)
}

/// The sample nearest to a capture, with its vector in raw and corrected form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelatedSample {
    pub sample: Sample,
    pub vector: CorrectedVector3,
}

/// Finds the sample nearest to `target` and applies the capture's orientation correction to it.
pub fn correlate(
    buffer: &TimestampedRingBuffer<Sample>,
    target: f64,
    correction: &OrientationCorrection,
) -> Option<CorrelatedSample> {
    find_closest(buffer, target).map(|sample| CorrelatedSample {
        sample,
        vector: correction.vector(sample.vector()),
    })
}
