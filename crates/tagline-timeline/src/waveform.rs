//! Waveform peak data for audio tracks.
//!
//! Generates min/max pairs a renderer can draw at various zoom levels.
//! No drawing happens here.

use serde::{Deserialize, Serialize};

/// A min/max pair representing the amplitude range of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformSample {
    pub min: f32,
    pub max: f32,
}

/// Pre-computed peaks for a single audio channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Source samples per bucket (the reduction ratio).
    pub samples_per_bucket: usize,
    /// Min/max pairs, one per bucket.
    pub data: Vec<WaveformSample>,
    /// Source sample rate.
    pub sample_rate: u32,
}

impl Waveform {
    /// Reduce mono samples to min/max buckets.
    pub fn compute(samples: &[f32], samples_per_bucket: usize, sample_rate: u32) -> Self {
        if samples_per_bucket == 0 || samples.is_empty() {
            return Self {
                samples_per_bucket: samples_per_bucket.max(1),
                data: Vec::new(),
                sample_rate,
            };
        }

        let data = samples
            .chunks(samples_per_bucket)
            .map(|chunk| {
                chunk.iter().fold(
                    WaveformSample {
                        min: f32::MAX,
                        max: f32::MIN,
                    },
                    |acc, &s| WaveformSample {
                        min: acc.min.min(s),
                        max: acc.max.max(s),
                    },
                )
            })
            .collect();

        Self {
            samples_per_bucket,
            data,
            sample_rate,
        }
    }

    /// Seconds covered by one bucket.
    pub fn bucket_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples_per_bucket as f64 / self.sample_rate as f64
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.data.len() as f64 * self.bucket_seconds()
    }

    /// Buckets overlapping `[t0, t1]` seconds, for drawing the visible
    /// window.
    pub fn peaks_in_range(&self, t0: f64, t1: f64) -> &[WaveformSample] {
        let bucket = self.bucket_seconds();
        if bucket <= 0.0 || !(t0.is_finite() && t1.is_finite()) || t1 < t0 {
            return &[];
        }
        let start = ((t0.max(0.0) / bucket).floor() as usize).min(self.data.len());
        let end = ((t1.max(0.0) / bucket).floor() as usize + 1).min(self.data.len());
        &self.data[start..end.max(start)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_basic() {
        // 100 samples, 10 per bucket → 10 buckets
        let samples: Vec<f32> = (0..100).map(|i| (i as f32 / 100.0) * 2.0 - 1.0).collect();
        let wf = Waveform::compute(&samples, 10, 44100);
        assert_eq!(wf.data.len(), 10);

        assert!(wf.data[0].min < -0.8);
        assert!(wf.data[0].max < 0.0);
        assert!(wf.data[9].min > 0.7);
        assert!(wf.data[9].max > 0.9);
    }

    #[test]
    fn test_waveform_empty() {
        let wf = Waveform::compute(&[], 100, 48000);
        assert!(wf.data.is_empty());
        assert!(wf.peaks_in_range(0.0, 1.0).is_empty());
    }

    #[test]
    fn test_waveform_duration() {
        let samples = vec![0.0f32; 48000]; // 1 second at 48kHz
        let wf = Waveform::compute(&samples, 480, 48000);
        assert!((wf.duration_seconds() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_peaks_in_range() {
        let samples = vec![0.25f32; 48000];
        let wf = Waveform::compute(&samples, 4800, 48000); // 0.1 s buckets
        assert_eq!(wf.peaks_in_range(0.0, 0.25).len(), 3);
        assert_eq!(wf.peaks_in_range(0.95, 5.0).len(), 1);
        assert!(wf.peaks_in_range(2.0, 3.0).is_empty());
        assert!(wf.peaks_in_range(0.5, 0.1).is_empty());
    }
}
