//! Waveform buffers
//!
//! Planar `f32` audio with a sample rate. The engine works on mono at the
//! model rate; multi-channel input is reduced by averaging channels.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{VxError, VxResult};

/// Planar audio buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// One sample vector per channel, all the same length
    channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl Waveform {
    /// Create a mono waveform
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> VxResult<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// Create a waveform from planar channel data
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> VxResult<Self> {
        if sample_rate == 0 {
            return Err(VxError::InvalidSampleRate(sample_rate));
        }
        let Some(first) = channels.first() else {
            return Err(VxError::InvalidWaveform("no channels".into()));
        };

        let expected = first.len();
        for (channel, data) in channels.iter().enumerate().skip(1) {
            if data.len() != expected {
                return Err(VxError::ChannelLengthMismatch {
                    channel,
                    expected,
                    got: data.len(),
                });
            }
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Create a waveform from interleaved samples
    pub fn from_interleaved(data: &[f32], num_channels: usize, sample_rate: u32) -> VxResult<Self> {
        if num_channels == 0 {
            return Err(VxError::InvalidWaveform("channel count must be positive".into()));
        }
        if data.len() % num_channels != 0 {
            return Err(VxError::InvalidWaveform(format!(
                "{} interleaved samples do not divide into {} channels",
                data.len(),
                num_channels
            )));
        }

        let frames = data.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for (i, &sample) in data.iter().enumerate() {
            channels[i % num_channels].push(sample);
        }

        Self::from_channels(channels, sample_rate)
    }

    /// Mono silence of the given length
    pub fn silence(frames: usize, sample_rate: u32) -> VxResult<Self> {
        Self::mono(vec![0.0; frames], sample_rate)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    #[inline]
    pub fn is_mono(&self) -> bool {
        self.channels.len() == 1
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Planar channel data
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Single channel, if present
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// First channel (the whole signal for mono waveforms)
    pub fn samples(&self) -> &[f32] {
        &self.channels[0]
    }

    /// Consume into the first channel's samples
    pub fn into_samples(self) -> Vec<f32> {
        self.channels.into_iter().next().unwrap_or_default()
    }

    /// Interleaved copy (L, R, L, R, ...)
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut data = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for ch in &self.channels {
                data.push(ch[i]);
            }
        }
        data
    }

    /// Mixdown to mono by averaging channels
    pub fn to_mono(&self) -> Waveform {
        if self.is_mono() {
            return self.clone();
        }

        let scale = 1.0 / self.channels.len() as f32;
        let mono = (0..self.frames())
            .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
            .collect();

        Waveform {
            channels: vec![mono],
            sample_rate: self.sample_rate,
        }
    }

    /// Like [`Waveform::to_mono`], without copying mono input
    pub fn into_mono(self) -> Waveform {
        if self.is_mono() { self } else { self.to_mono() }
    }

    /// Same channel count, length and sample rate
    pub fn same_shape(&self, other: &Waveform) -> bool {
        self.sample_rate == other.sample_rate
            && self.channels.len() == other.channels.len()
            && self.frames() == other.frames()
    }

    /// Sample-wise difference `self - other`
    pub fn subtract(&self, other: &Waveform) -> VxResult<Waveform> {
        if !self.same_shape(other) {
            return Err(VxError::InvalidWaveform(format!(
                "cannot subtract {}ch/{} frames/{} Hz from {}ch/{} frames/{} Hz",
                other.num_channels(),
                other.frames(),
                other.sample_rate,
                self.num_channels(),
                self.frames(),
                self.sample_rate
            )));
        }

        let channels = self
            .channels
            .iter()
            .zip(&other.channels)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x - y).collect())
            .collect();

        Ok(Waveform {
            channels,
            sample_rate: self.sample_rate,
        })
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }

    /// RMS over all channels
    pub fn rms(&self) -> f32 {
        let count = self.frames() * self.channels.len();
        if count == 0 {
            return 0.0;
        }
        let sum_sq: f32 = self.channels.iter().flatten().map(|&s| s * s).sum();
        (sum_sq / count as f32).sqrt()
    }

    /// Resample to `target_rate`, returning a copy when the rate already matches
    pub fn resample_to(&self, target_rate: u32) -> VxResult<Waveform> {
        if target_rate == 0 {
            return Err(VxError::InvalidSampleRate(target_rate));
        }
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }

        let frames = self.frames();
        let ratio = target_rate as f64 / self.sample_rate as f64;
        let expected = (frames as f64 * ratio).round() as usize;

        if frames == 0 {
            return Ok(Waveform {
                channels: vec![Vec::new(); self.channels.len()],
                sample_rate: target_rate,
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        // Single pass: chunk size equals the input length
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, self.channels.len())
            .map_err(|e| VxError::Resample(e.to_string()))?;
        let delay = resampler.output_delay();

        let mut output = resampler
            .process(&self.channels, None)
            .map_err(|e| VxError::Resample(e.to_string()))?;

        // Flush the filter tail so the delay can be trimmed without losing the end
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| VxError::Resample(e.to_string()))?;
        for (out, rest) in output.iter_mut().zip(tail) {
            out.extend(rest);
        }

        let channels: Vec<Vec<f32>> = output
            .into_iter()
            .map(|mut ch| {
                let mut trimmed = ch.split_off(delay.min(ch.len()));
                trimmed.resize(expected, 0.0);
                trimmed
            })
            .collect();

        log::debug!(
            "Resampled {} frames ({} Hz) -> {} frames ({} Hz)",
            frames,
            self.sample_rate,
            expected,
            target_rate
        );

        Ok(Waveform {
            channels,
            sample_rate: target_rate,
        })
    }

    /// Mono at `target_rate`: the canonical form the engine consumes
    pub fn into_canonical(self, target_rate: u32) -> VxResult<Waveform> {
        let mono = self.into_mono();
        if mono.sample_rate == target_rate {
            Ok(mono)
        } else {
            mono.resample_to(target_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_bad_construction() {
        assert!(matches!(
            Waveform::mono(vec![0.0; 4], 0),
            Err(VxError::InvalidSampleRate(0))
        ));
        assert!(Waveform::from_channels(Vec::new(), 44100).is_err());
        assert!(matches!(
            Waveform::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 44100),
            Err(VxError::ChannelLengthMismatch { channel: 1, .. })
        ));
        assert!(Waveform::from_interleaved(&[0.0; 5], 2, 44100).is_err());
    }

    #[test]
    fn test_interleave_round_trip() {
        let data = [1.0, -1.0, 0.5, -0.5, 0.25, -0.25];
        let wave = Waveform::from_interleaved(&data, 2, 48000).unwrap();

        assert_eq!(wave.num_channels(), 2);
        assert_eq!(wave.frames(), 3);
        assert_eq!(wave.channel(1).unwrap(), &[-1.0, -0.5, -0.25]);
        assert_eq!(wave.interleaved(), data.to_vec());
    }

    #[test]
    fn test_to_mono_averages_channels() {
        let wave = Waveform::from_channels(vec![vec![1.0, 0.0], vec![0.0, -1.0]], 44100).unwrap();
        let mono = wave.to_mono();

        assert!(mono.is_mono());
        assert_eq!(mono.samples(), &[0.5, -0.5]);
        assert_eq!(mono.sample_rate(), 44100);
    }

    #[test]
    fn test_subtract_requires_same_shape() {
        let a = Waveform::mono(vec![1.0, 1.0], 44100).unwrap();
        let b = Waveform::mono(vec![0.25, 0.5], 44100).unwrap();
        assert_eq!(a.subtract(&b).unwrap().samples(), &[0.75, 0.5]);

        let c = Waveform::mono(vec![0.0; 3], 44100).unwrap();
        assert!(a.subtract(&c).is_err());
    }

    #[test]
    fn test_levels() {
        let wave = Waveform::mono(vec![0.5, -0.5, 0.5, -0.5], 44100).unwrap();
        assert_relative_eq!(wave.peak(), 0.5);
        assert_relative_eq!(wave.rms(), 0.5);
        assert_relative_eq!(wave.duration_secs(), 4.0 / 44100.0);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let wave = Waveform::mono(vec![0.1, 0.2, 0.3], 44100).unwrap();
        assert_eq!(wave.resample_to(44100).unwrap(), wave);
    }

    #[test]
    fn test_resample_length_follows_ratio() {
        let frames = 48000;
        let samples: Vec<f32> = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin() * 0.5)
            .collect();
        let wave = Waveform::mono(samples, 48000).unwrap();

        let resampled = wave.resample_to(44100).unwrap();
        assert_eq!(resampled.sample_rate(), 44100);
        assert_eq!(resampled.frames(), 44100);
        assert!(resampled.peak() < 0.6);
    }

    #[test]
    fn test_resample_empty() {
        let wave = Waveform::mono(Vec::new(), 48000).unwrap();
        let resampled = wave.resample_to(44100).unwrap();
        assert!(resampled.is_empty());
        assert_eq!(resampled.sample_rate(), 44100);
    }

    #[test]
    fn test_into_canonical() {
        let wave = Waveform::from_channels(vec![vec![0.2; 16], vec![0.4; 16]], 44100).unwrap();
        let canonical = wave.into_canonical(44100).unwrap();
        assert!(canonical.is_mono());
        assert_relative_eq!(canonical.samples()[0], 0.3, epsilon = 1e-6);
    }
}
