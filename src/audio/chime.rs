use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const TONE_MS: u32 = 180;
const GAP_MS: u32 = 40;
const FADE_MS: u32 = 10;

/// Short descending two-tone warning chime.
pub struct WarningChime {
    tones: [f32; 2],
    num_sample: u32,
    total_samples: u32,
}

impl WarningChime {
    pub fn new() -> Self {
        let per_tone = ms_to_samples(TONE_MS);
        Self {
            tones: [880.0, 660.0],
            num_sample: 0,
            total_samples: per_tone * 2 + ms_to_samples(GAP_MS),
        }
    }

    fn sample_at(&self, n: u32) -> f32 {
        let per_tone = ms_to_samples(TONE_MS);
        let gap = ms_to_samples(GAP_MS);

        let (freq, offset) = if n < per_tone {
            (self.tones[0], n)
        } else if n < per_tone + gap {
            return 0.0;
        } else {
            (self.tones[1], n - per_tone - gap)
        };

        // Linear fade in/out so the tone edges do not click.
        let fade = ms_to_samples(FADE_MS) as f32;
        let envelope = (offset as f32 / fade)
            .min((per_tone - offset) as f32 / fade)
            .min(1.0);

        let t = offset as f32 / SAMPLE_RATE as f32;
        (2.0 * PI * freq * t).sin() * envelope * 0.4
    }
}

impl Default for WarningChime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for WarningChime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let sample = self.sample_at(self.num_sample);
        self.num_sample += 1;
        Some(sample)
    }
}

impl Source for WarningChime {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total_samples - self.num_sample) as usize)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_millis((TONE_MS * 2 + GAP_MS) as u64))
    }
}

fn ms_to_samples(ms: u32) -> u32 {
    SAMPLE_RATE / 1000 * ms
}
