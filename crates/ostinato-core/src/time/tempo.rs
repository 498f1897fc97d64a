//! Tempo map: bidirectional mapping between musical and wall-clock time.

/// A tempo change taking effect at a beat position.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoPoint {
    beat: f64,
    bpm: f64,
}

/// Piecewise-constant tempo map.
///
/// A single-point map (the common case) takes a closed-form fast path;
/// otherwise conversion walks the segments.
#[derive(Debug, Clone)]
pub struct TempoMap {
    points: Vec<TempoPoint>,
    sample_rate: f64,
}

impl TempoMap {
    pub fn new(bpm: f64, sample_rate: f64) -> Self {
        Self {
            points: vec![TempoPoint { beat: 0.0, bpm }],
            sample_rate,
        }
    }

    /// Insert a tempo change. Points are kept sorted by beat; a point at an
    /// existing beat replaces it.
    pub fn set_tempo_at(&mut self, beat: f64, bpm: f64) {
        match self.points.binary_search_by(|p| p.beat.total_cmp(&beat)) {
            Ok(i) => self.points[i].bpm = bpm,
            Err(i) => self.points.insert(i, TempoPoint { beat, bpm }),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        if self.points.len() == 1 {
            return beats * 60.0 / self.points[0].bpm;
        }

        let mut seconds = 0.0;
        let mut prev_beat = 0.0;
        let mut prev_bpm = self.points[0].bpm;

        for point in &self.points {
            if point.beat >= beats {
                break;
            }
            seconds += (point.beat - prev_beat) * 60.0 / prev_bpm;
            prev_beat = point.beat;
            prev_bpm = point.bpm;
        }

        seconds + (beats - prev_beat) * 60.0 / prev_bpm
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        if self.points.len() == 1 {
            return seconds * self.points[0].bpm / 60.0;
        }

        let mut current_seconds = 0.0;
        let mut current_beat = 0.0;

        for i in 0..self.points.len() {
            let bpm = self.points[i].bpm;
            let next_beat = if i + 1 < self.points.len() {
                self.points[i + 1].beat
            } else {
                f64::MAX
            };

            let segment_beats = next_beat - self.points[i].beat.max(current_beat);
            let segment_seconds = segment_beats * 60.0 / bpm;

            if current_seconds + segment_seconds >= seconds {
                let remaining = seconds - current_seconds;
                return current_beat + remaining * bpm / 60.0;
            }

            current_seconds += segment_seconds;
            current_beat = next_beat;
        }

        current_beat
    }

    pub fn beats_to_samples(&self, beats: f64) -> i64 {
        (self.beats_to_seconds(beats) * self.sample_rate).round() as i64
    }

    pub fn samples_to_beats(&self, samples: i64) -> f64 {
        self.seconds_to_beats(samples as f64 / self.sample_rate)
    }
}
