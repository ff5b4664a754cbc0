use std::path::Path;

use anyhow::{Context, Result};
use plotconfig::SignalKind;
use rand::prelude::*;
use xyplot::{DataSource, DataSourceError};

/// Horizontal span covered by synthetic signals, in data units.
pub const SIGNAL_SPAN: f64 = 10.0;

/// Synthetic sample generator that animates over time.
pub struct Signal {
    kind: SignalKind,
    points: usize,
    phase: f64,
    paused: bool,
    rng: StdRng,
}

impl Signal {
    pub fn new(kind: SignalKind, points: usize, seed: u64) -> Self {
        Self {
            kind,
            points,
            phase: 0.0,
            paused: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Advances the animation by `seconds` and rewrites `source`. Returns
    /// false while paused.
    pub fn tick(
        &mut self,
        seconds: f64,
        source: &mut DataSource,
    ) -> Result<bool, DataSourceError> {
        if self.paused {
            return Ok(false);
        }
        self.phase += seconds;
        self.write(source)?;
        Ok(true)
    }

    pub fn write(&mut self, source: &mut DataSource) -> Result<(), DataSourceError> {
        let points = self.points;
        let kind = self.kind;
        let phase = self.phase;
        let rng = &mut self.rng;
        let width = points.checked_mul(2).ok_or(DataSourceError::Overflow {
            width: points,
            height: 2,
        })?;
        source.fill_with(width, 1, |buffer| {
            let step = if points > 1 {
                SIGNAL_SPAN / (points - 1) as f64
            } else {
                0.0
            };
            for (i, pair) in buffer.chunks_exact_mut(2).enumerate() {
                let x = step * i as f64;
                pair[0] = x;
                pair[1] = match kind {
                    SignalKind::Sine => (2.0 * (x - phase)).sin(),
                    SignalKind::Noise => {
                        0.6 * (x - phase).sin() + rng.gen_range(-0.4..=0.4)
                    }
                    SignalKind::Ramp => {
                        let t = ((x + phase) / SIGNAL_SPAN).rem_euclid(1.0);
                        3.0 * t - 1.5
                    }
                };
            }
        })
    }
}

/// Reads a JSON array of `[x, y]` pairs and flattens it into the interleaved
/// layout a [`DataSource`] row expects.
pub fn load_pairs(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sample file {}", path.display()))?;
    parse_pairs(&text).with_context(|| format!("invalid sample file {}", path.display()))
}

pub fn parse_pairs(text: &str) -> Result<Vec<f64>> {
    let pairs: Vec<[f64; 2]> = serde_json::from_str(text)?;
    Ok(pairs.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(source: &DataSource) -> Vec<(f64, f64)> {
        source
            .data()
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    #[test]
    fn sine_spans_the_signal_range() {
        let mut signal = Signal::new(SignalKind::Sine, 11, 7);
        let mut source = DataSource::new();
        signal.write(&mut source).unwrap();
        assert_eq!(source.sample_count(), 11);
        let samples = pairs(&source);
        assert_eq!(samples[0], (0.0, 0.0));
        assert!((samples[10].0 - SIGNAL_SPAN).abs() < 1e-12);
        assert!(samples.iter().all(|(_, y)| (-1.0..=1.0).contains(y)));
    }

    #[test]
    fn ticking_advances_revision_until_paused() {
        let mut signal = Signal::new(SignalKind::Ramp, 16, 1);
        let mut source = DataSource::new();
        assert!(signal.tick(0.1, &mut source).unwrap());
        let revision = source.revision();
        assert!(signal.toggle_pause());
        assert!(!signal.tick(0.1, &mut source).unwrap());
        assert_eq!(source.revision(), revision);
        assert!(!signal.toggle_pause());
        assert!(signal.tick(0.1, &mut source).unwrap());
        assert_ne!(source.revision(), revision);
    }

    #[test]
    fn noise_is_reproducible_per_seed() {
        let mut a = DataSource::new();
        let mut b = DataSource::new();
        Signal::new(SignalKind::Noise, 32, 42).write(&mut a).unwrap();
        Signal::new(SignalKind::Noise, 32, 42).write(&mut b).unwrap();
        assert_eq!(a.data(), b.data());
        assert!(pairs(&a).iter().all(|(_, y)| y.abs() <= 1.0));
    }

    #[test]
    fn single_point_signal_sits_at_origin() {
        let mut source = DataSource::new();
        Signal::new(SignalKind::Sine, 1, 0).write(&mut source).unwrap();
        assert_eq!(pairs(&source), vec![(0.0, 0.0)]);
    }

    #[test]
    fn oversized_signals_are_rejected() {
        let mut source = DataSource::new();
        let err = Signal::new(SignalKind::Ramp, usize::MAX, 0)
            .write(&mut source)
            .unwrap_err();
        assert!(matches!(err, DataSourceError::Overflow { .. }));
        assert_eq!(source.revision(), 0);
    }

    #[test]
    fn parses_pair_arrays() {
        assert_eq!(
            parse_pairs("[[0, 1], [2.5, -3]]").unwrap(),
            vec![0.0, 1.0, 2.5, -3.0]
        );
        assert!(parse_pairs("[]").unwrap().is_empty());
        assert!(parse_pairs("[[0, 1, 2]]").is_err());
    }

    #[test]
    fn loads_pairs_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(&path, "[[1, 10], [2, 100]]").unwrap();
        assert_eq!(load_pairs(&path).unwrap(), vec![1.0, 10.0, 2.0, 100.0]);
        assert!(load_pairs(&dir.path().join("missing.json")).is_err());
    }
}
