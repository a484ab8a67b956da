//! Particle buffer assignment tests
//!
//! Over-capacity assignment must truncate and report a warning through the
//! `log` facade.

use std::sync::{Mutex, OnceLock};

use log::{Level, LevelFilter, Log, Metadata, Record};
use tetflip::ParticleSet;

const MAX_PARTICLES: usize = 100;

/// Logger that keeps every warning for inspection.
struct CaptureLogger {
    warnings: Mutex<Vec<String>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut warnings) = self.warnings.lock() {
                warnings.push(record.args().to_string());
            }
        }
    }

    fn flush(&self) {}
}

fn logger() -> &'static CaptureLogger {
    static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();
    let logger = LOGGER.get_or_init(|| CaptureLogger {
        warnings: Mutex::new(Vec::new()),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Warn);
    }
    logger
}

fn warnings_mentioning(needle: &str) -> usize {
    logger()
        .warnings
        .lock()
        .map(|w| w.iter().filter(|m| m.contains(needle)).count())
        .unwrap_or(0)
}

#[test]
fn test_overflow_truncates_and_warns() {
    logger();
    let mut particles = ParticleSet::new(MAX_PARTICLES);
    let flat = vec![0.25f32; (MAX_PARTICLES + 5) * 3];

    let before = warnings_mentioning("positions truncated");
    let stored = particles.set_positions(&flat).unwrap();

    assert_eq!(stored, MAX_PARTICLES);
    assert_eq!(particles.count(), MAX_PARTICLES);
    assert!(
        warnings_mentioning("positions truncated") > before,
        "truncation should be reported as a warning"
    );
}

#[test]
fn test_exact_capacity_does_not_warn() {
    logger();
    let mut particles = ParticleSet::new(7);
    let flat = vec![0.0f32; 7 * 3];

    let stored = particles.set_velocities(&flat).unwrap();
    assert_eq!(stored, 7);
    // Velocity assignment does not change the live count
    assert_eq!(particles.count(), 0);
    assert_eq!(warnings_mentioning("velocities truncated"), 0);
}
