//! Candidate scoring
//!
//! Candidates are ranked first by how close they bring the running total to
//! the target, then by a combined score:
//!
//! ```text
//! combined = (SEPARATION_BASE - worst_separation_violation_ms) + energy_score
//! ```
//!
//! The separation term only differs between candidates when every
//! candidate violates separation (least-bad selection). The energy term is
//! zero unless an energy curve is active.

use grimnir_common::Track;

/// Base of the separation term in the combined score
pub const SEPARATION_BASE: f64 = 1_000_000.0;

/// BPM mapped to energy 0
pub const ENERGY_BPM_FLOOR: f64 = 60.0;

/// BPM span mapped onto 0-100 energy
pub const ENERGY_BPM_SPAN: f64 = 120.0;

/// Closeness of `total + candidate` to the target (higher is better)
///
/// Peaks at `target_ms` when the candidate lands exactly on target.
pub fn duration_score(target_ms: i64, total_ms: i64, candidate_ms: i64) -> i64 {
    target_ms - (target_ms - (total_ms + candidate_ms)).abs()
}

/// BPM-derived energy estimate (0-100)
///
/// Unknown tempo (`bpm <= 0`) is treated as full energy.
pub fn bpm_energy(bpm: f64) -> f64 {
    if bpm <= 0.0 {
        return 100.0;
    }
    ((bpm - ENERGY_BPM_FLOOR) / ENERGY_BPM_SPAN * 100.0).clamp(0.0, 100.0)
}

/// Curve value for the current position in the block
///
/// Position is `total / target` scaled onto the curve, clamped to the last
/// point once the block runs past its target.
pub fn target_energy(curve: &[u8], total_ms: i64, target_ms: i64) -> Option<f64> {
    if curve.is_empty() || target_ms <= 0 {
        return None;
    }
    let position = (total_ms.max(0) as f64 / target_ms as f64 * curve.len() as f64).floor();
    let index = (position as usize).min(curve.len() - 1);
    Some(f64::from(curve[index]))
}

/// `100 - |track energy - target energy|`, or 0 without a curve
pub fn energy_score(track: &Track, curve: &[u8], total_ms: i64, target_ms: i64) -> f64 {
    match target_energy(curve, total_ms, target_ms) {
        Some(target) => 100.0 - (bpm_energy(track.bpm) - target).abs(),
        None => 0.0,
    }
}

/// Tie-breaker applied between equal duration scores
pub fn combined_score(worst_violation_ms: i64, energy_score: f64) -> f64 {
    (SEPARATION_BASE - worst_violation_ms as f64) + energy_score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_score_peaks_at_target() {
        assert_eq!(duration_score(600_000, 360_000, 240_000), 600_000);
        assert_eq!(duration_score(600_000, 360_000, 180_000), 540_000);
        // Overshoot is penalized symmetrically
        assert_eq!(duration_score(600_000, 360_000, 300_000), 540_000);
    }

    #[test]
    fn test_bpm_energy_mapping() {
        assert_eq!(bpm_energy(60.0), 0.0);
        assert_eq!(bpm_energy(120.0), 50.0);
        assert_eq!(bpm_energy(180.0), 100.0);
        assert_eq!(bpm_energy(40.0), 0.0);
        assert_eq!(bpm_energy(240.0), 100.0);
        assert_eq!(bpm_energy(0.0), 100.0);
    }

    #[test]
    fn test_target_energy_index() {
        let curve = [10, 50, 90];
        assert_eq!(target_energy(&curve, 0, 600_000), Some(10.0));
        assert_eq!(target_energy(&curve, 200_000, 600_000), Some(50.0));
        assert_eq!(target_energy(&curve, 599_999, 600_000), Some(90.0));
        // Past the target the last point applies
        assert_eq!(target_energy(&curve, 900_000, 600_000), Some(90.0));
        assert_eq!(target_energy(&[], 0, 600_000), None);
    }

    #[test]
    fn test_energy_score() {
        let calm = Track {
            bpm: 60.0,
            ..Default::default()
        };
        let loud = Track {
            bpm: 180.0,
            ..Default::default()
        };
        let curve = [0];
        assert_eq!(energy_score(&calm, &curve, 0, 600_000), 100.0);
        assert_eq!(energy_score(&loud, &curve, 0, 600_000), 0.0);
        assert_eq!(energy_score(&loud, &[], 0, 600_000), 0.0);
    }

    #[test]
    fn test_combined_score_prefers_smaller_violation() {
        assert!(combined_score(0, 0.0) > combined_score(60_000, 0.0));
        assert!(combined_score(0, 80.0) > combined_score(0, 20.0));
    }
}
