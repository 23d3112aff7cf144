//! Post-processing overshoot trim
//!
//! At most one music placement is removed, and only when doing so brings
//! the total strictly closer to the target. A result may still end outside
//! tolerance afterwards; one removal is all this pass ever does.

use crate::sequence::Placement;
use tracing::debug;

/// Remove the single music placement that best corrects overshoot
///
/// Never removes the only music placement, and never removes a placement
/// whose neighbours are the same track. Offsets are left stale; callers
/// recompute them.
pub fn trim_overshoot(placements: &mut Vec<Placement>, target_ms: i64) -> Option<Placement> {
    let total_ms: i64 = placements.iter().map(Placement::duration_ms).sum();
    let overshoot = total_ms - target_ms;
    if overshoot <= 0 {
        return None;
    }

    let music_count = placements.iter().filter(|p| !p.is_ad).count();
    if music_count <= 1 {
        return None;
    }

    let mut best: Option<(usize, i64)> = None;
    for (index, placement) in placements.iter().enumerate() {
        if placement.is_ad || would_join_repeats(placements, index) {
            continue;
        }
        let distance = (total_ms - placement.duration_ms() - target_ms).abs();
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }

    let (index, distance) = best?;
    if distance >= overshoot {
        return None;
    }

    let removed = placements.remove(index);
    debug!(
        track_id = %removed.track.id,
        overshoot_ms = overshoot,
        remaining_distance_ms = distance,
        "Trimmed overshooting placement"
    );
    Some(removed)
}

fn would_join_repeats(placements: &[Placement], index: usize) -> bool {
    if index == 0 || index + 1 >= placements.len() {
        return false;
    }
    placements[index - 1].track.id == placements[index + 1].track.id
}
