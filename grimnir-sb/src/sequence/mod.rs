//! Sequence builder
//!
//! Greedily fills the target duration from an immutable pool snapshot:
//!
//! 1. **Primary phase** over the music pool (one pass, or up to
//!    [`MAX_LOOP_PASSES`] in loop mode)
//! 2. **Fallback phase** over the fallback pool, only when the primary phase
//!    stopped short of `target - accuracy`
//! 3. **Trim** a single overshooting placement (see [`crate::trim`])
//!
//! Interstitial breaks are interleaved on the configured cadence in both
//! phases. All randomness comes from the caller's RNG, so a fixed seed
//! reproduces the same result.

pub mod scoring;
pub mod state;

pub use state::BuildState;

use crate::normalize::PreviewConfig;
use crate::trim::trim_overshoot;
use grimnir_common::Track;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use scoring::{combined_score, duration_score, energy_score};
use state::MAX_RECENCY_WINDOW;

/// Upper bound on passes over the pool in loop mode
pub const MAX_LOOP_PASSES: usize = 100;

/// One scheduled track or interstitial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub track: Track,
    pub is_ad: bool,
    /// Drawn from a fallback block's pool
    #[serde(default)]
    pub from_fallback: bool,
    /// Offset from block start
    pub starts_at_ms: i64,
    pub ends_at_ms: i64,
}

impl Placement {
    pub fn duration_ms(&self) -> i64 {
        self.track.duration_ms
    }
}

/// Diagnostics attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceWarning {
    /// Total ended below `target - accuracy`
    Underfilled { total_ms: i64, lower_bound_ms: i64 },
    /// At least one placement came from a fallback pool
    UsedFallback,
    /// Final share of a quota value is below its minimum
    QuotaMinimumUnmet {
        field: String,
        value: String,
        share_pct: f64,
        min_pct: f64,
    },
    /// A placement was accepted despite violating separation
    SeparationRelaxed,
    /// One placement was removed to correct overshoot
    Trimmed { removed_track_id: String },
}

/// Ordered placements and their aggregate duration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub placements: Vec<Placement>,
    pub total_ms: i64,
    #[serde(default)]
    pub warnings: Vec<SequenceWarning>,
}

impl SequenceResult {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn music_count(&self) -> usize {
        self.placements.iter().filter(|p| !p.is_ad).count()
    }

    pub fn ad_count(&self) -> usize {
        self.placements.iter().filter(|p| p.is_ad).count()
    }

    pub fn has_warning(&self, predicate: impl Fn(&SequenceWarning) -> bool) -> bool {
        self.warnings.iter().any(predicate)
    }
}

/// Read-only pools for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePools {
    pub music: Vec<Track>,
    pub interstitials: Vec<Track>,
    pub fallback: Vec<Track>,
}

impl CandidatePools {
    pub fn is_empty(&self) -> bool {
        self.music.is_empty() && self.fallback.is_empty()
    }
}

/// Build a sequence from pre-fetched pools
pub fn build_sequence<R: Rng>(
    config: &PreviewConfig,
    pools: &CandidatePools,
    rng: &mut R,
) -> SequenceResult {
    let mut state = BuildState::new(config);
    let mut ad_cursor = 0usize;

    run_phase(
        &mut state,
        config,
        &pools.music,
        &pools.interstitials,
        &mut ad_cursor,
        Phase::Primary,
        rng,
    );
    debug!(
        total_ms = state.total_ms,
        placements = state.placements.len(),
        "Primary phase complete"
    );

    if state.total_ms < config.lower_bound_ms() && !pools.fallback.is_empty() {
        run_phase(
            &mut state,
            config,
            &pools.fallback,
            &pools.interstitials,
            &mut ad_cursor,
            Phase::Fallback,
            rng,
        );
        debug!(
            total_ms = state.total_ms,
            placements = state.placements.len(),
            "Fallback phase complete"
        );
    }

    let separation_relaxed = state.separation_relaxed;
    let mut placements = state.placements;
    let removed = trim_overshoot(&mut placements, config.target_ms);
    let total_ms = assign_offsets(&mut placements);

    let mut result = SequenceResult {
        placements,
        total_ms,
        warnings: Vec::new(),
    };
    result.warnings = collect_warnings(&result, config, separation_relaxed, removed.as_ref());

    info!(
        total_ms = result.total_ms,
        target_ms = config.target_ms,
        music = result.music_count(),
        ads = result.ad_count(),
        warnings = result.warnings.len(),
        "Sequence built"
    );
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Primary,
    Fallback,
}

fn run_phase<R: Rng>(
    state: &mut BuildState,
    config: &PreviewConfig,
    pool: &[Track],
    ads: &[Track],
    ad_cursor: &mut usize,
    phase: Phase,
    rng: &mut R,
) {
    if pool.is_empty() {
        return;
    }

    // Fallback pools are drained once; looping applies to the primary pool
    let max_passes = if config.loop_pool && phase == Phase::Primary {
        MAX_LOOP_PASSES
    } else {
        1
    };
    let recency_window = if config.loop_pool {
        MAX_RECENCY_WINDOW.min(pool.len() / 2)
    } else {
        0
    };
    let from_fallback = phase == Phase::Fallback;

    for pass in 0..max_passes {
        let mut used = vec![false; pool.len()];
        let mut added = 0usize;

        while state.total_ms < config.lower_bound_ms() {
            let available: Vec<usize> = (0..pool.len()).filter(|i| !used[*i]).collect();
            if available.is_empty() {
                break;
            }

            let Some(selection) = select_candidate(state, config, pool, &available, recency_window, rng)
            else {
                break;
            };

            used[selection.index] = true;
            if selection.relaxed {
                state.separation_relaxed = true;
            }
            state.place_music(&pool[selection.index], config, from_fallback);
            added += 1;
            insert_break(state, config, ads, ad_cursor, from_fallback);
        }

        debug!(?phase, pass, added, total_ms = state.total_ms, "Pass complete");
        if added == 0 || state.total_ms >= config.lower_bound_ms() {
            break;
        }
    }
}

struct Selection {
    index: usize,
    relaxed: bool,
}

struct Scored {
    index: usize,
    duration: i64,
    combined: f64,
}

/// Pick the best candidate among `available` pool indices
///
/// Hard constraints filter first. When every survivor violates separation
/// the least-bad one is taken and the selection is marked relaxed.
fn select_candidate<R: Rng>(
    state: &BuildState,
    config: &PreviewConfig,
    pool: &[Track],
    available: &[usize],
    recency_window: usize,
    rng: &mut R,
) -> Option<Selection> {
    let guard_repeat = available.len() > 1;

    let mut clean = Vec::new();
    let mut violating = Vec::new();
    for &index in available {
        let track = &pool[index];
        if !state.fits(track, config)
            || (guard_repeat && state.is_immediate_repeat(track))
            || (recency_window > 0 && state.is_recent(track, recency_window))
            || state.exceeds_quota(track, config)
        {
            continue;
        }

        let violation_ms = state.separation_violation_ms(track, config);
        let energy = if config.energy_enabled {
            energy_score(track, &config.energy_curve, state.total_ms, config.target_ms)
        } else {
            0.0
        };
        let scored = Scored {
            index,
            duration: duration_score(config.target_ms, state.total_ms, track.duration_ms),
            combined: combined_score(violation_ms, energy),
        };
        if violation_ms == 0 {
            clean.push(scored);
        } else {
            violating.push(scored);
        }
    }

    let relaxed = clean.is_empty();
    let candidates = if relaxed { violating } else { clean };
    pick_best(&candidates, rng).map(|index| Selection { index, relaxed })
}

fn pick_best<R: Rng>(candidates: &[Scored], rng: &mut R) -> Option<usize> {
    let mut best: Option<&Scored> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                if candidate.duration > current.duration
                    || (candidate.duration == current.duration && candidate.combined > current.combined)
                {
                    Some(candidate)
                } else if candidate.duration == current.duration
                    && candidate.combined == current.combined
                    && rng.gen_bool(0.5)
                {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.map(|s| s.index)
}

/// Append interstitials after every `every_n`-th music placement
fn insert_break(
    state: &mut BuildState,
    config: &PreviewConfig,
    ads: &[Track],
    cursor: &mut usize,
    from_fallback: bool,
) {
    let settings = &config.interstitials;
    if !settings.enabled || ads.is_empty() || state.music_count % settings.every_n != 0 {
        return;
    }

    for _ in 0..settings.per_break {
        let ad = &ads[*cursor % ads.len()];
        // The cursor advances even when the ad does not fit
        *cursor = (*cursor + 1) % ads.len();
        if state.ad_fits(ad, config) {
            state.place_ad(ad, from_fallback);
        }
    }
}

/// Recompute start/end offsets and return the total
pub fn assign_offsets(placements: &mut [Placement]) -> i64 {
    let mut total_ms = 0;
    for placement in placements.iter_mut() {
        placement.starts_at_ms = total_ms;
        total_ms += placement.duration_ms();
        placement.ends_at_ms = total_ms;
    }
    total_ms
}

fn collect_warnings(
    result: &SequenceResult,
    config: &PreviewConfig,
    separation_relaxed: bool,
    removed: Option<&Placement>,
) -> Vec<SequenceWarning> {
    let mut warnings = Vec::new();
    if result.is_empty() {
        return warnings;
    }

    if result.total_ms < config.lower_bound_ms() {
        warnings.push(SequenceWarning::Underfilled {
            total_ms: result.total_ms,
            lower_bound_ms: config.lower_bound_ms(),
        });
    }

    if result.placements.iter().any(|p| p.from_fallback && !p.is_ad) {
        warnings.push(SequenceWarning::UsedFallback);
    }

    let music: Vec<&Track> = result
        .placements
        .iter()
        .filter(|p| !p.is_ad)
        .map(|p| &p.track)
        .collect();
    if !music.is_empty() {
        for rule in &config.quotas {
            let Some(min_pct) = rule.min_pct else {
                continue;
            };
            let matching = music.iter().filter(|t| rule.matches(t)).count();
            let share_pct = matching as f64 / music.len() as f64 * 100.0;
            if share_pct < min_pct {
                warnings.push(SequenceWarning::QuotaMinimumUnmet {
                    field: rule.field.as_str().to_string(),
                    value: rule.value.clone(),
                    share_pct,
                    min_pct,
                });
            }
        }
    }

    if separation_relaxed {
        warnings.push(SequenceWarning::SeparationRelaxed);
    }

    if let Some(removed) = removed {
        warnings.push(SequenceWarning::Trimmed {
            removed_track_id: removed.track.id.clone(),
        });
    }

    warnings
}
