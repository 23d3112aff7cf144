//! Accumulated build state
//!
//! One [`BuildState`] is created per sequencing run and threaded through
//! every step. Nothing else holds mutable state during a run.

use super::Placement;
use crate::normalize::{PreviewConfig, TrackField};
use grimnir_common::Track;
use std::collections::HashMap;

/// Maximum recency window in music placements (loop mode)
pub const MAX_RECENCY_WINDOW: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct BuildState {
    pub placements: Vec<Placement>,
    pub total_ms: i64,
    /// Music (non-ad) placements so far
    pub music_count: usize,
    /// Music placements counted for quota shares
    pub total_for_quota: usize,
    /// Per quota rule (same order as `PreviewConfig::quotas`)
    pub quota_counts: Vec<usize>,
    /// Field → value key → `total_ms` when last placed
    last_played: HashMap<TrackField, HashMap<String, i64>>,
    last_placed_track_id: Option<String>,
    /// Track id → 1-based music ordinal of its latest placement
    recently_played: HashMap<String, usize>,
    pub separation_relaxed: bool,
}

impl BuildState {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            quota_counts: vec![0; config.quotas.len()],
            ..Default::default()
        }
    }

    /// Fit constraint; the very first placement always fits
    pub fn fits(&self, track: &Track, config: &PreviewConfig) -> bool {
        self.placements.is_empty() || self.total_ms + track.duration_ms <= config.upper_bound_ms()
    }

    /// Interstitials never take the first-placement exemption
    pub fn ad_fits(&self, track: &Track, config: &PreviewConfig) -> bool {
        self.total_ms + track.duration_ms <= config.upper_bound_ms()
    }

    pub fn is_immediate_repeat(&self, track: &Track) -> bool {
        self.last_placed_track_id.as_deref() == Some(track.id.as_str())
    }

    /// True when the track played within the last `window` music placements
    pub fn is_recent(&self, track: &Track, window: usize) -> bool {
        match self.recently_played.get(&track.id) {
            Some(ordinal) => self.music_count - ordinal < window,
            None => false,
        }
    }

    /// True when any quota ceiling rejects this track
    pub fn exceeds_quota(&self, track: &Track, config: &PreviewConfig) -> bool {
        if self.total_for_quota == 0 {
            return false;
        }
        config
            .quotas
            .iter()
            .zip(&self.quota_counts)
            .any(|(rule, count)| match rule.max_pct {
                Some(max_pct) if rule.matches(track) => {
                    *count as f64 / self.total_for_quota as f64 * 100.0 >= max_pct
                }
                _ => false,
            })
    }

    /// Worst shortfall against the configured separation gaps (0 = clean)
    pub fn separation_violation_ms(&self, track: &Track, config: &PreviewConfig) -> i64 {
        if !config.separation_enabled {
            return 0;
        }
        config
            .separation
            .iter()
            .filter_map(|(field, gap_ms)| {
                let key = field.key_of(track)?;
                let last = self.last_played.get(field)?.get(&key)?;
                let elapsed = self.total_ms - last;
                (elapsed < *gap_ms).then_some(gap_ms - elapsed)
            })
            .max()
            .unwrap_or(0)
    }

    /// Append a music placement and update every counter
    pub fn place_music(&mut self, track: &Track, config: &PreviewConfig, from_fallback: bool) {
        for field in config.separation.keys() {
            if let Some(key) = field.key_of(track) {
                self.last_played
                    .entry(*field)
                    .or_default()
                    .insert(key, self.total_ms);
            }
        }

        for (rule, count) in config.quotas.iter().zip(self.quota_counts.iter_mut()) {
            if rule.matches(track) {
                *count += 1;
            }
        }

        self.music_count += 1;
        self.total_for_quota += 1;
        self.recently_played
            .insert(track.id.clone(), self.music_count);
        self.last_placed_track_id = Some(track.id.clone());
        self.push(track, false, from_fallback);
    }

    /// Append an interstitial; only the running total changes
    pub fn place_ad(&mut self, track: &Track, from_fallback: bool) {
        self.push(track, true, from_fallback);
    }

    fn push(&mut self, track: &Track, is_ad: bool, from_fallback: bool) {
        let starts_at_ms = self.total_ms;
        self.total_ms += track.duration_ms;
        self.placements.push(Placement {
            track: track.clone(),
            is_ad,
            from_fallback,
            starts_at_ms,
            ends_at_ms: self.total_ms,
        });
    }
}
