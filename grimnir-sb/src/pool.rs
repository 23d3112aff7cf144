//! Candidate pool builder
//!
//! Fetches the three pools a run draws from, once, before sequencing:
//! - **Music**: one catalog query plus optional post-fetch year/explicit pass
//! - **Interstitials**: one query against the configured ad source
//! - **Fallback**: music pools of referenced blocks, one level deep
//!
//! Tracks without a positive duration are dropped from every pool so each
//! accepted placement strictly advances the running total.

use crate::catalog::{Catalog, RuleSetResolver, StationScope, TextSearch, TrackFilter};
use crate::error::Result;
use crate::normalize::{normalize_at, InterstitialSource, PreviewConfig};
use crate::sequence::CandidatePools;
use chrono::Datelike;
use grimnir_common::Track;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Builds candidate pools against a catalog and a block resolver
pub struct PoolBuilder<'a> {
    catalog: &'a dyn Catalog,
    resolver: &'a dyn RuleSetResolver,
    station_id: String,
    current_year: i32,
}

impl<'a> PoolBuilder<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        resolver: &'a dyn RuleSetResolver,
        station_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            station_id: station_id.into(),
            current_year: grimnir_common::time::now().year(),
        }
    }

    /// Fix the year used for `current` era labels in fallback blocks
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Build every pool for a block
    ///
    /// `block_id` identifies the block being generated so fallbacks that
    /// point back at it can be skipped.
    pub async fn build(&self, config: &PreviewConfig, block_id: Option<&str>) -> Result<CandidatePools> {
        let music = self.music_pool(config).await?;
        let interstitials = self.interstitial_pool(config).await?;
        let fallback = self.fallback_pool(config, block_id, &music).await?;

        info!(
            station_id = %self.station_id,
            music = music.len(),
            interstitials = interstitials.len(),
            fallback = fallback.len(),
            "Candidate pools built"
        );

        Ok(CandidatePools {
            music,
            interstitials,
            fallback,
        })
    }

    /// Music pool for a normalized configuration
    pub async fn music_pool(&self, config: &PreviewConfig) -> Result<Vec<Track>> {
        let filters = &config.filters;
        let scope = StationScope {
            station_id: self.station_id.clone(),
            include_public_archive: filters.include_public_archive,
        };
        let filter = TrackFilter {
            genre: filters.genre.clone(),
            artist: filters.artist.clone(),
            mood: filters.mood.clone(),
            language: filters.language.clone(),
            text_search: filters.text_search.clone().map(TextSearch::music),
            bpm_min: filters.bpm.and_then(|r| r.min),
            bpm_max: filters.bpm.and_then(|r| r.max),
            source_playlists: filters.source_playlists.clone(),
        };

        let fetched = self.catalog.query_tracks(&scope, &filter).await?;
        let fetched_count = fetched.len();
        let post_fetch = filters.needs_post_fetch();
        let tracks: Vec<Track> = fetched
            .into_iter()
            .filter(|t| t.duration_ms > 0)
            .filter(|t| !post_fetch || filters.accepts(t))
            .collect();

        debug!(
            fetched = fetched_count,
            kept = tracks.len(),
            post_fetch,
            "Music pool filtered"
        );
        Ok(tracks)
    }

    /// Interstitial pool; empty unless interstitials are enabled
    pub async fn interstitial_pool(&self, config: &PreviewConfig) -> Result<Vec<Track>> {
        let settings = &config.interstitials;
        let source = match (&settings.source, settings.enabled) {
            (Some(source), true) => source,
            _ => return Ok(Vec::new()),
        };

        let filter = match source {
            InterstitialSource::Playlist(id) => TrackFilter {
                source_playlists: vec![id.clone()],
                ..Default::default()
            },
            InterstitialSource::Genre(genre) => TrackFilter {
                genre: Some(genre.clone()),
                ..Default::default()
            },
            InterstitialSource::Query(text) => TrackFilter {
                text_search: Some(TextSearch::interstitial(text.clone())),
                ..Default::default()
            },
        };

        let tracks: Vec<Track> = self
            .catalog
            .query_tracks(&StationScope::station(self.station_id.clone()), &filter)
            .await?
            .into_iter()
            .filter(|t| t.duration_ms > 0)
            .collect();

        debug!(source = ?source, count = tracks.len(), "Interstitial pool built");
        Ok(tracks)
    }

    /// Fallback pool: referenced blocks' music pools, deduplicated and capped
    ///
    /// Unresolvable references are skipped with a warning. Catalog failures
    /// while building a resolved block's pool propagate.
    pub async fn fallback_pool(
        &self,
        config: &PreviewConfig,
        block_id: Option<&str>,
        primary: &[Track],
    ) -> Result<Vec<Track>> {
        let mut seen: HashSet<String> = primary.iter().map(|t| t.id.clone()).collect();
        let mut pool = Vec::new();

        for fallback in &config.fallbacks {
            if block_id == Some(fallback.block_id.as_str()) {
                warn!(block_id = %fallback.block_id, "Skipping fallback that references its own block");
                continue;
            }

            let definition = match self.resolver.resolve_block(&fallback.block_id).await {
                Ok(Some(definition)) => definition,
                Ok(None) => {
                    warn!(block_id = %fallback.block_id, "Fallback block not found, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(block_id = %fallback.block_id, error = %e, "Fallback block resolution failed, skipping");
                    continue;
                }
            };

            // Nested fallbacks of the referenced block are not followed
            let fallback_config = normalize_at(&definition.rules, &definition.sequence, self.current_year);
            let tracks = self.music_pool(&fallback_config).await?;

            let before = pool.len();
            for track in tracks {
                if fallback.limit > 0 && pool.len() - before >= fallback.limit {
                    break;
                }
                if seen.insert(track.id.clone()) {
                    pool.push(track);
                }
            }

            debug!(
                block_id = %fallback.block_id,
                limit = fallback.limit,
                added = pool.len() - before,
                "Fallback pool extended"
            );
        }

        Ok(pool)
    }
}
