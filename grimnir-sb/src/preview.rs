//! Preview generation and output
//!
//! [`PreviewService`] runs the full pipeline (normalize, fetch pools,
//! sequence) for a block. Several variants can be generated from a single
//! pool fetch; each runs on Tokio's blocking pool with its own state and
//! RNG (`seed + index`).
//!
//! The produced [`SequenceResult`] is consumed by [`render_preview`] (text
//! listing) and [`materialize_slot`] (wall-clock schedule entries).

use crate::catalog::{Catalog, RuleSetResolver, SmartBlockDefinition};
use crate::error::{Result, SmartBlockError};
use crate::normalize::{normalize, normalize_at, PreviewConfig};
use crate::pool::PoolBuilder;
use crate::rules::{RuleDocument, SequenceDocument};
use crate::sequence::scoring::bpm_energy;
use crate::sequence::{build_sequence, SequenceResult, SequenceWarning};
use chrono::{DateTime, Duration, Utc};
use grimnir_common::time::format_duration_ms;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

/// What to preview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// Block being generated (used to skip self-referencing fallbacks)
    pub block_id: Option<String>,
    pub station_id: String,
    pub rules: RuleDocument,
    pub sequence: SequenceDocument,
    pub seed: u64,
}

impl PreviewRequest {
    pub fn for_block(block: &SmartBlockDefinition, station_id: impl Into<String>, seed: u64) -> Self {
        Self {
            block_id: Some(block.id.clone()),
            station_id: station_id.into(),
            rules: block.rules.clone(),
            sequence: block.sequence.clone(),
            seed,
        }
    }
}

/// Runs previews against a catalog and block resolver
#[derive(Clone)]
pub struct PreviewService {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<dyn RuleSetResolver>,
    current_year: Option<i32>,
}

impl PreviewService {
    pub fn new(catalog: Arc<dyn Catalog>, resolver: Arc<dyn RuleSetResolver>) -> Self {
        Self {
            catalog,
            resolver,
            current_year: None,
        }
    }

    /// Pin the year used for `current` era labels (wall clock otherwise)
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    fn config_for(&self, rules: &RuleDocument, sequence: &SequenceDocument) -> PreviewConfig {
        match self.current_year {
            Some(year) => normalize_at(rules, sequence, year),
            None => normalize(rules, sequence),
        }
    }

    /// Generate a single sequence
    pub async fn preview(&self, request: &PreviewRequest) -> Result<SequenceResult> {
        let mut variants = self.preview_variants(request, 1).await?;
        variants
            .pop()
            .ok_or_else(|| SmartBlockError::Variant("no variant produced".to_string()))
    }

    /// Load a stored block and preview it
    pub async fn preview_block(&self, block_id: &str, station_id: &str, seed: u64) -> Result<SequenceResult> {
        let block = self
            .resolver
            .resolve_block(block_id)
            .await?
            .ok_or_else(|| SmartBlockError::NotFound(block_id.to_string()))?;
        self.preview(&PreviewRequest::for_block(&block, station_id, seed)).await
    }

    /// Generate `count` independent variants from one pool fetch
    ///
    /// Variant `i` is seeded with `seed + i`; results are in index order.
    pub async fn preview_variants(&self, request: &PreviewRequest, count: usize) -> Result<Vec<SequenceResult>> {
        let config = self.config_for(&request.rules, &request.sequence);

        let mut builder = PoolBuilder::new(self.catalog.as_ref(), self.resolver.as_ref(), request.station_id.clone());
        if let Some(year) = self.current_year {
            builder = builder.with_current_year(year);
        }
        let pools = builder.build(&config, request.block_id.as_deref()).await?;

        let config = Arc::new(config);
        let pools = Arc::new(pools);
        let mut tasks = JoinSet::new();
        for index in 0..count {
            let config = Arc::clone(&config);
            let pools = Arc::clone(&pools);
            let seed = request.seed.wrapping_add(index as u64);
            tasks.spawn_blocking(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                (index, build_sequence(&config, &pools, &mut rng))
            });
        }

        let mut variants = Vec::with_capacity(count);
        while let Some(joined) = tasks.join_next().await {
            let variant = joined.map_err(|e| SmartBlockError::Variant(e.to_string()))?;
            debug!(index = variant.0, total_ms = variant.1.total_ms, "Variant complete");
            variants.push(variant);
        }
        variants.sort_by_key(|(index, _)| *index);

        info!(
            station_id = %request.station_id,
            block_id = ?request.block_id,
            variants = variants.len(),
            seed = request.seed,
            "Preview generated"
        );
        Ok(variants.into_iter().map(|(_, result)| result).collect())
    }
}

/// Human-readable track listing with the aggregate duration
///
/// ```text
///  1.  0:00  Artist - Title (3:45)
///  2.  3:45  [AD] Sponsor - Spring Sale (0:30)
/// Total: 4:15 (1 tracks, 1 interstitials)
/// ```
pub fn render_preview(result: &SequenceResult) -> String {
    let mut out = String::new();
    if result.is_empty() {
        out.push_str("(no placements)\n");
    }

    for (i, placement) in result.placements.iter().enumerate() {
        let track = &placement.track;
        let marker = if placement.is_ad { "[AD] " } else { "" };
        let _ = writeln!(
            out,
            "{:>2}. {:>5}  {}{} - {} ({})",
            i + 1,
            format_duration_ms(placement.starts_at_ms),
            marker,
            display_or(&track.artist, "Unknown Artist"),
            display_or(&track.title, &track.id),
            format_duration_ms(placement.duration_ms())
        );
    }

    let _ = writeln!(
        out,
        "Total: {} ({} tracks, {} interstitials)",
        format_duration_ms(result.total_ms),
        result.music_count(),
        result.ad_count()
    );

    for warning in &result.warnings {
        let _ = writeln!(out, "Warning: {}", describe_warning(warning));
    }
    out
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn describe_warning(warning: &SequenceWarning) -> String {
    match warning {
        SequenceWarning::Underfilled {
            total_ms,
            lower_bound_ms,
        } => format!(
            "underfilled: {} of at least {}",
            format_duration_ms(*total_ms),
            format_duration_ms(*lower_bound_ms)
        ),
        SequenceWarning::UsedFallback => "fallback blocks supplied tracks".to_string(),
        SequenceWarning::QuotaMinimumUnmet {
            field,
            value,
            share_pct,
            min_pct,
        } => format!(
            "quota {}={} at {:.0}% (minimum {:.0}%)",
            field, value, share_pct, min_pct
        ),
        SequenceWarning::SeparationRelaxed => "separation relaxed to fill the block".to_string(),
        SequenceWarning::Trimmed { removed_track_id } => {
            format!("removed {} to correct overshoot", removed_track_id)
        }
    }
}

/// One concrete entry of a scheduled slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledItem {
    pub id: Uuid,
    pub media_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_ad: bool,
    /// BPM-derived energy (music only)
    pub energy: Option<f64>,
}

/// Anchor a result's placements at a wall-clock slot start
pub fn materialize_slot(result: &SequenceResult, slot_start: DateTime<Utc>) -> Vec<ScheduledItem> {
    result
        .placements
        .iter()
        .map(|placement| ScheduledItem {
            id: Uuid::new_v4(),
            media_id: placement.track.id.clone(),
            starts_at: slot_start + Duration::milliseconds(placement.starts_at_ms),
            ends_at: slot_start + Duration::milliseconds(placement.ends_at_ms),
            is_ad: placement.is_ad,
            energy: (!placement.is_ad).then(|| bpm_energy(placement.track.bpm)),
        })
        .collect()
}
