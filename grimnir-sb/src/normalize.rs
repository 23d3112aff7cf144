//! Config normalizer
//!
//! Turns the loosely-typed [`RuleDocument`]/[`SequenceDocument`] pair into a
//! fully-defaulted [`PreviewConfig`]. Everything downstream of this module
//! works on typed values only.
//!
//! A toggled feature (separation, quotas, fallbacks, interstitials, energy)
//! is applied only when its own enabled flag is true. The dashboard keeps
//! sub-documents around after a feature is switched off; those are ignored.

use crate::catalog::normalize_match_text;
use crate::rules::{
    value_as_bool, value_as_f64, value_as_i64, value_as_range, value_as_string,
    value_as_string_list, DocumentFields, RuleDocument, SequenceDocument,
};
use chrono::Datelike;
use grimnir_common::time::{minutes_to_ms, seconds_to_ms, MS_PER_MINUTE};
use grimnir_common::Track;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Default block length when `targetMinutes` is absent or invalid
pub const DEFAULT_TARGET_MINUTES: i64 = 60;

/// Longest block a document may ask for (one day)
pub const MAX_TARGET_MINUTES: i64 = 1440;

/// Default duration tolerance in seconds
pub const DEFAULT_ACCURACY_SECONDS: i64 = 2;

/// Tolerance bounds in seconds (inclusive)
pub const ACCURACY_SECONDS_RANGE: (i64, i64) = (1, 60);

/// Default interstitial cadence (one break every N music placements)
pub const DEFAULT_ADS_EVERY_N: usize = 4;

/// Default number of interstitials per break
pub const DEFAULT_ADS_PER_BREAK: usize = 1;

/// Track metadata fields addressable by quotas and separation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackField {
    Artist,
    Title,
    Album,
    Label,
    Genre,
    Mood,
    Language,
}

/// Fields that carry separation rules
pub const SEPARATION_FIELDS: [TrackField; 4] = [
    TrackField::Artist,
    TrackField::Title,
    TrackField::Album,
    TrackField::Label,
];

impl TrackField {
    /// Parse a field name as used in rule documents
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "artist" => Some(TrackField::Artist),
            "title" => Some(TrackField::Title),
            "album" => Some(TrackField::Album),
            "label" => Some(TrackField::Label),
            "genre" => Some(TrackField::Genre),
            "mood" => Some(TrackField::Mood),
            "language" => Some(TrackField::Language),
            _ => None,
        }
    }

    /// Field name as used in rule documents
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackField::Artist => "artist",
            TrackField::Title => "title",
            TrackField::Album => "album",
            TrackField::Label => "label",
            TrackField::Genre => "genre",
            TrackField::Mood => "mood",
            TrackField::Language => "language",
        }
    }

    /// Raw value of this field on a track
    pub fn value_of<'a>(&self, track: &'a Track) -> &'a str {
        match self {
            TrackField::Artist => &track.artist,
            TrackField::Title => &track.title,
            TrackField::Album => &track.album,
            TrackField::Label => &track.label,
            TrackField::Genre => &track.genre,
            TrackField::Mood => &track.mood,
            TrackField::Language => &track.language,
        }
    }

    /// Comparison key for this field's value on a track
    ///
    /// Artists compare punctuation-insensitively; everything else compares
    /// case-insensitively. Empty values have no key.
    pub fn key_of(&self, track: &Track) -> Option<String> {
        self.key_for(self.value_of(track))
    }

    /// Comparison key for an arbitrary value of this field
    pub fn key_for(&self, value: &str) -> Option<String> {
        let key = match self {
            TrackField::Artist => normalize_match_text(value),
            _ => value.trim().to_lowercase(),
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

/// Inclusive year bounds; `None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl YearRange {
    /// A missing or unparseable year compares as 0: it passes a max-only
    /// bound and fails any lower bound
    pub fn contains(&self, year: Option<i32>) -> bool {
        let year = year.unwrap_or(0);
        self.min.map_or(true, |min| year >= min) && self.max.map_or(true, |max| year <= max)
    }
}

/// Map an era label to its year range
///
/// Returns `None` for unrecognized labels.
pub fn era_range(label: &str, current_year: i32) -> Option<YearRange> {
    let range = |min: Option<i32>, max: Option<i32>| Some(YearRange { min, max });
    match label.trim().to_ascii_lowercase().as_str() {
        "80s" => range(Some(1980), Some(1989)),
        "90s" => range(Some(1990), Some(1999)),
        "2000s" => range(Some(2000), Some(2009)),
        "2010s" => range(Some(2010), Some(2019)),
        "2020s" => range(Some(2020), Some(2029)),
        "current" => range(Some(current_year - 2), Some(current_year)),
        "classic" => range(None, Some(1979)),
        _ => None,
    }
}

/// Inclusive numeric bounds; `None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Track filters derived from the rule document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub text_search: Option<String>,
    pub genre: Option<String>,
    pub artist: Option<String>,
    pub mood: Option<String>,
    pub language: Option<String>,
    pub bpm: Option<NumericRange>,
    pub year: Option<YearRange>,
    pub era: Option<YearRange>,
    pub exclude_explicit: bool,
    pub source_playlists: Vec<String>,
    pub include_public_archive: bool,
}

impl FilterSet {
    /// True when year/era/explicit filtering must run over fetched tracks
    pub fn needs_post_fetch(&self) -> bool {
        self.year.is_some() || self.era.is_some() || self.exclude_explicit
    }

    /// Apply the post-fetch filters to a single track
    pub fn accepts(&self, track: &Track) -> bool {
        if self.exclude_explicit && track.explicit {
            return false;
        }
        let year = track.year();
        if let Some(range) = &self.year {
            if !range.contains(year) {
                return false;
            }
        }
        if let Some(range) = &self.era {
            if !range.contains(year) {
                return false;
            }
        }
        true
    }
}

/// Where interstitials come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InterstitialSource {
    /// Every item of one playlist
    Playlist(String),
    /// Items of one genre
    Genre(String),
    /// Free-text match across artist, title and label
    Query(String),
}

/// Interstitial (ad) break settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterstitialSettings {
    pub enabled: bool,
    pub source: Option<InterstitialSource>,
    /// Break after every N-th music placement (≥ 1)
    pub every_n: usize,
    /// Interstitials per break (≥ 1)
    pub per_break: usize,
}

impl Default for InterstitialSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source: None,
            every_n: DEFAULT_ADS_EVERY_N,
            per_break: DEFAULT_ADS_PER_BREAK,
        }
    }
}

/// Share cap (and floor, reported only) for one field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRule {
    pub field: TrackField,
    pub value: String,
    pub min_pct: Option<f64>,
    pub max_pct: Option<f64>,
}

impl QuotaRule {
    /// True when the track carries this rule's field value
    pub fn matches(&self, track: &Track) -> bool {
        match (self.field.key_of(track), self.field.key_for(&self.value)) {
            (Some(track_key), Some(rule_key)) => track_key == rule_key,
            _ => false,
        }
    }
}

/// Reference to another smart block used when the primary pool runs dry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRef {
    pub block_id: String,
    /// Maximum tracks taken from this fallback (0 = uncapped)
    pub limit: usize,
}

/// Fully-defaulted, typed configuration consumed by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub target_ms: i64,
    pub accuracy_ms: i64,
    pub filters: FilterSet,
    pub interstitials: InterstitialSettings,
    pub separation_enabled: bool,
    /// Minimum gap per field in elapsed block milliseconds
    pub separation: BTreeMap<TrackField, i64>,
    pub quotas: Vec<QuotaRule>,
    pub energy_enabled: bool,
    /// Target energy (0-100) at successive fractions of the block
    pub energy_curve: Vec<u8>,
    pub fallbacks: Vec<FallbackRef>,
    /// Allow the pool to be cycled more than once
    pub loop_pool: bool,
    /// Informational sequencing mode label
    pub mode: Option<String>,
}

impl PreviewConfig {
    /// Lowest total that counts as filled
    pub fn lower_bound_ms(&self) -> i64 {
        self.target_ms.saturating_sub(self.accuracy_ms)
    }

    /// Highest total the fit constraint allows
    pub fn upper_bound_ms(&self) -> i64 {
        self.target_ms.saturating_add(self.accuracy_ms)
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        normalize_at(&RuleDocument::new(), &SequenceDocument::new(), 1970)
    }
}

/// Normalize documents using the current calendar year for era labels
pub fn normalize(rules: &RuleDocument, sequence: &SequenceDocument) -> PreviewConfig {
    normalize_at(rules, sequence, grimnir_common::time::now().year())
}

/// Normalize documents with an explicit "current" year
pub fn normalize_at(
    rules: &RuleDocument,
    sequence: &SequenceDocument,
    current_year: i32,
) -> PreviewConfig {
    let target_minutes = rules
        .int_field("targetMinutes")
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_TARGET_MINUTES)
        .min(MAX_TARGET_MINUTES);

    let accuracy_seconds = rules
        .int_field("durationAccuracy")
        .unwrap_or(DEFAULT_ACCURACY_SECONDS)
        .clamp(ACCURACY_SECONDS_RANGE.0, ACCURACY_SECONDS_RANGE.1);

    let (energy_enabled, energy_curve) = normalize_energy(sequence);

    let config = PreviewConfig {
        target_ms: minutes_to_ms(target_minutes),
        accuracy_ms: seconds_to_ms(accuracy_seconds),
        filters: normalize_filters(rules, current_year),
        interstitials: normalize_interstitials(rules),
        separation_enabled: rules.bool_field("separationEnabled"),
        separation: normalize_separation(rules),
        quotas: normalize_quotas(rules),
        energy_enabled,
        energy_curve,
        fallbacks: normalize_fallbacks(rules),
        loop_pool: rules.bool_field("allowRepeats"),
        mode: sequence.string_field("mode"),
    };

    debug!(
        target_ms = config.target_ms,
        accuracy_ms = config.accuracy_ms,
        separation_fields = config.separation.len(),
        quotas = config.quotas.len(),
        fallbacks = config.fallbacks.len(),
        interstitials = config.interstitials.enabled,
        energy = config.energy_enabled,
        "Normalized smart block configuration"
    );

    config
}

fn normalize_filters(rules: &RuleDocument, current_year: i32) -> FilterSet {
    let bpm = rules.first_of(&["bpmRange"]).and_then(|v| {
        let (min, max) = value_as_range(v);
        if min.is_none() && max.is_none() {
            None
        } else {
            Some(NumericRange { min, max })
        }
    });

    let year = rules.first_of(&["yearRange"]).and_then(|v| {
        let (min, max) = value_as_range(v);
        if min.is_none() && max.is_none() {
            None
        } else {
            Some(YearRange {
                min: min.map(|y| y as i32),
                max: max.map(|y| y as i32),
            })
        }
    });

    let era = rules.string_field("era").and_then(|label| {
        let range = era_range(&label, current_year);
        if range.is_none() {
            debug!(era = %label, "Unrecognized era label, era filter skipped");
        }
        range
    });

    FilterSet {
        text_search: rules.string_field("text_search"),
        genre: rules.string_field("genre"),
        artist: rules.string_field("artist"),
        mood: rules.string_field("mood"),
        language: rules.string_field("language"),
        bpm,
        year,
        era,
        exclude_explicit: rules.bool_field("excludeExplicit"),
        source_playlists: rules
            .first_of(&["sourcePlaylists", "source_playlists"])
            .map(value_as_string_list)
            .unwrap_or_default(),
        include_public_archive: rules
            .first_of(&["includePublicArchive", "include_archive"])
            .map(value_as_bool)
            .unwrap_or(false),
    }
}

fn normalize_separation(rules: &RuleDocument) -> BTreeMap<TrackField, i64> {
    let mut gaps = BTreeMap::new();
    if !rules.bool_field("separationEnabled") {
        return gaps;
    }
    let Some(separation) = rules.object_field("separation") else {
        return gaps;
    };

    for field in SEPARATION_FIELDS {
        let minutes = separation
            .get(field.as_str())
            .and_then(value_as_f64)
            .unwrap_or(0.0);
        if minutes > 0.0 {
            gaps.insert(field, (minutes * MS_PER_MINUTE as f64) as i64);
        }
    }
    gaps
}

fn normalize_quotas(rules: &RuleDocument) -> Vec<QuotaRule> {
    if !rules.bool_field("quotasEnabled") {
        return Vec::new();
    }

    rules
        .array_field("quotas")
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|quota| {
            let field_name = quota.get("field").and_then(value_as_string)?;
            let Some(field) = TrackField::parse(&field_name) else {
                warn!(field = %field_name, "Ignoring quota on unsupported field");
                return None;
            };
            let value = quota.get("value").and_then(value_as_string)?;
            Some(QuotaRule {
                field,
                value,
                min_pct: pct(quota, &["minPct", "min_pct"]),
                max_pct: pct(quota, &["maxPct", "max_pct"]),
            })
        })
        .collect()
}

fn pct(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(value_as_f64))
        .filter(|v| *v > 0.0)
}

fn normalize_fallbacks(rules: &RuleDocument) -> Vec<FallbackRef> {
    if !rules.bool_field("fallbacksEnabled") {
        return Vec::new();
    }

    rules
        .array_field("fallbacks")
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|fallback| {
            let block_id = ["blockID", "blockId", "smart_block_id"]
                .iter()
                .find_map(|key| fallback.get(*key).and_then(value_as_string))?;
            let limit = fallback
                .get("limit")
                .and_then(value_as_i64)
                .filter(|l| *l > 0)
                .unwrap_or(0) as usize;
            Some(FallbackRef { block_id, limit })
        })
        .collect()
}

fn normalize_interstitials(rules: &RuleDocument) -> InterstitialSettings {
    let mut settings = InterstitialSettings::default();
    let Some(doc) = rules.object_field("interstitials") else {
        return settings;
    };
    if !doc.get("enabled").map(value_as_bool).unwrap_or(false) {
        return settings;
    }

    let read = |keys: &[&str]| keys.iter().find_map(|key| doc.get(*key).and_then(value_as_string));
    let playlist = || read(&["playlistID", "playlistId", "playlist_id"]).map(InterstitialSource::Playlist);
    let genre = || read(&["genre"]).map(InterstitialSource::Genre);
    let query = || read(&["query"]).map(InterstitialSource::Query);

    let source_type = read(&["sourceType", "source_type"]).map(|s| s.to_ascii_lowercase());
    let source = match source_type.as_deref() {
        Some("playlist") => playlist(),
        Some("genre") => genre(),
        Some("query") | Some("search") | Some("text") => query(),
        Some(other) => {
            warn!(source_type = %other, "Unknown interstitial source type");
            None
        }
        None => playlist().or_else(genre).or_else(query),
    };

    if source.is_none() {
        warn!("Interstitials enabled without a usable source, breaks disabled");
        return settings;
    }

    settings.enabled = true;
    settings.source = source;
    if let Some(every) = doc.get("every").and_then(value_as_i64) {
        settings.every_n = every.max(1) as usize;
    }
    if let Some(per_break) = doc.get("perBreak").and_then(value_as_i64) {
        settings.per_break = per_break.max(1) as usize;
    }
    settings
}

fn normalize_energy(sequence: &SequenceDocument) -> (bool, Vec<u8>) {
    if !sequence.bool_field("energyEnabled") {
        return (false, Vec::new());
    }
    let curve: Vec<u8> = sequence
        .array_field("energyCurve")
        .iter()
        .filter_map(value_as_f64)
        .map(|v| v.clamp(0.0, 100.0).round() as u8)
        .collect();
    if curve.is_empty() {
        debug!("Energy curve enabled but empty, energy scoring disabled");
        return (false, curve);
    }
    (true, curve)
}
