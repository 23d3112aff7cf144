//! Smart block form parsing
//!
//! Dashboard submissions arrive as flat name/value pairs. Whole `rules` and
//! `sequence` JSON documents may be posted as-is; individual fields are then
//! overlaid on top of them. This is the validation boundary: the engine
//! itself never rejects a document.

use crate::catalog::SmartBlockDefinition;
use crate::error::{Result, SmartBlockError};
use crate::normalize::{MAX_TARGET_MINUTES, SEPARATION_FIELDS};
use crate::rules::{value_as_bool, DocumentFields, RuleDocument, SequenceDocument};
use serde_json::{json, Map, Value};

/// Accepted `targetMinutes` range (one day)
pub const TARGET_MINUTES_RANGE: (i64, i64) = (1, MAX_TARGET_MINUTES);

/// Validated block submission
#[derive(Debug, Clone, PartialEq)]
pub struct BlockForm {
    pub name: String,
    pub description: String,
    pub rules: RuleDocument,
    pub sequence: SequenceDocument,
}

impl BlockForm {
    pub fn into_definition(self, id: impl Into<String>) -> SmartBlockDefinition {
        SmartBlockDefinition {
            id: id.into(),
            name: self.name,
            description: self.description,
            rules: self.rules,
            sequence: self.sequence,
        }
    }
}

struct Fields<'a>(&'a [(String, String)]);

impl<'a> Fields<'a> {
    /// Last non-blank value submitted under `name`
    fn get(&self, name: &str) -> Option<&'a str> {
        self.0
            .iter()
            .rev()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty())
    }

    /// Every non-blank value submitted under `name` (repeated inputs)
    fn all(&self, name: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(key, _)| key == name || key.strip_suffix("[]") == Some(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(key, _)| key == name)
    }

    /// Checkbox semantics: present and truthy
    fn flag(&self, name: &str) -> Option<bool> {
        if !self.has(name) {
            return None;
        }
        Some(
            self.get(name)
                .map(|v| value_as_bool(&Value::String(v.to_string())))
                .unwrap_or(false),
        )
    }

    fn int(&self, name: &str) -> Result<Option<i64>> {
        self.get(name)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| SmartBlockError::form(name, format!("'{}' is not a whole number", v)))
            })
            .transpose()
    }

    fn number(&self, name: &str) -> Result<Option<f64>> {
        self.get(name)
            .map(|v| match v.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(SmartBlockError::form(name, format!("'{}' is not a number", v))),
            })
            .transpose()
    }
}

/// Parse and validate a submitted smart block form
pub fn parse_block_form(fields: &[(String, String)]) -> Result<BlockForm> {
    let fields = Fields(fields);

    let name = fields
        .get("name")
        .ok_or_else(|| SmartBlockError::form("name", "required"))?
        .to_string();
    let description = fields.get("description").unwrap_or_default().to_string();

    let mut rules = match fields.get("rules") {
        Some(raw) => RuleDocument::from_json(raw).map_err(SmartBlockError::InvalidRules)?,
        None => RuleDocument::new(),
    };
    let mut sequence = match fields.get("sequence") {
        Some(raw) => SequenceDocument::from_json(raw).map_err(SmartBlockError::InvalidRules)?,
        None => SequenceDocument::new(),
    };

    overlay_filters(&fields, &mut rules)?;
    overlay_separation(&fields, &mut rules)?;
    overlay_interstitials(&fields, &mut rules)?;
    overlay_sequence(&fields, &mut sequence)?;

    Ok(BlockForm {
        name,
        description,
        rules,
        sequence,
    })
}

fn overlay_filters(fields: &Fields<'_>, rules: &mut RuleDocument) -> Result<()> {
    for key in ["genre", "artist", "mood", "language", "text_search", "era"] {
        if let Some(value) = fields.get(key) {
            rules.set(key, value);
        }
    }

    if let Some(minutes) = fields.int("targetMinutes")? {
        let (min, max) = TARGET_MINUTES_RANGE;
        if !(min..=max).contains(&minutes) {
            return Err(SmartBlockError::form(
                "targetMinutes",
                format!("must be between {} and {}", min, max),
            ));
        }
        rules.set("targetMinutes", minutes);
    }

    if let Some(seconds) = fields.int("durationAccuracy")? {
        rules.set("durationAccuracy", seconds);
    }

    let bpm = (fields.number("bpmMin")?, fields.number("bpmMax")?);
    if bpm.0.is_some() || bpm.1.is_some() {
        rules.set("bpmRange", range_value(bpm.0, bpm.1));
    }

    let years = (fields.int("yearMin")?, fields.int("yearMax")?);
    if years.0.is_some() || years.1.is_some() {
        rules.set("yearRange", range_value(years.0, years.1));
    }

    let playlists = fields.all("sourcePlaylists");
    if !playlists.is_empty() {
        rules.remove("source_playlists");
        rules.set("sourcePlaylists", playlists);
    }

    for key in [
        "excludeExplicit",
        "includePublicArchive",
        "allowRepeats",
        "quotasEnabled",
        "fallbacksEnabled",
        "boostersEnabled",
    ] {
        if let Some(flag) = fields.flag(key) {
            rules.set(key, flag);
        }
    }
    Ok(())
}

fn range_value<T: Into<Value>>(min: Option<T>, max: Option<T>) -> Value {
    let mut range = Map::new();
    if let Some(min) = min {
        range.insert("min".to_string(), min.into());
    }
    if let Some(max) = max {
        range.insert("max".to_string(), max.into());
    }
    Value::Object(range)
}

fn overlay_separation(fields: &Fields<'_>, rules: &mut RuleDocument) -> Result<()> {
    if let Some(flag) = fields.flag("separationEnabled") {
        rules.set("separationEnabled", flag);
    }

    let mut separation = rules.object_field("separation").cloned().unwrap_or_default();
    let mut touched = false;
    for field in SEPARATION_FIELDS {
        let key = format!("separation_{}", field.as_str());
        if let Some(minutes) = fields.number(&key)? {
            if minutes < 0.0 {
                return Err(SmartBlockError::form(&key, "must not be negative"));
            }
            separation.insert(field.as_str().to_string(), json!(minutes));
            touched = true;
        }
    }
    if touched {
        rules.set("separation", Value::Object(separation));
    }
    Ok(())
}

fn overlay_interstitials(fields: &Fields<'_>, rules: &mut RuleDocument) -> Result<()> {
    let mut ads = rules.object_field("interstitials").cloned().unwrap_or_default();
    let mut touched = false;

    if let Some(flag) = fields.flag("ads_enabled") {
        ads.insert("enabled".to_string(), json!(flag));
        touched = true;
    }

    for (form_key, doc_key) in [
        ("ads_source_type", "sourceType"),
        ("ads_playlist", "playlistID"),
        ("ads_genre", "genre"),
        ("ads_query", "query"),
    ] {
        if let Some(value) = fields.get(form_key) {
            ads.insert(doc_key.to_string(), json!(value));
            touched = true;
        }
    }

    for (form_key, doc_key) in [("ads_every", "every"), ("ads_per_break", "perBreak")] {
        if let Some(n) = fields.int(form_key)? {
            if n < 1 {
                return Err(SmartBlockError::form(form_key, "must be at least 1"));
            }
            ads.insert(doc_key.to_string(), json!(n));
            touched = true;
        }
    }

    if touched {
        rules.set("interstitials", Value::Object(ads));
    }
    Ok(())
}

fn overlay_sequence(fields: &Fields<'_>, sequence: &mut SequenceDocument) -> Result<()> {
    if let Some(mode) = fields.get("mode") {
        sequence.set("mode", mode);
    }
    if let Some(flag) = fields.flag("energyEnabled") {
        sequence.set("energyEnabled", flag);
    }

    if let Some(raw) = fields.get("energyCurve") {
        let curve = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<i64>() {
                Ok(v) if (0..=100).contains(&v) => Ok(v),
                _ => Err(SmartBlockError::form(
                    "energyCurve",
                    format!("'{}' is not a value between 0 and 100", s),
                )),
            })
            .collect::<Result<Vec<i64>>>()?;
        sequence.set("energyCurve", curve);
    }
    Ok(())
}
