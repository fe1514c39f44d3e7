//! Feature provider adapter for AcousticBrainz-style JSON exports.
//!
//! A track is described by a low-level file (rhythm, tonal and spectral
//! descriptors) and an optional high-level file (classifier outputs). When the
//! high-level file is missing, the mood and genre groups stay absent.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use super::{
    CepstralModel, EnergyBands, FeatureRecord, Genre, GenreDistribution, KeyEstimate, MoodAxis,
    MoodProbabilities, Scale,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Number of cepstral coefficients kept from the export (c0..c12).
const MAX_MFCC_COEFFS: usize = 13;

/// Load one track from a low-level file and an optional high-level file.
pub fn load_track(lowlevel_path: &Path, highlevel_path: Option<&Path>) -> Result<FeatureRecord> {
    let lowlevel: Value = serde_json::from_str(&std::fs::read_to_string(lowlevel_path)?)?;
    let highlevel: Option<Value> = match highlevel_path {
        Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => None,
    };

    let mut record = record_from_json(&lowlevel, highlevel.as_ref())?;
    if record.id.is_empty() {
        record.id = lowlevel_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
    }

    log::debug!(
        "Loaded {} (bpm={:?}, key={:?}, mood={}, genre={})",
        record.label(),
        record.bpm,
        record.key.map(|k| k.to_string()),
        record.mood.is_some(),
        record.genre.is_some()
    );
    Ok(record)
}

/// Parse already-read JSON text.
pub fn record_from_str(lowlevel: &str, highlevel: Option<&str>) -> Result<FeatureRecord> {
    let low: Value = serde_json::from_str(lowlevel)?;
    let high: Option<Value> = highlevel.map(|s| serde_json::from_str(s)).transpose()?;
    record_from_json(&low, high.as_ref())
}

/// Build a record from parsed low-level and high-level documents.
///
/// The identifier is empty when neither document carries a recording id.
pub fn record_from_json(lowlevel: &Value, highlevel: Option<&Value>) -> Result<FeatureRecord> {
    if !lowlevel.is_object() {
        return Err(LoadError::InvalidField {
            field: "lowlevel",
            reason: "expected a JSON object".to_string(),
        });
    }
    if let Some(high) = highlevel {
        if !high.is_object() {
            return Err(LoadError::InvalidField {
                field: "highlevel",
                reason: "expected a JSON object".to_string(),
            });
        }
    }

    // Metadata: prefer high-level tags, fall back to low-level
    let tag = |name: &str| highlevel.and_then(|h| first_tag(h, name)).or_else(|| first_tag(lowlevel, name));

    Ok(FeatureRecord {
        id: tag("musicbrainz_recordingid").unwrap_or_default(),
        title: tag("title"),
        artist: tag("artist"),
        bpm: number(lowlevel, "/rhythm/bpm").filter(|b| b.is_finite() && *b > 0.0),
        key: key_estimate(lowlevel),
        energy: energy_bands(lowlevel),
        loudness: number(lowlevel, "/lowlevel/average_loudness"),
        dynamic_complexity: number(lowlevel, "/lowlevel/dynamic_complexity"),
        timbre: cepstral_model(lowlevel),
        mood: highlevel.and_then(mood_probabilities),
        genre: highlevel.and_then(genre_distribution),
    })
}

/// Scalar at `pointer`, or the `mean` of a statistics object at that path.
fn number(root: &Value, pointer: &str) -> Option<f64> {
    match root.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::Object(stats) => stats.get("mean").and_then(Value::as_f64),
        _ => None,
    }
}

/// First value of a metadata tag (tags are usually single-element arrays).
fn first_tag(root: &Value, name: &str) -> Option<String> {
    let value = root.get("metadata")?.get("tags")?.get(name)?;
    let s = match value {
        Value::Array(items) => items.first()?.as_str()?,
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn key_estimate(lowlevel: &Value) -> Option<KeyEstimate> {
    let name = lowlevel.pointer("/tonal/key_key")?.as_str()?;
    let scale = lowlevel
        .pointer("/tonal/key_scale")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Scale>().ok())
        .unwrap_or(Scale::Major);
    let strength = number(lowlevel, "/tonal/key_strength").unwrap_or(0.0);
    let key = KeyEstimate::from_name(name, scale, strength);
    if key.is_none() {
        log::debug!("Unrecognized key name {name:?}, treating key as absent");
    }
    key
}

fn energy_bands(lowlevel: &Value) -> Option<EnergyBands> {
    let low = number(lowlevel, "/lowlevel/spectral_energyband_low");
    let mid_low = number(lowlevel, "/lowlevel/spectral_energyband_middle_low");
    let mid_high = number(lowlevel, "/lowlevel/spectral_energyband_middle_high");
    let high = number(lowlevel, "/lowlevel/spectral_energyband_high");

    if low.is_none() && mid_low.is_none() && mid_high.is_none() && high.is_none() {
        return None;
    }
    Some(EnergyBands {
        low: low.unwrap_or(0.0),
        mid_low: mid_low.unwrap_or(0.0),
        mid_high: mid_high.unwrap_or(0.0),
        high: high.unwrap_or(0.0),
    })
}

fn float_array(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn cepstral_model(lowlevel: &Value) -> Option<CepstralModel> {
    let mfcc = lowlevel.pointer("/lowlevel/mfcc")?;
    let mut mean = float_array(mfcc.get("mean")?)?;
    mean.truncate(MAX_MFCC_COEFFS);
    if mean.is_empty() {
        return None;
    }

    let covariance = mfcc.get("cov").and_then(|cov| {
        let rows: Option<Vec<Vec<f64>>> = cov.as_array()?.iter().map(float_array).collect();
        let mut rows = rows?;
        // Covariance must cover every kept coefficient
        if rows.len() < mean.len() || rows.iter().any(|r| r.len() < mean.len()) {
            log::debug!("MFCC covariance shape doesn't match mean, dropping it");
            return None;
        }
        rows.truncate(mean.len());
        for row in &mut rows {
            row.truncate(mean.len());
        }
        Some(rows)
    });

    Some(CepstralModel { mean, covariance })
}

/// Probability of the positive class for one binary classifier.
///
/// Prefers the full `all` distribution; otherwise converts `{value, probability}`
/// (where `value` may be the negative label such as `not_happy`).
fn positive_probability(classifier: &Value, positive: &str) -> Option<f64> {
    if let Some(p) = classifier.get("all").and_then(|all| all.get(positive)).and_then(Value::as_f64) {
        return Some(p);
    }
    let value = classifier.get("value")?.as_str()?;
    let p = classifier.get("probability")?.as_f64()?;
    Some(if value == positive { p } else { 1.0 - p })
}

fn mood_probabilities(highlevel: &Value) -> Option<MoodProbabilities> {
    let classifiers = highlevel.get("highlevel")?;
    let mut moods = MoodProbabilities::default();
    let mut found = false;

    for axis in MoodAxis::ALL {
        let key = format!("mood_{}", axis.name());
        if let Some(p) = classifiers.get(&key).and_then(|c| positive_probability(c, axis.name())) {
            moods.set(axis, p);
            found = true;
        }
    }

    if found { Some(moods) } else { None }
}

fn genre_distribution(highlevel: &Value) -> Option<GenreDistribution> {
    let classifier = highlevel.pointer("/highlevel/genre_rosamerica")?;

    let pairs: Vec<(Genre, f64)> = match classifier.get("all").and_then(Value::as_object) {
        Some(all) => all
            .iter()
            .filter_map(|(code, p)| Some((Genre::from_code(code)?, p.as_f64()?)))
            .collect(),
        None => {
            // Only the winning label is known
            let genre = Genre::from_code(classifier.get("value")?.as_str()?)?;
            let p = classifier.get("probability")?.as_f64()?;
            vec![(genre, p)]
        }
    };

    if pairs.is_empty() {
        return None;
    }
    Some(GenreDistribution::from_pairs(&pairs))
}

/// Guess the high-level file that sits next to a low-level file
/// (`x.lowlevel.json` → `x.highlevel.json`, `x_low.json` → `x_high.json`, ...).
pub fn highlevel_sibling(lowlevel_path: &Path) -> Option<PathBuf> {
    let name = lowlevel_path.file_name()?.to_str()?;
    [("lowlevel", "highlevel"), ("low_level", "high_level"), ("low", "high")]
        .iter()
        .filter(|(low, _)| name.contains(low))
        .map(|(low, high)| lowlevel_path.with_file_name(name.replacen(low, high, 1)))
        .find(|candidate| candidate.exists())
}

/// Recursively find low-level feature files under `dir`, paired with their
/// high-level sibling when one exists. Sorted by path for stable output.
pub fn find_feature_files(dir: &Path) -> Vec<(PathBuf, Option<PathBuf>)> {
    let mut found: Vec<(PathBuf, Option<PathBuf>)> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_lowercase();
            let is_low = name.ends_with(".json") && name.contains("low");
            is_low.then(|| e.into_path())
        })
        .map(|path| {
            let high = highlevel_sibling(&path);
            (path, high)
        })
        .collect();

    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOWLEVEL: &str = r#"{
        "metadata": {"tags": {
            "musicbrainz_recordingid": ["abc-123"],
            "title": ["Girls Just Want to Have Fun"],
            "artist": ["Cyndi Lauper"]
        }},
        "rhythm": {"bpm": 120.4, "onset_rate": 4.1},
        "tonal": {"key_key": "F#", "key_scale": "minor", "key_strength": 0.72},
        "lowlevel": {
            "average_loudness": 0.81,
            "dynamic_complexity": 3.2,
            "spectral_energyband_low": {"mean": 0.01},
            "spectral_energyband_middle_low": {"mean": 0.008},
            "spectral_energyband_middle_high": {"mean": 0.002},
            "spectral_energyband_high": {"mean": 0.0005},
            "mfcc": {
                "mean": [-700.0, 120.0, -10.0],
                "cov": [[10.0, 0.0, 0.0], [0.0, 4.0, 0.5], [0.0, 0.5, 2.0]]
            }
        }
    }"#;

    const HIGHLEVEL: &str = r#"{
        "metadata": {"tags": {"musicbrainz_recordingid": ["abc-123"]}},
        "highlevel": {
            "mood_happy": {"value": "happy", "probability": 0.8},
            "mood_sad": {"value": "not_sad", "probability": 0.9},
            "mood_party": {"value": "party", "probability": 0.6,
                           "all": {"party": 0.65, "not_party": 0.35}},
            "genre_rosamerica": {
                "value": "pop", "probability": 0.7,
                "all": {"cla": 0.05, "dan": 0.1, "hip": 0.0, "jaz": 0.05,
                        "pop": 0.7, "rhy": 0.05, "roc": 0.05, "spe": 0.0}
            }
        }
    }"#;

    #[test]
    fn test_full_record() {
        let record = record_from_str(LOWLEVEL, Some(HIGHLEVEL)).unwrap();
        assert_eq!(record.id, "abc-123");
        assert_eq!(record.label(), "Cyndi Lauper - Girls Just Want to Have Fun");
        assert_eq!(record.bpm, Some(120.4));

        let key = record.key.unwrap();
        assert_eq!(key.tonic, 6);
        assert_eq!(key.scale, Scale::Minor);
        assert!((key.strength - 0.72).abs() < 1e-12);

        assert_eq!(record.loudness, Some(0.81));
        assert_eq!(record.dynamic_complexity, Some(3.2));
        let energy = record.energy.unwrap();
        assert!((energy.low - 0.01).abs() < 1e-12);
        assert!((energy.high - 0.0005).abs() < 1e-12);

        let timbre = record.timbre.unwrap();
        assert_eq!(timbre.mean.len(), 3);
        assert_eq!(timbre.covariance.unwrap().len(), 3);
    }

    #[test]
    fn test_mood_positive_class_conversion() {
        let record = record_from_str(LOWLEVEL, Some(HIGHLEVEL)).unwrap();
        let mood = record.mood.unwrap();
        assert!((mood.get(MoodAxis::Happy) - 0.8).abs() < 1e-12);
        // "not_sad" at 0.9 means sad at 0.1
        assert!((mood.get(MoodAxis::Sad) - 0.1).abs() < 1e-12);
        // "all" distribution wins over value/probability
        assert!((mood.get(MoodAxis::Party) - 0.65).abs() < 1e-12);
        // Unreported axis stays inactive
        assert_eq!(mood.get(MoodAxis::Acoustic), 0.0);
    }

    #[test]
    fn test_genre_distribution() {
        let record = record_from_str(LOWLEVEL, Some(HIGHLEVEL)).unwrap();
        let genre = record.genre.unwrap();
        assert!((genre.get(Genre::Pop) - 0.7).abs() < 1e-12);
        assert!((genre.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(genre.dominant(), Some(Genre::Pop));
    }

    #[test]
    fn test_lowlevel_only_has_no_mood_or_genre() {
        let record = record_from_str(LOWLEVEL, None).unwrap();
        assert!(record.mood.is_none());
        assert!(record.genre.is_none());
        assert_eq!(record.id, "abc-123");
    }

    #[test]
    fn test_missing_groups_are_absent_not_zero() {
        let record = record_from_str(r#"{"rhythm": {"bpm": 0.0}}"#, Some("{}")).unwrap();
        assert_eq!(record.bpm, None);
        assert!(record.key.is_none());
        assert!(record.energy.is_none());
        assert!(record.loudness.is_none());
        assert!(record.timbre.is_none());
        assert!(record.mood.is_none());
        assert!(record.genre.is_none());
        assert!(record.id.is_empty());
    }

    #[test]
    fn test_mismatched_covariance_dropped() {
        let low = r#"{"lowlevel": {"mfcc": {"mean": [1.0, 2.0, 3.0], "cov": [[1.0, 0.0], [0.0, 1.0]]}}}"#;
        let record = record_from_str(low, None).unwrap();
        let timbre = record.timbre.unwrap();
        assert_eq!(timbre.mean.len(), 3);
        assert!(timbre.covariance.is_none());
    }

    #[test]
    fn test_unknown_key_name_is_absent() {
        let low = r#"{"tonal": {"key_key": "H", "key_scale": "major", "key_strength": 0.9}}"#;
        let record = record_from_str(low, None).unwrap();
        assert!(record.key.is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = record_from_str("[1, 2, 3]", None).unwrap_err();
        assert!(matches!(err, LoadError::InvalidField { field: "lowlevel", .. }));
        assert!(matches!(record_from_str("not json", None), Err(LoadError::Json(_))));
    }
}
