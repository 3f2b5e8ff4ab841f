//! Pulling generated tracks out of a details payload.
//!
//! The details endpoint forwards whatever the upstream service returned, so the
//! track list can sit at several depths. Each candidate location is a
//! [`TrackLocation`]; they are probed in [`PRIORITY`] order and the first one
//! holding a non-empty list is used exclusively.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A generated result, normalised from the payload's loose field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub audio_url: Option<String>,
    pub title: String,
    pub duration_seconds: f64,
    pub tags: String,
    pub model_name: String,
}

impl Track {
    /// `number` is the 1-based position, used for the fallback title.
    pub fn from_value(value: &Value, number: usize) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            audio_url: text(&["audioUrl", "audio_url"]),
            title: text(&["title"]).unwrap_or_else(|| format!("Track {number}")),
            duration_seconds: obj
                .get("duration")
                .and_then(Value::as_f64)
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0),
            tags: text(&["tags"]).unwrap_or_default(),
            model_name: text(&["modelName", "model_name"]).unwrap_or_else(|| "Unknown".into()),
        })
    }
}

/// Places a track list has been observed in a details payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLocation {
    /// `data.response.sunoData`
    DataResponse,
    /// `response.sunoData`
    Response,
    /// `data.sunoData`
    Data,
    /// `sunoData`
    Root,
    /// `data` itself is the list
    DataArray,
    /// the payload itself is the list
    BareArray,
}

pub const PRIORITY: [TrackLocation; 6] = [
    TrackLocation::DataResponse,
    TrackLocation::Response,
    TrackLocation::Data,
    TrackLocation::Root,
    TrackLocation::DataArray,
    TrackLocation::BareArray,
];

const TRACK_LIST_KEY: &str = "sunoData";

impl TrackLocation {
    /// The list at this location, if there is one.
    pub fn probe(self, payload: &Value) -> Option<&Vec<Value>> {
        let node = match self {
            TrackLocation::DataResponse => payload.get("data")?.get("response")?.get(TRACK_LIST_KEY)?,
            TrackLocation::Response => payload.get("response")?.get(TRACK_LIST_KEY)?,
            TrackLocation::Data => payload.get("data")?.get(TRACK_LIST_KEY)?,
            TrackLocation::Root => payload.get(TRACK_LIST_KEY)?,
            TrackLocation::DataArray => payload.get("data")?,
            TrackLocation::BareArray => payload,
        };
        node.as_array()
    }
}

/// First populated location in priority order, with the list found there.
pub fn locate(payload: &Value) -> Option<(TrackLocation, &Vec<Value>)> {
    PRIORITY.iter().find_map(|loc| {
        loc.probe(payload)
            .filter(|list| !list.is_empty())
            .map(|list| (*loc, list))
    })
}

/// Parse every track out of a details payload. Empty when nothing usable.
pub fn extract_tracks(payload: &Value) -> Vec<Track> {
    let Some((location, list)) = locate(payload) else {
        return Vec::new();
    };
    log::debug!("Found {} track entries at {location:?}", list.len());

    list.iter()
        .enumerate()
        .filter_map(|(i, v)| Track::from_value(v, i + 1))
        .collect()
}
