//! Raw telemetry log ingestion.
//!
//! The recorder writes a JSON array of `{timestamp, type, data}` entries:
//!
//! - `REQ`: telemetry of our own plane, one object in `data`
//! - `RESP`: server reply listing every plane's last known position under
//!   `data.konumBilgileri`
//!
//! Both are folded into one track per team number, sorted by timestamp. The
//! resulting [`TrackCatalog`] is what `/api/ids` and `/api/data/{id}` serve.

use std::collections::BTreeMap;
use std::io::Read;

use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::{Sample, TrackId};

#[derive(Debug, Deserialize)]
struct RawEntry {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Option<Value>,
}

/// Telemetry fields as named on the wire.
#[derive(Debug, Deserialize)]
struct PlaneReport {
    takim_numarasi: Option<TrackId>,
    iha_enlem: Option<f64>,
    iha_boylam: Option<f64>,
    iha_irtifa: Option<f64>,
    iha_yonelme: Option<f64>,
    iha_yatis: Option<f64>,
    iha_dikilme: Option<f64>,
    /// Speed in own-plane reports
    iha_hiz: Option<f64>,
    /// Speed in position lists
    iha_hizi: Option<f64>,
    iha_batarya: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PositionList {
    #[serde(rename = "konumBilgileri")]
    positions: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ReportKind {
    Own,
    Other,
}

impl PlaneReport {
    fn into_sample(self, timestamp: &str, kind: ReportKind) -> Option<(TrackId, Sample)> {
        let id = self.takim_numarasi?;
        let (lat, lon) = match (self.iha_enlem, self.iha_boylam) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
            _ => {
                debug!("[Ingest] plane {} at {} has no position, skipped", id, timestamp);
                return None;
            }
        };
        let (speed, battery) = match kind {
            ReportKind::Own => (self.iha_hiz, self.iha_batarya.map(|b| b.round() as i64)),
            ReportKind::Other => (self.iha_hizi, None),
        };

        Some((
            id,
            Sample {
                timestamp: timestamp.to_string(),
                lat,
                lon,
                alt: self.iha_irtifa,
                heading: self.iha_yonelme,
                speed,
                battery,
                pitch: self.iha_dikilme,
                roll: self.iha_yatis,
            },
        ))
    }
}

fn parse_report(value: Value, timestamp: &str, kind: ReportKind) -> Option<(TrackId, Sample)> {
    match serde_json::from_value::<PlaneReport>(value) {
        Ok(report) => report.into_sample(timestamp, kind),
        Err(e) => {
            debug!("[Ingest] malformed report at {}: {}", timestamp, e);
            None
        }
    }
}

/// All plane tracks found in a log, keyed and sorted by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCatalog {
    tracks: BTreeMap<TrackId, Vec<Sample>>,
}

impl TrackCatalog {
    /// Build from log JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    /// Build from a reader yielding log JSON.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_reader(reader)?;
        Ok(Self::from_entries(entries))
    }

    /// Build from already-decoded log entries. Unusable entries are skipped.
    pub fn from_entries(entries: Vec<Value>) -> Self {
        info!("[Ingest] processing {} entries", entries.len());
        let mut tracks: BTreeMap<TrackId, Vec<Sample>> = BTreeMap::new();

        for entry in entries {
            let Ok(entry) = serde_json::from_value::<RawEntry>(entry) else {
                continue;
            };
            let (Some(timestamp), Some(data)) = (entry.timestamp, entry.data) else {
                continue;
            };
            if timestamp.is_empty() || !data.is_object() {
                continue;
            }

            let reports: Vec<(TrackId, Sample)> = match entry.kind.as_deref() {
                Some("REQ") => parse_report(data, &timestamp, ReportKind::Own)
                    .into_iter()
                    .collect(),
                Some("RESP") => match serde_json::from_value::<PositionList>(data) {
                    Ok(PositionList {
                        positions: Some(list),
                    }) => list
                        .into_iter()
                        .filter_map(|v| parse_report(v, &timestamp, ReportKind::Other))
                        .collect(),
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };

            for (id, sample) in reports {
                tracks.entry(id).or_default().push(sample);
            }
        }

        for samples in tracks.values_mut() {
            samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }

        info!("[Ingest] found {} unique ids", tracks.len());
        Self { tracks }
    }

    /// Track ids in ascending order.
    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.keys().cloned().collect()
    }

    pub fn track(&self, id: &TrackId) -> Option<&[Sample]> {
        self.tracks.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    /// Body of `GET /api/ids`.
    pub fn ids_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.ids())?)
    }

    /// Body of `GET /api/data/{id}`, `None` for an unknown id.
    pub fn track_json(&self, id: &TrackId) -> Result<Option<String>> {
        self.track(id)
            .map(|samples| serde_json::to_string(samples))
            .transpose()
            .map_err(Into::into)
    }
}
