use anyhow::{Context, Error, bail};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Identifier of a Tuya data point.
pub type DpId = u32;

/// A raw data point value as reported by the device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl DpValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DpValue::Int(n) => Some(n as f64),
            DpValue::Float(n) => Some(n),
            DpValue::Bool(_) | DpValue::String(_) => None,
        }
    }
}

/// One status update of a device: data point id to value.
#[derive(Debug, Default, PartialEq)]
pub struct Dps(BTreeMap<DpId, DpValue>);

impl Dps {
    pub fn get(&self, dp_id: DpId) -> Option<&DpValue> {
        self.0.get(&dp_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(DpId, DpValue)> for Dps {
    fn from_iter<I: IntoIterator<Item = (DpId, DpValue)>>(iter: I) -> Self {
        Dps(iter.into_iter().collect())
    }
}

/// Parses a status payload published by a Tuya client.
///
/// Accepts either a bare map (`{"1": 100}`) or the map wrapped in a `dps` field.
/// Entries with a non-numeric key or an unsupported value are skipped.
pub fn parse_dps(payload: &[u8]) -> Result<Dps, Error> {
    let value: Value = serde_json::from_slice(payload).context("Failed to parse payload as JSON")?;
    let Value::Object(mut map) = value else {
        bail!("Expected a JSON object");
    };
    let map = match map.remove("dps") {
        Some(Value::Object(inner)) => inner,
        Some(_) => bail!("Expected `dps` to be a JSON object"),
        None => map,
    };
    Ok(collect_dps(map))
}

fn collect_dps(map: Map<String, Value>) -> Dps {
    map.into_iter()
        .filter_map(|(key, value)| {
            let Ok(dp_id) = key.parse::<DpId>() else {
                warn!("Ignoring non-numeric data point {key:?}");
                return None;
            };
            match serde_json::from_value::<DpValue>(value) {
                Ok(value) => Some((dp_id, value)),
                Err(_) => {
                    warn!("Ignoring unsupported value for data point {dp_id}");
                    None
                }
            }
        })
        .collect()
}
