//! COEX wire shapes.
//!
//! Everything here mirrors the vendor's JSON exactly, field-name quirks
//! included (`screenIdList` arrays even for one target, `screenID` with a
//! capital ID on the layer input switch, string-typed layer/source ids).
//! Nothing in this module is visible above the gateway.

use serde::{Deserialize, Serialize};

/// Uniform vendor envelope around every response. `code == 0` is the only
/// success signal; `data` must not be trusted before checking it.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Firmware revisions disagree on whether ids are numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdRepr {
    Num(i64),
    Str(String),
}

impl IdRepr {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IdRepr::Num(n) => Some(*n),
            IdRepr::Str(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireLayer {
    pub id: IdRepr,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub z_order: Option<i64>,
    #[serde(default)]
    pub input_id: Option<IdRepr>,
    #[serde(default)]
    pub locked: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCabinet {
    pub id: i64,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireInput {
    pub id: IdRepr,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WirePreset {
    pub id: IdRepr,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMonitoring {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub voltage: Option<f32>,
    #[serde(default)]
    pub fan_speed: Option<u32>,
}

/// One "working mode" group of layers inside the grouped screen shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkingModeGroup {
    #[serde(default)]
    pub working_mode: Option<String>,
    #[serde(default)]
    pub layers: Vec<WireLayer>,
}

/// `GET screen` payload. Two shapes exist in the wild: a flat `layers`
/// list, and `workingModeList` groups with the active group tagged by
/// `workingMode`. Both deserialize into this one struct; the normalizers
/// pick the variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScreenData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub gamma: Option<f32>,
    #[serde(default)]
    pub display_mode: Option<u8>,
    #[serde(default)]
    pub layers: Option<Vec<WireLayer>>,
    #[serde(default)]
    pub working_mode: Option<String>,
    #[serde(default)]
    pub working_mode_list: Option<Vec<WorkingModeGroup>>,
    #[serde(default)]
    pub cabinets: Option<Vec<WireCabinet>>,
}

// ---- request bodies ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BrightnessBody {
    pub screen_id_list: Vec<String>,
    pub brightness: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GammaBody {
    pub screen_id_list: Vec<String>,
    pub gamma: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ColorTemperatureBody {
    pub screen_id_list: Vec<String>,
    pub color_temperature: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DisplayModeBody {
    pub screen_id_list: Vec<String>,
    pub value: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresetApplyBody {
    pub screen_id_list: Vec<String>,
    pub preset_id: i64,
}

/// The input switch wants `screenID` (capital ID) and string id pairs.
#[derive(Debug, Serialize)]
pub(crate) struct LayerInputBody {
    #[serde(rename = "screenID")]
    pub screen_id: String,
    pub layers: Vec<LayerSourceRef>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LayerSourceRef {
    pub id: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LayerWriteBody {
    #[serde(rename = "screenID")]
    pub screen_id: String,
    pub layer: LayerBody,
}

#[derive(Debug, Serialize)]
pub(crate) struct LayerDeleteBody {
    #[serde(rename = "screenID")]
    pub screen_id: String,
    pub ids: Vec<String>,
}

/// Full layer object for create/update; the endpoint is full-object
/// replacement, so partial updates are merged before this is built.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LayerBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub z_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_id: Option<String>,
}

impl LayerBody {
    pub fn from_layer(layer: &shared::domain::Layer) -> Self {
        Self {
            id: Some(layer.id.0.to_string()),
            name: layer.name.clone(),
            x: layer.position.x,
            y: layer.position.y,
            width: layer.size.width,
            height: layer.size.height,
            z_order: layer.z_order,
            input_id: layer.input.map(|input| input.0.to_string()),
        }
    }

    pub fn from_draft(draft: &shared::domain::LayerDraft) -> Self {
        Self {
            id: None,
            name: draft.name.clone(),
            x: draft.position.x,
            y: draft.position.y,
            width: draft.size.width,
            height: draft.size.height,
            z_order: draft.z_order,
            input_id: draft.input.map(|input| input.0.to_string()),
        }
    }
}
