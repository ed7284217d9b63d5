//! Normalizers from vendor wire shapes into the canonical model.
//!
//! One function per known response variant, so a new firmware shape is an
//! additive function rather than another branch woven through the gateway.
//! Normalization is total: missing optional fields get defaults, and
//! records without a usable id are skipped rather than failing the whole
//! snapshot.

use shared::domain::{
    Cabinet, CabinetId, DisplayMode, InputId, InputSource, InputStatus, Layer, LayerId, Monitoring,
    Position, Preset, PresetId, Screen, ScreenId, Size,
};
use tracing::warn;

use crate::wire::{
    ScreenData, WireCabinet, WireInput, WireLayer, WireMonitoring, WirePreset, WorkingModeGroup,
};

const DEFAULT_LAYER_WIDTH: u32 = 200;
const DEFAULT_LAYER_HEIGHT: u32 = 150;
const DEFAULT_GAMMA: f32 = 2.2;

pub(crate) fn layer_from_wire(wire: WireLayer) -> Option<Layer> {
    let Some(id) = wire.id.as_i64() else {
        warn!("dropping layer with unusable id {:?}", wire.id);
        return None;
    };
    Some(Layer {
        id: LayerId(id),
        name: wire.name,
        position: Position::new(wire.x.unwrap_or(0).max(0), wire.y.unwrap_or(0).max(0)),
        size: Size::new(
            wire.width.unwrap_or(DEFAULT_LAYER_WIDTH).max(1),
            wire.height.unwrap_or(DEFAULT_LAYER_HEIGHT).max(1),
        ),
        z_order: wire.z_order.unwrap_or(1),
        input: wire.input_id.and_then(|id| id.as_i64()).map(InputId),
        locked: wire.locked.unwrap_or(false),
    })
}

pub(crate) fn cabinet_from_wire(wire: WireCabinet) -> Cabinet {
    Cabinet {
        id: CabinetId(wire.id),
        position: Position::new(wire.x.unwrap_or(0), wire.y.unwrap_or(0)),
        size: Size::new(wire.width.unwrap_or(0), wire.height.unwrap_or(0)),
    }
}

pub(crate) fn input_from_wire(wire: WireInput) -> Option<InputSource> {
    let Some(id) = wire.id.as_i64() else {
        warn!("dropping input source with unusable id {:?}", wire.id);
        return None;
    };
    let status = match wire.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("active") | Some("1") => InputStatus::Active,
        Some("inactive") | Some("0") => InputStatus::Inactive,
        _ => InputStatus::Unknown,
    };
    Some(InputSource {
        id: InputId(id),
        name: wire.name,
        kind: wire.kind,
        resolution: wire.resolution,
        status,
    })
}

pub(crate) fn preset_from_wire(wire: WirePreset) -> Option<Preset> {
    let id = wire.id.as_i64()?;
    Some(Preset {
        id: PresetId(id),
        name: wire.name.unwrap_or_else(|| format!("Preset {id}")),
    })
}

pub(crate) fn monitoring_from_wire(wire: WireMonitoring) -> Monitoring {
    Monitoring {
        temperature_celsius: wire.temperature,
        voltage: wire.voltage,
        fan_rpm: wire.fan_speed,
    }
}

pub(crate) fn display_mode_from_value(value: Option<u8>) -> DisplayMode {
    match value {
        Some(1) => DisplayMode::Freeze,
        Some(2) => DisplayMode::Blackout,
        _ => DisplayMode::Normal,
    }
}

pub(crate) fn display_mode_to_value(mode: DisplayMode) -> u8 {
    match mode {
        DisplayMode::Normal => 0,
        DisplayMode::Freeze => 1,
        DisplayMode::Blackout => 2,
    }
}

/// Flat shape: the screen carries its layer list directly.
pub(crate) fn screen_from_flat(fallback: &ScreenId, data: ScreenData) -> Screen {
    let layers = data.layers.unwrap_or_default();
    assemble_screen(fallback, data.id, data.name, layers, data.cabinets, data.brightness, data.gamma, data.display_mode)
}

/// Grouped shape: layers live under `workingModeList`, with the active
/// group selected by matching the screen's `workingMode` tag. No match
/// (or no tag) falls back to the first group.
pub(crate) fn screen_from_working_modes(fallback: &ScreenId, data: ScreenData) -> Screen {
    let groups = data.working_mode_list.unwrap_or_default();
    let layers = select_working_mode_group(data.working_mode.as_deref(), groups);
    assemble_screen(fallback, data.id, data.name, layers, data.cabinets, data.brightness, data.gamma, data.display_mode)
}

fn select_working_mode_group(tag: Option<&str>, groups: Vec<WorkingModeGroup>) -> Vec<WireLayer> {
    if let Some(tag) = tag {
        if let Some(group) = groups
            .iter()
            .find(|group| group.working_mode.as_deref() == Some(tag))
        {
            return group.layers.clone();
        }
    }
    groups.into_iter().next().map(|group| group.layers).unwrap_or_default()
}

/// Dispatch over the known screen shapes. A flat `layers` list wins when
/// both are present; a payload with neither yields an empty layer set.
pub(crate) fn normalize_screen(fallback: &ScreenId, data: ScreenData) -> Screen {
    if data.layers.is_some() {
        screen_from_flat(fallback, data)
    } else if data.working_mode_list.is_some() {
        screen_from_working_modes(fallback, data)
    } else {
        screen_from_flat(fallback, data)
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_screen(
    fallback: &ScreenId,
    id: Option<String>,
    name: Option<String>,
    layers: Vec<WireLayer>,
    cabinets: Option<Vec<WireCabinet>>,
    brightness: Option<u8>,
    gamma: Option<f32>,
    display_mode: Option<u8>,
) -> Screen {
    let id = match id {
        Some(raw) if !raw.is_empty() => ScreenId::new(raw),
        _ => fallback.clone(),
    };
    Screen {
        id,
        name,
        layers: layers.into_iter().filter_map(layer_from_wire).collect(),
        cabinets: cabinets
            .unwrap_or_default()
            .into_iter()
            .map(cabinet_from_wire)
            .collect(),
        display_mode: display_mode_from_value(display_mode),
        brightness: brightness.unwrap_or(0).min(100),
        gamma: gamma.unwrap_or(DEFAULT_GAMMA).clamp(1.0, 4.0),
    }
}

#[cfg(test)]
#[path = "tests/normalize_tests.rs"]
mod tests;
