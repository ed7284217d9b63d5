use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);
    };
}

id_newtype!(LayerId);
id_newtype!(InputId);
id_newtype!(PresetId);
id_newtype!(CabinetId);

/// Opaque screen identifier assigned by the controller.
///
/// On real hardware this is a GUID wrapped in braces
/// (`{7e9cd858-780b-40d1-9f20-0fa0d53a06ce}`). The client never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenId(pub String);

impl ScreenId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ScreenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screen-pixel position, origin top-left. Both axes are `>= 0` for any
/// layer that reaches the controller; clamping happens in the gesture
/// translator before values get here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Layer dimensions in pixels, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Normal,
    Freeze,
    Blackout,
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayMode::Normal => f.write_str("normal"),
            DisplayMode::Freeze => f.write_str("freeze"),
            DisplayMode::Blackout => f.write_str("blackout"),
        }
    }
}

impl std::str::FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(DisplayMode::Normal),
            "freeze" => Ok(DisplayMode::Freeze),
            "blackout" => Ok(DisplayMode::Blackout),
            other => Err(format!("unknown display mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

/// A positioned, sized rectangle composited onto the screen, bound to an
/// input source by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: Option<String>,
    pub position: Position,
    pub size: Size,
    /// Render order. The controller does not keep these unique; the
    /// reconciler presents a total order over `(z_order, id)`.
    pub z_order: i64,
    /// Reference to an input source, not ownership. A dangling reference
    /// renders as "No Input" rather than failing.
    pub input: Option<InputId>,
    /// Locked layers never enter a drag or resize gesture.
    pub locked: bool,
}

/// Client-side intent for a layer that does not exist yet. The controller
/// assigns the id; the created layer returned by the gateway is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDraft {
    pub name: Option<String>,
    pub position: Position,
    pub size: Size,
    pub z_order: i64,
    pub input: Option<InputId>,
}

/// Partial layer update. Omitted fields are left untouched on the
/// controller; the gateway merges over current values when the vendor
/// endpoint only accepts full-object replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPatch {
    pub position: Option<Position>,
    pub size: Option<Size>,
    pub z_order: Option<i64>,
}

impl LayerPatch {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.size.is_none() && self.z_order.is_none()
    }

    pub fn apply_to(&self, layer: &mut Layer) {
        if let Some(position) = self.position {
            layer.position = position;
        }
        if let Some(size) = self.size {
            layer.size = size;
        }
        if let Some(z_order) = self.z_order {
            layer.z_order = z_order;
        }
    }
}

/// Read-mostly descriptor of a controller input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSource {
    pub id: InputId,
    pub name: Option<String>,
    pub kind: Option<String>,
    /// E.g. "1920x1080". Missing resolutions render as "N/A".
    pub resolution: Option<String>,
    pub status: InputStatus,
}

impl InputSource {
    /// Display label, falling back to the numeric id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Input {}", self.id.0),
        }
    }
}

/// Physical tile contributing to the screen's pixel extent. Read-only from
/// the client's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cabinet {
    pub id: CabinetId,
    pub position: Position,
    pub size: Size,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    pub name: String,
}

/// The top-level addressable display entity managed by one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,
    pub name: Option<String>,
    pub layers: Vec<Layer>,
    pub cabinets: Vec<Cabinet>,
    pub display_mode: DisplayMode,
    /// Percent, 0-100.
    pub brightness: u8,
    /// 1.0-4.0.
    pub gamma: f32,
}

/// Device health snapshot; every field is optional because firmware
/// revisions report different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Monitoring {
    pub temperature_celsius: Option<f32>,
    pub voltage: Option<f32>,
    pub fan_rpm: Option<u32>,
}

/// Aggregate canvas extent: the max over `position + size` of all
/// cabinets. An empty cabinet set yields 0x0.
pub fn canvas_extent(cabinets: &[Cabinet]) -> Size {
    let mut width = 0u32;
    let mut height = 0u32;
    for cabinet in cabinets {
        let right = cabinet.position.x.max(0) as u32 + cabinet.size.width;
        let bottom = cabinet.position.y.max(0) as u32 + cabinet.size.height;
        width = width.max(right);
        height = height.max(bottom);
    }
    Size::new(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cabinet(id: i64, x: i32, y: i32, w: u32, h: u32) -> Cabinet {
        Cabinet {
            id: CabinetId(id),
            position: Position::new(x, y),
            size: Size::new(w, h),
        }
    }

    #[test]
    fn canvas_extent_is_max_over_cabinet_corners() {
        let cabinets = vec![
            cabinet(1, 0, 0, 256, 256),
            cabinet(2, 256, 0, 256, 256),
            cabinet(3, 0, 256, 512, 128),
        ];
        assert_eq!(canvas_extent(&cabinets), Size::new(512, 384));
    }

    #[test]
    fn canvas_extent_of_no_cabinets_is_zero() {
        assert_eq!(canvas_extent(&[]), Size::new(0, 0));
    }

    #[test]
    fn patch_leaves_omitted_fields_alone() {
        let mut layer = Layer {
            id: LayerId(3),
            name: Some("pip".into()),
            position: Position::new(100, 100),
            size: Size::new(400, 300),
            z_order: 2,
            input: Some(InputId(7)),
            locked: false,
        };
        LayerPatch {
            position: Some(Position::new(10, 20)),
            ..Default::default()
        }
        .apply_to(&mut layer);

        assert_eq!(layer.position, Position::new(10, 20));
        assert_eq!(layer.size, Size::new(400, 300));
        assert_eq!(layer.z_order, 2);
        assert_eq!(layer.input, Some(InputId(7)));
    }
}
