//! Test doubles shared across the client_core test modules.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{
        DisplayMode, InputId, InputSource, Layer, LayerDraft, LayerId, LayerPatch, Monitoring,
        Position, Preset, PresetId, Screen, ScreenId, Size,
    },
    error::Failure,
};
use tokio::sync::Mutex;

use crate::gateway::ScreenGateway;

pub(crate) fn layer(id: i64, x: i32, y: i32, width: u32, height: u32, z_order: i64) -> Layer {
    Layer {
        id: LayerId(id),
        name: None,
        position: Position::new(x, y),
        size: Size::new(width, height),
        z_order,
        input: None,
        locked: false,
    }
}

pub(crate) fn screen_with_layers(id: &str, layers: Vec<Layer>) -> Screen {
    Screen {
        id: ScreenId::new(id),
        name: None,
        layers,
        cabinets: Vec::new(),
        display_mode: DisplayMode::Normal,
        brightness: 50,
        gamma: 2.2,
    }
}

/// Gateway fake: serves a scripted snapshot and records every mutating
/// call so tests can count remote traffic.
pub(crate) struct RecordingGateway {
    pub snapshot: Mutex<Screen>,
    pub update_calls: Mutex<Vec<(LayerId, LayerPatch)>>,
    pub deleted: Mutex<Vec<LayerId>>,
    pub switched: Mutex<Vec<(LayerId, InputId)>>,
    pub brightness_calls: Mutex<Vec<u8>>,
    scripted_failure: Mutex<Option<Failure>>,
    next_layer_id: Mutex<i64>,
}

impl RecordingGateway {
    pub fn with_screen(screen: Screen) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(screen),
            update_calls: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            switched: Mutex::new(Vec::new()),
            brightness_calls: Mutex::new(Vec::new()),
            scripted_failure: Mutex::new(None),
            next_layer_id: Mutex::new(100),
        })
    }

    /// The next call fails with `failure` instead of succeeding.
    pub async fn fail_next(&self, failure: Failure) {
        *self.scripted_failure.lock().await = Some(failure);
    }

    pub async fn set_snapshot_layers(&self, layers: Vec<Layer>) {
        self.snapshot.lock().await.layers = layers;
    }

    async fn take_failure(&self) -> Result<(), Failure> {
        match self.scripted_failure.lock().await.take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ScreenGateway for RecordingGateway {
    async fn fetch_screen_snapshot(&self, _fallback: &ScreenId) -> Result<Screen, Failure> {
        self.take_failure().await?;
        Ok(self.snapshot.lock().await.clone())
    }

    async fn create_layer(&self, _screen: &ScreenId, draft: &LayerDraft) -> Result<Layer, Failure> {
        self.take_failure().await?;
        let mut next = self.next_layer_id.lock().await;
        let id = *next;
        *next += 1;
        let created = Layer {
            id: LayerId(id),
            name: draft.name.clone(),
            position: draft.position,
            size: draft.size,
            z_order: draft.z_order,
            input: draft.input,
            locked: false,
        };
        self.snapshot.lock().await.layers.push(created.clone());
        Ok(created)
    }

    async fn update_layer(
        &self,
        _screen: &ScreenId,
        layer: LayerId,
        patch: &LayerPatch,
    ) -> Result<Layer, Failure> {
        self.take_failure().await?;
        self.update_calls.lock().await.push((layer, *patch));
        let mut snapshot = self.snapshot.lock().await;
        let found = snapshot
            .layers
            .iter_mut()
            .find(|l| l.id == layer)
            .ok_or_else(|| Failure::Rejected {
                endpoint: "screen/layer".to_string(),
                code: -1,
                message: format!("layer {} is not present", layer.0),
            })?;
        patch.apply_to(found);
        Ok(found.clone())
    }

    async fn delete_layer(&self, _screen: &ScreenId, layer: LayerId) -> Result<(), Failure> {
        self.take_failure().await?;
        self.deleted.lock().await.push(layer);
        self.snapshot.lock().await.layers.retain(|l| l.id != layer);
        Ok(())
    }

    async fn switch_layer_input(
        &self,
        _screen: &ScreenId,
        layer: LayerId,
        input: InputId,
    ) -> Result<(), Failure> {
        self.take_failure().await?;
        self.switched.lock().await.push((layer, input));
        Ok(())
    }

    async fn set_brightness(&self, _screen: &ScreenId, brightness: u8) -> Result<(), Failure> {
        self.take_failure().await?;
        self.brightness_calls.lock().await.push(brightness);
        Ok(())
    }

    async fn set_gamma(&self, _screen: &ScreenId, _gamma: f32) -> Result<(), Failure> {
        self.take_failure().await
    }

    async fn set_display_mode(&self, _screen: &ScreenId, _mode: DisplayMode) -> Result<(), Failure> {
        self.take_failure().await
    }

    async fn set_color_temperature(&self, _screen: &ScreenId, _kelvin: u32) -> Result<(), Failure> {
        self.take_failure().await
    }

    async fn apply_preset(&self, _screen: &ScreenId, _preset: PresetId) -> Result<(), Failure> {
        self.take_failure().await
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, Failure> {
        self.take_failure().await?;
        Ok(Vec::new())
    }

    async fn list_input_sources(&self) -> Result<Vec<InputSource>, Failure> {
        self.take_failure().await?;
        Ok(Vec::new())
    }

    async fn fetch_monitoring(&self) -> Result<Monitoring, Failure> {
        self.take_failure().await?;
        Ok(Monitoring::default())
    }
}
