//! Remote state gateway: the single choke point for controller HTTP calls.
//!
//! Validated, already-clamped values come in; canonical model values come
//! out. Expected failures cross the boundary as `Failure` values, never as
//! panics, and the only state kept here is the single most recent screen
//! snapshot (merge source for partial layer updates).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{
        DisplayMode, InputId, InputSource, Layer, LayerDraft, LayerId, LayerPatch, Monitoring,
        Preset, PresetId, Screen, ScreenId,
    },
    error::Failure,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::{normalize, wire};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) mod endpoint {
    pub const SCREEN: &str = "screen";
    pub const SCREEN_BRIGHTNESS: &str = "screen/brightness";
    pub const SCREEN_GAMMA: &str = "screen/gamma";
    pub const SCREEN_COLOR_TEMPERATURE: &str = "screen/colorTemperature";
    pub const SCREEN_LAYER: &str = "screen/layer";
    pub const SCREEN_LAYER_INPUT: &str = "screen/layer/input";
    pub const DEVICE_DISPLAY_MODE: &str = "device/displaymode";
    pub const DEVICE_INPUT_SOURCES: &str = "device/input/sources";
    pub const DEVICE_MONITORING: &str = "device/monitoring";
    pub const PRESET: &str = "preset";
    pub const PRESET_APPLY: &str = "preset/apply";
}

/// Controller address and request timeout. Base path convention is
/// `http://{host}:{port}/api/v1/`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    pub fn for_host(host: &str, port: u16) -> anyhow::Result<Self> {
        let base_url = Url::parse(&format!("http://{host}:{port}/api/v1/"))?;
        Ok(Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Every layout-reading and layout-mutating remote call, behind one trait
/// so the reconciler, session and tests can inject fakes.
#[async_trait]
pub trait ScreenGateway: Send + Sync {
    /// Full screen record including nested layers and cabinets. `fallback`
    /// supplies the screen id when the payload omits one.
    async fn fetch_screen_snapshot(&self, fallback: &ScreenId) -> Result<Screen, Failure>;

    /// Creates a layer; the returned, server-assigned record is
    /// authoritative and client-side fields may not survive unchanged.
    async fn create_layer(&self, screen: &ScreenId, draft: &LayerDraft) -> Result<Layer, Failure>;

    /// Partial update; omitted fields are not altered on the controller.
    async fn update_layer(
        &self,
        screen: &ScreenId,
        layer: LayerId,
        patch: &LayerPatch,
    ) -> Result<Layer, Failure>;

    async fn delete_layer(&self, screen: &ScreenId, layer: LayerId) -> Result<(), Failure>;

    /// Rebinds a layer's input source.
    async fn switch_layer_input(
        &self,
        screen: &ScreenId,
        layer: LayerId,
        input: InputId,
    ) -> Result<(), Failure>;

    async fn set_brightness(&self, screen: &ScreenId, brightness: u8) -> Result<(), Failure>;
    async fn set_gamma(&self, screen: &ScreenId, gamma: f32) -> Result<(), Failure>;
    async fn set_display_mode(&self, screen: &ScreenId, mode: DisplayMode) -> Result<(), Failure>;
    async fn set_color_temperature(&self, screen: &ScreenId, kelvin: u32) -> Result<(), Failure>;
    async fn apply_preset(&self, screen: &ScreenId, preset: PresetId) -> Result<(), Failure>;
    async fn list_presets(&self) -> Result<Vec<Preset>, Failure>;
    async fn list_input_sources(&self) -> Result<Vec<InputSource>, Failure>;
    async fn fetch_monitoring(&self) -> Result<Monitoring, Failure>;
}

/// Null gateway for the not-yet-connected state.
pub struct MissingGateway;

fn not_connected(endpoint: &str) -> Failure {
    Failure::Network {
        endpoint: endpoint.to_string(),
        reason: "no controller connection".to_string(),
    }
}

#[async_trait]
impl ScreenGateway for MissingGateway {
    async fn fetch_screen_snapshot(&self, _fallback: &ScreenId) -> Result<Screen, Failure> {
        Err(not_connected(endpoint::SCREEN))
    }

    async fn create_layer(&self, _screen: &ScreenId, _draft: &LayerDraft) -> Result<Layer, Failure> {
        Err(not_connected(endpoint::SCREEN_LAYER))
    }

    async fn update_layer(
        &self,
        _screen: &ScreenId,
        _layer: LayerId,
        _patch: &LayerPatch,
    ) -> Result<Layer, Failure> {
        Err(not_connected(endpoint::SCREEN_LAYER))
    }

    async fn delete_layer(&self, _screen: &ScreenId, _layer: LayerId) -> Result<(), Failure> {
        Err(not_connected(endpoint::SCREEN_LAYER))
    }

    async fn switch_layer_input(
        &self,
        _screen: &ScreenId,
        _layer: LayerId,
        _input: InputId,
    ) -> Result<(), Failure> {
        Err(not_connected(endpoint::SCREEN_LAYER_INPUT))
    }

    async fn set_brightness(&self, _screen: &ScreenId, _brightness: u8) -> Result<(), Failure> {
        Err(not_connected(endpoint::SCREEN_BRIGHTNESS))
    }

    async fn set_gamma(&self, _screen: &ScreenId, _gamma: f32) -> Result<(), Failure> {
        Err(not_connected(endpoint::SCREEN_GAMMA))
    }

    async fn set_display_mode(&self, _screen: &ScreenId, _mode: DisplayMode) -> Result<(), Failure> {
        Err(not_connected(endpoint::DEVICE_DISPLAY_MODE))
    }

    async fn set_color_temperature(&self, _screen: &ScreenId, _kelvin: u32) -> Result<(), Failure> {
        Err(not_connected(endpoint::SCREEN_COLOR_TEMPERATURE))
    }

    async fn apply_preset(&self, _screen: &ScreenId, _preset: PresetId) -> Result<(), Failure> {
        Err(not_connected(endpoint::PRESET_APPLY))
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, Failure> {
        Err(not_connected(endpoint::PRESET))
    }

    async fn list_input_sources(&self) -> Result<Vec<InputSource>, Failure> {
        Err(not_connected(endpoint::DEVICE_INPUT_SOURCES))
    }

    async fn fetch_monitoring(&self) -> Result<Monitoring, Failure> {
        Err(not_connected(endpoint::DEVICE_MONITORING))
    }
}

/// reqwest-backed gateway speaking the COEX HTTP API.
pub struct CoexGateway {
    http: Client,
    base_url: Url,
    /// Most recent screen snapshot. Merge source for partial layer updates
    /// and fallback while nested data is momentarily absent; never more
    /// than the single latest snapshot.
    last_snapshot: RwLock<Option<Screen>>,
}

impl CoexGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
            last_snapshot: RwLock::new(None),
        })
    }

    /// Layer create/update/delete is documented but 404s on some firmware
    /// revisions; a 404 there means "this controller cannot", not "retry".
    fn is_firmware_dependent(endpoint: &str) -> bool {
        endpoint == endpoint::SCREEN_LAYER
    }

    fn url_for(&self, endpoint: &str) -> Result<Url, Failure> {
        self.base_url.join(endpoint).map_err(|err| Failure::Protocol {
            endpoint: endpoint.to_string(),
            detail: err.to_string(),
        })
    }

    async fn call<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, Failure>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url_for(endpoint)?;
        debug!(%method, endpoint, "controller request");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            let reason = if err.is_timeout() {
                "request timed out".to_string()
            } else {
                err.to_string()
            };
            warn!(endpoint, %reason, "controller unreachable");
            Failure::Network {
                endpoint: endpoint.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND && Self::is_firmware_dependent(endpoint) {
            warn!(endpoint, "endpoint missing on this firmware");
            return Err(Failure::Unsupported {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            return Err(Failure::Rejected {
                endpoint: endpoint.to_string(),
                code: i64::from(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("HTTP error")
                    .to_string(),
            });
        }

        let envelope: wire::Envelope<T> =
            response.json().await.map_err(|err| Failure::Protocol {
                endpoint: endpoint.to_string(),
                detail: err.to_string(),
            })?;
        if envelope.code != 0 {
            return Err(Failure::Rejected {
                endpoint: endpoint.to_string(),
                code: envelope.code,
                message: envelope.message.unwrap_or_default(),
            });
        }
        Ok(envelope.data)
    }

    fn require_data<T>(endpoint: &str, data: Option<T>) -> Result<T, Failure> {
        data.ok_or_else(|| Failure::Protocol {
            endpoint: endpoint.to_string(),
            detail: "success envelope without data".to_string(),
        })
    }

    /// Current value of a layer, from the cached snapshot or a re-fetch.
    async fn current_layer(&self, screen: &ScreenId, layer: LayerId) -> Result<Layer, Failure> {
        if let Some(snapshot) = self.last_snapshot.read().await.as_ref() {
            if let Some(found) = snapshot.layers.iter().find(|l| l.id == layer) {
                return Ok(found.clone());
            }
        }
        let refreshed = self.fetch_screen_snapshot(screen).await?;
        refreshed
            .layers
            .iter()
            .find(|l| l.id == layer)
            .cloned()
            .ok_or_else(|| Failure::Rejected {
                endpoint: endpoint::SCREEN_LAYER.to_string(),
                code: -1,
                message: format!(
                    "layer {} is not present in the latest controller snapshot",
                    layer.0
                ),
            })
    }

    async fn remember_layer(&self, layer: &Layer) {
        let mut guard = self.last_snapshot.write().await;
        if let Some(snapshot) = guard.as_mut() {
            match snapshot.layers.iter_mut().find(|l| l.id == layer.id) {
                Some(existing) => *existing = layer.clone(),
                None => snapshot.layers.push(layer.clone()),
            }
        }
    }

    async fn forget_layer(&self, layer: LayerId) {
        let mut guard = self.last_snapshot.write().await;
        if let Some(snapshot) = guard.as_mut() {
            snapshot.layers.retain(|l| l.id != layer);
        }
    }

    fn screen_targets(screen: &ScreenId) -> Vec<String> {
        vec![screen.0.clone()]
    }
}

#[async_trait]
impl ScreenGateway for CoexGateway {
    async fn fetch_screen_snapshot(&self, fallback: &ScreenId) -> Result<Screen, Failure> {
        let data = self
            .call::<(), wire::ScreenData>(Method::GET, endpoint::SCREEN, None::<&()>)
            .await?;
        let data = Self::require_data(endpoint::SCREEN, data)?;
        let screen = normalize::normalize_screen(fallback, data);
        *self.last_snapshot.write().await = Some(screen.clone());
        Ok(screen)
    }

    async fn create_layer(&self, screen: &ScreenId, draft: &LayerDraft) -> Result<Layer, Failure> {
        let body = wire::LayerWriteBody {
            screen_id: screen.0.clone(),
            layer: wire::LayerBody::from_draft(draft),
        };
        let data = self
            .call::<_, wire::WireLayer>(Method::POST, endpoint::SCREEN_LAYER, Some(&body))
            .await?;
        let stored = Self::require_data(endpoint::SCREEN_LAYER, data)?;
        let layer = normalize::layer_from_wire(stored).ok_or_else(|| Failure::Protocol {
            endpoint: endpoint::SCREEN_LAYER.to_string(),
            detail: "created layer came back without a usable id".to_string(),
        })?;
        self.remember_layer(&layer).await;
        Ok(layer)
    }

    async fn update_layer(
        &self,
        screen: &ScreenId,
        layer: LayerId,
        patch: &LayerPatch,
    ) -> Result<Layer, Failure> {
        let mut merged = self.current_layer(screen, layer).await?;
        if patch.is_empty() {
            return Ok(merged);
        }
        patch.apply_to(&mut merged);

        let body = wire::LayerWriteBody {
            screen_id: screen.0.clone(),
            layer: wire::LayerBody::from_layer(&merged),
        };
        let data = self
            .call::<_, wire::WireLayer>(Method::PUT, endpoint::SCREEN_LAYER, Some(&body))
            .await?;
        // Firmware that echoes the stored record wins over our merge.
        let stored = data.and_then(normalize::layer_from_wire).unwrap_or(merged);
        self.remember_layer(&stored).await;
        Ok(stored)
    }

    async fn delete_layer(&self, screen: &ScreenId, layer: LayerId) -> Result<(), Failure> {
        let body = wire::LayerDeleteBody {
            screen_id: screen.0.clone(),
            ids: vec![layer.0.to_string()],
        };
        self.call::<_, serde_json::Value>(Method::DELETE, endpoint::SCREEN_LAYER, Some(&body))
            .await?;
        self.forget_layer(layer).await;
        Ok(())
    }

    async fn switch_layer_input(
        &self,
        screen: &ScreenId,
        layer: LayerId,
        input: InputId,
    ) -> Result<(), Failure> {
        let body = wire::LayerInputBody {
            screen_id: screen.0.clone(),
            layers: vec![wire::LayerSourceRef {
                id: layer.0.to_string(),
                source: input.0.to_string(),
            }],
        };
        self.call::<_, serde_json::Value>(Method::PUT, endpoint::SCREEN_LAYER_INPUT, Some(&body))
            .await?;

        let mut guard = self.last_snapshot.write().await;
        if let Some(snapshot) = guard.as_mut() {
            if let Some(cached) = snapshot.layers.iter_mut().find(|l| l.id == layer) {
                cached.input = Some(input);
            }
        }
        Ok(())
    }

    async fn set_brightness(&self, screen: &ScreenId, brightness: u8) -> Result<(), Failure> {
        let body = wire::BrightnessBody {
            screen_id_list: Self::screen_targets(screen),
            brightness,
        };
        self.call::<_, serde_json::Value>(Method::PUT, endpoint::SCREEN_BRIGHTNESS, Some(&body))
            .await?;
        Ok(())
    }

    async fn set_gamma(&self, screen: &ScreenId, gamma: f32) -> Result<(), Failure> {
        let body = wire::GammaBody {
            screen_id_list: Self::screen_targets(screen),
            gamma,
        };
        self.call::<_, serde_json::Value>(Method::PUT, endpoint::SCREEN_GAMMA, Some(&body))
            .await?;
        Ok(())
    }

    async fn set_display_mode(&self, screen: &ScreenId, mode: DisplayMode) -> Result<(), Failure> {
        let body = wire::DisplayModeBody {
            screen_id_list: Self::screen_targets(screen),
            value: normalize::display_mode_to_value(mode),
        };
        self.call::<_, serde_json::Value>(Method::PUT, endpoint::DEVICE_DISPLAY_MODE, Some(&body))
            .await?;
        Ok(())
    }

    async fn set_color_temperature(&self, screen: &ScreenId, kelvin: u32) -> Result<(), Failure> {
        let body = wire::ColorTemperatureBody {
            screen_id_list: Self::screen_targets(screen),
            color_temperature: kelvin,
        };
        self.call::<_, serde_json::Value>(
            Method::PUT,
            endpoint::SCREEN_COLOR_TEMPERATURE,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn apply_preset(&self, screen: &ScreenId, preset: PresetId) -> Result<(), Failure> {
        let body = wire::PresetApplyBody {
            screen_id_list: Self::screen_targets(screen),
            preset_id: preset.0,
        };
        self.call::<_, serde_json::Value>(Method::POST, endpoint::PRESET_APPLY, Some(&body))
            .await?;
        Ok(())
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, Failure> {
        let data = self
            .call::<(), Vec<wire::WirePreset>>(Method::GET, endpoint::PRESET, None::<&()>)
            .await?;
        Ok(data
            .unwrap_or_default()
            .into_iter()
            .filter_map(normalize::preset_from_wire)
            .collect())
    }

    async fn list_input_sources(&self) -> Result<Vec<InputSource>, Failure> {
        let data = self
            .call::<(), Vec<wire::WireInput>>(Method::GET, endpoint::DEVICE_INPUT_SOURCES, None::<&()>)
            .await?;
        Ok(data
            .unwrap_or_default()
            .into_iter()
            .filter_map(normalize::input_from_wire)
            .collect())
    }

    async fn fetch_monitoring(&self) -> Result<Monitoring, Failure> {
        let data = self
            .call::<(), wire::WireMonitoring>(Method::GET, endpoint::DEVICE_MONITORING, None::<&()>)
            .await?;
        Ok(data.map(normalize::monitoring_from_wire).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
