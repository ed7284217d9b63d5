//! Control-plane client core for COEX LED-display controllers.
//!
//! Composes the remote state gateway, the layout reconciler and the
//! gesture translator into a [`PanelSession`]: connect to a controller,
//! keep the canonical layout fresh with a background refresh, and feed it
//! discrete intents from whatever presentation layer sits on top.

use std::sync::Arc;
use std::time::Duration;

use shared::{
    domain::{
        DisplayMode, InputId, InputSource, Layer, LayerDraft, LayerId, Monitoring, Position,
        Preset, PresetId, Screen, ScreenId, Size,
    },
    error::Failure,
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{info, warn};

pub mod error;
pub mod gateway;
pub mod gesture;
mod normalize;
pub mod reconciler;
mod wire;

pub use error::PanelError;
pub use gateway::{
    CoexGateway, GatewayConfig, MissingGateway, ScreenGateway, DEFAULT_REQUEST_TIMEOUT,
};
pub use gesture::{
    GestureKind, GestureTranslator, LayoutIntent, PointerDown, PointerEvent,
    DEFAULT_MIN_LAYER_SIZE,
};
pub use reconciler::LayoutReconciler;

/// Feed of everything the presentation layer cares about: layout changes
/// and per-action status lines.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    SnapshotApplied { screen: ScreenId, layer_count: usize },
    LayerChanged(Layer),
    LayerRemoved(LayerId),
    Status(String),
    ActionFailed { action: String, failure: Failure },
}

/// One connected controller: gateway + reconciler + background tasks.
///
/// Explicitly constructed and passed around; there is no process-wide
/// singleton.
pub struct PanelSession {
    gateway: Arc<dyn ScreenGateway>,
    screen: ScreenId,
    reconciler: Mutex<LayoutReconciler>,
    events: broadcast::Sender<PanelEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSession")
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}

impl PanelSession {
    /// Connects by fetching an initial snapshot. The controller-reported
    /// screen id becomes canonical; `screen_hint` fills in when the
    /// payload does not carry one.
    pub async fn connect(
        gateway: Arc<dyn ScreenGateway>,
        screen_hint: Option<ScreenId>,
    ) -> Result<Arc<Self>, Failure> {
        let fallback = screen_hint.unwrap_or_else(|| ScreenId::new(""));
        let snapshot = gateway.fetch_screen_snapshot(&fallback).await?;
        if snapshot.id.is_empty() {
            return Err(Failure::Protocol {
                endpoint: "screen".to_string(),
                detail: "controller did not report a screen id".to_string(),
            });
        }

        let (events, _) = broadcast::channel(256);
        let screen = snapshot.id.clone();
        let mut reconciler =
            LayoutReconciler::new(screen.clone(), Arc::clone(&gateway), events.clone());
        reconciler.apply_snapshot(snapshot.layers.clone());
        info!(screen = %screen, layers = snapshot.layers.len(), "connected to controller");

        Ok(Arc::new(Self {
            gateway,
            screen,
            reconciler: Mutex::new(reconciler),
            events,
            tasks: Mutex::new(Vec::new()),
        }))
    }

    pub fn screen(&self) -> &ScreenId {
        &self.screen
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    /// Fetches an authoritative snapshot and reconciles it into the view.
    pub async fn refresh(&self) -> Result<Screen, Failure> {
        let snapshot = self.gateway.fetch_screen_snapshot(&self.screen).await?;
        self.reconciler
            .lock()
            .await
            .apply_snapshot(snapshot.layers.clone());
        Ok(snapshot)
    }

    /// Background refresh loop. Overlapping refreshes are not cancelled;
    /// results apply in completion order, best-effort.
    pub async fn spawn_auto_refresh(self: &Arc<Self>, interval: Duration) {
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(failure) = session.refresh().await {
                    warn!(%failure, "auto-refresh failed");
                    let _ = session.events.send(PanelEvent::ActionFailed {
                        action: "refresh".to_string(),
                        failure,
                    });
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    /// Consumes a typed intent stream from the gesture translator.
    /// Failures are reported on the event feed; the loop keeps going.
    pub async fn spawn_intent_loop(self: &Arc<Self>, intents: mpsc::Receiver<LayoutIntent>) {
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut stream = ReceiverStream::new(intents);
            while let Some(intent) = stream.next().await {
                if let Err(err) = session.apply_intent(intent).await {
                    match err {
                        PanelError::Gateway(failure) => {
                            let _ = session.events.send(PanelEvent::ActionFailed {
                                action: "layout".to_string(),
                                failure,
                            });
                        }
                        other => warn!(%other, "layout intent dropped"),
                    }
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    pub async fn apply_intent(&self, intent: LayoutIntent) -> Result<(), PanelError> {
        let mut reconciler = self.reconciler.lock().await;
        match intent {
            LayoutIntent::BeginGesture { layer } => reconciler.begin_gesture(layer),
            LayoutIntent::DragTo { layer, position } => {
                reconciler.gesture_move(layer, position);
                Ok(())
            }
            LayoutIntent::ResizeTo { layer, size } => {
                reconciler.gesture_resize(layer, size);
                Ok(())
            }
            LayoutIntent::CommitGesture { layer } => reconciler.end_gesture(layer).await,
            LayoutIntent::NudgeBy { layer, dx, dy } => {
                reconciler.nudge_layer(layer, dx, dy).await
            }
        }
    }

    /// Aborts background tasks and abandons their pending requests.
    pub async fn disconnect(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        info!(screen = %self.screen, "disconnected from controller");
    }

    // ---- screen-level commands ----

    pub async fn set_brightness(&self, value: u8) -> Result<(), Failure> {
        let result = self.gateway.set_brightness(&self.screen, value).await;
        self.report("brightness", result, format!("Brightness set to {value}%"))
    }

    pub async fn set_gamma(&self, value: f32) -> Result<(), Failure> {
        let result = self.gateway.set_gamma(&self.screen, value).await;
        self.report("gamma", result, format!("Gamma set to {value:.1}"))
    }

    pub async fn set_display_mode(&self, mode: DisplayMode) -> Result<(), Failure> {
        let result = self.gateway.set_display_mode(&self.screen, mode).await;
        self.report("display mode", result, format!("Display mode: {mode}"))
    }

    pub async fn set_color_temperature(&self, kelvin: u32) -> Result<(), Failure> {
        let result = self
            .gateway
            .set_color_temperature(&self.screen, kelvin)
            .await;
        self.report(
            "color temperature",
            result,
            format!("Color temperature set to {kelvin} K"),
        )
    }

    pub async fn apply_preset(&self, preset: PresetId) -> Result<(), Failure> {
        let result = self.gateway.apply_preset(&self.screen, preset).await;
        self.report("preset", result, format!("Preset {} applied", preset.0))
    }

    pub async fn list_presets(&self) -> Result<Vec<Preset>, Failure> {
        self.gateway.list_presets().await
    }

    pub async fn list_input_sources(&self) -> Result<Vec<InputSource>, Failure> {
        self.gateway.list_input_sources().await
    }

    pub async fn fetch_monitoring(&self) -> Result<Monitoring, Failure> {
        self.gateway.fetch_monitoring().await
    }

    // ---- layer commands ----

    pub async fn layers(&self) -> Vec<Layer> {
        self.reconciler.lock().await.layers_in_render_order()
    }

    pub async fn next_z_order(&self) -> i64 {
        self.reconciler.lock().await.next_z_order()
    }

    pub async fn create_layer(&self, draft: LayerDraft) -> Result<LayerId, PanelError> {
        let id = self.reconciler.lock().await.create_layer(draft).await;
        self.report_layout("create layer", id, |id| format!("Layer {} created", id.0))
    }

    pub async fn delete_layer(&self, id: LayerId) -> Result<(), PanelError> {
        let result = self.reconciler.lock().await.delete_layer(id).await;
        self.report_layout("delete layer", result, |_| {
            format!("Layer {} deleted", id.0)
        })
    }

    pub async fn move_layer(&self, id: LayerId, position: Position) -> Result<(), PanelError> {
        let result = self.reconciler.lock().await.move_layer(id, position).await;
        self.report_layout("move layer", result, |_| {
            format!("Layer moved to {}, {}", position.x, position.y)
        })
    }

    pub async fn resize_layer(&self, id: LayerId, size: Size) -> Result<(), PanelError> {
        let result = self.reconciler.lock().await.resize_layer(id, size).await;
        self.report_layout("resize layer", result, |_| {
            format!("Layer resized to {}x{}", size.width, size.height)
        })
    }

    pub async fn bring_to_front(&self, id: LayerId) -> Result<(), PanelError> {
        let result = self.reconciler.lock().await.bring_to_front(id).await;
        self.report_layout("bring to front", result, |_| {
            format!("Layer {} brought to front", id.0)
        })
    }

    pub async fn send_to_back(&self, id: LayerId) -> Result<(), PanelError> {
        let result = self.reconciler.lock().await.send_to_back(id).await;
        self.report_layout("send to back", result, |_| {
            format!("Layer {} sent to back", id.0)
        })
    }

    pub async fn switch_input(&self, id: LayerId, input: InputId) -> Result<(), PanelError> {
        let result = self.reconciler.lock().await.switch_input(id, input).await;
        self.report_layout("switch input", result, |_| {
            format!("Layer {} bound to input {}", id.0, input.0)
        })
    }

    pub async fn arrange_layers(&self, canvas_width: u32, padding: u32) -> Result<(), PanelError> {
        let result = self
            .reconciler
            .lock()
            .await
            .arrange_grid(canvas_width, padding)
            .await;
        self.report_layout("arrange", result, |_| "Layers auto-arranged".to_string())
    }

    fn report<T>(
        &self,
        action: &str,
        result: Result<T, Failure>,
        success_line: String,
    ) -> Result<T, Failure> {
        match &result {
            Ok(_) => {
                let _ = self.events.send(PanelEvent::Status(success_line));
            }
            Err(failure) => {
                let _ = self.events.send(PanelEvent::ActionFailed {
                    action: action.to_string(),
                    failure: failure.clone(),
                });
            }
        }
        result
    }

    fn report_layout<T>(
        &self,
        action: &str,
        result: Result<T, PanelError>,
        success_line: impl FnOnce(&T) -> String,
    ) -> Result<T, PanelError> {
        match &result {
            Ok(value) => {
                let _ = self.events.send(PanelEvent::Status(success_line(value)));
            }
            Err(PanelError::Gateway(failure)) => {
                let _ = self.events.send(PanelEvent::ActionFailed {
                    action: action.to_string(),
                    failure: failure.clone(),
                });
            }
            Err(_) => {}
        }
        result
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
