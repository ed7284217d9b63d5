//! Layout reconciler: canonical in-memory layer set, keyed by layer id.
//!
//! Keeps the rendered set consistent with the latest remote truth while a
//! gesture in progress is allowed to temporarily diverge. Reconciliation
//! is last-snapshot-wins for all non-gestural fields; there is no conflict
//! merge (single-operator tool).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use shared::domain::{InputId, Layer, LayerDraft, LayerId, LayerPatch, Position, ScreenId, Size};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{error::PanelError, gateway::ScreenGateway, PanelEvent};

pub struct LayoutReconciler {
    screen: ScreenId,
    gateway: Arc<dyn ScreenGateway>,
    layers: BTreeMap<LayerId, Layer>,
    /// Layers currently mid-gesture; their position/size are immune to
    /// snapshot overwrites until the gesture ends.
    active_gestures: HashSet<LayerId>,
    events: broadcast::Sender<PanelEvent>,
}

impl LayoutReconciler {
    pub fn new(
        screen: ScreenId,
        gateway: Arc<dyn ScreenGateway>,
        events: broadcast::Sender<PanelEvent>,
    ) -> Self {
        Self {
            screen,
            gateway,
            layers: BTreeMap::new(),
            active_gestures: HashSet::new(),
            events,
        }
    }

    pub fn screen(&self) -> &ScreenId {
        &self.screen
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total render order: highest z on top, ties broken by id.
    pub fn layers_in_render_order(&self) -> Vec<Layer> {
        let mut ordered: Vec<Layer> = self.layers.values().cloned().collect();
        ordered.sort_by_key(|layer| (layer.z_order, layer.id));
        ordered
    }

    /// Z-order for a layer that should land on top of everything.
    pub fn next_z_order(&self) -> i64 {
        self.layers
            .values()
            .map(|layer| layer.z_order)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Replaces the canonical set wholesale. Ids missing from the snapshot
    /// are dropped (remote deletion wins, gestures included); ids present
    /// are upserted, except that a mid-gesture layer keeps its locally
    /// held geometry so a background refresh cannot snap it back.
    pub fn apply_snapshot(&mut self, layers: Vec<Layer>) {
        let mut next: BTreeMap<LayerId, Layer> = BTreeMap::new();
        for mut layer in layers {
            if self.active_gestures.contains(&layer.id) {
                if let Some(held) = self.layers.get(&layer.id) {
                    layer.position = held.position;
                    layer.size = held.size;
                }
            }
            next.insert(layer.id, layer);
        }

        self.active_gestures.retain(|id| next.contains_key(id));
        let removed: Vec<LayerId> = self
            .layers
            .keys()
            .filter(|id| !next.contains_key(id))
            .copied()
            .collect();
        self.layers = next;

        for id in removed {
            debug!(layer = id.0, "layer gone from snapshot, dropping");
            let _ = self.events.send(PanelEvent::LayerRemoved(id));
        }
        let _ = self.events.send(PanelEvent::SnapshotApplied {
            screen: self.screen.clone(),
            layer_count: self.layers.len(),
        });
    }

    pub fn begin_gesture(&mut self, id: LayerId) -> Result<(), PanelError> {
        let layer = self.layers.get(&id).ok_or(PanelError::UnknownLayer(id))?;
        if layer.locked {
            return Err(PanelError::LockedLayer(id));
        }
        self.active_gestures.insert(id);
        Ok(())
    }

    /// Local-only geometry update during a gesture. Silently ignored when
    /// no gesture is active for the layer (it may have been deleted
    /// remotely mid-drag).
    pub fn gesture_move(&mut self, id: LayerId, position: Position) {
        if !self.active_gestures.contains(&id) {
            return;
        }
        if let Some(layer) = self.layers.get_mut(&id) {
            layer.position = position;
        }
    }

    pub fn gesture_resize(&mut self, id: LayerId, size: Size) {
        if !self.active_gestures.contains(&id) {
            return;
        }
        if let Some(layer) = self.layers.get_mut(&id) {
            layer.size = size;
        }
    }

    /// Ends the gesture and persists the final geometry with exactly one
    /// remote update, regardless of how many pointer samples came in. A
    /// commit for a gesture that no longer exists is a no-op.
    pub async fn end_gesture(&mut self, id: LayerId) -> Result<(), PanelError> {
        if !self.active_gestures.remove(&id) {
            return Ok(());
        }
        let Some(layer) = self.layers.get(&id).cloned() else {
            return Ok(());
        };
        let patch = LayerPatch {
            position: Some(layer.position),
            size: Some(layer.size),
            z_order: None,
        };
        let stored = self.gateway.update_layer(&self.screen, id, &patch).await?;
        self.store(stored);
        Ok(())
    }

    pub async fn bring_to_front(&mut self, id: LayerId) -> Result<(), PanelError> {
        if !self.layers.contains_key(&id) {
            return Err(PanelError::UnknownLayer(id));
        }
        let patch = LayerPatch {
            z_order: Some(self.next_z_order()),
            ..Default::default()
        };
        let stored = self.gateway.update_layer(&self.screen, id, &patch).await?;
        self.store(stored);
        Ok(())
    }

    /// Target layer drops to z = 1 and every other layer shifts up by one,
    /// preserving relative order. One remote update per affected layer;
    /// O(n) calls is fine for a rare, explicit action.
    pub async fn send_to_back(&mut self, id: LayerId) -> Result<(), PanelError> {
        if !self.layers.contains_key(&id) {
            return Err(PanelError::UnknownLayer(id));
        }
        let reassignments: Vec<(LayerId, i64)> = self
            .layers
            .values()
            .map(|layer| {
                if layer.id == id {
                    (layer.id, 1)
                } else {
                    (layer.id, layer.z_order + 1)
                }
            })
            .collect();

        for (layer_id, z_order) in reassignments {
            let patch = LayerPatch {
                z_order: Some(z_order),
                ..Default::default()
            };
            let stored = self
                .gateway
                .update_layer(&self.screen, layer_id, &patch)
                .await?;
            self.store(stored);
        }
        Ok(())
    }

    pub async fn create_layer(&mut self, draft: LayerDraft) -> Result<LayerId, PanelError> {
        let stored = self.gateway.create_layer(&self.screen, &draft).await?;
        let id = stored.id;
        self.store(stored);
        Ok(id)
    }

    pub async fn delete_layer(&mut self, id: LayerId) -> Result<(), PanelError> {
        if !self.layers.contains_key(&id) {
            return Err(PanelError::UnknownLayer(id));
        }
        self.gateway.delete_layer(&self.screen, id).await?;
        self.layers.remove(&id);
        self.active_gestures.remove(&id);
        let _ = self.events.send(PanelEvent::LayerRemoved(id));
        Ok(())
    }

    pub async fn switch_input(&mut self, id: LayerId, input: InputId) -> Result<(), PanelError> {
        if !self.layers.contains_key(&id) {
            return Err(PanelError::UnknownLayer(id));
        }
        self.gateway
            .switch_layer_input(&self.screen, id, input)
            .await?;
        if let Some(layer) = self.layers.get_mut(&id) {
            layer.input = Some(input);
            let _ = self.events.send(PanelEvent::LayerChanged(layer.clone()));
        }
        Ok(())
    }

    /// Direct absolute move outside a gesture (properties panel, console).
    /// Takes already-clamped coordinates; one remote call.
    pub async fn move_layer(&mut self, id: LayerId, position: Position) -> Result<(), PanelError> {
        self.check_editable(id)?;
        let patch = LayerPatch {
            position: Some(position),
            ..Default::default()
        };
        let stored = self.gateway.update_layer(&self.screen, id, &patch).await?;
        self.store(stored);
        Ok(())
    }

    pub async fn resize_layer(&mut self, id: LayerId, size: Size) -> Result<(), PanelError> {
        self.check_editable(id)?;
        let patch = LayerPatch {
            size: Some(size),
            ..Default::default()
        };
        let stored = self.gateway.update_layer(&self.screen, id, &patch).await?;
        self.store(stored);
        Ok(())
    }

    /// Keyboard nudge: relative move from the current position, clamped to
    /// the canvas origin. One remote call per nudge.
    pub async fn nudge_layer(&mut self, id: LayerId, dx: i32, dy: i32) -> Result<(), PanelError> {
        let current = self.check_editable(id)?;
        let target = Position::new((current.x + dx).max(0), (current.y + dy).max(0));
        self.move_layer(id, target).await
    }

    /// Row-flow auto-arrangement across the canvas width, in render order.
    /// Locked layers stay put; one remote call per layer that moves.
    pub async fn arrange_grid(&mut self, canvas_width: u32, padding: u32) -> Result<(), PanelError> {
        let mut cursor_x = padding as i64;
        let mut cursor_y = padding as i64;
        let mut row_height = 0u32;
        let right_edge = i64::from(canvas_width.saturating_sub(padding));

        let mut moves: Vec<(LayerId, Position)> = Vec::new();
        for layer in self.layers_in_render_order() {
            if layer.locked {
                continue;
            }
            let width = layer.size.width;
            if cursor_x + i64::from(width) > right_edge && cursor_x > i64::from(padding) {
                cursor_x = padding as i64;
                cursor_y += i64::from(row_height + padding);
                row_height = 0;
            }
            let target = Position::new(cursor_x as i32, cursor_y as i32);
            if layer.position != target {
                moves.push((layer.id, target));
            }
            cursor_x += i64::from(width + padding);
            row_height = row_height.max(layer.size.height);
        }

        for (layer_id, position) in moves {
            let patch = LayerPatch {
                position: Some(position),
                ..Default::default()
            };
            let stored = self
                .gateway
                .update_layer(&self.screen, layer_id, &patch)
                .await?;
            self.store(stored);
        }
        Ok(())
    }

    fn check_editable(&self, id: LayerId) -> Result<Position, PanelError> {
        let layer = self.layers.get(&id).ok_or(PanelError::UnknownLayer(id))?;
        if layer.locked {
            return Err(PanelError::LockedLayer(id));
        }
        Ok(layer.position)
    }

    fn store(&mut self, layer: Layer) {
        let _ = self.events.send(PanelEvent::LayerChanged(layer.clone()));
        self.layers.insert(layer.id, layer);
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
