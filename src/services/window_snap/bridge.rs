use crate::events::{WindowId, WindowMoveEvent};
use crate::services::window_layer::{MoveCallback, SubscriptionId, WindowLayer};
use std::sync::{Arc, Weak};

use super::engine::SnapEngine;

/// Мост событий: превращает сырые уведомления оконного слоя в
/// нормализованные события движка. Колбэки держат слабую ссылку,
/// чтобы забытая подписка не продлевала жизнь движку
pub(super) fn install_secondary_listener(
    layer: &Arc<dyn WindowLayer>,
    engine: Weak<SnapEngine>,
    id: WindowId,
) -> SubscriptionId {
    let callback: MoveCallback = Arc::new(move |position| {
        if let Some(engine) = engine.upgrade() {
            engine.on_secondary_moved(WindowMoveEvent::new(id, position));
        }
    });
    layer.subscribe_moves(id, callback)
}

pub(super) fn install_primary_listener(
    layer: &Arc<dyn WindowLayer>,
    engine: Weak<SnapEngine>,
    id: WindowId,
) -> SubscriptionId {
    let callback: MoveCallback = Arc::new(move |position| {
        if let Some(engine) = engine.upgrade() {
            engine.on_primary_moved(WindowMoveEvent::new(id, position));
        }
    });
    layer.subscribe_moves(id, callback)
}
