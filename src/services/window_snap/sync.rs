use crate::events::{WindowId, WindowPosition};
use crate::services::window_layer::WindowLayer;
use parking_lot::MutexGuard;
use std::sync::Arc;
use tracing::warn;

use super::registry::SnapState;

/// Программная запись позиции с подавлением эха.
///
/// Порядок обязателен: пометить окно обновляемым, отпустить мьютекс,
/// выполнить запись в оконный слой, вернуть мьютекс, снять пометку.
/// Оконный слой может доставить событие перемещения синхронно из самой
/// записи, поэтому запись никогда не выполняется под мьютексом
pub(super) fn apply_position(
    layer: &Arc<dyn WindowLayer>,
    state: &mut MutexGuard<'_, SnapState>,
    id: WindowId,
    target: WindowPosition,
) {
    state.updating.insert(id);

    MutexGuard::unlocked(state, || {
        if let Err(e) = layer.set_position(id, target) {
            warn!("Не удалось переместить окно {}: {}", id, e);
        }
    });

    state.updating.remove(&id);

    // Окно могло быть снято с учёта, пока мьютекс был отпущен
    if let Some(window) = state.windows.get_mut(&id) {
        window.last_position = target;
    }
}

/// Подтянуть все прилипшие окна к новой позиции главного.
/// Цель каждого окна пересчитывается под мьютексом заново, так как
/// записи предыдущих окон отпускали его
pub(super) fn resync_snapped(layer: &Arc<dyn WindowLayer>, state: &mut MutexGuard<'_, SnapState>) {
    let snapped: Vec<WindowId> = state
        .windows
        .iter()
        .filter(|(_, window)| window.is_snapped)
        .map(|(id, _)| *id)
        .collect();

    for id in snapped {
        let Some(primary) = state.primary else { return };
        let Some(window) = state.windows.get(&id) else {
            continue;
        };
        if !window.is_snapped {
            continue;
        }

        let target = primary.position.offset_by(window.snap_offset);
        apply_position(layer, state, id, target);
    }
}
