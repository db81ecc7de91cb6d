use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{SnapEdge, SnapOffset, WindowId, WindowMoveEvent, WindowPosition, WindowSize};
use crate::services::settings::{SettingsService, WatchHandle};
use crate::services::window_layer::WindowLayer;
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

use super::bridge;
use super::registry::{PrimaryGeometry, SnapState, TrackedWindow};
use super::sync;
use super::threshold::corner_threshold;

/// События чаще этого интервала считаются дублями и не запускают
/// оценку прилипания
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(30);

/// Большой скачок позиции в пределах этого интервала считается
/// пользовательским перетаскиванием, а не артефактом пересинхронизации
const DRAG_DETECTION_WINDOW: Duration = Duration::from_millis(40);

/// Движок прилипания окон: держит вспомогательные окна притянутыми к
/// главному окну и отличает пересинхронизацию от намеренного отрыва
pub struct SnapEngine {
    layer: Arc<dyn WindowLayer>,
    primary_name: String,
    state: Mutex<SnapState>,
    config_watch: Mutex<Option<WatchHandle>>,
    self_ref: Weak<SnapEngine>,
}

impl SnapEngine {
    pub fn new(layer: Arc<dyn WindowLayer>, primary_name: String, snap_enabled: bool) -> Arc<Self> {
        info!(
            "Инициализация SnapEngine (главное окно: '{}', прилипание: {})",
            primary_name, snap_enabled
        );

        Arc::new_cyclic(|self_ref| Self {
            layer,
            primary_name,
            state: Mutex::new(SnapState::new(snap_enabled)),
            config_watch: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// Привязать движок к изменениям настройки snap.enabled.
    /// Отсутствующее значение трактуется как выключенное прилипание
    pub fn watch_settings(&self, settings: &Arc<SettingsService>) {
        let weak = self.self_ref.clone();
        let handle = settings.watch_snap_enabled(Box::new(move |_old, new| {
            if let Some(engine) = weak.upgrade() {
                engine.set_snap_enabled(new.unwrap_or(false));
            }
        }));
        *self.config_watch.lock() = Some(handle);
    }

    /// Поставить окно на учёт и подписаться на его перемещения.
    /// Первое окно лениво активирует слушатель главного окна
    pub fn register(&self, id: WindowId) -> Result<()> {
        // Начальная позиция запрашивается до захвата мьютекса
        let initial_position = self.layer.position(id)?;

        let mut state = self.state.lock();
        if state.windows.contains_key(&id) {
            return Ok(());
        }
        state.windows.insert(id, TrackedWindow::new(initial_position));

        let layer = self.layer.clone();
        let engine_ref = self.self_ref.clone();
        let subscription = MutexGuard::unlocked(&mut state, || {
            bridge::install_secondary_listener(&layer, engine_ref, id)
        });

        // Окно могло быть снято с учёта, пока мьютекс был отпущен
        if !state.windows.contains_key(&id) {
            let layer = self.layer.clone();
            MutexGuard::unlocked(&mut state, || layer.unsubscribe(subscription));
            return Ok(());
        }
        state.move_subscriptions.insert(id, subscription);

        // Ленивая активация: слушатель главного окна появляется вместе
        // с первым учтённым окном
        if state.windows.len() == 1 {
            self.setup_primary_locked(&mut state);
        }

        self.refresh_size_cache_locked(&mut state, id);

        info!("Окно {} поставлено на учёт в {}", id, initial_position);
        Ok(())
    }

    /// Снять окно с учёта. Последнее окно уносит с собой слушатель
    /// главного. Повторный вызов безопасен
    pub fn unregister(&self, id: WindowId) {
        let mut state = self.state.lock();

        if let Some(subscription) = state.move_subscriptions.remove(&id) {
            let layer = self.layer.clone();
            MutexGuard::unlocked(&mut state, || layer.unsubscribe(subscription));
        }

        state.windows.remove(&id);
        state.size_cache.remove(&id);
        state.updating.remove(&id);

        if state.windows.is_empty() {
            if let Some(subscription) = state.primary_subscription.take() {
                let layer = self.layer.clone();
                MutexGuard::unlocked(&mut state, || layer.unsubscribe(subscription));
            }
            state.primary_id = None;
        }

        debug!("Окно {} снято с учёта", id);
    }

    /// Включить или выключить прилипание. Выключение снимает привязку
    /// со всех окон, не перемещая их; включение ничего не притягивает
    pub fn set_snap_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        if state.snap_enabled == enabled {
            return;
        }

        state.snap_enabled = enabled;
        if !enabled {
            state.clear_attachments();
        }

        info!(
            "Прилипание окон {}",
            if enabled { "включено" } else { "выключено" }
        );
    }

    /// Текущий адаптивный порог прилипания в пикселях
    pub fn current_threshold(&self) -> i32 {
        self.state.lock().threshold()
    }

    /// Принудительно обновить кэш геометрии главного окна
    pub fn refresh_primary_cache(&self) {
        let mut state = self.state.lock();
        self.refresh_primary_cache_locked(&mut state);
    }

    /// Освободить подписки на события и изменения конфигурации.
    /// Безопасно вызывать повторно и без учтённых окон
    pub fn shutdown(&self) {
        if let Some(handle) = self.config_watch.lock().take() {
            handle.cancel();
        }

        let mut state = self.state.lock();
        let subscriptions: Vec<_> = state
            .move_subscriptions
            .drain()
            .map(|(_, subscription)| subscription)
            .collect();
        let primary_subscription = state.primary_subscription.take();

        let layer = self.layer.clone();
        MutexGuard::unlocked(&mut state, || {
            for subscription in subscriptions {
                layer.unsubscribe(subscription);
            }
            if let Some(subscription) = primary_subscription {
                layer.unsubscribe(subscription);
            }
        });

        state.windows.clear();
        state.size_cache.clear();
        state.updating.clear();
        state.primary_id = None;

        info!("SnapEngine остановлен");
    }

    /// Главное окно переместилось: обновить кэш геометрии и подтянуть
    /// прилипшие окна. Оценка прилипания свободных окон не выполняется
    pub(super) fn on_primary_moved(&self, event: WindowMoveEvent) {
        let mut state = self.state.lock();
        if !state.snap_enabled {
            return;
        }

        debug_if_enabled!("Главное окно переместилось: {}", event);

        // Размер запрашивается с отпущенным мьютексом; при неудаче
        // используется прежний кэшированный размер
        let layer = self.layer.clone();
        let primary_id = event.window;
        let size = MutexGuard::unlocked(&mut state, || layer.size(primary_id).ok())
            .or_else(|| state.primary.map(|p| p.size));
        let Some(size) = size else { return };

        state.primary = Some(PrimaryGeometry {
            position: event.position,
            size,
        });

        sync::resync_snapped(&self.layer, &mut state);
    }

    /// Вспомогательное окно переместилось: решить, привязать его,
    /// отвязать или оставить как есть
    pub(super) fn on_secondary_moved(&self, event: WindowMoveEvent) {
        let id = event.window;
        let position = event.position;

        let mut state = self.state.lock();
        if !state.snap_enabled {
            return;
        }

        // Эхо собственной программной записи
        if state.updating.contains(&id) {
            return;
        }

        let (was_snapped, elapsed) = {
            let Some(window) = state.windows.get_mut(&id) else {
                return;
            };
            // Реального перемещения не было
            if position == window.last_position {
                return;
            }
            let elapsed = event.timestamp.saturating_duration_since(window.last_move);
            window.last_move = event.timestamp;
            (window.is_snapped, elapsed)
        };

        debug_if_enabled!("Окно переместилось: {} (Δt {}мс)", event, elapsed.as_millis());

        if was_snapped {
            self.handle_snapped_locked(&mut state, id, position, elapsed);
        } else {
            self.handle_unsnapped_locked(&mut state, id, position, elapsed);
        }
    }

    /// Прилипшее окно: большой и быстрый уход от ожидаемой позиции
    /// означает намеренный отрыв пользователем
    fn handle_snapped_locked(
        &self,
        state: &mut SnapState,
        id: WindowId,
        position: WindowPosition,
        elapsed: Duration,
    ) {
        let threshold = state.threshold();

        let expected = state.primary.and_then(|primary| {
            state
                .windows
                .get(&id)
                .map(|window| primary.position.offset_by(window.snap_offset))
        });

        if let Some(expected) = expected {
            // Расстояние Чебышёва от ожидаемой позиции
            let distance = (position.x - expected.x)
                .abs()
                .max((position.y - expected.y).abs());

            if distance > threshold && elapsed < DRAG_DETECTION_WINDOW {
                if let Some(window) = state.windows.get_mut(&id) {
                    info!("Окно {} оторвано перетаскиванием (уход {}px)", id, distance);
                    window.detach();
                }
            }
        }

        // Прилипшее окно всегда отслеживает наблюдаемую позицию, чтобы
        // не бороться с пользователем посреди перетаскивания
        if let Some(window) = state.windows.get_mut(&id) {
            window.last_position = position;
        }
    }

    /// Свободное окно: после защиты от дребезга оценить кандидатов
    /// прилипания и при попадании в порог притянуть окно
    fn handle_unsnapped_locked(
        &self,
        state: &mut MutexGuard<'_, SnapState>,
        id: WindowId,
        position: WindowPosition,
        elapsed: Duration,
    ) {
        if elapsed < DEBOUNCE_WINDOW {
            if let Some(window) = state.windows.get_mut(&id) {
                window.last_position = position;
            }
            return;
        }

        // Кэш главного окна заполняется при первом использовании
        if state.primary.is_none() {
            self.refresh_primary_cache_locked(state);
        }

        let window_size = self.cached_size_locked(state, id);

        // Пока мьютекс отпускался, окно могло исчезнуть
        let (Some(primary), Some(window_size)) = (state.primary, window_size) else {
            if let Some(window) = state.windows.get_mut(&id) {
                window.last_position = position;
            }
            return;
        };

        let threshold = state.threshold();
        let Some(edge) = best_snap_candidate(&primary, position, window_size, threshold) else {
            if let Some(window) = state.windows.get_mut(&id) {
                window.last_position = position;
            }
            return;
        };

        let target = snap_target(edge, &primary, position, window_size);
        let offset = SnapOffset::between(primary.position, target);

        {
            let Some(window) = state.windows.get_mut(&id) else {
                return;
            };
            window.attach(edge, offset);
        }

        info!("Окно {} прилипло к {} в {}", id, edge, target);
        sync::apply_position(&self.layer, state, id, target);
    }

    /// Разрешить главное окно и обновить кэш его геометрии.
    /// Все запросы к слою выполняются с отпущенным мьютексом
    fn refresh_primary_cache_locked(&self, state: &mut MutexGuard<'_, SnapState>) {
        let layer = self.layer.clone();
        let primary_name = self.primary_name.clone();
        let known_id = state.primary_id;

        let refreshed = MutexGuard::unlocked(state, || {
            let id = match known_id {
                Some(id) => id,
                None => layer.resolve(&primary_name).ok()?,
            };
            let position = layer.position(id).ok()?;
            let size = layer.size(id).ok()?;
            Some((id, position, size))
        });

        let Some((id, position, size)) = refreshed else {
            debug!("Главное окно '{}' недоступно", self.primary_name);
            return;
        };

        state.primary_id = Some(id);
        state.primary = Some(PrimaryGeometry { position, size });
    }

    /// Слушатель главного окна; вызывается при постановке на учёт
    /// первого окна
    fn setup_primary_locked(&self, state: &mut MutexGuard<'_, SnapState>) {
        if state.primary_subscription.is_some() {
            return;
        }

        self.refresh_primary_cache_locked(state);
        let Some(primary_id) = state.primary_id else {
            return;
        };

        let layer = self.layer.clone();
        let engine_ref = self.self_ref.clone();
        let subscription = MutexGuard::unlocked(state, || {
            bridge::install_primary_listener(&layer, engine_ref, primary_id)
        });
        state.primary_subscription = Some(subscription);
    }

    /// Размер окна из кэша; при промахе выполняется живой запрос
    fn cached_size_locked(
        &self,
        state: &mut MutexGuard<'_, SnapState>,
        id: WindowId,
    ) -> Option<WindowSize> {
        if let Some(size) = state.size_cache.get(&id) {
            return Some(*size);
        }

        let layer = self.layer.clone();
        let size = MutexGuard::unlocked(state, || layer.size(id).ok())?;
        state.size_cache.insert(id, size);
        Some(size)
    }

    /// Обновить кэш размера окна живым запросом
    fn refresh_size_cache_locked(&self, state: &mut MutexGuard<'_, SnapState>, id: WindowId) {
        let layer = self.layer.clone();
        if let Some(size) = MutexGuard::unlocked(state, || layer.size(id).ok()) {
            state.size_cache.insert(id, size);
        }
    }
}

/// Выбрать кандидата прилипания для позиции окна.
/// Углы имеют абсолютный приоритет над гранями; среди подходящих
/// побеждает меньшее расстояние
fn best_snap_candidate(
    primary: &PrimaryGeometry,
    position: WindowPosition,
    size: WindowSize,
    threshold: i32,
) -> Option<SnapEdge> {
    let corner_limit = corner_threshold(threshold);

    let main_left = primary.position.x;
    let main_top = primary.position.y;
    let main_right = main_left + primary.size.width;
    let main_bottom = main_top + primary.size.height;

    let window_left = position.x;
    let window_top = position.y;
    let window_right = window_left + size.width;
    let window_bottom = window_top + size.height;

    // Углы: евклидово расстояние по двум компонентам зазора
    let corner_checks = [
        (SnapEdge::TopRight, main_right - window_left, main_top - window_bottom),
        (SnapEdge::BottomRight, main_right - window_left, main_bottom - window_top),
        (SnapEdge::BottomLeft, main_left - window_right, main_bottom - window_top),
        (SnapEdge::TopLeft, main_left - window_right, main_top - window_bottom),
    ];

    let mut best: Option<(SnapEdge, f64)> = None;
    for (edge, dx, dy) in corner_checks {
        let (dx, dy) = (f64::from(dx), f64::from(dy));
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= corner_limit && best.map_or(true, |(_, d)| distance < d) {
            best = Some((edge, distance));
        }
    }
    if let Some((edge, _)) = best {
        return Some(edge);
    }

    // Грани: абсолютный зазор по выравниваемой оси, перпендикулярная
    // ось не учитывается
    let edge_checks = [
        (SnapEdge::Right, (main_right - window_left).abs()),
        (SnapEdge::Left, (main_left - window_right).abs()),
        (SnapEdge::Bottom, (main_bottom - window_top).abs()),
        (SnapEdge::Top, (main_top - window_bottom).abs()),
    ];

    let mut best: Option<(SnapEdge, i32)> = None;
    for (edge, distance) in edge_checks {
        if distance <= threshold && best.map_or(true, |(_, d)| distance < d) {
            best = Some((edge, distance));
        }
    }
    best.map(|(edge, _)| edge)
}

/// Точная позиция окна для выбранной грани или угла
fn snap_target(
    edge: SnapEdge,
    primary: &PrimaryGeometry,
    current: WindowPosition,
    size: WindowSize,
) -> WindowPosition {
    let main = primary.position;
    let main_width = primary.size.width;
    let main_height = primary.size.height;

    match edge {
        SnapEdge::Right => WindowPosition::new(main.x + main_width, current.y),
        SnapEdge::Left => WindowPosition::new(main.x - size.width, current.y),
        SnapEdge::Bottom => WindowPosition::new(current.x, main.y + main_height),
        SnapEdge::Top => WindowPosition::new(current.x, main.y - size.height),
        SnapEdge::TopRight => WindowPosition::new(main.x + main_width, main.y - size.height),
        SnapEdge::BottomRight => WindowPosition::new(main.x + main_width, main.y + main_height),
        SnapEdge::BottomLeft => WindowPosition::new(main.x - size.width, main.y + main_height),
        SnapEdge::TopLeft => WindowPosition::new(main.x - size.width, main.y - size.height),
        SnapEdge::None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::window_layer::DryRunLayer;
    use std::time::Instant;

    /// Главное окно (100, 100) 700×800, вспомогательное 420×360 в (900, 500)
    fn setup() -> (Arc<DryRunLayer>, Arc<SnapEngine>, WindowId, WindowId) {
        let layer = Arc::new(DryRunLayer::new());
        let primary = layer.add_window(
            "primary",
            WindowPosition::new(100, 100),
            WindowSize::new(700, 800),
        );
        let secondary = layer.add_window(
            "secondary",
            WindowPosition::new(900, 500),
            WindowSize::new(420, 360),
        );

        let dyn_layer: Arc<dyn WindowLayer> = layer.clone();
        let engine = SnapEngine::new(dyn_layer, "primary".to_string(), true);
        engine.register(secondary).unwrap();

        (layer, engine, primary, secondary)
    }

    fn event_at(id: WindowId, x: i32, y: i32, at: Instant) -> WindowMoveEvent {
        WindowMoveEvent {
            window: id,
            position: WindowPosition::new(x, y),
            timestamp: at,
        }
    }

    /// Инвариант: is_snapped тогда и только тогда, когда грань задана
    fn assert_invariant(engine: &SnapEngine) {
        let state = engine.state.lock();
        for (id, window) in &state.windows {
            assert_eq!(
                window.is_snapped,
                window.snap_edge != SnapEdge::None,
                "инвариант нарушен для окна {}",
                id
            );
        }
    }

    fn snap_state(engine: &SnapEngine, id: WindowId) -> (bool, SnapEdge, SnapOffset) {
        let state = engine.state.lock();
        let window = &state.windows[&id];
        (window.is_snapped, window.snap_edge, window.snap_offset)
    }

    #[test]
    fn test_register_primes_caches_and_primary() {
        let (_layer, engine, _primary, _secondary) = setup();
        let state = engine.state.lock();
        assert!(state.primary.is_some());
        assert!(state.primary_subscription.is_some());
        assert_eq!(state.windows.len(), 1);
        drop(state);
        assert_eq!(engine.current_threshold(), 17);
    }

    #[test]
    fn test_register_is_idempotent() {
        let (_layer, engine, _primary, secondary) = setup();
        engine.register(secondary).unwrap();
        let state = engine.state.lock();
        assert_eq!(state.windows.len(), 1);
        assert_eq!(state.move_subscriptions.len(), 1);
    }

    #[test]
    fn test_scenario_right_edge_snap_preserves_y() {
        let (layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);

        // 5px правее правой грани главного окна (x=800), по вертикали
        // внутри главного окна
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        let (is_snapped, edge, offset) = snap_state(&engine, secondary);
        assert!(is_snapped);
        assert_eq!(edge, SnapEdge::Right);
        assert_eq!(offset, SnapOffset { dx: 700, dy: 200 });
        assert_eq!(
            layer.position(secondary).unwrap(),
            WindowPosition::new(800, 300)
        );
        assert_invariant(&engine);
    }

    #[test]
    fn test_scenario_corner_beats_edge() {
        let (layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);

        // 10px по обеим осям от верхнего правого угла (800, 100):
        // порог грани (17) тоже задет, но угол побеждает
        engine.on_secondary_moved(event_at(secondary, 810, -250, t));

        let (is_snapped, edge, _) = snap_state(&engine, secondary);
        assert!(is_snapped);
        assert_eq!(edge, SnapEdge::TopRight);
        assert_eq!(
            layer.position(secondary).unwrap(),
            WindowPosition::new(800, -260)
        );
        assert_invariant(&engine);
    }

    #[test]
    fn test_scenario_fast_drag_detaches() {
        let (_layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        // Скачок на 50px за 20мс: намеренный отрыв
        engine.on_secondary_moved(event_at(secondary, 850, 350, t + Duration::from_millis(20)));

        let (is_snapped, edge, _) = snap_state(&engine, secondary);
        assert!(!is_snapped);
        assert_eq!(edge, SnapEdge::None);
        assert_invariant(&engine);
    }

    #[test]
    fn test_scenario_slow_drift_stays_snapped() {
        let (layer, engine, primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        // Тот же уход на 50px, но за 200мс: привязка сохраняется
        engine.on_secondary_moved(event_at(secondary, 850, 350, t + Duration::from_millis(200)));

        let (is_snapped, edge, offset) = snap_state(&engine, secondary);
        assert!(is_snapped);
        assert_eq!(edge, SnapEdge::Right);
        assert_eq!(offset, SnapOffset { dx: 700, dy: 200 });

        // Следующее перемещение главного окна возвращает окно к
        // ожидаемой позиции
        engine.on_primary_moved(event_at(primary, 100, 100, t + Duration::from_millis(300)));
        assert_eq!(
            layer.position(secondary).unwrap(),
            WindowPosition::new(800, 300)
        );
        assert_invariant(&engine);
    }

    #[test]
    fn test_small_fast_jitter_stays_snapped() {
        let (_layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        // Быстро, но в пределах порога: не отрыв
        engine.on_secondary_moved(event_at(secondary, 805, 305, t + Duration::from_millis(10)));

        let (is_snapped, _, _) = snap_state(&engine, secondary);
        assert!(is_snapped);
    }

    #[test]
    fn test_scenario_primary_move_drags_snapped_only() {
        let (layer, engine, primary, first) = setup();
        let second = layer.add_window(
            "second",
            WindowPosition::new(1400, 700),
            WindowSize::new(420, 360),
        );
        engine.register(second).unwrap();

        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(first, 805, 300, t));

        // Главное окно уходит на (+30, +15)
        engine.on_primary_moved(event_at(primary, 130, 115, t + Duration::from_millis(50)));

        assert_eq!(
            layer.position(first).unwrap(),
            WindowPosition::new(830, 315)
        );
        // Свободное окно главный не трогает
        assert_eq!(
            layer.position(second).unwrap(),
            WindowPosition::new(1400, 700)
        );
        assert_invariant(&engine);
    }

    #[test]
    fn test_duplicate_position_is_ignored() {
        let (_layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);

        engine.on_secondary_moved(event_at(secondary, 500, 500, t));
        let last_move_after_first = engine.state.lock().windows[&secondary].last_move;

        // Та же позиция ещё раз: событие полностью игнорируется
        engine.on_secondary_moved(event_at(secondary, 500, 500, t + Duration::from_millis(100)));
        let state = engine.state.lock();
        assert_eq!(state.windows[&secondary].last_move, last_move_after_first);
        assert_eq!(
            state.windows[&secondary].last_position,
            WindowPosition::new(500, 500)
        );
    }

    #[test]
    fn test_reentrancy_guard_suppresses_echo() {
        let (_layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);

        engine.state.lock().updating.insert(secondary);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        // Событие-эхо не дошло до оценки прилипания
        let (is_snapped, edge, _) = snap_state(&engine, secondary);
        assert!(!is_snapped);
        assert_eq!(edge, SnapEdge::None);
        engine.state.lock().updating.remove(&secondary);
    }

    #[test]
    fn test_primary_resync_echo_does_not_reevaluate() {
        let (_layer, engine, primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        let last_move_before = engine.state.lock().windows[&secondary].last_move;

        // Пересинхронизация выдаёт программную запись; её эхо обязано
        // быть подавлено и не трогать историю перемещений
        engine.on_primary_moved(event_at(primary, 160, 130, t + Duration::from_millis(50)));

        let state = engine.state.lock();
        let window = &state.windows[&secondary];
        assert_eq!(window.last_move, last_move_before);
        assert!(window.is_snapped);
        assert_eq!(window.last_position, WindowPosition::new(860, 330));
    }

    #[test]
    fn test_debounce_skips_snap_evaluation() {
        let (layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);

        engine.on_secondary_moved(event_at(secondary, 400, 950, t));

        // Через 10мс окно у грани, но событие попадает в окно дребезга
        engine.on_secondary_moved(event_at(secondary, 805, 300, t + Duration::from_millis(10)));
        let (is_snapped, _, _) = snap_state(&engine, secondary);
        assert!(!is_snapped);

        // Спустя нормальный интервал оценка срабатывает
        engine.on_secondary_moved(event_at(secondary, 806, 310, t + Duration::from_millis(200)));
        let (is_snapped, edge, _) = snap_state(&engine, secondary);
        assert!(is_snapped);
        assert_eq!(edge, SnapEdge::Right);
        assert_eq!(
            layer.position(secondary).unwrap(),
            WindowPosition::new(800, 310)
        );
    }

    #[test]
    fn test_free_move_outside_threshold() {
        let (layer, engine, _primary, secondary) = setup();
        let t = Instant::now() + Duration::from_millis(100);

        engine.on_secondary_moved(event_at(secondary, 1200, 40, t));

        let (is_snapped, edge, _) = snap_state(&engine, secondary);
        assert!(!is_snapped);
        assert_eq!(edge, SnapEdge::None);
        // Окно не перемещалось программно
        assert_eq!(
            layer.position(secondary).unwrap(),
            WindowPosition::new(900, 500)
        );
        let state = engine.state.lock();
        assert_eq!(
            state.windows[&secondary].last_position,
            WindowPosition::new(1200, 40)
        );
    }

    #[test]
    fn test_disable_clears_without_moving() {
        let (layer, engine, _primary, first) = setup();
        let second = layer.add_window(
            "second",
            WindowPosition::new(1400, 700),
            WindowSize::new(420, 360),
        );
        engine.register(second).unwrap();

        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(first, 805, 300, t));
        engine.on_secondary_moved(event_at(second, 803, 700, t));

        engine.set_snap_enabled(false);

        for id in [first, second] {
            let (is_snapped, edge, _) = snap_state(&engine, id);
            assert!(!is_snapped);
            assert_eq!(edge, SnapEdge::None);
        }
        // Позиции окон не изменились
        assert_eq!(layer.position(first).unwrap(), WindowPosition::new(800, 300));
        assert_eq!(
            layer.position(second).unwrap(),
            WindowPosition::new(800, 700)
        );

        // Повторное включение ничего не притягивает
        engine.set_snap_enabled(true);
        for id in [first, second] {
            let (is_snapped, _, _) = snap_state(&engine, id);
            assert!(!is_snapped);
        }
        assert_invariant(&engine);
    }

    #[test]
    fn test_disabled_engine_ignores_moves() {
        let (_layer, engine, _primary, secondary) = setup();
        engine.set_snap_enabled(false);

        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));

        let (is_snapped, _, _) = snap_state(&engine, secondary);
        assert!(!is_snapped);
    }

    #[test]
    fn test_threshold_floor_without_primary() {
        let layer = Arc::new(DryRunLayer::new());
        let secondary = layer.add_window(
            "secondary",
            WindowPosition::new(900, 500),
            WindowSize::new(420, 360),
        );

        let dyn_layer: Arc<dyn WindowLayer> = layer.clone();
        let engine = SnapEngine::new(dyn_layer, "primary".to_string(), true);
        engine.register(secondary).unwrap();

        // Главное окно не найдено: минимальный порог и никакого прилипания
        assert_eq!(engine.current_threshold(), 8);

        let t = Instant::now() + Duration::from_millis(100);
        engine.on_secondary_moved(event_at(secondary, 805, 300, t));
        let (is_snapped, _, _) = snap_state(&engine, secondary);
        assert!(!is_snapped);
        assert_eq!(
            engine.state.lock().windows[&secondary].last_position,
            WindowPosition::new(805, 300)
        );
    }

    #[test]
    fn test_unregister_tears_down_primary_listener() {
        let (_layer, engine, _primary, secondary) = setup();

        engine.unregister(secondary);

        let state = engine.state.lock();
        assert!(state.windows.is_empty());
        assert!(state.move_subscriptions.is_empty());
        assert!(state.primary_subscription.is_none());
        drop(state);

        // Повторное снятие с учёта безопасно
        engine.unregister(secondary);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (_layer, engine, _primary, _secondary) = setup();

        engine.shutdown();
        engine.shutdown();

        let state = engine.state.lock();
        assert!(state.windows.is_empty());
        assert!(state.move_subscriptions.is_empty());
        assert!(state.primary_subscription.is_none());
    }

    #[test]
    fn test_best_candidate_prefers_nearest_edge() {
        let primary = PrimaryGeometry {
            position: WindowPosition::new(100, 100),
            size: WindowSize::new(700, 800),
        };
        let size = WindowSize::new(420, 360);

        // У левой грани: window_right = x + 420 должен попасть к x=100
        let edge = best_snap_candidate(&primary, WindowPosition::new(-325, 400), size, 17);
        assert_eq!(edge, Some(SnapEdge::Left));

        // Ниже нижней грани (y=900)
        let edge = best_snap_candidate(&primary, WindowPosition::new(300, 910), size, 17);
        assert_eq!(edge, Some(SnapEdge::Bottom));

        // Вне порога
        let edge = best_snap_candidate(&primary, WindowPosition::new(300, 1000), size, 17);
        assert_eq!(edge, None);
    }

    #[test]
    fn test_snap_targets_have_zero_gap() {
        let primary = PrimaryGeometry {
            position: WindowPosition::new(100, 100),
            size: WindowSize::new(700, 800),
        };
        let size = WindowSize::new(420, 360);
        let current = WindowPosition::new(805, 300);

        assert_eq!(
            snap_target(SnapEdge::Right, &primary, current, size),
            WindowPosition::new(800, 300)
        );
        assert_eq!(
            snap_target(SnapEdge::Left, &primary, current, size),
            WindowPosition::new(-320, 300)
        );
        assert_eq!(
            snap_target(SnapEdge::Top, &primary, current, size),
            WindowPosition::new(805, -260)
        );
        assert_eq!(
            snap_target(SnapEdge::Bottom, &primary, current, size),
            WindowPosition::new(805, 900)
        );
        assert_eq!(
            snap_target(SnapEdge::BottomRight, &primary, current, size),
            WindowPosition::new(800, 900)
        );
        assert_eq!(
            snap_target(SnapEdge::TopLeft, &primary, current, size),
            WindowPosition::new(-320, -260)
        );
    }
}
