use crate::events::{SnapEdge, SnapOffset, WindowId, WindowPosition, WindowSize};
use crate::services::window_layer::SubscriptionId;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::threshold::adaptive_threshold;

/// Отслеживаемое состояние одного вспомогательного окна
#[derive(Debug, Clone)]
pub(super) struct TrackedWindow {
    pub is_snapped: bool,
    pub snap_edge: SnapEdge,
    /// Вектор от главного окна; осмыслен только пока is_snapped
    pub snap_offset: SnapOffset,
    /// Последняя позиция, которую движок наблюдал или установил
    pub last_position: WindowPosition,
    pub last_move: Instant,
}

impl TrackedWindow {
    pub fn new(initial_position: WindowPosition) -> Self {
        Self {
            is_snapped: false,
            snap_edge: SnapEdge::None,
            snap_offset: SnapOffset::default(),
            last_position: initial_position,
            last_move: Instant::now(),
        }
    }

    pub fn attach(&mut self, edge: SnapEdge, offset: SnapOffset) {
        self.is_snapped = true;
        self.snap_edge = edge;
        self.snap_offset = offset;
    }

    pub fn detach(&mut self) {
        self.is_snapped = false;
        self.snap_edge = SnapEdge::None;
    }
}

/// Кэш геометрии главного окна
#[derive(Debug, Clone, Copy)]
pub(super) struct PrimaryGeometry {
    pub position: WindowPosition,
    pub size: WindowSize,
}

/// Всё разделяемое состояние движка под единственным мьютексом.
/// Запросы геометрии к оконному слою не выполняются под этим мьютексом
pub(super) struct SnapState {
    pub snap_enabled: bool,
    pub windows: HashMap<WindowId, TrackedWindow>,
    pub primary_id: Option<WindowId>,
    pub primary: Option<PrimaryGeometry>,
    /// Кэш размеров вспомогательных окон
    pub size_cache: HashMap<WindowId, WindowSize>,
    /// Окна, для которых сейчас выполняется программная запись позиции
    pub updating: HashSet<WindowId>,
    pub move_subscriptions: HashMap<WindowId, SubscriptionId>,
    pub primary_subscription: Option<SubscriptionId>,
}

impl SnapState {
    pub fn new(snap_enabled: bool) -> Self {
        Self {
            snap_enabled,
            windows: HashMap::new(),
            primary_id: None,
            primary: None,
            size_cache: HashMap::new(),
            updating: HashSet::new(),
            move_subscriptions: HashMap::new(),
            primary_subscription: None,
        }
    }

    /// Текущий адаптивный порог по кэшированной ширине главного окна
    pub fn threshold(&self) -> i32 {
        adaptive_threshold(self.primary.map(|p| p.size.width).unwrap_or(0))
    }

    /// Снять привязку со всех окон, не перемещая их
    pub fn clear_attachments(&mut self) {
        for window in self.windows.values_mut() {
            if window.is_snapped {
                window.detach();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_window_invariant() {
        let mut window = TrackedWindow::new(WindowPosition::new(10, 20));
        assert!(!window.is_snapped);
        assert_eq!(window.snap_edge, SnapEdge::None);

        window.attach(SnapEdge::Right, SnapOffset { dx: 700, dy: 40 });
        assert!(window.is_snapped);
        assert_ne!(window.snap_edge, SnapEdge::None);

        window.detach();
        assert!(!window.is_snapped);
        assert_eq!(window.snap_edge, SnapEdge::None);
    }

    #[test]
    fn test_clear_attachments_keeps_positions() {
        let mut state = SnapState::new(true);
        let mut snapped = TrackedWindow::new(WindowPosition::new(800, 100));
        snapped.attach(SnapEdge::Right, SnapOffset { dx: 700, dy: 0 });
        state.windows.insert(WindowId(1), snapped);
        state
            .windows
            .insert(WindowId(2), TrackedWindow::new(WindowPosition::new(0, 0)));

        state.clear_attachments();

        for window in state.windows.values() {
            assert!(!window.is_snapped);
            assert_eq!(window.snap_edge, SnapEdge::None);
        }
        assert_eq!(
            state.windows[&WindowId(1)].last_position,
            WindowPosition::new(800, 100)
        );
    }

    #[test]
    fn test_threshold_without_primary() {
        let state = SnapState::new(true);
        assert_eq!(state.threshold(), 8);
    }
}
