use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Стабильный идентификатор окна, выдаваемый оконным бэкендом
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Позиция окна в пикселях (левый верхний угол)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

impl WindowPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Сместить позицию на вектор привязки
    pub fn offset_by(self, offset: SnapOffset) -> Self {
        Self {
            x: self.x + offset.dx,
            y: self.y + offset.dy,
        }
    }
}

impl fmt::Display for WindowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Размер окна в пикселях
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: i32,
    pub height: i32,
}

impl WindowSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Вектор от левого верхнего угла главного окна до прилипшего окна.
/// Имеет смысл только пока окно прилипло; пересчитывается при каждой привязке.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapOffset {
    pub dx: i32,
    pub dy: i32,
}

impl SnapOffset {
    /// Вектор из `origin` в `point`
    pub fn between(origin: WindowPosition, point: WindowPosition) -> Self {
        Self {
            dx: point.x - origin.x,
            dy: point.y - origin.y,
        }
    }
}

/// Сторона или угол главного окна, к которому прилипло окно
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapEdge {
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl SnapEdge {
    #[allow(dead_code)]
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            SnapEdge::TopLeft | SnapEdge::TopRight | SnapEdge::BottomLeft | SnapEdge::BottomRight
        )
    }
}

impl fmt::Display for SnapEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Событие перемещения окна, нормализованное мостом событий
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMoveEvent {
    pub window: WindowId,
    pub position: WindowPosition,
    pub timestamp: Instant,
}

impl WindowMoveEvent {
    pub fn new(window: WindowId, position: WindowPosition) -> Self {
        Self {
            window,
            position,
            timestamp: Instant::now(),
        }
    }
}

impl fmt::Display for WindowMoveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}ms ago)",
            self.window,
            self.position,
            self.timestamp.elapsed().as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_offset() {
        let pos = WindowPosition::new(100, 200);
        let moved = pos.offset_by(SnapOffset { dx: 30, dy: -15 });
        assert_eq!(moved, WindowPosition::new(130, 185));
    }

    #[test]
    fn test_offset_between() {
        let primary = WindowPosition::new(100, 100);
        let window = WindowPosition::new(800, 140);
        let offset = SnapOffset::between(primary, window);
        assert_eq!(offset, SnapOffset { dx: 700, dy: 40 });
        assert_eq!(primary.offset_by(offset), window);
    }

    #[test]
    fn test_snap_edge_corners() {
        assert!(SnapEdge::TopRight.is_corner());
        assert!(SnapEdge::BottomLeft.is_corner());
        assert!(!SnapEdge::Right.is_corner());
        assert!(!SnapEdge::None.is_corner());
    }

    #[test]
    fn test_move_event_creation() {
        let event = WindowMoveEvent::new(WindowId(7), WindowPosition::new(1, 2));
        assert_eq!(event.window, WindowId(7));
        assert_eq!(event.position, WindowPosition::new(1, 2));
    }
}
