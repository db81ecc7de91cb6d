use crate::config::Config;
use crate::error::{MagnetError, Result};
use crate::events::{WindowId, WindowPosition, WindowSize};
use std::sync::Arc;
use tracing::info;

/// Колбэк доставки нового положения окна
pub type MoveCallback = Arc<dyn Fn(WindowPosition) + Send + Sync>;

/// Идентификатор подписки на перемещения окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Trait for windowing backends.
///
/// The layer is responsible ONLY for talking to the window system:
/// resolving handles, querying/setting geometry and delivering "window
/// moved" notifications. It MUST NOT contain any snapping logic; all
/// attach/detach decisions are made exclusively by the snap engine.
#[async_trait::async_trait]
pub trait WindowLayer: Send + Sync {
    /// Проверить, что бэкенд работоспособен
    fn test(&self) -> Result<()>;

    /// Найти окно по логическому имени
    fn resolve(&self, name: &str) -> Result<WindowId>;

    /// Текущая позиция окна. Может блокироваться
    fn position(&self, id: WindowId) -> Result<WindowPosition>;

    /// Текущий размер окна. Может блокироваться
    fn size(&self, id: WindowId) -> Result<WindowSize>;

    /// Установить абсолютную позицию окна
    fn set_position(&self, id: WindowId, pos: WindowPosition) -> Result<()>;

    /// Подписаться на перемещения окна. Новая позиция доставляется асинхронно
    fn subscribe_moves(&self, id: WindowId, callback: MoveCallback) -> SubscriptionId;

    /// Отменить подписку. Безопасно вызывать с уже отменённой подпиской
    fn unsubscribe(&self, subscription: SubscriptionId);

    /// Цикл производства событий бэкенда
    async fn run(&self) -> Result<()>;
}

/// Factory function to create a window layer based on config and the dry_run flag
pub fn create_window_layer(config: &Config, dry_run: bool) -> Result<Arc<dyn WindowLayer>> {
    if dry_run || config.window.backend == "dry-run" {
        info!("Используем dry-run бэкенд окон");
        return Ok(Arc::new(super::dry_run::DryRunLayer::with_demo_windows(
            &config.window,
        )));
    }

    let poll_interval_ms = config.window.poll_interval_ms;

    match config.window.backend.as_str() {
        "xdotool" => {
            let layer = super::xdotool::XdotoolLayer::new(poll_interval_ms);
            layer.test()?;
            Ok(Arc::new(layer))
        }
        "sway" => {
            let layer = super::sway::SwayLayer::new(poll_interval_ms);
            layer.test()?;
            Ok(Arc::new(layer))
        }
        "auto" => detect_working_layer(poll_interval_ms),
        other => Err(MagnetError::Internal(format!(
            "Неизвестный бэкенд оконной системы: {}",
            other
        ))),
    }
}

/// Определить рабочий бэкенд по окружению сессии и пробным запускам
fn detect_working_layer(poll_interval_ms: u64) -> Result<Arc<dyn WindowLayer>> {
    info!("Определяем рабочий бэкенд оконной системы...");

    let wayland_session = std::env::var("XDG_SESSION_TYPE")
        .map(|s| s == "wayland")
        .unwrap_or(false);

    let sway = super::sway::SwayLayer::new(poll_interval_ms);
    let xdotool = super::xdotool::XdotoolLayer::new(poll_interval_ms);

    if wayland_session {
        if sway.test().is_ok() {
            info!("Используем sway");
            return Ok(Arc::new(sway));
        }
        if xdotool.test().is_ok() {
            info!("Используем xdotool");
            return Ok(Arc::new(xdotool));
        }
    } else {
        if xdotool.test().is_ok() {
            info!("Используем xdotool");
            return Ok(Arc::new(xdotool));
        }
        if sway.test().is_ok() {
            info!("Используем sway");
            return Ok(Arc::new(sway));
        }
    }

    Err(MagnetError::ServiceUnavailable(
        "Ни один бэкенд оконной системы не работает".to_string(),
    ))
}
