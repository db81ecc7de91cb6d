use crate::config::WindowConfig;
use crate::error::{MagnetError, Result};
use crate::events::{WindowId, WindowPosition, WindowSize};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::{MoveCallback, SubscriptionId, WindowLayer};

#[derive(Debug, Clone)]
struct DryWindow {
    name: String,
    position: WindowPosition,
    size: WindowSize,
}

/// Оконный бэкенд в памяти: окна эмулируются, колбэки перемещения
/// вызываются синхронно из `set_position`, как это делают UI-фреймворки,
/// доставляющие событие перемещения прямо из вызова записи
pub struct DryRunLayer {
    windows: DashMap<WindowId, DryWindow>,
    subscriptions: DashMap<SubscriptionId, (WindowId, MoveCallback)>,
    next_window_id: AtomicU64,
    next_subscription_id: AtomicU64,
    demo_primary: Option<WindowId>,
    demo_step: AtomicUsize,
}

impl DryRunLayer {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            subscriptions: DashMap::new(),
            next_window_id: AtomicU64::new(1),
            next_subscription_id: AtomicU64::new(1),
            demo_primary: None,
            demo_step: AtomicUsize::new(0),
        }
    }

    /// Создать слой с эмулированными окнами из конфигурации:
    /// главное окно и каждое управляемое окно из списка
    pub fn with_demo_windows(config: &WindowConfig) -> Self {
        let mut layer = Self::new();

        let primary = layer.add_window(
            &config.primary,
            WindowPosition::new(100, 100),
            WindowSize::new(700, 800),
        );
        layer.demo_primary = Some(primary);

        for (i, name) in config.managed.iter().enumerate() {
            let offset = i as i32;
            layer.add_window(
                name,
                WindowPosition::new(950 + offset * 60, 150 + offset * 80),
                WindowSize::new(420, 360),
            );
        }

        layer
    }

    /// Добавить эмулированное окно
    pub fn add_window(&self, name: &str, position: WindowPosition, size: WindowSize) -> WindowId {
        let id = WindowId(self.next_window_id.fetch_add(1, Ordering::Relaxed));
        self.windows.insert(
            id,
            DryWindow {
                name: name.to_string(),
                position,
                size,
            },
        );
        id
    }

    /// Колбэки окна собираются в вектор до вызова, чтобы не держать
    /// шард таблицы подписок во время повторного входа в слой
    fn dispatch_moved(&self, id: WindowId, position: WindowPosition) {
        let callbacks: Vec<MoveCallback> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().0 == id)
            .map(|entry| entry.value().1.clone())
            .collect();

        for callback in callbacks {
            callback(position);
        }
    }
}

impl Default for DryRunLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WindowLayer for DryRunLayer {
    fn test(&self) -> Result<()> {
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<WindowId> {
        self.windows
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| *entry.key())
            .ok_or_else(|| MagnetError::WindowNotFound(name.to_string()))
    }

    fn position(&self, id: WindowId) -> Result<WindowPosition> {
        self.windows
            .get(&id)
            .map(|w| w.position)
            .ok_or_else(|| MagnetError::WindowNotFound(id.to_string()))
    }

    fn size(&self, id: WindowId) -> Result<WindowSize> {
        self.windows
            .get(&id)
            .map(|w| w.size)
            .ok_or_else(|| MagnetError::WindowNotFound(id.to_string()))
    }

    fn set_position(&self, id: WindowId, pos: WindowPosition) -> Result<()> {
        match self.windows.get_mut(&id) {
            Some(mut window) => window.position = pos,
            None => return Err(MagnetError::WindowNotFound(id.to_string())),
        }

        self.dispatch_moved(id, pos);
        Ok(())
    }

    fn subscribe_moves(&self, id: WindowId, callback: MoveCallback) -> SubscriptionId {
        let subscription = SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.insert(subscription, (id, callback));
        subscription
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.subscriptions.remove(&subscription);
    }

    /// Эмуляция активности: управляемые окна по очереди подводятся к
    /// главному окну, уводятся от него и само главное окно сдвигается
    async fn run(&self) -> Result<()> {
        info!("Dry-run режим - оконный слой работает в режиме эмуляции");

        let Some(primary) = self.demo_primary else {
            // Слой создан без эмулированных окон (тестовый сценарий)
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        };

        let mut ticker = interval(Duration::from_secs(2));

        loop {
            ticker.tick().await;

            let Some(primary_window) = self.windows.get(&primary).map(|w| w.value().clone()) else {
                continue;
            };
            let right = primary_window.position.x + primary_window.size.width;
            let top = primary_window.position.y;

            let managed: Vec<WindowId> = self
                .windows
                .iter()
                .map(|entry| *entry.key())
                .filter(|id| *id != primary)
                .collect();

            let step = self.demo_step.fetch_add(1, Ordering::Relaxed);
            match step % 4 {
                0 => {
                    for id in managed {
                        info!("Dry-run: уводим окно {} от главного", id);
                        let _ = self.set_position(id, WindowPosition::new(right + 120, top + 40));
                    }
                }
                1 => {
                    for id in managed {
                        info!("Dry-run: подводим окно {} к правой грани", id);
                        let _ = self.set_position(id, WindowPosition::new(right + 6, top + 40));
                    }
                }
                2 => {
                    info!("Dry-run: сдвигаем главное окно");
                    let _ = self.set_position(
                        primary,
                        WindowPosition::new(primary_window.position.x + 30, top + 15),
                    );
                }
                _ => {
                    info!("Dry-run: возвращаем главное окно");
                    let _ = self.set_position(
                        primary,
                        WindowPosition::new(primary_window.position.x - 30, top - 15),
                    );
                }
            }
        }
    }
}
