use crate::error::{MagnetError, Result};
use crate::events::{WindowId, WindowPosition, WindowSize};
use crate::{magnet_error, trace_if_enabled};
use dashmap::DashMap;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use super::r#trait::{MoveCallback, SubscriptionId, WindowLayer};

/// X11-бэкенд поверх утилиты xdotool.
/// Уведомления о перемещении производятся циклом опроса геометрии
/// подписанных окон
pub struct XdotoolLayer {
    poll_interval_ms: u64,
    subscriptions: DashMap<SubscriptionId, (WindowId, MoveCallback)>,
    last_seen: DashMap<WindowId, WindowPosition>,
    next_subscription_id: AtomicU64,
}

impl XdotoolLayer {
    pub fn new(poll_interval_ms: u64) -> Self {
        Self {
            poll_interval_ms,
            subscriptions: DashMap::new(),
            last_seen: DashMap::new(),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    fn geometry(&self, id: WindowId) -> Result<(WindowPosition, WindowSize)> {
        let output = Command::new("xdotool")
            .args(["getwindowgeometry", "--shell", &id.0.to_string()])
            .output()
            .map_err(|e| magnet_error!(backend, "xdotool не найден: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(magnet_error!(backend, "xdotool вернул ошибку: {}", stderr));
        }

        parse_shell_geometry(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Разобрать вывод `xdotool getwindowgeometry --shell`:
/// строки вида X=..., Y=..., WIDTH=..., HEIGHT=...
fn parse_shell_geometry(stdout: &str) -> Result<(WindowPosition, WindowSize)> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    for line in stdout.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let value: Option<i32> = value.trim().parse().ok();
            match key.trim() {
                "X" => x = value,
                "Y" => y = value,
                "WIDTH" => width = value,
                "HEIGHT" => height = value,
                _ => {}
            }
        }
    }

    match (x, y, width, height) {
        (Some(x), Some(y), Some(width), Some(height)) => Ok((
            WindowPosition::new(x, y),
            WindowSize::new(width, height),
        )),
        _ => Err(magnet_error!(
            backend,
            "Неполная геометрия от xdotool: {:?}",
            stdout
        )),
    }
}

#[async_trait::async_trait]
impl WindowLayer for XdotoolLayer {
    fn test(&self) -> Result<()> {
        let output = Command::new("xdotool").args(["getactivewindow"]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MagnetError::Backend("xdotool failed".to_string()))
        }
    }

    fn resolve(&self, name: &str) -> Result<WindowId> {
        debug!("Поиск окна '{}' через xdotool", name);
        let output = Command::new("xdotool")
            .args(["search", "--name", &format!("^{}$", name)])
            .output()
            .map_err(|e| magnet_error!(backend, "xdotool не найден: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find_map(|line| line.trim().parse::<u64>().ok())
            .map(WindowId)
            .ok_or_else(|| magnet_error!(window_not_found, "{}", name))
    }

    fn position(&self, id: WindowId) -> Result<WindowPosition> {
        self.geometry(id).map(|(position, _)| position)
    }

    fn size(&self, id: WindowId) -> Result<WindowSize> {
        self.geometry(id).map(|(_, size)| size)
    }

    fn set_position(&self, id: WindowId, pos: WindowPosition) -> Result<()> {
        let output = Command::new("xdotool")
            .args([
                "windowmove",
                &id.0.to_string(),
                &pos.x.to_string(),
                &pos.y.to_string(),
            ])
            .output()
            .map_err(|e| magnet_error!(backend, "xdotool не найден: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(magnet_error!(backend, "windowmove не удался: {}", stderr));
        }
        Ok(())
    }

    fn subscribe_moves(&self, id: WindowId, callback: MoveCallback) -> SubscriptionId {
        let subscription =
            SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.insert(subscription, (id, callback));
        subscription
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        if let Some((_, (window, _))) = self.subscriptions.remove(&subscription) {
            let still_watched = self
                .subscriptions
                .iter()
                .any(|entry| entry.value().0 == window);
            if !still_watched {
                self.last_seen.remove(&window);
            }
        }
    }

    async fn run(&self) -> Result<()> {
        info!(
            "XdotoolLayer запущен, интервал опроса {}мс",
            self.poll_interval_ms
        );

        let mut ticker = interval(Duration::from_millis(self.poll_interval_ms));

        loop {
            ticker.tick().await;

            let mut watched: Vec<WindowId> = self
                .subscriptions
                .iter()
                .map(|entry| entry.value().0)
                .collect();
            watched.sort_unstable();
            watched.dedup();

            for window in watched {
                let position = match self.geometry(window) {
                    Ok((position, _)) => position,
                    Err(e) => {
                        trace_if_enabled!("Опрос геометрии окна {} не удался: {}", window, e);
                        continue;
                    }
                };

                match self.last_seen.insert(window, position) {
                    // Первое наблюдение не является перемещением
                    None => continue,
                    Some(previous) if previous == position => continue,
                    Some(_) => {}
                }

                let callbacks: Vec<MoveCallback> = self
                    .subscriptions
                    .iter()
                    .filter(|entry| entry.value().0 == window)
                    .map(|entry| entry.value().1.clone())
                    .collect();

                for callback in callbacks {
                    callback(position);
                }
            }
        }
    }
}
