use crate::error::{MagnetError, Result};
use crate::events::{WindowId, WindowPosition, WindowSize};
use crate::{magnet_error, trace_if_enabled};
use dashmap::DashMap;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::{MoveCallback, SubscriptionId, WindowLayer};

/// Wayland/sway-бэкенд поверх swaymsg.
/// Дерево контейнеров запрашивается целиком; перемещения производятся
/// циклом опроса, как и в xdotool-бэкенде
pub struct SwayLayer {
    poll_interval_ms: u64,
    subscriptions: DashMap<SubscriptionId, (WindowId, MoveCallback)>,
    last_seen: DashMap<WindowId, WindowPosition>,
    next_subscription_id: AtomicU64,
}

impl SwayLayer {
    pub fn new(poll_interval_ms: u64) -> Self {
        Self {
            poll_interval_ms,
            subscriptions: DashMap::new(),
            last_seen: DashMap::new(),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    fn get_tree(&self) -> Result<String> {
        let output = Command::new("swaymsg")
            .args(["-t", "get_tree", "-r"])
            .output()
            .map_err(|e| magnet_error!(backend, "swaymsg не найден: {}", e))?;

        if !output.status.success() {
            return Err(magnet_error!(backend, "swaymsg вернул ошибку"));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn geometry(&self, id: WindowId) -> Result<(WindowPosition, WindowSize)> {
        let tree = self.get_tree()?;
        find_rect(&tree, id.0).ok_or_else(|| {
            magnet_error!(window_not_found, "Контейнер {} не найден в дереве sway", id)
        })
    }
}

/// Найти идентификатор контейнера по имени в сыром JSON дерева sway
fn find_container_id(tree: &str, name: &str) -> Option<u64> {
    let needle = format!("\"name\":\"{}\"", name);
    let name_pos = tree.find(&needle)?;
    let before = &tree[..name_pos];
    let id_pos = before.rfind("\"id\":")?;
    let digits: String = tree[id_pos + 5..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Найти прямоугольник контейнера с данным идентификатором
fn find_rect(tree: &str, id: u64) -> Option<(WindowPosition, WindowSize)> {
    let needle = format!("\"id\":{},", id);
    let id_pos = tree.find(&needle)?;
    let after = &tree[id_pos..];
    let rect_pos = after.find("\"rect\":{")?;
    let rect = &after[rect_pos..];

    let x = extract_int(rect, "\"x\":")?;
    let y = extract_int(rect, "\"y\":")?;
    let width = extract_int(rect, "\"width\":")?;
    let height = extract_int(rect, "\"height\":")?;

    Some((
        WindowPosition::new(x, y),
        WindowSize::new(width, height),
    ))
}

fn extract_int(text: &str, key: &str) -> Option<i32> {
    let key_pos = text.find(key)?;
    let digits: String = text[key_pos + key.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse().ok()
}

#[async_trait::async_trait]
impl WindowLayer for SwayLayer {
    fn test(&self) -> Result<()> {
        let output = Command::new("swaymsg").args(["-t", "get_tree"]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MagnetError::Backend("sway failed".to_string()))
        }
    }

    fn resolve(&self, name: &str) -> Result<WindowId> {
        let tree = self.get_tree()?;
        find_container_id(&tree, name)
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
        let output = Command::new("swaymsg")
            .args([
                &format!("[con_id={}]", id.0),
                "move",
                "absolute",
                "position",
                &pos.x.to_string(),
                &pos.y.to_string(),
            ])
            .output()
            .map_err(|e| magnet_error!(backend, "swaymsg не найден: {}", e))?;

        if !output.status.success() {
            return Err(magnet_error!(backend, "move position не удался для {}", id));
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
            "SwayLayer запущен, интервал опроса {}мс",
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

            if watched.is_empty() {
                continue;
            }

            // Одно чтение дерева на тик опроса для всех подписанных окон
            let tree = match self.get_tree() {
                Ok(tree) => tree,
                Err(e) => {
                    trace_if_enabled!("Опрос дерева sway не удался: {}", e);
                    continue;
                }
            };

            for window in watched {
                let Some((position, _)) = find_rect(&tree, window.0) else {
                    trace_if_enabled!("Контейнер {} пропал из дерева sway", window);
                    continue;
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

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{"id":1,"name":"root","rect":{"x":0,"y":0,"width":3840,"height":1080},"nodes":[{"id":42,"name":"magnet-primary","rect":{"x":100,"y":100,"width":700,"height":800},"nodes":[]},{"id":43,"name":"scratch","rect":{"x":-30,"y":215,"width":420,"height":360},"nodes":[]}]}"#;

    #[test]
    fn test_find_container_id() {
        assert_eq!(find_container_id(TREE, "magnet-primary"), Some(42));
        assert_eq!(find_container_id(TREE, "scratch"), Some(43));
        assert_eq!(find_container_id(TREE, "missing"), None);
    }

    #[test]
    fn test_find_rect() {
        let (position, size) = find_rect(TREE, 42).unwrap();
        assert_eq!(position, WindowPosition::new(100, 100));
        assert_eq!(size, WindowSize::new(700, 800));

        let (position, _) = find_rect(TREE, 43).unwrap();
        assert_eq!(position, WindowPosition::new(-30, 215));

        assert!(find_rect(TREE, 99).is_none());
    }
}
