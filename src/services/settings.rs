use crate::config::Config;
use crate::error::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Наблюдатель изменения настройки прилипания: получает (старое, новое).
/// Отсутствующее или нечитаемое значение доставляется как None
pub type SnapEnabledObserver = Box<dyn Fn(Option<bool>, Option<bool>) + Send + Sync>;

/// Редакторы при сохранении порождают несколько событий на один файл
const CONFIG_DEBOUNCE_MS: u64 = 200;

/// Владелец загруженной конфигурации.
/// Перечитывает файл при его изменении и доставляет наблюдателям
/// изменения значения snap.enabled
pub struct SettingsService {
    config_path: PathBuf,
    current: RwLock<Config>,
    last_snap_enabled: Mutex<Option<bool>>,
    observers: Mutex<HashMap<u64, SnapEnabledObserver>>,
    next_observer_id: AtomicU64,
    self_ref: Weak<SettingsService>,
}

/// Отменяемая подписка на изменение настройки
pub struct WatchHandle {
    service: Weak<SettingsService>,
    id: u64,
}

impl WatchHandle {
    /// Отменить подписку. Повторная отмена безопасна
    pub fn cancel(&self) {
        if let Some(service) = self.service.upgrade() {
            service.observers.lock().remove(&self.id);
        }
    }
}

impl SettingsService {
    pub fn new(config_path: PathBuf, config: Config) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config_path,
            last_snap_enabled: Mutex::new(Some(config.snap.enabled)),
            current: RwLock::new(config),
            observers: Mutex::new(HashMap::new()),
            next_observer_id: AtomicU64::new(1),
            self_ref: self_ref.clone(),
        })
    }

    pub fn snap_enabled(&self) -> bool {
        self.current.read().snap.enabled
    }

    /// Подписаться на изменения snap.enabled
    pub fn watch_snap_enabled(&self, observer: SnapEnabledObserver) -> WatchHandle {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().insert(id, observer);
        WatchHandle {
            service: self.self_ref.clone(),
            id,
        }
    }

    fn deliver_snap_enabled(&self, new_value: Option<bool>) {
        let mut last = self.last_snap_enabled.lock();
        let old_value = *last;
        if old_value == new_value {
            return;
        }
        *last = new_value;
        drop(last);

        let observers = self.observers.lock();
        for observer in observers.values() {
            observer(old_value, new_value);
        }
    }

    /// Перечитать файл конфигурации и разослать изменения
    fn reload(&self) {
        match Config::load(&self.config_path) {
            Ok(config) => {
                let new_enabled = config.snap.enabled;
                *self.current.write() = config;
                info!("Конфигурация перечитана из {:?}", self.config_path);
                self.deliver_snap_enabled(Some(new_enabled));
            }
            Err(e) => {
                warn!("Не удалось перечитать конфигурацию: {:#}", e);
                // Нечитаемое значение наблюдатели видят как None
                self.deliver_snap_enabled(None);
            }
        }
    }

    /// Запустить наблюдение за файлом конфигурации в фоновом потоке
    pub fn start_watching(&self) -> Result<()> {
        let config_path = self.config_path.clone();
        let config_filename = config_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(tx)?;

        // Наблюдаем родительский каталог: редакторы сохраняют через
        // запись во временный файл и переименование
        let watch_path = config_path.parent().unwrap_or(&config_path);
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        let service = self.self_ref.clone();
        std::thread::spawn(move || {
            // Наблюдатель должен жить, пока жив поток
            let _watcher = watcher;
            let debounce = Duration::from_millis(CONFIG_DEBOUNCE_MS);
            let mut last_event: Option<Instant> = None;

            loop {
                match rx.recv() {
                    Ok(Ok(event)) => {
                        let affects_config = event
                            .paths
                            .iter()
                            .any(|p| p.file_name().is_some_and(|name| name == config_filename));
                        if !affects_config {
                            continue;
                        }

                        let now = Instant::now();
                        if last_event.is_some_and(|t| now.duration_since(t) < debounce) {
                            continue;
                        }
                        last_event = Some(now);

                        let Some(service) = service.upgrade() else {
                            break;
                        };
                        service.reload();
                    }
                    Ok(Err(e)) => {
                        warn!("Ошибка наблюдателя конфигурации: {}", e);
                    }
                    Err(_) => {
                        // Канал закрыт, сервис уничтожен
                        break;
                    }
                }
            }
        });

        info!("Наблюдение за {:?} запущено", self.config_path);
        Ok(())
    }
}
