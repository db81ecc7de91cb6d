use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::{create_window_layer, SettingsService, SnapEngine};

#[derive(Parser, Debug)]
#[command(name = "magnet-rust")]
#[command(about = "Утилита магнитного прилипания вспомогательных окон к главному окну")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "magnet.toml")]
    config: String,

    /// Режим сухого запуска (эмулированные окна, без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Инициализация системы логирования
    init_tracing(&args.log_level)?;

    info!("Запуск Magnet Rust v{}", env!("CARGO_PKG_VERSION"));

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные окна не затрагиваются");
    }

    // Инициализация компонентов
    let settings = SettingsService::new(PathBuf::from(&args.config), config.clone());
    let layer = create_window_layer(&config, args.dry_run)?;

    let engine = SnapEngine::new(
        layer.clone(),
        config.window.primary.clone(),
        settings.snap_enabled(),
    );
    engine.watch_settings(&settings);

    if let Err(e) = settings.start_watching() {
        warn!("Наблюдение за конфигурацией не запущено: {}", e);
    }

    // Прогрев кэша геометрии главного окна
    engine.refresh_primary_cache();

    // Регистрация управляемых окон из конфигурации
    let mut registered = Vec::new();
    for name in &config.window.managed {
        match layer.resolve(name) {
            Ok(id) => match engine.register(id) {
                Ok(()) => {
                    info!("Окно '{}' ({}) поставлено на учёт", name, id);
                    registered.push(id);
                }
                Err(e) => warn!("Не удалось поставить окно '{}' на учёт: {}", name, e),
            },
            Err(e) => warn!("Окно '{}' не найдено: {}", name, e),
        }
    }

    info!(
        "Все компоненты инициализированы, порог прилипания {}px",
        engine.current_threshold()
    );

    // Запуск цикла событий оконного слоя
    let event_layer = layer.clone();
    let layer_handle = tokio::spawn(async move {
        if let Err(e) = event_layer.run().await {
            error!("Ошибка в оконном слое: {}", e);
        }
    });

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Снимаем окна с учёта, как при их закрытии
    for id in registered {
        engine.unregister(id);
    }

    // Снятие оставшихся подписок и наблюдателя конфигурации
    engine.shutdown();

    // Прерываем цикл событий оконного слоя
    layer_handle.abort();

    // Ожидаем завершения задачи (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = layer_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Magnet Rust завершил работу");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
