use thiserror::Error;

#[derive(Error, Debug)]
pub enum MagnetError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка наблюдателя файлов: {0}")]
    Notify(#[from] notify::Error),

    #[error("Окно не найдено: {0}")]
    WindowNotFound(String),

    #[error("Ошибка бэкенда окон: {0}")]
    Backend(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MagnetError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! magnet_error {
    (window_not_found, $($arg:tt)*) => {
        $crate::error::MagnetError::WindowNotFound(format!($($arg)*))
    };
    (backend, $($arg:tt)*) => {
        $crate::error::MagnetError::Backend(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::MagnetError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::MagnetError::Internal(format!($($arg)*))
    };
}
