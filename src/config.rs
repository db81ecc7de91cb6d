use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub window: WindowConfig,
    #[serde(default)]
    pub snap: SnapConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Бэкенд оконной системы: auto, xdotool, sway или dry-run
    pub backend: String,
    /// Логическое имя главного окна
    pub primary: String,
    /// Логические имена вспомогательных окон, регистрируемых при запуске
    #[serde(default)]
    pub managed: Vec<String>,
    /// Интервал опроса геометрии подписанных окон
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapConfig {
    /// Включено ли прилипание окон
    pub enabled: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                filter: "magnet_rust=info".to_string(),
            },
            window: WindowConfig {
                backend: "auto".to_string(),
                primary: "magnet-primary".to_string(),
                managed: Vec::new(),
                poll_interval_ms: 50,
            },
            snap: SnapConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("MAGNET_"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек окон
        match self.window.backend.as_str() {
            "auto" | "xdotool" | "sway" | "dry-run" => {}
            _ => anyhow::bail!("Неверный бэкенд оконной системы: {}", self.window.backend),
        }

        if self.window.primary.is_empty() {
            anyhow::bail!("Имя главного окна не может быть пустым");
        }

        if self.window.poll_interval_ms < 10 {
            anyhow::bail!("poll_interval_ms должно быть минимум 10");
        }

        // Дубликаты в списке управляемых окон приводят к лишним регистрациям
        for (i, name) in self.window.managed.iter().enumerate() {
            if name.is_empty() {
                anyhow::bail!("Пустое имя управляемого окна #{}", i + 1);
            }
            if name == &self.window.primary {
                anyhow::bail!(
                    "Главное окно '{}' не может быть в списке управляемых",
                    name
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.snap.enabled);
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let mut config = Config::default();
        config.window.backend = "wayland-magic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_primary_in_managed_rejected() {
        let mut config = Config::default();
        config.window.managed = vec![config.window.primary.clone()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_lower_bound() {
        let mut config = Config::default();
        config.window.poll_interval_ms = 5;
        assert!(config.validate().is_err());

        config.window.poll_interval_ms = 10;
        assert!(config.validate().is_ok());
    }
}
