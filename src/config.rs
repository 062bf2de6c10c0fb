use std::{env, net::SocketAddr, num::NonZeroUsize, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::pipeline::{TopicQuery, TrendFeed};
use crate::scheduler::SchedulerConfig;
use crate::util::redact::redact;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    openai_api_key: String,
    openai_model: String,
    openai_base_url: String,
    llm_timeout: Duration,
    forem_api_key: Option<String>,
    forem_base_url: String,
    publish_article: bool,
    forem_publish_as_draft: bool,
    max_ideas: NonZeroUsize,
    trends_geo: String,
    trends_lang: String,
    trends_base_url: String,
    upstream_connect_timeout: Duration,
    upstream_timeout: Duration,
    scheduler_cron: String,
    scheduler_timezone: Option<String>,
    scheduler_enabled: bool,
    scheduler_single_flight: bool,
    scheduler_status_interval: Duration,
    http_bind: Option<SocketAddr>,
    otel_exporter_endpoint: Option<String>,
    otel_sampling_ratio: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から設定値を読み込み、検証する。
    ///
    /// # Errors
    /// `OPENAI_API_KEY` が未設定、もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = env_var("OPENAI_API_KEY")?;
        let openai_model = string_or("OPENAI_MODEL", "gpt-4o-mini");
        let openai_base_url = string_or("OPENAI_BASE_URL", "https://api.openai.com/v1/");
        let llm_timeout = parse_duration_secs("LLM_TIMEOUT_SECS", 120)?;

        // Forem 公開
        let forem_api_key = optional_var("FOREM_API_KEY");
        let forem_base_url = string_or("FOREM_BASE_URL", "https://dev.to/api/");
        let publish_article = parse_bool("PUBLISH_ARTICLE", false)?;
        let forem_publish_as_draft = parse_bool("FOREM_PUBLISH_AS_DRAFT", false)?;

        // トレンド取得
        let max_ideas = parse_non_zero_usize("MAX_IDEAS", 5)?;
        let trends_geo = string_or("TRENDS_GEO", "BR");
        let trends_lang = string_or("TRENDS_LANG", "pt");
        let trends_base_url =
            string_or("TRENDS_BASE_URL", "https://trends.google.com/trends/api/");

        let upstream_connect_timeout = parse_duration_ms("UPSTREAM_CONNECT_TIMEOUT_MS", 3000)?;
        let upstream_timeout = parse_duration_secs("UPSTREAM_TIMEOUT_SECS", 30)?;

        // スケジューラ
        let scheduler_cron = string_or("SCHEDULER_CRON", "0 9 * * *");
        // 明示的な空文字は UTC
        let scheduler_timezone = match env::var("SCHEDULER_TIMEZONE") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw.trim().to_string()),
            Err(_) => Some(DEFAULT_TIMEZONE.to_string()),
        };
        let scheduler_enabled = parse_bool("SCHEDULER_ENABLED", false)?;
        let scheduler_single_flight = parse_bool("SCHEDULER_SINGLE_FLIGHT", false)?;
        let scheduler_status_interval = parse_duration_secs("SCHEDULER_STATUS_INTERVAL_SECS", 3600)?;
        if scheduler_status_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "SCHEDULER_STATUS_INTERVAL_SECS",
                source: anyhow::anyhow!("must be greater than zero"),
            });
        }

        let http_bind = parse_optional_socket_addr("SAAS_GENIE_HTTP_BIND")?;

        // OpenTelemetry 設定
        let otel_exporter_endpoint = optional_var("OTEL_EXPORTER_OTLP_ENDPOINT");
        let otel_sampling_ratio = parse_f64("OTEL_SAMPLING_RATIO", 1.0)?;
        if !(0.0..=1.0).contains(&otel_sampling_ratio) {
            return Err(ConfigError::Invalid {
                name: "OTEL_SAMPLING_RATIO",
                source: anyhow::anyhow!("value must be between 0.0 and 1.0"),
            });
        }

        Ok(Self {
            openai_api_key,
            openai_model,
            openai_base_url,
            llm_timeout,
            forem_api_key,
            forem_base_url,
            publish_article,
            forem_publish_as_draft,
            max_ideas,
            trends_geo,
            trends_lang,
            trends_base_url,
            upstream_connect_timeout,
            upstream_timeout,
            scheduler_cron,
            scheduler_timezone,
            scheduler_enabled,
            scheduler_single_flight,
            scheduler_status_interval,
            http_bind,
            otel_exporter_endpoint,
            otel_sampling_ratio,
        })
    }

    /// 資格情報を伏せた設定概要をログに出す。
    pub fn log_summary(&self) {
        info!(
            openai_model = %self.openai_model,
            openai_base_url = %self.openai_base_url,
            openai_api_key = %redact(&self.openai_api_key),
            forem_base_url = %self.forem_base_url,
            forem_api_key = %self.forem_api_key.as_deref().map(redact).unwrap_or_else(|| "unset".into()),
            publish_article = self.publish_article,
            publish_as_draft = self.forem_publish_as_draft,
            max_ideas = self.max_ideas.get(),
            geo = %self.trends_geo,
            lang = %self.trends_lang,
            scheduler_cron = %self.scheduler_cron,
            scheduler_timezone = self.scheduler_timezone.as_deref().unwrap_or("UTC"),
            scheduler_enabled = self.scheduler_enabled,
            single_flight = self.scheduler_single_flight,
            "configuration loaded"
        );
    }

    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            expression: self.scheduler_cron.clone(),
            timezone: self.scheduler_timezone.clone(),
            enabled: self.scheduler_enabled,
            single_flight: self.scheduler_single_flight,
        }
    }

    #[must_use]
    pub fn topic_query(&self, feed: TrendFeed) -> TopicQuery {
        TopicQuery::new(
            self.trends_geo.clone(),
            self.trends_lang.clone(),
            self.max_ideas.get(),
        )
        .with_feed(feed)
    }

    #[must_use]
    pub fn openai_api_key(&self) -> &str {
        &self.openai_api_key
    }

    #[must_use]
    pub fn openai_model(&self) -> &str {
        &self.openai_model
    }

    #[must_use]
    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    #[must_use]
    pub fn forem_api_key(&self) -> Option<&str> {
        self.forem_api_key.as_deref()
    }

    #[must_use]
    pub fn forem_base_url(&self) -> &str {
        &self.forem_base_url
    }

    #[must_use]
    pub fn publish_article(&self) -> bool {
        self.publish_article
    }

    #[must_use]
    pub fn forem_publish_as_draft(&self) -> bool {
        self.forem_publish_as_draft
    }

    #[must_use]
    pub fn max_ideas(&self) -> NonZeroUsize {
        self.max_ideas
    }

    #[must_use]
    pub fn trends_geo(&self) -> &str {
        &self.trends_geo
    }

    #[must_use]
    pub fn trends_lang(&self) -> &str {
        &self.trends_lang
    }

    #[must_use]
    pub fn trends_base_url(&self) -> &str {
        &self.trends_base_url
    }

    #[must_use]
    pub fn upstream_connect_timeout(&self) -> Duration {
        self.upstream_connect_timeout
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        self.upstream_timeout
    }

    #[must_use]
    pub fn scheduler_status_interval(&self) -> Duration {
        self.scheduler_status_interval
    }

    #[must_use]
    pub fn http_bind(&self) -> Option<SocketAddr> {
        self.http_bind
    }

    #[must_use]
    pub fn otel_exporter_endpoint(&self) -> Option<&str> {
        self.otel_exporter_endpoint.as_deref()
    }

    #[must_use]
    pub fn otel_sampling_ratio(&self) -> f64 {
        self.otel_sampling_ratio
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::Missing(name))
}

fn optional_var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn string_or(name: &'static str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}

fn parse_optional_socket_addr(name: &'static str) -> Result<Option<SocketAddr>, ConfigError> {
    optional_var(name)
        .map(|raw| {
            raw.parse().map_err(|error| ConfigError::Invalid {
                name,
                source: anyhow::Error::new(error),
            })
        })
        .transpose()
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = string_or(name, &default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(value))
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = string_or(name, &default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = string_or(name, &default.to_string());
    raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = string_or(name, &default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: &[&str] = &[
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_BASE_URL",
        "LLM_TIMEOUT_SECS",
        "FOREM_API_KEY",
        "FOREM_BASE_URL",
        "PUBLISH_ARTICLE",
        "FOREM_PUBLISH_AS_DRAFT",
        "MAX_IDEAS",
        "TRENDS_GEO",
        "TRENDS_LANG",
        "TRENDS_BASE_URL",
        "UPSTREAM_CONNECT_TIMEOUT_MS",
        "UPSTREAM_TIMEOUT_SECS",
        "SCHEDULER_CRON",
        "SCHEDULER_TIMEZONE",
        "SCHEDULER_ENABLED",
        "SCHEDULER_SINGLE_FLIGHT",
        "SCHEDULER_STATUS_INTERVAL_SECS",
        "SAAS_GENIE_HTTP_BIND",
        "OTEL_EXPORTER_OTLP_ENDPOINT",
        "OTEL_SAMPLING_RATIO",
    ];

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests run sequentially under ENV_MUTEX and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn reset_env() {
        for name in ALL_VARS {
            // SAFETY: tests run sequentially under ENV_MUTEX and clean up deterministic keys.
            unsafe {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("OPENAI_API_KEY", "sk-test-key");

        let config = Config::from_env().expect("config loads");

        assert_eq!(config.openai_model(), "gpt-4o-mini");
        assert_eq!(config.openai_base_url(), "https://api.openai.com/v1/");
        assert_eq!(config.llm_timeout(), Duration::from_secs(120));
        assert_eq!(config.forem_api_key(), None);
        assert!(!config.publish_article());
        assert!(!config.forem_publish_as_draft());
        assert_eq!(config.max_ideas().get(), 5);
        assert_eq!(config.trends_geo(), "BR");
        assert_eq!(config.trends_lang(), "pt");
        assert_eq!(config.upstream_connect_timeout(), Duration::from_millis(3000));
        assert_eq!(config.scheduler_status_interval(), Duration::from_secs(3600));
        assert_eq!(config.http_bind(), None);
        assert_eq!(config.otel_exporter_endpoint(), None);

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.expression, "0 9 * * *");
        assert_eq!(scheduler.timezone.as_deref(), Some("America/Sao_Paulo"));
        assert!(!scheduler.enabled);
        assert!(!scheduler.single_flight);
    }

    #[test]
    fn from_env_overrides_values() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("OPENAI_API_KEY", "sk-test-key");
        set_env("FOREM_API_KEY", "forem-key");
        set_env("PUBLISH_ARTICLE", "yes");
        set_env("MAX_IDEAS", "3");
        set_env("TRENDS_GEO", "US");
        set_env("TRENDS_LANG", "en");
        set_env("SCHEDULER_CRON", "*/30 * * * *");
        set_env("SCHEDULER_TIMEZONE", "");
        set_env("SCHEDULER_ENABLED", "true");
        set_env("SCHEDULER_SINGLE_FLIGHT", "1");
        set_env("SAAS_GENIE_HTTP_BIND", "127.0.0.1:9100");

        let config = Config::from_env().expect("config loads");

        assert_eq!(config.forem_api_key(), Some("forem-key"));
        assert!(config.publish_article());
        let query = config.topic_query(TrendFeed::RealTime);
        assert_eq!(query.geo, "US");
        assert_eq!(query.lang, "en");
        assert_eq!(query.max_count, 3);
        assert_eq!(query.feed, TrendFeed::RealTime);
        assert_eq!(
            config.http_bind(),
            Some("127.0.0.1:9100".parse().expect("addr"))
        );

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.expression, "*/30 * * * *");
        assert_eq!(scheduler.timezone, None);
        assert!(scheduler.enabled);
        assert!(scheduler.single_flight);
        reset_env();
    }

    #[test]
    fn from_env_errors_when_required_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("OPENAI_API_KEY", "   ");

        let error = Config::from_env().expect_err("blank key should fail");

        assert!(matches!(error, ConfigError::Missing("OPENAI_API_KEY")));
        reset_env();
    }

    #[test]
    fn from_env_rejects_invalid_values() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("OPENAI_API_KEY", "sk-test-key");

        set_env("MAX_IDEAS", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "MAX_IDEAS", .. })
        ));

        set_env("MAX_IDEAS", "5");
        set_env("PUBLISH_ARTICLE", "maybe");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "PUBLISH_ARTICLE", .. })
        ));

        set_env("PUBLISH_ARTICLE", "false");
        set_env("SAAS_GENIE_HTTP_BIND", "not-an-address");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "SAAS_GENIE_HTTP_BIND", .. })
        ));
        reset_env();
    }
}
