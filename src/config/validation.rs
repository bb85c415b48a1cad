use super::Config;
use anyhow::Result;
use tracing::warn;
use url::Url;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn error(path: &str, message: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(error(
                "api.baseUrl",
                format!("Unsupported scheme '{}', expected http or https", url.scheme()),
            ));
        }
        Ok(_) => {}
        Err(e) => errors.push(error("api.baseUrl", format!("Invalid URL: {e}"))),
    }

    if config.api.timeout_secs == 0 {
        errors.push(error("api.timeoutSecs", "Timeout must be greater than 0"));
    }

    if config.api.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
        warn!("api.token is set but empty; requests will be sent without auth");
    }

    let realtime = &config.realtime;
    if realtime.reconnect_delay_ms == 0 {
        errors.push(error(
            "realtime.reconnectDelayMs",
            "Reconnect delay must be greater than 0",
        ));
    }
    if !realtime.backoff_factor.is_finite() || realtime.backoff_factor < 1.0 {
        errors.push(error(
            "realtime.backoffFactor",
            "Backoff factor must be at least 1.0",
        ));
    }
    if realtime.max_delay_ms < realtime.reconnect_delay_ms {
        errors.push(error(
            "realtime.maxDelayMs",
            "Max delay must not be below the reconnect delay",
        ));
    }
    if realtime.max_attempts == Some(0) {
        errors.push(error(
            "realtime.maxAttempts",
            "Max attempts must be greater than 0 when set",
        ));
    }

    if config.chat.sending_failsafe_ms == 0 {
        errors.push(error(
            "chat.sendingFailsafeMs",
            "Sending failsafe must be greater than 0",
        ));
    }

    if config.toast.default_duration_ms == 0 {
        errors.push(error(
            "toast.defaultDurationMs",
            "Toast duration must be greater than 0",
        ));
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(config: &Config) -> Vec<String> {
        validate_config(config).into_iter().map(|e| e.path).collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_empty());
        assert!(validate_config_object(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_bad_base_url() {
        let mut config = Config::default();
        config.api.base_url = "localhost:8080/agi".into();
        assert_eq!(paths(&config), vec!["api.baseUrl"]);

        config.api.base_url = "not a url".into();
        assert_eq!(paths(&config), vec!["api.baseUrl"]);
    }

    #[test]
    fn rejects_zero_delays_and_shrinking_backoff() {
        let mut config = Config::default();
        config.realtime.reconnect_delay_ms = 0;
        config.realtime.backoff_factor = 0.5;
        config.toast.default_duration_ms = 0;
        assert_eq!(
            paths(&config),
            vec![
                "realtime.reconnectDelayMs",
                "realtime.backoffFactor",
                "toast.defaultDurationMs"
            ]
        );
    }

    #[test]
    fn max_delay_below_base_delay_is_an_error() {
        let mut config = Config::default();
        config.realtime.reconnect_delay_ms = 10_000;
        config.realtime.max_delay_ms = 1000;
        let err = validate_config_object(&config).unwrap_err();
        assert!(err.to_string().contains("realtime.maxDelayMs"));
    }
}
