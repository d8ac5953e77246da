use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("queue.topic must not be empty")]
    EmptyTopic,

    #[error("http.base_url is not a valid URL: {url} ({reason})")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("http.base_url must end with '/': {0}")]
    BaseUrlMissingTrailingSlash(String),

    #[error("queue.requeue_delay ({delay}) exceeds queue.max_requeue_delay ({max})")]
    RequeueDelayExceedsMax { delay: String, max: String },

    #[error("Duration must be positive: {field}")]
    ZeroDuration { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_queue(config)?;
    validate_http(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }

    if config.worker.drain_timeout.as_duration().is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "worker.drain_timeout".to_string(),
        });
    }

    Ok(())
}

fn validate_queue(config: &Config) -> Result<(), ValidationError> {
    if config.queue.topic.trim().is_empty() {
        return Err(ValidationError::EmptyTopic);
    }

    if config.queue.requeue_delay > config.queue.max_requeue_delay {
        return Err(ValidationError::RequeueDelayExceedsMax {
            delay: config.queue.requeue_delay.to_string(),
            max: config.queue.max_requeue_delay.to_string(),
        });
    }

    Ok(())
}

/// Profile URLs are joined onto the base, so it has to be absolute and end in a slash
fn validate_http(config: &Config) -> Result<(), ValidationError> {
    let base_url = &config.http.base_url;

    reqwest::Url::parse(base_url).map_err(|e| ValidationError::InvalidBaseUrl {
        url: base_url.clone(),
        reason: e.to_string(),
    })?;

    if !base_url.ends_with('/') {
        return Err(ValidationError::BaseUrlMissingTrailingSlash(base_url.clone()));
    }

    for (field, value) in [
        ("http.connect_timeout", config.http.connect_timeout),
        ("http.request_timeout", config.http.request_timeout),
    ] {
        if value.as_duration().is_zero() {
            return Err(ValidationError::ZeroDuration {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::HumanDuration;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.worker.concurrency = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ZeroConcurrency)));
    }

    #[test]
    fn test_empty_topic() {
        let mut config = Config::default();
        config.queue.topic = "  ".to_string();

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::EmptyTopic)));
    }

    #[test]
    fn test_requeue_delay_above_max() {
        let mut config = Config::default();
        config.queue.requeue_delay = HumanDuration::from_secs(600);
        config.queue.max_requeue_delay = HumanDuration::from_secs(60);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::RequeueDelayExceedsMax { .. })
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.http.base_url = "not a url".to_string();

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_base_url_needs_trailing_slash() {
        let mut config = Config::default();
        config.http.base_url = "https://example.com/lodestone".to_string();

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::BaseUrlMissingTrailingSlash(_))
        ));
    }

    #[test]
    fn test_zero_drain_timeout() {
        let mut config = Config::default();
        config.worker.drain_timeout = HumanDuration::from_millis(0);

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ZeroDuration { .. })));
    }
}
