use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Pool sizing is coherent (min <= max, max > 0)
/// - Queue capacity is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Pool validation
    if config.pool.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "pool.max_workers cannot be 0".to_string(),
        ));
    }
    if config.pool.min_workers > config.pool.max_workers {
        return Err(ConfigError::ValidationError(format!(
            "pool.min_workers ({}) cannot exceed pool.max_workers ({})",
            config.pool.min_workers, config.pool.max_workers
        )));
    }

    // Queue validation
    if config.queue.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_concurrent cannot be 0".to_string(),
        ));
    }
    if config.queue.job_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "queue.job_timeout_secs cannot be 0".to_string(),
        ));
    }

    // Encoder validation
    if config.encoder.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "encoder.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_max_workers_fails() {
        let mut config = Config::default();
        config.pool.max_workers = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_min_above_max_fails() {
        let mut config = Config::default();
        config.pool.min_workers = 5;
        config.pool.max_workers = 2;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_admission_slots_fails() {
        let mut config = Config::default();
        config.queue.max_concurrent = 0;
        assert!(validate_config(&config).is_err());
    }
}
