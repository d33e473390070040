use std::str::FromStr;

use thiserror::Error;

const MIB: u64 = 1024 * 1024;

pub(crate) const DEFAULT_MULTIPART_THRESHOLD: u64 = 16 * MIB;
pub(crate) const DEFAULT_PART_SIZE: u64 = 8 * MIB;
/// S3 rejects non-final parts smaller than this.
pub(crate) const MIN_PART_SIZE: u64 = 5 * MIB;
pub(crate) const MAX_PART_SIZE: u64 = 5 * 1024 * MIB;
/// Largest object a single `PutObject` accepts.
const MAX_SINGLE_PUT: u64 = MAX_PART_SIZE;

const DESTINATION_BUCKET: &str = "DESTINATION_BUCKET";
const MULTIPART_THRESHOLD: &str = "COPY_MULTIPART_THRESHOLD_BYTES";
const PART_SIZE: &str = "COPY_PART_SIZE_BYTES";
const FAILURE_POLICY: &str = "COPY_FAILURE_POLICY";

/// What the handler reports to the runtime after a copy fails.
///
/// `Propagate` is the default, so a missing source object fails the invocation
/// and the platform's retry and dead-letter handling applies. `LogOnly` keeps
/// every invocation successful and leaves failures in the log stream only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FailurePolicy {
    /// Fail the invocation so the platform can retry or dead-letter the event.
    #[default]
    Propagate,
    /// Log the failure and report success.
    LogOnly,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(FailurePolicy::Propagate),
            "log" | "log-only" | "log_only" => Ok(FailurePolicy::LogOnly),
            other => Err(format!("expected `propagate` or `log`, got `{other}`")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ConfigError {
    #[error("{0} must be provided")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings fixed for the lifetime of the function instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CopyConfig {
    pub(crate) destination_bucket: String,
    /// Objects with a known length above this are copied with a multipart upload.
    pub(crate) multipart_threshold: u64,
    pub(crate) part_size: u64,
    pub(crate) failure_policy: FailurePolicy,
}

impl CopyConfig {
    pub(crate) fn new(destination_bucket: impl Into<String>) -> Self {
        Self {
            destination_bucket: destination_bucket.into(),
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub(crate) fn with_multipart_threshold(mut self, threshold: u64) -> Self {
        self.multipart_threshold = threshold;
        self
    }

    pub(crate) fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub(crate) fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup, so callers never
    /// have to touch the process environment.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let destination_bucket = lookup(DESTINATION_BUCKET)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(DESTINATION_BUCKET))?;

        let mut config = Self::new(destination_bucket);

        if let Some(value) = lookup(MULTIPART_THRESHOLD) {
            let threshold = parse_bytes(MULTIPART_THRESHOLD, &value)?;
            if !(1..=MAX_SINGLE_PUT).contains(&threshold) {
                return Err(invalid(
                    MULTIPART_THRESHOLD,
                    &value,
                    format!("must be between 1 and {MAX_SINGLE_PUT} bytes"),
                ));
            }
            config.multipart_threshold = threshold;
        }

        if let Some(value) = lookup(PART_SIZE) {
            let part_size = parse_bytes(PART_SIZE, &value)?;
            if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size) {
                return Err(invalid(
                    PART_SIZE,
                    &value,
                    format!("must be between {MIN_PART_SIZE} and {MAX_PART_SIZE} bytes"),
                ));
            }
            config.part_size = part_size;
        }

        if let Some(value) = lookup(FAILURE_POLICY) {
            config.failure_policy = value
                .parse()
                .map_err(|reason: String| invalid(FAILURE_POLICY, &value, reason))?;
        }

        Ok(config)
    }
}

fn parse_bytes(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| invalid(name, value, e.to_string()))
}

fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_owned(),
        reason: reason.into(),
    }
}
