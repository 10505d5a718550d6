#![forbid(unsafe_code)]

//! Bridge configuration (deterministic, env-overridable).
//!
//! # Environment Variables
//! - `CELLBRIDGE_RETENTION` = owned|attached
//! - `CELLBRIDGE_LABEL` (string, used in tracing spans)
//! - `CELLBRIDGE_WRITE_BACK_INITIAL` (bool)

use std::env;
use std::fmt;

const ENV_RETENTION: &str = "CELLBRIDGE_RETENTION";
const ENV_LABEL: &str = "CELLBRIDGE_LABEL";
const ENV_WRITE_BACK_INITIAL: &str = "CELLBRIDGE_WRITE_BACK_INITIAL";

/// Who keeps the stream-side subscription of a bridge alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// The caller owns the subscription through a `BridgedStream`. Dropping
    /// it tears the bridge down; dropping every stream handle frees the
    /// stream.
    #[default]
    Owned,
    /// The stream owns the subscription, and the subscription owns the
    /// stream. The stream outlives its external handles until it completes.
    Attached,
}

impl Retention {
    /// Parse `owned` or `attached` (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owned" => Some(Self::Owned),
            "attached" => Some(Self::Attached),
            _ => None,
        }
    }

    /// Lowercase name as accepted by [`Retention::parse`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owned => "owned",
            Self::Attached => "attached",
        }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a cell/stream bridge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeConfig {
    /// Ownership of the stream-side subscription.
    pub retention: Retention,
    /// Name attached to the bridge's tracing spans.
    pub label: Option<String>,
    /// Write the stream's replay of the initial value back into the cell
    /// when the bridge subscribes. Off by default: the replay is the cell's
    /// own value and is treated as an echo.
    pub write_back_initial: bool,
}

impl BridgeConfig {
    /// Default configuration: owned retention, no label.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration reproducing the self-retaining attached pattern.
    #[must_use]
    pub fn attached() -> Self {
        Self {
            retention: Retention::Attached,
            ..Default::default()
        }
    }

    /// Set the retention policy.
    #[must_use]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Set the tracing label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Enable or disable writing the initial replay back into the cell.
    #[must_use]
    pub fn with_write_back_initial(mut self, enabled: bool) -> Self {
        self.write_back_initial = enabled;
        self
    }

    /// Label used in tracing output.
    #[must_use]
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("bridge")
    }

    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> BridgeConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> BridgeConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<BridgeConfigError>> {
        let mut errors = Vec::new();
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                errors.push(BridgeConfigError::new(
                    "label",
                    label.clone(),
                    "must not be blank",
                ));
            } else if label.chars().any(char::is_control) {
                errors.push(BridgeConfigError::new(
                    "label",
                    label.escape_debug().to_string(),
                    "must not contain control characters",
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct BridgeConfigParse {
    pub config: BridgeConfig,
    pub errors: Vec<BridgeConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl BridgeConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BridgeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for BridgeConfigError {}

fn from_env_with<F>(mut get: F) -> BridgeConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = BridgeConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = get(ENV_RETENTION) {
        match Retention::parse(&value) {
            Some(parsed) => config.retention = parsed,
            None => errors.push(BridgeConfigError::new(
                "retention",
                value,
                "expected owned|attached",
            )),
        }
    }

    if let Some(value) = get(ENV_LABEL) {
        let trimmed = value.trim();
        config.label = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    if let Some(value) = get(ENV_WRITE_BACK_INITIAL) {
        match parse_bool(&value) {
            Some(parsed) => config.write_back_initial = parsed,
            None => errors.push(BridgeConfigError::new(
                "write_back_initial",
                value,
                "expected bool (1/0/true/false)",
            )),
        }
    }

    if let Err(mut validation) = config.validate() {
        errors.append(&mut validation);
    }

    BridgeConfigParse { config, errors }
}

#[inline]
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
