use thiserror::Error;

/// 外部提交失敗的分類，用於顯示給使用者的訊息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFailureKind {
    Network,
    Timeout,
    NotFound,
    Server,
    Rejected,
}

impl SubmissionFailureKind {
    /// 依 HTTP 狀態碼分類
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 | 500..=599 => Self::Server,
            _ => Self::Rejected,
        }
    }

    /// 是否值得重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server)
    }
}

impl std::fmt::Display for SubmissionFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::NotFound => "not-found",
            Self::Server => "server",
            Self::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Provider '{provider}' has no checkout endpoint configured for '{endpoint}'")]
    MissingEndpointError { provider: String, endpoint: String },

    #[error("Validation error for {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Persistence error on '{key}': {message}")]
    PersistenceError { key: String, message: String },

    #[error("Submission failed ({kind}) after {attempts} attempt(s): {detail}")]
    SubmissionError {
        kind: SubmissionFailureKind,
        attempts: u32,
        detail: String,
    },

    #[error("Hand-off step '{step}' timed out after {seconds}s")]
    HandoffTimeoutError { step: String, seconds: u64 },

    #[error("Navigation failed: {message}")]
    NavigationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Persistence,
    Submission,
    Navigation,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CheckoutError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingEndpointError { .. } => ErrorCategory::Configuration,
            Self::ValidationError { .. } => ErrorCategory::Validation,
            Self::PersistenceError { .. } | Self::SerializationError(_) => {
                ErrorCategory::Persistence
            }
            Self::SubmissionError { .. } | Self::HandoffTimeoutError { .. } => {
                ErrorCategory::Submission
            }
            Self::NavigationError { .. } => ErrorCategory::Navigation,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation => ErrorSeverity::Low,
            ErrorCategory::Submission | ErrorCategory::Navigation => ErrorSeverity::Medium,
            ErrorCategory::Persistence => ErrorSeverity::High,
            // 設定錯誤會導致錯誤收費，一律視為最嚴重
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 提交失敗的分類（非提交錯誤回傳 None）
    pub fn submission_kind(&self) -> Option<SubmissionFailureKind> {
        match self {
            Self::SubmissionError { kind, .. } => Some(*kind),
            Self::HandoffTimeoutError { .. } => Some(SubmissionFailureKind::Timeout),
            _ => None,
        }
    }

    /// 給終端使用者看的訊息，不含內部細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::SubmissionError { kind, .. } => match kind {
                SubmissionFailureKind::Network => {
                    "We could not reach our servers. Please check your connection.".to_string()
                }
                SubmissionFailureKind::Timeout => {
                    "The request took too long to complete.".to_string()
                }
                SubmissionFailureKind::NotFound => {
                    "The order service could not be found.".to_string()
                }
                SubmissionFailureKind::Server => {
                    "Our order service is having trouble right now.".to_string()
                }
                SubmissionFailureKind::Rejected => {
                    "Your order details were not accepted.".to_string()
                }
            },
            Self::HandoffTimeoutError { .. } => {
                "The request took too long to complete.".to_string()
            }
            Self::ValidationError { field, message } => format!("Please check {}: {}", field, message),
            Self::NavigationError { .. } => "We could not open the checkout page.".to_string(),
            Self::PersistenceError { .. } | Self::SerializationError(_) => {
                "Your progress could not be saved.".to_string()
            }
            _ => "Checkout is temporarily unavailable.".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::SubmissionError { kind, .. } => match kind {
                SubmissionFailureKind::Network | SubmissionFailureKind::Timeout => {
                    "Check your internet connection and try again.".to_string()
                }
                SubmissionFailureKind::NotFound => {
                    "Verify submission.endpoint in the configuration.".to_string()
                }
                SubmissionFailureKind::Server => "Wait a moment and try again.".to_string(),
                SubmissionFailureKind::Rejected => {
                    "Review the contact details and try again.".to_string()
                }
            },
            Self::HandoffTimeoutError { .. } => "Try again in a moment.".to_string(),
            Self::MissingEndpointError { provider, endpoint } => format!(
                "Add providers.{}.endpoints.{} to the configuration.",
                provider, endpoint
            ),
            Self::MissingConfigError { field } => format!("Set '{}' in the configuration.", field),
            Self::InvalidConfigValueError { field, .. }
            | Self::ConfigValidationError { field, .. } => {
                format!("Fix the value of '{}' in the configuration.", field)
            }
            Self::ConfigError { .. } => "Review the configuration file.".to_string(),
            Self::ValidationError { .. } => "Correct the highlighted field.".to_string(),
            Self::PersistenceError { .. } | Self::SerializationError(_) | Self::IoError(_) => {
                "Check that the session file is writable.".to_string()
            }
            Self::NavigationError { .. } => "Open the checkout link manually.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
