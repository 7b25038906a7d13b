use crate::utils::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use url::Url;

/// 上傳照片可接受的 URL scheme
pub const ACCEPTED_PHOTO_SCHEMES: [&str; 2] = ["https", "http"];

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(CheckoutError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// 照片 URL 只檢查 scheme，其餘內容原樣轉送
pub fn validate_photo_url(field_name: &str, url_str: &str) -> Result<()> {
    let accepted = ACCEPTED_PHOTO_SCHEMES.iter().any(|scheme| {
        url_str
            .get(..scheme.len() + 3)
            .map(|prefix| prefix.eq_ignore_ascii_case(&format!("{}://", scheme)))
            .unwrap_or(false)
    });

    if accepted {
        Ok(())
    } else {
        Err(CheckoutError::ValidationError {
            field: field_name.to_string(),
            message: format!(
                "Photo URL must start with one of: {}",
                ACCEPTED_PHOTO_SCHEMES
                    .iter()
                    .map(|s| format!("{}://", s))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_price(field_name: &str, value: Decimal) -> Result<()> {
    if value.is_sign_negative() {
        return Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Price cannot be negative".to_string(),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| CheckoutError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CheckoutError::ValidationError {
            field: field_name.to_string(),
            message: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 只做基本格式檢查，細部驗證由精靈步驟負責
pub fn validate_email(field_name: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid || trimmed.contains(char::is_whitespace) {
        return Err(CheckoutError::ValidationError {
            field: field_name.to_string(),
            message: format!("'{}' is not a valid email address", value),
        });
    }
    Ok(())
}
