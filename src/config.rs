//! Paginator configuration

use serde::Deserialize;

use crate::types::Locale;
use crate::PaginationError;

/// Largest page a client may request with `first` or `last`.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Settings shared by every paginated connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginatorConfig {
    /// Upper bound for `first` / `last`
    pub max_page_size: u32,

    /// Report the filter's total count on empty pages instead of zero
    ///
    /// Off by default: an empty page reports `totalCount: 0`, which is what API
    /// clients of the tracker have always received.
    pub count_on_empty_page: bool,

    /// Locale used when a request does not carry one
    pub default_locale: Locale,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            count_on_empty_page: false,
            default_locale: Locale::En,
        }
    }
}

impl PaginatorConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PaginationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_page_size == 0 {
            return Err(PaginationError::Config(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PaginatorConfig::default();
        assert_eq!(config.max_page_size, 100);
        assert!(!config.count_on_empty_page);
        assert_eq!(config.default_locale, Locale::En);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PaginatorConfig::from_json(r#"{"default_locale": "fr"}"#).unwrap();
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.default_locale, Locale::Fr);
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let err = PaginatorConfig::from_json(r#"{"max_page_size": 0}"#).unwrap_err();
        assert!(matches!(err, PaginationError::Config(_)));
    }
}
