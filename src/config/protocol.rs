//! Protocol configuration: message/name limits and username validation rules.

use super::defaults::{
    default_allow_leading_trailing_whitespace, default_allow_spaces_in_usernames,
    default_allow_unicode_usernames, default_allowed_username_symbols, default_max_room_name_length,
    default_max_room_size_limit, default_max_username_length,
};
use serde::{Deserialize, Serialize};

/// Protocol configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Maximum length for room names
    #[serde(default = "default_max_room_name_length")]
    pub max_room_name_length: usize,
    /// Maximum length for usernames
    #[serde(default = "default_max_username_length")]
    pub max_username_length: usize,
    /// Maximum allowed room size
    #[serde(default = "default_max_room_size_limit")]
    pub max_room_size_limit: u32,
    /// Username validation rules
    #[serde(default)]
    pub username_validation: UsernameValidationConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_room_name_length: default_max_room_name_length(),
            max_username_length: default_max_username_length(),
            max_room_size_limit: default_max_room_size_limit(),
            username_validation: UsernameValidationConfig::default(),
        }
    }
}

/// Username validation configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UsernameValidationConfig {
    /// Allow non-ASCII letters/digits (Unicode alphanumerics)
    #[serde(default = "default_allow_unicode_usernames")]
    pub allow_unicode_alphanumeric: bool,
    /// Permit internal spaces
    #[serde(default = "default_allow_spaces_in_usernames")]
    pub allow_spaces: bool,
    /// Permit leading or trailing whitespace
    #[serde(default = "default_allow_leading_trailing_whitespace")]
    pub allow_leading_trailing_whitespace: bool,
    /// Symbol characters always allowed in addition to alphanumerics
    #[serde(default = "default_allowed_username_symbols")]
    pub allowed_symbols: Vec<char>,
    /// Optional string of additional accepted characters
    #[serde(default)]
    pub additional_allowed_characters: Option<String>,
}

impl Default for UsernameValidationConfig {
    fn default() -> Self {
        Self {
            allow_unicode_alphanumeric: default_allow_unicode_usernames(),
            allow_spaces: default_allow_spaces_in_usernames(),
            allow_leading_trailing_whitespace: default_allow_leading_trailing_whitespace(),
            allowed_symbols: default_allowed_username_symbols(),
            additional_allowed_characters: None,
        }
    }
}

impl UsernameValidationConfig {
    pub fn is_allowed_symbol(&self, ch: char) -> bool {
        if self.allowed_symbols.contains(&ch) {
            return true;
        }
        if let Some(extra) = &self.additional_allowed_characters {
            return extra.chars().any(|extra_ch| extra_ch == ch);
        }
        false
    }
}
