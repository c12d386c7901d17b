use crate::config::ProtocolConfig;

pub fn validate_room_name_with_config(name: &str, config: &ProtocolConfig) -> Result<(), String> {
    if name.is_empty() {
        return Err("Room name cannot be empty".to_string());
    }
    if name.len() > config.max_room_name_length {
        return Err(format!(
            "Room name too long (max {} characters)",
            config.max_room_name_length
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ')
    {
        return Err("Room name contains invalid characters".to_string());
    }
    Ok(())
}

pub fn validate_username_with_config(name: &str, config: &ProtocolConfig) -> Result<(), String> {
    if name.is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    if name.len() > config.max_username_length {
        return Err(format!(
            "Username too long (max {} characters)",
            config.max_username_length
        ));
    }

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Username cannot be blank".to_string());
    }

    let rules = &config.username_validation;
    if !rules.allow_leading_trailing_whitespace && trimmed.len() != name.len() {
        return Err("Username cannot have leading or trailing whitespace".to_string());
    }

    for ch in name.chars() {
        if ch == ' ' {
            if rules.allow_spaces {
                continue;
            }
            return Err("Username cannot contain spaces".to_string());
        }

        if ch.is_whitespace() {
            return Err("Username cannot contain whitespace characters".to_string());
        }

        let is_alphanumeric = if rules.allow_unicode_alphanumeric {
            ch.is_alphanumeric()
        } else {
            ch.is_ascii_alphanumeric()
        };

        if is_alphanumeric || rules.is_allowed_symbol(ch) {
            continue;
        }

        return Err("Username contains invalid characters".to_string());
    }

    Ok(())
}

pub fn validate_room_max_size_with_config(
    max_size: u32,
    config: &ProtocolConfig,
) -> Result<(), String> {
    if max_size < 1 {
        return Err("Room max size must be at least 1".to_string());
    }
    if max_size > config.max_room_size_limit {
        return Err(format!(
            "Room max size cannot exceed {}",
            config.max_room_size_limit
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expected_room_name_ok(name: &str, config: &ProtocolConfig) -> bool {
        !name.is_empty()
            && name.len() <= config.max_room_name_length
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ')
    }

    #[test]
    fn room_name_rejects_empty_and_oversized() {
        let config = ProtocolConfig::default();
        assert!(validate_room_name_with_config("lobby", &config).is_ok());
        assert!(validate_room_name_with_config("", &config).is_err());
        assert!(validate_room_name_with_config(&"a".repeat(200), &config).is_err());
    }

    #[test]
    fn username_rejects_blank_and_whitespace_only() {
        let config = ProtocolConfig::default();
        assert!(validate_username_with_config("Player One", &config).is_ok());
        assert!(validate_username_with_config("", &config).is_err());
        assert!(validate_username_with_config("   ", &config).is_err());
    }

    #[test]
    fn room_max_size_respects_bounds() {
        let config = ProtocolConfig::default();
        assert!(validate_room_max_size_with_config(4, &config).is_ok());
        assert!(validate_room_max_size_with_config(0, &config).is_err());
        assert!(validate_room_max_size_with_config(10_000, &config).is_err());
    }

    proptest! {
        #[test]
        fn room_name_validation_matches_predicate(raw in proptest::collection::vec(any::<char>(), 0..=64)) {
            let candidate: String = raw.into_iter().collect();
            let config = ProtocolConfig::default();
            prop_assert_eq!(
                validate_room_name_with_config(&candidate, &config).is_ok(),
                expected_room_name_ok(&candidate, &config)
            );
        }
    }
}
