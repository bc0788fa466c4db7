//! Shared constants and defaults.

/// Upper bound for the stored `last_error` detail, in characters.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 1000;

/// Longest accepted entity id, in characters (`event_tasks.entity_id`).
pub const MAX_ENTITY_ID_LENGTH: usize = 255;

/// Header carrying the correlation id on inbound and outbound HTTP.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "POLLER_CONFIG_PATH";

/// Prefix for environment overrides, e.g. `POLLER__SCHEDULER__BATCH_SIZE`.
pub const CONFIG_ENV_PREFIX: &str = "POLLER";

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/poller.toml";

/// Truncate an error detail to at most `max_chars` characters, keeping the prefix.
///
/// Counts `char`s, not bytes, so multi-byte messages never split a code point.
pub fn truncate_error_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => message[..byte_idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_message_keeps_prefix() {
        let message: String = "abcdefghij".repeat(150);
        let truncated = truncate_error_message(&message, MAX_ERROR_MESSAGE_LENGTH);
        assert_eq!(truncated.chars().count(), 1000);
        assert!(message.starts_with(&truncated));
    }

    #[test]
    fn test_truncate_short_message_untouched() {
        assert_eq!(truncate_error_message("boom", 1000), "boom");
        assert_eq!(truncate_error_message("", 1000), "");
    }

    #[test]
    fn test_truncate_multibyte() {
        let message = "é".repeat(1200);
        let truncated = truncate_error_message(&message, 1000);
        assert_eq!(truncated.chars().count(), 1000);
    }
}
