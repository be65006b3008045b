//! Error types for the bot

use thiserror::Error;

/// All errors the bot can produce
#[derive(Debug, Error)]
pub enum BotError {
    /// The price feed does not know this currency symbol
    #[error("unknown currency: {0}")]
    CurrencyNotFound(String),

    /// The price feed is unreachable, rate-limited, or returned a server error
    #[error("price feed unavailable: {0}")]
    FeedUnavailable(String),

    /// The price feed answered with an unexpected response shape
    #[error("malformed feed response: {0}")]
    MalformedQuote(String),

    /// Tracking was requested without a live baseline price for the chat
    #[error("no baseline price for chat {0}; a currency must be reselected")]
    MissingBaseline(i64),

    /// Threshold failed validation (negative or otherwise unusable)
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Telegram Bot API rejected a request
    #[error("telegram api error: {0}")]
    Telegram(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BotError::MissingBaseline(7);
        assert!(err.to_string().contains("chat 7"));

        let err = BotError::CurrencyNotFound("XYZ".into());
        assert_eq!(err.to_string(), "unknown currency: XYZ");
    }
}
