//! Conversation controller
//!
//! Translates inbound Telegram updates into session reads/writes and
//! tracker commands. Stateless request/response glue: all conversation
//! state lives in the [`SessionStore`], all background work in the
//! [`Tracker`].

use crate::error::BotError;
use crate::feed::PriceSource;
use crate::session::{SessionState, SessionStore};
use crate::telegram::{
    BotCommand, CallbackQuery, InlineButton, InlineKeyboard, Message, TelegramApi, Update,
};
use crate::tracker::{TrackStart, Tracker};
use crate::types::{is_supported, CallbackAction, SUPPORTED_CURRENCIES};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

const START_TEXT: &str = "Hi!\nThis bot shows the current price of a chosen cryptocurrency \
and can watch it until it reaches your target.";

/// The bot's update handler
pub struct CurrencyBot {
    api: Arc<TelegramApi>,
    feed: Arc<dyn PriceSource>,
    tracker: Arc<Tracker>,
    store: Arc<SessionStore>,
}

impl CurrencyBot {
    pub fn new(
        api: Arc<TelegramApi>,
        feed: Arc<dyn PriceSource>,
        tracker: Arc<Tracker>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            api,
            feed,
            tracker,
            store,
        }
    }

    /// Long-poll `getUpdates` forever, dispatching each update on its own
    /// task so a slow price fetch never blocks inbound handling.
    pub async fn run(self: Arc<Self>) {
        info!("update listener started");
        let mut offset: i64 = 0;

        loop {
            match self.api.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let bot = self.clone();
                        tokio::spawn(async move {
                            bot.handle_update(update).await;
                        });
                    }
                }
                Err(e) => {
                    error!("failed to poll updates: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        let chat_id = message.chat.id;

        let Some(text) = message.text.as_deref() else {
            // Stickers, photos and the like: drop and nudge.
            let _ = self.api.delete_message(chat_id, message.message_id).await;
            self.reply(chat_id, "The bot only accepts commands and numbers.")
                .await;
            return;
        };

        if let Some(command) = parse_command(text) {
            self.handle_command(chat_id, command).await;
            return;
        }

        if let SessionState::AwaitingThreshold { .. } = self.store.state(chat_id) {
            self.handle_threshold_input(chat_id, text).await;
            return;
        }

        self.reply(chat_id, "Enter a command.").await;
    }

    async fn handle_command(&self, chat_id: i64, command: &str) {
        info!(chat_id, command, "command received");
        match command {
            "start" => {
                let keyboard = InlineKeyboard {
                    inline_keyboard: vec![vec![InlineButton::new(
                        "Choose a currency",
                        CallbackAction::StartChoice.encode(),
                    )]],
                };
                if let Err(e) = self
                    .api
                    .send_with_keyboard(chat_id, START_TEXT, &keyboard)
                    .await
                {
                    error!(chat_id, "failed to send start message: {}", e);
                }
            }
            "currencies" => self.show_currency_menu(chat_id).await,
            "track" => self.show_track_menu(chat_id).await,
            _ => {
                self.reply(
                    chat_id,
                    "Unknown command. Available: /start, /currencies, /track",
                )
                .await;
            }
        }
    }

    /// Threshold text while the chat awaits one. A parse failure reprompts
    /// without touching session state; the tracker is only ever called
    /// with a successfully parsed number.
    async fn handle_threshold_input(&self, chat_id: i64, text: &str) {
        let Ok(threshold) = text.trim().parse::<Decimal>() else {
            self.reply(chat_id, "Please enter a number.").await;
            return;
        };

        match self.tracker.start_tracking(chat_id, threshold).await {
            Ok(TrackStart::Started { currency, .. }) => {
                let keyboard = InlineKeyboard {
                    inline_keyboard: vec![vec![InlineButton::new(
                        "Stop tracking",
                        CallbackAction::CancelTrack.encode(),
                    )]],
                };
                let text = format!("Now watching {} until it reaches ${}.", currency, threshold);
                if let Err(e) = self.api.send_with_keyboard(chat_id, &text, &keyboard).await {
                    error!(chat_id, "failed to confirm tracking start: {}", e);
                }
            }
            // The tracker already sent the trigger notification.
            Ok(TrackStart::Triggered { .. }) => {}
            Err(BotError::InvalidThreshold(_)) => {
                self.reply(chat_id, "The target price cannot be negative.")
                    .await;
            }
            Err(BotError::MissingBaseline(_)) => {
                self.reply(chat_id, "Please reselect a currency with /track first.")
                    .await;
            }
            Err(e) => {
                error!(chat_id, "start_tracking failed: {}", e);
                self.reply(chat_id, "Something went wrong, please try again.")
                    .await;
            }
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        if let Err(e) = self.api.answer_callback(&callback.id).await {
            warn!("failed to answer callback query: {}", e);
        }

        let Some(message) = callback.message else {
            return;
        };
        let chat_id = message.chat.id;

        let Some(action) = callback.data.as_deref().and_then(CallbackAction::parse) else {
            warn!(chat_id, data = ?callback.data, "unrecognized callback data");
            return;
        };

        match action {
            CallbackAction::StartChoice => {
                let _ = self.api.delete_message(chat_id, message.message_id).await;
                self.show_currency_menu(chat_id).await;
            }
            CallbackAction::ChangeCurrency => {
                self.show_currency_menu(chat_id).await;
            }
            CallbackAction::SelectCurrency(symbol) => {
                let _ = self.api.delete_message(chat_id, message.message_id).await;
                self.handle_select(chat_id, &symbol).await;
            }
            CallbackAction::StartTrack(symbol) => {
                let _ = self.api.delete_message(chat_id, message.message_id).await;
                self.handle_track_selection(chat_id, &symbol).await;
            }
            CallbackAction::CancelTrack => {
                self.tracker.cancel_tracking(chat_id);
                self.reply(chat_id, "Tracking stopped.").await;
            }
        }
    }

    /// One-off price lookup for a selected currency
    async fn handle_select(&self, chat_id: i64, symbol: &str) {
        if !is_supported(symbol) {
            warn!(chat_id, symbol, "unsupported currency in callback");
            return;
        }

        match self.feed.price(symbol).await {
            Ok(price) => {
                self.store.upsert(chat_id, |s| {
                    s.state = SessionState::CurrencySelected {
                        currency: symbol.to_string(),
                    };
                });

                let keyboard = InlineKeyboard {
                    inline_keyboard: vec![vec![InlineButton::new(
                        "Pick another currency",
                        CallbackAction::ChangeCurrency.encode(),
                    )]],
                };
                let text = format!("{}: ${}", symbol, price);
                if let Err(e) = self.api.send_with_keyboard(chat_id, &text, &keyboard).await {
                    error!(chat_id, "failed to send price: {}", e);
                }
            }
            Err(e) => {
                warn!(chat_id, symbol, "price lookup failed: {}", e);
                self.reply(chat_id, &feed_error_text(&e)).await;
            }
        }
    }

    /// Currency chosen for tracking: the quoted price becomes the
    /// baseline and is captured exactly once, here.
    async fn handle_track_selection(&self, chat_id: i64, symbol: &str) {
        if !is_supported(symbol) {
            warn!(chat_id, symbol, "unsupported currency in callback");
            return;
        }

        match self.feed.price(symbol).await {
            Ok(price) => {
                self.store.upsert(chat_id, |s| {
                    s.state = SessionState::AwaitingThreshold {
                        currency: symbol.to_string(),
                        baseline: price,
                    };
                });

                let text = format!("{}: ${}\nEnter your target price.", symbol, price);
                self.reply(chat_id, &text).await;
            }
            Err(e) => {
                warn!(chat_id, symbol, "baseline lookup failed: {}", e);
                self.reply(chat_id, &feed_error_text(&e)).await;
            }
        }
    }

    async fn show_currency_menu(&self, chat_id: i64) {
        self.store.upsert(chat_id, |s| {
            s.state = SessionState::AwaitingCurrencySelection;
        });
        let keyboard = currency_keyboard(|symbol| CallbackAction::SelectCurrency(symbol.to_string()));
        if let Err(e) = self
            .api
            .send_with_keyboard(chat_id, "Choose a currency:", &keyboard)
            .await
        {
            error!(chat_id, "failed to send currency menu: {}", e);
        }
    }

    async fn show_track_menu(&self, chat_id: i64) {
        let keyboard = currency_keyboard(|symbol| CallbackAction::StartTrack(symbol.to_string()));
        if let Err(e) = self
            .api
            .send_with_keyboard(chat_id, "Choose a currency to track:", &keyboard)
            .await
        {
            error!(chat_id, "failed to send track menu: {}", e);
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.api.send_message(chat_id, text).await {
            error!(chat_id, "failed to send reply: {}", e);
        }
    }
}

/// The command menu registered with Telegram at startup, one entry per
/// command the router understands
pub fn command_menu() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Start the bot."),
        BotCommand::new(
            "currencies",
            "Show the current price of a chosen currency.",
        ),
        BotCommand::new("track", "Watch a currency until it reaches a target price."),
    ]
}

/// `/command@BotName args` → `command`; `None` for non-command text
fn parse_command(text: &str) -> Option<&str> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let word = rest.split_whitespace().next().unwrap_or("");
    let command = word.split('@').next().unwrap_or(word);
    if command.is_empty() {
        None
    } else {
        Some(command)
    }
}

/// 2×2 inline keyboard over the supported currencies
fn currency_keyboard(action: impl Fn(&str) -> CallbackAction) -> InlineKeyboard {
    let buttons: Vec<InlineButton> = SUPPORTED_CURRENCIES
        .iter()
        .map(|(name, symbol)| InlineButton::new(*name, action(symbol).encode()))
        .collect();

    InlineKeyboard {
        inline_keyboard: buttons.chunks(2).map(|row| row.to_vec()).collect(),
    }
}

fn feed_error_text(error: &BotError) -> String {
    match error {
        BotError::CurrencyNotFound(symbol) => {
            format!("The price feed does not know {}.", symbol)
        }
        _ => "Couldn't fetch the price right now, please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start"));
        assert_eq!(parse_command("/track@CoinwatchBot"), Some("track"));
        assert_eq!(parse_command("/currencies now"), Some("currencies"));
        assert_eq!(parse_command("  /start  "), Some("start"));
    }

    #[test]
    fn test_parse_command_rejects_plain_text() {
        assert_eq!(parse_command("100.5"), None);
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_command_menu_matches_router() {
        let menu = command_menu();
        let names: Vec<&str> = menu.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(names, vec!["start", "currencies", "track"]);
        for entry in &menu {
            assert!(!entry.description.is_empty());
        }
    }

    #[test]
    fn test_currency_keyboard_layout() {
        let keyboard = currency_keyboard(|s| CallbackAction::SelectCurrency(s.to_string()));
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
        assert_eq!(keyboard.inline_keyboard[1].len(), 2);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Bitcoin");
        assert_eq!(keyboard.inline_keyboard[0][0].callback_data, "select|BTC");
        assert_eq!(keyboard.inline_keyboard[1][1].callback_data, "select|DOGE");
    }

    #[test]
    fn test_track_keyboard_uses_track_action() {
        let keyboard = currency_keyboard(|s| CallbackAction::StartTrack(s.to_string()));
        assert_eq!(keyboard.inline_keyboard[0][1].callback_data, "track|ETH");
    }

    #[test]
    fn test_threshold_parses_as_decimal() {
        assert!("100".parse::<Decimal>().is_ok());
        assert!("27123.45".parse::<Decimal>().is_ok());
        assert!("-5".parse::<Decimal>().is_ok()); // rejected later by the tracker
        assert!("ten".parse::<Decimal>().is_err());
        assert!("".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_feed_error_text() {
        let text = feed_error_text(&BotError::CurrencyNotFound("XYZ".into()));
        assert!(text.contains("XYZ"));

        let text = feed_error_text(&BotError::FeedUnavailable("503".into()));
        assert!(text.contains("try again"));
    }
}
