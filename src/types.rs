//! Shared types: the supported currency table and the inline-keyboard
//! callback-data format.

/// Currencies offered in the selection menus: (display name, symbol)
pub const SUPPORTED_CURRENCIES: &[(&str, &str)] = &[
    ("Bitcoin", "BTC"),
    ("Ethereum", "ETH"),
    ("BNB", "BNB"),
    ("Dogecoin", "DOGE"),
];

/// Whether a symbol is in the supported set
pub fn is_supported(symbol: &str) -> bool {
    SUPPORTED_CURRENCIES.iter().any(|(_, s)| *s == symbol)
}

/// Actions carried in inline-keyboard callback data.
///
/// Wire format is `action` or `action|SYMBOL` with a `|` separator, e.g.
/// `select|BTC` or `cancel_track`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// "Choose a currency" button on the start message
    StartChoice,
    /// "Pick another currency" button on a price reply
    ChangeCurrency,
    /// Currency chosen for a one-off price lookup
    SelectCurrency(String),
    /// Currency chosen for threshold tracking
    StartTrack(String),
    /// "Stop tracking" button
    CancelTrack,
}

impl CallbackAction {
    /// Parse callback data; `None` for unknown actions or missing symbols.
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(2, '|');
        let action = parts.next()?;
        let symbol = parts.next();

        match (action, symbol) {
            ("start_choice", None) => Some(Self::StartChoice),
            ("change", None) => Some(Self::ChangeCurrency),
            ("select", Some(s)) if !s.is_empty() => Some(Self::SelectCurrency(s.to_string())),
            ("track", Some(s)) if !s.is_empty() => Some(Self::StartTrack(s.to_string())),
            ("cancel_track", None) => Some(Self::CancelTrack),
            _ => None,
        }
    }

    /// Encode into callback data
    pub fn encode(&self) -> String {
        match self {
            Self::StartChoice => "start_choice".to_string(),
            Self::ChangeCurrency => "change".to_string(),
            Self::SelectCurrency(s) => format!("select|{}", s),
            Self::StartTrack(s) => format!("track|{}", s),
            Self::CancelTrack => "cancel_track".to_string(),
        }
    }
}
