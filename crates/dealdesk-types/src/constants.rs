//! System-wide constants for the DealDesk escrow desk.

/// Decimal places kept for fiat amounts (prices, totals, limits).
pub const FIAT_PRECISION: u32 = 2;

/// Maximum decimal places accepted for asset quantities.
pub const QTY_PRECISION: u32 = 8;

/// Largest quantity a listing may carry, in whole units of its asset.
pub const MAX_LISTING_QUANTITY: i64 = 1_000_000_000_000_000;

/// Default time the buyer has to pay after a deal is opened.
pub const DEFAULT_PAYMENT_TIME_MINUTES: u32 = 15;

/// Shortest payment window a listing may configure.
pub const MIN_PAYMENT_TIME_MINUTES: u32 = 5;

/// Longest payment window a listing may configure.
pub const MAX_PAYMENT_TIME_MINUTES: u32 = 180;

/// After a payment claim, how long until either party may cancel alone.
pub const DEFAULT_POST_CLAIM_CANCEL_MINUTES: u32 = 60;

/// Interval of the background expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Lower bound (exclusive) of a market-relative price premium, in percent.
pub const MIN_PRICE_PREMIUM_PERCENT: i64 = -100;

/// Upper bound (inclusive) of a market-relative price premium, in percent.
pub const MAX_PRICE_PREMIUM_PERCENT: i64 = 1000;

/// Maximum length of free-text fields (terms, reasons, payment details).
pub const MAX_TEXT_LEN: usize = 1000;

/// Cancellation reason recorded when the payment deadline elapses.
pub const TIMEOUT_REASON: &str = "timeout";

/// Default API listen port.
pub const DEFAULT_API_PORT: u16 = 3001;

/// Assets the wallet collaborator supports out of the box.
pub const DEFAULT_SUPPORTED_ASSETS: &[&str] = &["BTC", "ETH", "USDT", "TON", "TRX", "SOL"];

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "DealDesk";
