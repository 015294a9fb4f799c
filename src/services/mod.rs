pub mod gift_cards;
pub mod transaction_status;

pub use gift_cards::GiftCardService;
pub use transaction_status::{SatelliteKind, SatelliteOutcome, StatusUpdateOutcome, TransactionStatusService};
