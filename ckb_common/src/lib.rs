mod crypto_amount;
pub mod op;
mod rub;
mod secret;

pub use crypto_amount::CryptoAmount;
pub use rub::{Rub, FIAT_CURRENCY_CODE, FIAT_SYMBOL};
pub use secret::Secret;
