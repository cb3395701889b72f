//! The numeric captcha challenge gating entry into the funnel.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const CAPTCHA_LENGTH_MIN: usize = 4;
pub const CAPTCHA_LENGTH_MAX: usize = 6;

/// A freshly issued challenge. The code and expiry are persisted on the session; the challenge
/// itself holds no other state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Generates a numeric code of uniformly random length between 4 and 6 digits, valid for
/// `timeout` from now.
pub fn generate_challenge(timeout: Duration) -> CaptchaChallenge {
    let mut rng = rand::thread_rng();
    let length = rng.gen_range(CAPTCHA_LENGTH_MIN..=CAPTCHA_LENGTH_MAX);
    let code = (0..length).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();
    CaptchaChallenge { code, expires_at: Utc::now() + timeout }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaOutcome {
    Verified,
    Expired,
    Mismatch,
}

/// Checks a user response against the stored code. The expiry check strictly precedes the
/// equality check: a correct answer to an expired challenge still counts as expired.
pub fn verify(code: &str, expires_at: DateTime<Utc>, response: &str, now: DateTime<Utc>) -> CaptchaOutcome {
    if now > expires_at {
        CaptchaOutcome::Expired
    } else if response == code {
        CaptchaOutcome::Verified
    } else {
        CaptchaOutcome::Mismatch
    }
}
