use crate::credentials::CredentialRecord;

/// Tokens are treated as expired this long before their recorded expiry,
/// so a token cannot lapse while a downstream vendor call is in flight.
pub const SAFETY_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The stored access token may be used as is
    Reusable,
    /// The access token is missing, expired, or inside the safety margin
    Stale,
}

/// Decide whether `record`'s access token may be reused at `now_ms`.
pub fn evaluate(record: &CredentialRecord, now_ms: i64) -> Freshness {
    match (record.access_token(), record.expiry_date) {
        (Some(_), Some(expiry)) if now_ms < expiry.saturating_sub(SAFETY_MARGIN_MS) => {
            Freshness::Reusable
        }
        _ => Freshness::Stale,
    }
}
