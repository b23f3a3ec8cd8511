//! Claim views sent over the wire.
//!
//! The durable row lives in [`crate::storage::ClaimRow`]; these types shape
//! what each audience may see. Owners see the full claim; a scanner gets
//! only the account number and issue time — never the owner.

pub mod issuer;
pub mod resolver;

use serde::Serialize;

use crate::storage::ClaimRow;

/// Owner-facing view of a claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimView {
    pub id: String,
    pub account_number: String,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<ClaimRow> for ClaimView {
    fn from(c: ClaimRow) -> Self {
        Self {
            id: c.id,
            account_number: c.account_number,
            image_url: c.image_url,
            created_at: c.created_at,
        }
    }
}

/// What a successful resolution reveals to whoever scanned the code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedClaim {
    pub account_number: String,
    pub created_at: String,
}

impl From<ClaimRow> for ResolvedClaim {
    fn from(c: ClaimRow) -> Self {
        Self {
            account_number: c.account_number,
            created_at: c.created_at,
        }
    }
}
