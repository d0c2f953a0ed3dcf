//! Claim identity resolution. Derives the key eligibility lookups are made with
//! from the raw facts of a request, minting a session marker when the client has none.

use failure::Error as FailureError;
use rand::{OsRng, Rng};

use models::{Identity, RequestMeta, ResolvedIdentity};
use types::SessionMarker;

pub const SESSION_MARKER_BYTES: usize = 16;
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Fresh random marker, hex encoded
pub fn mint_session_marker() -> Result<SessionMarker, FailureError> {
    let mut rng = OsRng::new()?;
    let mut bytes = [0u8; SESSION_MARKER_BYTES];
    rng.fill_bytes(&mut bytes);
    let hex = bytes.iter().map(|byte| format!("{:02x}", byte)).collect::<String>();
    Ok(SessionMarker(hex))
}

/// Markers we minted are exactly 32 lowercase hex chars, anything else is discarded
pub fn is_well_formed(marker: &str) -> bool {
    marker.len() == SESSION_MARKER_BYTES * 2 && marker.chars().all(|c| c.is_digit(16) && !c.is_uppercase())
}

/// Never fails for lack of input: a missing address becomes "unknown",
/// a missing or malformed marker is replaced with a minted one.
pub fn resolve_identity(meta: &RequestMeta) -> Result<ResolvedIdentity, FailureError> {
    let address = meta
        .address
        .as_ref()
        .map(|address| address.trim())
        .filter(|address| !address.is_empty())
        .map(|address| address.to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

    let existing = meta
        .session_marker
        .as_ref()
        .filter(|marker| is_well_formed(marker))
        .map(|marker| SessionMarker(marker.clone()));

    let (session_marker, minted) = match existing {
        Some(marker) => (marker, None),
        None => {
            let marker = mint_session_marker()?;
            (marker.clone(), Some(marker))
        }
    };

    Ok(ResolvedIdentity {
        identity: Identity {
            address,
            session_marker,
            user_id: meta.user_id,
        },
        minted,
    })
}
