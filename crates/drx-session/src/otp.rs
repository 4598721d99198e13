// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOTP code generation from otpauth URIs.
//!
//! The portal's 2FA form rejects codes that expire mid-submission, so
//! [`OtpProvider::fresh`] refuses to hand out a code with fewer than the
//! requested seconds of validity left and instead waits for the next period.

use thiserror::Error;
use tokio::time::{Duration, sleep};
use totp_rs::TOTP;
use tracing::{debug, warn};

/// Longest [`OtpProvider::fresh`] will wait for a period boundary — slightly
/// more than one standard 30 s period.
const MAX_FRESH_WAIT_SECS: u64 = 35;

/// Errors from OTP parsing or generation.
#[derive(Debug, Error)]
pub enum OtpError {
    /// The URI was not an `otpauth://totp/` URI or had bad parameters.
    #[error("invalid OTP URI: {reason}")]
    InvalidUri {
        /// Parse failure detail.
        reason: String,
    },

    /// The system clock was unusable for TOTP computation.
    #[error("clock error while generating TOTP")]
    Clock,
}

/// Generates TOTP codes for one broker's `otpauth://totp/...` URI.
pub struct OtpProvider {
    totp: TOTP,
}

impl OtpProvider {
    /// Parse an `otpauth://totp/` URI.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidUri`] for other schemes or malformed
    /// parameters.
    pub fn from_uri(uri: &str) -> Result<Self, OtpError> {
        if !uri.starts_with("otpauth://totp/") {
            return Err(OtpError::InvalidUri {
                reason: "must start with 'otpauth://totp/'".to_string(),
            });
        }
        let totp = TOTP::from_url(uri).map_err(|e| OtpError::InvalidUri {
            reason: e.to_string(),
        })?;
        Ok(Self { totp })
    }

    /// The current code and how many seconds it remains valid.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::Clock`] if the system clock is before the epoch.
    pub fn current(&self) -> Result<(String, u64), OtpError> {
        let code = self.totp.generate_current().map_err(|_| OtpError::Clock)?;
        let remaining = self.totp.ttl().map_err(|_| OtpError::Clock)?;
        Ok((code, remaining))
    }

    /// A code with at least `min_remaining` seconds of validity left.
    ///
    /// Waits for the next period when the current code is about to roll
    /// over. After [`MAX_FRESH_WAIT_SECS`] the current code is returned
    /// regardless, so a wedged clock cannot hang login forever.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::Clock`] if code generation itself fails.
    pub async fn fresh(&self, min_remaining: u64) -> Result<String, OtpError> {
        let mut waited = 0u64;
        while waited < MAX_FRESH_WAIT_SECS {
            let (code, remaining) = self.current()?;
            if remaining >= min_remaining {
                debug!(target: "drx.session", remaining, "TOTP code is fresh enough");
                return Ok(code);
            }
            let wait = remaining + 1;
            debug!(target: "drx.session", remaining, wait, "waiting for next TOTP period");
            sleep(Duration::from_secs(wait)).await;
            waited += wait;
        }
        warn!(target: "drx.session", "timed out waiting for a fresh TOTP code, using current");
        Ok(self.current()?.0)
    }
}

impl std::fmt::Debug for OtpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The TOTP value embeds the shared secret.
        f.debug_struct("OtpProvider").finish_non_exhaustive()
    }
}
