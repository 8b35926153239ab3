//! Stateless email verification for the CRM request relay.
//!
//! Every piece of state that must survive between the send, verify and submit
//! steps travels inside an HMAC-signed token handed back to the caller:
//!
//! - a *challenge* token (`purpose = "email-otp"`) binds an email address to a
//!   keyed hash of the one-time code, its expiry and a nonce;
//! - a *proof* token (`purpose = "email-verified"`) attests that the code was
//!   presented before the proof's own expiry.
//!
//! Nothing here performs I/O or reads the clock; callers pass `now` explicitly.

pub mod claims;
pub mod code;
pub mod email;
pub mod otp;
pub mod token;

pub use claims::{ChallengeClaims, Claims, ProofClaims, PURPOSE_EMAIL_OTP, PURPOSE_EMAIL_VERIFIED};
pub use code::{generate_nonce, generate_verification_code, is_verification_code, CODE_LEN};
pub use email::{is_valid_email, mask_email, normalize_email};
pub use otp::{
    ChallengeAttempt, ChallengeRejection, IssuedChallenge, IssuedProof, OtpAuthority, OtpError,
    ProofPresentation, ProofRejection, DEFAULT_OTP_TTL_SECS, DEFAULT_PROOF_TTL_SECS,
};
pub use token::{TokenError, TokenSigner, MAX_TOKEN_LEN};
