//! Challenge issue/verify and proof issue/check.
//!
//! A challenge token never carries the code itself, only
//! `HMAC(secret, email|code|exp|nonce)`. Reading a challenge token therefore
//! tells an interceptor nothing about the code, and a hash from one challenge
//! cannot be reused for another because the nonce differs.
//!
//! Challenges are not consumed on success: the same code and token verify
//! repeatedly until `exp`. There is no store to record consumption in.

use chrono::{DateTime, SecondsFormat, Utc};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::claims::{ChallengeClaims, Claims, ProofClaims};
use crate::code::{generate_nonce, generate_verification_code, is_verification_code};
use crate::email::{is_valid_email, normalize_email};
use crate::token::{TokenError, TokenSigner};

pub const DEFAULT_OTP_TTL_SECS: u64 = 600;
pub const DEFAULT_PROOF_TTL_SECS: u64 = 1800;

/// Why a verify-code request was refused. `Display` is the caller-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChallengeRejection {
    #[error("Invalid verification request.")]
    MalformedRequest,
    #[error("Invalid or mismatched verification token.")]
    InvalidToken,
    #[error("Verification code has expired. Please request a new code.")]
    Expired,
    #[error("Incorrect verification code.")]
    IncorrectCode,
}

/// Why a submission's proof was refused. `Display` is the caller-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProofRejection {
    #[error("Email verification is required before submission.")]
    Missing,
    #[error("Invalid email verification proof.")]
    Invalid,
    #[error("Email verification has expired. Please verify again.")]
    Expired,
    #[error("Email verification does not match the submitted email.")]
    EmailMismatch,
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error(transparent)]
    Rejected(#[from] ChallengeRejection),
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// A freshly issued challenge. `code` goes to the mailbox, `token` to the caller.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub token: String,
    pub code: String,
    pub email: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedProof {
    pub token: String,
    pub email: String,
    pub verified_at: String,
    pub expires_at_ms: i64,
}

/// Syntactically valid verify-code input, email already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeAttempt {
    email: String,
    code: String,
    token: String,
}

impl ChallengeAttempt {
    pub fn parse(email: &str, code: &str, token: &str) -> Result<Self, ChallengeRejection> {
        let email = normalize_email(email);
        let code = code.trim();
        let token = token.trim();
        if !is_valid_email(&email) || !is_verification_code(code) || token.is_empty() {
            return Err(ChallengeRejection::MalformedRequest);
        }
        Ok(Self {
            email,
            code: code.to_string(),
            token: token.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// The contact email of a submission together with the proof it presents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofPresentation {
    contact_email: String,
    token: String,
}

impl ProofPresentation {
    pub fn new(contact_email: &str, proof_token: Option<&str>) -> Result<Self, ProofRejection> {
        let contact_email = normalize_email(contact_email);
        let token = proof_token.map(str::trim).unwrap_or_default();
        if contact_email.is_empty() || token.is_empty() {
            return Err(ProofRejection::Missing);
        }
        Ok(Self {
            contact_email,
            token: token.to_string(),
        })
    }
}

/// Issues and checks challenges and proofs under one signing secret.
#[derive(Debug)]
pub struct OtpAuthority {
    signer: TokenSigner,
    otp_ttl_secs: u64,
    proof_ttl_secs: u64,
}

impl OtpAuthority {
    pub fn new(
        secret: impl AsRef<[u8]>,
        otp_ttl_secs: u64,
        proof_ttl_secs: u64,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            signer: TokenSigner::new(secret)?,
            otp_ttl_secs,
            proof_ttl_secs,
        })
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn otp_ttl_secs(&self) -> u64 {
        self.otp_ttl_secs
    }

    pub fn proof_ttl_secs(&self) -> u64 {
        self.proof_ttl_secs
    }

    /// Draw a new code and wrap its hash in a signed challenge token.
    ///
    /// The caller is expected to have validated the email already.
    pub fn issue_challenge(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, TokenError> {
        let code = generate_verification_code();
        self.challenge_for_code(email, code, now)
    }

    fn challenge_for_code(
        &self,
        email: &str,
        code: String,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, TokenError> {
        let email = normalize_email(email);
        let exp = expiry_ms(now, self.otp_ttl_secs);
        let nonce = generate_nonce();
        let otp_hash = self.otp_hash(&email, &code, exp, &nonce)?;
        let token = self.signer.sign(&Claims::Challenge(ChallengeClaims {
            email: email.clone(),
            exp,
            nonce,
            otp_hash,
        }))?;
        Ok(IssuedChallenge {
            token,
            code,
            email,
            expires_at_ms: exp,
        })
    }

    /// Check a code against its challenge token and mint a proof on success.
    pub fn verify_challenge(
        &self,
        attempt: &ChallengeAttempt,
        now: DateTime<Utc>,
    ) -> Result<IssuedProof, OtpError> {
        let challenge = match self.signer.verify::<Claims>(&attempt.token) {
            Some(Claims::Challenge(c)) if normalize_email(&c.email) == attempt.email => c,
            _ => return Err(ChallengeRejection::InvalidToken.into()),
        };
        if challenge.exp < now.timestamp_millis() {
            return Err(ChallengeRejection::Expired.into());
        }

        let expected = self.otp_hash(
            &attempt.email,
            &attempt.code,
            challenge.exp,
            &challenge.nonce,
        )?;
        if !bool::from(expected.as_bytes().ct_eq(challenge.otp_hash.as_bytes())) {
            return Err(ChallengeRejection::IncorrectCode.into());
        }

        Ok(self.issue_proof(&attempt.email, now)?)
    }

    pub fn issue_proof(&self, email: &str, now: DateTime<Utc>) -> Result<IssuedProof, TokenError> {
        let email = normalize_email(email);
        let verified_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let exp = expiry_ms(now, self.proof_ttl_secs);
        let token = self.signer.sign(&Claims::Proof(ProofClaims {
            email: email.clone(),
            verified_at: verified_at.clone(),
            exp,
        }))?;
        Ok(IssuedProof {
            token,
            email,
            verified_at,
            expires_at_ms: exp,
        })
    }

    /// Accept a proof only if it is genuine, unexpired and for the contact email.
    pub fn check_proof(
        &self,
        presentation: &ProofPresentation,
        now: DateTime<Utc>,
    ) -> Result<ProofClaims, ProofRejection> {
        let proof = match self.signer.verify::<Claims>(&presentation.token) {
            Some(Claims::Proof(p)) => p,
            _ => return Err(ProofRejection::Invalid),
        };
        if proof.exp < now.timestamp_millis() {
            return Err(ProofRejection::Expired);
        }
        if normalize_email(&proof.email) != presentation.contact_email {
            return Err(ProofRejection::EmailMismatch);
        }
        Ok(proof)
    }

    fn otp_hash(&self, email: &str, code: &str, exp: i64, nonce: &str) -> Result<String, TokenError> {
        let message = format!("{email}|{code}|{exp}|{nonce}");
        self.signer.keyed_digest_hex(message.as_bytes())
    }
}

fn expiry_ms(now: DateTime<Utc>, ttl_secs: u64) -> i64 {
    let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    now.timestamp_millis().saturating_add(ttl_ms)
}
