//! Transaction handling for the ledger
//!
//! A transaction commits one hop-count measurement on behalf of its owner.
//! The owner is the hex-encoded secp256k1 public key and the signature
//! covers the canonical projection `{dataOwner, hop_count}`.

use crate::crypto::{public_key_from_hex, verify_signature, KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction carries no hop count")]
    MissingPayload,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// A signed measurement waiting to be sealed into a block.
///
/// Wire field names are `dataOwner`, `signature` and `hop_count`; other
/// nodes depend on them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hex-encoded public key of the signer
    #[serde(rename = "dataOwner")]
    pub owner: String,
    /// Hex-encoded compact ECDSA signature
    pub signature: String,
    /// The committed measurement; `null` means absent
    #[serde(rename = "hop_count", default)]
    pub payload: Value,
}

impl Transaction {
    pub fn new(owner: impl Into<String>, signature: impl Into<String>, payload: Value) -> Self {
        Self {
            owner: owner.into(),
            signature: signature.into(),
            payload,
        }
    }

    /// Build and sign a transaction owned by `key_pair`
    pub fn signed(key_pair: &KeyPair, payload: Value) -> Result<Self, TransactionError> {
        let owner = key_pair.public_key_hex();
        let signature = sign_payload(key_pair, &owner, &payload)?;
        Ok(Self::new(owner, signature, payload))
    }

    /// Whether the measurement is present
    pub fn has_payload(&self) -> bool {
        !self.payload.is_null()
    }

    /// The signature-free projection used for signing and proof-of-work
    pub fn canonical(&self) -> Value {
        canonical_projection(&self.owner, &self.payload)
    }

    /// Check the signature against the owner key
    pub fn check_signature(&self) -> Result<(), TransactionError> {
        let public_key = public_key_from_hex(&self.owner)?;
        let signature = hex::decode(&self.signature).map_err(|_| TransactionError::InvalidSignature)?;
        let message = self.canonical().to_string();

        if verify_signature(&public_key, message.as_bytes(), &signature)? {
            Ok(())
        } else {
            Err(TransactionError::InvalidSignature)
        }
    }

    /// Signature check that fails closed on malformed key material
    pub fn verify_signature(&self) -> bool {
        match self.check_signature() {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Signature check failed for {}: {}", self.owner, e);
                false
            }
        }
    }

    /// Full admission check: payload present and signature valid
    pub fn validate(&self) -> Result<(), TransactionError> {
        if !self.has_payload() {
            return Err(TransactionError::MissingPayload);
        }
        self.check_signature()
    }
}

/// `{dataOwner, hop_count}` in that order
pub fn canonical_projection(owner: &str, payload: &Value) -> Value {
    json!({
        "dataOwner": owner,
        "hop_count": payload,
    })
}

/// Sign `(owner, payload)` and return the hex-encoded signature
pub fn sign_payload(
    key_pair: &KeyPair,
    owner: &str,
    payload: &Value,
) -> Result<String, TransactionError> {
    let message = canonical_projection(owner, payload).to_string();
    let signature = key_pair.sign(message.as_bytes())?;
    Ok(hex::encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_transaction_verifies() {
        let kp = KeyPair::generate();
        let tx = Transaction::signed(&kp, json!(4)).unwrap();

        assert_eq!(tx.owner, kp.public_key_hex());
        assert!(tx.verify_signature());
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_altered_payload_fails() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::signed(&kp, json!(4)).unwrap();
        tx.payload = json!(5);

        assert!(!tx.verify_signature());
    }

    #[test]
    fn test_other_owner_fails() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let mut tx = Transaction::signed(&signer, json!("3")).unwrap();
        tx.owner = other.public_key_hex();

        assert!(!tx.verify_signature());
    }

    #[test]
    fn test_malformed_owner_fails_closed() {
        let kp = KeyPair::generate();
        let tx = Transaction::signed(&kp, json!(2)).unwrap();

        let garbage_owner = Transaction::new("not-hex", tx.signature.clone(), json!(2));
        assert!(!garbage_owner.verify_signature());

        let garbage_sig = Transaction::new(tx.owner.clone(), "00ff", json!(2));
        assert!(!garbage_sig.verify_signature());
    }

    #[test]
    fn test_missing_payload_rejected() {
        let kp = KeyPair::generate();
        let tx = Transaction::signed(&kp, Value::Null).unwrap();

        // Signature itself is fine, admission still refuses it
        assert!(tx.verify_signature());
        assert!(matches!(tx.validate(), Err(TransactionError::MissingPayload)));
    }

    #[test]
    fn test_wire_field_names() {
        let tx = Transaction::new("aa", "bb", json!(9));
        let wire = serde_json::to_value(&tx).unwrap();

        assert_eq!(wire["dataOwner"], "aa");
        assert_eq!(wire["signature"], "bb");
        assert_eq!(wire["hop_count"], 9);

        let parsed: Transaction =
            serde_json::from_str(r#"{"dataOwner":"aa","signature":"bb"}"#).unwrap();
        assert!(!parsed.has_payload());
    }

    #[test]
    fn test_canonical_excludes_signature() {
        let tx = Transaction::new("aa", "bb", json!(9));
        assert_eq!(tx.canonical().to_string(), r#"{"dataOwner":"aa","hop_count":9}"#);
    }
}
