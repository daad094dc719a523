//! Secure channel: builds, verifies, and opens wire frames.
//!
//! Every frame carries a SHA-256 digest over the original plaintext.
//! Encrypted frames pair that digest with an AES-128-GCM payload; group
//! bootstrap frames carry the member list unencrypted (no key exists for a
//! brand-new group) but keep the digest so integrity checking stays uniform
//! across both kinds.

use crate::crypto::{cipher, SessionKey};
use crate::transport::frame::{Frame, FIELD_SEPARATOR};
use crate::utils::{FrameError, Result};

/// Build an encrypted frame carrying `plaintext` for one recipient
///
/// # Arguments
///
/// * `group` - Group id for group traffic, `None` for a direct message
/// * `sender` - The sending node's id
/// * `plaintext` - Message text to protect
/// * `key` - Session key for this sender/recipient pair
///
/// # Errors
///
/// Returns an error if encryption fails or an id field would corrupt the
/// framing
pub fn seal(
    group: Option<&str>,
    sender: &str,
    plaintext: &str,
    key: &SessionKey,
) -> Result<Frame> {
    let payload = cipher::encrypt(key, plaintext.as_bytes())?;
    let digest = cipher::digest(plaintext.as_bytes());
    Frame::new(group.map(str::to_string), sender, payload, digest)
}

/// Build an unencrypted group bootstrap frame carrying the raw member line.
///
/// The digest is computed over the member-line bytes, exactly as it would be
/// over message plaintext.
pub fn seal_bootstrap(group: &str, sender: &str, member_line: &str) -> Result<Frame> {
    let payload = member_line.as_bytes().to_vec();
    let digest = cipher::digest(&payload);
    Frame::new(Some(group.to_string()), sender, payload, digest)
}

/// Decrypt an encrypted frame and verify its digest, returning the plaintext
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the payload does not decrypt under
/// `key`, and `FrameError::IntegrityMismatch` if the recomputed SHA-256 over
/// the decrypted plaintext differs from the received digest. In both cases
/// the plaintext is never surfaced; the handler logs, discards, and keeps
/// reading.
pub fn open(frame: &Frame, key: &SessionKey) -> Result<String> {
    let plaintext = cipher::decrypt(key, &frame.payload)?;

    if cipher::digest(&plaintext) != frame.digest {
        return Err(FrameError::IntegrityMismatch {
            sender: frame.sender.clone(),
        }
        .into());
    }

    Ok(String::from_utf8(plaintext)?)
}

/// Verify a bootstrap frame's digest and decode its member list
///
/// # Errors
///
/// Returns `FrameError::IntegrityMismatch` if the digest does not cover the
/// payload bytes, or a UTF-8 error if the member line is not valid text
pub fn open_bootstrap(frame: &Frame) -> Result<Vec<String>> {
    if cipher::digest(&frame.payload) != frame.digest {
        return Err(FrameError::IntegrityMismatch {
            sender: frame.sender.clone(),
        }
        .into());
    }

    let line = String::from_utf8(frame.payload.clone())?;
    Ok(split_members(&line))
}

/// Split a pipe-joined member line into member ids, dropping empty entries
pub fn split_members(line: &str) -> Vec<String> {
    line.split(FIELD_SEPARATOR)
        .filter(|member| !member.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SESSION_KEY_SIZE;
    use crate::utils::{ChatError, CryptoError};

    fn test_key(byte: u8) -> SessionKey {
        SessionKey::from_bytes([byte; SESSION_KEY_SIZE])
    }

    #[test]
    fn test_seal_open_round_trip() {
        let key = test_key(1);
        let frame = seal(None, "p1", "hello", &key).unwrap();

        assert!(!frame.is_group());
        assert_eq!(frame.sender, "p1");
        assert_eq!(open(&frame, &key).unwrap(), "hello");
    }

    #[test]
    fn test_seal_open_group_round_trip() {
        let key = test_key(2);
        let frame = seal(Some("teamA"), "p1", "hi team", &key).unwrap();

        assert_eq!(frame.group.as_deref(), Some("teamA"));
        assert_eq!(open(&frame, &key).unwrap(), "hi team");
    }

    #[test]
    fn test_open_detects_digest_mutation() {
        let key = test_key(3);
        let mut frame = seal(None, "p1", "hello", &key).unwrap();

        // Flip one byte of the digest: decryption succeeds, verification
        // must not
        frame.digest[0] ^= 0x01;
        let result = open(&frame, &key);
        assert!(matches!(
            result,
            Err(ChatError::Frame(FrameError::IntegrityMismatch { .. }))
        ));
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let frame = seal(None, "p1", "hello", &test_key(4)).unwrap();

        let result = open(&frame, &test_key(5));
        assert!(matches!(
            result,
            Err(ChatError::Crypto(CryptoError::Decryption { .. }))
        ));
        assert!(result.unwrap_err().is_security_violation());
    }

    #[test]
    fn test_wire_round_trip_through_encode_and_parse() {
        let key = test_key(6);
        let frame = seal(None, "p1", "over the wire", &key).unwrap();

        let parsed = Frame::parse(&frame.encode()).unwrap();
        assert_eq!(open(&parsed, &key).unwrap(), "over the wire");
    }

    #[test]
    fn test_bootstrap_round_trip() {
        let frame = seal_bootstrap("teamA", "p1", "p1|p2|p3").unwrap();

        // Member list rides in the clear
        assert_eq!(frame.payload, b"p1|p2|p3");
        assert_eq!(frame.group.as_deref(), Some("teamA"));

        let members = open_bootstrap(&frame).unwrap();
        assert_eq!(members, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_bootstrap_detects_tampering() {
        let mut frame = seal_bootstrap("teamA", "p1", "p1|p2|p3").unwrap();
        frame.payload = b"p1|p2|mallory".to_vec();

        assert!(matches!(
            open_bootstrap(&frame),
            Err(ChatError::Frame(FrameError::IntegrityMismatch { .. }))
        ));
    }

    #[test]
    fn test_split_members_drops_empty_entries() {
        assert_eq!(split_members("p1|p2|p3"), vec!["p1", "p2", "p3"]);
        assert_eq!(split_members("p1||p2|"), vec!["p1", "p2"]);
        assert!(split_members("").is_empty());
    }
}
