//! Wire frame encoding and decoding.
//!
//! One frame travels per line, newline-terminated UTF-8 with exactly four
//! pipe-delimited fields:
//!
//! ```text
//! <groupFlag>|<senderId>|<base64(payload)>|<base64(sha256(plaintext))>
//! ```
//!
//! The group flag is empty for direct messages and carries the group id for
//! group traffic, bootstrap frames included. The payload field is base64 in
//! both cases; inside it is either AES ciphertext or, for bootstrap frames,
//! the raw UTF-8 member list.

use crate::crypto::DIGEST_SIZE;
use crate::utils::{FrameError, Result};
use base64::{engine::general_purpose, Engine};

/// Number of pipe-delimited fields in a valid frame
pub const FRAME_FIELDS: usize = 4;

/// Field delimiter within a frame line
pub const FIELD_SEPARATOR: char = '|';

/// One unit of wire data: a single newline-delimited, pipe-separated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Group id for group traffic; `None` encodes as the empty field of a
    /// direct message
    pub group: Option<String>,
    /// Sending node's self-declared identifier
    pub sender: String,
    /// Payload bytes: ciphertext, or the raw member list for bootstrap frames
    pub payload: Vec<u8>,
    /// SHA-256 digest over the original plaintext
    pub digest: [u8; DIGEST_SIZE],
}

impl Frame {
    /// Build a frame, validating that id fields cannot corrupt the framing
    ///
    /// # Errors
    ///
    /// Returns `FrameError::DelimiterInField` if the sender or group id
    /// contains the field delimiter or a line break
    pub fn new(
        group: Option<String>,
        sender: impl Into<String>,
        payload: Vec<u8>,
        digest: [u8; DIGEST_SIZE],
    ) -> Result<Self> {
        let sender = sender.into();
        validate_id_field("sender", &sender)?;
        if let Some(group_id) = &group {
            validate_id_field("group", group_id)?;
        }

        Ok(Self {
            group,
            sender,
            payload,
            digest,
        })
    }

    /// True for group traffic, bootstrap frames included
    pub fn is_group(&self) -> bool {
        self.group.is_some()
    }

    /// Encode as a single wire line, without the trailing newline
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.group.as_deref().unwrap_or(""),
            self.sender,
            general_purpose::STANDARD.encode(&self.payload),
            general_purpose::STANDARD.encode(self.digest),
            sep = FIELD_SEPARATOR,
        )
    }

    /// Parse one wire line into a frame.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::FieldCount` if the line does not split into
    /// exactly four fields, `FrameError::Payload` / `FrameError::Digest` if
    /// the base64 fields do not decode or the digest has the wrong length.
    /// All of these are per-line conditions: the handler logs them, discards
    /// the line, and keeps reading the connection.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != FRAME_FIELDS {
            return Err(FrameError::FieldCount {
                count: fields.len(),
            }
            .into());
        }

        let group = if fields[0].is_empty() {
            None
        } else {
            Some(fields[0].to_string())
        };

        let payload = general_purpose::STANDARD
            .decode(fields[2])
            .map_err(|e| FrameError::Payload {
                reason: e.to_string(),
            })?;

        let digest_bytes = general_purpose::STANDARD
            .decode(fields[3])
            .map_err(|e| FrameError::Digest {
                reason: e.to_string(),
            })?;
        let digest: [u8; DIGEST_SIZE] =
            digest_bytes
                .try_into()
                .map_err(|v: Vec<u8>| FrameError::Digest {
                    reason: format!("Wrong digest length: {}", v.len()),
                })?;

        Ok(Self {
            group,
            sender: fields[1].to_string(),
            payload,
            digest,
        })
    }
}

fn validate_id_field(field: &str, value: &str) -> Result<()> {
    if value.contains(FIELD_SEPARATOR) || value.contains('\n') || value.contains('\r') {
        return Err(FrameError::DelimiterInField {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}
