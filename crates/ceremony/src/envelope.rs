//! Artifacts relayed between parties.
//!
//! Envelopes bind an artifact to the identity that produced it so
//! the coordinator can attribute pasted values. The commitment
//! envelope also carries the reviewed transaction hash.
//!
//! ```text
//! commitment: 0x01 | identity (129) | tx hash (32) | commitment
//! share:      0x01 | identity (129) | share
//! ```
use coldsig_device::{
    decode_hex, Identity, SignatureShare, SigningCommitment, TxHash,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// Current envelope version.
pub const ENVELOPE_VERSION: u8 = 0x01;

const IDENTITY_LENGTH: usize = 129;
const TX_HASH_LENGTH: usize = 32;

/// Signing commitment of one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentEnvelope {
    /// Identity of the party.
    pub identity: Identity,
    /// Transaction hash the party reviewed.
    pub tx_hash: TxHash,
    /// Commitment produced by the device.
    pub commitment: SigningCommitment,
}

impl CommitmentEnvelope {
    /// Encode as hex.
    pub fn encode(&self) -> String {
        let mut bytes = vec![ENVELOPE_VERSION];
        bytes.extend_from_slice(self.identity.as_bytes());
        bytes.extend_from_slice(self.tx_hash.as_bytes());
        bytes.extend_from_slice(self.commitment.as_bytes());
        hex::encode(bytes)
    }

    /// Decode from pasted text.
    pub fn decode(input: &str) -> Result<Self> {
        const LABEL: &str = "signing commitment envelope";
        let body = open(LABEL, input)?;
        if body.len() <= IDENTITY_LENGTH + TX_HASH_LENGTH {
            return Err(Error::invalid(LABEL, "truncated envelope"));
        }
        let (identity, rest) = body.split_at(IDENTITY_LENGTH);
        let (tx_hash, commitment) = rest.split_at(TX_HASH_LENGTH);
        Ok(Self {
            identity: Identity::from_bytes(identity.to_vec())?,
            tx_hash: TxHash::from_bytes(tx_hash.to_vec())?,
            commitment: SigningCommitment::from_bytes(
                commitment.to_vec(),
            )?,
        })
    }
}

/// Signature share of one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEnvelope {
    /// Identity of the party.
    pub identity: Identity,
    /// Share produced by the device.
    pub share: SignatureShare,
}

impl ShareEnvelope {
    /// Encode as hex.
    pub fn encode(&self) -> String {
        let mut bytes = vec![ENVELOPE_VERSION];
        bytes.extend_from_slice(self.identity.as_bytes());
        bytes.extend_from_slice(self.share.as_bytes());
        hex::encode(bytes)
    }

    /// Decode from pasted text.
    pub fn decode(input: &str) -> Result<Self> {
        const LABEL: &str = "signature share envelope";
        let body = open(LABEL, input)?;
        if body.len() <= IDENTITY_LENGTH {
            return Err(Error::invalid(LABEL, "truncated envelope"));
        }
        let (identity, share) = body.split_at(IDENTITY_LENGTH);
        Ok(Self {
            identity: Identity::from_bytes(identity.to_vec())?,
            share: SignatureShare::from_bytes(share.to_vec())?,
        })
    }
}

fn open(label: &'static str, input: &str) -> Result<Vec<u8>> {
    let mut bytes = decode_hex(label, input)?;
    match bytes.first() {
        Some(&ENVELOPE_VERSION) => {
            bytes.remove(0);
            Ok(bytes)
        }
        Some(version) => Err(Error::invalid(
            label,
            format!("unknown version {version}"),
        )),
        None => Err(Error::invalid(label, "empty")),
    }
}

macro_rules! envelope_traits {
    ($name:ident) => {
        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::decode(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.encode())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.encode())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::decode(&value).map_err(serde::de::Error::custom)
            }
        }
    };
}

envelope_traits!(CommitmentEnvelope);
envelope_traits!(ShareEnvelope);
