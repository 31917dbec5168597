//! Account addresses
//!
//! An address is 33 bytes. For a single-key account it is the compressed
//! secp256k1 public key itself (leading byte `0x02`/`0x03`), so a signer's
//! public key can be recovered from its address by byte equality. Multisig
//! accounts use the `0x05` tag followed by a 32-byte digest of the account
//! descriptor.
//!
//! The text form is Base58Check: `Base58(bytes || SHA256(SHA256(bytes))[..4])`.

use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::hash::double_sha256;
use super::keys::KeyError;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 33;

/// Leading byte of a multisig account address
pub const MULTISIG_ADDRESS_TAG: u8 = 0x05;

const CHECKSUM_LEN: usize = 4;

/// A 33-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Address of a single-key account
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(public_key.serialize())
    }

    /// Address of a multisig account from its descriptor digest
    pub fn multisig(digest: [u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = MULTISIG_ADDRESS_TAG;
        bytes[1..].copy_from_slice(&digest);
        Self(bytes)
    }

    /// Build an address from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidAddress)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// True for multisig account addresses
    pub fn is_multisig(&self) -> bool {
        self.0[0] == MULTISIG_ADDRESS_TAG
    }

    /// Recover the public key of a single-key address
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        if self.is_multisig() {
            return Err(KeyError::InvalidPublicKey);
        }
        PublicKey::from_slice(&self.0).map_err(|_| KeyError::InvalidPublicKey)
    }

    fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
        let hash = double_sha256(bytes);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&hash[..CHECKSUM_LEN]);
        checksum
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut data = self.0.to_vec();
        data.extend_from_slice(&Self::checksum(&self.0));
        write!(f, "{}", bs58::encode(data).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidAddress)?;

        if data.len() != ADDRESS_LEN + CHECKSUM_LEN {
            return Err(KeyError::InvalidAddress);
        }

        let (body, checksum) = data.split_at(ADDRESS_LEN);
        if checksum != Self::checksum(body) {
            return Err(KeyError::InvalidChecksum);
        }

        Self::from_bytes(body)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
