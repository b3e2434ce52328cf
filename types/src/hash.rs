//! 32-byte digests: commitment and nullifier identities, transaction hashes, tree nodes.

fixed_bytes!(
    /// Digest of a commitment preimage. Primary key of the commitment table.
    CommitmentHash,
    32
);

fixed_bytes!(
    /// One-way derivation of a commitment hash under the owner's nullifier key.
    NullifierHash,
    32
);

fixed_bytes!(
    /// Hash of an L2 transaction.
    TxHash,
    32
);

fixed_bytes!(
    /// Hash of the L1 transaction that carried an L2 block proposal.
    L1TxHash,
    32
);

fixed_bytes!(
    /// A Merkle tree node: leaves, roots, frontier entries and sibling path elements.
    Hash32,
    32
);

impl From<CommitmentHash> for Hash32 {
    fn from(hash: CommitmentHash) -> Self {
        Hash32(hash.0)
    }
}

impl From<TxHash> for Hash32 {
    fn from(hash: TxHash) -> Self {
        Hash32(hash.0)
    }
}

/// Serde adapter for variable-length byte strings: hex for human-readable
/// formats, raw bytes otherwise.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            bytes.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parse_accepts_prefix() {
        let plain = "11".repeat(32);
        let prefixed = format!("0x{plain}");
        assert_eq!(
            TxHash::from_hex(&plain).unwrap(),
            TxHash::from_hex(&prefixed).unwrap()
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = CommitmentHash::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            crate::TypesError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn json_uses_hex_and_bincode_uses_bytes() {
        let hash = NullifierHash::new([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));

        let encoded = bincode::serialize(&hash).unwrap();
        assert_eq!(encoded.len(), 32);
        let decoded: NullifierHash = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn debug_shows_short_prefix() {
        let hash = Hash32::new([0x01; 32]);
        assert_eq!(format!("{hash:?}"), "Hash32(01010101)");
    }
}
