use super::FieldValue;
use core::fmt;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Stable content hash over a record's canonicalized field values.
///
/// Fingerprints identify record content for caching and traceability: two
/// records with the same fields in the same order always hash identically,
/// regardless of when or where they were ingested. Serialized as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of an ordered field sequence.
    ///
    /// Each field contributes its name, a type tag, and a canonical value
    /// rendering. Lengths are hashed alongside the bytes so that adjacent
    /// fields can never collide by concatenation.
    #[must_use]
    pub(crate) fn of_fields(fields: &[(String, FieldValue)]) -> Self {
        let mut hasher = Sha256::new();
        let mut buf = Vec::new();
        for (name, value) in fields {
            hasher.update((name.len() as u64).to_be_bytes());
            hasher.update(name.as_bytes());

            buf.clear();
            value.canonicalize_into(&mut buf);
            hasher.update((buf.len() as u64).to_be_bytes());
            hasher.update(&buf);
        }
        Self(hasher.finalize().into())
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Renders the full digest as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Display for Fingerprint {
    /// Displays an abbreviated digest (first 8 bytes), enough for log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.len() != 64 {
            return Err(D::Error::custom("fingerprint must be 64 hex characters"));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
            let pair = core::str::from_utf8(chunk).map_err(D::Error::custom)?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(D::Error::custom)?;
        }
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_prevents_concatenation_collisions() {
        let a = Fingerprint::of_fields(&[("ab".to_string(), FieldValue::Text("c".to_string()))]);
        let b = Fingerprint::of_fields(&[("a".to_string(), FieldValue::Text("bc".to_string()))]);
        assert_ne!(a, b);
    }

    #[test]
    fn number_bit_pattern_is_canonical() {
        let a = Fingerprint::of_fields(&[("x".to_string(), FieldValue::Number(0.1 + 0.2))]);
        let b = Fingerprint::of_fields(&[("x".to_string(), FieldValue::Number(0.1 + 0.2))]);
        let c = Fingerprint::of_fields(&[("x".to_string(), FieldValue::Number(0.3))]);
        assert_eq!(a, b);
        assert_ne!(a, c); // 0.1 + 0.2 != 0.3 in IEEE-754
    }

    #[test]
    fn display_is_abbreviated_hex() {
        let fp = Fingerprint::of_fields(&[]);
        let shown = fp.to_string();
        assert_eq!(shown.len(), 16);
        assert!(fp.to_hex().starts_with(&shown));
    }

    #[test]
    fn hex_round_trip() {
        let fp = Fingerprint::of_fields(&[("x".to_string(), FieldValue::Number(1.0))]);
        let json = serde_json::to_string(&fp).unwrap();
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }

    #[test]
    fn deserialize_rejects_bad_length() {
        let result: Result<Fingerprint, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }
}
