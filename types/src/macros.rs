/// Defines a fixed-width byte newtype.
///
/// The generated type prints as lowercase hex, parses from hex with or without
/// a `0x` prefix, and serializes as a hex string for human-readable formats
/// (JSON, TOML) and as raw bytes otherwise (bincode).
macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const ZERO: Self = Self([0u8; $len]);
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, $crate::error::TypesError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    $crate::error::TypesError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    }
                })?;
                Ok(Self(arr))
            }

            pub fn from_hex(s: &str) -> Result<Self, $crate::error::TypesError> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes = ::hex::decode(raw)
                    .map_err(|e| $crate::error::TypesError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), ::hex::encode(&self.0[..4]))
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", ::hex::encode(self.0))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&::hex::encode(self.0))
                } else {
                    ::serde::Serialize::serialize(&self.0, serializer)
                }
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                    Self::from_hex(&s).map_err(::serde::de::Error::custom)
                } else {
                    <[u8; $len] as ::serde::Deserialize>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}
