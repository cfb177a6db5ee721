//! Serde helpers for the backend's loosely typed JSON.
//!
//! Counts and scores arrive as text (`"12"`, `"0.43"`), but nothing stops the
//! backend from sending a bare number or `null` instead. These helpers accept
//! all three and keep the value as text.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl TextOrNumber {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

/// Text field that may also be sent as a number. `null` becomes an empty string.
pub fn text<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TextOrNumber>::deserialize(de)?
        .map(TextOrNumber::into_text)
        .unwrap_or_default())
}

/// Sequence field where `null` means empty.
pub fn seq_or_null<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}
