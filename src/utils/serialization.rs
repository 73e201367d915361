use anyhow::{Context, Result};

/// Upper bound for a decoded store image. Larger inputs are treated as corrupt.
const DECODE_LIMIT: usize = 64 * 1024 * 1024;

/// Bincode configuration for store images
fn config() -> impl bincode::config::Config {
    // Legacy layout keeps serde maps and tuples compact; the limit guards
    // allocation on corrupt input
    bincode::config::legacy().with_limit::<{ DECODE_LIMIT }>()
}

/// Encodes a value with bincode v2 through serde
///
/// # Errors
///
/// Returns an error if the value cannot be encoded
pub fn serialize<T: serde::Serialize>(data: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(data, config()).context("Failed to encode store image")
}

/// Decodes a value produced by [`serialize`]
///
/// # Errors
///
/// Returns an error if the bytes are malformed, truncated, or exceed the
/// decode limit
pub fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, _read) = bincode::serde::decode_from_slice(bytes, config())
        .context("Failed to decode store image")?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_nested_maps_survive_encoding() -> Result<()> {
        let mut values = BTreeMap::new();
        values.insert("legacydisable".to_string(), ("LegacyDisable".to_string(), String::new()));

        let decoded: BTreeMap<String, (String, String)> = deserialize(&serialize(&values)?)?;
        assert_eq!(decoded, values);
        Ok(())
    }

    #[test]
    fn test_truncated_input_is_an_error() -> Result<()> {
        let bytes = serialize(&vec!["a".to_string(), "b".to_string()])?;
        assert!(deserialize::<Vec<String>>(&bytes[..bytes.len() - 1]).is_err());
        Ok(())
    }
}
