//! `--base64Input` and `--base64Output`.

use crate::error::{OptionsError, OptionsResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Decode source text passed as base64. The input must decode to
/// non-empty UTF-8 and re-encode to exactly the same string.
pub fn decode_base64_input(input: &str) -> OptionsResult<String> {
    let bytes = STANDARD.decode(input).map_err(|_| OptionsError::InvalidBase64)?;
    if bytes.is_empty() || STANDARD.encode(&bytes) != input {
        return Err(OptionsError::InvalidBase64);
    }
    String::from_utf8(bytes).map_err(|_| OptionsError::InvalidBase64)
}

pub fn encode_base64_output(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_input() {
        let encoded = encode_base64_output(b"let x: int = 1;");
        assert_eq!(decode_base64_input(&encoded).unwrap(), "let x: int = 1;");
    }

    #[test]
    fn test_rejects_malformed_and_empty_input() {
        assert_eq!(decode_base64_input("not base64!"), Err(OptionsError::InvalidBase64));
        assert_eq!(decode_base64_input(""), Err(OptionsError::InvalidBase64));
    }

    #[test]
    fn test_rejects_non_canonical_padding() {
        // Nonzero trailing bits: not the canonical encoding of "a".
        assert!(decode_base64_input("YR==").is_err());
    }

    #[test]
    fn test_rejects_non_utf8() {
        let encoded = encode_base64_output(&[0xff, 0xfe]);
        assert_eq!(decode_base64_input(&encoded), Err(OptionsError::InvalidBase64));
    }
}
