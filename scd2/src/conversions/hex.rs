use crate::bail;
use crate::error::{ErrorKind, EtlResult};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encodes bytes as lowercase hex digits.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        result.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        result.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }

    result
}

/// Decodes exactly `2 * N` hex digits into an `N`-byte array.
pub fn decode_hex<const N: usize>(hex: &str) -> EtlResult<[u8; N]> {
    if hex.len() != N * 2 {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from hex string to byte array",
            format!("Expected {} hex digits, got {}", N * 2, hex.len())
        );
    }

    if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from hex string to byte array",
            "The string contains characters other than hex digits"
        );
    }

    let mut result = [0u8; N];
    for (i, byte) in result.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_hex_pads_each_byte() {
        assert_eq!(encode_hex(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
        assert_eq!(encode_hex(&[]), "");
    }

    #[test]
    fn decode_hex_accepts_both_cases() {
        let bytes: [u8; 2] = decode_hex("aBcD").unwrap();
        assert_eq!(bytes, [0xab, 0xcd]);
    }

    #[test]
    fn decode_hex_rejects_wrong_length() {
        let err = decode_hex::<2>("abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn decode_hex_rejects_invalid_digits() {
        let err = decode_hex::<1>("zz").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn decode_hex_rejects_signs() {
        let err = decode_hex::<1>("+f").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
        let err = decode_hex::<2>("ab-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn decode_hex_rejects_multibyte_characters() {
        let err = decode_hex::<1>("é").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}
