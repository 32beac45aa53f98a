//! Utilities for text encoding.

/// Decodes UTF-16LE data (without BOM or terminator) into a string.
pub fn decode_utf16le(data: &[u8]) -> Result<String, anyhow::Error> {
    let (result, had_errors) = encoding_rs::UTF_16LE.decode_without_bom_handling(data);
    if had_errors {
        Err(anyhow::anyhow!("Failed to decode UTF-16LE"))
    } else {
        Ok(result.into_owned())
    }
}

#[test]
fn test_decode_utf16le() {
    assert_eq!(
        decode_utf16le(&[97, 0, 46, 0, 116, 0, 120, 0, 116, 0]).unwrap(),
        "a.txt".to_string()
    );
    assert_eq!(
        decode_utf16le(&[45, 78, 135, 101, 75, 109, 213, 139]).unwrap(),
        "中文测试".to_string()
    );
    assert_eq!(decode_utf16le(&[]).unwrap(), String::new());
    // Unpaired surrogate
    assert!(decode_utf16le(&[0x00, 0xd8]).is_err());
}
