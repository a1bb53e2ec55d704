//! Obfuscation Module
//!
//! Keyed character rotation applied to stored text.
//!
//! This is NOT encryption. Anyone holding the stored text can recover it by
//! trying every offset. It only keeps casual readers of the storage medium
//! from seeing values at a glance.

/// Size of the rotated alphabet (ASCII).
pub const OBFUSCATION_MODULUS: u32 = 128;

// == Offset Validation ==
/// An offset is usable only inside `[0, modulus)`.
pub fn is_valid_offset(offset: u32, modulus: u32) -> bool {
    offset < modulus
}

// == Obfuscate ==
/// Rotates every character below `modulus` by `offset`, wrapping around.
/// Characters at or above `modulus` pass through unchanged, as does the whole
/// text when the offset is out of range.
pub fn obfuscate(text: &str, offset: u32, modulus: u32) -> String {
    if !is_valid_offset(offset, modulus) {
        return text.to_string();
    }

    text.chars()
        .map(|c| {
            let code = c as u32;
            if code < modulus {
                char::from_u32((code + offset) % modulus).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

// == Deobfuscate ==
/// Inverse of [`obfuscate`] for the same offset and modulus.
pub fn deobfuscate(text: &str, offset: u32, modulus: u32) -> String {
    if !is_valid_offset(offset, modulus) {
        return text.to_string();
    }

    obfuscate(text, (modulus - offset) % modulus, modulus)
}
