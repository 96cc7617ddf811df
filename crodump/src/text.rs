//! Decoding of embedded strings.
//!
//! All text inside a Cronos database is stored in Windows code page 1251.
//! Decoding happens at well-defined terminal points only; everything else
//! in this crate operates on raw bytes.

use encoding_rs::WINDOWS_1251;

/// Decodes windows-1251 bytes, substituting U+FFFD for undecodable bytes.
pub(crate) fn decode(bytes: &[u8]) -> String {
    let (text, _, _) = WINDOWS_1251.decode(bytes);
    text.into_owned()
}

/// Decodes windows-1251 bytes, returning `None` when any byte has no
/// mapping. Used to vet table names during discovery scanning.
pub(crate) fn decode_strict(bytes: &[u8]) -> Option<String> {
    let (text, _, had_errors) = WINDOWS_1251.decode(bytes);
    (!had_errors).then(|| text.into_owned())
}

/// Builds the length-prefixed windows-1251 encoding of a field label.
///
/// Labels inside the structure file are stored as one length byte followed
/// by the encoded text, so the same shape doubles as a search probe.
pub fn sentinel(label: &str) -> Vec<u8> {
    let (encoded, _, _) = WINDOWS_1251.encode(label);
    let mut probe = Vec::with_capacity(encoded.len() + 1);
    probe.push(encoded.len() as u8);
    probe.extend_from_slice(&encoded);
    probe
}

/// Finds the first occurrence of `needle` in `haystack` at or after `start`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|index| index + start)
}
