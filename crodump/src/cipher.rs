//! Deobfuscation of the structure file.
//!
//! `CroStru.dat` is obfuscated with a substitution cipher whose output also
//! depends on the byte position and on a per-section offset. The offset is
//! stored nowhere; it is recovered by deciphering the file under every
//! candidate offset and searching the result for a known plaintext, the
//! label of the auto-generated primary key column.

use crate::raw::{KOD, PK_LABEL};
use crate::text::{self, sentinel};

/// One successful deobfuscation of the structure file.
#[derive(Debug, Clone)]
pub struct Section {
    /// The cipher offset under which the sentinel was found.
    pub offset: u8,
    /// Position of the primary-key sentinel in the deciphered bytes.
    pub pk_index: usize,
    /// The deciphered bytes.
    pub bytes: Vec<u8>,
}

/// Inverts the Cronos substitution cipher under the given offset.
///
/// Each output byte is `KOD[src[i]] - i - offset`, with the position and
/// all arithmetic reduced modulo 256. The transform is total and preserves
/// length.
pub fn decipher(src: &[u8], offset: u8) -> Vec<u8> {
    src.iter()
        .enumerate()
        .map(|(i, &byte)| {
            KOD[byte as usize]
                .wrapping_sub(i as u8)
                .wrapping_sub(offset)
        })
        .collect()
}

/// Tries all 256 cipher offsets against the structure file and returns the
/// candidates that contain the primary-key sentinel, sorted by ascending
/// sentinel position.
///
/// The file holds several independently obfuscated sections starting at
/// different absolute positions, so more than one offset can align. An
/// empty result means the structure cannot be recovered.
pub fn align_sections(src: &[u8]) -> Vec<Section> {
    let probe = sentinel(PK_LABEL);
    let mut sections = Vec::new();

    for offset in 0..=u8::MAX {
        let bytes = decipher(src, offset);
        if let Some(pk_index) = text::find(&bytes, &probe, 0) {
            tracing::debug!(offset, pk_index, "aligned structure section");
            sections.push(Section {
                offset,
                pk_index,
                bytes,
            });
        }
    }

    sections.sort_by_key(|section| section.pk_index);
    sections
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn kod_inverse() -> [u8; 256] {
        let mut inverse = [0u8; 256];
        for (plain, &coded) in KOD.iter().enumerate() {
            inverse[coded as usize] = plain as u8;
        }
        inverse
    }

    /// Applies the cipher in the forward direction to bytes that will sit
    /// at absolute position `start`, so that deciphering recovers `data`.
    fn encipher_at(data: &[u8], offset: u8, start: usize) -> Vec<u8> {
        let inverse = kod_inverse();
        data.iter()
            .enumerate()
            .map(|(i, &byte)| {
                inverse[byte
                    .wrapping_add((start + i) as u8)
                    .wrapping_add(offset) as usize]
            })
            .collect()
    }

    fn encipher(data: &[u8], offset: u8) -> Vec<u8> {
        encipher_at(data, offset, 0)
    }

    #[test]
    fn test_decipher_inverts_encipher() {
        let plain = b"The quick brown fox jumps over the lazy dog".to_vec();
        for offset in [0, 1, 42, 255] {
            let coded = encipher(&plain, offset);
            assert_eq!(decipher(&coded, offset), plain);
        }
    }

    #[test]
    fn test_decipher_preserves_length() {
        assert_eq!(decipher(&[], 7), Vec::<u8>::new());
        assert_eq!(decipher(&[0u8; 1000], 7).len(), 1000);
    }

    #[test]
    fn test_position_wraps_past_256() {
        // bytes 256 positions apart encipher identically
        let mut plain = vec![0u8; 300];
        plain[1] = 0xab;
        plain[257] = 0xab;
        let coded = encipher(&plain, 99);
        assert_eq!(coded[1], coded[257]);
    }

    #[test]
    fn test_align_reports_sentinel_position() {
        let mut plain = vec![0x55u8; 64];
        plain.extend_from_slice(&sentinel(PK_LABEL));
        plain.extend_from_slice(&[0x55u8; 16]);

        let sections = align_sections(&encipher(&plain, 42));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].offset, 42);
        assert_eq!(sections[0].pk_index, 64);

        let probe = sentinel(PK_LABEL);
        let found = &sections[0].bytes[64..64 + probe.len()];
        assert_eq!(found, &probe[..]);
    }

    #[test]
    fn test_align_without_sentinel_is_empty() {
        assert!(align_sections(&[0x13u8; 512]).is_empty());
    }

    #[test]
    fn test_sections_are_sorted_by_sentinel_position() {
        // first physical section uses the larger offset, so the sweep finds
        // it last; the result must still lead with it
        let probe = sentinel(PK_LABEL);

        let mut first = vec![0x11u8; 8];
        first.extend_from_slice(&probe);
        let mut file = encipher(&first, 200);

        let mut second = vec![0x22u8; 8];
        second.extend_from_slice(&probe);
        let start = file.len();
        file.extend_from_slice(&encipher_at(&second, 3, start));

        let sections = align_sections(&file);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].offset, 200);
        assert_eq!(sections[0].pk_index, 8);
        assert_eq!(sections[1].offset, 3);
        assert_eq!(sections[1].pk_index, start + 8);
    }
}
