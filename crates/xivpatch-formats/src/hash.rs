//! Entry addressing hash
//!
//! Every archive entry is addressed by two 32-bit hashes: one of its parent
//! folder path and one of its file name. Both are the standard CRC-32
//! (`crc32fast`) over the lower-cased UTF-8 bytes, seeded with `0xFFFFFFFF`
//! and without the final complement.

use std::fmt;

/// Initial CRC register used for path and file name hashes
pub const PATH_HASH_SEED: u32 = 0xFFFF_FFFF;

/// Run CRC-32 over `bytes` starting from the raw register `initial`
///
/// Set `final_complement` to get the standard CRC-32 output when `initial`
/// is `0xFFFFFFFF`.
///
/// # Examples
///
/// ```
/// use xivpatch_formats::hash_raw;
///
/// // Standard CRC-32 check value
/// assert_eq!(hash_raw(b"123456789", 0xFFFF_FFFF, true), 0xCBF4_3926);
/// ```
pub fn hash_raw(bytes: &[u8], initial: u32, final_complement: bool) -> u32 {
    // crc32fast keeps its state complemented on both ends
    let mut hasher = crc32fast::Hasher::new_with_initial(!initial);
    hasher.update(bytes);
    let crc = hasher.finalize();
    if final_complement { crc } else { !crc }
}

/// Hash a path component the way the archive index does
///
/// The input is lower-cased before encoding. Empty input hashes to `0`.
pub fn hash(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    !crc32fast::hash(text.to_lowercase().as_bytes())
}

/// 64-bit entry address: parent path hash (high) and file name hash (low)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryAddress {
    /// Hash of the parent folder path (e.g. `exd`)
    pub path_hash: u32,
    /// Hash of the file name (e.g. `item_0_en.exd`)
    pub file_hash: u32,
}

impl EntryAddress {
    /// Create an address from precomputed hashes
    pub const fn new(path_hash: u32, file_hash: u32) -> Self {
        Self {
            path_hash,
            file_hash,
        }
    }

    /// Hash a full entry path such as `exd/item_0_en.exd`
    ///
    /// Backslashes are treated as separators. A path without a separator has
    /// an empty folder, which hashes to `0`.
    pub fn from_path(path: &str) -> Self {
        let (folder, file) = split_path(path);
        Self::new(hash(&folder), hash(&file))
    }

    /// Packed form used as the sort key of primary index records
    pub const fn to_u64(self) -> u64 {
        ((self.path_hash as u64) << 32) | self.file_hash as u64
    }

    /// Unpack an address from its 64-bit form
    pub const fn from_u64(value: u64) -> Self {
        Self::new((value >> 32) as u32, value as u32)
    }
}

impl fmt::Display for EntryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.to_u64())
    }
}

/// Split an entry path into `(folder, file name)` with `/` separators
pub fn split_path(path: &str) -> (String, String) {
    let normalized = path.replace('\\', "/");
    match normalized.rfind('/') {
        Some(pos) => (
            normalized[..pos].to_string(),
            normalized[pos + 1..].to_string(),
        ),
        None => (String::new(), normalized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_hashes_to_zero() {
        assert_eq!(hash(""), 0);
    }

    #[test]
    fn test_hash_is_complement_of_standard_crc() {
        let standard = hash_raw(b"exd", PATH_HASH_SEED, true);
        assert_eq!(hash("exd"), !standard);
    }

    #[test]
    fn test_hash_case_insensitive() {
        assert_eq!(hash("EXD/Item_0_EN.exd"), hash("exd/item_0_en.exd"));
        assert_eq!(hash("Common/Font"), hash("common/font"));
    }

    #[test]
    fn test_address_from_path() {
        let address = EntryAddress::from_path("exd/item_0_en.exd");
        assert_eq!(address.path_hash, hash("exd"));
        assert_eq!(address.file_hash, hash("item_0_en.exd"));

        let backslash = EntryAddress::from_path("exd\\item_0_en.exd");
        assert_eq!(address, backslash);

        let bare = EntryAddress::from_path("root.exl");
        assert_eq!(bare.path_hash, 0);
    }

    #[test]
    fn test_address_packing() {
        let address = EntryAddress::new(0xE39B_7999, 0xA8FA_3160);
        assert_eq!(address.to_u64(), 0xE39B_7999_A8FA_3160);
        assert_eq!(EntryAddress::from_u64(address.to_u64()), address);
        assert_eq!(address.to_string(), "e39b7999a8fa3160");
    }

    #[test]
    fn test_nested_folder_split() {
        let (folder, file) = split_path("common/font/axis_12.fdt");
        assert_eq!(folder, "common/font");
        assert_eq!(file, "axis_12.fdt");
    }

    /// Bitwise reflected CRC-32 register walk
    fn bitwise_crc(bytes: &[u8], initial: u32) -> u32 {
        bytes.iter().fold(initial, |mut crc, &b| {
            crc ^= u32::from(b);
            for _ in 0..8 {
                crc = if crc & 1 == 1 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
            }
            crc
        })
    }

    #[test]
    fn test_known_paths_match_register_walk() {
        for path in ["exd", "exd/item_0_en.exd", "common/font", "a"] {
            assert_eq!(hash(path), bitwise_crc(path.as_bytes(), PATH_HASH_SEED));
        }
    }

    proptest! {
        #[test]
        fn hash_raw_matches_register_walk(
            bytes in proptest::collection::vec(any::<u8>(), 0..128),
            initial in any::<u32>(),
        ) {
            prop_assert_eq!(hash_raw(&bytes, initial, false), bitwise_crc(&bytes, initial));
            prop_assert_eq!(hash_raw(&bytes, initial, true), !bitwise_crc(&bytes, initial));
        }

        #[test]
        fn hash_ignores_case(s in "[ -~]{0,64}") {
            prop_assert_eq!(hash(&s), hash(&s.to_lowercase()));
            prop_assert_eq!(hash(&s.to_uppercase().to_lowercase()), hash(&s));
        }
    }
}
