/*!
Seeded word hashing, as used to salt flow hash tables.
*/

use ahash::RandomState;

use std::hash::{BuildHasher, Hasher};

/// Hashes `words` with the given `basis`.
/// The result only depends on the word values and the basis.
pub fn hash_words(words: &[u32], basis: u32) -> u32 {
    let mut hasher = RandomState::with_seeds(u64::from(basis), 0, 0, 0).build_hasher();
    for &word in words {
        hasher.write_u32(word);
    }
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_depends_on_basis_only() {
        assert_eq!(hash_words(&[], 7), hash_words(&[], 7));
        assert_ne!(hash_words(&[], 7), hash_words(&[], 8));
    }

    #[test]
    fn deterministic() {
        let words = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(hash_words(&words, 0), hash_words(&words, 0));
    }

    #[test]
    fn basis_salts_the_hash() {
        let words = [0x0a00_0001, 0x0a00_0002, 0x0001_1000];
        assert_ne!(hash_words(&words, 0), hash_words(&words, 1));
    }

    #[test]
    fn every_word_counts() {
        let a = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut b = a;
        b[7] = 9;
        assert_ne!(hash_words(&a, 0), hash_words(&b, 0));
    }
}
