//! Provide hash containers, re-exports *hashbrown* and *foldhash*.
//!
//! Every map in the serializer is keyed either by a [`TypeId`](core::any::TypeId)
//! (hashed with [`NoOpHashState`]) or by data whose hash must be identical across
//! runs (hashed with [`FixedHashState`]). Resource deduplication relies on the
//! latter: the same image bytes must map to the same part name every time.

use core::fmt::Debug;
use core::hash::{BuildHasher, Hash, Hasher};

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHasher

/// A fixed hash seed.
const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x5850_535F_5245_4143);

/// A hasher whose results only depend on the input.
pub type FixedHasher = FoldHasher<'static>;

/// Fixed Hash State based upon a random but fixed seed.
///
/// # Examples
///
/// ```
/// use core::hash::{BuildHasher, Hash, Hasher};
/// use xps_utils::hash::FixedHashState;
///
/// let mut a = FixedHashState.build_hasher();
/// let mut b = FixedHashState.build_hasher();
/// "page".hash(&mut a);
/// "page".hash(&mut b);
///
/// assert_eq!(a.finish(), b.finish());
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

// -----------------------------------------------------------------------------
// NoOpHasher

/// A hasher that passes a single `u64` straight through.
///
/// `TypeId` already is a high quality hash, so hashing it again is wasted work.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHasher {
    hash: u64,
}

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes.iter().rev() {
            self.hash = self.hash.rotate_left(8).wrapping_add(*byte as u64);
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Build state for [`NoOpHasher`].
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHashState;

impl BuildHasher for NoOpHashState {
    type Hasher = NoOpHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher { hash: 0 }
    }
}

// -----------------------------------------------------------------------------
// Containers

/// A [`hashbrown::HashMap`] using [`FixedHashState`].
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

/// A [`hashbrown::HashSet`] using [`FixedHashState`].
pub type HashSet<T> = hashbrown::HashSet<T, FixedHashState>;

/// Hashes a value with [`FixedHashState`].
#[inline]
pub fn fixed_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    FixedHashState.hash_one(value)
}

/// A stable digest of raw resource content.
///
/// Used as the key of the document level image and color-context tables,
/// so two byte-identical resources end up in one package part.
///
/// # Examples
///
/// ```
/// use xps_utils::hash::content_hash;
///
/// let png = [0x89, b'P', b'N', b'G'];
/// assert_eq!(content_hash(&png), content_hash(&png.to_vec()));
/// assert_ne!(content_hash(&png), content_hash(&png[..3]));
/// ```
pub fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = FixedHashState.build_hasher();
    hasher.write_usize(bytes.len());
    hasher.write(bytes);
    hasher.finish()
}

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;
