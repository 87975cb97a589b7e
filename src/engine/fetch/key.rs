// Stable resource identity keys

use std::fmt;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash, identical on every platform and run
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Mix `value` into `seed` with the golden ratio combine step
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Identity of a fetched resource: its ordered source paths plus load parameters
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(u64);

impl ResourceKey {
    /// Key for an ordered list of source paths
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let seed = paths
            .into_iter()
            .fold(0, |seed, path| hash_combine(seed, fnv1a(path.as_ref().as_bytes())));
        Self(seed)
    }

    /// Key for a single path
    pub fn from_path(path: &str) -> Self {
        Self::from_paths([path])
    }

    /// Mix a textual load parameter into the key
    pub fn with_param(self, param: &str) -> Self {
        Self(hash_combine(self.0, fnv1a(param.as_bytes())))
    }

    /// Mix a numeric load parameter into the key
    pub fn with_value(self, value: u64) -> Self {
        Self(hash_combine(self.0, value))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({:016x})", self.0)
    }
}
