/// Fixed-capacity bitset of entity indices (nodes, objects, decals or IFL materials).
///
/// Stored on disk as 32-bit words; held here as 64-bit words.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegerSet {
    words: [u64; 32],
}

impl IntegerSet {
    /// Number of representable indices.
    pub const CAPACITY: usize = 2048;

    /// Largest number of 32-bit words a stored set may carry.
    pub const MAX_STORED_WORDS: usize = Self::CAPACITY / 32;

    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from stored 32-bit words, or `None` if there are too many of them.
    pub fn from_u32_words(words: &[u32]) -> Option<Self> {
        if words.len() > Self::MAX_STORED_WORDS {
            return None;
        }
        let mut set = Self::default();
        for (i, &w) in words.iter().enumerate() {
            set.words[i / 2] |= u64::from(w) << ((i % 2) * 32);
        }
        Some(set)
    }

    /// Stored form: 32-bit words up to and including the last non-zero one.
    pub fn to_u32_words(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .words
            .iter()
            .flat_map(|&w| [w as u32, (w >> 32) as u32])
            .collect();
        while out.last() == Some(&0) {
            out.pop();
        }
        out
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::CAPACITY && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Adds `index`; returns `false` if it is beyond [`Self::CAPACITY`].
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= Self::CAPACITY {
            return false;
        }
        self.words[index / 64] |= 1u64 << (index % 64);
        true
    }

    pub fn remove(&mut self, index: usize) {
        if index < Self::CAPACITY {
            self.words[index / 64] &= !(1u64 << (index % 64));
        }
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn clear(&mut self) {
        self.words = [0; 32];
    }

    /// Set members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(wi * 64 + bit)
            })
        })
    }
}

impl FromIterator<usize> for IntegerSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::default();
        for i in iter {
            set.insert(i);
        }
        set
    }
}
