//! Effect block indices and sets of them.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Device-side slot holding one effect's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockIndex(pub u8);

impl BlockIndex {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<BlockIndex> for i32 {
    fn from(block: BlockIndex) -> Self {
        i32::from(block.0)
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-size bitmap over all 256 block indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockSet([u64; 4]);

impl BlockSet {
    pub const fn new() -> Self {
        Self([0; 4])
    }

    fn slot(block: BlockIndex) -> (usize, u64) {
        let index = usize::from(block.0);
        (index / 64, 1u64 << (index % 64))
    }

    pub fn insert(&mut self, block: BlockIndex) -> bool {
        let (word, bit) = Self::slot(block);
        match self.0.get_mut(word) {
            Some(w) => {
                let fresh = *w & bit == 0;
                *w |= bit;
                fresh
            }
            None => false,
        }
    }

    pub fn remove(&mut self, block: BlockIndex) -> bool {
        let (word, bit) = Self::slot(block);
        match self.0.get_mut(word) {
            Some(w) => {
                let present = *w & bit != 0;
                *w &= !bit;
                present
            }
            None => false,
        }
    }

    pub fn contains(&self, block: BlockIndex) -> bool {
        let (word, bit) = Self::slot(block);
        self.0.get(word).is_some_and(|w| w & bit != 0)
    }

    pub fn clear(&mut self) {
        self.0 = [0; 4];
    }

    /// Keeps only the blocks also present in `other`.
    pub fn retain_in(&mut self, other: &Self) {
        for (w, o) in self.0.iter_mut().zip(other.0) {
            *w &= o;
        }
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        (0..=u8::MAX)
            .map(BlockIndex)
            .filter(|b| self.contains(*b))
    }
}

impl FromIterator<BlockIndex> for BlockSet {
    fn from_iter<I: IntoIterator<Item = BlockIndex>>(iter: I) -> Self {
        let mut set = Self::new();
        for block in iter {
            set.insert(block);
        }
        set
    }
}
