//! Datablock handles and the arena that owns datablocks
//!
//! Handles are plain slot indices. Slots are never reused, so a handle to a
//! removed datablock stays stale instead of aliasing a newer one.

use std::fmt;
use std::marker::PhantomData;

/// Conversion between a typed handle and its slot index
pub trait ArenaKey: Copy + Eq + fmt::Display {
    /// Short datablock kind used in diagnostics
    const KIND: &'static str;

    fn from_index(index: u32) -> Self;
    fn index(&self) -> u32;
}

macro_rules! datablock_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Raw slot index
            #[inline]
            pub const fn index(&self) -> u32 {
                self.0
            }
        }

        impl ArenaKey for $name {
            const KIND: &'static str = $kind;

            #[inline]
            fn from_index(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            fn index(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

datablock_id!(
    /// Handle to an object datablock
    ObjectId,
    "object"
);
datablock_id!(
    /// Handle to a collection datablock (scene roots included)
    CollectionId,
    "collection"
);
datablock_id!(
    /// Handle to a scene datablock
    SceneId,
    "scene"
);
datablock_id!(
    /// Handle to a library (a linked source document)
    LibraryId,
    "library"
);
datablock_id!(
    /// Handle to an image datablock
    ImageId,
    "image"
);

/// Append-only slot storage addressed by typed handles
#[derive(Clone, Debug)]
pub(crate) struct Arena<K, T> {
    slots: Vec<Option<T>>,
    len: usize,
    _marker: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> K {
        let index = self.slots.len() as u32;
        self.slots.push(Some(value));
        self.len += 1;
        K::from_index(index)
    }

    #[inline]
    pub fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key.index() as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots
            .get_mut(key.index() as usize)
            .and_then(Option::as_mut)
    }

    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let removed = self.slots.get_mut(key.index() as usize)?.take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Live entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::from_index(i as u32), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (K::from_index(i as u32), v)))
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k).collect()
    }
}
