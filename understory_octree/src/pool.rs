// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot arena with a free list, used for element and octant records.

use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

/// Records live in slots addressed by `usize`; freed slots are recycled LIFO.
#[derive(Clone, Debug)]
pub(crate) struct Pool<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<usize>,
    live: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        let spare = self.free_list.len();
        if additional > spare {
            self.slots.reserve(additional - spare);
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> usize {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            debug_assert!(self.slots[idx].is_none(), "free slot {idx} is occupied");
            self.slots[idx] = Some(value);
            idx
        } else {
            self.slots.push(Some(value));
            self.slots.len() - 1
        }
    }

    pub(crate) fn remove(&mut self, idx: usize) -> Option<T> {
        let value = self.slots.get_mut(idx)?.take()?;
        self.free_list.push(idx);
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx)?.as_ref()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.live = 0;
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }
}

impl<T> Index<usize> for Pool<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, idx: usize) -> &T {
        match self.slots[idx].as_ref() {
            Some(v) => v,
            None => panic!("pool slot {idx} is vacant"),
        }
    }
}

impl<T> IndexMut<usize> for Pool<T> {
    #[track_caller]
    fn index_mut(&mut self, idx: usize) -> &mut T {
        match self.slots[idx].as_mut() {
            Some(v) => v,
            None => panic!("pool slot {idx} is vacant"),
        }
    }
}
