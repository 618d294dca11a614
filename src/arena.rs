//! Generational slot arena owning every attached peer
//!
//! Slots are recycled through a free list; each release bumps the slot's
//! generation so handles to deleted peers can never alias a newer peer.

use crate::peer::{Peer, PeerHandle};
use std::ops::{Index, IndexMut};

#[derive(Debug)]
struct Slot {
    generation: u32,
    peer: Option<Peer>,
}

#[derive(Debug, Default)]
pub(crate) struct PeerArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl PeerArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, peer: Peer) -> PeerHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.peer = Some(peer);
            return PeerHandle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            peer: Some(peer),
        });
        PeerHandle::new(index, 0)
    }

    /// Take the peer out of its slot. Stale handles return `None`.
    pub(crate) fn release(&mut self, handle: PeerHandle) -> Option<Peer> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let peer = slot.peer.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(peer)
    }

    pub(crate) fn get(&self, handle: PeerHandle) -> Option<&Peer> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.peer.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: PeerHandle) -> Option<&mut Peer> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.peer.as_mut())
    }

    pub(crate) fn contains(&self, handle: PeerHandle) -> bool {
        self.get(handle).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Height of a possibly-absent node: -1 when absent
    pub(crate) fn height(&self, handle: Option<PeerHandle>) -> i32 {
        handle
            .and_then(|h| self.get(h))
            .map_or(-1, |peer| peer.height)
    }

    /// Balance factor of a possibly-absent node: 0 when absent
    pub(crate) fn balance_factor(&self, handle: Option<PeerHandle>) -> i32 {
        match handle.and_then(|h| self.get(h)) {
            Some(peer) => self.height(peer.left) - self.height(peer.right),
            None => 0,
        }
    }
}

// Topology links always point at live slots; a miss here is a broken tree.
impl Index<PeerHandle> for PeerArena {
    type Output = Peer;

    fn index(&self, handle: PeerHandle) -> &Peer {
        match self.get(handle) {
            Some(peer) => peer,
            None => panic!("dangling peer handle {}", handle),
        }
    }
}

impl IndexMut<PeerHandle> for PeerArena {
    fn index_mut(&mut self, handle: PeerHandle) -> &mut Peer {
        match self.get_mut(handle) {
            Some(peer) => peer,
            None => panic!("dangling peer handle {}", handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_release() {
        let mut arena = PeerArena::new();
        let a = arena.alloc(Peer::new());
        let b = arena.alloc(Peer::new());
        assert_eq!(arena.len(), 2);
        assert!(arena.contains(a));

        assert!(arena.release(a).is_some());
        assert!(!arena.contains(a));
        assert!(arena.release(a).is_none());
        assert_eq!(arena.len(), 1);
        assert!(arena.contains(b));
    }

    #[test]
    fn test_reused_slot_does_not_alias_stale_handle() {
        let mut arena = PeerArena::new();
        let old = arena.alloc(Peer::new());
        arena.release(old);

        let new = arena.alloc(Peer::with_endpoint("vm", 1));
        assert_eq!(old.index, new.index);
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert_eq!(arena[new].addr(), "vm");
    }

    #[test]
    fn test_absent_height_and_balance() {
        let mut arena = PeerArena::new();
        assert_eq!(arena.height(None), -1);
        assert_eq!(arena.balance_factor(None), 0);

        let parent = arena.alloc(Peer::new());
        let child = arena.alloc(Peer::new());
        arena[parent].left = Some(child);
        arena[parent].height = 1;
        arena[child].parent = Some(parent);

        assert_eq!(arena.height(Some(child)), 0);
        assert_eq!(arena.height(Some(parent)), 1);
        assert_eq!(arena.balance_factor(Some(parent)), 1);
        assert_eq!(arena.balance_factor(Some(child)), 0);
    }

    #[test]
    #[should_panic(expected = "dangling peer handle")]
    fn test_index_on_stale_handle_panics() {
        let mut arena = PeerArena::new();
        let handle = arena.alloc(Peer::new());
        arena.release(handle);
        let _ = &arena[handle];
    }
}
