//! Priority-bucketed effect chain
//!
//! The chain holds the active effects partitioned into the five priority
//! buckets. It is shared between the processing loop and the control surface
//! as a [`SharedChain`]; holding the lock for a whole executor pass means the
//! executor never observes a bucket mid-mutation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::{Effect, Priority};

/// Chain shared by the processing loop and the control surface
pub type SharedChain = Arc<Mutex<PriorityChain>>;

/// Identity of an effect instance in the chain
///
/// Survives in-place reconstruction, so a control binding can keep pointing
/// at "its" effect while the instance behind it is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        EffectId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One active effect
pub struct ChainEntry {
    pub id: EffectId,
    pub effect: Box<dyn Effect>,
}

/// Active effects grouped by priority, insertion order kept per bucket
#[derive(Default)]
pub struct PriorityChain {
    buckets: [Vec<ChainEntry>; 5],
}

impl PriorityChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chain ready to be shared
    pub fn shared() -> SharedChain {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append an effect to its priority's bucket
    pub fn add(&mut self, effect: Box<dyn Effect>) -> EffectId {
        let id = EffectId::next();
        let priority = effect.priority();
        log::debug!("chain: add {} {} to bucket {}", effect.effect_type(), id, priority);
        self.buckets[priority.index()].push(ChainEntry { id, effect });
        id
    }

    /// Remove an effect by identity. Returns the instance, or `None` if it was
    /// not in the chain.
    pub fn remove(&mut self, id: EffectId) -> Option<Box<dyn Effect>> {
        for bucket in &mut self.buckets {
            if let Some(pos) = bucket.iter().position(|entry| entry.id == id) {
                let entry = bucket.remove(pos);
                log::debug!("chain: removed {} {}", entry.effect.effect_type(), id);
                return Some(entry.effect);
            }
        }
        None
    }

    /// Swap a new instance in behind an existing identity.
    ///
    /// The entry keeps its position unless the new instance reports a
    /// different priority, in which case it moves to the end of the matching
    /// bucket. Returns `false` (and drops `effect`) if `id` is not present.
    pub fn replace(&mut self, id: EffectId, effect: Box<dyn Effect>) -> bool {
        let Some((bucket_index, pos)) = self.locate(id) else {
            return false;
        };

        let target = effect.priority().index();
        if target == bucket_index {
            self.buckets[bucket_index][pos].effect = effect;
        } else {
            self.buckets[bucket_index].remove(pos);
            self.buckets[target].push(ChainEntry { id, effect });
        }
        true
    }

    /// Remove every effect from every bucket
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.locate(id).is_some()
    }

    pub fn get(&self, id: EffectId) -> Option<&dyn Effect> {
        self.locate(id)
            .map(|(b, pos)| self.buckets[b][pos].effect.as_ref())
    }

    /// Effects in one bucket, in execution order
    pub fn bucket(&self, priority: Priority) -> &[ChainEntry] {
        &self.buckets[priority.index()]
    }

    pub(crate) fn bucket_mut(&mut self, priority: Priority) -> &mut [ChainEntry] {
        &mut self.buckets[priority.index()]
    }

    /// Total number of active effects
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    fn locate(&self, id: EffectId) -> Option<(usize, usize)> {
        self.buckets.iter().enumerate().find_map(|(b, bucket)| {
            bucket
                .iter()
                .position(|entry| entry.id == id)
                .map(|pos| (b, pos))
        })
    }
}

impl fmt::Debug for PriorityChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for priority in Priority::ALL {
            let names: Vec<_> = self
                .bucket(priority)
                .iter()
                .map(|entry| entry.effect.effect_type())
                .collect();
            list.entry(&priority.level(), &names);
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::traits::TickContext;
    use crate::effects::EffectError;
    use crate::frame::Frame;

    struct Tagged {
        name: &'static str,
        priority: Priority,
    }

    impl Effect for Tagged {
        fn effect_type(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> Priority {
            self.priority
        }

        fn apply(&mut self, _frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
            Ok(None)
        }
    }

    fn tagged(name: &'static str, priority: Priority) -> Box<dyn Effect> {
        Box::new(Tagged { name, priority })
    }

    fn names(chain: &PriorityChain, priority: Priority) -> Vec<&'static str> {
        chain
            .bucket(priority)
            .iter()
            .map(|e| e.effect.effect_type())
            .collect()
    }

    #[test]
    fn test_add_goes_to_priority_bucket() {
        let mut chain = PriorityChain::new();
        chain.add(tagged("a", Priority::Normal));
        chain.add(tagged("b", Priority::Override));
        chain.add(tagged("c", Priority::Normal));

        assert_eq!(chain.len(), 3);
        assert_eq!(names(&chain, Priority::Normal), vec!["a", "c"]);
        assert_eq!(names(&chain, Priority::Override), vec!["b"]);
        assert!(chain.bucket(Priority::Fast).is_empty());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut chain = PriorityChain::new();
        let first = chain.add(tagged("same", Priority::Normal));
        let second = chain.add(tagged("same", Priority::Normal));

        assert!(chain.remove(second).is_some());
        assert!(chain.contains(first));
        assert!(!chain.contains(second));

        // Redundant removal is a no-op
        assert!(chain.remove(second).is_none());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut chain = PriorityChain::new();
        for priority in Priority::ALL {
            chain.add(tagged("x", priority));
        }
        assert_eq!(chain.len(), 5);
        chain.clear();
        assert!(chain.is_empty());
        chain.clear();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut chain = PriorityChain::new();
        chain.add(tagged("a", Priority::Normal));
        let id = chain.add(tagged("b", Priority::Normal));
        chain.add(tagged("c", Priority::Normal));

        assert!(chain.replace(id, tagged("b2", Priority::Normal)));
        assert_eq!(names(&chain, Priority::Normal), vec!["a", "b2", "c"]);
        assert_eq!(chain.get(id).map(|e| e.effect_type()), Some("b2"));
    }

    #[test]
    fn test_replace_moves_on_priority_change() {
        let mut chain = PriorityChain::new();
        let id = chain.add(tagged("pack", Priority::Normal));
        chain.add(tagged("x", Priority::Final));

        assert!(chain.replace(id, tagged("pack", Priority::Final)));
        assert!(chain.bucket(Priority::Normal).is_empty());
        assert_eq!(names(&chain, Priority::Final), vec!["x", "pack"]);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_replace_missing() {
        let mut chain = PriorityChain::new();
        let id = chain.add(tagged("a", Priority::Normal));
        chain.remove(id);
        assert!(!chain.replace(id, tagged("a", Priority::Normal)));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_ids_unique() {
        let mut chain = PriorityChain::new();
        let a = chain.add(tagged("a", Priority::Normal));
        let b = chain.add(tagged("a", Priority::Normal));
        assert_ne!(a, b);
        assert!(chain.remove(a).is_some());
        assert!(chain.get(b).is_some());
        assert_eq!(chain.len(), 1);
    }
}
