//! A typed root stack dressed up as a mark/sweep arena: allocation pushes a
//! live object and its handle onto the same stack, `mark`/`sweep` walk that
//! stack rather than a traced object graph. Grounded in the teacher's
//! `simple_gc` sketch (`GcDesc`, `ObjectTable::mark`/`sweep`) but reworked
//! single-threaded and safe — no `BiasedMutex`, no `Condvar`, no raw
//! pointers. Only direct roots are marked; this context does not trace
//! references between objects.

use std::any::Any;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unmarked,
    Marked,
}

struct Slot {
    value: Box<dyn Any>,
    generation: u32,
    mark: Mark,
    live: bool,
}

/// An opaque reference into a `Context`'s arena. Never dereferenced outside
/// this module; callers go through `Context::get`/`get_mut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    index: usize,
    generation: u32,
}

/// A GC root set plus the objects it owns. `stack_max` bounds the root
/// stack the way a real frame's operand stack is bounded by `maxStack`.
pub struct Context {
    objects: Vec<Slot>,
    roots: Vec<ObjectHandle>,
    stack_max: usize,
}

impl Context {
    pub fn new(stack_max: usize) -> Self {
        Context {
            objects: Vec::new(),
            roots: Vec::new(),
            stack_max,
        }
    }

    /// Allocates `value`, records it as live, and pushes its handle onto the
    /// root stack.
    pub fn push<T: Any>(&mut self, value: T) -> CoreResult<ObjectHandle> {
        if self.roots.len() >= self.stack_max {
            return Err(CoreError::StackOverflow);
        }

        let index = self.objects.len();
        let generation = 0;
        self.objects.push(Slot {
            value: Box::new(value),
            generation,
            mark: Mark::Unmarked,
            live: true,
        });

        let handle = ObjectHandle { index, generation };
        self.roots.push(handle);
        trace!("pushed object at slot {}, root depth now {}", index, self.roots.len());
        Ok(handle)
    }

    /// Removes and returns the top of the root stack. The object itself
    /// stays allocated until a `sweep` finds it unreachable.
    pub fn pop(&mut self) -> CoreResult<ObjectHandle> {
        self.roots.pop().ok_or(CoreError::StackUnderflow)
    }

    pub fn peek(&self) -> CoreResult<ObjectHandle> {
        self.roots.last().copied().ok_or(CoreError::StackUnderflow)
    }

    pub fn root_depth(&self) -> usize {
        self.roots.len()
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&Slot> {
        self.objects
            .get(handle.index)
            .filter(|s| s.live && s.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut Slot> {
        self.objects
            .get_mut(handle.index)
            .filter(|s| s.live && s.generation == handle.generation)
    }

    pub fn get<T: Any>(&self, handle: ObjectHandle) -> Option<&T> {
        self.slot(handle)?.value.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, handle: ObjectHandle) -> Option<&mut T> {
        self.slot_mut(handle)?.value.downcast_mut::<T>()
    }

    /// Marks every object currently on the root stack. Objects reachable
    /// only through another object's fields are not traced — this context
    /// owns a root stack, not an object graph.
    pub fn mark(&mut self) {
        for &handle in &self.roots {
            if let Some(slot) = self.objects.get_mut(handle.index) {
                if slot.live && slot.generation == handle.generation {
                    slot.mark = Mark::Marked;
                }
            }
        }
        debug!("marked {} root object(s)", self.roots.len());
    }

    /// Frees every unmarked object and clears marks on survivors. A slot
    /// freed here has its generation bumped so any stale handle into it
    /// (one that was popped before this sweep) can never resolve again.
    pub fn sweep(&mut self) {
        let mut freed = 0;
        for slot in &mut self.objects {
            if !slot.live {
                continue;
            }
            match slot.mark {
                Mark::Marked => slot.mark = Mark::Unmarked,
                Mark::Unmarked => {
                    slot.live = false;
                    slot.generation = slot.generation.wrapping_add(1);
                    slot.value = Box::new(());
                    freed += 1;
                }
            }
        }
        debug!("swept {} unreachable object(s)", freed);
    }

    /// Frees every object regardless of mark state, used when the context
    /// itself is torn down.
    pub fn destroy(&mut self) {
        self.roots.clear();
        for slot in &mut self.objects {
            slot.live = false;
            slot.generation = slot.generation.wrapping_add(1);
        }
        self.objects.clear();
    }
}
