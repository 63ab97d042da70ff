//! Thread-local reusable buffers for ef-search, avoiding an allocation on
//! every query's visited set and candidate/working heaps.

use crate::heap::Candidate;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

#[derive(Default)]
pub struct QueryBuffers {
    pub visited: HashSet<u32>,
    pub candidates: BinaryHeap<Reverse<Candidate>>,
    pub working: BinaryHeap<Candidate>,
}

impl QueryBuffers {
    pub fn clear(&mut self) {
        self.visited.clear();
        self.candidates.clear();
        self.working.clear();
    }
}

thread_local! {
    static QUERY_BUFFERS: RefCell<QueryBuffers> = RefCell::new(QueryBuffers::default());
}

/// Run `f` with this thread's buffer set, cleared before and after use.
pub fn with_buffers<F, R>(f: F) -> R
where
    F: FnOnce(&mut QueryBuffers) -> R,
{
    QUERY_BUFFERS.with(|buffers| {
        let mut buffers = buffers.borrow_mut();
        buffers.clear();
        let result = f(&mut buffers);
        buffers.clear();
        result
    })
}
