use std::collections::HashMap;

/// Transient timers owned by a run session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Clears the flash indicator of the sprite at this index.
    Flash(usize),
    /// Clears the collision banner.
    Banner,
}

/// Generation bookkeeping for cancellable timers. Re-arming a key supersedes any earlier
/// wakeup for it; a wakeup only fires when its generation is still the armed one.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    armed: HashMap<TimerKey, u64>,
    next_generation: u64,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, key: TimerKey) -> u64 {
        self.next_generation += 1;
        self.armed.insert(key, self.next_generation);
        self.next_generation
    }

    /// Consumes the armed entry if `generation` is still current.
    pub fn fire(&mut self, key: TimerKey, generation: u64) -> bool {
        if self.armed.get(&key) == Some(&generation) {
            self.armed.remove(&key);
            true
        } else {
            false
        }
    }

    pub fn disarm(&mut self, key: TimerKey) {
        self.armed.remove(&key);
    }

    pub fn cancel_all(&mut self) {
        self.armed.clear();
    }

    pub fn pending(&self) -> usize {
        self.armed.len()
    }
}
