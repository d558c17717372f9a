//! Pairwise overlap detection and the motion-queue swap it triggers.
//!
//! `detect_and_swap` must never run concurrently with itself: it is the single place that
//! mutates the shared collision-pair set and the run queues mid-run.

use crate::flatten::RunQueues;
use crate::model::{Block, Sprite};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Axis-aligned box in stage coordinates, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Aabb {
    pub fn of(sprite: &Sprite) -> Self {
        Self {
            left: sprite.x,
            top: sprite.y,
            right: sprite.x + sprite.width,
            bottom: sprite.y + sprite.height,
        }
    }

    /// Touching edges count as overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.right < other.left
            || other.right < self.left
            || self.bottom < other.top
            || other.bottom < self.top)
    }
}

/// Order-independent key of a sprite pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: String,
    high: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Pairs that already swapped during the current run.
#[derive(Debug, Clone, Default)]
pub struct CollisionPairs {
    seen: HashSet<PairKey>,
}

impl CollisionPairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.seen.contains(key)
    }

    pub fn insert(&mut self, key: PairKey) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

pub type PairHook<'h> = &'h mut dyn FnMut(&Sprite, &Sprite);

/// Tests every unordered pair of sprites and swaps the pending motion actions of each pair
/// that overlaps for the first time this run. Returns the index pairs that swapped, in
/// detection order.
pub fn detect_and_swap(
    sprites: &mut [Sprite],
    pairs: &mut CollisionPairs,
    queues: &mut RunQueues,
    mut on_swap: Option<PairHook<'_>>,
    mut on_collision: Option<PairHook<'_>>,
) -> Vec<(usize, usize)> {
    let mut swapped = Vec::new();
    for i in 0..sprites.len() {
        for j in (i + 1)..sprites.len() {
            let key = PairKey::new(&sprites[i].id, &sprites[j].id);
            if pairs.contains(&key) {
                continue;
            }
            if !Aabb::of(&sprites[i]).overlaps(&Aabb::of(&sprites[j])) {
                continue;
            }
            pairs.insert(key);

            let (a, b) = pair_mut(sprites, i, j);
            swap_motion(queues, &a.id, &b.id);
            swap_animation(a, b);
            a.flash = true;
            b.flash = true;

            if let Some(hook) = on_swap.as_deref_mut() {
                hook(&*a, &*b);
            }
            if let Some(hook) = on_collision.as_deref_mut() {
                hook(&*a, &*b);
            }
            swapped.push((i, j));
        }
    }
    swapped
}

/// Splits a queue into (motion, looks) keeping relative order inside each class.
pub fn partition_queue(queue: impl IntoIterator<Item = Block>) -> (Vec<Block>, Vec<Block>) {
    queue.into_iter().partition(|block| !block.is_looks())
}

/// Each sprite receives the other's motion actions followed by its own looks actions.
fn swap_motion(queues: &mut RunQueues, a_id: &str, b_id: &str) {
    let (motion_a, looks_a) = partition_queue(queues.take(a_id));
    let (motion_b, looks_b) = partition_queue(queues.take(b_id));
    queues.set(a_id, motion_b.into_iter().chain(looks_a));
    queues.set(b_id, motion_a.into_iter().chain(looks_b));
}

/// A sprite that is mid-speech keeps its indicator, and so does its partner.
fn swap_animation(a: &mut Sprite, b: &mut Sprite) {
    let a_looks = a.current_animation.is_some_and(|kind| kind.is_looks());
    let b_looks = b.current_animation.is_some_and(|kind| kind.is_looks());
    if !a_looks && !b_looks {
        std::mem::swap(&mut a.current_animation, &mut b.current_animation);
    }
}

fn pair_mut(sprites: &mut [Sprite], i: usize, j: usize) -> (&mut Sprite, &mut Sprite) {
    debug_assert!(i < j);
    let (head, tail) = sprites.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}
