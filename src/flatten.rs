use crate::model::{Block, BlockKind, Params, Sprite};
use std::collections::{HashMap, VecDeque};

/// Upper bound on `repeat` iterations.
pub const MAX_REPEAT: u32 = 50;

/// Iteration count of a `repeat` block: non-numeric reads as zero, fractional counts
/// round up, and the result is clamped to `0..=limit`.
pub fn loop_count(params: &Params, limit: u32) -> u32 {
    let times = params.number("times").unwrap_or(0.0);
    if times <= 0.0 {
        return 0;
    }
    times.ceil().min(limit as f64) as u32
}

pub fn flatten(blocks: &[Block]) -> Vec<Block> {
    flatten_with_limit(blocks, MAX_REPEAT)
}

/// Expands a forest into a flat execution plan. Loops are inlined `times` times and never
/// appear in the output.
pub fn flatten_with_limit(blocks: &[Block], limit: u32) -> Vec<Block> {
    let mut out = Vec::new();
    flatten_into(blocks, limit, &mut out);
    out
}

fn flatten_into(blocks: &[Block], limit: u32, out: &mut Vec<Block>) {
    for block in blocks {
        if block.kind != BlockKind::Repeat {
            out.push(block.clone());
            continue;
        }
        let times = loop_count(&block.params, limit);
        if times == 0 || block.children.is_empty() {
            continue;
        }
        let body = flatten_with_limit(&block.children, limit);
        for _ in 0..times {
            out.extend(body.iter().cloned());
        }
    }
}

/// Per-sprite queues of blocks that have not started yet. Shared by every runner of one
/// run session and rewritten in place by collision swaps.
#[derive(Debug, Clone, Default)]
pub struct RunQueues {
    queues: HashMap<String, VecDeque<Block>>,
}

impl RunQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the sprite's queue with the concatenated plans of all of its scripts.
    pub fn seed(&mut self, sprite: &Sprite, limit: u32) -> usize {
        let mut queue = VecDeque::new();
        for script in &sprite.scripts {
            queue.extend(flatten_with_limit(&script.blocks, limit));
        }
        let len = queue.len();
        self.queues.insert(sprite.id.clone(), queue);
        len
    }

    pub fn get(&self, sprite_id: &str) -> Option<&VecDeque<Block>> {
        self.queues.get(sprite_id)
    }

    pub fn set(&mut self, sprite_id: impl Into<String>, queue: impl IntoIterator<Item = Block>) {
        self.queues
            .insert(sprite_id.into(), queue.into_iter().collect());
    }

    /// Removes the sprite's queue, leaving nothing behind. Missing queues read as empty.
    pub fn take(&mut self, sprite_id: &str) -> VecDeque<Block> {
        self.queues.remove(sprite_id).unwrap_or_default()
    }

    pub fn pop_front(&mut self, sprite_id: &str) -> Option<Block> {
        self.queues.get_mut(sprite_id)?.pop_front()
    }

    pub fn len_of(&self, sprite_id: &str) -> usize {
        self.queues.get(sprite_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn ids_of(&self, sprite_id: &str) -> Vec<String> {
        self.queues
            .get(sprite_id)
            .map(|queue| queue.iter().map(|b| b.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Script;

    fn move_block(id: &str) -> Block {
        Block::new(id, BlockKind::Move)
    }

    fn repeat(id: &str, times: impl Into<crate::model::ParamValue>, body: Vec<Block>) -> Block {
        Block::new(id, BlockKind::Repeat)
            .with_param("times", times)
            .with_children(body)
    }

    #[test]
    fn repeat_expands_body_times() {
        let plan = flatten(&[repeat("r", 3.0, vec![move_block("m")])]);
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|b| b.kind == BlockKind::Move && b.id == "m"));
    }

    #[test]
    fn zero_or_empty_loops_contribute_nothing() {
        assert!(flatten(&[repeat("r", 0.0, vec![move_block("m")])]).is_empty());
        assert!(flatten(&[repeat("r", 4.0, Vec::new())]).is_empty());
        assert!(flatten(&[repeat("r", "lots", vec![move_block("m")])]).is_empty());
        assert!(flatten(&[repeat("r", -3.0, vec![move_block("m")])]).is_empty());
    }

    #[test]
    fn repeat_count_is_clamped() {
        let plan = flatten(&[repeat("r", 75.0, vec![move_block("m")])]);
        assert_eq!(plan.len(), 50);
    }

    #[test]
    fn fractional_counts_round_up() {
        let plan = flatten(&[repeat("r", 2.5, vec![move_block("m")])]);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn nested_loops_multiply_and_keep_order() {
        let inner = repeat(
            "inner",
            2.0,
            vec![Block::new("t", BlockKind::Turn), Block::new("s", BlockKind::Say)],
        );
        let plan = flatten(&[
            move_block("first"),
            repeat("outer", 2.0, vec![inner, move_block("m")]),
        ]);
        let ids = plan.iter().map(|b| b.id.as_str()).collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec!["first", "t", "s", "t", "s", "m", "t", "s", "t", "s", "m"]
        );
        assert!(plan.iter().all(|b| b.kind != BlockKind::Repeat));
    }

    #[test]
    fn seeding_concatenates_scripts_and_overwrites() {
        let sprite = crate::model::Sprite::new("a", "A", "#fff", 0.0, 0.0)
            .with_script(Script::new("s1", vec![move_block("m1")]))
            .with_script(Script::new(
                "s2",
                vec![repeat("r", 2.0, vec![Block::new("t", BlockKind::Turn)])],
            ));
        let mut queues = RunQueues::new();
        queues.set("a", vec![move_block("stale")]);

        assert_eq!(queues.seed(&sprite, MAX_REPEAT), 3);
        assert_eq!(queues.ids_of("a"), vec!["m1", "t", "t"]);
        assert_eq!(queues.pop_front("a").map(|b| b.id), Some("m1".to_string()));
        assert_eq!(queues.len_of("a"), 2);
        assert_eq!(queues.len_of("unknown"), 0);
    }
}
