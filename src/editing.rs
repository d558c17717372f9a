//! Pure block-tree transforms used by the editor.
//!
//! Every transform borrows the input forest and returns a [`Cow`]: `Borrowed` when the
//! target id was not found (the caller keeps its tree as-is), `Owned` with the rebuilt
//! forest otherwise.

use crate::ids::IdGenerator;
use crate::model::{Block, BlockKind, Params};
use std::borrow::Cow;

pub fn create_block(ids: &mut dyn IdGenerator, kind: BlockKind) -> Block {
    Block::new(ids.next_id(), kind)
}

/// Appends `block` to the root sequence, or to the children of the loop `parent_id`.
/// Unknown parents and parents that cannot own children leave the forest unchanged.
pub fn append_block<'a>(
    blocks: &'a [Block],
    parent_id: Option<&str>,
    block: Block,
) -> Cow<'a, [Block]> {
    let Some(parent_id) = parent_id else {
        let mut next = blocks.to_vec();
        next.push(block);
        return Cow::Owned(next);
    };
    let Some(path) = locate(blocks, parent_id) else {
        return Cow::Borrowed(blocks);
    };
    let mut next = blocks.to_vec();
    match node_mut(&mut next, &path) {
        Some(parent) if parent.kind.is_loop() => {
            parent.children.push(block);
            Cow::Owned(next)
        }
        _ => Cow::Borrowed(blocks),
    }
}

pub fn update_block_params<'a>(
    blocks: &'a [Block],
    block_id: &str,
    patch: &Params,
) -> Cow<'a, [Block]> {
    let Some(path) = locate(blocks, block_id) else {
        return Cow::Borrowed(blocks);
    };
    let mut next = blocks.to_vec();
    match node_mut(&mut next, &path) {
        Some(target) => {
            target.params.merge(patch);
            Cow::Owned(next)
        }
        None => Cow::Borrowed(blocks),
    }
}

pub fn remove_block<'a>(blocks: &'a [Block], block_id: &str) -> Cow<'a, [Block]> {
    let Some(path) = locate(blocks, block_id) else {
        return Cow::Borrowed(blocks);
    };
    let Some((&index, parent_path)) = path.split_last() else {
        return Cow::Borrowed(blocks);
    };
    let mut next = blocks.to_vec();
    let container = if parent_path.is_empty() {
        Some(&mut next)
    } else {
        node_mut(&mut next, parent_path).map(|parent| &mut parent.children)
    };
    match container {
        Some(container) if index < container.len() => {
            container.remove(index);
            Cow::Owned(next)
        }
        _ => Cow::Borrowed(blocks),
    }
}

pub fn clone_block(block: &Block) -> Block {
    Block {
        id: block.id.clone(),
        kind: block.kind,
        params: block.params.clone(),
        children: clone_blocks(&block.children),
    }
}

/// Deep copy of a forest. The copy shares nothing with the original.
pub fn clone_blocks(blocks: &[Block]) -> Vec<Block> {
    blocks.iter().map(clone_block).collect()
}

/// Index path from the root sequence down to the block with `id`.
fn locate(blocks: &[Block], id: &str) -> Option<Vec<usize>> {
    for (index, block) in blocks.iter().enumerate() {
        if block.id == id {
            return Some(vec![index]);
        }
        if let Some(mut path) = locate(&block.children, id) {
            path.insert(0, index);
            return Some(path);
        }
    }
    None
}

fn node_mut<'b>(blocks: &'b mut [Block], path: &[usize]) -> Option<&'b mut Block> {
    let (&head, rest) = path.split_first()?;
    let node = blocks.get_mut(head)?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_mut(&mut node.children, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::model::ParamValue;

    fn ids() -> SequentialIds {
        SequentialIds::new("b")
    }

    #[test]
    fn create_block_fills_type_defaults() {
        let mut ids = ids();
        let cases = [
            (BlockKind::Move, vec![("steps", ParamValue::from(20.0))]),
            (BlockKind::Turn, vec![("degrees", ParamValue::from(90.0))]),
            (
                BlockKind::Goto,
                vec![("x", ParamValue::from(0.0)), ("y", ParamValue::from(0.0))],
            ),
            (BlockKind::Repeat, vec![("times", ParamValue::from(2.0))]),
            (
                BlockKind::Say,
                vec![
                    ("text", ParamValue::from("Hello!")),
                    ("seconds", ParamValue::from(2.0)),
                ],
            ),
            (
                BlockKind::Think,
                vec![
                    ("text", ParamValue::from("Hmm...")),
                    ("seconds", ParamValue::from(2.0)),
                ],
            ),
        ];
        for (kind, expected) in cases {
            let block = create_block(&mut ids, kind);
            assert_eq!(block.kind, kind);
            assert_eq!(block.params.len(), expected.len(), "kind={kind}");
            for (key, value) in expected {
                assert_eq!(block.params.get(key), Some(&value), "kind={kind} key={key}");
            }
            assert!(block.children.is_empty());
        }
    }

    #[test]
    fn created_blocks_get_distinct_ids() {
        let mut ids = ids();
        let a = create_block(&mut ids, BlockKind::Move);
        let b = create_block(&mut ids, BlockKind::Move);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn append_without_parent_goes_to_root() {
        let mut ids = ids();
        let blocks = vec![create_block(&mut ids, BlockKind::Move)];
        let turn = create_block(&mut ids, BlockKind::Turn);
        let result = append_block(&blocks, None, turn.clone());
        assert_eq!(result.len(), 2);
        assert_eq!(result[1], turn);
    }

    #[test]
    fn append_into_nested_loop() {
        let mut ids = ids();
        let inner = create_block(&mut ids, BlockKind::Repeat);
        let inner_id = inner.id.clone();
        let outer = create_block(&mut ids, BlockKind::Repeat).with_children(vec![inner]);
        let blocks = vec![outer];
        let move_block = create_block(&mut ids, BlockKind::Move);

        let result = append_block(&blocks, Some(&inner_id), move_block.clone());

        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result[0].children[0].children, vec![move_block]);
        assert!(blocks[0].children[0].children.is_empty());
    }

    #[test]
    fn append_to_unknown_or_non_loop_parent_is_a_no_op() {
        let mut ids = ids();
        let say = create_block(&mut ids, BlockKind::Say);
        let say_id = say.id.clone();
        let blocks = vec![say];
        let extra = create_block(&mut ids, BlockKind::Move);

        assert!(matches!(
            append_block(&blocks, Some("missing"), extra.clone()),
            Cow::Borrowed(_)
        ));
        assert!(matches!(
            append_block(&blocks, Some(&say_id), extra),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn update_params_merges_into_nested_block() {
        let mut ids = ids();
        let say = create_block(&mut ids, BlockKind::Say);
        let say_id = say.id.clone();
        let blocks = vec![create_block(&mut ids, BlockKind::Repeat).with_children(vec![say])];

        let result = update_block_params(&blocks, &say_id, &Params::new().with("text", "Hi!"));

        let params = &result[0].children[0].params;
        assert_eq!(params.get("text"), Some(&ParamValue::from("Hi!")));
        assert_eq!(params.number("seconds"), Some(2.0));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn update_params_for_unknown_id_keeps_input() {
        let mut ids = ids();
        let blocks = vec![create_block(&mut ids, BlockKind::Move)];
        let result = update_block_params(&blocks, "nope", &Params::new().with("steps", 5.0));
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn remove_from_root_and_from_children() {
        let mut ids = ids();
        let first = create_block(&mut ids, BlockKind::Move);
        let nested = create_block(&mut ids, BlockKind::Turn);
        let nested_id = nested.id.clone();
        let loop_block = create_block(&mut ids, BlockKind::Repeat).with_children(vec![nested]);
        let blocks = vec![first.clone(), loop_block];

        let without_first = remove_block(&blocks, &first.id);
        assert_eq!(without_first.len(), 1);
        assert_eq!(without_first[0].kind, BlockKind::Repeat);

        let without_nested = remove_block(&blocks, &nested_id);
        assert_eq!(without_nested.len(), 2);
        assert!(without_nested[1].children.is_empty());
    }

    #[test]
    fn remove_unknown_id_returns_borrowed_input() {
        let mut ids = ids();
        let blocks = vec![create_block(&mut ids, BlockKind::Move)];
        assert!(matches!(remove_block(&blocks, "nonexistent"), Cow::Borrowed(_)));
    }

    #[test]
    fn append_then_remove_restores_original() {
        let mut ids = ids();
        let repeat = create_block(&mut ids, BlockKind::Repeat)
            .with_children(vec![create_block(&mut ids, BlockKind::Say)]);
        let repeat_id = repeat.id.clone();
        let original = vec![create_block(&mut ids, BlockKind::Goto), repeat];
        let added = create_block(&mut ids, BlockKind::Think);
        let added_id = added.id.clone();

        let appended = append_block(&original, Some(&repeat_id), added).into_owned();
        let restored = remove_block(&appended, &added_id).into_owned();

        assert_eq!(restored, original);
    }

    #[test]
    fn clone_is_deep_and_equal() {
        let mut ids = ids();
        let blocks = vec![create_block(&mut ids, BlockKind::Repeat)
            .with_children(vec![create_block(&mut ids, BlockKind::Move)])];
        let mut copy = clone_blocks(&blocks);
        assert_eq!(copy, blocks);
        copy[0].children[0].params.set("steps", 99.0);
        assert_eq!(blocks[0].children[0].params.number("steps"), Some(20.0));
    }
}
