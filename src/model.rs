use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Side length used for sprites that do not specify their own bounds.
pub const DEFAULT_SPRITE_SIZE: f64 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    Move,
    Turn,
    Goto,
    Repeat,
    Say,
    Think,
}

impl BlockKind {
    pub const ALL: [BlockKind; 6] = [
        BlockKind::Move,
        BlockKind::Turn,
        BlockKind::Goto,
        BlockKind::Repeat,
        BlockKind::Say,
        BlockKind::Think,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Move => "move",
            BlockKind::Turn => "turn",
            BlockKind::Goto => "goto",
            BlockKind::Repeat => "repeat",
            BlockKind::Say => "say",
            BlockKind::Think => "think",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        BlockKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == name)
    }

    /// Speech and thought actions stay bound to their sprite when queues are swapped.
    pub fn is_looks(self) -> bool {
        matches!(self, BlockKind::Say | BlockKind::Think)
    }

    pub fn is_loop(self) -> bool {
        self == BlockKind::Repeat
    }

    pub fn default_params(self) -> Params {
        match self {
            BlockKind::Move => Params::new().with("steps", 20.0),
            BlockKind::Turn => Params::new().with("degrees", 90.0),
            BlockKind::Goto => Params::new().with("x", 0.0).with("y", 0.0),
            BlockKind::Repeat => Params::new().with("times", 2.0),
            BlockKind::Say => Params::new().with("text", "Hello!").with("seconds", 2.0),
            BlockKind::Think => Params::new().with("text", "Hmm...").with("seconds", 2.0),
        }
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Absent,
}

impl ParamValue {
    /// Numeric reading of the value. Text is trimmed and parsed; anything that does not
    /// yield a finite number reads as `None`.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            ParamValue::Number(n) => *n,
            ParamValue::Text(s) => s.trim().parse::<f64>().ok()?,
            ParamValue::Absent => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn to_text(&self) -> String {
        match self {
            ParamValue::Number(n) => format_num(*n),
            ParamValue::Text(s) => s.clone(),
            ParamValue::Absent => String::new(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Overlays `patch` on top of these params. Keys missing from the patch are kept.
    pub fn merge(&mut self, patch: &Params) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ParamValue::as_number)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(ParamValue::Absent) | None => default.to_string(),
            Some(value) => value.to_text(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

/// A single command node. Only `repeat` blocks own children; every other kind keeps the
/// vector empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub params: Params,
    pub children: Vec<Block>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: kind.default_params(),
            children: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.set(key, value);
        self
    }

    /// Attaches a loop body. Ignored for kinds that cannot own children.
    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        if self.kind.is_loop() {
            self.children = children;
        }
        self
    }

    pub fn is_looks(&self) -> bool {
        self.kind.is_looks()
    }

    /// Depth-first walk over this block and all of its descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Block)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub id: String,
    pub blocks: Vec<Block>,
}

impl Script {
    pub fn new(id: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            id: id.into(),
            blocks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    Say,
    Think,
}

impl BubbleKind {
    pub fn for_block(kind: BlockKind) -> Option<Self> {
        match kind {
            BlockKind::Say => Some(BubbleKind::Say),
            BlockKind::Think => Some(BubbleKind::Think),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BubbleKind::Say => "say",
            BubbleKind::Think => "think",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub text: String,
    pub kind: BubbleKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub id: String,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub width: f64,
    pub height: f64,
    pub scripts: Vec<Script>,
    pub current_animation: Option<BlockKind>,
    pub bubble: Option<Bubble>,
    pub flash: bool,
}

impl Sprite {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        color: impl Into<String>,
        x: f64,
        y: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            x,
            y,
            rotation: 0.0,
            width: DEFAULT_SPRITE_SIZE,
            height: DEFAULT_SPRITE_SIZE,
            scripts: Vec::new(),
            current_animation: None,
            bubble: None,
            flash: false,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn clear_transient(&mut self) {
        self.current_animation = None;
        self.bubble = None;
        self.flash = false;
    }

    /// Every block id in the sprite's forest, in depth-first order.
    pub fn block_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for script in &self.scripts {
            for block in &script.blocks {
                block.walk(&mut |b| ids.push(b.id.as_str()));
            }
        }
        ids
    }
}

pub fn format_num(v: f64) -> String {
    if !v.is_finite() {
        return format!("{}", v);
    }
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_kind_names_round_trip_through_parse() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BlockKind::parse("glide"), None);
    }

    #[test]
    fn only_say_and_think_are_looks() {
        let looks = BlockKind::ALL
            .iter()
            .filter(|k| k.is_looks())
            .copied()
            .collect::<Vec<_>>();
        assert_eq!(looks, vec![BlockKind::Say, BlockKind::Think]);
    }

    #[test]
    fn numeric_reading_rejects_malformed_values() {
        assert_eq!(ParamValue::from(12.5).as_number(), Some(12.5));
        assert_eq!(ParamValue::from(" 40 ").as_number(), Some(40.0));
        assert_eq!(ParamValue::from("abc").as_number(), None);
        assert_eq!(ParamValue::from("").as_number(), None);
        assert_eq!(ParamValue::from(f64::NAN).as_number(), None);
        assert_eq!(ParamValue::from("inf").as_number(), None);
        assert_eq!(ParamValue::Absent.as_number(), None);
    }

    #[test]
    fn text_reading_formats_numbers_without_trailing_zeros() {
        assert_eq!(ParamValue::from(5.0).to_text(), "5");
        assert_eq!(ParamValue::from(2.5).to_text(), "2.5");
        assert_eq!(ParamValue::Absent.to_text(), "");
        let params = Params::new().with("text", ParamValue::Absent);
        assert_eq!(params.text_or("text", ""), "");
        assert_eq!(params.text_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn merge_keeps_keys_missing_from_patch() {
        let mut params = BlockKind::Say.default_params();
        params.merge(&Params::new().with("text", "Hi!"));
        assert_eq!(params.get("text"), Some(&ParamValue::from("Hi!")));
        assert_eq!(params.number("seconds"), Some(2.0));
    }

    #[test]
    fn children_are_only_attached_to_loops() {
        let body = vec![Block::new("m", BlockKind::Move)];
        let repeat = Block::new("r", BlockKind::Repeat).with_children(body.clone());
        let say = Block::new("s", BlockKind::Say).with_children(body);
        assert_eq!(repeat.children.len(), 1);
        assert!(say.children.is_empty());
    }

    #[test]
    fn block_ids_walk_nested_children() {
        let sprite = Sprite::new("a", "A", "#fff", 0.0, 0.0).with_script(Script::new(
            "s",
            vec![
                Block::new("r", BlockKind::Repeat)
                    .with_children(vec![Block::new("m", BlockKind::Move)]),
                Block::new("t", BlockKind::Turn),
            ],
        ));
        assert_eq!(sprite.block_ids(), vec!["r", "m", "t"]);
    }
}
