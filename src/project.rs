//! Editor-facing sprite collection and the JSON project loader used by the CLI.

use crate::editing;
use crate::ids::IdGenerator;
use crate::model::{
    Block, BlockKind, ParamValue, Params, Script, Sprite, DEFAULT_SPRITE_SIZE,
};
use crate::runtime::{RunReport, Runtime, RuntimeObserver};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

pub const SPRITE_COLORS: [&str; 8] = [
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#f9ca24", "#6c5ce7", "#fd79a8", "#fdcb6e", "#55efc4",
];

pub const SPRITE_NAMES: [&str; 10] = [
    "Star", "Flash", "Spark", "Blaze", "Glow", "Shine", "Beam", "Ray", "Luna", "Sol",
];

const FALLBACK_COLOR: &str = "#888888";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read project file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("project is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{context}: {message}")]
    Invalid { context: String, message: String },
    #[error("{context}: unknown block type '{kind}'")]
    UnknownBlockType { context: String, kind: String },
    #[error("{context}: '{kind}' blocks cannot have children")]
    UnexpectedChildren { context: String, kind: BlockKind },
    #[error("sprite '{sprite}' uses block id '{id}' more than once")]
    DuplicateBlockId { sprite: String, id: String },
    #[error("sprite id '{0}' is used more than once")]
    DuplicateSpriteId(String),
    #[error("{context}: '{color}' is not a #rrggbb colour")]
    InvalidColor { context: String, color: String },
    #[error("project must define at least one sprite")]
    NoSprites,
    #[error("you must keep at least one sprite")]
    LastSprite,
    #[error("unknown sprite '{0}'")]
    UnknownSprite(String),
}

fn invalid(context: impl Into<String>, message: impl Into<String>) -> ProjectError {
    ProjectError::Invalid {
        context: context.into(),
        message: message.into(),
    }
}

fn color_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").ok())
        .as_ref()
}

pub fn is_valid_color(color: &str) -> bool {
    color_pattern().is_some_and(|re| re.is_match(color))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub sprites: Vec<Sprite>,
}

impl Project {
    pub fn new(sprites: Vec<Sprite>) -> Self {
        Self { sprites }
    }

    /// Comet, Bolt and Nova with one empty script each.
    pub fn starter(ids: &mut dyn IdGenerator) -> Self {
        let sprites = [
            ("Comet", "#ffbf69", 60.0, 60.0),
            ("Bolt", "#40c9ff", 180.0, 160.0),
            ("Nova", "#a29bfe", 320.0, 80.0),
        ]
        .into_iter()
        .map(|(name, color, x, y)| blank_sprite(ids, name, color, x, y))
        .collect();
        Self { sprites }
    }

    /// Starter sprites with short scripts that steer Comet and Bolt into each other.
    pub fn demo(ids: &mut dyn IdGenerator) -> Self {
        let mut project = Self::starter(ids);
        let mut block = |kind: BlockKind| editing::create_block(ids, kind);

        let comet = vec![
            block(BlockKind::Turn).with_param("degrees", 45.0),
            block(BlockKind::Repeat)
                .with_param("times", 4.0)
                .with_children(vec![block(BlockKind::Move).with_param("steps", 40.0)]),
            block(BlockKind::Say).with_param("text", "Made it!").with_param("seconds", 1.0),
        ];
        let bolt = vec![
            block(BlockKind::Think).with_param("seconds", 0.5),
            block(BlockKind::Turn).with_param("degrees", 180.0),
            block(BlockKind::Move).with_param("steps", 30.0),
            block(BlockKind::Move).with_param("steps", 30.0),
        ];
        let nova = vec![
            block(BlockKind::Repeat)
                .with_param("times", 3.0)
                .with_children(vec![block(BlockKind::Turn).with_param("degrees", 120.0)]),
            block(BlockKind::Goto).with_param("x", 300.0).with_param("y", 200.0),
        ];
        for (sprite, blocks) in project.sprites.iter_mut().zip([comet, bolt, nova]) {
            if let Some(script) = sprite.scripts.first_mut() {
                script.blocks = blocks;
            }
        }
        project
    }

    pub fn sprite(&self, sprite_id: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.id == sprite_id)
    }

    /// Adds a sprite with an unused palette colour and a unique name at a random position.
    pub fn add_sprite<R: Rng + ?Sized>(&mut self, ids: &mut dyn IdGenerator, rng: &mut R) -> String {
        let used = self
            .sprites
            .iter()
            .map(|s| s.color.as_str())
            .collect::<HashSet<_>>();
        let color = SPRITE_COLORS
            .iter()
            .find(|c| !used.contains(*c))
            .or_else(|| SPRITE_COLORS.choose(rng))
            .copied()
            .unwrap_or(FALLBACK_COLOR);

        let base = SPRITE_NAMES.choose(rng).copied().unwrap_or("Sprite");
        let mut name = base.to_string();
        let mut counter = 1;
        while self.sprites.iter().any(|s| s.name == name) {
            name = format!("{base}{counter}");
            counter += 1;
        }

        let x = 50.0 + rng.gen_range(0.0..200.0);
        let y = 50.0 + rng.gen_range(0.0..150.0);
        let sprite = blank_sprite(ids, &name, color, x, y);
        let id = sprite.id.clone();
        self.sprites.push(sprite);
        id
    }

    pub fn remove_sprite(&mut self, sprite_id: &str) -> Result<Sprite, ProjectError> {
        let idx = self
            .sprites
            .iter()
            .position(|s| s.id == sprite_id)
            .ok_or_else(|| ProjectError::UnknownSprite(sprite_id.to_string()))?;
        if self.sprites.len() <= 1 {
            return Err(ProjectError::LastSprite);
        }
        Ok(self.sprites.remove(idx))
    }

    /// Applies a block-tree transform to the sprite's first script, creating that script when
    /// the sprite has none. Returns whether the sprite changed.
    pub fn edit_primary_script<F>(
        &mut self,
        ids: &mut dyn IdGenerator,
        sprite_id: &str,
        transform: F,
    ) -> Result<bool, ProjectError>
    where
        F: for<'a> FnOnce(&'a [Block]) -> Cow<'a, [Block]>,
    {
        let sprite = self
            .sprites
            .iter_mut()
            .find(|s| s.id == sprite_id)
            .ok_or_else(|| ProjectError::UnknownSprite(sprite_id.to_string()))?;
        let created = sprite.scripts.is_empty();
        if created {
            sprite.scripts.push(Script::new(ids.next_id(), Vec::new()));
        }
        let primary = &mut sprite.scripts[0];
        let next = match transform(&primary.blocks) {
            Cow::Borrowed(_) => return Ok(created),
            Cow::Owned(next) => next,
        };
        primary.blocks = next;
        Ok(true)
    }

    pub fn append_block(
        &mut self,
        ids: &mut dyn IdGenerator,
        sprite_id: &str,
        parent_id: Option<&str>,
        block: Block,
    ) -> Result<bool, ProjectError> {
        self.edit_primary_script(ids, sprite_id, |blocks| {
            editing::append_block(blocks, parent_id, block)
        })
    }

    pub fn update_block_params(
        &mut self,
        ids: &mut dyn IdGenerator,
        sprite_id: &str,
        block_id: &str,
        patch: &Params,
    ) -> Result<bool, ProjectError> {
        self.edit_primary_script(ids, sprite_id, |blocks| {
            editing::update_block_params(blocks, block_id, patch)
        })
    }

    pub fn remove_block(
        &mut self,
        ids: &mut dyn IdGenerator,
        sprite_id: &str,
        block_id: &str,
    ) -> Result<bool, ProjectError> {
        self.edit_primary_script(ids, sprite_id, |blocks| {
            editing::remove_block(blocks, block_id)
        })
    }

    pub fn run(&mut self, runtime: &Runtime, observer: &mut dyn RuntimeObserver) -> RunReport {
        runtime.run_all(&mut self.sprites, observer)
    }

    pub fn load_file(path: &Path, ids: &mut dyn IdGenerator) -> Result<Self, ProjectError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text, ids)
    }

    pub fn from_json_str(text: &str, ids: &mut dyn IdGenerator) -> Result<Self, ProjectError> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_json(&root, ids)
    }

    pub fn from_json(root: &Value, ids: &mut dyn IdGenerator) -> Result<Self, ProjectError> {
        let sprites_json = root
            .get("sprites")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("project", "missing 'sprites' array"))?;
        if sprites_json.is_empty() {
            return Err(ProjectError::NoSprites);
        }

        let mut sprites = Vec::with_capacity(sprites_json.len());
        let mut sprite_ids = HashSet::new();
        for (index, sprite_json) in sprites_json.iter().enumerate() {
            let sprite = read_sprite(sprite_json, index, ids)?;
            if !sprite_ids.insert(sprite.id.clone()) {
                return Err(ProjectError::DuplicateSpriteId(sprite.id));
            }
            sprites.push(sprite);
        }
        Ok(Self { sprites })
    }
}

fn blank_sprite(ids: &mut dyn IdGenerator, name: &str, color: &str, x: f64, y: f64) -> Sprite {
    let id = ids.next_id();
    let script = Script::new(ids.next_id(), Vec::new());
    Sprite::new(id, name, color, x, y).with_script(script)
}

fn read_sprite(value: &Value, index: usize, ids: &mut dyn IdGenerator) -> Result<Sprite, ProjectError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(format!("sprite #{index}"), "expected an object"))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid(format!("sprite #{index}"), "missing 'name'"))?
        .to_string();
    let context = format!("sprite '{name}'");

    let id = read_id(obj, ids);
    let color = obj
        .get("color")
        .and_then(Value::as_str)
        .unwrap_or(FALLBACK_COLOR)
        .to_string();
    if !is_valid_color(&color) {
        return Err(ProjectError::InvalidColor { context, color });
    }

    let x = require_number(obj, "x", &context)?;
    let y = require_number(obj, "y", &context)?;
    let rotation = optional_number(obj, "rotation", &context)?.unwrap_or(0.0);
    let width = optional_number(obj, "width", &context)?.unwrap_or(DEFAULT_SPRITE_SIZE);
    let height = optional_number(obj, "height", &context)?.unwrap_or(DEFAULT_SPRITE_SIZE);
    if width <= 0.0 || height <= 0.0 {
        return Err(invalid(context, "width and height must be positive"));
    }

    let mut scripts = Vec::new();
    if let Some(scripts_json) = obj.get("scripts") {
        let list = scripts_json
            .as_array()
            .ok_or_else(|| invalid(context.clone(), "'scripts' must be an array"))?;
        for script_json in list {
            scripts.push(read_script(script_json, &context, ids)?);
        }
    }

    let mut sprite = Sprite::new(id, name, color, x, y).with_rotation(rotation);
    sprite.width = width;
    sprite.height = height;
    sprite.scripts = scripts;

    if let Some(id) = first_duplicate(sprite.block_ids()) {
        return Err(ProjectError::DuplicateBlockId {
            sprite: sprite.name,
            id,
        });
    }
    Ok(sprite)
}

fn first_duplicate<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .find(|id| !seen.insert(*id))
        .map(str::to_string)
}

fn read_script(value: &Value, context: &str, ids: &mut dyn IdGenerator) -> Result<Script, ProjectError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(context, "script must be an object"))?;
    let id = read_id(obj, ids);
    let blocks = match obj.get("blocks") {
        Some(list) => read_blocks(list, context, ids)?,
        None => Vec::new(),
    };
    Ok(Script::new(id, blocks))
}

fn read_blocks(value: &Value, context: &str, ids: &mut dyn IdGenerator) -> Result<Vec<Block>, ProjectError> {
    let list = value
        .as_array()
        .ok_or_else(|| invalid(context, "'blocks' must be an array"))?;
    list.iter().map(|b| read_block(b, context, ids)).collect()
}

fn read_block(value: &Value, context: &str, ids: &mut dyn IdGenerator) -> Result<Block, ProjectError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(context, "block must be an object"))?;
    let kind_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(context, "block is missing 'type'"))?;
    let kind = BlockKind::parse(kind_name).ok_or_else(|| ProjectError::UnknownBlockType {
        context: context.to_string(),
        kind: kind_name.to_string(),
    })?;

    let mut block = Block::new(read_id(obj, ids), kind);
    if let Some(params) = obj.get("params") {
        let params = params
            .as_object()
            .ok_or_else(|| invalid(context, "'params' must be an object"))?;
        for (key, raw) in params {
            block.params.set(key.clone(), read_param(raw, context)?);
        }
    }

    if let Some(children) = obj.get("children") {
        let children = read_blocks(children, context, ids)?;
        if !kind.is_loop() && !children.is_empty() {
            return Err(ProjectError::UnexpectedChildren {
                context: context.to_string(),
                kind,
            });
        }
        block.children = children;
    }
    Ok(block)
}

fn read_param(value: &Value, context: &str) -> Result<ParamValue, ProjectError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(ParamValue::Number)
            .ok_or_else(|| invalid(context, format!("parameter {n} is out of range"))),
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        Value::Null => Ok(ParamValue::Absent),
        other => Err(invalid(
            context,
            format!("parameter values must be numbers, strings or null, got {other}"),
        )),
    }
}

fn read_id(obj: &Map<String, Value>, ids: &mut dyn IdGenerator) -> String {
    obj.get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ids.next_id())
}

fn require_number(obj: &Map<String, Value>, key: &str, context: &str) -> Result<f64, ProjectError> {
    optional_number(obj, key, context)?
        .ok_or_else(|| invalid(context, format!("missing numeric '{key}'")))
}

fn optional_number(
    obj: &Map<String, Value>,
    key: &str,
    context: &str,
) -> Result<Option<f64>, ProjectError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(context, format!("'{key}' must be a number"))),
    }
}
