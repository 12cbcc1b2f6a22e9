use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod infer;

pub use infer::{TokenType, infer_type};

/// Key carrying a token's value.
pub const VALUE_KEY: &str = "$value";
/// Key carrying a token's type.
pub const TYPE_KEY: &str = "$type";
/// Key carrying a token's human-readable description.
pub const DESCRIPTION_KEY: &str = "$description";
/// Key carrying vendor extensions.
pub const EXTENSIONS_KEY: &str = "$extensions";
/// Pre-DTCG spelling of [`VALUE_KEY`].
pub const LEGACY_VALUE_KEY: &str = "value";
/// Pre-DTCG spelling of [`TYPE_KEY`].
pub const LEGACY_TYPE_KEY: &str = "type";
/// Pre-DTCG spelling of [`DESCRIPTION_KEY`].
pub const LEGACY_DESCRIPTION_KEY: &str = "description";
/// Reserved top-level key holding the set order inside a canonical document.
pub const METADATA_KEY: &str = "$metadata";
/// Reserved top-level key holding theme definitions inside a canonical document.
pub const THEMES_KEY: &str = "$themes";

/// A node of a token tree: either a group of named children or a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenNode {
    Group(TokenGroup),
    Leaf(TokenLeaf),
}

impl TokenNode {
    /// Classifies a JSON value. Objects carrying `$value` (or legacy `value`)
    /// become leaves, other objects become groups, and anything else is a bare
    /// literal leaf.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) if is_leaf_object(map) => TokenNode::Leaf(TokenLeaf::from_map(map)),
            Value::Object(map) => TokenNode::Group(TokenGroup::from_map(map)),
            other => TokenNode::Leaf(TokenLeaf::bare(other.clone())),
        }
    }

    /// Serialises the node back into JSON, preserving the shape it was read in.
    pub fn to_value(&self) -> Value {
        match self {
            TokenNode::Group(group) => group.to_value(),
            TokenNode::Leaf(leaf) => leaf.to_value(),
        }
    }

    pub fn as_leaf(&self) -> Option<&TokenLeaf> {
        match self {
            TokenNode::Leaf(leaf) => Some(leaf),
            TokenNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&TokenGroup> {
        match self {
            TokenNode::Group(group) => Some(group),
            TokenNode::Leaf(_) => None,
        }
    }

    /// Number of leaves at or below this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            TokenNode::Group(group) => group.leaf_count(),
            TokenNode::Leaf(_) => 1,
        }
    }
}

/// Returns `true` when a JSON object is a token rather than a group.
pub fn is_leaf_object(map: &Map<String, Value>) -> bool {
    map.contains_key(VALUE_KEY) || map.contains_key(LEGACY_VALUE_KEY)
}

/// Ordered mapping from child name to node. Group-level `$`-prefixed
/// properties (`$type`, `$description`, ...) are kept apart from the children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenGroup {
    pub attributes: Map<String, Value>,
    entries: Vec<(String, TokenNode)>,
}

/// A token document is the root group of a canonical document or set file.
pub type TokenDocument = TokenGroup;

impl TokenGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut group = TokenGroup::new();
        for (key, value) in map {
            if key.starts_with('$') {
                group.attributes.insert(key.clone(), value.clone());
            } else {
                group.entries.push((key.clone(), TokenNode::from_value(value)));
            }
        }
        group
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.attributes.clone();
        for (name, node) in &self.entries {
            map.insert(name.clone(), node.to_value());
        }
        Value::Object(map)
    }

    pub fn get(&self, name: &str) -> Option<&TokenNode> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TokenNode> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    /// Inserts a child, replacing an existing child of the same name in place
    /// so that the original ordering is kept.
    pub fn insert(&mut self, name: impl Into<String>, node: TokenNode) -> Option<TokenNode> {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => Some(std::mem::replace(existing, node)),
            None => {
                self.entries.push((name, node));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<TokenNode> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TokenNode)> {
        self.entries.iter().map(|(key, node)| (key, node))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.attributes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.entries.iter().map(|(_, node)| node.leaf_count()).sum()
    }

    /// Follows `segments` from this group and returns the node found there.
    pub fn find<S: AsRef<str>>(&self, segments: &[S]) -> Option<&TokenNode> {
        let (first, rest) = segments.split_first()?;
        let node = self.get(first.as_ref())?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            TokenNode::Group(group) => group.find(rest),
            TokenNode::Leaf(_) => None,
        }
    }

    /// Follows `segments` and returns the token found there, if any.
    pub fn find_leaf<S: AsRef<str>>(&self, segments: &[S]) -> Option<&TokenLeaf> {
        self.find(segments).and_then(TokenNode::as_leaf)
    }

    /// Every leaf below this group together with its dotted path, in document order.
    pub fn leaves(&self) -> Vec<(String, &TokenLeaf)> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a TokenLeaf)>) {
        for (name, node) in &self.entries {
            let path = join_path(prefix, name);
            match node {
                TokenNode::Leaf(leaf) => out.push((path, leaf)),
                TokenNode::Group(group) => group.collect_leaves(&path, out),
            }
        }
    }

    /// Returns a copy where every leaf has been normalised to the `$type`/`$value` shape.
    pub fn normalized(&self) -> TokenGroup {
        TokenGroup {
            attributes: self.attributes.clone(),
            entries: self
                .entries
                .iter()
                .map(|(name, node)| {
                    let node = match node {
                        TokenNode::Group(group) => TokenNode::Group(group.normalized()),
                        TokenNode::Leaf(leaf) => TokenNode::Leaf(leaf.normalized()),
                    };
                    (name.clone(), node)
                })
                .collect(),
        }
    }
}

/// Joins a dotted prefix and a segment.
pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// The spelling a leaf was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafShape {
    /// `{ "$type": ..., "$value": ... }`
    Dtcg,
    /// `{ "type": ..., "value": ... }`
    Legacy,
    /// A literal without any wrapping object.
    Bare,
}

/// A design token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLeaf {
    pub token_type: Option<String>,
    pub value: Value,
    pub description: Option<String>,
    pub extensions: Option<Value>,
    /// Remaining properties (`$figmaStyleReferences`, tool-specific keys, ...).
    pub extra: Map<String, Value>,
    pub shape: LeafShape,
}

impl TokenLeaf {
    pub fn new(token_type: impl Into<String>, value: Value) -> Self {
        Self {
            token_type: Some(token_type.into()),
            value,
            description: None,
            extensions: None,
            extra: Map::new(),
            shape: LeafShape::Dtcg,
        }
    }

    fn bare(value: Value) -> Self {
        Self {
            token_type: None,
            value,
            description: None,
            extensions: None,
            extra: Map::new(),
            shape: LeafShape::Bare,
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let shape = if map.contains_key(VALUE_KEY) {
            LeafShape::Dtcg
        } else {
            LeafShape::Legacy
        };

        let mut leaf = TokenLeaf {
            token_type: None,
            value: Value::Null,
            description: None,
            extensions: None,
            extra: Map::new(),
            shape,
        };

        for (key, value) in map {
            match key.as_str() {
                VALUE_KEY => leaf.value = value.clone(),
                LEGACY_VALUE_KEY if shape == LeafShape::Legacy => leaf.value = value.clone(),
                TYPE_KEY => leaf.token_type = value.as_str().map(str::to_string),
                LEGACY_TYPE_KEY if shape == LeafShape::Legacy && value.is_string() => {
                    leaf.token_type = value.as_str().map(str::to_string);
                }
                DESCRIPTION_KEY => leaf.description = value.as_str().map(str::to_string),
                LEGACY_DESCRIPTION_KEY if shape == LeafShape::Legacy && value.is_string() => {
                    leaf.description = value.as_str().map(str::to_string);
                }
                EXTENSIONS_KEY => leaf.extensions = Some(value.clone()),
                _ => {
                    leaf.extra.insert(key.clone(), value.clone());
                }
            }
        }

        leaf
    }

    pub fn to_value(&self) -> Value {
        let (type_key, value_key, description_key) = match self.shape {
            LeafShape::Bare => return self.value.clone(),
            LeafShape::Dtcg => (TYPE_KEY, VALUE_KEY, DESCRIPTION_KEY),
            LeafShape::Legacy => (LEGACY_TYPE_KEY, LEGACY_VALUE_KEY, LEGACY_DESCRIPTION_KEY),
        };

        let mut map = Map::new();
        if let Some(token_type) = &self.token_type {
            map.insert(type_key.to_string(), Value::String(token_type.clone()));
        }
        map.insert(value_key.to_string(), self.value.clone());
        if let Some(description) = &self.description {
            map.insert(description_key.to_string(), Value::String(description.clone()));
        }
        if let Some(extensions) = &self.extensions {
            map.insert(EXTENSIONS_KEY.to_string(), extensions.clone());
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Converts the leaf to the `$type`/`$value` shape, inferring a type when
    /// none was declared.
    pub fn normalized(&self) -> TokenLeaf {
        let mut leaf = self.clone();
        if leaf.token_type.is_none() {
            leaf.token_type = Some(infer_type(&leaf.value).as_str().to_string());
        }
        leaf.shape = LeafShape::Dtcg;
        leaf
    }

    /// Returns the string value when the token holds one.
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Contents of `$metadata.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub token_set_order: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new(token_set_order: Vec<String>) -> Self {
        Self {
            token_set_order,
            extra: Map::new(),
        }
    }

    /// Metadata carries information when it lists at least one set.
    pub fn is_informative(&self) -> bool {
        !self.token_set_order.is_empty() || !self.extra.is_empty()
    }
}

/// Activation state of a token set inside a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSetStatus {
    Enabled,
    Disabled,
    Source,
}

impl TokenSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSetStatus::Enabled => "enabled",
            TokenSetStatus::Disabled => "disabled",
            TokenSetStatus::Source => "source",
        }
    }
}

/// One entry of `$themes.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDefinition {
    pub id: String,
    pub name: String,
    pub selected_token_sets: BTreeMap<String, TokenSetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figma_style_references: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figma_variable_references: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThemeDefinition {
    /// Builds the theme synthesised when a document carries no theme data:
    /// `core` acts as the source set and every other set is enabled.
    pub fn default_for_sets<S: AsRef<str>>(sets: &[S]) -> Self {
        let selected_token_sets = sets
            .iter()
            .map(|set| {
                let status = if set.as_ref() == "core" {
                    TokenSetStatus::Source
                } else {
                    TokenSetStatus::Enabled
                };
                (set.as_ref().to_string(), status)
            })
            .collect();

        Self {
            id: "default".to_string(),
            name: "Default".to_string(),
            selected_token_sets,
            figma_style_references: None,
            figma_variable_references: None,
            extra: Map::new(),
        }
    }
}

/// A canonical document split into its token content and reserved sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalDocument {
    pub tokens: TokenDocument,
    /// Raw `$metadata` value, kept verbatim.
    pub metadata: Option<Value>,
    /// Raw `$themes` value, kept verbatim.
    pub themes: Option<Value>,
}

impl CanonicalDocument {
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let mut tokens_map = map.clone();
        let metadata = tokens_map.remove(METADATA_KEY);
        let themes = tokens_map.remove(THEMES_KEY);
        Some(Self {
            tokens: TokenGroup::from_map(&tokens_map),
            metadata,
            themes,
        })
    }

    /// Parsed `$metadata`, when present and well-formed.
    pub fn parsed_metadata(&self) -> Option<Metadata> {
        self.metadata
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// The document is in native modular shape when it carries both reserved
    /// sections and every set named in the order is a top-level key.
    pub fn is_modular(&self) -> bool {
        if self.themes.is_none() {
            return false;
        }
        match self.parsed_metadata() {
            Some(metadata) => metadata
                .token_set_order
                .iter()
                .all(|set| self.tokens.get(set).is_some()),
            None => false,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = match self.tokens.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(themes) = &self.themes {
            map.insert(THEMES_KEY.to_string(), themes.clone());
        }
        if let Some(metadata) = &self.metadata {
            map.insert(METADATA_KEY.to_string(), metadata.clone());
        }
        Value::Object(map)
    }
}

/// A token set loaded from a modular directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub name: String,
    /// File name relative to the modular directory.
    pub file: String,
    pub document: TokenDocument,
}

/// The sets loaded for one operation, in `tokenSetOrder` sequence.
#[derive(Debug, Clone, Default)]
pub struct TokenSets {
    sets: Vec<TokenSet>,
}

impl TokenSets {
    pub fn new(sets: Vec<TokenSet>) -> Self {
        Self { sets }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenSet> {
        self.sets.iter()
    }

    pub fn get(&self, name: &str) -> Option<&TokenSet> {
        self.sets.iter().find(|set| set.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sets.iter().map(|set| set.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
