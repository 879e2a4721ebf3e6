// Field discovery for arbitrary JSON payloads
//
// Walks a parsed document depth-first and reports every addressable location
// (leaves and intermediate containers) as a FieldDescriptor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const TRUNCATION_MARK: char = '…';

/// JSON kind of a discovered field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl FieldType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => FieldType::String,
            Value::Number(_) => FieldType::Number,
            Value::Bool(_) => FieldType::Boolean,
            Value::Object(_) => FieldType::Object,
            Value::Array(_) => FieldType::Array,
            Value::Null => FieldType::Null,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, FieldType::Object | FieldType::Array)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Null => "null",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered addressable location within a JSON payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Dot/bracket path, e.g. `data.rates[0].symbol`
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Representative sample, shortened for long strings and large containers
    pub value: Value,
}

impl FieldDescriptor {
    pub fn is_leaf(&self) -> bool {
        !self.field_type.is_container()
    }
}

/// Bounds applied while walking a document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Containers at this depth are reported but not descended
    pub max_depth: usize,
    /// The walk stops after this many descriptors
    pub max_fields: usize,
    /// Strings longer than this are cut in samples
    pub max_sample_chars: usize,
    /// Arrays and objects keep this many entries in samples
    pub max_sample_items: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_fields: 500,
            max_sample_chars: 120,
            max_sample_items: 5,
        }
    }
}

/// Collect every field of `value` using default options
pub fn extract_fields(value: &Value) -> Vec<FieldDescriptor> {
    FieldExtractor::new(value).iter().collect()
}

/// Collect every field of `value` within the given bounds
pub fn extract_fields_with(value: &Value, options: &ExtractOptions) -> Vec<FieldDescriptor> {
    FieldExtractor::with_options(value, options.clone())
        .iter()
        .collect()
}

/// Restartable field walker over a borrowed document.
///
/// Each call to [`FieldExtractor::iter`] starts a fresh depth-first walk;
/// the returned iterator is lazy and can be cloned to fork a walk midway.
#[derive(Clone, Debug)]
pub struct FieldExtractor<'a> {
    root: &'a Value,
    options: ExtractOptions,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self::with_options(root, ExtractOptions::default())
    }

    pub fn with_options(root: &'a Value, options: ExtractOptions) -> Self {
        Self { root, options }
    }

    pub fn iter(&self) -> Fields<'a> {
        Fields {
            stack: vec![Frame {
                path: String::new(),
                value: self.root,
                depth: 0,
                // A container root has no path of its own worth selecting
                report: !FieldType::of(self.root).is_container(),
            }],
            options: self.options.clone(),
            emitted: 0,
        }
    }
}

impl<'a> IntoIterator for &FieldExtractor<'a> {
    type Item = FieldDescriptor;
    type IntoIter = Fields<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Debug)]
struct Frame<'a> {
    path: String,
    value: &'a Value,
    depth: usize,
    report: bool,
}

/// Lazy depth-first sequence of field descriptors
#[derive(Clone, Debug)]
pub struct Fields<'a> {
    stack: Vec<Frame<'a>>,
    options: ExtractOptions,
    emitted: usize,
}

impl<'a> Fields<'a> {
    fn push_children(&mut self, frame: &Frame<'a>) {
        let depth = frame.depth + 1;
        match frame.value {
            Value::Object(map) => {
                // Reverse so the first key is popped first
                for (key, child) in map.iter().rev() {
                    self.stack.push(Frame {
                        path: join_key(&frame.path, key),
                        value: child,
                        depth,
                        report: true,
                    });
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate().rev() {
                    self.stack.push(Frame {
                        path: join_index(&frame.path, index),
                        value: child,
                        depth,
                        report: true,
                    });
                }
            }
            _ => {}
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = FieldDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            if self.emitted >= self.options.max_fields {
                self.stack.clear();
                return None;
            }

            let field_type = FieldType::of(frame.value);
            if field_type.is_container() && frame.depth < self.options.max_depth {
                self.push_children(&frame);
            }

            if frame.report {
                self.emitted += 1;
                return Some(FieldDescriptor {
                    value: sample(frame.value, &self.options, 0),
                    path: frame.path,
                    field_type,
                });
            }
        }
        None
    }
}

/// Shorten a value for display in a field catalog
fn sample(value: &Value, options: &ExtractOptions, level: usize) -> Value {
    match value {
        Value::String(s) => {
            if s.chars().count() > options.max_sample_chars {
                let mut cut: String = s.chars().take(options.max_sample_chars).collect();
                cut.push(TRUNCATION_MARK);
                Value::String(cut)
            } else {
                value.clone()
            }
        }
        Value::Array(items) if level > 0 => {
            Value::String(format!("[array; {} items]", items.len()))
        }
        Value::Object(map) if level > 0 => Value::String(format!("{{object; {} keys}}", map.len())),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(options.max_sample_items)
                .map(|item| sample(item, options, level + 1))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map.iter().take(options.max_sample_items) {
                out.insert(key.clone(), sample(child, options, level + 1));
            }
            Value::Object(out)
        }
        _ => value.clone(),
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '[', ']', '"', '\\'])
}

fn join_key(parent: &str, key: &str) -> String {
    if is_plain_key(key) {
        if parent.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", parent, key)
        }
    } else {
        let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{}[\"{}\"]", parent, escaped)
    }
}

fn join_index(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

/// One step of a field path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split a field path into segments. Returns `None` for malformed paths.
pub fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '[' => {
                chars.next();
                if chars.peek() == Some(&'"') {
                    chars.next();
                    let mut key = String::new();
                    loop {
                        match chars.next()? {
                            '\\' => key.push(chars.next()?),
                            '"' => break,
                            other => key.push(other),
                        }
                    }
                    if chars.next()? != ']' {
                        return None;
                    }
                    segments.push(PathSegment::Key(key));
                } else {
                    let mut digits = String::new();
                    loop {
                        match chars.next()? {
                            ']' => break,
                            d if d.is_ascii_digit() => digits.push(d),
                            _ => return None,
                        }
                    }
                    segments.push(PathSegment::Index(digits.parse().ok()?));
                }
            }
            '.' => {
                chars.next();
                let key = take_bare_key(&mut chars);
                if key.is_empty() {
                    return None;
                }
                segments.push(PathSegment::Key(key));
            }
            _ => {
                // A bare key without a leading dot is only valid at the start
                if !segments.is_empty() {
                    return None;
                }
                segments.push(PathSegment::Key(take_bare_key(&mut chars)));
            }
        }
    }

    Some(segments)
}

fn take_bare_key(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut key = String::new();
    while let Some(&c) = chars.peek() {
        if c == '.' || c == '[' {
            break;
        }
        key.push(c);
        chars.next();
    }
    key
}

/// Navigate `root` by a field path produced by the extractor
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    parse_path(path)?
        .iter()
        .try_fold(root, |current, segment| match segment {
            PathSegment::Key(key) => current.as_object()?.get(key),
            PathSegment::Index(index) => current.as_array()?.get(*index),
        })
}
