use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Property map of an object value. Keys stay sorted.
pub type Map = BTreeMap<String, Value>;

/// Most iterations a numeric loop source produces. Larger counts are clamped.
pub const MAX_LOOP_COUNT: usize = 1 << 16;

/// Highest index a path write may create in an array. Writes beyond it are dropped.
pub const MAX_ARRAY_INDEX: usize = 1 << 16;

/// Something that can be invoked from an expression, e.g. a script-module function.
pub trait Callable: fmt::Debug + Send + Sync {
    fn call(&self, args: Vec<Value>) -> Value;
}

/// A data value as seen by templates.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
    Function(Arc<dyn Callable>),
}

/// One step of a member path: `.name` or `[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Name(String),
    Index(usize),
}

impl PathKey {
    /// Converts a computed member (`a[expr]`) into a path step.
    pub fn from_value(v: &Value) -> PathKey {
        match v {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < usize::MAX as f64 => {
                PathKey::Index(*n as usize)
            }
            other => PathKey::Name(other.to_text()),
        }
    }

    fn as_name(&self) -> String {
        match self {
            PathKey::Name(n) => n.clone(),
            PathKey::Index(i) => i.to_string(),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(i) => Some(*i),
            PathKey::Name(n) => n.parse().ok(),
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Name(n) => write!(f, ".{n}"),
            PathKey::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Splits a data path such as `styleObject.style` or `list[1].name` into steps.
///
/// Returns `None` when brackets are unbalanced or hold something other than an index.
pub fn parse_path(path: &str) -> Option<Vec<PathKey>> {
    let mut keys = Vec::new();
    let mut name = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !name.is_empty() {
                    keys.push(PathKey::Name(std::mem::take(&mut name)));
                }
            }
            '[' => {
                if !name.is_empty() {
                    keys.push(PathKey::Name(std::mem::take(&mut name)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return None,
                    }
                }
                keys.push(PathKey::Index(digits.parse().ok()?));
            }
            _ => name.push(c),
        }
    }
    if !name.is_empty() {
        keys.push(PathKey::Name(name));
    }
    if keys.is_empty() { None } else { Some(keys) }
}

impl Value {
    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Text coercion used for interpolation and attribute concatenation.
    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "[function]".to_string(),
        }
    }

    /// Numeric coercion for arithmetic and relational operators.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [one] => one.to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// `===`: same type and same value. Containers compare structurally.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// `==`: `null` and `undefined` are equal to each other, primitives coerce to numbers.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(_) | Value::Number(_) | Value::String(_), Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    /// Direct child by reference (object property or array element).
    pub fn child(&self, key: &PathKey) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(&key.as_name()),
            Value::Array(items) => key.as_index().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Properties that are computed rather than stored, e.g. `length`.
    fn derived(&self, key: &PathKey) -> Value {
        match (self, key) {
            (Value::Array(items), PathKey::Name(n)) if n == "length" => Value::Number(items.len() as f64),
            (Value::String(s), PathKey::Name(n)) if n == "length" => {
                Value::Number(s.chars().count() as f64)
            }
            (Value::String(s), k) => match k.as_index().and_then(|i| s.chars().nth(i)) {
                Some(c) => Value::String(c.to_string()),
                None => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Resolves `keys` below this value. Missing steps yield `Undefined`.
    pub fn get_path(&self, keys: &[PathKey]) -> Value {
        let mut cur = self;
        for (pos, key) in keys.iter().enumerate() {
            match cur.child(key) {
                Some(next) => cur = next,
                None => return cur.derived(key).get_path(&keys[pos + 1..]),
            }
        }
        cur.clone()
    }

    /// Writes `value` at `keys`, creating intermediate containers as needed.
    pub fn set_path(&mut self, keys: &[PathKey], value: Value) {
        let Some((first, rest)) = keys.split_first() else {
            *self = value;
            return;
        };
        if !matches!(self, Value::Object(_) | Value::Array(_)) {
            *self = match first {
                PathKey::Index(_) => Value::Array(Vec::new()),
                PathKey::Name(_) => Value::Object(Map::new()),
            };
        }
        let slot = match self {
            Value::Array(items) => match first.as_index() {
                Some(i) => {
                    if i >= items.len() && i > MAX_ARRAY_INDEX {
                        tracing::warn!(index = i, max = MAX_ARRAY_INDEX, "array index too large, write dropped");
                        return;
                    }
                    if items.len() <= i {
                        items.resize(i + 1, Value::Undefined);
                    }
                    &mut items[i]
                }
                None => return,
            },
            Value::Object(map) => map.entry(first.as_name()).or_default(),
            _ => return,
        };
        slot.set_path(rest, value);
    }

    /// Items visited by a loop over this value, paired with their index binding.
    pub fn iter_items(&self) -> Vec<(Value, Value)> {
        match self {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (v.clone(), Value::Number(i as f64)))
                .collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (Value::String(c.to_string()), Value::Number(i as f64)))
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (v.clone(), Value::String(k.clone())))
                .collect(),
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => {
                let count = if *n > MAX_LOOP_COUNT as f64 {
                    tracing::warn!(count = *n, max = MAX_LOOP_COUNT, "numeric loop source clamped");
                    MAX_LOOP_COUNT
                } else {
                    *n as usize
                };
                (0..count)
                    .map(|i| (Value::Number(i as f64), Value::Number(i as f64)))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // NaN is equal to itself here so that unchanged data never diffs.
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_script_numbers() {
        assert_eq!(Value::Number(3.0).to_text(), "3");
        assert_eq!(Value::Number(-0.0).to_text(), "0");
        assert_eq!(Value::Number(2.5).to_text(), "2.5");
        assert_eq!(Value::Number(f64::NAN).to_text(), "NaN");
        assert_eq!(Value::Undefined.to_text(), "");
    }

    #[test]
    fn path_parsing() {
        assert_eq!(
            parse_path("list[1].name"),
            Some(vec![
                PathKey::Name("list".into()),
                PathKey::Index(1),
                PathKey::Name("name".into())
            ])
        );
        assert_eq!(parse_path("a[x]"), None);
        assert_eq!(parse_path(""), None);
    }

    #[test]
    fn set_path_creates_containers() {
        let mut v = Value::object([("a", Value::from(1))]);
        v.set_path(&parse_path("b.c[2]").unwrap(), Value::from("x"));
        let got = v.get_path(&parse_path("b.c").unwrap());
        assert_eq!(
            got,
            Value::Array(vec![Value::Undefined, Value::Undefined, Value::from("x")])
        );
        assert_eq!(v.get_path(&[PathKey::Name("a".into())]), Value::from(1));
    }

    #[test]
    fn length_is_derived() {
        let v = Value::object([("list", Value::from(vec![Value::from(1), Value::from(2)]))]);
        let keys = parse_path("list.length").unwrap();
        assert_eq!(v.get_path(&keys), Value::from(2));
        assert_eq!(v.get_path(&parse_path("missing.deep.path").unwrap()), Value::Undefined);
    }

    #[test]
    fn nan_equals_itself_for_diffing() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::from("1").loose_equals(&Value::from(1)));
        assert!(!Value::from("1").strict_equals(&Value::from(1)));
        assert!(!Value::from(0).loose_equals(&Value::Null));
    }
}
