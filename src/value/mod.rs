//! Conversion between engine result text and typed values, and argument formatting.

use serde::Serialize;

mod literal;

/// A value travelling between the host runner and the engine.
///
/// The engine serializes results as text; this closed set covers everything
/// it can produce: numbers, booleans, strings and nested ordered lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::json!(f),
            Value::Bool(b) => serde_json::Value::from(b),
            Value::Str(s) => serde_json::Value::from(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
        }
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Converts a scalar string into a number, boolean or string - in that order.
///
/// Used for engine result tokens and for script parameter defaults.
pub fn infer_scalar(s: &str) -> Value {
    if let Ok(i) = s.trim().parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = s.trim().parse::<f64>() {
        return Value::Float(f);
    }
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::Str(s.to_string())
}

/// Renders one argument in the engine's command syntax.
///
/// Strings get surrounding quotes unless already quoted or list-shaped, and
/// embedded newlines become the engine's `" & return & "` concatenation
/// idiom. List values render as a bracketed literal with double-quoted
/// strings - the engine rejects single quotes inside list literals.
pub fn format_argument(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Bool(b) => bool_text(*b).to_string(),
        Value::Str(s) => format_string_argument(s),
        Value::List(items) => single_quotes_to_double(&render_list(items)),
    }
}

fn bool_text(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn format_float(f: f64) -> String {
    // keep a decimal point so the value reads back as a float
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn format_string_argument(s: &str) -> String {
    let s = s
        .replace('\n', "\" & return & \"")
        .replace('\r', "\" & return & \"");
    if s.starts_with('(') && s.ends_with(')') {
        // engine list syntax, pass through untouched
        return s;
    }
    if s.starts_with('[') && s.ends_with(']') {
        return single_quotes_to_double(&s);
    }
    if s.starts_with('"') && s.ends_with('"') {
        return s;
    }
    format!("\"{s}\"")
}

fn render_list(items: &[Value]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match item {
            Value::Str(s) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            Value::List(inner) => out.push_str(&render_list(inner)),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Bool(b) => out.push_str(bool_text(*b)),
        }
    }
    out.push(']');
    out
}

/// Replaces single quotes at list value boundaries with double quotes.
pub fn single_quotes_to_double(s: &str) -> String {
    s.replace("['", "[\"")
        .replace("']", "\"]")
        .replace("',", "\",")
        .replace(",'", ",\"")
        .replace(", '", ", \"")
}

/// Decodes an engine result string into a [`Value`].
///
/// Three attempts, first success wins:
/// 1. literal parse, after normalizing two list quirks newer engine versions
///    introduced - quoted booleans (`"True"` for `True`) and an `@` marker in
///    front of strings containing special characters;
/// 2. literal parse after re-quoting every bare token found at bracket and
///    comma boundaries;
/// 3. the original string, unmodified.
///
/// The last tier means decoding never fails; the engine's serialization of
/// compound values is not a fixed grammar across versions and may itself
/// contain unescaped structural characters.
pub fn parse_result(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Str(String::new());
    }

    let mut s = raw.to_string();
    if raw.starts_with('[') && raw.ends_with(']') {
        s = unquote_bool_values(&s);
        s = strip_at_markers(&s);
    }
    if let Ok(v) = literal::parse(&s) {
        return v;
    }
    if let Ok(v) = literal::parse(&quote_inner_strings(&s)) {
        return v;
    }
    Value::Str(raw.to_string())
}

/// Turns quoted booleans inside a list back into bare ones: `"True"` -> `True`.
fn unquote_bool_values(s: &str) -> String {
    s.replace("\"True\"", "True").replace("\"False\"", "False")
}

/// Drops the `@` the engine puts in front of list strings with special
/// characters: `@"a\nb"` -> `"a\nb"`.
fn strip_at_markers(s: &str) -> String {
    s.replace("@\"", "\"")
}

/// Re-quotes bare tokens inside a bracketed list so it becomes parseable.
///
/// Walks the string and treats `[`, `]`, `,` and boundary spaces as
/// structure; everything between them is a token, quoted unless it reads as
/// a number or boolean or carries quotes already. A `]` not followed by `]`,
/// `,` or end of string is part of a token, not a list close - the engine
/// emits strings with unpaired brackets inside lists.
fn quote_inner_strings(parent: &str) -> String {
    if !parent.starts_with('[') {
        // not list-shaped - quote the whole thing as one value
        return quote_token(parent);
    }

    let chars: Vec<char> = parent.chars().collect();
    let len = chars.len();
    let mut result = String::new();
    let mut cur_start = 0usize;

    for i in 0..len {
        let c = chars[i];
        if (c == '[' || c == ' ') && i == cur_start {
            result.push(c);
            cur_start += 1;
            continue;
        }
        if c == ']' || c == ',' {
            if c == ']' && i + 1 < len && chars[i + 1] != ']' && chars[i + 1] != ',' {
                continue; // inner bracket of a token
            }
            let item: String = chars[cur_start..i].iter().collect();
            // skip empties from ']]' and '],' but keep the ones the engine
            // really returns, as in '[,' and ',]'
            if !item.is_empty() || (i > 0 && (chars[i - 1] == ',' || chars[i - 1] == '[')) {
                result.push_str(&quote_token(&item));
            }
            result.push(c);
            cur_start = i + 1;
        }
    }
    if cur_start < len {
        let item: String = chars[cur_start..len].iter().collect();
        result.push_str(&quote_token(&item));
    }
    result
}

fn quote_token(item: &str) -> String {
    // already quoted tokens keep their quotes as delimiters
    if item.len() >= 2
        && ((item.starts_with('"') && item.ends_with('"'))
            || (item.starts_with('\'') && item.ends_with('\'')))
    {
        return item.to_string();
    }
    match infer_scalar(item) {
        Value::Str(s) => quote_string_literal(&s),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(f),
        Value::Bool(b) => bool_text(b).to_string(),
        Value::List(_) => unreachable!("infer_scalar never yields a list"),
    }
}

fn quote_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
