//! Flat-text serialization for [`Params`] trees.
//!
//! The text form is line oriented and deterministic: one `dotted.key :
//! rendered-value` line per leaf, sorted by key. Nested nodes flatten under
//! dotted prefixes; a list whose elements are all nodes flattens under
//! `key[i].` prefixes. Reading the text back interprets each value according
//! to the type the key currently holds, so the text form carries no type
//! information unless the `types for params:` trailer is used.

use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};
use crate::hyperparams::Params;
use crate::value::{ProtoValue, Value};

const TYPES_SEPARATOR: &str = "types for params:";

impl Params {
    /// Serializes to the flat text form.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        collect_text(self, "", &mut lines);
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = String::new();
        for (key, rendered, _) in lines {
            out.push_str(&key);
            out.push_str(" : ");
            out.push_str(&rendered);
            out.push('\n');
        }
        out
    }

    /// Serializes to text and returns the per-key type tags alongside.
    ///
    /// The tags are what [`Params::from_text_with_overrides`] accepts; keys
    /// whose current value is `None` get the tag `NoneType`.
    pub fn to_text_and_types(&self) -> (String, BTreeMap<String, String>) {
        let mut lines = Vec::new();
        collect_text(self, "", &mut lines);
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = String::new();
        let mut types = BTreeMap::new();
        for (key, rendered, tag) in lines {
            out.push_str(&key);
            out.push_str(" : ");
            out.push_str(&rendered);
            out.push('\n');
            types.insert(key, tag.to_string());
        }
        (out, types)
    }

    /// Serializes text plus a type trailer into one self-describing string.
    pub fn to_text_with_types(&self) -> String {
        let (text, types) = self.to_text_and_types();
        let mut out = text;
        out.push_str(TYPES_SEPARATOR);
        out.push('\n');
        for (key, tag) in &types {
            out.push_str(key);
            out.push_str(" : ");
            out.push_str(tag);
            out.push('\n');
        }
        out
    }

    /// Parses flat text produced by [`Params::to_text`], interpreting each
    /// value according to the type its key currently holds.
    ///
    /// Keys whose current value is `None` cannot be interpreted and fail
    /// with [`ConfigError::AmbiguousType`]; use
    /// [`Params::from_text_with_overrides`] to supply their types.
    pub fn from_text(&mut self, text: &str) -> Result<()> {
        self.from_text_with_overrides(text, &BTreeMap::new())
    }

    /// Like [`Params::from_text`], with explicit type tags taking precedence
    /// over each key's current type.
    pub fn from_text_with_overrides(
        &mut self,
        text: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<()> {
        let mut lines = text.lines();
        while let Some(raw) = lines.next() {
            let line = raw.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, rest) = line.split_once(':').ok_or_else(|| ConfigError::Parse {
                message: format!("line has no key-value separator: {}", line.trim_end()),
            })?;
            let key = key.trim();
            let rest = rest.trim_start();
            // A quoted string may span lines; embedded newlines are stored
            // literally, so keep pulling raw lines until the quote closes.
            // Trailing whitespace is significant inside the quoted span, so
            // only unquoted values get their tail trimmed.
            let value_text = match leading_quote(rest) {
                Some(quote) => {
                    let mut value = rest.to_string();
                    while !quote_terminated(&value, quote) {
                        let next = lines.next().ok_or_else(|| ConfigError::Parse {
                            message: format!("unterminated string for {key}"),
                        })?;
                        value.push('\n');
                        value.push_str(next);
                    }
                    value
                }
                None => rest.trim_end().to_string(),
            };
            self.set_from_text(key, &value_text, overrides.get(key).map(String::as_str))?;
        }
        Ok(())
    }

    /// Parses the combined text-plus-trailer form from
    /// [`Params::to_text_with_types`].
    pub fn from_text_with_types(&mut self, text: &str) -> Result<()> {
        let (body, trailer) =
            text.split_once(TYPES_SEPARATOR)
                .ok_or_else(|| ConfigError::Parse {
                    message: format!("missing '{TYPES_SEPARATOR}' trailer"),
                })?;
        let mut overrides = BTreeMap::new();
        for raw in trailer.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (key, tag) = line.split_once(':').ok_or_else(|| ConfigError::Parse {
                message: format!("malformed type line: {line}"),
            })?;
            overrides.insert(key.trim().to_string(), tag.trim().to_string());
        }
        self.from_text_with_overrides(body, &overrides)
    }

    /// Renders the differences between two trees, or the empty string when
    /// they are equal.
    ///
    /// Differing leaves produce a `> key: ours` / `< key: theirs` pair;
    /// a key present on only one side produces a single line; nested nodes
    /// that differ produce a `? key:` header followed by the sub-diff,
    /// indented two extra spaces per level.
    pub fn text_diff(&self, other: &Params) -> String {
        let mut out = String::new();
        diff_nodes(self, other, 0, &mut out);
        out
    }

    fn set_from_text(&mut self, key: &str, text: &str, type_tag: Option<&str>) -> Result<()> {
        let tag = match type_tag {
            Some(tag) => tag.to_string(),
            None => value_type_tag(self.get(key)?).to_string(),
        };
        let value = parse_typed_value(key, text, &tag)?;
        self.set(key, value)
    }
}

fn collect_text(params: &Params, prefix: &str, out: &mut Vec<(String, String, &'static str)>) {
    for (name, value) in params.iter_params() {
        let key = format!("{prefix}{name}");
        match value {
            Value::Params(sub) => collect_text(sub, &format!("{key}."), out),
            Value::List(items)
                if !items.is_empty()
                    && items.iter().all(|v| matches!(v, Value::Params(_))) =>
            {
                for (i, item) in items.iter().enumerate() {
                    if let Value::Params(sub) = item {
                        collect_text(sub, &format!("{key}[{i}]."), out);
                    }
                }
            }
            _ => out.push((key, render_inline(value), value_type_tag(value))),
        }
    }
}

/// Renders a value on a single line (except for strings, whose embedded
/// newlines stay literal).
pub(crate) fn render_inline(value: &Value) -> String {
    match value {
        Value::None => "NoneType".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => render_float(*v),
        Value::String(v) => quote_string(v),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(render_inline).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Dict(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|(k, v)| format!("'{}': {}", k, render_inline(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Value::Params(p) => {
            let rendered: Vec<String> = p
                .iter_params()
                .map(|(k, v)| format!("'{}': {}", k, render_inline(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Value::TypeRef { module, name } => format!("type/{module}/{name}"),
        Value::Proto(p) => format!(
            "proto/{}/{}/{}: {}",
            p.module,
            p.message,
            p.field,
            render_proto_payload(&p.value)
        ),
        Value::Opaque(v) => format!("{v:?}"),
    }
}

/// Renders for the `Display` brace form: like [`render_inline`] but with
/// plain double-quoted strings.
pub(crate) fn render_debug(value: &Value) -> String {
    match value {
        Value::String(v) => format!("{v:?}"),
        Value::Params(p) => format!("{p}"),
        _ => render_inline(value),
    }
}

fn render_proto_payload(value: &Value) -> String {
    // Proto payload strings always use double quotes, matching the textual
    // proto convention rather than the quote-choice rule.
    match value {
        Value::String(v) => {
            let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
        other => render_inline(other),
    }
}

fn render_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Picks the quote character and escapes a string value.
///
/// Double quotes are used only when the value contains a single quote and no
/// double quote; the backslash and the chosen quote are escaped, everything
/// else (newlines included) passes through verbatim.
fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        if c == '\\' || c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

pub(crate) fn value_type_tag(value: &Value) -> &'static str {
    match value {
        Value::None => "NoneType",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::String(_) => "str",
        Value::List(_) => "list",
        Value::Dict(_) => "dict",
        Value::Params(_) => "params",
        Value::TypeRef { .. } => "type",
        Value::Proto(_) => "proto",
        Value::Opaque(_) => "opaque",
    }
}

fn leading_quote(s: &str) -> Option<char> {
    match s.chars().next() {
        Some(c @ ('\'' | '"')) => Some(c),
        _ => None,
    }
}

/// True when a string literal starting at the front of `s` closes within it.
fn quote_terminated(s: &str, quote: char) -> bool {
    let mut chars = s.chars().skip(1);
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            return true;
        }
    }
    false
}

fn parse_typed_value(key: &str, text: &str, tag: &str) -> Result<Value> {
    match tag {
        "NoneType" => {
            if text == "NoneType" {
                Ok(Value::None)
            } else {
                Err(ConfigError::AmbiguousType {
                    key: key.to_string(),
                })
            }
        }
        "bool" => match text {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            _ => Err(ConfigError::Parse {
                message: format!("invalid bool for {key}: {text}"),
            }),
        },
        "int" => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ConfigError::Parse {
                message: format!("invalid int for {key}: {text}"),
            }),
        "float" => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ConfigError::Parse {
                message: format!("invalid float for {key}: {text}"),
            }),
        "str" => {
            if leading_quote(text).is_some() {
                let mut parser = LiteralParser::new(text);
                let value = parser.parse_value()?;
                parser.expect_end()?;
                Ok(value)
            } else {
                // Unquoted text is taken verbatim; this is what lets a str
                // key absorb any rendered value when no types are supplied.
                Ok(Value::String(text.to_string()))
            }
        }
        "list" | "dict" => {
            let mut parser = LiteralParser::new(text);
            let value = parser.parse_value()?;
            parser.expect_end()?;
            match (tag, &value) {
                ("list", Value::List(_)) | ("dict", Value::Dict(_)) => Ok(value),
                _ => Err(ConfigError::Parse {
                    message: format!("expected a {tag} literal for {key}: {text}"),
                }),
            }
        }
        "type" => {
            let mut parts = text.splitn(3, '/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("type"), Some(module), Some(name)) if !name.is_empty() => {
                    Ok(Value::type_ref(module, name))
                }
                _ => Err(ConfigError::Parse {
                    message: format!("invalid type reference for {key}: {text}"),
                }),
            }
        }
        "proto" => parse_proto_value(key, text),
        other => Err(ConfigError::Parse {
            message: format!("cannot parse a value of type {other} for {key}"),
        }),
    }
}

fn parse_proto_value(key: &str, text: &str) -> Result<Value> {
    let err = || ConfigError::Parse {
        message: format!("invalid proto value for {key}: {text}"),
    };
    let rest = text.strip_prefix("proto/").ok_or_else(err)?;
    let (module, rest) = rest.split_once('/').ok_or_else(err)?;
    let (message, rest) = rest.split_once('/').ok_or_else(err)?;
    let (field, payload) = rest.split_once(':').ok_or_else(err)?;
    let mut parser = LiteralParser::new(payload.trim());
    let value = parser.parse_value()?;
    parser.expect_end()?;
    Ok(Value::Proto(ProtoValue {
        module: module.to_string(),
        message: message.to_string(),
        field: field.to_string(),
        value: Box::new(value),
    }))
}

/// Diff lines show values the way a log line would: strings unquoted,
/// everything else inline.
fn render_plain(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => render_inline(other),
    }
}

fn diff_nodes(ours: &Params, theirs: &Params, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let mut keys: Vec<&str> = ours.iter_params().map(|(k, _)| k).collect();
    for (k, _) in theirs.iter_params() {
        if !keys.contains(&k) {
            keys.push(k);
        }
    }
    keys.sort_unstable();
    for key in keys {
        let a = ours.get(key).ok();
        let b = theirs.get(key).ok();
        match (a, b) {
            (Some(a), Some(b)) if a == b => {}
            (Some(Value::Params(a)), Some(Value::Params(b))) => {
                out.push_str(&format!("? {indent}{key}:\n"));
                diff_nodes(a, b, depth + 1, out);
            }
            (Some(a), Some(b)) => {
                out.push_str(&format!("> {indent}{key}: {}\n", render_plain(a)));
                out.push_str(&format!("< {indent}{key}: {}\n", render_plain(b)));
            }
            (Some(a), None) => {
                out.push_str(&format!("> {indent}{key}: {}\n", render_plain(a)));
            }
            (None, Some(b)) => {
                out.push_str(&format!("< {indent}{key}: {}\n", render_plain(b)));
            }
            (None, None) => {}
        }
    }
}

/// Recursive-descent parser for inline value literals: numbers, quoted
/// strings, bools, `NoneType`, lists, and dicts.
struct LiteralParser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self) -> ConfigError {
        ConfigError::Parse {
            message: format!("invalid literal: {}", self.text),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_ws();
        if self.pos == self.chars.len() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            Some('[') => self.parse_list(),
            Some('{') => self.parse_dict(),
            Some('\'') | Some('"') => self.parse_string().map(Value::String),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            Some(_) => self.parse_word(),
            None => Err(self.error()),
        }
    }

    fn parse_list(&mut self) -> Result<Value> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.eat(']') {
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            if self.eat(']') {
                return Ok(Value::List(items));
            }
            self.expect(',')?;
        }
    }

    fn parse_dict(&mut self) -> Result<Value> {
        self.expect('{')?;
        let mut items = BTreeMap::new();
        self.skip_ws();
        if self.eat('}') {
            return Ok(Value::Dict(items));
        }
        loop {
            self.skip_ws();
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(':')?;
            let value = self.parse_value()?;
            items.insert(key, value);
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Dict(items));
            }
            self.expect(',')?;
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self.bump().ok_or_else(|| self.error())?;
        if quote != '\'' && quote != '"' {
            return Err(self.error());
        }
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error()),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error()),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' | 'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                }
                '-' | '+' if is_float => self.pos += 1,
                _ => break,
            }
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.error())
        } else {
            token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.error())
        }
    }

    fn parse_word(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "None" | "NoneType" => Ok(Value::None),
            _ => Err(self.error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> Params {
        let mut p = Params::new();
        p.define("bar", 2.71, "").unwrap();
        p.define("baz", "hello", "").unwrap();
        p
    }

    fn outer() -> Params {
        let mut p = Params::new();
        p.define("foo", 1_i64, "").unwrap();
        p.define("inner", inner(), "").unwrap();
        p.define("tau", false, "").unwrap();
        p.define("seqlen", vec![Value::Int(10), inner().into(), Value::Int(30)], "")
            .unwrap();
        p.define("list_of_params", vec![Value::from(inner())], "")
            .unwrap();
        p.define("cls", Value::type_ref("layers", "FeedForward"), "")
            .unwrap();
        p.define(
            "plain_dict",
            BTreeMap::from([("a".to_string(), Value::Int(10))]),
            "",
        )
        .unwrap();
        p.define(
            "payload",
            ProtoValue::new("runtime", "StepSpec", "int_val", 42_i64),
            "",
        )
        .unwrap();
        p.define("optional_bool", Value::None, "").unwrap();
        p
    }

    #[test]
    fn test_to_text_flattens_and_sorts() {
        let text = outer().to_text();
        let expected = "\
cls : type/layers/FeedForward
foo : 1
inner.bar : 2.71
inner.baz : 'hello'
list_of_params[0].bar : 2.71
list_of_params[0].baz : 'hello'
optional_bool : NoneType
payload : proto/runtime/StepSpec/int_val: 42
plain_dict : {'a': 10}
seqlen : [10, {'bar': 2.71, 'baz': 'hello'}, 30]
tau : false
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_from_text_round_trip_with_overrides() {
        // No node-valued elements inside mixed lists here: those render as
        // inline dicts and deliberately rebuild as dicts.
        let mut template = Params::new();
        template.define("foo", 7_i64, "").unwrap();
        template.define("inner", inner(), "").unwrap();
        template.define("tau", true, "").unwrap();
        template.define("cls", Value::type_ref("layers", "FeedForward"), "").unwrap();
        template.define("optional_bool", Value::None, "").unwrap();
        template
            .define("stages", vec![Value::from(inner()), Value::from(inner())], "")
            .unwrap();
        let mut rebuilt = template.copy();
        rebuilt.set("inner.baz", "scratch").unwrap();
        rebuilt.set("foo", 0_i64).unwrap();
        rebuilt.set("stages[1].bar", 0.0).unwrap();
        let (text, types) = template.to_text_and_types();
        rebuilt.from_text_with_overrides(&text, &types).unwrap();
        assert_eq!(rebuilt, template);
    }

    #[test]
    fn test_from_text_respects_current_types() {
        let mut p = outer();
        p.from_text(
            "
            inner.baz : 'world'
            # foo : 123
            tau : true
            list_of_params[0].bar : 2.72
            seqlen : [1, 2.0, '3', [4]]
            plain_dict : {'x': 0.3}
            cls : type/layers/Residual
            payload : proto/runtime/StepSpec/string_val: \"a/b\"
            ",
        )
        .unwrap();
        assert_eq!(p.get_str("inner.baz").unwrap(), "world");
        assert_eq!(p.get_i64("foo").unwrap(), 1);
        assert!(p.get_bool("tau").unwrap());
        assert_eq!(p.get_f64("list_of_params[0].bar").unwrap(), 2.72);
        assert_eq!(
            p.get("seqlen").unwrap(),
            &Value::List(vec![
                Value::Int(1),
                Value::Float(2.0),
                Value::String("3".to_string()),
                Value::List(vec![Value::Int(4)]),
            ])
        );
        assert_eq!(
            p.get("cls").unwrap(),
            &Value::type_ref("layers", "Residual")
        );
        assert_eq!(
            p.get("payload").unwrap(),
            &Value::Proto(ProtoValue::new(
                "runtime", "StepSpec", "string_val", "a/b"
            ))
        );
    }

    #[test]
    fn test_none_target_requires_override() {
        let mut p = Params::new();
        p.define("scale", Value::None, "").unwrap();
        let err = p.from_text("scale : 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousType { .. }));
        let overrides = BTreeMap::from([("scale".to_string(), "float".to_string())]);
        p.from_text_with_overrides("scale : 1.0", &overrides).unwrap();
        assert_eq!(p.get_f64("scale").unwrap(), 1.0);
    }

    #[test]
    fn test_type_erasure_without_overrides() {
        let mut p = Params::new();
        p.define("scale", "1", "").unwrap();
        let mut q = p.copy();
        // A str key absorbs an unquoted number verbatim.
        q.from_text("scale : 2.1").unwrap();
        assert_eq!(q.get_str("scale").unwrap(), "2.1");
        let overrides = BTreeMap::from([("scale".to_string(), "float".to_string())]);
        let mut r = p.copy();
        r.from_text_with_overrides("scale : 2.1", &overrides).unwrap();
        assert_eq!(r.get_f64("scale").unwrap(), 2.1);
    }

    #[test]
    fn test_string_escaping() {
        let mut p = Params::new();
        p.define("bs_end_quote", "Single\\", "").unwrap();
        p.define("embedded_newlines", "Split\nAcross\nLines", "").unwrap();
        p.define("empty", "", "").unwrap();
        p.define("empty_first_line", "\nNext", "").unwrap();
        p.define("end_escape_quote", "\"\"Split'\nLine", "").unwrap();
        p.define("escaping_single", "In \"quotes\"", "").unwrap();
        p.define("escaping_double", "In \\'quotes'", "").unwrap();

        let text = p.to_text();
        let expected = "\
bs_end_quote : 'Single\\\\'
embedded_newlines : 'Split
Across
Lines'
empty : ''
empty_first_line : '
Next'
end_escape_quote : '\"\"Split\\'
Line'
escaping_double : \"In \\\\'quotes'\"
escaping_single : 'In \"quotes\"'
";
        assert_eq!(text, expected);

        let mut q = p.copy();
        for key in [
            "bs_end_quote",
            "embedded_newlines",
            "empty_first_line",
            "end_escape_quote",
            "escaping_single",
            "escaping_double",
        ] {
            q.set(key, "").unwrap();
        }
        q.from_text(&text).unwrap();
        assert_eq!(q, p);
    }

    #[test]
    fn test_deterministic_serialize() {
        let mut pnest = Params::new();
        pnest.define("x", "X", "").unwrap();
        let mut p = Params::new();
        p.define("a", 42_i64, "").unwrap();
        p.define("b", Value::None, "").unwrap();
        p.define("c", "C", "").unwrap();
        p.define("d", Value::None, "").unwrap();
        p.define("e", pnest.copy(), "").unwrap();
        p.define("f", vec![Value::from(pnest)], "").unwrap();
        let pclean = p.copy();

        p.set("a", 43_i64).unwrap();
        p.set("d", vec![1_i64, 2, 3]).unwrap();
        p.set("e.x", 7_i64).unwrap();
        p.set("f[0].x", 2_i64).unwrap();
        let base = p.to_text_with_types();
        for _ in 0..10 {
            assert_eq!(p.to_text_with_types(), base);
            assert_eq!(p.copy().to_text_with_types(), base);
            let mut rebuilt = pclean.copy();
            rebuilt.from_text_with_types(&base).unwrap();
            assert_eq!(rebuilt, p);
        }
    }

    #[test]
    fn test_text_diff() {
        let mut d_inner = Params::new();
        d_inner.define("hey", "hi", "").unwrap();
        let mut a = Params::new();
        a.define("a", 42_i64, "").unwrap();
        a.define("c", "C", "").unwrap();
        a.define("d", d_inner, "").unwrap();
        let mut b = a.copy();

        assert_eq!(a.text_diff(&b), "");

        a.set("a", 43_i64).unwrap();
        assert_eq!(a.text_diff(&b), "> a: 43\n< a: 42\n");

        b.set("d.hey", "hello").unwrap();
        assert_eq!(
            a.text_diff(&b),
            "> a: 43\n\
             < a: 42\n\
             ? d:\n\
             >   hey: hi\n\
             <   hey: hello\n"
        );
    }

    #[test]
    fn test_diff_reports_one_sided_keys() {
        let mut a = Params::new();
        a.define("only_a", 1_i64, "").unwrap();
        let mut b = Params::new();
        b.define("only_b", 2_i64, "").unwrap();
        assert_eq!(a.text_diff(&b), "> only_a: 1\n< only_b: 2\n");
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(render_float(2.0), "2.0");
        assert_eq!(render_float(2.71), "2.71");
        assert_eq!(render_float(-1.0), "-1.0");
    }

    #[test]
    fn test_multiline_string_from_text() {
        let mut p = Params::new();
        p.define("msg", "", "").unwrap();
        p.from_text("msg : 'first\nsecond'").unwrap();
        assert_eq!(p.get_str("msg").unwrap(), "first\nsecond");
    }

    #[test]
    fn test_trailing_space_inside_string_round_trips() {
        // Whitespace before an embedded newline is part of the value.
        let mut p = Params::new();
        p.define("msg", "abc \nd", "").unwrap();
        p.define("padded", "  spaced  ", "").unwrap();

        let text = p.to_text();
        let mut q = p.copy();
        q.set("msg", "").unwrap();
        q.set("padded", "").unwrap();
        q.from_text(&text).unwrap();

        assert_eq!(q.get_str("msg").unwrap(), "abc \nd");
        assert_eq!(q.get_str("padded").unwrap(), "  spaced  ");
        assert_eq!(q, p);
    }
}
