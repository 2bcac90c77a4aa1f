//! Pipeline context - the shared key/value store steps read and mutate

use crate::core::error::{PipelineError, PipelineResult};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Caller identity used when a failure originates in template resolution
/// rather than in a named step.
const FORMAT_CALLER: &str = "formatting";

/// Matches `{{`, `}}`, or a `{key}` placeholder token.
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([^{}]+)\}").expect("placeholder pattern is valid")
    })
}

/// The mutable data store shared by every step of one pipeline run.
///
/// Keys are strings; values are the YAML value union (string, number, bool,
/// null, sequence, mapping). Insertion order is preserved. Reads accept
/// dot-paths (`a.b.0.c`) descending nested mappings by key and sequences by
/// index. The context also carries ambient run metadata: the working
/// directory used to resolve nested pipeline definitions, and the name of
/// the pipeline currently running against it.
#[derive(Debug, Clone)]
pub struct Context {
    store: Mapping,
    working_dir: PathBuf,
    current_pipeline: String,
}

impl Context {
    /// Create an empty context rooted in the current directory.
    pub fn new() -> Self {
        Self::with_working_dir(".")
    }

    /// Create an empty context rooted in `working_dir`.
    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Mapping::new(),
            working_dir: working_dir.into(),
            current_pipeline: String::new(),
        }
    }

    /// Directory nested pipeline definitions are resolved against.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn set_working_dir(&mut self, working_dir: impl Into<PathBuf>) {
        self.working_dir = working_dir.into();
    }

    /// Name of the pipeline currently running against this context.
    pub fn current_pipeline(&self) -> &str {
        &self.current_pipeline
    }

    /// Swap in the name of the pipeline taking over this context, returning
    /// the previous one so the caller can restore it when its run resumes.
    pub fn set_current_pipeline(&mut self, name: impl Into<String>) -> String {
        std::mem::replace(&mut self.current_pipeline, name.into())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Direct, unformatted read. `key` may be a dot-path; a top-level key
    /// containing literal dots wins over path descent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.store.get(&key_value(key)) {
            return Some(value);
        }
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.store.get(&key_value(first))?;
        for segment in segments {
            current = match current {
                Value::Mapping(map) => map.get(&key_value(segment))?,
                Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a top-level key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.store.insert(Value::String(key.into()), value.into());
    }

    /// Remove a top-level key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.store.remove(&key_value(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate entries in insertion order. Only string keys are yielded;
    /// the engine never writes any other kind.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.store
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|k| (k, value)))
    }

    /// Fail with [`PipelineError::KeyNotInContext`] unless `key` resolves.
    ///
    /// `caller` identifies the requesting step so the message can name it.
    /// A read of the same key immediately after a successful assert cannot
    /// fail, provided the context was not modified in between.
    pub fn assert_key_exists(&self, key: &str, caller: &str) -> PipelineResult<()> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(PipelineError::KeyNotInContext {
                key: key.to_string(),
                caller: caller.to_string(),
            })
        }
    }

    /// Like [`Context::assert_key_exists`], but additionally fails with
    /// [`PipelineError::KeyInContextHasNoValue`] when the value is null or
    /// an empty string.
    pub fn assert_key_has_value(&self, key: &str, caller: &str) -> PipelineResult<()> {
        self.assert_key_exists(key, caller)?;
        match self.get(key) {
            Some(Value::Null) => Err(PipelineError::KeyInContextHasNoValue {
                key: key.to_string(),
                caller: caller.to_string(),
            }),
            Some(Value::String(s)) if s.is_empty() => Err(PipelineError::KeyInContextHasNoValue {
                key: key.to_string(),
                caller: caller.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolve `key` and return its value with all templating applied.
    ///
    /// Strings have `{other.key}` placeholders substituted with the
    /// referenced key's own formatted value; sequences and mappings format
    /// element-wise; other scalars come back unchanged.
    pub fn get_formatted(&self, key: &str) -> PipelineResult<Value> {
        let value = self.get(key).ok_or_else(|| PipelineError::KeyNotInContext {
            key: key.to_string(),
            caller: FORMAT_CALLER.to_string(),
        })?;
        let mut resolving = vec![key.to_string()];
        self.format_value_inner(value, &mut resolving)
    }

    /// Apply templating to an arbitrary value that is not itself stored in
    /// the context, such as a decorator expression from a step definition.
    pub fn format_value(&self, value: &Value) -> PipelineResult<Value> {
        self.format_value_inner(value, &mut Vec::new())
    }

    /// Apply templating to a standalone string.
    ///
    /// A string that is exactly one placeholder yields the referenced value
    /// itself, type preserved; otherwise referenced values are rendered into
    /// the surrounding text. `{{` and `}}` escape literal braces. A string
    /// with no placeholders comes back unchanged.
    pub fn format_string(&self, text: &str) -> PipelineResult<Value> {
        self.format_string_inner(text, &mut Vec::new())
    }

    /// Format `value`, then reduce it to a boolean with [`value_as_bool`].
    pub fn format_as_bool(&self, value: &Value) -> PipelineResult<bool> {
        Ok(value_as_bool(&self.format_value(value)?))
    }

    fn format_value_inner(&self, value: &Value, resolving: &mut Vec<String>) -> PipelineResult<Value> {
        match value {
            Value::String(text) => self.format_string_inner(text, resolving),
            Value::Sequence(items) => {
                let mut formatted = Vec::with_capacity(items.len());
                for item in items {
                    formatted.push(self.format_value_inner(item, resolving)?);
                }
                Ok(Value::Sequence(formatted))
            }
            Value::Mapping(map) => {
                let mut formatted = Mapping::new();
                for (key, item) in map {
                    formatted.insert(key.clone(), self.format_value_inner(item, resolving)?);
                }
                Ok(Value::Mapping(formatted))
            }
            other => Ok(other.clone()),
        }
    }

    fn format_string_inner(&self, text: &str, resolving: &mut Vec<String>) -> PipelineResult<Value> {
        let pattern = placeholder_pattern();

        // A string that is exactly one placeholder keeps the referenced
        // value's type, so conditions can reference stored booleans.
        if let Some(captures) = pattern.captures(text) {
            if let (Some(whole), Some(token)) = (captures.get(0), captures.get(1)) {
                if whole.start() == 0 && whole.end() == text.len() {
                    return self.resolve_placeholder(token.as_str(), resolving);
                }
            }
        }

        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        for captures in pattern.captures_iter(text) {
            let Some(matched) = captures.get(0) else {
                continue;
            };
            result.push_str(&text[last..matched.start()]);
            match (matched.as_str(), captures.get(1)) {
                ("{{", _) => result.push('{'),
                ("}}", _) => result.push('}'),
                (_, Some(token)) => {
                    let resolved = self.resolve_placeholder(token.as_str(), resolving)?;
                    result.push_str(&display_value(&resolved));
                }
                (other, None) => result.push_str(other),
            }
            last = matched.end();
        }
        result.push_str(&text[last..]);
        Ok(Value::String(result))
    }

    fn resolve_placeholder(&self, token: &str, resolving: &mut Vec<String>) -> PipelineResult<Value> {
        if resolving.iter().any(|key| key == token) {
            return Err(PipelineError::CircularFormat {
                key: token.to_string(),
            });
        }
        let value = self.get(token).ok_or_else(|| PipelineError::KeyNotInContext {
            key: token.to_string(),
            caller: FORMAT_CALLER.to_string(),
        })?;
        if value.is_null() {
            return Err(PipelineError::KeyInContextHasNoValue {
                key: token.to_string(),
                caller: FORMAT_CALLER.to_string(),
            });
        }
        resolving.push(token.to_string());
        let formatted = self.format_value_inner(value, resolving)?;
        resolving.pop();
        Ok(formatted)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn key_value(key: &str) -> Value {
    Value::String(key.to_string())
}

/// Render a value for interpolation into text or log output.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Truthiness rules for run and while condition expressions.
///
/// Booleans are themselves; null is false; numbers are true when non-zero;
/// strings are true for `true`, `1`, and `1.0` (case-insensitive);
/// sequences and mappings are true when non-empty.
pub fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => {
            let lowered = s.to_lowercase();
            lowered == "true" || lowered == "1" || lowered == "1.0"
        }
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> Context {
        let mut ctx = Context::new();
        ctx.set("name", "world");
        ctx.set("greeting", "hello {name}");
        ctx.set("count", 3);
        ctx.set("enabled", true);
        ctx
    }

    #[test]
    fn test_set_and_get() {
        let ctx = sample_context();
        assert_eq!(ctx.get("name"), Some(&Value::String("world".to_string())));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_get_dot_path() {
        let mut ctx = Context::new();
        let nested: Value = serde_yaml::from_str(
            r#"
            server:
              hosts:
                - name: alpha
                - name: beta
            "#,
        )
        .unwrap();
        if let Value::Mapping(map) = nested {
            for (key, value) in map {
                if let Value::String(key) = key {
                    ctx.set(key, value);
                }
            }
        }
        assert_eq!(
            ctx.get("server.hosts.1.name"),
            Some(&Value::String("beta".to_string()))
        );
        assert_eq!(ctx.get("server.hosts.5"), None);
        assert_eq!(ctx.get("server.missing"), None);
    }

    #[test]
    fn test_dotted_top_level_key_wins_over_path() {
        let mut ctx = Context::new();
        ctx.set("a.b", "flat");
        assert_eq!(ctx.get("a.b"), Some(&Value::String("flat".to_string())));
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut ctx = sample_context();
        assert_eq!(ctx.len(), 4);
        let keys: Vec<&str> = ctx.entries().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["name", "greeting", "count", "enabled"]);

        assert_eq!(ctx.remove("greeting"), Some(Value::String("hello {name}".to_string())));
        assert_eq!(ctx.remove("greeting"), None);
        assert_eq!(ctx.len(), 3);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_assert_key_exists() {
        let ctx = sample_context();
        assert!(ctx.assert_key_exists("name", "echo").is_ok());

        let err = ctx.assert_key_exists("nope", "echo").unwrap_err();
        assert_eq!(
            err.to_string(),
            "context['nope'] doesn't exist. It must exist for echo."
        );
    }

    #[test]
    fn test_assert_then_read_never_fails() {
        let ctx = sample_context();
        for key in ["name", "greeting", "count", "enabled"] {
            ctx.assert_key_exists(key, "test").unwrap();
            assert!(ctx.get(key).is_some());
        }
    }

    #[test]
    fn test_assert_key_has_value() {
        let mut ctx = Context::new();
        ctx.set("empty", "");
        ctx.set("null", Value::Null);
        ctx.set("full", "x");

        assert!(ctx.assert_key_has_value("full", "t").is_ok());
        assert!(matches!(
            ctx.assert_key_has_value("empty", "t").unwrap_err(),
            PipelineError::KeyInContextHasNoValue { .. }
        ));
        assert!(matches!(
            ctx.assert_key_has_value("null", "t").unwrap_err(),
            PipelineError::KeyInContextHasNoValue { .. }
        ));
        assert!(matches!(
            ctx.assert_key_has_value("absent", "t").unwrap_err(),
            PipelineError::KeyNotInContext { .. }
        ));
    }

    #[test]
    fn test_format_no_placeholders_is_identity() {
        let ctx = sample_context();
        assert_eq!(
            ctx.format_string("plain text, no tokens").unwrap(),
            Value::String("plain text, no tokens".to_string())
        );
    }

    #[test]
    fn test_format_substitutes_placeholder() {
        let ctx = sample_context();
        assert_eq!(
            ctx.get_formatted("greeting").unwrap(),
            Value::String("hello world".to_string())
        );
    }

    #[test]
    fn test_format_recursive_substitution() {
        let mut ctx = sample_context();
        ctx.set("salutation", "{greeting}!");
        assert_eq!(
            ctx.get_formatted("salutation").unwrap(),
            Value::String("hello world!".to_string())
        );
    }

    #[test]
    fn test_sole_placeholder_preserves_type() {
        let ctx = sample_context();
        assert_eq!(ctx.format_string("{count}").unwrap(), Value::from(3));
        assert_eq!(ctx.format_string("{enabled}").unwrap(), Value::Bool(true));
        // Embedded in text, the same values render as strings.
        assert_eq!(
            ctx.format_string("n={count}").unwrap(),
            Value::String("n=3".to_string())
        );
    }

    #[test]
    fn test_escaped_braces() {
        let ctx = sample_context();
        assert_eq!(
            ctx.format_string("{{name}} is {name}").unwrap(),
            Value::String("{name} is world".to_string())
        );
    }

    #[test]
    fn test_format_container_element_wise() {
        let mut ctx = sample_context();
        ctx.set(
            "hosts",
            Value::Sequence(vec![
                Value::String("{name}-1".to_string()),
                Value::String("{name}-2".to_string()),
            ]),
        );
        assert_eq!(
            ctx.get_formatted("hosts").unwrap(),
            Value::Sequence(vec![
                Value::String("world-1".to_string()),
                Value::String("world-2".to_string()),
            ])
        );
    }

    #[test]
    fn test_format_missing_key_fails() {
        let ctx = sample_context();
        let err = ctx.format_string("{nope}").unwrap_err();
        assert!(matches!(err, PipelineError::KeyNotInContext { .. }));
    }

    #[test]
    fn test_format_null_value_fails() {
        let mut ctx = Context::new();
        ctx.set("gone", Value::Null);
        let err = ctx.format_string("value: {gone}").unwrap_err();
        assert!(matches!(err, PipelineError::KeyInContextHasNoValue { .. }));
    }

    #[test]
    fn test_format_cycle_detected() {
        let mut ctx = Context::new();
        ctx.set("a", "{b}");
        ctx.set("b", "{a}");
        let err = ctx.get_formatted("a").unwrap_err();
        assert!(matches!(err, PipelineError::CircularFormat { .. }));
        assert_eq!(err.kind(), "CircularFormat");

        let mut direct = Context::new();
        direct.set("me", "{me}");
        assert!(matches!(
            direct.get_formatted("me").unwrap_err(),
            PipelineError::CircularFormat { .. }
        ));
    }

    #[test]
    fn test_repeated_reference_is_not_a_cycle() {
        let mut ctx = Context::new();
        ctx.set("x", "v");
        ctx.set("twice", "{x} and {x}");
        assert_eq!(
            ctx.get_formatted("twice").unwrap(),
            Value::String("v and v".to_string())
        );
    }

    #[test]
    fn test_value_as_bool() {
        assert!(value_as_bool(&Value::Bool(true)));
        assert!(!value_as_bool(&Value::Bool(false)));
        assert!(!value_as_bool(&Value::Null));
        assert!(value_as_bool(&Value::from(1)));
        assert!(!value_as_bool(&Value::from(0)));
        assert!(value_as_bool(&Value::String("True".to_string())));
        assert!(value_as_bool(&Value::String("1".to_string())));
        assert!(!value_as_bool(&Value::String("false".to_string())));
        assert!(!value_as_bool(&Value::String("anything else".to_string())));
        assert!(!value_as_bool(&Value::Sequence(vec![])));
        assert!(value_as_bool(&Value::Sequence(vec![Value::Null])));
    }

    #[test]
    fn test_format_as_bool_through_placeholder() {
        let ctx = sample_context();
        assert!(ctx
            .format_as_bool(&Value::String("{enabled}".to_string()))
            .unwrap());
        assert!(ctx
            .format_as_bool(&Value::String("{count}".to_string()))
            .unwrap());
    }

    #[test]
    fn test_current_pipeline_swap() {
        let mut ctx = Context::new();
        let previous = ctx.set_current_pipeline("parent");
        assert_eq!(previous, "");
        let previous = ctx.set_current_pipeline("child");
        assert_eq!(previous, "parent");
        assert_eq!(ctx.current_pipeline(), "child");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::String("s".to_string())), "s");
        assert_eq!(display_value(&Value::from(2.5)), "2.5");
        assert_eq!(display_value(&Value::Bool(false)), "false");
        assert_eq!(display_value(&Value::Null), "null");
        assert_eq!(
            display_value(&Value::Sequence(vec![Value::from(1), Value::from(2)])),
            "[1,2]"
        );
    }
}
