use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use super::schema::{Schema, Source};

/// One field that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    /// Dotted path, e.g. `items.0.amount`.
    pub field: String,
    pub constraint: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            message: message.into(),
            received: None,
        }
    }

    pub fn with_received(mut self, received: Value) -> Self {
        self.received = Some(received);
        self
    }
}

pub type ValidationResult<T> = Result<T, Vec<FieldViolation>>;

/// A typed request body or query.
///
/// The schema governs shape (presence, kinds, unknown fields); the
/// `validator` derive governs values (lengths, ranges, formats).
pub trait Input: DeserializeOwned + Validate + Send + 'static {
    /// `None` means the route takes no input of this kind.
    fn schema() -> Option<Schema>;
}

/// Input for routes that take no body or no query.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Empty {}

impl Validate for Empty {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

impl Input for Empty {
    fn schema() -> Option<Schema> {
        None
    }
}

/// Parses a raw JSON body. An empty body is treated as `{}` so that
/// required fields are reported individually.
pub fn parse_body<B: Input>(schema: Option<&Schema>, bytes: &[u8]) -> ValidationResult<B> {
    let Some(schema) = schema else {
        return finish(Value::Object(Map::new()), None, Source::Body);
    };

    let raw = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(bytes)
            .map_err(|e| vec![FieldViolation::new("body", "json", format!("Malformed JSON: {}", e))])?
    };

    let checked = schema.check(raw, Source::Body)?;
    finish(checked, Some(schema), Source::Body)
}

/// Parses a query string. Repeated keys collect into an array.
pub fn parse_query<Q: Input>(schema: Option<&Schema>, raw: Option<&str>) -> ValidationResult<Q> {
    let Some(schema) = schema else {
        return finish(Value::Object(Map::new()), None, Source::Query);
    };

    let mut params = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }

    let checked = schema.check(Value::Object(params), Source::Query)?;
    finish(checked, Some(schema), Source::Query)
}

fn finish<T: Input>(value: Value, schema: Option<&Schema>, source: Source) -> ValidationResult<T> {
    let typed: T = serde_path_to_error::deserialize(&value)
        .map_err(|e| vec![type_violation(&e, &value, schema, source)])?;

    typed
        .validate()
        .map_err(|errors| violations_from(&errors, schema, source))?;

    Ok(typed)
}

/// A value the schema accepted but the typed field rejected, reported on
/// that field rather than the whole input.
fn type_violation(
    error: &serde_path_to_error::Error<serde_json::Error>,
    value: &Value,
    schema: Option<&Schema>,
    source: Source,
) -> FieldViolation {
    let segments: Vec<String> = error
        .path()
        .iter()
        .map(|segment| match segment {
            serde_path_to_error::Segment::Seq { index } => index.to_string(),
            other => other.to_string(),
        })
        .collect();

    if segments.is_empty() {
        return FieldViolation::new(source.root(), "type", error.inner().to_string());
    }

    let field = segments.join(".");
    let mut violation = FieldViolation::new(field.clone(), "type", error.inner().to_string());
    if !schema.map(|s| s.is_sensitive(&field)).unwrap_or(false) {
        let pointer = format!("/{}", segments.join("/"));
        violation.received = value.pointer(&pointer).cloned();
    }
    violation
}

/// Flattens `validator` errors into violations, ordered by field name.
/// Struct-level errors are reported against the input root.
pub fn violations_from(errors: &ValidationErrors, schema: Option<&Schema>, source: Source) -> Vec<FieldViolation> {
    let mut field_errors: Vec<_> = errors
        .field_errors()
        .into_iter()
        .map(|(field, list)| {
            if field == "__all__" {
                (source.root().to_string(), list)
            } else {
                (field.to_string(), list)
            }
        })
        .collect();
    field_errors.sort_by(|a, b| a.0.cmp(&b.0));

    let mut violations = Vec::new();
    for (field, list) in field_errors {
        let sensitive = schema.map(|s| s.is_sensitive(&field)).unwrap_or(false);
        for error in list.iter() {
            let code = error.code.to_string();
            let message = match &error.message {
                Some(message) => message.to_string(),
                None => describe(&code, &error.params),
            };
            let mut violation = FieldViolation::new(field.clone(), code, message);
            if !sensitive {
                violation.received = error.params.get("value").cloned();
            }
            violations.push(violation);
        }
    }
    violations
}

fn describe<K: AsRef<str> + std::hash::Hash + Eq>(
    code: &str,
    params: &std::collections::HashMap<K, Value>,
) -> String {
    let param = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.to_string())
    };

    match code {
        "email" => "Must be a valid email address".to_string(),
        "url" => "Must be a valid URL".to_string(),
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("Length must be between {} and {}", min, max),
            (Some(min), None) => format!("Length must be at least {}", min),
            (None, Some(max)) => format!("Length must be at most {}", max),
            (None, None) => "Invalid length".to_string(),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("Must be between {} and {}", min, max),
            (Some(min), None) => format!("Must be at least {}", min),
            (None, Some(max)) => format!("Must be at most {}", max),
            (None, None) => "Out of range".to_string(),
        },
        other => format!("Failed '{}' constraint", other),
    }
}
