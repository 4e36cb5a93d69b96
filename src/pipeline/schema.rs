//! Declarative request shapes.
//!
//! A [`Schema`] describes which fields an object carries, their kinds, and
//! what happens to fields it does not declare. Checking a value reports one
//! violation per offending field instead of stopping at the first, and
//! returns the value normalized (query strings coerced, unknown fields
//! stripped) ready for typed deserialization.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use uuid::Uuid;

use super::validation::FieldViolation;

/// What a schema does with fields it does not declare. Chosen per schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFields {
    Reject,
    Strip,
    Passthrough,
}

#[derive(Debug, Clone)]
pub enum Kind {
    String,
    Integer,
    Number,
    Boolean,
    Uuid,
    /// `YYYY-MM-DD`
    Date,
    /// RFC 3339
    DateTime,
    Enum(&'static [&'static str]),
    Array(Box<Kind>),
    Object(Schema),
    Any,
}

impl Kind {
    pub fn array_of(kind: Kind) -> Self {
        Kind::Array(Box::new(kind))
    }

    fn describe(&self) -> String {
        match self {
            Kind::String => "string".into(),
            Kind::Integer => "integer".into(),
            Kind::Number => "number".into(),
            Kind::Boolean => "boolean".into(),
            Kind::Uuid => "uuid".into(),
            Kind::Date => "date (YYYY-MM-DD)".into(),
            Kind::DateTime => "RFC 3339 datetime".into(),
            Kind::Enum(values) => format!("one of [{}]", values.join(", ")),
            Kind::Array(inner) => format!("array of {}", inner.describe()),
            Kind::Object(_) => "object".into(),
            Kind::Any => "any".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
    pub nullable: bool,
    pub sensitive: bool,
}

impl Field {
    pub fn required(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            required: true,
            nullable: false,
            sensitive: false,
        }
    }

    pub fn optional(name: &'static str, kind: Kind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Never echo the received value back in violations.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Whether scalar values arrive as JSON or as query-string text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Body,
    Query,
}

impl Source {
    pub fn root(&self) -> &'static str {
        match self {
            Source::Body => "body",
            Source::Query => "query",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
    unknown: UnknownFields,
}

impl Default for Schema {
    fn default() -> Self {
        Self::object()
    }
}

impl Schema {
    /// An object schema that strips undeclared fields.
    pub fn object() -> Self {
        Self {
            fields: Vec::new(),
            unknown: UnknownFields::Strip,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn strict(mut self) -> Self {
        self.unknown = UnknownFields::Reject;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.unknown = UnknownFields::Passthrough;
        self
    }

    pub fn unknown_fields(&self) -> UnknownFields {
        self.unknown
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name && f.sensitive)
    }

    /// Definition errors, reported at startup rather than per call.
    pub fn definition_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.collect_definition_errors("", &mut errors);
        errors
    }

    fn collect_definition_errors(&self, prefix: &str, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for field in &self.fields {
            let path = join(prefix, field.name);
            if field.name.is_empty() {
                errors.push(format!("empty field name under '{}'", prefix));
            }
            if !seen.insert(field.name) {
                errors.push(format!("duplicate field '{}'", path));
            }
            check_kind_definition(&field.kind, &path, errors);
        }
    }

    /// Checks `value` against the schema, returning the normalized value or
    /// every violation found.
    pub fn check(&self, value: Value, source: Source) -> Result<Value, Vec<FieldViolation>> {
        let mut violations = Vec::new();
        let checked = self.check_object(value, source.root(), "", source, &mut violations);
        if violations.is_empty() {
            Ok(checked)
        } else {
            Err(violations)
        }
    }

    fn check_object(
        &self,
        value: Value,
        label: &str,
        prefix: &str,
        source: Source,
        violations: &mut Vec<FieldViolation>,
    ) -> Value {
        let mut input = match value {
            Value::Object(map) => map,
            other => {
                violations.push(
                    FieldViolation::new(label, "type", "Expected an object").with_received(other.clone()),
                );
                return other;
            }
        };

        let mut output = Map::new();
        for field in &self.fields {
            let path = join(prefix, field.name);
            match input.remove(field.name) {
                None if field.required => {
                    violations.push(FieldViolation::new(&path, "required", "Field is required"));
                }
                None => {}
                Some(Value::Null) if field.nullable => {
                    output.insert(field.name.to_string(), Value::Null);
                }
                Some(Value::Null) if !field.required => {}
                Some(Value::Null) => {
                    violations.push(FieldViolation::new(&path, "required", "Field is required"));
                }
                Some(raw) => {
                    let before = violations.len();
                    let checked = check_kind(&field.kind, raw, &path, source, violations);
                    if field.sensitive {
                        for violation in &mut violations[before..] {
                            violation.received = None;
                        }
                    }
                    output.insert(field.name.to_string(), checked);
                }
            }
        }

        match self.unknown {
            UnknownFields::Strip => {}
            UnknownFields::Passthrough => output.extend(input),
            UnknownFields::Reject => {
                let mut extra: Vec<_> = input.keys().cloned().collect();
                extra.sort();
                for key in extra {
                    violations.push(FieldViolation::new(
                        &join(prefix, &key),
                        "unknown_field",
                        "Field is not allowed",
                    ));
                }
            }
        }

        Value::Object(output)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_kind_definition(kind: &Kind, path: &str, errors: &mut Vec<String>) {
    match kind {
        Kind::Enum(values) if values.is_empty() => errors.push(format!("enum '{}' has no values", path)),
        Kind::Array(inner) => check_kind_definition(inner, path, errors),
        Kind::Object(schema) => schema.collect_definition_errors(path, errors),
        _ => {}
    }
}

fn mismatch(kind: &Kind, path: &str, received: Value, violations: &mut Vec<FieldViolation>) -> Value {
    violations.push(
        FieldViolation::new(path, "type", format!("Expected {}", kind.describe())).with_received(received.clone()),
    );
    received
}

fn check_kind(kind: &Kind, value: Value, path: &str, source: Source, violations: &mut Vec<FieldViolation>) -> Value {
    let coerce = source == Source::Query;

    match (kind, value) {
        (Kind::Any, value) => value,
        (Kind::String, Value::String(s)) => Value::String(s),

        (Kind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Value::Number(n),
        (Kind::Integer, Value::String(s)) if coerce => match s.trim().parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => mismatch(kind, path, Value::String(s), violations),
        },

        (Kind::Number, Value::Number(n)) => Value::Number(n),
        (Kind::Number, Value::String(s)) if coerce => {
            match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => mismatch(kind, path, Value::String(s), violations),
            }
        }

        (Kind::Boolean, Value::Bool(b)) => Value::Bool(b),
        (Kind::Boolean, Value::String(s)) if coerce => match s.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => mismatch(kind, path, Value::String(s), violations),
        },

        (Kind::Uuid, Value::String(s)) if Uuid::parse_str(&s).is_ok() => Value::String(s),
        (Kind::Date, Value::String(s)) if NaiveDate::parse_from_str(&s, "%Y-%m-%d").is_ok() => Value::String(s),
        (Kind::DateTime, Value::String(s)) if DateTime::parse_from_rfc3339(&s).is_ok() => Value::String(s),

        (Kind::Enum(values), Value::String(s)) => {
            if values.contains(&s.as_str()) {
                Value::String(s)
            } else {
                violations.push(
                    FieldViolation::new(path, "enum", format!("Expected {}", kind.describe()))
                        .with_received(Value::String(s.clone())),
                );
                Value::String(s)
            }
        }

        (Kind::Array(inner), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| check_kind(inner, item, &format!("{}.{}", path, i), source, violations))
                .collect(),
        ),
        // A single query parameter for an array field arrives as a scalar
        (Kind::Array(inner), Value::String(s)) if coerce => {
            Value::Array(vec![check_kind(inner, Value::String(s), &format!("{}.0", path), source, violations)])
        }

        (Kind::Object(schema), value) => schema.check_object(value, path, path, source, violations),

        (kind, value) => mismatch(kind, path, value, violations),
    }
}
