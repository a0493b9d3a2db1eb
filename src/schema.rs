//! Declarative reply schemas.
//!
//! A [`UseCaseSchema`] lists the keys a flow's JSON reply must carry, their
//! primitive types and value constraints. The same description renders the
//! key list inlined into the system prompt and validates the parsed reply,
//! so the prompt contract and the validator cannot drift apart.
//!
//! Validation outcomes come in three strengths:
//!
//! - **violation**: missing required key, wrong primitive type, value out of
//!   range or outside an enumerated set. Fatal.
//! - **pruned**: a violation inside a field marked advisory. The field is
//!   removed from the value and a warning is recorded.
//! - **warning**: item-count or integer-ness deviations the model does not
//!   reliably obey. Recorded, never fatal.

use serde_json::{Map, Value};

use crate::prompt::UseCase;

/// Expected shape of one value.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    String,
    Number {
        min: Option<f64>,
        max: Option<f64>,
        integer: bool,
    },
    /// A string restricted to the listed tokens.
    OneOf(&'static [&'static str]),
    Object(&'static [Field]),
    Array {
        items: &'static Kind,
        /// Item count the prompt asks for; deviations only warn.
        expected: Option<(usize, usize)>,
    },
}

impl Kind {
    pub const fn number() -> Kind {
        Kind::Number {
            min: None,
            max: None,
            integer: false,
        }
    }

    pub const fn range(min: f64, max: f64) -> Kind {
        Kind::Number {
            min: Some(min),
            max: Some(max),
            integer: false,
        }
    }

    pub const fn non_negative() -> Kind {
        Kind::Number {
            min: Some(0.0),
            max: None,
            integer: false,
        }
    }

    pub const fn integer_range(min: f64, max: f64) -> Kind {
        Kind::Number {
            min: Some(min),
            max: Some(max),
            integer: true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Kind::String | Kind::OneOf(_) => "string",
            Kind::Number { integer: true, .. } => "integer",
            Kind::Number { .. } => "number",
            Kind::Object(_) => "object",
            Kind::Array { .. } => "array",
        }
    }
}

/// One key of an object schema.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub key: &'static str,
    pub kind: Kind,
    pub required: bool,
    /// Violations inside this field remove it instead of failing the reply.
    pub advisory: bool,
    /// Free-form hint appended to the prompt description.
    pub note: Option<&'static str>,
}

impl Field {
    pub const fn required(key: &'static str, kind: Kind) -> Field {
        Field {
            key,
            kind,
            required: true,
            advisory: false,
            note: None,
        }
    }

    pub const fn optional(key: &'static str, kind: Kind) -> Field {
        Field {
            key,
            kind,
            required: false,
            advisory: false,
            note: None,
        }
    }

    pub const fn advisory(mut self) -> Field {
        self.advisory = true;
        self
    }

    pub const fn note(mut self, note: &'static str) -> Field {
        self.note = Some(note);
        self
    }
}

/// The reply contract of one use case.
#[derive(Debug, Clone, Copy)]
pub struct UseCaseSchema {
    pub use_case: UseCase,
    pub fields: &'static [Field],
}

/// A fatal schema failure at `path` (e.g. `ratings.safety`, `factors[1].impact`).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

/// A non-fatal deviation recorded during validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaWarning {
    pub path: String,
    pub message: String,
}

impl UseCaseSchema {
    /// Validate `value` in place.
    ///
    /// Advisory fields that fail are removed from `value`. Returns the
    /// recorded warnings, or the first fatal violation.
    pub fn validate(&self, value: &mut Value) -> Result<Vec<SchemaWarning>, Violation> {
        let mut warnings = Vec::new();
        match value {
            Value::Object(map) => validate_object(self.fields, map, "", &mut warnings)?,
            other => {
                return Err(Violation {
                    path: "$".into(),
                    reason: format!("expected an object, found {}", json_type(other)),
                })
            }
        }
        Ok(warnings)
    }

    /// Bulleted key list for the system prompt.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        describe_fields(self.fields, 0, &mut lines);
        lines.join("\n")
    }

    /// Example reply skeleton for the system prompt.
    pub fn skeleton(&self) -> String {
        let entries: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("  \"{}\": {}", f.key, skeleton_kind(&f.kind)))
            .collect();
        format!("{{\n{}\n}}", entries.join(",\n"))
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn validate_object(
    fields: &[Field],
    map: &mut Map<String, Value>,
    parent: &str,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<(), Violation> {
    for field in fields {
        let path = join_path(parent, field.key);
        let present = map.get(field.key).is_some_and(|v| !v.is_null());

        if !present {
            if field.required {
                return Err(Violation {
                    path,
                    reason: "missing required key".into(),
                });
            }
            // An explicit null on an optional key reads as absent.
            map.remove(field.key);
            continue;
        }

        let outcome = match map.get_mut(field.key) {
            Some(v) => validate_value(&field.kind, v, &path, warnings),
            None => Ok(()),
        };

        if let Err(violation) = outcome {
            if field.advisory {
                tracing::warn!(path = %violation.path, reason = %violation.reason, "dropping advisory field");
                warnings.push(SchemaWarning {
                    path: path.clone(),
                    message: format!("dropped: {}", violation.reason),
                });
                map.remove(field.key);
            } else {
                return Err(violation);
            }
        }
    }
    Ok(())
}

fn validate_value(
    kind: &Kind,
    value: &mut Value,
    path: &str,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<(), Violation> {
    let mismatch = |value: &Value| Violation {
        path: path.to_string(),
        reason: format!(
            "expected {}, found {}",
            kind.type_name(),
            json_type(value)
        ),
    };

    match kind {
        Kind::String => {
            if !value.is_string() {
                return Err(mismatch(value));
            }
        }
        Kind::OneOf(allowed) => {
            let s = value.as_str().ok_or_else(|| mismatch(value))?;
            if !allowed.contains(&s) {
                return Err(Violation {
                    path: path.to_string(),
                    reason: format!("'{}' is not one of {:?}", s, allowed),
                });
            }
        }
        Kind::Number { min, max, integer } => {
            let n = value.as_f64().ok_or_else(|| mismatch(value))?;
            if let Some(min) = min {
                if n < *min {
                    return Err(Violation {
                        path: path.to_string(),
                        reason: format!("{} is below the minimum {}", n, min),
                    });
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(Violation {
                        path: path.to_string(),
                        reason: format!("{} is above the maximum {}", n, max),
                    });
                }
            }
            if *integer && n.fract() != 0.0 {
                warnings.push(SchemaWarning {
                    path: path.to_string(),
                    message: format!("expected an integer, got {}", n),
                });
            }
        }
        Kind::Object(fields) => match value {
            Value::Object(map) => validate_object(fields, map, path, warnings)?,
            other => return Err(mismatch(other)),
        },
        Kind::Array { items, expected } => {
            let arr = match value {
                Value::Array(arr) => arr,
                other => return Err(mismatch(other)),
            };
            if let Some((lo, hi)) = expected {
                if arr.len() < *lo || arr.len() > *hi {
                    warnings.push(SchemaWarning {
                        path: path.to_string(),
                        message: format!("expected {}-{} items, got {}", lo, hi, arr.len()),
                    });
                }
            }
            for (i, item) in arr.iter_mut().enumerate() {
                validate_value(items, item, &format!("{}[{}]", path, i), warnings)?;
            }
        }
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn key_list(fields: &[Field]) -> String {
    fields.iter().map(|f| f.key).collect::<Vec<_>>().join(", ")
}

fn describe_kind(kind: &Kind) -> String {
    match kind {
        Kind::String => "string".into(),
        Kind::OneOf(allowed) => {
            let quoted: Vec<String> = allowed.iter().map(|a| format!("\"{}\"", a)).collect();
            format!("one of {}", quoted.join(", "))
        }
        Kind::Number { min, max, .. } => {
            let base = kind.type_name();
            match (min, max) {
                (Some(lo), Some(hi)) => format!("{}, {}-{}", base, lo, hi),
                (Some(lo), None) => format!("{}, >= {}", base, lo),
                (None, Some(hi)) => format!("{}, <= {}", base, hi),
                (None, None) => base.to_string(),
            }
        }
        Kind::Object(fields) => format!("object with keys: {}", key_list(fields)),
        Kind::Array { items, expected } => {
            let inner = match items {
                Kind::Object(fields) => format!("objects with keys: {}", key_list(fields)),
                Kind::String => "strings".into(),
                other => describe_kind(other),
            };
            match expected {
                Some((lo, hi)) => format!("array of {}, {}-{} items", inner, lo, hi),
                None => format!("array of {}", inner),
            }
        }
    }
}

fn describe_fields(fields: &[Field], depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for field in fields {
        let mut desc = describe_kind(&field.kind);
        if !field.required {
            desc = format!("optional {}", desc);
        }
        if let Some(note) = field.note {
            desc = format!("{}; {}", desc, note);
        }
        lines.push(format!("{}- {} ({})", indent, field.key, desc));

        match &field.kind {
            Kind::Object(children) => describe_fields(children, depth + 1, lines),
            Kind::Array {
                items: Kind::Object(children),
                ..
            } => describe_fields(children, depth + 1, lines),
            _ => {}
        }
    }
}

fn skeleton_kind(kind: &Kind) -> String {
    match kind {
        Kind::String => "\"string\"".into(),
        Kind::Number { .. } => "number".into(),
        Kind::OneOf(allowed) => format!("\"{}\"", allowed.join("|")),
        Kind::Object(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|f| format!("\"{}\": {}", f.key, skeleton_kind(&f.kind)))
                .collect();
            format!("{{ {} }}", inner.join(", "))
        }
        Kind::Array { items, .. } => format!("[{}]", skeleton_kind(items)),
    }
}
