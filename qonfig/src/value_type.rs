use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::components::Ref;
use crate::element::AddOn;
use crate::shared::NCName;

/// A parsed attribute or text value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Bool(bool),
    /// Names an add-on, for values typed by an add-on bound.
    AddOn(NCName),
    /// Produced by a [`CustomValueType`]; the canonical text is kept so
    /// values stay comparable without the custom type at hand.
    Custom { type_name: NCName, text: String },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{text}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::AddOn(name) => write!(f, "{name}"),
            Value::Custom { text, .. } => write!(f, "{text}"),
        }
    }
}

/// A value type supplied by the embedding application, registered on the
/// session and referenced from `<external>` declarations.
pub trait CustomValueType: fmt::Debug + Send + Sync {
    /// The id `<external>` declarations refer to.
    fn name(&self) -> &str;

    fn parse(&self, text: &str) -> Result<Value, String>;

    fn is_instance(&self, value: &Value) -> bool;
}

/// The outcome of parsing a text fragment against a [`ValueType`].
///
/// A parse may succeed cleanly, succeed with warnings, or fail. `one-of`
/// selection keys off the distinction: the first clean parse wins, else the
/// first warnings-only parse, else the whole parse fails.
pub struct ValueParse {
    pub value: Value,
    pub warnings: Vec<String>,
}

impl ValueParse {
    fn clean(value: Value) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }
}

/// Declares the set of texts a value may take and how they parse.
#[derive(Clone, Debug)]
pub enum ValueType {
    String,
    Boolean,
    /// Exactly one permitted text.
    Literal(String),
    /// The first component that parses cleanly wins; failing that, the first
    /// that parses with only warnings.
    OneOf {
        name: NCName,
        components: Vec<ValueType>,
    },
    /// `prefix` and `suffix` wrap the text accepted by `inner`.
    Explicit {
        name: NCName,
        prefix: String,
        suffix: String,
        inner: Box<ValueType>,
    },
    Pattern {
        name: NCName,
        regex: Regex,
    },
    /// A value that names an add-on inheriting the given bound. The named
    /// add-on is resolved and checked against the bound by the document
    /// parser, which has the toolkit at hand.
    AddOnRef {
        name: NCName,
        add_on: Ref<AddOn>,
    },
    Custom(Arc<dyn CustomValueType>),
}

impl ValueType {
    /// The name this type is declared or referred to under.
    pub fn name(&self) -> &str {
        match self {
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Literal(text) => text,
            ValueType::OneOf { name, .. } => name,
            ValueType::Explicit { name, .. } => name,
            ValueType::Pattern { name, .. } => name,
            ValueType::AddOnRef { name, .. } => name,
            ValueType::Custom(custom) => custom.name(),
        }
    }

    /// Two value types are interchangeable when they have the same shape and
    /// name. Used by the override laws, where an absent type means "inherit".
    pub fn same_type(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::String, ValueType::String) => true,
            (ValueType::Boolean, ValueType::Boolean) => true,
            (ValueType::Literal(a), ValueType::Literal(b)) => a == b,
            (ValueType::AddOnRef { add_on: a, .. }, ValueType::AddOnRef { add_on: b, .. }) => {
                a == b
            }
            (a, b) => {
                matches!(
                    (a, b),
                    (ValueType::OneOf { .. }, ValueType::OneOf { .. })
                        | (ValueType::Explicit { .. }, ValueType::Explicit { .. })
                        | (ValueType::Pattern { .. }, ValueType::Pattern { .. })
                        | (ValueType::Custom(_), ValueType::Custom(_))
                ) && a.name() == b.name()
            }
        }
    }

    pub fn parse(&self, text: &str) -> Result<ValueParse, String> {
        match self {
            ValueType::String => Ok(ValueParse::clean(Value::Text(text.to_owned()))),
            ValueType::Boolean => match text {
                "true" => Ok(ValueParse::clean(Value::Bool(true))),
                "false" => Ok(ValueParse::clean(Value::Bool(false))),
                other if other.eq_ignore_ascii_case("true") => Ok(ValueParse {
                    value: Value::Bool(true),
                    warnings: vec![format!("boolean value {other:?} should be lower-case")],
                }),
                other if other.eq_ignore_ascii_case("false") => Ok(ValueParse {
                    value: Value::Bool(false),
                    warnings: vec![format!("boolean value {other:?} should be lower-case")],
                }),
                other => Err(format!("{other:?} is not a boolean")),
            },
            ValueType::Literal(literal) => {
                if text == literal {
                    Ok(ValueParse::clean(Value::Text(text.to_owned())))
                } else {
                    Err(format!("expected literal {literal:?}, found {text:?}"))
                }
            }
            ValueType::OneOf { name, components } => {
                let mut warned: Option<ValueParse> = None;
                let mut failures = Vec::new();
                for component in components {
                    match component.parse(text) {
                        Ok(parse) if parse.warnings.is_empty() => return Ok(parse),
                        Ok(parse) => {
                            if warned.is_none() {
                                warned = Some(parse);
                            }
                        }
                        Err(e) => failures.push(e),
                    }
                }
                warned.ok_or_else(|| {
                    format!(
                        "{text:?} does not match any component of {name}: {}",
                        failures.join("; ")
                    )
                })
            }
            ValueType::Explicit {
                name,
                prefix,
                suffix,
                inner,
            } => {
                if let Some(stripped) = text
                    .strip_prefix(prefix.as_str())
                    .and_then(|t| t.strip_suffix(suffix.as_str()))
                {
                    inner.parse(stripped)
                } else {
                    // The wrapped form is canonical; accept the bare inner
                    // text with a warning.
                    let mut parse = inner.parse(text).map_err(|e| {
                        format!("{text:?} does not match {name} ({prefix}...{suffix}): {e}")
                    })?;
                    parse
                        .warnings
                        .push(format!("{name} value should be written {prefix}{text}{suffix}"));
                    Ok(parse)
                }
            }
            ValueType::Pattern { name, regex } => {
                if regex.is_match(text) {
                    Ok(ValueParse::clean(Value::Text(text.to_owned())))
                } else {
                    Err(format!("{text:?} does not match pattern {name}"))
                }
            }
            ValueType::AddOnRef { .. } => {
                // Resolution against the toolkit happens in the document
                // parser; here the text only needs to be a plausible name.
                if text.is_empty() {
                    Err("add-on name must not be empty".to_owned())
                } else {
                    Ok(ValueParse::clean(Value::AddOn(text.to_owned())))
                }
            }
            ValueType::Custom(custom) => custom.parse(text).map(ValueParse::clean),
        }
    }

    /// Membership test for already-parsed values.
    pub fn is_instance(&self, value: &Value) -> bool {
        match self {
            ValueType::String => matches!(value, Value::Text(_)),
            ValueType::Boolean => matches!(value, Value::Bool(_)),
            ValueType::Literal(literal) => matches!(value, Value::Text(t) if t == literal),
            ValueType::OneOf { components, .. } => {
                components.iter().any(|c| c.is_instance(value))
            }
            ValueType::Explicit { inner, .. } => inner.is_instance(value),
            ValueType::Pattern { regex, .. } => {
                matches!(value, Value::Text(t) if regex.is_match(t))
            }
            ValueType::AddOnRef { .. } => matches!(value, Value::AddOn(_)),
            ValueType::Custom(custom) => custom.is_instance(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn boolean_parses_with_case_warning() {
        let clean = ValueType::Boolean.parse("true").unwrap();
        assert_eq!(clean.value, Value::Bool(true));
        assert!(clean.warnings.is_empty());

        let warned = ValueType::Boolean.parse("TRUE").unwrap();
        assert_eq!(warned.value, Value::Bool(true));
        assert_eq!(warned.warnings.len(), 1);

        assert!(ValueType::Boolean.parse("yes").is_err());
    }

    #[test]
    fn one_of_prefers_first_clean_parse() {
        let ty = ValueType::OneOf {
            name: "flag-or-text".into(),
            components: vec![ValueType::Boolean, ValueType::String],
        };
        // "true" parses cleanly as a boolean before string gets a chance
        assert_eq!(ty.parse("true").unwrap().value, Value::Bool(true));
        // "TRUE" parses as boolean only with a warning, so string wins
        assert_eq!(
            ty.parse("TRUE").unwrap().value,
            Value::Text("TRUE".to_owned())
        );
    }

    #[test]
    fn one_of_falls_back_to_warned_parse() {
        let ty = ValueType::OneOf {
            name: "strict".into(),
            components: vec![ValueType::Literal("a".to_owned()), ValueType::Boolean],
        };
        let parse = ty.parse("False").unwrap();
        assert_eq!(parse.value, Value::Bool(false));
        assert_eq!(parse.warnings.len(), 1);

        assert!(ty.parse("b").is_err());
    }

    #[test]
    fn explicit_strips_prefix_and_suffix() {
        let ty = ValueType::Explicit {
            name: "braced".into(),
            prefix: "{".to_owned(),
            suffix: "}".to_owned(),
            inner: Box::new(ValueType::Boolean),
        };
        let parse = ty.parse("{true}").unwrap();
        assert_eq!(parse.value, Value::Bool(true));
        assert!(parse.warnings.is_empty());

        let bare = ty.parse("true").unwrap();
        assert_eq!(bare.value, Value::Bool(true));
        assert_eq!(bare.warnings.len(), 1);
    }

    #[test]
    fn pattern_matches_by_regex() {
        let ty = ValueType::Pattern {
            name: "digits".into(),
            regex: Regex::new("^[0-9]+$").unwrap(),
        };
        assert_eq!(
            ty.parse("042").unwrap().value,
            Value::Text("042".to_owned())
        );
        assert!(ty.parse("x1").is_err());
    }
}
