//! Declarative DTO rule tables.
//!
//! Every DTO carries a static table of [`Field`]s. A table is evaluated
//! against the raw JSON value *before* typed deserialization, so that type
//! failures and range failures of every field are reported together.
//! The same table is evaluated again on outgoing responses.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::{ValidateEmail, ValidationError, ValidationErrors};

use crate::error::{Result, ServerError};

static NUMBER_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$")
        .expect("number string pattern must compile")
});

/// Whether a field may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// A single predicate attached to a field.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    IsString,
    IsInt,
    IsBool,
    IsArray,
    IsEmail,
    IsNumberString,
    Min(i64),
    Max(i64),
    Positive,
    /// Characters of a string or items of an array.
    Length { min: usize, max: usize },
    /// Field is an object validated by its own table.
    Nested(&'static [Field]),
}

impl Rule {
    /// Type rules run first. When one fails, the others are skipped.
    const fn is_type(&self) -> bool {
        matches!(
            self,
            Self::IsString
                | Self::IsInt
                | Self::IsBool
                | Self::IsArray
                | Self::IsEmail
                | Self::IsNumberString
                | Self::Nested(_)
        )
    }
}

/// Field of a rule table.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub presence: Presence,
    pub rules: &'static [Rule],
}

impl Field {
    pub const fn required(name: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            name,
            presence: Presence::Required,
            rules,
        }
    }

    pub const fn optional(name: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            name,
            presence: Presence::Optional,
            rules,
        }
    }
}

/// Where raw data comes from.
///
/// Query strings only carry strings, so integer and boolean rules accept
/// their textual form there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Json,
    Query,
}

/// Typed shape exchanged at the HTTP boundary.
pub trait Dto: Serialize {
    /// Rule table of the DTO, keyed by serialized field name.
    const FIELDS: &'static [Field];

    /// Run the rule table on an outgoing value.
    fn inspect(&self) -> std::result::Result<(), ValidationErrors> {
        let value = serde_json::to_value(self).map_err(|err| {
            single("body", "serialize", format!("Cannot serialize: {err}."))
        })?;
        check_value(Self::FIELDS, &value, Source::Json)
    }
}

/// Lists inspect every element and report the first failing one.
impl<T: Dto> Dto for Vec<T> {
    const FIELDS: &'static [Field] = &[];

    fn inspect(&self) -> std::result::Result<(), ValidationErrors> {
        self.iter().try_for_each(|item| item.inspect())
    }
}

/// Validate raw data against `T`'s table, then build `T`.
///
/// Unknown keys are stripped before deserialization.
pub fn parse<T>(value: Value, source: Source) -> Result<T>
where
    T: Dto + DeserializeOwned,
{
    check_value(T::FIELDS, &value, source)?;

    let Value::Object(mut object) = value else {
        // `check_value` already rejects anything else.
        return Err(single("body", "object", "Body must be an object.".into()).into());
    };
    object.retain(|key, _| T::FIELDS.iter().any(|field| field.name == key));
    if source == Source::Query {
        coerce(T::FIELDS, &mut object);
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|err| ServerError::ParsingForm(Box::new(err)))
}

/// Evaluate a table against a raw value, aggregating every violation.
pub fn check_value(
    fields: &'static [Field],
    value: &Value,
    source: Source,
) -> std::result::Result<(), ValidationErrors> {
    let Value::Object(object) = value else {
        return Err(single("body", "object", "Body must be an object.".into()));
    };

    let mut errors = ValidationErrors::new();
    for field in fields {
        for error in check_field(field, object.get(field.name), source) {
            errors.add(field.name, error);
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_field(
    field: &Field,
    value: Option<&Value>,
    source: Source,
) -> Vec<ValidationError> {
    let value = match value {
        None | Some(Value::Null) => {
            return match field.presence {
                Presence::Optional => Vec::new(),
                Presence::Required => vec![error(
                    "required",
                    format!("`{}` is required.", field.name),
                )],
            };
        },
        Some(value) => value,
    };

    let type_errors: Vec<_> = field
        .rules
        .iter()
        .filter(|rule| rule.is_type())
        .filter_map(|rule| check_type(field.name, rule, value, source))
        .collect();
    if !type_errors.is_empty() {
        return type_errors;
    }

    field
        .rules
        .iter()
        .filter(|rule| !rule.is_type())
        .filter_map(|rule| check_bound(field.name, rule, value, source))
        .collect()
}

fn check_type(
    name: &str,
    rule: &Rule,
    value: &Value,
    source: Source,
) -> Option<ValidationError> {
    match rule {
        Rule::IsString => (!value.is_string())
            .then(|| error("is_string", format!("`{name}` must be a string."))),
        Rule::IsInt => as_integer(value, source)
            .is_none()
            .then(|| error("is_int", format!("`{name}` must be an integer."))),
        Rule::IsBool => as_bool(value, source)
            .is_none()
            .then(|| error("is_bool", format!("`{name}` must be a boolean."))),
        Rule::IsArray => (!value.is_array())
            .then(|| error("is_array", format!("`{name}` must be an array."))),
        Rule::IsEmail => (!value.as_str().is_some_and(|s| s.validate_email()))
            .then(|| error("is_email", format!("`{name}` must be an email."))),
        Rule::IsNumberString => (!value
            .as_str()
            .is_some_and(|s| NUMBER_STRING.is_match(s)))
        .then(|| {
            error(
                "is_number_string",
                format!("`{name}` must be a number string."),
            )
        }),
        Rule::Nested(fields) => check_value(*fields, value, Source::Json)
            .err()
            .map(|errors| {
                let details = errors
                    .field_errors()
                    .iter()
                    .map(|(field, issues)| format!("{field} ({})", issues.len()))
                    .collect::<Vec<_>>()
                    .join(", ");
                error("nested", format!("`{name}` has invalid fields: {details}."))
            }),
        _ => None,
    }
}

fn check_bound(
    name: &str,
    rule: &Rule,
    value: &Value,
    source: Source,
) -> Option<ValidationError> {
    match *rule {
        Rule::Min(min) => number(value, source)
            .is_some_and(|n| n < min as f64)
            .then(|| error("min", format!("`{name}` must not be less than {min}."))),
        Rule::Max(max) => number(value, source)
            .is_some_and(|n| n > max as f64)
            .then(|| error("max", format!("`{name}` must not be greater than {max}."))),
        Rule::Positive => (!number(value, source).is_some_and(|n| n > 0.0))
            .then(|| error("positive", format!("`{name}` must be a positive number."))),
        Rule::Length { min, max } => {
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                _ => return None,
            };
            (len < min || len > max).then(|| {
                error(
                    "length",
                    format!("`{name}` length must be between {min} and {max}."),
                )
            })
        },
        _ => None,
    }
}

/// Rewrite textual query values into the JSON type their rules declare.
fn coerce(fields: &'static [Field], object: &mut Map<String, Value>) {
    for field in fields {
        let Some(value) = object.get_mut(field.name) else {
            continue;
        };
        if field.rules.iter().any(|r| matches!(r, Rule::IsInt)) {
            if let Some(n) = as_integer(value, Source::Query) {
                *value = Value::from(n);
            }
        } else if field.rules.iter().any(|r| matches!(r, Rule::IsBool)) {
            if let Some(b) = as_bool(value, Source::Query) {
                *value = Value::Bool(b);
            }
        }
    }
}

fn as_integer(value: &Value, source: Source) -> Option<i64> {
    match (value, source) {
        (Value::Number(n), _) => n.as_i64(),
        (Value::String(s), Source::Query) => s.parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value, source: Source) -> Option<bool> {
    match (value, source) {
        (Value::Bool(b), _) => Some(*b),
        (Value::String(s), Source::Query) => s.parse().ok(),
        _ => None,
    }
}

fn number(value: &Value, source: Source) -> Option<f64> {
    match (value, source) {
        (Value::Number(n), _) => n.as_f64(),
        (Value::String(s), Source::Query) => s.parse().ok(),
        _ => None,
    }
}

fn error(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

/// Build a [`ValidationErrors`] holding one issue.
pub fn single(
    field: &'static str,
    code: &'static str,
    message: String,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(field, error(code, message));
    errors
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Page {
        #[serde(default = "ten")]
        take: i64,
        #[serde(default)]
        skip: i64,
        email: Option<String>,
        name: String,
    }

    fn ten() -> i64 {
        10
    }

    impl Dto for Page {
        const FIELDS: &'static [Field] = &[
            Field::optional("take", &[Rule::IsInt, Rule::Positive, Rule::Max(30)]),
            Field::optional("skip", &[Rule::IsInt, Rule::Min(0)]),
            Field::optional("email", &[Rule::IsEmail]),
            Field::required("name", &[Rule::IsString, Rule::Length { min: 1, max: 5 }]),
        ];
    }

    fn fields(errors: &ValidationErrors) -> Vec<String> {
        let mut fields: Vec<_> =
            errors.field_errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        fields
    }

    fn codes(errors: &ValidationErrors, field: &str) -> Vec<String> {
        errors
            .field_errors()
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, issues)| issues.iter().map(|i| i.code.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let errors = check_value(Page::FIELDS, &json!({}), Source::Json).unwrap_err();
        assert_eq!(fields(&errors), vec!["name"]);
        assert_eq!(codes(&errors, "name"), vec!["required"]);
    }

    #[test]
    fn test_every_violation_is_reported() {
        let errors = check_value(
            Page::FIELDS,
            &json!({ "take": 31, "skip": -1, "email": "nope", "name": "" }),
            Source::Json,
        )
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["email", "name", "skip", "take"]);
    }

    #[test]
    fn test_wrong_type_skips_bounds() {
        let errors = check_value(
            Page::FIELDS,
            &json!({ "take": "a lot", "name": "ok" }),
            Source::Json,
        )
        .unwrap_err();
        assert_eq!(codes(&errors, "take"), vec!["is_int"]);
    }

    #[test]
    fn test_absent_optional_skips_rules() {
        let value = json!({ "name": "ok", "email": null });
        assert!(check_value(Page::FIELDS, &value, Source::Json).is_ok());
    }

    #[test]
    fn test_query_values_are_coerced() {
        let page: Page = parse(
            json!({ "take": "30", "skip": "2", "name": "abc", "extra": "x" }),
            Source::Query,
        )
        .unwrap();
        assert_eq!(page.take, 30);
        assert_eq!(page.skip, 2);

        let page: Page = parse(json!({ "name": "abc" }), Source::Query).unwrap();
        assert_eq!(page.take, 10);
        assert_eq!(page.skip, 0);
    }

    #[test]
    fn test_json_does_not_accept_textual_integer() {
        let errors =
            check_value(Page::FIELDS, &json!({ "take": "3", "name": "a" }), Source::Json)
                .unwrap_err();
        assert_eq!(codes(&errors, "take"), vec!["is_int"]);
    }

    #[test]
    fn test_take_must_be_positive() {
        let errors =
            check_value(Page::FIELDS, &json!({ "take": 0, "name": "a" }), Source::Json)
                .unwrap_err();
        assert_eq!(codes(&errors, "take"), vec!["positive"]);
    }

    #[test]
    fn test_number_string() {
        const FIELDS: &[Field] = &[Field::optional("placeId", &[Rule::IsNumberString])];
        for ok in ["1", "-12", "3.5", ".5", "1e3"] {
            let value = json!({ "placeId": ok });
            assert!(check_value(FIELDS, &value, Source::Query).is_ok(), "{ok}");
        }
        for bad in ["", "abc", "1a", "--1"] {
            let value = json!({ "placeId": bad });
            assert!(check_value(FIELDS, &value, Source::Query).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_inspect_outgoing_value() {
        let page = Page {
            take: 99,
            skip: 0,
            email: None,
            name: "abc".into(),
        };
        assert!(page.inspect().is_err());
        assert!(vec![page].inspect().is_err());
        assert!(Vec::<Page>::new().inspect().is_ok());
    }

    #[test]
    fn test_non_object_body() {
        let errors = check_value(Page::FIELDS, &json!([1, 2]), Source::Json).unwrap_err();
        assert_eq!(fields(&errors), vec!["body"]);
    }
}
