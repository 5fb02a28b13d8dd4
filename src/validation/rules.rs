use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use super::input::FieldValue;
use crate::{auth::password::verify_password, users::repo_types::User};

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// What a rule may look at besides its own value.
pub struct RuleContext<'a> {
    /// Every submitted non-missing field, by name.
    pub data: &'a HashMap<&'a str, &'a str>,
    /// The stored user whose email matches the submitted one.
    pub email_owner: Option<&'a User>,
    pub ignore_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Must be a JSON string.
    String,
    Email,
    /// Minimum length in characters.
    Min(usize),
    /// Maximum length in characters.
    Max(usize),
    /// Must equal the `<field>_confirmation` field.
    Confirmed,
    /// The submitted email must belong to a stored user.
    Exists,
    /// The submitted email must not belong to another stored user.
    Unique,
    /// Must verify against the password hash of the email owner.
    CurrentPassword,
}

fn attribute(field: &str) -> String {
    field.replace('_', " ")
}

impl Rule {
    pub fn required_message(field: &str) -> String {
        format!("The {} field is required.", attribute(field))
    }

    /// Returns the failure message, or `None` when the value passes.
    ///
    /// Blank values are only checked by `Required`; values that are not
    /// strings are only checked by `String`.
    pub fn check(
        &self,
        field: &str,
        value: FieldValue<'_>,
        ctx: &RuleContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        if value.is_blank() {
            return Ok(match self {
                Rule::Required => Some(Self::required_message(field)),
                _ => None,
            });
        }
        let attr = attribute(field);
        let Some(value) = value.text() else {
            return Ok(match self {
                Rule::String => Some(format!("The {attr} must be a string.")),
                _ => None,
            });
        };

        let failed = match self {
            Rule::Required | Rule::String => false,
            Rule::Email => !is_valid_email(value),
            Rule::Min(n) => value.chars().count() < *n,
            Rule::Max(n) => value.chars().count() > *n,
            Rule::Confirmed => {
                let key = format!("{field}_confirmation");
                ctx.data.get(key.as_str()).copied() != Some(value)
            }
            Rule::Exists => ctx.email_owner.is_none(),
            Rule::Unique => ctx
                .email_owner
                .is_some_and(|owner| Some(owner.id) != ctx.ignore_id),
            Rule::CurrentPassword => match ctx.email_owner {
                Some(owner) => !verify_password(value, &owner.password_hash)?,
                None => true,
            },
        };
        if !failed {
            return Ok(None);
        }

        Ok(Some(match self {
            Rule::Required => Self::required_message(field),
            Rule::String => format!("The {attr} must be a string."),
            Rule::Email => format!("The {attr} must be a valid email address."),
            Rule::Min(n) => format!("The {attr} must be at least {n} characters."),
            Rule::Max(n) => format!("The {attr} must not be greater than {n} characters."),
            Rule::Confirmed => format!("The {attr} confirmation does not match."),
            Rule::Exists => format!("The selected {attr} is invalid."),
            Rule::Unique => format!("The {attr} has already been taken."),
            Rule::CurrentPassword => format!("The {attr} is incorrect."),
        }))
    }
}
