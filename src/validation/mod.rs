//! Field validation with aggregated error reporting.
//!
//! Every rule of every field runs; failures are collected into a
//! [`MessageBag`] which becomes a single 422 response.

mod bag;
mod input;
mod rules;

pub use bag::MessageBag;
pub use input::{FieldValue, Input};
pub use rules::{is_valid_email, Rule, RuleContext};

use std::collections::HashMap;

use uuid::Uuid;

use crate::{error::AppError, users::repo_types::User};

struct FieldRules<'a> {
    name: &'static str,
    value: FieldValue<'a>,
    rules: Vec<Rule>,
}

/// Collects fields with their rules and checks them all at once.
#[derive(Default)]
pub struct Validator<'a> {
    fields: Vec<FieldRules<'a>>,
    email_owner: Option<&'a User>,
    ignore_id: Option<Uuid>,
}

impl<'a> Validator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored user matching the submitted email, if any.
    pub fn email_owner(mut self, user: Option<&'a User>) -> Self {
        self.email_owner = user;
        self
    }

    /// Record id that `Rule::Unique` treats as the caller's own.
    pub fn ignoring(mut self, id: Uuid) -> Self {
        self.ignore_id = Some(id);
        self
    }

    pub fn field(
        mut self,
        name: &'static str,
        value: impl Into<FieldValue<'a>>,
        rules: &[Rule],
    ) -> Self {
        self.fields.push(FieldRules {
            name,
            value: value.into(),
            rules: rules.to_vec(),
        });
        self
    }

    pub fn errors(&self) -> anyhow::Result<MessageBag> {
        let data: HashMap<&str, &str> = self
            .fields
            .iter()
            .filter_map(|f| f.value.text().map(|v| (f.name, v)))
            .collect();
        let ctx = RuleContext {
            data: &data,
            email_owner: self.email_owner,
            ignore_id: self.ignore_id,
        };

        let mut bag = MessageBag::new();
        for field in &self.fields {
            for rule in &field.rules {
                if let Some(message) = rule.check(field.name, field.value, &ctx)? {
                    bag.add(field.name, message);
                }
            }
        }
        Ok(bag)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let bag = self.errors()?;
        if bag.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(bag))
        }
    }
}

/// Unwraps a field that has already passed `Rule::Required` and `Rule::String`.
pub fn present<'v>(value: Option<&'v Input>, field: &'static str) -> Result<&'v str, AppError> {
    value.and_then(Input::as_text).ok_or_else(|| {
        AppError::Validation(MessageBag::single(field, Rule::required_message(field)))
    })
}
