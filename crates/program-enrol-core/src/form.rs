//! Course-level configuration form for program instances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lang::get_string;
use crate::{CourseId, EnrolInstance, InstanceId, InstanceStatus};

pub const FIELD_STATUS: &str = "status";
pub const FIELD_PARENT: &str = "customint1";

/// Submitted form data, with the parent course id still in its raw form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceForm {
    #[serde(default)]
    pub id: Option<InstanceId>,
    pub status: InstanceStatus,
    pub customint1: String,
    #[serde(default)]
    pub customchar1: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldError {
    Required,
    InvalidCourseId,
    /// Another instance of the course already links the same parent and host.
    InstanceExists,
}

impl FieldError {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::InvalidCourseId => "invalidcourseid",
            Self::InstanceExists => "instanceexists",
        }
    }

    #[must_use]
    pub fn message(self) -> String {
        get_string(self.as_str())
    }
}

pub type FormErrors = BTreeMap<String, FieldError>;

/// Parses the raw parent course id. Blank and `0` count as missing.
///
/// # Errors
/// Returns the [`FieldError`] to show against the field.
pub fn parse_parent_course_id(raw: &str) -> Result<CourseId, FieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return Err(FieldError::Required);
    }
    match trimmed.parse::<i64>() {
        Ok(value) if value > 0 => Ok(CourseId(value)),
        _ => Err(FieldError::InvalidCourseId),
    }
}

#[must_use]
pub fn validate_instance_form(form: &InstanceForm) -> FormErrors {
    let mut errors = FormErrors::new();
    if let Err(err) = parse_parent_course_id(&form.customint1) {
        errors.insert(FIELD_PARENT.to_string(), err);
    }
    errors
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Select { options: Vec<(InstanceStatus, String)> },
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<String>,
}

#[must_use]
pub fn status_options() -> Vec<(InstanceStatus, String)> {
    vec![
        (InstanceStatus::Enabled, get_string("yes")),
        (InstanceStatus::Disabled, get_string("no")),
    ]
}

/// Fields of the edit form; values are prefilled when editing an instance.
#[must_use]
pub fn form_definition(instance: Option<&EnrolInstance>) -> Vec<FormField> {
    vec![
        FormField {
            name: FIELD_STATUS.to_string(),
            label: get_string("status"),
            kind: FieldKind::Select {
                options: status_options(),
            },
            required: false,
            default: instance.map(|value| value.status.as_str().to_string()),
        },
        FormField {
            name: FIELD_PARENT.to_string(),
            label: get_string("parentcourseid"),
            kind: FieldKind::Text,
            required: true,
            default: instance
                .and_then(|value| value.parent_course_id)
                .map(|parent| parent.to_string()),
        },
    ]
}
