//! Program enrolment propagation.
//!
//! A course configured with a `program` enrol instance mirrors the roster of
//! its parent (program) course. Enrolment, unenrolment and role assignment in
//! the parent are propagated to every linked child instance, and optionally
//! echoed to an external host through [`host::HostNotifier`].
//!
//! The host platform is consumed through the traits in [`ports`]; the
//! propagation rules live in [`engine::ProgramEnrolPlugin`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

pub mod engine;
pub mod event;
pub mod form;
pub mod host;
pub mod lang;
pub mod ports;
pub mod resolver;
pub mod settings;

pub use engine::{DeleteReport, FormOutcome, ProgramEnrolPlugin, Propagation};
pub use event::{ProgramEvent, RawHostEvent};
pub use form::{validate_instance_form, FieldError, FormErrors, InstanceForm};
pub use host::{CourseLink, HostEventRecord, HostEventType, HostNotifier};
pub use resolver::{RoleResolver, RoleSubstitution};
pub use settings::{HostIntegration, HostMirroring, PluginSettings};

/// Enrol method name of program instances.
pub const PROGRAM_METHOD: &str = "program";
/// Enrol method name of the host's manual enrolments.
pub const MANUAL_METHOD: &str = "manual";
/// Component recorded on role assignments created through a program instance.
pub const PROGRAM_COMPONENT: &str = "enrol_program";

pub const CAP_PROGRAM_CONFIG: &str = "enrol/program:config";
pub const CAP_COURSE_ENROLCONFIG: &str = "moodle/course:enrolconfig";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ProgramError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("event error: {0}")]
    Event(String),
    #[error("storage error: {0}")]
    Storage(String),
}

macro_rules! id_newtype {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(
                Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash,
            )]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

id_newtype!(CourseId, UserId, RoleId, InstanceId, ContextId);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Enabled,
    Disabled,
}

impl InstanceStatus {
    /// Integer code stored in the host's `enrol.status` column.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
        }
    }

    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Enabled),
            1 => Some(Self::Disabled),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// An enrol instance row. For program instances `parent_course_id` is the
/// program course (`customint1`) and `host` the optional external host
/// (`customchar1`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrolInstance {
    pub id: InstanceId,
    pub method: String,
    pub course_id: CourseId,
    pub parent_course_id: Option<CourseId>,
    pub host: Option<String>,
    pub status: InstanceStatus,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub time_modified: OffsetDateTime,
}

impl EnrolInstance {
    #[must_use]
    pub fn is_program(&self) -> bool {
        self.method == PROGRAM_METHOD
    }
}

/// Fields written when a new instance is inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEnrolInstance {
    pub method: String,
    pub course_id: CourseId,
    pub parent_course_id: Option<CourseId>,
    pub host: Option<String>,
    pub status: InstanceStatus,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub time_modified: OffsetDateTime,
}

impl NewEnrolInstance {
    #[must_use]
    pub fn into_instance(self, id: InstanceId) -> EnrolInstance {
        EnrolInstance {
            id,
            method: self.method,
            course_id: self.course_id,
            parent_course_id: self.parent_course_id,
            host: self.host,
            status: self.status,
            time_created: self.time_created,
            time_modified: self.time_modified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub shortname: String,
}

/// Which component owns a role assignment. Manual assignments carry an empty
/// component; assignments made through an enrol instance carry
/// `enrol_<method>` and the instance id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleOwner {
    pub component: String,
    pub item_id: i64,
}

impl RoleOwner {
    #[must_use]
    pub fn manual() -> Self {
        Self {
            component: String::new(),
            item_id: 0,
        }
    }

    #[must_use]
    pub fn for_instance(instance: &EnrolInstance) -> Self {
        if instance.method == MANUAL_METHOD {
            return Self::manual();
        }
        Self {
            component: format!("enrol_{}", instance.method),
            item_id: instance.id.0,
        }
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.component.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub id: i64,
    pub role_id: RoleId,
    pub user_id: UserId,
    pub context_id: ContextId,
    pub component: String,
    pub item_id: i64,
}

/// Current UTC time at the one-second resolution timestamps are stored with.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc().to_offset(UtcOffset::UTC);
    now.replace_nanosecond(0).unwrap_or(now)
}

/// Converts a stored unix timestamp back into a UTC datetime.
///
/// # Errors
/// Returns [`ProgramError::Storage`] when the value is out of range.
pub fn from_unix_seconds(value: i64) -> Result<OffsetDateTime, ProgramError> {
    OffsetDateTime::from_unix_timestamp(value)
        .map_err(|err| ProgramError::Storage(format!("invalid unix timestamp {value}: {err}")))
}
