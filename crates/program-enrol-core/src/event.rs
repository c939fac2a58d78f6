use serde::{Deserialize, Serialize};

use crate::{CourseId, ProgramError, RoleId, UserId};

pub const EVENT_USER_ENROLMENT_CREATED: &str = "\\core\\event\\user_enrolment_created";
pub const EVENT_USER_ENROLMENT_DELETED: &str = "\\core\\event\\user_enrolment_deleted";
pub const EVENT_ROLE_ASSIGNED: &str = "\\core\\event\\role_assigned";

/// Untyped event payload as delivered by the host's event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawHostEvent {
    pub eventname: String,
    #[serde(default)]
    pub relateduserid: Option<i64>,
    #[serde(default)]
    pub courseid: Option<i64>,
    #[serde(default)]
    pub objectid: Option<i64>,
}

/// Events the engine subscribes to. `user` and `course` are optional because
/// the bus may deliver events without a related user or outside any course;
/// such events propagate nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgramEvent {
    MemberAdded {
        user: Option<UserId>,
        course: Option<CourseId>,
    },
    MemberRemoved {
        user: Option<UserId>,
        course: Option<CourseId>,
    },
    RoleAssigned {
        user: Option<UserId>,
        course: Option<CourseId>,
        role: RoleId,
    },
}

impl ProgramEvent {
    /// Decodes a bus payload. Events the engine does not subscribe to yield
    /// `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`ProgramError::Event`] when a role event lacks the role id.
    pub fn from_raw(raw: &RawHostEvent) -> Result<Option<Self>, ProgramError> {
        let name = raw.eventname.as_str();
        if ![
            EVENT_USER_ENROLMENT_CREATED,
            EVENT_USER_ENROLMENT_DELETED,
            EVENT_ROLE_ASSIGNED,
        ]
        .contains(&name)
        {
            return Ok(None);
        }

        let user = raw.relateduserid.map(UserId);
        let course = raw.courseid.map(CourseId);

        let event = match name {
            EVENT_USER_ENROLMENT_CREATED => Self::MemberAdded { user, course },
            EVENT_USER_ENROLMENT_DELETED => Self::MemberRemoved { user, course },
            _ => {
                let role = raw
                    .objectid
                    .map(RoleId)
                    .ok_or_else(|| ProgramError::Event(format!("{name} is missing objectid")))?;
                Self::RoleAssigned { user, course, role }
            }
        };

        Ok(Some(event))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRemoved { .. } => "member_removed",
            Self::RoleAssigned { .. } => "role_assigned",
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::MemberAdded { user, .. }
            | Self::MemberRemoved { user, .. }
            | Self::RoleAssigned { user, .. } => *user,
        }
    }

    #[must_use]
    pub fn course(&self) -> Option<CourseId> {
        match self {
            Self::MemberAdded { course, .. }
            | Self::MemberRemoved { course, .. }
            | Self::RoleAssigned { course, .. } => *course,
        }
    }
}
