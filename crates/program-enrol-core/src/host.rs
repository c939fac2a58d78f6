//! Mirroring of program membership changes to an external host.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::ports::{CourseLinkDirectory, HostDispatcher, RoleDirectory};
use crate::{CourseId, EnrolInstance, RoleId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HostEventType {
    AddProgramMember,
    DeleteProgramMember,
    DeleteProgram,
}

impl HostEventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddProgramMember => "add_program_member",
            Self::DeleteProgramMember => "delete_program_member",
            Self::DeleteProgram => "delete_program",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add_program_member" => Some(Self::AddProgramMember),
            "delete_program_member" => Some(Self::DeleteProgramMember),
            "delete_program" => Some(Self::DeleteProgram),
            _ => None,
        }
    }
}

/// Link between a local course and its counterpart on a remote platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseLink {
    pub course_id: CourseId,
    pub course_id_link: i64,
    pub platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostEventRecord {
    pub event_id: Ulid,
    pub event_type: HostEventType,
    #[serde(rename = "courseid")]
    pub course_id: CourseId,
    #[serde(rename = "courseidlink")]
    pub course_id_link: i64,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, rename = "rolename", skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

/// Builds host event records and hands them to the dispatcher. Each method
/// returns `None` when the instance's course has no link or no parent.
pub struct HostNotifier<'a> {
    links: &'a dyn CourseLinkDirectory,
    roles: &'a dyn RoleDirectory,
    dispatcher: &'a dyn HostDispatcher,
}

impl<'a> HostNotifier<'a> {
    #[must_use]
    pub fn new(
        links: &'a dyn CourseLinkDirectory,
        roles: &'a dyn RoleDirectory,
        dispatcher: &'a dyn HostDispatcher,
    ) -> Self {
        Self {
            links,
            roles,
            dispatcher,
        }
    }

    pub fn member_added(
        &self,
        instance: &EnrolInstance,
        email: &str,
        role: Option<RoleId>,
    ) -> Result<Option<HostEventRecord>> {
        let role_name = match role {
            Some(role_id) => {
                let found = self.roles.role_by_id(role_id)?;
                if found.is_none() {
                    warn!(role = %role_id, "role missing, host event sent without rolename");
                }
                found.map(|value| value.shortname)
            }
            None => None,
        };
        self.emit(
            HostEventType::AddProgramMember,
            instance,
            Some(email),
            role_name,
        )
    }

    pub fn member_removed(
        &self,
        instance: &EnrolInstance,
        email: &str,
    ) -> Result<Option<HostEventRecord>> {
        self.emit(HostEventType::DeleteProgramMember, instance, Some(email), None)
    }

    pub fn program_deleted(&self, instance: &EnrolInstance) -> Result<Option<HostEventRecord>> {
        self.emit(HostEventType::DeleteProgram, instance, None, None)
    }

    fn emit(
        &self,
        event_type: HostEventType,
        instance: &EnrolInstance,
        email: Option<&str>,
        role_name: Option<String>,
    ) -> Result<Option<HostEventRecord>> {
        let Some(parent) = instance.parent_course_id else {
            return Ok(None);
        };
        let Some(link) = self.links.course_link(instance.course_id)? else {
            debug!(course = %instance.course_id, "no course link, host event skipped");
            return Ok(None);
        };

        let record = HostEventRecord {
            event_id: Ulid::new(),
            event_type,
            course_id: parent,
            course_id_link: link.course_id_link,
            platform: link.platform,
            email: email.map(str::to_string),
            role_name,
        };
        self.dispatcher.set_event(&record)?;
        debug!(
            event_type = event_type.as_str(),
            instance = %instance.id,
            "host event dispatched"
        );
        Ok(Some(record))
    }
}
