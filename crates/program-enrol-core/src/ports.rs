//! Narrow interfaces onto the host platform.
//!
//! Every method takes `&self`; adapters own whatever interior state they need.
//! Storage failures come back as `anyhow::Error` and are propagated unchanged.

use anyhow::Result;

use crate::host::{CourseLink, HostEventRecord};
use crate::{
    ContextId, CourseId, EnrolInstance, InstanceId, NewEnrolInstance, Role, RoleAssignment,
    RoleId, RoleOwner, User, UserId,
};

/// CRUD and lookups over program enrol instances.
pub trait InstanceRegistry {
    fn insert_instance(&self, instance: &NewEnrolInstance) -> Result<InstanceId>;

    /// Returns `false` when no row matched `instance.id`.
    fn update_instance(&self, instance: &EnrolInstance) -> Result<bool>;

    fn delete_instance(&self, id: InstanceId) -> Result<bool>;

    fn get_instance(&self, id: InstanceId) -> Result<Option<EnrolInstance>>;

    /// Program instances configured on `course`.
    fn list_instances(&self, course: CourseId) -> Result<Vec<EnrolInstance>>;

    /// Program instances whose parent is `parent`, restricted to `host`
    /// (`None` matches only instances without a host).
    fn linked_instances(&self, parent: CourseId, host: Option<&str>)
        -> Result<Vec<EnrolInstance>>;

    fn find_instance(
        &self,
        course: CourseId,
        parent: CourseId,
        host: Option<&str>,
    ) -> Result<Option<EnrolInstance>>;

    fn course_has_program(&self, course: CourseId) -> Result<bool>;

    /// Program instances of `course` through which `user` is enrolled.
    fn instances_for_user(&self, course: CourseId, user: UserId) -> Result<Vec<EnrolInstance>>;

    /// Distinct users enrolled in `course` through any enrol instance.
    fn course_enrolled_users(&self, course: CourseId) -> Result<Vec<UserId>>;

    fn is_enrolled(&self, user: UserId, instance: InstanceId) -> Result<bool>;

    /// Role assignments of `user` in the course context, excluding the ones
    /// created by program instances.
    fn user_roles_to_link(&self, course: CourseId, user: UserId) -> Result<Vec<RoleAssignment>>;
}

pub trait EnrolmentPort {
    /// Whether the enrol method is enabled site-wide.
    fn method_enabled(&self, method: &str) -> Result<bool>;

    /// Enrols `user` through `instance`. Re-enrolling is a no-op for the
    /// enrolment row; a role, when given, is assigned in the instance course.
    fn enrol_user(&self, instance: &EnrolInstance, user: UserId, role: Option<RoleId>)
        -> Result<()>;

    /// Removes the enrolment and the role assignments owned by `instance`.
    fn unenrol_user(&self, instance: &EnrolInstance, user: UserId) -> Result<()>;

    fn instance_users(&self, instance: InstanceId) -> Result<Vec<UserId>>;
}

pub trait RoleDirectory {
    fn role_by_id(&self, id: RoleId) -> Result<Option<Role>>;
    fn role_by_shortname(&self, shortname: &str) -> Result<Option<Role>>;
}

pub trait RoleAssignmentPort {
    fn assign_role(
        &self,
        role: RoleId,
        user: UserId,
        context: ContextId,
        owner: &RoleOwner,
    ) -> Result<()>;
}

pub trait ContextResolver {
    fn course_context(&self, course: CourseId) -> Result<ContextId>;
}

pub trait Authorization {
    fn has_capability(&self, capability: &str, context: ContextId) -> Result<bool>;
}

pub trait UserDirectory {
    fn get_user(&self, id: UserId) -> Result<Option<User>>;
}

pub trait CourseLinkDirectory {
    fn course_link(&self, course: CourseId) -> Result<Option<CourseLink>>;
}

/// Fire-and-forget hand-off to the external notification client.
pub trait HostDispatcher {
    fn set_event(&self, record: &HostEventRecord) -> Result<()>;
}

/// Everything the propagation engine needs from the host.
pub trait ProgramHost:
    InstanceRegistry
    + EnrolmentPort
    + RoleDirectory
    + RoleAssignmentPort
    + ContextResolver
    + Authorization
    + UserDirectory
{
}

impl<T> ProgramHost for T where
    T: InstanceRegistry
        + EnrolmentPort
        + RoleDirectory
        + RoleAssignmentPort
        + ContextResolver
        + Authorization
        + UserDirectory
{
}
