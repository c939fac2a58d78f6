//! Propagation of parent-course membership into linked child instances.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::event::ProgramEvent;
use crate::form::{
    parse_parent_course_id, validate_instance_form, FieldError, FormErrors, InstanceForm,
    FIELD_PARENT,
};
use crate::host::{HostEventRecord, HostNotifier};
use crate::lang::get_string;
use crate::ports::ProgramHost;
use crate::resolver::RoleResolver;
use crate::settings::PluginSettings;
use crate::{
    now_utc, CourseId, EnrolInstance, InstanceId, InstanceStatus, NewEnrolInstance, ProgramError,
    RoleId, RoleOwner, User, UserId, CAP_COURSE_ENROLCONFIG, CAP_PROGRAM_CONFIG, PROGRAM_METHOD,
};

/// Result of handling one event. `NoInstances` and `MethodDisabled` are
/// successful no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Propagation {
    NoInstances,
    MethodDisabled,
    Applied {
        instances: Vec<InstanceId>,
        role: Option<RoleId>,
        host_events: Vec<HostEventRecord>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceFields {
    pub parent_course_id: Option<CourseId>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteReport {
    pub instance: InstanceId,
    pub unenrolled: Vec<UserId>,
    pub host_event: Option<HostEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FormOutcome {
    Invalid { errors: FormErrors },
    Created { instance: EnrolInstance },
    Updated { instance: InstanceId, changed: bool },
}

pub struct ProgramEnrolPlugin<'a, H: ProgramHost> {
    host: &'a H,
    resolver: RoleResolver,
    notifier: Option<HostNotifier<'a>>,
}

impl<'a, H: ProgramHost> ProgramEnrolPlugin<'a, H> {
    /// `notifier` is `Some` only when host mirroring resolved as enabled.
    #[must_use]
    pub fn new(host: &'a H, resolver: RoleResolver, notifier: Option<HostNotifier<'a>>) -> Self {
        Self {
            host,
            resolver,
            notifier,
        }
    }

    /// Builds the plugin with the resolver loaded from the settings'
    /// substitution rule.
    pub fn load(
        host: &'a H,
        settings: &PluginSettings,
        notifier: Option<HostNotifier<'a>>,
    ) -> Result<Self> {
        let resolver = RoleResolver::load(host, &settings.substitution)?;
        Ok(Self::new(host, resolver, notifier))
    }

    #[must_use]
    pub fn instance_name(&self, instance: Option<&EnrolInstance>) -> String {
        let plugin = get_string("pluginname");
        let Some(instance) = instance else {
            return plugin;
        };

        let parent = instance
            .parent_course_id
            .map(|value| value.to_string())
            .unwrap_or_default();
        let mut name = format!("{plugin} ({parent})");
        if let Some(host) = &instance.host {
            name.push_str(&format!(" ({host})"));
        }
        name
    }

    pub fn can_add_instance(&self, course: CourseId) -> Result<bool> {
        let context = self.host.course_context(course)?;
        Ok(self.host.has_capability(CAP_COURSE_ENROLCONFIG, context)?
            && self.host.has_capability(CAP_PROGRAM_CONFIG, context)?)
    }

    pub fn can_delete_instance(&self, instance: &EnrolInstance) -> Result<bool> {
        let context = self.host.course_context(instance.course_id)?;
        self.host.has_capability(CAP_PROGRAM_CONFIG, context)
    }

    pub fn can_hide_show_instance(&self, instance: &EnrolInstance) -> Result<bool> {
        self.can_delete_instance(instance)
    }

    #[must_use]
    pub fn allow_unenrol_user() -> bool {
        true
    }

    #[must_use]
    pub fn use_standard_editing_ui() -> bool {
        true
    }

    /// Creates a program instance on `course`. When the instance links a
    /// distinct parent without a host, the parent's current roster is copied
    /// into it.
    pub fn add_instance(&self, course: CourseId, fields: &InstanceFields) -> Result<EnrolInstance> {
        if let Some(parent) = fields.parent_course_id {
            if self.link_taken(course, parent, fields.host.as_deref(), None)? {
                return Err(duplicate_link(parent, course));
            }
        }

        let now = now_utc();
        let new = NewEnrolInstance {
            method: PROGRAM_METHOD.to_string(),
            course_id: course,
            parent_course_id: fields.parent_course_id,
            host: fields.host.clone(),
            status: InstanceStatus::Enabled,
            time_created: now,
            time_modified: now,
        };
        let id = self.host.insert_instance(&new)?;
        let instance = new.into_instance(id);
        info!(instance = %id, course = %course, "program instance created");

        if let Some(parent) = instance.parent_course_id {
            if parent != course && instance.host.is_none() {
                let enrolled = self.copy_roster(&instance, parent)?;
                info!(instance = %id, parent = %parent, enrolled, "parent roster copied");
            }
        }

        Ok(instance)
    }

    fn copy_roster(&self, instance: &EnrolInstance, parent: CourseId) -> Result<usize> {
        let mut enrolled = 0;
        for user_id in self.host.course_enrolled_users(parent)? {
            if self.host.is_enrolled(user_id, instance.id)? {
                continue;
            }

            let user = self.host.get_user(user_id)?;
            let roles: Vec<RoleId> = self
                .host
                .user_roles_to_link(parent, user_id)?
                .into_iter()
                .map(|assignment| self.resolver.resolve(assignment.role_id))
                .collect();

            if roles.is_empty() {
                self.host.enrol_user(instance, user_id, None)?;
                self.notify_member_added(instance, user.as_ref(), None)?;
            }
            for role in roles {
                self.host.enrol_user(instance, user_id, Some(role))?;
                self.notify_member_added(instance, user.as_ref(), Some(role))?;
            }
            enrolled += 1;
        }
        Ok(enrolled)
    }

    /// Whether another instance already links `parent` into `course` for
    /// `host`. `own` is the instance being edited, if any.
    fn link_taken(
        &self,
        course: CourseId,
        parent: CourseId,
        host: Option<&str>,
        own: Option<InstanceId>,
    ) -> Result<bool> {
        Ok(self
            .host
            .find_instance(course, parent, host)?
            .is_some_and(|existing| Some(existing.id) != own))
    }

    fn notify_member_added(
        &self,
        instance: &EnrolInstance,
        user: Option<&User>,
        role: Option<RoleId>,
    ) -> Result<Option<HostEventRecord>> {
        match (&self.notifier, user) {
            (Some(notifier), Some(user)) => notifier.member_added(instance, &user.email, role),
            _ => Ok(None),
        }
    }

    /// Updates status and parent. Returns `false` when the row is gone.
    pub fn update_instance(
        &self,
        instance: &EnrolInstance,
        status: InstanceStatus,
        parent: CourseId,
    ) -> Result<bool> {
        if self.link_taken(
            instance.course_id,
            parent,
            instance.host.as_deref(),
            Some(instance.id),
        )? {
            return Err(duplicate_link(parent, instance.course_id));
        }

        let mut updated = instance.clone();
        updated.status = status;
        updated.parent_course_id = Some(parent);
        updated.time_modified = now_utc();

        let changed = self.host.update_instance(&updated)?;
        info!(instance = %instance.id, changed, "program instance updated");
        Ok(changed)
    }

    /// Unenrols every user of the instance, removes it and tells the host.
    pub fn delete_instance(&self, instance: &EnrolInstance) -> Result<DeleteReport> {
        let users = self.host.instance_users(instance.id)?;
        for user in &users {
            self.host.unenrol_user(instance, *user)?;
        }
        self.host.delete_instance(instance.id)?;

        let host_event = match &self.notifier {
            Some(notifier) => notifier.program_deleted(instance)?,
            None => None,
        };
        info!(
            instance = %instance.id,
            unenrolled = users.len(),
            notified = host_event.is_some(),
            "program instance deleted"
        );

        Ok(DeleteReport {
            instance: instance.id,
            unenrolled: users,
            host_event,
        })
    }

    /// Validates the edit form and creates or updates the instance. Nothing
    /// is written when validation fails.
    pub fn submit_instance_form(
        &self,
        course: CourseId,
        form: &InstanceForm,
    ) -> Result<FormOutcome> {
        let errors = validate_instance_form(form);
        if !errors.is_empty() {
            return Ok(FormOutcome::Invalid { errors });
        }
        let parent = parse_parent_course_id(&form.customint1).map_err(|err| {
            ProgramError::Validation(format!("customint1: {}", err.message()))
        })?;

        match form.id {
            None => {
                let host = form
                    .customchar1
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                if self.link_taken(course, parent, host.as_deref(), None)? {
                    return Ok(FormOutcome::Invalid {
                        errors: duplicate_link_errors(),
                    });
                }
                let instance = self.add_instance(
                    course,
                    &InstanceFields {
                        parent_course_id: Some(parent),
                        host,
                    },
                )?;
                Ok(FormOutcome::Created { instance })
            }
            Some(id) => {
                let instance = self
                    .host
                    .get_instance(id)?
                    .filter(|value| value.course_id == course && value.is_program())
                    .ok_or_else(|| {
                        ProgramError::Validation(format!(
                            "program instance {id} not found on course {course}"
                        ))
                    })?;
                if self.link_taken(course, parent, instance.host.as_deref(), Some(id))? {
                    return Ok(FormOutcome::Invalid {
                        errors: duplicate_link_errors(),
                    });
                }
                let changed = self.update_instance(&instance, form.status, parent)?;
                Ok(FormOutcome::Updated {
                    instance: id,
                    changed,
                })
            }
        }
    }

    pub fn handle(&self, event: &ProgramEvent) -> Result<Propagation> {
        let Some((user, instances)) = self.linked_for_event(event)? else {
            debug!(kind = event.kind(), user = ?event.user(), "no linked instances");
            return Ok(Propagation::NoInstances);
        };

        if !self.host.method_enabled(PROGRAM_METHOD)? {
            debug!(kind = event.kind(), "program enrol method disabled");
            return Ok(Propagation::MethodDisabled);
        }

        let outcome = match *event {
            ProgramEvent::MemberAdded { .. } => self.apply_member_added(&user, &instances)?,
            ProgramEvent::MemberRemoved { .. } => self.apply_member_removed(&user, &instances)?,
            ProgramEvent::RoleAssigned { role, .. } => {
                self.apply_role_assigned(&user, &instances, role)?
            }
        };

        if let Propagation::Applied {
            instances,
            host_events,
            ..
        } = &outcome
        {
            info!(
                kind = event.kind(),
                user = %user.id,
                instances = instances.len(),
                host_events = host_events.len(),
                "propagation applied"
            );
        }
        Ok(outcome)
    }

    fn linked_for_event(&self, event: &ProgramEvent) -> Result<Option<(User, Vec<EnrolInstance>)>> {
        let Some(user_id) = event.user() else {
            return Ok(None);
        };
        let Some(user) = self.host.get_user(user_id)? else {
            return Ok(None);
        };
        let Some(course) = event.course() else {
            return Ok(None);
        };

        let instances = self.host.linked_instances(course, None)?;
        if instances.is_empty() {
            return Ok(None);
        }
        Ok(Some((user, instances)))
    }

    fn apply_member_added(&self, user: &User, instances: &[EnrolInstance]) -> Result<Propagation> {
        let mut host_events = Vec::new();
        for instance in instances {
            self.host.enrol_user(instance, user.id, None)?;
            debug!(instance = %instance.id, user = %user.id, "enrolled");
            if let Some(record) = self.notify_member_added(instance, Some(user), None)? {
                host_events.push(record);
            }
        }

        Ok(Propagation::Applied {
            instances: instances.iter().map(|instance| instance.id).collect(),
            role: None,
            host_events,
        })
    }

    fn apply_member_removed(
        &self,
        user: &User,
        instances: &[EnrolInstance],
    ) -> Result<Propagation> {
        let mut host_events = Vec::new();
        for instance in instances {
            self.host.unenrol_user(instance, user.id)?;
            debug!(instance = %instance.id, user = %user.id, "unenrolled");
            if let Some(notifier) = &self.notifier {
                if let Some(record) = notifier.member_removed(instance, &user.email)? {
                    host_events.push(record);
                }
            }
        }

        Ok(Propagation::Applied {
            instances: instances.iter().map(|instance| instance.id).collect(),
            role: None,
            host_events,
        })
    }

    fn apply_role_assigned(
        &self,
        user: &User,
        instances: &[EnrolInstance],
        role: RoleId,
    ) -> Result<Propagation> {
        let role = self.resolver.resolve(role);
        let mut host_events = Vec::new();
        for instance in instances {
            let context = self.host.course_context(instance.course_id)?;
            self.host
                .assign_role(role, user.id, context, &RoleOwner::for_instance(instance))?;
            debug!(instance = %instance.id, user = %user.id, role = %role, "role assigned");
            if let Some(record) = self.notify_member_added(instance, Some(user), Some(role))? {
                host_events.push(record);
            }
        }

        Ok(Propagation::Applied {
            instances: instances.iter().map(|instance| instance.id).collect(),
            role: Some(role),
            host_events,
        })
    }
}

fn duplicate_link(parent: CourseId, course: CourseId) -> anyhow::Error {
    ProgramError::Validation(format!(
        "program instance linking {parent} to {course} already exists"
    ))
    .into()
}

fn duplicate_link_errors() -> FormErrors {
    FormErrors::from([(FIELD_PARENT.to_string(), FieldError::InstanceExists)])
}
