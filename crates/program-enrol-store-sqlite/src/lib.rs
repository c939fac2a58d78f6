#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use program_enrol_core::host::{CourseLink, HostEventRecord, HostEventType};
use program_enrol_core::ports::{
    Authorization, ContextResolver, CourseLinkDirectory, EnrolmentPort, HostDispatcher,
    InstanceRegistry, RoleAssignmentPort, RoleDirectory, UserDirectory,
};
use program_enrol_core::{
    from_unix_seconds, now_utc, ContextId, CourseId, EnrolInstance, InstanceId, InstanceStatus,
    NewEnrolInstance, ProgramError, Role, RoleAssignment, RoleId, RoleOwner, User, UserId,
    CAP_COURSE_ENROLCONFIG, CAP_PROGRAM_CONFIG, MANUAL_METHOD, PROGRAM_COMPONENT, PROGRAM_METHOD,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

const PROGRAM_MIGRATION_VERSION: i64 = 1;
const CONTEXT_SYSTEM: i64 = 10;
const CONTEXT_COURSE: i64 = 50;

const ENROL_COLUMNS: &str = "e.id, e.enrol, e.courseid, e.status, e.customint1, e.customchar1, e.timecreated, e.timemodified";

const SCHEMA_PROGRAM_V1: &str = r"
CREATE TABLE IF NOT EXISTS course (
  id INTEGER PRIMARY KEY,
  shortname TEXT NOT NULL,
  fullname TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS context (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  contextlevel INTEGER NOT NULL,
  instanceid INTEGER NOT NULL,
  UNIQUE(contextlevel, instanceid)
);

CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY,
  username TEXT NOT NULL UNIQUE,
  email TEXT NOT NULL,
  deleted INTEGER NOT NULL DEFAULT 0 CHECK (deleted IN (0, 1))
);

CREATE TABLE IF NOT EXISTS role (
  id INTEGER PRIMARY KEY,
  shortname TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_capabilities (
  roleid INTEGER NOT NULL REFERENCES role(id),
  capability TEXT NOT NULL,
  PRIMARY KEY (roleid, capability)
);

CREATE TABLE IF NOT EXISTS role_assignments (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  roleid INTEGER NOT NULL REFERENCES role(id),
  contextid INTEGER NOT NULL REFERENCES context(id),
  userid INTEGER NOT NULL REFERENCES users(id),
  component TEXT NOT NULL DEFAULT '',
  itemid INTEGER NOT NULL DEFAULT 0,
  timemodified INTEGER NOT NULL,
  UNIQUE(roleid, contextid, userid, component, itemid)
);

CREATE INDEX IF NOT EXISTS idx_role_assignments_context_user
  ON role_assignments(contextid, userid);

CREATE TABLE IF NOT EXISTS enrol_methods (
  name TEXT PRIMARY KEY,
  enabled INTEGER NOT NULL CHECK (enabled IN (0, 1))
);

CREATE TABLE IF NOT EXISTS enrol (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  enrol TEXT NOT NULL,
  courseid INTEGER NOT NULL REFERENCES course(id),
  status INTEGER NOT NULL CHECK (status IN (0, 1)),
  customint1 INTEGER,
  customchar1 TEXT,
  timecreated INTEGER NOT NULL,
  timemodified INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_enrol_program_link
  ON enrol(courseid, customint1, IFNULL(customchar1, ''))
  WHERE enrol = 'program';
CREATE INDEX IF NOT EXISTS idx_enrol_parent
  ON enrol(enrol, customint1);

CREATE TABLE IF NOT EXISTS user_enrolments (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  enrolid INTEGER NOT NULL REFERENCES enrol(id) ON DELETE CASCADE,
  userid INTEGER NOT NULL REFERENCES users(id),
  status INTEGER NOT NULL DEFAULT 0,
  timecreated INTEGER NOT NULL,
  timemodified INTEGER NOT NULL,
  UNIQUE(enrolid, userid)
);

CREATE TABLE IF NOT EXISTS course_links (
  courseid INTEGER PRIMARY KEY REFERENCES course(id),
  courseidlink INTEGER NOT NULL,
  platform TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS host_events (
  event_seq INTEGER PRIMARY KEY AUTOINCREMENT,
  event_id TEXT NOT NULL UNIQUE,
  event_type TEXT NOT NULL CHECK (
    event_type IN ('add_program_member', 'delete_program_member', 'delete_program')
  ),
  payload_json TEXT NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS trg_host_events_no_update
BEFORE UPDATE ON host_events
BEGIN
  SELECT RAISE(FAIL, 'host_events is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_host_events_no_delete
BEFORE DELETE ON host_events
BEGIN
  SELECT RAISE(FAIL, 'host_events is append-only');
END;
";

const STANDARD_ROLES: &[(i64, &str, &str)] = &[
    (1, "manager", "Manager"),
    (2, "coursecreator", "Course creator"),
    (3, "editingteacher", "Teacher"),
    (4, "teacher", "Non-editing teacher"),
    (5, "student", "Student"),
    (6, "guest", "Guest"),
];

const CONFIG_ROLES: &[&str] = &["manager", "editingteacher"];

/// `SQLite` rendition of the host platform tables the plugin works against.
///
/// Capability checks run for the acting user; without one the store acts as
/// the site administrator.
pub struct SqliteProgramStore {
    conn: Connection,
    actor: Option<UserId>,
}

impl SqliteProgramStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn, actor: None })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at INTEGER NOT NULL
                );",
            )
            .context("failed to ensure schema_migrations exists")?;

        self.conn
            .execute_batch(SCHEMA_PROGRAM_V1)
            .context("failed to apply program enrolment schema")?;

        let now = now_utc().unix_timestamp();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![PROGRAM_MIGRATION_VERSION, now],
            )
            .context("failed to register program schema migration")?;

        self.conn
            .execute(
                "INSERT OR IGNORE INTO context(contextlevel, instanceid) VALUES (?1, 0)",
                params![CONTEXT_SYSTEM],
            )
            .context("failed to seed system context")?;

        for (id, shortname, name) in STANDARD_ROLES {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO role(id, shortname, name) VALUES (?1, ?2, ?3)",
                    params![id, shortname, name],
                )
                .with_context(|| format!("failed to seed role {shortname}"))?;
        }

        for shortname in CONFIG_ROLES {
            for capability in [CAP_PROGRAM_CONFIG, CAP_COURSE_ENROLCONFIG] {
                self.grant_capability(shortname, capability)?;
            }
        }

        for method in [MANUAL_METHOD, PROGRAM_METHOD] {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO enrol_methods(name, enabled) VALUES (?1, 1)",
                    params![method],
                )
                .with_context(|| format!("failed to seed enrol method {method}"))?;
        }

        Ok(())
    }

    #[must_use]
    pub fn with_actor(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn add_course(&self, id: CourseId, shortname: &str, fullname: &str) -> Result<ContextId> {
        self.conn
            .execute(
                "INSERT INTO course(id, shortname, fullname) VALUES (?1, ?2, ?3)",
                params![id.0, shortname, fullname],
            )
            .with_context(|| format!("failed to insert course {id}"))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO context(contextlevel, instanceid) VALUES (?1, ?2)",
                params![CONTEXT_COURSE, id.0],
            )
            .with_context(|| format!("failed to insert context for course {id}"))?;
        self.course_context(id)
    }

    pub fn add_user(&self, user: &User) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users(id, username, email) VALUES (?1, ?2, ?3)",
                params![user.id.0, user.username, user.email],
            )
            .with_context(|| format!("failed to insert user {}", user.id))?;
        Ok(())
    }

    /// Soft-deletes a user the way the host does; the user no longer resolves.
    pub fn delete_user(&self, user: UserId) -> Result<bool> {
        let changed = self
            .conn
            .execute("UPDATE users SET deleted = 1 WHERE id = ?1", params![user.0])
            .with_context(|| format!("failed to delete user {user}"))?;
        Ok(changed > 0)
    }

    pub fn set_course_link(&self, link: &CourseLink) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO course_links(courseid, courseidlink, platform) VALUES (?1, ?2, ?3)
                 ON CONFLICT(courseid) DO UPDATE SET
                   courseidlink = excluded.courseidlink,
                   platform = excluded.platform",
                params![link.course_id.0, link.course_id_link, link.platform],
            )
            .with_context(|| format!("failed to upsert course link for {}", link.course_id))?;
        Ok(())
    }

    pub fn grant_capability(&self, role_shortname: &str, capability: &str) -> Result<()> {
        let role = self
            .role_by_shortname(role_shortname)?
            .ok_or_else(|| anyhow!("unknown role shortname: {role_shortname}"))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO role_capabilities(roleid, capability) VALUES (?1, ?2)",
                params![role.id.0, capability],
            )
            .with_context(|| format!("failed to grant {capability} to {role_shortname}"))?;
        Ok(())
    }

    pub fn set_method_enabled(&self, method: &str, enabled: bool) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO enrol_methods(name, enabled) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET enabled = excluded.enabled",
                params![method, i64::from(enabled)],
            )
            .with_context(|| format!("failed to toggle enrol method {method}"))?;
        Ok(())
    }

    /// Returns the course's manual instance, creating it on first use.
    pub fn manual_instance(&self, course: CourseId) -> Result<EnrolInstance> {
        let existing = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ENROL_COLUMNS} FROM enrol e
                     WHERE e.enrol = ?1 AND e.courseid = ?2
                     ORDER BY e.id ASC LIMIT 1"
                ),
                params![MANUAL_METHOD, course.0],
                parse_instance_row,
            )
            .optional()
            .with_context(|| format!("failed to query manual instance of course {course}"))?;
        if let Some(instance) = existing {
            return Ok(instance);
        }

        let now = now_utc();
        let new = NewEnrolInstance {
            method: MANUAL_METHOD.to_string(),
            course_id: course,
            parent_course_id: None,
            host: None,
            status: InstanceStatus::Enabled,
            time_created: now,
            time_modified: now,
        };
        let id = self.insert_instance(&new)?;
        Ok(new.into_instance(id))
    }

    /// All role assignments of `user` in the course context, whoever owns them.
    pub fn user_role_assignments(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<RoleAssignment>> {
        let context = self.course_context(course)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, roleid, userid, contextid, component, itemid
             FROM role_assignments
             WHERE contextid = ?1 AND userid = ?2
             ORDER BY roleid ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![context.0, user.0], parse_role_assignment_row)?;
        collect_rows(rows)
    }

    pub fn host_events(&self) -> Result<Vec<HostEventRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM host_events ORDER BY event_seq ASC")?;
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let json: String = row.get(0)?;
            let record: HostEventRecord =
                serde_json::from_str(&json).context("invalid stored host event JSON")?;
            records.push(record);
        }
        Ok(records)
    }

    fn system_context(&self) -> Result<ContextId> {
        self.conn
            .query_row(
                "SELECT id FROM context WHERE contextlevel = ?1 AND instanceid = 0",
                params![CONTEXT_SYSTEM],
                |row| row.get(0).map(ContextId),
            )
            .context("failed to resolve system context")
    }

    fn query_instances(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<EnrolInstance>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, parse_instance_row)?;
        collect_rows(rows)
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl InstanceRegistry for SqliteProgramStore {
    fn insert_instance(&self, instance: &NewEnrolInstance) -> Result<InstanceId> {
        self.conn
            .execute(
                "INSERT INTO enrol(enrol, courseid, status, customint1, customchar1, timecreated, timemodified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    instance.method,
                    instance.course_id.0,
                    instance.status.code(),
                    instance.parent_course_id.map(|value| value.0),
                    instance.host,
                    instance.time_created.unix_timestamp(),
                    instance.time_modified.unix_timestamp(),
                ],
            )
            .with_context(|| {
                format!(
                    "failed to insert {} instance on course {}",
                    instance.method, instance.course_id
                )
            })?;
        Ok(InstanceId(self.conn.last_insert_rowid()))
    }

    fn update_instance(&self, instance: &EnrolInstance) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE enrol
                 SET status = ?1, customint1 = ?2, customchar1 = ?3, timemodified = ?4
                 WHERE id = ?5",
                params![
                    instance.status.code(),
                    instance.parent_course_id.map(|value| value.0),
                    instance.host,
                    instance.time_modified.unix_timestamp(),
                    instance.id.0,
                ],
            )
            .with_context(|| format!("failed to update enrol instance {}", instance.id))?;
        Ok(changed > 0)
    }

    fn delete_instance(&self, id: InstanceId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM enrol WHERE id = ?1", params![id.0])
            .with_context(|| format!("failed to delete enrol instance {id}"))?;
        Ok(changed > 0)
    }

    fn get_instance(&self, id: InstanceId) -> Result<Option<EnrolInstance>> {
        self.conn
            .query_row(
                &format!("SELECT {ENROL_COLUMNS} FROM enrol e WHERE e.id = ?1"),
                params![id.0],
                parse_instance_row,
            )
            .optional()
            .with_context(|| format!("failed to load enrol instance {id}"))
    }

    fn list_instances(&self, course: CourseId) -> Result<Vec<EnrolInstance>> {
        self.query_instances(
            &format!(
                "SELECT {ENROL_COLUMNS} FROM enrol e
                 WHERE e.enrol = ?1 AND e.courseid = ?2
                 ORDER BY e.id ASC"
            ),
            params![PROGRAM_METHOD, course.0],
        )
    }

    fn linked_instances(
        &self,
        parent: CourseId,
        host: Option<&str>,
    ) -> Result<Vec<EnrolInstance>> {
        self.query_instances(
            &format!(
                "SELECT {ENROL_COLUMNS} FROM enrol e
                 WHERE e.enrol = ?1 AND e.customint1 = ?2 AND e.customchar1 IS ?3
                 ORDER BY e.id ASC"
            ),
            params![PROGRAM_METHOD, parent.0, host],
        )
    }

    fn find_instance(
        &self,
        course: CourseId,
        parent: CourseId,
        host: Option<&str>,
    ) -> Result<Option<EnrolInstance>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ENROL_COLUMNS} FROM enrol e
                     WHERE e.enrol = ?1 AND e.courseid = ?2 AND e.customint1 = ?3
                       AND e.customchar1 IS ?4
                     LIMIT 1"
                ),
                params![PROGRAM_METHOD, course.0, parent.0, host],
                parse_instance_row,
            )
            .optional()
            .with_context(|| format!("failed to look up program instance {parent} -> {course}"))
    }

    fn course_has_program(&self, course: CourseId) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM enrol WHERE enrol = ?1 AND courseid = ?2 LIMIT 1",
                params![PROGRAM_METHOD, course.0],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("failed to check program instances of course {course}"))?
            .is_some();
        Ok(exists)
    }

    fn instances_for_user(&self, course: CourseId, user: UserId) -> Result<Vec<EnrolInstance>> {
        self.query_instances(
            &format!(
                "SELECT {ENROL_COLUMNS} FROM enrol e
                 JOIN course c ON c.id = e.courseid
                 JOIN user_enrolments ue ON ue.enrolid = e.id
                 WHERE e.enrol = ?1 AND c.id = ?2 AND ue.userid = ?3
                 ORDER BY e.id ASC"
            ),
            params![PROGRAM_METHOD, course.0, user.0],
        )
    }

    fn course_enrolled_users(&self, course: CourseId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT ue.userid
             FROM user_enrolments ue
             JOIN enrol e ON ue.enrolid = e.id
             WHERE e.courseid = ?1
             ORDER BY ue.userid ASC",
        )?;
        let rows = stmt.query_map(params![course.0], |row| row.get(0).map(UserId))?;
        collect_rows(rows)
    }

    fn is_enrolled(&self, user: UserId, instance: InstanceId) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM user_enrolments WHERE userid = ?1 AND enrolid = ?2 LIMIT 1",
                params![user.0, instance.0],
                |_| Ok(()),
            )
            .optional()
            .context("failed to query user_enrolments")?
            .is_some();
        Ok(exists)
    }

    fn user_roles_to_link(&self, course: CourseId, user: UserId) -> Result<Vec<RoleAssignment>> {
        let context = self.course_context(course)?;
        let mut stmt = self.conn.prepare(
            "SELECT ra.id, ra.roleid, ra.userid, ra.contextid, ra.component, ra.itemid
             FROM role_assignments ra
             WHERE ra.contextid = ?1 AND ra.userid = ?2 AND ra.component <> ?3
             ORDER BY ra.id ASC",
        )?;
        let rows = stmt.query_map(
            params![context.0, user.0, PROGRAM_COMPONENT],
            parse_role_assignment_row,
        )?;
        collect_rows(rows)
    }
}

impl EnrolmentPort for SqliteProgramStore {
    fn method_enabled(&self, method: &str) -> Result<bool> {
        let enabled: Option<i64> = self
            .conn
            .query_row(
                "SELECT enabled FROM enrol_methods WHERE name = ?1",
                params![method],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to query enrol method {method}"))?;
        Ok(enabled == Some(1))
    }

    fn enrol_user(
        &self,
        instance: &EnrolInstance,
        user: UserId,
        role: Option<RoleId>,
    ) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start enrolment transaction")?;

        let now = now_utc().unix_timestamp();
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO user_enrolments(enrolid, userid, status, timecreated, timemodified)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![instance.id.0, user.0, now],
            )
            .with_context(|| format!("failed to enrol user {user} into instance {}", instance.id))?;

        if let Some(role) = role {
            let context = self.course_context(instance.course_id)?;
            self.assign_role(role, user, context, &RoleOwner::for_instance(instance))?;
        }

        tx.commit().context("failed to commit enrolment")?;
        debug!(instance = %instance.id, user = %user, new = inserted > 0, "user_enrolments written");
        Ok(())
    }

    fn unenrol_user(&self, instance: &EnrolInstance, user: UserId) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start unenrolment transaction")?;

        tx.execute(
            "DELETE FROM user_enrolments WHERE enrolid = ?1 AND userid = ?2",
            params![instance.id.0, user.0],
        )
        .with_context(|| format!("failed to unenrol user {user} from instance {}", instance.id))?;

        let owner = RoleOwner::for_instance(instance);
        if owner.is_manual() {
            let context = self.course_context(instance.course_id)?;
            tx.execute(
                "DELETE FROM role_assignments WHERE userid = ?1 AND contextid = ?2 AND component = ''",
                params![user.0, context.0],
            )
            .context("failed to remove manual role assignments")?;
        } else {
            tx.execute(
                "DELETE FROM role_assignments WHERE userid = ?1 AND component = ?2 AND itemid = ?3",
                params![user.0, owner.component, owner.item_id],
            )
            .context("failed to remove instance role assignments")?;
        }

        tx.commit().context("failed to commit unenrolment")?;
        Ok(())
    }

    fn instance_users(&self, instance: InstanceId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT userid FROM user_enrolments WHERE enrolid = ?1 ORDER BY userid ASC",
        )?;
        let rows = stmt.query_map(params![instance.0], |row| row.get(0).map(UserId))?;
        collect_rows(rows)
    }
}

impl RoleDirectory for SqliteProgramStore {
    fn role_by_id(&self, id: RoleId) -> Result<Option<Role>> {
        self.conn
            .query_row(
                "SELECT id, shortname FROM role WHERE id = ?1",
                params![id.0],
                parse_role_row,
            )
            .optional()
            .with_context(|| format!("failed to load role {id}"))
    }

    fn role_by_shortname(&self, shortname: &str) -> Result<Option<Role>> {
        self.conn
            .query_row(
                "SELECT id, shortname FROM role WHERE shortname = ?1",
                params![shortname],
                parse_role_row,
            )
            .optional()
            .with_context(|| format!("failed to load role {shortname}"))
    }
}

impl RoleAssignmentPort for SqliteProgramStore {
    fn assign_role(
        &self,
        role: RoleId,
        user: UserId,
        context: ContextId,
        owner: &RoleOwner,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO role_assignments(roleid, contextid, userid, component, itemid, timemodified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    role.0,
                    context.0,
                    user.0,
                    owner.component,
                    owner.item_id,
                    now_utc().unix_timestamp(),
                ],
            )
            .with_context(|| format!("failed to assign role {role} to user {user}"))?;
        Ok(())
    }
}

impl ContextResolver for SqliteProgramStore {
    fn course_context(&self, course: CourseId) -> Result<ContextId> {
        self.conn
            .query_row(
                "SELECT id FROM context WHERE contextlevel = ?1 AND instanceid = ?2",
                params![CONTEXT_COURSE, course.0],
                |row| row.get(0).map(ContextId),
            )
            .optional()
            .with_context(|| format!("failed to resolve context of course {course}"))?
            .ok_or_else(|| anyhow!("no context for course {course}"))
    }
}

impl Authorization for SqliteProgramStore {
    fn has_capability(&self, capability: &str, context: ContextId) -> Result<bool> {
        let Some(actor) = self.actor else {
            return Ok(true);
        };
        let system = self.system_context()?;
        let granted = self
            .conn
            .query_row(
                "SELECT 1
                 FROM role_assignments ra
                 JOIN role_capabilities rc ON rc.roleid = ra.roleid
                 WHERE ra.userid = ?1 AND ra.contextid IN (?2, ?3) AND rc.capability = ?4
                 LIMIT 1",
                params![actor.0, context.0, system.0, capability],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("failed to check capability {capability}"))?
            .is_some();
        Ok(granted)
    }
}

impl UserDirectory for SqliteProgramStore {
    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, username, email FROM users WHERE id = ?1 AND deleted = 0",
                params![id.0],
                |row| {
                    Ok(User {
                        id: UserId(row.get(0)?),
                        username: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("failed to load user {id}"))
    }
}

impl CourseLinkDirectory for SqliteProgramStore {
    fn course_link(&self, course: CourseId) -> Result<Option<CourseLink>> {
        self.conn
            .query_row(
                "SELECT courseid, courseidlink, platform FROM course_links WHERE courseid = ?1",
                params![course.0],
                |row| {
                    Ok(CourseLink {
                        course_id: CourseId(row.get(0)?),
                        course_id_link: row.get(1)?,
                        platform: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("failed to load course link of {course}"))
    }
}

impl HostDispatcher for SqliteProgramStore {
    fn set_event(&self, record: &HostEventRecord) -> Result<()> {
        let payload = serde_json::to_string(record).context("failed to serialize host event")?;
        self.conn
            .execute(
                "INSERT INTO host_events(event_id, event_type, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.event_id.to_string(),
                    record.event_type.as_str(),
                    payload,
                    now_utc().unix_timestamp(),
                ],
            )
            .context("failed to append host event")?;
        Ok(())
    }
}

fn parse_instance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EnrolInstance> {
    let status_code: i64 = row.get(3)?;
    let status = InstanceStatus::from_code(status_code).ok_or_else(|| {
        to_sql_error(ProgramError::Storage(format!(
            "invalid enrol status: {status_code}"
        )))
    })?;

    Ok(EnrolInstance {
        id: InstanceId(row.get(0)?),
        method: row.get(1)?,
        course_id: CourseId(row.get(2)?),
        status,
        parent_course_id: row.get::<_, Option<i64>>(4)?.map(CourseId),
        host: row.get(5)?,
        time_created: from_unix_seconds(row.get(6)?).map_err(to_sql_error)?,
        time_modified: from_unix_seconds(row.get(7)?).map_err(to_sql_error)?,
    })
}

fn parse_role_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: RoleId(row.get(0)?),
        shortname: row.get(1)?,
    })
}

fn parse_role_assignment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoleAssignment> {
    Ok(RoleAssignment {
        id: row.get(0)?,
        role_id: RoleId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        context_id: ContextId(row.get(3)?),
        component: row.get(4)?,
        item_id: row.get(5)?,
    })
}

#[allow(clippy::needless_pass_by_value)]
fn to_sql_error(err: ProgramError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Integer,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}

fn collect_rows<T>(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

/// Parses a host event type stored in the outbox.
pub fn parse_host_event_type(raw: &str) -> Result<HostEventType> {
    HostEventType::parse(raw).ok_or_else(|| anyhow!("unknown host event type: {raw}"))
}
