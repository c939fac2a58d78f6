//! Command surface of the program enrolment plugin.
//!
//! Hosts embed the plugin through:
//! - [`run_cli`] for full parsed CLI execution.
//! - [`run_program_with_db`] for direct [`Command`] execution against a DB path.
//! - [`run_program`] for execution against an existing [`SqliteProgramStore`].
//!
//! Every command prints its result as pretty JSON on stdout.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use program_enrol_core::engine::InstanceFields;
use program_enrol_core::form::{form_definition, status_options};
use program_enrol_core::ports::{EnrolmentPort, InstanceRegistry, RoleDirectory};
use program_enrol_core::{
    CourseId, CourseLink, EnrolInstance, HostNotifier, InstanceForm, InstanceId, InstanceStatus,
    PluginSettings, ProgramEnrolPlugin, ProgramEvent, RawHostEvent, RoleId, User, UserId,
};
use program_enrol_store_sqlite::{parse_host_event_type, SqliteProgramStore};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str =
    "warn,progenrol=info,program_enrol_cli=info,program_enrol_core=info";

type Plugin<'a> = ProgramEnrolPlugin<'a, SqliteProgramStore>;

#[derive(Debug, Parser)]
#[command(name = "progenrol")]
#[command(about = "Program enrolment propagation CLI")]
pub struct Cli {
    #[arg(long, default_value = "./program_enrol.sqlite3")]
    db: PathBuf,

    /// JSON plugin settings; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Acting user for capability checks. Without it every capability is held.
    #[arg(long)]
    as_user: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Course {
        #[command(subcommand)]
        command: Box<CourseCommand>,
    },
    User {
        #[command(subcommand)]
        command: Box<UserCommand>,
    },
    CourseLink {
        #[command(subcommand)]
        command: Box<CourseLinkCommand>,
    },
    Method {
        #[command(subcommand)]
        command: Box<MethodCommand>,
    },
    Enrol {
        #[command(subcommand)]
        command: Box<EnrolCommand>,
    },
    Unenrol {
        #[command(subcommand)]
        command: Box<UnenrolCommand>,
    },
    Instance {
        #[command(subcommand)]
        command: Box<InstanceCommand>,
    },
    Form {
        #[command(subcommand)]
        command: Box<FormCommand>,
    },
    Event {
        #[command(subcommand)]
        command: Box<EventCommand>,
    },
    HostEvents {
        #[command(subcommand)]
        command: Box<HostEventsCommand>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CourseCommand {
    Add(CourseAddArgs),
}

#[derive(Debug, Args)]
pub struct CourseAddArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    shortname: String,
    #[arg(long)]
    fullname: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    Add(UserAddArgs),
}

#[derive(Debug, Args)]
pub struct UserAddArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
}

#[derive(Debug, Subcommand)]
pub enum CourseLinkCommand {
    Set(CourseLinkSetArgs),
}

#[derive(Debug, Args)]
pub struct CourseLinkSetArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    link: i64,
    #[arg(long)]
    platform: String,
}

#[derive(Debug, Subcommand)]
pub enum MethodCommand {
    Set(MethodSetArgs),
}

#[derive(Debug, Args)]
pub struct MethodSetArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    state: StatusArg,
}

#[derive(Debug, Subcommand)]
pub enum EnrolCommand {
    Manual(EnrolManualArgs),
}

#[derive(Debug, Args)]
pub struct EnrolManualArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    user: i64,
    /// Role shortname assigned along with the enrolment.
    #[arg(long)]
    role: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum UnenrolCommand {
    Manual(UnenrolManualArgs),
}

#[derive(Debug, Args)]
pub struct UnenrolManualArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    user: i64,
}

#[derive(Debug, Subcommand)]
pub enum InstanceCommand {
    Add(InstanceAddArgs),
    Update(InstanceUpdateArgs),
    Delete(InstanceIdArgs),
    Show(InstanceIdArgs),
    List(InstanceListArgs),
}

#[derive(Debug, Args)]
pub struct InstanceAddArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    parent: i64,
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Args)]
pub struct InstanceUpdateArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    status: StatusArg,
    #[arg(long)]
    parent: i64,
}

#[derive(Debug, Args)]
pub struct InstanceIdArgs {
    #[arg(long)]
    id: i64,
}

#[derive(Debug, Args)]
pub struct InstanceListArgs {
    #[arg(long)]
    course: i64,
}

#[derive(Debug, Subcommand)]
pub enum FormCommand {
    Show(FormShowArgs),
    Submit(FormSubmitArgs),
}

#[derive(Debug, Args)]
pub struct FormShowArgs {
    /// Instance being edited; omit for the creation form.
    #[arg(long)]
    id: Option<i64>,
}

#[derive(Debug, Args)]
pub struct FormSubmitArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    id: Option<i64>,
    #[arg(long, default_value = "enabled")]
    status: StatusArg,
    /// Raw parent course id, validated like the edit form field.
    #[arg(long, default_value = "")]
    customint1: String,
    #[arg(long)]
    customchar1: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum EventCommand {
    Dispatch(EventDispatchArgs),
}

#[derive(Debug, Args)]
pub struct EventDispatchArgs {
    /// Raw host event: `eventname`, `relateduserid`, `courseid`, `objectid`.
    #[arg(long)]
    json: String,
}

#[derive(Debug, Subcommand)]
pub enum HostEventsCommand {
    List(HostEventsListArgs),
}

#[derive(Debug, Args)]
pub struct HostEventsListArgs {
    #[arg(long)]
    event_type: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Enabled,
    Disabled,
}

impl From<StatusArg> for InstanceStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Enabled => Self::Enabled,
            StatusArg::Disabled => Self::Disabled,
        }
    }
}

#[derive(Debug, Serialize)]
struct InstanceView {
    name: String,
    #[serde(flatten)]
    instance: EnrolInstance,
}

/// Executes the parsed top-level CLI command graph.
///
/// # Errors
/// Returns an error when settings cannot be loaded, the store cannot be opened
/// or migrated, or the command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    run_program_with_db(&cli.db, cli.as_user.map(UserId), &settings, cli.command)
}

/// Executes a parsed command using the provided `SQLite` DB path.
///
/// # Errors
/// Returns an error when store open/migrate fails or the requested command fails.
pub fn run_program_with_db(
    db_path: &Path,
    actor: Option<UserId>,
    settings: &PluginSettings,
    command: Command,
) -> Result<()> {
    let store = SqliteProgramStore::open(db_path)?.with_actor(actor);
    store.migrate()?;
    run_program(command, &store, settings)
}

/// Executes a parsed command against an existing store handle.
///
/// Host mirroring is resolved once here, before any command runs.
///
/// # Errors
/// Returns an error when the settings are invalid, a capability is missing,
/// or a store operation fails.
pub fn run_program(
    command: Command,
    store: &SqliteProgramStore,
    settings: &PluginSettings,
) -> Result<()> {
    settings.validate()?;
    let mirroring = settings.host_integration.resolve();
    debug!(mirroring = mirroring.is_enabled(), "host mirroring resolved");
    let notifier = mirroring
        .is_enabled()
        .then(|| HostNotifier::new(store, store, store));
    let plugin = ProgramEnrolPlugin::load(store, settings, notifier)?;

    match command {
        Command::Course { command } => run_course(*command, store),
        Command::User { command } => run_user(*command, store),
        Command::CourseLink { command } => run_course_link(*command, store),
        Command::Method { command } => run_method(*command, store),
        Command::Enrol { command } => run_enrol(*command, store, &plugin),
        Command::Unenrol { command } => run_unenrol(*command, store, &plugin),
        Command::Instance { command } => run_instance(*command, store, &plugin),
        Command::Form { command } => run_form(*command, store, &plugin),
        Command::Event { command } => run_event(*command, &plugin),
        Command::HostEvents { command } => run_host_events(*command, store),
    }
}

/// Loads plugin settings from a JSON file, or the defaults without one.
///
/// # Errors
/// Returns an error when the file cannot be read or holds invalid settings.
pub fn load_settings(path: Option<&Path>) -> Result<PluginSettings> {
    let Some(path) = path else {
        return Ok(PluginSettings::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("settings file {} is not valid JSON", path.display()))?;
    Ok(PluginSettings::from_json(&value)?)
}

fn run_course(command: CourseCommand, store: &SqliteProgramStore) -> Result<()> {
    match command {
        CourseCommand::Add(args) => {
            let fullname = args.fullname.unwrap_or_else(|| args.shortname.clone());
            let context = store.add_course(CourseId(args.id), &args.shortname, &fullname)?;
            print_json(&json!({
                "course_id": args.id,
                "shortname": args.shortname,
                "fullname": fullname,
                "context_id": context,
            }))
        }
    }
}

fn run_user(command: UserCommand, store: &SqliteProgramStore) -> Result<()> {
    match command {
        UserCommand::Add(args) => {
            let user = User {
                id: UserId(args.id),
                username: args.username,
                email: args.email,
            };
            store.add_user(&user)?;
            print_json(&user)
        }
    }
}

fn run_course_link(command: CourseLinkCommand, store: &SqliteProgramStore) -> Result<()> {
    match command {
        CourseLinkCommand::Set(args) => {
            let link = CourseLink {
                course_id: CourseId(args.course),
                course_id_link: args.link,
                platform: args.platform,
            };
            store.set_course_link(&link)?;
            print_json(&link)
        }
    }
}

fn run_method(command: MethodCommand, store: &SqliteProgramStore) -> Result<()> {
    match command {
        MethodCommand::Set(args) => {
            let enabled = matches!(args.state, StatusArg::Enabled);
            store.set_method_enabled(&args.name, enabled)?;
            print_json(&json!({
                "method": args.name,
                "enabled": store.method_enabled(&args.name)?,
            }))
        }
    }
}

fn run_enrol(command: EnrolCommand, store: &SqliteProgramStore, plugin: &Plugin<'_>) -> Result<()> {
    match command {
        EnrolCommand::Manual(args) => {
            let course = CourseId(args.course);
            let user = UserId(args.user);
            let role = args
                .role
                .as_deref()
                .map(|shortname| role_by_shortname(store, shortname))
                .transpose()?;

            let manual = store.manual_instance(course)?;
            store.enrol_user(&manual, user, role)?;
            info!(course = %course, user = %user, "manual enrolment written");

            let mut propagation = vec![plugin.handle(&ProgramEvent::MemberAdded {
                user: Some(user),
                course: Some(course),
            })?];
            if let Some(role) = role {
                propagation.push(plugin.handle(&ProgramEvent::RoleAssigned {
                    user: Some(user),
                    course: Some(course),
                    role,
                })?);
            }

            print_json(&json!({
                "instance": manual.id,
                "user": user,
                "role": role,
                "propagation": propagation,
            }))
        }
    }
}

fn run_unenrol(
    command: UnenrolCommand,
    store: &SqliteProgramStore,
    plugin: &Plugin<'_>,
) -> Result<()> {
    match command {
        UnenrolCommand::Manual(args) => {
            let course = CourseId(args.course);
            let user = UserId(args.user);
            let manual = store.manual_instance(course)?;
            store.unenrol_user(&manual, user)?;
            info!(course = %course, user = %user, "manual enrolment removed");

            let propagation = plugin.handle(&ProgramEvent::MemberRemoved {
                user: Some(user),
                course: Some(course),
            })?;
            print_json(&json!({
                "instance": manual.id,
                "user": user,
                "propagation": propagation,
            }))
        }
    }
}

fn run_instance(
    command: InstanceCommand,
    store: &SqliteProgramStore,
    plugin: &Plugin<'_>,
) -> Result<()> {
    match command {
        InstanceCommand::Add(args) => {
            let course = CourseId(args.course);
            if !plugin.can_add_instance(course)? {
                return Err(permission_denied("add a program instance to", course));
            }
            let instance = plugin.add_instance(
                course,
                &InstanceFields {
                    parent_course_id: Some(CourseId(args.parent)),
                    host: args.host,
                },
            )?;
            print_json(&instance_view(plugin, instance))
        }
        InstanceCommand::Update(args) => {
            let instance = program_instance(store, InstanceId(args.id))?;
            if !plugin.can_hide_show_instance(&instance)? {
                return Err(permission_denied("update instances of", instance.course_id));
            }
            let changed =
                plugin.update_instance(&instance, args.status.into(), CourseId(args.parent))?;
            print_json(&json!({ "instance": instance.id, "changed": changed }))
        }
        InstanceCommand::Delete(args) => {
            let instance = program_instance(store, InstanceId(args.id))?;
            if !plugin.can_delete_instance(&instance)? {
                return Err(permission_denied("delete instances of", instance.course_id));
            }
            let report = plugin.delete_instance(&instance)?;
            print_json(&report)
        }
        InstanceCommand::Show(args) => {
            let instance = program_instance(store, InstanceId(args.id))?;
            let users = store.instance_users(instance.id)?;
            print_json(&json!({
                "instance": instance_view(plugin, instance),
                "users": users,
            }))
        }
        InstanceCommand::List(args) => {
            let views: Vec<InstanceView> = store
                .list_instances(CourseId(args.course))?
                .into_iter()
                .map(|instance| instance_view(plugin, instance))
                .collect();
            print_json(&views)
        }
    }
}

fn run_form(command: FormCommand, store: &SqliteProgramStore, plugin: &Plugin<'_>) -> Result<()> {
    match command {
        FormCommand::Show(args) => {
            let instance = match args.id {
                Some(id) => Some(program_instance(store, InstanceId(id))?),
                None => None,
            };
            print_json(&json!({
                "use_standard_editing_ui": Plugin::use_standard_editing_ui(),
                "allow_unenrol_user": Plugin::allow_unenrol_user(),
                "status_options": status_options(),
                "fields": form_definition(instance.as_ref()),
            }))
        }
        FormCommand::Submit(args) => {
            let course = CourseId(args.course);
            if !plugin.can_add_instance(course)? {
                return Err(permission_denied("configure program instances of", course));
            }
            let form = InstanceForm {
                id: args.id.map(InstanceId),
                status: args.status.into(),
                customint1: args.customint1,
                customchar1: args.customchar1,
            };
            let outcome = plugin.submit_instance_form(course, &form)?;
            print_json(&outcome)
        }
    }
}

fn run_event(command: EventCommand, plugin: &Plugin<'_>) -> Result<()> {
    match command {
        EventCommand::Dispatch(args) => {
            let raw: RawHostEvent =
                serde_json::from_str(&args.json).context("invalid --json event payload")?;
            let Some(event) = ProgramEvent::from_raw(&raw)? else {
                debug!(eventname = %raw.eventname, "event not handled by the program plugin");
                return print_json(&json!({
                    "status": "ignored",
                    "eventname": raw.eventname,
                }));
            };
            let propagation = plugin.handle(&event)?;
            print_json(&json!({ "event": event, "propagation": propagation }))
        }
    }
}

fn run_host_events(command: HostEventsCommand, store: &SqliteProgramStore) -> Result<()> {
    match command {
        HostEventsCommand::List(args) => {
            let event_type = args
                .event_type
                .as_deref()
                .map(parse_host_event_type)
                .transpose()?;
            let mut events = store.host_events()?;
            if let Some(event_type) = event_type {
                events.retain(|event| event.event_type == event_type);
            }
            if let Some(limit) = args.limit {
                events.truncate(limit);
            }
            print_json(&events)
        }
    }
}

fn instance_view(plugin: &Plugin<'_>, instance: EnrolInstance) -> InstanceView {
    InstanceView {
        name: plugin.instance_name(Some(&instance)),
        instance,
    }
}

fn program_instance(store: &SqliteProgramStore, id: InstanceId) -> Result<EnrolInstance> {
    store
        .get_instance(id)?
        .filter(EnrolInstance::is_program)
        .ok_or_else(|| anyhow!("program instance not found: {id}"))
}

fn role_by_shortname(store: &SqliteProgramStore, shortname: &str) -> Result<RoleId> {
    store
        .role_by_shortname(shortname)?
        .map(|role| role.id)
        .ok_or_else(|| anyhow!("unknown role shortname: {shortname}"))
}

fn permission_denied(action: &str, course: CourseId) -> anyhow::Error {
    anyhow!("permission denied: acting user may not {action} course {course}")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use program_enrol_core::ports::{ContextResolver, RoleAssignmentPort};
    use program_enrol_core::{HostEventType, HostIntegration, PROGRAM_COMPONENT};
    use std::fs;
    use ulid::Ulid;

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err:#}"),
        }
    }

    fn temp_db(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("progenrol-{label}-{}.sqlite3", Ulid::new()))
    }

    fn parse(args: &[&str]) -> Cli {
        match Cli::try_parse_from(args) {
            Ok(value) => value,
            Err(err) => panic!("failed to parse cli args {args:?}: {err}"),
        }
    }

    fn command(args: &[&str]) -> Command {
        let mut full = vec!["progenrol"];
        full.extend_from_slice(args);
        parse(&full).command
    }

    fn seed(db_path: &Path, settings: &PluginSettings) {
        for args in [
            &["course", "add", "--id", "10", "--shortname", "program"][..],
            &["course", "add", "--id", "20", "--shortname", "child"][..],
            &[
                "user",
                "add",
                "--id",
                "101",
                "--username",
                "alice",
                "--email",
                "alice@example.org",
            ][..],
            &[
                "user",
                "add",
                "--id",
                "102",
                "--username",
                "bob",
                "--email",
                "bob@example.org",
            ][..],
            &[
                "course-link",
                "set",
                "--course",
                "20",
                "--link",
                "920",
                "--platform",
                "academie",
            ][..],
        ] {
            must(run_program_with_db(db_path, None, settings, command(args)));
        }
    }

    #[test]
    fn global_flags_parse_with_defaults() {
        let cli = parse(&["progenrol", "instance", "list", "--course", "20"]);
        assert_eq!(cli.db, PathBuf::from("./program_enrol.sqlite3"));
        assert_eq!(cli.config, None);
        assert_eq!(cli.as_user, None);

        let cli = parse(&[
            "progenrol",
            "--db",
            "/tmp/x.sqlite3",
            "--as-user",
            "7",
            "host-events",
            "list",
        ]);
        assert_eq!(cli.as_user, Some(7));
        assert!(matches!(cli.command, Command::HostEvents { .. }));

        assert!(Cli::try_parse_from(["progenrol", "instance", "update", "--id", "1"]).is_err());
    }

    #[test]
    fn settings_file_is_loaded_and_validated() {
        assert_eq!(must(load_settings(None)), PluginSettings::default());

        let path = std::env::temp_dir().join(format!("progenrol-settings-{}.json", Ulid::new()));
        must(fs::write(&path, r#"{"host_integration":{"mode":"enabled"}}"#).map_err(Into::into));
        let settings = must(load_settings(Some(&path)));
        assert_eq!(settings.host_integration, HostIntegration::Enabled);
        assert_eq!(settings.substitution.from, "editingteacher");

        must(
            fs::write(
                &path,
                r#"{"substitution":{"from":"teacher","to":"teacher"}}"#,
            )
            .map_err(Into::into),
        );
        assert!(load_settings(Some(&path)).is_err());

        must(fs::write(&path, "not json").map_err(Into::into));
        assert!(load_settings(Some(&path)).is_err());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn embed_api_propagates_manual_enrolments() {
        let db_path = temp_db("embed");
        let settings = PluginSettings {
            host_integration: HostIntegration::Enabled,
            ..PluginSettings::default()
        };
        seed(&db_path, &settings);

        must(run_program_with_db(
            &db_path,
            None,
            &settings,
            command(&["enrol", "manual", "--course", "10", "--user", "101", "--role", "student"]),
        ));
        must(run_program_with_db(
            &db_path,
            None,
            &settings,
            command(&["instance", "add", "--course", "20", "--parent", "10"]),
        ));

        let store = must(SqliteProgramStore::open(&db_path));
        must(store.migrate());
        must(run_program(
            command(&[
                "enrol",
                "manual",
                "--course",
                "10",
                "--user",
                "102",
                "--role",
                "editingteacher",
            ]),
            &store,
            &settings,
        ));

        let instance = match must(store.find_instance(CourseId(20), CourseId(10), None)) {
            Some(value) => value,
            None => panic!("program instance missing"),
        };
        assert_eq!(
            must(store.instance_users(instance.id)),
            vec![UserId(101), UserId(102)]
        );
        let teacher_roles = must(store.user_role_assignments(UserId(102), CourseId(20)));
        assert_eq!(teacher_roles.len(), 1);
        assert_eq!(teacher_roles[0].role_id, RoleId(4));
        assert_eq!(teacher_roles[0].component, PROGRAM_COMPONENT);

        let events = must(store.host_events());
        assert!(events
            .iter()
            .all(|event| event.event_type == HostEventType::AddProgramMember));
        assert!(events
            .iter()
            .any(|event| event.role_name.as_deref() == Some("teacher")));

        drop(store);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn acting_user_without_capability_is_refused() {
        let db_path = temp_db("caps");
        let settings = PluginSettings::default();
        seed(&db_path, &settings);

        let denied = run_program_with_db(
            &db_path,
            Some(UserId(101)),
            &settings,
            command(&["instance", "add", "--course", "20", "--parent", "10"]),
        );
        assert!(denied.is_err());

        let store = must(SqliteProgramStore::open(&db_path));
        let context = must(store.course_context(CourseId(20)));
        must(store.assign_role(
            RoleId(3),
            UserId(101),
            context,
            &program_enrol_core::RoleOwner::manual(),
        ));
        drop(store);

        must(run_program_with_db(
            &db_path,
            Some(UserId(101)),
            &settings,
            command(&["instance", "add", "--course", "20", "--parent", "10"]),
        ));

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn unknown_role_and_missing_instance_are_errors() {
        let db_path = temp_db("errors");
        let settings = PluginSettings::default();
        seed(&db_path, &settings);

        let unknown_role = run_program_with_db(
            &db_path,
            None,
            &settings,
            command(&["enrol", "manual", "--course", "10", "--user", "101", "--role", "nope"]),
        );
        assert!(unknown_role.is_err());

        let missing = run_program_with_db(
            &db_path,
            None,
            &settings,
            command(&["instance", "show", "--id", "999"]),
        );
        assert!(missing.is_err());

        let bad_event = run_program_with_db(
            &db_path,
            None,
            &settings,
            command(&["event", "dispatch", "--json", "{\"eventname\": 5}"]),
        );
        assert!(bad_event.is_err());

        let _ = fs::remove_file(&db_path);
    }
}
