//! Localized strings (`en` pack).

const STRINGS: &[(&str, &str)] = &[
    ("assignrole", "Assigner role"),
    ("program", "Programme"),
    ("parentcourseid", "ID du programme"),
    ("pluginname", "Programme"),
    ("pluginname_desc", "Programme enrol plugin."),
    ("status", "Active"),
    ("program:config", "Configure program instances"),
    ("program:unenrol", "Unenrol suspended users"),
    ("required", "Required"),
    ("invalidcourseid", "Invalid course ID"),
    ("instanceexists", "This programme is already linked to the course"),
    ("yes", "Yes"),
    ("no", "No"),
];

/// Looks up a string; unknown keys render as `[[key]]`.
#[must_use]
pub fn get_string(key: &str) -> String {
    STRINGS
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map_or_else(|| format!("[[{key}]]"), |(_, value)| (*value).to_string())
}
