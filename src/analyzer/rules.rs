//! Data tables driving project analysis.
//!
//! Every heuristic lives here as an ordered table so it can be read, tested
//! and extended without touching the analysis flow.

use crate::types::{ProjectFile, ProjectType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Language (or file type) to file extension.
pub const EXTENSIONS: &[(&str, &str)] = &[
    ("javascript", "js"),
    ("jsx", "jsx"),
    ("typescript", "ts"),
    ("tsx", "tsx"),
    ("python", "py"),
    ("html", "html"),
    ("css", "css"),
    ("java", "java"),
    ("cpp", "cpp"),
    ("php", "php"),
    ("sql", "sql"),
    ("json", "json"),
    ("markdown", "md"),
    ("text", "txt"),
    ("yaml", "yml"),
    ("xml", "xml"),
    ("csv", "csv"),
];

pub const FALLBACK_EXTENSION: &str = "txt";

/// File-name suffix to file type; anything else keeps the block language.
pub const FILE_TYPES: &[(&str, &str)] = &[
    (".html", "html"),
    (".css", "css"),
    (".js", "javascript"),
    (".jsx", "javascript"),
    (".ts", "javascript"),
    (".tsx", "javascript"),
    (".py", "python"),
    (".json", "json"),
    (".md", "markdown"),
];

/// In-code filename annotations, tried in order.
pub static FILENAME_COMMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)//\s*File:\s*([\w\-./]+)",
        r"(?i)#\s*File:\s*([\w\-./]+)",
        r"(?i)/\*\s*File:\s*([\w\-./]+)",
        r"(?i)<!--\s*File:\s*([\w\-./]+)",
        r"(?i)@file\s+([\w\-./]+)",
        r"(?i)@filename\s+([\w\-./]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Module paths that may name the file itself.
pub static FILENAME_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"from\s+['"]([\w\-./]+)['"]"#,
        r#"import\s+['"]([\w\-./]+)['"]"#,
        r#"require\(['"]([\w\-./]+)['"]\)"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

pub const ENTRY_POINTS: &[&str] = &["index.html", "app.js", "index.js", "main.py", "app.py"];

/// Substrings that mark a file as project configuration.
pub const CONFIG_MARKERS: &[&str] = &["package.json", "requirements.txt", ".gitignore"];

/// Minimum file count per project type; unlisted types need one file.
pub const MIN_FILES: &[(&str, usize)] = &[
    ("web", 2),
    ("react", 2),
    ("node", 1),
    ("python", 1),
    ("flask", 2),
    ("django", 3),
];

/// Scaffolding each project type is expected to ship.
pub const REQUIRED_FILES: &[(&str, &[&str])] = &[
    ("web", &["index.html", "style.css", "app.js"]),
    ("react", &["package.json", "src/App.js", "src/index.js", "public/index.html"]),
    ("node", &["package.json", "index.js", ".gitignore"]),
    ("python", &["requirements.txt", "main.py", ".gitignore"]),
    ("flask", &["requirements.txt", "app.py", "templates/", "static/"]),
];

/// Standard-library modules that are never reported as Python dependencies.
pub const PYTHON_STDLIB: &[&str] = &[
    "__future__", "abc", "argparse", "asyncio", "base64", "collections", "copy", "csv",
    "dataclasses", "datetime", "enum", "functools", "glob", "hashlib", "http", "io",
    "itertools", "json", "logging", "math", "os", "pathlib", "pickle", "random", "re",
    "shutil", "socket", "sqlite3", "string", "subprocess", "sys", "tempfile", "threading",
    "time", "typing", "unittest", "urllib", "uuid",
];

/// Root packages of the Java platform.
pub const JAVA_PLATFORM: &[&str] = &["java.", "javax."];

pub fn extension_for(language: &str) -> Option<&'static str> {
    lookup(EXTENSIONS, language)
}

pub fn file_type_for(name: &str, language: &str) -> String {
    FILE_TYPES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, file_type)| file_type.to_string())
        .unwrap_or_else(|| language.to_string())
}

pub fn min_files(project_type: &ProjectType) -> usize {
    lookup(MIN_FILES, project_type.as_str()).unwrap_or(1)
}

pub fn required_files(project_type: &ProjectType) -> &'static [&'static str] {
    lookup(REQUIRED_FILES, project_type.as_str()).unwrap_or(&[])
}

pub fn is_entry_point(name: &str) -> bool {
    ENTRY_POINTS.contains(&name)
}

pub fn is_config_file(name: &str) -> bool {
    CONFIG_MARKERS.iter().any(|marker| name.contains(marker))
}

fn lookup<T: Copy>(table: &[(&str, T)], key: &str) -> Option<T> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, value)| *value)
}

/// Everything the project-type rules look at.
pub struct TypeSignals<'a> {
    pub languages: &'a [String],
    pub files: &'a [ProjectFile],
    pub dependencies: &'a [String],
    /// Lowercased content of every message.
    pub all_text: &'a str,
}

impl TypeSignals<'_> {
    fn has_language(&self, language: &str) -> bool {
        self.languages.iter().any(|candidate| candidate == language)
    }

    fn any_file(&self, predicate: impl Fn(&ProjectFile) -> bool) -> bool {
        self.files.iter().any(predicate)
    }

    fn mentions(&self, framework: &str, code_marker: &str) -> bool {
        self.all_text.contains(framework)
            || self.dependencies.iter().any(|dep| dep == framework)
            || self.any_file(|file| file.content.contains(code_marker))
    }
}

pub type TypeRule = fn(&TypeSignals<'_>) -> Option<ProjectType>;

/// Project-type decision list. Framework signals come before plain language
/// presence; the first rule that answers wins.
pub const TYPE_RULES: &[(&str, TypeRule)] = &[
    ("react", react_rule),
    ("node", node_rule),
    ("python", python_rule),
    ("web", web_rule),
    ("first-language", first_language_rule),
];

fn react_rule(signals: &TypeSignals<'_>) -> Option<ProjectType> {
    let matched = signals.has_language("jsx")
        || signals.any_file(|file| file.name.contains(".jsx") || file.content.contains("React.create"));
    matched.then_some(ProjectType::React)
}

fn node_rule(signals: &TypeSignals<'_>) -> Option<ProjectType> {
    let matched = signals.has_language("javascript")
        && signals.any_file(|file| file.content.contains("require(") || file.content.contains("exports"));
    matched.then_some(ProjectType::Node)
}

fn python_rule(signals: &TypeSignals<'_>) -> Option<ProjectType> {
    if !signals.has_language("python") {
        return None;
    }
    if signals.mentions("flask", "Flask") {
        Some(ProjectType::Flask)
    } else if signals.mentions("django", "django") {
        Some(ProjectType::Django)
    } else {
        Some(ProjectType::Python)
    }
}

fn web_rule(signals: &TypeSignals<'_>) -> Option<ProjectType> {
    let matched = ["html", "css", "javascript"]
        .iter()
        .any(|language| signals.has_language(language));
    matched.then_some(ProjectType::Web)
}

fn first_language_rule(signals: &TypeSignals<'_>) -> Option<ProjectType> {
    signals
        .languages
        .first()
        .map(|language| ProjectType::from(language.clone()))
}

pub fn determine_project_type(signals: &TypeSignals<'_>) -> ProjectType {
    TYPE_RULES
        .iter()
        .find_map(|(_, rule)| rule(signals))
        .unwrap_or(ProjectType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn file(name: &str, language: &str, content: &str) -> ProjectFile {
        ProjectFile {
            id: "f".into(),
            name: name.into(),
            content: content.into(),
            language: language.into(),
            extension: extension_for(language).unwrap_or(FALLBACK_EXTENSION).into(),
            file_type: file_type_for(name, language),
            source: Role::Assistant,
            line_count: 1,
            char_count: content.len(),
            size_bytes: content.len(),
        }
    }

    fn project_type(languages: &[&str], files: &[ProjectFile], text: &str) -> ProjectType {
        let languages: Vec<String> = languages.iter().map(|l| l.to_string()).collect();
        determine_project_type(&TypeSignals {
            languages: &languages,
            files,
            dependencies: &[],
            all_text: text,
        })
    }

    #[test]
    fn framework_signal_beats_language_presence() {
        let files = vec![
            file("index.html", "html", "<div id=root>"),
            file("file_2.js", "javascript", "React.createElement('p')"),
        ];
        assert_eq!(project_type(&["html", "javascript"], &files, ""), ProjectType::React);
    }

    #[test]
    fn python_sub_frameworks_need_python() {
        let py = vec![file("app.py", "python", "from flask import Flask")];
        assert_eq!(project_type(&["python"], &py, ""), ProjectType::Flask);

        let js = vec![file("a.js", "javascript", "let flask = 1")];
        assert_eq!(project_type(&["javascript"], &js, "flask"), ProjectType::Web);

        let django = vec![file("views.py", "python", "x = 1")];
        assert_eq!(project_type(&["python"], &django, "a django site"), ProjectType::Django);
    }

    #[test]
    fn falls_back_to_first_language_then_unknown() {
        let rust = vec![file("file_1.txt", "rust", "fn main() {}")];
        assert_eq!(
            project_type(&["rust", "sql"], &rust, ""),
            ProjectType::Language("rust".into())
        );
        assert_eq!(project_type(&[], &[], ""), ProjectType::Unknown);
    }

    #[test]
    fn table_lookups() {
        assert_eq!(extension_for("markdown"), Some("md"));
        assert_eq!(extension_for("rust"), None);
        assert_eq!(file_type_for("App.tsx", "text"), "javascript");
        assert_eq!(file_type_for("notes", "sql"), "sql");
        assert_eq!(min_files(&ProjectType::Django), 3);
        assert_eq!(min_files(&ProjectType::Language("go".into())), 1);
        assert!(required_files(&ProjectType::Django).is_empty());
        assert!(is_config_file("backend/requirements.txt"));
    }
}
