//! Archive assembly: a virtual file tree for a detected project.
//!
//! Every path is rooted under `<project name>/`. Given identical inputs and
//! an explicit `generated_at`, the produced tree is byte-identical.

pub mod package;
pub mod templates;

use crate::analyzer::naming::{NameAllocator, DEFAULT_PROJECT_NAME};
use crate::analyzer::structure::project_paths;
use crate::error::Result;
use crate::export::{export_chat, ExportFormat, ExportOptions};
use crate::types::{Chat, ProjectAnalysis, ProjectType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::debug;

pub const CONTEXT_FILE: &str = ".deepseek-context.json";
pub const README_FILE: &str = "README.md";
pub const METADATA_FILE: &str = "metadata.json";
const GITIGNORE_FILE: &str = ".gitignore";

const GENERATOR: &str = "DeepSeek Manager";
const SOURCE: &str = "DeepSeek Chat";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Overrides the analysis' suggested name.
    pub project_name: Option<String>,
    pub include_chat_context: bool,
    pub generate_configs: bool,
    /// Whether extracted dependencies are written into generated configs.
    pub include_dependencies: bool,
    pub flatten_structure: bool,
    /// Recorded export time; the current time when unset.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            project_name: None,
            include_chat_context: true,
            generate_configs: true,
            include_dependencies: true,
            flatten_structure: false,
            generated_at: None,
        }
    }
}

/// Relative path to content, ordered by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    root: String,
    entries: BTreeMap<String, Vec<u8>>,
}

impl Archive {
    fn new(root: String) -> Self {
        Self {
            root,
            entries: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_slice()))
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Full path of a file relative to the project root.
    pub fn path_of(&self, relative: &str) -> String {
        format!("{}/{}", self.root, relative)
    }

    pub fn to_zip_bytes(&self) -> Result<Vec<u8>> {
        Ok(package::write_zip(self, Cursor::new(Vec::new()))?.into_inner())
    }

    /// Add a generated file unless a project file already occupies the path.
    fn insert_generated(&mut self, relative: &str, content: impl Into<Vec<u8>>) {
        let path = self.path_of(relative);
        if self.entries.contains_key(&path) {
            debug!(%path, "project file already present, skipping generated file");
            return;
        }
        self.entries.insert(path, content.into());
    }
}

/// Traceability record written to [`CONTEXT_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub source: String,
    pub conversation_id: String,
    pub exported: DateTime<Utc>,
    pub project_type: ProjectType,
    pub analysis: ContextAnalysis,
    pub original_chat: OriginalChat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextAnalysis {
    pub confidence: u8,
    pub languages: Vec<String>,
    pub dependencies: Vec<String>,
    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalChat {
    pub title: String,
    pub message_count: usize,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveMetadata<'a> {
    generator: &'static str,
    version: &'static str,
    export_date: DateTime<Utc>,
    project: ProjectFacts<'a>,
    source: SourceFacts<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFacts<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    project_type: &'a ProjectType,
    file_count: usize,
    languages: &'a [String],
    dependencies: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceFacts<'a> {
    chat_id: &'a str,
    title: &'a str,
    url: &'a str,
    message_count: usize,
}

pub fn create_project_archive(
    chat: &Chat,
    analysis: &ProjectAnalysis,
    options: &ArchiveOptions,
) -> Result<Archive> {
    let project_name = sanitize_project_name(
        options
            .project_name
            .as_deref()
            .unwrap_or(&analysis.suggested_name),
    );
    let generated_at = options.generated_at.unwrap_or_else(Utc::now);
    let mut archive = Archive::new(project_name.clone());

    let relatives = project_paths(
        &analysis.files,
        &analysis.project_type,
        options.flatten_structure,
    );
    for (file, relative) in analysis.files.iter().zip(relatives) {
        let path = archive.path_of(&relative);
        archive.entries.insert(path, file.content.clone().into_bytes());
    }

    if options.generate_configs {
        let dependencies: &[String] = if options.include_dependencies {
            &analysis.dependencies
        } else {
            &[]
        };
        for (name, content) in
            templates::config_files(&analysis.project_type, &project_name, dependencies)?
        {
            archive.insert_generated(&name, content);
        }
        if !analysis
            .files
            .iter()
            .any(|file| file.name.contains(GITIGNORE_FILE))
        {
            archive.insert_generated(GITIGNORE_FILE, templates::gitignore(&analysis.project_type));
        }
    }

    if options.include_chat_context {
        let context = chat_context(chat, analysis, generated_at);
        archive.insert_generated(CONTEXT_FILE, serde_json::to_string_pretty(&context)?);
    }

    archive.insert_generated(README_FILE, readme(chat, analysis, &project_name, generated_at));

    let metadata = ArchiveMetadata {
        generator: GENERATOR,
        version: VERSION,
        export_date: generated_at,
        project: ProjectFacts {
            name: &project_name,
            project_type: &analysis.project_type,
            file_count: analysis.files.len(),
            languages: &analysis.languages,
            dependencies: &analysis.dependencies,
        },
        source: SourceFacts {
            chat_id: &chat.id,
            title: &chat.title,
            url: &chat.url,
            message_count: chat.messages.len(),
        },
    };
    archive.insert_generated(METADATA_FILE, serde_json::to_string_pretty(&metadata)?);

    debug!(
        root = %archive.root,
        entries = archive.len(),
        flatten = options.flatten_structure,
        "assembled project archive"
    );
    Ok(archive)
}

pub fn chat_context(
    chat: &Chat,
    analysis: &ProjectAnalysis,
    exported: DateTime<Utc>,
) -> ChatContext {
    ChatContext {
        source: SOURCE.to_string(),
        conversation_id: chat.id.clone(),
        exported,
        project_type: analysis.project_type.clone(),
        analysis: ContextAnalysis {
            confidence: analysis.confidence,
            languages: analysis.languages.clone(),
            dependencies: analysis.dependencies.clone(),
            file_count: analysis.files.len(),
        },
        original_chat: OriginalChat {
            title: chat.title.clone(),
            message_count: chat.messages.len(),
            url: chat.url.clone(),
            timestamp: chat.captured_at,
        },
    }
}

/// Every chat serialized in `format`, one file per chat, under a dated
/// `deepseek-export-<date>/` root. Colliding file names are numbered.
pub fn bulk_export_archive(
    chats: &[Chat],
    format: ExportFormat,
    options: &ExportOptions,
    exported_at: DateTime<Utc>,
) -> Result<Archive> {
    let mut archive = Archive::new(format!("deepseek-export-{}", exported_at.format("%Y-%m-%d")));
    let mut names = NameAllocator::default();
    for chat in chats {
        let payload = export_chat(chat, format, options, exported_at)?;
        let path = archive.path_of(&names.allocate(payload.filename));
        archive.entries.insert(path, payload.content.into_bytes());
    }
    debug!(root = %archive.root, chats = chats.len(), %format, "assembled bulk export");
    Ok(archive)
}

fn readme(
    chat: &Chat,
    analysis: &ProjectAnalysis,
    project_name: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let title = if chat.title.is_empty() { "Untitled" } else { &chat.title };
    let files = analysis
        .files
        .iter()
        .map(|file| format!("- `{}` ({}, {} lines)", file.name, file.language, file.line_count))
        .collect::<Vec<_>>()
        .join("\n");
    let dependencies = if analysis.dependencies.is_empty() {
        "No external dependencies detected".to_string()
    } else {
        analysis
            .dependencies
            .iter()
            .map(|dep| format!("- {dep}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# {project_name}

Generated from DeepSeek conversation

## Project Details
- **Source**: {SOURCE}
- **Conversation**: {title}
- **Generated**: {generated}
- **Project Type**: {project_type}
- **Confidence Score**: {confidence}%

## Files
{files}

## How to Use
{usage}

## Dependencies
{dependencies}

## Notes
This project was automatically generated from a DeepSeek conversation.
Original chat context is available in `{CONTEXT_FILE}`.

---
*Generated by {GENERATOR} v{VERSION}*
",
        generated = generated_at.format("%Y-%m-%d"),
        project_type = analysis.project_type,
        confidence = analysis.confidence,
        usage = templates::usage_instructions(&analysis.project_type),
    )
}

/// Make a name safe to use as the archive root directory.
pub fn sanitize_project_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' => '-',
            ch if ch.is_control() => '-',
            ch => ch,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|ch: char| ch == '.' || ch == '-' || ch.is_whitespace());
    if cleaned.is_empty() {
        DEFAULT_PROJECT_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::structure::generate_structure;
    use crate::types::{ChatMetadata, ProjectFile, Role};
    use chrono::TimeZone;
    use std::io::Read;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 4, 15, 30, 0).unwrap()
    }

    fn file(name: &str, language: &str, extension: &str, content: &str) -> ProjectFile {
        ProjectFile {
            id: name.into(),
            name: name.into(),
            content: content.into(),
            language: language.into(),
            extension: extension.into(),
            file_type: language.into(),
            source: Role::Assistant,
            line_count: content.lines().count(),
            char_count: content.chars().count(),
            size_bytes: content.len(),
        }
    }

    fn chat() -> Chat {
        Chat {
            id: "chat_todo_1a2b3c4d".into(),
            title: "Todo".into(),
            messages: Vec::new(),
            metadata: ChatMetadata {
                title: "Todo".into(),
                conversation_title: None,
                url: "https://chat.example/c/9".into(),
                parsed_at: at(),
            },
            captured_at: at(),
            url: "https://chat.example/c/9".into(),
            has_code_blocks: true,
            message_count: 0,
        }
    }

    fn analysis() -> ProjectAnalysis {
        ProjectAnalysis {
            is_complete_project: true,
            project_type: ProjectType::Node,
            suggested_name: "todo".into(),
            files: vec![
                file("index.js", "javascript", "js", "const express = require('express');"),
                file("index.html", "html", "html", "<p>todo</p>"),
                file("style.css", "css", "css", "p { color: red }"),
            ],
            dependencies: vec!["express".into()],
            languages: vec!["javascript".into(), "html".into(), "css".into()],
            confidence: 90,
            missing_files: vec![".gitignore".into()],
            structure: None,
        }
    }

    fn options() -> ArchiveOptions {
        ArchiveOptions {
            generated_at: Some(at()),
            ..ArchiveOptions::default()
        }
    }

    #[test]
    fn bucketed_layout_with_generated_files() {
        let archive = create_project_archive(&chat(), &analysis(), &options()).unwrap();
        let paths: Vec<_> = archive.paths().collect();
        assert_eq!(
            paths,
            vec![
                "todo/.deepseek-context.json",
                "todo/.gitignore",
                "todo/README.md",
                "todo/css/style.css",
                "todo/index.html",
                "todo/metadata.json",
                "todo/package.json",
                "todo/src/index.js",
            ]
        );
        let readme = archive.get_str("todo/README.md").unwrap();
        assert!(readme.starts_with("# todo\n"));
        assert!(readme.contains("- `index.js` (javascript, 1 lines)"));
        assert!(readme.contains("- express"));
        assert!(readme.contains("`npm install`"));
        assert!(readme.contains("**Generated**: 2024-07-04"));
    }

    #[test]
    fn flattened_paths_have_no_directories() {
        let mut analysis = analysis();
        analysis.files.push(file("lib/util.js", "javascript", "js", "exports.x = 1"));
        let options = ArchiveOptions {
            flatten_structure: true,
            include_chat_context: false,
            generate_configs: false,
            ..options()
        };
        let archive = create_project_archive(&chat(), &analysis, &options).unwrap();
        for path in archive.paths() {
            let rest = path.strip_prefix("todo/").unwrap();
            assert!(!rest.contains('/'), "{path} is nested");
        }
        assert!(archive.get("todo/util.js").is_some());
        assert!(archive.get("todo/.deepseek-context.json").is_none());
    }

    #[test]
    fn context_round_trip() {
        let archive = create_project_archive(&chat(), &analysis(), &options()).unwrap();
        let raw = archive.get_str("todo/.deepseek-context.json").unwrap();
        let context: ChatContext = serde_json::from_str(raw).unwrap();
        assert_eq!(context.conversation_id, "chat_todo_1a2b3c4d");
        assert_eq!(context.original_chat.title, "Todo");
        assert_eq!(context.analysis.confidence, 90);
        assert_eq!(context.project_type, ProjectType::Node);
        assert_eq!(context, chat_context(&chat(), &analysis(), at()));
    }

    #[test]
    fn identical_inputs_give_identical_archives() {
        let first = create_project_archive(&chat(), &analysis(), &options()).unwrap();
        let second = create_project_archive(&chat(), &analysis(), &options()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_zip_bytes().unwrap(), second.to_zip_bytes().unwrap());
    }

    #[test]
    fn generated_files_never_overwrite_project_files() {
        let mut analysis = analysis();
        analysis.files.push(file("package.json", "json", "json", "{\"name\":\"mine\"}"));
        let archive = create_project_archive(&chat(), &analysis, &options()).unwrap();
        assert_eq!(archive.get_str("todo/package.json"), Some("{\"name\":\"mine\"}"));
    }

    #[test]
    fn context_file_wins_over_a_project_file_of_the_same_name() {
        let mut analysis = analysis();
        analysis
            .files
            .push(file(CONTEXT_FILE, "json", "json", "{\"mine\":true}"));
        let archive = create_project_archive(&chat(), &analysis, &options()).unwrap();

        let raw = archive.get_str("todo/.deepseek-context.json").unwrap();
        let context: ChatContext = serde_json::from_str(raw).unwrap();
        assert_eq!(context.conversation_id, "chat_todo_1a2b3c4d");
        assert_eq!(
            archive.get_str("todo/.deepseek-context_2.json"),
            Some("{\"mine\":true}")
        );
    }

    #[test]
    fn archive_paths_follow_the_layout_preview() {
        let mut analysis = analysis();
        analysis.files.push(file("css/style.css", "css", "css", "a {}"));
        let structure = generate_structure("todo", &analysis.project_type, &analysis.files);
        let archive = create_project_archive(&chat(), &analysis, &options()).unwrap();
        for entry in &structure.suggested_layout {
            assert!(archive.get(&format!("todo{entry}")).is_some(), "preview path {entry}");
        }
        assert_eq!(archive.get_str("todo/css/style_2.css"), Some("a {}"));
    }

    #[test]
    fn dependencies_can_be_left_out_of_configs() {
        let options = ArchiveOptions {
            include_dependencies: false,
            ..options()
        };
        let archive = create_project_archive(&chat(), &analysis(), &options).unwrap();
        let manifest: serde_json::Value =
            serde_json::from_str(archive.get_str("todo/package.json").unwrap()).unwrap();
        assert_eq!(manifest["dependencies"], serde_json::json!({}));
    }

    #[test]
    fn name_override_is_sanitized() {
        let options = ArchiveOptions {
            project_name: Some("../my/app".into()),
            ..options()
        };
        let archive = create_project_archive(&chat(), &analysis(), &options).unwrap();
        assert_eq!(archive.root(), "my-app");
        assert!(archive.paths().all(|path| path.starts_with("my-app/")));
        assert_eq!(sanitize_project_name("  "), DEFAULT_PROJECT_NAME);
    }

    #[test]
    fn zip_contains_every_entry() {
        let archive = create_project_archive(&chat(), &analysis(), &options()).unwrap();
        let bytes = archive.to_zip_bytes().unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), archive.len());
        let mut content = String::new();
        zip.by_name("todo/src/index.js")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "const express = require('express');");
    }

    #[test]
    fn bulk_export_numbers_repeated_titles() {
        let chats = vec![chat(), chat()];
        let archive =
            bulk_export_archive(&chats, ExportFormat::Markdown, &ExportOptions::default(), at())
                .unwrap();
        assert_eq!(archive.root(), "deepseek-export-2024-07-04");
        let paths: Vec<_> = archive.paths().collect();
        assert_eq!(
            paths,
            vec![
                "deepseek-export-2024-07-04/deepseek_todo_2024-07-04.md",
                "deepseek-export-2024-07-04/deepseek_todo_2024-07-04_2.md",
            ]
        );
    }
}
