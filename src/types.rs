//! Core data types for captured chats and project analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A captured conversation.
///
/// `id` is derived from the title and the first/last message content, so two
/// captures of the same page content always agree on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub metadata: ChatMetadata,
    pub captured_at: DateTime<Utc>,
    pub url: String,
    pub has_code_blocks: bool,
    pub message_count: usize,
}

impl Chat {
    /// Messages sent by the given role, in page order.
    pub fn messages_by(&self, role: Role) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |message| message.role == role)
    }

    /// Total number of code blocks across all messages.
    pub fn code_block_count(&self) -> usize {
        self.messages.iter().map(|message| message.code_blocks.len()).sum()
    }
}

/// Page-level facts recorded alongside a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_title: Option<String>,
    pub url: String,
    pub parsed_at: DateTime<Utc>,
}

/// Who authored a message. Messages that resolve to neither are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message within a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub raw_content: String,
    pub code_blocks: Vec<CodeBlock>,
    pub images: Vec<Image>,
    pub timestamp: DateTime<Utc>,
    pub position: usize,
}

impl Message {
    pub fn has_code(&self) -> bool {
        !self.code_blocks.is_empty()
    }
}

/// A fenced or inline code excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub id: String,
    pub code: String,
    pub language: String,
    pub line_count: usize,
    pub char_count: usize,
    pub is_inline: bool,
}

impl CodeBlock {
    /// Build a block, returning `None` when the code is blank.
    pub fn new(id: String, code: String, language: String, is_inline: bool) -> Option<Self> {
        if code.trim().is_empty() {
            return None;
        }
        let line_count = code.split('\n').count();
        let char_count = code.chars().count();
        Some(Self {
            id,
            code,
            language,
            line_count,
            char_count,
            is_inline,
        })
    }
}

/// An image referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub src: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Coarse project classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectType {
    Web,
    Node,
    Python,
    React,
    Flask,
    Django,
    /// No framework rule matched; named after the first detected language.
    Language(String),
    Unknown,
}

impl ProjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ProjectType::Web => "web",
            ProjectType::Node => "node",
            ProjectType::Python => "python",
            ProjectType::React => "react",
            ProjectType::Flask => "flask",
            ProjectType::Django => "django",
            ProjectType::Language(language) => language,
            ProjectType::Unknown => "unknown",
        }
    }

    /// Flask and Django share the plain Python scaffolding.
    pub fn is_python_family(&self) -> bool {
        matches!(
            self,
            ProjectType::Python | ProjectType::Flask | ProjectType::Django
        )
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ProjectType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "web" => ProjectType::Web,
            "node" => ProjectType::Node,
            "python" => ProjectType::Python,
            "react" => ProjectType::React,
            "flask" => ProjectType::Flask,
            "django" => ProjectType::Django,
            "unknown" | "" => ProjectType::Unknown,
            _ => ProjectType::Language(value),
        }
    }
}

impl From<ProjectType> for String {
    fn from(value: ProjectType) -> Self {
        value.as_str().to_string()
    }
}

/// A code block promoted to a named file candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub id: String,
    pub name: String,
    pub content: String,
    pub language: String,
    pub extension: String,
    pub file_type: String,
    pub source: Role,
    pub line_count: usize,
    pub char_count: usize,
    pub size_bytes: usize,
}

/// Suggested on-disk layout for a detected project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    pub name: String,
    pub project_type: ProjectType,
    /// One `/`-rooted path per file, in file order.
    pub suggested_layout: Vec<String>,
}

/// Classification of a chat's code content. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysis {
    pub is_complete_project: bool,
    pub project_type: ProjectType,
    pub suggested_name: String,
    pub files: Vec<ProjectFile>,
    pub dependencies: Vec<String>,
    pub languages: Vec<String>,
    pub confidence: u8,
    pub missing_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<ProjectStructure>,
}

impl ProjectAnalysis {
    /// The result for a chat without any code.
    pub fn empty(suggested_name: String) -> Self {
        Self {
            is_complete_project: false,
            project_type: ProjectType::Unknown,
            suggested_name,
            files: Vec::new(),
            dependencies: Vec::new(),
            languages: Vec::new(),
            confidence: 0,
            missing_files: Vec::new(),
            structure: None,
        }
    }
}

/// A lightweight summary of a stored chat for listing and filtering.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub captured_at: DateTime<Utc>,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_code_is_never_a_block() {
        assert!(CodeBlock::new("c".into(), "  \n\t".into(), "text".into(), false).is_none());
        let block = CodeBlock::new("c".into(), "a\nb".into(), "text".into(), true).unwrap();
        assert_eq!(block.line_count, 2);
        assert_eq!(block.char_count, 3);
        assert!(block.is_inline);
    }

    #[test]
    fn project_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&ProjectType::Flask).unwrap();
        assert_eq!(json, "\"flask\"");
        let other: ProjectType = serde_json::from_str("\"java\"").unwrap();
        assert_eq!(other, ProjectType::Language("java".into()));
        assert_eq!(other.to_string(), "java");
    }

    #[test]
    fn python_family_covers_frameworks() {
        assert!(ProjectType::Flask.is_python_family());
        assert!(ProjectType::Django.is_python_family());
        assert!(!ProjectType::Node.is_python_family());
    }
}
