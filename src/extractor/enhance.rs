//! Derived statistics attached to a chat before it is persisted.

use crate::types::{Chat, Role};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const TOPIC_KEYWORDS: &[&str] = &[
    "react", "vue", "angular", "javascript", "python", "java", "c++", "html", "css", "node",
    "express", "database", "api", "backend", "frontend", "mobile", "web", "machine learning",
    "ai", "data", "algorithm", "debug", "error", "fix", "tutorial", "example", "code", "project",
    "app", "application",
];

const PROJECT_INDICATORS: &[&str] = &[
    "project", "app", "application", "website", "program", "build a", "create a", "develop a",
    "make a",
];

static FILE_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:file|filename|create)\s+(?:called\s+)?['"]?([\w\-./]+\.\w+)['"]?"#).unwrap()
});

static DEPENDENCY_MENTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)npm install (\S+)",
        r"(?i)pip install (\S+)",
        r"(?i)yarn add (\S+)",
        r"(?i)import (\S+)",
        r#"(?i)require\(['"](\S+?)['"]\)"#,
        r"(?i)from (\S+) import",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// A chat together with the statistics stored next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedChat {
    #[serde(flatten)]
    pub chat: Chat,
    pub stats: ChatStats,
    pub topics: Vec<String>,
    pub project_info: ProjectHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_words: usize,
    pub total_chars: usize,
    pub code_blocks: usize,
    pub images: usize,
}

/// Text-level hints that the chat is about building something.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHint {
    pub is_project: bool,
    pub languages: Vec<String>,
    pub files: Vec<String>,
    pub dependencies: Vec<String>,
}

pub fn enhance_chat(chat: &Chat) -> EnhancedChat {
    let all_text = chat
        .messages
        .iter()
        .map(|message| message.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let duration_ms = match (chat.messages.first(), chat.messages.last()) {
        (Some(first), Some(last)) if chat.messages.len() > 1 => {
            Some((last.timestamp - first.timestamp).num_milliseconds())
        }
        _ => None,
    };

    EnhancedChat {
        stats: chat_stats(chat),
        topics: extract_topics(&all_text),
        project_info: detect_project_hint(chat, &all_text),
        duration_ms,
        last_updated: None,
        chat: chat.clone(),
    }
}

pub fn chat_stats(chat: &Chat) -> ChatStats {
    ChatStats {
        user_messages: chat.messages_by(Role::User).count(),
        assistant_messages: chat.messages_by(Role::Assistant).count(),
        total_words: chat
            .messages
            .iter()
            .map(|message| message.content.split_whitespace().count())
            .sum(),
        total_chars: chat
            .messages
            .iter()
            .map(|message| message.content.chars().count())
            .sum(),
        code_blocks: chat.code_block_count(),
        images: chat.messages.iter().map(|message| message.images.len()).sum(),
    }
}

fn extract_topics(all_text: &str) -> Vec<String> {
    TOPIC_KEYWORDS
        .iter()
        .filter(|keyword| contains_word(all_text, keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

fn detect_project_hint(chat: &Chat, all_text: &str) -> ProjectHint {
    let is_project = PROJECT_INDICATORS
        .iter()
        .any(|indicator| all_text.contains(indicator));

    let mut languages = Vec::new();
    for block in chat.messages.iter().flat_map(|message| &message.code_blocks) {
        if block.language != "text" && !languages.contains(&block.language) {
            languages.push(block.language.clone());
        }
    }

    let mut files = Vec::new();
    let mut dependencies = BTreeSet::new();
    for message in &chat.messages {
        for captures in FILE_MENTION.captures_iter(&message.content) {
            let name = captures[1].to_string();
            if !files.contains(&name) {
                files.push(name);
            }
        }
        for pattern in DEPENDENCY_MENTIONS.iter() {
            for captures in pattern.captures_iter(&message.content) {
                let candidate = captures[1].replace(['\'', '"'], "");
                if !candidate.is_empty() && !candidate.contains('.') && candidate.len() < 50 {
                    dependencies.insert(candidate);
                }
            }
        }
    }

    ProjectHint {
        is_project,
        languages,
        files,
        dependencies: dependencies.into_iter().collect(),
    }
}

/// Substring match that refuses to start or end inside a word.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
