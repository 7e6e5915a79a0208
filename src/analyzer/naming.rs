//! File and project naming.

use super::rules::{FILENAME_COMMENTS, FILENAME_IMPORTS};
use crate::types::{Chat, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static PROJECT_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:build|create|make|develop)\s+(?:a|an)?\s+([\w\s]+?)\s+(?:project|app|application|website|program)",
        r#"(?i)project\s+(?:called|named)\s+['"]?([\w\s]+)['"]?"#,
        r#"(?i)create\s+['"]?([\w\s]+)['"]?"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

pub const DEFAULT_PROJECT_NAME: &str = "deepseek-project";

/// A name the code itself claims: a `File:` style comment, else an imported
/// module path that looks like a file name.
pub fn hinted_filename(code: &str) -> Option<String> {
    let from_comment = FILENAME_COMMENTS
        .iter()
        .find_map(|pattern| pattern.captures(code))
        .map(|captures| captures[1].trim().to_string());
    if from_comment.is_some() {
        return from_comment;
    }

    FILENAME_IMPORTS.iter().find_map(|pattern| {
        pattern
            .captures_iter(code)
            .map(|captures| captures[1].to_string())
            .find(|path| path.contains('.') && !path.starts_with('.'))
    })
}

/// Hands out file names, suffixing `_<n>` when a hinted name repeats.
#[derive(Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn allocate(&mut self, name: String) -> String {
        if self.taken.insert(name.clone()) {
            return name;
        }
        let (stem, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
            _ => (name.as_str(), ""),
        };
        let mut n = 2;
        loop {
            let candidate = format!("{stem}_{n}{extension}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Project slug from the first user message, falling back to title, id and
/// capture date.
pub fn suggest_project_name(chat: &Chat) -> String {
    if let Some(first) = chat.messages_by(Role::User).next() {
        let content = first.content.to_lowercase();
        for pattern in PROJECT_PHRASES.iter() {
            let Some(captures) = pattern.captures(&content) else {
                continue;
            };
            let name = slugify(&captures[1]);
            if name.len() > 2 {
                return name;
            }
        }
    }

    let id_segment = chat
        .id
        .split('_')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .unwrap_or("project");
    let title_slug = slugify(&chat.title);
    let fallbacks = [
        (!title_slug.is_empty()).then(|| format!("deepseek-{title_slug}")),
        Some(format!("chat-{id_segment}")),
        Some(format!("deepseek-project-{}", chat.captured_at.format("%Y-%m-%d"))),
    ];
    fallbacks
        .into_iter()
        .flatten()
        .find(|name| name.len() > 5)
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string())
}

/// Lowercase, whitespace runs to `-`, keep `[a-z0-9-]`.
pub fn slugify(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect()
}
