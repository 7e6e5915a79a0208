//! Project inference over a chat's code blocks.
//!
//! [`analyze_conversation`] is a pure function of the chat: it never fails,
//! and a chat without code yields [`ProjectAnalysis::empty`].

pub mod dependencies;
pub mod naming;
pub mod rules;
pub mod structure;

use crate::types::{Chat, CodeBlock, ProjectAnalysis, ProjectFile, Role};
use std::collections::BTreeSet;
use tracing::debug;

use naming::NameAllocator;
use rules::TypeSignals;

pub fn analyze_conversation(chat: &Chat) -> ProjectAnalysis {
    let suggested_name = naming::suggest_project_name(chat);

    let blocks: Vec<(Role, &CodeBlock)> = chat
        .messages
        .iter()
        .flat_map(|message| message.code_blocks.iter().map(move |block| (message.role, block)))
        .collect();
    if blocks.is_empty() {
        return ProjectAnalysis::empty(suggested_name);
    }

    let files = materialize_files(&blocks);

    let mut languages: Vec<String> = Vec::new();
    for file in &files {
        if !languages.contains(&file.language) {
            languages.push(file.language.clone());
        }
    }

    let dependencies: Vec<String> = files
        .iter()
        .flat_map(|file| dependencies::extract_dependencies(&file.content, &file.language))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let all_text = chat
        .messages
        .iter()
        .map(|message| message.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let project_type = rules::determine_project_type(&TypeSignals {
        languages: &languages,
        files: &files,
        dependencies: &dependencies,
        all_text: &all_text,
    });

    let has_entry_point = files.iter().any(|file| rules::is_entry_point(&file.name));
    let is_complete_project =
        files.len() >= rules::min_files(&project_type) && (has_entry_point || files.len() >= 3);

    let confidence = confidence(&files, &dependencies, &languages, has_entry_point);

    let (missing_files, structure) = if is_complete_project {
        (
            missing_files(&project_type, &files),
            Some(structure::generate_structure(&suggested_name, &project_type, &files)),
        )
    } else {
        (Vec::new(), None)
    };

    debug!(
        chat_id = %chat.id,
        project_type = %project_type,
        files = files.len(),
        confidence,
        complete = is_complete_project,
        "analyzed conversation"
    );

    ProjectAnalysis {
        is_complete_project,
        project_type,
        suggested_name,
        files,
        dependencies,
        languages,
        confidence,
        missing_files,
        structure,
    }
}

fn materialize_files(blocks: &[(Role, &CodeBlock)]) -> Vec<ProjectFile> {
    let mut names = NameAllocator::default();
    blocks
        .iter()
        .enumerate()
        .map(|(index, (role, block))| {
            let hinted = naming::hinted_filename(&block.code)
                .map(|name| structure::clean_relative(&name))
                .filter(|name| !name.is_empty());
            let file_type = hinted
                .as_deref()
                .map(|name| rules::file_type_for(name, &block.language))
                .unwrap_or_else(|| block.language.clone());
            let extension = rules::extension_for(&file_type)
                .or_else(|| rules::extension_for(&block.language))
                .unwrap_or(rules::FALLBACK_EXTENSION);
            let name = names.allocate(
                hinted.unwrap_or_else(|| format!("file_{}.{}", index + 1, extension)),
            );

            ProjectFile {
                id: format!("file_{index}"),
                name,
                content: block.code.clone(),
                language: block.language.clone(),
                extension: extension.to_string(),
                file_type,
                source: *role,
                line_count: block.line_count,
                char_count: block.char_count,
                size_bytes: block.code.len(),
            }
        })
        .collect()
}

/// Additive score capped at 100: up to 30 for file count, 20 for any
/// dependency, 15 for several languages, 25 for an entry point and 20 for a
/// config file.
fn confidence(
    files: &[ProjectFile],
    dependencies: &[String],
    languages: &[String],
    has_entry_point: bool,
) -> u8 {
    let mut score = (files.len() * 10).min(30);
    if !dependencies.is_empty() {
        score += 20;
    }
    if languages.len() > 1 {
        score += 15;
    }
    if has_entry_point {
        score += 25;
    }
    if files.iter().any(|file| rules::is_config_file(&file.name)) {
        score += 20;
    }
    score.min(100) as u8
}

fn missing_files(project_type: &crate::types::ProjectType, files: &[ProjectFile]) -> Vec<String> {
    let existing: Vec<String> = files.iter().map(|file| normalize_name(&file.name)).collect();
    rules::required_files(project_type)
        .iter()
        .filter(|required| {
            let token = normalize_name(required);
            !existing.iter().any(|name| name.contains(&token))
        })
        .map(|required| required.to_string())
        .collect()
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(['/', '.'], "")
}
