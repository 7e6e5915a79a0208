//! Terminal rendering of chats and project analyses.

use crate::extractor::clean_content;
use crate::types::{Chat, CodeBlock, Message, ProjectAnalysis, Role};
use nu_ansi_term::{Color, Style as AnsiStyle};
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME: Lazy<Theme> = Lazy::new(|| {
    let mut theme_set = ThemeSet::load_defaults();
    theme_set
        .themes
        .remove("base16-ocean.dark")
        .or_else(|| theme_set.themes.into_values().next())
        .unwrap_or_default()
});

/// A transcript with role headers and highlighted code blocks.
pub fn render_chat(chat: &Chat) -> String {
    let mut output = String::new();
    let title = AnsiStyle::new().bold().fg(Color::LightBlue);
    output.push_str(&title.paint(chat.title.as_str()).to_string());
    output.push('\n');
    if !chat.url.is_empty() {
        output.push_str(&Color::DarkGray.paint(chat.url.as_str()).to_string());
        output.push('\n');
    }

    for message in &chat.messages {
        output.push('\n');
        output.push_str(&message_header(message));
        output.push('\n');

        let prose = prose_of(message);
        if !prose.is_empty() {
            output.push_str(&highlight_inline_spans(&prose, &message.code_blocks));
            output.push('\n');
        }
        for block in message.code_blocks.iter().filter(|block| !block.is_inline) {
            output.push_str(&Color::DarkGray.paint(format!("```{}", block.language)).to_string());
            output.push('\n');
            let highlighted = highlight_code_block(&block.code, Some(&block.language));
            output.push_str(&highlighted);
            if !highlighted.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&Color::DarkGray.paint("```").to_string());
            output.push('\n');
        }
    }

    output.trim_end().to_string()
}

/// Project summary: type, confidence, files and dependencies.
pub fn render_analysis(analysis: &ProjectAnalysis) -> String {
    let label = AnsiStyle::new().bold();
    let verdict = if analysis.is_complete_project {
        Color::Green.paint("complete project")
    } else {
        Color::Yellow.paint("incomplete")
    };

    let mut lines = vec![
        format!("{} {}", label.paint("Project:"), analysis.suggested_name),
        format!("{} {} ({})", label.paint("Type:"), analysis.project_type, verdict),
        format!("{} {}%", label.paint("Confidence:"), analysis.confidence),
    ];
    if !analysis.languages.is_empty() {
        lines.push(format!("{} {}", label.paint("Languages:"), analysis.languages.join(", ")));
    }

    lines.push(format!("{} {}", label.paint("Files:"), analysis.files.len()));
    for file in &analysis.files {
        lines.push(format!(
            "  {} {}",
            Color::Cyan.paint(file.name.as_str()),
            Color::DarkGray.paint(format!("({}, {} lines)", file.language, file.line_count))
        ));
    }

    if !analysis.dependencies.is_empty() {
        lines.push(format!(
            "{} {}",
            label.paint("Dependencies:"),
            analysis.dependencies.join(", ")
        ));
    }
    if !analysis.missing_files.is_empty() {
        lines.push(format!(
            "{} {}",
            Color::Yellow.bold().paint("Missing:"),
            analysis.missing_files.join(", ")
        ));
    }
    if let Some(structure) = &analysis.structure {
        lines.push(format!("{} {}/", label.paint("Layout:"), structure.name));
        for path in &structure.suggested_layout {
            lines.push(format!("  {path}"));
        }
    }

    lines.join("\n")
}

fn message_header(message: &Message) -> String {
    let (name, color) = match message.role {
        Role::User => ("You", Color::Green),
        Role::Assistant => ("Assistant", Color::Purple),
    };
    format!(
        "{} {}",
        color.bold().paint(name),
        Color::DarkGray.paint(crate::display_time(message.timestamp))
    )
}

/// Message text with block code removed; blocks are printed separately.
fn prose_of(message: &Message) -> String {
    let mut prose = message.content.clone();
    for block in message.code_blocks.iter().filter(|block| !block.is_inline) {
        let code = clean_content(&block.code);
        if !code.is_empty() {
            prose = prose.replacen(&code, " ", 1);
        }
    }
    clean_content(&prose)
}

fn highlight_inline_spans(text: &str, blocks: &[CodeBlock]) -> String {
    let style = AnsiStyle::new()
        .fg(Color::Rgb(255, 224, 138))
        .on(Color::Rgb(60, 63, 65));
    blocks
        .iter()
        .filter(|block| block.is_inline)
        .fold(text.to_string(), |text, block| {
            let span = format!("`{}`", block.code);
            text.replacen(&span, &style.paint(block.code.as_str()).to_string(), 1)
        })
}

fn highlight_code_block(code: &str, language: Option<&str>) -> String {
    let syntax_set: &SyntaxSet = &SYNTAX_SET;
    let theme: &Theme = &THEME;

    let syntax: &SyntaxReference = language
        .and_then(|lang| syntax_set.find_syntax_by_token(lang))
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut highlighted = String::new();
    for line in LinesWithEndings::from(code) {
        match highlighter.highlight_line(line, syntax_set) {
            Ok(ranges) => highlighted.push_str(&as_24_bit_terminal_escaped(&ranges, false)),
            Err(_) => highlighted.push_str(line),
        }
    }
    highlighted.push_str("\x1b[0m");
    highlighted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMetadata, ProjectType};
    use chrono::{TimeZone, Utc};

    fn strip_ansi(text: &str) -> String {
        let mut plain = String::new();
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == '\x1b' {
                for next in chars.by_ref() {
                    if next == 'm' {
                        break;
                    }
                }
            } else {
                plain.push(ch);
            }
        }
        plain
    }

    fn chat() -> Chat {
        let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let block = CodeBlock::new("code_1_0".into(), "print('hi')".into(), "python".into(), false)
            .unwrap();
        let inline = CodeBlock::new("inline_1_0".into(), "pip".into(), "text".into(), true).unwrap();
        Chat {
            id: "chat_demo_00000000".into(),
            title: "Demo".into(),
            messages: vec![
                Message {
                    id: "msg_0".into(),
                    role: Role::User,
                    content: "Say hi in Python".into(),
                    raw_content: "Say hi in Python".into(),
                    code_blocks: Vec::new(),
                    images: Vec::new(),
                    timestamp: at,
                    position: 0,
                },
                Message {
                    id: "msg_1".into(),
                    role: Role::Assistant,
                    content: "Run this, no `pip` needed: print('hi')".into(),
                    raw_content: String::new(),
                    code_blocks: vec![block, inline],
                    images: Vec::new(),
                    timestamp: at,
                    position: 1,
                },
            ],
            metadata: ChatMetadata {
                title: "Demo".into(),
                conversation_title: None,
                url: String::new(),
                parsed_at: at,
            },
            captured_at: at,
            url: String::new(),
            has_code_blocks: true,
            message_count: 2,
        }
    }

    #[test]
    fn transcript_separates_prose_and_code() {
        let plain = strip_ansi(&render_chat(&chat()));
        assert!(plain.starts_with("Demo\n"));
        assert!(plain.contains("You 2024-02-03 04:05:06 UTC\nSay hi in Python"));
        assert!(plain.contains("Run this, no pip needed:\n```python\nprint('hi')"));
        assert!(plain.ends_with("```"));
    }

    #[test]
    fn analysis_lists_files_and_verdict() {
        let mut analysis = ProjectAnalysis::empty("demo".into());
        analysis.project_type = ProjectType::Python;
        analysis.dependencies = vec!["requests".into()];
        let plain = strip_ansi(&render_analysis(&analysis));
        assert!(plain.contains("Project: demo"));
        assert!(plain.contains("Type: python (incomplete)"));
        assert!(plain.contains("Files: 0"));
        assert!(plain.contains("Dependencies: requests"));
    }
}
