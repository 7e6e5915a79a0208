//! Text serialization of captured chats.

use crate::error::{Error, Result};
use crate::types::{Chat, Message, Role};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEFAULT_TITLE: &str = "DeepSeek Conversation";
const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Html,
    Txt,
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Json,
        ExportFormat::Markdown,
        ExportFormat::Html,
        ExportFormat::Txt,
        ExportFormat::Csv,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Html => "html",
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            other => other.as_str(),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Html => "text/html",
            ExportFormat::Txt => "text/plain",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            "txt" | "text" => Ok(ExportFormat::Txt),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::UnsupportedFormat(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub include_timestamps: bool,
    pub include_code_blocks: bool,
    pub include_metadata: bool,
    pub prettify: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_timestamps: true,
            include_code_blocks: true,
            include_metadata: true,
            prettify: true,
        }
    }
}

/// Serialized chat plus what a caller needs to save it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub content: String,
    pub extension: &'static str,
    pub filename: String,
    pub mime_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    #[serde(flatten)]
    chat: &'a Chat,
    export_metadata: ExportMetadata,
}

#[derive(Serialize)]
struct ExportMetadata {
    format: ExportFormat,
    exported: DateTime<Utc>,
    version: &'static str,
    options: ExportOptions,
}

pub fn export_chat(
    chat: &Chat,
    format: ExportFormat,
    options: &ExportOptions,
    exported_at: DateTime<Utc>,
) -> Result<ExportPayload> {
    let content = match format {
        ExportFormat::Json => to_json(chat, options, exported_at)?,
        ExportFormat::Markdown => to_markdown(chat, options, exported_at),
        ExportFormat::Html => to_html(chat, options, exported_at),
        ExportFormat::Txt => to_text(chat, options, exported_at),
        ExportFormat::Csv => to_csv(chat, options),
    };
    Ok(ExportPayload {
        content,
        extension: format.extension(),
        filename: export_filename(chat, format, exported_at),
        mime_type: format.mime_type(),
    })
}

/// `deepseek_<safe title>_<date>.<ext>`
pub fn export_filename(chat: &Chat, format: ExportFormat, exported_at: DateTime<Utc>) -> String {
    let title = if chat.title.trim().is_empty() {
        "conversation"
    } else {
        chat.title.as_str()
    };
    let mut safe = String::new();
    for ch in title.chars() {
        let ch = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if ch == '_' && safe.ends_with('_') {
            continue;
        }
        safe.push(ch);
    }
    let safe: String = safe.chars().take(50).collect();
    format!(
        "deepseek_{}_{}.{}",
        safe,
        exported_at.format("%Y-%m-%d"),
        format.extension()
    )
}

fn title_of(chat: &Chat) -> &str {
    if chat.title.is_empty() {
        DEFAULT_TITLE
    } else {
        &chat.title
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "DeepSeek",
    }
}

fn clock(message: &Message) -> String {
    message.timestamp.format("%H:%M:%S").to_string()
}

fn url_or_na(chat: &Chat) -> &str {
    if chat.url.is_empty() {
        "N/A"
    } else {
        &chat.url
    }
}

fn to_json(chat: &Chat, options: &ExportOptions, exported_at: DateTime<Utc>) -> Result<String> {
    let export = JsonExport {
        chat,
        export_metadata: ExportMetadata {
            format: ExportFormat::Json,
            exported: exported_at,
            version: EXPORT_VERSION,
            options: *options,
        },
    };
    let json = if options.prettify {
        serde_json::to_string_pretty(&export)?
    } else {
        serde_json::to_string(&export)?
    };
    Ok(json)
}

fn to_markdown(chat: &Chat, options: &ExportOptions, exported_at: DateTime<Utc>) -> String {
    let mut out = format!("# {}\n\n", title_of(chat));
    if options.include_metadata {
        out.push_str(&format!("**Date:** {}\n", crate::display_time(chat.captured_at)));
        out.push_str(&format!("**URL:** {}\n\n", url_or_na(chat)));
        out.push_str("---\n\n");
    }

    for message in &chat.messages {
        let time = if options.include_timestamps {
            format!(" *({})*", clock(message))
        } else {
            String::new()
        };
        out.push_str(&format!("### {}{}\n\n", speaker(message.role), time));
        out.push_str(&message.content);
        out.push_str("\n\n");
        if options.include_code_blocks {
            for block in &message.code_blocks {
                out.push_str(&format!("```{}\n{}\n```\n\n", block.language, block.code));
            }
        }
        out.push_str("---\n\n");
    }

    if options.include_metadata {
        out.push_str(&format!(
            "\n*Exported from DeepSeek Manager on {}*",
            crate::display_time(exported_at)
        ));
    }
    out
}

fn to_html(chat: &Chat, options: &ExportOptions, exported_at: DateTime<Utc>) -> String {
    let title = escape_html(title_of(chat));
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("    <meta charset=\"UTF-8\">\n");
    out.push_str("    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    out.push_str(&format!("    <title>{title}</title>\n"));
    out.push_str(&format!("    <style>{HTML_STYLE}</style>\n"));
    out.push_str("</head>\n<body>\n    <div class=\"header\">\n");
    out.push_str(&format!("        <h1>{title}</h1>\n"));
    if options.include_metadata {
        out.push_str(&format!(
            "        <p><strong>Date:</strong> {}</p>\n",
            crate::display_time(chat.captured_at)
        ));
        out.push_str(&format!(
            "        <p><strong>URL:</strong> {}</p>\n",
            escape_html(url_or_na(chat))
        ));
        out.push_str(&format!(
            "        <p><strong>Messages:</strong> {}</p>\n",
            chat.messages.len()
        ));
    }
    out.push_str("    </div>\n    <div class=\"messages\">\n");

    for message in &chat.messages {
        out.push_str(&format!("        <div class=\"message {}-message\">\n", message.role));
        out.push_str(&format!("            <div class=\"role\">{}", speaker(message.role)));
        if options.include_timestamps {
            out.push_str(&format!("<span class=\"timestamp\">{}</span>", clock(message)));
        }
        out.push_str("</div>\n");
        out.push_str(&format!(
            "            <div class=\"content\">{}</div>\n",
            escape_html(&message.content)
        ));
        if options.include_code_blocks {
            for block in &message.code_blocks {
                out.push_str(&format!(
                    "            <pre><code class=\"language-{}\">{}</code></pre>\n",
                    escape_html(&block.language),
                    escape_html(&block.code)
                ));
            }
        }
        out.push_str("        </div>\n");
    }
    out.push_str("    </div>\n");

    if options.include_metadata {
        out.push_str("    <div class=\"footer\">\n");
        out.push_str(&format!(
            "        <p>Exported from DeepSeek Manager on {}</p>\n",
            crate::display_time(exported_at)
        ));
        out.push_str(&format!("        <p>DeepSeek Manager v{}</p>\n", env!("CARGO_PKG_VERSION")));
        out.push_str("    </div>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn to_text(chat: &Chat, options: &ExportOptions, exported_at: DateTime<Utc>) -> String {
    let title = title_of(chat);
    let mut out = format!("{}\n{}\n\n", title, "=".repeat(title.chars().count()));
    if options.include_metadata {
        out.push_str(&format!("Date: {}\n", crate::display_time(chat.captured_at)));
        out.push_str(&format!("URL: {}\n", url_or_na(chat)));
        out.push_str(&format!("Messages: {}\n\n", chat.messages.len()));
        out.push_str(&"-".repeat(50));
        out.push_str("\n\n");
    }

    for message in &chat.messages {
        let heading = if options.include_timestamps {
            format!("[{}] ({})", speaker(message.role), clock(message))
        } else {
            format!("[{}]", speaker(message.role))
        };
        out.push_str(&format!("{}\n{}\n", heading, "-".repeat(heading.chars().count())));
        out.push_str(&message.content);
        out.push_str("\n\n");
        if options.include_code_blocks {
            for block in &message.code_blocks {
                let label = format!("[Code Block: {}]", block.language);
                out.push_str(&format!("{}\n{}\n", label, "-".repeat(label.chars().count())));
                out.push_str(&block.code);
                out.push_str("\n\n");
            }
        }
        out.push('\n');
    }

    if options.include_metadata {
        out.push_str(&format!(
            "\nExported from DeepSeek Manager on {}",
            crate::display_time(exported_at)
        ));
    }
    out
}

fn to_csv(chat: &Chat, options: &ExportOptions) -> String {
    let mut out = String::from("Role,Timestamp,Content,Code Blocks\n");
    for message in &chat.messages {
        let timestamp = if options.include_timestamps {
            format!(
                "\"{}\"",
                message.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
            )
        } else {
            String::new()
        };
        let languages = if options.include_code_blocks {
            message
                .code_blocks
                .iter()
                .map(|block| block.language.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        } else {
            String::new()
        };
        out.push_str(&format!(
            "{},{},\"{}\",\"{}\"\n",
            message.role,
            timestamp,
            escape_csv(&message.content),
            escape_csv(&languages)
        ));
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Double quotes and flatten line breaks for a quoted CSV field.
pub fn escape_csv(text: &str) -> String {
    text.replace('"', "\"\"").replace(['\n', '\r'], " ")
}

const HTML_STYLE: &str = "
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; color: #333; }
        .header { border-bottom: 2px solid #10a37f; padding-bottom: 20px; margin-bottom: 30px; }
        .message { margin-bottom: 30px; padding: 20px; border-radius: 10px; background: #f8f9fa; }
        .user-message { background: #e3f2fd; border-left: 4px solid #2196f3; }
        .assistant-message { background: #f3e5f5; border-left: 4px solid #9c27b0; }
        .role { font-weight: bold; margin-bottom: 10px; color: #555; }
        .timestamp { font-size: 0.8em; color: #888; margin-left: 10px; }
        .content { white-space: pre-wrap; word-wrap: break-word; }
        pre { background: #2d2d2d; color: #f8f8f2; padding: 15px; border-radius: 5px; overflow-x: auto; font-family: 'Courier New', monospace; }
        .footer { margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd; font-size: 0.9em; color: #666; text-align: center; }
    ";
