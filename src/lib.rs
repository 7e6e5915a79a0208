//! Chatpack - capture chat transcripts and package the code projects in them
//!
//! The pipeline has three stages. The extractor reads a chat page into a
//! [`Chat`], the analyzer infers a [`ProjectAnalysis`] from its code
//! blocks, and the archive assembler turns both into a virtual file tree
//! ready to be zipped. [`Session`] ties them together with storage and
//! export behind a command interface.
//!
//! # Examples
//!
//! ## Analyzing a saved page
//!
//! ```no_run
//! use chatpack::{analyze_conversation, ChatExtractor, Config, HtmlFile};
//!
//! let mut extractor = ChatExtractor::new(&Config::default()).unwrap();
//! let page = HtmlFile::new("conversation.html", None);
//! if let Some(chat) = extractor.extract_current_chat(&page) {
//!     let analysis = analyze_conversation(&chat);
//!     println!("{}: {} ({}%)", chat.title, analysis.project_type, analysis.confidence);
//! }
//! ```
//!
//! ## Packaging a project
//!
//! ```no_run
//! use chatpack::{analyze_conversation, create_project_archive, ArchiveOptions};
//! # fn demo(chat: &chatpack::Chat) -> chatpack::Result<()> {
//! let analysis = analyze_conversation(chat);
//! let archive = create_project_archive(chat, &analysis, &ArchiveOptions::default())?;
//! std::fs::write(format!("{}.zip", archive.root()), archive.to_zip_bytes()?)?;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod render;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use analyzer::analyze_conversation;
pub use archive::{bulk_export_archive, create_project_archive, Archive, ArchiveOptions};
pub use config::Config;
pub use error::{Error, Result};
pub use export::{export_chat, ExportFormat, ExportOptions, ExportPayload};
pub use extractor::enhance::{enhance_chat, EnhancedChat};
pub use extractor::page::{HtmlFile, PageSnapshot, PageSource};
pub use extractor::{is_same_chat, ChatExtractor};
pub use render::{render_analysis, render_chat};
pub use session::{Command, Outcome, ProjectRequest, Session};
pub use store::{build_summaries, filter_summaries, resolve_chat_id, ChatFilter, ChatStore, JsonDirStore};
pub use types::{
    Chat, ChatSummary, CodeBlock, Message, ProjectAnalysis, ProjectFile, ProjectType, Role,
};

/// Layout shared by every human-facing timestamp: terminal, exports, logs.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Storage sizes in binary units with one decimal, plain bytes below 1 KB.
pub fn display_bytes(bytes: u64) -> String {
    const SCALES: [(u64, &str); 4] = [
        (1 << 40, "TB"),
        (1 << 30, "GB"),
        (1 << 20, "MB"),
        (1 << 10, "KB"),
    ];
    SCALES
        .iter()
        .find(|(scale, _)| bytes >= *scale)
        .map_or_else(
            || format!("{bytes} B"),
            |(scale, unit)| format!("{:.1} {unit}", bytes as f64 / *scale as f64),
        )
}

pub fn display_time(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format(DISPLAY_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn storage_sizes() {
        assert_eq!(display_bytes(0), "0 B");
        assert_eq!(display_bytes(1023), "1023 B");
        assert_eq!(display_bytes(1536), "1.5 KB");
        assert_eq!(display_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(display_bytes(3 << 40), "3.0 TB");
    }

    #[test]
    fn times_read_as_utc() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(display_time(at), "2024-01-02 03:04:05 UTC");
    }
}
