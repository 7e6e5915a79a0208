//! Caller-owned session state and the command interface that drives it.
//!
//! A [`Session`] is created when capture starts and dropped when it ends.
//! Environment events (a page change, a button press) are translated into
//! [`Command`]s by the host and applied through [`Session::dispatch`].

use crate::analyzer::analyze_conversation;
use crate::archive::{bulk_export_archive, create_project_archive, Archive, ArchiveOptions};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{export_chat, ExportFormat, ExportOptions, ExportPayload};
use crate::extractor::enhance::enhance_chat;
use crate::extractor::page::PageSource;
use crate::extractor::{is_same_chat, ChatExtractor};
use crate::store::{ChatFilter, ChatStore};
use crate::types::{Chat, ProjectAnalysis, ProjectType};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Analysis kept per chat id, with the time its project was last exported.
#[derive(Debug, Clone)]
pub struct CachedProject {
    pub analysis: ProjectAnalysis,
    pub exported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectRequest {
    /// Stored chat to package; the current chat when unset.
    pub chat_id: Option<String>,
    pub options: ArchiveOptions,
}

pub enum Command<'a> {
    /// The page may have changed; re-extract and react.
    PageChanged(&'a dyn PageSource),
    Save {
        chat_id: Option<String>,
    },
    Export {
        chat_id: Option<String>,
        /// The configured default format when unset.
        format: Option<ExportFormat>,
        options: ExportOptions,
    },
    ExportProject(ProjectRequest),
    /// Every stored chat matching the filter, one export file each.
    BulkExport {
        filter: ChatFilter,
        format: Option<ExportFormat>,
        options: ExportOptions,
    },
}

#[derive(Debug)]
pub enum Outcome {
    /// No chat on the page.
    NoChat,
    /// Same chat id and message count as the current chat.
    Unchanged { chat_id: String },
    ChatUpdated {
        chat_id: String,
        saved: bool,
        project_ready: bool,
    },
    Saved { chat_id: String },
    Exported(ExportPayload),
    ProjectExported(ProjectExport),
    BulkExported(BulkExport),
}

#[derive(Debug)]
pub struct ProjectExport {
    pub filename: String,
    pub archive: Archive,
    pub file_count: usize,
    pub project_type: ProjectType,
}

#[derive(Debug)]
pub struct BulkExport {
    pub filename: String,
    pub archive: Archive,
    pub count: usize,
}

/// One entry of the local usage log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub event: &'static str,
    pub format: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub message_count: usize,
    pub has_code: bool,
}

pub struct Session<S: ChatStore> {
    config: Config,
    extractor: ChatExtractor,
    store: S,
    current: Option<Chat>,
    projects: HashMap<String, CachedProject>,
    analytics: Vec<AnalyticsEvent>,
}

impl<S: ChatStore> Session<S> {
    pub fn new(config: Config, store: S) -> Result<Self> {
        let extractor = ChatExtractor::new(&config)?;
        Ok(Self {
            config,
            extractor,
            store,
            current: None,
            projects: HashMap::new(),
            analytics: Vec::new(),
        })
    }

    pub fn dispatch(&mut self, command: Command<'_>) -> Result<Outcome> {
        self.dispatch_at(command, Utc::now())
    }

    /// As [`Self::dispatch`] with an explicit clock reading.
    pub fn dispatch_at(&mut self, command: Command<'_>, now: DateTime<Utc>) -> Result<Outcome> {
        match command {
            Command::PageChanged(page) => Ok(self.page_changed(page, now)),
            Command::Save { chat_id } => {
                let chat = self.target_chat(chat_id.as_deref())?;
                self.save(&chat, now)?;
                Ok(Outcome::Saved { chat_id: chat.id })
            }
            Command::Export {
                chat_id,
                format,
                options,
            } => {
                let chat = self.target_chat(chat_id.as_deref())?;
                let format = format.unwrap_or(self.config.default_format);
                let payload = export_chat(&chat, format, &options, now)?;
                info!(id = %chat.id, %format, filename = %payload.filename, "exported chat");
                self.record_export("export", format.as_str(), &chat, now);
                Ok(Outcome::Exported(payload))
            }
            Command::ExportProject(request) => self.export_project(request, now),
            Command::BulkExport {
                filter,
                format,
                options,
            } => {
                let chats: Vec<Chat> = self
                    .store
                    .query(&filter)?
                    .into_iter()
                    .map(|record| record.chat)
                    .collect();
                if chats.is_empty() {
                    return Err(Error::NoTargetChat);
                }
                let format = format.unwrap_or(self.config.default_format);
                let archive = bulk_export_archive(&chats, format, &options, now)?;
                info!(count = chats.len(), %format, "bulk exported chats");
                Ok(Outcome::BulkExported(BulkExport {
                    filename: format!("{}.zip", archive.root()),
                    archive,
                    count: chats.len(),
                }))
            }
        }
    }

    fn page_changed(&mut self, page: &dyn PageSource, now: DateTime<Utc>) -> Outcome {
        let Some(chat) = self.extractor.extract_current_chat_at(page, now) else {
            return Outcome::NoChat;
        };
        if is_same_chat(Some(&chat), self.current.as_ref()) {
            return Outcome::Unchanged { chat_id: chat.id };
        }

        let saved = self.config.auto_save && self.auto_save(&chat, now);
        let analysis = analyze_conversation(&chat);
        let project_ready = analysis.is_complete_project
            && analysis.confidence >= self.config.export_threshold;
        if project_ready {
            info!(
                id = %chat.id,
                project_type = %analysis.project_type,
                confidence = analysis.confidence,
                "project detected"
            );
        }

        let chat_id = chat.id.clone();
        let exported_at = self
            .projects
            .get(&chat_id)
            .and_then(|cached| cached.exported_at);
        self.projects.insert(
            chat_id.clone(),
            CachedProject {
                analysis,
                exported_at,
            },
        );
        self.current = Some(chat);

        Outcome::ChatUpdated {
            chat_id,
            saved,
            project_ready,
        }
    }

    /// Saves unless the chat was saved within the auto-save interval.
    /// Failures are not reported to the caller.
    fn auto_save(&mut self, chat: &Chat, now: DateTime<Utc>) -> bool {
        let interval = Duration::seconds(self.config.auto_save_interval_secs as i64);
        let attempt = self.store.last_saved(&chat.id).and_then(|last| match last {
            Some(last) if now - last <= interval => Ok(false),
            _ => self.save(chat, now).map(|_| true),
        });
        match attempt {
            Ok(saved) => saved,
            Err(err) => {
                debug!(id = %chat.id, error = %err, "auto-save skipped");
                false
            }
        }
    }

    fn save(&mut self, chat: &Chat, now: DateTime<Utc>) -> Result<()> {
        self.store.put(enhance_chat(chat), now)?;
        debug!(id = %chat.id, messages = chat.message_count, "saved chat");
        Ok(())
    }

    fn export_project(&mut self, request: ProjectRequest, now: DateTime<Utc>) -> Result<Outcome> {
        let chat = self.target_chat(request.chat_id.as_deref())?;
        let analysis = match self.projects.get(&chat.id) {
            Some(cached) => cached.analysis.clone(),
            None => analyze_conversation(&chat),
        };

        let options = ArchiveOptions {
            generated_at: request.options.generated_at.or(Some(now)),
            ..request.options
        };
        let archive = create_project_archive(&chat, &analysis, &options)?;
        let export = ProjectExport {
            filename: format!("{}.zip", archive.root()),
            file_count: analysis.files.len(),
            project_type: analysis.project_type.clone(),
            archive,
        };
        info!(
            id = %chat.id,
            filename = %export.filename,
            files = export.file_count,
            "exported project"
        );

        self.record_export("project", "zip", &chat, now);
        self.projects.insert(
            chat.id.clone(),
            CachedProject {
                analysis,
                exported_at: Some(now),
            },
        );
        Ok(Outcome::ProjectExported(export))
    }

    /// The current chat when `chat_id` is unset or names it, else the
    /// stored chat with that id.
    fn target_chat(&self, chat_id: Option<&str>) -> Result<Chat> {
        match (chat_id, &self.current) {
            (None, Some(current)) => Ok(current.clone()),
            (None, None) => Err(Error::NoTargetChat),
            (Some(id), Some(current)) if current.id == id => Ok(current.clone()),
            (Some(id), _) => self
                .store
                .get(id)?
                .map(|record| record.chat)
                .ok_or(Error::NoTargetChat),
        }
    }

    fn record_export(&mut self, event: &'static str, format: &str, chat: &Chat, now: DateTime<Utc>) {
        if !self.config.enable_analytics {
            return;
        }
        self.analytics.push(AnalyticsEvent {
            event,
            format: format.to_string(),
            timestamp: now,
            chat_id: chat.id.clone(),
            message_count: chat.messages.len(),
            has_code: chat.has_code_blocks,
        });
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        self.current.as_ref()
    }

    pub fn cached_project(&self, chat_id: &str) -> Option<&CachedProject> {
        self.projects.get(chat_id)
    }

    pub fn analytics(&self) -> &[AnalyticsEvent] {
        &self.analytics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ends the session, handing the store back.
    pub fn into_store(self) -> S {
        self.store
    }
}
