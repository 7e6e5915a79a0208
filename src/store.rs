//! Local persistence of captured chats.

use crate::error::{Error, Result};
use crate::extractor::enhance::EnhancedChat;
use crate::extractor::short_hash;
use crate::types::{Chat, ChatSummary};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Record store keyed by chat id.
pub trait ChatStore {
    /// Insert or replace a record, stamping it with `saved_at`.
    fn put(&mut self, record: EnhancedChat, saved_at: DateTime<Utc>) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<EnhancedChat>>;

    /// Returns whether a record was removed.
    fn delete(&mut self, id: &str) -> Result<bool>;

    /// Matching records, newest capture first.
    fn query(&self, filter: &ChatFilter) -> Result<Vec<EnhancedChat>>;

    fn last_saved(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.get(id)?.and_then(|record| record.last_updated))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatFilter {
    /// Case-insensitive match against title, id and message content.
    pub search_query: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub has_code: Option<bool>,
    pub limit: Option<usize>,
}

impl ChatFilter {
    pub fn matches(&self, chat: &Chat) -> bool {
        if self.since.is_some_and(|since| chat.captured_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| chat.captured_at > until) {
            return false;
        }
        if self.has_code.is_some_and(|has_code| chat.has_code_blocks != has_code) {
            return false;
        }
        match self.search_query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                let query = query.to_lowercase();
                chat.title.to_lowercase().contains(&query)
                    || chat.id.to_lowercase().contains(&query)
                    || chat
                        .messages
                        .iter()
                        .any(|message| message.content.to_lowercase().contains(&query))
            }
            _ => true,
        }
    }
}

/// One pretty-printed JSON file per chat inside a directory.
#[derive(Debug)]
pub struct JsonDirStore {
    dir: PathBuf,
    storage_limit: u64,
    initialized: bool,
}

impl JsonDirStore {
    pub fn new(dir: impl AsRef<Path>, storage_limit: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            storage_limit,
            initialized: false,
        }
    }

    /// Create the directory if needed. Every other call fails until this
    /// has succeeded.
    pub fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.initialized = true;
        debug!(dir = %self.dir.display(), "chat store ready");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total bytes used by stored records.
    pub fn usage_bytes(&self) -> Result<u64> {
        self.ensure_ready()?;
        let mut total = 0;
        for path in self.record_paths()? {
            total += fs::metadata(&path)?.len();
        }
        Ok(total)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::StorageUnavailable(format!(
                "store at `{}` is not initialized",
                self.dir.display()
            )))
        }
    }

    /// Safe ids map to `<id>.json`. Any other id is sanitized and suffixed
    /// with a hash of the original, so distinct ids never share a file.
    fn record_path(&self, id: &str) -> PathBuf {
        let is_safe = |ch: char| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-';
        if !id.is_empty() && id.chars().all(is_safe) {
            return self.dir.join(format!("{id}.json"));
        }
        let file_stem: String = id
            .chars()
            .map(|ch| if is_safe(ch) { ch } else { '_' })
            .collect();
        self.dir.join(format!("{file_stem}~{}.json", short_hash(id)))
    }

    /// The record stored for `id`, if the file at its path really holds it.
    fn load(&self, id: &str) -> Result<Option<(PathBuf, EnhancedChat)>> {
        let path = self.record_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        let record = Self::read_record(&path)?;
        if record.chat.id != id {
            warn!(
                id,
                stored = %record.chat.id,
                path = %path.display(),
                "record file holds another chat"
            );
            return Ok(None);
        }
        Ok(Some((path, record)))
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_record(path: &Path) -> Result<EnhancedChat> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl ChatStore for JsonDirStore {
    fn put(&mut self, mut record: EnhancedChat, saved_at: DateTime<Utc>) -> Result<()> {
        self.ensure_ready()?;
        record.last_updated = Some(saved_at);
        let path = self.record_path(&record.chat.id);
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        debug!(id = %record.chat.id, path = %path.display(), "saved chat");

        let usage = self.usage_bytes()?;
        if usage > self.storage_limit {
            warn!(
                usage = %crate::display_bytes(usage),
                limit = %crate::display_bytes(self.storage_limit),
                "chat store exceeds its storage limit"
            );
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<EnhancedChat>> {
        self.ensure_ready()?;
        Ok(self.load(id)?.map(|(_, record)| record))
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        self.ensure_ready()?;
        let Some((path, _)) = self.load(id)? else {
            return Ok(false);
        };
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn query(&self, filter: &ChatFilter) -> Result<Vec<EnhancedChat>> {
        self.ensure_ready()?;
        let mut records = Vec::new();
        for path in self.record_paths()? {
            match Self::read_record(&path) {
                Ok(record) if filter.matches(&record.chat) => records.push(record),
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| b.chat.captured_at.cmp(&a.chat.captured_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

/// Summaries sorted newest first; ties keep input order.
pub fn build_summaries(chats: &[Chat]) -> Vec<ChatSummary> {
    let mut summaries: Vec<_> = chats
        .iter()
        .enumerate()
        .map(|(index, chat)| ChatSummary {
            index,
            id: chat.id.clone(),
            title: if chat.title.trim().is_empty() {
                "(untitled chat)".to_string()
            } else {
                chat.title.clone()
            },
            captured_at: chat.captured_at,
            message_count: chat.message_count,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.captured_at
            .cmp(&a.captured_at)
            .then_with(|| a.index.cmp(&b.index))
    });
    summaries
}

/// Summaries whose title or id contains `query`, ignoring case.
pub fn filter_summaries<'a>(summaries: &'a [ChatSummary], query: &str) -> Vec<&'a ChatSummary> {
    let query_lower = query.to_lowercase();
    summaries
        .iter()
        .filter(|summary| {
            query.is_empty()
                || summary.title.to_lowercase().contains(&query_lower)
                || summary.id.to_lowercase().contains(&query_lower)
        })
        .collect()
}

/// Resolve a user-supplied reference to a position in `summaries`: a
/// 1-based number, an exact id, or a unique id prefix.
pub fn resolve_chat_id(reference: &str, summaries: &[ChatSummary]) -> Result<usize> {
    if let Ok(number) = reference.parse::<usize>() {
        if number == 0 || number > summaries.len() {
            return Err(Error::UnknownChat(format!(
                "chat number {} out of range (1..={})",
                number,
                summaries.len()
            )));
        }
        return Ok(number - 1);
    }

    if let Some(position) = summaries.iter().position(|summary| summary.id == reference) {
        return Ok(position);
    }

    let matching: Vec<usize> = summaries
        .iter()
        .enumerate()
        .filter(|(_, summary)| summary.id.starts_with(reference))
        .map(|(position, _)| position)
        .collect();

    match matching.as_slice() {
        [] => Err(Error::UnknownChat(format!("no chat matches `{reference}`"))),
        [only] => Ok(*only),
        _ => Err(Error::UnknownChat(format!(
            "ambiguous reference `{}`: matches {} chats",
            reference,
            matching.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::enhance::enhance_chat;
    use crate::types::{ChatMetadata, Message, Role};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn chat(id: &str, title: &str, hours: i64, text: &str) -> Chat {
        let at = base() + Duration::hours(hours);
        Chat {
            id: id.into(),
            title: title.into(),
            messages: vec![Message {
                id: "msg_0".into(),
                role: Role::User,
                content: text.into(),
                raw_content: text.into(),
                code_blocks: Vec::new(),
                images: Vec::new(),
                timestamp: at,
                position: 0,
            }],
            metadata: ChatMetadata {
                title: title.into(),
                conversation_title: None,
                url: String::new(),
                parsed_at: at,
            },
            captured_at: at,
            url: String::new(),
            has_code_blocks: false,
            message_count: 1,
        }
    }

    fn ready_store(dir: &TempDir) -> JsonDirStore {
        let mut store = JsonDirStore::new(dir.path().join("chats"), 1024 * 1024);
        store.initialize().unwrap();
        store
    }

    #[test]
    fn uninitialized_store_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path(), 10);
        assert!(matches!(store.get("x"), Err(Error::StorageUnavailable(_))));
    }

    #[test]
    fn put_get_delete() {
        let dir = TempDir::new().unwrap();
        let mut store = ready_store(&dir);
        let record = enhance_chat(&chat("chat_a_1", "Alpha", 0, "hello"));

        store.put(record.clone(), base()).unwrap();
        let loaded = store.get("chat_a_1").unwrap().unwrap();
        assert_eq!(loaded.chat, record.chat);
        assert_eq!(store.last_saved("chat_a_1").unwrap(), Some(base()));

        assert!(store.delete("chat_a_1").unwrap());
        assert!(!store.delete("chat_a_1").unwrap());
        assert!(store.get("chat_a_1").unwrap().is_none());
    }

    #[test]
    fn ids_differing_only_in_unsafe_characters_stay_apart() {
        let dir = TempDir::new().unwrap();
        let mut store = ready_store(&dir);
        store.put(enhance_chat(&chat("a.b", "Dotted", 0, "one")), base()).unwrap();
        store.put(enhance_chat(&chat("a_b", "Plain", 1, "two")), base()).unwrap();
        store.put(enhance_chat(&chat("a/b", "Slashed", 2, "three")), base()).unwrap();

        assert_eq!(store.get("a.b").unwrap().unwrap().chat.title, "Dotted");
        assert_eq!(store.get("a_b").unwrap().unwrap().chat.title, "Plain");
        assert_eq!(store.get("a/b").unwrap().unwrap().chat.title, "Slashed");
        assert_eq!(store.query(&ChatFilter::default()).unwrap().len(), 3);

        assert!(store.delete("a.b").unwrap());
        assert!(store.get("a_b").unwrap().is_some());
    }

    #[test]
    fn record_under_another_id_is_not_returned() {
        let dir = TempDir::new().unwrap();
        let mut store = ready_store(&dir);
        store.put(enhance_chat(&chat("chat_a_1", "Alpha", 0, "hi")), base()).unwrap();
        fs::rename(
            dir.path().join("chats/chat_a_1.json"),
            dir.path().join("chats/chat_b_2.json"),
        )
        .unwrap();
        assert!(store.get("chat_b_2").unwrap().is_none());
        assert!(!store.delete("chat_b_2").unwrap());
    }

    #[test]
    fn query_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let mut store = ready_store(&dir);
        store.put(enhance_chat(&chat("chat_old_1", "Old", 0, "rust tips")), base()).unwrap();
        store.put(enhance_chat(&chat("chat_new_2", "New", 5, "Rust macros")), base()).unwrap();
        store.put(enhance_chat(&chat("chat_py_3", "Py", 3, "python")), base()).unwrap();

        let filter = ChatFilter {
            search_query: Some("RUST".into()),
            ..ChatFilter::default()
        };
        let ids: Vec<_> = store
            .query(&filter)
            .unwrap()
            .into_iter()
            .map(|record| record.chat.id)
            .collect();
        assert_eq!(ids, vec!["chat_new_2", "chat_old_1"]);

        let recent = ChatFilter {
            since: Some(base() + Duration::hours(1)),
            limit: Some(1),
            ..ChatFilter::default()
        };
        let records = store.query(&recent).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chat.id, "chat_new_2");
    }

    #[test]
    fn summaries_newest_first_and_resolution() {
        let chats = vec![
            chat("chat_alpha_1", "Alpha", 0, "a"),
            chat("chat_beta_2", "  ", 2, "b"),
            chat("chat_alpine_3", "Alpine", 1, "c"),
        ];
        let summaries = build_summaries(&chats);
        let ids: Vec<_> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["chat_beta_2", "chat_alpine_3", "chat_alpha_1"]);
        assert_eq!(summaries[0].title, "(untitled chat)");

        assert_eq!(filter_summaries(&summaries, "alp").len(), 2);
        assert_eq!(resolve_chat_id("1", &summaries).unwrap(), 0);
        assert_eq!(resolve_chat_id("chat_alpha_1", &summaries).unwrap(), 2);
        assert_eq!(resolve_chat_id("chat_b", &summaries).unwrap(), 0);
        assert!(matches!(resolve_chat_id("chat_alp", &summaries), Err(Error::UnknownChat(_))));
        assert!(matches!(resolve_chat_id("0", &summaries), Err(Error::UnknownChat(_))));
        assert!(matches!(resolve_chat_id("zzz", &summaries), Err(Error::UnknownChat(_))));
    }
}
