//! Content extraction: turns a chat page into a [`Chat`].
//!
//! Extraction is best-effort. A page without a recognizable conversation
//! yields `None`, a message that cannot be attributed to either side is
//! dropped, and a malformed message is skipped without failing the rest.

pub mod dom;
pub mod enhance;
pub mod language;
pub mod page;
pub mod timestamp;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Chat, ChatMetadata, CodeBlock, Image, Message};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, warn};

use dom::{ChatDom, SelectorDom, SelectorSet, outermost, select_within};
use page::{PageSnapshot, PageSource};

static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

const SITE_SUFFIXES: &[&str] = &[" - DeepSeek", "DeepSeek - "];

/// Parses the current page on demand, throttled, caching the last result.
pub struct ChatExtractor<D: ChatDom = SelectorDom> {
    dom: D,
    selectors: SelectorSet,
    throttle: Duration,
    last_parse_at: Option<DateTime<Utc>>,
    cached: Option<Chat>,
}

impl ChatExtractor<SelectorDom> {
    pub fn new(config: &Config) -> Result<Self> {
        let selectors = SelectorSet::compile(&config.selectors)?;
        Ok(Self::with_dom(
            SelectorDom::new(selectors.clone()),
            selectors,
            config.parse_throttle_ms,
        ))
    }
}

impl<D: ChatDom> ChatExtractor<D> {
    pub fn with_dom(dom: D, selectors: SelectorSet, throttle_ms: u64) -> Self {
        Self {
            dom,
            selectors,
            throttle: Duration::milliseconds(throttle_ms as i64),
            last_parse_at: None,
            cached: None,
        }
    }

    /// The most recent chat on the page, or `None` when there is none.
    pub fn extract_current_chat(&mut self, page: &dyn PageSource) -> Option<Chat> {
        self.extract_current_chat_at(page, Utc::now())
    }

    /// As [`Self::extract_current_chat`] with an explicit clock reading.
    /// Calls inside the throttle window return the cached chat without
    /// touching the page.
    pub fn extract_current_chat_at(
        &mut self,
        page: &dyn PageSource,
        now: DateTime<Utc>,
    ) -> Option<Chat> {
        if let Some(last) = self.last_parse_at {
            let elapsed = now - last;
            if elapsed >= Duration::zero() && elapsed < self.throttle {
                return self.cached.clone();
            }
        }

        let parsed = page
            .snapshot()
            .and_then(|snapshot| self.parse_snapshot(&snapshot, now));
        match parsed {
            Ok(chat) => {
                self.cached = Some(chat.clone());
                self.last_parse_at = Some(now);
                Some(chat)
            }
            Err(Error::ContainerNotFound) => {
                debug!("no chat container on page");
                None
            }
            Err(err) => {
                warn!(error = %err, "chat parsing failed");
                None
            }
        }
    }

    /// Parse one snapshot, ignoring the throttle and cache.
    pub fn parse_snapshot(&self, snapshot: &PageSnapshot, captured_at: DateTime<Utc>) -> Result<Chat> {
        let document = Html::parse_document(&snapshot.html);
        let container = self
            .dom
            .find_container(&document)
            .ok_or(Error::ContainerNotFound)?;

        let candidates = self.dom.find_messages(container);
        if candidates.is_empty() {
            return Err(Error::ContainerNotFound);
        }

        let count = candidates.len();
        let mut messages = Vec::with_capacity(count);
        for (index, element) in candidates.into_iter().enumerate() {
            match self.parse_message(element, index, count, captured_at) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => debug!(index, "dropping message with no recognizable role"),
                Err(err) => warn!(index, error = %err, "skipping message"),
            }
        }

        let metadata = self.extract_metadata(&document, container, snapshot, captured_at);
        let title = if !metadata.title.is_empty() {
            metadata.title.clone()
        } else if let Some(conversation_title) = &metadata.conversation_title {
            conversation_title.clone()
        } else {
            format!("Chat {}", captured_at.format("%Y-%m-%d"))
        };

        Ok(Chat {
            id: chat_id(&title, &messages),
            title,
            has_code_blocks: messages.iter().any(Message::has_code),
            message_count: messages.len(),
            messages,
            url: snapshot.url.clone(),
            captured_at,
            metadata,
        })
    }

    fn parse_message(
        &self,
        element: ElementRef<'_>,
        index: usize,
        count: usize,
        captured_at: DateTime<Utc>,
    ) -> Result<Option<Message>> {
        let Some(role) = self.dom.classify_role(element) else {
            return Ok(None);
        };

        let content_element = select_within(element, &self.selectors.message_content)
            .into_iter()
            .next()
            .unwrap_or(element);
        let raw_content = self.dom.extract_text(content_element);
        let content = clean_content(&raw_content);
        let code_blocks = self.extract_code_blocks(content_element, index);
        let images = self.extract_images(element, index);

        if content.is_empty() && code_blocks.is_empty() && images.is_empty() {
            return Err(Error::ParseFailure {
                index,
                reason: "message has no content".to_string(),
            });
        }

        let timestamp = self.message_timestamp(element, index, count, captured_at);

        Ok(Some(Message {
            id: format!("msg_{}_{}", index, short_hash(&content)),
            role,
            content,
            raw_content,
            code_blocks,
            images,
            timestamp,
            position: index,
        }))
    }

    fn extract_code_blocks(&self, element: ElementRef<'_>, message_index: usize) -> Vec<CodeBlock> {
        let mut blocks = Vec::new();

        let code_elements = outermost(select_within(element, &self.selectors.code_block));
        for (n, code_element) in code_elements.iter().copied().enumerate() {
            let code: String = code_element.text().collect();
            let language = language::resolve_language(code_element, &code);
            if let Some(block) =
                CodeBlock::new(format!("code_{message_index}_{n}"), code, language, false)
            {
                blocks.push(block);
            }
        }

        let prose = prose_text(element, &code_elements);
        for (n, captures) in INLINE_CODE.captures_iter(&prose).enumerate() {
            if let Some(block) = CodeBlock::new(
                format!("inline_{message_index}_{n}"),
                captures[1].to_string(),
                "text".to_string(),
                true,
            ) {
                blocks.push(block);
            }
        }

        blocks
    }

    fn extract_images(&self, element: ElementRef<'_>, message_index: usize) -> Vec<Image> {
        select_within(element, &self.selectors.image)
            .into_iter()
            .filter_map(|img| {
                let attrs = img.value();
                let src = attrs
                    .attr("src")
                    .or_else(|| attrs.attr("data-src"))
                    .map(str::trim)
                    .filter(|src| !src.is_empty() && !src.starts_with("data:"))?;
                Some((src.to_string(), attrs))
            })
            .enumerate()
            .map(|(n, (src, attrs))| Image {
                id: format!("img_{message_index}_{n}"),
                src,
                alt: attrs.attr("alt").unwrap_or_default().to_string(),
                width: attrs.attr("width").and_then(|value| value.trim().parse().ok()),
                height: attrs.attr("height").and_then(|value| value.trim().parse().ok()),
            })
            .collect()
    }

    fn message_timestamp(
        &self,
        element: ElementRef<'_>,
        index: usize,
        count: usize,
        captured_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let time_element = select_within(element, &self.selectors.timestamp)
            .into_iter()
            .next();
        let datetime_attr = time_element.and_then(|time| time.value().attr("datetime"));
        let text = time_element.map(|time| time.text().collect::<String>());
        timestamp::resolve_timestamp(
            datetime_attr,
            text.as_deref().map(str::trim).filter(|text| !text.is_empty()),
            captured_at,
            index,
            count,
        )
    }

    fn extract_metadata(
        &self,
        document: &Html,
        container: ElementRef<'_>,
        snapshot: &PageSnapshot,
        captured_at: DateTime<Utc>,
    ) -> ChatMetadata {
        let page_title = document
            .select(&self.selectors.page_title)
            .next()
            .map(|title| strip_site_suffix(&title.text().collect::<String>()))
            .unwrap_or_default();

        let conversation_title = select_within(container, &self.selectors.title)
            .into_iter()
            .map(|heading| clean_content(&heading.text().collect::<String>()))
            .find(|text| {
                let length = text.chars().count();
                length > 5 && length < 100
            });

        ChatMetadata {
            title: page_title,
            conversation_title,
            url: snapshot.url.clone(),
            parsed_at: captured_at,
        }
    }
}

/// Text of `element` outside the given code elements. Backticks inside a
/// fenced block are part of that block, not inline spans.
fn prose_text(element: ElementRef<'_>, code_elements: &[ElementRef<'_>]) -> String {
    let excluded: HashSet<_> = code_elements.iter().map(|code| code.id()).collect();
    element
        .descendants()
        .filter(|node| !node.ancestors().any(|ancestor| excluded.contains(&ancestor.id())))
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        })
        .collect()
}

/// Normalize visible text: drop zero-width characters, collapse whitespace
/// runs, trim. Identical visual text always yields identical content.
pub fn clean_content(raw: &str) -> String {
    let visible: String = raw.chars().filter(|ch| !ZERO_WIDTH.contains(ch)).collect();
    visible.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable chat id from the title and the first/last message content.
pub fn chat_id(title: &str, messages: &[Message]) -> String {
    let hash_input = if messages.len() > 2 {
        let first = &messages[0].content;
        let last = &messages[messages.len() - 1].content;
        format!("{first}{last}")
    } else {
        messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<String>()
    };

    let slug: String = title
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_whitespace() { '_' } else { ch })
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-')
        .collect();
    let slug = if slug.is_empty() { "untitled".to_string() } else { slug };

    format!("chat_{}_{}", slug, short_hash(&hash_input))
}

/// Two captures describe the same chat when id and message count agree.
pub fn is_same_chat(a: Option<&Chat>, b: Option<&Chat>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id == b.id && a.message_count == b.message_count,
        _ => false,
    }
}

pub(crate) fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

fn strip_site_suffix(title: &str) -> String {
    let mut title = clean_content(title);
    for suffix in SITE_SUFFIXES {
        title = title.replace(suffix, "");
    }
    title.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::TimeZone;
    use std::cell::Cell;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Todo planning - DeepSeek</title></head>
<body>
  <div class="chat-container">
    <h2 class="chat-title">Planning a todo application</h2>
    <div class="message user">
      <div class="message-content"><p>Please   build a todo app&#8203; with `localStorage`</p></div>
      <time datetime="2024-05-01T10:00:00Z">10:00</time>
    </div>
    <div class="message assistant">
      <div class="message-content">
        <p>Here is the page:</p>
        <pre><code class="language-html">&lt;!DOCTYPE html&gt;
&lt;html&gt;&lt;body&gt;&lt;/body&gt;&lt;/html&gt;</code></pre>
        <img src="https://cdn.example/diagram.png" alt="diagram" width="640">
        <img src="data:image/png;base64,AAAA">
      </div>
      <span class="timestamp">2 minutes ago</span>
    </div>
    <div class="message system-note"><div class="message-content">joined</div></div>
  </div>
</body></html>"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn extractor() -> ChatExtractor {
        ChatExtractor::new(&Config::default()).unwrap()
    }

    struct CountingPage {
        snapshot: PageSnapshot,
        calls: Cell<usize>,
    }

    impl PageSource for CountingPage {
        fn snapshot(&self) -> Result<PageSnapshot> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.snapshot.clone())
        }
    }

    #[test]
    fn parses_messages_roles_and_code() {
        let snapshot = PageSnapshot::new(PAGE, "https://chat.example/c/1");
        let chat = extractor().parse_snapshot(&snapshot, now()).unwrap();

        assert_eq!(chat.title, "Todo planning");
        assert_eq!(
            chat.metadata.conversation_title.as_deref(),
            Some("Planning a todo application")
        );
        assert_eq!(chat.message_count, 2);
        assert!(chat.has_code_blocks);

        let user = &chat.messages[0];
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "Please build a todo app with `localStorage`");
        assert_eq!(user.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(user.code_blocks.len(), 1);
        assert!(user.code_blocks[0].is_inline);
        assert_eq!(user.code_blocks[0].code, "localStorage");
        assert_eq!(user.code_blocks[0].language, "text");

        let assistant = &chat.messages[1];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.timestamp, now() - Duration::minutes(2));
        assert_eq!(assistant.code_blocks.len(), 1);
        assert_eq!(assistant.code_blocks[0].language, "html");
        assert!(assistant.code_blocks[0].code.starts_with("<!DOCTYPE html>"));
        assert_eq!(assistant.images.len(), 1);
        assert_eq!(assistant.images[0].width, Some(640));
    }

    #[test]
    fn identical_content_gives_identical_ids() {
        let snapshot = PageSnapshot::new(PAGE, "https://chat.example/c/1");
        let first = extractor().parse_snapshot(&snapshot, now()).unwrap();
        let second = extractor()
            .parse_snapshot(&snapshot, now() + Duration::hours(3))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(is_same_chat(Some(&first), Some(&second)));
        assert!(!is_same_chat(Some(&first), None));
    }

    #[test]
    fn throttle_window_skips_reparse() {
        let page = CountingPage {
            snapshot: PageSnapshot::new(PAGE, "https://chat.example/c/1"),
            calls: Cell::new(0),
        };
        let mut extractor = extractor();

        let first = extractor.extract_current_chat_at(&page, now()).unwrap();
        let second = extractor
            .extract_current_chat_at(&page, now() + Duration::milliseconds(500))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(page.calls.get(), 1);

        extractor.extract_current_chat_at(&page, now() + Duration::milliseconds(1500));
        assert_eq!(page.calls.get(), 2);
    }

    #[test]
    fn missing_container_is_none() {
        let page = PageSnapshot::new("<html><body><p>Welcome</p></body></html>", "about:blank");
        let mut extractor = extractor();
        assert!(extractor.extract_current_chat_at(&page, now()).is_none());
        assert!(matches!(
            extractor.parse_snapshot(&page, now()),
            Err(Error::ContainerNotFound)
        ));
    }

    #[test]
    fn empty_message_is_skipped() {
        let html = r#"<div class="chat"><div class="message user"> </div>
            <div class="message assistant">Hello there</div></div>"#;
        let chat = extractor()
            .parse_snapshot(&PageSnapshot::new(html, "u"), now())
            .unwrap();
        assert_eq!(chat.message_count, 1);
        assert_eq!(chat.messages[0].position, 1);
        assert_eq!(chat.title, "Chat 2024-05-01");
    }

    #[test]
    fn absurd_relative_timestamp_uses_position() {
        let html = r#"<div class="chat">
            <div class="message user">Hi<span class="timestamp">99999999999 weeks ago</span></div>
            <div class="message assistant">Hello</div></div>"#;
        let page = PageSnapshot::new(html, "u");
        let chat = extractor()
            .extract_current_chat_at(&page, now())
            .expect("timestamps never abort extraction");
        assert_eq!(chat.messages[0].timestamp, now() - Duration::minutes(1));
        assert_eq!(chat.messages[1].timestamp, now());
    }

    #[test]
    fn cleaning_is_uniform() {
        assert_eq!(clean_content("  a\u{200B}\n\n b\t c\u{FEFF} "), "a b c");
    }

    #[test]
    fn chat_id_uses_first_and_last_only_for_long_chats() {
        let snapshot = PageSnapshot::new(PAGE, "u");
        let chat = extractor().parse_snapshot(&snapshot, now()).unwrap();
        let mut messages = chat.messages.clone();
        messages.push(messages[0].clone());
        let mut middle_changed = messages.clone();
        middle_changed[1].content = "something else".into();
        assert_eq!(chat_id("T", &messages), chat_id("T", &middle_changed));
        assert!(chat_id("My Chat", &messages).starts_with("chat_my_chat_"));
    }
}
