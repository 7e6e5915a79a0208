//! Access to the chat page's markup.
//!
//! The page layout is not under our control and changes often, so every
//! structural assumption lives behind [`ChatDom`]. The default
//! implementation, [`SelectorDom`], is driven by the configurable selector
//! set and resolves message roles through an ordered list of [`RoleRule`]s.

use crate::config::SelectorConfig;
use crate::error::{Error, Result};
use crate::types::Role;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Elements that start a new line when flattening text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "pre", "li", "br", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr",
    "table", "section", "article", "blockquote", "header", "footer",
];

/// Compiled selectors for one page layout.
#[derive(Clone, Debug)]
pub struct SelectorSet {
    pub containers: Vec<Selector>,
    pub message: Selector,
    pub user_message: Selector,
    pub assistant_message: Selector,
    pub message_content: Selector,
    pub code_block: Selector,
    pub timestamp: Selector,
    pub avatar: Selector,
    pub title: Selector,
    pub image: Selector,
    pub code: Selector,
    pub div: Selector,
    pub page_title: Selector,
}

impl SelectorSet {
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            containers: config
                .containers
                .iter()
                .map(|raw| parse_selector(raw))
                .collect::<Result<Vec<_>>>()?,
            message: parse_selector(&config.message)?,
            user_message: parse_selector(&config.user_message)?,
            assistant_message: parse_selector(&config.assistant_message)?,
            message_content: parse_selector(&config.message_content)?,
            code_block: parse_selector(&config.code_block)?,
            timestamp: parse_selector(&config.timestamp)?,
            avatar: parse_selector(&config.avatar)?,
            title: parse_selector(&config.title)?,
            image: parse_selector("img")?,
            code: parse_selector("code")?,
            div: parse_selector("div")?,
            page_title: parse_selector("title")?,
        })
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|_| Error::InvalidSelector(raw.to_string()))
}

/// Capability interface over the chat page.
pub trait ChatDom {
    /// Locate the element holding the conversation.
    fn find_container<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;

    /// Message-like elements inside the container, in document order.
    fn find_messages<'a>(&self, container: ElementRef<'a>) -> Vec<ElementRef<'a>>;

    /// Resolve the author of a message element, `None` when unrecognizable.
    fn classify_role(&self, element: ElementRef<'_>) -> Option<Role>;

    /// Visible text of an element, line breaks kept between block elements.
    fn extract_text(&self, element: ElementRef<'_>) -> String;
}

/// One step of the role cascade.
pub trait RoleRule {
    fn name(&self) -> &'static str;

    fn classify(&self, element: ElementRef<'_>) -> Option<Role>;
}

/// The element itself matches the user or assistant selector.
pub struct StructuralRule {
    user: Selector,
    assistant: Selector,
}

impl StructuralRule {
    pub fn new(user: Selector, assistant: Selector) -> Self {
        Self { user, assistant }
    }
}

impl RoleRule for StructuralRule {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn classify(&self, element: ElementRef<'_>) -> Option<Role> {
        if self.user.matches(&element) {
            Some(Role::User)
        } else if self.assistant.matches(&element) {
            Some(Role::Assistant)
        } else {
            None
        }
    }
}

/// An explicit role attribute such as `data-role="user"`.
pub struct DataAttributeRule {
    attribute: String,
}

impl DataAttributeRule {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }
}

impl RoleRule for DataAttributeRule {
    fn name(&self) -> &'static str {
        "data-attribute"
    }

    fn classify(&self, element: ElementRef<'_>) -> Option<Role> {
        let value = element.value().attr(&self.attribute)?;
        match value.trim().to_lowercase().as_str() {
            "user" | "human" => Some(Role::User),
            "assistant" | "ai" | "bot" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Speaker labels written into the message text.
pub struct TextMarkerRule {
    user_markers: Vec<String>,
    assistant_markers: Vec<String>,
}

impl Default for TextMarkerRule {
    fn default() -> Self {
        Self {
            user_markers: vec!["You:".into()],
            assistant_markers: vec!["Assistant:".into()],
        }
    }
}

impl RoleRule for TextMarkerRule {
    fn name(&self) -> &'static str {
        "text-marker"
    }

    fn classify(&self, element: ElementRef<'_>) -> Option<Role> {
        let text = element_text(element);
        if self.user_markers.iter().any(|marker| text.contains(marker.as_str())) {
            Some(Role::User)
        } else if self
            .assistant_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
        {
            Some(Role::Assistant)
        } else {
            None
        }
    }
}

/// Alt text of the first avatar image inside the message.
pub struct AvatarRule {
    avatar: Selector,
}

impl AvatarRule {
    pub fn new(avatar: Selector) -> Self {
        Self { avatar }
    }
}

impl RoleRule for AvatarRule {
    fn name(&self) -> &'static str {
        "avatar"
    }

    fn classify(&self, element: ElementRef<'_>) -> Option<Role> {
        let avatar = select_within(element, &self.avatar).into_iter().next()?;
        let alt = avatar.value().attr("alt")?.to_lowercase();
        if alt.contains("user") {
            Some(Role::User)
        } else if alt.contains("assistant") {
            Some(Role::Assistant)
        } else {
            None
        }
    }
}

/// Selector-driven [`ChatDom`] with a prioritized role cascade.
pub struct SelectorDom {
    selectors: SelectorSet,
    rules: Vec<Box<dyn RoleRule>>,
}

impl SelectorDom {
    /// Default cascade: structure, then data attribute, then text marker,
    /// then avatar hint.
    pub fn new(selectors: SelectorSet) -> Self {
        let rules: Vec<Box<dyn RoleRule>> = vec![
            Box::new(StructuralRule::new(
                selectors.user_message.clone(),
                selectors.assistant_message.clone(),
            )),
            Box::new(DataAttributeRule::new("data-role")),
            Box::new(TextMarkerRule::default()),
            Box::new(AvatarRule::new(selectors.avatar.clone())),
        ];
        Self { selectors, rules }
    }

    pub fn with_rules(selectors: SelectorSet, rules: Vec<Box<dyn RoleRule>>) -> Self {
        Self { selectors, rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

impl ChatDom for SelectorDom {
    fn find_container<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        for selector in &self.selectors.containers {
            if let Some(found) = document.select(selector).next() {
                let candidate = closest_div(found);
                if !self.find_messages(candidate).is_empty() {
                    return Some(candidate);
                }
            }
        }

        // Fallback: the div holding the most message-like descendants.
        let mut best: Option<(usize, ElementRef<'a>)> = None;
        for div in document.select(&self.selectors.div) {
            let count = self.find_messages(div).len();
            if count > best.map(|(max, _)| max).unwrap_or(0) {
                best = Some((count, div));
            }
        }
        best.map(|(_, div)| div)
    }

    fn find_messages<'a>(&self, container: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        outermost(select_within(container, &self.selectors.message))
    }

    fn classify_role(&self, element: ElementRef<'_>) -> Option<Role> {
        self.rules.iter().find_map(|rule| rule.classify(element))
    }

    fn extract_text(&self, element: ElementRef<'_>) -> String {
        element_text(element)
    }
}

/// Matches strictly below `scope`, in document order.
pub(crate) fn select_within<'a>(scope: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    scope
        .select(selector)
        .filter(|element| element.id() != scope.id())
        .collect()
}

/// Drop elements nested inside another element of the same list.
pub(crate) fn outermost<'a>(elements: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
    let ids: HashSet<_> = elements.iter().map(|element| element.id()).collect();
    elements
        .into_iter()
        .filter(|element| !element.ancestors().any(|ancestor| ids.contains(&ancestor.id())))
        .collect()
}

fn closest_div(element: ElementRef<'_>) -> ElementRef<'_> {
    if element.value().name() == "div" {
        return element;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "div")
        .unwrap_or(element)
}

/// Flatten an element's text, breaking lines at block boundaries.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) if node.id() != element.id() => {
                if BLOCK_TAGS.contains(&inner.name()) && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom() -> SelectorDom {
        SelectorDom::new(SelectorSet::compile(&SelectorConfig::default()).unwrap())
    }

    fn first<'a>(document: &'a Html, css: &str) -> ElementRef<'a> {
        document.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn default_cascade_order() {
        assert_eq!(
            dom().rule_names(),
            vec!["structural", "data-attribute", "text-marker", "avatar"]
        );
    }

    #[test]
    fn structural_match_beats_text_marker() {
        let html = Html::parse_fragment(r#"<div class="message user-turn">Assistant: hi</div>"#);
        assert_eq!(dom().classify_role(first(&html, "div")), Some(Role::User));
    }

    #[test]
    fn cascade_falls_through_to_later_rules() {
        let dom = dom();
        let by_attr = Html::parse_fragment(r#"<section data-role="assistant">x</section>"#);
        assert_eq!(dom.classify_role(first(&by_attr, "section")), Some(Role::Assistant));

        let by_text = Html::parse_fragment("<section>You: how do I start?</section>");
        assert_eq!(dom.classify_role(first(&by_text, "section")), Some(Role::User));

        let by_avatar =
            Html::parse_fragment(r#"<section><img class="avatar" alt="assistant"> hello</section>"#);
        assert_eq!(dom.classify_role(first(&by_avatar, "section")), Some(Role::Assistant));

        let unknown = Html::parse_fragment("<section>nothing to see</section>");
        assert_eq!(dom.classify_role(first(&unknown, "section")), None);
    }

    #[test]
    fn nested_message_matches_are_collapsed() {
        let html = Html::parse_document(
            r#"<div class="chat-box">
                 <div class="message user"><div class="message-content">one</div></div>
                 <div class="message assistant"><div class="message-content">two</div></div>
               </div>"#,
        );
        let dom = dom();
        let container = dom.find_container(&html).unwrap();
        assert_eq!(container.value().attr("class"), Some("chat-box"));
        assert_eq!(dom.find_messages(container).len(), 2);
    }

    #[test]
    fn fallback_scan_picks_div_with_most_messages() {
        let html = Html::parse_document(
            r#"<main><div id="side"><p class="message">a</p></div>
               <div id="thread"><p class="message">b</p><p class="message">c</p></div></main>"#,
        );
        let dom = dom();
        let container = dom.find_container(&html).unwrap();
        assert_eq!(container.value().attr("id"), Some("thread"));
    }

    #[test]
    fn no_messages_means_no_container() {
        let html = Html::parse_document("<div><p>plain page</p></div>");
        assert!(dom().find_container(&html).is_none());
    }

    #[test]
    fn block_elements_break_lines() {
        let html = Html::parse_fragment("<div><p>first</p><p>second <b>bold</b></p></div>");
        assert_eq!(element_text(first(&html, "div")), "first\nsecond bold");
    }

    #[test]
    fn bad_selector_is_reported() {
        let config = SelectorConfig {
            message: "[[nope".into(),
            ..SelectorConfig::default()
        };
        assert!(matches!(
            SelectorSet::compile(&config),
            Err(Error::InvalidSelector(raw)) if raw == "[[nope"
        ));
    }
}
