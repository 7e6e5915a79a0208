//! Code language resolution for extracted blocks.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

static LANGUAGE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"language-([\w+#-]+)").unwrap());

/// First-line keyword table, checked in order. The first language with a
/// matching keyword wins.
pub const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    (
        "javascript",
        &["function", "const ", "let ", "var ", "=>", "console.", "import ", "export "],
    ),
    ("python", &["def ", "import ", "from ", "class ", "print(", "if __name__"]),
    ("html", &["<!doctype", "<html", "<body", "<div", "<span", "<p>"]),
    ("css", &["{", "}", ":", ";", "color:", "font-"]),
    ("java", &["public class", "void main", "system.out"]),
    ("cpp", &["#include", "using namespace", "cout <<"]),
    ("php", &["<?php", "echo ", "$_"]),
    ("sql", &["select ", "from ", "where ", "insert into"]),
    ("bash", &["#!/bin/", "echo ", "cd ", "mkdir ", "cp ", "mv "]),
    ("json", &["{", "}", "\"", ":"]),
    ("markdown", &["# ", "## ", "```", "|", "---"]),
];

/// Resolve a block's language: declared class, then `data-language`, then
/// the keyword table, then `"text"`.
pub fn resolve_language(element: ElementRef<'_>, code: &str) -> String {
    declared_language(element).unwrap_or_else(|| detect_language(code))
}

/// Language declared in markup on the element or on a nested `<code>`.
pub fn declared_language(element: ElementRef<'_>) -> Option<String> {
    std::iter::once(element)
        .chain(
            element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|inner| inner.value().name() == "code"),
        )
        .find_map(|candidate| {
            let class_hint = candidate
                .value()
                .attr("class")
                .and_then(|class| LANGUAGE_CLASS.captures(class))
                .map(|captures| captures[1].to_string());
            class_hint.or_else(|| {
                candidate
                    .value()
                    .attr("data-language")
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        })
        .map(|language| normalize_language(&language))
}

/// Guess from the first line of code.
pub fn detect_language(code: &str) -> String {
    let first_line = code.lines().next().unwrap_or_default().to_lowercase();
    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| first_line.contains(keyword)))
        .map(|(language, _)| language.to_string())
        .unwrap_or_else(|| "text".to_string())
}

/// Map common short names onto the canonical names used by the analyzer.
pub fn normalize_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "js" | "node" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "py" | "python3" => "python",
        "sh" | "shell" | "zsh" => "bash",
        "htm" | "xhtml" => "html",
        "md" => "markdown",
        "c++" | "cc" | "cxx" => "cpp",
        "yml" => "yaml",
        "plaintext" | "plain" | "txt" | "" => "text",
        other => other,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(document: &'a Html, css: &str) -> ElementRef<'a> {
        document.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn declared_class_wins() {
        let html = Html::parse_fragment(r#"<pre><code class="language-py">x = 1</code></pre>"#);
        assert_eq!(resolve_language(first(&html, "pre"), "x = 1"), "python");
    }

    #[test]
    fn data_attribute_used_when_no_class() {
        let html = Html::parse_fragment(r#"<pre data-language="Rust">fn main() {}</pre>"#);
        assert_eq!(resolve_language(first(&html, "pre"), "fn main() {}"), "rust");
    }

    #[test]
    fn keyword_table_is_ordered() {
        assert_eq!(detect_language("const x = 1;"), "javascript");
        assert_eq!(detect_language("def main():\n    pass"), "python");
        assert_eq!(detect_language("<!DOCTYPE html>\n<html>"), "html");
        assert_eq!(detect_language("INSERT INTO users VALUES (1)"), "sql");
        // "from " is a python keyword and python is checked first.
        assert_eq!(detect_language("SELECT * FROM users"), "python");
        assert_eq!(detect_language("#include <stdio.h>"), "cpp");
        assert_eq!(detect_language("hello world"), "text");
    }

    #[test]
    fn only_first_line_counts() {
        assert_eq!(detect_language("hello\nconst x = 1;"), "text");
    }
}
