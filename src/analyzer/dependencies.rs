//! External package names from import statements.

use super::rules::{JAVA_PLATFORM, PYTHON_STDLIB};
use once_cell::sync::Lazy;
use regex::Regex;

static JS_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"from\s+['"]([^'"]+)['"]"#,
        r#"import\s+['"]([^'"]+)['"]"#,
        r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

// `from x import y` captures the module; `import a, b as c` captures the list.
static PY_IMPORTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:from[ \t]+(\S+)[ \t]+import\b|import[ \t]+([^#;\n]+))").unwrap()
});

static JAVA_IMPORTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"import\s+(?:static\s+)?([\w.]+)\s*;").unwrap());

/// Package names imported by `code`, in order of appearance. Relative
/// imports and standard-library modules are skipped.
pub fn extract_dependencies(code: &str, language: &str) -> Vec<String> {
    let mut found = Vec::new();
    match language {
        "javascript" | "typescript" | "jsx" | "tsx" => {
            for pattern in JS_IMPORTS.iter() {
                for captures in pattern.captures_iter(code) {
                    push_unique(&mut found, js_package(&captures[1]));
                }
            }
        }
        "python" => {
            for captures in PY_IMPORTS.captures_iter(code) {
                if let Some(module) = captures.get(1) {
                    push_unique(&mut found, python_package(module.as_str()));
                } else if let Some(list) = captures.get(2) {
                    let modules = list
                        .as_str()
                        .split(',')
                        .filter_map(|item| item.split_whitespace().next());
                    for module in modules {
                        push_unique(&mut found, python_package(module));
                    }
                }
            }
        }
        "java" => {
            for captures in JAVA_IMPORTS.captures_iter(code) {
                push_unique(&mut found, java_package(&captures[1]));
            }
        }
        _ => {}
    }
    found
}

fn push_unique(found: &mut Vec<String>, candidate: Option<String>) {
    if let Some(name) = candidate {
        if !found.contains(&name) {
            found.push(name);
        }
    }
}

fn js_package(specifier: &str) -> Option<String> {
    if specifier.is_empty() || specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }
    let mut segments = specifier.split('/');
    let first = segments.next()?;
    if first.starts_with('@') {
        let name = segments.next()?;
        return Some(format!("{first}/{name}"));
    }
    Some(first.to_string())
}

fn python_package(module: &str) -> Option<String> {
    let root = module.split('.').next()?;
    if root.is_empty() || PYTHON_STDLIB.contains(&root) {
        return None;
    }
    Some(root.to_string())
}

fn java_package(path: &str) -> Option<String> {
    if JAVA_PLATFORM.iter().any(|prefix| path.starts_with(prefix)) {
        return None;
    }
    path.split('.')
        .next()
        .filter(|root| !root.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn javascript_packages() {
        let code = r#"import React from 'react';
import { render } from "react-dom/client";
import './index.css';
const express = require('express');
const util = require('../util');
import styled from '@emotion/styled/macro';"#;
        assert_eq!(
            extract_dependencies(code, "javascript"),
            vec!["react", "react-dom", "@emotion/styled", "express"]
        );
    }

    #[test]
    fn python_packages_skip_stdlib_and_relative() {
        let code = "import os, sys\nimport numpy as np\nfrom flask import Flask\nfrom . import views\nfrom requests.adapters import HTTPAdapter\nimport json";
        assert_eq!(extract_dependencies(code, "python"), vec!["numpy", "flask", "requests"]);
    }

    #[test]
    fn python_import_lists_keep_every_module() {
        let code = "import numpy, requests
import os, pandas as pd, yaml  # config
import numpy";
        assert_eq!(
            extract_dependencies(code, "python"),
            vec!["numpy", "requests", "pandas", "yaml"]
        );
    }

    #[test]
    fn java_skips_platform_packages() {
        let code = "import java.util.List;\nimport javax.swing.JFrame;\nimport com.google.gson.Gson;\nimport static org.junit.Assert.assertEquals;";
        assert_eq!(extract_dependencies(code, "java"), vec!["com", "org"]);
    }

    #[test]
    fn other_languages_have_none() {
        assert!(extract_dependencies("#include <vector>", "cpp").is_empty());
    }
}
