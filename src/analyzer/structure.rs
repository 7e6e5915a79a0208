//! Directory bucketing shared by the layout preview and the archive, so the
//! two always agree.

use super::naming::NameAllocator;
use crate::archive::CONTEXT_FILE;
use crate::types::{ProjectFile, ProjectStructure, ProjectType};

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// Directory a file with this extension belongs in; `None` means the root.
pub fn directory_for(extension: &str, project_type: &ProjectType) -> Option<&'static str> {
    match extension {
        "css" => Some("css"),
        "py" => Some("src"),
        ext if SCRIPT_EXTENSIONS.contains(&ext) => {
            if *project_type == ProjectType::Web {
                Some("js")
            } else {
                Some("src")
            }
        }
        _ => None,
    }
}

/// Path of a file relative to the project root. Names that already carry a
/// directory are kept as they are.
pub fn bucketed_path(file: &ProjectFile, project_type: &ProjectType) -> String {
    let name = clean_relative(&file.name);
    if name.contains('/') {
        return name;
    }
    match directory_for(&file.extension, project_type) {
        Some(dir) => format!("{dir}/{name}"),
        None => name,
    }
}

/// Drop empty, `.` and `..` segments so a hinted name cannot leave the root.
pub fn clean_relative(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Last path segment of a file name, for flattened layouts.
pub fn flat_name(name: &str) -> String {
    let cleaned = clean_relative(name);
    cleaned.rsplit('/').next().unwrap_or_default().to_string()
}

/// Final relative path of every file, in file order. Paths that collide get
/// numbered suffixes, and the context file name is held back for the
/// generated context record.
pub fn project_paths(
    files: &[ProjectFile],
    project_type: &ProjectType,
    flatten: bool,
) -> Vec<String> {
    let mut paths = NameAllocator::default();
    paths.allocate(CONTEXT_FILE.to_string());
    files
        .iter()
        .map(|file| {
            let relative = if flatten {
                flat_name(&file.name)
            } else {
                bucketed_path(file, project_type)
            };
            paths.allocate(relative)
        })
        .collect()
}

pub fn generate_structure(
    name: &str,
    project_type: &ProjectType,
    files: &[ProjectFile],
) -> ProjectStructure {
    ProjectStructure {
        name: name.to_string(),
        project_type: project_type.clone(),
        suggested_layout: project_paths(files, project_type, false)
            .into_iter()
            .map(|path| format!("/{path}"))
            .collect(),
    }
}
