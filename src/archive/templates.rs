//! Per-project-type scaffolding: config manifests, `.gitignore` bodies and
//! usage instructions.

use crate::error::Result;
use crate::types::ProjectType;
use serde::Serialize;
use std::collections::BTreeMap;

const NODE_GITIGNORE: &str = "node_modules/
.env
.DS_Store
dist/
build/
*.log
";

const PYTHON_GITIGNORE: &str = "__pycache__/
*.py[cod]
*$py.class
*.so
.Python
env/
venv/
.env
.DS_Store
";

const DEFAULT_GITIGNORE: &str = ".DS_Store
.env
*.log
";

const WEB_USAGE: &str = "1. Open `index.html` in your web browser
2. Or, use a local server: `python -m http.server 8000`
3. Navigate to http://localhost:8000";

const NODE_USAGE: &str = "1. Install dependencies: `npm install`
2. Run the application: `npm start`
3. Or run directly: `node index.js`";

const PYTHON_USAGE: &str = "1. Install requirements: `pip install -r requirements.txt`
2. Run the script: `python main.py` or `python app.py`";

const REACT_USAGE: &str = "1. Install dependencies: `npm install`
2. Start development server: `npm start`
3. Build for production: `npm run build`";

const DEFAULT_USAGE: &str = "1. Check the files for specific instructions
2. Look for entry points like `index.js`, `main.py`, or `index.html`
3. Install any dependencies mentioned in the files";

/// Version written for every extracted dependency.
const ANY_VERSION: &str = "*";

#[derive(Serialize)]
struct NodeManifest<'a> {
    name: &'a str,
    version: &'static str,
    description: &'static str,
    main: &'static str,
    scripts: BTreeMap<&'static str, &'static str>,
    keywords: [&'static str; 2],
    author: &'static str,
    license: &'static str,
    dependencies: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ReactManifest<'a> {
    name: &'a str,
    version: &'static str,
    private: bool,
    dependencies: BTreeMap<String, String>,
    scripts: BTreeMap<&'static str, &'static str>,
}

/// Generated config files for a project type, as `(file name, content)`.
/// Types without a template get none.
pub fn config_files(
    project_type: &ProjectType,
    project_name: &str,
    dependencies: &[String],
) -> Result<Vec<(String, String)>> {
    let files = match project_type {
        ProjectType::Node => {
            let manifest = NodeManifest {
                name: project_name,
                version: "1.0.0",
                description: "Project generated from DeepSeek conversation",
                main: "index.js",
                scripts: BTreeMap::from([
                    ("start", "node index.js"),
                    ("test", "echo \"Error: no test specified\" && exit 1"),
                ]),
                keywords: ["deepseek", "generated"],
                author: "DeepSeek User",
                license: "MIT",
                dependencies: pinned_any(dependencies),
            };
            vec![("package.json".to_string(), serde_json::to_string_pretty(&manifest)?)]
        }
        ProjectType::React => {
            let mut deps = BTreeMap::from([
                ("react".to_string(), "^18.0.0".to_string()),
                ("react-dom".to_string(), "^18.0.0".to_string()),
                ("react-scripts".to_string(), "5.0.0".to_string()),
            ]);
            for (name, version) in pinned_any(dependencies) {
                deps.entry(name).or_insert(version);
            }
            let manifest = ReactManifest {
                name: project_name,
                version: "1.0.0",
                private: true,
                dependencies: deps,
                scripts: BTreeMap::from([
                    ("start", "react-scripts start"),
                    ("build", "react-scripts build"),
                    ("test", "react-scripts test"),
                    ("eject", "react-scripts eject"),
                ]),
            };
            vec![("package.json".to_string(), serde_json::to_string_pretty(&manifest)?)]
        }
        kind if kind.is_python_family() => {
            let mut requirements = dependencies.join("\n");
            requirements.push('\n');
            vec![("requirements.txt".to_string(), requirements)]
        }
        _ => Vec::new(),
    };
    Ok(files)
}

fn pinned_any(dependencies: &[String]) -> BTreeMap<String, String> {
    dependencies
        .iter()
        .map(|dep| (dep.clone(), ANY_VERSION.to_string()))
        .collect()
}

pub fn gitignore(project_type: &ProjectType) -> &'static str {
    match project_type {
        ProjectType::Node | ProjectType::React => NODE_GITIGNORE,
        kind if kind.is_python_family() => PYTHON_GITIGNORE,
        _ => DEFAULT_GITIGNORE,
    }
}

pub fn usage_instructions(project_type: &ProjectType) -> &'static str {
    match project_type {
        ProjectType::Web => WEB_USAGE,
        ProjectType::Node => NODE_USAGE,
        ProjectType::React => REACT_USAGE,
        kind if kind.is_python_family() => PYTHON_USAGE,
        _ => DEFAULT_USAGE,
    }
}
