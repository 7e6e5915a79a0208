use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chatpack::archive::ArchiveOptions;
use chatpack::session::{BulkExport, ProjectExport};
use chatpack::{
    analyze_conversation, build_summaries, filter_summaries, render_analysis, render_chat,
    resolve_chat_id, ChatExtractor, ChatFilter, ChatStore, Command, Config, ExportFormat,
    ExportOptions, HtmlFile, JsonDirStore, Outcome, ProjectRequest, Session,
};
use clap::{Parser, Subcommand};
use nu_ansi_term::{Color, Style as AnsiStyle};
use tracing::info;

const ACCENT_COLOR: Color = Color::Rgb(188, 205, 238);
const EDGE_COLOR: Color = Color::Rgb(217, 182, 203);
const DIM_COLOR: Color = Color::Rgb(125, 132, 140);
const DOT_ACTIVE_COLOR: Color = Color::Rgb(188, 205, 238);
const DOT_INACTIVE_COLOR: Color = Color::Rgb(90, 94, 104);
const PROGRESS_FRAMES: [&str; 6] = ["●○○○○○", "●●○○○○", "●●●○○○", "●●●●○○", "●●●●●○", "●●●●●●"];

#[derive(Parser)]
#[command(name = "chatpack")]
#[command(about = "Capture chat pages, detect code projects and package them")]
struct Cli {
    /// Directory holding saved chats
    #[arg(long, global = true, default_value = ".chatpack")]
    store: PathBuf,

    /// JSON settings file; defaults apply when it is missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the chat from a saved page and store it
    Capture {
        #[arg(value_name = "PAGE")]
        page: PathBuf,
        /// Address the page was saved from
        #[arg(long)]
        url: Option<String>,
    },
    /// Show the project detected in a saved page
    Analyze {
        #[arg(value_name = "PAGE")]
        page: PathBuf,
        #[arg(long)]
        url: Option<String>,
        /// Print the transcript before the analysis
        #[arg(long)]
        transcript: bool,
    },
    /// Serialize a chat to json, markdown, html, txt or csv
    Export {
        /// Page to read; a stored chat is used with --id
        #[arg(value_name = "PAGE", required_unless_present = "id")]
        page: Option<PathBuf>,
        /// Stored chat number, id or id prefix
        #[arg(long, conflicts_with = "page")]
        id: Option<String>,
        #[arg(short, long)]
        format: Option<ExportFormat>,
        /// Leave out message timestamps
        #[arg(long)]
        no_timestamps: bool,
        /// Leave out code blocks
        #[arg(long)]
        no_code: bool,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Package the detected project as a zip archive
    Project {
        #[arg(value_name = "PAGE", required_unless_present = "id")]
        page: Option<PathBuf>,
        #[arg(long, conflicts_with = "page")]
        id: Option<String>,
        /// Archive root name (defaults to the suggested name)
        #[arg(long)]
        name: Option<String>,
        /// Put every file directly under the root
        #[arg(long)]
        flatten: bool,
        #[arg(long)]
        no_context: bool,
        #[arg(long)]
        no_configs: bool,
        #[arg(long)]
        no_deps: bool,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Export every matching stored chat into one zip archive
    Bulk {
        /// Text to look for in titles, ids and messages
        #[arg(value_name = "QUERY")]
        query: Option<String>,
        #[arg(short, long)]
        format: Option<ExportFormat>,
        /// Only chats containing code
        #[arg(long)]
        code_only: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// List stored chats, newest first
    List {
        #[arg(value_name = "QUERY")]
        query: Option<String>,
    },
    /// Print a stored chat
    Show {
        /// Chat number, id or id prefix
        #[arg(value_name = "CHAT")]
        id: String,
    },
}

fn accent(text: &str) -> String {
    AnsiStyle::new().fg(ACCENT_COLOR).paint(text).to_string()
}

fn dim(text: &str) -> String {
    AnsiStyle::new().fg(DIM_COLOR).paint(text).to_string()
}

fn edge(text: &str) -> String {
    AnsiStyle::new().fg(EDGE_COLOR).paint(text).to_string()
}

fn bullet() -> String {
    edge("⋆")
}

fn note(text: &str) {
    println!("{} {}", bullet(), text);
}

fn style_frame(frame: &str) -> String {
    frame
        .chars()
        .map(|ch| match ch {
            '●' => DOT_ACTIVE_COLOR.bold().paint("●").to_string(),
            '○' => DOT_INACTIVE_COLOR.paint("○").to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Run `action` while a dot spinner animates next to `label`.
fn with_progress<F, T>(label: &str, action: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let running = Arc::new(AtomicBool::new(true));
    let spinner_running = Arc::clone(&running);
    let line = format!("{} {}", bullet(), accent(&format!("{label}...")));
    let spinner_line = line.clone();

    let handle = thread::spawn(move || {
        for frame in PROGRESS_FRAMES.iter().cycle() {
            if !spinner_running.load(Ordering::Relaxed) {
                break;
            }
            print!("\r{} {}", spinner_line, style_frame(frame));
            let _ = io::stdout().flush();
            thread::sleep(Duration::from_millis(110));
        }
    });

    let result = action();

    running.store(false, Ordering::Relaxed);
    let _ = handle.join();
    println!("\r{} {}", line, style_frame(PROGRESS_FRAMES[PROGRESS_FRAMES.len() - 1]));
    io::stdout().flush()?;

    result
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", Color::Red.bold().paint("error:"), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Capture { page, url } => {
            let mut session = open_session(config, &cli.store)?;
            let page = html_page(&page, url)?;
            let outcome = with_progress("reading page", || {
                Ok(session.dispatch(Command::PageChanged(&page))?)
            })?;
            let Outcome::ChatUpdated {
                chat_id,
                saved,
                project_ready,
            } = outcome
            else {
                bail!("no conversation found in {}", page_label(&page));
            };
            if !saved {
                session.dispatch(Command::Save {
                    chat_id: Some(chat_id.clone()),
                })?;
            }
            info!(id = %chat_id, store = %cli.store.display(), "chat captured");
            note(&format!("saved {}", accent(&chat_id)));
            if project_ready {
                note(&dim("a complete project was detected; run `chatpack project` to package it"));
            }
        }
        Commands::Analyze {
            page,
            url,
            transcript,
        } => {
            let mut extractor = ChatExtractor::new(&config)?;
            let page = html_page(&page, url)?;
            let chat = extractor
                .extract_current_chat(&page)
                .ok_or_else(|| anyhow!("no conversation found in {}", page_label(&page)))?;
            if transcript {
                println!("{}\n", render_chat(&chat));
            }
            println!("{}", render_analysis(&analyze_conversation(&chat)));
        }
        Commands::Export {
            page,
            id,
            format,
            no_timestamps,
            no_code,
            out,
        } => {
            let mut session = open_session(config, &cli.store)?;
            let chat_id = target(&mut session, page, id.as_deref())?;
            let options = ExportOptions {
                include_timestamps: !no_timestamps,
                include_code_blocks: !no_code,
                ..ExportOptions::default()
            };
            let outcome = session.dispatch(Command::Export {
                chat_id: Some(chat_id),
                format,
                options,
            })?;
            let Outcome::Exported(payload) = outcome else {
                bail!("export produced no file");
            };
            let path = write_output(&out, &payload.filename, payload.content.as_bytes())?;
            note(&format!("wrote {}", accent(&path.display().to_string())));
        }
        Commands::Project {
            page,
            id,
            name,
            flatten,
            no_context,
            no_configs,
            no_deps,
            out,
        } => {
            let mut session = open_session(config, &cli.store)?;
            let chat_id = target(&mut session, page, id.as_deref())?;
            let request = ProjectRequest {
                chat_id: Some(chat_id),
                options: ArchiveOptions {
                    project_name: name,
                    include_chat_context: !no_context,
                    generate_configs: !no_configs,
                    include_dependencies: !no_deps,
                    flatten_structure: flatten,
                    generated_at: None,
                },
            };
            let outcome = with_progress("building project", || {
                Ok(session.dispatch(Command::ExportProject(request))?)
            })?;
            let Outcome::ProjectExported(ProjectExport {
                filename,
                archive,
                file_count,
                project_type,
            }) = outcome
            else {
                bail!("project export produced no archive");
            };
            let bytes = archive.to_zip_bytes()?;
            let path = write_output(&out, &filename, &bytes)?;
            note(&format!(
                "wrote {} {}",
                accent(&path.display().to_string()),
                dim(&format!(
                    "({project_type}, {file_count} files, {})",
                    chatpack::display_bytes(bytes.len() as u64)
                ))
            ));
        }
        Commands::Bulk {
            query,
            format,
            code_only,
            limit,
            out,
        } => {
            let mut session = open_session(config, &cli.store)?;
            let filter = ChatFilter {
                search_query: query,
                has_code: code_only.then_some(true),
                limit,
                ..ChatFilter::default()
            };
            let outcome = session
                .dispatch(Command::BulkExport {
                    filter,
                    format,
                    options: ExportOptions::default(),
                })
                .context("no stored chats match")?;
            let Outcome::BulkExported(BulkExport {
                filename,
                archive,
                count,
            }) = outcome
            else {
                bail!("bulk export produced no archive");
            };
            let path = write_output(&out, &filename, &archive.to_zip_bytes()?)?;
            note(&format!(
                "wrote {} {}",
                accent(&path.display().to_string()),
                dim(&format!("({count} chats)"))
            ));
        }
        Commands::List { query } => {
            let store = open_store(&config, &cli.store)?;
            let chats: Vec<_> = store
                .query(&ChatFilter::default())?
                .into_iter()
                .map(|record| record.chat)
                .collect();
            let summaries = build_summaries(&chats);
            let matches = filter_summaries(&summaries, query.as_deref().unwrap_or_default());
            if matches.is_empty() {
                note(&dim("no stored chats"));
            }
            for (number, summary) in summaries.iter().enumerate() {
                if !matches.iter().any(|matched| matched.id == summary.id) {
                    continue;
                }
                println!(
                    "{:>3}. {} {}",
                    number + 1,
                    summary.title,
                    dim(&format!(
                        "{} · {} messages · {}",
                        summary.id,
                        summary.message_count,
                        chatpack::display_time(summary.captured_at)
                    ))
                );
            }
        }
        Commands::Show { id } => {
            let store = open_store(&config, &cli.store)?;
            let chat_id = resolve_stored(&store, &id)?;
            let record = store
                .get(&chat_id)?
                .ok_or_else(|| anyhow!("chat {chat_id} disappeared from the store"))?;
            println!("{}", render_chat(&record.chat));
        }
    }

    Ok(())
}

fn open_store(config: &Config, dir: &Path) -> Result<JsonDirStore> {
    let mut store = JsonDirStore::new(dir, config.storage_limit);
    store
        .initialize()
        .with_context(|| format!("failed to open chat store at {}", dir.display()))?;
    Ok(store)
}

fn open_session(config: Config, dir: &Path) -> Result<Session<JsonDirStore>> {
    let store = open_store(&config, dir)?;
    Ok(Session::new(config, store)?)
}

fn html_page(path: &Path, url: Option<String>) -> Result<HtmlFile> {
    if !path.is_file() {
        bail!("`{}` is not a file", path.display());
    }
    Ok(HtmlFile::new(path, url))
}

fn page_label(page: &HtmlFile) -> String {
    page.path().display().to_string()
}

/// The chat a command operates on: the page's chat once it is loaded into
/// the session, else a stored chat resolved from `reference`.
fn target(
    session: &mut Session<JsonDirStore>,
    page: Option<PathBuf>,
    reference: Option<&str>,
) -> Result<String> {
    if let Some(path) = page {
        let page = html_page(&path, None)?;
        return match session.dispatch(Command::PageChanged(&page))? {
            Outcome::ChatUpdated { chat_id, .. } | Outcome::Unchanged { chat_id } => Ok(chat_id),
            _ => bail!("no conversation found in {}", path.display()),
        };
    }
    let reference = reference.ok_or_else(|| anyhow!("a page or --id is required"))?;
    resolve_stored(session.store(), reference)
}

fn resolve_stored(store: &JsonDirStore, reference: &str) -> Result<String> {
    let chats: Vec<_> = store
        .query(&ChatFilter::default())?
        .into_iter()
        .map(|record| record.chat)
        .collect();
    let summaries = build_summaries(&chats);
    let position = resolve_chat_id(reference, &summaries)?;
    Ok(summaries[position].id.clone())
}

fn write_output(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(filename);
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
