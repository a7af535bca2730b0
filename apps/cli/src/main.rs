use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use scribe_core::{Document, EditorSurface, EditorView, FindReplaceSession};
use scribe_search::{
    find_all, replace_all, replace_one, LineIndex, PatternMatcher, SearchError, SearchMode,
    SearchOptions,
};
use scribe_settings::{Preferences, PreferencesStore, ViewPreferences};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scribe-cli",
    about = "Find and replace commands for Scribe transcripts",
    author,
    version
)]
struct Cli {
    /// 偏好設定檔路徑。 / Preferences file (defaults to ./scribe.json).
    #[arg(long, global = true, value_name = "PATH", default_value = "scribe.json")]
    config: PathBuf,
    /// 顯示除錯紀錄。 / Emit debug logs on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出逐字稿中的所有符合項目。 / List every match in a transcript.
    Find(FindArgs),
    /// 取代單一或全部符合項目。 / Replace one match or all matches.
    Replace(ReplaceArgs),
    /// 從標準輸入執行互動式尋找/取代指令。 / Drive a find/replace session from stdin commands.
    Session(SessionArgs),
    /// 匯入/匯出偏好設定。 / Import or export preferences.
    #[command(subcommand)]
    Preferences(PreferencesCommand),
}

#[derive(Args)]
struct SearchFlags {
    /// 區分大小寫。 / Match case exactly.
    #[arg(long)]
    case_sensitive: bool,
    /// 只比對完整單字。 / Only match whole words.
    #[arg(long)]
    whole_word: bool,
    /// 將樣式視為純文字。 / Treat the pattern as plain text.
    #[arg(long, conflicts_with = "regex")]
    literal: bool,
    /// 將樣式視為正規表示式（預設）。 / Treat the pattern as a regular expression (default).
    #[arg(long)]
    regex: bool,
    /// 讓 `^`/`$` 比對每一行。 / Let `^` and `$` match at every line.
    #[arg(long)]
    multi_line: bool,
}

impl SearchFlags {
    fn apply(&self, mut options: SearchOptions) -> SearchOptions {
        if self.case_sensitive {
            options.case_sensitive = true;
        }
        if self.whole_word {
            options.whole_word = true;
        }
        if self.multi_line {
            options.multi_line = true;
        }
        if self.literal {
            options.mode = SearchMode::Plain;
        } else if self.regex {
            options.mode = SearchMode::Regex;
        }
        options
    }
}

#[derive(Args)]
struct FindArgs {
    /// 搜尋樣式。 / Pattern to search for.
    pattern: String,
    /// 逐字稿檔案。 / Transcript file.
    file: PathBuf,
    #[command(flatten)]
    flags: SearchFlags,
}

#[derive(Args)]
struct ReplaceArgs {
    /// 搜尋樣式。 / Pattern to search for.
    pattern: String,
    /// 逐字稿檔案。 / Transcript file.
    file: PathBuf,
    /// 取代文字。 / Replacement text.
    #[arg(long = "with", value_name = "TEXT", allow_hyphen_values = true)]
    replacement: String,
    /// 取代第 N 個符合項目（從 1 開始，預設 1）。 / Replace the N-th match (1-based, defaults to 1).
    #[arg(long, value_name = "N", conflicts_with = "all")]
    index: Option<usize>,
    /// 取代所有符合項目。 / Replace every match.
    #[arg(long)]
    all: bool,
    /// 展開取代文字中的 `$1`/`${name}`。 / Expand `$1`/`${name}` in the replacement.
    #[arg(long)]
    expand: bool,
    /// 實際寫回檔案；否則只預覽。 / Write the result back to the file (dry run otherwise).
    #[arg(long)]
    apply: bool,
    #[command(flatten)]
    flags: SearchFlags,
}

#[derive(Args)]
struct SessionArgs {
    /// 逐字稿檔案。 / Transcript file.
    file: PathBuf,
    /// 初始搜尋樣式。 / Initial search pattern.
    #[arg(long, value_name = "PATTERN")]
    pattern: Option<String>,
}

#[derive(Subcommand)]
enum PreferencesCommand {
    /// 匯出目前偏好設定。 / Export current preferences.
    Export(PreferencesExportArgs),
    /// 匯入偏好設定 JSON。 / Import preferences from JSON.
    Import(PreferencesImportArgs),
}

#[derive(Args)]
struct PreferencesExportArgs {
    /// 輸出檔案路徑。 / Destination file path.
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args)]
struct PreferencesImportArgs {
    /// 輸入檔案路徑。 / Source preferences JSON.
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);

    let mut store = PreferencesStore::load(&config)
        .with_context(|| format!("failed to load preferences from {}", config.display()))?;
    match command {
        Commands::Find(args) => execute_find(args, store.preferences()),
        Commands::Replace(args) => execute_replace(args, store.preferences()),
        Commands::Session(args) => execute_session(args, store.preferences()),
        Commands::Preferences(subcommand) => execute_preferences_command(subcommand, &mut store),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        bail!("transcript '{}' does not exist", path.display());
    }
    Document::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn execute_find(args: FindArgs, prefs: &Preferences) -> Result<()> {
    let document = open_document(&args.file)?;
    let options = args.flags.apply(prefs.search.to_options(args.pattern));
    let matches = find_all(document.contents(), &options)?;
    debug!(file = %args.file.display(), hits = matches.len(), "find finished");

    if matches.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    let lines = LineIndex::new(document.contents());
    println!("Search \"{}\" ({} hits)", options.pattern, matches.len());
    for span in &matches {
        let (line, column) = lines.position(span.start);
        println!("  Line {line} (Col {column}): {}", lines.line_text(line));
    }
    Ok(())
}

fn execute_replace(args: ReplaceArgs, prefs: &Preferences) -> Result<()> {
    let mut document = open_document(&args.file)?;
    let mut options = args.flags.apply(prefs.search.to_options(args.pattern));
    if args.expand {
        options.expand_captures = true;
    }

    let (text, count) = if args.all {
        let outcome = replace_all(document.contents(), &options, &args.replacement)?;
        (outcome.text, outcome.replacements)
    } else {
        let position = args.index.unwrap_or(1);
        if position == 0 {
            bail!("match numbers start at 1");
        }
        let text = replace_nth(document.contents(), &options, position - 1, &args.replacement)
            .map_err(|err| match err {
                SearchError::IndexOutOfRange { len, .. } => {
                    anyhow!("match {position} does not exist ({len} matches)")
                }
                other => other.into(),
            })?;
        (text, 1)
    };

    println!("Replaced {count} occurrence(s)");
    if !args.apply {
        println!("Dry run only; re-run with --apply to write changes.");
        return Ok(());
    }
    if count > 0 {
        document.set_contents(text);
        document
            .save()
            .with_context(|| format!("failed to write {}", args.file.display()))?;
        info!(file = %args.file.display(), count, "replacements written");
        println!("Applied changes to {}", args.file.display());
    }
    Ok(())
}

fn replace_nth(
    buffer: &str,
    options: &SearchOptions,
    index: usize,
    replacement: &str,
) -> Result<String, SearchError> {
    options.validate()?;
    let matcher = PatternMatcher::compile(options)?;
    let matches = matcher.find_all(buffer);
    let replacement = if options.expand_captures {
        matcher.expand_match(buffer, &matches, index, replacement)?
    } else {
        replacement.to_string()
    };
    Ok(replace_one(buffer, &matches, index, &replacement)?.text)
}

/// 工作階段腳本中的單一指令。 / One line of a session script.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Find(String),
    Next,
    Previous,
    Replace,
    ReplaceAll,
    With(String),
    Set(SessionFlag, bool),
    Show,
    Save,
    Close,
}

/// 可於工作階段中切換的搜尋選項。 / Search option toggled by `set <flag> on|off`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionFlag {
    Case,
    Word,
    Regex,
    Lines,
    Captures,
}

impl SessionFlag {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "case" => Self::Case,
            "word" => Self::Word,
            "regex" => Self::Regex,
            "lines" => Self::Lines,
            "captures" => Self::Captures,
            _ => return None,
        })
    }

    fn apply(self, options: &mut SearchOptions, enabled: bool) {
        match self {
            Self::Case => options.case_sensitive = enabled,
            Self::Word => options.whole_word = enabled,
            Self::Regex => {
                options.mode = if enabled {
                    SearchMode::Regex
                } else {
                    SearchMode::Plain
                }
            }
            Self::Lines => options.multi_line = enabled,
            Self::Captures => options.expand_captures = enabled,
        }
    }
}

impl SessionCommand {
    /// Blank lines and `#` comments yield `None`.
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            return Ok(None);
        }
        let line = line.trim_start();
        let (word, rest) = match line.split_once(' ') {
            Some((word, rest)) => (word, Some(rest)),
            None => (line, None),
        };
        let command = match (word, rest) {
            ("find", Some(pattern)) => Self::Find(pattern.to_string()),
            ("find", None) => Self::Find(String::new()),
            ("with", rest) => Self::With(rest.unwrap_or_default().to_string()),
            ("set", Some(rest)) => {
                let parsed = rest.split_once(' ').and_then(|(name, value)| {
                    let enabled = match value.trim() {
                        "on" => true,
                        "off" => false,
                        _ => return None,
                    };
                    Some((SessionFlag::parse(name)?, enabled))
                });
                match parsed {
                    Some((flag, enabled)) => Self::Set(flag, enabled),
                    None => {
                        return Err(format!(
                            "expected 'set <case|word|regex|lines|captures> on|off', got '{line}'"
                        ))
                    }
                }
            }
            ("next", None) => Self::Next,
            ("prev", None) => Self::Previous,
            ("replace", None) => Self::Replace,
            ("replace-all", None) => Self::ReplaceAll,
            ("show", None) => Self::Show,
            ("save", None) => Self::Save,
            ("close", None) => Self::Close,
            _ => return Err(format!("unknown command '{line}'")),
        };
        Ok(Some(command))
    }
}

fn execute_session(args: SessionArgs, prefs: &Preferences) -> Result<()> {
    let mut document = open_document(&args.file)?;
    let mut view =
        EditorView::new(document.contents()).with_viewport_height(prefs.view.viewport_lines);
    let template = prefs.search.to_options(args.pattern.unwrap_or_default());
    let mut session = FindReplaceSession::open(&mut view, template);
    if let Some(err) = session.last_error() {
        println!("error: {err}");
    }
    print_status(&session, &view, &prefs.view);

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read session command")?;
        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("error: {message}");
                continue;
            }
        };
        debug!(?command, "session command");
        match command {
            SessionCommand::Close => {
                session.close(&mut view);
                println!("Session closed");
                return Ok(());
            }
            SessionCommand::Show => {
                println!("  with: \"{}\"", session.replacement());
                let top = view.viewport().top_line;
                for (offset, text) in view
                    .render_viewport(&prefs.view.marker_open, &prefs.view.marker_close)
                    .iter()
                    .enumerate()
                {
                    println!("  {:>4} | {text}", top + offset + 1);
                }
                continue;
            }
            SessionCommand::Save => {
                document.set_contents(view.text());
                document
                    .save()
                    .with_context(|| format!("failed to write {}", args.file.display()))?;
                println!("Saved {}", args.file.display());
            }
            command => {
                if let Err(err) = apply_search_command(&mut session, &mut view, command) {
                    warn!(error = %err, "session command failed");
                    println!("error: {err}");
                }
            }
        }
        print_status(&session, &view, &prefs.view);
    }

    session.close(&mut view);
    if document.contents() != view.text() {
        println!("Unsaved changes discarded");
    }
    Ok(())
}

fn apply_search_command(
    session: &mut FindReplaceSession,
    view: &mut EditorView,
    command: SessionCommand,
) -> Result<(), SearchError> {
    match command {
        SessionCommand::Find(pattern) => {
            session.set_pattern(view, pattern)?;
        }
        SessionCommand::With(replacement) => session.set_replacement(replacement),
        SessionCommand::Set(flag, enabled) => {
            let mut options = session.options().clone();
            flag.apply(&mut options, enabled);
            session.set_options(view, options)?;
        }
        SessionCommand::Next => {
            session.next(view);
        }
        SessionCommand::Previous => {
            session.previous(view);
        }
        SessionCommand::Replace => {
            session.replace_one(view)?;
            println!("Replaced 1 occurrence(s)");
        }
        SessionCommand::ReplaceAll => {
            let outcome = session.replace_all(view)?;
            println!("Replaced {} occurrence(s)", outcome.replacements);
        }
        SessionCommand::Show | SessionCommand::Save | SessionCommand::Close => {}
    }
    Ok(())
}

fn print_status(session: &FindReplaceSession, view: &EditorView, view_prefs: &ViewPreferences) {
    let counter = session.counter();
    let Some(span) = session.highlighted() else {
        println!("[{counter}]");
        return;
    };
    let text = view.text();
    let (line, column) = LineIndex::new(&text).position(span.start);
    let rendered = view.render_with(&view_prefs.marker_open, &view_prefs.marker_close);
    let shown = rendered
        .split('\n')
        .nth(line.saturating_sub(1))
        .unwrap_or_default();
    println!("[{counter}] Line {line} (Col {column}): {shown}");
}

fn execute_preferences_command(
    command: PreferencesCommand,
    store: &mut PreferencesStore,
) -> Result<()> {
    match command {
        PreferencesCommand::Export(args) => {
            store
                .export_to(&args.output)
                .with_context(|| format!("failed to export preferences to {}", args.output.display()))?;
            println!("Exported preferences to {}", args.output.display());
        }
        PreferencesCommand::Import(args) => {
            if !args.input.exists() {
                bail!("preferences file '{}' does not exist", args.input.display());
            }
            store
                .import_from(&args.input)
                .with_context(|| format!("failed to import preferences from {}", args.input.display()))?;
            println!(
                "Imported preferences from {} into {}",
                args.input.display(),
                store.path().display()
            );
        }
    }
    Ok(())
}
