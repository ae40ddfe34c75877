mod terminal;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use fandom_extract_core::config::{
    SettingsHandle, TomlSettingsStore, ValueSource, resolve_settings_path,
};
use fandom_extract_core::extract::{ExtractionOutcome, Extractor};
use fandom_extract_core::host::ReqwestTransport;
use tracing_subscriber::{EnvFilter, fmt};

use crate::terminal::{NoteFileEditor, StderrNotifier, StdinPrompt, StdoutEditor};

#[derive(Debug, Parser)]
#[command(
    name = "fandom-extract",
    version,
    about = "Insert the lead of a Fandom wiki article as templated text"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Settings file to use")]
    settings: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved settings diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Fetch a search term and print the formatted extract")]
    Fetch(FetchArgs),
    #[command(about = "Fetch the note's file name and insert the extract into the note")]
    Note(NoteArgs),
    #[command(about = "Prompt for a search term on stdin and print the formatted extract")]
    Prompt,
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct FetchArgs {
    term: String,
}

#[derive(Debug, Args)]
struct NoteArgs {
    path: PathBuf,
    #[arg(long, value_name = "N", help = "Insert before this 1-based line (default: append)")]
    line: Option<usize>,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    Show,
    Path,
    Set {
        key: String,
        value: String,
    },
    #[command(name = "add-wiki")]
    AddWiki {
        wiki: String,
    },
    #[command(name = "remove-wiki")]
    RemoveWiki {
        wiki: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing()?;

    let (settings_path, source) = resolve_cli_settings_path(cli.settings.as_deref())?;
    if cli.diagnostics {
        eprintln!(
            "[diagnostics]\nsettings_path={} ({})",
            normalize_path(&settings_path),
            source.as_str()
        );
    }
    let mut handle = SettingsHandle::open(TomlSettingsStore::new(&settings_path))?;

    match cli.command {
        Some(Commands::Fetch(FetchArgs { term })) => {
            run_extraction(&handle, |extractor| {
                extractor.paste_into_editor(&mut StdoutEditor, &term).map(Some)
            })
        }
        Some(Commands::Note(NoteArgs { path, line })) => {
            let mut editor = NoteFileEditor::new(path, line);
            let title = editor.title();
            run_extraction(&handle, |extractor| {
                extractor.fetch_for_active_title(&mut editor, title.as_deref())
            })
        }
        Some(Commands::Prompt) => run_extraction(&handle, |extractor| {
            extractor.fetch_for_prompted_term(&mut StdoutEditor, &mut StdinPrompt)
        }),
        Some(Commands::Config(ConfigArgs { command })) => {
            run_config(&mut handle, &settings_path, command)
        }
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_extraction<F>(handle: &SettingsHandle<TomlSettingsStore>, run: F) -> Result<()>
where
    F: FnOnce(&Extractor<'_>) -> Result<Option<ExtractionOutcome>>,
{
    let settings = handle.snapshot();
    let transport = ReqwestTransport::from_env()?;
    let notifier = StderrNotifier;
    let extractor = Extractor::new(&transport, &notifier, &settings);

    match run(&extractor)? {
        Some(ExtractionOutcome::Formatted { extract, .. }) => {
            tracing::info!(title = %extract.title, url = %extract.url, "inserted extract");
            Ok(())
        }
        Some(ExtractionOutcome::NotFound) | Some(ExtractionOutcome::DisambiguationUnresolved) => {
            bail!("nothing inserted")
        }
        None => Ok(()),
    }
}

fn run_config(
    handle: &mut SettingsHandle<TomlSettingsStore>,
    settings_path: &Path,
    command: ConfigSubcommand,
) -> Result<()> {
    match command {
        ConfigSubcommand::Show => {
            let settings = handle.current();
            println!("settings_path: {}", normalize_path(settings_path));
            println!("wikis: {}", settings.wikis.join(", "));
            println!("language: {}", settings.language());
            println!("template: {:?}", settings.template);
            println!("paragraph_template: {:?}", settings.paragraph_template);
            println!(
                "should_use_paragraph_template: {}",
                format_flag(settings.should_use_paragraph_template)
            );
            println!(
                "should_bold_search_term: {}",
                format_flag(settings.should_bold_search_term)
            );
            println!(
                "should_link_categories: {}",
                format_flag(settings.should_link_categories)
            );
            println!(
                "search_term_is_pattern: {}",
                format_flag(settings.search_term_is_pattern)
            );
        }
        ConfigSubcommand::Path => println!("{}", normalize_path(settings_path)),
        ConfigSubcommand::Set { key, value } => {
            let wrote = handle.update(|settings| settings.set_field(&key, &value))?;
            println!("{key}: {}", if wrote { "updated" } else { "unchanged" });
        }
        ConfigSubcommand::AddWiki { wiki } => {
            let wrote = handle.update(|settings| {
                settings.add_wiki(&wiki);
                Ok(())
            })?;
            println!("wiki {wiki}: {}", if wrote { "added" } else { "already present" });
        }
        ConfigSubcommand::RemoveWiki { wiki } => {
            let wrote = handle.update(|settings| {
                settings.remove_wiki(&wiki);
                Ok(())
            })?;
            println!("wiki {wiki}: {}", if wrote { "removed" } else { "not configured" });
        }
    }
    Ok(())
}

fn resolve_cli_settings_path(flag: Option<&Path>) -> Result<(PathBuf, ValueSource)> {
    let cwd = env::current_dir().context("failed to read current directory")?;
    Ok(resolve_settings_path(&cwd, flag))
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
