//! sectify CLI - outline listing and section extraction for PDF and EPUB

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use sectify::render::{self, flashcards, Deck, JsonFormat, RenderOptions};
use sectify::{EntryId, Sectify, SectifyResult};

#[derive(Parser)]
#[command(name = "sectify")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "List outlines and extract section text from PDF and EPUB files", long_about = None)]
struct Cli {
    /// Stop on the first page that fails to parse
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document information
    Info {
        /// Input PDF or EPUB file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List the recovered outline
    #[command(alias = "toc")]
    Outline {
        /// Input PDF or EPUB file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output the outline as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract section text
    Extract {
        /// Input PDF or EPUB file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Section title to extract (repeatable)
        #[arg(short, long = "section", value_name = "TITLE")]
        sections: Vec<String>,

        /// 1-based outline index to extract (repeatable)
        #[arg(short, long = "index", value_name = "INDEX")]
        indices: Vec<usize>,

        /// Extract every top-level section
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Header and footer band height in points
        #[arg(long, default_value = "50")]
        margin: f32,
    },

    /// Write an Anki flashcard deck from question/answer text
    Deck {
        /// Input PDF or EPUB file the questions were written for
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// File holding "Q: ... A: ..." pairs
        #[arg(long, value_name = "QA_FILE")]
        qa: PathBuf,

        /// Anki deck id
        #[arg(long, value_name = "ID", env = "SECTIFY_DECK_ID")]
        deck_id: u64,

        /// Output file (named after the document title if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Nested JSON object keyed by title
    Json,
    /// Markdown with one heading per section
    Markdown,
    /// Plain text with numbered headings
    Text,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let strict = cli.strict;

    let result = match cli.command {
        Commands::Info { input } => cmd_info(&input, strict),
        Commands::Outline { input, json } => cmd_outline(&input, json, strict),
        Commands::Extract {
            input,
            sections,
            indices,
            all,
            format,
            output,
            margin,
        } => cmd_extract(
            &input,
            &sections,
            &indices,
            all,
            format,
            output.as_deref(),
            margin,
            strict,
        ),
        Commands::Deck {
            input,
            qa,
            deck_id,
            output,
        } => cmd_deck(&input, &qa, deck_id, output.as_deref(), strict),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Parse a document behind a spinner.
fn open(input: &Path, builder: Sectify, strict: bool) -> Result<SectifyResult, Box<dyn std::error::Error>> {
    let builder = if strict { builder } else { builder.lenient() };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Reading {}...", input.display()));

    let result = builder.open(input);
    pb.finish_and_clear();
    Ok(result?)
}

fn cmd_info(input: &Path, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = open(input, Sectify::new(), strict)?;
    let metadata = result.metadata();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), metadata.format);
    println!("{}: {}", "Pages".bold(), result.document.page_count());

    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref subject) = metadata.subject {
        println!("{}: {}", "Subject".bold(), subject);
    }
    if let Some(ref created) = metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }

    println!();
    println!("{}", "Structure".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!(
        "{}: {} {}pt",
        "Body font".bold(),
        result.baseline.main_font,
        result.baseline.main_size
    );
    println!("{}: {}", "Outline source".bold(), result.outline.source);
    println!("{}: {}", "Outline entries".bold(), result.entries().len());
    println!("{}: {}", "Top-level sections".bold(), result.top_level().len());

    print_diagnostics(&result.outline.diagnostics);
    Ok(())
}

fn cmd_outline(input: &Path, json: bool, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = open(input, Sectify::new(), strict)?;

    if json {
        println!("{}", render::to_json(&result.outline, JsonFormat::Pretty)?);
        return Ok(());
    }

    if result.entries().is_empty() {
        println!("{}", "No outline found".yellow());
        return Ok(());
    }
    println!(
        "{} ({})",
        "Outline".cyan().bold(),
        result.outline.source.to_string().dimmed()
    );
    println!("{}", render::outline_listing(result.entries()));
    print_diagnostics(&result.outline.diagnostics);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_extract(
    input: &Path,
    titles: &[String],
    indices: &[usize],
    all: bool,
    format: OutputFormat,
    output: Option<&Path>,
    margin: f32,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = open(input, Sectify::new().with_margin(margin), strict)?;

    let extracted = if all {
        result.extract_all()
    } else {
        let targets = select(&result, titles, indices)?;
        if targets.is_empty() {
            return Err("Nothing selected: use --section, --index or --all".into());
        }
        result.extract(&targets)
    };

    let rendered = match format {
        OutputFormat::Json => render::to_json(&extracted.sections, JsonFormat::Pretty)?,
        OutputFormat::Markdown => {
            let options = RenderOptions::new().with_frontmatter(true);
            render::to_markdown(result.metadata(), &extracted.sections, &options)
        }
        OutputFormat::Text => render::to_text(&extracted.sections),
    };

    print_diagnostics(&extracted.diagnostics);

    if let Some(path) = output {
        fs::write(path, &rendered)?;
        println!(
            "{} {} ({} sections)",
            "Saved to".green(),
            path.display(),
            extracted.sections.len()
        );
    } else {
        println!("{}", rendered);
    }

    Ok(())
}

/// Resolve titles and indices to entries, in the order given, without repeats.
fn select(
    result: &SectifyResult,
    titles: &[String],
    indices: &[usize],
) -> Result<Vec<EntryId>, Box<dyn std::error::Error>> {
    let mut targets = Vec::new();
    for title in titles {
        let id = result
            .select_by_title(title)
            .ok_or_else(|| format!("No section titled \"{}\" in the outline", title))?;
        targets.push(id);
    }
    for &index in indices {
        let id = result.select_by_index(index).ok_or_else(|| {
            format!(
                "Index {} is out of range (outline has {} entries)",
                index,
                result.entries().len()
            )
        })?;
        targets.push(id);
    }

    let mut seen = std::collections::HashSet::new();
    targets.retain(|id| seen.insert(*id));
    Ok(targets)
}

fn cmd_deck(
    input: &Path,
    qa_file: &Path,
    deck_id: u64,
    output: Option<&Path>,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = open(input, Sectify::new(), strict)?;
    let qa = fs::read_to_string(qa_file)?;

    let title = result.metadata().title.as_deref();
    let stem = flashcards::output_stem(title, input);
    let deck = Deck::new(deck_id, title.unwrap_or(&stem));

    let cards = flashcards::cards_from_qa(&qa);
    if cards.is_empty() {
        return Err(format!("No answered Q:/A: pairs in {}", qa_file.display()).into());
    }

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{}.txt", stem)));
    fs::write(&path, render::write_deck(&deck, &cards))?;

    println!(
        "{} {} cards to {}",
        "Wrote".green().bold(),
        cards.len(),
        path.display()
    );
    Ok(())
}

fn print_diagnostics(diagnostics: &[sectify::Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}: {}", "Warning".yellow().bold(), diagnostic);
    }
}
