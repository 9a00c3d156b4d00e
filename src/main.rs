use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use domq::{
    parse_html, parse_selector, query, render, Error, ParseErrorKind, Projection, RenderSettings,
    Result,
};
use log::debug;

/// jq for HTML: filter and extract DOM nodes with CSS-selector syntax.
#[derive(Debug, Parser)]
#[command(name = "domq", version, about)]
struct Cli {
    /// Selector chain, optionally followed by a trailing `text{}` or
    /// `attr{name}` projection directive
    query: String,

    /// Indent serialized HTML output
    #[arg(long)]
    pretty: bool,

    /// Disable terminal color decoration
    #[arg(long, conflicts_with = "color")]
    plain: bool,

    /// Force color decoration even when stdout is not a terminal
    #[arg(long)]
    color: bool,

    /// Cap the number of emitted matches to the first N in document order
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Read HTML from a file instead of standard input
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("domq: {err}");
            // Scripts branch on "bad query" vs "bad input".
            match err {
                Error::Lex { .. } | Error::Parse { .. } => ExitCode::from(2),
                Error::HtmlParse(_) | Error::Input(_) => ExitCode::from(1),
            }
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    let html = read_input(cli.file.as_deref())?;

    let (selector_src, projection) = split_query(&cli.query)?;
    let selector = parse_selector(selector_src)?;
    debug!("compiled selector: {selector}");

    let dom = parse_html(&html)?;
    let matches = query(&dom, &selector);
    debug!("{} node(s) matched", matches.len());

    let color = cli.color || (!cli.plain && io::stdout().is_terminal());
    // The colored crate second-guesses non-tty stdout; the flags decide here.
    colored::control::set_override(color);

    let settings = RenderSettings {
        projection,
        pretty: cli.pretty,
        color,
        limit: cli.limit,
    };
    Ok(render(&dom, &matches, &settings))
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| Error::Input(format!("{}: {err}", path.display()))),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| Error::Input(format!("stdin: {err}")))?;
            Ok(buffer)
        }
    }
}

/// Splits a trailing projection directive off the query argument. The
/// directive must stand alone as the final whitespace-separated token;
/// anything else is left for the selector compiler to judge.
fn split_query(raw: &str) -> Result<(&str, Projection)> {
    let trimmed = raw.trim_end();

    if let Some(head) = trimmed.strip_suffix("text{}") {
        if head.is_empty() || head.ends_with(|ch: char| ch.is_ascii_whitespace()) {
            return Ok((head, Projection::Text));
        }
    }

    if trimmed.ends_with('}') {
        if let Some(open) = trimmed.rfind("attr{") {
            let standalone = open == 0
                || trimmed[..open].ends_with(|ch: char| ch.is_ascii_whitespace());
            if standalone {
                let name = &trimmed[open + "attr{".len()..trimmed.len() - 1];
                if name.is_empty() || !name.bytes().all(is_attr_name_byte) {
                    return Err(Error::Parse {
                        position: open,
                        kind: ParseErrorKind::UnexpectedToken,
                        fragment: trimmed[open..].to_string(),
                    });
                }
                return Ok((&trimmed[..open], Projection::Attribute(name.to_string())));
            }
        }
    }

    Ok((raw, Projection::Element))
}

fn is_attr_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}
