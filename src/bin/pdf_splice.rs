//! Merge, split and image-to-PDF from the command line.
//!
//! Usage:
//!   pdf_splice merge -o out.pdf a.pdf b.pdf ...
//!   pdf_splice split -o out.pdf --pages 5,1-3 in.pdf
//!   pdf_splice images -o out.pdf [--page-size a4] [--orientation portrait] [--margin small] img.png[:90] ...
//!
//! `-v` enables debug logging; `RUST_LOG` overrides it.

use pdf_splice::{images_to_pdf, merge, parse_page_ranges, split, EngineConfig, RasterImage, SourceDocument};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

const USAGE: &str = "\
Usage:
  pdf_splice merge -o OUT INPUT.pdf...
  pdf_splice split -o OUT --pages RANGES INPUT.pdf
  pdf_splice images -o OUT [--page-size SIZE] [--orientation ORIENTATION] [--margin MARGIN] IMAGE[:DEGREES]...

Options:
  -o, --output PATH     Output file
  --pages RANGES        1-based pages, e.g. 5,1-3
  --page-size SIZE      a3, a4, a5, letter or legal (default a4)
  --orientation O       portrait or landscape (default portrait)
  --margin M            none, small or big (default small)
  -v, --verbose         Debug logging";

#[derive(Debug, PartialEq)]
enum Command {
    Merge,
    Split { pages: String },
    Images,
}

#[derive(Debug)]
struct CliArgs {
    command: Command,
    output: PathBuf,
    inputs: Vec<String>,
    settings: Vec<(String, String)>,
    verbose: bool,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut iter = args.iter();
        let command = iter.next().ok_or("missing command")?.clone();
        let mut output = None;
        let mut pages = None;
        let mut inputs = Vec::new();
        let mut settings = Vec::new();
        let mut verbose = false;

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("{} needs a value", flag))
            };
            match arg.as_str() {
                "-o" | "--output" => output = Some(PathBuf::from(value(arg)?)),
                "--pages" => pages = Some(value(arg)?),
                "--page-size" => settings.push(("pageSize".to_string(), value(arg)?)),
                "--orientation" => settings.push(("orientation".to_string(), value(arg)?)),
                "--margin" => settings.push(("margin".to_string(), value(arg)?)),
                "-v" | "--verbose" => verbose = true,
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(format!("unknown option {}", flag))
                },
                _ => inputs.push(arg.clone()),
            }
        }

        let command = match command.as_str() {
            "merge" => Command::Merge,
            "split" => Command::Split {
                pages: pages.ok_or("split needs --pages")?,
            },
            "images" => Command::Images,
            other => return Err(format!("unknown command {}", other)),
        };
        if command != Command::Images && !settings.is_empty() {
            return Err("layout options only apply to images".to_string());
        }
        if inputs.is_empty() {
            return Err("no input files".to_string());
        }
        if matches!(command, Command::Split { .. }) && inputs.len() != 1 {
            return Err("split takes exactly one input".to_string());
        }

        Ok(Self {
            command,
            output: output.ok_or("missing -o OUT")?,
            inputs,
            settings,
            verbose,
        })
    }
}

/// `photo.png:90` -> (`photo.png`, 90). A suffix that is not a number is part
/// of the path.
fn split_rotation(arg: &str) -> (&str, Option<&str>) {
    match arg.rsplit_once(':') {
        Some((path, degrees))
            if !path.is_empty() && !degrees.is_empty() && degrees.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) =>
        {
            (path, Some(degrees))
        },
        _ => (arg, None),
    }
}

fn read_input(path: &str) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("{}: {}", path, e))
}

fn run(args: &CliArgs) -> Result<usize, String> {
    let config = EngineConfig::from_pairs(&args.settings).map_err(|e| e.to_string())?;

    let bytes = match &args.command {
        Command::Merge => {
            let sources = args
                .inputs
                .iter()
                .map(|path| Ok(SourceDocument::named(path.as_str(), read_input(path)?)))
                .collect::<Result<Vec<_>, String>>()?;
            merge(&sources, &config, None).map_err(|e| e.to_string())?
        },
        Command::Split { pages } => {
            let indices = parse_page_ranges(pages).map_err(|e| e.to_string())?;
            let path = &args.inputs[0];
            let source = SourceDocument::named(path.as_str(), read_input(path)?);
            split(&source, &indices, &config, None).map_err(|e| e.to_string())?
        },
        Command::Images => {
            let images = args
                .inputs
                .iter()
                .map(|arg| {
                    let (path, degrees) = split_rotation(arg);
                    let rotation = match degrees {
                        Some(d) => d
                            .parse::<i32>()
                            .map_err(|_| format!("{}: bad rotation {}", path, d))?,
                        None => 0,
                    };
                    Ok(RasterImage::new(read_input(path)?)
                        .with_rotation(rotation)
                        .with_name(path))
                })
                .collect::<Result<Vec<_>, String>>()?;
            images_to_pdf(&images, &config, None).map_err(|e| e.to_string())?
        },
    };

    write_output(&args.output, &bytes)?;
    Ok(bytes.len())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), String> {
    fs::write(path, bytes).map_err(|e| format!("{}: {}", path.display(), e))
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.is_empty() || raw.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }
    let args = match CliArgs::parse(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        },
    };

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let start = Instant::now();
    match run(&args) {
        Ok(size) => {
            println!(
                "Wrote {} ({} bytes) in {:.2}s",
                args.output.display(),
                size,
                start.elapsed().as_secs_f64()
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
