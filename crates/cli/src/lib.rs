use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use snap_engine::{Extractor, PlaceholderBackend, RenderBackend};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Selects the rasterizer: `pdfium` (default) or `placeholder`.
pub const BACKEND_ENV: &str = "HIGHLIGHT_SNAP_BACKEND";

const NO_INPUTS_MESSAGE: &str = "No pdf files found in the specified input directory.";

#[derive(Debug, Parser)]
#[command(name = "highlight-snap")]
#[command(about = "Collects snapshots of highlighted passages from PDF files")]
pub struct Cli {
    /// Directory holding the PDF files to process.
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,
    /// Directory the `<name>_out.pdf` files are written to.
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            // --help
            print!("{error}");
            return Ok(());
        }
        Err(error) => {
            println!("{}", error.render());
            println!("{}", Cli::command().render_help());
            anyhow::bail!("invalid arguments");
        }
    };

    let inputs = collect_pdf_inputs(&cli.input);
    if inputs.is_empty() {
        println!("{NO_INPUTS_MESSAGE}");
        return Ok(());
    }

    fs::create_dir_all(&cli.output).with_context(|| {
        format!("failed to create output directory {}", cli.output.display())
    })?;

    let backend = backend_from_env()?;
    let extractor = Extractor::new(backend.as_ref());
    tracing::debug!(backend = extractor.backend_name(), files = inputs.len(), "starting run");

    for input in &inputs {
        let name = file_name(input);
        println!("Started processing file: {name}");

        let output = output_path_for(input, &cli.output);
        if let Err(error) = extractor
            .extract_file(input, &output)
            .with_context(|| format!("failed to process {}", input.display()))
        {
            eprintln!("Failed to process file: {name}");
            eprintln!("{error:?}");
        }

        println!("Finished processing file: {name}");
    }

    Ok(())
}

/// Files directly inside `dir` whose name ends in `.pdf`, any case, sorted by name.
///
/// An unreadable directory yields no inputs.
pub fn collect_pdf_inputs(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::debug!(dir = %dir.display(), %error, "cannot read input directory");
            return Vec::new();
        }
    };

    let mut inputs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_pdf_name(path))
        .collect();
    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    inputs
}

/// `report.v2.pdf` in any directory becomes `<output_dir>/report_out.pdf`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let name = file_name(input);
    let stem = name.split('.').next().unwrap_or_default();
    output_dir.join(format!("{stem}_out.pdf"))
}

fn is_pdf_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_ascii_lowercase().ends_with(".pdf"))
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

fn backend_from_env() -> Result<Box<dyn RenderBackend>> {
    let choice = std::env::var(BACKEND_ENV).unwrap_or_default();
    match choice.trim().to_ascii_lowercase().as_str() {
        "placeholder" => Ok(Box::new(PlaceholderBackend)),
        "" | "pdfium" => pdfium_backend(),
        other => anyhow::bail!("unknown {BACKEND_ENV} value `{other}` (expected pdfium or placeholder)"),
    }
}

#[cfg(feature = "pdfium")]
fn pdfium_backend() -> Result<Box<dyn RenderBackend>> {
    Ok(Box::new(snap_engine::PdfiumBackend::from_env()))
}

#[cfg(not(feature = "pdfium"))]
fn pdfium_backend() -> Result<Box<dyn RenderBackend>> {
    anyhow::bail!("built without PDFium support; set {BACKEND_ENV}=placeholder")
}
