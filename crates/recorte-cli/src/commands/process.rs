//! Process command - segment one file and extract a field per receipt.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use recorte_core::{
    ContentKind, ExtractionProfile, Grouping, OcrExtractor, SessionAssembler,
};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file for the session report (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Built-in extraction profile
    #[arg(short, long, value_enum, default_value = "bank")]
    profile: ProfileChoice,

    /// Directory that session directories are created under
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// One session per detected receipt instead of one shared session
    #[arg(long)]
    individual: bool,

    /// Override the minimum region area in px^2
    #[arg(long)]
    min_area: Option<u64>,

    /// Override the rasterization DPI for PDF inputs
    #[arg(long)]
    dpi: Option<u32>,

    /// Override the OCR languages (e.g. "spa+eng")
    #[arg(long)]
    lang: Option<String>,

    /// Override the per-OCR-attempt timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ProfileChoice {
    /// Large bank receipts, document-number extraction
    Bank,
    /// Dense grids of small receipts
    Grid,
    /// Whole-page NET total extraction
    Net,
}

pub fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let mut profile = if let Some(path) = config_path {
        ExtractionProfile::from_file(std::path::Path::new(path))?
    } else {
        match args.profile {
            ProfileChoice::Bank => ExtractionProfile::bank_document(),
            ProfileChoice::Grid => ExtractionProfile::grid(),
            ProfileChoice::Net => ExtractionProfile::net_total(),
        }
    };

    if let Some(min_area) = args.min_area {
        profile.min_area = min_area;
    }
    if let Some(dpi) = args.dpi {
        profile.dpi = dpi;
    }
    if let Some(lang) = &args.lang {
        profile.languages = lang.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        profile.ocr_timeout_ms = timeout_ms;
    }

    info!("Processing file: {}", args.input.display());
    let data = fs::read(&args.input)?;

    let extension = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let kind = match extension.as_str() {
        "pdf" => ContentKind::Pdf,
        "png" | "jpg" | "jpeg" | "tiff" | "bmp" => ContentKind::Image,
        _ => {
            debug!("unknown extension {:?}, sniffing content", extension);
            ContentKind::sniff(&data)
        }
    };

    let extractor = build_extractor();
    let assembler = SessionAssembler::new(extractor, &args.output_dir);

    let grouping = if args.individual {
        Grouping::Individual
    } else {
        Grouping::Combined
    };
    let outcome = assembler.process(&data, kind, &profile, grouping)?;

    for session in outcome.sessions() {
        println!(
            "{} {}: {} receipt(s), {} matched, {} positional -> {}",
            style("✓").green(),
            session.id,
            session.summary.total_regions,
            session.summary.matched,
            session.summary.fallback,
            session.dir.display()
        );
    }

    let report = serde_json::to_string_pretty(&outcome.sessions())?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &report)?;
        println!(
            "{} Report written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", report);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Wires the compiled-in OCR engines into an extractor.
#[cfg(feature = "tesseract")]
fn build_extractor() -> OcrExtractor {
    use std::sync::Arc;

    use recorte_core::TesseractBackend;

    OcrExtractor::new(Some(Arc::new(TesseractBackend::new(None))), None)
}

#[cfg(not(feature = "tesseract"))]
fn build_extractor() -> OcrExtractor {
    tracing::warn!("built without an OCR engine; every receipt will get a positional name");
    OcrExtractor::new(None, None)
}
