//! ampred - functional prediction for amplicon matrices
//!
//! Command-line interface around the prediction pipeline and its building blocks.

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, Level};
use simple_logger::init_with_level;

use amplicon_predict::data::{AbundanceMatrix, FunctionTable};
use amplicon_predict::error::{PredictError, Result};
use amplicon_predict::pipeline::{run_pipeline, RunParams, Settings};
use amplicon_predict::reconcile::{
    classify_dropped, restore_full_shape, verify_dropped, Orientation, QualityTable,
};
use amplicon_predict::report::{render_heatmap, DEFAULT_MAX_LEN};
use amplicon_predict::store::LocalStore;
use std::path::{Path, PathBuf};

/// CLI-friendly orientation enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOrientation {
    /// Entities are rows (amplicon × function)
    Rows,
    /// Entities are columns (function × sample)
    Columns,
}

impl From<CliOrientation> for Orientation {
    fn from(o: CliOrientation) -> Self {
        match o {
            CliOrientation::Rows => Orientation::ByRowEntity,
            CliOrientation::Columns => Orientation::ByColumnEntity,
        }
    }
}

/// Functional prediction for amplicon abundance matrices
#[derive(Parser)]
#[command(name = "ampred")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full prediction pipeline for one matrix
    Run {
        /// Run parameters (JSON or YAML)
        #[arg(short, long)]
        params: PathBuf,

        /// Tool settings YAML; defaults apply when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Object store directory
        #[arg(long)]
        store: PathBuf,
    },

    /// Check a matrix JSON file holds count data
    Validate {
        /// Matrix object as JSON
        #[arg(short, long)]
        matrix: PathBuf,
    },

    /// Pad a predictor table to a full list of ids
    Pad {
        /// Table TSV (optionally gzipped)
        #[arg(short, long)]
        input: PathBuf,

        /// File with one id per line, in output order
        #[arg(long)]
        ids: PathBuf,

        /// Which axis holds the ids
        #[arg(long, value_enum, default_value = "rows")]
        orientation: CliOrientation,

        /// Quality table used to check the dropped ids
        #[arg(long)]
        quality: Option<PathBuf>,

        /// Maximum NSTI of a kept entity
        #[arg(long, default_value = "2.0")]
        nsti_max: f64,

        /// Output TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a clustered heatmap of a table
    Heatmap {
        /// Table TSV (optionally gzipped)
        #[arg(short, long)]
        input: PathBuf,

        /// Output HTML
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "row")]
        row_label: String,

        #[arg(long, default_value = "column")]
        col_label: String,

        /// Cap on rows and columns
        #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
        max_len: usize,
    },

    /// Write example settings and parameter files
    Example {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::Debug } else { Level::Info };
    init_with_level(level).unwrap_or_else(|e| {
        eprintln!("Failed to initialise logging: {}", e);
    });

    let result = match cli.command {
        Commands::Run {
            params,
            settings,
            store,
        } => cmd_run(&params, settings.as_deref(), &store),

        Commands::Validate { matrix } => cmd_validate(&matrix),

        Commands::Pad {
            input,
            ids,
            orientation,
            quality,
            nsti_max,
            output,
        } => cmd_pad(
            &input,
            &ids,
            orientation.into(),
            quality.as_deref(),
            nsti_max,
            &output,
        ),

        Commands::Heatmap {
            input,
            output,
            row_label,
            col_label,
            max_len,
        } => render_heatmap(
            &input,
            &output,
            (row_label.as_str(), col_label.as_str()),
            max_len,
        ),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Run the pipeline against a local store
fn cmd_run(params_path: &Path, settings_path: Option<&Path>, store_dir: &Path) -> Result<()> {
    let text = std::fs::read_to_string(params_path)?;
    let params = match params_path.extension().and_then(|e| e.to_str()) {
        Some("json") => RunParams::from_json(&text)?,
        _ => RunParams::from_yaml(&text)?,
    };
    let settings = match settings_path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.threads)
        .build_global()
        .unwrap_or_else(|e| log::warn!("Could not size thread pool: {}", e));

    let store = LocalStore::open(store_dir)?;
    let predictor = settings.predictor();
    let summary = run_pipeline(&params, &settings, &store, &predictor)?;

    info!("Created {} object(s)", summary.objects_created.len());
    for obj in &summary.objects_created {
        info!("  {}  {}", obj.reference, obj.description);
    }
    if !summary.warnings.is_empty() {
        info!("{} warning(s) recorded in the report", summary.warnings.len());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Validate a matrix file
fn cmd_validate(matrix_path: &Path) -> Result<()> {
    let value: serde_json::Value = serde_json::from_reader(std::fs::File::open(matrix_path)?)?;
    let matrix = AbundanceMatrix::from_value(value)?;
    matrix.validate()?;
    info!(
        "{}: {} amplicons x {} samples of count data",
        matrix_path.display(),
        matrix.n_rows(),
        matrix.n_cols()
    );
    Ok(())
}

/// Pad a table and optionally check its dropped ids
fn cmd_pad(
    input: &Path,
    ids_path: &Path,
    orientation: Orientation,
    quality: Option<&Path>,
    nsti_max: f64,
    output: &Path,
) -> Result<()> {
    let full_ids: Vec<String> = std::fs::read_to_string(ids_path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    if full_ids.is_empty() {
        return Err(PredictError::EmptyData(format!(
            "No ids in {}",
            ids_path.display()
        )));
    }

    let table = FunctionTable::from_tsv(input)?;
    let present = orientation.entity_ids(&table).to_vec();

    if let Some(quality) = quality {
        let quality = QualityTable::from_tsv(quality, amplicon_predict::predictor::QUALITY_COLUMN)?;
        let reason = classify_dropped(&full_ids, &quality, nsti_max)?;
        verify_dropped(&input.display().to_string(), &full_ids, &present, &reason)?;
        info!(
            "Dropped ids explained: {} unplaced, {} above NSTI {}",
            reason.precondition().len(),
            reason.quality_threshold().len(),
            nsti_max
        );
    }

    let padded = restore_full_shape(table, &full_ids, orientation)?;
    padded.to_tsv(output)?;
    info!(
        "Padded {} of {} ids into {} ({} cells not predicted)",
        full_ids.len() - present.len(),
        full_ids.len(),
        output.display(),
        padded.n_not_predicted()
    );
    Ok(())
}

/// Write example configuration files
fn cmd_example(output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let settings_path = output_dir.join("settings.yaml");
    let settings = Settings {
        threads: 8,
        ..Settings::default()
    };
    let yaml = settings.to_yaml()?;
    std::fs::write(&settings_path, &yaml)?;
    info!("Wrote example settings to {:?}", settings_path);

    let params_path = output_dir.join("params.yaml");
    let params = "\
amplicon_matrix_ref: my_workspace/amplicon_matrix
output_name: amplicon_matrix_predicted
functions:
  ko: true
  ec: true
  metacyc: true
derived_objects:
  create_amplicon_derived_objects: true
  create_sample_derived_objects: true
";
    // Round-trip to make sure the example stays valid
    RunParams::from_yaml(params)?;
    std::fs::write(&params_path, params)?;
    info!("Wrote example parameters to {:?}", params_path);

    println!("{}", yaml);
    Ok(())
}
