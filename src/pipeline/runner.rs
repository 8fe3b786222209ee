//! End-to-end prediction run.

use super::config::{RunParams, Settings};
use super::context::{RunContext, RunSummary};
use crate::data::{FunctionTable, SlotOutcome};
use crate::error::{PredictError, Result};
use crate::predictor::{
    check_outputs, decompress_outputs, select_tables, FunctionFamily, OutputTable,
    PredictionRequest, Predictor, ProfileCategory, QUALITY_COLUMN, QUALITY_TABLE,
};
use crate::reconcile::{
    check_sample_ids, classify_dropped, derive_traits, pad_table_file, restore_full_shape,
    verify_dropped, DescriptionMap, DropReason, Orientation, QualityTable,
};
use crate::report::HtmlReportWriter;
use crate::store::{LoadedAttributeMapping, LoadedMatrix, ObjectStore, ProfileRequest, ProfileStore};
use log::info;
use std::path::{Path, PathBuf};

/// A predictor table padded to full shape and ready for consumers.
#[derive(Debug, Clone)]
pub struct ReconciledTable {
    pub table: &'static OutputTable,
    pub orientation: Orientation,
    pub path: PathBuf,
}

/// Run the predictor for one matrix and fold its results back into `store`.
///
/// Stages:
/// 1. Load and validate the matrix; nothing is written if validation fails
/// 2. Write the sequences and abundance table into a fresh run directory
/// 3. Run the predictor once; a failure aborts before anything is saved
/// 4. Decompress and pad every selected table to the matrix's ids
/// 5. Annotate the matrix's side-table with MetaCyc predictions and re-save both
/// 6. Create functional profiles from the padded tables
/// 7. Render the report
///
/// Missing optional inputs (side-table, row mapping, sample set) are
/// recorded as warnings and the dependent stage is skipped.
pub fn run_pipeline<S, P>(
    params: &RunParams,
    settings: &Settings,
    store: &S,
    predictor: &P,
) -> Result<RunSummary>
where
    S: ObjectStore + ProfileStore + ?Sized,
    P: Predictor + ?Sized,
{
    let families = params.functions();
    if families.is_empty() {
        return Err(PredictError::InvalidParameter(
            "No function families selected".to_string(),
        ));
    }
    let tables = select_tables(&families);

    info!("Loading matrix {}", params.amplicon_matrix_ref);
    let mut loaded = LoadedMatrix::load(store, &params.amplicon_matrix_ref)?;
    loaded.matrix().validate()?;

    let mut ctx = RunContext::create(&settings.scratch_dir)?;
    info!("Run directory {}", ctx.run_dir().display());

    let attr_ref = loaded.matrix().row_attributemapping_ref().map(String::from);
    if attr_ref.is_none() {
        ctx.warn(format!(
            "Matrix {} has no row AttributeMapping; pathway predictions will not be added to it",
            loaded.reference()
        ));
    }

    // Predictor inputs
    let seqs = ctx.seqs_path();
    let abundance = ctx.abundance_path();
    let out_dir = ctx.predictor_out_dir();
    let log_path = ctx.log_path();
    loaded.matrix().write_fasta(&seqs)?;
    loaded
        .matrix()
        .write_abundance_tsv(&abundance, &settings.amplicon_header)?;

    let request = PredictionRequest {
        seqs: &seqs,
        abundance: &abundance,
        out_dir: &out_dir,
        log: Some(&log_path),
    };
    ctx.record_command(predictor.command_line(&request));
    predictor.predict(&request)?;

    check_outputs(&out_dir, &tables)?;
    let decompressed = decompress_outputs(&out_dir, &ctx.decompressed_dir(), &tables)?;

    // Reconcile
    let row_ids = loaded.matrix().row_ids().to_vec();
    let col_ids = loaded.matrix().col_ids().to_vec();
    let reason = if settings.verify_drops
        && tables
            .iter()
            .any(|t| t.orientation == Orientation::ByRowEntity)
    {
        let path = out_dir.join(QUALITY_TABLE);
        if !path.is_file() {
            return Err(PredictError::MissingOutput(path));
        }
        let quality = QualityTable::from_tsv(&path, QUALITY_COLUMN)?;
        Some(classify_dropped(&row_ids, &quality, settings.nsti_max)?)
    } else {
        None
    };

    let mut reconciled = Vec::with_capacity(decompressed.len());
    for d in decompressed {
        reconcile_table(d.table, &d.path, &row_ids, &col_ids, reason.as_ref(), settings)?;
        reconciled.push(ReconciledTable {
            table: d.table,
            orientation: d.table.orientation,
            path: d.path,
        });
    }

    // Side-table and matrix
    let mut matrix_ref = loaded.reference();
    let mut matrix_resaved = false;
    let workspace = params
        .workspace()
        .unwrap_or(loaded.workspace())
        .to_string();

    let metacyc_table = reconciled.iter().find(|r| {
        r.table.function == FunctionFamily::MetaCyc && r.orientation == Orientation::ByRowEntity
    });
    match (&attr_ref, metacyc_table) {
        (Some(attr_ref), Some(metacyc)) => {
            let descriptions = match &settings.metacyc_descriptions {
                Some(path) => Some(DescriptionMap::from_path(path)?),
                None => None,
            };
            let traits = derive_traits(&FunctionTable::from_tsv(&metacyc.path)?, descriptions.as_ref());

            let mut session = LoadedAttributeMapping::load(store, attr_ref)?;
            let slot = session
                .mapping_mut()
                .allocate_or_get_slot(&settings.trait_attribute, &settings.trait_source)?;
            match &slot.outcome {
                SlotOutcome::Existing => ctx.warn(format!(
                    "Overwriting existing attribute '{}' from source '{}' in {}",
                    slot.name,
                    settings.trait_source,
                    session.reference()
                )),
                SlotOutcome::Renamed { requested } => ctx.warn(format!(
                    "Attribute '{}' already exists in {} from another source; saving as '{}'",
                    requested,
                    session.reference(),
                    slot.name
                )),
                SlotOutcome::Created => info!("Added attribute '{}'", slot.name),
            }

            let row_mapping = loaded.matrix().row_mapping();
            if row_mapping.is_none() {
                ctx.warn(format!(
                    "Matrix {} has no row_mapping; using amplicon ids as AttributeMapping ids",
                    loaded.reference()
                ));
            }
            let report = session
                .mapping_mut()
                .apply_values(slot.index, &traits, row_mapping)?;
            info!("Updated {} attribute values", report.updated);
            if !report.unmapped.is_empty() {
                ctx.warn(format!(
                    "{} amplicon(s) missing from row_mapping were not annotated, e.g. {:?}",
                    report.unmapped.len(),
                    &report.unmapped[..report.unmapped.len().min(5)]
                ));
            }
            if !report.unknown.is_empty() {
                ctx.warn(format!(
                    "{} id(s) not found in the AttributeMapping were not annotated, e.g. {:?}",
                    report.unknown.len(),
                    &report.unknown[..report.unknown.len().min(5)]
                ));
            }

            let new_attr_ref = session.save(store)?;
            ctx.record_object(
                &new_attr_ref,
                &format!("Added attribute '{}' with MetaCyc pathway predictions", slot.name),
            );

            loaded.matrix_mut().set_row_attributemapping_ref(&new_attr_ref);
            let name = params
                .output_name
                .clone()
                .unwrap_or_else(|| loaded.name().to_string());
            matrix_ref = loaded.save(
                store,
                &workspace,
                &name,
                vec![loaded.reference(), new_attr_ref],
            )?;
            matrix_resaved = true;
            ctx.record_object(&matrix_ref, "Updated amplicon matrix with new row AttributeMapping");
        }
        (Some(_), None) => {
            info!("MetaCyc not selected; leaving the AttributeMapping unchanged");
        }
        (None, _) => {}
    }

    // Derived profiles
    let base_name = params
        .output_name
        .clone()
        .unwrap_or_else(|| loaded.name().to_string());

    if params.create_amplicon_derived_objects {
        if matrix_resaved {
            for r in reconciled
                .iter()
                .filter(|r| r.table.category == ProfileCategory::Amplicon)
            {
                create_profile(&mut ctx, store, settings, &workspace, &matrix_ref, &base_name, r)?;
            }
        } else {
            ctx.warn(
                "Skipping per-amplicon functional profiles: they need the matrix re-saved \
                 with MetaCyc predictions in its row AttributeMapping",
            );
        }
    }

    if params.create_sample_derived_objects {
        if loaded.matrix().sample_set_ref().is_some() {
            for r in reconciled
                .iter()
                .filter(|r| r.table.category == ProfileCategory::Community)
            {
                create_profile(&mut ctx, store, settings, &workspace, &matrix_ref, &base_name, r)?;
            }
        } else {
            ctx.warn(format!(
                "Skipping per-sample functional profiles: matrix {} has no sample set",
                loaded.reference()
            ));
        }
    }

    // Report
    let figures = reconciled
        .iter()
        .map(|r| (r.table, r.path.clone()))
        .collect();
    let writer = HtmlReportWriter::new(ctx.commands().to_vec(), figures, &ctx.report_dir())
        .max_len(settings.heatmap_max_len);
    let output = writer.write(ctx.warnings())?;
    for msg in output.figure_warnings {
        ctx.warn(msg);
    }

    info!("Report written to {}", output.html.display());
    Ok(ctx.into_summary(output.html))
}

fn reconcile_table(
    table: &OutputTable,
    path: &Path,
    row_ids: &[String],
    col_ids: &[String],
    reason: Option<&DropReason>,
    settings: &Settings,
) -> Result<()> {
    match table.orientation {
        Orientation::ByRowEntity => {
            let present = pad_table_file(path, row_ids, Orientation::ByRowEntity)?;
            if present.len() != row_ids.len() {
                if let Some(reason) = reason {
                    verify_dropped(table.id, row_ids, &present, reason)?;
                }
            }
            info!(
                "{}: {} of {} amplicons predicted",
                table.id,
                present.len(),
                row_ids.len()
            );
        }
        Orientation::ByColumnEntity => {
            let partial = FunctionTable::from_tsv(path)?;
            check_sample_ids(&partial, col_ids, settings.pad_sample_tables)?;
            if settings.pad_sample_tables && partial.n_cols() != col_ids.len() {
                restore_full_shape(partial, col_ids, Orientation::ByColumnEntity)?.to_tsv(path)?;
            }
        }
    }
    Ok(())
}

fn create_profile<S: ProfileStore + ?Sized>(
    ctx: &mut RunContext,
    store: &S,
    settings: &Settings,
    workspace: &str,
    matrix_ref: &str,
    base_name: &str,
    reconciled: &ReconciledTable,
) -> Result<()> {
    let table = reconciled.table;
    let per = match table.category {
        ProfileCategory::Amplicon => "amplicon",
        ProfileCategory::Community => "sample",
    };
    let description = format!(
        "{} abundance per {} predicted by {}",
        table.function.code(),
        per,
        settings.trait_source
    );
    let name = format!("{}.{}", base_name, table.id);

    let reference = store.create_profile(&ProfileRequest {
        workspace,
        matrix_ref,
        table_path: &reconciled.path,
        category: table.category,
        function: table.function,
        method: &settings.trait_source,
        name: &name,
        description: &description,
    })?;
    ctx.record_object(&reference, &description);
    Ok(())
}
