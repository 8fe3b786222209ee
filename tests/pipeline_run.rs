//! Integration tests for a full prediction run against a local store.

use amplicon_predict::prelude::*;
use amplicon_predict::predictor::PredictionRequest;
use amplicon_predict::store::{SaveRequest, ATTRIBUTE_MAPPING_TYPE, MATRIX_TYPE};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Stands in for the external tool by writing fixed output tables.
///
/// Amplicons a1-a3 are predicted. a4 is placed but exceeds the NSTI cutoff
/// and a5 is never placed. Sample s3 is absent from the KO metagenome table.
struct FakePredictor;

const AMPLICON_EC: &str = "sequence\tEC:1.1.1.1\tEC:2.7.7.7\na1\t1\t0\na2\t0\t2\na3\t1\t1\n";
const AMPLICON_KO: &str = "sequence\tK00001\tK00002\tK00003\na1\t2\t0\t1\na2\t0\t1\t0\na3\t1\t1\t1\n";
const AMPLICON_PWY: &str = "sequence\tPWY-1\tPWY-2\na1\t1\t0\na2\t0\t0\na3\t2\t1\n";
const SAMPLE_EC: &str = "function\ts1\ts2\ts3\nEC:1.1.1.1\t10\t4\t7\nEC:2.7.7.7\t3\t0\t9\n";
const SAMPLE_KO: &str = "function\ts1\ts2\nK00001\t5\t2\nK00002\t1\t8\nK00003\t4\t4\n";
const SAMPLE_PWY: &str = "pathway\ts1\ts2\ts3\nPWY-1\t6.5\t2\t3\nPWY-2\t1\t0\t2.25\n";
const QUALITY: &str =
    "sequence\t16S_rRNA_Count\tmetadata_NSTI\na1\t1\t0.1\na2\t2\t0.45\na3\t1\t1.2\na4\t3\t3.5\n";

fn write_gz(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

impl Predictor for FakePredictor {
    fn command_line(&self, request: &PredictionRequest) -> String {
        format!("fake_predictor -o {}", request.out_dir.display())
    }

    fn predict(&self, request: &PredictionRequest) -> Result<()> {
        // Inputs must be in place before the tool runs
        assert!(request.seqs.is_file());
        assert!(request.abundance.is_file());

        let out = request.out_dir;
        write_gz(&out.join("EC_predicted.tsv.gz"), AMPLICON_EC);
        write_gz(&out.join("KO_predicted.tsv.gz"), AMPLICON_KO);
        write_gz(&out.join("pathways_out/path_abun_predictions.tsv.gz"), AMPLICON_PWY);
        write_gz(&out.join("EC_metagenome_out/pred_metagenome_unstrat.tsv.gz"), SAMPLE_EC);
        write_gz(&out.join("KO_metagenome_out/pred_metagenome_unstrat.tsv.gz"), SAMPLE_KO);
        write_gz(&out.join("pathways_out/path_abun_unstrat.tsv.gz"), SAMPLE_PWY);
        write_gz(&out.join("marker_predicted_and_nsti.tsv.gz"), QUALITY);
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    store: LocalStore,
    settings: Settings,
    matrix_ref: String,
}

/// Seed a store with a 5 amplicon × 3 sample matrix.
fn create_fixture(with_side_table: bool, with_sample_set: bool, values: Value) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path().join("store")).unwrap();

    let mut matrix = json!({
        "data": {
            "row_ids": ["a1", "a2", "a3", "a4", "a5"],
            "col_ids": ["s1", "s2", "s3"],
            "values": values
        },
        "sequences": {
            "a1": "ACGTACGT", "a2": "ACGTTTGT", "a3": "GGGTACGT", "a4": "ACCCACGT", "a5": "TTTTACGT"
        },
        "scale": "raw"
    });

    if with_side_table {
        let attrs = store
            .save_object(SaveRequest {
                workspace: "ws",
                type_name: ATTRIBUTE_MAPPING_TYPE,
                name: "amplicon_attrs",
                data: json!({
                    "attributes": [{"attribute": "taxonomy", "source": "upload"}],
                    "instances": {
                        "otu1": ["k__Bacteria"],
                        "otu2": ["k__Bacteria"],
                        "otu3": ["k__Archaea"],
                        "otu4": ["k__Bacteria"],
                        "otu5": ["k__Bacteria"]
                    },
                    "ontology_mapping_method": "User curation"
                }),
                provenance: vec![],
            })
            .unwrap();
        matrix["row_attributemapping_ref"] = json!(attrs);
        matrix["row_mapping"] = json!({
            "a1": "otu1", "a2": "otu2", "a3": "otu3", "a4": "otu4", "a5": "otu5"
        });
    }
    if with_sample_set {
        matrix["sample_set_ref"] = json!("ws/samples/1");
    }

    let matrix_ref = store
        .save_object(SaveRequest {
            workspace: "ws",
            type_name: MATRIX_TYPE,
            name: "amplicon_matrix",
            data: matrix,
            provenance: vec![],
        })
        .unwrap();

    let settings = Settings {
        scratch_dir: dir.path().join("scratch"),
        ..Settings::default()
    };

    Fixture {
        _dir: dir,
        store,
        settings,
        matrix_ref,
    }
}

fn count_values() -> Value {
    json!([[10, 0, 3], [0, 5, 1], [2, 2, 2], [7, null, 1], [1, 1, 0]])
}

fn profile_data(store: &LocalStore, reference: &str) -> Value {
    store.get_object(reference).unwrap().data
}

#[test]
fn test_full_run() {
    let fx = create_fixture(true, true, count_values());
    let mut params = RunParams::new(&fx.matrix_ref);
    params.output_name = Some("predicted".to_string());

    let summary = run_pipeline(&params, &fx.settings, &fx.store, &FakePredictor).unwrap();

    let refs: Vec<&str> = summary
        .objects_created
        .iter()
        .map(|o| o.reference.as_str())
        .collect();
    assert_eq!(
        refs,
        vec![
            "ws/amplicon_attrs/2",
            "ws/predicted/1",
            "ws/predicted.amplicon_ec/1",
            "ws/predicted.amplicon_ko/1",
            "ws/predicted.amplicon_metacyc/1",
            "ws/predicted.metagenome_ec/1",
            "ws/predicted.metagenome_ko/1",
            "ws/predicted.metagenome_metacyc/1",
        ]
    );
    assert!(summary.warnings.is_empty(), "{:?}", summary.warnings);
    assert!(summary.report_html.is_file());
    assert!(summary.run_dir.starts_with(&fx.settings.scratch_dir));

    // Side-table gained one slot, filled through row_mapping
    let attrs = profile_data(&fx.store, "ws/amplicon_attrs/2");
    assert_eq!(attrs["attributes"].as_array().unwrap().len(), 2);
    assert_eq!(attrs["attributes"][1]["attribute"], json!("PICRUSt2 MetaCyc Predictions"));
    assert_eq!(attrs["attributes"][1]["source"], json!("PICRUSt2"));
    assert_eq!(attrs["instances"]["otu1"], json!(["k__Bacteria", "PWY-1"]));
    assert_eq!(attrs["instances"]["otu2"], json!(["k__Bacteria", ""]));
    assert_eq!(attrs["instances"]["otu3"], json!(["k__Archaea", "PWY-1,PWY-2"]));
    assert_eq!(attrs["instances"]["otu4"], json!(["k__Bacteria", null]));
    assert_eq!(attrs["ontology_mapping_method"], json!("User curation"));

    // Original side-table version untouched
    let original = profile_data(&fx.store, "ws/amplicon_attrs/1");
    assert_eq!(original["attributes"].as_array().unwrap().len(), 1);

    // Matrix re-saved pointing at the new side-table
    let matrix = profile_data(&fx.store, "ws/predicted/1");
    assert_eq!(matrix["row_attributemapping_ref"], json!("ws/amplicon_attrs/2"));
    assert_eq!(matrix["scale"], json!("raw"));
    assert_eq!(
        fx.store.provenance("ws/predicted/1").unwrap(),
        vec!["ws/amplicon_matrix/1".to_string(), "ws/amplicon_attrs/2".to_string()]
    );

    // Amplicon profiles padded to every amplicon
    let ec = profile_data(&fx.store, "ws/predicted.amplicon_ec/1");
    assert_eq!(ec["original_matrix_ref"], json!("ws/predicted/1"));
    assert_eq!(ec["profile_category"], json!("amplicon"));
    assert_eq!(ec["data"]["row_ids"], json!(["a1", "a2", "a3", "a4", "a5"]));
    assert_eq!(ec["data"]["values"][1], json!([0.0, 2.0]));
    assert_eq!(ec["data"]["values"][3], json!([null, null]));
    assert_eq!(ec["data"]["values"][4], json!([null, null]));

    // Sample profile padded to every sample
    let ko = profile_data(&fx.store, "ws/predicted.metagenome_ko/1");
    assert_eq!(ko["profile_category"], json!("community"));
    assert_eq!(ko["data"]["col_ids"], json!(["s1", "s2", "s3"]));
    assert_eq!(ko["data"]["values"][0], json!([5.0, 2.0, null]));

    let pwy = profile_data(&fx.store, "ws/predicted.metagenome_metacyc/1");
    assert_eq!(pwy["data"]["values"][0], json!([6.5, 2.0, 3.0]));

    // Report lists the command and links each heatmap
    let report = fs::read_to_string(&summary.report_html).unwrap();
    assert!(report.contains("fake_predictor -o"));
    assert!(report.contains("amplicon_metacyc.html"));
    assert!(report.contains("metagenome_ko.html"));
}

#[test]
fn test_run_without_side_table() {
    let fx = create_fixture(false, true, count_values());
    let params = RunParams::new(&fx.matrix_ref);

    let summary = run_pipeline(&params, &fx.settings, &fx.store, &FakePredictor).unwrap();

    // Only per-sample profiles, saved under the matrix's own name
    let refs: Vec<&str> = summary
        .objects_created
        .iter()
        .map(|o| o.reference.as_str())
        .collect();
    assert_eq!(
        refs,
        vec![
            "ws/amplicon_matrix.metagenome_ec/1",
            "ws/amplicon_matrix.metagenome_ko/1",
            "ws/amplicon_matrix.metagenome_metacyc/1",
        ]
    );
    assert_eq!(fx.store.versions("ws", "amplicon_matrix").unwrap(), vec![1]);

    assert_eq!(summary.warnings.len(), 2);
    assert!(summary.warnings[0].contains("no row AttributeMapping"));
    assert!(summary.warnings[1].contains("per-amplicon"));

    let report = fs::read_to_string(&summary.report_html).unwrap();
    assert!(report.contains("Warnings"));
}

#[test]
fn test_run_without_sample_set() {
    let fx = create_fixture(true, false, count_values());
    let mut params = RunParams::new(&fx.matrix_ref);
    params.ko = false;
    params.ec = false;

    let summary = run_pipeline(&params, &fx.settings, &fx.store, &FakePredictor).unwrap();

    let refs: Vec<&str> = summary
        .objects_created
        .iter()
        .map(|o| o.reference.as_str())
        .collect();
    assert_eq!(
        refs,
        vec![
            "ws/amplicon_attrs/2",
            "ws/amplicon_matrix/2",
            "ws/amplicon_matrix.amplicon_metacyc/1",
        ]
    );
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("no sample set"));
}

#[test]
fn test_rerun_reuses_slot() {
    let fx = create_fixture(true, false, count_values());
    let mut params = RunParams::new(&fx.matrix_ref);
    params.create_amplicon_derived_objects = false;

    run_pipeline(&params, &fx.settings, &fx.store, &FakePredictor).unwrap();

    // Second run starts from the re-saved matrix
    let params = RunParams {
        amplicon_matrix_ref: "ws/amplicon_matrix".to_string(),
        ..params
    };
    let summary = run_pipeline(&params, &fx.settings, &fx.store, &FakePredictor).unwrap();

    assert_eq!(summary.objects_created[0].reference, "ws/amplicon_attrs/3");
    assert!(summary.warnings.iter().any(|w| w.contains("Overwriting")));

    let attrs = profile_data(&fx.store, "ws/amplicon_attrs/3");
    assert_eq!(attrs["attributes"].as_array().unwrap().len(), 2);
    assert_eq!(attrs["instances"]["otu3"], json!(["k__Archaea", "PWY-1,PWY-2"]));
}

#[test]
fn test_failing_predictor_saves_nothing() {
    let fx = create_fixture(true, true, count_values());
    let params = RunParams::new(&fx.matrix_ref);
    let predictor = ShellPredictor::new("false");

    let err = run_pipeline(&params, &fx.settings, &fx.store, &predictor).unwrap_err();
    assert!(matches!(err, PredictError::ExternalTool { code: 1, .. }));

    assert_eq!(fx.store.versions("ws", "amplicon_attrs").unwrap(), vec![1]);
    assert_eq!(fx.store.versions("ws", "amplicon_matrix").unwrap(), vec![1]);
    assert!(fx
        .store
        .versions("ws", "amplicon_matrix.metagenome_ec")
        .unwrap()
        .is_empty());
}

#[test]
fn test_non_count_matrix_rejected() {
    let values = json!([[10, 0, 3], [0, 5.5, 1], [2, 2, 2], [7, 0, 1], [1, 1, 0]]);
    let fx = create_fixture(true, true, values);
    let params = RunParams::new(&fx.matrix_ref);

    let err = run_pipeline(&params, &fx.settings, &fx.store, &FakePredictor).unwrap_err();
    assert!(matches!(err, PredictError::Validation { .. }));

    // Rejected before any run directory exists
    assert!(!fx.settings.scratch_dir.exists());
}

#[test]
fn test_unexplained_drop_rejected() {
    let fx = create_fixture(true, true, count_values());
    let params = RunParams::new(&fx.matrix_ref);
    let settings = Settings {
        nsti_max: 5.0,
        ..fx.settings.clone()
    };

    // With a looser cutoff a4 should have been kept
    let err = run_pipeline(&params, &settings, &fx.store, &FakePredictor).unwrap_err();
    assert!(matches!(err, PredictError::Reconciliation { .. }));
    assert_eq!(fx.store.versions("ws", "amplicon_attrs").unwrap(), vec![1]);
}

#[test]
fn test_default_settings_command_line() {
    let fx = create_fixture(true, true, count_values());
    let params = RunParams::new(&fx.matrix_ref);

    // Record the command the default tool would run, without running it
    struct Recorder {
        inner: ShellPredictor,
        line: std::cell::RefCell<Option<String>>,
    }
    impl Predictor for Recorder {
        fn command_line(&self, request: &PredictionRequest) -> String {
            self.inner.command_line(request)
        }
        fn predict(&self, request: &PredictionRequest) -> Result<()> {
            *self.line.borrow_mut() = Some(self.inner.command_line(request));
            FakePredictor.predict(request)
        }
    }

    let recorder = Recorder {
        inner: fx.settings.predictor(),
        line: std::cell::RefCell::new(None),
    };
    let summary = run_pipeline(&params, &fx.settings, &fx.store, &recorder).unwrap();

    let run = summary.run_dir.display().to_string();
    let expected = format!(
        "picrust2_pipeline.py -s {run}/study_seqs.fna -i {run}/study_seqs.tsv \
         -o {run}/predictor_out --per_sequence_contrib -p 1 --verbose | tee {run}/log.txt"
    );
    assert_eq!(recorder.line.borrow().as_deref(), Some(expected.as_str()));

    let report = fs::read_to_string(&summary.report_html).unwrap();
    assert!(report.contains("--per_sequence_contrib"));
}

#[test]
fn test_missing_sample_rejected_without_padding() {
    let fx = create_fixture(true, true, count_values());
    let params = RunParams::new(&fx.matrix_ref);
    let settings = Settings {
        pad_sample_tables: false,
        ..fx.settings.clone()
    };

    // The KO metagenome table lacks s3
    let err = run_pipeline(&params, &settings, &fx.store, &FakePredictor).unwrap_err();
    assert!(matches!(err, PredictError::Reconciliation { .. }));
    assert_eq!(fx.store.versions("ws", "amplicon_matrix").unwrap(), vec![1]);
}
