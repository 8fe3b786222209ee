//! The external functional predictor and its output catalog.

pub mod outputs;
pub mod shell;

pub use outputs::{
    check_outputs, decompress_outputs, find_table, select_tables, DecompressedTable,
    FunctionFamily, OutputTable, ProfileCategory, OUTPUT_TABLES, QUALITY_COLUMN, QUALITY_TABLE,
};
pub use shell::{
    run_checked, shell_quote, PredictionRequest, Predictor, ShellPredictor, PER_SEQUENCE_FLAG,
};
