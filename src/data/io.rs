//! File helpers shared by the table readers.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Whether a path carries a `.gz` extension.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a file for reading, transparently decompressing `.gz` files.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn Read>> {
    let file = File::open(path.as_ref())?;
    if is_gzipped(path.as_ref()) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Decompress `src` into `dst`, creating parent directories as needed.
pub fn gunzip<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<PathBuf> {
    let dst = dst.as_ref();
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut decoder = MultiGzDecoder::new(File::open(src)?);
    let mut writer = BufWriter::new(File::create(dst)?);
    io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    Ok(dst.to_path_buf())
}

/// Render a value `%g`-style for table output; the sentinel is an empty cell.
///
/// Magnitudes below 1e-4 or from 1e16 up switch to exponent notation with a
/// signed two-digit exponent (`1.5e-07`, `2e+20`). Digits are never rounded away.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }

    let magnitude = value.abs();
    if value == 0.0 || !value.is_finite() || (1e-4..1e16).contains(&magnitude) {
        return format!("{}", value);
    }

    let sci = format!("{:e}", value);
    match sci.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => format!(
                "{}e{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => sci,
        },
        None => sci,
    }
}
