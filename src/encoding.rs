use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};

/// Number of leading bytes inspected when classifying a file.
pub const SAMPLE_BYTES: usize = 4096;

pub const DEFAULT_LEGACY_LABEL: &str = "shift_jis";

/// Resolves a WHATWG label such as `shift_jis`, `sjis` or `euc-jp`.
pub fn legacy_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    let Some(label) = label else {
        return Ok(SHIFT_JIS);
    };
    let trimmed = label.trim();
    let encoding = Encoding::for_label(trimmed.as_bytes())
        .ok_or_else(|| anyhow!("unknown source encoding '{trimmed}'"))?;
    if encoding == UTF_8 {
        return Err(anyhow!("source encoding '{trimmed}' is already UTF-8"));
    }
    Ok(encoding)
}

/// Reports whether the first `SAMPLE_BYTES` of the file are valid UTF-8.
pub fn is_canonical_encoding(path: &Path) -> Result<bool> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening '{}' for encoding detection", path.display()))?;
    let mut sample = Vec::with_capacity(SAMPLE_BYTES);
    file.take(SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)
        .with_context(|| format!("reading '{}' for encoding detection", path.display()))?;
    Ok(sample_is_utf8(&sample, sample.len() == SAMPLE_BYTES))
}

/// When the sample was cut at the buffer limit, an incomplete multi-byte
/// sequence at the very end is not counted as malformed.
fn sample_is_utf8(sample: &[u8], truncated: bool) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(err) => truncated && err.error_len().is_none(),
    }
}
