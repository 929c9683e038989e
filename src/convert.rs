use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use encoding_rs::{DecoderResult, Encoding};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unable to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed {encoding} sequence at byte {offset}")]
    Decode {
        encoding: &'static str,
        offset: usize,
    },
    #[error("file too large to convert ({len} bytes)")]
    TooLarge { len: usize },
    #[error("unable to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Rewrites the file at `path` as UTF-8, decoding it from `legacy`.
///
/// The whole file is decoded before anything is written; a malformed byte
/// sequence aborts with the file untouched.
pub fn convert_to_canonical(path: &Path, legacy: &'static Encoding) -> Result<(), ConvertError> {
    let bytes = fs::read(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_strict(&bytes, legacy)?;
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    write_via_temp(&target, text.as_bytes()).map_err(|source| ConvertError::Write {
        path: target.clone(),
        source,
    })
}

pub fn decode_strict(bytes: &[u8], legacy: &'static Encoding) -> Result<String, ConvertError> {
    let mut decoder = legacy.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(bytes.len())
        .ok_or(ConvertError::TooLarge { len: bytes.len() })?;
    let mut text = String::with_capacity(capacity);
    let (result, read) = decoder.decode_to_string_without_replacement(bytes, &mut text, true);
    match result {
        DecoderResult::InputEmpty => Ok(text),
        DecoderResult::Malformed(bad, extra) => Err(ConvertError::Decode {
            encoding: legacy.name(),
            offset: read - bad as usize - extra as usize,
        }),
        DecoderResult::OutputFull => Err(ConvertError::TooLarge { len: bytes.len() }),
    }
}

fn write_via_temp(path: &Path, data: &[u8]) -> io::Result<()> {
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path)?.permissions();
    let unique = format!(
        ".sjis2utf8-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    let written = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::set_permissions(&temp_path, permissions)?;
        fs::rename(&temp_path, path)
    })();
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}
