//! Input loading: turn a user-supplied path or URL into an [`InputFile`].
//!
//! The same accept rules as the upload form apply: PDF only, at most
//! `max_bytes` per file. PDF-ness is decided by the `%PDF` magic bytes, not
//! the extension, so a renamed Word document is rejected here with a clear
//! error instead of failing later inside pdfium.

use crate::batch::InputFile;
use crate::error::PipelineError;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL, validating size and PDF magic.
pub async fn load_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<InputFile, PipelineError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        load_local(input, max_bytes).await
    }
}

/// Result of [`load_inputs`]: the accepted files plus every rejected input
/// with its error.
#[derive(Debug, Default)]
pub struct LoadedInputs {
    pub files: Vec<InputFile>,
    pub rejected: Vec<(String, PipelineError)>,
}

/// Load several inputs in order.
///
/// An input that fails to load or validate is logged and dropped; the
/// others are kept, so one bad file never costs the rest of the batch.
pub async fn load_inputs(inputs: &[String], timeout_secs: u64, max_bytes: u64) -> LoadedInputs {
    let mut loaded = LoadedInputs::default();
    for input in inputs {
        match load_input(input, timeout_secs, max_bytes).await {
            Ok(file) => loaded.files.push(file),
            Err(e) => {
                warn!("Dropping {}: {}", input, e);
                loaded.rejected.push((input.clone(), e));
            }
        }
    }
    loaded
}

async fn load_local(path_str: &str, max_bytes: u64) -> Result<InputFile, PipelineError> {
    let path = PathBuf::from(path_str);

    let meta = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(PipelineError::FileNotFound { path }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied { path })
        }
        Err(_) => return Err(PipelineError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume.pdf".to_string());

    check_size(&name, meta.len(), max_bytes)?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            PipelineError::PermissionDenied { path: path.clone() }
        } else {
            PipelineError::FileNotFound { path: path.clone() }
        }
    })?;
    check_pdf_magic(&name, &bytes)?;

    debug!("Loaded local résumé: {} ({} bytes)", path.display(), bytes.len());
    Ok(InputFile::pdf(name, bytes))
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<InputFile, PipelineError> {
    info!("Downloading résumé from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    if let Some(len) = response.content_length() {
        check_size(&name, len, max_bytes)?;
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_size(&name, bytes.len() as u64, max_bytes)?;
    check_pdf_magic(&name, &bytes)?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(InputFile::pdf(name, bytes.to_vec()))
}

fn check_size(name: &str, size: u64, limit: u64) -> Result<(), PipelineError> {
    if size > limit {
        return Err(PipelineError::FileTooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PipelineError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "resume.pdf".to_string()
}
