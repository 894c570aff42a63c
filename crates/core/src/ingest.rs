use crate::extractor::{extract_pdf_text, PdfExtractor};
use crate::{Document, DocumentStore, IngestError};
use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Hex characters appended to every uploaded file's stem.
const UPLOAD_SUFFIX_LEN: usize = 8;

pub fn is_pdf_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// PDFs directly inside `folder`, sorted by path.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if entry.file_name().to_str().is_some_and(is_pdf_name) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Builds a document from a PDF on disk; `None` when it has no extractable text.
///
/// The id is the stored file's stem, which is unique inside the upload folder.
/// The name is the file name without the upload suffix, see [`display_name`].
pub fn document_from_file(
    extractor: &dyn PdfExtractor,
    path: &Path,
) -> Result<Option<Document>, IngestError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string();

    let content = extract_pdf_text(extractor, path);
    if content.is_empty() {
        return Ok(None);
    }

    Ok(Some(Document {
        id,
        name: display_name(file_name),
        content,
        source_path: path.to_string_lossy().to_string(),
        checksum: Some(digest_file(path)?),
        ingested_at: Utc::now(),
    }))
}

/// Name shown for a stored PDF: `guideline_0a1b2c3d.pdf` becomes `guideline.pdf`.
///
/// Files without an upload suffix keep their name unchanged.
pub fn display_name(file_name: &str) -> String {
    let path = Path::new(file_name);
    let (Some(stem), Some(extension)) = (
        path.file_stem().and_then(|stem| stem.to_str()),
        path.extension().and_then(|ext| ext.to_str()),
    ) else {
        return file_name.to_string();
    };

    match stem.rsplit_once('_') {
        Some((base, suffix)) if !base.is_empty() && is_upload_suffix(suffix) => {
            format!("{base}.{extension}")
        }
        _ => file_name.to_string(),
    }
}

fn is_upload_suffix(suffix: &str) -> bool {
    suffix.len() == UPLOAD_SUFFIX_LEN
        && suffix
            .bytes()
            .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub loaded: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Loads every PDF already in `folder` into `store`, skipping unreadable files.
pub fn load_documents_from_folder(
    store: &DocumentStore,
    folder: &Path,
    extractor: &dyn PdfExtractor,
) -> Result<IngestionReport, IngestError> {
    fs::create_dir_all(folder)?;

    let mut loaded = Vec::new();
    let mut skipped_files = Vec::new();

    for path in discover_pdf_files(folder) {
        match document_from_file(extractor, &path) {
            Ok(Some(document)) => {
                store.insert(document.clone());
                loaded.push(document);
            }
            Ok(None) => {
                warn!(path = %path.display(), "could not extract content, skipping");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: "no extractable text".to_string(),
                });
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        folder = %folder.display(),
        loaded = loaded.len(),
        skipped = skipped_files.len(),
        "document folder scanned"
    );

    Ok(IngestionReport {
        loaded,
        skipped_files,
    })
}

/// Folder that keeps uploaded PDFs under collision-free names.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save(&self, original_name: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        if !is_pdf_name(original_name) {
            return Err(IngestError::InvalidArgument(format!(
                "only pdf files are accepted: {original_name}"
            )));
        }

        fs::create_dir_all(&self.root)?;
        let path = self.root.join(unique_file_name(original_name));
        fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn discard(&self, path: &Path) {
        if let Err(error) = fs::remove_file(path) {
            warn!(path = %path.display(), %error, "failed to remove uploaded file");
        }
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static pattern is valid"))
}

fn unique_file_name(original_name: &str) -> String {
    let base = Path::new(original_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");
    let cleaned = unsafe_chars().replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|ch| ch == '_' || ch == '.');
    let cleaned = if cleaned.is_empty() { "document" } else { cleaned };

    let suffix = Uuid::new_v4().simple().to_string();
    format!("{cleaned}_{}.pdf", &suffix[..UPLOAD_SUFFIX_LEN])
}
