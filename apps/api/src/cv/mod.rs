//! CV discovery.
//!
//! Resolution order for a requested language:
//! 1. explicit manifest entry (`CV_FILE_EN` / `CV_FILE_ES`)
//! 2. exact well-known file name for that language
//! 3. language hint token in the file stem, most recent first
//!
//! Without a language the most recently modified candidate wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

pub mod handlers;

/// Extension-less names that are still treated as CV documents.
const KNOWN_EXTENSIONLESS: &[&str] = &["cv", "resume", "curriculum", "cv-en", "cv-es", "cv_en", "cv_es"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    En,
    Es,
}

impl Lang {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Lang::En),
            "es" | "esp" | "spanish" | "espanol" | "español" => Some(Lang::Es),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Es => "es",
        }
    }

    /// File stems that identify this language unambiguously.
    fn exact_stems(&self) -> &'static [&'static str] {
        match self {
            Lang::En => &["cv-en", "cv_en", "cv.en", "resume-en", "resume_en", "cv-english", "resume"],
            Lang::Es => &["cv-es", "cv_es", "cv.es", "curriculum-es", "cv-spanish", "cv-espanol", "curriculum"],
        }
    }

    /// Stem tokens that hint at this language.
    fn hint_tokens(&self) -> &'static [&'static str] {
        match self {
            Lang::En => &["en", "eng", "english", "ingles"],
            Lang::Es => &["es", "esp", "spanish", "espanol", "español"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvFile {
    pub file_name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub source_dir: PathBuf,
}

impl CvFile {
    /// Lowercased file name without a trailing `.pdf`.
    fn stem(&self) -> String {
        let lower = self.file_name.to_lowercase();
        lower.strip_suffix(".pdf").map(str::to_string).unwrap_or(lower)
    }

    /// Download name: ASCII-safe stem with a `.pdf` extension.
    pub fn download_name(&self) -> String {
        let name = self.file_name.as_str();
        let stem = match name.len().checked_sub(4) {
            Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".pdf") => &name[..cut],
            _ => name,
        };
        let safe: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        let safe = safe.trim_matches('-');
        if safe.is_empty() {
            "cv.pdf".to_string()
        } else {
            format!("{safe}.pdf")
        }
    }
}

fn is_cv_candidate(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".pdf") || KNOWN_EXTENSIONLESS.contains(&lower.as_str())
}

/// Finds CV files across the configured directories.
#[derive(Debug, Clone)]
pub struct CvLocator {
    dirs: Vec<PathBuf>,
    manifest: HashMap<Lang, PathBuf>,
}

impl CvLocator {
    pub fn new(dirs: Vec<PathBuf>, manifest: HashMap<Lang, PathBuf>) -> Self {
        Self { dirs, manifest }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Lists every candidate file. Missing or unreadable directories are skipped.
    pub async fn scan(&self) -> Vec<CvFile> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            match scan_dir(dir).await {
                Ok(found) => files.extend(found),
                Err(e) => warn!("Skipping CV directory {}: {e}", dir.display()),
            }
        }
        files
    }

    pub async fn locate(&self, lang: Option<Lang>) -> Option<CvFile> {
        if let Some(lang) = lang {
            if let Some(file) = self.from_manifest(lang).await {
                return Some(file);
            }
        }

        let files = self.scan().await;
        debug!("CV scan found {} candidate(s)", files.len());
        select(files, lang)
    }

    async fn from_manifest(&self, lang: Lang) -> Option<CvFile> {
        let path = self.manifest.get(&lang)?;
        match cv_file_at(path).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("CV manifest entry for '{}' is unusable ({}): {e}", lang.as_str(), path.display());
                None
            }
        }
    }
}

async fn scan_dir(dir: &Path) -> std::io::Result<Vec<CvFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let source_dir = tokio::fs::canonicalize(dir).await.unwrap_or_else(|_| dir.to_path_buf());
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !is_cv_candidate(&file_name) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        files.push(CvFile {
            file_name,
            path: source_dir.join(entry.file_name()),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            source_dir: source_dir.clone(),
        });
    }

    Ok(files)
}

async fn cv_file_at(path: &Path) -> std::io::Result<CvFile> {
    let path = tokio::fs::canonicalize(path).await?;
    let metadata = tokio::fs::metadata(&path).await?;
    if !metadata.is_file() {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"));
    }
    Ok(CvFile {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        source_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        path,
    })
}

/// Picks a file from an already scanned list.
pub fn select(files: Vec<CvFile>, lang: Option<Lang>) -> Option<CvFile> {
    let Some(lang) = lang else {
        return most_recent(files);
    };

    let exact: Vec<CvFile> = files
        .iter()
        .filter(|f| lang.exact_stems().contains(&f.stem().as_str()))
        .cloned()
        .collect();
    if !exact.is_empty() {
        return most_recent(exact);
    }

    let hinted = files.into_iter().filter(|f| has_hint(&f.stem(), lang)).collect();
    most_recent(hinted)
}

fn has_hint(stem: &str, lang: Lang) -> bool {
    stem.split(|c: char| !c.is_alphanumeric())
        .any(|token| lang.hint_tokens().contains(&token))
}

/// Newest file; ties go to the lexicographically smallest name.
fn most_recent(files: Vec<CvFile>) -> Option<CvFile> {
    files.into_iter().max_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| b.file_name.cmp(&a.file_name))
    })
}
