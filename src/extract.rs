use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{ExtractionArgs, OcrMode};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtractionBackend {
    PlainText,
    PdftotextLayout,
    PdftotextRaw,
    Ocr,
}

impl ExtractionBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "plain_text",
            Self::PdftotextLayout => "pdftotext_layout",
            Self::PdftotextRaw => "pdftotext_raw",
            Self::Ocr => "ocr",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub backend: ExtractionBackend,
}

pub fn extract_contract_text(path: &Path, args: &ExtractionArgs) -> Result<ExtractedText> {
    if !path.is_file() {
        bail!("contract file not found: {}", path.display());
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();

    let extracted = match extension.as_str() {
        "txt" | "text" | "md" | "markdown" => {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ExtractedText {
                text: normalize_extracted_text(&String::from_utf8_lossy(&bytes)),
                backend: ExtractionBackend::PlainText,
            }
        }
        "pdf" => extract_pdf_text(path, args)?,
        other => bail!(
            "unsupported contract format '{}' for {} (expected .pdf, .txt or .md)",
            other,
            path.display()
        ),
    };

    let char_count = meaningful_char_count(&extracted.text);
    if char_count < args.min_text_chars {
        bail!(
            "could not extract enough text from {} ({} characters via {}, need at least {}); the file may be scanned without OCR or empty",
            path.display(),
            char_count,
            extracted.backend.as_str(),
            args.min_text_chars
        );
    }

    info!(
        path = %path.display(),
        backend = extracted.backend.as_str(),
        chars = char_count,
        "contract text extracted"
    );
    Ok(extracted)
}

fn extract_pdf_text(pdf_path: &Path, args: &ExtractionArgs) -> Result<ExtractedText> {
    let mut best: Option<ExtractedText> = None;

    for (backend, mode_flag) in [
        (ExtractionBackend::PdftotextLayout, "-layout"),
        (ExtractionBackend::PdftotextRaw, "-raw"),
    ] {
        match run_pdftotext(pdf_path, mode_flag) {
            Ok(raw) => {
                let text = normalize_extracted_text(&raw);
                let chars = meaningful_char_count(&text);
                info!(backend = backend.as_str(), chars, "pdf text layer extracted");
                if chars >= args.min_text_chars {
                    return Ok(ExtractedText { text, backend });
                }
                keep_longer(&mut best, ExtractedText { text, backend });
            }
            Err(error) => {
                warn!(
                    backend = backend.as_str(),
                    error = %format!("{error:#}"),
                    "extraction backend failed"
                );
            }
        }
    }

    if matches!(args.ocr_mode, OcrMode::Auto) {
        if !command_available("pdftoppm") || !command_available("tesseract") {
            warn!(
                path = %pdf_path.display(),
                "text layer is too short but pdftoppm/tesseract are unavailable for OCR"
            );
        } else {
            warn!(path = %pdf_path.display(), "text layer is too short; falling back to OCR");
            match extract_with_ocr(pdf_path, &args.ocr_lang) {
                Ok(raw) => keep_longer(
                    &mut best,
                    ExtractedText {
                        text: normalize_extracted_text(&raw),
                        backend: ExtractionBackend::Ocr,
                    },
                ),
                Err(error) => {
                    warn!(
                        backend = "ocr",
                        error = %format!("{error:#}"),
                        "extraction backend failed"
                    );
                }
            }
        }
    }

    match best {
        Some(extracted) => Ok(extracted),
        None => bail!("no extraction backend produced text for {}", pdf_path.display()),
    }
}

fn keep_longer(best: &mut Option<ExtractedText>, candidate: ExtractedText) {
    let replace = best
        .as_ref()
        .map(|current| {
            meaningful_char_count(&candidate.text) > meaningful_char_count(&current.text)
        })
        .unwrap_or(true);
    if replace {
        *best = Some(candidate);
    }
}

fn run_pdftotext(pdf_path: &Path, mode_flag: &str) -> Result<String> {
    let output = Command::new("pdftotext")
        .arg(mode_flag)
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext {} returned non-zero exit status for {}: {}",
            mode_flag,
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).replace('\u{0000}', ""))
}

fn ocr_work_dir() -> PathBuf {
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!("contract_audit_ocr_{}_{stamp}", std::process::id()))
}

fn extract_with_ocr(pdf_path: &Path, ocr_lang: &str) -> Result<String> {
    let work_dir = ocr_work_dir();
    fs::create_dir_all(&work_dir)
        .with_context(|| format!("failed to create OCR work directory {}", work_dir.display()))?;

    let result = ocr_pages(pdf_path, &work_dir, ocr_lang);
    let _ = fs::remove_dir_all(&work_dir);
    result
}

fn ocr_pages(pdf_path: &Path, work_dir: &Path, ocr_lang: &str) -> Result<String> {
    let pdftoppm_output = Command::new("pdftoppm")
        .arg("-r")
        .arg("300")
        .arg("-png")
        .arg(pdf_path)
        .arg(work_dir.join("page"))
        .output()
        .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

    if !pdftoppm_output.status.success() {
        let stderr = String::from_utf8_lossy(&pdftoppm_output.stderr);
        bail!(
            "pdftoppm returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let mut images = fs::read_dir(work_dir)
        .with_context(|| format!("failed to list OCR images in {}", work_dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|value| value.to_str()) == Some("png"))
        .collect::<Vec<PathBuf>>();
    images.sort();

    if images.is_empty() {
        bail!("pdftoppm produced no page images for {}", pdf_path.display());
    }

    let mut pages = Vec::with_capacity(images.len());
    for image in &images {
        let tesseract_output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(ocr_lang)
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", image.display()))?;

        if !tesseract_output.status.success() {
            let stderr = String::from_utf8_lossy(&tesseract_output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                image.display(),
                stderr.trim()
            );
        }

        pages.push(
            String::from_utf8_lossy(&tesseract_output.stdout)
                .replace('\u{0000}', "")
                .trim()
                .to_string(),
        );
    }

    info!(pages = pages.len(), lang = ocr_lang, "ocr completed");
    Ok(pages.join("\n\n"))
}

fn command_available(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}

fn meaningful_char_count(text: &str) -> usize {
    text.trim().chars().count()
}

/// Cleans extractor output while keeping the line and paragraph structure the chunker relies on.
pub fn normalize_extracted_text(raw: &str) -> String {
    let unified = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n\n")
        .replace('\u{0000}', "");

    let lines = unified
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<&str>>().join(" "))
        .collect::<Vec<String>>();
    let lines = merge_hyphenated_lines(lines);

    let mut output = Vec::<String>::with_capacity(lines.len());
    for line in lines {
        let blank = line.is_empty();
        let previous_blank = output.last().map(|last: &String| last.is_empty()).unwrap_or(true);
        if blank && previous_blank {
            continue;
        }
        output.push(line);
    }
    while output.last().is_some_and(|last| last.is_empty()) {
        output.pop();
    }

    output.join("\n")
}

fn merge_hyphenated_lines(lines: Vec<String>) -> Vec<String> {
    let mut merged = Vec::<String>::with_capacity(lines.len());
    let mut index = 0usize;

    while index < lines.len() {
        if index + 1 < lines.len()
            && should_merge_hyphenated_pair(&lines[index], &lines[index + 1])
        {
            merged.push(format!(
                "{}{}",
                lines[index].trim_end().trim_end_matches('-'),
                lines[index + 1].trim_start()
            ));
            index += 2;
            continue;
        }

        merged.push(lines[index].clone());
        index += 1;
    }

    merged
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let left = current.trim_end();
    if !left.ends_with('-') {
        return false;
    }

    let starts_with_lowercase = next
        .trim_start()
        .chars()
        .next()
        .is_some_and(|character| character.is_lowercase());
    if !starts_with_lowercase {
        return false;
    }

    left.trim_end_matches('-')
        .chars()
        .last()
        .is_some_and(|character| character.is_alphabetic())
}
