use crate::ooxml;
use anyhow::Context;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// What a document turns into before it is sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Text(String),
    /// Forwarded as-is; the model reads the format natively.
    Binary { mime_type: &'static str, data: Vec<u8> },
}

/// Extensions offered by the upload widget.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".xlsx", ".pptx", ".txt"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn extract(path: &Path) -> anyhow::Result<Extracted> {
    let ext = extension(path);
    tracing::debug!(path = %path.display(), %ext, "extracting document");

    let open = || -> anyhow::Result<BufReader<File>> {
        let f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(BufReader::new(f))
    };

    let extracted = match ext.as_str() {
        ".pdf" => Extracted::Binary {
            mime_type: "application/pdf",
            data: std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        },
        ".docx" => Extracted::Text(ooxml::docx_text(open()?)?),
        ".xlsx" => Extracted::Text(ooxml::xlsx_text(open()?)?),
        ".pptx" => Extracted::Text(ooxml::pptx_text(open()?)?),
        _ => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Extracted::Text(utf8_ignoring_errors(&bytes))
        }
    };
    Ok(extracted)
}

/// Decode UTF-8, dropping invalid sequences instead of replacing them.
fn utf8_ignoring_errors(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::tests::{docx_fixture, xlsx_fixture};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn xlsx_dispatch_extracts_rows() {
        let f = write_temp(".XLSX", &xlsx_fixture());
        assert_eq!(extract(f.path()).unwrap(), Extracted::Text("a\tb\nc\t\n".into()));
    }

    #[test]
    fn docx_dispatch_extracts_paragraphs() {
        let f = write_temp(".docx", &docx_fixture());
        let Extracted::Text(text) = extract(f.path()).unwrap() else {
            panic!("docx should extract to text");
        };
        assert!(text.starts_with("Xin chào\n"), "{text:?}");
    }

    #[test]
    fn pdf_is_forwarded_as_bytes() {
        let f = write_temp(".pdf", b"%PDF-1.4 fake");
        assert_eq!(
            extract(f.path()).unwrap(),
            Extracted::Binary {
                mime_type: "application/pdf",
                data: b"%PDF-1.4 fake".to_vec()
            }
        );
    }

    #[test]
    fn other_files_are_read_as_utf8_dropping_invalid_bytes() {
        let f = write_temp(".txt", b"ch\xffa\xc3\xa0o");
        assert_eq!(extract(f.path()).unwrap(), Extracted::Text("chaào".into()));

        let f = write_temp(".md", b"# title");
        assert_eq!(extract(f.path()).unwrap(), Extracted::Text("# title".into()));
    }

    #[test]
    fn corrupt_office_file_is_an_error() {
        let f = write_temp(".docx", b"definitely not a zip");
        assert!(extract(f.path()).is_err());
    }
}
