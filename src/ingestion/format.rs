use crate::models::FileFormat;

const PDF_MAGIC: &[u8] = b"%PDF";
/// ZIP local-file-header magic; XLSX files are ZIP containers.
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];

/// Detects a file's format by content sniffing rather than trusting the
/// uploaded file name: OFX/QFX by header prefix or an `<OFX>` root, CSV by
/// the ability to parse a header row under a lenient comma dialect, PDF/
/// XLSX/JSON by magic bytes, else `Other`.
pub fn detect_format(bytes: &[u8], file_name: &str) -> FileFormat {
    let sniff_len = bytes.len().min(512);
    let prefix = String::from_utf8_lossy(&bytes[..sniff_len]);
    let upper = prefix.to_ascii_uppercase();

    if upper.contains("OFXHEADER") || upper.contains("<OFX>") {
        return if file_name.to_ascii_lowercase().ends_with(".qfx") {
            FileFormat::Qfx
        } else {
            FileFormat::Ofx
        };
    }

    if bytes.starts_with(PDF_MAGIC) {
        return FileFormat::Pdf;
    }

    if bytes.starts_with(ZIP_MAGIC) {
        return FileFormat::Xlsx;
    }

    let trimmed = prefix.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('[')) && serde_json::from_slice::<serde_json::Value>(bytes).is_ok() {
        return FileFormat::Json;
    }

    if looks_like_csv(&prefix) {
        return FileFormat::Csv;
    }

    FileFormat::Other
}

/// A lenient CSV sniff: the first non-empty line, after trimming leading
/// whitespace, splits into at least two comma-separated fields.
fn looks_like_csv(prefix: &str) -> bool {
    prefix
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start().split(',').count() >= 2)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_csv_header_row() {
        let bytes = b"Date,Description,Amount\n2024-01-01,NETFLIX,14.99\n";
        assert_eq!(detect_format(bytes, "statement.csv"), FileFormat::Csv);
    }

    #[test]
    fn detects_ofx_by_header_token() {
        let bytes = b"OFXHEADER:100\nDATA:OFXSGML\n<OFX>...";
        assert_eq!(detect_format(bytes, "statement.ofx"), FileFormat::Ofx);
    }

    #[test]
    fn detects_qfx_extension_on_ofx_content() {
        let bytes = b"<OFX><BANKMSGSRSV1></BANKMSGSRSV1></OFX>";
        assert_eq!(detect_format(bytes, "statement.qfx"), FileFormat::Qfx);
    }

    #[test]
    fn detects_pdf_magic_bytes() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(b"rest of pdf");
        assert_eq!(detect_format(&bytes, "statement.pdf"), FileFormat::Pdf);
    }

    #[test]
    fn falls_back_to_other_for_unrecognized_content() {
        let bytes = b"this is just plain text with no commas";
        assert_eq!(detect_format(bytes, "notes.txt"), FileFormat::Other);
    }
}
