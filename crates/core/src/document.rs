use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding as RsEncoding, UTF_16BE, UTF_16LE, UTF_8};
use thiserror::Error;
use tracing::debug;

/// 表示逐字稿檔案使用的行尾樣式。 / Line ending style of a transcript file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    /// 回傳序列化時使用的行尾字串。 / Literal used when serialising text.
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// 逐字稿檔案的文字編碼。 / Text encoding of a transcript file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// 由 chardetng 推測的傳統編碼。 / Legacy encoding guessed by chardetng.
    Legacy(&'static RsEncoding),
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Legacy(encoding) => encoding.name(),
        }
    }
}

/// 文件載入或儲存時的錯誤。 / Errors raised while loading or saving a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("file encoding is not supported or data is invalid")]
    InvalidEncoding,
    #[error("text cannot be represented in target encoding {0}")]
    Unrepresentable(&'static str),
    #[error("document has no associated path")]
    NoPath,
}

/// 編輯器持有的逐字稿文字。 / Transcript text owned by the host editor.
///
/// 內容在記憶體中一律以 `\n` 分行，儲存時還原原本的行尾。 / Contents are kept
/// with `\n` newlines in memory; the original line ending is restored on save.
#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    contents: String,
    line_ending: LineEnding,
    encoding: Encoding,
    has_bom: bool,
    is_dirty: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// 建立空白且未儲存的文件。 / Creates an unsaved, empty document.
    pub fn new() -> Self {
        Self {
            path: None,
            contents: String::new(),
            line_ending: LineEnding::Lf,
            encoding: Encoding::Utf8,
            has_bom: false,
            is_dirty: false,
        }
    }

    /// 從磁碟載入文件。 / Loads a document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        let decoded = decode_bytes(&bytes)?;
        debug!(
            path = %path.display(),
            encoding = decoded.encoding.name(),
            "opened document"
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            line_ending: detect_line_ending(&decoded.text),
            contents: normalize_newlines(&decoded.text),
            encoding: decoded.encoding,
            has_bom: decoded.has_bom,
            is_dirty: false,
        })
    }

    /// 儲存至目前路徑。 / Saves to the current path.
    pub fn save(&mut self) -> Result<(), DocumentError> {
        let path = self.path.clone().ok_or(DocumentError::NoPath)?;
        self.save_as(path)
    }

    /// 另存新檔；以暫存檔加上重新命名避免部分寫入。 / Saves to `path` through a temp file and rename.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let encoded = self.serialise_contents()?;

        let tmp_path = path.with_extension("tmp_scribe");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(&encoded)?;
            tmp_file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        self.path = Some(path.to_path_buf());
        self.is_dirty = false;
        Ok(())
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// 以新文字整體取代內容並標記為已修改。 / Replaces the contents wholesale, marking the document dirty.
    pub fn set_contents(&mut self, text: impl Into<String>) {
        let text = normalize_newlines(&text.into());
        if text != self.contents {
            self.contents = text;
            self.is_dirty = true;
        }
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn has_bom(&self) -> bool {
        self.has_bom
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn serialise_contents(&self) -> Result<Vec<u8>, DocumentError> {
        let text = self.contents.replace('\n', self.line_ending.as_str());
        let bytes = match self.encoding {
            Encoding::Utf8 => {
                let mut out = Vec::with_capacity(text.len() + 3);
                if self.has_bom {
                    out.extend_from_slice(b"\xEF\xBB\xBF");
                }
                out.extend_from_slice(text.as_bytes());
                out
            }
            Encoding::Utf16Le => encode_utf16(&text, self.has_bom, false),
            Encoding::Utf16Be => encode_utf16(&text, self.has_bom, true),
            Encoding::Legacy(encoding) => {
                let (cow, _, had_errors) = encoding.encode(&text);
                if had_errors {
                    return Err(DocumentError::Unrepresentable(encoding.name()));
                }
                cow.into_owned()
            }
        };
        Ok(bytes)
    }
}

struct DecodedText {
    text: String,
    encoding: Encoding,
    has_bom: bool,
}

fn decode_bytes(bytes: &[u8]) -> Result<DecodedText, DocumentError> {
    if let Some((encoding, bom_len)) = RsEncoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            return Err(DocumentError::InvalidEncoding);
        }
        let encoding = if encoding == UTF_16LE {
            Encoding::Utf16Le
        } else if encoding == UTF_16BE {
            Encoding::Utf16Be
        } else {
            Encoding::Utf8
        };
        return Ok(DecodedText {
            text: text.into_owned(),
            encoding,
            has_bom: true,
        });
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedText {
            text: text.to_owned(),
            encoding: Encoding::Utf8,
            has_bom: false,
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, false);
    if guess == UTF_8 {
        return Err(DocumentError::InvalidEncoding);
    }
    let (text, had_errors) = guess.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DocumentError::InvalidEncoding);
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding: Encoding::Legacy(guess),
        has_bom: false,
    })
}

fn encode_utf16(text: &str, include_bom: bool, big_endian: bool) -> Vec<u8> {
    let to_bytes = |unit: u16| {
        if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        }
    };
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    if include_bom {
        out.extend_from_slice(&to_bytes(0xFEFF));
    }
    for unit in text.encode_utf16() {
        out.extend_from_slice(&to_bytes(unit));
    }
    out
}

fn detect_line_ending(text: &str) -> LineEnding {
    match text.find(['\r', '\n']) {
        Some(idx) if text[idx..].starts_with("\r\n") => LineEnding::CrLf,
        Some(idx) if text[idx..].starts_with('\r') => LineEnding::Cr,
        _ => LineEnding::Lf,
    }
}

fn normalize_newlines(input: &str) -> String {
    if !input.contains('\r') {
        return input.to_owned();
    }
    input.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_normalises_crlf_and_restores_on_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("interview.txt");
        fs::write(&path, "SPEAKER 1: hello\r\nSPEAKER 2: hi\r\n").unwrap();

        let mut doc = Document::open(&path).unwrap();
        assert_eq!(doc.line_ending(), LineEnding::CrLf);
        assert_eq!(doc.contents(), "SPEAKER 1: hello\nSPEAKER 2: hi\n");

        doc.set_contents("SPEAKER 1: hey\nSPEAKER 2: hi\n");
        assert!(doc.is_dirty());
        doc.save().unwrap();
        assert!(!doc.is_dirty());
        assert_eq!(
            fs::read(&path).unwrap(),
            b"SPEAKER 1: hey\r\nSPEAKER 2: hi\r\n"
        );
    }

    #[test]
    fn open_keeps_utf8_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.txt");
        fs::write(&path, b"\xEF\xBB\xBFcaf\xC3\xA9").unwrap();

        let mut doc = Document::open(&path).unwrap();
        assert!(doc.has_bom());
        assert_eq!(doc.contents(), "café");
        doc.save().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"\xEF\xBB\xBFcaf\xC3\xA9");
    }

    #[test]
    fn open_decodes_utf16_le_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("utf16.txt");
        fs::write(&path, encode_utf16("ok\n", true, false)).unwrap();

        let mut doc = Document::open(&path).unwrap();
        assert_eq!(doc.encoding(), Encoding::Utf16Le);
        assert_eq!(doc.contents(), "ok\n");
        doc.set_contents("fine\n");
        doc.save().unwrap();
        assert_eq!(fs::read(&path).unwrap(), encode_utf16("fine\n", true, false));
    }

    #[test]
    fn open_falls_back_to_legacy_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.txt");
        let (latin, _, _) = encoding_rs::WINDOWS_1252
            .encode("Le café était très chaud et la crème brûlée était délicieuse.");
        fs::write(&path, &latin).unwrap();

        let doc = Document::open(&path).unwrap();
        assert!(matches!(doc.encoding(), Encoding::Legacy(_)));
        assert!(doc.contents().starts_with("Le café était"));
    }

    #[test]
    fn save_without_path_fails() {
        let mut doc = Document::new();
        doc.set_contents("draft");
        assert!(matches!(doc.save(), Err(DocumentError::NoPath)));
    }

    #[test]
    fn set_contents_with_same_text_stays_clean() {
        let mut doc = Document::new();
        doc.set_contents("");
        assert!(!doc.is_dirty());
    }
}
