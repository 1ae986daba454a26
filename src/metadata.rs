//! Embedded image metadata and reference-token extraction.
//!
//! Image generators write their prompt into the image file: a `tEXt`, `zTXt`
//! or `iTXt` chunk for PNG, the EXIF `UserComment` (or a `COM` segment) for JPEG, and an
//! `EXIF`/`XMP ` chunk for WebP. The prompt carries references such as
//! `<lora:character_alice:0.8>`; the identifier in the middle is the token.
//!
//! Extraction never fails a run. An unreadable or truncated container yields
//! [`TokenScan::Unreadable`]; a readable image without text yields an empty
//! token set.

use flate2::read::ZlibDecoder;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Upper bound on an inflated text chunk.
const MAX_INFLATED_TEXT: u64 = 16 * 1024 * 1024;

/// Text fields checked in PNG images, in priority order.
pub const DEFAULT_FIELDS: &[&str] = &["parameters", "Comment", "Description", "prompt"];

/// Reference kinds recognised by default.
pub const DEFAULT_KINDS: &[&str] = &["lora"];

/// Result of scanning one image for tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenScan {
    /// The container could not be opened or parsed.
    Unreadable,
    /// Normalized tokens found; empty when there was no text or no reference.
    Tokens(BTreeSet<String>),
}

impl TokenScan {
    pub fn contains(&self, token: &str) -> bool {
        match self {
            TokenScan::Unreadable => false,
            TokenScan::Tokens(set) => set.contains(token),
        }
    }
}

/// Lowercases and strips all whitespace, so `"Character Alice "` and
/// `"characteralice"` name the same token.
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, thiserror::Error)]
enum ContainerError {
    #[error("unsupported container")]
    Unsupported,
    #[error("truncated segment")]
    Truncated,
    #[error("malformed segment")]
    Malformed,
}

/// Reads embedded text from images and pulls reference tokens out of it.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    fields: Vec<String>,
    pattern: Regex,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        let kinds: Vec<String> = DEFAULT_KINDS.iter().map(|k| k.to_string()).collect();
        let fields: Vec<String> = DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect();
        // The kinds are escaped literals, so the pattern always compiles.
        Self::for_kinds(&kinds, fields).expect("default token pattern is valid")
    }
}

impl MetadataExtractor {
    /// Builds an extractor for `<kind:identifier:weight>` references of the given kinds.
    pub fn for_kinds(kinds: &[String], fields: Vec<String>) -> Result<Self, regex::Error> {
        let alternatives = kinds
            .iter()
            .map(|k| regex::escape(k.trim()))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?i)<(?:{alternatives}):([^:>]+):[^>]*>");
        Self::with_pattern(&pattern, fields)
    }

    /// Builds an extractor from a custom regex; capture group 1 is the identifier.
    pub fn with_pattern(pattern: &str, fields: Vec<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            fields,
            pattern: Regex::new(pattern)?,
        })
    }

    /// Extracts the normalized token set from prompt text.
    ///
    /// # Examples
    ///
    /// ```
    /// use lootsort::metadata::MetadataExtractor;
    ///
    /// let extractor = MetadataExtractor::default();
    /// let tokens = extractor.extract_tokens("1girl, <lora:Character_Alice:0.8>, <LORA:style anime:1>");
    /// assert!(tokens.contains("character_alice"));
    /// assert!(tokens.contains("styleanime"));
    /// ```
    pub fn extract_tokens(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| normalize_token(m.as_str()))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Reads `path` and scans its embedded text.
    pub fn scan(&self, path: &Path) -> TokenScan {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("cannot read {}: {}", path.display(), e);
                return TokenScan::Unreadable;
            }
        };
        match self.embedded_text(&bytes) {
            Ok(Some(text)) => TokenScan::Tokens(self.extract_tokens(&text)),
            Ok(None) => TokenScan::Tokens(BTreeSet::new()),
            Err(e) => {
                tracing::warn!("metadata unreadable in {}: {}", path.display(), e);
                TokenScan::Unreadable
            }
        }
    }

    /// Returns the embedded prompt text of an in-memory image, if any.
    pub fn read_text(&self, bytes: &[u8]) -> Option<String> {
        self.embedded_text(bytes).ok().flatten()
    }

    fn embedded_text(&self, bytes: &[u8]) -> Result<Option<String>, ContainerError> {
        let kind = infer::get(bytes).ok_or(ContainerError::Unsupported)?;
        match kind.mime_type() {
            "image/png" => self.png_text(bytes),
            "image/jpeg" => jpeg_text(bytes),
            "image/webp" => webp_text(bytes),
            _ => Err(ContainerError::Unsupported),
        }
    }

    fn png_text(&self, bytes: &[u8]) -> Result<Option<String>, ContainerError> {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut pos = 8;

        while pos < bytes.len() {
            let header = bytes.get(pos..pos + 8).ok_or(ContainerError::Truncated)?;
            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let chunk_type = &header[4..8];
            let start = pos + 8;
            let end = start.checked_add(length).ok_or(ContainerError::Malformed)?;
            let data = bytes.get(start..end).ok_or(ContainerError::Truncated)?;

            match chunk_type {
                b"tEXt" => entries.extend(parse_text_chunk(data)),
                b"zTXt" => entries.extend(parse_ztxt_chunk(data)),
                b"iTXt" => entries.extend(parse_itxt_chunk(data)),
                b"IEND" => break,
                _ => {}
            }
            // Skip the CRC.
            pos = end + 4;
        }

        Ok(self.fields.iter().find_map(|field| {
            entries
                .iter()
                .find(|(keyword, _)| keyword == field)
                .map(|(_, text)| text.clone())
        }))
    }
}

fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // tEXt is nominally Latin-1.
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn split_nul(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = data.iter().position(|&b| b == 0)?;
    Some((&data[..idx], &data[idx + 1..]))
}

fn parse_text_chunk(data: &[u8]) -> Option<(String, String)> {
    let (keyword, text) = split_nul(data)?;
    Some((decode_text(keyword), decode_text(text)))
}

/// Inflates a zlib stream. Method 0 is the only one PNG defines.
fn inflate(method: u8, data: &[u8]) -> Option<Vec<u8>> {
    if method != 0 {
        return None;
    }
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(MAX_INFLATED_TEXT)
        .read_to_end(&mut out)
        .ok()?;
    Some(out)
}

fn parse_ztxt_chunk(data: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_nul(data)?;
    let (&method, compressed) = rest.split_first()?;
    let text = inflate(method, compressed)?;
    Some((decode_text(keyword), decode_text(&text)))
}

fn parse_itxt_chunk(data: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_nul(data)?;
    let (&compressed, rest) = rest.split_first()?;
    let (&method, rest) = rest.split_first()?;
    let (_language, rest) = split_nul(rest)?;
    let (_translated, text) = split_nul(rest)?;
    let text = if compressed != 0 {
        String::from_utf8_lossy(&inflate(method, text)?).into_owned()
    } else {
        String::from_utf8_lossy(text).into_owned()
    };
    Some((decode_text(keyword), text))
}

fn jpeg_text(bytes: &[u8]) -> Result<Option<String>, ContainerError> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return Err(ContainerError::Malformed);
    }

    let mut user_comment = None;
    let mut comment = None;
    let mut pos = 2;

    loop {
        if *bytes.get(pos).ok_or(ContainerError::Truncated)? != 0xFF {
            return Err(ContainerError::Malformed);
        }
        while bytes.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *bytes.get(pos).ok_or(ContainerError::Truncated)?;
        pos += 1;

        match marker {
            // Start of scan or end of image: metadata segments are all behind us.
            0xDA | 0xD9 => break,
            0x01 | 0xD0..=0xD7 => continue,
            _ => {}
        }

        let len_bytes = bytes.get(pos..pos + 2).ok_or(ContainerError::Truncated)?;
        let length = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        if length < 2 {
            return Err(ContainerError::Malformed);
        }
        let data = bytes
            .get(pos + 2..pos + length)
            .ok_or(ContainerError::Truncated)?;

        match marker {
            0xE1 if data.starts_with(b"Exif\0\0") && user_comment.is_none() => {
                user_comment = exif_user_comment(&data[6..]);
            }
            0xFE if comment.is_none() => {
                comment = Some(decode_text(data));
            }
            _ => {}
        }
        pos += length;
    }

    Ok(user_comment.or(comment))
}

fn webp_text(bytes: &[u8]) -> Result<Option<String>, ContainerError> {
    if bytes.get(0..4) != Some(b"RIFF") || bytes.get(8..12) != Some(b"WEBP") {
        return Err(ContainerError::Malformed);
    }

    let mut exif = None;
    let mut xmp = None;
    let mut pos = 12;

    while pos < bytes.len() {
        let header = bytes.get(pos..pos + 8).ok_or(ContainerError::Truncated)?;
        let fourcc = &header[0..4];
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = pos + 8;
        let end = start.checked_add(size).ok_or(ContainerError::Malformed)?;
        let data = bytes.get(start..end).ok_or(ContainerError::Truncated)?;

        match fourcc {
            b"EXIF" => {
                let tiff = data.strip_prefix(b"Exif\0\0").unwrap_or(data);
                exif = exif_user_comment(tiff);
            }
            b"XMP " => xmp = Some(String::from_utf8_lossy(data).into_owned()),
            _ => {}
        }
        // Chunks are padded to an even size.
        pos = end + (size & 1);
    }

    Ok(exif.or(xmp))
}

/// Walks a TIFF structure to the EXIF `UserComment` tag.
fn exif_user_comment(tiff: &[u8]) -> Option<String> {
    const EXIF_IFD_POINTER: u16 = 0x8769;
    const USER_COMMENT: u16 = 0x9286;

    let big_endian = match tiff.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let reader = TiffReader { data: tiff, big_endian };

    let ifd0 = reader.u32_at(4)? as usize;
    let exif_ifd = reader.find_entry(ifd0, EXIF_IFD_POINTER)?;
    let exif_offset = reader.u32_at(exif_ifd + 8)? as usize;
    let entry = reader.find_entry(exif_offset, USER_COMMENT)?;

    let count = reader.u32_at(entry + 4)? as usize;
    let value = if count <= 4 {
        tiff.get(entry + 8..entry + 8 + count)?
    } else {
        let offset = reader.u32_at(entry + 8)? as usize;
        tiff.get(offset..offset.checked_add(count)?)?
    };
    decode_user_comment(value, big_endian)
}

struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl TiffReader<'_> {
    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        Some(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// Returns the offset of the 12-byte entry for `tag` in the IFD at `ifd`.
    fn find_entry(&self, ifd: usize, tag: u16) -> Option<usize> {
        let count = usize::from(self.u16_at(ifd)?);
        (0..count)
            .map(|i| ifd + 2 + i * 12)
            .find(|&entry| self.u16_at(entry) == Some(tag))
    }
}

fn decode_user_comment(value: &[u8], tiff_big_endian: bool) -> Option<String> {
    let (charset, payload) = value.split_at_checked(8)?;
    let text = match charset {
        b"UNICODE\0" => {
            // Writers disagree on byte order; sniff it from the first code unit.
            let big_endian = match payload {
                [0, b, ..] if *b != 0 => true,
                [a, 0, ..] if *a != 0 => false,
                _ => tiff_big_endian,
            };
            let units: Vec<u16> = payload
                .chunks_exact(2)
                .map(|p| {
                    if big_endian {
                        u16::from_be_bytes([p[0], p[1]])
                    } else {
                        u16::from_le_bytes([p[0], p[1]])
                    }
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => decode_text(payload),
    };
    let trimmed = text.trim_end_matches('\0').trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    fn png_with_text(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        let ihdr = [0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0];
        bytes.extend(chunk(b"IHDR", &ihdr));
        for (kind, data) in chunks {
            bytes.extend(chunk(kind, data));
        }
        bytes.extend(chunk(b"IEND", &[]));
        bytes
    }

    fn text_chunk(keyword: &str, text: &str) -> Vec<u8> {
        let mut data = keyword.as_bytes().to_vec();
        data.push(0);
        data.extend_from_slice(text.as_bytes());
        data
    }

    fn jpeg_with_user_comment(comment: &str) -> Vec<u8> {
        // Big-endian TIFF: IFD0 with one ExifIFD pointer, ExifIFD with one UserComment.
        let mut payload = b"UNICODE\0".to_vec();
        for unit in comment.encode_utf16() {
            payload.extend_from_slice(&unit.to_be_bytes());
        }

        let mut tiff = b"MM\0\x2A".to_vec();
        tiff.extend_from_slice(&8u32.to_be_bytes());
        // IFD0 at 8: 1 entry, next IFD 0.
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x8769u16.to_be_bytes());
        tiff.extend_from_slice(&4u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&26u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        // ExifIFD at 26: 1 entry, next IFD 0, value data at 44.
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x9286u16.to_be_bytes());
        tiff.extend_from_slice(&7u16.to_be_bytes());
        tiff.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        tiff.extend_from_slice(&44u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        tiff.extend_from_slice(&payload);

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);

        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        bytes.extend_from_slice(&[0xFF, 0xE1]);
        bytes.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        bytes.extend_from_slice(&app1);
        bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        bytes
    }

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(bytes).expect("write temp file");
        file
    }

    #[test]
    fn test_extract_tokens_normalizes_and_dedupes() {
        let extractor = MetadataExtractor::default();
        let tokens = extractor.extract_tokens(
            "masterpiece, <lora:Character_Alice:0.8>, <lora: character_alice :1.0>, <lora:style_anime:0.5>",
        );
        assert_eq!(
            tokens,
            BTreeSet::from(["character_alice".to_string(), "style_anime".to_string()])
        );
    }

    #[test]
    fn test_extract_tokens_ignores_other_kinds() {
        let extractor = MetadataExtractor::default();
        let tokens = extractor.extract_tokens("<hypernet:foo:1> <embedding:bar> plain text");
        assert!(tokens.is_empty());

        let both = MetadataExtractor::for_kinds(
            &["lora".to_string(), "hypernet".to_string()],
            vec!["parameters".to_string()],
        )
        .unwrap();
        assert!(both.extract_tokens("<hypernet:foo:1>").contains("foo"));
    }

    #[test]
    fn test_custom_pattern() {
        let extractor =
            MetadataExtractor::with_pattern(r"#(\w+)", vec!["parameters".to_string()]).unwrap();
        let tokens = extractor.extract_tokens("a #Cat and a #dog");
        assert!(tokens.contains("cat"));
        assert!(tokens.contains("dog"));
    }

    #[test]
    fn test_png_text_field_priority() {
        let extractor = MetadataExtractor::default();
        let bytes = png_with_text(&[
            (b"tEXt", text_chunk("Comment", "<lora:from_comment:1>")),
            (b"tEXt", text_chunk("parameters", "<lora:from_parameters:1>")),
        ]);
        let text = extractor.read_text(&bytes).unwrap();
        assert!(text.contains("from_parameters"));
    }

    #[test]
    fn test_png_itxt_uncompressed() {
        let extractor = MetadataExtractor::default();
        let mut data = b"parameters\0\0\0\0\0".to_vec();
        data.extend_from_slice("<lora:ünicode:1>".as_bytes());
        let bytes = png_with_text(&[(b"iTXt", data)]);
        let file = write_temp(&bytes);
        assert!(extractor.scan(file.path()).contains("ünicode"));
    }

    fn zlib(text: &str) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_png_ztxt() {
        let extractor = MetadataExtractor::default();
        let mut data = b"parameters\0\0".to_vec();
        data.extend(zlib("masterpiece, <lora:Zipped_Alice:0.8>"));
        let bytes = png_with_text(&[(b"zTXt", data)]);

        let text = extractor.read_text(&bytes).unwrap();
        assert_eq!(text, "masterpiece, <lora:Zipped_Alice:0.8>");
        let file = write_temp(&bytes);
        assert!(extractor.scan(file.path()).contains("zipped_alice"));
    }

    #[test]
    fn test_png_itxt_compressed() {
        let extractor = MetadataExtractor::default();
        // keyword, compression flag 1, method 0, empty language and translated keyword
        let mut data = b"parameters\0\x01\0\0\0".to_vec();
        data.extend(zlib("masterpiece, <lora:Zipped_Alice:0.8>"));
        let bytes = png_with_text(&[(b"iTXt", data)]);

        let text = extractor.read_text(&bytes).unwrap();
        assert!(text.contains("<lora:Zipped_Alice:0.8>"));
    }

    #[test]
    fn test_png_ztxt_with_corrupt_stream_is_skipped() {
        let extractor = MetadataExtractor::default();
        let mut data = b"parameters\0\0".to_vec();
        data.extend_from_slice(b"not zlib at all");
        let bytes = png_with_text(&[
            (b"zTXt", data),
            (b"tEXt", text_chunk("Comment", "<lora:plain:1>")),
        ]);
        assert_eq!(extractor.read_text(&bytes).as_deref(), Some("<lora:plain:1>"));
    }

    #[test]
    fn test_png_without_text_has_no_tokens() {
        let extractor = MetadataExtractor::default();
        let file = write_temp(&png_with_text(&[]));
        assert_eq!(extractor.scan(file.path()), TokenScan::Tokens(BTreeSet::new()));
    }

    #[test]
    fn test_truncated_png_is_unreadable() {
        let extractor = MetadataExtractor::default();
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(b"tEXtparameters\0<lora:cut");
        let file = write_temp(&bytes);
        assert_eq!(extractor.scan(file.path()), TokenScan::Unreadable);
    }

    #[test]
    fn test_non_image_is_unreadable() {
        let extractor = MetadataExtractor::default();
        let file = write_temp(b"just some text <lora:alice:1>");
        assert_eq!(extractor.scan(file.path()), TokenScan::Unreadable);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let extractor = MetadataExtractor::default();
        assert_eq!(
            extractor.scan(Path::new("/definitely/not/here.png")),
            TokenScan::Unreadable
        );
    }

    #[test]
    fn test_jpeg_user_comment() {
        let extractor = MetadataExtractor::default();
        let bytes = jpeg_with_user_comment("portrait, <lora:Character_Alice:0.7>");
        let file = write_temp(&bytes);
        let scan = extractor.scan(file.path());
        assert!(scan.contains("character_alice"), "got {scan:?}");
    }

    #[test]
    fn test_jpeg_comment_segment() {
        let extractor = MetadataExtractor::default();
        let comment = b"<lora:from_com:1>";
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xFE];
        bytes.extend_from_slice(&((comment.len() + 2) as u16).to_be_bytes());
        bytes.extend_from_slice(comment);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(extractor.read_text(&bytes).as_deref(), Some("<lora:from_com:1>"));
    }

    #[test]
    fn test_webp_xmp_chunk() {
        let extractor = MetadataExtractor::default();
        let xmp = b"<x:xmpmeta><lora:webp_token:1></x:xmpmeta>";
        let mut body = b"WEBP".to_vec();
        body.extend_from_slice(b"VP8X");
        body.extend_from_slice(&10u32.to_le_bytes());
        body.extend_from_slice(&[0; 10]);
        body.extend_from_slice(b"XMP ");
        body.extend_from_slice(&(xmp.len() as u32).to_le_bytes());
        body.extend_from_slice(xmp);
        if xmp.len() % 2 == 1 {
            body.push(0);
        }
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);

        let file = write_temp(&bytes);
        assert!(extractor.scan(file.path()).contains("webp_token"));
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  Character Alice\t"), "characteralice");
        assert_eq!(normalize_token("STYLE_anime"), "style_anime");
    }
}
