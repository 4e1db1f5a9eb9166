//! Content type resolution and `Content-Disposition` formatting.

use std::fs::File;
use std::io::Read;
use std::path::Path;

const SNIFF_LEN: u64 = 512;
const OCTET_STREAM: &str = "application/octet-stream";

/// Content type by file extension. Covers what browsers commonly download;
/// anything else goes through content sniffing.
fn extension_type(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        // Documents
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "epub" => "application/epub+zip",

        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",

        // Audio and video
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",

        // Archives
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "apk" => "application/vnd.android.package-archive",
        "dmg" => "application/x-apple-diskimage",
        "iso" => "application/x-iso9660-image",

        _ => return None,
    };
    Some(mime)
}

/// Pick a content type for `display_name`, sniffing `path` when the
/// extension says nothing. Does blocking I/O.
pub fn resolve_content_type(display_name: &str, path: &Path) -> String {
    let known = Path::new(display_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .and_then(|ext| extension_type(&ext));
    if let Some(mime) = known {
        return mime.to_string();
    }

    match sniff(path) {
        Some(mime) => mime.to_string(),
        None => OCTET_STREAM.to_string(),
    }
}

fn sniff(path: &Path) -> Option<&'static str> {
    let file = File::open(path).ok()?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut head).ok()?;
    infer::get(&head).map(|kind| kind.mime_type())
}

/// `attachment` disposition with an ASCII fallback name and the exact UTF-8
/// name in `filename*`.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve_without_io() {
        let missing = Path::new("/definitely/not/here");
        assert_eq!(resolve_content_type("report.pdf", missing), "application/pdf");
        assert_eq!(resolve_content_type("photo.JPG", missing), "image/jpeg");
        assert_eq!(resolve_content_type("bundle.zip", missing), "application/zip");
    }

    #[test]
    fn everyday_formats_never_reach_the_sniffer() {
        let missing = Path::new("/definitely/not/here");
        for (name, expected) in [
            ("a.pdf", "application/pdf"),
            ("a.jpg", "image/jpeg"),
            ("a.jpeg", "image/jpeg"),
            ("a.png", "image/png"),
            ("a.gif", "image/gif"),
            ("a.mp4", "video/mp4"),
            ("a.zip", "application/zip"),
            ("a.txt", "text/plain"),
        ] {
            assert_eq!(resolve_content_type(name, missing), expected, "{name}");
        }
    }

    #[test]
    fn unknown_extension_falls_back_to_sniffing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blob");
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&[0u8; 32]);
        std::fs::write(&path, png).expect("write");

        assert_eq!(resolve_content_type("blob", &path), "image/png");
    }

    #[test]
    fn unrecognized_content_is_octet_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, b"just some plain bytes").expect("write");

        assert_eq!(resolve_content_type("data", &path), OCTET_STREAM);
    }

    #[test]
    fn disposition_escapes_quotes_and_non_ascii() {
        let header = content_disposition("résumé \"final\".pdf");
        assert!(header.starts_with("attachment; filename=\"r_sum_ _final_.pdf\""));
        assert!(header.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22final%22.pdf"));
    }
}
