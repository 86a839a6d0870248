//! Magic-number sniffing
//!
//! Servers routinely mislabel icon payloads, so content-type headers are
//! ignored entirely: classification is done on the first 64 bytes of the
//! body. The sniffer never reads past that prefix and is safe to call on a
//! zero-filled buffer.

/// Number of bytes the sniffer consumes from the head of a payload.
pub const SNIFF_LEN: usize = 64;

/// Icon formats the service accepts. SVG is rejected during discovery and is
/// deliberately not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Ico,
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
}

impl IconKind {
    /// Canonical MIME string for the format.
    pub fn content_type(&self) -> &'static str {
        match self {
            IconKind::Ico => "image/x-icon",
            IconKind::Png => "image/png",
            IconKind::Jpeg => "image/jpeg",
            IconKind::Webp => "image/webp",
            IconKind::Gif => "image/gif",
            IconKind::Bmp => "image/bmp",
        }
    }

}

/// Classify a 64-byte payload prefix.
///
/// ICO layout, for reference:
/// ```text
/// 0 0 1 0 @4
///     ^^^ image type (1 is icon, else we don't care)
///        n n @6  number of images in the file (2 bytes)
///            w h @8  width x height (0 means 256)
/// ```
pub fn sniff(buf: &[u8; SNIFF_LEN]) -> Option<IconKind> {
    // ico
    if buf[0] == 0 && buf[1] == 0 && buf[2] == 1 && buf[3] == 0 {
        if buf[8] == 2 {
            // only two colors? probably a placeholder image
            // this may return some false positives
            return None;
        }
        return Some(IconKind::Ico);
    }

    // png
    if buf[..8] == *b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A" {
        return Some(IconKind::Png);
    }

    // jpeg (JFIF variants)
    if buf[..4] == *b"\xFF\xD8\xFF\xFF"
        || buf[..4] == *b"\xFF\xD8\xFF\xEE"
        || buf[..4] == *b"\xFF\xD8\xFF\xE0"
    {
        return Some(IconKind::Jpeg);
    }

    // jpeg with Exif marker
    if buf[..4] == *b"\xFF\xD8\xFF\xE1" && buf[6..12] == *b"\x45\x78\x69\x66\x00\x00" {
        return Some(IconKind::Jpeg);
    }

    // webp
    if buf[..4] == *b"RIFF" && buf[8..12] == *b"WEBP" {
        return Some(IconKind::Webp);
    }

    // gif
    if buf[..6] == *b"GIF87a" || buf[..6] == *b"GIF89a" {
        return Some(IconKind::Gif);
    }

    // bmp
    if buf[..2] == *b"BM" {
        return Some(IconKind::Bmp);
    }

    None
}
