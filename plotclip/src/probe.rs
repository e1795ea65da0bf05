use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

/// Classification produced by an image probe.
///
/// "Not an image" is an expected, silent outcome; a probe that cannot reach
/// a verdict reports an error instead so the two are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Image,
    NotImage,
}

/// Classifies candidate files before the expensive geotransform read.
pub trait ImageProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutcome>;
}

/// Probe backed by the ImageMagick `identify` binary.
///
/// Runs `identify -verbose <file>` and scans the report for a MIME type
/// label followed by a type ending in `image`.
pub struct IdentifyProbe {
    binary: PathBuf,
}

impl IdentifyProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        IdentifyProbe {
            binary: binary.into(),
        }
    }
}

impl ImageProbe for IdentifyProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutcome> {
        let output = Command::new(&self.binary)
            .arg("-verbose")
            .arg(path)
            .output()
            .context(format!(
                "Failed to execute identify binary {:?}",
                self.binary
            ))?;

        let text = String::from_utf8_lossy(&output.stdout);
        match find_image_mime_type(&text) {
            Some(true) => Ok(ProbeOutcome::Image),
            Some(false) => Ok(ProbeOutcome::NotImage),
            None => anyhow::bail!(
                "No MIME type label found in identify output for {:?}",
                path
            ),
        }
    }
}

/// Probe that classifies purely by file extension. Used in tests and as a
/// cheap fallback when no identify binary is available.
pub struct ExtensionProbe {
    extensions: Vec<String>,
}

impl ExtensionProbe {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExtensionProbe {
            extensions: extensions.into_iter().map(|e| e.into()).collect(),
        }
    }
}

impl ImageProbe for ExtensionProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutcome> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if self.extensions.iter().any(|known| known == &ext) {
            Ok(ProbeOutcome::Image)
        } else {
            Ok(ProbeOutcome::NotImage)
        }
    }
}

/// Looks for an image MIME type in an identify report.
///
/// The label may be spelled `Mime`, `mime`, or `MIME`; the text between the
/// label and the following `/` is taken as the type and must end in `image`.
/// Candidates longer than 50 characters or spanning lines are rejected.
///
/// Returns `None` when no MIME label is present at all, `Some(false)` when a
/// label is present but the type is not an image, `Some(true)` on success.
pub fn find_image_mime_type(text: &str) -> Option<bool> {
    if text.is_empty() {
        return None;
    }

    let pos = text
        .find("Mime")
        .or_else(|| text.find("mime"))
        .or_else(|| text.find("MIME"))?;

    let end_pos = match text[pos..].find('/') {
        Some(offset) => pos + offset,
        None => return Some(false),
    };

    let mime = &text[pos..end_pos];
    if mime.len() > 50 || mime.contains('\n') || mime.contains('\r') {
        return Some(false);
    }

    Some(mime.ends_with("image"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_image() {
        assert_eq!(
            find_image_mime_type("  Mime type: image/tiff\n"),
            Some(true)
        );
    }

    #[test]
    fn test_mime_type_not_image() {
        assert_eq!(
            find_image_mime_type("  Mime type: text/plain\n"),
            Some(false)
        );
    }

    #[test]
    fn test_mime_label_missing() {
        assert_eq!(find_image_mime_type("Format: TIFF\n"), None);
        assert_eq!(find_image_mime_type(""), None);
    }

    #[test]
    fn test_mime_label_without_subtype_separator() {
        assert_eq!(find_image_mime_type("Mime type: image"), Some(false));
    }

    #[test]
    fn test_mime_candidate_spanning_lines_rejected() {
        assert_eq!(
            find_image_mime_type("Mime label\nsomething: else/here"),
            Some(false)
        );
    }

    #[test]
    fn test_extension_probe() {
        let probe = ExtensionProbe::new(["tif", "png"]);
        assert_eq!(
            probe.probe(Path::new("/tmp/ortho.TIF")).unwrap(),
            ProbeOutcome::Image
        );
        assert_eq!(
            probe.probe(Path::new("/tmp/plots.shp")).unwrap(),
            ProbeOutcome::NotImage
        );
    }
}
