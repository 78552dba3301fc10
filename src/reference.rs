use image::ImageFormat;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, PipelineResult};

/// The user's product photo, re-encoded as PNG into a temp file owned by one run.
///
/// The file is removed when the value drops.
pub struct ReferenceImage {
    file: NamedTempFile,
    width: u32,
    height: u32,
    source_name: String,
}

impl ReferenceImage {
    pub fn from_bytes(bytes: &[u8], source_name: &str) -> PipelineResult<Self> {
        if bytes.is_empty() {
            return Err(PipelineError::UserInputIncomplete("reference image".into()));
        }
        // CPU-bound decode; photos are small enough to do inline.
        let img = image::load_from_memory(bytes).map_err(|e| {
            PipelineError::UserInputIncomplete(format!("reference image ({source_name} is not a readable image: {e})"))
        })?;
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;

        let mut file = tempfile::Builder::new().prefix("reference-").suffix(".png").tempfile()?;
        file.write_all(&png)?;
        file.flush()?;

        tracing::debug!(source = source_name, width = img.width(), height = img.height(), "reference image normalized");
        Ok(Self { file, width: img.width(), height: img.height(), source_name: source_name.to_string() })
    }

    pub async fn from_path(path: &Path) -> PipelineResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PipelineError::UserInputIncomplete(format!("reference image ({}: {e})", path.display()))
        })?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Self::from_bytes(&bytes, &name)
    }

    /// Fresh read of the normalized PNG; one per render call.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Upload name for the multipart part.
    pub fn file_name(&self) -> &str {
        "reference_image.png"
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
