//! COLLADA document model and reader

mod accessor;
mod document;
mod error;
mod parser;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use crate::context::ConversionContext;

pub use accessor::{find_source, row_major_matrix, Components, SourceView};
pub use document::*;
pub use error::ColladaError;
pub use parser::parse_reader;

/// Parse a COLLADA document held in memory.
pub fn parse_str(xml: &str, ctx: &mut ConversionContext) -> Result<Document, ColladaError> {
    parse_reader(xml.as_bytes(), ctx)
}

/// Parse a COLLADA file.
pub fn parse_file(path: &Path, ctx: &mut ConversionContext) -> Result<Document> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open COLLADA file: {}", path.display()))?;
    tracing::debug!("Parsing {}", path.display());
    parse_reader(BufReader::new(file), ctx)
        .with_context(|| format!("Failed to parse COLLADA file: {}", path.display()))
}

/// File name of an image reference: strips `file://` and any directories.
pub fn image_file_name(init_from: &str) -> &str {
    let path = init_from.strip_prefix("file://").unwrap_or(init_from);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("file:///C:/art/skin.png"), "skin.png");
        assert_eq!(image_file_name("..\\textures\\wood.tga"), "wood.tga");
        assert_eq!(image_file_name("plain.png"), "plain.png");
    }

    #[test]
    fn test_parse_file_missing_reports_path() {
        let err = parse_file(Path::new("/nonexistent/scene.dae"), &mut ConversionContext::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("scene.dae"));
    }
}
