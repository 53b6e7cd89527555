//! Boundary collections stored as GeoJSON files, one per country.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::BoundaryProvider;
use crate::codec::is_country_code;
use crate::error::Result;
use crate::models::BoundaryCollection;

const EXTENSIONS: [&str; 2] = [".geojson", ".geojson.gz"];

/// Reads `<dir>/<CODE>.geojson` or `<dir>/<CODE>.geojson.gz`.
///
/// Feature order is file order. Codes are case-sensitive.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, country_code: &str) -> Option<PathBuf> {
        // also keeps codes like "../x" from ever reaching the filesystem
        if !is_country_code(country_code) {
            return None;
        }
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}{}", country_code, ext)))
            .find(|path| path.is_file())
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut data = String::new();
    reader.read_to_string(&mut data)?;
    Ok(data)
}

impl BoundaryProvider for DirectoryProvider {
    fn load(&self, country_code: &str) -> Result<Option<BoundaryCollection>> {
        let Some(path) = self.path_for(country_code) else {
            return Ok(None);
        };

        info!("Loading boundaries for {} from {}", country_code, path.display());
        let data = read_to_string(&path)?;
        let collection = BoundaryCollection::from_geojson(country_code, &data)?;
        info!(
            "Loaded {} boundaries for {}",
            collection.len(),
            country_code
        );

        Ok(Some(collection))
    }

    fn countries(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            warn!("Boundary directory not found: {}", self.dir.display());
            return Ok(Vec::new());
        }

        let mut codes = Vec::new();
        for entry in WalkDir::new(&self.dir).max_depth(1).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let code = EXTENSIONS
                .iter()
                .find_map(|ext| file_name.strip_suffix(ext))
                .filter(|code| is_country_code(code));
            if let Some(code) = code {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}
