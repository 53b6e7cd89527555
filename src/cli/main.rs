//! CoordID command-line tool.
//!
//! Encodes and decodes single identifiers, dumps boundary grids as GeoJSON
//! and encodes CSV files of coordinates in bulk.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use csv::{ReaderBuilder, WriterBuilder};
use geo::Point;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Map};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coordid::config::Config;
use coordid::models::geojson::FeatureCollection;
use coordid::provider::{list_countries, BoundaryProvider, DirectoryProvider};
use coordid::{tessellate, BoundaryCollection, BoundaryFeature, Codec, CoordId, GridCell};

/// Rows per parallel work unit in `batch`
const BATCH_CHUNK: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "coordid")]
#[command(about = "Encode and decode CoordIDs")]
struct Args {
    /// Boundary data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a coordinate
    Encode {
        #[arg(long)]
        country: String,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Decode a CoordID
    Decode { id: String },
    /// Print every grid cell of one boundary as GeoJSON
    Grid {
        #[arg(long)]
        country: String,
        /// Level-3 boundary index
        #[arg(long)]
        index: usize,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Encode a CSV file with `lon` and `lat` columns
    Batch {
        #[arg(long)]
        country: String,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List covered countries
    Countries {
        #[arg(short, long)]
        query: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for results
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    let provider = DirectoryProvider::new(args.data_dir.unwrap_or(config.data.dir));
    let codec = Codec::default();

    match args.command {
        Command::Encode { country, lon, lat } => {
            let collection = load(&provider, &country)?;
            let encoded = codec.encode(&collection, &country, Point::new(lon, lat))?;
            print_json(&Summary::new(&encoded.id, encoded.boundary, &encoded.cell, &collection))
        }
        Command::Decode { id } => {
            let id: CoordId = id.trim().parse()?;
            let collection = load(&provider, id.country())?;
            let decoded = codec.decode_id(&collection, id)?;
            print_json(&Summary::new(&decoded.id, decoded.boundary, &decoded.cell, &collection))
        }
        Command::Grid {
            country,
            index,
            output,
        } => run_grid(&provider, &codec, &country, index, output.as_deref()),
        Command::Batch {
            country,
            input,
            output,
        } => run_batch(&provider, &codec, &country, &input, &output),
        Command::Countries { query } => {
            for info in list_countries(&provider, &config.countries, query.as_deref())? {
                match info.name {
                    Some(name) => println!("{}\t{}", info.code, name),
                    None => println!("{}", info.code),
                }
            }
            Ok(())
        }
    }
}

fn load(provider: &DirectoryProvider, country: &str) -> Result<BoundaryCollection> {
    match provider.load(country)? {
        Some(collection) => Ok(collection),
        None => bail!(
            "Country {} is not covered (no boundary file in {})",
            country,
            provider.dir().display()
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Summary {
    coord_id: String,
    center: [f64; 2],
    admin: Vec<String>,
    /// Boundary data the identifier is valid against
    fingerprint: String,
}

impl Summary {
    fn new(
        id: &CoordId,
        boundary: &BoundaryFeature,
        cell: &GridCell,
        collection: &BoundaryCollection,
    ) -> Self {
        let center = cell.center();
        Self {
            coord_id: id.to_string(),
            center: [center.x(), center.y()],
            admin: boundary.attributes.display_names(),
            fingerprint: format!("{:016x}", collection.fingerprint()),
        }
    }
}

fn run_grid(
    provider: &DirectoryProvider,
    codec: &Codec,
    country: &str,
    index: usize,
    output: Option<&Path>,
) -> Result<()> {
    let collection = load(provider, country)?;
    let boundary = collection.get(index).with_context(|| {
        format!(
            "Boundary index {} out of range ({} boundaries)",
            index,
            collection.len()
        )
    })?;

    let cells = tessellate(boundary, codec.cell_side());
    info!("Boundary {} has {} cells", index, cells.len());

    let grid = grid_features(country, index, &cells)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = io::BufWriter::new(file);
            serde_json::to_writer(&mut writer, &grid)?;
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer(&mut lock, &grid)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

/// Cells of one boundary as GeoJSON, each tagged with its position and
/// identifier
fn grid_features(country: &str, index: usize, cells: &[GridCell]) -> Result<FeatureCollection> {
    let features = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let id = CoordId::new(country, index, i)?;
            let mut feature = cell.to_geojson();
            let mut properties = Map::new();
            properties.insert("index".to_string(), json!(i));
            properties.insert("coord_id".to_string(), json!(id));
            feature.properties = Some(properties);
            Ok(feature)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FeatureCollection::new(features))
}

/// One input row; `point` is `None` when lon/lat did not parse
struct Row {
    lon: String,
    lat: String,
    point: Option<Point<f64>>,
}

impl Row {
    fn parse(lon: &str, lat: &str) -> Self {
        let point = match (lon.parse::<f64>(), lat.parse::<f64>()) {
            (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => Some(Point::new(x, y)),
            _ => None,
        };
        Self {
            lon: lon.to_string(),
            lat: lat.to_string(),
            point,
        }
    }
}

/// `(coord_id, error)` per row, in row order. Exactly one of the two is
/// empty.
fn encode_rows(
    codec: &Codec,
    collection: &BoundaryCollection,
    country: &str,
    rows: &[Row],
    chunk_size: usize,
    pb: &ProgressBar,
) -> Vec<(String, String)> {
    // Chunks keep input order; each chunk tessellates a boundary at most once
    let results: Vec<Vec<(String, String)>> = rows
        .par_chunks(chunk_size.max(1))
        .map(|chunk| {
            let points: Vec<Point<f64>> = chunk.iter().filter_map(|r| r.point).collect();
            let mut encoded = codec.encode_many(collection, country, &points).into_iter();

            let out = chunk
                .iter()
                .map(|row| match row.point {
                    None => (String::new(), "invalid_row".to_string()),
                    Some(_) => match encoded.next() {
                        Some(Ok(e)) => (e.id.to_string(), String::new()),
                        Some(Err(e)) => (String::new(), e.kind().to_string()),
                        None => (String::new(), "internal".to_string()),
                    },
                })
                .collect();
            pb.inc(chunk.len() as u64);
            out
        })
        .collect();

    results.into_iter().flatten().collect()
}

fn run_batch(
    provider: &DirectoryProvider,
    codec: &Codec,
    country: &str,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let collection = load(provider, country)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    // Find column indices
    let headers = reader.headers()?.clone();
    let lon_idx = headers
        .iter()
        .position(|h| h == "lon")
        .context("Column 'lon' not found")?;
    let lat_idx = headers
        .iter()
        .position(|h| h == "lat")
        .context("Column 'lat' not found")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(Row::parse(
            record.get(lon_idx).unwrap_or_default(),
            record.get(lat_idx).unwrap_or_default(),
        ));
    }
    info!("Encoding {} rows for {}", rows.len(), country);

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );
    let results = encode_rows(codec, &collection, country, &rows, BATCH_CHUNK, &pb);
    pb.finish_and_clear();

    let mut writer = WriterBuilder::new()
        .from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    writer.write_record(["lon", "lat", "coord_id", "error"])?;

    let mut failed = 0usize;
    for (row, (coord_id, err)) in rows.iter().zip(&results) {
        if !err.is_empty() {
            failed += 1;
        }
        writer.write_record([row.lon.as_str(), row.lat.as_str(), coord_id.as_str(), err.as_str()])?;
    }
    writer.flush()?;

    if failed > 0 {
        warn!("{} of {} rows could not be encoded", failed, rows.len());
    }
    info!("Wrote {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordid::CellSide;
    use tempfile::Builder;

    /// 10x10 square at the origin
    const SQUARE: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"NAME_1": "square"},
         "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]}}
    ]}"#;

    fn planar() -> Codec {
        Codec::new(CellSide::degrees(1.0))
    }

    #[test]
    fn test_row_parse() {
        assert_eq!(Row::parse("5", "5.5").point, Some(Point::new(5.0, 5.5)));
        assert!(Row::parse("abc", "5").point.is_none());
        assert!(Row::parse("", "5").point.is_none());
        assert!(Row::parse("NaN", "5").point.is_none());
        assert!(Row::parse("5", "inf").point.is_none());
    }

    #[test]
    fn test_encode_rows_keeps_order_across_chunks() {
        let collection = BoundaryCollection::from_geojson("XX", SQUARE).unwrap();
        let codec = planar();
        let rows = vec![
            Row::parse("5", "5"),
            Row::parse("abc", "5"),
            Row::parse("-5", "-5"),
            Row::parse("0.1", "5"),
            Row::parse("6", "2"),
        ];

        // chunk of 2 splits valid and invalid rows across work units
        let results = encode_rows(&codec, &collection, "XX", &rows, 2, &ProgressBar::hidden());
        assert_eq!(results.len(), rows.len());

        let expected_first = codec.encode(&collection, "XX", Point::new(5.0, 5.0)).unwrap();
        assert_eq!(results[0], (expected_first.id.to_string(), String::new()));
        assert_eq!(results[1], (String::new(), "invalid_row".to_string()));
        assert_eq!(results[2], (String::new(), "not_found".to_string()));
        assert_eq!(results[3], (String::new(), "uncovered_gap".to_string()));
        let expected_last = codec.encode(&collection, "XX", Point::new(6.0, 2.0)).unwrap();
        assert_eq!(results[4], (expected_last.id.to_string(), String::new()));

        // same answers in one chunk
        let single = encode_rows(&codec, &collection, "XX", &rows, 1024, &ProgressBar::hidden());
        assert_eq!(single, results);
    }

    #[test]
    fn test_run_batch_writes_csv() {
        let dir = Builder::new().prefix("coordid-cli-").tempdir().unwrap();
        std::fs::write(dir.path().join("XX.geojson"), SQUARE).unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "name,lat,lon\na, 5 , 5\nb,x,1\nc,-5,-5\n").unwrap();

        let provider = DirectoryProvider::new(dir.path());
        run_batch(&provider, &planar(), "XX", &input, &output).unwrap();

        let mut reader = ReaderBuilder::new().from_path(&output).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            vec!["lon", "lat", "coord_id", "error"]
        );
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][0], "5");
        assert!(records[0][2].starts_with("XX-0-"));
        assert_eq!(&records[0][3], "");
        assert_eq!(&records[1][0], "1");
        assert_eq!(&records[1][1], "x");
        assert_eq!(&records[1][3], "invalid_row");
        assert_eq!(&records[2][3], "not_found");
    }

    #[test]
    fn test_run_batch_missing_column() {
        let dir = Builder::new().prefix("coordid-cli-").tempdir().unwrap();
        std::fs::write(dir.path().join("XX.geojson"), SQUARE).unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "x,y\n1,2\n").unwrap();

        let provider = DirectoryProvider::new(dir.path());
        let err = run_batch(&provider, &planar(), "XX", &input, &dir.path().join("out.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("Column 'lon' not found"));
    }

    #[test]
    fn test_grid_features_carry_identifiers() {
        let collection = BoundaryCollection::from_geojson("XX", SQUARE).unwrap();
        let cells = tessellate(collection.get(0).unwrap(), planar().cell_side());
        let grid = grid_features("XX", 0, &cells).unwrap();

        assert_eq!(grid.features.len(), cells.len());
        let last = grid.features.last().unwrap().properties.as_ref().unwrap();
        assert_eq!(last["index"], json!(cells.len() - 1));
        assert_eq!(last["coord_id"], json!(format!("XX-0-{}", cells.len() - 1)));

        assert!(grid_features("X-X", 0, &cells).is_err());
    }

    #[test]
    fn test_run_grid_writes_file() {
        let dir = Builder::new().prefix("coordid-cli-").tempdir().unwrap();
        std::fs::write(dir.path().join("XX.geojson"), SQUARE).unwrap();
        let output = dir.path().join("grid.geojson");

        let provider = DirectoryProvider::new(dir.path());
        run_grid(&provider, &planar(), "XX", 0, Some(&output)).unwrap();

        let written: FeatureCollection =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.features.len(), 27);

        assert!(run_grid(&provider, &planar(), "XX", 5, Some(&output)).is_err());
    }
}
