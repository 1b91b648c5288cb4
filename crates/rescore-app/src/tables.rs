// Loading the three advancement tables named in the config.

use std::path::Path;

use rescore_core::{AdvancementError, AdvancementTable, AdvancementTables, Situation, TableFormat};
use thiserror::Error;
use tracing::info;

use crate::config::AdvancementConfig;

#[derive(Debug, Error)]
pub enum TableLoadError {
    #[error("failed to read advancement table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("bad advancement table {path}: {source}")]
    Parse {
        path: String,
        source: AdvancementError,
    },
}

/// Load one situation's table from a file.
pub fn load_table(
    path: &Path,
    situation: Situation,
    format: TableFormat,
) -> Result<AdvancementTable, TableLoadError> {
    let file = std::fs::File::open(path).map_err(|e| TableLoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let table = AdvancementTable::parse(situation, format, file).map_err(|e| {
        TableLoadError::Parse {
            path: path.display().to_string(),
            source: e,
        }
    })?;
    info!(
        "loaded {situation} table from {} ({} runners)",
        path.display(),
        table.len()
    );
    Ok(table)
}

/// Load all three tables using the paths from the config.
pub fn load_tables(config: &AdvancementConfig) -> Result<AdvancementTables, TableLoadError> {
    Ok(AdvancementTables {
        single: load_table(
            Path::new(&config.single_path),
            Situation::SingleAdvance,
            config.format,
        )?,
        ground_out: load_table(
            Path::new(&config.ground_out_path),
            Situation::GroundOutTagUp,
            config.format,
        )?,
        fly_out: load_table(
            Path::new(&config.fly_out_path),
            Situation::FlyOutTagUp,
            config.format,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tables(dir: &Path) -> AdvancementConfig {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("single.tsv"),
            "\t0.6\t1000\nrunner-a\t0.25\t40\n",
        )
        .unwrap();
        fs::write(dir.join("ground_out.tsv"), "\t0.3\t500\n").unwrap();
        fs::write(dir.join("fly_out.tsv"), "\t0.4\t800\nrunner-b\t0.9\t15\n").unwrap();
        AdvancementConfig {
            format: TableFormat::Tsv,
            single_path: dir.join("single.tsv").display().to_string(),
            ground_out_path: dir.join("ground_out.tsv").display().to_string(),
            fly_out_path: dir.join("fly_out.tsv").display().to_string(),
            seed: 0,
            simulate_before_divergence: false,
        }
    }

    #[test]
    fn loads_all_three_tables() {
        let dir = std::env::temp_dir().join("rescore_tables_test_load");
        let _ = fs::remove_dir_all(&dir);
        let config = write_tables(&dir);

        let tables = load_tables(&config).unwrap();
        assert_eq!(tables.single.lookup("runner-a").rate, 0.25);
        assert_eq!(tables.ground_out.default_odds().rate, 0.3);
        assert_eq!(tables.fly_out.lookup("runner-b").attempts, 15);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_default_row_names_the_file() {
        let dir = std::env::temp_dir().join("rescore_tables_test_no_default");
        let _ = fs::remove_dir_all(&dir);
        let config = write_tables(&dir);
        fs::write(&config.ground_out_path, "runner-a\t0.3\t500\n").unwrap();

        match load_tables(&config).unwrap_err() {
            TableLoadError::Parse { path, source } => {
                assert!(path.ends_with("ground_out.tsv"));
                assert!(matches!(source, AdvancementError::MissingDefault { .. }));
            }
            other => panic!("expected Parse, got: {other}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_table(
            Path::new("/nonexistent/rescore/single.csv"),
            Situation::SingleAdvance,
            TableFormat::Csv,
        )
        .unwrap_err();
        assert!(matches!(err, TableLoadError::Io { .. }));
    }
}
