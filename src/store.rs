use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::classify::ExperimentSet;
use crate::config::{Config, ConfigFormat, ExperimentRecord};
use crate::error::MoscaError;
use crate::paths::Layout;

/// Column order of `exps.tsv`.
pub const EXPERIMENT_COLUMNS: [&str; 5] = ["Files", "Sample", "Data type", "Condition", "Name"];

/// Run-start state written under the output directory.
#[derive(Debug, Clone)]
pub struct RunStore {
    layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PersistedFiles {
    pub experiment_table: Utf8PathBuf,
    pub config_snapshot: Utf8PathBuf,
}

impl RunStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn persist(
        &self,
        set: &ExperimentSet,
        config: &Config,
        format: ConfigFormat,
    ) -> Result<PersistedFiles, MoscaError> {
        let experiment_table = self.layout.experiment_table();
        let config_snapshot = self.layout.config_snapshot(format);
        Self::write_bytes_atomic(&experiment_table, &experiment_table_bytes(set)?)?;

        let mut effective = config.clone();
        effective.experiments = set.samples().iter().map(|sample| sample.to_record()).collect();
        let content = format.render(&effective)?;
        Self::write_bytes_atomic(&config_snapshot, content.as_bytes())?;

        tracing::info!(path = %experiment_table, samples = set.len(), "wrote experiment table");
        Ok(PersistedFiles {
            experiment_table,
            config_snapshot,
        })
    }

    pub fn read_experiment_table(path: &Utf8Path) -> Result<Vec<ExperimentRecord>, MoscaError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path.as_std_path())
            .map_err(|err| MoscaError::Filesystem(format!("read {path}: {err}")))?;
        reader
            .deserialize()
            .map(|row| row.map_err(|err| MoscaError::Filesystem(format!("read {path}: {err}"))))
            .collect()
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), MoscaError> {
        let parent = path
            .parent()
            .ok_or_else(|| MoscaError::Filesystem(format!("invalid destination path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| MoscaError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".mosca-plan")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| MoscaError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| MoscaError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| MoscaError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn experiment_table_bytes(set: &ExperimentSet) -> Result<Vec<u8>, MoscaError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer
        .write_record(EXPERIMENT_COLUMNS)
        .map_err(|err| MoscaError::Filesystem(err.to_string()))?;
    for sample in set.samples() {
        let record = sample.to_record();
        writer
            .write_record([
                record.files.as_str(),
                record.sample.as_str(),
                record.data_type.as_str(),
                record.condition.as_str(),
                record.name.as_str(),
            ])
            .map_err(|err| MoscaError::Filesystem(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| MoscaError::Filesystem(err.to_string()))
}
