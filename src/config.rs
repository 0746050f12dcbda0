use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{Assembler, RecognizerDatabase, UpimapiDatabase};
use crate::error::MoscaError;

/// Run configuration as written by the user; missing keys take MOSCA's defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub experiments: Vec<ExperimentRecord>,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_max_memory")]
    pub max_memory: u32,
    #[serde(default = "default_minimum_read_length")]
    pub minimum_read_length: u32,
    #[serde(default = "default_minimum_read_average_quality")]
    pub minimum_read_average_quality: u32,
    #[serde(default = "default_true")]
    pub do_assembly: bool,
    #[serde(default = "default_assembler")]
    pub assembler: String,
    #[serde(default = "default_error_model")]
    pub error_model: String,
    #[serde(default = "default_true")]
    pub do_binning: bool,
    #[serde(default)]
    pub do_iterative_binning: bool,
    #[serde(default = "default_markerset")]
    pub markerset: u32,
    #[serde(default)]
    pub bin_fallback_assemblies: bool,
    #[serde(default = "default_upimapi_database")]
    pub upimapi_database: String,
    #[serde(default)]
    pub upimapi_taxids: String,
    #[serde(default = "default_recognizer_databases")]
    pub recognizer_databases: Vec<String>,
    #[serde(default = "default_protease")]
    pub protease: String,
    #[serde(default)]
    pub protease_file: String,
    #[serde(default = "default_references_taxa_level")]
    pub references_taxa_level: String,
    #[serde(default = "default_normalization_method")]
    pub normalization_method: String,
    #[serde(default = "default_imputation_method")]
    pub imputation_method: String,
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,
    #[serde(default = "default_minimum_differential_expression")]
    pub minimum_differential_expression: f64,
}

/// One row of the `experiments` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExperimentRecord {
    #[serde(rename = "Files")]
    pub files: String,
    #[serde(rename = "Sample", default)]
    pub sample: String,
    #[serde(rename = "Data type")]
    pub data_type: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Condition", default)]
    pub condition: String,
}

/// Validated stage parameters; the experiment records are classified separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub output: Utf8PathBuf,
    pub threads: usize,
    pub max_memory: u32,
    pub minimum_read_length: u32,
    pub minimum_read_average_quality: u32,
    pub do_assembly: bool,
    pub assembler: Assembler,
    pub error_model: String,
    pub do_binning: bool,
    pub do_iterative_binning: bool,
    pub markerset: u32,
    pub bin_fallback_assemblies: bool,
    pub upimapi_database: UpimapiDatabase,
    pub upimapi_taxids: Vec<String>,
    pub recognizer_databases: Vec<RecognizerDatabase>,
    pub protease: String,
    pub protease_file: Option<Utf8PathBuf>,
    pub references_taxa_level: String,
    pub normalization_method: String,
    pub imputation_method: String,
    pub significance_threshold: f64,
    pub minimum_differential_expression: f64,
}

/// Serialization of the configuration file; the snapshot is written back in the
/// same format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(ConfigFormat::Json),
            Some("yaml" | "yml") => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
        }
    }

    pub fn parse(&self, content: &str) -> Result<Config, MoscaError> {
        match self {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|err| MoscaError::ConfigParse(format!("invalid JSON: {err}"))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|err| MoscaError::ConfigParse(format!("invalid YAML: {err}"))),
        }
    }

    pub fn render(&self, config: &Config) -> Result<String, MoscaError> {
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(config)
                .map_err(|err| MoscaError::Filesystem(err.to_string())),
            ConfigFormat::Yaml => {
                serde_yaml::to_string(config).map_err(|err| MoscaError::Filesystem(err.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: Settings,
    pub experiments: Vec<ExperimentRecord>,
    /// The effective configuration (defaults applied), persisted as the snapshot.
    pub effective: Config,
    pub format: ConfigFormat,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<RunConfig, MoscaError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("config.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(MoscaError::MissingConfig);
        }
        let Some(format) = ConfigFormat::from_path(&config_path) else {
            return Err(MoscaError::ConfigParse(format!(
                "config file must end in .json or .yaml: {}",
                config_path.display()
            )));
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MoscaError::ConfigRead(config_path.clone()))?;
        let config = format.parse(&content)?;

        Ok(RunConfig {
            format,
            ..Self::resolve_config(config)?
        })
    }

    pub fn resolve_config(config: Config) -> Result<RunConfig, MoscaError> {
        if config.do_binning && !config.do_assembly {
            return Err(MoscaError::BinningWithoutAssembly);
        }
        if config.output.trim().is_empty() {
            return Err(MoscaError::InvalidParameter {
                parameter: "output".to_string(),
                value: config.output.clone(),
            });
        }
        if !(0.0..=1.0).contains(&config.significance_threshold) {
            return Err(MoscaError::InvalidParameter {
                parameter: "significance_threshold".to_string(),
                value: config.significance_threshold.to_string(),
            });
        }

        let recognizer_databases = config
            .recognizer_databases
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<RecognizerDatabase>, MoscaError>>()?;

        let settings = Settings {
            output: Utf8PathBuf::from(config.output.trim_end_matches('/')),
            threads: config.threads.max(1),
            max_memory: config.max_memory,
            minimum_read_length: config.minimum_read_length,
            minimum_read_average_quality: config.minimum_read_average_quality,
            do_assembly: config.do_assembly,
            assembler: config.assembler.parse()?,
            error_model: config.error_model.clone(),
            do_binning: config.do_binning,
            do_iterative_binning: config.do_iterative_binning,
            markerset: config.markerset,
            bin_fallback_assemblies: config.bin_fallback_assemblies,
            upimapi_database: config.upimapi_database.parse()?,
            upimapi_taxids: config
                .upimapi_taxids
                .split(',')
                .map(str::trim)
                .filter(|taxid| !taxid.is_empty())
                .map(str::to_string)
                .collect(),
            recognizer_databases,
            protease: config.protease.clone(),
            protease_file: (!config.protease_file.trim().is_empty())
                .then(|| Utf8PathBuf::from(config.protease_file.trim())),
            references_taxa_level: config.references_taxa_level.clone(),
            normalization_method: config.normalization_method.clone(),
            imputation_method: config.imputation_method.clone(),
            significance_threshold: config.significance_threshold,
            minimum_differential_expression: config.minimum_differential_expression,
        };

        Ok(RunConfig {
            settings,
            experiments: config.experiments.clone(),
            effective: config,
            format: ConfigFormat::Json,
        })
    }
}

fn default_output() -> String {
    "mosca_output".to_string()
}

fn default_threads() -> usize {
    14
}

fn default_max_memory() -> u32 {
    50
}

fn default_minimum_read_length() -> u32 {
    100
}

fn default_minimum_read_average_quality() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_assembler() -> String {
    "metaspades".to_string()
}

fn default_error_model() -> String {
    "illumina_10".to_string()
}

fn default_markerset() -> u32 {
    40
}

fn default_upimapi_database() -> String {
    "uniprot".to_string()
}

pub fn default_recognizer_databases() -> Vec<String> {
    ["NCBI_Curated", "Pfam", "SMART", "KOG", "COG", "PRK", "TIGR"]
        .iter()
        .map(|db| db.to_string())
        .collect()
}

fn default_protease() -> String {
    "Trypsin".to_string()
}

fn default_references_taxa_level() -> String {
    "genus".to_string()
}

fn default_normalization_method() -> String {
    "TMM".to_string()
}

fn default_imputation_method() -> String {
    "knn".to_string()
}

fn default_significance_threshold() -> f64 {
    0.01
}

fn default_minimum_differential_expression() -> f64 {
    1.0
}
