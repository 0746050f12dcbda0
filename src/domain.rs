use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MoscaError;

/// Words R refuses as identifiers; sample names become column names downstream.
const R_RESERVED_WORDS: &[&str] = &[
    "if",
    "else",
    "repeat",
    "while",
    "function",
    "for",
    "in",
    "next",
    "break",
    "TRUE",
    "FALSE",
    "NULL",
    "Inf",
    "NaN",
    "NA",
    "NA_integer_",
    "NA_real_",
    "NA_complex_",
    "NA_character_",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "dna")]
    Genomic,
    #[serde(rename = "mrna")]
    Transcriptomic,
    #[serde(rename = "protein")]
    Proteomic,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Genomic => "dna",
            DataType::Transcriptomic => "mrna",
            DataType::Proteomic => "protein",
        }
    }

    /// Short omics prefix used in read-count file names (`mg`, `mt`, `mp`).
    pub fn omics_prefix(&self) -> &'static str {
        match self {
            DataType::Genomic => "mg",
            DataType::Transcriptomic => "mt",
            DataType::Proteomic => "mp",
        }
    }

    pub fn is_sequencing(&self) -> bool {
        matches!(self, DataType::Genomic | DataType::Transcriptomic)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = MoscaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "dna" => Ok(DataType::Genomic),
            "mrna" => Ok(DataType::Transcriptomic),
            "protein" => Ok(DataType::Proteomic),
            other => Err(MoscaError::InvalidDataType {
                sample: String::new(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(String);

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds an id from an experiment's file list when the config leaves `Name` empty.
    ///
    /// Proteomic experiments point at a spectra folder, so its last component is used.
    /// Paired reads are cut at the `_R` mate marker, single files at the FASTA/FASTQ
    /// extension.
    pub fn from_files(files: &str, data_type: DataType) -> Self {
        let first = files.split(',').next().unwrap_or(files).trim();
        let file_name = first.trim_end_matches('/').rsplit('/').next().unwrap_or(first);
        let name = if data_type == DataType::Proteomic {
            file_name
        } else if files.contains(',') {
            file_name.split("_R").next().unwrap_or(file_name)
        } else {
            cut_sequence_extension(file_name)
        };
        Self(name.to_string())
    }
}

fn cut_sequence_extension(file_name: &str) -> &str {
    [".fa", ".fq"]
        .iter()
        .filter_map(|ext| file_name.find(ext))
        .min()
        .map(|idx| &file_name[..idx])
        .unwrap_or(file_name)
}

impl Borrow<str> for SampleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleId {
    type Err = MoscaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim();
        let invalid = |reason: &str| MoscaError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if R_RESERVED_WORDS.contains(&name) {
            return Err(invalid("reserved R word"));
        }
        let pattern = Regex::new(r"^[\w.]+$").map_err(|err| invalid(&err.to_string()))?;
        if !pattern.is_match(name) {
            return Err(invalid(
                "use only letters, numbers, dots (.) and underscores (_)",
            ));
        }
        let mut chars = name.chars();
        let starts_numeric = match (chars.next(), chars.next()) {
            (Some(first), _) if first.is_ascii_digit() => true,
            (Some('.'), Some(second)) => second.is_ascii_digit(),
            _ => false,
        };
        if starts_numeric {
            return Err(invalid("starts with a number"));
        }
        Ok(Self(name.to_string()))
    }
}

/// Output subdirectories, one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    Preprocess,
    Assembly,
    Annotation,
    Binning,
    Metaproteomics,
    Quantification,
    DifferentialExpression,
}

impl Stage {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Preprocess => "Preprocess",
            Stage::Assembly => "Assembly",
            Stage::Annotation => "Annotation",
            Stage::Binning => "Binning",
            Stage::Metaproteomics => "Metaproteomics",
            Stage::Quantification => "Quantification",
            Stage::DifferentialExpression => "DE_analysis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assembler {
    Metaspades,
    Megahit,
}

impl fmt::Display for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assembler::Metaspades => write!(f, "metaspades"),
            Assembler::Megahit => write!(f, "megahit"),
        }
    }
}

impl FromStr for Assembler {
    type Err = MoscaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "metaspades" => Ok(Assembler::Metaspades),
            "megahit" => Ok(Assembler::Megahit),
            other => Err(MoscaError::InvalidParameter {
                parameter: "assembler".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpimapiDatabase {
    Uniprot,
    Swissprot,
    Taxids,
}

impl fmt::Display for UpimapiDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpimapiDatabase::Uniprot => write!(f, "uniprot"),
            UpimapiDatabase::Swissprot => write!(f, "swissprot"),
            UpimapiDatabase::Taxids => write!(f, "taxids"),
        }
    }
}

impl FromStr for UpimapiDatabase {
    type Err = MoscaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "uniprot" => Ok(UpimapiDatabase::Uniprot),
            "swissprot" => Ok(UpimapiDatabase::Swissprot),
            "taxids" => Ok(UpimapiDatabase::Taxids),
            other => Err(MoscaError::InvalidParameter {
                parameter: "upimapi_database".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecognizerDatabase {
    #[serde(rename = "NCBI_Curated")]
    NcbiCurated,
    Pfam,
    #[serde(rename = "SMART")]
    Smart,
    #[serde(rename = "KOG")]
    Kog,
    #[serde(rename = "COG")]
    Cog,
    #[serde(rename = "PRK")]
    Prk,
    #[serde(rename = "TIGR")]
    Tigr,
}

impl RecognizerDatabase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerDatabase::NcbiCurated => "NCBI_Curated",
            RecognizerDatabase::Pfam => "Pfam",
            RecognizerDatabase::Smart => "SMART",
            RecognizerDatabase::Kog => "KOG",
            RecognizerDatabase::Cog => "COG",
            RecognizerDatabase::Prk => "PRK",
            RecognizerDatabase::Tigr => "TIGR",
        }
    }
}

impl FromStr for RecognizerDatabase {
    type Err = MoscaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "NCBI_Curated" => Ok(RecognizerDatabase::NcbiCurated),
            "Pfam" => Ok(RecognizerDatabase::Pfam),
            "SMART" => Ok(RecognizerDatabase::Smart),
            "KOG" => Ok(RecognizerDatabase::Kog),
            "COG" => Ok(RecognizerDatabase::Cog),
            "PRK" => Ok(RecognizerDatabase::Prk),
            "TIGR" => Ok(RecognizerDatabase::Tigr),
            other => Err(MoscaError::InvalidParameter {
                parameter: "recognizer_databases".to_string(),
                value: other.to_string(),
            }),
        }
    }
}
