//! Experiment classification: turns raw `experiments` records into an immutable
//! [`ExperimentSet`] with per-omics views and the run flags derived from them.

use std::collections::{BTreeMap, BTreeSet};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::config::ExperimentRecord;
use crate::domain::{DataType, SampleId};
use crate::error::MoscaError;

/// Separator between mate files in the `Files` column.
pub const PAIR_DELIMITER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    id: SampleId,
    group: String,
    data_type: DataType,
    files: Vec<Utf8PathBuf>,
    paired: bool,
    condition: Option<String>,
}

impl Sample {
    pub fn from_record(record: &ExperimentRecord) -> Result<Self, MoscaError> {
        let label = if record.name.trim().is_empty() {
            record.files.trim().to_string()
        } else {
            record.name.trim().to_string()
        };
        let data_type: DataType =
            record
                .data_type
                .parse()
                .map_err(|_| MoscaError::InvalidDataType {
                    sample: label.clone(),
                    value: record.data_type.clone(),
                })?;

        let files = record
            .files
            .split(PAIR_DELIMITER)
            .map(str::trim)
            .filter(|file| !file.is_empty())
            .map(Utf8PathBuf::from)
            .collect::<Vec<_>>();
        if files.is_empty() {
            return Err(MoscaError::MissingFiles(label));
        }

        let id = if record.name.trim().is_empty() {
            SampleId::from_files(&record.files, data_type)
        } else {
            record.name.parse()?
        };
        let group = match record.sample.trim() {
            "" => id.as_str().to_string(),
            group => validate_group(group)?.to_string(),
        };
        let condition = Some(record.condition.trim())
            .filter(|condition| !condition.is_empty())
            .map(str::to_string);

        Ok(Self {
            id,
            group,
            data_type,
            paired: record.files.contains(PAIR_DELIMITER),
            files,
            condition,
        })
    }

    pub fn id(&self) -> &SampleId {
        &self.id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn files(&self) -> &[Utf8PathBuf] {
        &self.files
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Whether `Files` lists mates; the `,` separator is the only pairing signal.
    pub fn is_paired(&self) -> bool {
        self.paired
    }

    /// Row for the persisted experiment table, with the resolved name.
    pub fn to_record(&self) -> ExperimentRecord {
        ExperimentRecord {
            files: self
                .files
                .iter()
                .map(|file| file.as_str())
                .collect::<Vec<_>>()
                .join(","),
            sample: self.group.clone(),
            data_type: self.data_type.to_string(),
            name: self.id.to_string(),
            condition: self.condition.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunFlags {
    pub has_genomic: bool,
    pub has_transcriptomic: bool,
    pub has_proteomic: bool,
    pub has_expression_data: bool,
    pub genomic_fallback: bool,
    pub has_multiple_conditions: bool,
}

/// Emitted when transcriptomic samples stand in for a missing genomic subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackNotice {
    pub missing: DataType,
    pub substitute: DataType,
    pub samples: Vec<SampleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSet {
    samples: Vec<Sample>,
    index: BTreeMap<SampleId, usize>,
    genomic: Vec<usize>,
    transcriptomic: Vec<usize>,
    proteomic: Vec<usize>,
    flags: RunFlags,
    fallback: Option<FallbackNotice>,
}

impl ExperimentSet {
    pub fn classify(records: &[ExperimentRecord]) -> Result<Self, MoscaError> {
        if records.is_empty() {
            return Err(MoscaError::NoExperiments);
        }

        let mut samples = Vec::with_capacity(records.len());
        let mut index = BTreeMap::new();
        for record in records {
            let sample = Sample::from_record(record)?;
            if index.contains_key(sample.id()) {
                return Err(MoscaError::DuplicateSample(sample.id().to_string()));
            }
            index.insert(sample.id().clone(), samples.len());
            samples.push(sample);
        }

        let positions = |data_type: DataType| {
            samples
                .iter()
                .enumerate()
                .filter(|(_, sample)| sample.data_type() == data_type)
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>()
        };
        let genomic = positions(DataType::Genomic);
        let transcriptomic = positions(DataType::Transcriptomic);
        let proteomic = positions(DataType::Proteomic);

        let genomic_fallback = genomic.is_empty() && !transcriptomic.is_empty();
        let expression = if proteomic.is_empty() {
            &transcriptomic
        } else {
            &proteomic
        };
        let conditions = expression
            .iter()
            .filter_map(|&idx| samples[idx].condition())
            .collect::<BTreeSet<_>>();

        let flags = RunFlags {
            has_genomic: !genomic.is_empty(),
            has_transcriptomic: !transcriptomic.is_empty(),
            has_proteomic: !proteomic.is_empty(),
            has_expression_data: !transcriptomic.is_empty() || !proteomic.is_empty(),
            genomic_fallback,
            has_multiple_conditions: conditions.len() > 1,
        };

        let fallback = genomic_fallback.then(|| FallbackNotice {
            missing: DataType::Genomic,
            substitute: DataType::Transcriptomic,
            samples: transcriptomic
                .iter()
                .map(|&idx| samples[idx].id().clone())
                .collect(),
        });
        if let Some(notice) = &fallback {
            tracing::warn!(
                samples = notice.samples.len(),
                "no dna experiments; mrna experiments substitute for genomic stages"
            );
        }

        Ok(Self {
            samples,
            index,
            genomic,
            transcriptomic,
            proteomic,
            flags,
            fallback,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn flags(&self) -> RunFlags {
        self.flags
    }

    pub fn fallback(&self) -> Option<&FallbackNotice> {
        self.fallback.as_ref()
    }

    pub fn get(&self, id: &str) -> Result<&Sample, MoscaError> {
        self.index
            .get(id)
            .map(|&idx| &self.samples[idx])
            .ok_or_else(|| MoscaError::UnknownSample(id.to_string()))
    }

    pub fn genomic(&self) -> Subset<'_> {
        self.view(&self.genomic)
    }

    pub fn transcriptomic(&self) -> Subset<'_> {
        self.view(&self.transcriptomic)
    }

    pub fn proteomic(&self) -> Subset<'_> {
        self.view(&self.proteomic)
    }

    pub fn subset(&self, data_type: DataType) -> Subset<'_> {
        match data_type {
            DataType::Genomic => self.genomic(),
            DataType::Transcriptomic => self.transcriptomic(),
            DataType::Proteomic => self.proteomic(),
        }
    }

    /// Samples feeding genomic stages (assembly, gene calling, binning): the
    /// genomic subset, or the transcriptomic one while the fallback is active.
    pub fn genomic_stage(&self) -> Subset<'_> {
        if self.flags.genomic_fallback {
            self.transcriptomic()
        } else {
            self.genomic()
        }
    }

    /// Whether the sample's mates are merged before genomic stages. Merge-node
    /// inclusion and stage-input resolution both go through here.
    pub fn is_merged(&self, sample: &Sample) -> bool {
        sample.is_paired() && self.genomic_stage().contains(sample.id())
    }

    /// Every dna and mrna sample, in config order.
    pub fn sequencing(&self) -> impl Iterator<Item = &Sample> {
        self.samples
            .iter()
            .filter(|sample| sample.data_type().is_sequencing())
    }

    /// Group labels in order of first appearance.
    pub fn groups(&self) -> Vec<&str> {
        ordered_groups(self.samples.iter())
    }

    pub fn in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples
            .iter()
            .filter(move |sample| sample.group() == group)
    }

    fn view<'a>(&'a self, indices: &'a [usize]) -> Subset<'a> {
        Subset { set: self, indices }
    }
}

/// A borrowed view over part of an [`ExperimentSet`].
#[derive(Debug, Clone, Copy)]
pub struct Subset<'a> {
    set: &'a ExperimentSet,
    indices: &'a [usize],
}

impl<'a> Subset<'a> {
    pub fn iter(self) -> impl Iterator<Item = &'a Sample> + 'a {
        let set = self.set;
        self.indices.iter().map(move |&idx| &set.samples[idx])
    }

    pub fn len(self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(self) -> bool {
        self.indices.is_empty()
    }

    pub fn ids(self) -> Vec<&'a SampleId> {
        self.iter().map(Sample::id).collect()
    }

    pub fn groups(self) -> Vec<&'a str> {
        ordered_groups(self.iter())
    }

    pub fn in_group(self, group: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.iter().filter(move |sample| sample.group() == group)
    }

    pub fn contains(self, id: &SampleId) -> bool {
        self.iter().any(|sample| sample.id() == id)
    }
}

/// Group labels become directory names under every stage directory.
fn validate_group(group: &str) -> Result<&str, MoscaError> {
    let escapes = group.chars().all(|c| c == '.') || group.contains(['/', '\\']);
    if escapes {
        return Err(MoscaError::InvalidParameter {
            parameter: "Sample".to_string(),
            value: group.to_string(),
        });
    }
    Ok(group)
}

fn ordered_groups<'a>(samples: impl Iterator<Item = &'a Sample>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    samples
        .map(Sample::group)
        .filter(|group| seen.insert(*group))
        .collect()
}
