//! Output layout of a run and the read resolvers built on it.
//!
//! Every path a node consumes or produces comes from here; the graph assembler links
//! nodes by comparing these values, so two stages that agree on an artifact must
//! call the same builder.

use camino::{Utf8Path, Utf8PathBuf};

use crate::classify::{ExperimentSet, Sample};
use crate::config::ConfigFormat;
use crate::domain::{DataType, Stage};
use crate::error::MoscaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    output: Utf8PathBuf,
}

impl Layout {
    pub fn new(output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Utf8Path {
        &self.output
    }

    pub fn stage_dir(&self, stage: Stage) -> Utf8PathBuf {
        self.output.join(stage.dir_name())
    }

    pub fn experiment_table(&self) -> Utf8PathBuf {
        self.output.join("exps.tsv")
    }

    pub fn config_snapshot(&self, format: ConfigFormat) -> Utf8PathBuf {
        self.output.join(format!("config.{}", format.extension()))
    }

    /// Per-sample trimming directory; sample ids are unique, so these never overlap.
    fn trimmomatic_dir(&self, sample: &Sample) -> Utf8PathBuf {
        self.stage_dir(Stage::Preprocess)
            .join("Trimmomatic")
            .join(sample.id().as_str())
    }

    /// Quality-trimmed reads: forward and reverse mates for paired samples, one file
    /// otherwise.
    pub fn trimmed_reads(&self, sample: &Sample) -> Vec<Utf8PathBuf> {
        let dir = self.trimmomatic_dir(sample);
        if sample.is_paired() {
            ["forward", "reverse"]
                .iter()
                .map(|mate| dir.join(format!("quality_trimmed_{mate}_paired.fq")))
                .collect()
        } else {
            vec![dir.join("quality_trimmed.fq")]
        }
    }

    pub fn quality_params(&self, sample: &Sample) -> Utf8PathBuf {
        self.trimmomatic_dir(sample).join("quality_params.txt")
    }

    /// Single file holding both mates of a paired sample.
    pub fn merged_reads(&self, sample: &Sample) -> Utf8PathBuf {
        self.stage_dir(Stage::Preprocess)
            .join("Merged")
            .join(format!("{}_merged.fq", sample.id()))
    }

    pub fn contigs(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Assembly)
            .join(group)
            .join("contigs.fasta")
    }

    pub fn assembly_report(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Assembly)
            .join(group)
            .join("quality_control")
            .join("report.tsv")
    }

    pub fn bins_report(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Binning).join(group).join("checkm.tsv")
    }

    pub fn dereplicated_genomes(&self) -> Utf8PathBuf {
        self.stage_dir(Stage::Binning)
            .join("dRep")
            .join("data_tables")
            .join("Widb.csv")
    }

    pub fn genes_protein(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Annotation).join(group).join("fgs.faa")
    }

    pub fn genes_nucleotide(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Annotation).join(group).join("fgs.ffn")
    }

    pub fn upimapi_results(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Annotation)
            .join(group)
            .join("UPIMAPI_results.tsv")
    }

    pub fn recognizer_report(&self, group: &str) -> Utf8PathBuf {
        self.stage_dir(Stage::Annotation)
            .join(group)
            .join("COG_report.tsv")
    }

    pub fn readcounts(&self, sample: &Sample) -> Utf8PathBuf {
        self.stage_dir(Stage::Quantification)
            .join(format!("{}.readcounts", sample.id()))
    }

    /// Per-group count table merging every sample of one omics type.
    pub fn group_readcounts(&self, group: &str, data_type: DataType) -> Utf8PathBuf {
        self.stage_dir(Stage::Quantification)
            .join(group)
            .join(format!("{}.readcounts", data_type.omics_prefix()))
    }

    pub fn spectra_counts(&self, sample: &Sample) -> Utf8PathBuf {
        self.stage_dir(Stage::Metaproteomics)
            .join(sample.id().as_str())
            .join("spectracounts.tsv")
    }

    pub fn normalized_counts(&self, data_type: DataType) -> Utf8PathBuf {
        let stage = match data_type {
            DataType::Proteomic => Stage::Metaproteomics,
            DataType::Genomic | DataType::Transcriptomic => Stage::Quantification,
        };
        self.stage_dir(stage)
            .join(format!("{}_normalized.tsv", data_type.omics_prefix()))
    }

    pub fn differential_expression(&self) -> Utf8PathBuf {
        self.stage_dir(Stage::DifferentialExpression)
            .join("condition_treated_results.tsv")
    }

    pub fn sample_report(&self, group: &str) -> Utf8PathBuf {
        self.output.join(format!("{group}_report.txt"))
    }

    pub fn protein_report(&self) -> Utf8PathBuf {
        self.output.join("MOSCA_Protein_Report.xlsx")
    }

    pub fn summary_report(&self) -> Utf8PathBuf {
        self.output.join("MOSCA_General_Report.xlsx")
    }

    pub fn entry_report(&self) -> Utf8PathBuf {
        self.output.join("MOSCA_Entry_Report.xlsx")
    }

    pub fn versions_report(&self) -> Utf8PathBuf {
        self.output.join("MOSCA_Versions_Report.xlsx")
    }
}

/// Sample-id keyed resolvers over the active [`ExperimentSet`].
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    layout: &'a Layout,
    set: &'a ExperimentSet,
}

impl<'a> PathResolver<'a> {
    pub fn new(layout: &'a Layout, set: &'a ExperimentSet) -> Self {
        Self { layout, set }
    }

    pub fn reads(&self, id: &str) -> Result<Vec<Utf8PathBuf>, MoscaError> {
        let sample = self.set.get(id)?;
        Ok(self.layout.trimmed_reads(sample))
    }

    /// Reads consumed by stages after trimming: the merged file when a merge node
    /// exists for the sample, otherwise the trimmed reads themselves.
    pub fn stage_input(&self, id: &str) -> Result<Vec<Utf8PathBuf>, MoscaError> {
        let sample = self.set.get(id)?;
        Ok(self.stage_reads(sample))
    }

    /// Reads that genomic stages of `group` consume, honoring the mrna fallback.
    pub fn genomic_stage_inputs(&self, group: &str) -> Vec<Utf8PathBuf> {
        self.set
            .genomic_stage()
            .in_group(group)
            .flat_map(|sample| self.stage_reads(sample))
            .collect()
    }

    fn stage_reads(&self, sample: &Sample) -> Vec<Utf8PathBuf> {
        if self.set.is_merged(sample) {
            vec![self.layout.merged_reads(sample)]
        } else {
            self.layout.trimmed_reads(sample)
        }
    }
}
