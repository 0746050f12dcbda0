//! MOSCA stage definitions: fills a [`NodeCatalog`] for one classified run.

use camino::Utf8PathBuf;

use crate::aggregate::FanIn;
use crate::branch::{Branches, ExpressionSource};
use crate::classify::{ExperimentSet, Sample};
use crate::config::Settings;
use crate::domain::DataType;
use crate::error::MoscaError;
use crate::node::{NodeCatalog, NodeId, NodeKind, TaskNode};
use crate::paths::{Layout, PathResolver};

/// Immutable run context every node definition reads from.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    settings: &'a Settings,
    set: &'a ExperimentSet,
    layout: &'a Layout,
    branches: Branches,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        set: &'a ExperimentSet,
        layout: &'a Layout,
        branches: Branches,
    ) -> Self {
        Self {
            settings,
            set,
            layout,
            branches,
        }
    }

    pub fn catalog(&self) -> Result<NodeCatalog, MoscaError> {
        let mut catalog = NodeCatalog::new();
        catalog.declare_raw(self.layout.experiment_table());
        for sample in self.set.samples() {
            for file in sample.files() {
                catalog.declare_raw(file.clone());
            }
        }
        if let Some(protease) = &self.settings.protease_file {
            catalog.declare_raw(protease.clone());
        }

        if self.branches.preprocess {
            self.preprocess(&mut catalog)?;
        }
        if self.branches.assembly {
            self.assembly(&mut catalog)?;
        }
        if self.branches.annotation {
            self.annotation(&mut catalog)?;
        }
        if self.branches.binning {
            self.binning(&mut catalog)?;
        }
        if self.branches.quantification {
            self.quantification(&mut catalog)?;
        }
        if self.branches.metaproteomics {
            self.metaproteomics(&mut catalog)?;
        }
        if let Some(source) = self.branches.expression_source {
            self.normalization(&mut catalog, source)?;
        }
        if self.branches.differential_expression {
            self.differential_expression(&mut catalog)?;
        }
        self.reports(&mut catalog)?;

        tracing::debug!(nodes = catalog.len(), "node catalog built");
        Ok(catalog)
    }

    fn resolver(&self) -> PathResolver<'a> {
        PathResolver::new(self.layout, self.set)
    }

    /// Groups that get an assembly (or read-based gene calling) and annotation.
    fn annotated_groups(&self) -> Vec<&'a str> {
        if self.branches.annotation {
            self.set.genomic_stage().groups()
        } else {
            Vec::new()
        }
    }

    fn preprocess(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        for sample in self.set.sequencing() {
            let node = TaskNode::new(
                NodeId::keyed("preprocess", sample.id().as_str()),
                NodeKind::PerSample,
                "preprocess",
            )
            .inputs(sample.files().iter().cloned())
            .outputs(self.layout.trimmed_reads(sample))
            .output(self.layout.quality_params(sample))
            .param("data_type", sample.data_type().as_str())
            .param("paired", sample.is_paired())
            .param("minimum_read_length", self.settings.minimum_read_length)
            .param(
                "minimum_read_average_quality",
                self.settings.minimum_read_average_quality,
            )
            .threads(self.settings.threads);
            catalog.register(node)?;
        }

        let merged = self.set.samples().iter().filter(|sample| self.set.is_merged(sample));
        for sample in merged {
            let node = TaskNode::new(
                NodeId::keyed("merge_pairs", sample.id().as_str()),
                NodeKind::PerSample,
                "merge_pairs",
            )
            .inputs(self.layout.trimmed_reads(sample))
            .output(self.layout.merged_reads(sample));
            catalog.register(node)?;
        }
        Ok(())
    }

    fn assembly(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        let resolver = self.resolver();
        for group in self.set.genomic_stage().groups() {
            let node = TaskNode::new(
                NodeId::keyed("assembly", group),
                NodeKind::PerGroup,
                &self.settings.assembler.to_string(),
            )
            .inputs(resolver.genomic_stage_inputs(group))
            .output(self.layout.contigs(group))
            .output(self.layout.assembly_report(group))
            .param("assembler", self.settings.assembler.to_string())
            .param("mrna_fallback", self.set.flags().genomic_fallback)
            .threads(self.settings.threads)
            .memory_gb(self.settings.max_memory);
            catalog.register(node)?;
        }
        Ok(())
    }

    fn annotation(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        let resolver = self.resolver();
        for group in self.annotated_groups() {
            let gene_calling = TaskNode::new(
                NodeId::keyed("gene_calling", group),
                NodeKind::PerGroup,
                "fraggenescan",
            );
            let gene_calling = if self.branches.assembly {
                gene_calling
                    .input(self.layout.contigs(group))
                    .param("mode", "assembly")
                    .param("error_model", "complete")
            } else {
                gene_calling
                    .inputs(resolver.genomic_stage_inputs(group))
                    .param("mode", "reads")
                    .param("error_model", self.settings.error_model.as_str())
            };
            catalog.register(
                gene_calling
                    .output(self.layout.genes_protein(group))
                    .output(self.layout.genes_nucleotide(group))
                    .threads(self.settings.threads),
            )?;

            let upimapi = TaskNode::new(
                NodeId::keyed("upimapi", group),
                NodeKind::PerGroup,
                "upimapi",
            )
            .input(self.layout.genes_protein(group))
            .output(self.layout.upimapi_results(group))
            .param("database", self.settings.upimapi_database.to_string())
            .param("taxids", self.settings.upimapi_taxids.clone())
            .threads(self.settings.threads);
            catalog.register(upimapi)?;

            let databases = self
                .settings
                .recognizer_databases
                .iter()
                .map(|db| db.as_str())
                .collect::<Vec<_>>();
            let recognizer = TaskNode::new(
                NodeId::keyed("recognizer", group),
                NodeKind::PerGroup,
                "recognizer",
            )
            .input(self.layout.genes_protein(group))
            .output(self.layout.recognizer_report(group))
            .param("databases", databases)
            .threads(self.settings.threads);
            catalog.register(recognizer)?;
        }
        Ok(())
    }

    fn binning(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        let resolver = self.resolver();
        let groups = self.set.genomic_stage().groups();
        for group in &groups {
            let node = TaskNode::new(
                NodeId::keyed("binning", group),
                NodeKind::PerGroup,
                "binning",
            )
            .input(self.layout.contigs(group))
            .inputs(resolver.genomic_stage_inputs(group))
            .output(self.layout.bins_report(group))
            .param("markerset", self.settings.markerset)
            .param("iterative", self.branches.iterative_binning)
            .threads(self.settings.threads);
            catalog.register(node)?;
        }

        if self.branches.dereplication {
            let node = TaskNode::new(NodeId::new("dereplication"), NodeKind::Aggregate, "drep")
                .output(self.layout.dereplicated_genomes())
                .threads(self.settings.threads);
            let fan_in =
                FanIn::new(node).over_groups(groups, |group| vec![self.layout.bins_report(group)]);
            register_fan_in(catalog, fan_in)?;
        }
        Ok(())
    }

    /// Count tables a group's merge node writes: one per sequencing omics present.
    fn group_count_tables(&self, group: &str) -> Vec<Utf8PathBuf> {
        [DataType::Genomic, DataType::Transcriptomic]
            .into_iter()
            .filter(|data_type| {
                self.set
                    .in_group(group)
                    .any(|sample| sample.data_type() == *data_type)
            })
            .map(|data_type| self.layout.group_readcounts(group, data_type))
            .collect()
    }

    fn quantification_reference(&self, sample: &Sample) -> Utf8PathBuf {
        match sample.data_type() {
            DataType::Genomic if self.branches.assembly => self.layout.contigs(sample.group()),
            _ => self.layout.genes_nucleotide(sample.group()),
        }
    }

    fn quantification(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        for sample in self.set.sequencing() {
            let node = TaskNode::new(
                NodeId::keyed("quantification", sample.id().as_str()),
                NodeKind::PerSample,
                "quantification",
            )
            .input(self.quantification_reference(sample))
            .inputs(self.layout.trimmed_reads(sample))
            .output(self.layout.readcounts(sample))
            .param("data_type", sample.data_type().as_str())
            .threads(self.settings.threads);
            catalog.register(node)?;
        }

        for group in self.set.groups() {
            let node = TaskNode::new(
                NodeId::keyed("join_counts", group),
                NodeKind::PerGroup,
                "join_counts",
            )
            .input(self.layout.experiment_table())
            .outputs(self.group_count_tables(group));
            let samples = self
                .set
                .in_group(group)
                .filter(|sample| sample.data_type().is_sequencing());
            let fan_in = FanIn::new(node).over_samples(samples, |sample| self.layout.readcounts(sample));
            register_fan_in(catalog, fan_in)?;
        }
        Ok(())
    }

    fn metaproteomics(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        let annotated = self.annotated_groups();
        for sample in self.set.proteomic().iter() {
            let has_metagenome = annotated.contains(&sample.group());
            if !has_metagenome {
                tracing::info!(
                    sample = %sample.id(),
                    "no gene calls for group {}; searching reference proteomes only",
                    sample.group()
                );
            }
            let mut node = TaskNode::new(
                NodeId::keyed("metaproteomics", sample.id().as_str()),
                NodeKind::PerSample,
                "metaproteomics",
            )
            .inputs(sample.files().iter().cloned());
            if has_metagenome {
                node = node.input(self.layout.genes_protein(sample.group()));
            }
            if let Some(protease) = &self.settings.protease_file {
                node = node.input(protease.clone());
            }
            let node = node
                .output(self.layout.spectra_counts(sample))
                .param("protease", self.settings.protease.as_str())
                .param(
                    "references_taxa_level",
                    self.settings.references_taxa_level.as_str(),
                )
                .param(
                    "database",
                    if has_metagenome {
                        "metagenome+references"
                    } else {
                        "references"
                    },
                )
                .threads(self.settings.threads)
                .memory_gb(self.settings.max_memory);
            catalog.register(node)?;
        }
        Ok(())
    }

    fn normalization(
        &self,
        catalog: &mut NodeCatalog,
        source: ExpressionSource,
    ) -> Result<(), MoscaError> {
        let data_type = source.data_type();
        let mut node = TaskNode::new(
            NodeId::new("normalization"),
            NodeKind::Aggregate,
            "normalization",
        )
        .input(self.layout.experiment_table())
        .output(self.layout.normalized_counts(data_type))
        .param("source", data_type.omics_prefix())
        .param("method", self.settings.normalization_method.as_str());
        if source == ExpressionSource::Metaproteomics {
            node = node.param("imputation", self.settings.imputation_method.as_str());
        }

        let samples = self.set.subset(data_type);
        let fan_in = match source {
            ExpressionSource::Metaproteomics => FanIn::new(node)
                .over_samples(samples.iter(), |sample| self.layout.spectra_counts(sample)),
            ExpressionSource::Metatranscriptomics => FanIn::new(node)
                .over_groups(samples.groups(), |group| {
                    vec![self.layout.group_readcounts(group, data_type)]
                }),
        };
        register_fan_in(catalog, fan_in)
    }

    fn differential_expression(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        let Some(source) = self.branches.expression_source else {
            return Ok(());
        };
        let node = TaskNode::new(
            NodeId::new("differential_expression"),
            NodeKind::Run,
            "differential_expression",
        )
        .input(self.layout.normalized_counts(source.data_type()))
        .input(self.layout.experiment_table())
        .output(self.layout.differential_expression())
        .param("source", source.data_type().omics_prefix())
        .param("significance_threshold", self.settings.significance_threshold)
        .param(
            "minimum_differential_expression",
            self.settings.minimum_differential_expression,
        );
        catalog.register(node)
    }

    fn reports(&self, catalog: &mut NodeCatalog) -> Result<(), MoscaError> {
        let annotated = self.annotated_groups();
        let groups = self.set.groups();
        let normalized = self
            .branches
            .expression_source
            .map(|source| self.layout.normalized_counts(source.data_type()));

        if self.branches.protein_report {
            let node = TaskNode::new(
                NodeId::new("protein_report"),
                NodeKind::Aggregate,
                "protein_report",
            )
            .input(self.layout.experiment_table())
            .output(self.layout.protein_report());
            let mut fan_in = FanIn::new(node).over_groups(annotated.iter().copied(), |group| {
                let mut paths = vec![
                    self.layout.upimapi_results(group),
                    self.layout.recognizer_report(group),
                ];
                paths.extend(self.group_count_tables(group));
                paths
            });
            for sample in self.set.proteomic().iter() {
                fan_in = fan_in.with_input(self.layout.spectra_counts(sample));
            }
            if let Some(normalized) = &normalized {
                fan_in = fan_in.with_input(normalized.clone());
            }
            register_fan_in(catalog, fan_in)?;
        }

        for group in &groups {
            let node = TaskNode::new(
                NodeId::keyed("sample_report", group),
                NodeKind::Aggregate,
                "sample_report",
            )
            .output(self.layout.sample_report(group));
            let mut fan_in = FanIn::new(node).over_samples(self.set.in_group(group), |sample| {
                if sample.data_type().is_sequencing() {
                    self.layout.quality_params(sample)
                } else {
                    self.layout.spectra_counts(sample)
                }
            });
            if annotated.contains(group) {
                if self.branches.assembly {
                    fan_in = fan_in.with_input(self.layout.assembly_report(group));
                }
                fan_in = fan_in.with_input(self.layout.recognizer_report(group));
                if self.branches.binning {
                    fan_in = fan_in.with_input(self.layout.bins_report(group));
                }
            }
            register_fan_in(catalog, fan_in)?;
        }

        let node = TaskNode::new(
            NodeId::new("summary_report"),
            NodeKind::Aggregate,
            "summary_report",
        )
        .output(self.layout.summary_report());
        let mut summary = FanIn::new(node)
            .over_groups(groups.iter().copied(), |group| vec![self.layout.sample_report(group)]);
        if self.branches.protein_report {
            summary = summary.with_input(self.layout.protein_report());
        }
        register_fan_in(catalog, summary)?;

        if self.branches.entry_report {
            let node = TaskNode::new(
                NodeId::new("entry_report"),
                NodeKind::Aggregate,
                "entry_report",
            )
            .input(self.layout.experiment_table())
            .output(self.layout.entry_report());
            let mut entry = FanIn::new(node)
                .over_groups(annotated.iter().copied(), |group| {
                    vec![self.layout.upimapi_results(group)]
                })
                .with_input(self.layout.protein_report());
            if let Some(normalized) = &normalized {
                entry = entry.with_input(normalized.clone());
            }
            if self.branches.differential_expression {
                entry = entry.with_input(self.layout.differential_expression());
            }
            register_fan_in(catalog, entry)?;
        }

        let node = TaskNode::new(
            NodeId::new("versions_report"),
            NodeKind::Aggregate,
            "versions_report",
        )
        .output(self.layout.versions_report());
        let mut versions = FanIn::new(node)
            .over_groups(groups.iter().copied(), |group| vec![self.layout.sample_report(group)])
            .with_input(self.layout.summary_report());
        if self.branches.entry_report {
            versions = versions.with_input(self.layout.entry_report());
        }
        register_fan_in(catalog, versions)
    }
}

fn register_fan_in(catalog: &mut NodeCatalog, fan_in: FanIn) -> Result<(), MoscaError> {
    match fan_in.build() {
        Some(node) => catalog.register(node),
        None => Ok(()),
    }
}
