//! Per-run decision of which optional stages exist.
//!
//! [`Branches`] is computed once from [`RunFlags`] and the stage toggles and then read
//! by every node definition; nothing downstream re-derives inclusion on its own.

use serde::Serialize;

use crate::classify::RunFlags;
use crate::config::Settings;
use crate::domain::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageToggles {
    pub do_assembly: bool,
    pub do_binning: bool,
    pub do_iterative_binning: bool,
    pub bin_fallback_assemblies: bool,
}

impl From<&Settings> for StageToggles {
    fn from(settings: &Settings) -> Self {
        Self {
            do_assembly: settings.do_assembly,
            do_binning: settings.do_binning,
            do_iterative_binning: settings.do_iterative_binning,
            bin_fallback_assemblies: settings.bin_fallback_assemblies,
        }
    }
}

/// Which quantification feeds normalization and everything after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionSource {
    Metaproteomics,
    Metatranscriptomics,
}

impl ExpressionSource {
    pub fn data_type(&self) -> DataType {
        match self {
            ExpressionSource::Metaproteomics => DataType::Proteomic,
            ExpressionSource::Metatranscriptomics => DataType::Transcriptomic,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Branches {
    pub preprocess: bool,
    pub assembly: bool,
    pub annotation: bool,
    pub binning: bool,
    pub iterative_binning: bool,
    pub dereplication: bool,
    pub quantification: bool,
    pub metaproteomics: bool,
    pub expression_source: Option<ExpressionSource>,
    pub differential_expression: bool,
    pub protein_report: bool,
    pub entry_report: bool,
}

impl Branches {
    pub fn resolve(flags: RunFlags, toggles: StageToggles) -> Self {
        let preprocess = flags.has_genomic || flags.has_transcriptomic;
        let annotation = flags.has_genomic || flags.genomic_fallback;
        let assembly = annotation && toggles.do_assembly;

        let binning = assembly
            && toggles.do_binning
            && (!flags.genomic_fallback || toggles.bin_fallback_assemblies);
        if assembly && toggles.do_binning && !binning {
            tracing::info!("binning skipped: assemblies come from mrna fallback samples");
        }

        let quantification = annotation;
        let metaproteomics = flags.has_proteomic;
        let expression_source = if !flags.has_expression_data {
            None
        } else if metaproteomics {
            Some(ExpressionSource::Metaproteomics)
        } else if quantification {
            Some(ExpressionSource::Metatranscriptomics)
        } else {
            None
        };
        let protein_report = annotation;

        Self {
            preprocess,
            assembly,
            annotation,
            binning,
            iterative_binning: binning && toggles.do_iterative_binning,
            dereplication: binning,
            quantification,
            metaproteomics,
            expression_source,
            differential_expression: expression_source.is_some()
                && flags.has_multiple_conditions,
            protein_report,
            entry_report: protein_report && expression_source.is_some(),
        }
    }

    /// Names of the optional stages included in this run, in pipeline order.
    pub fn included(&self) -> Vec<&'static str> {
        [
            ("preprocess", self.preprocess),
            ("assembly", self.assembly),
            ("annotation", self.annotation),
            ("binning", self.binning),
            ("dereplication", self.dereplication),
            ("quantification", self.quantification),
            ("metaproteomics", self.metaproteomics),
            ("normalization", self.expression_source.is_some()),
            ("differential_expression", self.differential_expression),
            ("protein_report", self.protein_report),
            ("entry_report", self.entry_report),
        ]
        .into_iter()
        .filter_map(|(name, included)| included.then_some(name))
        .collect()
    }
}
