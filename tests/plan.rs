use std::collections::BTreeSet;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use mosca_plan::aggregate::fan_in_width;
use mosca_plan::app::RunContext;
use mosca_plan::branch::ExpressionSource;
use mosca_plan::config::{Config, ConfigLoader, RunConfig};
use mosca_plan::domain::DataType;
use mosca_plan::error::{ErrorKind, MoscaError};
use mosca_plan::graph::TaskGraph;
use mosca_plan::node::NodeKind;
use mosca_plan::paths::PathResolver;

fn run_config(value: Value) -> RunConfig {
    let config: Config = serde_json::from_value(value).unwrap();
    ConfigLoader::resolve_config(config).unwrap()
}

fn context(value: Value) -> RunContext {
    RunContext::new(run_config(value)).unwrap()
}

fn graph(value: Value) -> TaskGraph {
    context(value).graph().unwrap()
}

fn steps(graph: &TaskGraph) -> BTreeSet<String> {
    graph
        .nodes()
        .iter()
        .map(|node| node.id.step().to_string())
        .collect()
}

fn dependency_steps(graph: &TaskGraph, id: &str, step: &str) -> usize {
    graph
        .dependencies(id)
        .iter()
        .filter(|dep| dep.step() == step)
        .count()
}

fn assert_single_producers(graph: &TaskGraph) {
    for node in graph.nodes() {
        for input in &node.inputs {
            assert!(
                graph.producer_of(input).is_some() || graph.raw_inputs().contains(input),
                "{input} of {} has no producer",
                node.id
            );
        }
        for output in &node.outputs {
            assert_eq!(graph.producer_of(output), Some(&node.id));
            assert!(node.produces(output));
            assert!(!graph.raw_inputs().contains(output));
        }
    }
}

fn two_genomes() -> Value {
    json!({
        "output": "out",
        "do_binning": false,
        "experiments": [
            {"Files": "reads/mg1_R1.fq,reads/mg1_R2.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"},
            {"Files": "reads/mg2.fq", "Sample": "s2", "Data type": "dna", "Name": "mg2"}
        ]
    })
}

#[test]
fn genomes_without_expression_data() {
    let graph = graph(two_genomes());
    let steps = steps(&graph);

    for absent in [
        "binning",
        "dereplication",
        "entry_report",
        "metaproteomics",
        "normalization",
        "differential_expression",
    ] {
        assert!(!steps.contains(absent), "unexpected {absent} node");
    }
    assert!(graph.contains("assembly:s1"));
    assert!(graph.contains("assembly:s2"));
    assert!(graph.contains("merge_pairs:mg1"));
    assert!(!graph.contains("merge_pairs:mg2"));

    assert_eq!(dependency_steps(&graph, "summary_report", "sample_report"), 2);
    let summary = graph.node("summary_report").unwrap();
    assert_eq!(summary.kind, NodeKind::Aggregate);
    assert_eq!(fan_in_width(summary), Some(2));
    assert_single_producers(&graph);
}

#[test]
fn proteomics_feeds_normalization() {
    let graph = graph(json!({
        "output": "out",
        "experiments": [
            {"Files": "reads/mg1.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"},
            {"Files": "spectra/mp1", "Sample": "s1", "Data type": "protein", "Name": "mp1"}
        ]
    }));

    let normalization = graph.node("normalization").unwrap();
    assert_eq!(normalization.params["source"], "mp");
    assert!(
        normalization
            .inputs
            .iter()
            .any(|input| input.ends_with("Metaproteomics/mp1/spectracounts.tsv"))
    );
    assert!(
        !normalization
            .inputs
            .iter()
            .any(|input| input.as_str().contains("readcounts"))
    );
    assert_eq!(
        graph
            .dependencies("normalization")
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>(),
        vec!["metaproteomics:mp1"]
    );

    let search = graph.node("metaproteomics:mp1").unwrap();
    assert_eq!(search.params["database"], "metagenome+references");
    assert!(search.inputs.iter().any(|input| input.ends_with("Annotation/s1/fgs.faa")));
    assert!(graph.contains("entry_report"));
    assert!(!graph.contains("differential_expression"));
    assert_single_producers(&graph);
}

#[test]
fn paired_reads_resolve_to_mates() {
    let context = context(two_genomes());
    let layout = &context.layout;

    let paired = layout.trimmed_reads(context.set.get("mg1").unwrap());
    assert_eq!(paired.len(), 2);
    assert!(paired[0].as_str().contains("_forward"));
    assert!(paired[1].as_str().contains("_reverse"));
    let single = layout.trimmed_reads(context.set.get("mg2").unwrap());
    assert_eq!(single.len(), 1);

    let graph = context.graph().unwrap();
    let quantification = graph.node("quantification:mg1").unwrap();
    assert!(paired.iter().all(|mate| quantification.inputs.contains(mate)));
    let merge = graph.node("merge_pairs:mg1").unwrap();
    assert_eq!(merge.inputs, paired);
}

#[test]
fn resolved_reads_always_have_a_producer() {
    let context = context(json!({
        "output": "out",
        "experiments": [
            {"Files": "reads/mg1_R1.fq,reads/mg1_R2.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"},
            {"Files": "reads/mg2.fq", "Sample": "s2", "Data type": "dna", "Name": "mg2"},
            {"Files": "reads/mt1_R1.fq,reads/mt1_R2.fq", "Sample": "s1", "Data type": "mrna", "Name": "mt1"},
            {"Files": "reads/mt2.fq", "Sample": "s2", "Data type": "mrna", "Name": "mt2"},
            {"Files": "spectra/mp1", "Sample": "s1", "Data type": "protein", "Name": "mp1"}
        ]
    }));
    let graph = context.graph().unwrap();
    let resolver = PathResolver::new(&context.layout, &context.set);

    for sample in context.set.sequencing() {
        let id = sample.id().as_str();
        let paths = resolver
            .reads(id)
            .unwrap()
            .into_iter()
            .chain(resolver.stage_input(id).unwrap());
        for path in paths {
            let producer = graph
                .producer_of(&path)
                .unwrap_or_else(|| panic!("{path} of {id} has no producer"));
            assert!(graph.node(producer.as_str()).unwrap().produces(&path));
        }
    }
    assert!(graph.contains("merge_pairs:mg1"));
    assert!(!graph.contains("merge_pairs:mt1"));
    assert_eq!(
        resolver.stage_input("mt1").unwrap(),
        resolver.reads("mt1").unwrap()
    );
    assert_single_producers(&graph);
}

#[test]
fn sample_ids_never_share_trimmed_paths() {
    let graph = graph(json!({
        "output": "out",
        "do_binning": false,
        "experiments": [
            {"Files": "reads/x_R1.fq,reads/x_R2.fq", "Sample": "s1", "Data type": "dna", "Name": "x"},
            {"Files": "reads/y.fq", "Sample": "s2", "Data type": "dna", "Name": "x_forward_paired"}
        ]
    }));

    let paired = graph.node("preprocess:x").unwrap();
    let single = graph.node("preprocess:x_forward_paired").unwrap();
    assert!(paired.outputs.iter().all(|path| !single.produces(path)));
    assert_eq!(
        single.outputs[0],
        Utf8PathBuf::from("out/Preprocess/Trimmomatic/x_forward_paired/quality_trimmed.fq")
    );
    assert_single_producers(&graph);
}

#[test]
fn unrecognized_data_type_fails_before_nodes() {
    let config = run_config(json!({
        "experiments": [
            {"Files": "reads/x.fq", "Sample": "s1", "Data type": "peptide", "Name": "x1"}
        ]
    }));
    let err = RunContext::new(config).unwrap_err();
    assert_matches!(err, MoscaError::InvalidDataType { ref value, .. } if value == "peptide");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn transcriptomes_stand_in_for_missing_genomes() {
    let context = context(json!({
        "output": "out",
        "experiments": [
            {"Files": "reads/mt1_R1.fq,reads/mt1_R2.fq", "Sample": "s1", "Data type": "mrna", "Name": "mt1", "Condition": "c1"},
            {"Files": "reads/mt2.fq", "Sample": "s2", "Data type": "mrna", "Name": "mt2", "Condition": "c2"}
        ]
    }));
    assert!(context.set.flags().genomic_fallback);
    assert_eq!(
        context.branches.expression_source,
        Some(ExpressionSource::Metatranscriptomics)
    );

    let graph = context.graph().unwrap();
    let assembly = graph.node("assembly:s1").unwrap();
    assert_eq!(assembly.params["mrna_fallback"], true);
    assert_eq!(
        assembly.inputs,
        vec![Utf8PathBuf::from("out/Preprocess/Merged/mt1_merged.fq")]
    );
    assert!(!steps(&graph).contains("binning"));

    let normalization = graph.node("normalization").unwrap();
    assert_eq!(normalization.params["source"], "mt");
    assert_eq!(fan_in_width(normalization), Some(2));
    assert!(graph.contains("differential_expression"));
    assert!(graph.contains("entry_report"));
    assert_single_producers(&graph);
}

#[test]
fn fallback_assemblies_can_be_binned() {
    let graph = graph(json!({
        "output": "out",
        "bin_fallback_assemblies": true,
        "experiments": [
            {"Files": "reads/mt1.fq", "Sample": "s1", "Data type": "mrna", "Name": "mt1"}
        ]
    }));
    assert!(graph.contains("binning:s1"));
    assert!(graph.contains("dereplication"));
}

#[test]
fn binning_and_dereplication_per_group() {
    let graph = graph(json!({
        "output": "out",
        "do_iterative_binning": true,
        "experiments": [
            {"Files": "reads/mg1.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"},
            {"Files": "reads/mg2.fq", "Sample": "s1", "Data type": "dna", "Name": "mg2"},
            {"Files": "reads/mg3.fq", "Sample": "s2", "Data type": "dna", "Name": "mg3"}
        ]
    }));

    let binning = graph.node("binning:s1").unwrap();
    assert_eq!(binning.params["iterative"], true);
    assert_eq!(binning.inputs.len(), 3);
    let dereplication = graph.node("dereplication").unwrap();
    assert_eq!(fan_in_width(dereplication), Some(2));
    assert_eq!(fan_in_width(graph.node("join_counts:s1").unwrap()), Some(2));
    assert_eq!(dependency_steps(&graph, "sample_report:s1", "binning"), 1);
    assert_single_producers(&graph);
}

#[test]
fn gene_calling_on_reads_without_assembly() {
    let graph = graph(json!({
        "output": "out",
        "do_assembly": false,
        "do_binning": false,
        "error_model": "sanger_5",
        "experiments": [
            {"Files": "reads/mg1.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"}
        ]
    }));

    assert!(!steps(&graph).contains("assembly"));
    let genes = graph.node("gene_calling:s1").unwrap();
    assert_eq!(genes.params["mode"], "reads");
    assert_eq!(genes.params["error_model"], "sanger_5");
    let quantification = graph.node("quantification:mg1").unwrap();
    assert!(quantification.inputs[0].ends_with("Annotation/s1/fgs.ffn"));
    assert_single_producers(&graph);
}

#[test]
fn proteomics_only_runs_without_sequencing_stages() {
    let graph = graph(json!({
        "output": "out",
        "protease_file": "proteases.fasta",
        "experiments": [
            {"Files": "spectra/mp1", "Sample": "s1", "Data type": "protein", "Name": "mp1", "Condition": "c1"},
            {"Files": "spectra/mp2", "Sample": "s2", "Data type": "protein", "Name": "mp2", "Condition": "c2"}
        ]
    }));

    let steps = steps(&graph);
    assert!(!steps.contains("preprocess"));
    assert!(!steps.contains("protein_report"));
    let search = graph.node("metaproteomics:mp1").unwrap();
    assert_eq!(search.params["database"], "references");
    assert!(search.inputs.contains(&Utf8PathBuf::from("proteases.fasta")));
    assert!(graph.contains("differential_expression"));
    assert_eq!(fan_in_width(graph.node("summary_report").unwrap()), Some(2));
    assert_single_producers(&graph);
}

#[test]
fn transcriptome_without_group_annotation_is_unresolved() {
    let err = context(json!({
        "output": "out",
        "do_binning": false,
        "experiments": [
            {"Files": "reads/mg1.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"},
            {"Files": "reads/mt1.fq", "Sample": "s2", "Data type": "mrna", "Name": "mt1"}
        ]
    }))
    .graph()
    .unwrap_err();

    assert_matches!(
        err,
        MoscaError::UnresolvedDependency { ref path, ref node }
            if path.ends_with("Annotation/s2/fgs.ffn") && node == "quantification:mt1"
    );
}

#[test]
fn aggregators_track_the_live_sample_count() {
    let mut config = json!({
        "output": "out",
        "experiments": [
            {"Files": "spectra/mp1", "Sample": "s1", "Data type": "protein", "Name": "mp1"},
            {"Files": "spectra/mp2", "Sample": "s1", "Data type": "protein", "Name": "mp2"}
        ]
    });
    let before = graph(config.clone());
    assert_eq!(fan_in_width(before.node("normalization").unwrap()), Some(2));

    let experiments = config["experiments"].as_array_mut().unwrap();
    experiments.push(json!({"Files": "spectra/mp3", "Sample": "s2", "Data type": "protein", "Name": "mp3"}));
    let added = graph(config.clone());
    let normalization = added.node("normalization").unwrap();
    assert_eq!(fan_in_width(normalization), Some(3));
    assert_eq!(added.dependencies("normalization").len(), 3);
    assert_eq!(fan_in_width(added.node("summary_report").unwrap()), Some(2));

    let experiments = config["experiments"].as_array_mut().unwrap();
    experiments.remove(0);
    experiments.remove(0);
    let removed = graph(config);
    assert_eq!(fan_in_width(removed.node("normalization").unwrap()), Some(1));
    assert!(!removed.contains("sample_report:s1"));
}

#[test]
fn construction_is_deterministic() {
    let config = json!({
        "output": "out",
        "experiments": [
            {"Files": "reads/mg1_R1.fq,reads/mg1_R2.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"},
            {"Files": "reads/mt1.fq", "Sample": "s1", "Data type": "mrna", "Name": "mt1", "Condition": "a"},
            {"Files": "reads/mt2.fq", "Sample": "s1", "Data type": "mrna", "Name": "mt2", "Condition": "b"},
            {"Files": "spectra/mp1", "Sample": "s1", "Data type": "protein", "Name": "mp1", "Condition": "a"},
            {"Files": "spectra/mp2", "Sample": "s1", "Data type": "protein", "Name": "mp2", "Condition": "b"}
        ]
    });

    let first = graph(config.clone());
    let second = graph(config);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(
        first.node("join_counts:s1").unwrap().outputs,
        vec![
            Utf8PathBuf::from("out/Quantification/s1/mg.readcounts"),
            Utf8PathBuf::from("out/Quantification/s1/mt.readcounts"),
        ]
    );
    assert_eq!(
        first.node("normalization").unwrap().params["source"],
        DataType::Proteomic.omics_prefix()
    );
    assert_single_producers(&first);
}
