use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use mosca_plan::config::{Config, ConfigFormat, ConfigLoader};
use mosca_plan::domain::{Assembler, RecognizerDatabase, UpimapiDatabase};
use mosca_plan::error::{ErrorKind, MoscaError};

fn parse(value: serde_json::Value) -> Config {
    serde_json::from_value(value).unwrap()
}

#[test]
fn parse_config_with_defaults() {
    let config = parse(json!({
        "output": "results",
        "experiments": [
            {"Files": "reads/mg1_R1.fq,reads/mg1_R2.fq", "Sample": "s1", "Data type": "dna", "Name": "mg1"}
        ],
        "unknown_key": 3
    }));

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    let settings = &resolved.settings;
    assert_eq!(settings.output, Utf8PathBuf::from("results"));
    assert_eq!(settings.max_memory, 50);
    assert_eq!(settings.minimum_read_length, 100);
    assert_eq!(settings.minimum_read_average_quality, 20);
    assert!(settings.do_assembly);
    assert!(settings.do_binning);
    assert!(!settings.do_iterative_binning);
    assert_eq!(settings.markerset, 40);
    assert_eq!(settings.upimapi_database, UpimapiDatabase::Uniprot);
    assert_eq!(settings.protease, "Trypsin");
    assert_eq!(settings.normalization_method, "TMM");
    assert_eq!(settings.imputation_method, "knn");
    assert_eq!(settings.significance_threshold, 0.01);
    assert_eq!(resolved.experiments.len(), 1);
    assert_eq!(resolved.experiments[0].condition, "");
}

#[test]
fn parse_config_overrides() {
    let config = parse(json!({
        "output": "results/",
        "threads": 0,
        "assembler": "megahit",
        "upimapi_database": "taxids",
        "upimapi_taxids": "2157, 2",
        "recognizer_databases": ["COG", "Pfam"],
        "protease_file": "proteases.fasta"
    }));

    let settings = ConfigLoader::resolve_config(config).unwrap().settings;
    assert_eq!(settings.output, Utf8PathBuf::from("results"));
    assert_eq!(settings.threads, 1);
    assert_eq!(settings.assembler, Assembler::Megahit);
    assert_eq!(settings.upimapi_database, UpimapiDatabase::Taxids);
    assert_eq!(settings.upimapi_taxids, vec!["2157", "2"]);
    assert_eq!(
        settings.recognizer_databases,
        vec![RecognizerDatabase::Cog, RecognizerDatabase::Pfam]
    );
    assert_eq!(settings.protease_file, Some(Utf8PathBuf::from("proteases.fasta")));
}

#[test]
fn reject_invalid_enumerations() {
    let err = ConfigLoader::resolve_config(parse(json!({"assembler": "velvet"}))).unwrap_err();
    assert_matches!(err, MoscaError::InvalidParameter { ref parameter, .. } if parameter == "assembler");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err =
        ConfigLoader::resolve_config(parse(json!({"recognizer_databases": ["CDD"]}))).unwrap_err();
    assert_matches!(err, MoscaError::InvalidParameter { value, .. } if value == "CDD");

    let err =
        ConfigLoader::resolve_config(parse(json!({"significance_threshold": 2.0}))).unwrap_err();
    assert_matches!(err, MoscaError::InvalidParameter { .. });
}

#[test]
fn binning_without_assembly_is_rejected() {
    let err = ConfigLoader::resolve_config(parse(json!({"do_assembly": false}))).unwrap_err();
    assert_matches!(err, MoscaError::BinningWithoutAssembly);

    let resolved =
        ConfigLoader::resolve_config(parse(json!({"do_assembly": false, "do_binning": false})));
    assert!(resolved.is_ok());
}

#[test]
fn resolve_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    fs::write(
        &path,
        json!({"output": "out", "do_binning": false}).to_string(),
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert!(!resolved.settings.do_binning);
    assert!(!resolved.effective.do_binning);
}

#[test]
fn resolve_rejects_bad_files() {
    let dir = tempfile::tempdir().unwrap();

    let toml = dir.path().join("config.toml");
    fs::write(&toml, "output = \"out\"\n").unwrap();
    assert_matches!(
        ConfigLoader::resolve(toml.to_str()),
        Err(MoscaError::ConfigParse(_))
    );

    let yaml = dir.path().join("config.yaml");
    fs::write(&yaml, "experiments: [unclosed\n").unwrap();
    assert_matches!(
        ConfigLoader::resolve(yaml.to_str()),
        Err(MoscaError::ConfigParse(message)) if message.contains("YAML")
    );

    let broken = dir.path().join("config.json");
    fs::write(&broken, "{ not json").unwrap();
    let err = ConfigLoader::resolve(broken.to_str()).unwrap_err();
    assert_matches!(err, MoscaError::ConfigParse(_));
    assert_eq!(err.kind(), ErrorKind::Io);

    let missing = dir.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(missing.to_str()),
        Err(MoscaError::ConfigRead(_))
    );
}

#[test]
fn resolve_reads_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "output: out\n\
         do_binning: false\n\
         assembler: megahit\n\
         experiments:\n\
         \x20 - Files: reads/mg1_R1.fq,reads/mg1_R2.fq\n\
         \x20   Sample: s1\n\
         \x20   Data type: dna\n\
         \x20   Name: mg1\n",
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.format, ConfigFormat::Yaml);
    assert_eq!(resolved.settings.assembler, Assembler::Megahit);
    assert_eq!(resolved.settings.threads, 14);
    assert_eq!(resolved.experiments.len(), 1);
    assert_eq!(resolved.experiments[0].data_type, "dna");
    assert_eq!(resolved.experiments[0].files, "reads/mg1_R1.fq,reads/mg1_R2.fq");

    let json = dir.path().join("config.json");
    fs::write(&json, json!({"output": "out", "do_binning": false}).to_string()).unwrap();
    assert_eq!(
        ConfigLoader::resolve(json.to_str()).unwrap().format,
        ConfigFormat::Json
    );
}
