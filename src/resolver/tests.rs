use super::*;
use crate::schema::{FieldSpec, FieldValue, Validator};
use serde_json::json;

fn logging_schema() -> SectionSchema {
    SectionSchema::new("logging")
        .field(FieldSpec::string("level").default_value("info"))
        .field(FieldSpec::int("interval").default_value(10_i64).validate(Validator::positive()))
}

fn valid_raw() -> Value {
    json!({
        "batch": {"micro_batch_size_per_worker": 4, "gradient_accumulation_steps": 2},
        "fp16": {"enabled": true, "initial_scale": 1024}
    })
}

#[test]
fn test_resolve_derives_train_batch_size() {
    let config = ConfigResolver::new().resolve(&valid_raw(), 8).unwrap();
    assert_eq!(config.train_batch_size(), 64);
    assert_eq!(config.micro_batch_size_per_worker(), 4);
    assert_eq!(config.gradient_accumulation_steps(), 2);
    assert_eq!(config.world_size(), 8);
    assert!(config.fp16_enabled());
    assert_eq!(config.precision().initial_scale, 1024.0);
}

#[test]
fn test_empty_input_is_underspecified() {
    let err = ConfigResolver::new().resolve(&json!({}), 1).unwrap_err();
    assert!(matches!(err, Error::UnderspecifiedBatchConfig { .. }));
}

#[test]
fn test_absent_fp16_section_uses_defaults() {
    let raw = json!({"batch": {"train_batch_size": 32}});
    let config = ConfigResolver::new().resolve(&raw, 4).unwrap();
    assert!(!config.fp16_enabled());
    assert_eq!(config.micro_batch_size_per_worker(), 8);
    let fp16 = config.section("fp16").unwrap();
    assert_eq!(fp16.get_float("initial_scale"), Some(65536.0));
}

#[test]
fn test_unknown_section_rejected() {
    let mut raw = valid_raw();
    raw["optimizer"] = json!({"lr": 0.1});
    let err = ConfigResolver::new().resolve(&raw, 1).unwrap_err();
    match err {
        Error::UnknownSection { section, known } => {
            assert_eq!(section, "optimizer");
            assert_eq!(known, "batch, fp16");
        }
        other => panic!("Expected UnknownSection, got {other:?}"),
    }
}

#[test]
fn test_root_must_be_mapping() {
    let err = ConfigResolver::new().resolve(&json!([1, 2]), 1).unwrap_err();
    assert!(matches!(err, Error::SectionNotMapping { ref section, .. } if section == "<root>"));
}

#[test]
fn test_registered_section_parsed_with_defaults() {
    let resolver = ConfigResolver::new().with_section(logging_schema()).unwrap();
    let config = resolver.resolve(&valid_raw(), 1).unwrap();
    assert_eq!(config.get("logging", "level"), Some(&FieldValue::Str("info".into())));
    assert_eq!(config.get("logging", "interval"), Some(&FieldValue::Int(10)));
    assert_eq!(resolver.section_names(), vec!["batch", "fp16", "logging"]);
}

#[test]
fn test_extra_section_applies_to_single_call() {
    let resolver = ConfigResolver::new();
    let mut raw = valid_raw();
    raw["logging"] = json!({"interval": 5});

    let config = resolver.resolve_with(&raw, 1, &[logging_schema()]).unwrap();
    assert_eq!(config.get("logging", "interval"), Some(&FieldValue::Int(5)));

    let err = resolver.resolve(&raw, 1).unwrap_err();
    assert!(matches!(err, Error::UnknownSection { .. }));
}

#[test]
fn test_duplicate_section_rejected_at_registration() {
    let mut resolver = ConfigResolver::new();
    resolver.register_section(logging_schema()).unwrap();
    let err = resolver.register_section(logging_schema()).unwrap_err();
    assert!(matches!(err, Error::DuplicateSection { ref section } if section == "logging"));

    let err = resolver.register_section(SectionSchema::new("batch")).unwrap_err();
    assert!(matches!(err, Error::DuplicateSection { ref section } if section == "batch"));
}

#[test]
fn test_duplicate_extra_section_rejected() {
    let err = ConfigResolver::new()
        .resolve_with(&valid_raw(), 1, &[logging_schema(), logging_schema()])
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateSection { .. }));
}

#[test]
fn test_conflicting_extension_rejected_at_registration() {
    let base = SectionSchema::new("eval").field(FieldSpec::int("interval").required());
    let schema = SectionSchema::extending("eval_strict", &base).field(FieldSpec::string("interval"));

    let err = ConfigResolver::new().register_section(schema).unwrap_err();
    assert!(matches!(err, Error::SchemaConflict { .. }));
}

#[test]
fn test_extension_field_error_fails_whole_resolution() {
    let resolver = ConfigResolver::new().with_section(logging_schema()).unwrap();
    let mut raw = valid_raw();
    raw["logging"] = json!({"interval": 0});
    let err = resolver.resolve(&raw, 1).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref section, .. } if section == "logging"));
}

#[test]
fn test_batch_error_surfaces() {
    let raw = json!({"batch": {
        "train_batch_size": 17,
        "micro_batch_size_per_worker": 4,
        "gradient_accumulation_steps": 2
    }});
    let err = ConfigResolver::new().resolve(&raw, 2).unwrap_err();
    assert!(matches!(err, Error::InconsistentBatchSize { expected: 16, .. }));
}

#[test]
fn test_registered_rule_runs_after_builtin() {
    let resolver = ConfigResolver::new().with_section(logging_schema()).unwrap().with_rule(
        CrossRule::new("logging_within_accumulation", &["logging", "batch"], |config| {
            let interval = config.section("logging").and_then(|n| n.get_int("interval")).unwrap_or(0);
            let accum = config.batch().gradient_accumulation_steps() as i64;
            if interval < accum {
                return Err(format!("interval {interval} < accumulation {accum}"));
            }
            Ok(())
        }),
    );
    assert_eq!(resolver.rules().len(), 2);

    let mut raw = valid_raw();
    raw["logging"] = json!({"interval": 1});
    let err = resolver.resolve(&raw, 1).unwrap_err();
    match err {
        Error::CrossValidation { rule, sections, .. } => {
            assert_eq!(rule, "logging_within_accumulation");
            assert_eq!(sections, "logging, batch");
        }
        other => panic!("Expected CrossValidation, got {other:?}"),
    }

    raw["logging"] = json!({"interval": 2});
    assert!(resolver.resolve(&raw, 1).is_ok());
}

#[test]
fn test_resolved_display_and_json() {
    let resolver = ConfigResolver::new().with_section(logging_schema()).unwrap();
    let config = resolver.resolve(&valid_raw(), 2).unwrap();

    let text = config.to_string();
    assert!(text.starts_with("TrainingConfig = {"));
    assert!(text.contains("batch = {"));
    assert!(text.contains("logging = {"));
    assert!(text.ends_with('}'));

    let value = config.to_json();
    assert_eq!(value["batch"]["train_batch_size"], json!(16));
    assert_eq!(value["fp16"]["enabled"], json!(true));
    assert_eq!(value["logging"]["level"], json!("info"));
    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["batch", "fp16", "logging"]);
}

#[test]
fn test_loss_scaler_from_resolved_config() {
    let config = ConfigResolver::new().resolve(&valid_raw(), 1).unwrap();
    let mut scaler = config.loss_scaler();
    assert!(scaler.is_enabled());
    assert_eq!(scaler.scale(), 1024.0);
    let decision = scaler.report_step(true);
    assert_eq!(decision.scale, 512.0);
    assert!(decision.skip_step);
}
