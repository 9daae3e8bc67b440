//! Info command implementation

use crate::cli::logging::log;
use crate::cli::{InfoArgs, LogLevel, OutputFormat};
use crate::loader::load_config;
use crate::resolved::ResolvedConfig;

/// Render the resolved configuration in `format`
pub fn render_config(config: &ResolvedConfig, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Text => Ok(config.to_string()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| format!("JSON serialization error: {e}"))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(config).map_err(|e| format!("YAML serialization error: {e}"))
        }
    }
}

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let config = load_config(&args.input.config, args.input.world_size)
        .map_err(|e| format!("Config error [{}]: {e}", e.code()))?;

    if args.format == OutputFormat::Text {
        log(level, LogLevel::Verbose, &format!("Resolved {}", args.input.config.display()));
    }
    println!("{}", render_config(&config, args.format)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ConfigResolver;
    use serde_json::json;

    fn sample() -> ResolvedConfig {
        ConfigResolver::new()
            .resolve(&json!({"batch": {"train_batch_size": 32}, "fp16": {"enabled": true}}), 4)
            .unwrap()
    }

    #[test]
    fn test_render_text_is_dotted() {
        let text = render_config(&sample(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("TrainingConfig = {"));
        assert!(text.contains("train_batch_size"));
        assert!(text.contains("..."));
    }

    #[test]
    fn test_render_json_round_trips() {
        let text = render_config(&sample(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["batch"]["micro_batch_size_per_worker"], json!(8));
        assert_eq!(value["fp16"]["enabled"], json!(true));
    }

    #[test]
    fn test_render_yaml() {
        let text = render_config(&sample(), OutputFormat::Yaml).unwrap();
        assert!(text.contains("batch:"));
        assert!(text.contains("world_size: 4"));
    }
}
