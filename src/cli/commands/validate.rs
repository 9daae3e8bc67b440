//! Validate command implementation

use crate::batch::Derivation;
use crate::cli::logging::log;
use crate::cli::{LogLevel, ValidateArgs};
use crate::loader::load_config;
use crate::resolved::ResolvedConfig;

/// Format the batch triangle, marking the derived value
pub fn format_batch_info(config: &ResolvedConfig) -> String {
    let batch = config.batch();
    let mark = |d: Derivation| if batch.derived() == d { " (derived)" } else { "" };
    [
        format!("  Train batch size: {}{}", batch.train_batch_size(), mark(Derivation::TrainBatchSize)),
        format!(
            "  Micro batch size per worker: {}{}",
            batch.micro_batch_size_per_worker(),
            mark(Derivation::MicroBatchSize)
        ),
        format!("  Gradient accumulation steps: {}", batch.gradient_accumulation_steps()),
        format!("  World size: {}", batch.world_size()),
    ]
    .join("\n")
}

/// Format the fp16 section as a string
pub fn format_precision_info(config: &ResolvedConfig) -> String {
    let fp16 = config.precision();
    if !fp16.enabled {
        return "  FP16: disabled".to_string();
    }
    let mut lines = vec![
        "  FP16: enabled".to_string(),
        format!("    Initial scale: {}", fp16.initial_scale),
        format!("    Scale window: {}", fp16.scale_window),
        format!("    Min scale: {}", fp16.min_scale),
        format!("    Hysteresis: {}", fp16.hysteresis),
        format!("    Clip: {}", fp16.clip),
    ];
    if let Some(max) = fp16.max_scale {
        lines.push(format!("    Max scale: {max}"));
    }
    lines.join("\n")
}

/// Format every extension section, one block each
pub fn format_extension_info(config: &ResolvedConfig) -> Option<String> {
    let blocks: Vec<String> = config
        .training()
        .extensions()
        .map(|node| {
            let mut lines = vec![format!("  {}:", node.name())];
            lines.extend(node.items().map(|(key, value)| format!("    {key}: {value}")));
            lines.join("\n")
        })
        .collect();
    (!blocks.is_empty()).then(|| blocks.join("\n"))
}

fn print_detailed_summary(config: &ResolvedConfig) {
    println!();
    println!("Configuration Summary:");
    println!("{}", format_batch_info(config));
    println!();
    println!("{}", format_precision_info(config));

    if let Some(extensions) = format_extension_info(config) {
        println!();
        println!("{extensions}");
    }
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Validating config: {}", args.input.config.display()));

    let config = load_config(&args.input.config, args.input.world_size)
        .map_err(|e| format!("Validation failed [{}]: {e}", e.code()))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed && level != LogLevel::Quiet {
        print_detailed_summary(&config);
    }

    Ok(())
}
