//! Scale command implementation
//!
//! Replays an overflow pattern through the loss scaler configured by the
//! file and prints the decision taken at every step.

use crate::cli::logging::log;
use crate::cli::{parse_overflow_pattern, LogLevel, OutputFormat, ScaleArgs};
use crate::loader::load_config;
use crate::precision::{LossScaleState, LossScaler};
use serde::Serialize;

/// Decision recorded for one simulated step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleRecord {
    pub step: usize,
    pub overflow: bool,
    pub scale: f64,
    pub skip_step: bool,
    /// Controller state after the step; `None` with loss scaling disabled
    pub state: Option<LossScaleState>,
}

/// Feed `overflows` to `scaler`, one report per step.
pub fn simulate(scaler: &mut LossScaler, overflows: &[bool]) -> Vec<ScaleRecord> {
    overflows
        .iter()
        .enumerate()
        .map(|(i, &overflow)| {
            let decision = scaler.report_step(overflow);
            ScaleRecord {
                step: i + 1,
                overflow,
                scale: decision.scale,
                skip_step: decision.skip_step,
                state: scaler.controller().map(|c| c.state()),
            }
        })
        .collect()
}

fn describe_state(state: Option<LossScaleState>) -> String {
    match state {
        None => "disabled".to_string(),
        Some(LossScaleState::Steady { good_steps }) => format!("steady ({good_steps} good)"),
        Some(LossScaleState::Cooling { remaining }) => format!("cooling ({remaining} left)"),
    }
}

/// Tabulate records for terminal output
pub fn format_records(records: &[ScaleRecord]) -> String {
    let mut lines = vec![format!("{:>6}  {:>8}  {:>14}  {:>5}  state", "step", "overflow", "scale", "skip")];
    lines.extend(records.iter().map(|r| {
        format!(
            "{:>6}  {:>8}  {:>14}  {:>5}  {}",
            r.step,
            if r.overflow { "yes" } else { "no" },
            r.scale,
            if r.skip_step { "yes" } else { "no" },
            describe_state(r.state)
        )
    }));
    lines.join("\n")
}

pub fn run_scale(args: ScaleArgs, level: LogLevel) -> Result<(), String> {
    let overflows = parse_overflow_pattern(&args.overflows)?;
    let config = load_config(&args.input.config, args.input.world_size)
        .map_err(|e| format!("Config error [{}]: {e}", e.code()))?;

    let mut scaler = config.loss_scaler();
    if !scaler.is_enabled() {
        log(level, LogLevel::Normal, "FP16 is disabled; loss scale fixed at 1");
    }
    let records = simulate(&mut scaler, &overflows);

    match args.format {
        OutputFormat::Text => {
            println!("{}", format_records(&records));
            if let Some(controller) = scaler.controller() {
                log(
                    level,
                    LogLevel::Normal,
                    &format!(
                        "\nSteps: {}  Overflows: {}  Skipped: {}  Final scale: {}",
                        controller.total_steps(),
                        controller.overflow_count(),
                        controller.skipped_steps(),
                        controller.scale()
                    ),
                );
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&records)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&records)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
