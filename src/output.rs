//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines, so the
//! layout is unit-testable; the `print_*` wrappers only write them out.
//!
//! # Output Format
//!
//! ## Engine events
//!
//! ```text
//! Network: connected
//! Attempt 1/2
//!     Failed: Request timed out. The server may be starting up. Please try again.
//!     Retrying now
//! Attempt 2/2
//! Done after 2 attempts
//! ```
//!
//! ## Analysis report
//!
//! ```text
//! Coin Analysis Complete
//!
//! Basic Information
//!     First Released Year: 1943
//!     Country: United States
//!     Denomination: 1 Cent
//!     Composition: Zinc-coated steel
//!
//! Value Assessment
//!     Collector Value: $0.10 - $0.50
//!     Rarity: Common
//!
//! Description
//!     Lincoln wheat cent struck in steel ...
//!
//! Historical Context
//!     Copper was reserved for ammunition in 1943.
//!
//! Technical Details
//!     Mint Mark: D
//!     Rarity: Common
//!     Diameter: 19.1 mm
//! ```
//!
//! An unknown-analysis result prints the guidance text instead of sections.

use crate::engine::{EngineEvent, Reachability};
use crate::error::AnalysisError;
use crate::imaging::UploadPlan;
use crate::model::AnalysisResult;
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn field(label: &str, value: &str) -> String {
    format!("{}{label}: {value}", indent(1))
}

fn section(lines: &mut Vec<String>, title: &str, body: Vec<String>) {
    lines.push(String::new());
    lines.push(title.to_string());
    lines.extend(body);
}

fn format_delay(delay: Duration) -> String {
    if delay.is_zero() {
        "now".to_string()
    } else {
        format!("in {}s", delay.as_secs_f64())
    }
}

// ============================================================================
// Engine events
// ============================================================================

/// Format a single engine progress event as display lines.
pub fn format_event(event: &EngineEvent) -> Vec<String> {
    match event {
        EngineEvent::ConnectivityChecked { connected } => {
            let state = if *connected { "connected" } else { "offline" };
            vec![format!("Network: {state}")]
        }
        EngineEvent::AttemptStarted { attempt, total } => {
            vec![format!("Attempt {attempt}/{total}")]
        }
        EngineEvent::AttemptFailed {
            error, retry_in, ..
        } => {
            let mut lines = vec![format!("{}Failed: {error}", indent(1))];
            if let Some(delay) = retry_in {
                lines.push(format!("{}Retrying {}", indent(1), format_delay(*delay)));
            }
            lines
        }
        EngineEvent::UnknownAnalysis { retry_in, .. } => vec![
            format!("{}Coin not identified", indent(1)),
            format!("{}Retrying {}", indent(1), format_delay(*retry_in)),
        ],
        EngineEvent::Completed { attempts, .. } => {
            let noun = if *attempts == 1 { "attempt" } else { "attempts" };
            vec![format!("Done after {attempts} {noun}")]
        }
        EngineEvent::OperationTimedOut { after } => {
            vec![format!("Gave up after {}s", after.as_secs())]
        }
    }
}

// ============================================================================
// Analysis results
// ============================================================================

/// Format an analysis as a sectioned report, or the guidance text when the
/// coin was not identified.
pub fn format_result(result: &AnalysisResult) -> Vec<String> {
    if let Some(message) = result.unknown_analysis_message() {
        let mut lines = vec!["Coin Not Identified".to_string(), String::new()];
        lines.extend(message.lines().map(str::to_string));
        return lines;
    }

    let mut lines = vec!["Coin Analysis Complete".to_string()];
    let basic = &result.basic_info;
    section(
        &mut lines,
        "Basic Information",
        vec![
            field("First Released Year", &basic.released_year),
            field("Country", &basic.country),
            field("Denomination", &basic.denomination),
            field("Composition", &basic.composition),
        ],
    );
    section(
        &mut lines,
        "Value Assessment",
        vec![
            field("Collector Value", &result.value_assessment.collector_value),
            field("Rarity", &result.value_assessment.rarity),
        ],
    );
    section(
        &mut lines,
        "Description",
        vec![format!("{}{}", indent(1), result.description)],
    );
    section(
        &mut lines,
        "Historical Context",
        vec![format!("{}{}", indent(1), result.historical_context)],
    );

    let technical = &result.technical_details;
    let mut details = Vec::new();
    if let Some(mint_mark) = &technical.mint_mark {
        details.push(field("Mint Mark", mint_mark));
    }
    details.push(field("Rarity", &technical.rarity));
    if technical.has_diameter() {
        details.push(field("Diameter", &technical.formatted_diameter()));
    }
    section(&mut lines, "Technical Details", details);
    lines
}

/// Format a failed call; offers a retry hint where one makes sense.
pub fn format_error(error: &AnalysisError) -> Vec<String> {
    let mut lines = vec![format!("Error: {error}")];
    if error.offers_retry() {
        lines.push(format!("{}Run the command again to retry.", indent(1)));
    }
    lines
}

// ============================================================================
// Diagnostics
// ============================================================================

pub fn format_reachability(base_url: &str, reachability: &Reachability) -> Vec<String> {
    let verdict = if reachability.is_reachable() {
        "reachable"
    } else {
        "not reachable"
    };
    vec![format!(
        "{base_url} {verdict} (HTTP {})",
        reachability.status
    )]
}

/// Format the result of `prepare`: source size, upload size, output file.
pub fn format_prepared(plan: &UploadPlan, bytes: usize, output: &str) -> Vec<String> {
    let action = if plan.needs_resize() {
        "resized"
    } else {
        "kept size"
    };
    vec![
        format!(
            "{}x{} \u{2192} {}x{} ({action}, quality {})",
            plan.source_width,
            plan.source_height,
            plan.width,
            plan.height,
            plan.quality.value()
        ),
        format!("{}{bytes} bytes \u{2192} {output}", indent(1)),
    ]
}

// ============================================================================
// Printers
// ============================================================================

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_event(event: &EngineEvent) {
    print_lines(format_event(event));
}

pub fn print_result(result: &AnalysisResult) {
    print_lines(format_result(result));
}

pub fn print_error(error: &AnalysisError) {
    for line in format_error(error) {
        eprintln!("{}", line);
    }
}

pub fn print_reachability(base_url: &str, reachability: &Reachability) {
    print_lines(format_reachability(base_url, reachability));
}

pub fn print_prepared(plan: &UploadPlan, bytes: usize, output: &str) {
    print_lines(format_prepared(plan, bytes, output));
}
