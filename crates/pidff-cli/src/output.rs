//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use serde::Serialize;
use serde_json::json;

use crate::commands::decode::DecodedReport;
use crate::commands::encode::EncodeSummary;
use crate::commands::fields::FieldListing;
use crate::error::CliError;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let kind = error
        .downcast_ref::<CliError>()
        .map_or("Unknown", error_type_name);
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": kind
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn error_type_name(error: &CliError) -> &'static str {
    match error {
        CliError::UnsupportedFormat(_) => "UnsupportedFormat",
        CliError::InvalidHex(_) => "InvalidHex",
        CliError::UnknownReport { .. } => "UnknownReport",
        CliError::IoError(_) => "IoError",
        CliError::JsonError(_) => "JsonError",
        CliError::YamlError(_) => "YamlError",
        CliError::Pidff(_) => "PidffError",
    }
}

fn print_json<T: Serialize>(payload: &T) -> Result<(), CliError> {
    let mut value = serde_json::to_value(payload)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("success".to_string(), json!(true));
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn print_field_listing(listing: &FieldListing, json: bool) -> Result<(), CliError> {
    if json {
        return print_json(listing);
    }

    println!("{}", "Reports:".bold());
    for report in &listing.reports {
        let name = report
            .report_usage
            .map_or_else(|| "unnamed".to_string(), |u| u.to_string());
        println!(
            "  {:<8} id {:>3}  {:>3} bytes  {}",
            report.kind.as_str(),
            report.report_id,
            report.byte_len(),
            name.cyan()
        );
    }

    println!("{}", "Fields:".bold());
    for field in &listing.fields {
        let name = field.member.unwrap_or(field.usage);
        let mut line = format!(
            "  {:<8} id {:>3}  bit {:>3}+{:<2} {}[{}]  {}..={}",
            field.kind.as_str(),
            field.report_id,
            field.bit_offset,
            field.bit_size,
            name,
            field.index,
            field.logical_min,
            field.logical_max
        );
        if field.is_selector() {
            let names: Vec<String> = field.selectors.iter().map(ToString::to_string).collect();
            line.push_str(&format!("  ({})", names.join(", ")));
        }
        println!("{line}");
    }

    let caps = &listing.capabilities;
    println!("{}", "Capabilities:".bold());
    println!(
        "  Pool: {}",
        if caps.device_managed_pool {
            "device-managed"
        } else {
            "host-managed"
        }
    );
    println!("  Effect types: {}", join_usages(&caps.effect_types));
    println!("  Axes: {}", join_usages(&caps.axes));
    println!("  Direction slots: {}", caps.direction_slots);
    println!("  Device controls: {}", join_usages(&caps.device_controls));
    if let Some((min, max)) = caps.block_index_range {
        println!("  Block indices: {min}..={max}");
    }
    Ok(())
}

pub fn print_encode_summary(summary: &EncodeSummary, json: bool) -> Result<(), CliError> {
    if json {
        return print_json(summary);
    }

    println!(
        "{} {} ({:?}, {})",
        "Effect:".bold(),
        summary.effect_type.cyan(),
        summary.pool_mode,
        summary.lifecycle
    );
    if summary.reports.is_empty() {
        println!("{}", "No reports sent".yellow());
        return Ok(());
    }
    for report in &summary.reports {
        println!(
            "  {:<11} {:<28} {}",
            report.transfer,
            report.report,
            report.data.green()
        );
    }
    Ok(())
}

pub fn print_decoded_report(decoded: &DecodedReport, json: bool) -> Result<(), CliError> {
    if json {
        return print_json(decoded);
    }

    println!(
        "{} {} id {} {}",
        "Report:".bold(),
        decoded.kind.as_str(),
        decoded.report_id,
        decoded.report.as_deref().unwrap_or("unnamed").cyan()
    );
    for field in &decoded.fields {
        match &field.selected {
            Some(selected) => println!("  {}[{}] = {}", field.name, field.index, selected),
            None if i64::from(field.logical) == field.value => {
                println!("  {}[{}] = {}", field.name, field.index, field.logical);
            }
            None => println!(
                "  {}[{}] = {} (logical {})",
                field.name, field.index, field.value, field.logical
            ),
        }
    }
    if let Some(state) = &decoded.state {
        println!("{} {}", "State:".bold(), state.join(" | ").green());
    }
    Ok(())
}

fn join_usages(usages: &[openracing_pidff_common::Usage]) -> String {
    if usages.is_empty() {
        return "none".to_string();
    }
    usages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
