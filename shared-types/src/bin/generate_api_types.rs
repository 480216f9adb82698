use shared_types::*;
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for API types
    let mut types = Vec::new();

    // Reimbursement types
    types.push(clean_type(ReimbursementRecord::export_to_string()?));
    types.push(clean_type(ReimbursementDetail::export_to_string()?));
    types.push(clean_type(MonthlySummary::export_to_string()?));
    types.push(clean_type(CreateReimbursementRequest::export_to_string()?));
    types.push(clean_type(UpdateReimbursementRequest::export_to_string()?));
    types.push(clean_type(DeleteReimbursementRequest::export_to_string()?));
    types.push(clean_type(ReimbursementsResponse::export_to_string()?));
    types.push(clean_type(ReimbursementDetailsResponse::export_to_string()?));
    types.push(clean_type(MonthlySummariesResponse::export_to_string()?));

    // Employee types
    types.push(clean_type(EmployeeInfo::export_to_string()?));
    types.push(clean_type(CreateEmployeeRequest::export_to_string()?));
    types.push(clean_type(EmployeesResponse::export_to_string()?));

    // Ledger types
    types.push(clean_type(RawLedgerItem::export_to_string()?));
    types.push(clean_type(NormalizedDetail::export_to_string()?));
    types.push(clean_type(AggregateEntry::export_to_string()?));

    // Sync types
    types.push(clean_type(SyncRequest::export_to_string()?));
    types.push(clean_type(SyncCounts::export_to_string()?));
    types.push(clean_type(SyncResponse::export_to_string()?));
    types.push(clean_type(LedgerTokenRequest::export_to_string()?));
    types.push(clean_type(LedgerTokenResponse::export_to_string()?));

    let output_dir = Path::new("../dashboard/src/api-types");
    fs::create_dir_all(output_dir)?;

    let output_path = output_dir.join("types.ts");
    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    let lines: Vec<&str> = type_def.lines().collect();
    let has_import = lines
        .iter()
        .any(|line| line.trim().starts_with("import type"));

    let filtered: Vec<&str> = lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            // Keep import lines only when a type genuinely references another file
            if trimmed.starts_with("import type") {
                return has_import;
            }
            !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .cloned()
        .collect();

    let result = filtered.join("\n").trim().to_string();
    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
