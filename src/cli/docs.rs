//! Function reference for `datakit-pl funcs`.

use std::fmt::Write;

use super::CliError;
use crate::functions::{signature, FailurePolicy, FunctionTable};

/// One line per function: signature and summary.
pub fn functions_overview(table: &FunctionTable) -> String {
    let rows: Vec<(String, &str)> = table
        .iter()
        .map(|f| (signature(f.as_ref()), f.summary()))
        .collect();
    let width = rows.iter().map(|(sig, _)| sig.len()).max().unwrap_or(0);

    let mut out = String::from("PIPELINE FUNCTIONS\n\n");
    for (sig, summary) in &rows {
        let _ = writeln!(out, "  {:<width$}  {}", sig, summary, width = width);
    }
    out.push_str("\nRun 'datakit-pl funcs <name>' for details.\n");
    out
}

/// Detailed entry for one function.
pub fn function_doc(table: &FunctionTable, name: &str) -> Result<String, CliError> {
    let function = table
        .get(name)
        .ok_or_else(|| CliError::UnknownFunction(name.to_string()))?;

    let on_error = match function.policy() {
        FailurePolicy::FailFast => "runtime errors stop the run",
        FailurePolicy::BestEffort => "runtime errors are logged and the statement is skipped",
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", signature(function.as_ref()));
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", function.summary());
    let _ = writeln!(out);
    let _ = writeln!(out, "  On error: {}", on_error);
    Ok(out)
}
