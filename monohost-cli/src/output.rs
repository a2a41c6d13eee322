use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::{app::GlobalOptions, host::InvocationReport};

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}

const INVOCATION_COLUMNS: [(&str, CellAlignment); 4] = [
    ("STRATEGY", CellAlignment::Left),
    ("METHOD", CellAlignment::Left),
    ("ARGUMENT", CellAlignment::Right),
    ("OBSERVED", CellAlignment::Right),
];

/// One row per managed call, borderless. `-` marks a call whose effect could not be observed.
pub fn invocation_table(invocations: &[InvocationReport]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(INVOCATION_COLUMNS.map(|(name, _)| name));

    for call in invocations {
        table.add_row(vec![
            call.strategy.clone(),
            call.method.clone(),
            call.argument.to_string(),
            call.observed.map_or_else(|| "-".to_string(), |value| value.to_string()),
        ]);
    }

    for (i, (_, align)) in INVOCATION_COLUMNS.iter().enumerate() {
        if let Some(column) = table.column_mut(i) {
            column.set_cell_alignment(*align);
            column.set_padding((u16::from(i != 0), 1));
        }
    }

    table
}

/// Prints `table` with every line prefixed by `indent`.
pub fn print_indented(table: &Table, indent: &str) {
    for line in table.to_string().lines() {
        println!("{indent}{}", line.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(strategy: &str, method: &str, observed: Option<f32>) -> InvocationReport {
        InvocationReport {
            method: method.to_string(),
            strategy: strategy.to_string(),
            argument: 5.0,
            observed,
        }
    }

    #[test]
    fn invocation_rows() {
        let table = invocation_table(&[
            call("runtime", "MyAssembly.AnotherClass::CalledViaRuntimeInvoke", Some(5.0)),
            call("thunk", "MyAssembly.AnotherClass::CalledViaUnmanagedThunk", None),
        ]);
        let text = table.to_string();
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("STRATEGY"));
        assert!(lines[0].ends_with("OBSERVED"));
        assert!(lines[1].starts_with("runtime"));
        assert!(lines[1].contains("CalledViaRuntimeInvoke"));
        assert!(lines[1].ends_with('5'));
        assert!(lines[2].starts_with("thunk"));
        assert!(lines[2].ends_with('-'));
    }

    #[test]
    fn empty_report_has_header_only() {
        let table = invocation_table(&[]);
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].trim_start().starts_with("STRATEGY"));
    }
}
