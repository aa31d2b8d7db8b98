//! Debug utilities for compiled equations
//!
//! Tools for inspecting sequences before and after optimization.

use super::ir::{Info, IntegerSequence, Sequence, VarId, VariableTable};
use super::optimizer::OptimizeStats;

fn operand(vars: &VariableTable, id: VarId) -> String {
    match vars.get(id) {
        Some(var) => match var.sequence() {
            Some(seq) => format_range(vars, seq),
            None if var.is_literal() => var.operand().to_string(),
            None => var.name.clone(),
        },
        None => id.to_string(),
    }
}

/// Format an integer sequence the way it is written in an equation
pub fn format_range(vars: &VariableTable, seq: &IntegerSequence) -> String {
    let name = |id: &VarId| operand(vars, *id);
    match seq {
        IntegerSequence::Explicit(items) => {
            format!("[{}]", items.iter().map(name).collect::<Vec<_>>().join(","))
        }
        IntegerSequence::For { start, step, end } => match step {
            Some(step) => format!("{}:{}:{}", name(start), name(step), name(end)),
            None => format!("{}:{}", name(start), name(end)),
        },
        IntegerSequence::Range { start, step } => match (start, step) {
            (None, None) => ":".to_string(),
            (Some(start), None) => format!("{}:", name(start)),
            (start, Some(step)) => format!(
                "{}:{}:",
                start.as_ref().map_or_else(|| "0".to_string(), name),
                name(step)
            ),
        },
        IntegerSequence::Combined(parts) => format!(
            "[{}]",
            parts
                .iter()
                .map(|p| format_range(vars, p))
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}

/// Format a single instruction, e.g. `tm1 = multiply-mm(A, tm0)`
pub fn format_instruction(info: &Info, vars: &VariableTable) -> String {
    let mut target = info
        .output
        .map_or_else(|| "_".to_string(), |id| operand(vars, id));
    let mut args: Vec<String> = info.inputs.iter().map(|id| operand(vars, *id)).collect();
    if let Some(range) = &info.range {
        let dims: Vec<String> = range.iter().map(|id| operand(vars, *id)).collect();
        let dims = format!("({})", dims.join(","));
        if info.primitive == super::ir::Primitive::Copy {
            target.push_str(&dims);
        } else if let Some(first) = args.first_mut() {
            first.push_str(&dims);
        }
    }
    if let Some(constructor) = &info.constructor {
        let rows: Vec<String> = constructor
            .rows
            .iter()
            .map(|row| row.iter().map(|id| operand(vars, *id)).collect::<Vec<_>>().join(", "))
            .collect();
        args.push(format!("[{}]", rows.join("; ")));
    }
    format!("{} = {}({})", target, info.op_name(), args.join(", "))
}

/// Format a whole sequence, one numbered instruction per line
pub fn format_sequence(sequence: &Sequence, vars: &VariableTable) -> String {
    sequence
        .iter()
        .enumerate()
        .map(|(i, info)| format!("{:04}: {}\n", i, format_instruction(info, vars)))
        .collect()
}

/// Print a sequence in human-readable format
pub fn dump_sequence(sequence: &Sequence, vars: &VariableTable) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    SEQUENCE DUMP");
    println!("═══════════════════════════════════════════════════════════");
    println!(
        "Output: {}",
        sequence
            .output
            .map_or_else(|| "none".to_string(), |id| operand(vars, id))
    );
    println!("Temporaries: {}", sequence.temporaries(vars).len());
    println!("───────────────────────────────────────────────────────────");
    print!("{}", format_sequence(sequence, vars));
    println!("═══════════════════════════════════════════════════════════\n");
}

/// Print an optimizer report
pub fn dump_stats(stats: &OptimizeStats) {
    println!(
        "instructions {} -> {}, temporaries {} -> {}, constants folded {}, trailing copy {}",
        stats.instructions_before,
        stats.instructions_after,
        stats.temporaries_before.total(),
        stats.temporaries_after.total(),
        stats.removed_constants,
        if stats.trailing_copy_removed { "removed" } else { "kept" }
    );
}
