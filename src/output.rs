//! Terminal output primitives and the interactive sink.

use flow_executor::OutputSink;
use questline_core_types::{ExecutionResult, Flow};
use serde::Serialize;
use std::io::{self, Write};

pub fn message(text: &str) {
    println!("{text}");
}

pub fn error(text: &str) {
    eprintln!("error: {text}");
}

pub fn json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => error(&format!("cannot render JSON: {err}")),
    }
}

/// Plain fixed-width table.
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", render(headers.to_vec()));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for row in rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }
}

/// One-paragraph flow summary used by `explain` and post-discovery output.
pub fn flow_summary(flow: &Flow) {
    println!("{} [{}]  ({})", flow.name, flow.id, flow.category);
    if !flow.description.is_empty() {
        println!("  {}", flow.description);
    }
    println!(
        "  confidence {:.0}%, {} steps, updated {}",
        flow.confidence * 100.0,
        flow.steps.len(),
        flow.last_updated.format("%Y-%m-%d %H:%M UTC")
    );
    for (i, step) in flow.steps.iter().enumerate() {
        let mut line = format!("  {}. {}", i + 1, step.describe());
        if let Some(expect) = step.expect.describe() {
            line.push_str(&format!("  => {expect}"));
        }
        println!("{line}");
    }
}

pub fn run_result(flow: &Flow, result: &ExecutionResult) {
    if result.success {
        println!(
            "PASS  {} - {}/{} steps in {:.1}s",
            flow.id,
            result.steps_run,
            result.steps_total,
            result.duration.as_secs_f64()
        );
    } else {
        println!(
            "FAIL  {} - {}/{} steps in {:.1}s",
            flow.id,
            result.steps_run,
            result.steps_total,
            result.duration.as_secs_f64()
        );
        if let Some(err) = &result.error {
            println!("      {err}");
        }
    }
    if let Some(artifact) = &result.artifact {
        println!("      artifact: {}", artifact.display());
    }
}

/// Interactive sink writing progress to stdout and prompting on stdin.
#[derive(Default)]
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn message(&mut self, text: &str) {
        println!("{text}");
    }

    fn step_started(&mut self, index: usize, total: usize, label: &str) {
        println!("[{index}/{total}] {label}");
    }

    fn step_finished(&mut self, _index: usize, success: bool, detail: Option<&str>) {
        match (success, detail) {
            (true, _) => {}
            (false, Some(detail)) => println!("      failed: {detail}"),
            (false, None) => println!("      failed"),
        }
    }

    fn prompt(&mut self, variable: &str) -> Option<String> {
        print!("value for {variable}? ");
        if io::stdout().flush().is_err() {
            return None;
        }
        let mut answer = String::new();
        match io::stdin().read_line(&mut answer) {
            Ok(0) => None,
            Ok(_) => {
                let answer = answer.trim();
                if answer.is_empty() {
                    None
                } else {
                    Some(answer.to_string())
                }
            }
            Err(_) => None,
        }
    }
}
