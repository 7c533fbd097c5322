// src/utils/log.rs

//! Console-style progress lines routed through the `log` facade.
//!
//! Stages announce themselves with `header`/`step` and close with a
//! `summary`; everything lands at `info` level so `RUST_LOG` filters it
//! like any other record.

const RULE_WIDTH: usize = 60;

/// Log a banner around `title`.
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    ::log::info!("{border}");
    ::log::info!("  {title}");
    ::log::info!("{border}");
}

/// Log step `n` of `total`.
pub fn step(n: usize, total: usize, message: &str) {
    ::log::info!("{}", step_line(n, total, message));
}

/// Log an indented detail line.
pub fn sub_item(message: &str) {
    ::log::info!("    {message}");
}

/// Log a titled block of key/value lines.
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {title}");
    for line in summary_lines(items) {
        ::log::info!("{line}");
    }
}

fn step_line(n: usize, total: usize, message: &str) -> String {
    format!("[STEP {n}/{total}] {message}")
}

fn summary_lines(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("    {key:<width$} : {value}"))
        .collect()
}
