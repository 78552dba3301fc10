use std::fmt::Write;

use crate::copy::CopyField;
use crate::pipeline::{ChannelReport, GenerationReport};

/// Plain-text rendering of a report for the terminal.
pub fn render_report(report: &GenerationReport) -> String {
    let mut out = String::new();
    let r = &report.reference;
    let _ = writeln!(out, "Reference: {} ({}x{})", r.name, r.width, r.height);
    let _ = writeln!(out, "Run: {}", report.run_id);

    for ch in &report.channels {
        out.push('\n');
        render_channel(&mut out, ch);
    }

    let _ = writeln!(out, "\n== Generated Product Copy ==");
    for field in CopyField::ALL {
        let _ = writeln!(out, "\n#### {}", field.heading());
        let _ = writeln!(out, "{}", report.copy.display(field));
    }
    out
}

fn render_channel(out: &mut String, ch: &ChannelReport) {
    let _ = writeln!(out, "== {} images ==", ch.channel.display_name());
    if let Some(persona) = &ch.persona {
        let _ = writeln!(out, "Persona: {persona}");
    }
    if let Some(w) = &ch.warning {
        let _ = writeln!(out, "WARNING: {w}");
    }
    if ch.images.is_empty() || ch.columns == 0 {
        return;
    }
    for row in ch.images.chunks(ch.columns) {
        let cells: Vec<String> = row
            .iter()
            .map(|o| match (&o.url, &o.error) {
                (Some(url), _) => format!("Concept {}: {url}", o.index + 1),
                (None, Some(err)) => format!("ERROR {err}"),
                (None, None) => format!("Concept {}: -", o.index + 1),
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("  |  "));
    }
}
