//! Markdown Renderer: a pure function turning an assembled
//! `Bundle` into the stable markdown layout callers display or log.
//!
//! Section order is fixed: Header, Evidence, Stopping reasons, Token
//! report, Content. Rows within each table are sorted by a stable key
//! so the same `Bundle` always renders to the same bytes, independent
//! of any incidental ordering upstream components happened to produce.

use pampax_core::{Bundle, BundleItem, ItemRef, PackAction, Severity};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Render `bundle` as markdown. `query` and `model` are passed in
/// separately because `Bundle` itself does not retain the request that
/// produced it. `generated_at` is supplied by the caller rather than
/// read from the clock here, keeping this function pure.
pub fn render(
    bundle: &Bundle,
    query: &str,
    model: &str,
    generated_at: chrono::DateTime<chrono::Utc>,
) -> String {
    let mut out = String::new();

    write_header(&mut out, bundle, query, model, generated_at);
    write_evidence_table(&mut out, bundle);
    write_stopping_reasons(&mut out, bundle);
    write_token_report(&mut out, bundle);
    write_content(&mut out, bundle);

    out
}

fn write_header(
    out: &mut String,
    bundle: &Bundle,
    query: &str,
    model: &str,
    generated_at: chrono::DateTime<chrono::Utc>,
) {
    let _ = writeln!(out, "# Context Bundle — {query}");
    let _ = writeln!(out, "_Generated {}_", generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "| Field | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Query | {query} |");
    let _ = writeln!(out, "| Budget | {} |", bundle.budget);
    let _ = writeln!(out, "| Tokens used | {} |", bundle.total_tokens);
    let _ = writeln!(out, "| Model | {model} |");
    let _ = writeln!(out, "| Intent | {:?} |", bundle.intent);
    let _ = writeln!(
        out,
        "| Cache hits/misses/stale | {}/{}/{} |",
        bundle.cache_stats.hits, bundle.cache_stats.misses, bundle.cache_stats.stale_served
    );
    let _ = writeln!(out);
}

fn write_evidence_table(out: &mut String, bundle: &Bundle) {
    let _ = writeln!(out, "## Evidence");
    let _ = writeln!(out);
    let _ = writeln!(out, "| file | symbol | reason | edge type | rank | cached |");
    let _ = writeln!(out, "|---|---|---|---|---|---|");

    let items_by_ref: HashMap<ItemRef, &BundleItem> =
        bundle.items.iter().map(|i| (i.item_ref(), i)).collect();

    let mut rows = bundle.evidence.clone();
    rows.sort_by(|a, b| item_ref_key(a.item_id).cmp(&item_ref_key(b.item_id)));

    for record in &rows {
        let (file, symbol) = match items_by_ref.get(&record.item_id) {
            Some(BundleItem::Span(span)) => {
                (span.path.clone(), span.name.clone().unwrap_or_default())
            }
            Some(BundleItem::Memory(item)) => ("(memory)".to_string(), item.id.to_string()),
            None => ("?".to_string(), "?".to_string()),
        };
        let edge_type = record
            .edge_kind
            .map(|k| format!("{k:?}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "| {file} | {symbol} | {} | {edge_type} | {} | {} |",
            record.reason, record.rank, record.cached
        );
    }
    let _ = writeln!(out);
}

fn write_stopping_reasons(out: &mut String, bundle: &Bundle) {
    let _ = writeln!(out, "## Stopping Reasons");
    let _ = writeln!(out);
    let _ = writeln!(out, "| kind | severity | explanation |");
    let _ = writeln!(out, "|---|---|---|");

    let mut reasons = bundle.stopping_reasons.clone();
    reasons.sort_by(|a, b| {
        severity_rank(b.severity)
            .cmp(&severity_rank(a.severity))
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
    });

    for reason in &reasons {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            reason.kind.as_str(),
            severity_label(reason.severity),
            reason.explanation
        );
    }
    let _ = writeln!(out);
}

fn write_token_report(out: &mut String, bundle: &Bundle) {
    let kept = bundle
        .evidence
        .iter()
        .filter(|e| e.action == PackAction::Kept)
        .count();
    let degraded = bundle
        .evidence
        .iter()
        .filter(|e| e.action == PackAction::Degraded)
        .count();
    let dropped = bundle
        .evidence
        .iter()
        .filter(|e| e.action == PackAction::Dropped)
        .count();

    let _ = writeln!(out, "## Token Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "| kept | degraded | dropped | total tokens | budget |");
    let _ = writeln!(out, "|---|---|---|---|---|");
    let _ = writeln!(
        out,
        "| {kept} | {degraded} | {dropped} | {} | {} |",
        bundle.total_tokens, bundle.budget
    );
    let _ = writeln!(out);
}

fn write_content(out: &mut String, bundle: &Bundle) {
    let _ = writeln!(out, "## Content");
    let _ = writeln!(out);

    let mut items: Vec<&BundleItem> = bundle.items.iter().collect();
    items.sort_by(|a, b| item_ref_key(a.item_ref()).cmp(&item_ref_key(b.item_ref())));

    for item in items {
        match item {
            BundleItem::Span(span) => {
                let _ = writeln!(
                    out,
                    "### {} ({})",
                    span.name.as_deref().unwrap_or("<anonymous>"),
                    span.path
                );
                let _ = writeln!(out, "```");
                let _ = writeln!(out, "{}", span.content);
                let _ = writeln!(out, "```");
                let _ = writeln!(out);
            }
            BundleItem::Memory(mem) => {
                let _ = writeln!(out, "### memory:{}", mem.id);
                let _ = writeln!(out, "> {}", mem.text);
                let _ = writeln!(out);
            }
        }
    }
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::High => 2,
        Severity::Med => 1,
        Severity::Low => 0,
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Med => "med",
        Severity::High => "high",
    }
}

fn item_ref_key(item_ref: ItemRef) -> String {
    match item_ref {
        ItemRef::Span(id) => format!("span:{id}"),
        ItemRef::Memory(id) => format!("memory:{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pampax_core::{
        CacheStats, Evidence, Policy, ProducerSource, ScoreBreakdown, Span, SpanId, SpanKind,
        StopCondition, StopKind,
    };

    fn sample_span(name: &str) -> Span {
        Span {
            id: SpanId::now_v7(),
            repo: "repo".into(),
            path: "src/lib.rs".into(),
            byte_start: 0,
            byte_end: 1,
            kind: SpanKind::Function,
            name: Some(name.to_string()),
            signature: Some(format!("fn {name}()")),
            doc: None,
            parents: vec![],
            references: vec![],
            content: format!("fn {name}() {{}}"),
        }
    }

    fn sample_bundle() -> Bundle {
        let span = sample_span("getUserById");
        let item_ref = pampax_core::ItemRef::Span(span.id);
        Bundle {
            items: vec![BundleItem::Span(span)],
            total_tokens: 42,
            budget: 1000,
            intent: pampax_core::Intent::Symbol,
            policy: Policy::default_for(pampax_core::Intent::Symbol),
            evidence: vec![Evidence {
                item_id: item_ref,
                reason: "ranked-by-sym".into(),
                edge_kind: None,
                rank: 0,
                source: ProducerSource::Sym,
                cached: false,
                score_breakdown: ScoreBreakdown {
                    fused: 0.9,
                    components: vec![(ProducerSource::Sym, 0.9)],
                },
                tokens: 42,
                action: PackAction::Kept,
            }],
            stopping_reasons: vec![StopCondition {
                kind: StopKind::CompletedNormally,
                severity: Severity::Low,
                phase: pampax_core::AssemblyPhase::Explain,
                title: "Completed normally".into(),
                explanation: "All phases completed without degradation.".into(),
                recommendation: "None needed.".into(),
                tokens_used: 42,
                tokens_budget: 1000,
                items_considered: 1,
                items_kept: 1,
                producer: None,
            }],
            cache_stats: CacheStats::default(),
        }
    }

    #[test]
    fn renders_fixed_section_order() {
        let bundle = sample_bundle();
        let timestamp = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let markdown = render(&bundle, "getUserById function", "default", timestamp);

        let header_pos = markdown.find("# Context Bundle").unwrap();
        let evidence_pos = markdown.find("## Evidence").unwrap();
        let stopping_pos = markdown.find("## Stopping Reasons").unwrap();
        let token_pos = markdown.find("## Token Report").unwrap();
        let content_pos = markdown.find("## Content").unwrap();

        assert!(header_pos < evidence_pos);
        assert!(evidence_pos < stopping_pos);
        assert!(stopping_pos < token_pos);
        assert!(token_pos < content_pos);
    }

    #[test]
    fn evidence_table_contains_symbol_and_file() {
        let bundle = sample_bundle();
        let timestamp = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let markdown = render(&bundle, "q", "default", timestamp);
        assert!(markdown.contains("getUserById"));
        assert!(markdown.contains("src/lib.rs"));
    }

    #[test]
    fn render_is_deterministic_for_the_same_bundle() {
        let bundle = sample_bundle();
        let timestamp = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let first = render(&bundle, "q", "default", timestamp);
        let second = render(&bundle, "q", "default", timestamp);
        assert_eq!(first, second);
    }
}
