use std::collections::BTreeMap;
use std::fs;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use tg_core::pipeline::{AlertKind, TrackerAlert, NO_CONTEXT};
use tg_core::queue::QueueStats;
use tg_core::{CaptureEvent, ContextId, ReferenceTables, Tracker, TrackerConfig};

pub struct ReplayOptions {
    pub inputs: Vec<String>,
    pub quiet: bool,
}

#[derive(Debug, Default)]
pub struct ParsedEvents {
    /// Events per browsing context, in file order
    pub by_context: BTreeMap<ContextId, Vec<CaptureEvent>>,
    pub total: usize,
    pub skipped: usize,
}

/// Parse NDJSON capture events. Blank lines and `//` comments are ignored;
/// unparsable lines are skipped and counted.
pub fn parse_events(text: &str, source: &str, parsed: &mut ParsedEvents) {
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        match serde_json::from_str::<CaptureEvent>(line) {
            Ok(event) => {
                let context = event.context_id().unwrap_or(NO_CONTEXT);
                parsed.by_context.entry(context).or_default().push(event);
                parsed.total += 1;
            }
            Err(e) => {
                log::warn!("{source}:{}: skipping event: {e}", index + 1);
                parsed.skipped += 1;
            }
        }
    }
}

pub fn run_replay(config: &TrackerConfig, tables: ReferenceTables, opts: ReplayOptions) -> Result<(), String> {
    if opts.inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let mut parsed = ParsedEvents::default();
    for path in &opts.inputs {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        parse_events(&content, path, &mut parsed);
    }

    let (alert_tx, alert_rx) = mpsc::channel::<TrackerAlert>();
    let tracker = Tracker::open(config, tables, Box::new(alert_tx)).map_err(|e| format!("Failed to open store: {}", e))?;
    let tracker = Arc::new(tracker);

    if tracker.take_first_run().map_err(|e| format!("Failed to read store: {}", e))? {
        println!("First run against '{}'", config.database_path.display());
    }

    let start = Instant::now();
    let total = parsed.total;
    let contexts = parsed.by_context.len();

    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(feed_contexts(Arc::clone(&tracker), parsed.by_context))?;

    tracker.flush();
    let elapsed = start.elapsed();
    let stats = tracker.stats();

    if !opts.quiet {
        for alert in alert_rx.try_iter() {
            print_alert(&alert);
        }
    }

    print_stats(total, parsed.skipped, contexts, &stats, elapsed.as_secs_f64() * 1000.0);

    match Arc::try_unwrap(tracker) {
        Ok(tracker) => {
            tracker.close();
        }
        Err(_) => log::warn!("tracker still shared at exit; relying on drop to close"),
    }

    Ok(())
}

/// One producer task per browsing context, all enqueueing concurrently.
async fn feed_contexts(tracker: Arc<Tracker>, by_context: BTreeMap<ContextId, Vec<CaptureEvent>>) -> Result<(), String> {
    let mut tasks = Vec::with_capacity(by_context.len());

    for (context, events) in by_context {
        let tracker = Arc::clone(&tracker);
        tasks.push(tokio::spawn(async move {
            let count = events.len();
            for event in events {
                if !tracker.enqueue(event) {
                    return Err(format!("Queue closed while replaying context {}", context));
                }
                tokio::task::yield_now().await;
            }
            log::debug!("context {context}: enqueued {count} events");
            Ok(())
        }));
    }

    for task in tasks {
        task.await.map_err(|e| format!("Replay task failed: {}", e))??;
    }

    Ok(())
}

fn print_alert(alert: &TrackerAlert) {
    match &alert.kind {
        AlertKind::Blocklisted { description } => println!(
            "  [blocklist] {} on {} - {} (tld risk {})",
            alert.tracker, alert.first_party, description, alert.tld_risk
        ),
        AlertKind::AdHeuristic => println!(
            "  [ad]        {} on {} (tld risk {})",
            alert.tracker, alert.first_party, alert.tld_risk
        ),
    }
}

fn print_stats(total: usize, skipped: usize, contexts: usize, stats: &QueueStats, total_ms: f64) {
    println!("Replayed {} events from {} contexts", total, contexts);
    if skipped > 0 {
        println!("  Skipped:    {} unparsable lines", skipped);
    }
    println!("  Recorded:   {}", stats.recorded);
    println!("  Flagged:    {}", stats.flagged);
    println!("  Suppressed: {}", stats.suppressed);
    println!("  Discarded:  {}", stats.discarded);
    println!("  Failed:     {}", stats.failed);
    println!("  Time:       {:.1}ms", total_ms);
}
