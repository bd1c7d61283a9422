//! Anomalies are logged and degrade to best-effort events.

use std::io;
use std::sync::{Arc, Mutex};

use steptrace::{Config, StepKind, StepManager, StepPayload, branch};
use tracing::subscriber::DefaultGuard;

/// In-memory log sink shared with the fmt subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_lowercase()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (Captured, DefaultGuard) {
    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    (sink, tracing::subscriber::set_default(subscriber))
}

#[test]
fn chunk_without_start_warns_and_changes_nothing() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::new();
    mgr.push(StepPayload::new("outer", "outer", StepKind::FunctionStart));
    let before: Vec<String> = branch::current().open_ids().map(str::to_string).collect();

    let ((), events) = mgr.collect(|| {
        mgr.push(StepPayload::new("orphan", "orphan", StepKind::LlmNewToken));
    });

    assert!(logs.text().contains("no matching start step"));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].parent_id(), Some("outer"));
    assert_eq!(mgr.outstanding().open_ids(), vec!["outer".to_string()]);
    let after: Vec<String> = branch::current().open_ids().map(str::to_string).collect();
    assert_eq!(before, after);

    mgr.push(StepPayload::new("outer", "outer", StepKind::FunctionEnd));
}

#[test]
fn end_without_start_warns() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::new();

    let ((), events) = mgr.collect(|| {
        mgr.push(StepPayload::new("ghost", "ghost", StepKind::ToolEnd));
    });

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].parent_id(), Some("root"));
    let text = logs.text();
    assert!(text.contains("no matching start step"));
    assert!(text.contains("ghost"));
}

#[test]
fn second_start_for_open_id_warns() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::new();
    let step = StepPayload::new("dup", "dup", StepKind::TaskStart);

    mgr.push(step.clone());
    mgr.push(step.clone());

    assert!(logs.text().contains("opened twice"));
    assert_eq!(mgr.outstanding().len(), 1);
    assert_eq!(branch::current().depth(), 1);

    mgr.push(step.closing());
    assert_eq!(branch::current().depth(), 0);
}

#[test]
fn subscriber_panic_is_logged_with_its_name() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::new();
    mgr.subscribe_fn("fragile", |_| panic!("listener exploded"));

    let step = StepPayload::new("s", "s", StepKind::SpanStart);
    let ((), events) = mgr.collect(|| {
        mgr.push(step.clone());
        mgr.push(step.closing());
    });

    assert_eq!(events.len(), 2);
    let text = logs.text();
    assert!(text.contains("fragile"));
    assert!(text.contains("listener exploded"));
    assert_eq!(mgr.bus().panics(), 2);
}

#[test]
fn outstanding_watermark_warns_without_evicting() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::with_config(Config {
        outstanding_warn_at: 3,
        ..Config::default()
    });

    let steps: Vec<_> = (0..3)
        .map(|i| StepPayload::new(format!("s{i}"), "s", StepKind::CustomStart))
        .collect();
    for s in &steps {
        mgr.push(s.clone());
    }

    assert!(logs.text().contains("watermark"));
    assert_eq!(mgr.outstanding().len(), 3);

    for s in steps.iter().rev() {
        mgr.push(s.closing());
    }
    assert!(mgr.outstanding().is_empty());
}

#[test]
fn log_events_traces_every_push() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::with_config(Config {
        log_events: true,
        ..Config::default()
    });
    let step = StepPayload::new("traced", "traced", StepKind::WorkflowStart);
    mgr.push(step.clone());
    mgr.push(step.closing());

    let text = logs.text();
    assert!(text.contains("workflow_start"));
    assert!(text.contains("workflow_end"));
}

#[cfg(feature = "logging")]
#[test]
fn log_writer_reports_ancestry() {
    let (logs, _guard) = capture_logs();
    let mgr = StepManager::new();
    mgr.subscribe(Arc::new(steptrace::LogWriter));

    let outer = StepPayload::new("outer-id", "outer", StepKind::FunctionStart);
    let inner = StepPayload::new("inner-id", "inner", StepKind::ToolStart);
    mgr.push(outer.clone());
    mgr.push(inner.clone());
    mgr.push(inner.closing());
    mgr.push(outer.closing());

    let text = logs.text();
    assert!(text.contains("[start]"));
    assert!(text.contains("parent_id=\"outer-id\"") || text.contains("parent_id=outer-id"));
}
