//! # Custom Subscriber Example
//!
//! Shows how to implement a custom subscriber to track step metrics.
//!
//! The example counts:
//! - Steps started
//! - Streamed chunks
//! - Steps finished
//!
//! ## Run
//! ```bash
//! cargo run --example subscriber
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use steptrace::{StepEvent, StepKind, StepManager, StepPayload, StepState, Subscribe, branch};

#[derive(Default)]
struct MetricsSubscriber {
    starts: AtomicU64,
    chunks: AtomicU64,
    ends: AtomicU64,
}

impl MetricsSubscriber {
    fn print_stats(&self) {
        println!();
        println!("Metrics:");
        println!(" ├─► Starts: {}", self.starts.load(Ordering::Relaxed));
        println!(" ├─► Chunks: {}", self.chunks.load(Ordering::Relaxed));
        println!(" └─► Ends:   {}", self.ends.load(Ordering::Relaxed));
    }
}

impl Subscribe for MetricsSubscriber {
    fn on_event(&self, ev: &StepEvent) {
        let counter = match ev.kind().state() {
            StepState::Start => &self.starts,
            StepState::Chunk => &self.chunks,
            StepState::End => &self.ends,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "metrics"
    }
}

#[tokio::main]
async fn main() {
    let mgr = StepManager::new();
    let metrics = Arc::new(MetricsSubscriber::default());
    mgr.subscribe(metrics.clone());

    let workflow = StepPayload::new("wf-1", "answer_question", StepKind::WorkflowStart);
    mgr.push(workflow.clone());

    let calls: Vec<_> = (0..3)
        .map(|i| {
            let mgr = mgr.clone();
            branch::spawn(async move {
                let llm = StepPayload::new(format!("llm-{i}"), "chat", StepKind::LlmStart)
                    .with_input(json!(format!("question {i}")));
                mgr.push(llm.clone());
                for word in ["the", "answer", "is", "42"] {
                    mgr.push(llm.chunk(json!(word)));
                    tokio::task::yield_now().await;
                }
                mgr.push(llm.closing().with_output(json!("the answer is 42")));
            })
        })
        .collect();
    for call in calls {
        let _ = call.await;
    }

    mgr.push(workflow.closing());
    metrics.print_stats();
}
