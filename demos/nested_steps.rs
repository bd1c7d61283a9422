//! # Nested steps across tasks and threads
//!
//! Opens a workflow, runs a blocking tool call on the blocking pool and two
//! concurrent model calls, then prints the reconstructed call tree.
//!
//! ## Run
//! ```bash
//! cargo run --example nested_steps --features logging
//! ```

use std::sync::Arc;

use steptrace::{
    CallNode, CallTree, LogWriter, StepKind, StepManager, StepPayload, branch,
};

fn print_node(node: &CallNode, depth: usize) {
    let status = if node.is_closed() { "done" } else { "open" };
    println!("{}{} ({}, {status})", "  ".repeat(depth), node.name, node.kind);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let mgr = StepManager::new();
    mgr.subscribe(Arc::new(LogWriter));

    let workflow = StepPayload::new("wf", "workflow", StepKind::WorkflowStart);

    let ((), events) = mgr
        .collect_async(async {
            mgr.push(workflow.clone());

            let sync_mgr = mgr.clone();
            let tool = branch::spawn_blocking(move || {
                let call = StepPayload::new("tool-1", "lookup", StepKind::ToolStart);
                sync_mgr.push(call.clone());
                sync_mgr.push(call.closing());
            });
            let _ = tool.await;

            let llms: Vec<_> = ["draft", "review"]
                .into_iter()
                .map(|name| {
                    let mgr = mgr.clone();
                    branch::spawn(async move {
                        let call = StepPayload::new(name, name, StepKind::LlmStart);
                        mgr.push(call.clone());
                        tokio::task::yield_now().await;
                        mgr.push(call.closing());
                    })
                })
                .collect();
            for llm in llms {
                let _ = llm.await;
            }

            mgr.push(workflow.closing());
        })
        .await;

    println!();
    for root in &CallTree::from_events(&events).roots {
        print_node(root, 0);
    }
}
