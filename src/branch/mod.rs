//! # Execution branches and their propagation.
//!
//! Every push is attributed to the *issuing branch*: the [`BranchContext`]
//! installed for the running tokio task, or, outside any such task scope, the
//! one owned by the current OS thread.
//!
//! ```text
//! current():   task-local (BranchContext::scope)    ──► found? use it
//!              thread-local set by BranchContext::enter ──► use it
//!              inside a plain tokio task            ──► private branch keyed by task id
//!              otherwise                            ──► thread-local (default root)
//! ```
//!
//! New branches start from a snapshot of the branch that creates them:
//! - [`spawn`]: tokio task, forked branch installed for the task's lifetime
//! - [`spawn_blocking`]: blocking pool closure, forked branch installed on that thread
//! - [`spawn_thread`]: OS thread, forked branch installed on that thread
//!
//! ## Rules
//! - Tasks spawned with plain `tokio::spawn` start from a fresh root, not
//!   from the spawner's stack; use [`spawn`] or [`BranchContext::scope`] to
//!   inherit it. Their private branch is dropped once nothing is open on it.
//!   Worker threads never share one stack between tasks.
//! - Inside a task scope, [`BranchContext::enter`] is shadowed by the task branch.

mod context;

pub use context::{BranchContext, BranchId, ROOT_ID};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::sync::LazyLock;

use parking_lot::Mutex;
use tokio::task::{Id as TaskId, JoinHandle};

tokio::task_local! {
    static TASK_BRANCH: RefCell<BranchContext>;
}

thread_local! {
    static THREAD_BRANCH: RefCell<BranchContext> = RefCell::new(BranchContext::root());
    /// Number of live `BranchContext::enter` guards on this thread.
    static ENTERED: Cell<usize> = const { Cell::new(0) };
}

/// Branches of tokio tasks spawned without a task-local branch.
///
/// Keyed globally since a task may move between worker threads.
static PLAIN_TASK_BRANCHES: LazyLock<Mutex<HashMap<TaskId, BranchContext>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Runs `f` against the issuing branch.
///
/// `f` must not push steps or call subscribers: the branch is mutably
/// borrowed for its duration.
pub(crate) fn with_current<R>(f: impl FnOnce(&mut BranchContext) -> R) -> R {
    if TASK_BRANCH.try_with(|_| ()).is_ok() {
        return TASK_BRANCH.with(|cell| f(&mut cell.borrow_mut()));
    }
    if ENTERED.with(Cell::get) == 0 {
        if let Some(task) = tokio::task::try_id() {
            return with_plain_task(task, f);
        }
    }
    THREAD_BRANCH.with(|cell| f(&mut cell.borrow_mut()))
}

/// Runs `f` against the private branch of a task spawned with plain `tokio::spawn`.
///
/// The branch is taken out of the map while `f` runs; a task is polled by one
/// thread at a time, so nobody else can ask for it meanwhile.
fn with_plain_task<R>(task: TaskId, f: impl FnOnce(&mut BranchContext) -> R) -> R {
    let taken = PLAIN_TASK_BRANCHES.lock().remove(&task);
    let mut branch = taken.unwrap_or_else(|| {
        let branch = BranchContext::root();
        tracing::trace!(task = %task, branch = %branch.id(), "fresh branch for plain tokio task");
        branch
    });
    let out = f(&mut branch);
    if branch.depth() > 0 {
        PLAIN_TASK_BRANCHES.lock().insert(task, branch);
    }
    out
}

/// Snapshot of the issuing branch (same [`BranchId`]).
pub fn current() -> BranchContext {
    with_current(|b| b.clone())
}

/// Snapshot of the issuing branch for a new concurrent branch.
pub fn fork() -> BranchContext {
    with_current(|b| b.fork())
}

impl BranchContext {
    /// Runs `fut` with this branch installed as its task-local branch.
    ///
    /// The branch persists across every `.await` inside `fut`.
    pub fn scope<F: Future>(self, fut: F) -> impl Future<Output = F::Output> {
        TASK_BRANCH.scope(RefCell::new(self), fut)
    }

    /// Runs `f` with this branch installed as the current thread's branch.
    ///
    /// The previous thread branch is restored afterwards, also on unwind.
    pub fn enter<R>(self, f: impl FnOnce() -> R) -> R {
        struct Restore(Option<BranchContext>);

        impl Drop for Restore {
            fn drop(&mut self) {
                if let Some(prev) = self.0.take() {
                    // try_with: the thread may be tearing down its locals
                    let _ = THREAD_BRANCH.try_with(|cell| *cell.borrow_mut() = prev);
                    let _ = ENTERED.try_with(|n| n.set(n.get().saturating_sub(1)));
                }
            }
        }

        let prev = THREAD_BRANCH.with(|cell| cell.replace(self));
        ENTERED.with(|n| n.set(n.get() + 1));
        let _restore = Restore(Some(prev));
        f()
    }
}

/// Spawns a tokio task on a fork of the issuing branch.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fork().scope(fut))
}

/// Runs blocking work on the tokio blocking pool on a fork of the issuing branch.
pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let branch = fork();
    tokio::task::spawn_blocking(move || branch.enter(f))
}

/// Spawns an OS thread on a fork of the issuing branch.
pub fn spawn_thread<F, R>(f: F) -> std::thread::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let branch = fork();
    std::thread::spawn(move || branch.enter(f))
}
