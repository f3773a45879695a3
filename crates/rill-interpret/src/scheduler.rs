//! Cooperative single-threaded task scheduling.
//!
//! Futures live in a [`FutureTable`]; each slot moves from `Pending` to
//! `Resolved` or `Failed` exactly once and keeps the tasks waiting on it.
//! The [`Scheduler`] owns task records and a FIFO ready queue. It does not
//! know how a task body runs: the interpreter takes a ready task out, drives
//! it until it completes, fails or suspends on a future, and hands it back.

use crate::error::RuntimeError;
use crate::value::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FutureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Payload of a failed future and the line where the failure started.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub error: Value,
    pub line: u32,
}

impl Failure {
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn into_runtime_error(self) -> RuntimeError {
        RuntimeError::new(self.message(), self.line)
    }
}

impl From<RuntimeError> for Failure {
    fn from(err: RuntimeError) -> Self {
        Failure {
            error: Value::string(err.message),
            line: err.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FutureState {
    Pending,
    Resolved(Value),
    Failed(Failure),
}

impl FutureState {
    pub fn label(&self) -> &'static str {
        match self {
            FutureState::Pending => "pending",
            FutureState::Resolved(_) => "resolved",
            FutureState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
struct FutureSlot {
    state: FutureState,
    waiters: Vec<TaskId>,
    /// Whether anything awaited or inspected the outcome.
    observed: bool,
}

#[derive(Debug, Default)]
pub struct FutureTable {
    slots: Vec<FutureSlot>,
}

impl FutureTable {
    pub fn create(&mut self) -> FutureId {
        self.slots.push(FutureSlot {
            state: FutureState::Pending,
            waiters: Vec::new(),
            observed: false,
        });
        FutureId(self.slots.len() as u32 - 1)
    }

    pub fn state(&self, id: FutureId) -> Option<&FutureState> {
        self.slots.get(id.0 as usize).map(|slot| &slot.state)
    }

    pub fn is_pending(&self, id: FutureId) -> bool {
        matches!(self.state(id), Some(FutureState::Pending))
    }

    pub fn mark_observed(&mut self, id: FutureId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.observed = true;
        }
    }

    fn register(&mut self, id: FutureId, task: TaskId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.waiters.push(task);
            slot.observed = true;
        }
    }

    /// Moves a pending future to `state` and returns the tasks waiting on
    /// it. Settling twice is ignored.
    fn settle(&mut self, id: FutureId, state: FutureState) -> Vec<TaskId> {
        let Some(slot) = self.slots.get_mut(id.0 as usize) else {
            return Vec::new();
        };
        if slot.state != FutureState::Pending {
            tracing::debug!("future {} already {}, ignoring", id.0, slot.state.label());
            return Vec::new();
        }
        tracing::debug!("future {} -> {}", id.0, state.label());
        slot.state = state;
        std::mem::take(&mut slot.waiters)
    }

    /// Failed futures nobody awaited or inspected.
    pub fn unobserved_failures(&self) -> impl Iterator<Item = (FutureId, &Failure)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match &slot.state {
            FutureState::Failed(failure) if !slot.observed => {
                Some((FutureId(index as u32), failure))
            }
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Suspended,
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct Task<B> {
    pub id: TaskId,
    /// Settled with the task's outcome.
    pub future: FutureId,
    pub state: TaskState,
    pub body: B,
}

#[derive(Debug)]
pub struct Scheduler<B> {
    pub futures: FutureTable,
    tasks: HashMap<TaskId, Task<B>>,
    ready: VecDeque<TaskId>,
    next_task: u32,
}

impl<B> Default for Scheduler<B> {
    fn default() -> Self {
        Self {
            futures: FutureTable::default(),
            tasks: HashMap::new(),
            ready: VecDeque::new(),
            next_task: 0,
        }
    }
}

impl<B> Scheduler<B> {
    /// Enqueues `body` as a ready task and returns the future it will
    /// settle. The task does not run until the scheduler reaches it.
    pub fn spawn(&mut self, body: B) -> FutureId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        let future = self.futures.create();
        self.tasks.insert(
            id,
            Task {
                id,
                future,
                state: TaskState::Ready,
                body,
            },
        );
        self.ready.push_back(id);
        tracing::debug!("spawned {id} for future {}", future.0);
        future
    }

    /// Takes the next ready task out of the table, FIFO.
    pub fn next_ready(&mut self) -> Option<Task<B>> {
        while let Some(id) = self.ready.pop_front() {
            if let Some(mut task) = self.tasks.remove(&id) {
                task.state = TaskState::Running;
                return Some(task);
            }
        }
        None
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Tasks parked on a pending future.
    pub fn suspended(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| task.state == TaskState::Suspended)
            .count()
    }

    /// Parks `task` until `on` settles. A future that already settled
    /// makes the task ready again straight away.
    pub fn suspend(&mut self, mut task: Task<B>, on: FutureId) {
        let id = task.id;
        if self.futures.is_pending(on) {
            task.state = TaskState::Suspended;
            self.futures.register(on, id);
            tracing::debug!("{id} suspended on future {}", on.0);
        } else {
            task.state = TaskState::Ready;
            self.ready.push_back(id);
        }
        self.tasks.insert(id, task);
    }

    pub fn complete(&mut self, mut task: Task<B>, value: Value) {
        task.state = TaskState::Completed;
        tracing::debug!("{} completed", task.id);
        self.resolve(task.future, value);
    }

    pub fn fail(&mut self, mut task: Task<B>, failure: Failure) {
        task.state = TaskState::Failed;
        tracing::debug!("{} failed: {}", task.id, failure.message());
        self.reject(task.future, failure);
    }

    pub fn resolve(&mut self, id: FutureId, value: Value) {
        let woken = self.futures.settle(id, FutureState::Resolved(value));
        self.wake(woken);
    }

    pub fn reject(&mut self, id: FutureId, failure: Failure) {
        let woken = self.futures.settle(id, FutureState::Failed(failure));
        self.wake(woken);
    }

    fn wake(&mut self, ids: Vec<TaskId>) {
        for id in ids {
            if let Some(task) = self.tasks.get_mut(&id) {
                if task.state == TaskState::Suspended {
                    task.state = TaskState::Ready;
                    self.ready.push_back(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_queue_is_fifo_and_wakes_waiters() {
        let mut scheduler: Scheduler<&str> = Scheduler::default();
        let first = scheduler.spawn("first");
        let _second = scheduler.spawn("second");
        let task = scheduler.next_ready().expect("first task");
        assert_eq!(task.body, "first");
        let gate = scheduler.futures.create();
        scheduler.suspend(task, gate);
        assert_eq!(scheduler.suspended(), 1);
        assert_eq!(scheduler.next_ready().map(|t| t.body), Some("second"));
        assert!(scheduler.next_ready().is_none());

        scheduler.resolve(gate, Value::Int(1));
        let woken = scheduler.next_ready().expect("woken");
        assert_eq!(woken.future, first);
        scheduler.complete(woken, Value::Int(7));
        assert_eq!(scheduler.futures.state(first), Some(&FutureState::Resolved(Value::Int(7))));
    }

    #[test]
    fn settling_is_one_way() {
        let mut scheduler: Scheduler<()> = Scheduler::default();
        let id = scheduler.futures.create();
        scheduler.resolve(id, Value::Int(1));
        scheduler.reject(
            id,
            Failure {
                error: Value::string("late"),
                line: 1,
            },
        );
        assert_eq!(scheduler.futures.state(id), Some(&FutureState::Resolved(Value::Int(1))));
        assert_eq!(scheduler.futures.unobserved_failures().count(), 0);
    }
}
