//! Cooperative task framework.
//!
//! A [`Task`] owns a worker running on the tokio runtime, a bounded inbox
//! of typed messages and a set of lifecycle hooks supplied through
//! [`TaskHandler`]. Tasks compose into master/slave trees: starting the
//! master starts every slave, and the master's start is complete only
//! once each slave has reported start-complete. Termination mirrors start
//! with its own barrier; a phase with zero slaves completes immediately.
//!
//! Handlers with a [`tick_interval`](TaskHandler::tick_interval) get
//! [`on_tick`](TaskHandler::on_tick) called at that cadence in addition
//! to inbox processing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Default capacity of a task inbox.
const DEFAULT_INBOX_CAPACITY: usize = 100;

/// Lifecycle signals exchanged between a task and its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMsg {
    /// A slave finished its start phase.
    StartComplete,
    /// Request to begin the terminate phase.
    TerminateRequest,
    /// A slave finished its terminate phase.
    TerminateComplete,
}

/// Lifecycle hooks and message processing for a task worker.
///
/// All hooks run on the worker; only [`process`](Self::process) is
/// required. `on_start_complete` / `on_terminate_complete` fire when the
/// respective barrier reaches zero (immediately when there are no slaves).
#[async_trait]
pub trait TaskHandler: Send + 'static {
    /// Inbox message type.
    type Msg: Send + 'static;

    /// Task name used for logging.
    fn name(&self) -> &str;

    /// Runs on the worker before the message loop and before slaves start.
    async fn pre_run(&mut self, _ctx: &TaskContext<Self::Msg>) {}

    /// Handle one inbox message.
    async fn process(&mut self, msg: Self::Msg, ctx: &TaskContext<Self::Msg>);

    /// Periodic cadence for [`on_tick`](Self::on_tick); `None` disables it.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    /// Fires at every tick interval while the task runs.
    async fn on_tick(&mut self, _ctx: &TaskContext<Self::Msg>) {}

    /// Fires once the start barrier (all slaves started) reaches zero.
    async fn on_start_complete(&mut self, _ctx: &TaskContext<Self::Msg>) {}

    /// Fires once the terminate barrier reaches zero and the inbox drained.
    async fn on_terminate_complete(&mut self, _ctx: &TaskContext<Self::Msg>) {}

    /// Runs on the worker after the message loop, before the master is
    /// notified of terminate-complete.
    async fn post_run(&mut self, _ctx: &TaskContext<Self::Msg>) {}
}

/// Handle to the running worker available inside hooks.
pub struct TaskContext<M> {
    name: String,
    inbox_tx: mpsc::Sender<M>,
    control_tx: mpsc::UnboundedSender<TaskMsg>,
}

impl<M> TaskContext<M> {
    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender for posting messages back into the task's own inbox.
    pub fn sender(&self) -> mpsc::Sender<M> {
        self.inbox_tx.clone()
    }

    /// Request termination of the task from within one of its hooks.
    pub fn request_termination(&self) {
        let _ = self.control_tx.send(TaskMsg::TerminateRequest);
    }
}

/// Type-erased channel a slave uses to signal lifecycle events upward.
#[derive(Clone)]
pub struct ControlNotifier {
    notify: Arc<dyn Fn(TaskMsg) + Send + Sync>,
}

impl ControlNotifier {
    fn from_sender(tx: mpsc::UnboundedSender<TaskMsg>) -> Self {
        Self {
            notify: Arc::new(move |msg| {
                let _ = tx.send(msg);
            }),
        }
    }

    fn none() -> Self {
        Self {
            notify: Arc::new(|_| {}),
        }
    }

    fn signal(&self, msg: TaskMsg) {
        (self.notify)(msg);
    }
}

/// A startable member of a master/slave task tree.
pub trait SlaveTask: Send {
    /// Spawn the worker, reporting lifecycle events to `parent`.
    fn start_as_slave(&mut self, parent: ControlNotifier) -> Result<()>;
    /// Post a terminate request to the worker.
    fn terminate_signal(&mut self) -> bool;
    /// Task name for diagnostics.
    fn task_name(&self) -> &str;
}

/// A worker with a typed inbox and optional slave tasks.
///
/// The inbox sender is available from [`sender`](Self::sender) as soon as
/// the task is constructed, so wiring between components can happen
/// before anything is started.
pub struct Task<H: TaskHandler> {
    name: String,
    handler: Option<H>,
    slaves: Vec<Box<dyn SlaveTask>>,
    inbox_tx: mpsc::Sender<H::Msg>,
    inbox_rx: Option<mpsc::Receiver<H::Msg>>,
    control_tx: mpsc::UnboundedSender<TaskMsg>,
    control_rx: Option<mpsc::UnboundedReceiver<TaskMsg>>,
    join: Option<JoinHandle<()>>,
}

impl<H: TaskHandler> Task<H> {
    /// Create a task with the default inbox capacity.
    pub fn new(handler: H) -> Self {
        Self::with_capacity(handler, DEFAULT_INBOX_CAPACITY)
    }

    /// Create a task with an explicit inbox capacity.
    pub fn with_capacity(handler: H, capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            name: handler.name().to_string(),
            handler: Some(handler),
            slaves: Vec::new(),
            inbox_tx,
            inbox_rx: Some(inbox_rx),
            control_tx,
            control_rx: Some(control_rx),
            join: None,
        }
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone of the inbox sender.
    pub fn sender(&self) -> mpsc::Sender<H::Msg> {
        self.inbox_tx.clone()
    }

    /// Attach a slave; it is started by this task's start phase and
    /// terminated by its terminate phase.
    pub fn add_slave(&mut self, slave: impl SlaveTask + 'static) {
        self.slaves.push(Box::new(slave));
    }

    /// Post a message to the inbox without blocking.
    pub fn msg_signal(&self, msg: H::Msg) -> Result<()> {
        self.inbox_tx
            .try_send(msg)
            .map_err(|_| Error::SignalFailed(self.name.clone()))
    }

    /// Spawn the worker as a root task (no master to notify).
    pub fn start(&mut self) -> Result<()> {
        self.start_with_parent(ControlNotifier::none())
    }

    fn start_with_parent(&mut self, parent: ControlNotifier) -> Result<()> {
        let handler = self
            .handler
            .take()
            .ok_or_else(|| Error::AlreadyStarted(self.name.clone()))?;
        let inbox_rx = self.inbox_rx.take().expect("inbox receiver");
        let control_rx = self.control_rx.take().expect("control receiver");
        let slaves = std::mem::take(&mut self.slaves);
        let ctx = TaskContext {
            name: self.name.clone(),
            inbox_tx: self.inbox_tx.clone(),
            control_tx: self.control_tx.clone(),
        };
        debug!("Starting task [{}]", self.name);
        self.join = Some(tokio::spawn(run_worker(
            handler, ctx, inbox_rx, control_rx, slaves, parent,
        )));
        Ok(())
    }

    /// Post a terminate request; when `wait` is set, await completion.
    pub async fn terminate(&mut self, wait: bool) -> Result<()> {
        if self.join.is_none() {
            return Err(Error::NotStarted(self.name.clone()));
        }
        let _ = self.control_tx.send(TaskMsg::TerminateRequest);
        if wait {
            if let Some(join) = self.join.take() {
                join.await.map_err(|e| Error::JoinError(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Await worker completion without requesting termination.
    pub async fn wait(&mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.await.map_err(|e| Error::JoinError(e.to_string()))?;
        }
        Ok(())
    }
}

impl<H: TaskHandler> SlaveTask for Task<H> {
    fn start_as_slave(&mut self, parent: ControlNotifier) -> Result<()> {
        self.start_with_parent(parent)
    }

    fn terminate_signal(&mut self) -> bool {
        self.control_tx.send(TaskMsg::TerminateRequest).is_ok()
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}

async fn run_worker<H: TaskHandler>(
    mut handler: H,
    ctx: TaskContext<H::Msg>,
    mut inbox_rx: mpsc::Receiver<H::Msg>,
    mut control_rx: mpsc::UnboundedReceiver<TaskMsg>,
    mut slaves: Vec<Box<dyn SlaveTask>>,
    parent: ControlNotifier,
) {
    handler.pre_run(&ctx).await;

    // Start phase: every successfully started slave raises the barrier.
    let own_notifier = ControlNotifier::from_sender(ctx.control_tx.clone());
    let mut pending_start = 0usize;
    for slave in &mut slaves {
        match slave.start_as_slave(own_notifier.clone()) {
            Ok(()) => pending_start += 1,
            Err(e) => warn!(
                "Failed to start slave task [{}]: {}",
                slave.task_name(),
                e
            ),
        }
    }
    if pending_start == 0 {
        handler.on_start_complete(&ctx).await;
        parent.signal(TaskMsg::StartComplete);
    }

    let mut interval = handler.tick_interval().map(tokio::time::interval);
    let mut terminating = false;
    let mut pending_terminate = 0usize;

    loop {
        let mut finish = false;
        tokio::select! {
            biased;
            Some(msg) = control_rx.recv() => match msg {
                TaskMsg::StartComplete => {
                    if pending_start > 0 {
                        pending_start -= 1;
                        if pending_start == 0 {
                            handler.on_start_complete(&ctx).await;
                            parent.signal(TaskMsg::StartComplete);
                        }
                    }
                }
                TaskMsg::TerminateRequest => {
                    if !terminating {
                        terminating = true;
                        pending_terminate = 0;
                        for slave in &mut slaves {
                            if slave.terminate_signal() {
                                pending_terminate += 1;
                            }
                        }
                        if pending_terminate == 0 {
                            finish = true;
                        }
                    }
                }
                TaskMsg::TerminateComplete => {
                    if pending_terminate > 0 {
                        pending_terminate -= 1;
                        if pending_terminate == 0 && terminating {
                            finish = true;
                        }
                    }
                }
            },
            Some(msg) = inbox_rx.recv() => {
                handler.process(msg, &ctx).await;
            }
            _ = tick(interval.as_mut()), if interval.is_some() && !terminating => {
                handler.on_tick(&ctx).await;
            }
            else => break,
        }

        if finish {
            break;
        }
    }

    // Drain in-flight messages before reporting terminate-complete.
    while let Ok(msg) = inbox_rx.try_recv() {
        handler.process(msg, &ctx).await;
    }

    handler.on_terminate_complete(&ctx).await;
    handler.post_run(&ctx).await;
    trace!("Task [{}] terminated", ctx.name());
    parent.signal(TaskMsg::TerminateComplete);
}

async fn tick(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio_test::assert_ok;

    struct Recorder {
        name: String,
        terminate_delay: Duration,
        events: Arc<Mutex<Vec<(String, Instant)>>>,
        start_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TaskHandler for Recorder {
        type Msg = ();

        fn name(&self) -> &str {
            &self.name
        }

        async fn process(&mut self, _msg: (), _ctx: &TaskContext<()>) {}

        async fn on_start_complete(&mut self, _ctx: &TaskContext<()>) {
            self.start_count.fetch_add(1, Ordering::SeqCst);
            self.events
                .lock()
                .unwrap()
                .push((format!("{}:start", self.name), Instant::now()));
        }

        async fn on_terminate_complete(&mut self, _ctx: &TaskContext<()>) {
            self.events
                .lock()
                .unwrap()
                .push((format!("{}:terminate", self.name), Instant::now()));
        }

        async fn post_run(&mut self, _ctx: &TaskContext<()>) {
            tokio::time::sleep(self.terminate_delay).await;
        }
    }

    fn recorder(
        name: &str,
        delay_ms: u64,
        events: &Arc<Mutex<Vec<(String, Instant)>>>,
        starts: &Arc<AtomicUsize>,
    ) -> Recorder {
        Recorder {
            name: name.to_string(),
            terminate_delay: Duration::from_millis(delay_ms),
            events: events.clone(),
            start_count: starts.clone(),
        }
    }

    #[tokio::test]
    async fn test_zero_slave_phases_fire_immediately() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let starts = Arc::new(AtomicUsize::new(0));
        let mut task = Task::new(recorder("solo", 0, &events, &starts));
        assert_ok!(task.start());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_ok!(task.terminate(true).await);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "solo:start");
        assert_eq!(events[1].0, "solo:terminate");
    }

    #[tokio::test]
    async fn test_composite_terminate_barrier() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let starts = Arc::new(AtomicUsize::new(0));

        let slave_a = Task::new(recorder("slave-a", 30, &events, &starts));
        let slave_b = Task::new(recorder("slave-b", 90, &events, &starts));
        let mut master = Task::new(recorder("master", 0, &events, &starts));
        master.add_slave(slave_a);
        master.add_slave(slave_b);

        assert_ok!(master.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Master start completes only after both slaves.
        assert_eq!(starts.load(Ordering::SeqCst), 3);

        assert_ok!(master.terminate(true).await);

        let events = events.lock().unwrap();
        let pos = |name: &str| {
            events
                .iter()
                .position(|(n, _)| n == name)
                .unwrap_or_else(|| panic!("missing event {name}"))
        };
        // Exactly one terminate-complete per task.
        assert_eq!(
            events
                .iter()
                .filter(|(n, _)| n == "master:terminate")
                .count(),
            1
        );
        // Master fires strictly after the slower slave.
        assert!(pos("master:terminate") > pos("slave-a:terminate"));
        assert!(pos("master:terminate") > pos("slave-b:terminate"));
    }

    #[tokio::test]
    async fn test_composite_start_barrier_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let starts = Arc::new(AtomicUsize::new(0));

        let slave = Task::new(recorder("slave", 0, &events, &starts));
        let mut master = Task::new(recorder("master", 0, &events, &starts));
        master.add_slave(slave);
        assert_ok!(master.start());
        tokio::time::sleep(Duration::from_millis(20)).await;

        {
            let events = events.lock().unwrap();
            let slave_pos = events.iter().position(|(n, _)| n == "slave:start").unwrap();
            let master_pos = events.iter().position(|(n, _)| n == "master:start").unwrap();
            assert!(master_pos > slave_pos);
        }
        assert_ok!(master.terminate(true).await);
    }

    struct Echo {
        seen: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl TaskHandler for Echo {
        type Msg = u32;

        fn name(&self) -> &str {
            "echo"
        }

        async fn process(&mut self, msg: u32, _ctx: &TaskContext<u32>) {
            self.seen.lock().unwrap().push(msg);
        }
    }

    #[tokio::test]
    async fn test_inbox_drained_before_terminate() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut task = Task::new(Echo { seen: seen.clone() });
        assert_ok!(task.start());
        for n in 0..10 {
            assert_ok!(task.msg_signal(n));
        }
        assert_ok!(task.terminate(true).await);
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }
}
