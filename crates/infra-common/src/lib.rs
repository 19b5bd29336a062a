//! # rspeech-infra-common
//!
//! Shared infrastructure for the rspeech stack: the cooperative task
//! framework with composite start/terminate barriers, the bounded cyclic
//! queue used by the media-plane audio buffer, and logging setup.
//!
//! ## Tasks
//!
//! A [`Task`](task::Task) owns a worker (a tokio task) with a bounded,
//! typed inbox and lifecycle hooks. A task may aggregate slave tasks; the
//! master's start completes only after every slave reported start-complete,
//! and likewise for terminate. Zero-slave phases complete immediately.
//!
//! ```rust,no_run
//! use rspeech_infra_common::task::{Task, TaskHandler, TaskContext};
//! use async_trait::async_trait;
//!
//! struct Worker;
//!
//! #[async_trait]
//! impl TaskHandler for Worker {
//!     type Msg = u32;
//!     fn name(&self) -> &str { "worker" }
//!     async fn process(&mut self, msg: u32, _ctx: &TaskContext<u32>) {
//!         println!("got {msg}");
//!     }
//! }
//!
//! # async fn run() {
//! let mut task = Task::new(Worker);
//! task.start().unwrap();
//! task.msg_signal(42).unwrap();
//! task.terminate(true).await.unwrap();
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod queue;
pub mod task;

pub use error::{Error, Result};
pub use queue::CyclicQueue;
pub use task::{ControlNotifier, SlaveTask, Task, TaskContext, TaskHandler, TaskMsg};
