#![allow(dead_code)]

use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use cairn_task_system::{ExecStatus, Interrupter, Task, TaskId, TaskOutput};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("Sample error")]
	SampleError,
}

#[derive(Debug)]
pub struct ReadyTask {
	id: TaskId,
}

impl Default for ReadyTask {
	fn default() -> Self {
		Self {
			id: TaskId::new_v4(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for ReadyTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		Ok(ExecStatus::Done(TaskOutput::Empty))
	}
}

#[derive(Debug)]
pub struct BogusTask {
	id: TaskId,
}

impl Default for BogusTask {
	fn default() -> Self {
		Self {
			id: TaskId::new_v4(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for BogusTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		Err(SampleError::SampleError)
	}
}

/// Only finishes when interrupted
#[derive(Debug)]
pub struct NeverTask {
	id: TaskId,
}

impl Default for NeverTask {
	fn default() -> Self {
		Self {
			id: TaskId::new_v4(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for NeverTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		interrupter.await;
		info!("Interrupting NeverTask <id='{}'>", self.id);
		Ok(ExecStatus::Canceled)
	}
}

#[derive(Debug)]
pub struct SleepyTask {
	id: TaskId,
	sleep_for: Duration,
	timeout: Option<Duration>,
}

impl SleepyTask {
	pub fn new(sleep_for: Duration, timeout: Option<Duration>) -> Self {
		Self {
			id: TaskId::new_v4(),
			sleep_for,
			timeout,
		}
	}
}

#[async_trait]
impl Task<SampleError> for SleepyTask {
	fn id(&self) -> TaskId {
		self.id
	}

	fn with_timeout(&self) -> Option<Duration> {
		self.timeout
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		sleep(self.sleep_for).await;
		Ok(ExecStatus::Done(TaskOutput::Empty))
	}
}

#[derive(Debug)]
pub struct PanicTask {
	id: TaskId,
}

impl Default for PanicTask {
	fn default() -> Self {
		Self {
			id: TaskId::new_v4(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for PanicTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		panic!("PanicTask always panics");
	}
}

/// Appends its label to a shared journal once done, after an optional delay
#[derive(Debug)]
pub struct JournalTask {
	id: TaskId,
	label: &'static str,
	delay: Duration,
	journal: Arc<Mutex<Vec<&'static str>>>,
}

impl JournalTask {
	pub fn new(
		label: &'static str,
		delay: Duration,
		journal: &Arc<Mutex<Vec<&'static str>>>,
	) -> Self {
		Self {
			id: TaskId::new_v4(),
			label,
			delay,
			journal: Arc::clone(journal),
		}
	}
}

#[async_trait]
impl Task<SampleError> for JournalTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		if !self.delay.is_zero() {
			sleep(self.delay).await;
		}

		self.journal.lock().unwrap().push(self.label);

		Ok(ExecStatus::Done(TaskOutput::Empty))
	}
}
