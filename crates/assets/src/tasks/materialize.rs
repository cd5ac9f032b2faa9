use std::sync::Arc;

use cairn_task_system::{check_interruption, ExecStatus, Interrupter, Task, TaskId, TaskOutput};

use tracing::{instrument, trace, Level};

use crate::{copy::Copier, error::Error, plan::CopyItem};

/// Copies a verified store object to its friendly-named target.
///
/// Must only be dispatched after the [`super::EnsureObjectTask`] of the same entry succeeded.
#[derive(Debug)]
pub struct MaterializeTask {
	id: TaskId,
	item: CopyItem,
	copier: Arc<dyn Copier>,
}

impl MaterializeTask {
	#[must_use]
	pub fn new(item: CopyItem, copier: Arc<dyn Copier>) -> Self {
		Self {
			id: TaskId::new_v4(),
			item,
			copier,
		}
	}

	#[must_use]
	pub const fn item(&self) -> &CopyItem {
		&self.item
	}
}

#[async_trait::async_trait]
impl Task<Error> for MaterializeTask {
	fn id(&self) -> TaskId {
		self.id
	}

	#[instrument(
		skip(self, interrupter),
		fields(
			task_id = %self.id,
			entry = %self.item.entry,
			target = %self.item.target.display(),
		),
		ret(level = Level::TRACE),
		err,
	)]
	#[allow(clippy::blocks_in_conditions)] // Due to `err` on `instrument` macro above
	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, Error> {
		check_interruption!(interrupter);

		let CopyItem {
			entry,
			source,
			target,
			..
		} = &self.item;

		let copied = self
			.copier
			.copy(source, target)
			.await
			.map_err(|source| Error::CopyFailed {
				entry: entry.clone(),
				source,
			})?;

		trace!(%copied, "Materialized object");

		Ok(ExecStatus::Done(TaskOutput::Empty))
	}
}
