//! Model lifecycle signals
//!
//! Each [`Manager`](crate::Manager) owns its own [`ModelSignals`]; there is no
//! process-wide dispatcher. Cascaded position writes and other internal saves
//! never emit signals.

use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a signal receiver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SignalError {
	pub message: String,
}

impl SignalError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// Type-safe signal name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalName(&'static str);

impl SignalName {
	pub const PRE_SAVE: Self = Self("pre_save");
	pub const POST_SAVE: Self = Self("post_save");
	pub const PRE_DELETE: Self = Self("pre_delete");
	pub const POST_DELETE: Self = Self("post_delete");
	pub const PRE_SOFT_DELETE: Self = Self("pre_soft_delete");
	pub const POST_SOFT_DELETE: Self = Self("post_soft_delete");
	pub const PRE_UNDELETE: Self = Self("pre_undelete");
	pub const POST_UNDELETE: Self = Self("post_undelete");

	pub const fn custom(name: &'static str) -> Self {
		Self(name)
	}

	pub const fn as_str(&self) -> &'static str {
		self.0
	}
}

impl fmt::Display for SignalName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.0)
	}
}

/// Boxed asynchronous receiver
pub type ReceiverFn<T> = Arc<
	dyn Fn(Arc<T>) -> Pin<Box<dyn Future<Output = Result<(), SignalError>> + Send>>
		+ Send
		+ Sync,
>;

struct ReceiverInfo<T: Send + Sync + 'static> {
	receiver: ReceiverFn<T>,
	dispatch_uid: Option<String>,
	priority: i32, // Higher values execute first
}

impl<T: Send + Sync + 'static> Clone for ReceiverInfo<T> {
	fn clone(&self) -> Self {
		Self {
			receiver: Arc::clone(&self.receiver),
			dispatch_uid: self.dispatch_uid.clone(),
			priority: self.priority,
		}
	}
}

/// A signal that dispatches events to connected receivers
pub struct Signal<T: Send + Sync + 'static> {
	receivers: Arc<RwLock<Vec<ReceiverInfo<T>>>>,
	name: SignalName,
}

impl<T: Send + Sync + 'static> Signal<T> {
	/// Create a new signal
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_kit_models::signals::{Signal, SignalName};
	///
	/// let signal = Signal::<String>::new(SignalName::PRE_SAVE);
	/// assert_eq!(signal.receiver_count(), 0);
	/// ```
	pub fn new(name: SignalName) -> Self {
		Self {
			receivers: Arc::new(RwLock::new(Vec::new())),
			name,
		}
	}

	pub fn name(&self) -> SignalName {
		self.name
	}

	/// Connect a receiver function to this signal with full options
	///
	/// # Arguments
	/// * `receiver` - The receiver function to connect
	/// * `dispatch_uid` - Optional unique identifier; connecting again with the
	///   same uid replaces the previous receiver
	/// * `priority` - Execution priority (higher values execute first, default: 0)
	pub fn connect_with_options<F, Fut>(
		&self,
		receiver: F,
		dispatch_uid: Option<String>,
		priority: i32,
	) where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
	{
		let boxed: ReceiverFn<T> = Arc::new(move |instance| Box::pin(receiver(instance)));
		let mut receivers = self.receivers.write();

		if let Some(ref uid) = dispatch_uid {
			receivers.retain(|r| r.dispatch_uid.as_ref() != Some(uid));
		}

		receivers.push(ReceiverInfo {
			receiver: boxed,
			dispatch_uid,
			priority,
		});

		// Stable sort keeps connection order within a priority
		receivers.sort_by(|a, b| b.priority.cmp(&a.priority));
	}

	/// Connect a receiver function to this signal (simple version)
	pub fn connect<F, Fut>(&self, receiver: F)
	where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
	{
		self.connect_with_options(receiver, None, 0);
	}

	/// Disconnect the receiver registered under `dispatch_uid`.
	///
	/// Returns `true` if a receiver was removed.
	pub fn disconnect(&self, dispatch_uid: &str) -> bool {
		let mut receivers = self.receivers.write();
		let before = receivers.len();
		receivers.retain(|r| r.dispatch_uid.as_deref() != Some(dispatch_uid));
		receivers.len() != before
	}

	pub fn disconnect_all(&self) {
		self.receivers.write().clear();
	}

	pub fn receiver_count(&self) -> usize {
		self.receivers.read().len()
	}

	/// Send the signal, stopping at the first receiver error.
	pub async fn send(&self, instance: T) -> Result<(), SignalError> {
		let instance = Arc::new(instance);
		let receivers = self.receivers.read().clone();
		tracing::trace!(signal = %self.name, receivers = receivers.len(), "sending signal");

		for receiver_info in receivers {
			(receiver_info.receiver)(Arc::clone(&instance)).await?;
		}
		Ok(())
	}

	/// Send the signal to every receiver, collecting each result.
	pub async fn send_robust(&self, instance: T) -> Vec<Result<(), SignalError>> {
		let instance = Arc::new(instance);
		let receivers = self.receivers.read().clone();
		tracing::trace!(signal = %self.name, receivers = receivers.len(), "sending signal robustly");

		let mut results = Vec::with_capacity(receivers.len());
		for receiver_info in receivers {
			results.push((receiver_info.receiver)(Arc::clone(&instance)).await);
		}
		results
	}
}

impl<T: Send + Sync + 'static> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			receivers: Arc::clone(&self.receivers),
			name: self.name,
		}
	}
}

impl<T: Send + Sync + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("name", &self.name)
			.field("receivers", &self.receiver_count())
			.finish()
	}
}

/// Payload sent with every model signal.
#[derive(Debug, Clone)]
pub struct SignalEvent<M> {
	pub instance: M,
	/// `true` on the save that inserted the row
	pub created: bool,
}

/// The lifecycle signals of one manager.
pub struct ModelSignals<M: Send + Sync + 'static> {
	pub pre_save: Signal<SignalEvent<M>>,
	pub post_save: Signal<SignalEvent<M>>,
	pub pre_delete: Signal<SignalEvent<M>>,
	pub post_delete: Signal<SignalEvent<M>>,
	pub pre_soft_delete: Signal<SignalEvent<M>>,
	pub post_soft_delete: Signal<SignalEvent<M>>,
	pub pre_undelete: Signal<SignalEvent<M>>,
	pub post_undelete: Signal<SignalEvent<M>>,
}

impl<M: Send + Sync + 'static> ModelSignals<M> {
	pub fn new() -> Self {
		Self {
			pre_save: Signal::new(SignalName::PRE_SAVE),
			post_save: Signal::new(SignalName::POST_SAVE),
			pre_delete: Signal::new(SignalName::PRE_DELETE),
			post_delete: Signal::new(SignalName::POST_DELETE),
			pre_soft_delete: Signal::new(SignalName::PRE_SOFT_DELETE),
			post_soft_delete: Signal::new(SignalName::POST_SOFT_DELETE),
			pre_undelete: Signal::new(SignalName::PRE_UNDELETE),
			post_undelete: Signal::new(SignalName::POST_UNDELETE),
		}
	}
}

impl<M: Send + Sync + 'static> Default for ModelSignals<M> {
	fn default() -> Self {
		Self::new()
	}
}

impl<M: Send + Sync + 'static> fmt::Debug for ModelSignals<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ModelSignals")
			.field("pre_save", &self.pre_save)
			.field("post_save", &self.post_save)
			.field("pre_delete", &self.pre_delete)
			.field("post_delete", &self.post_delete)
			.finish_non_exhaustive()
	}
}
