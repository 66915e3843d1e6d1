//! Cascaded position writes

use super::Ordered;
use crate::error::ModelResult;
use crate::store::Store;
use serde_json::{Map, Value};

/// Writes each sibling's new position as a single-field update.
///
/// The writes bypass the save pipeline, so they neither re-enter ordering nor
/// emit signals nor touch `updated_at`. The first failure is returned as is;
/// updates already applied stay applied.
pub async fn renumber<M: Ordered>(
	store: &dyn Store<M>,
	updates: &[(M::PrimaryKey, i64)],
) -> ModelResult<()> {
	for (pk, position) in updates {
		tracing::debug!(
			model = M::model_name(),
			pk = %pk,
			position,
			"renumbering sibling"
		);
		let mut fields = Map::new();
		fields.insert(M::order_field().to_string(), Value::from(*position));
		store.update_fields(pk, fields).await?;
	}
	Ok(())
}
