//! Position assignment within one grouping

/// Outcome of [`assign_position`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<K> {
	/// Position to store on the candidate. `None` when the candidate is being
	/// removed from the grouping and keeps its stored value.
	pub position: Option<i64>,
	/// Siblings whose stored position must change, with their new position.
	pub updates: Vec<(K, i64)>,
}

impl<K> Placement<K> {
	pub fn is_noop(&self) -> bool {
		self.updates.is_empty()
	}
}

/// Computes the candidate's position and the sibling writes that keep the
/// grouping contiguous.
///
/// `siblings` must be sorted by their stored position. The candidate is
/// filtered out of them if present. A requested position is clamped to
/// `0..=len`; `None` appends. When `removing` is set the candidate is left out
/// of the sequence and only the siblings are compacted.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::ordering::assign_position;
///
/// // [A, B, C, D] at [0, 1, 2, 3]; B asks for position 3.
/// let siblings = vec![("A", Some(0)), ("C", Some(2)), ("D", Some(3))];
/// let placement = assign_position(Some(&"B"), Some(3), &siblings, false);
///
/// assert_eq!(placement.position, Some(3));
/// assert_eq!(placement.updates, vec![("C", 1), ("D", 2)]);
/// ```
pub fn assign_position<K: Clone + PartialEq>(
	candidate: Option<&K>,
	requested: Option<i64>,
	siblings: &[(K, Option<i64>)],
	removing: bool,
) -> Placement<K> {
	let others: Vec<&(K, Option<i64>)> = siblings
		.iter()
		.filter(|(key, _)| Some(key) != candidate)
		.collect();
	let len = others.len();

	let slot = if removing {
		None
	} else {
		Some(match requested {
			None => len,
			Some(requested) => requested.clamp(0, len as i64) as usize,
		})
	};

	let mut updates = Vec::new();
	let mut index = 0usize;
	for (key, stored) in others {
		if slot == Some(index) {
			index += 1;
		}
		if *stored != Some(index as i64) {
			updates.push((key.clone(), index as i64));
		}
		index += 1;
	}

	Placement {
		position: slot.map(|slot| slot as i64),
		updates,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn abcd() -> Vec<(char, Option<i64>)> {
		vec![('A', Some(0)), ('B', Some(1)), ('C', Some(2)), ('D', Some(3))]
	}

	#[rstest]
	fn test_append_to_contiguous_grouping() {
		let placement = assign_position(None, None, &abcd(), false);

		assert_eq!(placement.position, Some(4));
		assert!(placement.is_noop());
	}

	#[rstest]
	fn test_append_to_empty_grouping() {
		let placement = assign_position::<char>(None, None, &[], false);
		assert_eq!(placement.position, Some(0));
	}

	#[rstest]
	fn test_move_to_front_shifts_everyone() {
		let placement = assign_position(Some(&'D'), Some(0), &abcd(), false);

		assert_eq!(placement.position, Some(0));
		assert_eq!(placement.updates, vec![('A', 1), ('B', 2), ('C', 3)]);
	}

	#[rstest]
	#[case(-1)]
	#[case(-30)]
	fn test_negative_request_behaves_like_zero(#[case] requested: i64) {
		let negative = assign_position(Some(&'C'), Some(requested), &abcd(), false);
		let zero = assign_position(Some(&'C'), Some(0), &abcd(), false);

		assert_eq!(negative, zero);
		assert_eq!(negative.updates, vec![('A', 1), ('B', 2)]);
	}

	#[rstest]
	#[case(3)]
	#[case(30)]
	fn test_request_beyond_count_appends(#[case] requested: i64) {
		let placement = assign_position(Some(&'B'), Some(requested), &abcd(), false);

		assert_eq!(placement.position, Some(3));
		assert_eq!(placement.updates, vec![('C', 1), ('D', 2)]);
	}

	#[rstest]
	fn test_insert_in_the_middle_on_create() {
		let placement = assign_position(None, Some(1), &abcd(), false);

		assert_eq!(placement.position, Some(1));
		assert_eq!(placement.updates, vec![('B', 2), ('C', 3), ('D', 4)]);
	}

	#[rstest]
	fn test_removing_compacts_siblings_only() {
		let placement = assign_position(Some(&'B'), Some(1), &abcd(), true);

		assert_eq!(placement.position, None);
		assert_eq!(placement.updates, vec![('C', 1), ('D', 2)]);
	}

	#[rstest]
	fn test_gapped_siblings_are_compacted_on_append() {
		let siblings = vec![('A', Some(0)), ('C', Some(2)), ('D', Some(5))];
		let placement = assign_position(None, None, &siblings, false);

		assert_eq!(placement.position, Some(3));
		assert_eq!(placement.updates, vec![('C', 1), ('D', 2)]);
	}

	#[rstest]
	fn test_unpositioned_sibling_gets_a_slot() {
		let siblings = vec![('A', Some(0)), ('B', None)];
		let placement = assign_position(None, Some(0), &siblings, false);

		assert_eq!(placement.position, Some(0));
		assert_eq!(placement.updates, vec![('A', 1), ('B', 2)]);
	}
}
