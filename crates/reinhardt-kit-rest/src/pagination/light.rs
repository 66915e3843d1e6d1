use super::{CustomPagePagination, Page, PaginatedResponse};
use crate::error::RestResult;
use crate::settings::KitSettings;
use url::Url;

/// Page number pagination that never counts the collection.
///
/// Items are pulled from an iterator, so only the requested page is
/// materialized. A page that comes back full is assumed to have a successor.
/// Page numbers that do not parse are read as `0` before applying
/// `page_start`; anything before the first page yields an empty page instead
/// of an error.
#[derive(Debug, Clone, Default)]
pub struct LightPagePagination {
	base: CustomPagePagination,
}

impl LightPagePagination {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_settings(settings: &KitSettings) -> Self {
		Self {
			base: CustomPagePagination::from_settings(settings),
		}
	}

	pub fn page_size(mut self, size: usize) -> Self {
		self.base = self.base.page_size(size);
		self
	}

	pub fn max_page_size(mut self, size: usize) -> Self {
		self.base = self.base.max_page_size(size);
		self
	}

	pub fn page_start(mut self, page_start: i64) -> Self {
		self.base = self.base.page_start(page_start);
		self
	}

	pub fn paginate<T, I>(&self, items: I, url: &Url) -> RestResult<Option<Page<T>>>
	where
		I: IntoIterator<Item = T>,
	{
		let Some(page_size) = self.base.get_page_size(url) else {
			return Ok(None);
		};

		let shift = self.base.shift();
		let number = self
			.base
			.requested_page(url)
			.parse::<i64>()
			.unwrap_or(0)
			.saturating_add(shift)
			.max(0);
		// Pages too far out to address hold nothing
		let offset = usize::try_from(number - 1)
			.ok()
			.and_then(|index| index.checked_mul(page_size));
		let results: Vec<T> = match offset {
			Some(offset) => items.into_iter().skip(offset).take(page_size).collect(),
			None => Vec::new(),
		};

		Ok(Some(Page {
			number: number.saturating_sub(shift),
			has_next: results.len() >= page_size,
			has_previous: number > 1,
			results,
			count: None,
		}))
	}

	pub fn paginated_response<T>(&self, page: Page<T>, url: &Url) -> PaginatedResponse<T> {
		self.base.paginated_response(page, url)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn url(query: &str) -> Url {
		Url::parse(&format!("http://testserver/songs/{}", query)).unwrap()
	}

	#[rstest]
	#[case("", vec![1, 2], true)]
	#[case("?page=2", vec![3, 4], true)]
	#[case("?page=3", vec![], false)]
	#[case("?page=9", vec![], false)]
	fn test_has_next_means_page_is_full(
		#[case] query: &str,
		#[case] expected: Vec<i32>,
		#[case] has_next: bool,
	) {
		let pagination = LightPagePagination::new().page_size(2);
		let page = pagination.paginate(1..=4, &url(query)).unwrap().unwrap();
		assert_eq!(page.results, expected);
		assert_eq!(page.has_next, has_next);
		assert_eq!(page.count, None);
	}

	#[rstest]
	#[case(1, "?page=abc", vec![])]
	#[case(1, "?page=-5", vec![])]
	#[case(0, "?page=abc", vec![1, 2])]
	fn test_invalid_page_coerces_to_zero(
		#[case] page_start: i64,
		#[case] query: &str,
		#[case] expected: Vec<i32>,
	) {
		let pagination = LightPagePagination::new().page_size(2).page_start(page_start);
		let page = pagination.paginate(1..=4, &url(query)).unwrap().unwrap();
		assert_eq!(page.results, expected);
	}

	#[rstest]
	#[case(1, "?page=9223372036854775807")]
	#[case(0, "?page=9223372036854775807")]
	#[case(1, "?page=-9223372036854775808")]
	#[case(-5, "?page=9223372036854775000")]
	fn test_extreme_page_numbers_are_empty(#[case] page_start: i64, #[case] query: &str) {
		let pagination = LightPagePagination::new().page_size(2).page_start(page_start);
		let page = pagination.paginate(1..=4, &url(query)).unwrap().unwrap();
		assert!(page.results.is_empty());
		assert!(!page.has_next);
	}

	#[rstest]
	fn test_zero_max_page_size_falls_back_to_default() {
		let pagination = LightPagePagination::new().page_size(2).max_page_size(0);
		let page = pagination
			.paginate(1..=4, &url("?page_size=3"))
			.unwrap()
			.unwrap();
		assert_eq!(page.results, vec![1, 2]);
	}

	#[rstest]
	fn test_response_has_no_count() {
		let pagination = LightPagePagination::new().page_size(2);
		let current = url("?page=2");

		let page = pagination.paginate(1..=10, &current).unwrap().unwrap();
		let body = pagination.paginated_response(page, &current);

		assert_eq!(
			serde_json::to_value(&body).unwrap(),
			serde_json::json!({
				"next": "http://testserver/songs/?page=3",
				"previous": "http://testserver/songs/",
				"results": [3, 4],
			})
		);
	}
}
