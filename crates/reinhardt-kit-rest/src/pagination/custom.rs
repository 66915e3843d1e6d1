use super::{Page, PaginatedResponse, query_param, remove_query_param, replace_query_param};
use crate::error::{RestError, RestResult};
use crate::settings::KitSettings;
use url::Url;

/// Page number pagination with a configurable first page number.
///
/// Clients address pages as `page_start`, `page_start + 1`, ... and may ask
/// for the final page with `page=last`.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_rest::CustomPagePagination;
/// use url::Url;
///
/// let pagination = CustomPagePagination::new().page_size(2).page_start(0);
/// let url = Url::parse("http://testserver/songs/?page=1").unwrap();
///
/// let page = pagination.paginate(&[1, 2, 3, 4, 5], &url).unwrap().unwrap();
/// assert_eq!(page.results, vec![3, 4]);
///
/// let body = pagination.paginated_response(page, &url);
/// assert_eq!(body.previous.as_deref(), Some("http://testserver/songs/"));
/// assert_eq!(body.next.as_deref(), Some("http://testserver/songs/?page=2"));
/// ```
#[derive(Debug, Clone)]
pub struct CustomPagePagination {
	/// Page size when the client does not pick one. `None` disables
	/// pagination.
	pub page_size: Option<usize>,
	pub page_query_param: String,
	pub page_size_query_param: Option<String>,
	pub max_page_size: Option<usize>,
	/// Values of the page parameter that select the final page.
	pub last_page_strings: Vec<String>,
	pub page_start: i64,
}

impl Default for CustomPagePagination {
	fn default() -> Self {
		Self::from_settings(&KitSettings::default())
	}
}

impl CustomPagePagination {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_settings(settings: &KitSettings) -> Self {
		Self {
			page_size: settings.page_size,
			page_query_param: settings.page_query_param.clone(),
			page_size_query_param: settings.page_size_query_param.clone(),
			max_page_size: settings.max_page_size,
			last_page_strings: vec!["last".to_string()],
			page_start: settings.page_start,
		}
	}

	pub fn page_size(mut self, size: usize) -> Self {
		self.page_size = Some(size);
		self
	}

	pub fn max_page_size(mut self, size: usize) -> Self {
		self.max_page_size = Some(size);
		self
	}

	pub fn page_start(mut self, page_start: i64) -> Self {
		self.page_start = page_start;
		self
	}

	/// Difference between the client's page numbers and 1-based ones.
	pub(crate) fn shift(&self) -> i64 {
		1i64.saturating_sub(self.page_start)
	}

	/// Page size for this request: the client's positive choice, capped by
	/// `max_page_size`, or the default.
	///
	/// A size of zero is never used: a client choice capped to zero falls back
	/// to the default, and a zero default disables pagination.
	pub fn get_page_size(&self, url: &Url) -> Option<usize> {
		self.page_size_query_param
			.as_deref()
			.and_then(|param| query_param(url, param))
			.and_then(|raw| raw.parse::<usize>().ok())
			.map(|size| self.max_page_size.map_or(size, |max| size.min(max)))
			.filter(|size| *size > 0)
			.or(self.page_size.filter(|size| *size > 0))
	}

	/// Raw page parameter, defaulting to the first page.
	pub(crate) fn requested_page(&self, url: &Url) -> String {
		query_param(url, &self.page_query_param).unwrap_or_else(|| self.page_start.to_string())
	}

	/// Slices `items` for the requested page, or `None` when pagination is
	/// disabled.
	pub fn paginate<T: Clone>(&self, items: &[T], url: &Url) -> RestResult<Option<Page<T>>> {
		let Some(page_size) = self.get_page_size(url) else {
			return Ok(None);
		};

		let count = items.len();
		let num_pages = count.div_ceil(page_size).max(1) as i64;
		let requested = self.requested_page(url);

		let number = if self.last_page_strings.contains(&requested) {
			num_pages
		} else {
			let parsed = requested
				.parse::<i64>()
				.map_err(|_| invalid_page(&requested, "That page number is not an integer"))?;
			match parsed.checked_add(self.shift()) {
				Some(number) => number,
				None if parsed > 0 => {
					return Err(invalid_page(&requested, "That page contains no results"));
				}
				None => return Err(invalid_page(&requested, "That page number is less than 1")),
			}
		};
		if number < 1 {
			return Err(invalid_page(&requested, "That page number is less than 1"));
		}
		if number > num_pages {
			return Err(invalid_page(&requested, "That page contains no results"));
		}

		// number is within 1..=num_pages here
		let start = (number as usize - 1) * page_size;
		let end = start.saturating_add(page_size).min(count);
		Ok(Some(Page {
			number: number.saturating_sub(self.shift()),
			results: items[start..end].to_vec(),
			has_next: number < num_pages,
			has_previous: number > 1,
			count: Some(count),
		}))
	}

	pub fn next_link<T>(&self, page: &Page<T>, url: &Url) -> Option<String> {
		page.has_next.then(|| {
			replace_query_param(url, &self.page_query_param, &page.number.saturating_add(1).to_string())
		})
	}

	/// Link to the previous page. The first page is addressed without the
	/// page parameter.
	pub fn previous_link<T>(&self, page: &Page<T>, url: &Url) -> Option<String> {
		if !page.has_previous {
			return None;
		}
		let previous = page.number.saturating_sub(1);
		if previous == self.page_start {
			Some(remove_query_param(url, &self.page_query_param))
		} else {
			Some(replace_query_param(url, &self.page_query_param, &previous.to_string()))
		}
	}

	pub fn paginated_response<T>(&self, page: Page<T>, url: &Url) -> PaginatedResponse<T> {
		PaginatedResponse {
			next: self.next_link(&page, url),
			previous: self.previous_link(&page, url),
			count: page.count,
			results: page.results,
		}
	}
}

fn invalid_page(page: &str, reason: &str) -> RestError {
	RestError::NotFound(format!("Invalid page \"{}\": {}.", page, reason))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn url(query: &str) -> Url {
		Url::parse(&format!("http://testserver/songs/{}", query)).unwrap()
	}

	fn items() -> Vec<i32> {
		(1..=5).collect()
	}

	#[rstest]
	#[case("", vec![1, 2])]
	#[case("?page=1", vec![1, 2])]
	#[case("?page=3", vec![5])]
	#[case("?page=last", vec![5])]
	fn test_pages_start_at_one(#[case] query: &str, #[case] expected: Vec<i32>) {
		let pagination = CustomPagePagination::new().page_size(2);
		let page = pagination.paginate(&items(), &url(query)).unwrap().unwrap();
		assert_eq!(page.results, expected);
		assert_eq!(page.count, Some(5));
	}

	#[rstest]
	#[case("?page=0", vec![1, 2])]
	#[case("?page=2", vec![5])]
	#[case("?page=last", vec![5])]
	fn test_pages_start_at_zero(#[case] query: &str, #[case] expected: Vec<i32>) {
		let pagination = CustomPagePagination::new().page_size(2).page_start(0);
		let page = pagination.paginate(&items(), &url(query)).unwrap().unwrap();
		assert_eq!(page.results, expected);
	}

	#[rstest]
	#[case("?page=4", "Invalid page \"4\": That page contains no results.")]
	#[case("?page=0", "Invalid page \"0\": That page number is less than 1.")]
	#[case("?page=abc", "Invalid page \"abc\": That page number is not an integer.")]
	fn test_invalid_page_is_not_found(#[case] query: &str, #[case] message: &str) {
		let pagination = CustomPagePagination::new().page_size(2);
		match pagination.paginate(&items(), &url(query)) {
			Err(RestError::NotFound(found)) => assert_eq!(found, message),
			other => panic!("expected NotFound, got {:?}", other),
		}
	}

	#[rstest]
	#[case(1, "?page=9223372036854775807", "That page contains no results")]
	#[case(0, "?page=9223372036854775807", "That page contains no results")]
	#[case(1, "?page=-9223372036854775808", "That page number is less than 1")]
	#[case(2, "?page=-9223372036854775808", "That page number is less than 1")]
	fn test_extreme_page_numbers_are_not_found(
		#[case] page_start: i64,
		#[case] query: &str,
		#[case] reason: &str,
	) {
		let pagination = CustomPagePagination::new().page_size(2).page_start(page_start);
		match pagination.paginate(&items(), &url(query)) {
			Err(RestError::NotFound(found)) => {
				assert!(found.ends_with(&format!("{}.", reason)), "{}", found)
			}
			other => panic!("expected NotFound, got {:?}", other),
		}
	}

	#[rstest]
	fn test_empty_collection_has_one_page() {
		let pagination = CustomPagePagination::new().page_size(2);
		let page = pagination.paginate::<i32>(&[], &url("")).unwrap().unwrap();
		assert!(page.results.is_empty());
		assert!(!page.has_next);
		assert!(!page.has_previous);
	}

	#[rstest]
	#[case("?page_size=3", Some(3))]
	#[case("?page_size=50", Some(4))]
	#[case("?page_size=0", Some(2))]
	#[case("?page_size=many", Some(2))]
	#[case("", Some(2))]
	fn test_page_size_from_query(#[case] query: &str, #[case] expected: Option<usize>) {
		let pagination = CustomPagePagination::new().page_size(2).max_page_size(4);
		assert_eq!(pagination.get_page_size(&url(query)), expected);
	}

	#[rstest]
	#[case::client_size_capped_to_zero(Some(2), 0, "?page_size=5", Some(2))]
	#[case::no_client_size(Some(2), 0, "", Some(2))]
	#[case::zero_default(Some(0), 4, "", None)]
	#[case::zero_default_with_client_size(Some(0), 4, "?page_size=3", Some(3))]
	fn test_zero_page_size_is_never_used(
		#[case] default: Option<usize>,
		#[case] max: usize,
		#[case] query: &str,
		#[case] expected: Option<usize>,
	) {
		let mut pagination = CustomPagePagination::new().max_page_size(max);
		pagination.page_size = default;
		assert_eq!(pagination.get_page_size(&url(query)), expected);
	}

	#[rstest]
	fn test_zero_max_page_size_still_paginates() {
		let pagination = CustomPagePagination::new().page_size(2).max_page_size(0);
		let page = pagination
			.paginate(&items(), &url("?page_size=3&page=2"))
			.unwrap()
			.unwrap();
		assert_eq!(page.results, vec![3, 4]);
	}

	#[rstest]
	fn test_disabled_without_page_size() {
		let mut pagination = CustomPagePagination::new();
		pagination.page_size = None;
		assert!(pagination.paginate(&items(), &url("")).unwrap().is_none());
	}

	#[rstest]
	fn test_links_drop_page_param_on_first_page() {
		let pagination = CustomPagePagination::new().page_size(2);
		let current = url("?page=2&tag=rock");

		let page = pagination.paginate(&items(), &current).unwrap().unwrap();
		let body = pagination.paginated_response(page, &current);

		assert_eq!(body.previous.as_deref(), Some("http://testserver/songs/?tag=rock"));
		assert_eq!(body.next.as_deref(), Some("http://testserver/songs/?page=3&tag=rock"));
		assert_eq!(body.count, Some(5));
	}

	#[rstest]
	fn test_last_page_has_no_next() {
		let pagination = CustomPagePagination::new().page_size(2);
		let current = url("?page=3");

		let page = pagination.paginate(&items(), &current).unwrap().unwrap();
		let body = pagination.paginated_response(page, &current);

		assert_eq!(body.next, None);
		assert_eq!(body.previous.as_deref(), Some("http://testserver/songs/?page=2"));
	}
}
