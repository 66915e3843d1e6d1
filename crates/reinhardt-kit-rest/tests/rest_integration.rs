//! Integration tests for error translation, response caching and pagination

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use http::header::{CACHE_CONTROL, EXPIRES, HeaderValue};
use http::{Response, StatusCode};
use reinhardt_kit_models::{
	Available, Constraint, InMemoryStore, Manager, Model, ModelError, SoftDelete,
	SoftDeleteBehavior, availability_constraint,
};
use reinhardt_kit_rest::filters::{AnyOfFilter, IntBooleanFilter};
use reinhardt_kit_rest::{
	CacheRequest, CacheResponse, CustomPagePagination, ExceptionContext, FilterBackend, FilterSet,
	InMemoryCache, KitSettings, LightPagePagination, RestError, RestResult, exception_handler,
};
use rstest::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

// ========================================
// Models
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Member {
	id: Option<i64>,
	email: String,
	team: i64,
	deleted_at: Option<DateTime<Utc>>,
}

impl Member {
	fn new(email: &str, team: i64) -> Self {
		Self {
			id: None,
			email: email.to_string(),
			team,
			deleted_at: None,
		}
	}
}

impl Model for Member {
	type PrimaryKey = i64;

	fn table_name() -> &'static str {
		"members"
	}

	fn model_name() -> &'static str {
		"Member"
	}

	fn primary_key(&self) -> Option<&i64> {
		self.id.as_ref()
	}

	fn set_primary_key(&mut self, pk: i64) {
		self.id = Some(pk);
	}

	fn constraints() -> Vec<Constraint> {
		vec![Constraint::unique("members_unique_email_team", &["email", "team"])]
	}
}

impl SoftDelete for Member {
	fn deleted_at(&self) -> Option<DateTime<Utc>> {
		self.deleted_at
	}

	fn set_deleted_at(&mut self, deleted_at: Option<DateTime<Utc>>) {
		self.deleted_at = deleted_at;
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Campaign {
	id: Option<i64>,
	starts_at: Option<DateTime<Utc>>,
	ends_at: Option<DateTime<Utc>>,
}

impl Model for Campaign {
	type PrimaryKey = i64;

	fn table_name() -> &'static str {
		"campaigns"
	}

	fn model_name() -> &'static str {
		"Campaign"
	}

	fn primary_key(&self) -> Option<&i64> {
		self.id.as_ref()
	}

	fn set_primary_key(&mut self, pk: i64) {
		self.id = Some(pk);
	}

	fn constraints() -> Vec<Constraint> {
		vec![availability_constraint::<Self>()]
	}
}

impl Available for Campaign {
	fn starts_at(&self) -> Option<DateTime<Utc>> {
		self.starts_at
	}

	fn ends_at(&self) -> Option<DateTime<Utc>> {
		self.ends_at
	}
}

#[fixture]
fn members() -> Manager<Member> {
	Manager::new(Arc::new(InMemoryStore::new())).with_behavior(SoftDeleteBehavior::new())
}

// ========================================
// Integrity error translation
// ========================================

#[rstest]
#[tokio::test]
async fn test_duplicate_member_becomes_conflict(members: Manager<Member>) {
	members.create(Member::new("ada@example.com", 1)).await.unwrap();

	let error = members
		.create(Member::new("ada@example.com", 1))
		.await
		.unwrap_err();
	assert!(error.is_integrity_error());

	let ctx = ExceptionContext::for_model::<Member>()
		.with_body(json!({"email": "ada@example.com", "team": 1}));
	let response = exception_handler(&RestError::from(error), &ctx).unwrap();

	assert_eq!(response.status, StatusCode::CONFLICT);
	assert_eq!(
		response.body,
		json!({"errors": "A Member with `email=ada@example.com and team=1` already exists."})
	);
}

#[rstest]
#[tokio::test]
async fn test_conflict_filter_finds_existing_record(members: Manager<Member>) {
	let existing = members.create(Member::new("ada@example.com", 1)).await.unwrap();
	members.create(Member::new("ada@example.com", 2)).await.unwrap();

	let error = members
		.create(Member::new("ada@example.com", 1))
		.await
		.unwrap_err();
	let ModelError::Integrity(integrity) = error else {
		panic!("expected an integrity error, got {:?}", error);
	};
	let ctx = ExceptionContext::for_model::<Member>()
		.with_body(json!({"email": "ada@example.com", "team": 1}));
	let violation = reinhardt_kit_rest::IntegrityViolation::classify(&integrity, &ctx).unwrap();

	let found = members.filter(violation.conflict_filter()).await.unwrap();
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].id, existing.id);
}

#[rstest]
#[tokio::test]
async fn test_inverted_window_becomes_bad_request() {
	let campaigns = Manager::new(Arc::new(InMemoryStore::<Campaign>::new()));
	let now = Utc::now();

	let error = campaigns
		.create(Campaign {
			id: None,
			starts_at: Some(now),
			ends_at: Some(now - Duration::days(1)),
		})
		.await
		.unwrap_err();

	let response =
		exception_handler(&RestError::from(error), &ExceptionContext::for_model::<Campaign>()).unwrap();

	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert_eq!(
		response.body,
		json!({"errors": "This Campaign violates the check `campaigns_invalid_date_range` which states `starts_at <= ends_at`"})
	);
}

#[rstest]
#[tokio::test]
async fn test_saving_soft_deleted_member_is_reported(members: Manager<Member>) {
	let mut member = members.create(Member::new("ada@example.com", 1)).await.unwrap();
	members.soft_delete(&mut member).await.unwrap();
	member.team = 2;

	let error = members.save(&mut member).await.unwrap_err();
	let response =
		exception_handler(&RestError::from(error), &ExceptionContext::for_model::<Member>()).unwrap();

	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert_eq!(
		response.body,
		json!({"errors": "It's not possible to save changes to a soft deleted model. Undelete it first."})
	);
}

#[rstest]
#[tokio::test]
async fn test_missing_member_is_not_found(members: Manager<Member>) {
	let error = members.get(&404).await.unwrap_err();
	let response =
		exception_handler(&RestError::from(error), &ExceptionContext::for_model::<Member>()).unwrap();
	assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// ========================================
// Response cache
// ========================================

struct CountingView {
	calls: AtomicUsize,
	status: StatusCode,
}

impl CountingView {
	fn new(status: StatusCode) -> Self {
		Self {
			calls: AtomicUsize::new(0),
			status,
		}
	}

	async fn render(&self) -> RestResult<Response<Bytes>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let mut response = Response::new(Bytes::from(format!("{{\"call\":{}}}", call)));
		*response.status_mut() = self.status;
		Ok(response)
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[fixture]
fn cached() -> CacheResponse<InMemoryCache> {
	CacheResponse::new(Arc::new(InMemoryCache::new()))
}

#[rstest]
#[tokio::test]
async fn test_second_identical_request_is_a_hit(cached: CacheResponse<InMemoryCache>) {
	let view = CountingView::new(StatusCode::OK);
	let request = CacheRequest::new("members.list").with_query_string("team=1");

	let first = cached.process(&request, || view.render()).await.unwrap();
	let second = cached.process(&request, || view.render()).await.unwrap();

	assert_eq!(first.headers()["x-cache"], "MISS");
	assert_eq!(second.headers()["x-cache"], "HIT");
	assert_eq!(second.body(), first.body());
	assert!(second.headers().contains_key(EXPIRES));
	assert_eq!(view.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn test_no_cache_forces_refresh(cached: CacheResponse<InMemoryCache>) {
	let view = CountingView::new(StatusCode::OK);
	let request = CacheRequest::new("members.list");
	cached.process(&request, || view.render()).await.unwrap();

	let refreshing = request
		.clone()
		.with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	let refreshed = cached.process(&refreshing, || view.render()).await.unwrap();

	assert_eq!(refreshed.headers()["x-cache"], "MISS");
	assert_eq!(refreshed.headers()[CACHE_CONTROL], "max-age=300");
	assert_eq!(refreshed.body().as_ref(), b"{\"call\":2}");

	// The refreshed body replaced the stored one
	let after = cached.process(&request, || view.render()).await.unwrap();
	assert_eq!(after.headers()["x-cache"], "HIT");
	assert_eq!(after.body().as_ref(), b"{\"call\":2}");
	assert_eq!(view.calls(), 2);
}

#[rstest]
#[tokio::test]
async fn test_different_query_is_a_miss(cached: CacheResponse<InMemoryCache>) {
	let view = CountingView::new(StatusCode::OK);

	cached
		.process(&CacheRequest::new("members.list").with_query_string("page=1"), || view.render())
		.await
		.unwrap();
	let other = cached
		.process(&CacheRequest::new("members.list").with_query_string("page=2"), || view.render())
		.await
		.unwrap();

	assert_eq!(other.headers()["x-cache"], "MISS");
	assert_eq!(view.calls(), 2);
}

#[rstest]
#[case(false, 2, "MISS")]
#[case(true, 1, "HIT")]
#[tokio::test]
async fn test_error_responses_cached_only_when_enabled(
	#[case] cache_errors: bool,
	#[case] expected_calls: usize,
	#[case] second_header: &str,
) {
	let cached = CacheResponse::new(Arc::new(InMemoryCache::new())).cache_errors(cache_errors);
	let view = CountingView::new(StatusCode::NOT_FOUND);
	let request = CacheRequest::new("members.retrieve").with_kwarg("pk", "9");

	let first = cached.process(&request, || view.render()).await.unwrap();
	let second = cached.process(&request, || view.render()).await.unwrap();

	assert_eq!(first.status(), StatusCode::NOT_FOUND);
	assert_eq!(second.headers()["x-cache"], second_header);
	assert_eq!(view.calls(), expected_calls);
}

#[rstest]
#[tokio::test]
async fn test_entry_expires_after_timeout() {
	let cached = CacheResponse::new(Arc::new(InMemoryCache::new()))
		.with_timeout(std::time::Duration::from_millis(20));
	let view = CountingView::new(StatusCode::OK);
	let request = CacheRequest::new("members.list");

	cached.process(&request, || view.render()).await.unwrap();
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;
	let again = cached.process(&request, || view.render()).await.unwrap();

	assert_eq!(again.headers()["x-cache"], "MISS");
	assert_eq!(view.calls(), 2);
}

#[rstest]
#[tokio::test]
async fn test_body_cache_key_from_settings() {
	let settings = KitSettings::from_toml_str("body_cache_key = true").unwrap();
	let cached = CacheResponse::from_settings(Arc::new(InMemoryCache::new()), &settings);
	let view = CountingView::new(StatusCode::OK);

	let jazz = CacheRequest::new("search.create").with_body(json!({"q": "jazz"}));
	let rock = CacheRequest::new("search.create").with_body(json!({"q": "rock"}));
	cached.process(&jazz, || view.render()).await.unwrap();
	let response = cached.process(&rock, || view.render()).await.unwrap();

	assert_eq!(response.headers()["x-cache"], "MISS");
	assert_eq!(view.calls(), 2);
}

// ========================================
// Pagination
// ========================================

#[rstest]
#[tokio::test]
async fn test_paginate_manager_results(members: Manager<Member>) {
	for team in 0..5 {
		members.create(Member::new("ada@example.com", team)).await.unwrap();
	}
	let all = members.all().await.unwrap();
	let url = Url::parse("http://testserver/members/?page=2&page_size=2").unwrap();

	let pagination = CustomPagePagination::new();
	let page = pagination.paginate(&all, &url).unwrap().unwrap();
	let body = pagination.paginated_response(page, &url);

	let teams: Vec<i64> = body.results.iter().map(|m| m.team).collect();
	assert_eq!(teams, vec![2, 3]);
	assert_eq!(body.count, Some(5));
	assert_eq!(body.previous.as_deref(), Some("http://testserver/members/?page_size=2"));
	assert_eq!(
		body.next.as_deref(),
		Some("http://testserver/members/?page=3&page_size=2")
	);
}

#[rstest]
#[tokio::test]
async fn test_light_pagination_from_settings(members: Manager<Member>) {
	for team in 0..4 {
		members.create(Member::new("ada@example.com", team)).await.unwrap();
	}
	let settings = KitSettings::from_toml_str("page_size = 2\npage_start = 0").unwrap();
	let url = Url::parse("http://testserver/members/?page=1").unwrap();

	let pagination = LightPagePagination::from_settings(&settings);
	let page = pagination
		.paginate(members.all().await.unwrap(), &url)
		.unwrap()
		.unwrap();

	assert_eq!(page.number, 1);
	assert!(page.has_next);
	assert!(page.has_previous);
	let body = pagination.paginated_response(page, &url);
	assert_eq!(body.count, None);
	assert_eq!(body.previous.as_deref(), Some("http://testserver/members/"));
}

#[rstest]
#[case::beyond_last_page("?page=4&page_size=2", "Invalid page \"4\": That page contains no results.")]
#[case::overflowing_page("?page=99999999999999999999", "Invalid page \"99999999999999999999\": That page number is not an integer.")]
#[case::largest_page("?page=9223372036854775807", "Invalid page \"9223372036854775807\": That page contains no results.")]
#[tokio::test]
async fn test_out_of_range_page_is_not_found(
	members: Manager<Member>,
	#[case] query: &str,
	#[case] message: &str,
) {
	for team in 0..5 {
		members.create(Member::new("ada@example.com", team)).await.unwrap();
	}
	let url = Url::parse(&format!("http://testserver/members/{}", query)).unwrap();

	let error = CustomPagePagination::new()
		.paginate(&members.all().await.unwrap(), &url)
		.unwrap_err();
	let response = exception_handler(&error, &ExceptionContext::for_model::<Member>()).unwrap();

	assert_eq!(response.status, StatusCode::NOT_FOUND);
	assert_eq!(response.body, json!({ "errors": message }));
}

#[rstest]
#[case("page_size = 0")]
#[case("max_page_size = 0")]
fn test_zero_page_sizes_are_rejected_in_settings(#[case] content: &str) {
	assert!(matches!(
		KitSettings::from_toml_str(content),
		Err(RestError::Settings(_))
	));
}

#[rstest]
#[case("?page_size=0")]
#[case("?page_size=-3")]
#[tokio::test]
async fn test_zero_client_page_size_uses_default(members: Manager<Member>, #[case] query: &str) {
	for team in 0..3 {
		members.create(Member::new("ada@example.com", team)).await.unwrap();
	}
	let url = Url::parse(&format!("http://testserver/members/{}", query)).unwrap();

	let pagination = CustomPagePagination::new().page_size(2).max_page_size(0);
	let page = pagination
		.paginate(&members.all().await.unwrap(), &url)
		.unwrap()
		.unwrap();

	assert_eq!(page.results.len(), 2);
	assert!(page.has_next);
}

// ========================================
// Query filters
// ========================================

fn campaign(starts_in_days: Option<i64>, ends_in_days: Option<i64>) -> Campaign {
	let now = Utc::now();
	Campaign {
		id: None,
		starts_at: starts_in_days.map(|days| now + Duration::days(days)),
		ends_at: ends_in_days.map(|days| now + Duration::days(days)),
	}
}

#[rstest]
#[case::default_hides_unavailable("", vec![2, 4])]
#[case::explicit_zero("?include_unavailable=0", vec![2, 4])]
#[case::include_all("?include_unavailable=1", vec![1, 2, 3, 4])]
#[case::undecided_value("?include_unavailable=7", vec![1, 2, 3, 4])]
#[tokio::test]
async fn test_unavailable_campaigns_are_hidden_by_default(
	#[case] query: &str,
	#[case] expected: Vec<i64>,
) {
	let campaigns = Manager::new(Arc::new(InMemoryStore::<Campaign>::new()));
	// past, current, future, open-ended
	for window in [
		campaign(Some(-10), Some(-5)),
		campaign(Some(-1), Some(1)),
		campaign(Some(5), Some(10)),
		campaign(None, None),
	] {
		campaigns.create(window).await.unwrap();
	}
	let url = Url::parse(&format!("http://testserver/campaigns/{}", query)).unwrap();

	let backend = FilterBackend::new(FilterSet::include_unavailable());
	let found = backend.filter_queryset(&campaigns, &url).await.unwrap();

	let ids: Vec<i64> = found.iter().filter_map(|c| c.id).collect();
	assert_eq!(ids, expected);
}

#[rstest]
#[tokio::test]
async fn test_any_of_teams_skips_soft_deleted(members: Manager<Member>) {
	for team in 1..=4 {
		members.create(Member::new("ada@example.com", team)).await.unwrap();
	}
	let mut gone = members.create(Member::new("bob@example.com", 3)).await.unwrap();
	members.soft_delete(&mut gone).await.unwrap();
	let url = Url::parse("http://testserver/members/?team=1&team=3").unwrap();

	let backend = FilterBackend::new(FilterSet::new().with(AnyOfFilter::new("team").integers()));
	let found = backend.filter_queryset(&members, &url).await.unwrap();

	let teams: Vec<i64> = found.iter().map(|m| m.team).collect();
	assert_eq!(teams, vec![1, 3]);
}

#[rstest]
#[tokio::test]
async fn test_invalid_filter_value_becomes_bad_request(members: Manager<Member>) {
	members.create(Member::new("ada@example.com", 1)).await.unwrap();
	let url = Url::parse("http://testserver/members/?team=red&active=yes").unwrap();
	let backend = FilterBackend::new(
		FilterSet::new()
			.with(AnyOfFilter::new("team").integers())
			.with(IntBooleanFilter::new("active")),
	);

	let error = backend.filter_queryset(&members, &url).await.unwrap_err();
	let response = exception_handler(&error, &ExceptionContext::for_model::<Member>()).unwrap();

	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert_eq!(
		response.body,
		json!({"errors": {
			"team": ["Select a valid choice. red is not one of the available choices."],
			"active": ["Enter a whole number."],
		}})
	);
}
