//! Google Calendar v3.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	service::{self, ApiClient, Page},
};

/// Production Calendar API base URL.
pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/";
/// Read/write access to calendars.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
/// Read-only access to calendars.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Entry of the user's calendar list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
	/// Calendar identifier.
	pub id: String,
	/// Title.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub summary: Option<String>,
	/// Description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// IANA time zone.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time_zone: Option<String>,
	/// Whether this is the user's primary calendar.
	#[serde(default)]
	pub primary: bool,
	/// Effective access role (`owner`, `writer`, `reader`, `freeBusyReader`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_role: Option<String>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}

/// Start or end of an event: `date` for all-day events, `date_time` otherwise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
	/// All-day date (`yyyy-mm-dd`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date: Option<String>,
	/// Timed instant.
	#[serde(
		default,
		with = "time::serde::rfc3339::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub date_time: Option<OffsetDateTime>,
	/// IANA time zone of the instant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time_zone: Option<String>,
}
impl EventDateTime {
	/// Timed instant.
	pub fn at(instant: OffsetDateTime) -> Self {
		Self { date_time: Some(instant), ..Self::default() }
	}

	/// All-day date.
	pub fn on(date: impl Into<String>) -> Self {
		Self { date: Some(date.into()), ..Self::default() }
	}
}

/// Event attendee.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
	/// Attendee e-mail.
	pub email: String,
	/// RSVP state (`needsAction`, `accepted`, `declined`, `tentative`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_status: Option<String>,
	/// Whether the attendee is optional.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub optional: bool,
}

/// Calendar event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	/// Event identifier, assigned by Google on insert.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// `confirmed`, `tentative`, or `cancelled`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	/// Title.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub summary: Option<String>,
	/// Description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Free-form location.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location: Option<String>,
	/// Start.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start: Option<EventDateTime>,
	/// End (exclusive).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end: Option<EventDateTime>,
	/// Attendees.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub attendees: Vec<EventAttendee>,
	/// Link to the event in the Calendar UI.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub html_link: Option<String>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}

/// Filters for [`CalendarService::list_events`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventQuery {
	/// Lower bound (exclusive) for an event's end time.
	pub time_min: Option<OffsetDateTime>,
	/// Upper bound (exclusive) for an event's start time.
	pub time_max: Option<OffsetDateTime>,
	/// Free-text search.
	pub q: Option<String>,
	/// Expand recurring events into instances.
	pub single_events: bool,
	/// `startTime` (requires `single_events`) or `updated`.
	pub order_by: Option<String>,
	/// Page size hint.
	pub max_results: Option<u32>,
	/// Include cancelled events.
	pub show_deleted: bool,
}
impl EventQuery {
	/// Upcoming instances between `from` and `to`, ordered by start time.
	pub fn between(from: OffsetDateTime, to: OffsetDateTime) -> Self {
		Self {
			time_min: Some(from),
			time_max: Some(to),
			single_events: true,
			order_by: Some("startTime".into()),
			..Self::default()
		}
	}

	fn to_params(&self) -> Result<Vec<(&'static str, String)>> {
		let mut params = Vec::new();

		if let Some(instant) = self.time_min {
			params.push(("timeMin", rfc3339(instant)?));
		}
		if let Some(instant) = self.time_max {
			params.push(("timeMax", rfc3339(instant)?));
		}
		if let Some(q) = &self.q {
			params.push(("q", q.clone()));
		}
		if self.single_events {
			params.push(("singleEvents", "true".into()));
		}
		if let Some(order_by) = &self.order_by {
			params.push(("orderBy", order_by.clone()));
		}
		if let Some(max) = self.max_results {
			params.push(("maxResults", max.to_string()));
		}
		if self.show_deleted {
			params.push(("showDeleted", "true".into()));
		}

		Ok(params)
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListPage {
	#[serde(default)]
	items: Vec<CalendarListEntry>,
	#[serde(default)]
	next_page_token: Option<String>,
}
impl Page for CalendarListPage {
	type Item = CalendarListEntry;

	fn next_page_token(&self) -> Option<&str> {
		self.next_page_token.as_deref()
	}

	fn into_items(self) -> Vec<Self::Item> {
		self.items
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
	#[serde(default)]
	items: Vec<Event>,
	#[serde(default)]
	next_page_token: Option<String>,
}
impl Page for EventsPage {
	type Item = Event;

	fn next_page_token(&self) -> Option<&str> {
		self.next_page_token.as_deref()
	}

	fn into_items(self) -> Vec<Self::Item> {
		self.items
	}
}

/// Calendar v3 wrapper.
#[derive(Clone, Debug)]
pub struct CalendarService {
	client: ApiClient,
	base: Url,
}
impl CalendarService {
	/// Targets the production Calendar API.
	pub fn new(client: ApiClient) -> Result<Self> {
		Self::with_base_url(client, CALENDAR_BASE_URL)
	}

	/// Targets an alternative base URL (tests, proxies).
	pub fn with_base_url(client: ApiClient, base: &str) -> Result<Self> {
		Ok(Self { client, base: service::base_url(base)? })
	}

	/// Lists every calendar on the user's calendar list.
	pub async fn list_calendars(&self) -> Result<Vec<CalendarListEntry>> {
		let url = service::endpoint(&self.base, &["users", "me", "calendarList"])?;

		service::collect_pages::<CalendarListPage>(&self.client, &url, &[]).await
	}

	/// Lists every event matching `query`, following pagination.
	pub async fn list_events(&self, calendar_id: &str, query: &EventQuery) -> Result<Vec<Event>> {
		let url = service::endpoint(&self.base, &["calendars", calendar_id, "events"])?;

		service::collect_pages::<EventsPage>(&self.client, &url, &query.to_params()?).await
	}

	/// Fetches one event.
	pub async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<Event> {
		let url = service::endpoint(&self.base, &["calendars", calendar_id, "events", event_id])?;

		self.client.get_json(url, &[]).await
	}

	/// Creates an event and returns it as stored by Google.
	pub async fn insert_event(&self, calendar_id: &str, event: &Event) -> Result<Event> {
		let url = service::endpoint(&self.base, &["calendars", calendar_id, "events"])?;

		self.client.post_json(url, event).await
	}

	/// Deletes an event.
	pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
		let url = service::endpoint(&self.base, &["calendars", calendar_id, "events", event_id])?;

		self.client.delete(url).await
	}
}

fn rfc3339(instant: OffsetDateTime) -> Result<String> {
	use time::format_description::well_known::Rfc3339;

	instant.format(&Rfc3339).map_err(|e| ConfigError::from(e).into())
}
