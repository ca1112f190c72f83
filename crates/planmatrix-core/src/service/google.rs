//! Google Calendar API client.
//!
//! REST v3, synchronous surface over async reqwest via the ambient tokio
//! runtime. HTTP failures are classified into `ServiceError` from the
//! status code and the Google error reason.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Value};

use super::CalendarService;
use crate::auth::GoogleAuth;
use crate::error::ServiceError;
use crate::model::{EventDraft, EventWindow, ExternalEvent};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

enum TokenSource {
    Keyring(GoogleAuth),
    Static(String),
}

/// Google Calendar API client bound to one calendar.
pub struct GoogleCalendarClient {
    token: TokenSource,
    base_url: String,
    calendar_id: String,
    http: reqwest::Client,
}

impl GoogleCalendarClient {
    /// Client authenticating through the keyring-backed OAuth flow.
    pub fn new(auth: GoogleAuth, calendar_id: &str) -> Self {
        Self {
            token: TokenSource::Keyring(auth),
            base_url: DEFAULT_BASE_URL.to_string(),
            calendar_id: calendar_id.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Client with a fixed bearer token and base URL (for tests).
    pub fn with_static_token(base_url: &str, calendar_id: &str, token: &str) -> Self {
        Self {
            token: TokenSource::Static(token.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            calendar_id: calendar_id.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn bearer(&self) -> Result<String, ServiceError> {
        match &self.token {
            TokenSource::Keyring(auth) => auth
                .access_token()
                .map_err(|e| ServiceError::Auth(e.to_string())),
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(id))
    }

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Handle::current().block_on(fut)
    }

    /// Send a request, returning the decoded body on success or the
    /// classified error otherwise. 204 bodies decode to `null`.
    fn execute(&self, req: reqwest::RequestBuilder) -> Result<Value, ServiceError> {
        let token = self.bearer()?;
        let (status, body) = Self::block_on(async {
            let resp = req.bearer_auth(&token).send().await?;
            let status = resp.status();
            let text = resp.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        })?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()));
        }
        Err(classify_failure(status.as_u16(), &body))
    }

    fn patch_event(&self, id: &str, body: Value) -> Result<(), ServiceError> {
        self.execute(self.http.patch(self.event_url(id)).json(&body))?;
        Ok(())
    }
}

impl CalendarService for GoogleCalendarClient {
    fn list_events(
        &mut self,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ExternalEvent>, ServiceError> {
        let time_min = to_service_time(begin.and_time(chrono::NaiveTime::MIN));
        let time_max = to_service_time(end.and_time(chrono::NaiveTime::MIN));

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.http.get(self.events_url()).query(&[
                ("singleEvents", "true"),
                ("maxResults", "2500"),
                ("timeMin", &time_min),
                ("timeMax", &time_max),
            ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let body = self.execute(req)?;
            if let Some(items) = body["items"].as_array() {
                for item in items {
                    if item["status"].as_str() == Some("cancelled") {
                        continue;
                    }
                    events.push(decode_event(item)?);
                }
            }

            match body["nextPageToken"].as_str() {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(events)
    }

    fn get_event(&mut self, id: &str) -> Result<Option<ExternalEvent>, ServiceError> {
        match self.execute(self.http.get(self.event_url(id))) {
            Ok(body) => {
                if body["status"].as_str() == Some("cancelled") {
                    return Ok(None);
                }
                decode_event(&body).map(Some)
            }
            Err(e) if e.is_gone() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_event(&mut self, draft: &EventDraft) -> Result<ExternalEvent, ServiceError> {
        let mut body = json!({ "summary": draft.title });
        let (start, end) = window_to_json(&draft.window);
        body["start"] = start;
        body["end"] = end;

        let created = self.execute(self.http.post(self.events_url()).json(&body))?;
        decode_event(&created)
    }

    fn set_all_day_window(
        &mut self,
        id: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<(), ServiceError> {
        let (start, end) = window_to_json(&EventWindow::AllDay {
            start,
            end_exclusive,
        });
        self.patch_event(id, json!({ "start": start, "end": end }))
    }

    fn set_timed_window(
        &mut self,
        id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ServiceError> {
        let (start, end) = window_to_json(&EventWindow::Timed { start, end });
        self.patch_event(id, json!({ "start": start, "end": end }))
    }

    fn set_title(&mut self, id: &str, title: &str) -> Result<(), ServiceError> {
        self.patch_event(id, json!({ "summary": title }))
    }

    fn set_description(&mut self, id: &str, description: &str) -> Result<(), ServiceError> {
        self.patch_event(id, json!({ "description": description }))
    }

    fn set_location(&mut self, id: &str, location: &str) -> Result<(), ServiceError> {
        self.patch_event(id, json!({ "location": location }))
    }

    fn set_color(&mut self, id: &str, color: u8) -> Result<(), ServiceError> {
        self.patch_event(id, json!({ "colorId": color.to_string() }))
    }

    fn delete_event(&mut self, id: &str) -> Result<(), ServiceError> {
        self.execute(self.http.delete(self.event_url(id)))?;
        Ok(())
    }
}

/// Map an HTTP failure to the error taxonomy. Rate limiting hides behind
/// both 429 and 403-with-reason; everything else keeps its status.
fn classify_failure(status: u16, body: &str) -> ServiceError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let reason = parsed["error"]["errors"][0]["reason"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let message = parsed["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        429 => ServiceError::RateLimited(message),
        403 if matches!(
            reason.as_str(),
            "rateLimitExceeded" | "userRateLimitExceeded" | "quotaExceeded" | "dailyLimitExceeded"
        ) =>
        {
            ServiceError::RateLimited(message)
        }
        401 => ServiceError::Auth(message),
        404 => ServiceError::NotFound(message),
        410 => ServiceError::Gone(message),
        _ => ServiceError::Http { status, message },
    }
}

/// Decode one service event payload.
pub fn decode_event(item: &Value) -> Result<ExternalEvent, ServiceError> {
    let id = item["id"]
        .as_str()
        .ok_or_else(|| ServiceError::Decode("event without id".into()))?
        .to_string();

    let window = decode_window(&item["start"], &item["end"])
        .ok_or_else(|| ServiceError::Decode(format!("event {id} has no usable time window")))?;

    let last_modified_at = item["updated"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ServiceError::Decode(format!("event {id} has no updated stamp")))?;

    let guests = item["attendees"]
        .as_array()
        .map(|attendees| {
            attendees
                .iter()
                .filter_map(|a| a["email"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ExternalEvent {
        id,
        title: item["summary"].as_str().unwrap_or_default().to_string(),
        description: item["description"].as_str().unwrap_or_default().to_string(),
        location: item["location"].as_str().unwrap_or_default().to_string(),
        guests,
        color: item["colorId"].as_str().and_then(|c| c.parse().ok()),
        window,
        last_modified_at,
    })
}

fn decode_window(start: &Value, end: &Value) -> Option<EventWindow> {
    if let (Some(s), Some(e)) = (start["date"].as_str(), end["date"].as_str()) {
        let start = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
        let end_exclusive = NaiveDate::parse_from_str(e, "%Y-%m-%d").ok()?;
        return Some(EventWindow::AllDay {
            start,
            end_exclusive,
        });
    }
    if let (Some(s), Some(e)) = (start["dateTime"].as_str(), end["dateTime"].as_str()) {
        let start = DateTime::parse_from_rfc3339(s).ok()?.naive_utc();
        let end = DateTime::parse_from_rfc3339(e).ok()?.naive_utc();
        return Some(EventWindow::Timed { start, end });
    }
    None
}

/// Encode a window into the service's start/end objects.
pub fn window_to_json(window: &EventWindow) -> (Value, Value) {
    match window {
        EventWindow::AllDay {
            start,
            end_exclusive,
        } => (
            json!({ "date": start.format("%Y-%m-%d").to_string() }),
            json!({ "date": end_exclusive.format("%Y-%m-%d").to_string() }),
        ),
        EventWindow::Timed { start, end } => (
            json!({ "dateTime": to_service_time(*start) }),
            json!({ "dateTime": to_service_time(*end) }),
        ),
    }
}

/// Table-local (naive) time mapped to the service as UTC.
fn to_service_time(dt: NaiveDateTime) -> String {
    Utc.from_utc_datetime(&dt).to_rfc3339()
}
