//! Cache key builders.
//!
//! Readers and writers must compute identical keys for identical requests,
//! so every key is built here. Keys are `prefix:segment:segment`; segments
//! are escaped so a `:` inside a parameter can never collide with the
//! separator, and absent optional parameters are written as `*`.

const ALL_EVENTS: &str = "all_events";
const EVENT_DETAIL: &str = "event_detail";
const USER_PROFILE: &str = "user_profile";
const USER_EVENTS: &str = "user_events";
const RECENT_ACTIVITY: &str = "recent_activity";

const ABSENT: &str = "*";

/// Key for the full events list.
pub fn all_events_key() -> String {
    ALL_EVENTS.to_string()
}

/// Key for one event's detail.
pub fn event_detail_key(event_id: &str) -> String {
    build(EVENT_DETAIL, &[Some(event_id)])
}

/// Key for a user's profile.
pub fn user_profile_key(user_id: &str) -> String {
    build(USER_PROFILE, &[Some(user_id)])
}

/// Key for a "my events" query, e.g. `("registered", Some("upcoming"), None)`.
pub fn user_events_key(kind: &str, status: Option<&str>, period: Option<&str>) -> String {
    build(USER_EVENTS, &[Some(kind), status, period])
}

/// Key for the recent-activity feed over an optional range.
pub fn recent_activity_key(range: Option<&str>) -> String {
    build(RECENT_ACTIVITY, &[range])
}

fn build(prefix: &str, segments: &[Option<&str>]) -> String {
    let mut key = String::from(prefix);
    for segment in segments {
        key.push(':');
        match segment {
            Some(value) => escape_into(&mut key, value),
            None => key.push_str(ABSENT),
        }
    }
    key
}

fn escape_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '*' => out.push_str("%2A"),
            _ => out.push(ch),
        }
    }
}
