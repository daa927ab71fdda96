//! Session deep links: `{base}/{percent-encoded directory}/session/{id}`

use url::Url;

use crate::types::SessionInfo;

pub fn build_session_url(server_url: &str, session: &SessionInfo) -> String {
    let base = server_url.trim_end_matches('/');
    let directory = urlencoding::encode(&session.directory);
    format!("{base}/{directory}/session/{}", session.id)
}

pub fn parse_session_url(url: &str) -> Option<SessionInfo> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.len() < 3 || segments[1] != "session" {
        return None;
    }

    let directory = urlencoding::decode(segments[0]).ok()?;
    let id = segments[2];
    if directory.is_empty() || id.is_empty() {
        return None;
    }
    Some(SessionInfo::new(id, directory.into_owned()))
}

/// Frame URL to load when a surface becomes visible again.
///
/// Only the session path, query and fragment of `saved` are carried over,
/// onto the origin of the server that is running now.
pub fn restore_frame_url(current: &str, saved: Option<&str>) -> String {
    let Some(saved) = saved else {
        return current.to_string();
    };
    let (Ok(mut next), Ok(prev)) = (Url::parse(current), Url::parse(saved)) else {
        return current.to_string();
    };
    if !prev.path().contains("/session/") {
        return current.to_string();
    }

    next.set_path(prev.path());
    next.set_query(prev.query());
    next.set_fragment(prev.fragment());
    next.to_string()
}
