/*!
 * Extensions to some builtin or external types
 */

use axum::http::HeaderMap;

/// Header carrying the caller's stable id, set by the identity provider in front of us
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's display name
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Identity of the user behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub username: Option<String>,
}

pub trait HeaderMapExt {
    fn caller(&self) -> Option<Caller>;
}

impl HeaderMapExt for HeaderMap {
    fn caller(&self) -> Option<Caller> {
        let header = |name| {
            self.get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        Some(Caller { id: header(USER_ID_HEADER)?, username: header(USER_NAME_HEADER) })
    }
}
