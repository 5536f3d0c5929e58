//! Route navigation.
//!
//! Maps UI routes onto channel switches: `/channels/{id}` selects channel
//! `id`, anything else clears the active channel.

use chatlink_proto::ChannelId;
use url::Url;

/// Path prefix of channel routes.
const CHANNEL_SEGMENT: &str = "channels";

/// Resolve a route to the channel it shows.
///
/// Accepts bare paths (`/channels/7`) and absolute URLs. Trailing segments,
/// query and fragment are ignored.
pub fn resolve_route(route: &str) -> Option<ChannelId> {
    let path = match Url::parse(route) {
        Ok(url) => url.path().to_string(),
        Err(_) => route.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(CHANNEL_SEGMENT), Some(id)) => Some(ChannelId::from(id)),
        _ => None,
    }
}

/// Deduplicates navigation so re-rendering the same route does not restart a
/// switch.
///
/// Repeats are judged against where membership is headed, not against the
/// previous route, so a route shown again after an explicit leave or switch
/// still rejoins its channel.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    last: Option<Option<ChannelId>>,
}

impl Navigator {
    /// Create a navigator with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `route`; returns the switch target unless membership is
    /// already on, or heading to, that channel.
    ///
    /// `intended` is the channel membership will settle on.
    pub fn navigate(
        &mut self,
        route: &str,
        intended: Option<&ChannelId>,
    ) -> Option<Option<ChannelId>> {
        let target = resolve_route(route);
        self.last = Some(target.clone());

        if target.as_ref() == intended { None } else { Some(target) }
    }

    /// Target of the last navigation.
    pub fn current(&self) -> Option<&ChannelId> {
        self.last.as_ref().and_then(Option::as_ref)
    }

    /// Forget navigation history.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
