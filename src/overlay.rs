//! Hover/trigger/tooltip state for the link overlay.
//!
//! The controller performs no I/O and reads no clock: every event carries
//! the current `Instant`, and timers are `Deadline` values stored inside the
//! state they belong to, so a transition that leaves a state also drops its
//! timer. Anything that needs the router is returned as a [`SummarizeCall`]
//! for the caller to dispatch.

use std::time::{Duration, Instant};

use crate::config::Config;
use crate::protocol::Response;
use crate::router::ContextProbe;
use crate::services::Link;

pub const CONTEXT_INVALID: &str = "Extension context invalidated. Please refresh the page.";
pub const RELOAD_FAILED: &str = "Error reloading summary. Please try again.";
pub const LOADING: &str = "Loading...";
const RELOAD_LABEL: &str = "🔄 Reload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(now: Instant, delay: Duration) -> Self {
        Self(now + delay)
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverlaySettings {
    pub trigger_key: char,
    pub hover_delay: Duration,
    pub hide_grace: Duration,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            trigger_key: 's',
            hover_delay: Duration::from_millis(300),
            hide_grace: Duration::from_millis(300),
        }
    }
}

impl From<&Config> for OverlaySettings {
    fn from(config: &Config) -> Self {
        Self {
            trigger_key: config.trigger_key,
            hover_delay: config.hover_delay(),
            hide_grace: config.hide_grace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverPhase {
    Idle,
    /// Waiting for the pointer to settle on `link`.
    Pending { link: Link, debounce: Deadline },
    /// The trigger key will request a summary for `link`.
    Armed { link: Link },
    /// A summary for `link` is on its way; its reply opens the tooltip.
    Requesting { link: Link },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub link: Link,
    pub text: String,
    reloading: bool,
    hide: Option<Deadline>,
}

impl Tooltip {
    fn new(link: Link, text: impl Into<String>) -> Self {
        Self {
            link,
            text: text.into(),
            reloading: false,
            hide: None,
        }
    }

    pub fn button_enabled(&self) -> bool {
        !self.reloading
    }

    pub fn button_label(&self) -> &'static str {
        if self.reloading {
            LOADING
        } else {
            RELOAD_LABEL
        }
    }

    pub fn is_hiding(&self) -> bool {
        self.hide.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeCall {
    pub link: Link,
    pub force_reload: bool,
}

#[derive(Debug)]
pub struct OverlayController {
    settings: OverlaySettings,
    phase: HoverPhase,
    hovered: Option<Link>,
    tooltip: Option<Tooltip>,
}

impl OverlayController {
    pub fn new(settings: OverlaySettings) -> Self {
        Self {
            settings,
            phase: HoverPhase::Idle,
            hovered: None,
            tooltip: None,
        }
    }

    pub fn phase(&self) -> &HoverPhase {
        &self.phase
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    pub fn trigger_key(&self) -> char {
        self.settings.trigger_key
    }

    pub fn link_entered(&mut self, link: Link, now: Instant) {
        if let Some(tooltip) = self.tooltip.as_mut() {
            if tooltip.link.url == link.url {
                tooltip.hide = None;
            }
        }

        if matches!(&self.phase, HoverPhase::Requesting { link: l } if l.url == link.url) {
            self.hovered = Some(link);
            return;
        }

        self.phase = HoverPhase::Pending {
            link: link.clone(),
            debounce: Deadline::after(now, self.settings.hover_delay),
        };
        self.hovered = Some(link);
    }

    pub fn link_left(&mut self, url: &str, now: Instant) {
        if self.hovered.as_ref().is_some_and(|l| l.url == url) {
            self.hovered = None;
        }

        let disarm = matches!(
            &self.phase,
            HoverPhase::Pending { link, .. } | HoverPhase::Armed { link } if link.url == url
        );
        if disarm {
            self.phase = HoverPhase::Idle;
        }

        let grace = self.settings.hide_grace;
        if let Some(tooltip) = self.tooltip.as_mut() {
            if tooltip.link.url == url {
                tooltip.hide = Some(Deadline::after(now, grace));
            }
        }
    }

    pub fn tooltip_entered(&mut self) {
        if let Some(tooltip) = self.tooltip.as_mut() {
            tooltip.hide = None;
        }
    }

    pub fn tooltip_left(&mut self, now: Instant) {
        let grace = self.settings.hide_grace;
        if let Some(tooltip) = self.tooltip.as_mut() {
            tooltip.hide = Some(Deadline::after(now, grace));
        }
    }

    /// Advance timers: settle debounced hovers and drop expired tooltips.
    pub fn tick(&mut self, now: Instant) {
        if let HoverPhase::Pending { link, debounce } = &self.phase {
            if debounce.expired(now) {
                tracing::debug!("Armed {}", link.url);
                self.phase = HoverPhase::Armed { link: link.clone() };
            }
        }

        if self
            .tooltip
            .as_ref()
            .and_then(|t| t.hide)
            .is_some_and(|hide| hide.expired(now))
        {
            self.tooltip = None;
        }
    }

    /// Handle a key press. Only the trigger key on an armed link does
    /// anything, and only once per hover session.
    pub fn key_pressed(&mut self, key: char, ctx: &impl ContextProbe) -> Option<SummarizeCall> {
        if !key.eq_ignore_ascii_case(&self.settings.trigger_key) {
            return None;
        }

        let HoverPhase::Armed { link } = &self.phase else {
            return None;
        };
        let link = link.clone();

        if !ctx.is_valid() {
            tracing::warn!("{}", CONTEXT_INVALID);
            self.phase = HoverPhase::Idle;
            self.tooltip = Some(Tooltip::new(link, CONTEXT_INVALID));
            return None;
        }

        self.phase = HoverPhase::Requesting { link: link.clone() };
        Some(SummarizeCall {
            link,
            force_reload: false,
        })
    }

    pub fn summary_received(&mut self, url: &str, response: Response, now: Instant) {
        let link = match &self.phase {
            HoverPhase::Requesting { link } if link.url == url => link.clone(),
            _ => {
                tracing::debug!("Dropping stale summary for {}", url);
                return;
            }
        };
        self.phase = HoverPhase::Idle;

        let text = match response {
            Response::Summary { summary } => summary,
            Response::Error { error } => error,
        };

        let mut tooltip = Tooltip::new(link, text);
        if !self.hovered.as_ref().is_some_and(|l| l.url == url) {
            tooltip.hide = Some(Deadline::after(now, self.settings.hide_grace));
        }
        self.tooltip = Some(tooltip);
    }

    /// Reload the tooltip's summary. Returns the call to dispatch, if any.
    pub fn reload(&mut self, ctx: &impl ContextProbe) -> Option<SummarizeCall> {
        let tooltip = self.tooltip.as_mut()?;
        if tooltip.reloading {
            return None;
        }

        if !ctx.is_valid() {
            tracing::warn!("{}", CONTEXT_INVALID);
            tooltip.text = CONTEXT_INVALID.to_string();
            return None;
        }

        tooltip.reloading = true;
        tooltip.text = LOADING.to_string();
        Some(SummarizeCall {
            link: tooltip.link.clone(),
            force_reload: true,
        })
    }

    /// The button comes back whatever the outcome.
    pub fn reload_finished(&mut self, url: &str, response: Response) {
        let Some(tooltip) = self.tooltip.as_mut().filter(|t| t.link.url == url) else {
            return;
        };

        tooltip.reloading = false;
        tooltip.text = match response {
            Response::Summary { summary } => summary,
            Response::Error { error } => {
                tracing::error!("Reload failed for {}: {}", url, error);
                RELOAD_FAILED.to_string()
            }
        };
    }
}
