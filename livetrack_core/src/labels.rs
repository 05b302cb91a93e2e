//! Hover and pinned label state machine.
//!
//! At most one hover label and at most one pinned label exist at a time,
//! and they never belong to the same vehicle. Transitions are pure: each
//! returns the [`LabelEffect`]s the engine must apply to the surface, in
//! order.
//!
//! ```text
//!            enter                 click
//!   none ───────────► hovered ───────────► pinned
//!    ▲  ◄─────────────   │                  │
//!    │   leave / move-off│                  │
//!    └───────────────────┴──────────────────┘
//!         click (toggle) / background click / removal
//! ```

use crate::enrichment::EnrichedAgentState;

/// Which of the two label slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Hover,
    Pinned,
}

/// Text shown in a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelContent {
    pub title: String,
    pub subtitle: String,
}

impl LabelContent {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }

    /// `"5 → Centrum"` over the category description.
    pub fn for_agent(state: &EnrichedAgentState) -> Self {
        let title = if state.headsign.is_empty() {
            state.line.clone()
        } else {
            format!("{} → {}", state.line, state.headsign)
        };
        let subtitle = if state.description.is_empty() {
            state.category.clone()
        } else {
            state.description.clone()
        };
        Self { title, subtitle }
    }
}

/// A surface operation requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelEffect {
    Show(LabelKind, String),
    Hide(LabelKind),
    /// The hover label becomes the pinned label without being recreated
    PromoteHover,
}

/// Label ownership for one viewer.
#[derive(Debug, Clone, Default)]
pub struct LabelState {
    hovered: Option<String>,
    pinned: Option<String>,
    pointer_over_agent: bool,
}

impl LabelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Label slots currently attached to `id`.
    pub fn kinds_for(&self, id: &str) -> Vec<LabelKind> {
        let mut kinds = Vec::new();
        if self.hovered.as_deref() == Some(id) {
            kinds.push(LabelKind::Hover);
        }
        if self.pinned.as_deref() == Some(id) {
            kinds.push(LabelKind::Pinned);
        }
        kinds
    }

    pub fn pointer_enter(&mut self, id: &str) -> Vec<LabelEffect> {
        self.pointer_over_agent = true;

        if self.pinned.as_deref() == Some(id) || self.hovered.as_deref() == Some(id) {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.hovered.take().is_some() {
            effects.push(LabelEffect::Hide(LabelKind::Hover));
        }
        self.hovered = Some(id.to_string());
        effects.push(LabelEffect::Show(LabelKind::Hover, id.to_string()));
        effects
    }

    pub fn pointer_leave(&mut self, id: &str) -> Vec<LabelEffect> {
        self.pointer_over_agent = false;

        // A pinned vehicle never carries the hover label, so this also makes
        // leave a no-op for pinned vehicles.
        if self.hovered.as_deref() == Some(id) {
            self.hovered = None;
            return vec![LabelEffect::Hide(LabelKind::Hover)];
        }
        Vec::new()
    }

    pub fn click(&mut self, id: &str) -> Vec<LabelEffect> {
        if self.pinned.as_deref() == Some(id) {
            self.pinned = None;
            return vec![LabelEffect::Hide(LabelKind::Pinned)];
        }

        let mut effects = Vec::new();
        if self.pinned.take().is_some() {
            effects.push(LabelEffect::Hide(LabelKind::Pinned));
        }

        match self.hovered.take() {
            Some(hovered) if hovered == id => effects.push(LabelEffect::PromoteHover),
            Some(_) => {
                effects.push(LabelEffect::Hide(LabelKind::Hover));
                effects.push(LabelEffect::Show(LabelKind::Pinned, id.to_string()));
            }
            None => effects.push(LabelEffect::Show(LabelKind::Pinned, id.to_string())),
        }

        self.pinned = Some(id.to_string());
        effects
    }

    pub fn click_background(&mut self) -> Vec<LabelEffect> {
        self.pointer_over_agent = false;

        let mut effects = Vec::new();
        if self.pinned.take().is_some() {
            effects.push(LabelEffect::Hide(LabelKind::Pinned));
        }
        if self.hovered.take().is_some() {
            effects.push(LabelEffect::Hide(LabelKind::Hover));
        }
        effects
    }

    /// Generic pointer movement anywhere on the map.
    ///
    /// While the pointer is over a vehicle (entered, not yet left) this is a
    /// no-op, so the move that accompanies an enter never hides the fresh
    /// hover. Otherwise a lingering hover label is hidden; this recovers
    /// from leave events that never fired for the hovered marker.
    pub fn pointer_moved(&mut self) -> Vec<LabelEffect> {
        if self.pointer_over_agent {
            return Vec::new();
        }
        if self.hovered.take().is_some() {
            return vec![LabelEffect::Hide(LabelKind::Hover)];
        }
        Vec::new()
    }

    /// Forced cleanup when a vehicle leaves the registry.
    pub fn agent_removed(&mut self, id: &str) -> Vec<LabelEffect> {
        let mut effects = Vec::new();
        if self.hovered.as_deref() == Some(id) {
            self.hovered = None;
            self.pointer_over_agent = false;
            effects.push(LabelEffect::Hide(LabelKind::Hover));
        }
        if self.pinned.as_deref() == Some(id) {
            self.pinned = None;
            effects.push(LabelEffect::Hide(LabelKind::Pinned));
        }
        effects
    }
}
