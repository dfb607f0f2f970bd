//! Placement intent state machine.
//!
//! # Responsibility
//! - Track which kind the user wants to place and where, until the placement
//!   can be turned into a create request.
//!
//! # Invariants
//! - A coordinate is held only outside `Idle`; entering `Idle` clears it.
//! - At most one pending coordinate exists; re-selecting a kind discards it
//!   without emitting a request.
//! - A map tap while `Idle` never places anything.

use crate::model::geo::GeoCoordinate;
use crate::model::object::ObjectKind;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

static MEDIA_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(image|video)/[a-z0-9][a-z0-9.+-]*$").expect("valid media type regex")
});

/// Maps a MIME type to the object kind it produces.
///
/// Parameters such as `; codecs=...` are ignored. Anything that is not an
/// `image/*` or `video/*` type is unsupported.
pub fn kind_for_media_type(media_type: &str) -> Option<ObjectKind> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let captures = MEDIA_TYPE_RE.captures(&essence)?;
    match captures.get(1)?.as_str() {
        "image" => Some(ObjectKind::Image),
        "video" => Some(ObjectKind::Video),
        _ => None,
    }
}

/// Kind picked by the user before tapping the map.
///
/// `Media` becomes `image` or `video` once the uploaded asset's media type
/// is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectableKind {
    Cube,
    Media,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementState {
    Idle,
    AwaitingTap(SelectableKind),
    AwaitingAsset {
        kind: SelectableKind,
        coordinate: GeoCoordinate,
    },
}

/// Coarse mode of the current intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentMode {
    Idle,
    CubePending,
    AssetPending,
}

/// Read-only view of the pending placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementIntent {
    pub mode: IntentMode,
    pub coordinate: Option<GeoCoordinate>,
}

/// A fully resolved placement, ready to be sent as a create request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementDraft {
    pub coordinate: GeoCoordinate,
    pub kind: ObjectKind,
    pub asset: Option<String>,
}

/// What the caller should do after feeding an event in.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementStep {
    /// Waiting for a map tap; a previously pending coordinate, if any, was
    /// dropped.
    Armed {
        kind: SelectableKind,
        discarded: Option<GeoCoordinate>,
    },
    /// Issue a create request now.
    Create(PlacementDraft),
    /// Ask the user to pick an asset to upload.
    PromptForAsset(GeoCoordinate),
    /// Tap ignored: no kind selected yet.
    SelectKindFirst,
    /// An asset event arrived with no coordinate waiting for it.
    NotAwaitingAsset,
    UnsupportedMediaType(String),
    /// Back to `Idle`; holds the coordinate that was dropped, if any.
    Cancelled(Option<GeoCoordinate>),
}

#[derive(Debug, Clone)]
pub struct PlacementStateMachine {
    state: PlacementState,
}

impl Default for PlacementStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementStateMachine {
    pub fn new() -> Self {
        Self {
            state: PlacementState::Idle,
        }
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn intent(&self) -> PlacementIntent {
        match self.state {
            PlacementState::Idle => PlacementIntent {
                mode: IntentMode::Idle,
                coordinate: None,
            },
            PlacementState::AwaitingTap(SelectableKind::Cube) => PlacementIntent {
                mode: IntentMode::CubePending,
                coordinate: None,
            },
            PlacementState::AwaitingTap(SelectableKind::Media) => PlacementIntent {
                mode: IntentMode::AssetPending,
                coordinate: None,
            },
            PlacementState::AwaitingAsset { coordinate, .. } => PlacementIntent {
                mode: IntentMode::AssetPending,
                coordinate: Some(coordinate),
            },
        }
    }

    pub fn select_kind(&mut self, kind: SelectableKind) -> PlacementStep {
        let discarded = self.pending_coordinate();
        if let Some(coordinate) = discarded {
            info!(
                "event=placement_discard module=placement status=ok coordinate={coordinate}"
            );
        }
        self.state = PlacementState::AwaitingTap(kind);
        debug!("event=placement_select module=placement status=ok kind={kind:?}");
        PlacementStep::Armed { kind, discarded }
    }

    pub fn map_tapped(&mut self, coordinate: GeoCoordinate) -> PlacementStep {
        match self.state {
            PlacementState::Idle => PlacementStep::SelectKindFirst,
            PlacementState::AwaitingTap(SelectableKind::Cube) => {
                self.state = PlacementState::Idle;
                PlacementStep::Create(PlacementDraft {
                    coordinate,
                    kind: ObjectKind::Cube,
                    asset: None,
                })
            }
            PlacementState::AwaitingTap(kind @ SelectableKind::Media) => {
                self.state = PlacementState::AwaitingAsset { kind, coordinate };
                PlacementStep::PromptForAsset(coordinate)
            }
            // Second tap while the picker is open moves the pending spot.
            PlacementState::AwaitingAsset { kind, .. } => {
                self.state = PlacementState::AwaitingAsset { kind, coordinate };
                PlacementStep::PromptForAsset(coordinate)
            }
        }
    }

    /// The asset for the pending coordinate finished uploading.
    pub fn asset_uploaded(&mut self, url: &str, media_type: &str) -> PlacementStep {
        let PlacementState::AwaitingAsset { coordinate, .. } = self.state else {
            return PlacementStep::NotAwaitingAsset;
        };
        self.state = PlacementState::Idle;

        match kind_for_media_type(media_type) {
            Some(kind) if !url.trim().is_empty() => PlacementStep::Create(PlacementDraft {
                coordinate,
                kind,
                asset: Some(url.trim().to_string()),
            }),
            _ => {
                warn!(
                    "event=placement_asset module=placement status=error error_code=unsupported_media_type media_type={media_type}"
                );
                PlacementStep::UnsupportedMediaType(media_type.to_string())
            }
        }
    }

    /// The upload failed; nothing is placed.
    pub fn upload_failed(&mut self) -> PlacementStep {
        match self.state {
            PlacementState::AwaitingAsset { coordinate, .. } => {
                self.state = PlacementState::Idle;
                PlacementStep::Cancelled(Some(coordinate))
            }
            _ => PlacementStep::NotAwaitingAsset,
        }
    }

    pub fn cancel(&mut self) -> PlacementStep {
        let discarded = self.pending_coordinate();
        self.state = PlacementState::Idle;
        PlacementStep::Cancelled(discarded)
    }

    fn pending_coordinate(&self) -> Option<GeoCoordinate> {
        match self.state {
            PlacementState::AwaitingAsset { coordinate, .. } => Some(coordinate),
            PlacementState::Idle | PlacementState::AwaitingTap(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        kind_for_media_type, IntentMode, PlacementDraft, PlacementState, PlacementStateMachine,
        PlacementStep, SelectableKind,
    };
    use crate::model::geo::GeoCoordinate;
    use crate::model::object::ObjectKind;

    const TAP: GeoCoordinate = GeoCoordinate::new(12.9720, 77.5950);

    #[test]
    fn tap_while_idle_asks_for_kind() {
        let mut machine = PlacementStateMachine::new();
        assert_eq!(machine.map_tapped(TAP), PlacementStep::SelectKindFirst);
        assert_eq!(machine.state(), PlacementState::Idle);
    }

    #[test]
    fn cube_tap_creates_immediately_and_returns_to_idle() {
        let mut machine = PlacementStateMachine::new();
        machine.select_kind(SelectableKind::Cube);
        assert_eq!(machine.intent().mode, IntentMode::CubePending);

        let step = machine.map_tapped(TAP);
        assert_eq!(
            step,
            PlacementStep::Create(PlacementDraft {
                coordinate: TAP,
                kind: ObjectKind::Cube,
                asset: None,
            })
        );
        assert_eq!(machine.intent().mode, IntentMode::Idle);
        assert_eq!(machine.intent().coordinate, None);
    }

    #[test]
    fn media_flow_waits_for_upload_and_uses_media_type() {
        let mut machine = PlacementStateMachine::new();
        machine.select_kind(SelectableKind::Media);
        assert_eq!(machine.map_tapped(TAP), PlacementStep::PromptForAsset(TAP));
        assert_eq!(machine.intent().coordinate, Some(TAP));

        let step = machine.asset_uploaded("/uploads/clip.mp4", "video/mp4");
        assert_eq!(
            step,
            PlacementStep::Create(PlacementDraft {
                coordinate: TAP,
                kind: ObjectKind::Video,
                asset: Some("/uploads/clip.mp4".to_string()),
            })
        );
        assert_eq!(machine.state(), PlacementState::Idle);
    }

    #[test]
    fn reselecting_kind_discards_pending_coordinate() {
        let mut machine = PlacementStateMachine::new();
        machine.select_kind(SelectableKind::Media);
        machine.map_tapped(TAP);

        let step = machine.select_kind(SelectableKind::Cube);
        assert_eq!(
            step,
            PlacementStep::Armed {
                kind: SelectableKind::Cube,
                discarded: Some(TAP),
            }
        );
        assert_eq!(machine.intent().coordinate, None);
        assert_eq!(
            machine.asset_uploaded("/uploads/a.png", "image/png"),
            PlacementStep::NotAwaitingAsset
        );
    }

    #[test]
    fn upload_failure_returns_to_idle_without_create() {
        let mut machine = PlacementStateMachine::new();
        machine.select_kind(SelectableKind::Media);
        machine.map_tapped(TAP);
        assert_eq!(machine.upload_failed(), PlacementStep::Cancelled(Some(TAP)));
        assert_eq!(machine.state(), PlacementState::Idle);
    }

    #[test]
    fn unsupported_media_type_places_nothing() {
        let mut machine = PlacementStateMachine::new();
        machine.select_kind(SelectableKind::Media);
        machine.map_tapped(TAP);
        let step = machine.asset_uploaded("/uploads/doc.pdf", "application/pdf");
        assert_eq!(
            step,
            PlacementStep::UnsupportedMediaType("application/pdf".to_string())
        );
        assert_eq!(machine.intent().mode, IntentMode::Idle);
    }

    #[test]
    fn cancel_clears_everything() {
        let mut machine = PlacementStateMachine::new();
        machine.select_kind(SelectableKind::Media);
        machine.map_tapped(TAP);
        assert_eq!(machine.cancel(), PlacementStep::Cancelled(Some(TAP)));
        assert_eq!(machine.cancel(), PlacementStep::Cancelled(None));
        assert_eq!(machine.map_tapped(TAP), PlacementStep::SelectKindFirst);
    }

    #[test]
    fn media_type_classification() {
        assert_eq!(kind_for_media_type("video/mp4"), Some(ObjectKind::Video));
        assert_eq!(kind_for_media_type("Image/PNG"), Some(ObjectKind::Image));
        assert_eq!(
            kind_for_media_type("video/webm; codecs=\"vp9\""),
            Some(ObjectKind::Video)
        );
        assert_eq!(kind_for_media_type("image/svg+xml"), Some(ObjectKind::Image));
        assert_eq!(kind_for_media_type("audio/mpeg"), None);
        assert_eq!(kind_for_media_type("video/"), None);
        assert_eq!(kind_for_media_type(""), None);
    }
}
