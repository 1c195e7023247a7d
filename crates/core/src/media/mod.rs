use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Notification, NotificationSink, Result, ScheduledAction, SyncError};

/// A playable asset as supplied by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub id: String,
    pub duration_ms: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub intensity: IntensityCurve,
    #[serde(default)]
    pub actions: Vec<ScheduledAction>,
}

impl MediaDescriptor {
    pub fn new(id: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            id: id.into(),
            duration_ms: duration_ms.max(0.0),
            tags: Vec::new(),
            intensity: IntensityCurve::default(),
            actions: Vec::new(),
        }
    }

    pub fn with_intensity(mut self, intensity: IntensityCurve) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_actions(mut self, actions: Vec<ScheduledAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Control point of an [`IntensityCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePoint {
    pub at_ms: f64,
    pub intensity: f64,
}

/// Piecewise-linear map from playback position to a target intensity in
/// `[0, 1]`. Positions before the first point hold its value, positions after
/// the last point hold the last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurvePoint>", into = "Vec<CurvePoint>")]
pub struct IntensityCurve {
    points: Vec<CurvePoint>,
}

impl IntensityCurve {
    pub fn new(mut points: Vec<CurvePoint>) -> Self {
        points.retain(|point| point.at_ms.is_finite() && point.intensity.is_finite());
        points.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        Self { points }
    }

    /// Convenience constructor from `(position_ms, intensity)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(at_ms, intensity)| CurvePoint { at_ms, intensity })
                .collect(),
        )
    }

    pub fn constant(intensity: f64) -> Self {
        Self::from_pairs(&[(0.0, intensity)])
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn sample(&self, position_ms: f64) -> f64 {
        let value = match self
            .points
            .binary_search_by(|point| point.at_ms.total_cmp(&position_ms))
        {
            Ok(index) => self.points[index].intensity,
            Err(0) => self.points.first().map(|p| p.intensity).unwrap_or(0.0),
            Err(index) if index == self.points.len() => self.points[index - 1].intensity,
            Err(index) => {
                let before = self.points[index - 1];
                let after = self.points[index];
                let span = after.at_ms - before.at_ms;
                let t = (position_ms - before.at_ms) / span;
                before.intensity + (after.intensity - before.intensity) * t
            }
        };
        value.clamp(0.0, 1.0)
    }
}

impl From<Vec<CurvePoint>> for IntensityCurve {
    fn from(points: Vec<CurvePoint>) -> Self {
        Self::new(points)
    }
}

impl From<IntensityCurve> for Vec<CurvePoint> {
    fn from(curve: IntensityCurve) -> Self {
        curve.points
    }
}

/// Named stroke pattern. Each pattern scales the stroke target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrokePattern {
    #[default]
    Steady,
    Half,
    Double,
    Pause,
}

impl StrokePattern {
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Steady => 1.0,
            Self::Half => 0.5,
            Self::Double => 2.0,
            Self::Pause => 0.0,
        }
    }
}

/// Discrete one-shot event that can be pinned to a media timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum GameAction {
    SetPattern { pattern: StrokePattern },
    Moan,
    Notify { message: String },
}

/// How a resolved link should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaType {
    Picture,
    Gif,
    Video,
}

/// A raw reference handed to a resolver, e.g. a community name or post id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLink {
    pub media_type: MediaType,
    pub source_link: String,
    pub direct_link: String,
}

/// Black-box lookup from a raw reference to a playable link. Failures are per
/// reference and never fatal to the engine.
pub trait MediaResolver {
    fn resolve(&mut self, reference: &MediaRef) -> Result<MediaLink>;
}

/// Static lookup table, typically loaded from a JSON file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLibrary {
    links: HashMap<String, MediaLink>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
        }
    }

    pub fn register(&mut self, reference: impl Into<String>, link: MediaLink) {
        self.links.insert(reference.into(), link);
    }

    pub fn link(&self, reference: &str) -> Option<&MediaLink> {
        self.links.get(reference)
    }
}

impl MediaResolver for MediaLibrary {
    fn resolve(&mut self, reference: &MediaRef) -> Result<MediaLink> {
        self.links
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| SyncError::MediaResolution {
                reference: reference.to_string(),
                reason: "unknown media reference".to_string(),
            })
    }
}

/// Batch resolver that remembers failing references and stops asking for them.
#[derive(Debug)]
pub struct LinkResolver<R> {
    resolver: R,
    failed: HashSet<MediaRef>,
}

impl<R: MediaResolver> LinkResolver<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            failed: HashSet::new(),
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &MediaRef> {
        self.failed.iter()
    }

    /// Resolves every reference that has not failed before. Each new failure
    /// produces one error notification; the remaining links are still returned.
    pub fn resolve_all(
        &mut self,
        references: &[MediaRef],
        notifier: &dyn NotificationSink,
    ) -> Vec<MediaLink> {
        let pending: Vec<&MediaRef> = references
            .iter()
            .filter(|reference| !self.failed.contains(*reference))
            .collect();

        if pending.is_empty() {
            if !references.is_empty() {
                notifier.notify(Notification::error("Error fetching all media sources!"));
            }
            return Vec::new();
        }

        let mut links = Vec::with_capacity(pending.len());
        for reference in pending {
            match self.resolver.resolve(reference) {
                Ok(link) => links.push(link),
                Err(err) => {
                    tracing::warn!(%reference, error = %err, "media resolution failed");
                    self.failed.insert(reference.clone());
                    notifier.notify(Notification::error(format!(
                        "Error fetching media source: {reference}"
                    )));
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::NotificationLog;

    fn link(name: &str) -> MediaLink {
        MediaLink {
            media_type: MediaType::Picture,
            source_link: format!("https://example.test/{name}"),
            direct_link: format!("https://cdn.example.test/{name}.jpg"),
        }
    }

    fn library() -> MediaLibrary {
        let mut library = MediaLibrary::new();
        library.register("alpha", link("alpha"));
        library.register("gamma", link("gamma"));
        library
    }

    #[test]
    fn curve_interpolates_between_points() {
        let curve = IntensityCurve::from_pairs(&[(1_000.0, 0.2), (0.0, 0.0), (2_000.0, 1.0)]);

        assert_relative_eq!(curve.sample(500.0), 0.1);
        assert_relative_eq!(curve.sample(1_000.0), 0.2);
        assert_relative_eq!(curve.sample(1_500.0), 0.6);
        assert_relative_eq!(curve.sample(9_000.0), 1.0);
        assert_relative_eq!(curve.sample(-50.0), 0.0);
    }

    #[test]
    fn curve_clamps_out_of_range_values() {
        let curve = IntensityCurve::from_pairs(&[(0.0, -1.0), (100.0, 3.0)]);
        assert_eq!(curve.sample(0.0), 0.0);
        assert_eq!(curve.sample(100.0), 1.0);
        assert_eq!(IntensityCurve::default().sample(10.0), 0.0);
    }

    #[test]
    fn descriptor_parses_from_json() {
        let media: MediaDescriptor = serde_json::from_str(
            r#"{
                "id": "clip-1",
                "durationMs": 10000,
                "tags": ["slow"],
                "intensity": [{ "atMs": 0, "intensity": 0.5 }],
                "actions": [
                    { "atMs": 2500, "action": { "type": "setPattern", "pattern": "double" } },
                    { "atMs": 5000, "action": { "type": "notify", "message": "halfway" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(media.duration_ms, 10_000.0);
        assert_eq!(media.intensity.sample(3_000.0), 0.5);
        assert_eq!(
            media.actions[0].action,
            GameAction::SetPattern {
                pattern: StrokePattern::Double
            }
        );
    }

    #[test]
    fn one_failed_reference_does_not_affect_the_others() {
        let log = NotificationLog::new();
        let mut resolver = LinkResolver::new(library());
        let refs = [MediaRef::new("alpha"), MediaRef::new("beta"), MediaRef::new("gamma")];

        let links = resolver.resolve_all(&refs, &log);

        assert_eq!(links, vec![link("alpha"), link("gamma")]);
        let notes = log.snapshot();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("beta"));
    }

    #[test]
    fn previously_failed_references_are_skipped() {
        let log = NotificationLog::new();
        let mut resolver = LinkResolver::new(library());

        resolver.resolve_all(&[MediaRef::new("beta")], &log);
        let links = resolver.resolve_all(&[MediaRef::new("beta")], &log);

        assert!(links.is_empty());
        let notes = log.snapshot();
        assert_eq!(notes.len(), 2);
        assert!(notes[1].message.contains("all media sources"));
        assert_eq!(resolver.failed().count(), 1);
    }
}
