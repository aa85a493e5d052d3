//! URL templates with bounding-box placeholders.

use std::fmt;

use geo::{Coord, Rect};

const PLACEHOLDERS: [&str; 4] = ["{left}", "{bottom}", "{right}", "{top}"];

/// Request URL containing `{left}`, `{bottom}`, `{right}` and `{top}`.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use quickhn_data::BboxTemplate;
///
/// let template = BboxTemplate::parse(
///     "https://example.org/wfs?bbox={left},{bottom},{right},{top}",
/// )
/// .unwrap();
/// let bbox = Rect::new(Coord { x: 3.5, y: 51.0 }, Coord { x: 3.75, y: 51.25 });
/// assert_eq!(
///     template.render(&bbox),
///     "https://example.org/wfs?bbox=3.5,51,3.75,51.25",
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BboxTemplate {
    raw: String,
}

/// A template lacked one of the bounding-box placeholders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("URL template {template:?} is missing the {placeholder} placeholder")]
pub struct TemplateError {
    /// Offending template.
    pub template: String,
    /// First placeholder that was not found.
    pub placeholder: &'static str,
}

impl BboxTemplate {
    /// Validate `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a placeholder is missing.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TemplateError> {
        let template = raw.into();
        if let Some(placeholder) = PLACEHOLDERS
            .into_iter()
            .find(|placeholder| !template.contains(placeholder))
        {
            return Err(TemplateError {
                template,
                placeholder,
            });
        }
        Ok(Self { raw: template })
    }

    /// Substitute the corners of `bbox`.
    #[must_use]
    pub fn render(&self, bbox: &Rect<f64>) -> String {
        let Coord { x: left, y: bottom } = bbox.min();
        let Coord { x: right, y: top } = bbox.max();
        self.raw
            .replace("{left}", &left.to_string())
            .replace("{bottom}", &bottom.to_string())
            .replace("{right}", &right.to_string())
            .replace("{top}", &top.to_string())
    }
}

impl fmt::Display for BboxTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Grow `bbox` by `margin` degrees on every side.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "padding a bounding box offsets its corners in degrees"
)]
pub fn pad(bbox: &Rect<f64>, margin: f64) -> Rect<f64> {
    let min = bbox.min();
    let max = bbox.max();
    Rect::new(
        Coord {
            x: min.x - margin,
            y: min.y - margin,
        },
        Coord {
            x: max.x + margin,
            y: max.y + margin,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.org/?b={left},{bottom},{right}", "{top}")]
    #[case("https://example.org/?l={left}&t={top}", "{bottom}")]
    fn rejects_missing_placeholders(#[case] raw: &str, #[case] missing: &str) {
        let err = BboxTemplate::parse(raw).expect_err("incomplete template");
        assert_eq!(err.placeholder, missing);
    }

    #[rstest]
    fn renders_placeholders_in_any_order() {
        let template =
            BboxTemplate::parse("q?top={top}&left={left}&right={right}&bottom={bottom}")
                .expect("complete template");
        let bbox = Rect::new(Coord { x: 1.0, y: 2.0 }, Coord { x: 3.0, y: 4.0 });
        assert_eq!(template.render(&bbox), "q?top=4&left=1&right=3&bottom=2");
    }

    #[rstest]
    fn pad_grows_every_side() {
        let bbox = Rect::new(Coord { x: 1.0, y: 2.0 }, Coord { x: 3.0, y: 4.0 });
        let padded = pad(&bbox, 0.5);
        assert_eq!(padded.min(), Coord { x: 0.5, y: 1.5 });
        assert_eq!(padded.max(), Coord { x: 3.5, y: 4.5 });
    }
}
