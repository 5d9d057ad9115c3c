//! The data point model and its canonical text form `(id;[v1,...,vn];label)`.

use std::{fmt, str::FromStr};

use bytes::BufMut;
use uuid::Uuid;

use crate::{CommsErr, Deserialize, Result, Serialize};

/// The globally unique identifier of a data point.
///
/// Never empty and never contains `;`, `(` or `)`, so it can't break the text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(String);

impl PointId {
    /// Validates `id` as a point identifier.
    ///
    /// # Errors
    /// `CommsErr::MalformedId` if `id` is empty or contains a reserved character.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains([';', '(', ')']) {
            return Err(CommsErr::MalformedId(id));
        }

        Ok(Self(id))
    }

    /// A fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PointId {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.0.as_bytes());
    }
}

impl Deserialize for PointId {
    fn deserialize(buf: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(buf).map_err(|_| CommsErr::violation("a point id", buf))?;
        PointId::new(text)
    }
}

/// A single point: identifier, feature vector and optional label.
///
/// Points are never mutated, classifying one produces a new point through `classified`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    id: PointId,
    features: Vec<f64>,
    label: Option<String>,
}

impl DataPoint {
    /// Creates a new point with a random identifier.
    ///
    /// # Arguments
    /// * `features` - The feature vector.
    /// * `label` - The label of the point, an empty label is the same as none.
    pub fn new(features: Vec<f64>, label: Option<String>) -> Self {
        Self::with_id(PointId::random(), features, label)
    }

    /// Creates a new point with a known identifier.
    pub fn with_id(id: PointId, features: Vec<f64>, label: Option<String>) -> Self {
        Self {
            id,
            features,
            label: label.filter(|label| !label.is_empty()),
        }
    }

    /// Returns a copy of this point carrying `label`.
    pub fn classified(&self, label: impl Into<String>) -> Self {
        Self::with_id(self.id.clone(), self.features.clone(), Some(label.into()))
    }

    pub fn id(&self) -> &PointId {
        &self.id
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The dimensionality of the feature vector.
    pub fn dim(&self) -> usize {
        self.features.len()
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({};[", self.id)?;

        for (i, value) in self.features.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }

        write!(f, "];{})", self.label().unwrap_or_default())
    }
}

impl FromStr for DataPoint {
    type Err = CommsErr;

    fn from_str(text: &str) -> Result<Self> {
        let malformed = || CommsErr::MalformedPoint(text.to_string());

        let inner = text
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;

        let mut parts = inner.splitn(3, ';');
        let (Some(id), Some(features)) = (parts.next(), parts.next()) else {
            return Err(malformed());
        };
        let label = parts.next().map(str::to_string);

        let id = PointId::new(id).map_err(|_| malformed())?;

        let features = features
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(malformed)?;

        let features = if features.trim().is_empty() {
            Vec::new()
        } else {
            features
                .split(',')
                .map(|value| value.trim().parse::<f64>().map_err(|_| malformed()))
                .collect::<Result<_>>()?
        };

        Ok(Self::with_id(id, features, label))
    }
}

impl Serialize for DataPoint {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.to_string().as_bytes());
    }
}

impl Deserialize for DataPoint {
    fn deserialize(buf: &[u8]) -> Result<Self> {
        std::str::from_utf8(buf)
            .map_err(|_| CommsErr::MalformedPoint(String::from_utf8_lossy(buf).into_owned()))?
            .parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, features: &[f64], label: Option<&str>) -> DataPoint {
        DataPoint::with_id(
            PointId::new(id).unwrap(),
            features.to_vec(),
            label.map(str::to_string),
        )
    }

    #[test]
    fn serializes_canonical_form() {
        let p = point("p1", &[10.0, 100.5, -3.25], Some("1"));
        assert_eq!(p.to_string(), "(p1;[10,100.5,-3.25];1)");

        let q = point("q1", &[20.0, 50.0], None);
        assert_eq!(q.to_string(), "(q1;[20,50];)");
    }

    #[test]
    fn parse_inverts_serialize() {
        let points = [
            point("a", &[1.0, 2.0], Some("x")),
            point("b", &[0.1, 1e-12, 123456789.125, -0.0], None),
            point("c", &[], Some("label;with;semicolons")),
            point("d", &[f64::MAX, f64::MIN_POSITIVE], Some("trailing)")),
            DataPoint::new(vec![3.0; 8], Some("y".to_string())),
        ];

        for p in points {
            let parsed: DataPoint = p.to_string().parse().unwrap();
            assert_eq!(parsed, p);
        }
    }

    #[test]
    fn empty_and_absent_labels_are_equal() {
        let absent: DataPoint = "(a;[1,2];)".parse().unwrap();
        let omitted: DataPoint = "(a;[1,2])".parse().unwrap();
        let empty = point("a", &[1.0, 2.0], Some(""));

        assert_eq!(absent.label(), None);
        assert_eq!(absent, omitted);
        assert_eq!(absent, empty);
    }

    #[test]
    fn parse_tolerates_whitespace_in_numbers() {
        let p: DataPoint = "(a;[ 1 , 2.5 ];z)".parse().unwrap();
        assert_eq!(p.features(), &[1.0, 2.5]);
    }

    #[test]
    fn parse_rejects_malformed_text() {
        let cases = [
            "",
            "a;[1];x",
            "(a;[1];x",
            "a;[1];x)",
            "(a)",
            "(;[1];x)",
            "(a;1,2;x)",
            "(a;[1,two];x)",
            "(a;[1,,2];x)",
            "(a(b;[1];x)",
        ];

        for text in cases {
            assert!(
                matches!(text.parse::<DataPoint>(), Err(CommsErr::MalformedPoint(_))),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn classified_keeps_identity() {
        let query = point("q", &[1.0, 2.0], None);
        let classified = query.classified("a");

        assert_eq!(classified.id(), query.id());
        assert_eq!(classified.features(), query.features());
        assert_eq!(classified.label(), Some("a"));
        assert_eq!(query.label(), None);
    }

    #[test]
    fn point_id_rejects_reserved_characters() {
        for bad in ["", "a;b", "(a", "a)"] {
            assert!(matches!(PointId::new(bad), Err(CommsErr::MalformedId(_))));
        }

        assert_ne!(PointId::random(), PointId::random());
    }
}
