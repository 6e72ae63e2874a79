use serde::{Deserialize, Serialize};

/// Sample kind a captured image belongs to. Doubles as the name of the
/// partition directory the image file is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    Blood,
    Stool,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Blood => "Blood",
            SampleKind::Stool => "Stool",
        }
    }
}

impl std::str::FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blood" => Ok(SampleKind::Blood),
            "stool" => Ok(SampleKind::Stool),
            other => Err(format!("unknown sample kind: {}", other)),
        }
    }
}

/// Metadata for a captured frame, appended to the `images` collection after
/// the image bytes are on disk. The record references the file by path; the
/// bytes are never embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub test_id: String,
    #[serde(rename = "type")]
    pub kind: SampleKind,
    pub path: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let record = ImageRecord {
            test_id: "test-1".to_string(),
            kind: SampleKind::Blood,
            path: "/data/images/Blood/capture-1.png".to_string(),
            created_at: "2026-08-28T10:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["testId"], "test-1");
        assert_eq!(json["type"], "Blood");
        assert_eq!(json["createdAt"], "2026-08-28T10:00:00Z");
    }

    #[test]
    fn test_sample_kind_from_str() {
        assert_eq!("Blood".parse::<SampleKind>().unwrap(), SampleKind::Blood);
        assert_eq!("stool".parse::<SampleKind>().unwrap(), SampleKind::Stool);
        assert!("tissue".parse::<SampleKind>().is_err());
    }
}
