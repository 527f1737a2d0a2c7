//! Predefined marker dictionaries.
//!
//! The bridge never decodes bits itself; a dictionary here is a name the
//! vision backend resolves to its own code table. Names and numeric ids
//! follow OpenCV's `PredefinedDictionaryType` so configs written for the
//! Java/Kotlin side keep working.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed ArUco/AprilTag dictionary known to the vision backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PredefinedDictionary {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_4X4_250")]
    Dict4x4_250,
    #[serde(rename = "DICT_4X4_1000")]
    Dict4x4_1000,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "DICT_5X5_1000")]
    Dict5x5_1000,
    #[serde(rename = "DICT_6X6_50")]
    Dict6x6_50,
    #[serde(rename = "DICT_6X6_100")]
    Dict6x6_100,
    #[serde(rename = "DICT_6X6_250")]
    #[default]
    Dict6x6_250,
    #[serde(rename = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "DICT_7X7_50")]
    Dict7x7_50,
    #[serde(rename = "DICT_7X7_100")]
    Dict7x7_100,
    #[serde(rename = "DICT_7X7_250")]
    Dict7x7_250,
    #[serde(rename = "DICT_7X7_1000")]
    Dict7x7_1000,
    #[serde(rename = "DICT_ARUCO_ORIGINAL")]
    ArucoOriginal,
    #[serde(rename = "DICT_APRILTAG_16h5")]
    AprilTag16h5,
    #[serde(rename = "DICT_APRILTAG_25h9")]
    AprilTag25h9,
    #[serde(rename = "DICT_APRILTAG_36h10")]
    AprilTag36h10,
    #[serde(rename = "DICT_APRILTAG_36h11")]
    AprilTag36h11,
}

use PredefinedDictionary::*;

const ALL: [PredefinedDictionary; 21] = [
    Dict4x4_50,
    Dict4x4_100,
    Dict4x4_250,
    Dict4x4_1000,
    Dict5x5_50,
    Dict5x5_100,
    Dict5x5_250,
    Dict5x5_1000,
    Dict6x6_50,
    Dict6x6_100,
    Dict6x6_250,
    Dict6x6_1000,
    Dict7x7_50,
    Dict7x7_100,
    Dict7x7_250,
    Dict7x7_1000,
    ArucoOriginal,
    AprilTag16h5,
    AprilTag25h9,
    AprilTag36h10,
    AprilTag36h11,
];

impl PredefinedDictionary {
    /// Every known dictionary, ordered by OpenCV id.
    pub fn all() -> &'static [PredefinedDictionary] {
        &ALL
    }

    /// OpenCV `PredefinedDictionaryType` value.
    #[inline]
    pub fn opencv_id(self) -> i32 {
        self as i32
    }

    pub fn from_opencv_id(id: i32) -> Option<Self> {
        usize::try_from(id).ok().and_then(|i| ALL.get(i).copied())
    }

    /// Number of distinct marker ids.
    pub fn marker_count(self) -> usize {
        match self {
            Dict4x4_50 | Dict5x5_50 | Dict6x6_50 | Dict7x7_50 => 50,
            Dict4x4_100 | Dict5x5_100 | Dict6x6_100 | Dict7x7_100 => 100,
            Dict4x4_250 | Dict5x5_250 | Dict6x6_250 | Dict7x7_250 => 250,
            Dict4x4_1000 | Dict5x5_1000 | Dict6x6_1000 | Dict7x7_1000 => 1000,
            ArucoOriginal => 1024,
            AprilTag16h5 => 30,
            AprilTag25h9 => 35,
            AprilTag36h10 => 2320,
            AprilTag36h11 => 587,
        }
    }

    /// OpenCV-style name, e.g. `DICT_6X6_250`.
    pub fn name(self) -> &'static str {
        match self {
            Dict4x4_50 => "DICT_4X4_50",
            Dict4x4_100 => "DICT_4X4_100",
            Dict4x4_250 => "DICT_4X4_250",
            Dict4x4_1000 => "DICT_4X4_1000",
            Dict5x5_50 => "DICT_5X5_50",
            Dict5x5_100 => "DICT_5X5_100",
            Dict5x5_250 => "DICT_5X5_250",
            Dict5x5_1000 => "DICT_5X5_1000",
            Dict6x6_50 => "DICT_6X6_50",
            Dict6x6_100 => "DICT_6X6_100",
            Dict6x6_250 => "DICT_6X6_250",
            Dict6x6_1000 => "DICT_6X6_1000",
            Dict7x7_50 => "DICT_7X7_50",
            Dict7x7_100 => "DICT_7X7_100",
            Dict7x7_250 => "DICT_7X7_250",
            Dict7x7_1000 => "DICT_7X7_1000",
            ArucoOriginal => "DICT_ARUCO_ORIGINAL",
            AprilTag16h5 => "DICT_APRILTAG_16h5",
            AprilTag25h9 => "DICT_APRILTAG_25h9",
            AprilTag36h10 => "DICT_APRILTAG_36h10",
            AprilTag36h11 => "DICT_APRILTAG_36h11",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PredefinedDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown marker dictionary `{0}`")]
pub struct UnknownDictionary(pub String);

impl FromStr for PredefinedDictionary {
    type Err = UnknownDictionary;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownDictionary(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opencv_ids_round_trip_through_table() {
        for (i, d) in PredefinedDictionary::all().iter().enumerate() {
            assert_eq!(d.opencv_id(), i as i32);
            assert_eq!(PredefinedDictionary::from_opencv_id(i as i32), Some(*d));
        }
        assert_eq!(PredefinedDictionary::from_opencv_id(-1), None);
        assert_eq!(PredefinedDictionary::from_opencv_id(21), None);
    }

    #[test]
    fn default_is_six_by_six_250() {
        let d = PredefinedDictionary::default();
        assert_eq!(d.name(), "DICT_6X6_250");
        assert_eq!(d.marker_count(), 250);
        assert_eq!(d.opencv_id(), 10);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(
            "dict_4x4_50".parse::<PredefinedDictionary>(),
            Ok(PredefinedDictionary::Dict4x4_50)
        );
        assert!("DICT_9X9_1".parse::<PredefinedDictionary>().is_err());
    }

    #[test]
    fn serde_uses_opencv_names() {
        let json = serde_json::to_string(&PredefinedDictionary::AprilTag36h11).unwrap();
        assert_eq!(json, "\"DICT_APRILTAG_36h11\"");
    }
}
