use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShotScaleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotClass {
    Close,
    Medium,
    Large,
    Others,
}

impl ShotClass {
    pub const ALL: [ShotClass; 4] = [
        ShotClass::Close,
        ShotClass::Medium,
        ShotClass::Large,
        ShotClass::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShotClass::Close => "close",
            ShotClass::Medium => "medium",
            ShotClass::Large => "large",
            ShotClass::Others => "others",
        }
    }
}

impl fmt::Display for ShotClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer label from the catalog, only constructible for codes present in the class mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassLabel(u8);

impl ClassLabel {
    pub fn new(code: u8) -> Option<Self> {
        Self::shot_class_for(code).map(|_| Self(code))
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn shot_class(&self) -> ShotClass {
        Self::shot_class_for(self.0).unwrap_or(ShotClass::Others)
    }

    fn shot_class_for(code: u8) -> Option<ShotClass> {
        match code {
            0 => Some(ShotClass::Close),
            1 => Some(ShotClass::Medium),
            2 => Some(ShotClass::Large),
            9 => Some(ShotClass::Others),
            _ => None,
        }
    }
}

impl FromStr for ClassLabel {
    type Err = ();

    // Catalog exports sometimes write labels as floats ("1.0").
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed: f64 = value.trim().parse().map_err(|_| ())?;
        if parsed.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&parsed) {
            return Err(());
        }
        Self::new(parsed as u8).ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MovieKey(String);

impl MovieKey {
    pub fn derive(director: &str, title: &str) -> Self {
        let key = format!("{}_-_{}", sanitize(director), sanitize(title));
        Self(deunicode::deunicode(&key))
    }

    pub fn from_normalized(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MovieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(value: &str) -> String {
    value.replace(' ', "_").replace('\'', "")
}

pub fn parse_timestamp(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let seconds: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeAlgorithm {
    Cropped,
    Rescale,
}

impl ResizeAlgorithm {
    /// An algorithm must be chosen explicitly; there is no implicit default.
    pub fn require(value: Option<Self>) -> Result<Self, ShotScaleError> {
        value.ok_or_else(|| ShotScaleError::UnsupportedAlgorithm("unset".to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeAlgorithm::Cropped => "cropped",
            ResizeAlgorithm::Rescale => "rescale",
        }
    }
}

impl fmt::Display for ResizeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeAlgorithm {
    type Err = ShotScaleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cropped" | "crop" => Ok(ResizeAlgorithm::Cropped),
            "rescale" | "rescaled" => Ok(ResizeAlgorithm::Rescale),
            _ => Err(ShotScaleError::UnsupportedAlgorithm(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    None,
    Random,
    Director,
    Movie,
}

impl SplitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitStrategy::None => "none",
            SplitStrategy::Random => "random",
            SplitStrategy::Director => "director",
            SplitStrategy::Movie => "movie",
        }
    }
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitStrategy {
    type Err = ShotScaleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SplitStrategy::None),
            "random" => Ok(SplitStrategy::Random),
            "director" => Ok(SplitStrategy::Director),
            "movie" => Ok(SplitStrategy::Movie),
            _ => Err(ShotScaleError::UnsupportedStrategy(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsetKind {
    Training,
    Validation,
    Testing,
}

impl SubsetKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            SubsetKind::Training => "training",
            SubsetKind::Validation => "validation",
            SubsetKind::Testing => "testing",
        }
    }
}

impl fmt::Display for SubsetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub sequence_id: u32,
    pub year: Option<u16>,
    pub director: Option<String>,
    pub title: Option<String>,
    pub timestamp_seconds: u32,
    pub class_label: ClassLabel,
}

impl CatalogRecord {
    pub fn movie_key(&self) -> MovieKey {
        MovieKey::derive(
            self.director.as_deref().unwrap_or_default(),
            self.title.as_deref().unwrap_or_default(),
        )
    }

    pub fn shot_class(&self) -> ShotClass {
        self.class_label.shot_class()
    }

    pub fn asset_identity(&self) -> String {
        let year = self
            .year
            .map(|year| year.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let identity = format!(
            "{}_{}_{}_{}",
            self.director.as_deref().unwrap_or("unknown"),
            year,
            self.title.as_deref().unwrap_or("unknown"),
            self.sequence_id
        );
        identity.replace(['/', '\\'], "_")
    }

    /// Remote object key, `{year}_{movie_key}/{sequence_id:05}.jpg`.
    pub fn object_key(&self) -> Result<String, ShotScaleError> {
        let mut missing = Vec::new();
        if self.year.is_none() {
            missing.push("year");
        }
        if self.director.as_deref().is_none_or(str::is_empty) {
            missing.push("director");
        }
        if self.title.as_deref().is_none_or(str::is_empty) {
            missing.push("title");
        }
        if self.sequence_id == 0 {
            missing.push("sequence id");
        }
        let Some(year) = self.year.filter(|_| missing.is_empty()) else {
            return Err(ShotScaleError::IncompleteRecord {
                sequence_id: self.sequence_id,
                missing: missing.join(", "),
            });
        };
        Ok(format!(
            "{}_{}/{:05}.jpg",
            year,
            self.movie_key(),
            self.sequence_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn record() -> CatalogRecord {
        CatalogRecord {
            sequence_id: 7,
            year: Some(1960),
            director: Some("Jean-Luc Godard".to_string()),
            title: Some("À bout de souffle".to_string()),
            timestamp_seconds: 12,
            class_label: ClassLabel::new(1).unwrap(),
        }
    }

    #[test]
    fn movie_key_is_ascii_and_underscored() {
        let key = MovieKey::derive("Jean-Luc Godard", "À bout de souffle");
        assert_eq!(key.as_str(), "Jean-Luc_Godard_-_A_bout_de_souffle");
    }

    #[test]
    fn movie_key_strips_apostrophes() {
        let key = MovieKey::derive("Jane Doe", "Don't Look");
        assert_eq!(key.as_str(), "Jane_Doe_-_Dont_Look");
    }

    #[test]
    fn object_key_pads_sequence() {
        assert_eq!(
            record().object_key().unwrap(),
            "1960_Jean-Luc_Godard_-_A_bout_de_souffle/00007.jpg"
        );
    }

    #[test]
    fn object_key_requires_identity() {
        let mut incomplete = record();
        incomplete.year = None;
        assert_matches!(
            incomplete.object_key(),
            Err(ShotScaleError::IncompleteRecord { sequence_id: 7, .. })
        );
    }

    #[test]
    fn class_labels() {
        assert_eq!(
            "9".parse::<ClassLabel>().unwrap().shot_class(),
            ShotClass::Others
        );
        assert_eq!(
            "1.0".parse::<ClassLabel>().unwrap().shot_class(),
            ShotClass::Medium
        );
        assert!("3".parse::<ClassLabel>().is_err());
        assert!("1.5".parse::<ClassLabel>().is_err());
        assert!("close".parse::<ClassLabel>().is_err());
    }

    #[test]
    fn timestamps() {
        assert_eq!(parse_timestamp("01:02:03"), Some(3723));
        assert_eq!(parse_timestamp("00:00:00"), Some(0));
        assert_eq!(parse_timestamp("1:61:00"), None);
        assert_eq!(parse_timestamp("12:00"), None);
        assert_eq!(parse_timestamp("9999999:00:00"), None);
    }

    #[test]
    fn strategies_parse() {
        assert_eq!("Movie".parse::<SplitStrategy>().unwrap(), SplitStrategy::Movie);
        assert_matches!(
            "alphabetical".parse::<SplitStrategy>(),
            Err(ShotScaleError::UnsupportedStrategy(_))
        );
        assert_matches!(
            ResizeAlgorithm::require(None),
            Err(ShotScaleError::UnsupportedAlgorithm(_))
        );
    }
}
