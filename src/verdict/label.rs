//! Maps meta-classifier ids to labels and labels to a detection flag.

use crate::error::PredictionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Benign,
    Defacement,
    Malware,
    Phishing,
}

impl Label {
    pub const ALL: [Label; 4] = [
        Label::Benign,
        Label::Defacement,
        Label::Malware,
        Label::Phishing,
    ];

    pub fn from_class_id(id: i64) -> Result<Self, PredictionError> {
        match id {
            0 => Ok(Label::Benign),
            1 => Ok(Label::Defacement),
            2 => Ok(Label::Malware),
            3 => Ok(Label::Phishing),
            other => Err(PredictionError::UnrecognizedClassId(other)),
        }
    }

    pub fn class_id(self) -> i64 {
        match self {
            Label::Benign => 0,
            Label::Defacement => 1,
            Label::Malware => 2,
            Label::Phishing => 3,
        }
    }

    /// True for every label except `Benign`.
    pub fn is_detection(self) -> bool {
        !matches!(self, Label::Benign)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Benign => "Benign",
            Label::Defacement => "Defacement",
            Label::Malware => "Malware",
            Label::Phishing => "Phishing",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown classifier label `{0}`")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_round_trip() {
        for label in Label::ALL {
            assert_eq!(Label::from_class_id(label.class_id()).unwrap(), label);
        }
    }

    #[test]
    fn unknown_ids_are_errors() {
        for id in [-1, 4, 99] {
            assert!(matches!(
                Label::from_class_id(id),
                Err(PredictionError::UnrecognizedClassId(x)) if x == id
            ));
        }
    }

    #[test]
    fn detection_is_false_only_for_benign() {
        for label in Label::ALL {
            assert_eq!(label.is_detection(), label.as_str() != "Benign");
        }
    }

    #[test]
    fn parse_is_exact() {
        assert_eq!("Phishing".parse::<Label>().unwrap(), Label::Phishing);
        assert_eq!(
            "phishing".parse::<Label>(),
            Err(UnknownLabel("phishing".to_string()))
        );
        assert_eq!(
            UnknownLabel("Spam".to_string()).to_string(),
            "unknown classifier label `Spam`"
        );
        assert_eq!(serde_json::to_string(&Label::Malware).unwrap(), "\"Malware\"");
    }
}
