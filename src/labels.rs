use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two classes the detector learns. The set is fixed at compile time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    #[serde(rename = "not_touch")]
    NotTouching,
    #[serde(rename = "touched")]
    Touched,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::NotTouching, Label::Touched];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::NotTouching => "not_touch",
            Label::Touched => "touched",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_touch" => Ok(Label::NotTouching),
            "touched" => Ok(Label::Touched),
            _ => Err(anyhow::anyhow!("unknown label '{value}'")),
        }
    }
}
