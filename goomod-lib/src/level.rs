use std::fmt;

use serde::{Deserialize, Serialize};

use crate::xml::Element;

/// Metric an objective-completion target is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcdKind {
    #[serde(rename = "balls")]
    BallsCollected,
    #[serde(rename = "moves")]
    Moves,
    #[serde(rename = "time")]
    TimeSpent,
}

impl OcdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcdKind::BallsCollected => "balls",
            OcdKind::Moves => "moves",
            OcdKind::TimeSpent => "time",
        }
    }
}

/// Objective-completion descriptor: a metric paired with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ocd {
    pub kind: OcdKind,
    pub amount: u32,
}

impl Ocd {
    pub fn new(kind: OcdKind, amount: u32) -> Self {
        Self { kind, amount }
    }
}

impl fmt::Display for Ocd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.kind.as_str(), self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    id: String,
    name: String,
    description: String,
    ocd: Option<Ocd>,
}

impl Level {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            ocd: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ocd(mut self, ocd: Ocd) -> Self {
        self.ocd = Some(ocd);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn ocd(&self) -> Option<Ocd> {
        self.ocd
    }

    /// The `<level>` entry listed under `<levels>` in addin.xml.
    pub(crate) fn to_addin_element(&self) -> Element {
        let mut level = Element::new("level")
            .child(Element::new("dir").text(self.id.as_str()))
            .child(Element::new("name").attr("text", self.name.as_str()))
            .child(Element::new("subtitle").attr("text", self.description.as_str()));
        if let Some(ocd) = self.ocd {
            level.push(Element::new("ocd").text(ocd.to_string()));
        }
        level
    }
}
