use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::knowledge::{TraceLink, ELEMENT_ID_SEPARATOR};
use crate::domain::DomainError;

/// Rewrites trace link identifiers into the naming of a gold standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceLinkIdPostprocessor {
    #[default]
    Identity,
    /// File names without extension on both sides
    Req2Code,
    /// Sentence number (one-based) of the documentation to code
    Sad2Code,
    Sam2Sad,
    Sad2Sam,
    Sam2Code,
    /// File names without their last extension on both sides
    Req2Req,
}

impl fmt::Display for TraceLinkIdPostprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceLinkIdPostprocessor::Identity => "identity",
            TraceLinkIdPostprocessor::Req2Code => "req2code",
            TraceLinkIdPostprocessor::Sad2Code => "sad2code",
            TraceLinkIdPostprocessor::Sam2Sad => "sam2sad",
            TraceLinkIdPostprocessor::Sad2Sam => "sad2sam",
            TraceLinkIdPostprocessor::Sam2Code => "sam2code",
            TraceLinkIdPostprocessor::Req2Req => "req2req",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TraceLinkIdPostprocessor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(TraceLinkIdPostprocessor::Identity),
            "req2code" => Ok(TraceLinkIdPostprocessor::Req2Code),
            "sad2code" => Ok(TraceLinkIdPostprocessor::Sad2Code),
            "sam2sad" => Ok(TraceLinkIdPostprocessor::Sam2Sad),
            "sad2sam" => Ok(TraceLinkIdPostprocessor::Sad2Sam),
            "sam2code" => Ok(TraceLinkIdPostprocessor::Sam2Code),
            "req2req" => Ok(TraceLinkIdPostprocessor::Req2Req),
            _ => Err(DomainError::configuration(format!(
                "Unknown postprocessor: {}. Valid postprocessors: identity, req2code, sad2code, \
                 sam2sad, sad2sam, sam2code, req2req",
                s
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for TraceLinkIdPostprocessor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

fn before_first_dot(id: &str) -> Result<String, DomainError> {
    id.split_once('.')
        .map(|(stem, _)| stem.to_string())
        .ok_or_else(|| DomainError::validation(format!("Identifier '{}' has no extension", id)))
}

fn before_last_dot(id: &str) -> Result<String, DomainError> {
    id.rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .ok_or_else(|| DomainError::validation(format!("Identifier '{}' has no extension", id)))
}

fn after_separator(id: &str) -> &str {
    id.rsplit_once(ELEMENT_ID_SEPARATOR)
        .map_or(id, |(_, suffix)| suffix)
}

fn sad_id(id: &str) -> Result<String, DomainError> {
    let index: u64 = after_separator(id).parse().map_err(|_| {
        DomainError::validation(format!("Identifier '{}' does not end in a sentence index", id))
    })?;
    Ok((index + 1).to_string())
}

fn sam_id(id: &str) -> Result<String, DomainError> {
    Ok(after_separator(id).to_string())
}

fn unchanged(id: &str) -> Result<String, DomainError> {
    Ok(id.to_string())
}

type IdProcessor = fn(&str) -> Result<String, DomainError>;

impl TraceLinkIdPostprocessor {
    fn processors(&self) -> (IdProcessor, IdProcessor) {
        match self {
            TraceLinkIdPostprocessor::Identity => (unchanged, unchanged),
            TraceLinkIdPostprocessor::Req2Code => (before_first_dot, before_first_dot),
            TraceLinkIdPostprocessor::Sad2Code => (sad_id, unchanged),
            TraceLinkIdPostprocessor::Sam2Sad => (sam_id, sad_id),
            TraceLinkIdPostprocessor::Sad2Sam => (sad_id, sam_id),
            TraceLinkIdPostprocessor::Sam2Code => (sam_id, unchanged),
            TraceLinkIdPostprocessor::Req2Req => (before_last_dot, before_last_dot),
        }
    }

    pub fn postprocess(
        &self,
        links: BTreeSet<TraceLink>,
    ) -> Result<BTreeSet<TraceLink>, DomainError> {
        if *self == TraceLinkIdPostprocessor::Identity {
            return Ok(links);
        }

        let (source, target) = self.processors();
        links
            .iter()
            .map(|link| Ok(TraceLink::new(source(link.source_id())?, target(link.target_id())?)))
            .collect()
    }
}
