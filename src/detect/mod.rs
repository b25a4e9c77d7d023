//! Signature detector
//!
//! Inspects a fetched page for configured integration signatures. The
//! engine treats the detector as opaque: `Ok` means processing succeeded,
//! whatever was (or was not) found.
//!
//! Signatures are matched case-insensitively against:
//! - the raw body
//! - resource URLs from `<script src>`, `<link href>`, `<iframe src>`
//! - response header values and names

use crate::crawler::FetchedPage;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Invalid selector '{0}': {1}")]
    Selector(String, String),
}

/// Where a signature was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Body,
    Resource,
    Header,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub signature: String,
    pub source: EvidenceSource,
    /// The resource URL or header that matched, when not the body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Summary of what the detector found on one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub found: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Distinct signatures that matched anywhere
    pub signatures: Vec<String>,

    pub evidence: Vec<Evidence>,
}

/// Content inspector consumed by workers
pub trait Detector: Send + Sync {
    fn detect(&self, page: &FetchedPage) -> Result<Detection, DetectError>;
}

const RESOURCE_SELECTORS: &[(&str, &str)] = &[
    ("script[src]", "src"),
    ("link[href]", "href"),
    ("iframe[src]", "src"),
];

/// Substring matcher over body, resources and headers
#[derive(Debug)]
pub struct SignatureDetector {
    signatures: Vec<String>,
    resources: Vec<(Selector, &'static str)>,
    title: Selector,
}

impl SignatureDetector {
    pub fn new(signatures: &[String]) -> Result<Self, DetectError> {
        let resources = RESOURCE_SELECTORS
            .iter()
            .map(|(css, attr)| Ok((parse_selector(css)?, *attr)))
            .collect::<Result<Vec<_>, DetectError>>()?;

        Ok(Self {
            signatures: signatures
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            resources,
            title: parse_selector("title")?,
        })
    }

    fn resource_urls(&self, document: &Html) -> Vec<String> {
        self.resources
            .iter()
            .flat_map(|(selector, attr)| {
                document
                    .select(selector)
                    .filter_map(move |element| element.value().attr(attr))
                    .map(str::to_string)
            })
            .collect()
    }
}

impl Detector for SignatureDetector {
    fn detect(&self, page: &FetchedPage) -> Result<Detection, DetectError> {
        let document = Html::parse_document(&page.body);
        let title = document
            .select(&self.title)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        let body = page.body.to_ascii_lowercase();
        let resources = self.resource_urls(&document);
        let mut evidence = Vec::new();

        for signature in &self.signatures {
            if body.contains(signature.as_str()) {
                evidence.push(Evidence {
                    signature: signature.clone(),
                    source: EvidenceSource::Body,
                    context: None,
                });
            }

            for resource in &resources {
                if resource.to_ascii_lowercase().contains(signature.as_str()) {
                    evidence.push(Evidence {
                        signature: signature.clone(),
                        source: EvidenceSource::Resource,
                        context: Some(resource.clone()),
                    });
                }
            }

            for (name, value) in &page.headers {
                let header = format!("{}: {}", name, value).to_ascii_lowercase();
                if header.contains(signature.as_str()) {
                    evidence.push(Evidence {
                        signature: signature.clone(),
                        source: EvidenceSource::Header,
                        context: Some(name.clone()),
                    });
                }
            }
        }

        let mut signatures: Vec<String> = evidence.iter().map(|e| e.signature.clone()).collect();
        signatures.dedup();

        Ok(Detection {
            found: !evidence.is_empty(),
            title,
            signatures,
            evidence,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector, DetectError> {
    Selector::parse(css).map_err(|e| DetectError::Selector(css.to_string(), e.to_string()))
}
