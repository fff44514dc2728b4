//! Read representation of preprints.
//!
//! Links are absolute; the API, web and DOI resolver bases are configured
//! and always end in `/`, so every link is a plain concatenation.

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::domain::subjects::Subject;

use super::document::PREPRINT_RESOURCE_TYPE;
use super::service::PreprintView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprintLinks {
    api_base: String,
    web_base: String,
    doi_resolver: String,
}

impl PreprintLinks {
    pub fn new(
        api_base: impl Into<String>,
        web_base: impl Into<String>,
        doi_resolver: impl Into<String>,
    ) -> Self {
        Self {
            api_base: with_trailing_slash(api_base.into()),
            web_base: with_trailing_slash(web_base.into()),
            doi_resolver: with_trailing_slash(doi_resolver.into()),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn web(&self, path: &str) -> String {
        format!("{}{}", self.web_base, path)
    }

    /// Absolute download URL of a stored file.
    pub fn file_download(&self, file_id: &str) -> String {
        self.api(&format!("v2/files/{file_id}/download/"))
    }

    fn doi(&self, doi: &str) -> String {
        format!("{}{}", self.doi_resolver, doi)
    }
}

fn with_trailing_slash(mut base: String) -> String {
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

#[derive(Debug, Serialize)]
pub struct PreprintDocumentOut {
    pub data: PreprintResource,
}

#[derive(Debug, Serialize)]
pub struct PreprintResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: &'static str,
    pub attributes: PreprintAttributes,
    pub relationships: PreprintRelationships,
    pub links: PreprintResourceLinks,
}

#[derive(Debug, Serialize)]
pub struct PreprintAttributes {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub tags: Vec<String>,
    pub provider: Option<String>,
    pub subjects: Vec<Subject>,
    pub doi: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_created: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_modified: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct PreprintRelationships {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_file: Option<Relationship>,
    pub files: Relationship,
    pub contributors: Relationship,
}

#[derive(Debug, Serialize)]
pub struct Relationship {
    pub links: RelationshipLinks,
}

#[derive(Debug, Serialize)]
pub struct RelationshipLinks {
    pub related: RelatedLink,
}

#[derive(Debug, Serialize)]
pub struct RelatedLink {
    pub href: String,
    pub meta: Value,
}

#[derive(Debug, Serialize)]
pub struct PreprintResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub html: String,
    pub doi: Option<String>,
}

fn related(href: String, meta: Value) -> Relationship {
    Relationship {
        links: RelationshipLinks {
            related: RelatedLink { href, meta },
        },
    }
}

#[derive(Debug, Clone)]
pub struct PreprintSerializer {
    links: PreprintLinks,
}

impl PreprintSerializer {
    pub fn new(links: PreprintLinks) -> Self {
        Self { links }
    }

    pub fn links(&self) -> &PreprintLinks {
        &self.links
    }

    pub fn to_document(&self, view: &PreprintView) -> PreprintDocumentOut {
        PreprintDocumentOut {
            data: self.to_resource(view),
        }
    }

    pub fn to_resource(&self, view: &PreprintView) -> PreprintResource {
        let node = &view.node;
        let id = node.id.clone();

        PreprintResource {
            attributes: PreprintAttributes {
                title: node.title.clone(),
                abstract_text: node.description.clone(),
                // BTreeSet iteration is already sorted.
                tags: node.tags.iter().cloned().collect(),
                provider: node.preprint_provider.clone(),
                subjects: view.subjects.clone(),
                doi: node.preprint_doi.clone(),
                date_created: node.preprint_created,
                date_modified: node.date_modified,
            },
            relationships: PreprintRelationships {
                primary_file: node.preprint_file.as_deref().map(|file_id| {
                    related(self.links.api(&format!("v2/files/{file_id}/")), json!({}))
                }),
                files: related(self.links.api(&format!("v2/nodes/{id}/files/")), json!({})),
                contributors: related(
                    self.links.api(&format!("v2/nodes/{id}/contributors/")),
                    json!({ "count": node.contributor_count() }),
                ),
            },
            links: PreprintResourceLinks {
                self_link: self.links.api(&format!("v2/preprints/{id}/")),
                html: self.links.web(&format!("{id}/")),
                doi: node.preprint_doi.as_deref().map(|doi| self.links.doi(doi)),
            },
            resource_type: PREPRINT_RESOURCE_TYPE,
            id,
        }
    }
}
