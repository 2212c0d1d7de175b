//! MIME part trees from server-reported BODYSTRUCTURE
//!
//! The server describes a message's parts without sending their
//! content. We convert that description into a [`MimePartNode`] tree
//! and use it to decide which messages are worth downloading.

use imap_proto::types::BodyStructure;
use std::borrow::Cow;

/// A node in a message's MIME structure: either a leaf part or a
/// multipart container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePartNode {
    Leaf {
        /// Lowercased `type/subtype`.
        content_type: String,
        /// Disposition type as sent by the server (`attachment`,
        /// `inline`, ...), `None` when the part has none.
        disposition: Option<String>,
        filename: Option<String>,
        content_id: Option<String>,
        /// Encoded size in octets.
        size: u32,
    },
    Composite {
        /// Lowercased multipart subtype (`mixed`, `alternative`, ...).
        subtype: String,
        children: Vec<MimePartNode>,
    },
}

impl MimePartNode {
    /// Build a tree from an `imap-proto` body structure.
    ///
    /// `message/rfc822` parts are leaves: an attached email counts by
    /// its own disposition, not by what it contains.
    #[must_use]
    pub fn from_body_structure(bs: &BodyStructure<'_>) -> Self {
        match bs {
            BodyStructure::Basic { common, other, .. }
            | BodyStructure::Text { common, other, .. }
            | BodyStructure::Message { common, other, .. } => {
                let disposition = common.disposition.as_ref();
                let filename = disposition
                    .and_then(|d| find_param(d.params.as_deref(), "filename"))
                    .or_else(|| find_param(common.ty.params.as_deref(), "name"));

                Self::Leaf {
                    content_type: format!("{}/{}", common.ty.ty, common.ty.subtype)
                        .to_ascii_lowercase(),
                    disposition: disposition.map(|d| d.ty.to_string()),
                    filename,
                    content_id: other.id.as_ref().map(ToString::to_string),
                    size: other.octets,
                }
            }
            BodyStructure::Multipart { common, bodies, .. } => Self::Composite {
                subtype: common.ty.subtype.to_ascii_lowercase(),
                children: bodies.iter().map(Self::from_body_structure).collect(),
            },
        }
    }

    /// Whether this leaf's disposition is `attachment`.
    ///
    /// A missing disposition is never an attachment, whatever the
    /// content type or size.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        match self {
            Self::Leaf { disposition, .. } => disposition
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case("attachment")),
            Self::Composite { .. } => false,
        }
    }

    /// Whether any leaf anywhere in the tree is an attachment.
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        match self {
            Self::Leaf { .. } => self.is_attachment(),
            Self::Composite { children, .. } => children.iter().any(Self::has_attachment),
        }
    }

    #[must_use]
    pub fn attachment_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => usize::from(self.is_attachment()),
            Self::Composite { children, .. } => {
                children.iter().map(Self::attachment_count).sum()
            }
        }
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Composite { children, .. } => children.iter().map(Self::leaf_count).sum(),
        }
    }

    /// `type/subtype` of this node; composites report `multipart/*`.
    #[must_use]
    pub fn content_type(&self) -> String {
        match self {
            Self::Leaf { content_type, .. } => content_type.clone(),
            Self::Composite { subtype, .. } => format!("multipart/{subtype}"),
        }
    }

    /// One line per attachment leaf, in MIME order, for diagnostics.
    #[must_use]
    pub fn describe_attachments(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_descriptions(&mut out);
        out
    }

    fn collect_descriptions(&self, out: &mut Vec<String>) {
        match self {
            Self::Leaf {
                content_type,
                filename,
                content_id,
                size,
                ..
            } if self.is_attachment() => {
                let name = filename.as_deref().unwrap_or("unnamed");
                match content_id {
                    Some(cid) => {
                        out.push(format!("{name} ({content_type}, {size} octets, cid {cid})"));
                    }
                    None => out.push(format!("{name} ({content_type}, {size} octets)")),
                }
            }
            Self::Leaf { .. } => {}
            Self::Composite { children, .. } => {
                for child in children {
                    child.collect_descriptions(out);
                }
            }
        }
    }

    /// Nesting depth; a lone leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Composite { children, .. } => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
        }
    }
}

fn find_param(params: Option<&[(Cow<'_, str>, Cow<'_, str>)]>, key: &str) -> Option<String> {
    params?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.to_string())
}
