//! View properties, property patches and the partial/full merge.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Type tag of a view, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Search,
}

impl ViewType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "search" => Ok(ViewType::Search),
            _ => Err(Error::Invalid(format!("Unknown view type '{}'", s))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewType::Search => "search",
        }
    }

    /// Properties of a freshly created view of this type
    pub fn default_properties(self) -> ViewProperties {
        match self {
            ViewType::Search => ViewProperties {
                locale: "C".into(),
                cleanup_interval_step: 10,
                commit_interval_msec: 1000,
                consolidation_interval_msec: 10_000,
                consolidation_policy: ConsolidationPolicy {
                    kind: PolicyKind::BytesAccum,
                    threshold: 0.1,
                },
                links: BTreeMap::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreValues {
    #[default]
    None,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    BytesAccum,
    Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsolidationPolicy {
    #[serde(rename = "type")]
    pub kind: PolicyKind,
    pub threshold: f64,
}

/// How one linked collection is exposed to the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProperties {
    pub include_all_fields: bool,
    pub analyzers: Vec<String>,
    pub track_list_positions: bool,
    pub store_values: StoreValues,
}

impl Default for LinkProperties {
    fn default() -> Self {
        LinkProperties {
            include_all_fields: false,
            analyzers: vec!["identity".into()],
            track_list_positions: false,
            store_values: StoreValues::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewProperties {
    pub locale: String,
    pub cleanup_interval_step: u64,
    pub commit_interval_msec: u64,
    pub consolidation_interval_msec: u64,
    pub consolidation_policy: ConsolidationPolicy,
    /// Keyed by collection name
    pub links: BTreeMap<String, LinkProperties>,
}

impl ViewProperties {
    pub fn linked_collections(&self) -> Vec<String> {
        self.links.keys().cloned().collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.locale.is_empty() {
            return Err(Error::Invalid("locale cannot be empty".into()));
        }
        let t = self.consolidation_policy.threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(Error::Invalid(format!("consolidation threshold {} outside [0, 1]", t)));
        }
        for (name, link) in &self.links {
            if link.analyzers.iter().any(|a| a.is_empty()) {
                return Err(Error::Invalid(format!("link '{}' names an empty analyzer", name)));
            }
        }
        Ok(())
    }
}

/// Per-link patch: each present field overwrites, absent fields are kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkFields {
    pub include_all_fields: Option<bool>,
    pub analyzers: Option<Vec<String>>,
    pub track_list_positions: Option<bool>,
    pub store_values: Option<StoreValues>,
}

impl LinkFields {
    pub fn include_all_fields(mut self, v: bool) -> Self {
        self.include_all_fields = Some(v);
        self
    }

    pub fn analyzers<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analyzers = Some(v.into_iter().map(Into::into).collect());
        self
    }

    pub fn track_list_positions(mut self, v: bool) -> Self {
        self.track_list_positions = Some(v);
        self
    }

    pub fn store_values(mut self, v: StoreValues) -> Self {
        self.store_values = Some(v);
        self
    }

    fn apply(&self, link: &mut LinkProperties) {
        if let Some(v) = self.include_all_fields {
            link.include_all_fields = v;
        }
        if let Some(v) = &self.analyzers {
            link.analyzers = v.clone();
        }
        if let Some(v) = self.track_list_positions {
            link.track_list_positions = v;
        }
        if let Some(v) = self.store_values {
            link.store_values = v;
        }
    }
}

/// A link entry in a patch. In JSON, `null` is the removal marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPatch {
    Set(LinkFields),
    Remove,
}

impl<'de> Deserialize<'de> for LinkPatch {
    fn deserialize<D: Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<LinkFields>::deserialize(de)? {
            Some(fields) => LinkPatch::Set(fields),
            None => LinkPatch::Remove,
        })
    }
}

/// Requested change to a view's properties
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertiesPatch {
    pub locale: Option<String>,
    pub cleanup_interval_step: Option<u64>,
    pub commit_interval_msec: Option<u64>,
    pub consolidation_interval_msec: Option<u64>,
    pub consolidation_policy: Option<ConsolidationPolicy>,
    pub links: Option<BTreeMap<String, LinkPatch>>,
}

impl PropertiesPatch {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Invalid(format!("malformed properties patch: {}", e)))
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_commit_interval_msec(mut self, v: u64) -> Self {
        self.commit_interval_msec = Some(v);
        self
    }

    pub fn with_link(mut self, collection: impl Into<String>, fields: LinkFields) -> Self {
        self.links
            .get_or_insert_with(BTreeMap::new)
            .insert(collection.into(), LinkPatch::Set(fields));
        self
    }

    pub fn without_link(mut self, collection: impl Into<String>) -> Self {
        self.links
            .get_or_insert_with(BTreeMap::new)
            .insert(collection.into(), LinkPatch::Remove);
        self
    }

    /// Collections this patch names in `links`, whether set or removed
    pub fn link_names(&self) -> Vec<String> {
        self.links
            .as_ref()
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Compute the properties resulting from applying `patch` to `existing`.
///
/// Partial: present fields overwrite, absent fields are kept, links merge
/// field-by-field and only an explicit `Remove` drops one.
/// Full: the result starts from the type's defaults, so every field and link
/// the patch does not mention is reset (links to empty).
pub fn merge(
    view_type: ViewType,
    existing: &ViewProperties,
    patch: &PropertiesPatch,
    partial: bool,
) -> ViewProperties {
    let mut out = if partial {
        existing.clone()
    } else {
        view_type.default_properties()
    };
    if let Some(v) = &patch.locale {
        out.locale = v.clone();
    }
    if let Some(v) = patch.cleanup_interval_step {
        out.cleanup_interval_step = v;
    }
    if let Some(v) = patch.commit_interval_msec {
        out.commit_interval_msec = v;
    }
    if let Some(v) = patch.consolidation_interval_msec {
        out.consolidation_interval_msec = v;
    }
    if let Some(v) = patch.consolidation_policy {
        out.consolidation_policy = v;
    }
    if let Some(links) = &patch.links {
        for (name, entry) in links {
            match entry {
                LinkPatch::Remove => {
                    out.links.remove(name);
                }
                LinkPatch::Set(fields) => fields.apply(out.links.entry(name.clone()).or_default()),
            }
        }
    }
    out
}
