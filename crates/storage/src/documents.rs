use crate::backend::StoreError;
use domain::Partition;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Comments,
    Replies,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comments => "comments",
            Self::Replies => "replies",
        }
    }

    /// `{kind}/{siteId}/{pageName}.json`
    pub fn key(&self, partition: &Partition) -> String {
        format!(
            "{}/{}/{}.json",
            self.as_str(),
            partition.site_id,
            partition.page
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeOut<'a, T> {
    schema_version: u32,
    items: &'a [T],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnvelopeIn<T> {
    #[serde(rename_all = "camelCase")]
    Versioned {
        #[allow(dead_code)]
        schema_version: u32,
        items: Vec<T>,
    },
    // 早期文档直接是 JSON 数组
    Legacy(Vec<T>),
}

pub fn decode<T: DeserializeOwned>(key: &str, body: &str) -> Result<Vec<T>, StoreError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<EnvelopeIn<T>>(body) {
        Ok(EnvelopeIn::Versioned { items, .. }) | Ok(EnvelopeIn::Legacy(items)) => Ok(items),
        Err(source) => Err(StoreError::Corrupt {
            key: key.to_string(),
            source,
        }),
    }
}

pub fn encode<T: Serialize>(key: &str, items: &[T]) -> Result<String, StoreError> {
    serde_json::to_string_pretty(&EnvelopeOut {
        schema_version: SCHEMA_VERSION,
        items,
    })
    .map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}
