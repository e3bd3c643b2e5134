use mime::Mime;
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

/// A namespace's upload allow-list, stored as comma separated TEXT.
///
/// Entries are normalized to lowercase MIME essences (`type/subtype`,
/// parameters dropped). An empty list allows nothing.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq, Default)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct DMimeList(Vec<String>);

impl DMimeList {
    fn normalize(entry: &str) -> Option<String> {
        let essence = entry.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            return None;
        }
        Some(essence.to_ascii_lowercase())
    }

    pub fn allows(&self, mime: &Mime) -> bool {
        let essence = mime.essence_str();
        self.0.iter().any(|entry| entry.eq_ignore_ascii_case(essence))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for DMimeList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut entries: Vec<String> = Vec::new();
        for entry in iter {
            if let Some(essence) = Self::normalize(entry.as_ref()) {
                if !entries.contains(&essence) {
                    entries.push(essence);
                }
            }
        }
        Self(entries)
    }
}

impl From<Vec<String>> for DMimeList {
    fn from(entries: Vec<String>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<DMimeList> for Vec<String> {
    fn from(val: DMimeList) -> Self {
        val.0
    }
}

impl Decode<'_, Sqlite> for DMimeList {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Sqlite>>::decode(value)?;
        Ok(s.split(',').collect())
    }
}

impl Encode<'_, Sqlite> for DMimeList {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Text(self.0.join(",").into()));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for DMimeList {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_normalized() {
        let list: DMimeList = ["Image/PNG", " text/plain; charset=utf-8 ", "", "image/png"]
            .into_iter()
            .collect();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["image/png", "text/plain"]);
    }

    #[test]
    fn test_allows_matches_on_essence() {
        let list: DMimeList = ["text/plain"].into_iter().collect();
        let mime: Mime = "text/plain; charset=utf-8".parse().unwrap();
        assert!(list.allows(&mime));
        assert!(!list.allows(&mime::IMAGE_PNG));
    }

    #[test]
    fn test_empty_list_allows_nothing() {
        let list = DMimeList::default();
        assert!(list.is_empty());
        assert!(!list.allows(&mime::TEXT_PLAIN));
        assert!(!list.allows(&mime::APPLICATION_OCTET_STREAM));
    }
}
