//! Composite identifiers
//!
//! Nested remote objects are identified by every ancestor ID joined with `/`,
//! for example `instanceID/resolverID/ruleID`.

use crate::error::{Error, Result};

pub const ID_SEPARATOR: char = '/';

pub fn join_id(parts: &[&str]) -> String {
    parts.join("/")
}

/// Split a composite ID into exactly `N` non-empty parts
pub fn split_id<const N: usize>(id: &str) -> Result<[&str; N]> {
    let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
    if parts.len() != N || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::invalid_id(format!(
            "incorrect ID {}: expected {} parts separated by '{}'",
            id, N, ID_SEPARATOR
        )));
    }
    parts
        .try_into()
        .map_err(|_| Error::invalid_id(format!("incorrect ID {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_split() {
        let id = join_id(&["inst-1", "res-2", "rule-3"]);
        assert_eq!(id, "inst-1/res-2/rule-3");

        let [instance, resolver, rule] = split_id::<3>(&id).unwrap();
        assert_eq!(instance, "inst-1");
        assert_eq!(resolver, "res-2");
        assert_eq!(rule, "rule-3");
    }

    #[test]
    fn test_split_rejects_wrong_arity() {
        assert!(split_id::<2>("a/b/c").is_err());
        assert!(split_id::<3>("a/b").is_err());
        assert!(split_id::<2>("a/").is_err());
        assert!(split_id::<1>("").is_err());
    }

    #[test]
    fn test_single_part_id() {
        let [tenant] = split_id::<1>("tenant-123").unwrap();
        assert_eq!(tenant, "tenant-123");
    }
}
