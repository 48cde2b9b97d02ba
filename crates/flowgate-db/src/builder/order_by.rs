//! `ORDER BY` emission: verbatim field list, direction
//! upper-cased.

use flowgate_config::SortSpec;

/// `None` for an empty sort list, else `"ORDER BY f1 DIR1, f2 DIR2, ..."`.
#[must_use]
pub fn build(sort: &[SortSpec]) -> Option<String> {
    if sort.is_empty() {
        return None;
    }
    let parts: Vec<String> = sort.iter().map(|s| format!("{} {}", s.field, s.order.as_sql())).collect();
    Some(format!("ORDER BY {}", parts.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_config::SortOrder;

    #[test]
    fn empty_sort_yields_none() {
        assert!(build(&[]).is_none());
    }

    #[test]
    fn multiple_sort_keys_join_with_comma() {
        let sort = vec![
            SortSpec { field: "id".to_string(), order: SortOrder::Desc },
            SortSpec { field: "name".to_string(), order: SortOrder::Asc },
        ];
        assert_eq!(build(&sort).unwrap(), "ORDER BY id DESC, name ASC");
    }
}
