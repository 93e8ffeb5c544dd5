use crate::domain::models::{CycleContent, CycleItem, CycleItemEdit, CycleItemType, NewCycleItem};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleListError {
    #[error("{0}")]
    Validation(String),
    #[error("cycle item not found: {0}")]
    NotFound(String),
}

pub fn next_item_id(item_type: CycleItemType) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{sequence}", item_type.as_str(), Utc::now().timestamp_micros())
}

pub fn fallback_item() -> CycleItem {
    CycleItem {
        id: next_item_id(CycleItemType::Time),
        label: CycleItemType::Time.default_label().to_string(),
        enabled: true,
        duration: 0,
        content: CycleContent::Time,
    }
}

pub fn default_items() -> Vec<CycleItem> {
    vec![fallback_item()]
}

pub fn add(items: &[CycleItem], new_item: NewCycleItem) -> Result<Vec<CycleItem>, CycleListError> {
    new_item.validate().map_err(CycleListError::Validation)?;
    let item_type = new_item.content.item_type();
    let label = new_item
        .label
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(item_type.default_label())
        .to_string();

    let mut next = items.to_vec();
    next.push(CycleItem {
        id: next_item_id(item_type),
        label,
        enabled: new_item.enabled.unwrap_or(true),
        duration: new_item.duration.unwrap_or(0),
        content: new_item.content,
    });
    Ok(next)
}

pub fn toggle(items: &[CycleItem], id: &str) -> Result<Vec<CycleItem>, CycleListError> {
    let mut next = items.to_vec();
    let item = next
        .iter_mut()
        .find(|item| item.id == id)
        .ok_or_else(|| CycleListError::NotFound(id.to_string()))?;
    item.enabled = !item.enabled;
    Ok(next)
}

pub fn delete(items: &[CycleItem], id: &str) -> Result<Vec<CycleItem>, CycleListError> {
    if !items.iter().any(|item| item.id == id) {
        return Err(CycleListError::NotFound(id.to_string()));
    }
    let next: Vec<CycleItem> = items.iter().filter(|item| item.id != id).cloned().collect();
    Ok(repair_empty(next))
}

/// Ids the list does not know are dropped; stored items the order omits keep their
/// relative order after the ordered ones.
pub fn reorder(items: &[CycleItem], order: &[String]) -> Vec<CycleItem> {
    let mut placed = HashSet::new();
    let mut next = Vec::with_capacity(items.len());

    for id in order {
        if placed.contains(id.as_str()) {
            continue;
        }
        if let Some(item) = items.iter().find(|item| &item.id == id) {
            placed.insert(item.id.as_str());
            next.push(item.clone());
        }
    }
    for item in items {
        if !placed.contains(item.id.as_str()) {
            next.push(item.clone());
        }
    }
    next
}

pub fn edit(
    items: &[CycleItem],
    id: &str,
    changes: &CycleItemEdit,
) -> Result<Vec<CycleItem>, CycleListError> {
    let mut next = items.to_vec();
    let item = next
        .iter_mut()
        .find(|item| item.id == id)
        .ok_or_else(|| CycleListError::NotFound(id.to_string()))?;

    if let Some(label) = &changes.label {
        item.label = label.trim().to_string();
    }
    if let Some(enabled) = changes.enabled {
        item.enabled = enabled;
    }
    if let Some(duration) = changes.duration {
        item.duration = duration;
    }
    if let Some(content) = &changes.content {
        content.validate().map_err(CycleListError::Validation)?;
        item.content = content.clone();
    }
    Ok(next)
}

/// Canonical form of a full-list write: every item valid, ids unique (first wins),
/// never empty.
pub fn normalize(items: Vec<CycleItem>) -> Result<Vec<CycleItem>, CycleListError> {
    let mut seen = HashSet::new();
    let mut next = Vec::with_capacity(items.len());
    for item in items {
        item.validate().map_err(CycleListError::Validation)?;
        if seen.insert(item.id.clone()) {
            next.push(item);
        }
    }
    Ok(repair_empty(next))
}

fn repair_empty(items: Vec<CycleItem>) -> Vec<CycleItem> {
    if items.is_empty() {
        default_items()
    } else {
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(id: &str) -> CycleItem {
        CycleItem {
            id: id.to_string(),
            label: id.to_uppercase(),
            enabled: true,
            duration: 0,
            content: CycleContent::Weather,
        }
    }

    fn ids(items: &[CycleItem]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    fn order(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn ids_are_unique_within_one_instant() {
        let first = next_item_id(CycleItemType::Text);
        let second = next_item_id(CycleItemType::Text);
        assert_ne!(first, second);
        assert!(first.starts_with("text-"));
    }

    #[test]
    fn add_appends_with_default_label() {
        let items = vec![item("a")];
        let next = add(&items, NewCycleItem::new(CycleContent::Bcd)).expect("add item");

        assert_eq!(next.len(), 2);
        assert_eq!(next[1].label, "Binary Clock");
        assert!(next[1].enabled);
        assert!(next[1].id.starts_with("bcd-"));
    }

    #[test]
    fn add_rejects_invalid_payload_without_mutation() {
        let items = vec![item("a")];
        let result = add(
            &items,
            NewCycleItem::new(CycleContent::Qr {
                qr_data: " ".to_string(),
            }),
        );
        assert!(matches!(result, Err(CycleListError::Validation(_))));
    }

    #[test]
    fn toggle_flips_enabled() {
        let next = toggle(&[item("a"), item("b")], "b").expect("toggle");
        assert!(next[0].enabled);
        assert!(!next[1].enabled);
    }

    #[test]
    fn toggle_unknown_id_is_not_found() {
        let result = toggle(&[item("a")], "missing");
        assert_eq!(result, Err(CycleListError::NotFound("missing".to_string())));
    }

    #[test]
    fn deleting_last_item_synthesizes_time_item() {
        let next = delete(&[item("a")], "a").expect("delete");
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].content, CycleContent::Time);
        assert!(next[0].enabled);
        assert_eq!(next[0].duration, 0);
    }

    #[test]
    fn reorder_reads_back_exact_order() {
        let items = vec![item("a"), item("b"), item("c")];
        let next = reorder(&items, &order(&["c", "a", "b"]));
        assert_eq!(ids(&next), vec!["c", "a", "b"]);
    }

    #[test]
    fn reorder_drops_unknown_and_appends_omitted() {
        let items = vec![item("a"), item("b"), item("c")];
        let next = reorder(&items, &order(&["ghost", "c", "a"]));
        assert_eq!(ids(&next), vec!["c", "a", "b"]);
    }

    #[test]
    fn normalize_collapses_duplicate_ids_first_wins() {
        let mut duplicate = item("a");
        duplicate.label = "second".to_string();
        let next = normalize(vec![item("a"), item("b"), duplicate]).expect("normalize");
        assert_eq!(ids(&next), vec!["a", "b"]);
        assert_eq!(next[0].label, "A");
    }

    #[test]
    fn normalize_repairs_empty_list() {
        let next = normalize(Vec::new()).expect("normalize");
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].item_type(), CycleItemType::Time);
    }

    #[test]
    fn edit_updates_fields_and_validates_content() {
        let items = vec![item("a")];
        let changes = CycleItemEdit {
            label: Some("  Outside  ".to_string()),
            duration: Some(12_000),
            ..CycleItemEdit::default()
        };
        let next = edit(&items, "a", &changes).expect("edit");
        assert_eq!(next[0].label, "Outside");
        assert_eq!(next[0].duration, 12_000);

        let invalid = CycleItemEdit {
            content: Some(CycleContent::Text {
                text: String::new(),
                style: "static".to_string(),
                size: 2,
            }),
            ..CycleItemEdit::default()
        };
        assert!(edit(&items, "a", &invalid).is_err());
    }

    #[derive(Debug, Clone)]
    enum ListOp {
        Add,
        Toggle(usize),
        Delete(usize),
    }

    fn list_op() -> impl Strategy<Value = ListOp> {
        prop_oneof![
            Just(ListOp::Add),
            (0usize..8).prop_map(ListOp::Toggle),
            (0usize..8).prop_map(ListOp::Delete),
        ]
    }

    proptest! {
        #[test]
        fn list_is_never_empty(ops in prop::collection::vec(list_op(), 0..40)) {
            let mut items = default_items();
            for op in ops {
                items = match op {
                    ListOp::Add => add(&items, NewCycleItem::new(CycleContent::Uptime)).expect("add"),
                    ListOp::Toggle(index) => {
                        let id = items[index % items.len()].id.clone();
                        toggle(&items, &id).expect("toggle")
                    }
                    ListOp::Delete(index) => {
                        let id = items[index % items.len()].id.clone();
                        delete(&items, &id).expect("delete")
                    }
                };
                prop_assert!(!items.is_empty());
            }
        }

        #[test]
        fn reorder_is_a_permutation_of_stored_items(
            count in 1usize..8,
            picks in prop::collection::vec(0usize..12, 0..12)
        ) {
            let items: Vec<CycleItem> = (0..count).map(|index| item(&format!("i{index}"))).collect();
            let requested: Vec<String> = picks.iter().map(|index| format!("i{index}")).collect();
            let next = reorder(&items, &requested);

            prop_assert_eq!(next.len(), items.len());
            let mut sorted_before: Vec<&str> = ids(&items);
            let mut sorted_after: Vec<&str> = ids(&next);
            sorted_before.sort_unstable();
            sorted_after.sort_unstable();
            prop_assert_eq!(sorted_before, sorted_after);
        }
    }
}
