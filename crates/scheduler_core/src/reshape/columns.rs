//! Resource grid column resolution.

use crate::model::display::ColumnDescriptor;

/// Column type that renders the expandable resource tree.
pub const TREE_COLUMN_TYPE: &str = "tree";

/// Resolves backend column descriptors for the widget.
///
/// The first column always renders the tree. Columns are neither sortable
/// nor editable; persisted widths are applied by position and extra widths
/// are ignored.
pub fn resolve_columns(columns: &[ColumnDescriptor], widths: &[f64]) -> Vec<ColumnDescriptor> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let mut resolved = column.clone();
            if index == 0 {
                resolved.column_type = Some(TREE_COLUMN_TYPE.to_string());
            }
            resolved.sortable = false;
            resolved.editor = false;
            if let Some(width) = widths.get(index).copied().and_then(usable_width) {
                resolved.width = Some(width);
            }
            resolved
        })
        .collect()
}

/// A stored width applies only when finite and positive.
pub fn usable_width(width: f64) -> Option<f64> {
    (width.is_finite() && width > 0.0).then_some(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_column_becomes_tree_and_all_lock_down() {
        let mut second = ColumnDescriptor::new("Floor__c", "Floor");
        second.column_type = Some("number".to_string());
        let resolved = resolve_columns(&[ColumnDescriptor::new("Name", "Name"), second], &[]);

        assert_eq!(resolved[0].column_type.as_deref(), Some("tree"));
        assert_eq!(resolved[1].column_type.as_deref(), Some("number"));
        assert!(resolved.iter().all(|c| !c.sortable && !c.editor));
    }

    #[test]
    fn widths_apply_by_position_and_skip_invalid() {
        let columns = [
            ColumnDescriptor::new("Name", "Name"),
            ColumnDescriptor::new("Floor__c", "Floor"),
        ];
        let resolved = resolve_columns(&columns, &[240.0, -1.0, 90.0]);

        assert_eq!(resolved[0].width, Some(240.0));
        assert_eq!(resolved[1].width, None);
        assert_eq!(resolved.len(), 2);
    }
}
