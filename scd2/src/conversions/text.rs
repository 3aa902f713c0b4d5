use crate::types::Cell;

/// Renders a dimension attribute as text, keeping nulls as `None`.
pub fn cell_to_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Null => None,
        Cell::String(value) => Some(value.clone()),
        other => Some(other.to_string()),
    }
}
