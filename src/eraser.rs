//! Field erasure.
//!
//! Turns edits of locked fields into no-op writes: every configured field whose
//! resolved level is `<= ReadOnly` is forced to `null` in the changeset.
//! Relationship fields are erased through their first foreign key.

use serde_json::Value;
use tracing::trace;

use crate::level::ControlLevel;
use crate::record::{get_path, Record};
use crate::registry::FieldControls;

/// Nulls out locked fields in `changeset`, in place.
///
/// Fields with a configured rule are considered; a field whose control value
/// is missing from `resolved` is left alone. Returns the erased attributes.
///
/// Every locked field is written, whether or not the changeset touched it.
/// Persisting the result overwrites the stored value of such a field with
/// `null`, including fields that are ReadOnly only because they have no
/// resolver. Hosts that keep locked data turn `autoErase` off.
pub fn erase_unavailable_dynamic_fields(
    controls: &FieldControls,
    resolved: &Record,
    changeset: &mut Record,
) -> Vec<String> {
    let mut erased = Vec::new();

    for (field, _) in controls.configuration().rules() {
        let Some(binding) = controls.binding(field) else {
            continue;
        };
        let Some(level) = get_path(resolved, &binding.path).and_then(ControlLevel::from_value) else {
            continue;
        };
        if !level.is_locked() {
            continue;
        }

        trace!(field = %field, target = %binding.storage_field, level = %level, "erasing locked field");
        changeset.insert(binding.storage_field.clone(), Value::Null);
        erased.push(binding.storage_field.clone());
    }

    erased
}
